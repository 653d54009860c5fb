// Engine configuration parsing and validation.

use levitate_core::*;

#[test]
fn default_config_is_valid() {
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn empty_document_yields_defaults() {
    let config = EngineConfig::from_json_str("{}").expect("valid");
    assert_eq!(config.mapping.fall_speed, FALL_SPEED_PER_SEC);
    assert_eq!(config.mapping.stale_window_sec, STALE_WINDOW_SEC);
    assert_eq!(config.tone.retune_threshold_hz, RETUNE_THRESHOLD_HZ);
    assert_eq!(config.calibration.relax_sec, CALIBRATION_RELAX_SEC);
    assert_eq!(config.auto_select_id, Some(AUTO_SELECT_ENTITY_ID));
    assert_eq!(config.threshold_policy, ThresholdPolicy::Ignore);
}

#[test]
fn partial_document_overrides_named_fields() {
    let config = EngineConfig::from_json_str(
        r#"{
            "mapping": { "fall_speed": 1.5 },
            "calibration": { "lead_in_sec": 0 },
            "threshold_policy": "rescale",
            "auto_select_id": null
        }"#,
    )
    .expect("valid");
    assert_eq!(config.mapping.fall_speed, 1.5);
    assert_eq!(config.mapping.max_height, MAX_HEIGHT);
    assert_eq!(config.calibration.lead_in_sec, 0.0);
    assert_eq!(config.calibration.relax_sec, CALIBRATION_RELAX_SEC);
    assert_eq!(config.threshold_policy, ThresholdPolicy::Rescale);
    assert_eq!(config.auto_select_id, None);
}

#[test]
fn non_positive_rate_is_rejected() {
    let err = EngineConfig::from_json_str(r#"{"mapping":{"fall_speed":0}}"#).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::NotPositive {
            field: "mapping.fall_speed",
            ..
        }
    ));
}

#[test]
fn inverted_frequency_range_is_rejected() {
    let err = EngineConfig::from_json_str(
        r#"{"mapping":{"min_frequency_hz":900,"max_frequency_hz":300}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvertedRange { .. }));
    assert!(err.to_string().contains("min_frequency_hz"));
}

#[test]
fn negative_gate_is_rejected() {
    let err = EngineConfig::from_json_str(r#"{"mapping":{"audio_gate":-0.1}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Negative { .. }));
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(
        EngineConfig::from_json_str("{ nope"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        EngineConfig::from_json_str(r#"{"threshold_policy":"sideways"}"#),
        Err(ConfigError::Parse(_))
    ));
}
