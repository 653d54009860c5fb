//! Engine configuration.
//!
//! Every section falls back to its defaults, so a JSON document only needs to
//! name the values it changes.

use crate::calibration::CalibrationConfig;
use crate::constants::*;
use crate::mapping::{MappingParams, ThresholdPolicy};
use crate::message::EntityId;
use crate::tone::ToneParams;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f32 },
    #[error("{low_field} ({low}) must be below {high_field} ({high})")]
    InvertedRange {
        low_field: &'static str,
        low: f32,
        high_field: &'static str,
        high: f32,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mapping: MappingParams,
    pub tone: ToneParams,
    pub calibration: CalibrationConfig,
    /// Entity that selects itself after startup; `None` disables it.
    pub auto_select_id: Option<EntityId>,
    pub auto_select_delay_sec: f32,
    pub threshold_policy: ThresholdPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mapping: MappingParams::default(),
            tone: ToneParams::default(),
            calibration: CalibrationConfig::default(),
            auto_select_id: Some(AUTO_SELECT_ENTITY_ID),
            auto_select_delay_sec: AUTO_SELECT_DELAY_SEC,
            threshold_policy: ThresholdPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.mapping;
        positive("mapping.fall_speed", m.fall_speed)?;
        positive("mapping.move_lerp_speed", m.move_lerp_speed)?;
        positive("mapping.max_height", m.max_height)?;
        positive("mapping.max_volume", m.max_volume)?;
        positive("mapping.volume_floor", m.volume_floor)?;
        non_negative("mapping.stale_window_sec", m.stale_window_sec)?;
        non_negative("mapping.audio_gate", m.audio_gate)?;
        non_negative("mapping.audio_fade_sec", m.audio_fade_sec)?;
        positive("mapping.min_frequency_hz", m.min_frequency_hz)?;
        ordered(
            ("mapping.min_frequency_hz", m.min_frequency_hz),
            ("mapping.max_frequency_hz", m.max_frequency_hz),
        )?;
        ordered(
            ("mapping.min_emission", m.min_emission),
            ("mapping.max_emission", m.max_emission),
        )?;
        if m.volume_floor >= m.max_volume {
            return Err(ConfigError::InvertedRange {
                low_field: "mapping.volume_floor",
                low: m.volume_floor,
                high_field: "mapping.max_volume",
                high: m.max_volume,
            });
        }

        let t = &self.tone;
        positive("tone.sample_rate", t.sample_rate as f32)?;
        positive("tone.buffer_sec", t.buffer_sec)?;
        non_negative("tone.retune_threshold_hz", t.retune_threshold_hz)?;

        let c = &self.calibration;
        non_negative("calibration.lead_in_sec", c.lead_in_sec)?;
        positive("calibration.relax_sec", c.relax_sec)?;
        positive("calibration.concentrate_sec", c.concentrate_sec)?;

        non_negative("auto_select_delay_sec", self.auto_select_delay_sec)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn ordered(low: (&'static str, f32), high: (&'static str, f32)) -> Result<(), ConfigError> {
    if low.1 < high.1 {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange {
            low_field: low.0,
            low: low.1,
            high_field: high.0,
            high: high.1,
        })
    }
}
