// End-to-end behavior of the control loop.

mod support;

use levitate_core::*;
use std::time::Duration;
use support::*;

fn dt() -> Duration {
    Duration::from_secs_f64(1.0 / 60.0)
}

fn engine_with(config: EngineConfig, ids: &[EntityId]) -> ControlEngine {
    let mut engine = ControlEngine::new(config);
    for (i, &id) in ids.iter().enumerate() {
        engine.register(entity_config(id, i)).expect("unique id");
    }
    engine
}

fn immediate_select() -> EngineConfig {
    EngineConfig {
        auto_select_delay_sec: 0.0,
        ..EngineConfig::default()
    }
}

fn run_for(engine: &mut ControlEngine, host: &mut RecordingHost, seconds: f64) {
    let until = engine.now() + seconds;
    while engine.now() < until {
        engine.tick_with(dt(), none(), host);
    }
}

fn value_of(engine: &ControlEngine, id: EntityId) -> f32 {
    engine.entity(id).map(|e| e.current_value).unwrap_or(f32::NAN)
}

#[test]
fn single_sample_decays_back_to_rest() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1]);
    let params = engine.config().mapping.clone();

    engine.tick_with(dt(), [signal(0.9)], &mut host);
    assert_eq!(engine.registry().selected_id(), Some(1));
    assert_eq!(value_of(&engine, 1), 0.9);
    let t0 = engine.now();

    let settle = params.stale_window_sec as f64 + 0.9 / params.fall_speed as f64;
    while engine.now() - t0 < settle - 0.1 {
        engine.tick_with(dt(), none(), &mut host);
    }
    assert!(value_of(&engine, 1) > 0.0, "decayed too early");
    while engine.now() - t0 < settle {
        engine.tick_with(dt(), none(), &mut host);
    }
    engine.tick_with(dt(), none(), &mut host);
    assert_eq!(value_of(&engine, 1), 0.0);

    run_for(&mut engine, &mut host, 3.0);
    let e = engine.entity(1).expect("entity 1");
    assert!(
        (e.position.y - e.base_height()).abs() < 1e-3,
        "position {} did not return to base",
        e.position.y
    );
    assert!(!e.playing);
    assert_eq!(e.emission, params.min_emission);
}

#[test]
fn auto_select_fires_after_delay() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(EngineConfig::default(), &[2, 1]);
    engine.tick_with(dt(), none(), &mut host);
    assert_eq!(engine.registry().selected_id(), None);
    run_for(&mut engine, &mut host, AUTO_SELECT_DELAY_SEC as f64);
    assert_eq!(engine.registry().selected_id(), Some(1));
    assert_eq!(host.count(|c| *c == Call::Selection(Some(1))), 1);
}

#[test]
fn auto_select_skips_missing_entity() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(EngineConfig::default(), &[2, 3]);
    run_for(&mut engine, &mut host, 1.0);
    assert_eq!(engine.registry().selected_id(), None);

    let mut empty = ControlEngine::new(EngineConfig::default());
    run_for(&mut empty, &mut host, 1.0);
    assert!(host.calls.is_empty());
}

#[test]
fn explicit_selection_supersedes_auto_select() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(EngineConfig::default(), &[1, 2]);
    engine.tick_with(dt(), [selection(2)], &mut host);
    run_for(&mut engine, &mut host, 1.0);
    assert_eq!(engine.registry().selected_id(), Some(2));
}

#[test]
fn items_in_one_tick_apply_in_arrival_order() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1, 2]);
    engine.tick_with(dt(), [selection(2), signal(0.6)], &mut host);
    assert_eq!(value_of(&engine, 2), 0.6);
    assert_eq!(value_of(&engine, 1), 0.0);

    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1, 2]);
    engine.tick_with(dt(), [signal(0.6), selection(2)], &mut host);
    // The sample reached entity 1, which was then reset on deselection.
    assert_eq!(value_of(&engine, 1), 0.0);
    assert_eq!(value_of(&engine, 2), 0.0);
    assert!(host.calls.contains(&Call::Stop(1)));
}

#[test]
fn only_the_resolved_entity_receives_samples() {
    fn no_route(_: &[ControllableEntity]) -> Option<usize> {
        None
    }
    let mut host = RecordingHost::default();
    let mut engine = ControlEngine::new(immediate_select()).with_resolver(no_route);
    engine.register(entity_config(1, 0)).expect("unique id");
    engine.tick_with(dt(), [signal(0.8)], &mut host);
    assert_eq!(engine.registry().selected_id(), Some(1));
    assert_eq!(value_of(&engine, 1), 0.0);
}

#[test]
fn inbox_frames_drive_the_engine() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(EngineConfig::default(), &[1, 2]);
    let (tx, rx) = inbox();

    let producer = {
        let tx = tx.clone();
        std::thread::spawn(move || {
            tx.push_frame(br#"{"type":"object_selection","objectId":2}"#.to_vec());
            tx.push_frame(b"garbage".to_vec());
            tx.push_frame(br#"{"concentration":0.5}"#.to_vec());
            tx.push_status(ConnectionStatus::Disconnected("eof".into()));
        })
    };
    producer.join().expect("producer thread");

    engine.tick(dt(), &rx, &mut host);
    assert!(rx.is_empty());
    assert_eq!(engine.registry().selected_id(), Some(2));
    assert_eq!(value_of(&engine, 2), 0.5);
    assert!(host
        .calls
        .contains(&Call::Status(ConnectionStatus::Disconnected("eof".into()))));

    // Nothing pending: the tick returns without blocking.
    engine.tick(dt(), &rx, &mut host);
    assert!(tx.push_frame(br#"{"value":30}"#.to_vec()));
    engine.tick(dt(), &rx, &mut host);
    assert!((value_of(&engine, 2) - 0.3).abs() < 1e-6);
}

#[test]
fn disconnect_lets_entity_decay_to_idle() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1]);
    engine.tick_with(
        dt(),
        [
            signal(0.7),
            Drained::Status(ConnectionStatus::Disconnected("reset".into())),
        ],
        &mut host,
    );
    run_for(&mut engine, &mut host, 3.0);
    assert_eq!(value_of(&engine, 1), 0.0);
}

#[test]
fn removing_last_entity_closes_connection_once() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1, 2]);
    engine.tick_with(dt(), [signal(0.8)], &mut host);
    run_for(&mut engine, &mut host, 0.2);

    assert!(engine.deregister(1, &mut host).is_some());
    assert!(host.calls.contains(&Call::Stop(1)));
    assert!(host.calls.contains(&Call::Selection(None)));
    assert_eq!(host.count(|c| *c == Call::Close), 0);

    assert!(engine.deregister(2, &mut host).is_some());
    assert!(engine.deregister(2, &mut host).is_none());
    assert_eq!(host.count(|c| *c == Call::Close), 1);
}

#[test]
fn gradual_signal_changes_do_not_regenerate_tone() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1]);
    let mut v = 0.5;
    engine.tick_with(dt(), [signal(v)], &mut host);
    for _ in 0..10 {
        v += 0.001; // ~0.66 Hz per tick, 6.6 Hz in total
        engine.tick_with(dt(), [signal(v)], &mut host);
    }
    assert_eq!(host.count(|c| matches!(c, Call::LoadLoop(1, _))), 1);

    engine.tick_with(dt(), [signal(v + 0.05)], &mut host);
    assert_eq!(host.count(|c| matches!(c, Call::LoadLoop(1, _))), 2);
}

#[test]
fn calibration_runs_inside_the_engine() {
    let config = EngineConfig {
        calibration: CalibrationConfig {
            lead_in_sec: 0.1,
            relax_sec: 0.5,
            concentrate_sec: 0.5,
        },
        ..immediate_select()
    };
    let mut host = RecordingHost::default();
    let mut engine = engine_with(config, &[1]);
    engine.start_calibration(&mut host);
    assert_eq!(host.calls.first(), Some(&Call::Phase(CalibrationPhase::Idle)));

    for _ in 0..120 {
        let value = match engine.calibration().map(|s| s.phase()) {
            Some(CalibrationPhase::Relax) => 0.25,
            Some(CalibrationPhase::Concentrate) => 0.75,
            _ => 0.5,
        };
        engine.tick_with(dt(), [signal(value)], &mut host);
    }

    let session = engine.calibration().expect("session");
    assert!(session.is_done());
    assert!(session.relax_samples().iter().all(|&v| v == 0.25));
    assert!(session.concentrate_samples().iter().all(|&v| v == 0.75));
    assert_eq!(host.settings[KEY_BCI_MIN], 0.25);
    assert_eq!(host.settings[KEY_BCI_MAX], 0.75);
    assert_eq!(
        engine.thresholds(),
        Some(Thresholds {
            low: 0.25,
            high: 0.75
        })
    );
    // The live entity kept receiving the stream throughout.
    assert!(value_of(&engine, 1) > 0.0);
}

#[test]
fn aborted_calibration_persists_nothing() {
    let mut host = RecordingHost::default();
    let mut engine = engine_with(immediate_select(), &[1]);
    engine.start_calibration(&mut host);
    run_for(&mut engine, &mut host, 5.0);
    engine.abort_calibration(&mut host);
    assert_eq!(
        engine.calibration().map(|s| s.phase()),
        Some(CalibrationPhase::Idle)
    );
    assert!(host.persisted().is_empty());

    // The stream keeps flowing for longer than a whole calibration run.
    for _ in 0..(30 * 60) {
        engine.tick_with(dt(), [signal(0.5)], &mut host);
    }
    assert_eq!(
        engine.calibration().map(|s| s.phase()),
        Some(CalibrationPhase::Idle)
    );
    assert!(host.persisted().is_empty());
    assert_eq!(engine.thresholds(), None);
}

#[test]
fn rescale_policy_uses_loaded_thresholds() {
    let mut host = RecordingHost::default();
    host.settings.insert(KEY_BCI_MIN.into(), 0.2);
    host.settings.insert(KEY_BCI_MAX.into(), 0.6);
    let config = EngineConfig {
        threshold_policy: ThresholdPolicy::Rescale,
        ..immediate_select()
    };
    let mut engine = engine_with(config, &[1]);
    assert!(engine.load_thresholds(&host).is_some());
    engine.tick_with(dt(), [signal(0.4)], &mut host);
    assert!((value_of(&engine, 1) - 0.5).abs() < 1e-6);
}

#[test]
fn thresholds_need_both_keys() {
    let mut host = RecordingHost::default();
    host.settings.insert(KEY_BCI_MIN.into(), 0.2);
    let mut engine = ControlEngine::new(EngineConfig::default());
    assert_eq!(engine.load_thresholds(&host), None);
    assert_eq!(engine.thresholds(), None);
}
