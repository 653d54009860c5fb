//! Side effects the engine hands to its host.
//!
//! Every call is fire-and-forget: the engine never waits on a result. Display,
//! audio devices, settings storage and the transport all live on the host side
//! of these traits.

use crate::calibration::{CalibrationPhase, IndicatorRole};
use crate::inbox::ConnectionStatus;
use crate::message::EntityId;
use crate::tone::ToneBuffer;
use glam::Vec3;

/// Playback device binding for looping tone buffers.
pub trait ToneSink {
    /// Replace the loop playing for `entity` and start it if stopped.
    fn load_loop(&mut self, entity: EntityId, buffer: &ToneBuffer);
    fn set_volume(&mut self, entity: EntityId, volume: f32);
    fn stop(&mut self, entity: EntityId);
}

/// Key-value persistence for calibration results.
pub trait SettingsStore {
    fn persist(&mut self, key: &str, value: f32);
    fn load(&self, key: &str) -> Option<f32>;
}

/// Everything else the core drives on the host.
pub trait Host: ToneSink + SettingsStore {
    fn set_position(&mut self, entity: EntityId, position: Vec3);
    fn set_emission(&mut self, entity: EntityId, color: [f32; 3], intensity: f32);

    /// Mirror of a calibration reading for a live indicator.
    fn update_indicator(&mut self, _role: IndicatorRole, _value: f32) {}

    fn calibration_phase_changed(&mut self, _phase: CalibrationPhase) {}

    fn selection_changed(&mut self, _selected: Option<EntityId>) {}

    fn connection_status(&mut self, _status: &ConnectionStatus) {}

    /// Ask the channel collaborator to drop the connection.
    fn close_connection(&mut self);
}
