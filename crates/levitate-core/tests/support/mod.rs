// Recording host shared by the integration tests.

#![allow(dead_code)]

use glam::Vec3;
use levitate_core::*;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Position(EntityId, Vec3),
    Emission(EntityId, f32),
    LoadLoop(EntityId, f32),
    Volume(EntityId, f32),
    Stop(EntityId),
    Indicator(IndicatorRole, f32),
    Phase(CalibrationPhase),
    Selection(Option<EntityId>),
    Status(ConnectionStatus),
    Persist(String, f32),
    Close,
}

#[derive(Default)]
pub struct RecordingHost {
    pub calls: Vec<Call>,
    pub settings: HashMap<String, f32>,
}

impl RecordingHost {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn persisted(&self) -> Vec<(String, f32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Persist(k, v) => Some((k.clone(), *v)),
                _ => None,
            })
            .collect()
    }

    pub fn last_volume(&self, id: EntityId) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Volume(e, v) if *e == id => Some(*v),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ToneSink for RecordingHost {
    fn load_loop(&mut self, entity: EntityId, buffer: &ToneBuffer) {
        self.calls.push(Call::LoadLoop(entity, buffer.frequency_hz));
    }
    fn set_volume(&mut self, entity: EntityId, volume: f32) {
        self.calls.push(Call::Volume(entity, volume));
    }
    fn stop(&mut self, entity: EntityId) {
        self.calls.push(Call::Stop(entity));
    }
}

impl SettingsStore for RecordingHost {
    fn persist(&mut self, key: &str, value: f32) {
        self.settings.insert(key.to_string(), value);
        self.calls.push(Call::Persist(key.to_string(), value));
    }
    fn load(&self, key: &str) -> Option<f32> {
        self.settings.get(key).copied()
    }
}

impl Host for RecordingHost {
    fn set_position(&mut self, entity: EntityId, position: Vec3) {
        self.calls.push(Call::Position(entity, position));
    }
    fn set_emission(&mut self, entity: EntityId, _color: [f32; 3], intensity: f32) {
        self.calls.push(Call::Emission(entity, intensity));
    }
    fn update_indicator(&mut self, role: IndicatorRole, value: f32) {
        self.calls.push(Call::Indicator(role, value));
    }
    fn calibration_phase_changed(&mut self, phase: CalibrationPhase) {
        self.calls.push(Call::Phase(phase));
    }
    fn selection_changed(&mut self, selected: Option<EntityId>) {
        self.calls.push(Call::Selection(selected));
    }
    fn connection_status(&mut self, status: &ConnectionStatus) {
        self.calls.push(Call::Status(status.clone()));
    }
    fn close_connection(&mut self) {
        self.calls.push(Call::Close);
    }
}

pub fn entity_config(id: EntityId, index: usize) -> EntityConfig {
    EntityConfig {
        id,
        base_position: default_entity_position(index),
        color_rgb: default_entity_color(index),
    }
}

pub fn signal(value: f32) -> Drained {
    Drained::Event(ChannelEvent::Signal(value))
}

pub fn selection(id: EntityId) -> Drained {
    Drained::Event(ChannelEvent::Selection(SelectionCommand { entity_id: id }))
}

/// An empty batch for ticks with nothing delivered.
pub fn none() -> [Drained; 0] {
    []
}
