use crate::audio::AudioSink;
use crate::settings::JsonSettings;
use crate::simulate::{Mood, MoodCell};
use fnv::FnvHashMap;
use glam::Vec3;
use levitate_core::{
    CalibrationPhase, ConnectionStatus, ControlEngine, EntityId, Host, IndicatorRole,
    SettingsStore, ToneBuffer, ToneSink,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Last presentation state pushed for one entity.
#[derive(Clone, Copy, Debug, Default)]
struct EntityView {
    position: Vec3,
    emission: f32,
}

/// Terminal host: tones go to the sound card, thresholds to a JSON file and
/// presentation to the log.
pub struct NativeHost {
    audio: AudioSink,
    settings: JsonSettings,
    link_closed: Arc<AtomicBool>,
    mood: Option<MoodCell>,
    views: FnvHashMap<EntityId, EntityView>,
    connected: bool,
}

impl NativeHost {
    pub fn new(audio: AudioSink, settings: JsonSettings, link_closed: Arc<AtomicBool>) -> Self {
        Self {
            audio,
            settings,
            link_closed,
            mood: None,
            views: FnvHashMap::default(),
            connected: false,
        }
    }

    /// Let calibration phases steer a simulated signal source.
    pub fn with_mood(mut self, mood: MoodCell) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn link_closed(&self) -> bool {
        self.link_closed.load(Ordering::SeqCst)
    }

    /// One-line summary of the engine for periodic display.
    pub fn status_line(&self, engine: &ControlEngine) -> String {
        let link = if self.connected { "up" } else { "down" };
        let mut line = format!("link {link}");
        if let Some(session) = engine.calibration() {
            if session.is_active() {
                line.push_str(&format!(
                    " | calibrating {:?} {:.1}s left",
                    session.phase(),
                    session.remaining()
                ));
            }
        }
        match engine.registry().entities().iter().find(|e| e.selected) {
            Some(e) => {
                let glow = self.views.get(&e.id).map(|v| v.emission).unwrap_or(e.emission);
                line.push_str(&format!(
                    " | entity {} value {:.2} height {:.2} tone {} vol {:.2} glow {:.2}",
                    e.id,
                    e.current_value,
                    e.position.y,
                    if e.playing {
                        format!("{:.0}Hz", e.tone.state().current_frequency)
                    } else {
                        "off".to_string()
                    },
                    e.volume,
                    glow,
                ));
            }
            None => line.push_str(" | nothing selected"),
        }
        if let Some(t) = engine.thresholds() {
            line.push_str(&format!(" | range {:.2}..{:.2}", t.low, t.high));
        }
        line.push_str(&format!(" | voices {}", self.audio.active_voices()));
        line
    }
}

impl ToneSink for NativeHost {
    fn load_loop(&mut self, entity: EntityId, buffer: &ToneBuffer) {
        self.audio.load_loop(entity, buffer);
        if let Some(view) = self.views.get(&entity) {
            self.audio.set_pan_from_x(entity, view.position.x);
        }
    }

    fn set_volume(&mut self, entity: EntityId, volume: f32) {
        self.audio.set_volume(entity, volume);
    }

    fn stop(&mut self, entity: EntityId) {
        self.audio.stop(entity);
    }
}

impl SettingsStore for NativeHost {
    fn persist(&mut self, key: &str, value: f32) {
        self.settings.persist(key, value);
    }

    fn load(&self, key: &str) -> Option<f32> {
        self.settings.load(key)
    }
}

impl Host for NativeHost {
    fn set_position(&mut self, entity: EntityId, position: Vec3) {
        self.views.entry(entity).or_default().position = position;
        self.audio.set_pan_from_x(entity, position.x);
    }

    fn set_emission(&mut self, entity: EntityId, color: [f32; 3], intensity: f32) {
        self.views.entry(entity).or_default().emission = intensity;
        log::trace!("entity {entity} glow {color:?} x{intensity:.2}");
    }

    fn update_indicator(&mut self, role: IndicatorRole, value: f32) {
        log::debug!("{:?} indicator {:.2}", role, value);
    }

    fn calibration_phase_changed(&mut self, phase: CalibrationPhase) {
        match phase {
            CalibrationPhase::Idle => log::info!("calibration: get ready"),
            CalibrationPhase::Relax => log::info!("calibration: relax and breathe slowly"),
            CalibrationPhase::Concentrate => {
                log::info!("calibration: concentrate on the object")
            }
            CalibrationPhase::Done => log::info!("calibration: done"),
        }
        if let Some(mood) = &self.mood {
            mood.set(Mood::for_phase(phase));
        }
    }

    fn selection_changed(&mut self, selected: Option<EntityId>) {
        match selected {
            Some(id) => log::info!("selected entity {id}"),
            None => log::info!("selection cleared"),
        }
    }

    fn connection_status(&mut self, status: &ConnectionStatus) {
        self.connected = matches!(status, ConnectionStatus::Connected);
    }

    fn close_connection(&mut self) {
        self.link_closed.store(true, Ordering::SeqCst);
    }
}
