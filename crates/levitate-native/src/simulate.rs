//! Offline signal source standing in for the headset server.
//!
//! Produces a bounded random walk as `{"concentration": x}` frames. While a
//! calibration is running the walk is pulled low (relax) or high
//! (concentrate) and sent as the server's `{"value": n}` percent frames,
//! so a simulated calibration yields a sensible threshold pair.

use levitate_core::{CalibrationPhase, ConnectionStatus, EntityId, InboxSender};
use rand::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mood {
    Neutral = 0,
    Relaxed = 1,
    Focused = 2,
}

impl Mood {
    pub fn for_phase(phase: CalibrationPhase) -> Self {
        match phase {
            CalibrationPhase::Relax => Mood::Relaxed,
            CalibrationPhase::Concentrate => Mood::Focused,
            CalibrationPhase::Idle | CalibrationPhase::Done => Mood::Neutral,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Mood::Relaxed,
            2 => Mood::Focused,
            _ => Mood::Neutral,
        }
    }

    /// Level the walk is pulled toward, if any.
    fn attractor(self) -> Option<f32> {
        match self {
            Mood::Neutral => None,
            Mood::Relaxed => Some(0.2),
            Mood::Focused => Some(0.8),
        }
    }
}

/// Mood shared between the host (writer) and the simulator thread.
#[derive(Clone, Default)]
pub struct MoodCell(Arc<AtomicU8>);

impl MoodCell {
    pub fn set(&self, mood: Mood) {
        self.0.store(mood as u8, Ordering::Relaxed);
    }

    pub fn get(&self) -> Mood {
        Mood::from_u8(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub rate_hz: f32,
    pub seed: u64,
    pub step: f32,
    /// Chance per frame of a dropout that leaves the value stale.
    pub dropout_chance: f32,
    pub dropout_sec: (f32, f32),
    /// Cycle the selection through these ids, one switch per period.
    pub cycle_selection: Option<(Duration, Vec<EntityId>)>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            rate_hz: 20.0,
            seed: 42,
            step: 0.06,
            dropout_chance: 0.01,
            dropout_sec: (0.5, 1.5),
            cycle_selection: None,
        }
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    tx: InboxSender,
    mood: MoodCell,
    rng: StdRng,
    level: f32,
}

impl Simulator {
    pub fn new(config: SimulatorConfig, tx: InboxSender, mood: MoodCell) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            tx,
            mood,
            rng,
            level: 0.5,
        }
    }

    /// Next frame of the walk as JSON text.
    pub fn next_frame(&mut self) -> String {
        let mood = self.mood.get();
        let mut delta = self.rng.gen_range(-self.config.step..=self.config.step);
        if let Some(target) = mood.attractor() {
            delta += (target - self.level) * 0.2;
        }
        self.level = (self.level + delta).clamp(0.0, 1.0);
        match mood {
            Mood::Neutral => json!({ "concentration": self.level }).to_string(),
            _ => json!({ "value": (self.level * 100.0).round() as i64 }).to_string(),
        }
    }

    fn selection_frame(id: EntityId) -> String {
        json!({ "type": "object_selection", "objectId": id }).to_string()
    }

    /// Emit frames until `closed` is set or the receiving side goes away.
    pub fn run(mut self, closed: &AtomicBool) {
        log::info!("simulator running at {:.0} Hz", self.config.rate_hz);
        if !self.tx.push_status(ConnectionStatus::Connected) {
            return;
        }
        let frame_sec = 1.0 / self.config.rate_hz.max(1.0);
        let frame = Duration::from_secs_f32(frame_sec);
        let mut dropout = 0.0f32;
        let mut since_cycle = Duration::ZERO;
        let mut cycle_index = 0usize;

        while !closed.load(Ordering::SeqCst) {
            if let Some((period, ids)) = &self.config.cycle_selection {
                since_cycle += frame;
                if since_cycle >= *period && !ids.is_empty() {
                    since_cycle = Duration::ZERO;
                    let id = ids[cycle_index % ids.len()];
                    cycle_index += 1;
                    log::info!("simulator selecting entity {id}");
                    if !self.tx.push_frame(Self::selection_frame(id)) {
                        return;
                    }
                }
            }

            if dropout > 0.0 {
                dropout -= frame_sec;
            } else if self.rng.gen::<f32>() < self.config.dropout_chance {
                let (lo, hi) = self.config.dropout_sec;
                dropout = self.rng.gen_range(lo..=hi);
                log::debug!("simulated dropout for {:.2}s", dropout);
            } else {
                let text = self.next_frame();
                if !self.tx.push_frame(text) {
                    return;
                }
            }
            thread::sleep(frame);
        }
        let _ = self
            .tx
            .push_status(ConnectionStatus::Disconnected("simulator stopped".into()));
    }
}

pub fn spawn_simulator(
    sim: Simulator,
    closed: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    Ok(thread::Builder::new()
        .name("simulator".into())
        .spawn(move || sim.run(&closed))?)
}
