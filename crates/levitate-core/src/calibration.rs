//! Baseline calibration.
//!
//! A session walks `Idle -> Relax -> Concentrate -> Done` on the tick clock.
//! Readings taken during the two timed phases are averaged into the
//! `BCI_MIN`/`BCI_MAX` thresholds, which are persisted once on reaching
//! `Done`. An aborted session parks in `Idle` and never advances again.

use crate::constants::*;
use crate::host::Host;
use crate::message::{clamp01, SignalSample};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    Relax,
    Concentrate,
    Done,
}

/// Which live indicator a calibration reading is mirrored to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorRole {
    Relax,
    Concentrate,
}

/// Phase durations in seconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub lead_in_sec: f32,
    pub relax_sec: f32,
    pub concentrate_sec: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lead_in_sec: CALIBRATION_LEAD_IN_SEC,
            relax_sec: CALIBRATION_RELAX_SEC,
            concentrate_sec: CALIBRATION_CONCENTRATE_SEC,
        }
    }
}

impl CalibrationConfig {
    fn duration(&self, phase: CalibrationPhase) -> f32 {
        match phase {
            CalibrationPhase::Idle => self.lead_in_sec,
            CalibrationPhase::Relax => self.relax_sec,
            CalibrationPhase::Concentrate => self.concentrate_sec,
            CalibrationPhase::Done => 0.0,
        }
    }
}

/// Result of a completed session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub low: f32,
    pub high: f32,
}

#[derive(Clone, Debug)]
pub struct CalibrationSession {
    config: CalibrationConfig,
    phase: CalibrationPhase,
    relax_samples: Vec<f32>,
    concentrate_samples: Vec<f32>,
    remaining: f32,
    thresholds: Option<Thresholds>,
    aborted: bool,
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig) -> Self {
        let remaining = config.lead_in_sec;
        Self {
            config,
            phase: CalibrationPhase::Idle,
            relax_samples: Vec::new(),
            concentrate_samples: Vec::new(),
            remaining,
            thresholds: None,
            aborted: false,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Seconds left in the current phase.
    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }

    pub fn is_done(&self) -> bool {
        self.phase == CalibrationPhase::Done
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Still counting toward `Done`.
    pub fn is_active(&self) -> bool {
        !self.aborted && !self.is_done()
    }

    /// Collecting readings right now.
    pub fn is_recording(&self) -> bool {
        matches!(
            self.phase,
            CalibrationPhase::Relax | CalibrationPhase::Concentrate
        )
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    pub fn relax_samples(&self) -> &[f32] {
        &self.relax_samples
    }

    pub fn concentrate_samples(&self) -> &[f32] {
        &self.concentrate_samples
    }

    /// Store a reading for the active phase and mirror it to the indicator.
    /// Readings outside the two timed phases are ignored.
    pub fn record<H: Host>(&mut self, sample: SignalSample, host: &mut H) {
        let value = sample.value();
        match self.phase {
            CalibrationPhase::Relax => {
                self.relax_samples.push(value);
                host.update_indicator(IndicatorRole::Relax, value);
            }
            CalibrationPhase::Concentrate => {
                self.concentrate_samples.push(value);
                host.update_indicator(IndicatorRole::Concentrate, value);
            }
            CalibrationPhase::Idle | CalibrationPhase::Done => {}
        }
    }

    /// Advance the phase timer. Overshoot carries into the next phase, so a
    /// long tick can cross several boundaries at once.
    pub fn tick<H: Host>(&mut self, dt_sec: f32, host: &mut H) {
        if !self.is_active() {
            return;
        }
        self.remaining -= dt_sec;
        while self.remaining <= 0.0 && !self.is_done() {
            let next = match self.phase {
                CalibrationPhase::Idle => CalibrationPhase::Relax,
                CalibrationPhase::Relax => CalibrationPhase::Concentrate,
                CalibrationPhase::Concentrate | CalibrationPhase::Done => CalibrationPhase::Done,
            };
            self.enter(next, host);
        }
    }

    /// Cancel the run: readings are dropped and the session holds in `Idle`
    /// with its timer stopped, so nothing is ever persisted. No-op once done
    /// or already aborted.
    pub fn abort<H: Host>(&mut self, host: &mut H) {
        if !self.is_active() {
            return;
        }
        log::info!("calibration aborted during {:?}", self.phase);
        self.relax_samples.clear();
        self.concentrate_samples.clear();
        self.phase = CalibrationPhase::Idle;
        self.remaining = self.config.lead_in_sec;
        self.aborted = true;
        host.calibration_phase_changed(CalibrationPhase::Idle);
    }

    fn enter<H: Host>(&mut self, phase: CalibrationPhase, host: &mut H) {
        self.phase = phase;
        self.remaining += self.config.duration(phase);
        log::info!("calibration phase -> {:?}", phase);
        host.calibration_phase_changed(phase);
        if phase == CalibrationPhase::Done {
            self.remaining = 0.0;
            self.finish(host);
        }
    }

    fn finish<H: Host>(&mut self, host: &mut H) {
        let thresholds = Thresholds {
            low: clamp01(mean(&self.relax_samples)),
            high: clamp01(mean(&self.concentrate_samples)),
        };
        host.persist(KEY_BCI_MIN, thresholds.low);
        host.persist(KEY_BCI_MAX, thresholds.high);
        log::info!(
            "calibration done: {}={:.3} ({} samples) {}={:.3} ({} samples)",
            KEY_BCI_MIN,
            thresholds.low,
            self.relax_samples.len(),
            KEY_BCI_MAX,
            thresholds.high,
            self.concentrate_samples.len()
        );
        self.thresholds = Some(thresholds);
    }
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    (sum / values.len() as f64) as f32
}
