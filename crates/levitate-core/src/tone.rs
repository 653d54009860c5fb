//! Procedural tone synthesis.
//!
//! Generation is a pure function of frequency, sample rate and duration;
//! binding the result to a device is the job of a [`crate::host::ToneSink`].

use crate::constants::*;
use serde::Deserialize;
use std::sync::Arc;

/// A mono loop ready for playback. Cheap to clone.
#[derive(Clone, Debug, PartialEq)]
pub struct ToneBuffer {
    /// Frequency the buffer was requested for.
    pub frequency_hz: f32,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

/// Generate a looping sine buffer at `frequency_hz`, close to `duration_sec`
/// long.
///
/// The length is fitted to a whole number of cycles (at least one) so the
/// loop point is seamless; pitch is exact up to rounding the length to whole
/// samples. A non-positive frequency yields silence.
pub fn generate_sine(frequency_hz: f32, sample_rate: u32, duration_sec: f32) -> ToneBuffer {
    let sr = sample_rate as f64;
    let samples: Vec<f32> = if frequency_hz > 0.0 {
        let f = frequency_hz as f64;
        let cycles = (f * duration_sec as f64).round().max(1.0);
        let len = ((cycles * sr / f).round() as usize).max(1);
        let step = std::f64::consts::TAU * cycles / len as f64;
        (0..len).map(|i| (step * i as f64).sin() as f32).collect()
    } else {
        vec![0.0; ((sr * duration_sec as f64).round() as usize).max(1)]
    };
    ToneBuffer {
        frequency_hz,
        sample_rate,
        samples: samples.into(),
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ToneParams {
    pub sample_rate: u32,
    pub buffer_sec: f32,
    pub retune_threshold_hz: f32,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_sec: TONE_BUFFER_SEC,
            retune_threshold_hz: RETUNE_THRESHOLD_HZ,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ToneState {
    pub current_frequency: f32,
    pub buffer_valid: bool,
}

/// Per-entity synthesizer that only regenerates on significant pitch drift.
#[derive(Clone, Debug, Default)]
pub struct ToneSynth {
    state: ToneState,
    buffer: Option<ToneBuffer>,
    regenerations: u32,
}

impl ToneSynth {
    pub fn state(&self) -> ToneState {
        self.state
    }

    pub fn buffer(&self) -> Option<&ToneBuffer> {
        self.buffer.as_ref()
    }

    /// Total buffers generated so far.
    pub fn regenerations(&self) -> u32 {
        self.regenerations
    }

    /// Request `frequency_hz`. Returns the new buffer when one had to be
    /// generated, `None` when the loaded one is still close enough.
    pub fn retune(&mut self, frequency_hz: f32, params: &ToneParams) -> Option<&ToneBuffer> {
        let drift = (frequency_hz - self.state.current_frequency).abs();
        if self.state.buffer_valid && drift <= params.retune_threshold_hz {
            return None;
        }
        let buffer = generate_sine(frequency_hz, params.sample_rate, params.buffer_sec);
        self.state = ToneState {
            current_frequency: frequency_hz,
            buffer_valid: true,
        };
        self.regenerations += 1;
        self.buffer = Some(buffer);
        self.buffer.as_ref()
    }

    /// Forget the loaded buffer so the next `retune` always regenerates.
    pub fn invalidate(&mut self) {
        self.state.buffer_valid = false;
        self.buffer = None;
    }
}
