//! Decay and state-to-output mapping for the active entity.
//!
//! Once per tick the held value of the selected entity decays when stale and
//! is mapped onto three independent outputs: lift height, tone and emission.

use crate::calibration::Thresholds;
use crate::constants::*;
use crate::entity::ControllableEntity;
use crate::host::Host;
use crate::message::{clamp01, SignalSample};
use crate::tone::ToneParams;
use glam::Vec3;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MappingParams {
    pub stale_window_sec: f32,
    pub fall_speed: f32,
    pub max_height: f32,
    pub move_lerp_speed: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    pub audio_gate: f32,
    pub audio_fade_sec: f32,
    pub max_volume: f32,
    pub volume_floor: f32,
    pub min_emission: f32,
    pub max_emission: f32,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            stale_window_sec: STALE_WINDOW_SEC,
            fall_speed: FALL_SPEED_PER_SEC,
            max_height: MAX_HEIGHT,
            move_lerp_speed: MOVE_LERP_SPEED,
            min_frequency_hz: MIN_FREQUENCY_HZ,
            max_frequency_hz: MAX_FREQUENCY_HZ,
            audio_gate: AUDIO_GATE,
            audio_fade_sec: AUDIO_FADE_SEC,
            max_volume: MAX_VOLUME,
            volume_floor: VOLUME_FLOOR,
            min_emission: MIN_EMISSION,
            max_emission: MAX_EMISSION,
        }
    }
}

/// Picks the entity that receives routed samples, as an index into the
/// registry slice.
pub type SelectionResolver = fn(&[ControllableEntity]) -> Option<usize>;

/// Default routing: the first selected entity in registry order.
pub fn first_selected(entities: &[ControllableEntity]) -> Option<usize> {
    entities.iter().position(|e| e.selected)
}

/// How persisted calibration thresholds affect the live signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Use the signal as delivered.
    #[default]
    Ignore,
    /// Stretch `[low, high]` onto `[0, 1]`.
    Rescale,
}

impl ThresholdPolicy {
    pub fn apply(self, value: f32, thresholds: Option<Thresholds>) -> f32 {
        match (self, thresholds) {
            (ThresholdPolicy::Rescale, Some(t)) if t.high > t.low => {
                clamp01((value - t.low) / (t.high - t.low))
            }
            _ => value,
        }
    }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Exponential smoothing factor for a rate (1/s) over `dt_sec`.
#[inline]
pub fn smoothing_alpha(rate: f32, dt_sec: f32) -> f32 {
    1.0 - (-rate * dt_sec).exp()
}

/// Held value after one tick without fresh input. Only the part of the tick
/// past the staleness window decays; the result never goes below zero.
pub fn decay_value(
    value: f32,
    since_sample_sec: Option<f32>,
    dt_sec: f32,
    params: &MappingParams,
) -> f32 {
    let stale_for = match since_sample_sec {
        Some(since) => since - params.stale_window_sec,
        None => dt_sec,
    };
    if stale_for <= 0.0 {
        return value;
    }
    (value - params.fall_speed * stale_for.min(dt_sec)).max(0.0)
}

pub fn target_height(base_height: f32, value: f32, params: &MappingParams) -> f32 {
    base_height + lerp(0.0, params.max_height, value)
}

pub fn tone_frequency(value: f32, params: &MappingParams) -> f32 {
    lerp(params.min_frequency_hz, params.max_frequency_hz, value)
}

pub fn emission_intensity(value: f32, params: &MappingParams) -> f32 {
    lerp(params.min_emission, params.max_emission, value)
}

/// Linear volume step toward `target`, full scale taking `audio_fade_sec`.
pub fn ramp_volume(volume: f32, target: f32, dt_sec: f32, params: &MappingParams) -> f32 {
    let step = if params.audio_fade_sec > 0.0 {
        params.max_volume / params.audio_fade_sec * dt_sec
    } else {
        f32::INFINITY
    };
    if volume < target {
        (volume + step).min(target)
    } else {
        (volume - step).max(target)
    }
}

/// Hand a routed sample to an entity.
pub fn apply_sample(entity: &mut ControllableEntity, sample: SignalSample) {
    entity.current_value = sample.value();
    entity.last_sample_time = Some(sample.timestamp());
}

/// One tick of decay and output mapping for a selected entity.
pub fn update_entity<H: Host>(
    entity: &mut ControllableEntity,
    now: f64,
    dt_sec: f32,
    params: &MappingParams,
    tone_params: &ToneParams,
    host: &mut H,
) {
    let since = entity.last_sample_time.map(|t| (now - t) as f32);
    entity.current_value = decay_value(entity.current_value, since, dt_sec, params);
    let value = entity.current_value;

    // Position: smoothed toward the moving target, never snapped.
    let target_y = target_height(entity.base_height(), value, params);
    entity.position_target = Vec3::new(entity.base_position.x, target_y, entity.base_position.z);
    let alpha = smoothing_alpha(params.move_lerp_speed, dt_sec);
    entity.position += (entity.position_target - entity.position) * alpha;
    host.set_position(entity.id, entity.position);

    update_tone(entity, dt_sec, params, tone_params, host);

    // Visuals track the held value regardless of the audio gate.
    entity.emission = emission_intensity(value, params);
    host.set_emission(entity.id, entity.color_rgb, entity.emission);

    log::trace!(
        "entity {} value={:.3} y={:.3} vol={:.3} emission={:.2}",
        entity.id,
        value,
        entity.position.y,
        entity.volume,
        entity.emission
    );
}

fn update_tone<H: Host>(
    entity: &mut ControllableEntity,
    dt_sec: f32,
    params: &MappingParams,
    tone_params: &ToneParams,
    host: &mut H,
) {
    let value = entity.current_value;
    if value > params.audio_gate {
        let frequency = tone_frequency(value, params);
        if let Some(buffer) = entity.tone.retune(frequency, tone_params) {
            host.load_loop(entity.id, buffer);
        }
        entity.playing = true;
        entity.volume = ramp_volume(entity.volume, params.max_volume, dt_sec, params);
        host.set_volume(entity.id, entity.volume);
    } else if entity.playing {
        entity.volume = ramp_volume(entity.volume, 0.0, dt_sec, params);
        if entity.volume < params.volume_floor {
            stop_tone(entity, host);
        } else {
            host.set_volume(entity.id, entity.volume);
        }
    }
}

fn stop_tone<H: Host>(entity: &mut ControllableEntity, host: &mut H) {
    entity.volume = 0.0;
    entity.playing = false;
    entity.tone.invalidate();
    host.stop(entity.id);
}

/// Synchronously return a deselected entity to rest: tone stopped, value
/// zeroed, position snapped to base, emission at its minimum.
pub fn reset_entity<H: Host>(
    entity: &mut ControllableEntity,
    params: &MappingParams,
    host: &mut H,
) {
    stop_tone(entity, host);
    entity.current_value = 0.0;
    entity.last_sample_time = None;
    entity.position = entity.base_position;
    entity.position_target = entity.base_position;
    host.set_position(entity.id, entity.position);
    entity.emission = params.min_emission;
    host.set_emission(entity.id, entity.color_rgb, entity.emission);
}
