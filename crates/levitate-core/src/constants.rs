use glam::Vec3;

// Shared tuning constants for the control engine and the native host.

// Signal staleness and decay
pub const STALE_WINDOW_SEC: f32 = 0.2; // time without a sample before decay starts
pub const FALL_SPEED_PER_SEC: f32 = 0.5; // decay rate of the held value (units/s)

// Motion
pub const MAX_HEIGHT: f32 = 2.0; // lift above the base height at value 1.0
pub const MOVE_LERP_SPEED: f32 = 5.0; // exponential smoothing rate toward the target (1/s)

// Tone mapping
pub const MIN_FREQUENCY_HZ: f32 = 220.0;
pub const MAX_FREQUENCY_HZ: f32 = 880.0;
pub const AUDIO_GATE: f32 = 0.05; // values at or below this fade the tone out
pub const AUDIO_FADE_SEC: f32 = 0.15; // full-scale linear volume ramp time
pub const MAX_VOLUME: f32 = 0.5;
pub const VOLUME_FLOOR: f32 = 0.001; // below this playback is stopped

// Emission
pub const MIN_EMISSION: f32 = 0.0;
pub const MAX_EMISSION: f32 = 4.0;

// Tone synthesis
pub const TONE_BUFFER_SEC: f32 = 0.1; // looped buffer length
pub const RETUNE_THRESHOLD_HZ: f32 = 10.0; // drift allowed before a buffer is regenerated
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

// Calibration phases (seconds)
pub const CALIBRATION_LEAD_IN_SEC: f32 = 3.0;
pub const CALIBRATION_RELAX_SEC: f32 = 10.0;
pub const CALIBRATION_CONCENTRATE_SEC: f32 = 10.0;

// Persisted threshold keys
pub const KEY_BCI_MIN: &str = "BCI_MIN";
pub const KEY_BCI_MAX: &str = "BCI_MAX";

// Startup selection
pub const AUTO_SELECT_ENTITY_ID: i32 = 1;
pub const AUTO_SELECT_DELAY_SEC: f32 = 0.5;

// Default palette and resting positions for the demo entities
pub const DEFAULT_ENTITY_COLORS: [[f32; 3]; 3] = [
    [0.9, 0.3, 0.3], // red-ish
    [0.3, 0.9, 0.4], // green-ish
    [0.3, 0.5, 0.9], // blue-ish
];

pub const DEFAULT_ENTITY_POSITIONS: [[f32; 3]; 3] =
    [[-1.5, 0.0, 0.0], [0.0, 0.0, 0.0], [1.5, 0.0, 0.0]];

/// Resting position for the `index`-th demo entity; wraps around the defaults
/// and spreads further entities along +X.
#[inline]
pub fn default_entity_position(index: usize) -> Vec3 {
    let base = Vec3::from(DEFAULT_ENTITY_POSITIONS[index % DEFAULT_ENTITY_POSITIONS.len()]);
    let lap = (index / DEFAULT_ENTITY_POSITIONS.len()) as f32;
    base + Vec3::new(lap * 4.5, 0.0, 0.0)
}

#[inline]
pub fn default_entity_color(index: usize) -> [f32; 3] {
    DEFAULT_ENTITY_COLORS[index % DEFAULT_ENTITY_COLORS.len()]
}
