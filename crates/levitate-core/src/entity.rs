use crate::message::EntityId;
use crate::tone::ToneSynth;
use glam::Vec3;

/// Static description used to create an entity.
///
/// - `id`: unique wire id (the `objectId` of selection messages)
/// - `base_position`: resting position; `y` is the base height
/// - `color_rgb`: emission color handed to the host with every intensity update
#[derive(Clone, Debug)]
pub struct EntityConfig {
    pub id: EntityId,
    pub base_position: Vec3,
    pub color_rgb: [f32; 3],
}

/// Mutable runtime state of one controllable object.
#[derive(Clone, Debug)]
pub struct ControllableEntity {
    pub id: EntityId,
    pub selected: bool,
    /// Held signal level in \[0, 1\].
    pub current_value: f32,
    /// Engine-clock time of the last routed sample.
    pub last_sample_time: Option<f64>,
    pub base_position: Vec3,
    pub position: Vec3,
    pub position_target: Vec3,
    pub color_rgb: [f32; 3],
    pub emission: f32,
    pub volume: f32,
    pub playing: bool,
    pub tone: ToneSynth,
}

impl ControllableEntity {
    pub fn new(config: EntityConfig) -> Self {
        Self {
            id: config.id,
            selected: false,
            current_value: 0.0,
            last_sample_time: None,
            base_position: config.base_position,
            position: config.base_position,
            position_target: config.base_position,
            color_rgb: config.color_rgb,
            emission: 0.0,
            volume: 0.0,
            playing: false,
            tone: ToneSynth::default(),
        }
    }

    pub fn base_height(&self) -> f32 {
        self.base_position.y
    }
}
