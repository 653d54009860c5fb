pub mod calibration;
pub mod config;
pub mod constants;
pub mod engine;
pub mod entity;
pub mod host;
pub mod inbox;
pub mod mapping;
pub mod message;
pub mod registry;
pub mod tone;

pub use calibration::*;
pub use config::*;
pub use constants::*;
pub use engine::*;
pub use entity::*;
pub use host::*;
pub use inbox::*;
pub use mapping::*;
pub use message::*;
pub use registry::*;
pub use tone::*;
