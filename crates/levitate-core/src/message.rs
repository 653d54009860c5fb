//! Decoding of inbound channel frames.
//!
//! The channel multiplexes selection commands and signal readings as loose
//! JSON objects. Decoding tries an ordered set of shapes and returns the first
//! one that matches; anything else is ordinary channel noise and yields `None`.

use serde::Deserialize;

/// Identifier of a controllable entity as sent on the wire.
pub type EntityId = i32;

/// Request to make one entity the active one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionCommand {
    pub entity_id: EntityId,
}

/// A decoded channel event, in the order it was received.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChannelEvent {
    Selection(SelectionCommand),
    /// Normalized signal level, already clamped to \[0, 1\].
    Signal(f32),
}

/// One normalized reading stamped with the engine clock (seconds).
///
/// The value is clamped on construction so nothing downstream ever sees a
/// reading outside \[0, 1\].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalSample {
    value: f32,
    timestamp: f64,
}

impl SignalSample {
    pub fn new(value: f32, timestamp: f64) -> Self {
        Self {
            value: clamp01(value),
            timestamp,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum TaggedFrame {
    #[serde(rename = "object_selection")]
    ObjectSelection {
        #[serde(rename = "objectId")]
        object_id: EntityId,
    },
}

// Variant order is the match priority.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Tagged(TaggedFrame),
    Concentration { concentration: f64 },
    /// Integer percentage sent by the acquisition server during calibration.
    Percent { value: f64 },
}

impl From<WireFrame> for ChannelEvent {
    fn from(frame: WireFrame) -> Self {
        match frame {
            WireFrame::Tagged(TaggedFrame::ObjectSelection { object_id }) => {
                ChannelEvent::Selection(SelectionCommand {
                    entity_id: object_id,
                })
            }
            WireFrame::Concentration { concentration } => {
                ChannelEvent::Signal(clamp01(concentration as f32))
            }
            WireFrame::Percent { value } => ChannelEvent::Signal(clamp01((value / 100.0) as f32)),
        }
    }
}

/// Decode one raw frame. Never fails: undecodable input returns `None`.
pub fn decode(raw: &[u8]) -> Option<ChannelEvent> {
    let text = std::str::from_utf8(raw).ok()?;
    match serde_json::from_str::<WireFrame>(text) {
        Ok(frame) => Some(frame.into()),
        Err(_) => {
            log::trace!("dropping unrecognized frame ({} bytes)", raw.len());
            None
        }
    }
}

/// Clamp to \[0, 1\]; NaN maps to 0.
#[inline]
pub fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
