//! Record Payloads
//!
//! Metadata stored next to every vector, discriminated by its `type` field.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Collection;
use crate::TimeSec;

/// Metadata of one index record.
///
/// Timestamps are seconds from the start of the media, so a hit can be used
/// directly as a seek position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    /// A transcript segment
    Speech { timestamp: TimeSec, text: String },
    /// A sampled keyframe
    Frame { timestamp: u32, path: PathBuf },
}

impl Payload {
    pub fn speech(timestamp: TimeSec, text: impl Into<String>) -> Self {
        Payload::Speech {
            timestamp,
            text: text.into(),
        }
    }

    pub fn frame(timestamp: u32, path: impl Into<PathBuf>) -> Self {
        Payload::Frame {
            timestamp,
            path: path.into(),
        }
    }

    /// Seek position in seconds
    pub fn timestamp(&self) -> TimeSec {
        match self {
            Payload::Speech { timestamp, .. } => *timestamp,
            Payload::Frame { timestamp, .. } => f64::from(*timestamp),
        }
    }

    /// The only collection this payload may be stored in
    pub fn collection(&self) -> Collection {
        match self {
            Payload::Speech { .. } => Collection::Speech,
            Payload::Frame { .. } => Collection::Visual,
        }
    }

    /// Value of the `type` discriminator
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Speech { .. } => "speech",
            Payload::Frame { .. } => "frame",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_payload_json_shape() {
        let payload = Payload::speech(15.0, "pricing details");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "speech");
        assert_eq!(json["timestamp"], 15.0);
        assert_eq!(json["text"], "pricing details");
    }

    #[test]
    fn test_frame_payload_json_shape() {
        let payload = Payload::frame(7, "/tmp/frames/frame_000008.jpg");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "frame");
        assert_eq!(json["timestamp"], 7);
        assert_eq!(json["path"], "/tmp/frames/frame_000008.jpg");
    }

    #[test]
    fn test_payload_parses_by_discriminator() {
        let parsed: Payload =
            serde_json::from_str(r#"{"type":"frame","timestamp":3,"path":"f.jpg"}"#).unwrap();
        assert_eq!(parsed, Payload::frame(3, "f.jpg"));

        let unknown = serde_json::from_str::<Payload>(r#"{"type":"caption","timestamp":3}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_payload_collection_and_timestamp() {
        let speech = Payload::speech(2.5, "hello");
        assert_eq!(speech.collection(), Collection::Speech);
        assert_eq!(speech.timestamp(), 2.5);
        assert_eq!(speech.type_name(), "speech");

        let frame = Payload::frame(40, "f.jpg");
        assert_eq!(frame.collection(), Collection::Visual);
        assert_eq!(frame.timestamp(), 40.0);
        assert_eq!(frame.type_name(), "frame");
    }
}
