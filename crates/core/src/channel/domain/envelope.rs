use serde::{Deserialize, Serialize};

use crate::shared::error::RecorderError;

/// One named message on the wire: `{"event": "ssam:ffmpeg", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Transport half that carries envelopes to the producer.
pub trait EnvelopeSink: Send {
    fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), RecorderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_data_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"ssam:ffmpeg-done"}"#).unwrap();
        assert_eq!(envelope.event, "ssam:ffmpeg-done");
        assert!(envelope.data.is_null());
    }
}
