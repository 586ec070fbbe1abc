use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::recording::streaming_controller::StreamingController;
use crate::shared::error::RecorderError;

use super::domain::controller_outbox::ControllerOutbox;
use super::domain::envelope::{Envelope, EnvelopeSink};
use super::domain::messages::{ControllerMessage, ProducerMessage};
use super::message_names::MessageNames;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    #[serde(alias = "frameRate")]
    fps: f64,
    #[serde(default, alias = "totalFramesHint")]
    total_frames: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(alias = "sequenceIndex")]
    frame: u64,
    #[serde(alias = "imagePayload")]
    image: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogPayload<'a> {
    msg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames_written: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_path: Option<&'a PathBuf>,
}

#[derive(Debug, Serialize)]
struct WarnPayload<'a> {
    msg: &'a str,
    abort: bool,
}

/// Maps named wire envelopes onto controller operations and back.
#[derive(Clone, Debug, Default)]
pub struct ControlChannelAdapter {
    names: MessageNames,
}

impl ControlChannelAdapter {
    pub fn new(names: MessageNames) -> Self {
        Self { names }
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self::new(MessageNames::with_prefix(prefix))
    }

    pub fn names(&self) -> &MessageNames {
        &self.names
    }

    pub fn decode(&self, envelope: Envelope) -> Result<ProducerMessage, RecorderError> {
        let Envelope { event, data } = envelope;

        if event == self.names.start {
            let payload: StartPayload = parse(&event, data)?;
            Ok(ProducerMessage::StartSession {
                frame_rate: payload.fps,
                total_frames_hint: payload.total_frames,
            })
        } else if event == self.names.submit_frame {
            let payload: FramePayload = parse(&event, data)?;
            Ok(ProducerMessage::SubmitFrame {
                sequence_index: payload.frame,
                image_payload: payload.image,
            })
        } else if event == self.names.end {
            Ok(ProducerMessage::EndSession)
        } else {
            Err(RecorderError::Transport(format!("unknown event '{event}'")))
        }
    }

    pub fn encode(&self, message: &ControllerMessage) -> Envelope {
        let (event, data) = match message {
            ControllerMessage::RequestFrame => {
                (&self.names.request_frame, serde_json::json!({}))
            }
            ControllerMessage::Progress { message } => (
                &self.names.log,
                to_value(&LogPayload {
                    msg: message,
                    frames_written: None,
                    output_path: None,
                }),
            ),
            ControllerMessage::Completed {
                message,
                frames_written,
                output_path,
            } => (
                &self.names.log,
                to_value(&LogPayload {
                    msg: message,
                    frames_written: Some(*frames_written),
                    output_path: Some(output_path),
                }),
            ),
            ControllerMessage::Advisory { message, fatal } => (
                &self.names.warn,
                to_value(&WarnPayload {
                    msg: message,
                    abort: *fatal,
                }),
            ),
        };
        Envelope::new(event.clone(), data)
    }

    /// Decodes one inbound envelope and applies it to the controller.
    ///
    /// A known event with an unreadable payload is reported back to the
    /// producer; an unreadable frame also renews the frame request so the
    /// producer does not wait forever. Unknown events are only logged.
    pub fn dispatch(
        &self,
        controller: &mut StreamingController,
        envelope: Envelope,
    ) -> Result<(), RecorderError> {
        let is_frame = envelope.event == self.names.submit_frame;
        let is_known = is_frame
            || envelope.event == self.names.start
            || envelope.event == self.names.end;
        let message = match self.decode(envelope) {
            Ok(message) => message,
            Err(e) if is_frame => return Err(controller.reject_frame(e)),
            Err(e) if is_known => return Err(controller.reject_message(e)),
            Err(e) => {
                log::warn!("Skipping control message: {e}");
                return Err(e);
            }
        };

        match message {
            ProducerMessage::StartSession {
                frame_rate,
                total_frames_hint,
            } => controller.start_session(frame_rate, total_frames_hint),
            ProducerMessage::SubmitFrame {
                sequence_index,
                image_payload,
            } => controller.submit_frame(sequence_index, &image_payload),
            ProducerMessage::EndSession => {
                controller.end_session();
                Ok(())
            }
        }
    }

    /// Wraps a transport sink so the controller can talk to the producer.
    pub fn outbox<S: EnvelopeSink + 'static>(&self, sink: S) -> Box<dyn ControllerOutbox> {
        Box::new(EnvelopeOutbox {
            adapter: self.clone(),
            sink,
        })
    }
}

struct EnvelopeOutbox<S> {
    adapter: ControlChannelAdapter,
    sink: S,
}

impl<S: EnvelopeSink> ControllerOutbox for EnvelopeOutbox<S> {
    fn send(&mut self, message: ControllerMessage) {
        let envelope = self.adapter.encode(&message);
        if let Err(e) = self.sink.send_envelope(&envelope) {
            log::warn!("Could not deliver '{}' to the producer: {e}", envelope.event);
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    event: &str,
    data: serde_json::Value,
) -> Result<T, RecorderError> {
    serde_json::from_value(data)
        .map_err(|e| RecorderError::Transport(format!("bad payload for '{event}': {e}")))
}

fn to_value<T: Serialize>(payload: &T) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn adapter() -> ControlChannelAdapter {
        ControlChannelAdapter::default()
    }

    #[test]
    fn test_decode_start() {
        let message = adapter()
            .decode(Envelope::new("ssam:ffmpeg", json!({"fps": 30, "totalFrames": 90})))
            .unwrap();
        assert_eq!(
            message,
            ProducerMessage::StartSession {
                frame_rate: 30.0,
                total_frames_hint: Some(90),
            }
        );
    }

    #[test]
    fn test_decode_start_with_long_field_names() {
        let message = adapter()
            .decode(Envelope::new("ssam:ffmpeg", json!({"frameRate": 24.5})))
            .unwrap();
        assert_eq!(
            message,
            ProducerMessage::StartSession {
                frame_rate: 24.5,
                total_frames_hint: None,
            }
        );
    }

    #[test]
    fn test_decode_frame_and_done() {
        let message = adapter()
            .decode(Envelope::new(
                "ssam:ffmpeg-newframe",
                json!({"frame": 4, "image": "data:image/png;base64,AAAA"}),
            ))
            .unwrap();
        assert_eq!(
            message,
            ProducerMessage::SubmitFrame {
                sequence_index: 4,
                image_payload: "data:image/png;base64,AAAA".to_string(),
            }
        );

        let done = adapter()
            .decode(Envelope::new("ssam:ffmpeg-done", serde_json::Value::Null))
            .unwrap();
        assert_eq!(done, ProducerMessage::EndSession);
    }

    #[test]
    fn test_decode_rejects_unknown_event_and_bad_payload() {
        assert!(matches!(
            adapter().decode(Envelope::new("ssam:unknown", json!({}))),
            Err(RecorderError::Transport(_))
        ));
        assert!(matches!(
            adapter().decode(Envelope::new("ssam:ffmpeg", json!({"fps": "fast"}))),
            Err(RecorderError::Transport(_))
        ));
        assert!(matches!(
            adapter().decode(Envelope::new("ssam:ffmpeg-newframe", json!({"frame": 1}))),
            Err(RecorderError::Transport(_))
        ));
    }

    #[test]
    fn test_custom_prefix_only_matches_its_names() {
        let adapter = ControlChannelAdapter::with_prefix("sketch");
        assert!(adapter
            .decode(Envelope::new("sketch:ffmpeg-done", json!({})))
            .is_ok());
        assert!(adapter
            .decode(Envelope::new("ssam:ffmpeg-done", json!({})))
            .is_err());
    }

    #[test]
    fn test_encode_messages() {
        let adapter = adapter();
        assert_eq!(
            adapter.encode(&ControllerMessage::RequestFrame),
            Envelope::new("ssam:ffmpeg-reqframe", json!({}))
        );
        assert_eq!(
            adapter.encode(&ControllerMessage::progress("recording frame... 3")),
            Envelope::new("ssam:log", json!({"msg": "recording frame... 3"}))
        );
        assert_eq!(
            adapter.encode(&ControllerMessage::advisory("ffmpeg missing", true)),
            Envelope::new("ssam:warn", json!({"msg": "ffmpeg missing", "abort": true}))
        );
    }

    #[test]
    fn test_encode_completion_carries_totals() {
        let envelope = adapter().encode(&ControllerMessage::Completed {
            message: "done".to_string(),
            frames_written: 2,
            output_path: PathBuf::from("./out.mp4"),
        });
        assert_eq!(
            envelope,
            Envelope::new(
                "ssam:log",
                json!({"msg": "done", "framesWritten": 2, "outputPath": "./out.mp4"})
            )
        );
    }

    #[derive(Clone, Default)]
    struct CollectingSink(Arc<Mutex<Vec<Envelope>>>);

    impl EnvelopeSink for CollectingSink {
        fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), RecorderError> {
            self.0.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl EnvelopeSink for BrokenSink {
        fn send_envelope(&mut self, _envelope: &Envelope) -> Result<(), RecorderError> {
            Err(RecorderError::Transport("closed".to_string()))
        }
    }

    #[test]
    fn test_outbox_encodes_through_sink() {
        let sink = CollectingSink::default();
        let mut outbox = adapter().outbox(sink.clone());
        outbox.send(ControllerMessage::RequestFrame);
        let sent = sink.0.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, "ssam:ffmpeg-reqframe");
    }

    #[test]
    fn test_outbox_swallows_transport_errors() {
        let mut outbox = adapter().outbox(BrokenSink);
        outbox.send(ControllerMessage::progress("lost"));
    }
}
