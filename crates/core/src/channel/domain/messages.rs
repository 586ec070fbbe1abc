use std::path::PathBuf;

/// Requests a producer sends to the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum ProducerMessage {
    StartSession {
        frame_rate: f64,
        total_frames_hint: Option<usize>,
    },
    SubmitFrame {
        sequence_index: u64,
        image_payload: String,
    },
    EndSession,
}

/// Notifications the controller sends back to the producer.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerMessage {
    /// Credit granted: exactly one frame may be submitted.
    RequestFrame,
    /// Informational log line.
    Progress { message: String },
    /// Session finished cleanly and the output file is complete.
    Completed {
        message: String,
        frames_written: usize,
        output_path: PathBuf,
    },
    /// Capability or runtime warning. `fatal` means the controller is unavailable.
    Advisory { message: String, fatal: bool },
}

impl ControllerMessage {
    pub fn progress(message: impl Into<String>) -> Self {
        ControllerMessage::Progress {
            message: message.into(),
        }
    }

    pub fn advisory(message: impl Into<String>, fatal: bool) -> Self {
        ControllerMessage::Advisory {
            message: message.into(),
            fatal,
        }
    }
}
