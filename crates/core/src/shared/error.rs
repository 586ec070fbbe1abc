use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why an inline image payload could not be turned into frame bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload has no ',' between header and body")]
    MissingSeparator,
    #[error("malformed data URL header: {0}")]
    MalformedHeader(String),
    #[error("payload body is not base64 encoded (header: {0})")]
    NotBase64(String),
    #[error("base64 body length {0} is not a multiple of 4")]
    InvalidLength(usize),
    #[error("invalid base64 body: {0}")]
    InvalidBase64(String),
    #[error("payload body is empty")]
    Empty,
    #[error("header declares {declared} but payload bytes look like {detected}")]
    FormatMismatch { declared: String, detected: String },
}

/// Every failure the recorder can surface to a producer.
///
/// None of these terminate the hosting process; the controller funnels them
/// into advisory messages and log records.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("encoder unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("not ready: {0}")]
    NotReady(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("could not decode frame: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to spawn encoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write frame to encoder: {0}")]
    Write(#[source] io::Error),
    #[error("encoder did not exit within {0:?} and was terminated")]
    FinishTimeout(Duration),
    #[error("encoder exited with {0}")]
    EncoderFailed(String),
    #[error("control channel error: {0}")]
    Transport(String),
}

impl RecorderError {
    /// True for failures caused by the producer misusing the protocol.
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            RecorderError::NotReady(_) | RecorderError::ProtocolViolation(_)
        )
    }
}
