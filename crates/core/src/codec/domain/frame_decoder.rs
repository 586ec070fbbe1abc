use crate::shared::error::DecodeError;
use crate::shared::frame::Frame;

/// Turns a producer's inline image payload into the bytes the encoder reads.
pub trait FrameDecoder: Send {
    fn decode(&self, sequence_index: u64, payload: &str) -> Result<Frame, DecodeError>;
}
