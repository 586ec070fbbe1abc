use std::time::Duration;

use crate::shared::error::RecorderError;

/// A running encoder that accepts one buffer at a time on its input pipe.
///
/// Completion of `write` and the eventual process exit are reported
/// asynchronously through the `EncoderEventSink` handed over at spawn.
pub trait EncoderProcess: Send {
    /// Queues `bytes` for the input pipe. Returns an error immediately if the
    /// previous write has not completed yet or the pipe is already closed.
    fn write(&mut self, bytes: Vec<u8>) -> Result<(), RecorderError>;

    /// Closes the input pipe once any pending write has drained and waits up
    /// to `timeout` for the process to exit, killing it afterwards.
    fn finish(&mut self, timeout: Duration) -> Result<(), RecorderError>;

    /// OS process id, for diagnostics.
    fn id(&self) -> Option<u32> {
        None
    }
}
