use crate::encoder::domain::encoder_event::EncoderEventSink;
use crate::encoder::domain::encoder_process::EncoderProcess;
use crate::shared::error::RecorderError;
use crate::shared::session_config::SessionConfig;

/// Abstracts discovery and spawning of the external encoder so the
/// controller can be driven without a real binary.
pub trait EncoderLauncher: Send {
    /// Checks that the encoder can run at all. Returns its version banner.
    fn probe(&self) -> Result<String, RecorderError>;

    fn spawn(
        &self,
        config: &SessionConfig,
        events: EncoderEventSink,
    ) -> Result<Box<dyn EncoderProcess>, RecorderError>;
}
