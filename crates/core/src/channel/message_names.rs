use crate::shared::constants::DEFAULT_MESSAGE_PREFIX;

/// Wire names of the six control messages, all sharing one prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageNames {
    pub start: String,
    pub submit_frame: String,
    pub end: String,
    pub request_frame: String,
    pub log: String,
    pub warn: String,
}

impl MessageNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            start: format!("{prefix}:ffmpeg"),
            submit_frame: format!("{prefix}:ffmpeg-newframe"),
            end: format!("{prefix}:ffmpeg-done"),
            request_frame: format!("{prefix}:ffmpeg-reqframe"),
            log: format!("{prefix}:log"),
            warn: format!("{prefix}:warn"),
        }
    }
}

impl Default for MessageNames {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_MESSAGE_PREFIX)
    }
}
