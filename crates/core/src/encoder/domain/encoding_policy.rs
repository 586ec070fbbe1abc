use serde::{Deserialize, Serialize};

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
pub const DEFAULT_PRESET: &str = "slow";
pub const DEFAULT_CRF: u32 = 18;

/// Fixed output settings passed through to the encoder for every session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingPolicy {
    pub video_codec: String,
    pub pixel_format: String,
    pub preset: String,
    /// Constant rate factor (0 = lossless, 51 = worst).
    pub crf: u32,
    /// Move the index to the front of the file so it plays while downloading.
    pub faststart: bool,
    /// Ask the encoder to write its own report file next to the working directory.
    pub report: bool,
}

impl Default for EncodingPolicy {
    fn default() -> Self {
        Self {
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            faststart: true,
            report: false,
        }
    }
}
