use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoder::domain::encoding_policy::EncodingPolicy;

/// Container format of the still images the producer streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Png,
    Jpeg,
}

impl InputFormat {
    /// Decoder name the encoder uses for an `image2pipe` input of this format.
    pub fn encoder_codec(self) -> &'static str {
        match self {
            InputFormat::Png => "png",
            InputFormat::Jpeg => "mjpeg",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Png => write!(f, "png"),
            InputFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(InputFormat::Png),
            "jpeg" | "jpg" => Ok(InputFormat::Jpeg),
            other => Err(format!("unsupported input format '{other}', expected png or jpeg")),
        }
    }
}

/// Everything the encoder needs to know when a recording starts.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub frame_rate: f64,
    /// Advisory only; used for progress percentages.
    pub total_frames_hint: Option<usize>,
    pub output_path: PathBuf,
    pub input_format: InputFormat,
    pub policy: EncodingPolicy,
}

impl SessionConfig {
    /// Frame rate rendered the way the encoder's command line expects it:
    /// whole numbers without a fractional part.
    pub fn frame_rate_arg(&self) -> String {
        if self.frame_rate.fract() == 0.0 {
            format!("{}", self.frame_rate as u64)
        } else {
            format!("{}", self.frame_rate)
        }
    }
}
