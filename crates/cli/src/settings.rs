use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framepipe_core::encoder::domain::encoding_policy::EncodingPolicy;
use framepipe_core::recording::streaming_controller::ControllerSettings;
use framepipe_core::shared::constants::{
    DEFAULT_ENCODER_PROGRAM, DEFAULT_FINISH_TIMEOUT, DEFAULT_MESSAGE_PREFIX, DEFAULT_OUTPUT_PATH,
};
use framepipe_core::shared::session_config::InputFormat;

/// Persistent defaults; every field can be overridden on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ffmpeg: PathBuf,
    pub output: PathBuf,
    pub input_format: InputFormat,
    pub finish_timeout_secs: u64,
    pub message_prefix: String,
    pub encoding: EncodingPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from(DEFAULT_ENCODER_PROGRAM),
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            input_format: InputFormat::Png,
            finish_timeout_secs: DEFAULT_FINISH_TIMEOUT.as_secs(),
            message_prefix: DEFAULT_MESSAGE_PREFIX.to_string(),
            encoding: EncodingPolicy::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("framepipe").join("settings.json"))
    }

    /// Loads the user's settings file, falling back to defaults when there is none.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// A missing file means defaults; an unreadable or invalid one is an error.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("Cannot read {}: {e}", path.display()).into()),
        };
        serde_json::from_str(&json)
            .map_err(|e| format!("Invalid settings in {}: {e}", path.display()).into())
    }

    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.encoding.crf > 51 {
            return Err(format!("CRF must be between 0 and 51, got {}", self.encoding.crf).into());
        }
        if self.finish_timeout_secs == 0 {
            return Err("Finish timeout must be at least one second".into());
        }
        if self.message_prefix.trim().is_empty() {
            return Err("Message prefix must not be empty".into());
        }
        if self.output.as_os_str().is_empty() {
            return Err("Output path must not be empty".into());
        }
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            output_path: self.output.clone(),
            input_format: self.input_format,
            policy: self.encoding.clone(),
            finish_timeout: Duration::from_secs(self.finish_timeout_secs),
        }
    }
}
