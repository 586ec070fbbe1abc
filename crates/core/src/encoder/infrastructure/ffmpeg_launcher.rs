use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::encoder::domain::encoder_event::EncoderEventSink;
use crate::encoder::domain::encoder_launcher::EncoderLauncher;
use crate::encoder::domain::encoder_process::EncoderProcess;
use crate::shared::constants::DEFAULT_ENCODER_PROGRAM;
use crate::shared::error::RecorderError;
use crate::shared::session_config::SessionConfig;

use super::ffmpeg_process::FfmpegProcess;

/// Launches the ffmpeg binary reading an `image2pipe` stream from stdin.
pub struct FfmpegLauncher {
    program: PathBuf,
}

impl FfmpegLauncher {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENCODER_PROGRAM),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderLauncher for FfmpegLauncher {
    fn probe(&self) -> Result<String, RecorderError> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                RecorderError::CapabilityUnavailable(format!(
                    "{} could not be run: {e}",
                    self.program_name()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecorderError::CapabilityUnavailable(format!(
                "{} -version failed: {}",
                self.program_name(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    fn spawn(
        &self,
        config: &SessionConfig,
        events: EncoderEventSink,
    ) -> Result<Box<dyn EncoderProcess>, RecorderError> {
        let args = build_args(config);
        log::debug!("{} {}", self.program_name(), args.join(" "));

        let mut command = Command::new(&self.program);
        command.args(&args);
        Ok(Box::new(FfmpegProcess::spawn(command, events)?))
    }
}

/// Command line for one recording: piped stills in, one finished file out.
pub fn build_args(config: &SessionConfig) -> Vec<String> {
    let fps = config.frame_rate_arg();
    let crf = config.policy.crf.to_string();
    let policy = &config.policy;

    let mut args: Vec<&str> = vec![
        "-y",
        "-f",
        "image2pipe",
        "-framerate",
        &fps,
        "-c:v",
        config.input_format.encoder_codec(),
        "-i",
        "-",
        "-c:v",
        &policy.video_codec,
        "-pix_fmt",
        &policy.pixel_format,
        "-preset",
        &policy.preset,
        "-crf",
        &crf,
        "-r",
        &fps,
    ];
    if policy.faststart {
        args.extend(["-movflags", "+faststart"]);
    }
    if policy.report {
        args.push("-report");
    }

    let mut args: Vec<String> = args.into_iter().map(String::from).collect();
    args.push(config.output_path.display().to_string());
    args
}
