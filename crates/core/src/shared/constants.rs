use std::time::Duration;

pub const DEFAULT_ENCODER_PROGRAM: &str = "ffmpeg";
pub const DEFAULT_OUTPUT_PATH: &str = "./out.mp4";

/// Prefix of every control message name on the wire (`ssam:ffmpeg`, ...).
pub const DEFAULT_MESSAGE_PREFIX: &str = "ssam";

/// Highest frame rate a session may ask for.
pub const MAX_FRAME_RATE: f64 = 1000.0;

/// Upper bound on waiting for the encoder to flush and exit after stdin closes.
pub const DEFAULT_FINISH_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the process monitor checks whether the encoder has exited.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Progress lines are logged every Nth written frame.
pub const PROGRESS_LOG_EVERY: usize = 30;
