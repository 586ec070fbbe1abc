use std::time::{Duration, Instant};

use crate::shared::session_config::SessionConfig;

/// One start-to-finish recording run.
#[derive(Debug)]
pub struct Session {
    id: u64,
    config: SessionConfig,
    frames_written: usize,
    started_at: Instant,
}

impl Session {
    pub fn new(id: u64, config: SessionConfig) -> Self {
        Self {
            id,
            config,
            frames_written: 0,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn record_frame_written(&mut self) -> usize {
        self.frames_written += 1;
        self.frames_written
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
