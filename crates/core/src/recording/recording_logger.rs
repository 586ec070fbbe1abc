use std::collections::BTreeMap;
use std::time::Instant;

use crate::shared::constants::PROGRESS_LOG_EVERY;

/// Cross-cutting logger for recording sessions.
///
/// Lets the controller report progress and per-frame timings without
/// knowing whether anyone is listening.
pub trait RecordingLogger: Send {
    /// Report how many frames have reached the encoder so far.
    fn progress(&mut self, current: usize, total: Option<usize>);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. frame size).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}

    /// Forget everything recorded for the previous session.
    fn reset(&mut self) {}
}

/// Silent logger that discards all events.
pub struct NullRecordingLogger;

impl RecordingLogger for NullRecordingLogger {
    fn progress(&mut self, _current: usize, _total: Option<usize>) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and peak of one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Tally {
    count: u64,
    total: f64,
    peak: f64,
}

impl Tally {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.peak = self.peak.max(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// `log`-backed logger that keeps running tallies per stage and metric, so
/// memory stays flat however long a recording runs.
///
/// Progress lines are throttled to one every `throttle_frames` frames.
pub struct LogRecordingLogger {
    throttle_frames: usize,
    stages: BTreeMap<String, Tally>,
    metrics: BTreeMap<String, Tally>,
    started: Instant,
    frames: usize,
}

impl LogRecordingLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames: 0,
        }
    }

    /// End-of-session report, or `None` when nothing was measured.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let wall_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut out = format!(
            "Session report: {} frames in {:.1}s",
            self.frames,
            wall_ms / 1000.0
        );

        for (stage, tally) in &self.stages {
            let share = if wall_ms > 0.0 {
                tally.total / wall_ms * 100.0
            } else {
                0.0
            };
            out.push_str(&format!(
                "\n  {stage:<8} mean {:6.1}ms  peak {:6.1}ms  sum {:7.0}ms  {share:4.1}% of wall",
                tally.mean(),
                tally.peak,
                tally.total,
            ));
        }
        for (name, tally) in &self.metrics {
            out.push_str(&format!(
                "\n  {name:<8} mean {:.1}  peak {:.1}",
                tally.mean(),
                tally.peak
            ));
        }
        if self.frames > 0 && wall_ms > 0.0 {
            out.push_str(&format!(
                "\n  rate     {:.1} fps",
                self.frames as f64 * 1000.0 / wall_ms
            ));
        }
        Some(out)
    }
}

impl Default for LogRecordingLogger {
    fn default() -> Self {
        Self::new(PROGRESS_LOG_EVERY)
    }
}

impl RecordingLogger for LogRecordingLogger {
    fn progress(&mut self, current: usize, total: Option<usize>) {
        self.frames = current;
        let due = current % self.throttle_frames == 0;
        match total.filter(|&t| t > 0) {
            Some(total) if due || current == total => log::info!(
                "Wrote frame {current} of {total} ({:.0}%)",
                current as f64 * 100.0 / total as f64
            ),
            None if due => log::info!("Wrote frame {current}"),
            _ => {}
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages.entry(stage.to_owned()).or_default().add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_owned()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(report) = self.summary_string() {
            log::info!("{report}");
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.throttle_frames);
    }
}
