use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::encoder::domain::encoder_event::{DiagnosticStream, EncoderEventSink, ExitReport};
use crate::encoder::domain::encoder_process::EncoderProcess;
use crate::shared::constants::EXIT_POLL_INTERVAL;
use crate::shared::error::RecorderError;

use super::diagnostics_drain::spawn_drain;

/// Encoder child process fed through its stdin pipe.
///
/// Thread layout: a writer that owns stdin and takes one buffer at a time,
/// one drain per diagnostic stream, and a monitor that owns the `Child`,
/// reports its exit, enforces the finish deadline and reaps it on drop.
pub struct FfmpegProcess {
    pid: u32,
    program: String,
    frames_tx: Option<Sender<Vec<u8>>>,
    finish_tx: Option<Sender<Duration>>,
    busy: Arc<AtomicBool>,
}

impl FfmpegProcess {
    /// Spawns `command` with all three standard streams piped.
    pub fn spawn(mut command: Command, events: EncoderEventSink) -> Result<Self, RecorderError> {
        let program = command.get_program().to_string_lossy().into_owned();

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep terminal interrupts away from the encoder; it is stopped by
        // closing stdin so the output file gets finalized.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| RecorderError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();

        let streams = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (stdin, stdout, stderr) = match streams {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                kill_and_reap(&mut child);
                return Err(RecorderError::Spawn {
                    program,
                    source: std::io::Error::other("standard streams were not captured"),
                });
            }
        };

        let busy = Arc::new(AtomicBool::new(false));
        let (frames_tx, frames_rx) = crossbeam_channel::bounded::<Vec<u8>>(1);
        let (finish_tx, finish_rx) = crossbeam_channel::bounded::<Duration>(1);

        spawn_writer(stdin, frames_rx, busy.clone(), events.clone());
        let drains = vec![
            spawn_drain(stdout, DiagnosticStream::Stdout, events.clone()),
            spawn_drain(stderr, DiagnosticStream::Stderr, events.clone()),
        ];
        spawn_monitor(child, drains, finish_rx, events, program.clone());

        log::info!("Spawned encoder '{program}' with PID {pid}");

        Ok(Self {
            pid,
            program,
            frames_tx: Some(frames_tx),
            finish_tx: Some(finish_tx),
            busy,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl EncoderProcess for FfmpegProcess {
    fn write(&mut self, bytes: Vec<u8>) -> Result<(), RecorderError> {
        let frames_tx = self.frames_tx.as_ref().ok_or_else(|| {
            RecorderError::ProtocolViolation("encoder input is already closed".to_string())
        })?;

        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(RecorderError::ProtocolViolation(
                "previous frame is still being written".to_string(),
            ));
        }

        if frames_tx.send(bytes).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(RecorderError::Write(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        Ok(())
    }

    fn finish(&mut self, timeout: Duration) -> Result<(), RecorderError> {
        // Dropping the sender lets the writer drain its pending buffer and
        // then drop stdin, which is the encoder's end-of-stream.
        self.frames_tx.take();
        match self.finish_tx.take() {
            Some(tx) => {
                let _ = tx.send(timeout);
                log::debug!("Closed stdin of encoder PID {}", self.pid);
                Ok(())
            }
            None => Err(RecorderError::ProtocolViolation(
                "encoder already finishing".to_string(),
            )),
        }
    }

    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }
}

fn spawn_writer(
    mut stdin: ChildStdin,
    frames_rx: Receiver<Vec<u8>>,
    busy: Arc<AtomicBool>,
    events: EncoderEventSink,
) {
    std::thread::spawn(move || {
        for bytes in frames_rx {
            let result = stdin
                .write_all(&bytes)
                .and_then(|_| stdin.flush())
                .map(|_| bytes.len())
                .map_err(RecorderError::Write);
            let failed = result.is_err();
            busy.store(false, Ordering::Release);
            events.write_completed(result);
            if failed {
                break;
            }
        }
    });
}

fn spawn_monitor(
    child: Child,
    drains: Vec<JoinHandle<()>>,
    finish_rx: Receiver<Duration>,
    events: EncoderEventSink,
    program: String,
) {
    std::thread::spawn(move || monitor(child, drains, finish_rx, events, &program));
}

/// Polls the child until it exits, the finish deadline passes, or the handle
/// is dropped without finishing (then the process is killed and reaped).
fn monitor(
    mut child: Child,
    drains: Vec<JoinHandle<()>>,
    finish_rx: Receiver<Duration>,
    events: EncoderEventSink,
    program: &str,
) {
    let mut deadline: Option<(Instant, Duration)> = None;
    let mut abandoned = false;

    let result = loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                break Ok(ExitReport {
                    code: status.code(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("Failed to poll encoder '{program}': {e}");
                kill_and_reap(&mut child);
                break Err(RecorderError::EncoderFailed(format!("unknown status ({e})")));
            }
        }

        if let Some((at, timeout)) = deadline {
            if Instant::now() >= at {
                log::warn!("Encoder '{program}' did not exit within {timeout:?}, killing it");
                kill_and_reap(&mut child);
                break Err(RecorderError::FinishTimeout(timeout));
            }
        }

        if abandoned {
            std::thread::sleep(EXIT_POLL_INTERVAL);
            continue;
        }

        match finish_rx.recv_timeout(EXIT_POLL_INTERVAL) {
            Ok(timeout) => {
                deadline.get_or_insert((Instant::now() + timeout, timeout));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if deadline.is_none() {
                    log::warn!("Encoder handle for '{program}' dropped while running, killing");
                    kill_and_reap(&mut child);
                    break Err(RecorderError::EncoderFailed(
                        "termination after its handle was dropped".to_string(),
                    ));
                }
                abandoned = true;
            }
        }
    };

    // Drains hit EOF once the process is gone; joining them makes sure every
    // diagnostic line is delivered before the exit notification.
    for handle in drains {
        let _ = handle.join();
    }

    match &result {
        Ok(report) => log::info!("Encoder '{program}' exited with {}", report.describe()),
        Err(e) => log::warn!("Encoder '{program}' ended abnormally: {e}"),
    }
    events.exited(result);
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::encoder::domain::encoder_event::EncoderEvent;

    const WAIT: Duration = Duration::from_secs(10);

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    fn spawn(script: &str) -> (FfmpegProcess, Receiver<EncoderEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let process = FfmpegProcess::spawn(shell(script), EncoderEventSink::new(1, tx)).unwrap();
        (process, rx)
    }

    /// Waits for the next non-diagnostic event.
    fn next_event(rx: &Receiver<EncoderEvent>) -> EncoderEvent {
        loop {
            match rx.recv_timeout(WAIT).expect("timed out waiting for encoder event") {
                EncoderEvent::Diagnostic { .. } => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_write_then_finish_produces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let (mut process, rx) = spawn(&format!("cat > '{}'", path.display()));

        process.write(b"hello ".to_vec()).unwrap();
        assert!(matches!(
            next_event(&rx),
            EncoderEvent::WriteCompleted { result: Ok(6), .. }
        ));
        process.write(b"world".to_vec()).unwrap();
        assert!(matches!(
            next_event(&rx),
            EncoderEvent::WriteCompleted { result: Ok(5), .. }
        ));

        process.finish(WAIT).unwrap();
        match next_event(&rx) {
            EncoderEvent::Exited { result, .. } => assert!(result.unwrap().success()),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_second_write_before_completion_is_rejected() {
        let (mut process, rx) = spawn("sleep 1; cat > /dev/null");
        process.write(vec![0u8; 1024 * 1024]).unwrap();
        let second = process.write(vec![1u8; 16]);
        assert!(matches!(second, Err(RecorderError::ProtocolViolation(_))));
        assert!(matches!(
            next_event(&rx),
            EncoderEvent::WriteCompleted { result: Ok(_), .. }
        ));
        process.finish(WAIT).unwrap();
    }

    #[test]
    fn test_diagnostics_are_forwarded() {
        let (mut process, rx) = spawn("echo progress line >&2; cat > /dev/null");
        process.finish(WAIT).unwrap();

        let mut lines = Vec::new();
        loop {
            match rx.recv_timeout(WAIT).unwrap() {
                EncoderEvent::Diagnostic { stream, line, .. } => {
                    assert_eq!(stream, DiagnosticStream::Stderr);
                    lines.push(line);
                }
                EncoderEvent::Exited { .. } => break,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(lines, vec!["progress line"]);
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let (mut process, rx) = spawn("cat > /dev/null; exit 3");
        process.finish(WAIT).unwrap();
        match next_event(&rx) {
            EncoderEvent::Exited { result, .. } => {
                assert_eq!(result.unwrap(), ExitReport { code: Some(3) })
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_finish_timeout_kills_process() {
        let (mut process, rx) = spawn("exec sleep 30");
        process.finish(Duration::from_millis(100)).unwrap();
        match next_event(&rx) {
            EncoderEvent::Exited { result, .. } => {
                assert!(matches!(result, Err(RecorderError::FinishTimeout(_))))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_exit_is_reported_without_finish() {
        let (_process, rx) = spawn("exit 0");
        match next_event(&rx) {
            EncoderEvent::Exited { result, .. } => assert!(result.unwrap().success()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_write_after_exit_fails() {
        let (mut process, rx) = spawn("exit 0");
        assert!(matches!(next_event(&rx), EncoderEvent::Exited { .. }));

        process.write(vec![0u8; 1024 * 1024]).unwrap();
        match next_event(&rx) {
            EncoderEvent::WriteCompleted { result, .. } => {
                assert!(matches!(result, Err(RecorderError::Write(_))))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_dropped_handle_reaps_process() {
        let (process, rx) = spawn("exec sleep 30");
        drop(process);
        match next_event(&rx) {
            EncoderEvent::Exited { result, .. } => assert!(result.is_err()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_finish_twice_is_rejected() {
        let (mut process, _rx) = spawn("cat > /dev/null");
        process.finish(WAIT).unwrap();
        assert!(process.finish(WAIT).is_err());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let result = FfmpegProcess::spawn(
            Command::new("/nonexistent/encoder-binary"),
            EncoderEventSink::new(1, tx),
        );
        assert!(matches!(result, Err(RecorderError::Spawn { .. })));
    }
}
