use crossbeam_channel::Sender;

use crate::shared::error::RecorderError;

/// Which of the encoder's side channels a diagnostic line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticStream {
    Stdout,
    Stderr,
}

/// How the encoder process ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Asynchronous notification from an encoder process back to the controller.
#[derive(Debug)]
pub enum EncoderEvent {
    /// The previously queued buffer was fully accepted by the pipe, or failed.
    WriteCompleted {
        session_id: u64,
        result: Result<usize, RecorderError>,
    },
    /// The process is gone. `Err` carries a finish timeout or a wait failure.
    Exited {
        session_id: u64,
        result: Result<ExitReport, RecorderError>,
    },
    /// One line drained from stdout or stderr.
    Diagnostic {
        session_id: u64,
        stream: DiagnosticStream,
        line: String,
    },
}

impl EncoderEvent {
    pub fn session_id(&self) -> u64 {
        match self {
            EncoderEvent::WriteCompleted { session_id, .. }
            | EncoderEvent::Exited { session_id, .. }
            | EncoderEvent::Diagnostic { session_id, .. } => *session_id,
        }
    }
}

/// Session-tagged handle the encoder threads use to report back.
///
/// Sends never block and are dropped silently once the controller has gone
/// away; there is nobody left to tell.
#[derive(Clone, Debug)]
pub struct EncoderEventSink {
    session_id: u64,
    tx: Sender<EncoderEvent>,
}

impl EncoderEventSink {
    pub fn new(session_id: u64, tx: Sender<EncoderEvent>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn write_completed(&self, result: Result<usize, RecorderError>) {
        let _ = self.tx.send(EncoderEvent::WriteCompleted {
            session_id: self.session_id,
            result,
        });
    }

    pub fn exited(&self, result: Result<ExitReport, RecorderError>) {
        let _ = self.tx.send(EncoderEvent::Exited {
            session_id: self.session_id,
            result,
        });
    }

    pub fn diagnostic(&self, stream: DiagnosticStream, line: String) {
        let _ = self.tx.send(EncoderEvent::Diagnostic {
            session_id: self.session_id,
            stream,
            line,
        });
    }
}
