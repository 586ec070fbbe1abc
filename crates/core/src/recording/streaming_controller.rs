use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::channel::domain::controller_outbox::{ControllerOutbox, NullOutbox};
use crate::channel::domain::messages::ControllerMessage;
use crate::codec::domain::frame_decoder::FrameDecoder;
use crate::encoder::domain::encoder_event::{EncoderEvent, EncoderEventSink, ExitReport};
use crate::encoder::domain::encoder_launcher::EncoderLauncher;
use crate::encoder::domain::encoder_process::EncoderProcess;
use crate::encoder::domain::encoding_policy::EncodingPolicy;
use crate::shared::constants::{DEFAULT_FINISH_TIMEOUT, DEFAULT_OUTPUT_PATH, MAX_FRAME_RATE};
use crate::shared::error::RecorderError;
use crate::shared::session_config::{InputFormat, SessionConfig};

use super::credit_gate::{CreditGate, GateState};
use super::recording_logger::{LogRecordingLogger, RecordingLogger};
use super::session::Session;

/// Host-side settings that apply to every session the controller runs.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerSettings {
    pub output_path: PathBuf,
    pub input_format: InputFormat,
    pub policy: EncodingPolicy,
    pub finish_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            input_format: InputFormat::Png,
            policy: EncodingPolicy::default(),
            finish_timeout: DEFAULT_FINISH_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Probing,
    /// The encoder probe failed. Terminal for this controller.
    Unavailable,
    Ready,
    Recording,
    Finishing,
}

struct InFlightFrame {
    sequence_index: u64,
    started: Instant,
}

struct ActiveSession {
    session: Session,
    process: Box<dyn EncoderProcess>,
    gate: CreditGate,
    in_flight: Option<InFlightFrame>,
    finish_pending: bool,
    failure: Option<String>,
}

/// Streams producer frames into one encoder process at a time.
///
/// Flow control is a single credit: the producer is asked for a frame, the
/// frame is written, and only when the write has completed is the next frame
/// requested. Frames arriving without credit are dropped.
///
/// All methods take `&mut self`; encoder threads report back through the
/// channel returned by [`StreamingController::encoder_events`], which the
/// owner feeds into [`StreamingController::handle_encoder_event`].
pub struct StreamingController {
    launcher: Box<dyn EncoderLauncher>,
    decoder: Box<dyn FrameDecoder>,
    outbox: Box<dyn ControllerOutbox>,
    logger: Box<dyn RecordingLogger>,
    settings: ControllerSettings,
    state: ControllerState,
    encoder_version: Option<String>,
    unavailable_reason: Option<String>,
    active: Option<ActiveSession>,
    next_session_id: u64,
    events_tx: Sender<EncoderEvent>,
    events_rx: Receiver<EncoderEvent>,
}

impl StreamingController {
    pub fn new(
        launcher: Box<dyn EncoderLauncher>,
        decoder: Box<dyn FrameDecoder>,
        settings: ControllerSettings,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            launcher,
            decoder,
            outbox: Box::new(NullOutbox),
            logger: Box::new(LogRecordingLogger::default()),
            settings,
            state: ControllerState::Uninitialized,
            encoder_version: None,
            unavailable_reason: None,
            active: None,
            next_session_id: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn RecordingLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// First line of the encoder's version banner, once probed successfully.
    pub fn encoder_version(&self) -> Option<&str> {
        self.encoder_version.as_deref()
    }

    pub fn has_active_session(&self) -> bool {
        self.active.is_some()
    }

    /// Frames fully written in the current session.
    pub fn frames_written(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.session.frames_written())
    }

    /// Receiving end for events posted by encoder threads.
    pub fn encoder_events(&self) -> Receiver<EncoderEvent> {
        self.events_rx.clone()
    }

    /// Probes the encoder once. A failed probe leaves the controller
    /// unavailable for good.
    pub fn attach(&mut self) -> Result<(), RecorderError> {
        if self.state != ControllerState::Uninitialized {
            return Ok(());
        }
        self.state = ControllerState::Probing;

        match self.launcher.probe() {
            Ok(version) => {
                log::info!("Encoder available: {version}");
                self.encoder_version = Some(version);
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => {
                log::error!("Recording disabled: {e}");
                self.unavailable_reason = Some(e.to_string());
                self.state = ControllerState::Unavailable;
                self.send_unavailable_advisory();
                Err(e)
            }
        }
    }

    /// Routes producer-bound messages to a new caller.
    pub fn connect(&mut self, outbox: Box<dyn ControllerOutbox>) {
        self.outbox = outbox;
        if self.state == ControllerState::Unavailable {
            self.send_unavailable_advisory();
        }
    }

    /// Stops sending messages to the current caller.
    pub fn disconnect(&mut self) {
        self.outbox = Box::new(NullOutbox);
    }

    pub fn start_session(
        &mut self,
        frame_rate: f64,
        total_frames_hint: Option<usize>,
    ) -> Result<(), RecorderError> {
        match self.state {
            ControllerState::Ready => {}
            ControllerState::Unavailable => {
                self.send_unavailable_advisory();
                return Err(RecorderError::NotReady(format!(
                    "encoder unavailable ({})",
                    self.unavailable_reason.as_deref().unwrap_or("probe failed")
                )));
            }
            ControllerState::Recording | ControllerState::Finishing => {
                return Err(self.reject(RecorderError::NotReady(
                    "a recording is already in progress".to_string(),
                )));
            }
            ControllerState::Uninitialized | ControllerState::Probing => {
                return Err(self.reject(RecorderError::NotReady(
                    "encoder has not been probed yet".to_string(),
                )));
            }
        }

        if !frame_rate.is_finite() || frame_rate <= 0.0 || frame_rate > MAX_FRAME_RATE {
            return Err(self.reject(RecorderError::ProtocolViolation(format!(
                "invalid frame rate {frame_rate}"
            ))));
        }

        let config = SessionConfig {
            frame_rate,
            total_frames_hint,
            output_path: self.settings.output_path.clone(),
            input_format: self.settings.input_format,
            policy: self.settings.policy.clone(),
        };

        self.next_session_id += 1;
        let session_id = self.next_session_id;
        let sink = EncoderEventSink::new(session_id, self.events_tx.clone());
        let process = match self.launcher.spawn(&config, sink) {
            Ok(process) => process,
            Err(e) => {
                log::error!("Could not start recording: {e}");
                return Err(self.reject(e));
            }
        };

        log::info!(
            "Session {session_id} recording with encoder pid {}",
            process
                .id()
                .map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
        );
        let started = format!(
            "recording started: {} fps -> {}",
            config.frame_rate_arg(),
            config.output_path.display()
        );
        self.logger.reset();
        self.logger.info(&started);

        let mut gate = CreditGate::new();
        gate.grant();
        self.active = Some(ActiveSession {
            session: Session::new(session_id, config),
            process,
            gate,
            in_flight: None,
            finish_pending: false,
            failure: None,
        });
        self.state = ControllerState::Recording;

        self.outbox.send(ControllerMessage::progress(started));
        self.outbox.send(ControllerMessage::RequestFrame);
        Ok(())
    }

    /// Accepts one frame if the producer holds a credit; drops it otherwise.
    pub fn submit_frame(&mut self, sequence_index: u64, payload: &str) -> Result<(), RecorderError> {
        let Some(active) = self.active.as_mut() else {
            let err = RecorderError::ProtocolViolation("no recording in progress".to_string());
            log::warn!("Dropping frame {sequence_index}: {err}");
            return Err(err);
        };
        if let Err(e) = active.gate.acquire() {
            log::warn!("Dropping frame {sequence_index}: {e}");
            return Err(e);
        }

        let started = Instant::now();
        let frame = match self.decoder.decode(sequence_index, payload) {
            Ok(frame) => frame,
            Err(e) => {
                active.gate.refund();
                let err = RecorderError::from(e);
                log::warn!("Dropping frame {sequence_index}: {err}");
                self.outbox.send(ControllerMessage::advisory(
                    format!("frame {sequence_index} dropped: {err}"),
                    false,
                ));
                self.outbox.send(ControllerMessage::RequestFrame);
                return Err(err);
            }
        };
        self.logger.timing("decode", elapsed_ms(started));
        self.logger.metric("frame_kb", frame.len() as f64 / 1024.0);

        match active.process.write(frame.into_data()) {
            Ok(()) => {
                active.in_flight = Some(InFlightFrame {
                    sequence_index,
                    started: Instant::now(),
                });
                Ok(())
            }
            Err(e) => {
                active.gate.complete();
                log::error!("Could not hand frame {sequence_index} to the encoder: {e}");
                self.abort(e.to_string());
                Err(e)
            }
        }
    }

    /// Reports a control message that could not be read.
    pub fn reject_message(&mut self, err: RecorderError) -> RecorderError {
        self.reject(err)
    }

    /// Reports a frame message that could not be read. The producer spent its
    /// request on it, so the outstanding credit is offered again.
    pub fn reject_frame(&mut self, err: RecorderError) -> RecorderError {
        let armed = self
            .active
            .as_ref()
            .is_some_and(|a| a.gate.state() == GateState::Armed);
        log::warn!("Dropping unreadable frame: {err}");
        if !armed {
            return err;
        }
        self.outbox.send(ControllerMessage::advisory(
            format!("frame dropped: {err}"),
            false,
        ));
        self.outbox.send(ControllerMessage::RequestFrame);
        err
    }

    /// Closes the encoder input once the frame in flight (if any) is written.
    pub fn end_session(&mut self) {
        match self.state {
            ControllerState::Recording => {}
            ControllerState::Finishing => {
                log::debug!("End of recording requested again while finishing");
                return;
            }
            _ => {
                self.outbox
                    .send(ControllerMessage::progress("no recording in progress"));
                return;
            }
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.in_flight.is_some() {
            if !active.finish_pending {
                log::debug!("Deferring finish until the frame in flight is written");
                active.finish_pending = true;
            }
            return;
        }
        self.begin_finishing();
    }

    pub fn handle_encoder_event(&mut self, event: EncoderEvent) {
        let current = self.active.as_ref().map(|a| a.session.id());
        if current != Some(event.session_id()) {
            match event {
                EncoderEvent::Diagnostic { line, .. } => log::trace!("[encoder, stale] {line}"),
                other => log::debug!("Ignoring event from an earlier session: {other:?}"),
            }
            return;
        }

        match event {
            EncoderEvent::Diagnostic { stream, line, .. } => {
                log::debug!("[encoder {stream:?}] {line}");
            }
            EncoderEvent::WriteCompleted { result, .. } => self.on_write_completed(result),
            EncoderEvent::Exited { result, .. } => self.on_exited(result),
        }
    }

    /// Called when the producer goes away. Finishes any active recording and
    /// returns whether an encoder exit is still outstanding.
    pub fn shutdown(&mut self) -> bool {
        match self.state {
            ControllerState::Recording => {
                log::info!("Producer disconnected, finishing the active recording");
                self.end_session();
                self.has_active_session()
            }
            ControllerState::Finishing => true,
            _ => false,
        }
    }

    fn on_write_completed(&mut self, result: Result<usize, RecorderError>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(in_flight) = active.in_flight.take() else {
            log::warn!("Encoder reported a write with no frame in flight");
            return;
        };
        active.gate.complete();

        match result {
            Ok(_) => {
                let written = active.session.record_frame_written();
                let total = active.session.config().total_frames_hint;
                self.logger.timing("write", elapsed_ms(in_flight.started));
                self.logger.progress(written, total);
                self.outbox.send(ControllerMessage::progress(format!(
                    "recording frame... {}",
                    in_flight.sequence_index
                )));

                if active.finish_pending {
                    self.begin_finishing();
                } else if active.gate.grant() {
                    self.outbox.send(ControllerMessage::RequestFrame);
                }
            }
            Err(e) => {
                log::error!("Frame {} was not written: {e}", in_flight.sequence_index);
                self.abort(e.to_string());
            }
        }
    }

    fn on_exited(&mut self, result: Result<ExitReport, RecorderError>) {
        match self.state {
            ControllerState::Finishing => self.conclude(result),
            ControllerState::Recording => {
                let reason = match &result {
                    Ok(report) => format!("encoder exited unexpectedly with {}", report.describe()),
                    Err(e) => e.to_string(),
                };
                log::error!("Recording aborted: {reason}");
                self.outbox.send(ControllerMessage::advisory(
                    format!("recording aborted: {reason}"),
                    false,
                ));
                if let Some(active) = self.active.as_mut() {
                    active.failure.get_or_insert(reason);
                }
                self.conclude(result);
            }
            _ => {}
        }
    }

    /// Marks the session failed and closes the encoder input.
    fn abort(&mut self, reason: String) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        self.outbox.send(ControllerMessage::advisory(
            format!("recording aborted: {reason}"),
            false,
        ));
        active.failure.get_or_insert(reason);
        self.begin_finishing();
    }

    fn begin_finishing(&mut self) {
        let timeout = self.settings.finish_timeout;
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.finish_pending = false;
        active.gate.close();
        self.state = ControllerState::Finishing;

        if let Err(e) = active.process.finish(timeout) {
            log::warn!("Could not finish encoder: {e}");
            self.conclude(Err(e));
        }
    }

    /// Reports the outcome of the session and returns to Ready.
    fn conclude(&mut self, result: Result<ExitReport, RecorderError>) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.state = ControllerState::Ready;

        let frames_written = active.session.frames_written();
        let output_path = active.session.config().output_path.clone();
        log::debug!(
            "Session {} ended after {:.1}s: {} credits granted, {} frames accepted",
            active.session.id(),
            active.session.elapsed().as_secs_f64(),
            active.gate.grants_issued(),
            active.gate.frames_accepted()
        );
        let failure = match (active.failure, result) {
            (Some(reason), _) => Some(reason),
            (None, Ok(report)) if report.success() => None,
            (None, Ok(report)) => Some(RecorderError::EncoderFailed(report.describe()).to_string()),
            (None, Err(e)) => Some(e.to_string()),
        };

        self.logger.summary();
        match failure {
            None => {
                let message = format!(
                    "recording complete: {frames_written} frames written to {}",
                    output_path.display()
                );
                self.logger.info(&message);
                self.outbox.send(ControllerMessage::Completed {
                    message,
                    frames_written,
                    output_path,
                });
            }
            Some(reason) => {
                log::error!("Recording failed after {frames_written} frames: {reason}");
                self.outbox.send(ControllerMessage::advisory(
                    format!("recording failed after {frames_written} frames: {reason}"),
                    false,
                ));
            }
        }
    }

    /// Tells the producer why its request was refused and hands the error back.
    fn reject(&mut self, err: RecorderError) -> RecorderError {
        log::warn!("{err}");
        self.outbox
            .send(ControllerMessage::advisory(err.to_string(), false));
        err
    }

    fn send_unavailable_advisory(&mut self) {
        let reason = self
            .unavailable_reason
            .as_deref()
            .unwrap_or("encoder probe failed");
        self.outbox.send(ControllerMessage::advisory(
            format!("recording is unavailable: {reason}"),
            true,
        ));
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
