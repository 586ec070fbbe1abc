use crossbeam_channel::{select, Receiver};

use crate::channel::control_channel_adapter::ControlChannelAdapter;
use crate::channel::domain::envelope::Envelope;

use super::streaming_controller::StreamingController;

/// What happened to the recording when the producer went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Nothing was recording.
    Idle,
    /// An active recording was finished and its exit handled.
    Flushed,
}

/// Drives one producer connection until its inbound stream ends.
///
/// Inbound envelopes and encoder events are handled on this thread only, one
/// at a time. Once the producer disconnects, an active recording is finished
/// and encoder events are pumped until the process has exited, so the output
/// file is always finalized.
pub fn run_connection(
    controller: &mut StreamingController,
    adapter: &ControlChannelAdapter,
    inbound: Receiver<Envelope>,
) -> ConnectionOutcome {
    let events = controller.encoder_events();

    loop {
        select! {
            recv(inbound) -> envelope => match envelope {
                Ok(envelope) => {
                    match adapter.dispatch(controller, envelope) {
                        Ok(()) => {}
                        Err(e) if e.is_caller_misuse() => log::debug!("Control message ignored: {e}"),
                        Err(e) => log::warn!("Control message failed: {e}"),
                    }
                }
                Err(_) => break,
            },
            recv(events) -> event => {
                if let Ok(event) = event {
                    controller.handle_encoder_event(event);
                }
            }
        }
    }

    log::info!("Producer disconnected");
    controller.disconnect();
    if !controller.shutdown() {
        return ConnectionOutcome::Idle;
    }

    while controller.has_active_session() {
        match events.recv() {
            Ok(event) => controller.handle_encoder_event(event),
            Err(_) => break,
        }
    }
    ConnectionOutcome::Flushed
}
