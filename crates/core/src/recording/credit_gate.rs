use crate::shared::error::RecorderError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// No credit outstanding; frames are not accepted.
    Idle,
    /// One credit outstanding; exactly one frame may be accepted.
    Armed,
    /// A frame is being written; nothing else is accepted until it completes.
    InFlight,
}

/// Single-slot permit that keeps at most one frame between producer and
/// encoder.
///
/// A new credit can only be granted once the previous write has completed,
/// so the encoder's input pipe never holds more than one frame and frames
/// reach it in the order they were accepted. Rejected frames are dropped by
/// the caller, never queued.
#[derive(Debug)]
pub struct CreditGate {
    state: GateState,
    grants_issued: u64,
    frames_accepted: u64,
}

impl CreditGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            grants_issued: 0,
            frames_accepted: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn grants_issued(&self) -> u64 {
        self.grants_issued
    }

    pub fn frames_accepted(&self) -> u64 {
        self.frames_accepted
    }

    /// `Idle → Armed`. Returns false (and changes nothing) in any other state.
    pub fn grant(&mut self) -> bool {
        if self.state != GateState::Idle {
            return false;
        }
        self.state = GateState::Armed;
        self.grants_issued += 1;
        true
    }

    /// `Armed → InFlight`; consumes the credit for one frame.
    pub fn acquire(&mut self) -> Result<(), RecorderError> {
        match self.state {
            GateState::Armed => {
                self.state = GateState::InFlight;
                self.frames_accepted += 1;
                Ok(())
            }
            GateState::Idle => Err(RecorderError::ProtocolViolation(
                "frame submitted without an outstanding frame request".to_string(),
            )),
            GateState::InFlight => Err(RecorderError::ProtocolViolation(
                "frame submitted while the previous frame is still being written".to_string(),
            )),
        }
    }

    /// `InFlight → Idle` once the write has fully completed.
    pub fn complete(&mut self) {
        if self.state == GateState::InFlight {
            self.state = GateState::Idle;
        }
    }

    /// `InFlight → Armed`: the accepted frame never reached the encoder, so
    /// the producer keeps its credit.
    pub fn refund(&mut self) {
        if self.state == GateState::InFlight {
            self.state = GateState::Armed;
            self.frames_accepted -= 1;
        }
    }

    /// Withdraws an unused credit. A write in flight is left alone; it still
    /// has to complete.
    pub fn close(&mut self) {
        if self.state == GateState::Armed {
            self.state = GateState::Idle;
        }
    }
}

impl Default for CreditGate {
    fn default() -> Self {
        Self::new()
    }
}
