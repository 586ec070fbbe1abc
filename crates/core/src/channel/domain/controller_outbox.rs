use std::sync::{Arc, Mutex};

use crate::channel::domain::messages::ControllerMessage;

/// Where the controller sends messages meant for the producer.
///
/// Delivery is best effort: a producer that went away must not take the
/// controller down with it.
pub trait ControllerOutbox: Send {
    fn send(&mut self, message: ControllerMessage);
}

/// Outbox for a controller with nobody attached yet.
pub struct NullOutbox;

impl ControllerOutbox for NullOutbox {
    fn send(&mut self, message: ControllerMessage) {
        log::debug!("No producer attached, dropping {message:?}");
    }
}

/// Collects every message in memory. Handy for embedding and tests.
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    messages: Arc<Mutex<Vec<ControllerMessage>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn messages(&self) -> Vec<ControllerMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Removes and returns everything sent so far.
    pub fn take(&self) -> Vec<ControllerMessage> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }
}

impl ControllerOutbox for MemoryOutbox {
    fn send(&mut self, message: ControllerMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_outbox_clones_share_storage() {
        let outbox = MemoryOutbox::new();
        let mut sender = outbox.clone();
        sender.send(ControllerMessage::RequestFrame);
        assert_eq!(outbox.messages(), vec![ControllerMessage::RequestFrame]);
        assert_eq!(outbox.take().len(), 1);
        assert!(outbox.messages().is_empty());
    }

    #[test]
    fn test_null_outbox_discards() {
        let mut outbox = NullOutbox;
        outbox.send(ControllerMessage::progress("ignored"));
    }
}
