pub mod credit_gate;
pub mod event_loop;
pub mod recording_logger;
pub mod session;
pub mod streaming_controller;
