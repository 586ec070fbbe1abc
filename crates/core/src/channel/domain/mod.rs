pub mod controller_outbox;
pub mod envelope;
pub mod messages;
