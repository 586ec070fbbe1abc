pub mod encoder_event;
pub mod encoder_launcher;
pub mod encoder_process;
pub mod encoding_policy;
