pub mod control_channel_adapter;
pub mod domain;
pub mod infrastructure;
pub mod message_names;
