pub mod channel;
pub mod codec;
pub mod encoder;
pub mod recording;
pub mod shared;
