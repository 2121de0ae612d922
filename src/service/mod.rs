//! Per-connection protocol handling.

mod channel_handler;

pub use channel_handler::{ChannelEvent, ChannelHandler};
