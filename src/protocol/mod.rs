//! JSON wire protocol spoken over terminal channels.

mod messages;

pub use messages::{ClientMessage, ServerMessage, SYSTEM_SESSION_ID};
