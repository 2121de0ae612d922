//! Terminal gateway: spawns, multiplexes and tears down interactive shell
//! sessions on behalf of remote clients over persistent WebSocket channels,
//! with a synchronous control surface for introspection and termination.

pub mod api;
pub mod app_state;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod pty;
pub mod registry;
pub mod server;
pub mod service;
