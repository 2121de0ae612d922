//! HTTP and WebSocket endpoint handlers.

pub mod rest;
pub mod websocket;
