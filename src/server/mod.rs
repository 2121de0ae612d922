//! Router construction and server lifecycle.

mod server;

pub use server::{build_router, run_server};
