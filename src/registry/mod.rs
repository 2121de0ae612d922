//! Session model and the process-wide session registry.

mod registry;
mod session;

pub use registry::{Registry, RegistryError};
pub use session::{ProcessInfo, Session, SessionOptions, SessionSummary};

pub(crate) use session::now_epoch_secs;
