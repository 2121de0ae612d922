use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::pty::PtyFactory;
use crate::registry::Registry;

/// Shared state injected into every handler: the session registry, the
/// configuration, and the server start time for uptime reporting.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, factory: Arc<dyn PtyFactory>) -> Self {
        Self {
            registry: Registry::new(factory),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
