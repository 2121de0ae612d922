use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Parameters for spawning a shell inside a pseudo-terminal.
#[derive(Debug, Clone)]
pub struct PtySpawnConfig {
    pub shell: String,
    pub args: Vec<String>,
    pub cwd: std::path::PathBuf,
    /// Merged over the server's own environment; entries here win.
    pub env: Vec<(String, String)>,
    pub cols: u16,
    pub rows: u16,
}

/// Asynchronous notifications from a spawned PTY process.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    /// An output chunk, in the order the process produced it.
    Data(Vec<u8>),
    /// The process terminated, on its own or because it was killed.
    Exit {
        code: Option<u32>,
        signal: Option<String>,
    },
}

pub type PtyEventReceiver = mpsc::UnboundedReceiver<PtyEvent>;
pub type PtyEventSender = mpsc::UnboundedSender<PtyEvent>;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),
    #[error("Resize failed: {0}")]
    ResizeFailed(String),
    #[error("Signal delivery failed: {0}")]
    SignalFailed(String),
}

/// Handle to one spawned PTY process.
///
/// `write` and `resize` on a handle whose process has already exited are
/// silent no-ops; the exit race is expected during normal teardown.
#[async_trait]
pub trait PtyAdapter: Send + Sync {
    async fn write(&self, data: &[u8]) -> Result<(), PtyError>;

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Terminate the process. Idempotent.
    async fn kill(&self) -> Result<(), PtyError>;

    fn pid(&self) -> Option<u32>;

    fn is_alive(&self) -> bool;
}

/// Factory for PTY instances, injected into the registry so tests can
/// substitute a mock implementation.
#[async_trait]
pub trait PtyFactory: Send + Sync {
    /// Spawn a new PTY process. Output and exit notifications arrive on the
    /// returned event channel.
    async fn spawn(
        &self,
        config: &PtySpawnConfig,
    ) -> Result<(Box<dyn PtyAdapter>, PtyEventReceiver), PtyError>;

    fn name(&self) -> &'static str;
}
