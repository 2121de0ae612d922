use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::pty::pty_trait::{
    PtyAdapter, PtyError, PtyEvent, PtyEventReceiver, PtyEventSender, PtyFactory, PtySpawnConfig,
};

/// In-memory PTY used by tests: records writes and resizes, and lets the
/// test drive output/exit events through a [`MockPtyHandle`].
struct MockPty {
    handle: MockPtyHandle,
}

/// Control handle for a spawned [`MockPty`]. Cloneable; the factory keeps one
/// per spawn so tests can reach sessions created deep inside the registry.
#[derive(Clone)]
pub struct MockPtyHandle {
    pub pid: u32,
    alive: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<u8>>>,
    size: Arc<Mutex<(u16, u16)>>,
    events: PtyEventSender,
}

impl MockPtyHandle {
    /// Emit an output chunk as if the process wrote it.
    pub fn emit_data(&self, data: &[u8]) {
        let _ = self.events.send(PtyEvent::Data(data.to_vec()));
    }

    /// Simulate the process exiting on its own.
    pub fn emit_exit(&self, code: u32) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.events.send(PtyEvent::Exit {
            code: Some(code),
            signal: None,
        });
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn size(&self) -> (u16, u16) {
        *self.size.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl PtyAdapter for MockPty {
    async fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        if self.handle.is_alive() {
            self.handle
                .written
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .extend_from_slice(data);
        }
        Ok(())
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if self.handle.is_alive() {
            *self.handle.size.lock().unwrap_or_else(|p| p.into_inner()) = (cols, rows);
        }
        Ok(())
    }

    async fn kill(&self) -> Result<(), PtyError> {
        if self.handle.alive.swap(false, Ordering::SeqCst) {
            let _ = self.handle.events.send(PtyEvent::Exit {
                code: None,
                signal: Some("SIGKILL".to_string()),
            });
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.handle.pid)
    }

    fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }
}

/// Factory for [`MockPty`] instances.
pub struct MockPtyFactory {
    fail_spawn: AtomicBool,
    next_pid: AtomicU32,
    handles: Mutex<Vec<MockPtyHandle>>,
}

impl MockPtyFactory {
    pub fn new() -> Self {
        Self {
            fail_spawn: AtomicBool::new(false),
            next_pid: AtomicU32::new(1000),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// A factory whose every spawn fails, for creation-error paths.
    pub fn failing() -> Self {
        let factory = Self::new();
        factory.fail_spawn.store(true, Ordering::SeqCst);
        factory
    }

    pub fn handles(&self) -> Vec<MockPtyHandle> {
        self.handles.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn last_handle(&self) -> Option<MockPtyHandle> {
        self.handles().last().cloned()
    }
}

impl Default for MockPtyFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PtyFactory for MockPtyFactory {
    async fn spawn(
        &self,
        config: &PtySpawnConfig,
    ) -> Result<(Box<dyn PtyAdapter>, PtyEventReceiver), PtyError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(PtyError::SpawnFailed("mock spawn failure".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = MockPtyHandle {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            alive: Arc::new(AtomicBool::new(true)),
            written: Arc::new(Mutex::new(Vec::new())),
            size: Arc::new(Mutex::new((config.cols, config.rows))),
            events: tx,
        };
        self.handles
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handle.clone());

        Ok((Box::new(MockPty { handle }), rx))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
