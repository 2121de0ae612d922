use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::pty::pty_trait::{
    PtyAdapter, PtyError, PtyEvent, PtyEventReceiver, PtyFactory, PtySpawnConfig,
};

/// PTY implementation backed by `portable-pty`.
///
/// The master reads on a dedicated blocking thread which feeds the event
/// channel; once the read side hits EOF the child is reaped and a single
/// `Exit` event is emitted.
pub struct NativePty {
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
}

fn lock_or_recover<T: ?Sized>(mutex: &Mutex<Box<T>>) -> MutexGuard<'_, Box<T>> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NativePty {
    fn open(config: &PtySpawnConfig) -> Result<(Box<dyn PtyAdapter>, PtyEventReceiver), PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&config.shell);
        cmd.args(&config.args);
        cmd.cwd(&config.cwd);
        // CommandBuilder inherits the server environment; explicit entries win.
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn {}: {e}", config.shell)))?;
        drop(pair.slave);

        let pid = child.process_id();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        // Windows consoles start with stale prompt contents; clear the
        // viewport so the session opens on a clean screen.
        #[cfg(windows)]
        let writer = {
            let mut writer = writer;
            let _ = writer.write_all(b"cls\r\n");
            writer
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let child = Arc::new(Mutex::new(child));

        spawn_reader(reader, tx, alive.clone(), child.clone());

        let pty = NativePty {
            pid,
            alive,
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            child,
        };

        Ok((Box::new(pty), rx))
    }
}

/// Blocking read loop on its own thread: forwards output chunks in order,
/// reaps the child at EOF, then emits the terminal `Exit` event.
fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::UnboundedSender<PtyEvent>,
    alive: Arc<AtomicBool>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
) {
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(PtyEvent::Data(buf[..n].to_vec())).is_err() {
                        // Receiver dropped; keep draining until EOF so the
                        // child can be reaped below.
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "PTY reader stopped");
                    break;
                }
            }
        }

        alive.store(false, Ordering::SeqCst);

        let code = match lock_or_recover(&child).wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                warn!(error = %e, "failed to reap PTY child");
                None
            }
        };

        let _ = tx.send(PtyEvent::Exit { code, signal: None });
    });
}

#[async_trait]
impl PtyAdapter for NativePty {
    async fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        if !self.is_alive() {
            return Ok(());
        }
        let mut writer = lock_or_recover(&self.writer);
        match writer.write_all(data).and_then(|_| writer.flush()) {
            Ok(()) => Ok(()),
            // The process exited between the liveness check and the write.
            Err(_) if !self.is_alive() => Ok(()),
            Err(e) => Err(PtyError::Io(e)),
        }
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if !self.is_alive() {
            return Ok(());
        }
        lock_or_recover(&self.master)
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))
    }

    async fn kill(&self) -> Result<(), PtyError> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        match lock_or_recover(&self.child).kill() {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "failed to kill PTY child");
                Err(PtyError::Io(e))
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Factory producing `portable-pty` backed sessions.
#[derive(Debug, Default)]
pub struct NativePtyFactory;

#[async_trait]
impl PtyFactory for NativePtyFactory {
    async fn spawn(
        &self,
        config: &PtySpawnConfig,
    ) -> Result<(Box<dyn PtyAdapter>, PtyEventReceiver), PtyError> {
        let config = config.clone();
        // openpty and fork are blocking; keep them off the async workers.
        tokio::task::spawn_blocking(move || NativePty::open(&config))
            .await
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "portable-pty"
    }
}
