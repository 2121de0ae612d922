use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::pty::{
    default_shell, default_working_dir, PtyError, PtyEventReceiver, PtyFactory, PtySpawnConfig,
    DEFAULT_COLS, DEFAULT_ROWS,
};
use crate::registry::session::{ProcessInfo, Session, SessionOptions, SessionSummary};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session already exists: {0}")]
    DuplicateSession(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error(transparent)]
    Pty(#[from] PtyError),
}

/// The two co-located maps. Guarded by a single lock so they can never
/// disagree about which sessions exist.
#[derive(Default)]
struct Maps {
    sessions: HashMap<String, Session>,
    processes: HashMap<String, ProcessInfo>,
}

/// Authoritative in-memory record of all live sessions.
///
/// Cloneable handle; all mutations of the session and process maps go through
/// these operations. A session that has died is removed, never marked, so
/// "not found" and "dead" are the same observable state.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Mutex<Maps>>,
    factory: Arc<dyn PtyFactory>,
}

impl Registry {
    pub fn new(factory: Arc<dyn PtyFactory>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Maps::default())),
            factory,
        }
    }

    /// Spawn a shell for `id` and register it.
    ///
    /// Rejects duplicate ids without touching the existing session. On spawn
    /// failure no partial state is left behind. Returns the OS pid and the
    /// PTY event stream for the new session.
    pub async fn create_session(
        &self,
        id: &str,
        opts: SessionOptions,
    ) -> Result<(u32, PtyEventReceiver), RegistryError> {
        let mut maps = self.inner.lock().await;
        if maps.sessions.contains_key(id) {
            return Err(RegistryError::DuplicateSession(id.to_string()));
        }

        let shell = opts.shell.unwrap_or_else(default_shell);
        let cwd = opts
            .cwd
            .unwrap_or_else(|| default_working_dir().to_string_lossy().into_owned());
        let cols = opts.cols.unwrap_or(DEFAULT_COLS);
        let rows = opts.rows.unwrap_or(DEFAULT_ROWS);
        let env: Vec<(String, String)> = opts.env.unwrap_or_default().into_iter().collect();

        let config = PtySpawnConfig {
            shell: shell.clone(),
            args: vec![],
            cwd: PathBuf::from(&cwd),
            env,
            cols,
            rows,
        };

        let (adapter, events) = self.factory.spawn(&config).await?;
        let pid = adapter.pid().unwrap_or_default();

        let session = Session::new(id.to_string(), shell.clone(), cwd.clone(), cols, rows, adapter);
        let info = ProcessInfo {
            session_id: id.to_string(),
            pid,
            shell,
            cwd,
            started_at: session.created_at,
        };
        maps.sessions.insert(id.to_string(), session);
        maps.processes.insert(id.to_string(), info);

        info!(session_id = %id, pid, "session created");
        Ok((pid, events))
    }

    /// Forward client input to a session's shell.
    pub async fn write(&self, id: &str, data: &[u8]) -> Result<(), RegistryError> {
        let mut maps = self.inner.lock().await;
        let session = maps
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))?;
        session.write(data).await?;
        Ok(())
    }

    /// Resize a session's virtual screen.
    pub async fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<(), RegistryError> {
        let mut maps = self.inner.lock().await;
        let session = maps
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))?;
        session.resize(cols, rows).await?;
        Ok(())
    }

    /// Terminate a session and deregister it.
    ///
    /// Removal from both maps is synchronous; the OS process termination is
    /// best-effort. Idempotent: a second kill reports not-found.
    pub async fn kill(&self, id: &str) -> Result<(), RegistryError> {
        let mut maps = self.inner.lock().await;
        let session = maps
            .sessions
            .remove(id)
            .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))?;
        maps.processes.remove(id);
        drop(maps);

        if let Err(e) = session.kill().await {
            warn!(session_id = %id, error = %e, "failed to terminate session process");
        }
        info!(session_id = %id, "session killed");
        Ok(())
    }

    /// Deregister a session whose process exited on its own.
    ///
    /// Returns false when the id is no longer present, which happens when an
    /// exit notification races an explicit kill; that late exit is a no-op.
    pub async fn remove_on_exit(&self, id: &str) -> bool {
        let mut maps = self.inner.lock().await;
        let removed = maps.sessions.remove(id).is_some();
        maps.processes.remove(id);
        if removed {
            info!(session_id = %id, "session exited");
        }
        removed
    }

    /// Kill by raw OS pid.
    ///
    /// When the pid belongs to a registered session this funnels through the
    /// same terminate-and-deregister path as [`Registry::kill`] and returns
    /// that session's id. Otherwise only a termination signal is sent, with
    /// no registry effect.
    pub async fn kill_by_pid(&self, pid: u32) -> Result<Option<String>, RegistryError> {
        let target = {
            let maps = self.inner.lock().await;
            maps.processes
                .values()
                .find(|p| p.pid == pid)
                .map(|p| p.session_id.clone())
        };
        match target {
            Some(id) => {
                self.kill(&id).await?;
                Ok(Some(id))
            }
            None => {
                signal_terminate(pid)?;
                info!(pid, "termination signal sent to unmanaged process");
                Ok(None)
            }
        }
    }

    /// The full process-info projection, without touching live sessions.
    pub async fn list_process_info(&self) -> Vec<ProcessInfo> {
        let maps = self.inner.lock().await;
        maps.processes.values().cloned().collect()
    }

    /// Per-session summaries joined with their process projections.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let maps = self.inner.lock().await;
        maps.sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                alive: s.is_alive(),
                shell: s.shell.clone(),
                working_directory: s.cwd.clone(),
                cols: s.cols,
                rows: s.rows,
                created_at: s.created_at,
                last_activity_at: s.last_activity_at,
                process: maps.processes.get(&s.id).cloned(),
            })
            .collect()
    }

    pub async fn get_summary(&self, id: &str) -> Option<SessionSummary> {
        self.list_sessions().await.into_iter().find(|s| s.id == id)
    }

    /// (session count, process-info count).
    pub async fn counts(&self) -> (usize, usize) {
        let maps = self.inner.lock().await;
        (maps.sessions.len(), maps.processes.len())
    }

    /// Drain the registry: kill every live session before the maps are
    /// discarded. Returns the number of sessions terminated.
    pub async fn shutdown(&self) -> usize {
        let mut maps = self.inner.lock().await;
        let ids: Vec<String> = maps.sessions.keys().cloned().collect();
        let mut terminated = 0;
        for id in ids {
            if let Some(session) = maps.sessions.remove(&id) {
                maps.processes.remove(&id);
                info!(session_id = %id, "terminating session during shutdown");
                if let Err(e) = session.kill().await {
                    warn!(session_id = %id, error = %e, "failed to terminate session during shutdown");
                }
                terminated += 1;
            }
        }
        terminated
    }
}

/// Send SIGTERM to an arbitrary pid.
#[cfg(unix)]
fn signal_terminate(pid: u32) -> Result<(), PtyError> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(PtyError::SignalFailed(format!("invalid pid: {pid}")));
    }
    let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(PtyError::SignalFailed(
            std::io::Error::last_os_error().to_string(),
        ))
    }
}

#[cfg(not(unix))]
fn signal_terminate(_pid: u32) -> Result<(), PtyError> {
    Err(PtyError::SignalFailed(
        "raw pid termination is not supported on this platform".to_string(),
    ))
}
