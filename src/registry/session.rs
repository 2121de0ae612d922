use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::pty::PtyAdapter;

/// Seconds since the UNIX epoch.
pub(crate) fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Caller-supplied overrides for a new session; unset fields fall back to
/// platform defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionOptions {
    pub shell: Option<String>,
    pub cwd: Option<String>,
    pub env: Option<HashMap<String, String>>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

/// One managed shell process plus its metadata.
///
/// The session is the exclusive owner of its PTY adapter; all writes, resizes
/// and kills go through it.
pub struct Session {
    pub id: String,
    pub shell: String,
    pub cwd: String,
    pub cols: u16,
    pub rows: u16,
    pub created_at: u64,
    pub last_activity_at: u64,
    adapter: Box<dyn PtyAdapter>,
}

impl Session {
    pub fn new(
        id: String,
        shell: String,
        cwd: String,
        cols: u16,
        rows: u16,
        adapter: Box<dyn PtyAdapter>,
    ) -> Self {
        let now = now_epoch_secs();
        Self {
            id,
            shell,
            cwd,
            cols,
            rows,
            created_at: now,
            last_activity_at: now,
            adapter,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.adapter.is_alive()
    }

    pub fn pid(&self) -> Option<u32> {
        self.adapter.pid()
    }

    /// Forward client input to the shell. Refreshes the activity timestamp on
    /// every inbound write; forwarding is skipped once the process has exited.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), crate::pty::PtyError> {
        self.last_activity_at = now_epoch_secs();
        if self.adapter.is_alive() {
            self.adapter.write(data).await?;
        }
        Ok(())
    }

    /// Record the client's declared geometry and forward it to the shell when
    /// it is still running. The stored geometry reflects the client's intent
    /// even if the process already died.
    pub async fn resize(&mut self, cols: u16, rows: u16) -> Result<(), crate::pty::PtyError> {
        self.cols = cols;
        self.rows = rows;
        if self.adapter.is_alive() {
            self.adapter.resize(cols, rows).await?;
        }
        Ok(())
    }

    pub async fn kill(&self) -> Result<(), crate::pty::PtyError> {
        self.adapter.kill().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("shell", &self.shell)
            .field("cwd", &self.cwd)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .finish()
    }
}

/// Lightweight projection of a session's process, kept in a separate lookup
/// so introspection never touches the live session object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub session_id: String,
    pub pid: u32,
    pub shell: String,
    pub cwd: String,
    pub started_at: u64,
}

/// Read-only session view served by the control surface; a superset of
/// [`ProcessInfo`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub alive: bool,
    pub shell: String,
    pub working_directory: String,
    pub cols: u16,
    pub rows: u16,
    pub created_at: u64,
    pub last_activity_at: u64,
    pub process: Option<ProcessInfo>,
}
