//! Pseudo-terminal process adapter.
//!
//! Wraps OS-level PTY creation behind the [`PtyAdapter`] trait: write input,
//! receive output as an event stream, resize the virtual screen, observe exit
//! and forcibly terminate. The production backend is `portable-pty`.

mod mock_pty;
mod native_pty;
mod pty_trait;

pub use mock_pty::{MockPtyFactory, MockPtyHandle};
pub use native_pty::{NativePty, NativePtyFactory};
pub use pty_trait::{
    PtyAdapter, PtyError, PtyEvent, PtyEventReceiver, PtyEventSender, PtyFactory, PtySpawnConfig,
};

use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Platform-appropriate interactive shell: the environment's declared shell
/// on POSIX systems, PowerShell on Windows.
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
    #[cfg(windows)]
    {
        "powershell.exe".to_string()
    }
    #[cfg(not(any(unix, windows)))]
    {
        "sh".to_string()
    }
}

/// The server process's home directory, falling back to the current
/// working directory.
pub fn default_working_dir() -> PathBuf {
    let home = if cfg!(windows) {
        std::env::var("USERPROFILE")
    } else {
        std::env::var("HOME")
    };
    match home {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// The factory used by the running server.
pub fn default_factory() -> Arc<dyn PtyFactory> {
    Arc::new(NativePtyFactory)
}
