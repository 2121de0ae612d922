use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::registry::ProcessInfo;

/// Sentinel session id used for errors that cannot be tied to a client
/// session, e.g. unparseable messages.
pub const SYSTEM_SESSION_ID: &str = "system";

/// Inbound channel message envelope: `{ "type": ..., "sessionId": ..., ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Create {
        session_id: String,
        #[serde(default)]
        shell: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        env: Option<HashMap<String, String>>,
        #[serde(default)]
        cols: Option<u16>,
        #[serde(default)]
        rows: Option<u16>,
    },
    Data {
        session_id: String,
        data: String,
    },
    Resize {
        session_id: String,
        cols: u16,
        rows: u16,
    },
    /// Returns the full registry projection; the session id is only echoed.
    ProcessList {
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Kills the named session, or — when `pid` is given — signals that raw
    /// OS process directly.
    Kill {
        session_id: String,
        #[serde(default)]
        pid: Option<u32>,
    },
}

/// Outbound channel messages: direct replies and asynchronously pushed
/// lifecycle/data events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Created {
        session_id: String,
        pid: u32,
    },
    Data {
        session_id: String,
        data: String,
    },
    Exit {
        session_id: String,
        exit_code: Option<u32>,
        signal: Option<String>,
    },
    Killed {
        session_id: String,
    },
    Error {
        session_id: String,
        error: String,
    },
    ProcessList {
        session_id: String,
        processes: Vec<ProcessInfo>,
    },
}

impl ServerMessage {
    pub fn error(session_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            session_id: session_id.into(),
            error: error.into(),
        }
    }

    pub fn not_found(session_id: impl Into<String>) -> Self {
        Self::error(session_id, "Session not found")
    }
}
