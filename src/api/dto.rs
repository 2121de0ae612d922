/// Data Transfer Objects for the control surface endpoints.
use serde::Serialize;

/// Health report. Always succeeds, no side effects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub session_count: usize,
    pub process_count: usize,
    pub platform: &'static str,
    pub version: &'static str,
    pub timestamp: u64,
}

/// Result of a forced session deletion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionResponse {
    pub session_id: String,
    pub success: bool,
    pub message: String,
}

/// Generic error body for the control surface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            code: 404,
        }
    }
}
