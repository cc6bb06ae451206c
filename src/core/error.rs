//! Error taxonomy for the generation pipeline.

use std::fmt;

use thiserror::Error;

/// Tag carried by every failed generation so the interface can say what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Timeout,
    ServerRejected,
    Malformed,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerRejected => "server rejected request",
            ErrorKind::Malformed => "malformed response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failures surfaced by the Ollama client. All of them end the active task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Cannot connect to Ollama ({0}). Is it running?")]
    Connection(String),
    #[error("Timed out waiting for Ollama ({0})")]
    Timeout(String),
    #[error("Ollama rejected the request: {0}")]
    ServerRejected(String),
    #[error("Ollama sent an unreadable response: {0}")]
    Malformed(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Connection(_) => ErrorKind::Connection,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::ServerRejected(_) => ErrorKind::ServerRejected,
            ClientError::Malformed(_) => ErrorKind::Malformed,
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::Malformed(err.to_string())
        } else {
            ClientError::Connection(err.to_string())
        }
    }

    /// Build a rejection from a non-success status and whatever body came with it.
    pub fn rejected(status: reqwest::StatusCode, body: &str) -> Self {
        ClientError::ServerRejected(format!("{status}: {}", summarize_error_body(body)))
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .get("error")
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.to_string()),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|message| message.as_str().map(str::to_owned)),
            _ => None,
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Reduce an error body to a single readable line.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return summary;
            }
        }
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caller-facing rejections from the session coordinator. None of these are task failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Already generating; cancel the current generation first")]
    AlreadyRunning,
    #[error("Select a model before generating")]
    NoModelSelected,
    #[error("Write some text before the cursor to continue from")]
    NothingToContinue,
    #[error("Failed to start the generation worker: {0}")]
    WorkerSpawn(String),
}
