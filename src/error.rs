// Error taxonomy for per-device polling work.
// Anything below the task entry points returns PollError; tasks log it with device context.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Liveness probe failed; no protocol exchange was attempted.
    #[error("host {host} unreachable: {reason}")]
    Reachability { host: String, reason: String },

    /// Transport failure or an error token returned by the device.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out after {elapsed:?} during {operation}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// Malformed device response (unparseable index, date, correlation id...).
    #[error("parse error: {0}")]
    Parse(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl PollError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        PollError::Protocol(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PollError::Parse(msg.into())
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        PollError::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Short class name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Reachability { .. } => "reachability",
            PollError::Protocol(_) => "protocol",
            PollError::Timeout { .. } => "timeout",
            PollError::Parse(_) => "parse",
            PollError::Persistence(_) => "persistence",
        }
    }
}

impl From<std::io::Error> for PollError {
    fn from(e: std::io::Error) -> Self {
        PollError::Protocol(e.to_string())
    }
}

pub type Result<T, E = PollError> = std::result::Result<T, E>;
