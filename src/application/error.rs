// Error types surfaced by the application layer
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Ingestion was closed by a session timeout; needs an explicit reconnect
    #[error("telemetry stream for session `{session_id}` is closed")]
    StreamClosed { session_id: String },

    #[error("monitor service is not running")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}
