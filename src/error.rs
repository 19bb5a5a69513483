//! Error types for upload and configuration failures.
//!
//! Per-task errors never cross the batch boundary: the coordinator turns them
//! into task state transitions and callback invocations. Loading config and
//! reading payloads from disk return these errors directly.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    /// The endpoint answered with a non-2xx status
    #[error("Upload failed {status}: {message}")]
    Transport { status: u16, message: String },

    /// 2xx response whose body could not be used
    #[error("Malformed upload response: {0}")]
    MalformedResponse(String),

    /// Connection, timeout or body streaming failure
    #[error("Network error: {0}")]
    Network(String),

    /// The upload was aborted before it finished
    #[error("Upload cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Two payloads in one batch share a key
    #[error("Duplicate upload key: {0}")]
    DuplicateKey(String),

    /// The transport panicked while uploading
    #[error("Upload aborted unexpectedly: {0}")]
    Fault(String),
}

impl UploadError {
    /// Cancellation leaves a task retryable, everything else is a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Build a `Fault` from a caught panic payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        UploadError::Fault(message)
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UploadError::Network(format!("Request timed out: {}", e))
        } else if e.is_connect() {
            UploadError::Network(format!("Connection failed: {}", e))
        } else {
            UploadError::Network(e.to_string())
        }
    }
}
