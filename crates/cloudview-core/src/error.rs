//! Error types for cloudview-core.
//!
//! `CloudviewError` covers the coordination and wire layers. Per-file decode
//! failures have their own type, [`crate::loader::LoadError`], because they
//! never escape a batch.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the cloudview core library.
#[derive(Debug, Error)]
pub enum CloudviewError {
    // File system / socket errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    // Wire protocol errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unrecognized command payload: {preview:?}")]
    UnrecognizedCommand { preview: String },

    // Instance coordination errors
    #[error("Session endpoint {name} is already owned by another instance")]
    EndpointInUse { name: String },

    #[error("Lost connection to running instance at {endpoint}")]
    InstanceLost { endpoint: String },
}

/// Result type alias for cloudview operations.
pub type Result<T> = std::result::Result<T, CloudviewError>;

impl From<std::io::Error> for CloudviewError {
    fn from(err: std::io::Error) -> Self {
        CloudviewError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl CloudviewError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CloudviewError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Build an `UnrecognizedCommand` error from a raw payload, keeping only
    /// a short, lossily-decoded prefix for logging.
    pub fn unrecognized(payload: &[u8]) -> Self {
        const PREVIEW_LEN: usize = 32;
        let end = payload.len().min(PREVIEW_LEN);
        CloudviewError::UnrecognizedCommand {
            preview: String::from_utf8_lossy(&payload[..end]).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CloudviewError::EndpointInUse {
            name: "cloudview-ipc-alice".into(),
        };
        assert_eq!(
            err.to_string(),
            "Session endpoint cloudview-ipc-alice is already owned by another instance"
        );
    }

    #[test]
    fn test_unrecognized_preview_is_truncated() {
        let payload = vec![b'x'; 100];
        match CloudviewError::unrecognized(&payload) {
            CloudviewError::UnrecognizedCommand { preview } => assert_eq!(preview.len(), 32),
            other => panic!("Expected UnrecognizedCommand, got: {:?}", other),
        }
    }
}
