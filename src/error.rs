//! Error taxonomy shared by the archive, search and insertion layers.
//!
//! Storage and worker failures are recoverable and normally never escape the
//! component that hit them; they still get variants so the degraded paths can
//! log something precise.

use thiserror::Error;

/// Result alias for library operations
pub type Result<T> = std::result::Result<T, ShelfError>;

#[derive(Debug, Error)]
pub enum ShelfError {
    /// Malformed archive container or entry
    #[error("parse error: {0}")]
    Parse(String),

    /// A named entry is absent from the loaded archive
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistent storage refused the operation (quota, restricted mode, ...)
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The decompression worker could not be created or stopped answering
    #[error("worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Host rejected the mutation because its selection was invalid
    #[error("host selection error: {0}")]
    HostSelection(String),

    /// Any other host failure
    #[error("host error: {0}")]
    HostFatal(String),

    /// The asset set was replaced while the operation was running
    #[error("superseded: {0}")]
    Superseded(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ShelfError {
    /// Whether the insertion coordinator may retry after forcing selection
    pub fn is_selection_error(&self) -> bool {
        matches!(self, ShelfError::HostSelection(_))
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(err: serde_json::Error) -> Self {
        ShelfError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ShelfError {
    fn from(err: bincode::Error) -> Self {
        ShelfError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for ShelfError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => ShelfError::NotFound(err.to_string()),
            other => ShelfError::Parse(other.to_string()),
        }
    }
}
