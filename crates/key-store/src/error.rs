//! Error types for snapshot storage

/// Errors from storage backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
