//! Error types for pool operations

/// Errors from pool operations.
///
/// `Decode` never escapes `RotationManager::open`: an unreadable snapshot is
/// replaced with an empty one instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(#[from] key_store::Error),

    #[error("snapshot encode error: {0}")]
    Encode(String),

    #[error("snapshot decode error: {0}")]
    Decode(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
