//! Byte storage for pool snapshots
//!
//! The rotation engine only needs three things from durable storage: whether a
//! snapshot exists, its bytes, and a way to replace them. `Storage` captures
//! exactly that so the pool stays independent of where state lives.
//!
//! Backends:
//! - `FileStorage`: one JSON file, replaced atomically (temp file + rename)
//! - `MemoryStorage`: in-process buffer for tests and embedders
//!
//! No locking is performed. Two processes writing the same file race and the
//! last writer wins.

pub mod error;
pub mod file;
pub mod memory;

pub use error::{Error, Result};
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Byte-oriented snapshot storage.
pub trait Storage: Send + Sync {
    /// Whether a snapshot has ever been written.
    fn exists(&self) -> bool;

    /// Read the full snapshot.
    fn read(&self) -> Result<Vec<u8>>;

    /// Replace the snapshot with `bytes`.
    fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location for logging (a path, or "memory").
    fn location(&self) -> String;
}

impl<T: Storage + ?Sized> Storage for std::sync::Arc<T> {
    fn exists(&self) -> bool {
        (**self).exists()
    }

    fn read(&self) -> Result<Vec<u8>> {
        (**self).read()
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
