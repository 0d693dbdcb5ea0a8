//! In-process snapshot storage

use std::sync::Mutex;

use crate::Storage;
use crate::error::{Error, Result};

/// Snapshot held in memory. Cloning the bytes out keeps reads independent of
/// later writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryStorage {
    /// Empty storage: `exists()` is false until the first write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with `bytes`, as if a previous run had written them.
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes.into())),
        }
    }

    /// Current contents, if any.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes.lock().ok().and_then(|b| b.clone())
    }
}

impl Storage for MemoryStorage {
    fn exists(&self) -> bool {
        self.bytes.lock().map(|b| b.is_some()).unwrap_or(false)
    }

    fn read(&self) -> Result<Vec<u8>> {
        let bytes = self
            .bytes
            .lock()
            .map_err(|_| Error::Io("memory storage lock poisoned".into()))?;
        bytes
            .clone()
            .ok_or_else(|| Error::Io("memory storage is empty".into()))
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut slot = self
            .bytes
            .lock()
            .map_err(|_| Error::Io("memory storage lock poisoned".into()))?;
        *slot = Some(bytes.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}
