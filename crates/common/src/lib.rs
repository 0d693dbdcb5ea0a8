//! Common types for the key rotation workspace

mod error;

pub use error::{Error, Result};
