//! Rotation pool for rate-limited keys
//!
//! Rotates requests across interchangeable, individually rate-limited
//! resources such as API keys. Each request goes to the first resource in
//! insertion order that its policy currently admits; usage is recorded and the
//! whole pool is persisted so accounting survives restarts and can be shared
//! by several processes reading the same snapshot.
//!
//! Resource lifecycle:
//! 1. Caller adds a key → appended with fresh counters, lowest priority
//! 2. `dispatch_request` charges the first usable key and persists
//! 3. Daily quota reached → key skipped until its day rolls over
//! 4. Cooldown active → key skipped until the window has elapsed
//! 5. Next load on a new day → daily counters reset and persisted
//!
//! The crate never makes the call a key stands for; it only tracks permission.

pub mod clock;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod snapshot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use manager::RotationManager;
pub use policy::{
    DEFAULT_COOLDOWN_SECS, DEFAULT_DAILY_LIMIT, DailyQuota, MinuteCooldown, PolicyKind,
    PolicyParams, ResourcePolicy,
};
pub use snapshot::{ResourceRecord, Snapshot};

pub use key_store::{FileStorage, MemoryStorage, Storage};
