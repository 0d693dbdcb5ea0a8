//! Rotation manager: ordered pool, first-usable selection, persistence
//!
//! The pool is an ordered list and insertion order is rotation priority: the
//! earliest-inserted usable resource always wins. Traffic therefore drains
//! one resource before touching the next rather than spreading load.
//!
//! Each resource is independently usable or exhausted. The manager's current
//! selection is derived from that and recomputed on every read, because
//! cooldowns expire with time and a cached answer would go stale.
//!
//! Persistence: every mutation writes the full snapshot. Construction loads
//! the snapshot, applies due quota resets and persists again if anything
//! reset. An unreadable snapshot is replaced with an empty one rather than
//! failing construction. There is no file locking: concurrent processes
//! sharing one snapshot race and the last writer wins.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use key_store::{FileStorage, Storage};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::metrics;
use crate::policy::{PolicyKind, PolicyParams, ResourcePolicy};
use crate::snapshot::{self, format_timestamp};

/// Owns one pool of resources and the storage it is persisted to.
pub struct RotationManager {
    kind: PolicyKind,
    resources: Vec<ResourcePolicy>,
    current: Option<usize>,
    storage: Option<Box<dyn Storage>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationManager")
            .field("kind", &self.kind)
            .field("resources", &self.resources.len())
            .field("current", &self.current)
            .field("storage", &self.storage.as_ref().map(|s| s.location()))
            .finish()
    }
}

impl RotationManager {
    /// Memory-only pool. Nothing is ever persisted.
    pub fn in_memory(kind: PolicyKind, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind,
            resources: Vec::new(),
            current: None,
            storage: None,
            clock,
        }
    }

    /// Pool persisted to `storage`, loading any existing snapshot.
    ///
    /// - no snapshot yet: empty pool, nothing written until the first mutation
    /// - unreadable snapshot: empty pool, an empty snapshot is written at once
    /// - readable snapshot: due quota resets are applied and persisted
    ///
    /// Fails only when writing the healed or reset snapshot fails.
    pub fn open(kind: PolicyKind, storage: Box<dyn Storage>, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut manager = Self {
            storage: Some(storage),
            ..Self::in_memory(kind, clock)
        };
        manager.load()?;
        Ok(manager)
    }

    /// `open` backed by a snapshot file at `path`.
    pub fn open_path(
        kind: PolicyKind,
        path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::open(kind, Box::new(FileStorage::new(path)), clock)
    }

    fn load(&mut self) -> Result<()> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(());
        };
        let location = storage.location();

        if !storage.exists() {
            info!(location = %location, "no snapshot found, starting with empty pool");
            return Ok(());
        }

        let loaded = storage
            .read()
            .map_err(Error::from)
            .and_then(|bytes| snapshot::decode(&bytes, self.kind, self.clock.now()));
        match loaded {
            Ok(decoded) => {
                let today = self.clock.today();
                if decoded.as_of_day.is_some_and(|day| day != today) {
                    debug!(
                        location = %location,
                        as_of_day = ?decoded.as_of_day,
                        %today,
                        "snapshot is from an earlier day"
                    );
                }
                self.resources = decoded.resources;
                info!(
                    location = %location,
                    policy = self.kind.label(),
                    resources = self.resources.len(),
                    "loaded snapshot"
                );
                self.apply_due_resets()?;
            }
            Err(e) => {
                warn!(location = %location, error = %e, "snapshot unreadable, replacing with empty pool");
                metrics::record_snapshot_recovered();
                self.resources.clear();
                self.persist()?;
            }
        }

        self.refresh_selection();
        Ok(())
    }

    /// Reset every resource whose quota window has rolled over.
    ///
    /// Returns how many were reset. Persists only if at least one was, so a
    /// snapshot on disk never moves backward. Runs on load; long-running
    /// callers that cross midnight can call it directly.
    pub fn apply_due_resets(&mut self) -> Result<usize> {
        let today = self.clock.today();
        let mut reset = 0usize;
        for resource in self.resources.iter_mut() {
            if resource.reset_due(today) {
                resource.reset(today);
                reset += 1;
            }
        }

        if reset > 0 {
            info!(resets = reset, %today, "quota windows rolled over");
            metrics::record_resets(reset);
            self.persist()?;
        }
        self.refresh_selection();
        Ok(reset)
    }

    /// Append a resource with the pool's default parameters.
    pub fn add(&mut self, key: impl Into<String>) -> Result<()> {
        let params = self.kind.default_params();
        self.add_with(key, params)
    }

    /// Append a resource with explicit parameters.
    ///
    /// The new resource has the lowest rotation priority. A blank key or
    /// parameters for another policy kind are rejected; the pool is left
    /// unchanged if persisting fails.
    pub fn add_with(&mut self, key: impl Into<String>, params: PolicyParams) -> Result<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidConfig("resource key must not be empty".into()));
        }

        let resource = ResourcePolicy::fresh(key.clone(), self.kind, params, self.clock.now())
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{params:?} does not apply to a {} pool",
                    self.kind.label()
                ))
            })?;

        if self.resources.iter().any(|r| r.key() == key) {
            warn!(key = %key, "resource key already in pool, adding duplicate");
        }

        self.resources.push(resource);
        if let Err(e) = self.persist() {
            self.resources.pop();
            return Err(e);
        }

        info!(key = %key, position = self.resources.len() - 1, "resource added to pool");
        self.refresh_selection();
        Ok(())
    }

    /// Remove every resource with `key`. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let before = self.resources.clone();
        self.resources.retain(|r| r.key() != key);
        if self.resources.len() == before.len() {
            return Ok(false);
        }

        if let Err(e) = self.persist() {
            self.resources = before;
            return Err(e);
        }

        info!(key, "resource removed from pool");
        self.refresh_selection();
        Ok(true)
    }

    /// First usable resource in insertion order, recomputed now.
    pub fn select(&mut self) -> Option<&ResourcePolicy> {
        self.refresh_selection();
        self.current.and_then(|index| self.resources.get(index))
    }

    /// The resource the next dispatch would use, without consuming capacity.
    pub fn current(&mut self) -> Option<&ResourcePolicy> {
        self.select()
    }

    /// Charge one request to the current resource and persist.
    ///
    /// Returns the key that was charged, or `None` when no resource is usable.
    /// An exhausted pool is a normal state, not an error. If persisting fails
    /// the charge is rolled back and the storage error returned.
    pub fn dispatch_request(&mut self) -> Result<Option<String>> {
        self.refresh_selection();
        let Some(index) = self.current else {
            warn!(resources = self.resources.len(), "no usable resource, request not dispatched");
            metrics::record_exhausted();
            return Ok(None);
        };

        let now = self.clock.now();
        let previous = self.resources[index].clone();
        let resource = &mut self.resources[index];
        resource.record_usage(now);
        let key = resource.key().to_string();
        let requests = resource.number_requests();

        if let Err(e) = self.persist() {
            self.resources[index] = previous;
            return Err(e);
        }

        debug!(key = %key, requests, "request dispatched");
        metrics::record_dispatch(&key);
        self.refresh_selection();
        Ok(Some(key))
    }

    /// Read-only view of the pool in rotation order.
    pub fn list(&self) -> &[ResourcePolicy] {
        &self.resources
    }

    /// Write the current snapshot even if nothing changed.
    pub fn flush(&self) -> Result<()> {
        self.persist()
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Where the pool is persisted, if anywhere.
    pub fn storage_location(&self) -> Option<String> {
        self.storage.as_ref().map(|s| s.location())
    }

    /// Pool health summary.
    ///
    /// Status mapping: all usable → healthy, some usable → degraded,
    /// none usable or empty → unhealthy.
    pub fn health(&self) -> serde_json::Value {
        let now = self.clock.now();
        let resources: Vec<serde_json::Value> = self
            .resources
            .iter()
            .map(|r| resource_health(r, now))
            .collect();

        let total = self.resources.len();
        let usable = self.resources.iter().filter(|r| r.is_usable(now)).count();
        let status = if usable == total && total > 0 {
            "healthy"
        } else if usable > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "policy": self.kind.label(),
            "resources_total": total,
            "resources_usable": usable,
            "resources_exhausted": total - usable,
            "resources": resources
        })
    }

    fn refresh_selection(&mut self) {
        let now = self.clock.now();
        self.current = self.resources.iter().position(|r| r.is_usable(now));
    }

    fn persist(&self) -> Result<()> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(());
        };
        let bytes = snapshot::encode(&self.resources, self.clock.today())?;
        storage.write(&bytes)?;
        debug!(
            location = %storage.location(),
            resources = self.resources.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

fn resource_health(resource: &ResourcePolicy, now: NaiveDateTime) -> serde_json::Value {
    let usable = resource.is_usable(now);
    let mut entry = serde_json::json!({
        "key": resource.key(),
        "status": if usable { "usable" } else { "exhausted" },
        "number_requests": resource.number_requests(),
        "last_request_time": format_timestamp(resource.last_request_time()),
    });

    match resource {
        ResourcePolicy::DailyQuota(p) => {
            entry["request_limit"] = p.request_limit().into();
        }
        ResourcePolicy::MinuteCooldown(p) if !usable => {
            let remaining = p
                .ready_at()
                .map(|ready_at| (ready_at - now).num_seconds().max(0))
                .unwrap_or(0);
            entry["cooldown_remaining_secs"] = remaining.into();
        }
        ResourcePolicy::MinuteCooldown(_) => {}
    }
    entry
}
