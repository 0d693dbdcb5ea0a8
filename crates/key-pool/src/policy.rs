//! Per-resource admission policies
//!
//! A policy owns one resource's identity and usage counters and answers two
//! questions for the manager: may this resource take the next request right
//! now, and has its quota window rolled over. Both answers depend only on the
//! policy's own counters and the time passed in; no policy reads the clock
//! itself.
//!
//! Variants:
//! - `DailyQuota`: at most `request_limit` requests per local calendar day
//! - `MinuteCooldown`: one request, then unusable until the cooldown window
//!   has elapsed since the last request

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Per-resource request limit used by `add(key)` on a daily-quota pool.
pub const DEFAULT_DAILY_LIMIT: u64 = 100;

/// Cooldown window, in seconds, of a minute-cooldown pool unless configured otherwise.
pub const DEFAULT_COOLDOWN_SECS: i64 = 60;

/// Which policy a pool holds, with the pool-wide defaults for that policy.
///
/// A pool is homogeneous: every resource in one manager uses the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    DailyQuota { default_limit: u64 },
    MinuteCooldown { window: TimeDelta },
}

impl PolicyKind {
    /// Daily quota with the library default limit.
    pub fn daily_quota() -> Self {
        PolicyKind::DailyQuota {
            default_limit: DEFAULT_DAILY_LIMIT,
        }
    }

    /// Minute cooldown with the default one-minute window.
    pub fn minute_cooldown() -> Self {
        PolicyKind::MinuteCooldown {
            window: TimeDelta::seconds(DEFAULT_COOLDOWN_SECS),
        }
    }

    /// Label for logging and health output.
    pub fn label(&self) -> &'static str {
        match self {
            PolicyKind::DailyQuota { .. } => "daily_quota",
            PolicyKind::MinuteCooldown { .. } => "minute_cooldown",
        }
    }

    /// Parameters `add(key)` uses when the caller gives none.
    pub fn default_params(&self) -> PolicyParams {
        match *self {
            PolicyKind::DailyQuota { default_limit } => PolicyParams::DailyQuota {
                request_limit: default_limit,
            },
            PolicyKind::MinuteCooldown { .. } => PolicyParams::MinuteCooldown,
        }
    }
}

/// Per-resource parameters supplied when adding a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyParams {
    DailyQuota { request_limit: u64 },
    MinuteCooldown,
}

/// A resource limited to `request_limit` requests per calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyQuota {
    key: String,
    number_requests: u64,
    request_limit: u64,
    last_request_time: NaiveDateTime,
}

impl DailyQuota {
    pub fn new(
        key: String,
        number_requests: u64,
        request_limit: u64,
        last_request_time: NaiveDateTime,
    ) -> Self {
        Self {
            key,
            number_requests,
            request_limit,
            last_request_time,
        }
    }

    pub fn number_requests(&self) -> u64 {
        self.number_requests
    }

    pub fn request_limit(&self) -> u64 {
        self.request_limit
    }

    /// Day of the most recent request (or reset).
    pub fn last_access(&self) -> NaiveDate {
        self.last_request_time.date()
    }

    fn record_usage(&mut self, now: NaiveDateTime) {
        self.number_requests = self.number_requests.saturating_add(1);
        self.last_request_time = now;
    }

    fn is_usable(&self) -> bool {
        self.number_requests < self.request_limit
    }

    /// Missed days are not replayed: any gap resets the counter once.
    fn reset_due(&self, today: NaiveDate) -> bool {
        self.last_access() != today
    }

    fn reset(&mut self, today: NaiveDate) {
        self.number_requests = 0;
        self.last_request_time = today.and_time(NaiveTime::MIN);
    }
}

/// A resource that must rest for a cooldown window after each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteCooldown {
    key: String,
    request_times: u64,
    last_request_time: NaiveDateTime,
    window: TimeDelta,
}

impl MinuteCooldown {
    pub fn new(
        key: String,
        request_times: u64,
        last_request_time: NaiveDateTime,
        window: TimeDelta,
    ) -> Self {
        Self {
            key,
            request_times,
            last_request_time,
            window,
        }
    }

    pub fn request_times(&self) -> u64 {
        self.request_times
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// When the cooldown after the last request ends. `None` on overflow.
    pub fn ready_at(&self) -> Option<NaiveDateTime> {
        self.last_request_time.checked_add_signed(self.window)
    }

    fn record_usage(&mut self, now: NaiveDateTime) {
        self.request_times = self.request_times.saturating_add(1);
        self.last_request_time = now;
    }

    /// A never-used resource is usable even if its timestamp lies in the future.
    fn is_usable(&self, now: NaiveDateTime) -> bool {
        self.request_times == 0 || self.ready_at().is_some_and(|ready_at| ready_at <= now)
    }
}

/// One resource in the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePolicy {
    DailyQuota(DailyQuota),
    MinuteCooldown(MinuteCooldown),
}

impl ResourcePolicy {
    /// Fresh resource with zeroed counters, stamped at `now`.
    pub(crate) fn fresh(
        key: String,
        kind: PolicyKind,
        params: PolicyParams,
        now: NaiveDateTime,
    ) -> Option<Self> {
        match (kind, params) {
            (PolicyKind::DailyQuota { .. }, PolicyParams::DailyQuota { request_limit }) => Some(
                ResourcePolicy::DailyQuota(DailyQuota::new(key, 0, request_limit, now)),
            ),
            (PolicyKind::MinuteCooldown { window }, PolicyParams::MinuteCooldown) => Some(
                ResourcePolicy::MinuteCooldown(MinuteCooldown::new(key, 0, now, window)),
            ),
            _ => None,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ResourcePolicy::DailyQuota(p) => &p.key,
            ResourcePolicy::MinuteCooldown(p) => &p.key,
        }
    }

    pub fn last_request_time(&self) -> NaiveDateTime {
        match self {
            ResourcePolicy::DailyQuota(p) => p.last_request_time,
            ResourcePolicy::MinuteCooldown(p) => p.last_request_time,
        }
    }

    /// Usage counter of either variant.
    pub fn number_requests(&self) -> u64 {
        match self {
            ResourcePolicy::DailyQuota(p) => p.number_requests,
            ResourcePolicy::MinuteCooldown(p) => p.request_times,
        }
    }

    /// Charge one request to this resource.
    pub fn record_usage(&mut self, now: NaiveDateTime) {
        match self {
            ResourcePolicy::DailyQuota(p) => p.record_usage(now),
            ResourcePolicy::MinuteCooldown(p) => p.record_usage(now),
        }
    }

    pub fn is_usable(&self, now: NaiveDateTime) -> bool {
        match self {
            ResourcePolicy::DailyQuota(p) => p.is_usable(),
            ResourcePolicy::MinuteCooldown(p) => p.is_usable(now),
        }
    }

    /// Cooldown resources recover on their own and are never reset-due.
    pub fn reset_due(&self, today: NaiveDate) -> bool {
        match self {
            ResourcePolicy::DailyQuota(p) => p.reset_due(today),
            ResourcePolicy::MinuteCooldown(_) => false,
        }
    }

    pub fn reset(&mut self, today: NaiveDate) {
        match self {
            ResourcePolicy::DailyQuota(p) => p.reset(today),
            ResourcePolicy::MinuteCooldown(_) => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_request_time(&mut self, at: NaiveDateTime) {
        match self {
            ResourcePolicy::DailyQuota(p) => p.last_request_time = at,
            ResourcePolicy::MinuteCooldown(p) => p.last_request_time = at,
        }
    }
}
