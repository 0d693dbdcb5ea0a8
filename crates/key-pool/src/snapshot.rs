//! Snapshot codec
//!
//! Maps the pool to and from its persisted JSON document:
//!
//! ```json
//! {
//!   "as_of_day": "2026-10-19",
//!   "resources": [
//!     { "key": "k1", "number_requests": 3, "request_limit": 10,
//!       "last_request_time": "2026-10-19 08:15:02" }
//!   ]
//! }
//! ```
//!
//! Records are flat and carry no variant tag: a pool is homogeneous and the
//! manager supplies the `PolicyKind` to decode with. Timestamps use a fixed,
//! lexically sortable format so the document stays human-inspectable and
//! re-encoding an unchanged pool yields identical bytes.
//!
//! Documents written before the `as_of_day` wrapper existed are a bare array
//! of records; they are still accepted on decode.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::{DailyQuota, MinuteCooldown, PolicyKind, ResourcePolicy};

/// Format of `last_request_time` in records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of `as_of_day`, and the accepted date-only form of timestamps.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Persisted state of one daily-quota resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuotaRecord {
    pub key: String,
    pub number_requests: u64,
    pub request_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request_time: Option<String>,
}

/// Persisted state of one minute-cooldown resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteCooldownRecord {
    pub key: String,
    pub request_times: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request_time: Option<String>,
}

/// Persisted state of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceRecord {
    DailyQuota(DailyQuotaRecord),
    MinuteCooldown(MinuteCooldownRecord),
}

/// Decoded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Day the snapshot was written. `None` for legacy documents.
    pub as_of_day: Option<NaiveDate>,
    pub resources: Vec<ResourcePolicy>,
}

#[derive(Serialize)]
struct DocumentOut {
    as_of_day: String,
    resources: Vec<ResourceRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentIn {
    Wrapped {
        #[serde(default)]
        as_of_day: Option<String>,
        resources: Vec<serde_json::Value>,
    },
    Legacy(Vec<serde_json::Value>),
}

impl ResourcePolicy {
    /// Record for this resource with the timestamp rendered in `TIMESTAMP_FORMAT`.
    pub fn to_record(&self) -> ResourceRecord {
        let last_request_time = Some(format_timestamp(self.last_request_time()));
        match self {
            ResourcePolicy::DailyQuota(p) => ResourceRecord::DailyQuota(DailyQuotaRecord {
                key: self.key().to_string(),
                number_requests: p.number_requests(),
                request_limit: p.request_limit(),
                last_request_time,
            }),
            ResourcePolicy::MinuteCooldown(p) => {
                ResourceRecord::MinuteCooldown(MinuteCooldownRecord {
                    key: self.key().to_string(),
                    request_times: p.request_times(),
                    last_request_time,
                })
            }
        }
    }
}

/// Encode the pool as a pretty-printed JSON document.
pub fn encode(resources: &[ResourcePolicy], as_of_day: NaiveDate) -> Result<Vec<u8>> {
    let document = DocumentOut {
        as_of_day: as_of_day.format(DAY_FORMAT).to_string(),
        resources: resources.iter().map(ResourcePolicy::to_record).collect(),
    };
    serde_json::to_vec_pretty(&document)
        .map_err(|e| Error::Encode(format!("serializing snapshot: {e}")))
}

/// Decode a document into resources of `kind`.
///
/// `now` stands in for any record that lacks a `last_request_time`.
pub fn decode(bytes: &[u8], kind: PolicyKind, now: NaiveDateTime) -> Result<Snapshot> {
    let document: DocumentIn = serde_json::from_slice(bytes)
        .map_err(|e| Error::Decode(format!("parsing snapshot: {e}")))?;

    let (as_of_day, records) = match document {
        DocumentIn::Wrapped {
            as_of_day,
            resources,
        } => (as_of_day, resources),
        DocumentIn::Legacy(resources) => (None, resources),
    };

    let as_of_day = as_of_day
        .map(|day| {
            NaiveDate::parse_from_str(&day, DAY_FORMAT)
                .map_err(|e| Error::Decode(format!("as_of_day {day:?}: {e}")))
        })
        .transpose()?;

    let resources = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let decoded = match kind {
                PolicyKind::DailyQuota { .. } => decode_daily_quota(record, now),
                PolicyKind::MinuteCooldown { window } => {
                    decode_minute_cooldown(record, window, now)
                }
            };
            decoded.map_err(|e| match e {
                Error::Decode(msg) => Error::Decode(format!("resource {index}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Snapshot {
        as_of_day,
        resources,
    })
}

/// Decode one daily-quota record.
pub fn decode_daily_quota(record: serde_json::Value, now: NaiveDateTime) -> Result<ResourcePolicy> {
    let record: DailyQuotaRecord =
        serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
    let last_request_time = parse_optional_timestamp(record.last_request_time, now)?;
    Ok(ResourcePolicy::DailyQuota(DailyQuota::new(
        record.key,
        record.number_requests,
        record.request_limit,
        last_request_time,
    )))
}

/// Decode one minute-cooldown record. The window is pool configuration and
/// is not persisted.
pub fn decode_minute_cooldown(
    record: serde_json::Value,
    window: TimeDelta,
    now: NaiveDateTime,
) -> Result<ResourcePolicy> {
    let record: MinuteCooldownRecord =
        serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
    let last_request_time = parse_optional_timestamp(record.last_request_time, now)?;
    Ok(ResourcePolicy::MinuteCooldown(MinuteCooldown::new(
        record.key,
        record.request_times,
        last_request_time,
        window,
    )))
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD` meaning midnight.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(s, DAY_FORMAT).map(|day| day.and_time(NaiveTime::MIN))
        })
        .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn parse_optional_timestamp(s: Option<String>, now: NaiveDateTime) -> Result<NaiveDateTime> {
    match s {
        Some(s) => parse_timestamp(&s),
        None => Ok(now),
    }
}
