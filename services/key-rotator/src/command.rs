//! Subcommand execution against an open pool.
//!
//! Every command produces one JSON document; `main` prints it.

use anyhow::{Context, Result};
use key_pool::{PolicyParams, ResourcePolicy, RotationManager};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tracing::info;

use crate::cli::Command;
use crate::metrics;

/// Run `command`. With a metrics handle, `status` also reports this run's counters.
pub fn execute(
    command: &Command,
    manager: &mut RotationManager,
    prometheus: Option<&PrometheusHandle>,
) -> Result<Value> {
    match command {
        Command::Add { key, limit } => {
            let params = match limit {
                Some(request_limit) => PolicyParams::DailyQuota {
                    request_limit: *request_limit,
                },
                None => manager.kind().default_params(),
            };
            manager
                .add_with(key.as_str(), params)
                .with_context(|| format!("failed to add key {key}"))?;
            info!(key = %key, "key added");
            Ok(json!({ "added": key, "resources_total": manager.len() }))
        }
        Command::Current => {
            let current = manager.current().map(describe).transpose()?;
            Ok(json!({ "current": current }))
        }
        Command::Dispatch { count } => {
            let mut dispatched = Vec::new();
            let mut exhausted = false;
            for _ in 0..*count {
                match manager
                    .dispatch_request()
                    .context("failed to dispatch request")?
                {
                    Some(key) => dispatched.push(key),
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            Ok(json!({ "dispatched": dispatched, "exhausted": exhausted }))
        }
        Command::List => {
            let resources = manager
                .list()
                .iter()
                .map(describe)
                .collect::<Result<Vec<Value>>>()?;
            Ok(json!({
                "policy": manager.kind().label(),
                "resources": resources
            }))
        }
        Command::Status => {
            let mut health = manager.health();
            if let Some(handle) = prometheus {
                health["metrics"] = metrics::series(handle);
            }
            Ok(health)
        }
        Command::Remove { key } => {
            let removed = manager
                .remove(key)
                .with_context(|| format!("failed to remove key {key}"))?;
            Ok(json!({ "removed": removed, "key": key }))
        }
        Command::Flush => {
            manager.flush().context("failed to write snapshot")?;
            Ok(json!({
                "flushed": manager.storage_location().is_some(),
                "location": manager.storage_location()
            }))
        }
    }
}

fn describe(resource: &ResourcePolicy) -> Result<Value> {
    serde_json::to_value(resource.to_record())
        .with_context(|| format!("failed to render key {}", resource.key()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use key_pool::{ManualClock, MemoryStorage, PolicyKind};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::Arc;

    fn clock() -> Arc<ManualClock> {
        let now = NaiveDateTime::parse_from_str("2026-10-19 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Arc::new(ManualClock::new(now))
    }

    fn add(key: &str, limit: Option<u64>) -> Command {
        Command::Add {
            key: key.into(),
            limit,
        }
    }

    #[test]
    fn add_then_dispatch_reports_keys() {
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());
        execute(&add("a", Some(2)), &mut manager, None).unwrap();
        execute(&add("b", Some(1)), &mut manager, None).unwrap();

        let out = execute(&Command::Dispatch { count: 5 }, &mut manager, None).unwrap();
        assert_eq!(out["dispatched"], json!(["a", "a", "b"]));
        assert_eq!(out["exhausted"], json!(true));
    }

    #[test]
    fn add_without_limit_uses_pool_default() {
        let kind = PolicyKind::DailyQuota { default_limit: 7 };
        let mut manager = RotationManager::in_memory(kind, clock());
        execute(&add("a", None), &mut manager, None).unwrap();

        let out = execute(&Command::List, &mut manager, None).unwrap();
        assert_eq!(out["policy"], json!("daily_quota"));
        assert_eq!(out["resources"][0]["request_limit"], json!(7));
        assert_eq!(out["resources"][0]["number_requests"], json!(0));
    }

    #[test]
    fn limit_on_cooldown_pool_is_rejected() {
        let mut manager = RotationManager::in_memory(PolicyKind::minute_cooldown(), clock());
        let err = execute(&add("a", Some(3)), &mut manager, None).unwrap_err();
        assert!(err.to_string().contains("failed to add key a"), "got: {err}");
        assert!(manager.is_empty());
    }

    #[test]
    fn current_is_null_for_empty_pool() {
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());
        let out = execute(&Command::Current, &mut manager, None).unwrap();
        assert_eq!(out, json!({ "current": null }));
    }

    #[test]
    fn current_describes_selected_key() {
        let mut manager = RotationManager::in_memory(PolicyKind::minute_cooldown(), clock());
        execute(&add("a", None), &mut manager, None).unwrap();
        execute(&add("b", None), &mut manager, None).unwrap();
        execute(&Command::Dispatch { count: 1 }, &mut manager, None).unwrap();

        let out = execute(&Command::Current, &mut manager, None).unwrap();
        assert_eq!(out["current"]["key"], json!("b"));
        assert_eq!(out["current"]["request_times"], json!(0));
    }

    #[test]
    fn remove_reports_whether_key_existed() {
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());
        execute(&add("a", None), &mut manager, None).unwrap();

        let out = execute(&Command::Remove { key: "a".into() }, &mut manager, None).unwrap();
        assert_eq!(out["removed"], json!(true));
        let out = execute(&Command::Remove { key: "a".into() }, &mut manager, None).unwrap();
        assert_eq!(out["removed"], json!(false));
    }

    #[test]
    fn status_is_pool_health() {
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());
        execute(&add("a", Some(1)), &mut manager, None).unwrap();
        execute(&Command::Dispatch { count: 1 }, &mut manager, None).unwrap();

        let out = execute(&Command::Status, &mut manager, None).unwrap();
        assert_eq!(out["status"], json!("unhealthy"));
        assert_eq!(out["resources_exhausted"], json!(1));
    }

    #[test]
    fn status_reports_counters_from_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());

        let out = ::metrics::with_local_recorder(&recorder, || {
            execute(&add("a", Some(1)), &mut manager, None).unwrap();
            execute(&Command::Dispatch { count: 2 }, &mut manager, None).unwrap();
            execute(&Command::Status, &mut manager, Some(&handle)).unwrap()
        });

        assert_eq!(out["metrics"]["key_pool_dispatch_total{key=\"a\"}"], json!(1.0));
        assert_eq!(out["metrics"]["key_pool_exhausted_total"], json!(1.0));
    }

    #[test]
    fn status_without_recorder_has_no_metrics() {
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());
        let out = execute(&Command::Status, &mut manager, None).unwrap();
        assert!(out.get("metrics").is_none());
    }

    #[test]
    fn flush_writes_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = RotationManager::open(
            PolicyKind::daily_quota(),
            Box::new(Arc::clone(&storage)),
            clock(),
        )
        .unwrap();
        assert!(storage.contents().is_none());

        let out = execute(&Command::Flush, &mut manager, None).unwrap();
        assert_eq!(out["flushed"], json!(true));
        assert_eq!(out["location"], json!("memory"));
        assert!(storage.contents().is_some());
    }

    #[test]
    fn flush_without_storage_is_noop() {
        let mut manager = RotationManager::in_memory(PolicyKind::daily_quota(), clock());
        let out = execute(&Command::Flush, &mut manager, None).unwrap();
        assert_eq!(out["flushed"], json!(false));
    }
}
