//! Schema-stable health report
//!
//! The report is consumed by an external endpoint that must never leak
//! fields outside a fixed allow-list. Every allowed key is always present;
//! values that could not be computed are emitted as `null`.

use crate::types::{Status, StatusRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys that are always present in a serialized report
pub const REPORT_KEYS: [&str; 5] = ["component", "state", "timestamp", "metrics", "reason"];

/// Key emitted only when per-component detail is requested
pub const COMPONENTS_KEY: &str = "components";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub component: Option<String>,
    pub state: Option<Status>,
    pub timestamp: Option<DateTime<Utc>>,
    pub metrics: Option<BTreeMap<String, f64>>,
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<BTreeMap<String, Status>>,
}

impl HealthReport {
    /// Roll up component records: worst status wins.
    ///
    /// FAILED (or DOWN) beats DEGRADED beats HEALTHY. Statuses such as
    /// UNKNOWN and PAUSED are listed but do not change the rollup.
    pub fn rollup(name: Option<String>, records: &[StatusRecord], include_components: bool) -> Self {
        let components = include_components.then(|| {
            records
                .iter()
                .map(|r| (r.component_id.clone(), r.status))
                .collect::<BTreeMap<_, _>>()
        });

        if records.is_empty() {
            return Self {
                component: name,
                state: None,
                timestamp: Some(Utc::now()),
                metrics: None,
                reason: None,
                components,
            };
        }

        let failed = ids_where(records, |s| matches!(s, Status::Failed | Status::Down));
        let degraded = ids_where(records, |s| matches!(s, Status::Degraded));
        let healthy = ids_where(records, Status::is_healthy);

        let (state, reason) = if !failed.is_empty() {
            let mut reason = format!("failed: {}", failed.join(", "));
            if !degraded.is_empty() {
                reason.push_str(&format!("; degraded: {}", degraded.join(", ")));
            }
            (Status::Failed, reason)
        } else if !degraded.is_empty() {
            (Status::Degraded, format!("degraded: {}", degraded.join(", ")))
        } else {
            (Status::Healthy, "no failed or degraded components".to_string())
        };

        let total = records.len();
        let mut metrics = BTreeMap::new();
        metrics.insert("components".to_string(), total as f64);
        metrics.insert("healthy".to_string(), healthy.len() as f64);
        metrics.insert("degraded".to_string(), degraded.len() as f64);
        metrics.insert("failed".to_string(), failed.len() as f64);
        metrics.insert(
            "other".to_string(),
            (total - healthy.len() - degraded.len() - failed.len()) as f64,
        );

        Self {
            component: name,
            state: Some(state),
            timestamp: Some(Utc::now()),
            metrics: Some(metrics),
            reason: Some(reason),
            components,
        }
    }

    /// JSON object restricted to the report allow-list.
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        let full = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        for key in REPORT_KEYS {
            map.insert(
                key.to_string(),
                full.get(key).cloned().unwrap_or(serde_json::Value::Null),
            );
        }
        if self.components.is_some() {
            if let Some(components) = full.get(COMPONENTS_KEY) {
                map.insert(COMPONENTS_KEY.to_string(), components.clone());
            }
        }
        serde_json::Value::Object(map)
    }
}

fn ids_where<F>(records: &[StatusRecord], pred: F) -> Vec<String>
where
    F: Fn(&Status) -> bool,
{
    records
        .iter()
        .filter(|r| pred(&r.status))
        .map(|r| r.component_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(value: &serde_json::Value) -> Vec<String> {
        let mut keys: Vec<String> = value
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    #[test]
    fn test_empty_report_keeps_schema() {
        let report = HealthReport::rollup(None, &[], false);
        let value = report.to_value();
        assert_eq!(keys(&value), vec!["component", "metrics", "reason", "state", "timestamp"]);
        assert!(value["state"].is_null());
        assert!(value["component"].is_null());
    }

    #[test]
    fn test_worst_status_wins() {
        let records = vec![
            StatusRecord::new("api", Status::Degraded),
            StatusRecord::new("db", Status::Failed),
            StatusRecord::new("cache", Status::Healthy),
        ];
        let report = HealthReport::rollup(Some("system".into()), &records, true);
        assert_eq!(report.state, Some(Status::Failed));
        let reason = report.reason.clone().unwrap_or_default();
        assert!(reason.contains("db"));
        assert!(reason.contains("api"));

        let value = report.to_value();
        assert_eq!(value["state"], "FAILED");
        assert_eq!(
            keys(&value),
            vec!["component", "components", "metrics", "reason", "state", "timestamp"]
        );
    }

    #[test]
    fn test_unknown_does_not_degrade_rollup() {
        let records = vec![
            StatusRecord::new("api", Status::Healthy),
            StatusRecord::new("batch", Status::Paused),
            StatusRecord::new("new", Status::Unknown),
        ];
        let report = HealthReport::rollup(None, &records, false);
        assert_eq!(report.state, Some(Status::Healthy));
        assert_eq!(report.metrics.as_ref().and_then(|m| m.get("other")), Some(&2.0));
    }
}
