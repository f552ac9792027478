//! Status snapshots and history windows

use super::{Metric, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable snapshot of a component's status at one point in time.
///
/// Appended to history on every update; the most recent one is the
/// component's current status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub component_id: String,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    /// Latest value per metric key
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusRecord {
    pub fn new(component_id: impl Into<String>, status: Status) -> Self {
        Self {
            component_id: component_id.into(),
            status,
            timestamp: Utc::now(),
            metrics: BTreeMap::new(),
            message: None,
        }
    }

    /// Placeholder returned when nothing has been recorded for a component
    pub fn unknown(component_id: impl Into<String>) -> Self {
        Self::new(component_id, Status::Unknown)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Copy of this record with one metric folded into the mapping.
    pub fn with_metric(&self, metric: &Metric) -> Self {
        let mut next = self.clone();
        next.metrics.insert(metric.key(), metric.value);
        next
    }
}

/// Optional extras for a status update
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub metrics: Vec<Metric>,
    pub message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Inclusive time window used to filter history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window ending now and reaching back `duration`
    pub fn last(duration: chrono::Duration) -> Self {
        let end = Utc::now();
        Self { start: end - duration, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Filter records by an optional window, preserving order.
pub fn filter_history<'a, I>(records: I, range: Option<TimeRange>) -> Vec<StatusRecord>
where
    I: IntoIterator<Item = &'a StatusRecord>,
{
    records
        .into_iter()
        .filter(|r| range.map_or(true, |range| range.contains(r.timestamp)))
        .cloned()
        .collect()
}
