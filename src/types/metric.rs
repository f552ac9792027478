//! Typed component metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of measurement a metric carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    Uptime,
    ResponseTime,
    Latency,
    Throughput,
    ErrorRate,
    CpuUsage,
    MemoryUsage,
    Custom,
}

impl MetricKind {
    /// Snake-case key used in metric mappings
    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Uptime => "uptime",
            MetricKind::ResponseTime => "response_time",
            MetricKind::Latency => "latency",
            MetricKind::Throughput => "throughput",
            MetricKind::ErrorRate => "error_rate",
            MetricKind::CpuUsage => "cpu_usage",
            MetricKind::MemoryUsage => "memory_usage",
            MetricKind::Custom => "custom",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A single measurement reported for a component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value,
            name: None,
            unit: None,
            timestamp: Utc::now(),
        }
    }

    /// Named `Custom` metric, e.g. `health_state`
    pub fn custom(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(MetricKind::Custom, value)
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mapping key: the kind name, or the metric name for named custom metrics.
    pub fn key(&self) -> String {
        match (&self.kind, &self.name) {
            (MetricKind::Custom, Some(name)) => name.clone(),
            (kind, _) => kind.key().to_string(),
        }
    }
}
