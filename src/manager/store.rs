//! Per-component status, history and metric storage
//!
//! Plain data structure with no locking of its own; the manager and the
//! dashboard each wrap one in their `RwLock`.

use crate::types::{filter_history, Metric, StatusRecord, TimeRange};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub(crate) struct ComponentState {
    pub description: Option<String>,
    pub version: Option<String>,
    pub current: Option<StatusRecord>,
    pub history: VecDeque<StatusRecord>,
    pub metrics: VecDeque<Metric>,
    /// Last status handed to alert callbacks
    pub last_notified: Option<crate::types::Status>,
}

#[derive(Debug, Default)]
pub(crate) struct StatusStore {
    components: BTreeMap<String, ComponentState>,
    /// Maximum history entries and metrics kept per component; 0 keeps everything
    history_limit: usize,
}

impl StatusStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            components: BTreeMap::new(),
            history_limit,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&ComponentState> {
        self.components.get(id)
    }

    pub fn entry(&mut self, id: &str) -> &mut ComponentState {
        self.components.entry(id.to_string()).or_default()
    }

    /// Make `record` current and append it to history.
    pub fn push_record(&mut self, record: StatusRecord) {
        let limit = self.history_limit;
        let state = self.entry(&record.component_id);
        state.history.push_back(record.clone());
        trim_front(&mut state.history, limit);
        state.current = Some(record);
    }

    /// Append to the metric sequence without touching the current record.
    pub fn append_metric(&mut self, id: &str, metric: Metric) {
        let limit = self.history_limit;
        let state = self.entry(id);
        state.metrics.push_back(metric);
        trim_front(&mut state.metrics, limit);
    }

    pub fn current(&self, id: &str) -> Option<&StatusRecord> {
        self.components.get(id).and_then(|s| s.current.as_ref())
    }

    /// Append a metric and fold it into the current record.
    ///
    /// Returns the updated current record, if one exists.
    pub fn record_metric(&mut self, id: &str, metric: Metric) -> Option<StatusRecord> {
        let state = self.entry(id);
        if let Some(current) = state.current.as_mut() {
            current.metrics.insert(metric.key(), metric.value);
        }
        self.append_metric(id, metric);
        self.current(id).cloned()
    }

    pub fn metrics(&self, id: &str) -> Vec<Metric> {
        self.components
            .get(id)
            .map(|s| s.metrics.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn history(&self, id: &str, range: Option<TimeRange>) -> Vec<StatusRecord> {
        match self.components.get(id) {
            Some(state) => filter_history(&state.history, range),
            None => Vec::new(),
        }
    }

    /// Latest value per metric key across the component's metric sequence
    pub fn latest_metrics(&self, id: &str) -> BTreeMap<String, f64> {
        let mut latest = BTreeMap::new();
        if let Some(state) = self.components.get(id) {
            for metric in &state.metrics {
                latest.insert(metric.key(), metric.value);
            }
        }
        latest
    }

    /// Drop one component entirely. Returns false if it was unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        self.components.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.components.clear();
    }
}

fn trim_front<T>(items: &mut VecDeque<T>, limit: usize) {
    if limit > 0 {
        while items.len() > limit {
            items.pop_front();
        }
    }
}
