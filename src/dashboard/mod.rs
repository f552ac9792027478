//! Health Dashboard: read/write façade with cascading propagation
//!
//! Keeps its own cache of status records (fed directly or forwarded by the
//! [`HealthManager`](crate::manager::HealthManager)) and propagates DEGRADED
//! and FAILED to dependents of the reporting component.
//!
//! ## Cascade policy
//!
//! | Policy       | Reach                                   |
//! |--------------|-----------------------------------------|
//! | `single_hop` | direct dependents only (default)        |
//! | `transitive` | every component that depends on it      |
//! | `disabled`   | no propagation                          |
//!
//! Cascaded records carry the message `cascaded from <id>`. A cascaded
//! record never triggers a further cascade of its own; under `transitive`
//! the full set of dependents is computed up front instead.
//!
//! Dependents come from the attached [`ComponentDirectory`], or from a local
//! graph installed with `set_dependency_graph` when no directory is attached.

pub mod report;

pub use report::{HealthReport, COMPONENTS_KEY, REPORT_KEYS};

use crate::dispatch::{ListenerId, StatusListeners};
use crate::manager::store::StatusStore;
use crate::manager::DEFAULT_HISTORY_LIMIT;
use crate::registry::graph::{self, DependencyGraph};
use crate::registry::ComponentDirectory;
use crate::types::{Metric, Status, StatusRecord, StatusUpdate, TimeRange};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Name reported in the `component` field when none is configured
pub const DEFAULT_REPORT_COMPONENT: &str = "system";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    Disabled,
    #[default]
    SingleHop,
    Transitive,
}

pub struct HealthDashboard {
    store: RwLock<StatusStore>,
    listeners: StatusListeners,
    directory: Option<Arc<dyn ComponentDirectory>>,
    local_graph: RwLock<DependencyGraph>,
    cascade: CascadePolicy,
    report_component: Option<String>,
}

impl std::fmt::Debug for HealthDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthDashboard")
            .field("cascade", &self.cascade)
            .field("listeners", &self.listeners.len())
            .field("has_directory", &self.directory.is_some())
            .finish()
    }
}

impl Default for HealthDashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthDashboard {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(StatusStore::new(DEFAULT_HISTORY_LIMIT)),
            listeners: StatusListeners::default(),
            directory: None,
            local_graph: RwLock::new(DependencyGraph::new()),
            cascade: CascadePolicy::default(),
            report_component: Some(DEFAULT_REPORT_COMPONENT.to_string()),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn ComponentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_cascade_policy(mut self, policy: CascadePolicy) -> Self {
        self.cascade = policy;
        self
    }

    /// Value of the report's `component` key; `None` emits null.
    pub fn with_report_component(mut self, name: Option<String>) -> Self {
        self.report_component = name;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.store = RwLock::new(StatusStore::new(limit));
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cascade_policy(&self) -> CascadePolicy {
        self.cascade
    }

    pub fn supports_cascading(&self) -> bool {
        self.cascade != CascadePolicy::Disabled
    }

    pub fn update_status(&self, id: &str, status: Status) -> StatusRecord {
        self.update_status_with(id, status, StatusUpdate::default())
    }

    /// Record a status, notify listeners, then cascade per policy.
    pub fn update_status_with(&self, id: &str, status: Status, update: StatusUpdate) -> StatusRecord {
        let mut metrics = self
            .read()
            .current(id)
            .map(|r| r.metrics.clone())
            .unwrap_or_default();
        for metric in &update.metrics {
            metrics.insert(metric.key(), metric.value);
        }
        let record = StatusRecord {
            component_id: id.to_string(),
            status,
            timestamp: update.timestamp.unwrap_or_else(Utc::now),
            metrics,
            message: update.message,
        };
        self.apply_record(record.clone());
        record
    }

    /// Store an already-built record and cascade from it.
    pub fn apply_record(&self, record: StatusRecord) {
        let id = record.component_id.clone();
        let status = record.status;
        self.write().push_record(record);
        debug!(component = %id, %status, "Dashboard status updated");
        self.listeners.notify(&id, status);
        self.cascade_from(&id, status);
    }

    /// Fold metrics into the record currently shown for `id`.
    ///
    /// The status is kept as is (cascaded, registry-derived or UNKNOWN), so
    /// nothing cascades from a metrics-only update.
    pub fn merge_metrics(&self, id: &str, metrics: &[Metric]) -> StatusRecord {
        let base = StatusRecord {
            timestamp: Utc::now(),
            ..self.record_for(id)
        };
        let record = metrics.iter().fold(base, |record, metric| record.with_metric(metric));
        self.write().push_record(record.clone());
        debug!(component = %id, metrics = metrics.len(), "Dashboard metrics merged");
        self.listeners.notify(id, record.status);
        record
    }

    fn cascade_from(&self, source: &str, status: Status) {
        if !status.cascades() {
            return;
        }
        let targets: BTreeSet<String> = match self.cascade {
            CascadePolicy::Disabled => return,
            CascadePolicy::SingleHop => self.get_dependents(source).into_iter().collect(),
            CascadePolicy::Transitive => graph::reachable(source, |node| self.get_dependents(node)),
        };

        for target in targets.into_iter().filter(|t| t != source) {
            let message = format!("cascaded from {source}");
            let record = {
                let mut store = self.write();
                let carried = store
                    .current(&target)
                    .map(|r| r.metrics.clone())
                    .unwrap_or_default();
                let record = StatusRecord {
                    metrics: carried,
                    ..StatusRecord::new(&target, status).with_message(message)
                };
                store.push_record(record.clone());
                record
            };
            info!(component = %record.component_id, %status, source, "Status cascaded");
            self.listeners.notify(&record.component_id, status);
        }
    }

    /// Current status: cached record, then directory, then `UNKNOWN`.
    pub fn status_for(&self, id: &str) -> Status {
        self.record_for(id).status
    }

    /// Current record: cached if present, else a transient record built
    /// from the directory, else an `UNKNOWN` placeholder.
    pub fn record_for(&self, id: &str) -> StatusRecord {
        if let Some(record) = self.read().current(id).cloned() {
            return record;
        }
        self.directory
            .as_ref()
            .and_then(|d| d.describe(id))
            .map(|info| StatusRecord::new(id, info.status).with_message("from registry"))
            .unwrap_or_else(|| StatusRecord::unknown(id))
    }

    /// Always a record, never a bare status.
    pub fn get_status(&self, id: &str) -> StatusRecord {
        self.record_for(id)
    }

    pub fn register_status_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, Status) + Send + Sync + 'static,
    {
        self.listeners.register(listener)
    }

    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn get_history(&self, id: &str, range: Option<TimeRange>) -> Vec<StatusRecord> {
        self.read().history(id, range)
    }

    /// Install a fallback graph (id → dependencies) for use without a directory.
    pub fn set_dependency_graph(&self, graph: DependencyGraph) {
        *self.local_graph.write().unwrap_or_else(PoisonError::into_inner) = graph;
    }

    pub fn get_dependents(&self, id: &str) -> Vec<String> {
        match &self.directory {
            Some(directory) => directory.direct_dependents(id),
            None => graph::direct_dependents(
                &self.local_graph.read().unwrap_or_else(PoisonError::into_inner),
                id,
            ),
        }
    }

    /// Roll-up report over every known component.
    ///
    /// Known means: has a cached record here, or is registered in the
    /// directory (reported with its registry status).
    pub fn get_report(&self, include_components: bool) -> HealthReport {
        let mut ids: BTreeSet<String> = self.read().ids().into_iter().collect();
        if let Some(directory) = &self.directory {
            ids.extend(directory.component_ids());
        }
        let records: Vec<StatusRecord> = ids.iter().map(|id| self.record_for(id)).collect();
        HealthReport::rollup(self.report_component.clone(), &records, include_components)
    }

    /// Forget `id`: cached records, history and local graph edges.
    pub fn remove_component(&self, id: &str) -> bool {
        let removed = self.write().remove(id);
        let mut local = self.local_graph.write().unwrap_or_else(PoisonError::into_inner);
        let in_graph = local.remove(id).is_some();
        for deps in local.values_mut() {
            deps.retain(|d| d != id);
        }
        removed || in_graph
    }

    pub fn clear(&self) {
        self.write().clear();
        self.local_graph
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ComponentRegistry, ComponentSpec};
    use std::sync::Mutex;

    fn topology(edges: &[(&str, &str)], extra: &[&str]) -> Arc<ComponentRegistry> {
        let registry = Arc::new(ComponentRegistry::new());
        for (a, b) in edges {
            registry.ensure_registered(a);
            registry.ensure_registered(b);
        }
        for id in extra {
            registry.ensure_registered(id);
        }
        for (a, b) in edges {
            registry.declare_dependency(a, b);
        }
        registry
    }

    #[test]
    fn test_single_hop_cascade_to_direct_dependents() {
        let registry = topology(&[("d1", "p"), ("d2", "p"), ("g", "d1")], &["e"]);
        let dashboard = HealthDashboard::new().with_directory(registry);

        dashboard.update_status("e", Status::Healthy);
        dashboard.update_status("p", Status::Degraded);

        for dependent in ["d1", "d2"] {
            let record = dashboard.get_status(dependent);
            assert_eq!(record.status, Status::Degraded);
            assert!(record.message.unwrap_or_default().contains("p"));
        }
        assert_eq!(dashboard.status_for("e"), Status::Healthy);
        // single hop: grandchild untouched
        assert_eq!(dashboard.status_for("g"), Status::Unknown);
    }

    #[test]
    fn test_transitive_cascade_reaches_grandchildren() {
        let registry = topology(&[("d1", "p"), ("g", "d1")], &[]);
        let dashboard = HealthDashboard::new()
            .with_directory(registry)
            .with_cascade_policy(CascadePolicy::Transitive);

        dashboard.update_status("p", Status::Failed);
        assert_eq!(dashboard.status_for("g"), Status::Failed);
        assert_eq!(
            dashboard.get_status("g").message.as_deref(),
            Some("cascaded from p")
        );
    }

    #[test]
    fn test_healthy_does_not_cascade() {
        let registry = topology(&[("d1", "p")], &[]);
        let dashboard = HealthDashboard::new().with_directory(registry);
        dashboard.update_status("p", Status::Healthy);
        assert_eq!(dashboard.status_for("d1"), Status::Unknown);
    }

    #[test]
    fn test_disabled_policy_does_not_cascade() {
        let registry = topology(&[("d1", "p")], &[]);
        let dashboard = HealthDashboard::new()
            .with_directory(registry)
            .with_cascade_policy(CascadePolicy::Disabled);
        assert!(!dashboard.supports_cascading());
        dashboard.update_status("p", Status::Failed);
        assert_eq!(dashboard.status_for("d1"), Status::Unknown);
    }

    #[test]
    fn test_listeners_hear_cascaded_updates() {
        let registry = topology(&[("api", "db")], &[]);
        let dashboard = HealthDashboard::new().with_directory(registry);
        let heard = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&heard);
        dashboard.register_status_listener(move |id, status| {
            sink.lock().unwrap().push(format!("{id}={status}"));
        });

        dashboard.update_status("db", Status::Failed);
        assert_eq!(*heard.lock().unwrap(), vec!["db=FAILED", "api=FAILED"]);
    }

    #[test]
    fn test_self_loop_does_not_recascade_source() {
        let registry = topology(&[("loop", "loop")], &[]);
        let dashboard = HealthDashboard::new().with_directory(registry);
        dashboard.update_status("loop", Status::Degraded);
        assert_eq!(dashboard.get_history("loop", None).len(), 1);
    }

    #[test]
    fn test_local_graph_fallback() {
        let dashboard = HealthDashboard::new();
        let mut graph = DependencyGraph::new();
        graph.insert("web".to_string(), vec!["auth".to_string()]);
        graph.insert("auth".to_string(), Vec::new());
        dashboard.set_dependency_graph(graph);

        assert_eq!(dashboard.get_dependents("auth"), vec!["web".to_string()]);
        dashboard.update_status("auth", Status::Degraded);
        assert_eq!(dashboard.status_for("web"), Status::Degraded);
    }

    #[test]
    fn test_status_falls_back_to_registry() {
        let registry = Arc::new(ComponentRegistry::new());
        registry
            .register(ComponentSpec::new("legacy").status(Status::Paused))
            .expect("fresh id");
        let dashboard = HealthDashboard::new().with_directory(registry);

        let record = dashboard.get_status("legacy");
        assert_eq!(record.status, Status::Paused);
        assert_eq!(dashboard.get_status("missing").status, Status::Unknown);
        assert!(dashboard.get_history("legacy", None).is_empty());
    }

    #[test]
    fn test_report_after_cascade() {
        let registry = topology(&[("api", "db")], &[]);
        let dashboard = HealthDashboard::new().with_directory(registry);
        dashboard.update_status("db", Status::Failed);

        let value = dashboard.get_report(false).to_value();
        assert_eq!(value["state"], "FAILED");
        assert!(value["reason"].as_str().unwrap_or_default().contains("db"));
        assert_eq!(value["component"], DEFAULT_REPORT_COMPONENT);
    }

    #[test]
    fn test_merge_metrics_keeps_shown_status() {
        let registry = topology(&[("api", "db")], &[]);
        let dashboard = HealthDashboard::new().with_directory(registry);
        dashboard.update_status("db", Status::Failed);

        let record = dashboard.merge_metrics("api", &[Metric::custom("queue_depth", 12.0)]);
        assert_eq!(record.status, Status::Failed);
        assert_eq!(dashboard.get_status("api").metrics.get("queue_depth"), Some(&12.0));
        assert_eq!(dashboard.status_for("api"), Status::Failed);
    }

    #[test]
    fn test_remove_component_drops_it_from_report() {
        let dashboard = HealthDashboard::new();
        dashboard.update_status("api", Status::Healthy);
        dashboard.update_status("db", Status::Failed);

        assert!(dashboard.remove_component("db"));
        let report = dashboard.get_report(true);
        assert_eq!(report.state, Some(Status::Healthy));
        assert!(!report.components.unwrap_or_default().contains_key("db"));
        assert!(!dashboard.remove_component("db"));
    }

    #[test]
    fn test_clear_drops_cache_and_local_graph() {
        let dashboard = HealthDashboard::new();
        let mut graph = DependencyGraph::new();
        graph.insert("web".to_string(), vec!["auth".to_string()]);
        dashboard.set_dependency_graph(graph);
        dashboard.update_status("auth", Status::Healthy);

        dashboard.clear();
        assert!(dashboard.get_dependents("auth").is_empty());
        assert_eq!(dashboard.status_for("auth"), Status::Unknown);
    }
}
