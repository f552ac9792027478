//! Health Manager: authoritative status, history and metric store
//!
//! Every status update becomes an immutable [`StatusRecord`] appended to the
//! component's history. Alert callbacks fire only on transitions: a repeated
//! update with the same status is recorded but not re-announced. Each
//! record is then forwarded to an attached [`HealthDashboard`], which takes
//! care of cascading to dependents.
//!
//! With a [`ComponentDirectory`] attached, unknown ids are auto-registered on
//! first update; without one, updating an unregistered id is an error.

pub(crate) mod store;

use crate::dashboard::HealthDashboard;
use crate::dispatch::{ListenerId, StatusListeners};
use crate::registry::ComponentDirectory;
use crate::types::{HealthEvent, Metric, Status, StatusRecord, StatusUpdate, TimeRange};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use store::StatusStore;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of history records kept per component
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("Component '{id}' is not registered (known components: [{}])", .known.join(", "))]
    NotRegistered { id: String, known: Vec<String> },
}

// ============================================================================
// Health Manager
// ============================================================================

pub struct HealthManager {
    store: RwLock<StatusStore>,
    alerts: StatusListeners,
    directory: Option<Arc<dyn ComponentDirectory>>,
    dashboard: RwLock<Option<Arc<HealthDashboard>>>,
}

impl std::fmt::Debug for HealthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthManager")
            .field("components", &self.read().ids())
            .field("alert_callbacks", &self.alerts.len())
            .field("has_directory", &self.directory.is_some())
            .finish()
    }
}

impl Default for HealthManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthManager {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(StatusStore::new(DEFAULT_HISTORY_LIMIT)),
            alerts: StatusListeners::default(),
            directory: None,
            dashboard: RwLock::new(None),
        }
    }

    /// Resolve identities and auto-register through `directory`.
    pub fn with_directory(mut self, directory: Arc<dyn ComponentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Cap per-component history; 0 keeps every record.
    pub fn with_history_limit(self, limit: usize) -> Self {
        Self {
            store: RwLock::new(StatusStore::new(limit)),
            ..self
        }
    }

    /// Forward every recorded update to `dashboard`.
    pub fn attach_dashboard(&self, dashboard: Arc<HealthDashboard>) {
        *self.dashboard.write().unwrap_or_else(PoisonError::into_inner) = Some(dashboard);
    }

    pub fn detach_dashboard(&self) -> Option<Arc<HealthDashboard>> {
        self.dashboard.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn directory(&self) -> Option<&Arc<dyn ComponentDirectory>> {
        self.directory.as_ref()
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn attached_dashboard(&self) -> Option<Arc<HealthDashboard>> {
        self.dashboard
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register `id` locally. Idempotent.
    ///
    /// Description and version left as `None` are filled in from the
    /// attached directory when it knows the component.
    pub fn register_component(&self, id: &str, description: Option<&str>, version: Option<&str>) {
        let info = self.directory.as_ref().and_then(|d| d.describe(id));
        let mut store = self.write();
        let created = !store.contains(id);
        let state = store.entry(id);

        let description = description
            .map(str::to_string)
            .or_else(|| info.as_ref().and_then(|i| i.description.clone()));
        let version = version
            .map(str::to_string)
            .or_else(|| info.as_ref().and_then(|i| i.version.clone()));
        if state.description.is_none() {
            state.description = description;
        }
        if state.version.is_none() {
            state.version = version;
        }

        if created {
            debug!(component = %id, "Component registered with health manager");
        }
    }

    /// Make sure `id` is known, auto-registering through the directory.
    fn resolve(&self, id: &str) -> Result<(), HealthError> {
        if self.read().contains(id) {
            return Ok(());
        }
        match &self.directory {
            Some(directory) => {
                directory.ensure(id);
                self.register_component(id, None, None);
                Ok(())
            }
            None => Err(self.not_registered(id)),
        }
    }

    fn not_registered(&self, id: &str) -> HealthError {
        let mut known = self.read().ids();
        if let Some(directory) = &self.directory {
            known.extend(directory.component_ids());
            known.sort();
            known.dedup();
        }
        HealthError::NotRegistered {
            id: id.to_string(),
            known,
        }
    }

    pub fn update_status(&self, id: &str, status: Status) -> Result<StatusRecord, HealthError> {
        self.update_status_with(id, status, StatusUpdate::default())
    }

    /// Record a new status for `id`.
    ///
    /// Appends a record, fires alert callbacks when the status differs from
    /// the last one announced, and forwards the record to the dashboard.
    pub fn update_status_with(
        &self,
        id: &str,
        status: Status,
        update: StatusUpdate,
    ) -> Result<StatusRecord, HealthError> {
        self.resolve(id)?;

        let (record, previous) = {
            let mut store = self.write();
            let mut metrics = store
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

            let state = store.entry(id);
            let previous = state.last_notified;
            state.last_notified = Some(status);
            store.push_record(record.clone());
            for metric in update.metrics {
                store.append_metric(id, metric);
            }
            (record, previous)
        };

        if previous != Some(status) {
            match previous {
                Some(from) => info!(component = %id, %from, to = %status, "Status transition"),
                None => info!(component = %id, %status, "Initial status recorded"),
            }
            self.alerts.notify(id, status);
        } else {
            debug!(component = %id, %status, "Status unchanged");
        }

        if let Some(dashboard) = self.attached_dashboard() {
            dashboard.apply_record(record.clone());
        }

        Ok(record)
    }

    /// Current record for `id`, or an `UNKNOWN` placeholder.
    pub fn get_status(&self, id: &str) -> StatusRecord {
        self.read()
            .current(id)
            .cloned()
            .unwrap_or_else(|| StatusRecord::unknown(id))
    }

    pub fn status_of(&self, id: &str) -> Status {
        self.read().current(id).map_or(Status::Unknown, |r| r.status)
    }

    /// Status as currently shown: the dashboard's view when one is attached,
    /// which includes cascaded statuses, else this manager's own record.
    pub fn effective_status(&self, id: &str) -> Status {
        match self.attached_dashboard() {
            Some(dashboard) => dashboard.status_for(id),
            None => self.status_of(id),
        }
    }

    pub fn record_metric(&self, id: &str, metric: Metric) -> Result<(), HealthError> {
        self.resolve(id)?;
        debug!(component = %id, metric = %metric.key(), value = metric.value, "Metric recorded");
        self.write().record_metric(id, metric);
        Ok(())
    }

    pub fn register_alert_callback<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&str, Status) + Send + Sync + 'static,
    {
        self.alerts.register(callback)
    }

    pub fn remove_alert_callback(&self, id: ListenerId) -> bool {
        self.alerts.remove(id)
    }

    /// Apply an event as a status update. The reason becomes the message.
    pub fn process_event(&self, event: &HealthEvent) -> Result<StatusRecord, HealthError> {
        let mut update = StatusUpdate::default().at(event.timestamp);
        if !event.reason.is_empty() {
            update.message = Some(event.reason.clone());
        }
        self.update_status_with(&event.component, event.state, update)
    }

    /// Ingest a batch of metrics, then push them to the dashboard once.
    ///
    /// Status is never changed: the dashboard folds the metrics into the
    /// record it currently shows, cascaded or not.
    pub fn update_with_metrics(&self, id: &str, metrics: Vec<Metric>) -> Result<StatusRecord, HealthError> {
        self.resolve(id)?;

        let record = {
            let mut store = self.write();
            let mut current = None;
            for metric in metrics.iter().cloned() {
                current = store.record_metric(id, metric);
            }
            current.unwrap_or_else(|| StatusRecord {
                metrics: store.latest_metrics(id),
                ..StatusRecord::unknown(id)
            })
        };

        if let Some(dashboard) = self.attached_dashboard() {
            dashboard.merge_metrics(id, &metrics);
        }
        Ok(record)
    }

    pub fn history(&self, id: &str, range: Option<TimeRange>) -> Vec<StatusRecord> {
        self.read().history(id, range)
    }

    pub fn metrics(&self, id: &str) -> Vec<Metric> {
        self.read().metrics(id)
    }

    /// Latest value per metric key, derived from the full metric sequence.
    pub fn latest_metrics(&self, id: &str) -> BTreeMap<String, f64> {
        self.read().latest_metrics(id)
    }

    pub fn component_ids(&self) -> Vec<String> {
        self.read().ids()
    }

    pub fn description(&self, id: &str) -> Option<String> {
        self.read().get(id).and_then(|s| s.description.clone())
    }

    pub fn version(&self, id: &str) -> Option<String> {
        self.read().get(id).and_then(|s| s.version.clone())
    }

    /// Forget one component's status, history and metrics.
    ///
    /// Returns false if nothing was stored for it.
    pub fn remove_component(&self, id: &str) -> bool {
        let removed = self.write().remove(id);
        if removed {
            info!(component = %id, "Component removed from health manager");
        }
        removed
    }

    /// Drop all components, history and metrics. Callbacks stay registered.
    pub fn clear(&self) {
        self.write().clear();
        warn!("Health manager state cleared");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ComponentRegistry, ComponentSpec};
    use crate::types::MetricKind;
    use std::sync::Mutex;

    fn with_registry() -> (HealthManager, Arc<ComponentRegistry>) {
        let registry = Arc::new(ComponentRegistry::new());
        let manager = HealthManager::new().with_directory(registry.clone());
        (manager, registry)
    }

    #[test]
    fn test_unregistered_without_directory_fails() {
        let manager = HealthManager::new();
        manager.register_component("api", None, None);

        let err = manager
            .update_status("ghost", Status::Healthy)
            .expect_err("ghost is unknown");
        let HealthError::NotRegistered { id, known } = &err;
        assert_eq!(id, "ghost");
        assert_eq!(known, &vec!["api".to_string()]);
        assert!(err.to_string().contains("api"));
    }

    #[test]
    fn test_directory_auto_registers() {
        let (manager, registry) = with_registry();
        manager.update_status("worker", Status::Healthy).expect("auto-registered");
        assert!(registry.contains("worker"));
        assert_eq!(manager.status_of("worker"), Status::Healthy);
    }

    #[test]
    fn test_register_component_resolves_from_directory() {
        let (manager, registry) = with_registry();
        registry
            .register(ComponentSpec::new("db").version("15.2").description("primary store"))
            .expect("fresh id");

        manager.register_component("db", None, Some("16.0"));
        manager.register_component("db", Some("ignored"), None);
        assert_eq!(manager.description("db").as_deref(), Some("primary store"));
        assert_eq!(manager.version("db").as_deref(), Some("16.0"));
    }

    #[test]
    fn test_alert_fires_once_per_transition() {
        let (manager, _registry) = with_registry();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        manager.register_alert_callback(move |id, status| {
            sink.lock().unwrap().push((id.to_string(), status));
        });

        manager.update_status("svc", Status::Healthy).unwrap();
        manager.update_status("svc", Status::Degraded).unwrap();
        manager.update_status("svc", Status::Degraded).unwrap();

        let fired = fired.lock().unwrap();
        assert_eq!(
            *fired,
            vec![
                ("svc".to_string(), Status::Healthy),
                ("svc".to_string(), Status::Degraded),
            ]
        );
        assert_eq!(manager.history("svc", None).len(), 3);
    }

    #[test]
    fn test_unknown_when_nothing_recorded() {
        let manager = HealthManager::new();
        let record = manager.get_status("nobody");
        assert_eq!(record.status, Status::Unknown);
        assert_eq!(record.component_id, "nobody");
        assert!(manager.history("nobody", None).is_empty());
    }

    #[test]
    fn test_record_metric_updates_current_mapping() {
        let (manager, _registry) = with_registry();
        manager.update_status("api", Status::Healthy).unwrap();
        manager
            .record_metric("api", Metric::new(MetricKind::ResponseTime, 120.0))
            .unwrap();
        manager
            .record_metric("api", Metric::new(MetricKind::ResponseTime, 95.0))
            .unwrap();

        assert_eq!(manager.get_status("api").metrics.get("response_time"), Some(&95.0));
        assert_eq!(manager.metrics("api").len(), 2);
        // history keeps the snapshot taken at update time
        assert!(manager.history("api", None)[0].metrics.is_empty());
    }

    #[test]
    fn test_metrics_carry_into_next_record() {
        let (manager, _registry) = with_registry();
        manager
            .update_status_with(
                "cache",
                Status::Healthy,
                StatusUpdate::default().with_metrics(vec![Metric::new(MetricKind::Latency, 3.0)]),
            )
            .unwrap();
        let record = manager.update_status("cache", Status::Degraded).unwrap();
        assert_eq!(record.metrics.get("latency"), Some(&3.0));
    }

    #[test]
    fn test_process_event_uses_reason_and_timestamp() {
        let (manager, _registry) = with_registry();
        let event = HealthEvent::new("queue", Status::Failed, "broker unreachable");
        let record = manager.process_event(&event).unwrap();
        assert_eq!(record.status, Status::Failed);
        assert_eq!(record.message.as_deref(), Some("broker unreachable"));
        assert_eq!(record.timestamp, event.timestamp);
    }

    #[test]
    fn test_update_with_metrics_keeps_status() {
        let (manager, _registry) = with_registry();
        manager.update_status("db", Status::Degraded).unwrap();
        let record = manager
            .update_with_metrics(
                "db",
                vec![
                    Metric::new(MetricKind::CpuUsage, 0.9),
                    Metric::new(MetricKind::MemoryUsage, 0.5),
                ],
            )
            .unwrap();
        assert_eq!(record.status, Status::Degraded);
        assert_eq!(record.metrics.len(), 2);
        assert_eq!(manager.history("db", None).len(), 1);
    }

    #[test]
    fn test_metrics_only_ingest_keeps_cascaded_status() {
        let (manager, registry) = with_registry();
        let dashboard = Arc::new(HealthDashboard::new().with_directory(registry.clone()));
        manager.attach_dashboard(dashboard.clone());
        registry.ensure_registered("api");
        registry.ensure_registered("db");
        registry.declare_dependency("api", "db");

        manager.update_status("db", Status::Failed).unwrap();
        assert_eq!(dashboard.status_for("api"), Status::Failed);

        manager
            .update_with_metrics("api", vec![Metric::new(MetricKind::Latency, 5.0)])
            .unwrap();
        let shown = dashboard.get_status("api");
        assert_eq!(shown.status, Status::Failed);
        assert_eq!(shown.metrics.get("latency"), Some(&5.0));
        assert_eq!(manager.effective_status("api"), Status::Failed);
    }

    #[test]
    fn test_metric_sequence_bounded_by_history_limit() {
        let manager = HealthManager::new()
            .with_history_limit(2)
            .with_directory(Arc::new(ComponentRegistry::new()));
        manager.update_status("api", Status::Healthy).unwrap();
        for i in 0..500 {
            manager
                .record_metric("api", Metric::new(MetricKind::Latency, f64::from(i)))
                .unwrap();
        }
        assert_eq!(manager.history("api", None).len(), 1);
        assert_eq!(manager.metrics("api").len(), 2);
        assert_eq!(manager.latest_metrics("api").get("latency"), Some(&499.0));
    }

    #[test]
    fn test_remove_component_forgets_state() {
        let (manager, _registry) = with_registry();
        manager.update_status("api", Status::Healthy).unwrap();
        assert!(manager.remove_component("api"));
        assert!(manager.component_ids().is_empty());
        assert!(manager.history("api", None).is_empty());
        assert!(!manager.remove_component("api"));
    }

    #[test]
    fn test_history_limit_trims_oldest() {
        let manager = HealthManager::new()
            .with_history_limit(2)
            .with_directory(Arc::new(ComponentRegistry::new()));
        for status in [Status::Healthy, Status::Degraded, Status::Failed] {
            manager.update_status("api", status).unwrap();
        }
        let history = manager.history("api", None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, Status::Degraded);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (manager, _registry) = with_registry();
        manager.update_status("api", Status::Healthy).unwrap();
        manager.clear();
        assert!(manager.component_ids().is_empty());
        assert_eq!(manager.status_of("api"), Status::Unknown);
    }
}
