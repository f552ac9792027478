//! Orchestrator: composition root and external entry points
//!
//! Owns one instance of every engine part and wires them together:
//!
//! ```text
//!   producer ──► HealthManager ──► HealthDashboard ──► cascade via registry
//!                     │ alerts (bridge_alerts)
//!                     ▼
//!               EventDispatcher ◄── Reliability / Recovery
//! ```

use crate::background::SelfHealer;
use crate::config::MonitorConfig;
use crate::dashboard::{HealthDashboard, HealthReport};
use crate::dispatch::{DeliveryReport, DispatchError, EventDispatcher, ListenerId};
use crate::manager::{HealthError, HealthManager};
use crate::registry::{ComponentRegistry, ComponentSpec};
use crate::reliability::{RecoveryManager, RecoveryPolicy, ReliabilityManager, SelfHealingPair};
use crate::types::{HealthEvent, Status, StatusRecord, StatusUpdate};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Orchestrator {
    registry: Arc<ComponentRegistry>,
    manager: Arc<HealthManager>,
    dashboard: Arc<HealthDashboard>,
    dispatcher: Arc<EventDispatcher>,
    recovery_policy: RecoveryPolicy,
    interval: Duration,
    include_components: bool,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl Orchestrator {
    /// Wire pre-built parts. The dashboard is attached to the manager.
    pub fn new(
        registry: Arc<ComponentRegistry>,
        manager: Arc<HealthManager>,
        dashboard: Arc<HealthDashboard>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        manager.attach_dashboard(dashboard.clone());
        Self {
            registry,
            manager,
            dashboard,
            dispatcher,
            recovery_policy: RecoveryPolicy::default(),
            interval: crate::background::DEFAULT_INTERVAL,
            include_components: false,
        }
    }

    /// Build the whole engine from configuration, topology included.
    ///
    /// Components are registered in file order, then dependencies are
    /// declared, so forward references inside the file are fine.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let registry = Arc::new(ComponentRegistry::new());
        for component in &config.components {
            let mut spec = ComponentSpec::new(&component.id);
            if let Some(version) = &component.version {
                spec = spec.version(version);
            }
            if let Some(description) = &component.description {
                spec = spec.description(description);
            }
            if let Err(e) = registry.register(spec) {
                warn!(error = %e, "Skipping configured component");
            }
        }
        for component in &config.components {
            for dependency in &component.depends_on {
                registry.declare_dependency(&component.id, dependency);
            }
        }

        let dispatcher = Arc::new(EventDispatcher::with_policy(config.dispatch.policy));
        let dashboard = Arc::new(
            HealthDashboard::new()
                .with_history_limit(config.history.limit)
                .with_directory(registry.clone())
                .with_cascade_policy(config.cascade.policy)
                .with_report_component(Some(config.monitor.name.clone())),
        );
        let manager = Arc::new(
            HealthManager::new()
                .with_history_limit(config.history.limit)
                .with_directory(registry.clone()),
        );

        info!(
            monitor = %config.monitor.name,
            components = registry.len(),
            cascade = ?config.cascade.policy,
            "Health engine assembled"
        );

        Self {
            recovery_policy: RecoveryPolicy::new(
                config.recovery.enabled,
                config.recovery.degraded_threshold,
            ),
            interval: Duration::from_secs(config.recovery.interval_secs.max(1)),
            include_components: config.report.include_components,
            ..Self::new(registry, manager, dashboard, dispatcher)
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<HealthManager> {
        &self.manager
    }

    pub fn dashboard(&self) -> &Arc<HealthDashboard> {
        &self.dashboard
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Report a status on behalf of an external producer.
    ///
    /// Goes through the manager (history, alerts, dashboard cascade) and is
    /// mirrored into the registry.
    pub fn propagate_status(
        &self,
        id: &str,
        status: Status,
        message: Option<&str>,
    ) -> Result<StatusRecord, HealthError> {
        let update = match message {
            Some(message) => StatusUpdate::message(message),
            None => StatusUpdate::default(),
        };
        let record = self.manager.update_status_with(id, status, update)?;
        self.registry.set_status(id, status);
        debug!(component = %id, %status, "Status propagated");
        Ok(record)
    }

    /// Forget a component in the registry, the manager and the dashboard.
    ///
    /// Returns false when none of them knew the id.
    pub fn unregister(&self, id: &str) -> bool {
        let in_registry = self.registry.unregister(id);
        let in_manager = self.manager.remove_component(id);
        let in_dashboard = self.dashboard.remove_component(id);
        in_registry || in_manager || in_dashboard
    }

    pub fn fire_event(&self, event: &HealthEvent) -> Result<DeliveryReport, DispatchError> {
        self.dispatcher.fire(event)
    }

    /// Publish every manager alert transition as a dispatcher event.
    ///
    /// The callback holds the dispatcher weakly; once the orchestrator is
    /// gone the bridge goes quiet.
    pub fn bridge_alerts(&self) -> ListenerId {
        let dispatcher: Weak<EventDispatcher> = Arc::downgrade(&self.dispatcher);
        self.manager.register_alert_callback(move |id, status| {
            let Some(dispatcher) = dispatcher.upgrade() else {
                return;
            };
            let event = HealthEvent::new(id, status, "status transition");
            if let Err(e) = dispatcher.fire(&event) {
                warn!(component = %id, error = %e, "Alert bridge delivery failed");
            }
        })
    }

    /// Reliability/recovery pair for one component, with the configured policy.
    pub fn self_healing_pair(&self, id: &str) -> SelfHealingPair {
        SelfHealingPair::new(
            ReliabilityManager::new(id, self.manager.clone(), self.dispatcher.clone()),
            RecoveryManager::new(id, self.manager.clone(), self.dispatcher.clone()),
            self.recovery_policy.clone(),
        )
    }

    /// Self-healer covering every registered component.
    pub fn self_healer(&self) -> SelfHealer {
        let pairs = self
            .registry
            .component_ids()
            .iter()
            .map(|id| self.self_healing_pair(id))
            .collect();
        SelfHealer::new(pairs, self.interval)
    }

    pub fn report(&self) -> HealthReport {
        self.dashboard.get_report(self.include_components)
    }
}

// ============================================================================
// Tests
// ============================================================================
