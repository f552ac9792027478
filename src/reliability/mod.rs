//! Self-diagnosis and self-healing
//!
//! Two per-component managers split detection from repair:
//!
//! - [`ReliabilityManager`] reads status and dependency health. A component
//!   that is not HEALTHY is flagged DEGRADED; it is never repaired here.
//! - [`RecoveryManager`] forces a degraded component back to HEALTHY and
//!   records an audit entry in the directory.
//!
//! Neither manager ever sets FAILED; that only comes from external reports.
//! [`SelfHealingPair`] bundles both with a [`RecoveryPolicy`] so a scheduler
//! can run diagnosis every cycle and recovery only after enough consecutive
//! degraded diagnoses.

use crate::dispatch::EventDispatcher;
use crate::manager::{HealthError, HealthManager};
use crate::registry::ComponentDirectory;
use crate::types::{HealthEvent, Metric, Status, StatusUpdate};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Custom metric recorded by every diagnosis: 1.0 healthy, 0.0 degraded
pub const HEALTH_STATE_METRIC: &str = "health_state";

/// Custom metric recorded by a successful recovery
pub const RECOVERY_STATE_METRIC: &str = "recovery_state";

#[derive(Debug, Error)]
pub enum ReliabilityError {
    #[error(transparent)]
    Health(#[from] HealthError),
}

/// Fire on the dispatcher; delivery failures are logged, never propagated.
fn publish(dispatcher: &EventDispatcher, event: HealthEvent) {
    match dispatcher.fire(&event) {
        Ok(report) if !report.is_clean() => {
            warn!(
                component = %event.component,
                failures = report.failures.len(),
                "Some listeners rejected health event"
            );
        }
        Ok(_) => {}
        Err(e) => warn!(component = %event.component, error = %e, "Health event delivery aborted"),
    }
}

// ============================================================================
// Reliability Manager
// ============================================================================

pub struct ReliabilityManager {
    component_id: String,
    manager: Arc<HealthManager>,
    directory: Option<Arc<dyn ComponentDirectory>>,
    dispatcher: Arc<EventDispatcher>,
}

impl ReliabilityManager {
    /// The directory is taken from `manager` when it has one.
    pub fn new(
        component_id: impl Into<String>,
        manager: Arc<HealthManager>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let directory = manager.directory().cloned();
        Self {
            component_id: component_id.into(),
            manager,
            directory,
            dispatcher,
        }
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Diagnose the component. Returns whether it passed.
    ///
    /// A non-HEALTHY component is moved to DEGRADED (mirrored into the
    /// directory) and a DEGRADED event is fired. A HEALTHY one is
    /// re-affirmed and a "diagnosis passed" event is fired.
    pub fn self_diagnose(&self, reason: &str) -> Result<bool, ReliabilityError> {
        let id = self.component_id.as_str();
        let current = self.manager.effective_status(id);

        if current.is_healthy() {
            let update = StatusUpdate::message(reason)
                .with_metrics(vec![Metric::custom(HEALTH_STATE_METRIC, 1.0)]);
            self.manager.update_status_with(id, Status::Healthy, update)?;
            debug!(component = %id, "Diagnosis passed");
            publish(
                &self.dispatcher,
                HealthEvent::new(id, Status::Healthy, format!("diagnosis passed: {reason}")),
            );
            return Ok(true);
        }

        let update = StatusUpdate::message(reason)
            .with_metrics(vec![Metric::custom(HEALTH_STATE_METRIC, 0.0)]);
        self.manager.update_status_with(id, Status::Degraded, update)?;
        if let Some(directory) = &self.directory {
            directory.notify_status(id, Status::Degraded);
        }
        warn!(component = %id, previous = %current, reason, "Diagnosis flagged degradation");
        publish(&self.dispatcher, HealthEvent::new(id, Status::Degraded, reason));
        Ok(false)
    }

    /// False when any declared dependency is not HEALTHY.
    pub fn check_dependencies(&self) -> bool {
        let Some(directory) = &self.directory else {
            return true;
        };

        let mut healthy = true;
        for dependency in directory.direct_dependencies(&self.component_id) {
            let status = match self.manager.effective_status(&dependency) {
                Status::Unknown => directory
                    .describe(&dependency)
                    .map_or(Status::Unknown, |info| info.status),
                status => status,
            };
            if !status.is_healthy() {
                warn!(
                    component = %self.component_id,
                    dependency = %dependency,
                    %status,
                    "Unhealthy dependency"
                );
                healthy = false;
            }
        }
        healthy
    }
}

// ============================================================================
// Recovery Manager
// ============================================================================

pub struct RecoveryManager {
    component_id: String,
    manager: Arc<HealthManager>,
    directory: Option<Arc<dyn ComponentDirectory>>,
    dispatcher: Arc<EventDispatcher>,
}

impl RecoveryManager {
    pub fn new(
        component_id: impl Into<String>,
        manager: Arc<HealthManager>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let directory = manager.directory().cloned();
        Self {
            component_id: component_id.into(),
            manager,
            directory,
            dispatcher,
        }
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Force the component back to HEALTHY. Returns whether anything changed.
    pub fn attempt_recovery(&self, reason: &str) -> Result<bool, ReliabilityError> {
        let id = self.component_id.as_str();
        let current = self.manager.effective_status(id);

        if current.is_healthy() {
            debug!(component = %id, "Recovery skipped, already healthy");
            publish(
                &self.dispatcher,
                HealthEvent::new(id, Status::Healthy, format!("no recovery needed: {reason}")),
            );
            return Ok(false);
        }

        let message = format!("automatic recovery: {reason}");
        let update = StatusUpdate::message(message.clone())
            .with_metrics(vec![Metric::custom(RECOVERY_STATE_METRIC, 1.0)]);
        self.manager.update_status_with(id, Status::Healthy, update)?;
        if let Some(directory) = &self.directory {
            directory.notify_status(id, Status::Healthy);
            directory.record_recovery(id, reason);
        }
        info!(component = %id, from = %current, reason, "Component recovered");
        publish(&self.dispatcher, HealthEvent::new(id, Status::Healthy, message));
        Ok(true)
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Recover after `degraded_threshold` consecutive failed diagnoses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub enabled: bool,
    pub degraded_threshold: u32,
    consecutive: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::new(true, 3)
    }
}

impl RecoveryPolicy {
    /// A threshold of 0 behaves like 1.
    pub fn new(enabled: bool, degraded_threshold: u32) -> Self {
        Self {
            enabled,
            degraded_threshold: degraded_threshold.max(1),
            consecutive: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 1)
    }

    /// Feed one diagnosis result. True means: recover now.
    pub fn observe(&mut self, diagnosis_passed: bool) -> bool {
        if diagnosis_passed {
            self.consecutive = 0;
            return false;
        }
        self.consecutive = self.consecutive.saturating_add(1);
        if self.enabled && self.consecutive >= self.degraded_threshold {
            self.consecutive = 0;
            return true;
        }
        false
    }

    pub fn consecutive_degraded(&self) -> u32 {
        self.consecutive
    }
}

// ============================================================================
// Self-healing pair
// ============================================================================

/// Result of one diagnosis/recovery cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub component: String,
    pub diagnosis_passed: bool,
    pub dependencies_healthy: bool,
    pub recovered: bool,
}

pub struct SelfHealingPair {
    pub reliability: ReliabilityManager,
    pub recovery: RecoveryManager,
    policy: RecoveryPolicy,
}

impl SelfHealingPair {
    pub fn new(reliability: ReliabilityManager, recovery: RecoveryManager, policy: RecoveryPolicy) -> Self {
        Self {
            reliability,
            recovery,
            policy,
        }
    }

    pub fn component_id(&self) -> &str {
        self.reliability.component_id()
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Diagnose, check dependencies, then recover if the policy says so.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, ReliabilityError> {
        let diagnosis_passed = self.reliability.self_diagnose("scheduled diagnosis")?;
        let dependencies_healthy = self.reliability.check_dependencies();

        let recovered = if self.policy.observe(diagnosis_passed) {
            let reason = format!(
                "degraded for {} consecutive diagnoses",
                self.policy.degraded_threshold
            );
            self.recovery.attempt_recovery(&reason)?
        } else {
            false
        };

        Ok(CycleOutcome {
            component: self.component_id().to_string(),
            diagnosis_passed,
            dependencies_healthy,
            recovered,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
