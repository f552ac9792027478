//! Event Dispatcher: publish/subscribe hub for health events
//!
//! Producers (the reliability loop, the orchestrator, alert bridges) call
//! `fire`; consumers register listeners. Delivery is synchronous: `fire`
//! returns once every listener has run. Listeners are invoked in
//! registration order against a snapshot taken when `fire` starts, so a
//! listener may unsubscribe itself (or others) without disturbing the
//! delivery in progress.
//!
//! ## Delivery policy
//!
//! - `Isolate` (default): a failing listener is logged and recorded in the
//!   returned [`DeliveryReport`]; the remaining listeners still run.
//! - `FailFast`: the first failure aborts delivery and is returned as
//!   [`DispatchError::ListenerFailed`].

use crate::types::{HealthEvent, Status};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type listeners return to signal a failed delivery
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type EventListener = Arc<dyn Fn(&HealthEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Handle returned on registration, used to remove a listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Listener {listener:?} failed for {component}: {source}")]
    ListenerFailed {
        listener: ListenerId,
        component: String,
        #[source]
        source: ListenerError,
    },
}

// ============================================================================
// Delivery
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    #[default]
    Isolate,
    FailFast,
}

/// Outcome of one `fire` call
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<(ListenerId, String)>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, EventListener)>,
}

/// Synchronous fan-out of [`HealthEvent`]s to registered listeners
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Listeners>,
    policy: DeliveryPolicy,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .field("policy", &self.policy)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DeliveryPolicy) -> Self {
        Self {
            listeners: RwLock::default(),
            policy,
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    pub fn register_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&HealthEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.next_id += 1;
        let id = ListenerId::new(listeners.next_id);
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the listener was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.entries.len();
        listeners.entries.retain(|(existing, _)| *existing != id);
        before != listeners.entries.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Deliver `event` to every listener registered at call time.
    pub fn fire(&self, event: &HealthEvent) -> Result<DeliveryReport, DispatchError> {
        if event.component.trim().is_empty() {
            return Err(DispatchError::InvalidEvent(
                "event has an empty component id".to_string(),
            ));
        }

        // Snapshot, then release the lock before calling out.
        let snapshot: Vec<(ListenerId, EventListener)> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone();

        debug!(component = %event.component, state = %event.state, listeners = snapshot.len(), "Firing event");

        let mut report = DeliveryReport::default();
        for (id, listener) in snapshot {
            match listener(event) {
                Ok(()) => report.delivered += 1,
                Err(source) => match self.policy {
                    DeliveryPolicy::FailFast => {
                        return Err(DispatchError::ListenerFailed {
                            listener: id,
                            component: event.component.clone(),
                            source,
                        });
                    }
                    DeliveryPolicy::Isolate => {
                        warn!(component = %event.component, listener = ?id, error = %source, "Event listener failed");
                        report.failures.push((id, source.to_string()));
                    }
                },
            }
        }
        Ok(report)
    }

    /// Deliver an event given in its wire shape.
    ///
    /// Anything that does not deserialize into a [`HealthEvent`] is rejected
    /// with [`DispatchError::InvalidEvent`] before any listener runs.
    pub fn fire_value(&self, value: serde_json::Value) -> Result<DeliveryReport, DispatchError> {
        let event: HealthEvent = serde_json::from_value(value)
            .map_err(|e| DispatchError::InvalidEvent(e.to_string()))?;
        self.fire(&event)
    }
}

// ============================================================================
// Status listeners
// ============================================================================

/// Callback signature shared by alert callbacks and dashboard listeners
pub type StatusListener = Arc<dyn Fn(&str, Status) + Send + Sync>;

/// Ordered list of `(component, status)` callbacks.
///
/// Used by the health manager for alert callbacks and by the dashboard for
/// status listeners. `notify` works on a snapshot, so callbacks may register
/// or remove listeners while being invoked.
#[derive(Default)]
pub struct StatusListeners {
    inner: RwLock<Vec<(ListenerId, StatusListener)>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl StatusListeners {
    pub fn register<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, Status) + Send + Sync + 'static,
    {
        let id = ListenerId::new(
            self.next_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                + 1,
        );
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.len();
        inner.retain(|(existing, _)| *existing != id);
        before != inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, component: &str, status: Status) {
        let snapshot: Vec<StatusListener> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(component, status);
        }
    }
}

impl std::fmt::Debug for StatusListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusListeners").field("len", &self.len()).finish()
    }
}
