//! Component Health: dependency-aware health tracking and self-healing
//!
//! Tracks the health of interdependent software components, keeps a live
//! dependency graph between them, cascades degradation to dependents and
//! drives automated diagnosis and recovery.
//!
//! ## Architecture
//!
//! - **Registry**: component identity, dependency edges, graph queries
//! - **Health Manager**: authoritative status history, metrics, alert callbacks
//! - **Dashboard**: cascading propagation and the schema-stable report
//! - **Dispatcher**: synchronous publish/subscribe for health events
//! - **Reliability**: self-diagnosis, recovery and the recovery policy
//! - **Orchestrator**: composition root built from [`MonitorConfig`]

pub mod background;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod manager;
pub mod orchestrator;
pub mod registry;
pub mod reliability;
pub mod types;

pub use config::{ConfigError, MonitorConfig};
pub use dashboard::{CascadePolicy, HealthDashboard, HealthReport};
pub use dispatch::{DeliveryPolicy, DeliveryReport, DispatchError, EventDispatcher, ListenerId};
pub use manager::{HealthError, HealthManager};
pub use orchestrator::Orchestrator;
pub use registry::{ComponentDirectory, ComponentRegistry, ComponentSpec, RegistryError};
pub use reliability::{
    RecoveryManager, RecoveryPolicy, ReliabilityError, ReliabilityManager, SelfHealingPair,
};
pub use types::{HealthEvent, Metric, MetricKind, Status, StatusRecord, StatusUpdate, TimeRange};
