//! Capability interface consumers use to reach the component registry
//!
//! Managers, the dashboard and the reliability loop only ever talk to the
//! registry through this trait, so tests can substitute a fake and hosts can
//! back it with something other than [`ComponentRegistry`](super::ComponentRegistry).

use crate::types::Status;

/// Identity fields a directory can resolve for a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub status: Status,
}

pub trait ComponentDirectory: Send + Sync {
    /// Look up a component's identity; `None` when it is not registered.
    fn describe(&self, id: &str) -> Option<ComponentInfo>;

    /// Every registered id.
    fn component_ids(&self) -> Vec<String>;

    /// Register `id` if unknown. Returns true when it was created.
    fn ensure(&self, id: &str) -> bool;

    fn direct_dependencies(&self, id: &str) -> Vec<String>;

    fn direct_dependents(&self, id: &str) -> Vec<String>;

    /// Mirror a status change into the directory.
    fn notify_status(&self, id: &str, status: Status);

    /// Audit hook invoked after an automatic recovery.
    fn record_recovery(&self, id: &str, reason: &str);
}
