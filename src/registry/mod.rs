//! Component Registry: identity and dependency edges
//!
//! Source of truth for which components exist and what each one depends on.
//! Graph queries (dependents, impact, closure, cycles) are computed live from
//! the adjacency lists on every call; nothing is cached, so results always
//! reflect the current graph shape.
//!
//! ## Edges
//!
//! `declare_dependency(dependent, dependency)` appends `dependency` to the
//! dependent's ordered list. Both ends must be registered. Duplicates are
//! suppressed; self-loops and mutual dependencies are allowed.

pub mod directory;
pub mod graph;

pub use directory::{ComponentDirectory, ComponentInfo};
pub use graph::DependencyGraph;

use crate::types::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),
}

// ============================================================================
// Component
// ============================================================================

/// Audit entry written by the recovery hook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryAudit {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// A registered component and its declared dependencies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub id: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub status: Status,
    /// Direct dependencies in declaration order
    pub dependencies: Vec<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub recoveries: Vec<RecoveryAudit>,
}

/// Registration request
#[derive(Debug, Clone, Default)]
pub struct ComponentSpec {
    pub id: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub initial_status: Option<Status>,
}

impl ComponentSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.initial_status = Some(status);
        self
    }

    fn build(self) -> Component {
        Component {
            id: self.id,
            description: self.description,
            version: self.version,
            status: self.initial_status.unwrap_or_default(),
            dependencies: Vec::new(),
            registered_at: Utc::now(),
            recoveries: Vec::new(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// In-memory component registry guarded by a single reader/writer lock.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: RwLock<BTreeMap<String, Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation completes under one guard, so a poisoned lock still
    // holds a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Component>> {
        self.components.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Component>> {
        self.components.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new component. Fails if the id is already taken.
    pub fn register(&self, spec: ComponentSpec) -> Result<(), RegistryError> {
        let mut components = self.write();
        if components.contains_key(&spec.id) {
            return Err(RegistryError::DuplicateComponent(spec.id));
        }
        info!(component = %spec.id, "Component registered");
        components.insert(spec.id.clone(), spec.build());
        Ok(())
    }

    /// Lazy registration used on first reference. Never fails.
    ///
    /// Returns true when the component was created by this call.
    pub fn ensure_registered(&self, id: &str) -> bool {
        let mut components = self.write();
        if components.contains_key(id) {
            return false;
        }
        debug!(component = %id, "Component auto-registered");
        components.insert(id.to_string(), ComponentSpec::new(id).build());
        true
    }

    /// Remove a component and every edge pointing at it.
    pub fn unregister(&self, id: &str) -> bool {
        let mut components = self.write();
        if components.remove(id).is_none() {
            return false;
        }
        for component in components.values_mut() {
            component.dependencies.retain(|dep| dep != id);
        }
        info!(component = %id, "Component unregistered");
        true
    }

    /// Declare that `dependent` depends on `dependency`.
    ///
    /// Returns false when either end is not registered. Declaring the same
    /// edge twice is a no-op that still returns true.
    pub fn declare_dependency(&self, dependent: &str, dependency: &str) -> bool {
        let mut components = self.write();
        if !components.contains_key(dependency) {
            warn!(dependent, dependency, "Rejected dependency: dependency not registered");
            return false;
        }
        let Some(component) = components.get_mut(dependent) else {
            warn!(dependent, dependency, "Rejected dependency: dependent not registered");
            return false;
        };
        if !component.dependencies.iter().any(|d| d == dependency) {
            component.dependencies.push(dependency.to_string());
            debug!(dependent, dependency, "Dependency declared");
        }
        true
    }

    pub fn remove_dependency(&self, dependent: &str, dependency: &str) -> bool {
        let mut components = self.write();
        let Some(component) = components.get_mut(dependent) else {
            return false;
        };
        let before = component.dependencies.len();
        component.dependencies.retain(|d| d != dependency);
        before != component.dependencies.len()
    }

    pub fn get_dependencies(&self, id: &str) -> Vec<String> {
        self.read()
            .get(id)
            .map(|c| c.dependencies.clone())
            .unwrap_or_default()
    }

    pub fn get_dependents(&self, id: &str) -> Vec<String> {
        self.read()
            .values()
            .filter(|c| c.dependencies.iter().any(|d| d == id))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Every registered id mapped to its direct dependencies, empty lists included.
    pub fn get_dependency_graph(&self) -> DependencyGraph {
        self.read()
            .iter()
            .map(|(id, c)| (id.clone(), c.dependencies.clone()))
            .collect()
    }

    /// Components directly affected if `id` fails.
    ///
    /// Direct dependents only; use [`get_all_dependents`](Self::get_all_dependents)
    /// for the full blast radius.
    pub fn analyze_impact(&self, id: &str) -> BTreeSet<String> {
        self.get_dependents(id).into_iter().collect()
    }

    pub fn get_all_dependencies(&self, id: &str) -> BTreeSet<String> {
        graph::transitive_dependencies(&self.get_dependency_graph(), id)
    }

    pub fn get_all_dependents(&self, id: &str) -> BTreeSet<String> {
        graph::transitive_dependents(&self.get_dependency_graph(), id)
    }

    pub fn has_cycle(&self) -> bool {
        graph::has_cycle(&self.get_dependency_graph())
    }

    pub fn find_cycle(&self) -> Option<Vec<String>> {
        graph::find_cycle(&self.get_dependency_graph())
    }

    /// Extension point for version constraints between dependents and
    /// dependencies. No constraints are modelled yet, so every component is
    /// compatible.
    pub fn check_version_compatibility(&self, _id: &str) -> bool {
        true
    }

    pub fn get_component(&self, id: &str) -> Option<Component> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn component_ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Overwrite the registry-side status. False if `id` is unknown.
    pub fn set_status(&self, id: &str, status: Status) -> bool {
        match self.write().get_mut(id) {
            Some(component) => {
                component.status = status;
                true
            }
            None => false,
        }
    }

    pub fn recovery_log(&self, id: &str) -> Vec<RecoveryAudit> {
        self.read()
            .get(id)
            .map(|c| c.recoveries.clone())
            .unwrap_or_default()
    }
}

impl ComponentDirectory for ComponentRegistry {
    fn describe(&self, id: &str) -> Option<ComponentInfo> {
        self.read().get(id).map(|c| ComponentInfo {
            id: c.id.clone(),
            description: c.description.clone(),
            version: c.version.clone(),
            status: c.status,
        })
    }

    fn component_ids(&self) -> Vec<String> {
        ComponentRegistry::component_ids(self)
    }

    fn ensure(&self, id: &str) -> bool {
        self.ensure_registered(id)
    }

    fn direct_dependencies(&self, id: &str) -> Vec<String> {
        self.get_dependencies(id)
    }

    fn direct_dependents(&self, id: &str) -> Vec<String> {
        self.get_dependents(id)
    }

    fn notify_status(&self, id: &str, status: Status) {
        if !self.set_status(id, status) {
            debug!(component = %id, %status, "Status mirror skipped: component not registered");
        }
    }

    fn record_recovery(&self, id: &str, reason: &str) {
        if let Some(component) = self.write().get_mut(id) {
            component.recoveries.push(RecoveryAudit {
                timestamp: Utc::now(),
                reason: reason.to_string(),
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
