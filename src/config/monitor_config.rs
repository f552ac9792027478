//! Monitor configuration: TOML-backed settings and component topology

use crate::dashboard::CascadePolicy;
use crate::dispatch::DeliveryPolicy;
use crate::manager::DEFAULT_HISTORY_LIMIT;
use crate::registry::graph::{self, DependencyGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "HEALTH_MONITOR_CONFIG";

/// File looked up in the working directory when the env var is unset
pub const DEFAULT_CONFIG_FILE: &str = "health_monitor.toml";

/// Complete monitor configuration.
///
/// Every section is `#[serde(default)]`, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorInfo,

    #[serde(default)]
    pub cascade: CascadeConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub report: ReportConfig,

    /// Declared topology
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$HEALTH_MONITOR_CONFIG`
    /// 2. `./health_monitor.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), monitor = %config.monitor.name, "Loaded config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(monitor = %config.monitor.name, "Loaded config from ./{DEFAULT_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{DEFAULT_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {DEFAULT_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Monitor config saved");
        Ok(())
    }

    /// Topology as an adjacency map (id → declared dependencies).
    pub fn dependency_graph(&self) -> DependencyGraph {
        self.components
            .iter()
            .map(|c| (c.id.clone(), c.depends_on.clone()))
            .collect()
    }

    /// Validate settings and topology.
    ///
    /// Rules:
    /// - Component ids are non-empty and unique
    /// - Every `depends_on` entry names a declared component
    /// - Recovery threshold and interval are positive
    ///
    /// Dependency cycles are allowed and only logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.recovery.degraded_threshold == 0 {
            errors.push("recovery.degraded_threshold must be > 0".to_string());
        }
        if self.recovery.interval_secs == 0 {
            errors.push("recovery.interval_secs must be > 0".to_string());
        }

        let mut seen = BTreeSet::new();
        for component in &self.components {
            if component.id.trim().is_empty() {
                errors.push("components: id must not be empty".to_string());
            } else if !seen.insert(component.id.as_str()) {
                errors.push(format!("components: duplicate id '{}'", component.id));
            }
        }

        for component in &self.components {
            for dependency in &component.depends_on {
                if !seen.contains(dependency.as_str()) {
                    errors.push(format!(
                        "components.{}: depends on undeclared component '{}'",
                        component.id, dependency
                    ));
                }
            }
        }

        if let Some(cycle) = graph::find_cycle(&self.dependency_graph()) {
            warn!(cycle = %cycle.join(" -> "), "Configured topology contains a dependency cycle");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorInfo {
    /// Reported as the `component` key of the health report
    #[serde(default = "default_monitor_name")]
    pub name: String,
}

fn default_monitor_name() -> String {
    crate::dashboard::DEFAULT_REPORT_COMPONENT.to_string()
}

impl Default for MonitorInfo {
    fn default() -> Self {
        Self {
            name: default_monitor_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CascadeConfig {
    #[serde(default)]
    pub policy: CascadePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Records kept per component; 0 keeps everything
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    #[serde(default)]
    pub policy: DeliveryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Consecutive degraded diagnoses before recovery is attempted
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: u32,

    /// Seconds between self-healer cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_true() -> bool { true }
fn default_degraded_threshold() -> u32 { 3 }
fn default_interval_secs() -> u64 { 30 }

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            degraded_threshold: default_degraded_threshold(),
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Add the per-component `components` key to reports
    #[serde(default)]
    pub include_components: bool,
}

/// One `[[components]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================
