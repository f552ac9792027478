//! Monitor Configuration Module
//!
//! Settings and component topology loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `HEALTH_MONITOR_CONFIG` environment variable (path to TOML file)
//! 2. `health_monitor.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Example
//!
//! ```toml
//! [monitor]
//! name = "checkout"
//!
//! [cascade]
//! policy = "single_hop"   # or "transitive", "disabled"
//!
//! [recovery]
//! degraded_threshold = 3
//! interval_secs = 30
//!
//! [[components]]
//! id = "api"
//! depends_on = ["db"]
//!
//! [[components]]
//! id = "db"
//! ```
//!
//! The config is passed explicitly to
//! [`Orchestrator::from_config`](crate::orchestrator::Orchestrator::from_config);
//! there is no global instance.

mod monitor_config;

pub use monitor_config::*;
