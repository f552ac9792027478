//! Background services: scheduled diagnosis and self-healing
//!
//! Runs as a tokio task that diagnoses every configured component on an
//! interval and performs automatic recovery per policy.

pub mod self_healer;

pub use self_healer::{HealerSummary, SelfHealer, DEFAULT_INTERVAL, MIN_INTERVAL};
