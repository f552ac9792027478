//! Health model shared by every engine component
//!
//! - `Status`: closed status enumeration with severity ranking
//! - `Metric` / `MetricKind`: typed measurements
//! - `StatusRecord`: immutable per-update snapshot
//! - `HealthEvent`: dispatcher payload

mod event;
mod metric;
mod record;
mod status;

pub use event::*;
pub use metric::*;
pub use record::*;
pub use status::*;
