//! Component status enumeration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Status
// ============================================================================

/// Health status of a tracked component.
///
/// No transition is structurally forbidden. A few carry protocol meaning:
/// the reliability loop moves components between `Healthy` and `Degraded`,
/// while `Failed` is only ever reported from outside.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Nothing has been reported yet
    #[default]
    Unknown,
    /// Operating normally (accepted as `RUNNING` on input)
    #[serde(alias = "RUNNING")]
    Healthy,
    /// Running with reduced capability
    Degraded,
    /// Not operational
    Failed,
    /// Deliberately or unexpectedly offline
    Down,
    /// Suspended by an operator
    Paused,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Unknown,
        Status::Healthy,
        Status::Degraded,
        Status::Failed,
        Status::Down,
        Status::Paused,
    ];

    /// Upper-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "UNKNOWN",
            Status::Healthy => "HEALTHY",
            Status::Degraded => "DEGRADED",
            Status::Failed => "FAILED",
            Status::Down => "DOWN",
            Status::Paused => "PAUSED",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Status::Healthy)
    }

    /// Whether this status propagates to dependents when cascading.
    pub fn cascades(&self) -> bool {
        matches!(self, Status::Degraded | Status::Failed)
    }

    /// Ordering used by "worst status wins" rollups.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Healthy => 0,
            Status::Paused => 1,
            Status::Unknown => 2,
            Status::Degraded => 3,
            Status::Down => 4,
            Status::Failed => 5,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Status::Unknown),
            "HEALTHY" | "RUNNING" => Ok(Status::Healthy),
            "DEGRADED" => Ok(Status::Degraded),
            "FAILED" => Ok(Status::Failed),
            "DOWN" => Ok(Status::Down),
            "PAUSED" => Ok(Status::Paused),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}
