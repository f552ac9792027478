//! Health events broadcast through the dispatcher
//!
//! Wire shape: `{component, state, reason, timestamp}`. The timestamp is
//! emitted as RFC 3339 and accepted either as an RFC 3339 string or as a
//! numeric epoch (seconds, fractional allowed).

use super::Status;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Immutable notification that a component reached a status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthEvent {
    pub component: String,
    pub state: Status,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl HealthEvent {
    pub fn new(component: impl Into<String>, state: Status, reason: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl std::fmt::Display for HealthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.component, self.state)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Text(String),
    Epoch(f64),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match WireTimestamp::deserialize(deserializer)? {
        WireTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{text}': {e}"))),
        WireTimestamp::Epoch(secs) => {
            if !secs.is_finite() {
                return Err(D::Error::custom("epoch timestamp must be finite"));
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
                .single()
                .ok_or_else(|| D::Error::custom(format!("epoch timestamp out of range: {secs}")))
        }
    }
}
