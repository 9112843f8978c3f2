//! Endpoint health state.
//!
//! # States
//! - Healthy: endpoint receives traffic
//! - Unhealthy: endpoint excluded from selection, only probed
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: score <= fallback threshold after any call
//! Unhealthy → Healthy: score >= recover threshold during a recovery probe
//! ```
//!
//! `HealthState` is the externally visible record shared through the
//! distributed health store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Health flag of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Healthiness {
    Healthy,
    Unhealthy,
}

impl Healthiness {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Healthiness::Healthy)
    }

    /// Parse a stored value; anything unrecognized is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "HEALTHY" => Some(Healthiness::Healthy),
            "UNHEALTHY" => Some(Healthiness::Unhealthy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Healthiness::Healthy => "HEALTHY",
            Healthiness::Unhealthy => "UNHEALTHY",
        }
    }
}

impl fmt::Display for Healthiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible health record of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    pub healthiness: Healthiness,
    /// Alarms currently firing for this provider.
    pub ongoing_alarms: Vec<String>,
    /// Incremented on every change; used for optimistic updates.
    pub version: u64,
}

impl HealthState {
    pub fn new(healthiness: Healthiness, ongoing_alarms: Vec<String>, version: u64) -> Self {
        Self {
            healthiness,
            ongoing_alarms,
            version,
        }
    }
}

/// Stored document shape. Fields are kept as raw JSON so older or foreign
/// documents decode instead of failing; a field of the wrong type counts as
/// missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredHealthState {
    #[serde(default)]
    pub healthiness: Value,
    #[serde(default)]
    pub ongoing_alarms: Value,
    #[serde(default)]
    pub version: Value,
}

impl StoredHealthState {
    /// A document without a recognizable healthiness counts as absent.
    pub fn into_state(self) -> Option<HealthState> {
        let healthiness = Healthiness::parse(self.healthiness.as_str()?)?;
        let ongoing_alarms = match self.ongoing_alarms {
            Value::Array(alarms) => alarms
                .into_iter()
                .filter_map(|alarm| alarm.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Some(HealthState {
            healthiness,
            ongoing_alarms,
            version: self.version.as_u64().unwrap_or(0),
        })
    }
}
