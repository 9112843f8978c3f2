//! Decaying health score of one endpoint.
//!
//! # Algorithm
//! ```text
//! after every call:
//!     score += min(idle, recover_max_wait) * recover_score_per_ms   (capped at 0)
//!     score += error_penalty          on failure
//!     score += high_latency_penalty   on success slower than max_latency_allowed
//!     Healthy and score <= fallback threshold → Unhealthy
//! during a recovery probe only:
//!     Unhealthy and score >= recover threshold → Healthy
//! ```
//!
//! The store can pin an endpoint Unhealthy. A pinned endpoint ignores the
//! recover threshold until the store reports it Healthy again, after which
//! the next recovery probe decides as usual.

use std::time::Duration;

use crate::config::EndpointConfig;
use crate::health::state::Healthiness;

/// Scoring-relevant classification of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    /// Succeeded, but slower than `max_latency_allowed_ms`.
    SlowSuccess,
    Failure,
}

impl CallOutcome {
    pub fn classify(succeeded: bool, latency: Duration, config: &EndpointConfig) -> Self {
        if !succeeded {
            CallOutcome::Failure
        } else if latency > config.max_latency_allowed() {
            CallOutcome::SlowSuccess
        } else {
            CallOutcome::Success
        }
    }

    /// Metric status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::SlowSuccess => "success_high_latency",
            CallOutcome::Failure => "failed",
        }
    }
}

/// Health score and flag of one endpoint. Not synchronized; the owner
/// serializes access.
#[derive(Debug, Clone)]
pub struct HealthScore {
    score: f64,
    healthiness: Healthiness,
    pinned_by_store: bool,
}

impl Default for HealthScore {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthScore {
    pub fn new() -> Self {
        Self {
            score: 0.0,
            healthiness: Healthiness::Healthy,
            pinned_by_store: false,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn healthiness(&self) -> Healthiness {
        self.healthiness
    }

    pub fn is_pinned_by_store(&self) -> bool {
        self.pinned_by_store
    }

    /// Credit idle time, bounded by `recover_max_wait`. Never raises the score above 0.
    pub fn decay(&mut self, idle: Duration, config: &EndpointConfig) {
        let credited = idle.min(config.recover_max_wait());
        let recovered = credited.as_millis() as f64 * config.recover_score_per_ms;
        self.score = (self.score + recovered).min(0.0);
    }

    pub fn penalize(&mut self, outcome: CallOutcome, config: &EndpointConfig) {
        match outcome {
            CallOutcome::Failure => self.score += config.error_penalty,
            CallOutcome::SlowSuccess => self.score += config.high_latency_penalty,
            CallOutcome::Success => {}
        }
    }

    /// Apply one finished call. Returns the new healthiness if it changed.
    pub fn record(
        &mut self,
        idle: Duration,
        outcome: CallOutcome,
        recovery_probe: bool,
        config: &EndpointConfig,
    ) -> Option<Healthiness> {
        self.decay(idle, config);
        self.penalize(outcome, config);

        if self.healthiness.is_healthy() && self.score <= config.health_score_fallback_threshold {
            self.healthiness = Healthiness::Unhealthy;
            return Some(Healthiness::Unhealthy);
        }

        if recovery_probe
            && !self.healthiness.is_healthy()
            && !self.pinned_by_store
            && self.score >= config.health_score_recover_threshold
        {
            self.healthiness = Healthiness::Healthy;
            return Some(Healthiness::Healthy);
        }

        None
    }

    /// Adopt the healthiness read from the distributed store. Returns the new
    /// healthiness if it changed.
    pub fn adopt_stored(&mut self, stored: Healthiness) -> Option<Healthiness> {
        match stored {
            Healthiness::Unhealthy => {
                self.pinned_by_store = true;
                if self.healthiness.is_healthy() {
                    self.healthiness = Healthiness::Unhealthy;
                    return Some(Healthiness::Unhealthy);
                }
                None
            }
            Healthiness::Healthy => {
                self.pinned_by_store = false;
                None
            }
        }
    }
}
