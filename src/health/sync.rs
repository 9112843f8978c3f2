//! Pull-based sync of one endpoint against the distributed health store.
//!
//! # Data Flow
//! ```text
//! call finished
//!     → try_claim (interval elapsed? sampled?)
//!     → background task: repository.read(provider_id)
//!     → endpoint adopts stored healthiness
//! ```
//!
//! Read failures are logged and dropped; traffic never waits on the store.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::health::repository::HealthStateRepository;
use crate::health::state::Healthiness;
use crate::observability::metrics;

pub struct HealthStateSyncer {
    repository: Arc<dyn HealthStateRepository>,
    provider_id: String,
    interval: Duration,
    sample_prob: f64,
    last_sync: Mutex<Option<Instant>>,
}

impl HealthStateSyncer {
    pub fn new(
        repository: Arc<dyn HealthStateRepository>,
        provider_id: String,
        interval: Duration,
        sample_prob: f64,
    ) -> Self {
        Self {
            repository,
            provider_id,
            interval,
            sample_prob,
            last_sync: Mutex::new(None),
        }
    }

    /// Claim the next sync slot. At most one caller wins per interval.
    pub fn try_claim(&self, now: Instant) -> bool {
        let mut last_sync = self.last_sync.lock();
        if let Some(last) = *last_sync {
            if now.saturating_duration_since(last) <= self.interval {
                return false;
            }
        }
        if rand::random::<f64>() >= self.sample_prob {
            return false;
        }
        *last_sync = Some(now);
        true
    }

    pub fn last_sync(&self) -> Option<Instant> {
        *self.last_sync.lock()
    }

    /// Read the stored healthiness. Absent records and failures yield `None`.
    pub async fn fetch(&self) -> Option<Healthiness> {
        match self.repository.read(&self.provider_id).await {
            Ok(Some(state)) => {
                metrics::record_db_sync(&self.provider_id, "found");
                Some(state.healthiness)
            }
            Ok(None) => {
                metrics::record_db_sync(&self.provider_id, "absent");
                None
            }
            Err(e) => {
                metrics::record_db_sync(&self.provider_id, "error");
                tracing::warn!(
                    provider_id = %self.provider_id,
                    error = %e,
                    "Health state sync failed"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for HealthStateSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthStateSyncer")
            .field("provider_id", &self.provider_id)
            .field("interval", &self.interval)
            .field("sample_prob", &self.sample_prob)
            .finish()
    }
}
