//! Alarm ingestion.
//!
//! Turns externally computed threshold alarms (error rate over a long window,
//! aggregated across every gateway process) into writes to the distributed
//! health store. Gateways pick the change up through their own sync cycle.
//!
//! # Data Flow
//! ```text
//! alarm event (JSON)
//!     → parse alarm name → provider id ("56_QUIKNODE")
//!     → ALARM: add alarm, mark UNHEALTHY, bump version
//!     → OK:    remove alarm, HEALTHY once no alarm is left, bump version
//!     → repository write / versioned update
//! ```

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::health::repository::{HealthStateRepository, StoreError};
use crate::health::state::{HealthState, Healthiness};
use crate::observability::metrics;

/// Attempts of a versioned update before giving up on concurrent writers.
const MAX_UPDATE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("malformed alarm payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("alarm name '{0}' does not encode a chain id and provider")]
    UnrecognizedAlarmName(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AlarmResult<T> = Result<T, AlarmError>;

/// Alarm event as delivered by the monitoring system.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmEvent {
    pub alarm_data: AlarmData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmData {
    pub alarm_name: String,
    pub state: AlarmStateValue,
    pub previous_state: AlarmStateValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmStateValue {
    pub value: AlarmState,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum AlarmState {
    #[serde(rename = "ALARM")]
    Alarm,
    #[serde(rename = "OK")]
    Ok,
    #[serde(other)]
    Other,
}

/// Healthiness before and after handling one event. `None` means no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmOutcome {
    pub old: Option<Healthiness>,
    pub new: Option<Healthiness>,
}

/// Extract the provider id from an alarm name such as
/// `RoutingAPI-RpcGateway-ErrorRateAlarm-ChainId-56-Provider-QUIKNODE`.
pub fn provider_id_from_alarm_name(alarm_name: &str) -> Option<String> {
    let tokens: Vec<&str> = alarm_name.split('-').collect();
    let value_after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|i| tokens.get(i + 1))
            .copied()
            .filter(|v| !v.is_empty())
    };

    let chain_id: u64 = value_after("ChainId")?.parse().ok()?;
    let provider = value_after("Provider")?;
    Some(format!("{}_{}", chain_id, provider.to_uppercase()))
}

/// Writes alarm transitions into the distributed health store.
pub struct FallbackHandler {
    repository: Arc<dyn HealthStateRepository>,
}

impl FallbackHandler {
    pub fn new(repository: Arc<dyn HealthStateRepository>) -> Self {
        Self { repository }
    }

    /// Decode and handle a raw JSON event.
    pub async fn handle_json(&self, payload: &[u8]) -> AlarmResult<AlarmOutcome> {
        let event: AlarmEvent = serde_json::from_slice(payload)?;
        self.handle(&event).await
    }

    pub async fn handle(&self, event: &AlarmEvent) -> AlarmResult<AlarmOutcome> {
        let data = &event.alarm_data;
        let provider_id = provider_id_from_alarm_name(&data.alarm_name)
            .ok_or_else(|| AlarmError::UnrecognizedAlarmName(data.alarm_name.clone()))?;

        tracing::info!(
            provider_id = %provider_id,
            alarm = %data.alarm_name,
            state = ?data.state.value,
            previous_state = ?data.previous_state.value,
            reason = data.state.reason.as_deref().unwrap_or(""),
            "Alarm event received"
        );

        let outcome = match data.state.value {
            AlarmState::Alarm => {
                metrics::record_alarm_event("alarm");
                self.raise(&provider_id, &data.alarm_name).await?
            }
            AlarmState::Ok => {
                metrics::record_alarm_event("ok");
                self.clear(&provider_id, &data.alarm_name).await?
            }
            AlarmState::Other => {
                metrics::record_alarm_event("other");
                let current = self.repository.read(&provider_id).await?.map(|s| s.healthiness);
                AlarmOutcome { old: current, new: current }
            }
        };

        if outcome.old != outcome.new {
            tracing::warn!(
                provider_id = %provider_id,
                old = ?outcome.old,
                new = ?outcome.new,
                "Provider health overridden by alarm"
            );
        }

        Ok(outcome)
    }

    async fn raise(&self, provider_id: &str, alarm_name: &str) -> AlarmResult<AlarmOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.repository.read(provider_id).await?;
            // An absent record is created as version 1, which conflicts if
            // another alarm created it first.
            let (old, mut alarms, version) = match &current {
                Some(current) => (Some(current.healthiness), current.ongoing_alarms.clone(), current.version),
                None => (None, Vec::new(), 0),
            };
            if !alarms.iter().any(|a| a == alarm_name) {
                alarms.push(alarm_name.to_string());
            }
            let state = HealthState::new(Healthiness::Unhealthy, alarms, version + 1);

            match self.repository.update(provider_id, &state).await {
                Ok(()) => {
                    return Ok(AlarmOutcome {
                        old,
                        new: Some(Healthiness::Unhealthy),
                    })
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_UPDATE_ATTEMPTS => {
                    tracing::debug!(provider_id = %provider_id, attempt, "Retrying alarm update after version conflict");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn clear(&self, provider_id: &str, alarm_name: &str) -> AlarmResult<AlarmOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(current) = self.repository.read(provider_id).await? else {
                return Ok(AlarmOutcome { old: None, new: None });
            };
            if !current.ongoing_alarms.iter().any(|a| a == alarm_name) {
                return Ok(AlarmOutcome {
                    old: Some(current.healthiness),
                    new: Some(current.healthiness),
                });
            }

            let alarms: Vec<String> = current
                .ongoing_alarms
                .iter()
                .filter(|a| *a != alarm_name)
                .cloned()
                .collect();
            let healthiness = if alarms.is_empty() {
                Healthiness::Healthy
            } else {
                Healthiness::Unhealthy
            };
            let state = HealthState::new(healthiness, alarms, current.version + 1);

            match self.repository.update(provider_id, &state).await {
                Ok(()) => {
                    return Ok(AlarmOutcome {
                        old: Some(current.healthiness),
                        new: Some(healthiness),
                    })
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_UPDATE_ATTEMPTS => {
                    tracing::debug!(provider_id = %provider_id, attempt, "Retrying alarm clear after version conflict");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::repository::InMemoryHealthStateRepository;

    const ERROR_ALARM: &str = "RoutingAPI-RpcGateway-ErrorRateAlarm-ChainId-56-Provider-QUIKNODE";
    const LATENCY_ALARM: &str = "RoutingAPI-RpcGateway-LatencyAlarm-ChainId-56-Provider-QUIKNODE";

    fn event(alarm_name: &str, state: &str, previous: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "source": "aws.cloudwatch",
            "alarmData": {
                "alarmName": alarm_name,
                "state": { "value": state, "reason": "Threshold Crossed" },
                "previousState": { "value": previous, "reason": "Threshold Crossed" }
            }
        }))
        .unwrap()
    }

    fn handler() -> (FallbackHandler, Arc<InMemoryHealthStateRepository>) {
        let repo = Arc::new(InMemoryHealthStateRepository::new());
        (FallbackHandler::new(repo.clone()), repo)
    }

    #[test]
    fn test_provider_id_from_alarm_name() {
        assert_eq!(provider_id_from_alarm_name(ERROR_ALARM).as_deref(), Some("56_QUIKNODE"));
        assert_eq!(
            provider_id_from_alarm_name("X-Provider-infura-ChainId-1").as_deref(),
            Some("1_INFURA")
        );
        assert_eq!(provider_id_from_alarm_name("RoutingAPI-ChainId-56"), None);
        assert_eq!(provider_id_from_alarm_name("ChainId-abc-Provider-X"), None);
    }

    #[tokio::test]
    async fn test_alarm_on_empty_store_writes_unhealthy() {
        let (handler, repo) = handler();
        let outcome = handler.handle_json(&event(ERROR_ALARM, "ALARM", "OK")).await.unwrap();

        assert_eq!(outcome, AlarmOutcome { old: None, new: Some(Healthiness::Unhealthy) });
        assert_eq!(
            repo.read("56_QUIKNODE").await.unwrap(),
            Some(HealthState::new(Healthiness::Unhealthy, vec![ERROR_ALARM.into()], 1))
        );
    }

    #[tokio::test]
    async fn test_alarm_overrides_healthy_record() {
        let (handler, repo) = handler();
        repo.write("56_QUIKNODE", &HealthState::new(Healthiness::Healthy, vec![], 4))
            .await
            .unwrap();

        let outcome = handler.handle_json(&event(ERROR_ALARM, "ALARM", "OK")).await.unwrap();
        assert_eq!(outcome.old, Some(Healthiness::Healthy));
        assert_eq!(
            repo.read("56_QUIKNODE").await.unwrap(),
            Some(HealthState::new(Healthiness::Unhealthy, vec![ERROR_ALARM.into()], 5))
        );

        // A repeated alarm does not duplicate the entry.
        handler.handle_json(&event(ERROR_ALARM, "ALARM", "OK")).await.unwrap();
        let state = repo.read("56_QUIKNODE").await.unwrap().unwrap();
        assert_eq!(state.ongoing_alarms, vec![ERROR_ALARM.to_string()]);
        assert_eq!(state.version, 6);
    }

    /// Store where another writer creates the record right after each
    /// caller's first read.
    struct RacingRepository {
        inner: InMemoryHealthStateRepository,
        racer: parking_lot::Mutex<Option<HealthState>>,
    }

    #[async_trait::async_trait]
    impl HealthStateRepository for RacingRepository {
        async fn read(&self, provider_id: &str) -> Result<Option<HealthState>, StoreError> {
            let current = self.inner.read(provider_id).await?;
            let racer = self.racer.lock().take();
            if let Some(racer) = racer {
                self.inner.write(provider_id, &racer).await?;
            }
            Ok(current)
        }

        async fn write(&self, provider_id: &str, state: &HealthState) -> Result<(), StoreError> {
            self.inner.write(provider_id, state).await
        }

        async fn update(&self, provider_id: &str, state: &HealthState) -> Result<(), StoreError> {
            self.inner.update(provider_id, state).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_alarms_are_both_kept() {
        let repo = Arc::new(RacingRepository {
            inner: InMemoryHealthStateRepository::new(),
            racer: parking_lot::Mutex::new(Some(HealthState::new(
                Healthiness::Unhealthy,
                vec![LATENCY_ALARM.into()],
                1,
            ))),
        });
        let handler = FallbackHandler::new(repo.clone());

        let outcome = handler.handle_json(&event(ERROR_ALARM, "ALARM", "OK")).await.unwrap();
        assert_eq!(outcome.old, Some(Healthiness::Unhealthy));
        assert_eq!(
            repo.read("56_QUIKNODE").await.unwrap(),
            Some(HealthState::new(
                Healthiness::Unhealthy,
                vec![LATENCY_ALARM.into(), ERROR_ALARM.into()],
                2
            ))
        );

        // Clearing one of them keeps the provider Unhealthy.
        let outcome = handler.handle_json(&event(LATENCY_ALARM, "OK", "ALARM")).await.unwrap();
        assert_eq!(outcome.new, Some(Healthiness::Unhealthy));
    }

    #[tokio::test]
    async fn test_ok_without_record_is_noop() {
        let (handler, repo) = handler();
        let outcome = handler.handle_json(&event(ERROR_ALARM, "OK", "ALARM")).await.unwrap();
        assert_eq!(outcome, AlarmOutcome { old: None, new: None });
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_ok_for_unknown_alarm_keeps_record() {
        let (handler, repo) = handler();
        let state = HealthState::new(Healthiness::Unhealthy, vec![LATENCY_ALARM.into()], 2);
        repo.write("56_QUIKNODE", &state).await.unwrap();

        let outcome = handler.handle_json(&event(ERROR_ALARM, "OK", "ALARM")).await.unwrap();
        assert_eq!(outcome.new, Some(Healthiness::Unhealthy));
        assert_eq!(repo.read("56_QUIKNODE").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_ok_restores_health_only_after_last_alarm() {
        let (handler, repo) = handler();
        handler.handle_json(&event(ERROR_ALARM, "ALARM", "OK")).await.unwrap();
        handler.handle_json(&event(LATENCY_ALARM, "ALARM", "OK")).await.unwrap();

        let outcome = handler.handle_json(&event(ERROR_ALARM, "OK", "ALARM")).await.unwrap();
        assert_eq!(outcome.new, Some(Healthiness::Unhealthy));
        assert_eq!(
            repo.read("56_QUIKNODE").await.unwrap(),
            Some(HealthState::new(Healthiness::Unhealthy, vec![LATENCY_ALARM.into()], 3))
        );

        let outcome = handler.handle_json(&event(LATENCY_ALARM, "OK", "ALARM")).await.unwrap();
        assert_eq!(
            outcome,
            AlarmOutcome { old: Some(Healthiness::Unhealthy), new: Some(Healthiness::Healthy) }
        );
        assert_eq!(
            repo.read("56_QUIKNODE").await.unwrap(),
            Some(HealthState::new(Healthiness::Healthy, vec![], 4))
        );
    }

    #[tokio::test]
    async fn test_insufficient_data_is_acknowledged_without_write() {
        let (handler, repo) = handler();
        let outcome = handler
            .handle_json(&event(ERROR_ALARM, "INSUFFICIENT_DATA", "OK"))
            .await
            .unwrap();
        assert_eq!(outcome, AlarmOutcome { old: None, new: None });
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_errors() {
        let (handler, _) = handler();
        assert!(matches!(
            handler.handle_json(b"{\"alarmData\": {}}").await,
            Err(AlarmError::MalformedPayload(_))
        ));
        assert!(matches!(
            handler.handle_json(&event("SomeOtherAlarm", "ALARM", "OK")).await,
            Err(AlarmError::UnrecognizedAlarmName(_))
        ));
    }
}
