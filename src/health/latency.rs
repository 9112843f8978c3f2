//! Time-bounded window of recent call latencies.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on retained samples, whatever the call rate.
pub const MAX_LATENCY_SAMPLES: usize = 1024;

#[derive(Debug, Clone)]
struct LatencySample {
    at: Instant,
    latency: Duration,
}

/// Summary of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct LatencyStats {
    pub samples: usize,
    pub average_ms: f64,
    pub max_ms: u64,
}

/// Latency samples younger than `window`, at most `MAX_LATENCY_SAMPLES` of
/// them; older samples are evicted on access.
#[derive(Debug)]
pub struct LatencyWindow {
    window: Duration,
    samples: VecDeque<LatencySample>,
}

impl LatencyWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    pub fn record(&mut self, at: Instant, latency: Duration) {
        self.evict(at);
        if self.samples.len() >= MAX_LATENCY_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(LatencySample { at, latency });
    }

    pub fn stats(&mut self, now: Instant) -> LatencyStats {
        self.evict(now);
        if self.samples.is_empty() {
            return LatencyStats::default();
        }

        let total: Duration = self.samples.iter().map(|s| s.latency).sum();
        let max = self.samples.iter().map(|s| s.latency).max().unwrap_or_default();
        LatencyStats {
            samples: self.samples.len(),
            average_ms: total.as_secs_f64() * 1000.0 / self.samples.len() as f64,
            max_ms: max.as_millis() as u64,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(oldest.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
