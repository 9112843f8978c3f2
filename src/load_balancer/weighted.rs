//! Weighted random selection.
//!
//! Draws over the Healthy candidates only, so the effective proportions
//! renormalize whenever an endpoint drops out or comes back.
//! Weight `0` is never drawn; weight `-1` is a last resort used only when no
//! positively weighted candidate is Healthy.

use rand::Rng;

use crate::config::validation::WEIGHT_AS_FALLBACK;
use crate::load_balancer::SelectionStrategy;

#[derive(Debug)]
pub struct WeightedRandom {
    /// Weight per endpoint index.
    weights: Vec<i64>,
}

impl WeightedRandom {
    pub fn new(weights: Vec<i64>) -> Self {
        Self { weights }
    }

    fn weight(&self, index: usize) -> i64 {
        self.weights.get(index).copied().unwrap_or(0)
    }

    /// Select with an explicit draw in `[0, 1)`.
    pub fn select_with(&self, healthy: &[usize], draw: f64) -> Option<usize> {
        let total: i64 = healthy.iter().map(|&i| self.weight(i)).filter(|w| *w > 0).sum();

        if total == 0 {
            return healthy.iter().copied().find(|&i| self.weight(i) == WEIGHT_AS_FALLBACK);
        }

        let target = draw.clamp(0.0, 1.0) * total as f64;
        let mut cumulative = 0.0;
        let mut last = None;
        for &index in healthy {
            let weight = self.weight(index);
            if weight <= 0 {
                continue;
            }
            cumulative += weight as f64;
            last = Some(index);
            if target < cumulative {
                return Some(index);
            }
        }
        // Only reachable for a draw of exactly 1.0.
        last
    }
}

impl SelectionStrategy for WeightedRandom {
    fn select(&self, healthy: &[usize]) -> Option<usize> {
        let draw: f64 = rand::thread_rng().gen();
        self.select_with(healthy, draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_boundaries() {
        let strategy = WeightedRandom::new(vec![4, 1, 3]);
        let healthy = [0, 1, 2];
        assert_eq!(strategy.select_with(&healthy, 0.0), Some(0));
        assert_eq!(strategy.select_with(&healthy, 0.49), Some(0));
        assert_eq!(strategy.select_with(&healthy, 0.5), Some(1));
        assert_eq!(strategy.select_with(&healthy, 0.6), Some(1));
        assert_eq!(strategy.select_with(&healthy, 0.9), Some(2));
        assert_eq!(strategy.select_with(&healthy, 1.0), Some(2));
    }

    #[test]
    fn test_candidate_order_follows_precedence() {
        let strategy = WeightedRandom::new(vec![4, 1, 3]);
        // Endpoint 2 is most preferred, so it owns the start of the range.
        assert_eq!(strategy.select_with(&[2, 0, 1], 0.1), Some(2));
        assert_eq!(strategy.select_with(&[2, 0, 1], 0.5), Some(0));
    }

    #[test]
    fn test_unhealthy_weights_are_excluded() {
        let strategy = WeightedRandom::new(vec![4, 1, 3]);
        // Endpoint 0 dropped out: the remaining 1:3 split covers the whole range.
        assert_eq!(strategy.select_with(&[1, 2], 0.2), Some(1));
        assert_eq!(strategy.select_with(&[1, 2], 0.3), Some(2));
    }

    #[test]
    fn test_special_weights() {
        let strategy = WeightedRandom::new(vec![0, -1, 2, -1]);
        assert_eq!(strategy.select_with(&[0, 1, 2, 3], 0.99), Some(2));
        // No positive weight left: first fallback-only candidate.
        assert_eq!(strategy.select_with(&[0, 3, 1], 0.5), Some(3));
        assert_eq!(strategy.select_with(&[0], 0.5), None);
        assert_eq!(strategy.select_with(&[], 0.5), None);
    }

    #[test]
    fn test_two_to_one_converges() {
        let strategy = WeightedRandom::new(vec![2, 1]);
        let mut counts = [0usize; 2];
        for _ in 0..30_000 {
            counts[strategy.select(&[0, 1]).unwrap()] += 1;
        }
        let ratio = counts[0] as f64 / counts[1] as f64;
        assert!((1.8..2.2).contains(&ratio), "ratio was {ratio}");
    }
}
