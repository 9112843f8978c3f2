//! Precedence-order selection: always the most preferred Healthy endpoint.

use crate::load_balancer::SelectionStrategy;

#[derive(Debug, Default)]
pub struct PreferenceOrder;

impl PreferenceOrder {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for PreferenceOrder {
    fn select(&self, healthy: &[usize]) -> Option<usize> {
        healthy.first().copied()
    }
}
