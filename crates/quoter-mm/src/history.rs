//! Bounded rolling indicator histories.

use std::collections::VecDeque;

/// Fixed-capacity FIFO; the oldest sample is evicted on overflow.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Oldest first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

/// Per-symbol indicator histories.
#[derive(Debug, Clone)]
pub struct IndicatorHistory {
    pub ema: RollingWindow,
    pub rsi: RollingWindow,
    pub volatility: RollingWindow,
}

impl IndicatorHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            ema: RollingWindow::new(capacity),
            rsi: RollingWindow::new(capacity),
            volatility: RollingWindow::new(capacity),
        }
    }
}
