//! Sliding-window request accounting for the general lane.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Sliding window of dispatch timestamps.
///
/// The lane waits once the window holds `threshold` requests, where the
/// threshold is a fraction of the exchange limit. The wait lasts until the
/// oldest timestamp leaves the window, plus a buffer.
pub struct RateWindow {
    /// Exchange limit on requests per window.
    max_requests: u32,
    /// Count at which dispatch pauses.
    threshold: usize,
    window: Duration,
    buffer: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    /// Create a new rate window.
    ///
    /// # Arguments
    /// * `max_requests` - Exchange limit per window
    /// * `window` - Window length
    /// * `utilization` - Fraction of the limit to use before waiting (0, 1]
    /// * `buffer` - Extra wait after the oldest entry expires
    pub fn new(max_requests: u32, window: Duration, utilization: f64, buffer: Duration) -> Self {
        let utilization = if utilization.is_finite() {
            utilization.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let threshold = ((f64::from(max_requests) * utilization).floor() as usize).max(1);

        Self {
            max_requests,
            threshold,
            window,
            buffer,
            timestamps: Mutex::new(VecDeque::with_capacity(threshold)),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// How long to wait before the next dispatch, or `None` if there is room.
    pub fn wait_time(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        Self::cleanup(&mut timestamps, now, self.window);

        if timestamps.len() < self.threshold {
            return None;
        }
        let oldest = *timestamps.front()?;
        let expires = oldest + self.window + self.buffer;
        let wait = expires.saturating_duration_since(now);
        debug!(
            count = timestamps.len(),
            threshold = self.threshold,
            wait_ms = wait.as_millis() as u64,
            "Rate window full"
        );
        Some(wait)
    }

    /// Record a dispatch at the current instant.
    pub fn record(&self) {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        Self::cleanup(&mut timestamps, now, self.window);
        timestamps.push_back(now);
    }

    /// Requests currently inside the window.
    pub fn current_count(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        Self::cleanup(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }

    fn cleanup(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while timestamps.front().is_some_and(|&t| t + window <= now) {
            timestamps.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_from_utilization() {
        let w = RateWindow::new(1200, Duration::from_secs(60), 0.8, Duration::ZERO);
        assert_eq!(w.threshold(), 960);
        let w = RateWindow::new(1, Duration::from_secs(60), 0.5, Duration::ZERO);
        assert_eq!(w.threshold(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_oldest_expires() {
        let w = RateWindow::new(5, Duration::from_secs(10), 0.8, Duration::from_millis(100));
        for _ in 0..3 {
            w.record();
        }
        assert!(w.wait_time().is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        w.record();
        // 4 of 5 = at the 80% threshold; oldest was recorded 2s ago
        assert_eq!(w.wait_time(), Some(Duration::from_millis(8100)));

        tokio::time::advance(Duration::from_millis(8100)).await;
        assert!(w.wait_time().is_none());
        assert_eq!(w.current_count(), 1);
    }
}
