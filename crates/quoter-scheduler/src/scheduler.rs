//! Dual-lane request scheduler.
//!
//! Each lane is a single worker task draining an unbounded FIFO channel, so
//! a lane never has more than one request in flight. Enqueue appends to the
//! tail and resolves when that request settles; an idle worker simply parks
//! on the channel until the next enqueue.
//!
//! Every request runs under retry-with-backoff. Only retryable failures
//! (rate limits, transport errors) are retried; an exchange rejection is
//! returned to its caller immediately.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quoter_core::{BoxFuture, ExchangeResult};
use quoter_telemetry::Metrics;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::rate_window::RateWindow;

/// Which lane a request runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Market data and metadata.
    General,
    /// Order submissions and cancels.
    Order,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Order => "order",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued request, type-erased. Owned by its lane until dequeued.
type Job = Box<dyn FnOnce(Arc<LaneState>) -> BoxFuture<'static, ()> + Send>;

/// How a lane paces its dispatches.
enum Pacing {
    /// Sliding rate window, then a fixed delay after each dispatch.
    Window {
        window: RateWindow,
        post_delay: Duration,
    },
    /// Strict minimum spacing from the previous dispatch.
    Spacing {
        min_spacing: Duration,
        last_dispatch: Mutex<Option<Instant>>,
    },
}

/// Per-lane state shared with the worker and every running job.
struct LaneState {
    lane: Lane,
    pacing: Pacing,
    max_attempts: u32,
    backoff: Backoff,
    pending: AtomicUsize,
    dispatched: AtomicU64,
    retries: AtomicU64,
}

impl LaneState {
    /// Suspend until the lane may dispatch.
    async fn wait_turn(&self) {
        match &self.pacing {
            Pacing::Window { window, .. } => {
                while let Some(wait) = window.wait_time() {
                    Metrics::rate_window_wait();
                    debug!(
                        lane = %self.lane,
                        wait_ms = wait.as_millis() as u64,
                        "Waiting for rate window"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            Pacing::Spacing {
                min_spacing,
                last_dispatch,
            } => {
                let last = *last_dispatch.lock();
                if let Some(last) = last {
                    tokio::time::sleep_until(last + *min_spacing).await;
                }
            }
        }
    }

    fn mark_dispatched(&self) {
        match &self.pacing {
            Pacing::Window { window, .. } => window.record(),
            Pacing::Spacing { last_dispatch, .. } => *last_dispatch.lock() = Some(Instant::now()),
        }
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        Metrics::request_dispatched(self.lane.as_str());
    }

    async fn after_dispatch(&self) {
        if let Pacing::Window { post_delay, .. } = &self.pacing {
            if !post_delay.is_zero() {
                tokio::time::sleep(*post_delay).await;
            }
        }
    }

    /// Run one request to settlement under the lane's retry budget.
    async fn run<F, Fut, T>(&self, f: &F) -> SchedulerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
    {
        let mut attempt = 1;
        loop {
            self.wait_turn().await;
            self.mark_dispatched();
            let result = f().await;
            self.after_dispatch().await;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        lane = %self.lane,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, backing off"
                    );
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    Metrics::request_retried(self.lane.as_str());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(lane = %self.lane, attempt, error = %e, "Request failed");
                    Metrics::request_failed(self.lane.as_str());
                    return Err(SchedulerError::Exchange(e));
                }
            }
        }
    }
}

struct LaneHandle {
    state: Arc<LaneState>,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LaneHandle {
    fn spawn(state: LaneState) -> Self {
        let state = Arc::new(state);
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(lane_worker(Arc::clone(&state), rx));
        Self {
            state,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    fn submit(&self, job: Job) -> SchedulerResult<()> {
        let tx = self.tx.lock();
        let tx = tx.as_ref().ok_or(SchedulerError::Closed)?;
        let depth = self.state.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if tx.send(job).is_err() {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SchedulerError::Closed);
        }
        Metrics::queue_depth(self.state.lane.as_str(), depth);
        Ok(())
    }

    fn close(&self) {
        self.tx.lock().take();
    }

    async fn join(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(lane = %self.state.lane, error = %e, "Lane worker terminated abnormally");
            }
        }
    }
}

async fn lane_worker(state: Arc<LaneState>, mut rx: mpsc::UnboundedReceiver<Job>) {
    debug!(lane = %state.lane, "Lane worker started");
    while let Some(job) = rx.recv().await {
        let depth = state.pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        Metrics::queue_depth(state.lane.as_str(), depth);

        // A panicking request must not take the lane down with it.
        if let Err(e) = tokio::spawn(job(Arc::clone(&state))).await {
            error!(lane = %state.lane, error = %e, "Queued request panicked");
        }
    }
    debug!(lane = %state.lane, "Lane worker stopped");
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub general_pending: usize,
    pub order_pending: usize,
    pub general_dispatched: u64,
    pub order_dispatched: u64,
    pub general_retries: u64,
    pub order_retries: u64,
    /// General-lane dispatches inside the current rate window.
    pub window_count: usize,
}

/// Dual-lane request scheduler.
///
/// Must be created inside a tokio runtime (it spawns one worker per lane).
pub struct RequestScheduler {
    general: LaneHandle,
    order: LaneHandle,
}

impl RequestScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        let general = LaneState {
            lane: Lane::General,
            pacing: Pacing::Window {
                window: RateWindow::new(
                    config.max_requests_per_window,
                    config.rate_window(),
                    config.window_utilization,
                    config.window_buffer(),
                ),
                post_delay: config.general_delay(),
            },
            max_attempts: config.general_max_attempts.max(1),
            backoff: config.backoff(),
            pending: AtomicUsize::new(0),
            dispatched: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        };
        let order = LaneState {
            lane: Lane::Order,
            pacing: Pacing::Spacing {
                min_spacing: config.order_delay(),
                last_dispatch: Mutex::new(None),
            },
            max_attempts: config.order_max_attempts.max(1),
            backoff: config.backoff(),
            pending: AtomicUsize::new(0),
            dispatched: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        };

        info!(
            max_requests = config.max_requests_per_window,
            window_ms = config.rate_window_ms,
            general_delay_ms = config.general_delay_ms,
            order_delay_ms = config.order_delay_ms,
            "Request scheduler started"
        );

        Self {
            general: LaneHandle::spawn(general),
            order: LaneHandle::spawn(order),
        }
    }

    /// Run `f` on the general lane and wait for its result.
    ///
    /// `f` is invoked once per attempt.
    pub async fn enqueue_general<F, Fut, T>(&self, f: F) -> SchedulerResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExchangeResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        Self::enqueue(&self.general, f).await
    }

    /// Run `f` on the order lane and wait for its result.
    ///
    /// `f` is invoked once per attempt.
    pub async fn enqueue_order<F, Fut, T>(&self, f: F) -> SchedulerResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExchangeResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        Self::enqueue(&self.order, f).await
    }

    async fn enqueue<F, Fut, T>(handle: &LaneHandle, f: F) -> SchedulerResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExchangeResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let enqueued_at = Instant::now();

        let job: Job = Box::new(move |state: Arc<LaneState>| {
            Box::pin(async move {
                let result = state.run(&f).await;
                Metrics::request_latency(
                    state.lane.as_str(),
                    enqueued_at.elapsed().as_secs_f64() * 1000.0,
                );
                // Caller may have gone away; the request still counted.
                let _ = tx.send(result);
            })
        });

        handle.submit(job)?;
        rx.await.map_err(|_| SchedulerError::Aborted)?
    }

    /// Stop accepting new requests. Already-queued requests still run.
    pub fn close(&self) {
        self.general.close();
        self.order.close();
    }

    pub fn is_closed(&self) -> bool {
        self.general.tx.lock().is_none() && self.order.tx.lock().is_none()
    }

    /// Close both lanes and wait for them to drain.
    pub async fn shutdown(&self) {
        self.close();
        self.general.join().await;
        self.order.join().await;
        info!("Request scheduler stopped");
    }

    pub fn stats(&self) -> SchedulerStats {
        let window_count = match &self.general.state.pacing {
            Pacing::Window { window, .. } => window.current_count(),
            Pacing::Spacing { .. } => 0,
        };
        SchedulerStats {
            general_pending: self.general.state.pending.load(Ordering::SeqCst),
            order_pending: self.order.state.pending.load(Ordering::SeqCst),
            general_dispatched: self.general.state.dispatched.load(Ordering::Relaxed),
            order_dispatched: self.order.state.dispatched.load(Ordering::Relaxed),
            general_retries: self.general.state.retries.load(Ordering::Relaxed),
            order_retries: self.order.state.retries.load(Ordering::Relaxed),
            window_count,
        }
    }
}

impl Drop for RequestScheduler {
    fn drop(&mut self) {
        self.close();
    }
}
