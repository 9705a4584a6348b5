//! Batch pacing for destination writes.
//!
//! Destination APIs tend to enforce requests-per-minute quotas. The pacer
//! lets a burst of `batch_size` dispatches through immediately, then holds the
//! next dispatch until `seconds_per_batch` have passed since the burst's window
//! opened. It is coarser than a token bucket: fixed bursts per window instead
//! of a smooth rate.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Granularity of the wait loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct PacerState {
    window_start: Instant,
    window_end: Instant,
    counter: usize,
    windows: u64,
}

impl PacerState {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            window_start: now,
            window_end: now + window,
            counter: 0,
            windows: 1,
        }
    }

    fn restart(&mut self, now: Instant, window: Duration) {
        self.window_start = now;
        self.window_end = now + window;
        self.counter = 0;
        self.windows += 1;
    }
}

/// Burst-then-wait throttle shared by all workers of one apply call.
#[derive(Debug)]
pub struct BatchPacer {
    batch_size: usize,
    window: Duration,
    poll_interval: Duration,
    state: Mutex<PacerState>,
}

impl BatchPacer {
    /// Create a pacer allowing `batch_size` dispatches per `seconds_per_batch`.
    ///
    /// A `batch_size` of zero disables pacing.
    #[must_use]
    pub fn new(batch_size: usize, seconds_per_batch: u64) -> Self {
        Self::with_window(batch_size, Duration::from_secs(seconds_per_batch))
    }

    /// Create a pacer with an arbitrary window length.
    #[must_use]
    pub fn with_window(batch_size: usize, window: Duration) -> Self {
        Self {
            batch_size,
            window,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Mutex::new(PacerState::open(Instant::now(), window)),
        }
    }

    /// A pacer that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0, 0)
    }

    /// Override the wait-loop granularity.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of batch windows opened so far.
    pub async fn windows(&self) -> u64 {
        self.state.lock().await.windows
    }

    /// Account for one unit of work, waiting first if the current batch is full.
    ///
    /// The lock is held while waiting so concurrent callers queue up behind
    /// the batch boundary instead of racing past it.
    pub async fn tick(&self) {
        if self.batch_size == 0 {
            return;
        }

        let mut state = self.state.lock().await;

        if state.counter >= self.batch_size {
            let now = Instant::now();
            if now < state.window_end {
                debug!(
                    batch_size = self.batch_size,
                    wait_ms = (state.window_end - now).as_millis() as u64,
                    "Batch full, waiting for window to elapse"
                );
            }

            loop {
                let now = Instant::now();
                if now >= state.window_end {
                    break;
                }
                let remaining = state.window_end - now;
                tokio::time::sleep(remaining.min(self.poll_interval)).await;
            }

            let elapsed = state.window_start.elapsed();
            state.restart(Instant::now(), self.window);
            debug!(
                previous_window_ms = elapsed.as_millis() as u64,
                window = state.windows,
                "Opened new batch window"
            );
        }

        state.counter += 1;
    }
}
