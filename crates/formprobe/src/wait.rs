//! Bounded change polling.
//!
//! The page reacts to input asynchronously (option lists repopulate, the
//! strength text updates, inline errors render). Instead of sleeping a fixed
//! amount, steps take a baseline [`Snapshot`] and let the [`ChangePoller`]
//! re-sample until the state differs or the time budget is spent.
//!
//! Every wait is bounded: the poller returns at the timeout on its clock,
//! never after it, and stops early when the shared [`CancelToken`] is set.
//! A sample that hangs is abandoned at the deadline. A lost session ends the
//! wait with the driver error.

use crate::clock::SharedClock;
use crate::result::{DriverResult, FailureKind};
use crate::snapshot::Snapshot;
use futures::future::{select, Either};
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default change timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 4_000;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Smallest interval the poller sleeps between samples
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Timing for a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Total budget, measured from the start of the wait
    pub timeout: Duration,
    /// Delay between samples
    pub poll_interval: Duration,
    /// Delay before the first sample
    pub initial_delay: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PollOptions {
    /// Create default options
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            initial_delay: Duration::ZERO,
        }
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the initial delay
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The awaited condition was observed
    Changed {
        /// Snapshot that satisfied the condition
        snapshot: Snapshot,
        /// Time since the wait started
        elapsed: Duration,
        /// Number of samples taken
        polls: u32,
    },
    /// The budget elapsed first
    TimedOut {
        /// Last snapshot taken
        last: Snapshot,
        /// Time since the wait started
        elapsed: Duration,
        /// Number of samples taken
        polls: u32,
    },
    /// The run was cancelled while waiting
    Cancelled {
        /// Time since the wait started
        elapsed: Duration,
        /// Number of samples taken
        polls: u32,
    },
}

impl PollOutcome {
    /// Whether the condition was observed
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// Snapshot that satisfied the condition
    #[must_use]
    pub const fn changed_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Changed { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    /// Time spent waiting
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Changed { elapsed, .. }
            | Self::TimedOut { elapsed, .. }
            | Self::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    /// Samples taken
    #[must_use]
    pub const fn polls(&self) -> u32 {
        match self {
            Self::Changed { polls, .. }
            | Self::TimedOut { polls, .. }
            | Self::Cancelled { polls, .. } => *polls,
        }
    }

    /// Failure category when the condition was not observed
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Changed { .. } => None,
            Self::TimedOut { .. } => Some(FailureKind::TimeoutExceeded),
            Self::Cancelled { .. } => Some(FailureKind::Cancelled),
        }
    }
}

/// Cooperative cancellation flag shared across a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an unset token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Polls snapshots on a clock until a condition holds or time runs out
#[derive(Debug, Clone)]
pub struct ChangePoller {
    clock: SharedClock,
    cancel: CancelToken,
}

impl ChangePoller {
    /// Create a poller on `clock`
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `cancel` at every tick
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The poller's clock
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// The poller's cancellation token
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Wait until a snapshot differs from `baseline`
    ///
    /// # Errors
    ///
    /// Returns the first fatal driver error a sample reports.
    pub async fn await_change<F, Fut>(
        &self,
        snapshot_fn: F,
        baseline: &Snapshot,
        options: &PollOptions,
    ) -> DriverResult<PollOutcome>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = DriverResult<Snapshot>> + Send,
    {
        self.await_until(snapshot_fn, |current| current.differs_from(baseline), options)
            .await
    }

    /// Wait until a snapshot satisfies `predicate`
    ///
    /// Each sample is raced against the remaining budget; a sample still
    /// pending at the deadline counts as `Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal driver error a sample reports. Other sample
    /// errors count as `Unavailable`.
    pub async fn await_until<F, Fut, P>(
        &self,
        mut snapshot_fn: F,
        predicate: P,
        options: &PollOptions,
    ) -> DriverResult<PollOutcome>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = DriverResult<Snapshot>> + Send,
        P: Fn(&Snapshot) -> bool + Send,
    {
        let start = self.clock.elapsed();
        let interval = options.poll_interval.max(MIN_POLL_INTERVAL);
        let mut polls = 0u32;

        if !options.initial_delay.is_zero() {
            let delay = options.initial_delay.min(options.timeout);
            self.clock.sleep(delay).await;
        }

        loop {
            let elapsed = self.clock.elapsed().saturating_sub(start);
            if self.cancel.is_cancelled() {
                debug!(polls, ?elapsed, "poll cancelled");
                return Ok(PollOutcome::Cancelled { elapsed, polls });
            }

            let budget = options.timeout.saturating_sub(elapsed);
            let current = match self.sample(snapshot_fn(), budget).await {
                Some(Ok(snapshot)) => snapshot,
                Some(Err(err)) if err.is_fatal() => return Err(err),
                Some(Err(err)) => {
                    debug!(%err, "sample failed");
                    Snapshot::Unavailable
                }
                None => {
                    debug!(?budget, "sample overran the budget");
                    Snapshot::Unavailable
                }
            };
            polls += 1;
            let elapsed = self.clock.elapsed().saturating_sub(start);
            debug!(poll = polls, ?elapsed, snapshot = %current, "poll tick");

            if predicate(&current) {
                return Ok(PollOutcome::Changed {
                    snapshot: current,
                    elapsed,
                    polls,
                });
            }
            if elapsed >= options.timeout {
                return Ok(PollOutcome::TimedOut {
                    last: current,
                    elapsed,
                    polls,
                });
            }
            let remaining = options.timeout - elapsed;
            self.clock.sleep(interval.min(remaining)).await;
        }
    }

    /// Run one sample, giving up once `budget` has passed on the clock
    async fn sample<Fut>(&self, sample: Fut, budget: Duration) -> Option<DriverResult<Snapshot>>
    where
        Fut: Future<Output = DriverResult<Snapshot>> + Send,
    {
        let sample = pin!(sample);
        let deadline = self.clock.sleep(budget);
        match select(sample, deadline).await {
            Either::Left((result, _)) => Some(result),
            Either::Right(((), _)) => None,
        }
    }

    /// Sleep for an explicit settle delay
    ///
    /// Returns `false` when the run was cancelled before or during the delay.
    pub async fn settle(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !delay.is_zero() {
            self.clock.sleep(delay).await;
        }
        !self.cancel.is_cancelled()
    }
}
