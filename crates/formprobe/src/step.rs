//! Step execution with failure isolation.
//!
//! A step is an action followed by an assertion. The [`StepExecutor`] runs
//! both, turns every driver error or panic into a failed [`StepResult`],
//! captures evidence, and records the result. Only a lost browser session
//! escapes a step: the executor records the failure, moves the run to
//! [`RunState::Aborted`] and returns the error.

use crate::clock::SharedClock;
use crate::driver::PageDriver;
use crate::evidence::{EvidenceCapture, NoEvidence};
use crate::reporter::{RunSummary, StepResult, SummaryRecorder};
use crate::result::{DriverError, DriverResult, FailureKind};
use crate::wait::PollOutcome;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// What an assertion observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The expectation held
    Pass {
        /// What was seen
        detail: String,
    },
    /// The expectation did not hold
    Fail {
        /// Category, `None` for a plain mismatch
        failure: Option<FailureKind>,
        /// What was seen instead
        detail: String,
    },
}

impl Observation {
    /// Passing observation
    #[must_use]
    pub fn pass(detail: impl Into<String>) -> Self {
        Self::Pass {
            detail: detail.into(),
        }
    }

    /// Failing observation with a category
    #[must_use]
    pub fn fail(failure: FailureKind, detail: impl Into<String>) -> Self {
        Self::Fail {
            failure: Some(failure),
            detail: detail.into(),
        }
    }

    /// Observed value did not match the expectation
    #[must_use]
    pub fn mismatch(detail: impl Into<String>) -> Self {
        Self::Fail {
            failure: None,
            detail: detail.into(),
        }
    }

    /// Pass or mismatch depending on `condition`
    #[must_use]
    pub fn check(condition: bool, detail: impl Into<String>) -> Self {
        if condition {
            Self::pass(detail)
        } else {
            Self::mismatch(detail)
        }
    }

    /// Map a wait outcome: changed passes, timeout and cancellation fail
    #[must_use]
    pub fn from_poll(outcome: &PollOutcome, what: &str) -> Self {
        match outcome {
            PollOutcome::Changed {
                snapshot, elapsed, ..
            } => Self::pass(format!("{what}: {snapshot} after {}ms", elapsed.as_millis())),
            PollOutcome::TimedOut { last, elapsed, .. } => Self::fail(
                FailureKind::TimeoutExceeded,
                format!("{what}: no change within {}ms (last {last})", elapsed.as_millis()),
            ),
            PollOutcome::Cancelled { .. } => {
                Self::fail(FailureKind::Cancelled, format!("{what}: run cancelled"))
            }
        }
    }

    /// Whether the expectation held
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }
}

/// Position of a run in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No step has started
    NotStarted,
    /// Step `index` is executing or was the last to execute
    Running {
        /// Zero-based step index
        index: usize,
    },
    /// Every step was attempted
    Completed,
    /// The session was lost during step `at`
    Aborted {
        /// Zero-based step index
        at: usize,
    },
}

/// Runs steps in isolation and records their results
pub struct StepExecutor {
    clock: SharedClock,
    evidence: Arc<dyn EvidenceCapture>,
    settle_delay: Duration,
    recorder: SummaryRecorder,
    state: RunState,
    next_index: usize,
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor")
            .field("settle_delay", &self.settle_delay)
            .field("state", &self.state)
            .field("recorded", &self.recorder.len())
            .finish_non_exhaustive()
    }
}

impl StepExecutor {
    /// Create an executor for `scenario` without evidence capture
    #[must_use]
    pub fn new(scenario: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            clock,
            evidence: Arc::new(NoEvidence),
            settle_delay: Duration::ZERO,
            recorder: SummaryRecorder::new(scenario),
            state: RunState::NotStarted,
            next_index: 0,
        }
    }

    /// Capture evidence after every step
    #[must_use]
    pub fn with_evidence(mut self, evidence: Arc<dyn EvidenceCapture>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Delay between action and assertion
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Current run state
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Results recorded so far
    #[must_use]
    pub const fn recorder(&self) -> &SummaryRecorder {
        &self.recorder
    }

    /// Run one step with the executor's settle delay
    ///
    /// # Errors
    ///
    /// Returns the driver error when the browser session was lost; the
    /// failed step is recorded first.
    pub async fn run_step<A, V>(
        &mut self,
        driver: &dyn PageDriver,
        name: &str,
        action: A,
        assertion: V,
    ) -> Result<StepResult, DriverError>
    where
        A: Future<Output = DriverResult<()>> + Send,
        V: Future<Output = DriverResult<Observation>> + Send,
    {
        let settle = self.settle_delay;
        self.run_step_settled(driver, name, settle, action, assertion)
            .await
    }

    /// Run one step with an explicit settle delay
    ///
    /// # Errors
    ///
    /// Returns the driver error when the browser session was lost.
    pub async fn run_step_settled<A, V>(
        &mut self,
        driver: &dyn PageDriver,
        name: &str,
        settle: Duration,
        action: A,
        assertion: V,
    ) -> Result<StepResult, DriverError>
    where
        A: Future<Output = DriverResult<()>> + Send,
        V: Future<Output = DriverResult<Observation>> + Send,
    {
        if matches!(self.state, RunState::Aborted { .. }) {
            return Ok(self.skip(name, "run aborted"));
        }

        let index = self.next_index;
        self.next_index += 1;
        self.state = RunState::Running { index };

        let clock = Arc::clone(&self.clock);
        let started = clock.elapsed();
        let body = async {
            action.await?;
            if !settle.is_zero() {
                clock.sleep(settle).await;
            }
            assertion.await
        };
        let outcome = AssertUnwindSafe(body).catch_unwind().await;
        let duration = self.clock.elapsed().saturating_sub(started);

        let mut fatal = None;
        let result = match outcome {
            Ok(Ok(Observation::Pass { detail })) => StepResult::pass(name, detail),
            Ok(Ok(Observation::Fail { failure, detail })) => StepResult::failed(name, failure, detail),
            Ok(Err(err)) => {
                let kind = err.kind();
                let result = StepResult::failed(name, Some(kind), format!("{kind}: {err}"));
                if err.is_fatal() {
                    fatal = Some(err);
                }
                result
            }
            Err(panic) => StepResult::failed(
                name,
                None,
                format!("step panicked: {}", panic_message(panic.as_ref())),
            ),
        };

        let evidence = self.evidence.capture(name, driver).await;
        let result = result.with_duration(duration).with_evidence(evidence);

        info!(
            run_id = %self.recorder.run_id(),
            step = name,
            index,
            outcome = result.outcome().label(),
            failure = ?result.failure(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "step finished"
        );
        self.recorder.record(result.clone());

        if let Some(err) = fatal {
            error!(run_id = %self.recorder.run_id(), step = name, %err, "browser session lost, aborting run");
            self.state = RunState::Aborted { at: index };
            self.recorder.mark_aborted(name);
            return Err(err);
        }
        Ok(result)
    }

    /// Record a step as skipped
    pub fn skip(&mut self, name: &str, reason: &str) -> StepResult {
        let result = StepResult::skipped(name, reason);
        info!(run_id = %self.recorder.run_id(), step = name, reason, "step skipped");
        self.recorder.record(result.clone());
        result
    }

    /// Close the run and produce its summary
    #[must_use]
    pub fn finish(mut self) -> RunSummary {
        if !matches!(self.state, RunState::Aborted { .. }) {
            self.state = RunState::Completed;
        }
        self.recorder.report()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
