//! Declarative scenarios.
//!
//! A [`Scenario`] is an ordered list of [`ValidationStep`]s assembled with a
//! [`ScenarioBuilder`]. The [`ScenarioRunner`] executes it against one
//! driver through a [`StepExecutor`] and always returns a [`RunSummary`].
//!
//! ```rust,ignore
//! let scenario = Scenario::builder("form-logic")
//!     .step(DependentSelect::new("states_updated", "#country", "#state", "IN"))
//!     .step(DependentSelect::new("cities_updated", "#state", "#city", "Telangana"))
//!     .build();
//! let summary = ScenarioRunner::new(SystemClock::shared()).run(&scenario, &driver).await;
//! ```

use crate::clock::SharedClock;
use crate::driver::{ElementHandle, PageDriver};
use crate::evidence::{EvidenceCapture, NoEvidence};
use crate::locator::{LocatorChain, LocatorResolver};
use crate::reporter::RunSummary;
use crate::result::DriverResult;
use crate::snapshot::Snapshot;
use crate::step::{Observation, StepExecutor};
use crate::wait::{CancelToken, ChangePoller};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

/// Label used for the end-of-run page source capture
pub const PAGE_SOURCE_LABEL: &str = "page_source";

/// Everything a step needs to observe and act on the page
pub struct StepContext<'a> {
    /// Browser facade
    pub driver: &'a dyn PageDriver,
    /// Locator chain resolver
    pub resolver: &'a LocatorResolver,
    /// Change poller (clock and cancellation)
    pub poller: &'a ChangePoller,
    /// Evidence sink for extra captures
    pub evidence: &'a dyn EvidenceCapture,
}

impl StepContext<'_> {
    /// Resolve a chain, failing with `ElementAbsent` when nothing matches
    ///
    /// # Errors
    ///
    /// Returns `ElementAbsent`, or `Transport` when the session was lost.
    pub async fn require(&self, chain: &LocatorChain) -> DriverResult<ElementHandle> {
        self.resolver.require(chain, self.driver).await
    }

    /// Explicit bounded settle delay; `false` when the run was cancelled
    pub async fn settle(&self, delay: Duration) -> bool {
        self.poller.settle(delay).await
    }
}

/// One named unit of a scenario
///
/// The runner calls `baseline`, then `act`, waits `settle_delay`, and
/// finally calls `verify` with the baseline snapshot. `baseline` and `act`
/// run as the step's action, `verify` as its assertion.
#[async_trait]
pub trait ValidationStep: Send + Sync {
    /// Key under which the result is recorded
    fn name(&self) -> &str;

    /// Settle delay between action and assertion (runner default if `None`)
    fn settle_delay(&self) -> Option<Duration> {
        None
    }

    /// Prepare the page and capture the state changes are measured against
    async fn baseline(&self, _ctx: &StepContext<'_>) -> DriverResult<Snapshot> {
        Ok(Snapshot::Unavailable)
    }

    /// Perform the step's interaction
    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()>;

    /// Observe the outcome
    async fn verify(&self, ctx: &StepContext<'_>, baseline: Snapshot) -> DriverResult<Observation>;
}

/// Ordered list of steps
pub struct Scenario {
    name: String,
    steps: Vec<Box<dyn ValidationStep>>,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Scenario {
    /// Start building a scenario
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in order
    #[must_use]
    pub fn steps(&self) -> &[Box<dyn ValidationStep>] {
        &self.steps
    }

    /// Step names in order
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the scenario has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for [`Scenario`]
pub struct ScenarioBuilder {
    name: String,
    steps: Vec<Box<dyn ValidationStep>>,
}

impl ScenarioBuilder {
    /// Append a step
    #[must_use]
    pub fn step(mut self, step: impl ValidationStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a boxed step
    #[must_use]
    pub fn boxed_step(mut self, step: Box<dyn ValidationStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Scenario {
        Scenario {
            name: self.name,
            steps: self.steps,
        }
    }
}

/// Executes scenarios
#[derive(Clone)]
pub struct ScenarioRunner {
    clock: SharedClock,
    cancel: CancelToken,
    resolver: LocatorResolver,
    evidence: Arc<dyn EvidenceCapture>,
    settle_delay: Duration,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("resolver", &self.resolver)
            .field("settle_delay", &self.settle_delay)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Create a runner on `clock` with no evidence and no settle delay
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            cancel: CancelToken::new(),
            resolver: LocatorResolver::new(),
            evidence: Arc::new(NoEvidence),
            settle_delay: Duration::ZERO,
        }
    }

    /// Share a cancellation token with the caller
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use a configured resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: LocatorResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Capture evidence after every step
    #[must_use]
    pub fn with_evidence(mut self, evidence: Arc<dyn EvidenceCapture>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Default settle delay for steps that do not set one
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Cancellation token observed by every wait of the run
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run every step of `scenario` in order
    ///
    /// Step failures never stop the run. A lost session or a cancellation
    /// marks the remaining steps skipped. The page source is captured at the
    /// end on a best-effort basis.
    pub async fn run(&self, scenario: &Scenario, driver: &dyn PageDriver) -> RunSummary {
        let poller = ChangePoller::new(Arc::clone(&self.clock)).with_cancel(self.cancel.clone());
        let ctx = StepContext {
            driver,
            resolver: &self.resolver,
            poller: &poller,
            evidence: self.evidence.as_ref(),
        };
        let mut executor = StepExecutor::new(scenario.name(), Arc::clone(&self.clock))
            .with_evidence(Arc::clone(&self.evidence))
            .with_settle_delay(self.settle_delay);

        info!(
            run_id = %executor.recorder().run_id(),
            scenario = scenario.name(),
            steps = scenario.len(),
            "run started"
        );

        let steps = scenario.steps();
        for (index, step) in steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                for rest in &steps[index..] {
                    executor.skip(rest.name(), "run cancelled");
                }
                break;
            }

            let slot = Mutex::new(Snapshot::Unavailable);
            let settle = step.settle_delay().unwrap_or(self.settle_delay);
            let action = async {
                let baseline = step.baseline(&ctx).await?;
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = baseline;
                step.act(&ctx).await
            };
            let assertion = async {
                let baseline = std::mem::replace(
                    &mut *slot.lock().unwrap_or_else(PoisonError::into_inner),
                    Snapshot::Unavailable,
                );
                step.verify(&ctx, baseline).await
            };

            if executor
                .run_step_settled(driver, step.name(), settle, action, assertion)
                .await
                .is_err()
            {
                for rest in &steps[index + 1..] {
                    executor.skip(rest.name(), "run aborted: browser session lost");
                }
                break;
            }
        }

        self.evidence
            .capture_page_source(PAGE_SOURCE_LABEL, driver)
            .await;

        let summary = executor.finish();
        info!(
            run_id = %summary.run_id(),
            scenario = summary.scenario(),
            passed = summary.passed(),
            "run finished"
        );
        summary
    }
}
