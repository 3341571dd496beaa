//! Formprobe: resilient observation engine for dynamic web forms
//!
//! Validates client-side form behavior (cascading dropdowns, password
//! strength, inline validation, submit gating, submission) in a real browser
//! without fixed sleeps and without trusting any single selector.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    FORMPROBE Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Step       │    │ PageDriver │            │
//! │   │ (steps)    │───►│ Executor   │───►│ (CDP/mock) │            │
//! │   └────────────┘    └─────┬──────┘    └─────▲──────┘            │
//! │                           │                 │                   │
//! │                     ┌─────▼──────┐    ┌─────┴──────┐            │
//! │                     │ Run        │    │ Locator    │            │
//! │                     │ Summary    │    │ Resolver + │            │
//! │                     └────────────┘    │ Poller     │            │
//! │                                       └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use formprobe::form::{logic_scenario, FormProfile, FormTimings};
//! use formprobe::{MockDriver, ScenarioRunner, SystemClock};
//!
//! # async fn demo() {
//! let driver = MockDriver::new();
//! let scenario = logic_scenario(&FormProfile::default(), &FormTimings::default());
//! let summary = ScenarioRunner::new(SystemClock::shared())
//!     .run(&scenario, &driver)
//!     .await;
//! println!("{}", summary.render_text());
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod clock;
mod config;
mod driver;
mod evidence;
mod locator;
mod reporter;
mod result;
mod scenario;
mod snapshot;
mod step;
mod wait;

/// Scriptable in-memory page for tests
pub mod mock;

/// Registration-form steps and scenarios
pub mod form;

/// Chromium over CDP
#[cfg(feature = "browser")]
pub mod cdp;

pub use clock::{Clock, SharedClock, SystemClock, VirtualClock};
pub use config::{BrowserSettings, RunConfig, DEFAULT_PAGE};
pub use driver::{CaptureTarget, ElementHandle, LocateBy, PageDriver, ScriptArg};
pub use evidence::{EvidenceCapture, EvidenceConfig, FileEvidence, NoEvidence, DEFAULT_EVIDENCE_DIR};
pub use locator::{
    element_text, Attempt, AttemptOutcome, ChainReport, LocatorChain, LocatorResolver,
    LocatorStrategy, Resolved, TextLookup, DEFAULT_STALE_RETRIES,
};
pub use mock::{MockDriver, MockElement};
pub use reporter::{RunStatus, RunSummary, StepOutcome, StepResult, SummaryRecorder};
pub use result::{
    DriverError, DriverResult, FailureKind, FormProbeError, FormProbeResult,
};
pub use scenario::{
    Scenario, ScenarioBuilder, ScenarioRunner, StepContext, ValidationStep, PAGE_SOURCE_LABEL,
};
pub use snapshot::{chain_enabled, chain_text, option_values, script_value, Snapshot};
pub use step::{Observation, RunState, StepExecutor};
pub use wait::{
    CancelToken, ChangePoller, PollOptions, PollOutcome, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};

#[cfg(feature = "browser")]
pub use cdp::{run_in_browser, CdpDriver};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::form::{FormProfile, FormScenario, FormTimings};
    pub use super::{
        CancelToken, DriverError, DriverResult, FailureKind, FormProbeError, FormProbeResult,
        LocatorChain, LocatorResolver, LocatorStrategy, Observation, PageDriver, PollOptions,
        RunConfig, RunSummary, Scenario, ScenarioRunner, Snapshot, StepContext, SystemClock,
        ValidationStep,
    };
}
