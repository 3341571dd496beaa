//! Step results and the run summary.
//!
//! [`SummaryRecorder`] collects one [`StepResult`] per step in execution
//! order and produces the [`RunSummary`]: the ordered report plus a single
//! overall verdict.

use crate::result::FailureKind;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Step result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Observation matched the expectation
    Passed,
    /// Observation did not match, or the step could not run
    Failed,
    /// Not executed (the run was aborted earlier)
    Skipped,
}

impl StepOutcome {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Label used in text reports
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

fn serialize_duration_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Outcome of one named step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    #[serde(skip)]
    name: String,
    outcome: StepOutcome,
    detail: String,
    failure: Option<FailureKind>,
    evidence: Option<PathBuf>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    duration: Duration,
}

impl StepResult {
    fn new(name: String, outcome: StepOutcome, failure: Option<FailureKind>, detail: String) -> Self {
        Self {
            name,
            outcome,
            detail,
            failure,
            evidence: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a passing result
    #[must_use]
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name.into(), StepOutcome::Passed, None, detail.into())
    }

    /// Create a failing result
    ///
    /// `failure` is `None` for a plain assertion mismatch.
    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        failure: Option<FailureKind>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(name.into(), StepOutcome::Failed, failure, detail.into())
    }

    /// Create a skipped result
    #[must_use]
    pub fn skipped(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name.into(), StepOutcome::Skipped, None, detail.into())
    }

    /// Set the measured duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Attach an evidence file
    #[must_use]
    pub fn with_evidence(mut self, path: Option<PathBuf>) -> Self {
        self.evidence = path;
        self
    }

    /// Step name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step outcome
    #[must_use]
    pub const fn outcome(&self) -> StepOutcome {
        self.outcome
    }

    /// Whether the step passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// Human-readable detail
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Failure category, if any
    #[must_use]
    pub const fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Evidence captured after the step
    #[must_use]
    pub fn evidence(&self) -> Option<&Path> {
        self.evidence.as_deref()
    }

    /// Time spent in the step
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step ran
    Completed,
    /// The session was lost during the named step
    Aborted {
        /// Step that hit the transport failure
        at: String,
    },
}

fn serialize_steps<S: Serializer>(steps: &[StepResult], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(steps.len()))?;
    for step in steps {
        map.serialize_entry(step.name(), step)?;
    }
    map.end()
}

/// Ordered report of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    run_id: Uuid,
    scenario: String,
    started_at: DateTime<Utc>,
    passed: bool,
    status: RunStatus,
    #[serde(serialize_with = "serialize_steps")]
    steps: Vec<StepResult>,
    warnings: Vec<String>,
}

impl RunSummary {
    /// Overall verdict: every step passed and the run completed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Run identifier
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Scenario name
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// When the run started
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Terminal status
    #[must_use]
    pub const fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Step results in execution order
    #[must_use]
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Result of a step by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.name() == name)
    }

    /// Step names in execution order
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(StepResult::name).collect()
    }

    /// Duplicate-name warnings raised while recording
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of steps with `outcome`
    #[must_use]
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome() == outcome).count()
    }

    /// Total time spent in steps
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(StepResult::duration).sum()
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!("{} summary:\n", self.scenario);
        for step in &self.steps {
            out.push_str(" - ");
            out.push_str(step.name());
            out.push_str(": ");
            out.push_str(step.outcome().label());
            if let Some(kind) = step.failure() {
                out.push_str(" [");
                out.push_str(kind.as_str());
                out.push(']');
            }
            if !step.detail().is_empty() {
                out.push_str(" (");
                out.push_str(step.detail());
                out.push(')');
            }
            out.push('\n');
        }
        if let RunStatus::Aborted { at } = &self.status {
            out.push_str("Run aborted during ");
            out.push_str(at);
            out.push('\n');
        }
        for warning in &self.warnings {
            out.push_str("warning: ");
            out.push_str(warning);
            out.push('\n');
        }
        out.push_str(if self.passed {
            "Overall: PASSED"
        } else {
            "Overall: FAILED"
        });
        out.push('\n');
        out
    }
}

/// Collects step results for one run
#[derive(Debug, Clone)]
pub struct SummaryRecorder {
    run_id: Uuid,
    scenario: String,
    started_at: DateTime<Utc>,
    steps: Vec<StepResult>,
    warnings: Vec<String>,
    aborted_at: Option<String>,
}

impl SummaryRecorder {
    /// Create a recorder for `scenario` with a fresh run id
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            warnings: Vec::new(),
            aborted_at: None,
        }
    }

    /// Run identifier
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record a step result
    ///
    /// A repeated name replaces the earlier entry in place.
    pub fn record(&mut self, result: StepResult) {
        if let Some(existing) = self.steps.iter_mut().find(|s| s.name() == result.name()) {
            let message = format!("step '{}' recorded more than once; keeping the last result", result.name());
            warn!(run_id = %self.run_id, step = result.name(), "duplicate step name");
            self.warnings.push(message);
            *existing = result;
        } else {
            self.steps.push(result);
        }
    }

    /// Mark the run as aborted during `step`
    pub fn mark_aborted(&mut self, step: impl Into<String>) {
        self.aborted_at = Some(step.into());
    }

    /// Whether the run was aborted
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }

    /// Number of recorded steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing was recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Produce the run summary
    #[must_use]
    pub fn report(&self) -> RunSummary {
        let status = match &self.aborted_at {
            Some(at) => RunStatus::Aborted { at: at.clone() },
            None => RunStatus::Completed,
        };
        let passed =
            status == RunStatus::Completed && self.steps.iter().all(StepResult::passed);
        RunSummary {
            run_id: self.run_id,
            scenario: self.scenario.clone(),
            started_at: self.started_at,
            passed,
            status,
            steps: self.steps.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod step_result_tests {
        use super::*;

        #[test]
        fn test_constructors() {
            let pass = StepResult::pass("states_updated", "2 options");
            assert!(pass.passed());
            assert_eq!(pass.failure(), None);

            let fail = StepResult::failed(
                "cities_updated",
                Some(FailureKind::TimeoutExceeded),
                "options unchanged after 4s",
            );
            assert_eq!(fail.outcome(), StepOutcome::Failed);
            assert_eq!(fail.failure(), Some(FailureKind::TimeoutExceeded));

            let skip = StepResult::skipped("form_reset", "run aborted");
            assert_eq!(skip.outcome(), StepOutcome::Skipped);
            assert!(!skip.passed());
        }

        #[test]
        fn test_serialized_shape() {
            let result = StepResult::failed("x", Some(FailureKind::ElementAbsent), "missing")
                .with_duration(Duration::from_millis(1_234))
                .with_evidence(Some(PathBuf::from("out/x.png")));
            let json = serde_json::to_value(&result).unwrap();
            assert_eq!(
                json,
                serde_json::json!({
                    "outcome": "failed",
                    "detail": "missing",
                    "failure": "element_absent",
                    "evidence": "out/x.png",
                    "duration_ms": 1234
                })
            );
        }
    }

    mod recorder_tests {
        use super::*;

        #[test]
        fn test_empty_run_passes_vacuously() {
            let summary = SummaryRecorder::new("empty").report();
            assert!(summary.passed());
            assert!(summary.steps().is_empty());
            assert_eq!(summary.status(), &RunStatus::Completed);
        }

        #[test]
        fn test_order_is_preserved() {
            let mut recorder = SummaryRecorder::new("form-logic");
            recorder.record(StepResult::pass("states_updated", ""));
            recorder.record(StepResult::pass("cities_updated", ""));
            recorder.record(StepResult::failed("pwd_meter_changed", None, "unchanged"));
            let summary = recorder.report();
            assert_eq!(
                summary.step_names(),
                vec!["states_updated", "cities_updated", "pwd_meter_changed"]
            );
            assert!(!summary.passed());
            assert_eq!(summary.count(StepOutcome::Passed), 2);
        }

        #[test]
        fn test_duplicate_name_replaces_in_place() {
            let mut recorder = SummaryRecorder::new("dup");
            recorder.record(StepResult::failed("a", None, "first"));
            recorder.record(StepResult::pass("b", ""));
            recorder.record(StepResult::pass("a", "second"));
            let summary = recorder.report();
            assert_eq!(summary.step_names(), vec!["a", "b"]);
            assert_eq!(summary.get("a").unwrap().detail(), "second");
            assert_eq!(summary.warnings().len(), 1);
            assert!(summary.passed());
        }

        #[test]
        fn test_aborted_run_never_passes() {
            let mut recorder = SummaryRecorder::new("aborted");
            recorder.record(StepResult::pass("a", ""));
            recorder.mark_aborted("b");
            let summary = recorder.report();
            assert!(!summary.passed());
            assert_eq!(summary.status(), &RunStatus::Aborted { at: "b".into() });
        }
    }

    mod render_tests {
        use super::*;

        fn sample() -> RunSummary {
            let mut recorder = SummaryRecorder::new("form-logic");
            recorder.record(StepResult::pass("states_updated", ""));
            recorder.record(StepResult::failed(
                "pwd_meter_changed",
                Some(FailureKind::TimeoutExceeded),
                "strength indicator unchanged",
            ));
            recorder.report()
        }

        #[test]
        fn test_json_steps_are_an_ordered_object() {
            let json = sample().to_json().unwrap();
            let states = json.find("\"states_updated\"").unwrap();
            let pwd = json.find("\"pwd_meter_changed\"").unwrap();
            assert!(states < pwd);

            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["passed"], serde_json::json!(false));
            assert_eq!(value["status"]["state"], serde_json::json!("completed"));
            assert_eq!(
                value["steps"]["pwd_meter_changed"]["failure"],
                serde_json::json!("timeout_exceeded")
            );
        }

        #[test]
        fn test_render_text() {
            let text = sample().render_text();
            assert!(text.starts_with("form-logic summary:\n"));
            assert!(text.contains(" - states_updated: PASS\n"));
            assert!(text.contains(
                " - pwd_meter_changed: FAIL [TimeoutExceeded] (strength indicator unchanged)\n"
            ));
            assert!(text.ends_with("Overall: FAILED\n"));
        }
    }
}
