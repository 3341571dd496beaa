//! Run configuration.
//!
//! A [`RunConfig`] is loaded from YAML; every field has a default, so an
//! empty file (or no file) is a valid configuration. Command-line flags are
//! applied on top by the CLI.

use crate::clock::SharedClock;
use crate::evidence::{EvidenceConfig, FileEvidence};
use crate::form::{evidence_focus_chain, FormProfile, FormTimings};
use crate::locator::LocatorResolver;
use crate::result::{FormProbeError, FormProbeResult};
use crate::scenario::ScenarioRunner;
use crate::wait::{CancelToken, PollOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Page opened when no URL is configured
pub const DEFAULT_PAGE: &str = "index.html";

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1200,
            window_height: 900,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserSettings {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set window dimensions
    #[must_use]
    pub const fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// URL or local path of the registration page
    pub page: String,
    /// Default wait timeout in milliseconds
    pub timeout_ms: u64,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Dependent dropdown wait in milliseconds
    pub option_wait_ms: u64,
    /// Required-field error wait in milliseconds
    pub error_wait_ms: u64,
    /// Success message wait in milliseconds
    pub message_wait_ms: u64,
    /// Delay after each action before verifying, in milliseconds
    pub settle_delay_ms: u64,
    /// Delay after selecting a dropdown option, in milliseconds
    pub select_settle_ms: u64,
    /// Per-strategy lookup timeout in milliseconds (0 = none)
    pub strategy_timeout_ms: u64,
    /// Evidence settings
    pub evidence: EvidenceConfig,
    /// Browser settings
    pub browser: BrowserSettings,
    /// Form test data
    pub profile: FormProfile,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            option_wait_ms: 5_000,
            error_wait_ms: 5_000,
            message_wait_ms: 6_000,
            settle_delay_ms: 250,
            select_settle_ms: 350,
            strategy_timeout_ms: 0,
            evidence: EvidenceConfig::default().with_focus(&evidence_focus_chain()),
            browser: BrowserSettings::default(),
            profile: FormProfile::default(),
        }
    }
}

impl RunConfig {
    /// Parse YAML and validate
    ///
    /// # Errors
    ///
    /// `ConfigFormat` for malformed YAML, `Config` for invalid values.
    pub fn from_yaml_str(yaml: &str) -> FormProbeResult<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, otherwise as [`Self::from_yaml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> FormProbeResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// `Config` naming the first invalid field.
    pub fn validate(&self) -> FormProbeResult<()> {
        if self.page.trim().is_empty() {
            return Err(FormProbeError::config("page must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(FormProbeError::config("poll_interval_ms must be positive"));
        }
        if self.timeout_ms < self.poll_interval_ms {
            return Err(FormProbeError::config(format!(
                "timeout_ms ({}) must be at least poll_interval_ms ({})",
                self.timeout_ms, self.poll_interval_ms
            )));
        }
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(FormProbeError::config("browser window must be non-empty"));
        }
        Ok(())
    }

    /// Default poll options
    #[must_use]
    pub const fn poll_options(&self) -> PollOptions {
        PollOptions::new()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }

    /// Wait budgets for the form steps
    #[must_use]
    pub const fn timings(&self) -> FormTimings {
        FormTimings {
            poll: self.poll_options(),
            option_wait: Duration::from_millis(self.option_wait_ms),
            error_wait: Duration::from_millis(self.error_wait_ms),
            message_wait: Duration::from_millis(self.message_wait_ms),
            select_settle: Duration::from_millis(self.select_settle_ms),
        }
    }

    /// Settle delay between action and verification
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Per-strategy lookup timeout, if any
    #[must_use]
    pub const fn strategy_timeout(&self) -> Option<Duration> {
        if self.strategy_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.strategy_timeout_ms))
        }
    }

    /// Runner with this configuration's resolver, evidence and settle delay
    #[must_use]
    pub fn runner(&self, clock: SharedClock, cancel: CancelToken) -> ScenarioRunner {
        let mut resolver = LocatorResolver::new();
        if let Some(timeout) = self.strategy_timeout() {
            resolver = resolver.with_strategy_timeout(timeout);
        }
        ScenarioRunner::new(clock)
            .with_cancel(cancel)
            .with_resolver(resolver)
            .with_evidence(Arc::new(FileEvidence::new(self.evidence.clone())))
            .with_settle_delay(self.settle_delay())
    }

    /// URL to navigate to
    ///
    /// Values with a scheme are used as-is; anything else is a local path
    /// turned into a `file://` URL.
    ///
    /// # Errors
    ///
    /// `Config` when a local page does not exist.
    pub fn page_url(&self) -> FormProbeResult<String> {
        if self.page.contains("://") || self.page.starts_with("about:") {
            return Ok(self.page.clone());
        }
        let path = std::fs::canonicalize(&self.page)
            .map_err(|err| FormProbeError::config(format!("page {}: {err}", self.page)))?;
        Ok(format!("file://{}", path.display()))
    }
}
