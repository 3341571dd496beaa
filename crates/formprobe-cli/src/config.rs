//! CLI configuration

use crate::commands::ConfigOverrides;
use crate::error::{CliError, CliResult};
use formprobe::RunConfig;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - step outcomes
    #[default]
    Normal,
    /// Verbose - waits and evidence
    Verbose,
    /// Debug - every strategy attempt and poll tick
    Debug,
}

impl Verbosity {
    /// Map the -v count and -q flag
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Log filter used when `RUST_LOG` is not set
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn,formprobe=info",
            Self::Verbose => "info,formprobe=debug",
            Self::Debug => "debug",
        }
    }
}

impl ConfigOverrides {
    /// Load the configuration file (if any) and apply the flags on top
    ///
    /// # Errors
    ///
    /// Unreadable or invalid configuration.
    pub fn load(&self) -> CliResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path).map_err(|err| {
                CliError::config(format!("{}: {err}", path.display()))
            })?,
            None => RunConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line values over `config`
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(page) = &self.page {
            config.page.clone_from(page);
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.no_sandbox {
            config.browser.sandbox = false;
        }
        if let Some(path) = &self.chromium {
            config.browser.chromium_path = Some(path.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.evidence.output_dir.clone_from(dir);
        }
        if self.no_evidence {
            config.evidence.screenshots = false;
            config.evidence.page_source = false;
        }
        if let Some(timeout) = self.timeout_ms {
            config.timeout_ms = timeout;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
    }
}
