//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Exit code for a run whose checks failed
pub const EXIT_FAILED: u8 = 1;

/// Exit code for configuration and launch errors
pub const EXIT_ERROR: u8 = 2;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Formprobe library error
    #[error("{0}")]
    FormProbe(#[from] formprobe::FormProbeError),

    /// Built without browser support
    #[error("Browser support not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// Report output error
    #[error("Report generation failed: {message}")]
    Report {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a report error
    #[must_use]
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        EXIT_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CliError::config("no such file");
        assert_eq!(err.to_string(), "Configuration error: no such file");
        assert_eq!(err.exit_code(), EXIT_ERROR);
    }

    #[test]
    fn test_library_error_passthrough() {
        let err: CliError = formprobe::FormProbeError::config("page must not be empty").into();
        assert!(err.to_string().contains("page must not be empty"));
    }

    #[test]
    fn test_browser_unavailable_message() {
        assert!(CliError::BrowserUnavailable
            .to_string()
            .contains("--features browser"));
    }
}
