//! Result and error types for Formprobe.
//!
//! Two layers of errors exist:
//!
//! - [`DriverError`]: what a single driver operation can fail with. These are
//!   step-level and, apart from [`DriverError::Transport`], never escape a step.
//! - [`FormProbeError`]: run-level failures (configuration, browser launch,
//!   navigation, I/O) that happen outside the step loop.
//!
//! [`FailureKind`] is the closed taxonomy recorded in step results so callers
//! can match on the category instead of on driver-specific errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for driver facade operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for run-level Formprobe operations
pub type FormProbeResult<T> = Result<T, FormProbeError>;

/// Failure categories recorded against a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Locator chain exhausted without a usable element
    ElementAbsent,
    /// Handle invalidated by a DOM mutation
    StaleReference,
    /// A snapshot could not be read cleanly
    TransientReadFailure,
    /// Click/type rejected by the page (not interactable, script error)
    InteractionBlocked,
    /// Browser session or connection unusable
    TransportError,
    /// A bounded wait elapsed without the expected change
    TimeoutExceeded,
    /// The surrounding run was cancelled while waiting
    Cancelled,
}

impl FailureKind {
    /// Stable name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ElementAbsent => "ElementAbsent",
            Self::StaleReference => "StaleReference",
            Self::TransientReadFailure => "TransientReadFailure",
            Self::InteractionBlocked => "InteractionBlocked",
            Self::TransportError => "TransportError",
            Self::TimeoutExceeded => "TimeoutExceeded",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether this category aborts the remaining run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportError)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a [`PageDriver`](crate::PageDriver) operation can fail with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// No element matched
    #[error("element not found: {selector}")]
    ElementAbsent {
        /// Selector or handle description
        selector: String,
    },

    /// The element behind a handle was replaced or removed
    #[error("stale element reference: {handle}")]
    StaleReference {
        /// Handle id
        handle: String,
    },

    /// The page refused the interaction
    #[error("interaction blocked: {message}")]
    InteractionBlocked {
        /// Error message
        message: String,
    },

    /// The browser session is gone
    #[error("browser session unusable: {message}")]
    Transport {
        /// Error message
        message: String,
    },
}

impl DriverError {
    /// Create an element-absent error
    #[must_use]
    pub fn absent(selector: impl Into<String>) -> Self {
        Self::ElementAbsent {
            selector: selector.into(),
        }
    }

    /// Create a stale-reference error
    #[must_use]
    pub fn stale(handle: impl Into<String>) -> Self {
        Self::StaleReference {
            handle: handle.into(),
        }
    }

    /// Create an interaction-blocked error
    #[must_use]
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::InteractionBlocked {
            message: message.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Failure category for this error
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::ElementAbsent { .. } => FailureKind::ElementAbsent,
            Self::StaleReference { .. } => FailureKind::StaleReference,
            Self::InteractionBlocked { .. } => FailureKind::InteractionBlocked,
            Self::Transport { .. } => FailureKind::TransportError,
        }
    }

    /// Whether the locator resolver may recover by trying again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ElementAbsent { .. } | Self::StaleReference { .. }
        )
    }

    /// Whether the error must abort the run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

/// Run-level errors
#[derive(Debug, Error)]
pub enum FormProbeError {
    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration file: {0}")]
    ConfigFormat(#[from] serde_yaml_ng::Error),

    /// Report serialization failed
    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Driver failure outside of a step
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormProbeError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
