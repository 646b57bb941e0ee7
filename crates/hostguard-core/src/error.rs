//! Error types for HostGuard

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using HostGuard Error
pub type Result<T> = std::result::Result<T, Error>;

/// HostGuard error types
#[derive(Error, Debug)]
pub enum Error {
    // === Probe Errors ===
    #[error("Cannot inspect {target}: {message}")]
    Probe { target: String, message: String },

    // === Policy Errors ===
    #[error("Missing required policy key: {key}")]
    MissingPolicy { key: String },

    #[error("Invalid policy value for {key}: {message}")]
    InvalidPolicy { key: String, message: String },

    // === Render Errors ===
    #[error("Failed to render template {template}: {message}")]
    Render { template: String, message: String },

    // === Remediation Errors ===
    #[error("Remediation failed for {target}: {message}")]
    Remediation { target: String, message: String },

    #[error("Package manager {manager} is locked by another process")]
    PackageManagerLocked { manager: String },

    #[error("Remediation mechanism unavailable: {0}")]
    Fatal(String),

    // === Orchestration Errors ===
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Coarse classification of an [`Error`], used to decide how far it propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Current state could not be determined
    Probe,
    /// Policy data missing or malformed
    Policy,
    /// Template rendering failed
    Render,
    /// The corrective action failed
    Remediation,
    /// The remediation mechanism itself is unusable
    Fatal,
}

impl Error {
    /// Shorthand for a probe error
    pub fn probe(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Probe {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a remediation error
    pub fn remediation(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Remediation {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Probe { .. } | Error::Io(_) | Error::Parse(_) => ErrorKind::Probe,
            Error::MissingPolicy { .. }
            | Error::InvalidPolicy { .. }
            | Error::UnknownCategory(_)
            | Error::Configuration(_) => ErrorKind::Policy,
            Error::Render { .. } => ErrorKind::Render,
            Error::Remediation { .. } | Error::PackageManagerLocked { .. } => {
                ErrorKind::Remediation
            }
            Error::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PackageManagerLocked { .. })
    }

    /// Check if this error is fatal (should abort the category run)
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Get an error code for logging/reporting
    pub fn code(&self) -> &'static str {
        match self {
            Error::Probe { .. } => "PROBE_FAILED",
            Error::MissingPolicy { .. } => "MISSING_POLICY",
            Error::InvalidPolicy { .. } => "INVALID_POLICY",
            Error::Render { .. } => "RENDER_FAILED",
            Error::Remediation { .. } => "REMEDIATION_FAILED",
            Error::PackageManagerLocked { .. } => "PACKAGE_MANAGER_LOCKED",
            Error::Fatal(_) => "FATAL",
            Error::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
        }
    }
}
