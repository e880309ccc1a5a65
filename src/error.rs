//! Error types for access-policy
//!
//! This module defines the error hierarchy for the policy engine.
//! Errors are categorized by subsystem and carry recovery hints.
//!
//! Note that the decision path never produces an error: `decide` always
//! returns a boolean. Errors only surface from configuration, rule
//! loading and shutdown.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for access-policy
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rule source errors (file, key-value store)
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    /// Rule compilation errors
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
}

impl PolicyError {
    /// Check if this error is recoverable (can retry operation)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(e) => e.is_recoverable(),
            Self::Loader(e) => e.is_recoverable(),
            Self::Rule(_) => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Config errors are not recoverable without user intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

/// Rule compilation errors
///
/// Individual unparseable patterns are never errors (they are classified
/// as domains). These errors only arise when a matcher automaton cannot be
/// built, e.g. when a pattern set exceeds the regex size limit.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A matcher failed to compile
    #[error("Failed to compile {family} matcher: {reason}")]
    CompilationError {
        /// Matcher family that failed
        family: &'static str,
        /// Compiler error message
        reason: String,
    },
}

impl RuleError {
    /// Create a compilation error
    pub fn compilation(family: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::CompilationError {
            family,
            reason: reason.to_string(),
        }
    }
}

/// Rule source errors
///
/// A loader error never reaches the caller of a policy decision. During a
/// reload cycle it is logged and the failing source contributes no rules.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Reading a rule file failed
    #[error("Failed to read rule file {path}: {source}")]
    Io {
        /// Path of the rule file
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A load did not complete within the per-cycle timeout
    #[error("Loading from {source_name} timed out after {timeout:?}")]
    Timeout {
        /// Name of the rule source
        source_name: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Key-value store round trip failed
    #[error("Rule store error: {0}")]
    Store(String),

    /// The source was already closed
    #[error("Rule source is closed")]
    Closed,
}

impl LoaderError {
    /// Check if this error is recoverable
    ///
    /// Every error except `Closed` may clear up on the next reload cycle.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { source, .. } => !matches!(
                source.kind(),
                io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidInput
            ),
            Self::Timeout { .. } | Self::Store(_) => true,
            Self::Closed => false,
        }
    }

    /// Create an I/O error for the given path
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

/// Type alias for Result with `PolicyError`
pub type Result<T> = std::result::Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recovery_classification() {
        let config_err = ConfigError::validation("test");
        assert!(!config_err.is_recoverable());

        let timeout_err = LoaderError::Timeout {
            source_name: "file:/tmp/rules".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(timeout_err.is_recoverable());

        let missing = LoaderError::io(
            "/nonexistent",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(missing.is_recoverable());

        let denied = LoaderError::io(
            "/root/secret",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!denied.is_recoverable());

        assert!(!LoaderError::Closed.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = LoaderError::io(
            "/etc/policy/rules.txt",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/etc/policy/rules.txt"));
        assert!(msg.contains("no such file"));

        let err = LoaderError::store("connection refused");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_conversion() {
        let err: PolicyError = LoaderError::store("down").into();
        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("Loader error"));

        let err: PolicyError = ConfigError::validation("bad").into();
        assert!(!err.is_recoverable());

        let err: PolicyError = RuleError::compilation("wildcard", "size limit exceeded").into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("wildcard"));
    }
}
