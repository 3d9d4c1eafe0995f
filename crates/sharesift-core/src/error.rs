//! Error types for rule loading, rule evaluation and file scanning.

use std::path::PathBuf;

use thiserror::Error;

use crate::rule::MatchLocation;

/// Errors that can occur while scanning a single path.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found (deleted since it was enumerated, or a dangling link).
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error comes from racy filesystem state rather than a fault.
    ///
    /// Entries vanish, permissions change and deep paths exceed name limits
    /// while a share is being walked; these are logged at trace level and
    /// never treated as failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } | Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::InvalidFilename,
        }
    }
}

/// Errors raised while evaluating a single rule against a candidate.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule inspects an attribute that cannot be compared as text.
    #[error("Rule {rule} matches on {location}, which is not a text attribute")]
    NotTextual { rule: String, location: MatchLocation },

    /// The rule needed file content that could not be read.
    #[error("Rule {rule} could not read {path}: {source}")]
    Content {
        rule: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in rule or walker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A pattern in a rule failed to compile.
    #[error("Rule {rule} has an invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        message: String,
    },

    /// A rule has no patterns but its location requires them.
    #[error("Rule {rule} has no patterns")]
    EmptyPatterns { rule: String },

    /// The rule file could not be parsed.
    #[error("Could not parse rule file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The rule file could not be read.
    #[error("Could not read rule file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid walker configuration.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
