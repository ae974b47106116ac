//! Error types for the Protomorph core library
//!
//! This module defines the error handling system for the conversion engine,
//! using thiserror for ergonomic error definitions and anyhow for flexible error contexts.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

use crate::path::PathError;

/// Main error type for Protomorph operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed path syntax or traversal into the wrong node type
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// No candidate template of the source family scored above the threshold
    #[error("No matching template in family '{family}' ({candidates} candidates considered)")]
    NoMatchingTemplate {
        family: String,
        candidates: usize,
    },

    /// A source template matched but its paired target template is absent
    #[error("No corresponding target for '{source_id}' in family '{target_family}' (expected '{expected_id}')")]
    NoCorrespondingTarget {
        source_id: String,
        target_family: String,
        expected_id: String,
    },

    /// Lookup of a template id that is not registered
    #[error("Template not found: {id}")]
    TemplateNotFound {
        id: String,
    },

    /// A template tree that cannot be analyzed
    #[error("Invalid template '{id}': {message}")]
    InvalidTemplate {
        id: String,
        message: String,
    },

    /// A variable that has no binding, default, or resolver
    #[error("Unresolved variable: {name}")]
    UnresolvedVariable {
        name: String,
    },

    /// A field remapping processor failed
    #[error("Processor '{processor}' failed in rule '{rule}': {message}")]
    Processor {
        processor: String,
        rule: String,
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable kind, used in conversion results
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Path(_) => "PathError",
            Error::NoMatchingTemplate { .. } => "NoMatchingTemplate",
            Error::NoCorrespondingTarget { .. } => "NoCorrespondingTarget",
            Error::TemplateNotFound { .. } => "TemplateNotFound",
            Error::InvalidTemplate { .. } => "InvalidTemplate",
            Error::UnresolvedVariable { .. } => "UnresolvedVariable",
            Error::Processor { .. } => "ProcessorError",
            Error::Configuration { .. } => "Configuration",
            Error::Json { .. } => "Json",
            Error::Io { .. } => "Io",
            Error::Internal { .. } => "Internal",
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }
}

/// Candidate selection strategies
///
/// Serialized in snake_case; the variant names are accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// A structural failure forces a score of zero
    #[serde(alias = "Strict")]
    Strict,
    /// Favors coverage and completeness over structure
    #[serde(alias = "Lenient")]
    Lenient,
    /// Configured weights, structural failures degrade the score
    #[default]
    #[serde(alias = "BestEffort")]
    BestEffort,
}

/// Severity levels for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// Warning, should be reviewed
    Warning,
    /// Error, the validation result is invalid
    Error,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::Strict => write!(f, "Strict"),
            MatchStrategy::Lenient => write!(f, "Lenient"),
            MatchStrategy::BestEffort => write!(f, "BestEffort"),
        }
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "strict" => Ok(MatchStrategy::Strict),
            "lenient" => Ok(MatchStrategy::Lenient),
            "besteffort" => Ok(MatchStrategy::BestEffort),
            other => Err(Error::config(format!("unknown match strategy '{}'", other))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}
