//! Validation issues and reports
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use crate::error::Severity;
use crate::path::Path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validation finding with its location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationIssue {
    pub fn new(path: impl fmt::Display, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
            severity,
            expected: None,
            actual: None,
        }
    }

    pub fn error(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(path, message, Severity::Error)
    }

    pub fn warning(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(path, message, Severity::Warning)
    }

    pub fn info(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(path, message, Severity::Info)
    }

    pub fn with_values(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {}, found {})", expected, actual)?;
        }
        Ok(())
    }
}

/// Outcome of validating data against a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    /// Template paths found in the data
    pub matched_paths: Vec<Path>,
    /// Template paths absent from the data
    pub unmatched_paths: Vec<Path>,
}

impl ValidationReport {
    /// Only `Error` issues make a report invalid
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|issue| issue.severity == severity).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|issue| issue.is_error())
    }

    pub(crate) fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_errors_invalidate() {
        let mut report = ValidationReport::default();
        report.push(ValidationIssue::warning("a", "extra field"));
        report.push(ValidationIssue::info("b", "optional field absent"));
        assert!(report.is_valid());

        report.push(ValidationIssue::error("c", "missing").with_values("present", "absent"));
        assert!(!report.is_valid());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.count(Severity::Info), 1);
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::error("slots.name", "value mismatch").with_values("\"x\"", "\"y\"");
        assert_eq!(
            issue.to_string(),
            "[error] slots.name: value mismatch (expected \"x\", found \"y\")"
        );
    }
}
