//! Error types for path operations
//!
//! Path errors are fatal to a single `get`/`set`/`delete` call, never to a
//! whole conversion. Each variant carries the textual path at which the
//! failure happened so callers can report it.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use thiserror::Error;

/// Path parsing and traversal errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    /// Parse errors during path expression parsing
    #[error("Parse error at position {position}: {message}")]
    Parse {
        message: String,
        position: usize,
        input: String,
    },

    /// A required object key is absent
    #[error("Key '{key}' not found at {path}")]
    KeyNotFound {
        key: String,
        path: String,
    },

    /// Index out of bounds errors
    #[error("Index out of bounds: {index} in array of length {length} at {path}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        path: String,
    },

    /// Type mismatch errors
    #[error("Type mismatch: expected {expected}, found {found} at {path}")]
    TypeMismatch {
        expected: String,
        found: String,
        path: String,
    },

    /// The root path was given to an operation that needs a target
    #[error("Empty path is not valid for {operation}")]
    EmptyPath {
        operation: String,
    },

    /// Operation not supported for this path shape
    #[error("Unsupported operation: {operation} on '{path}'")]
    Unsupported {
        operation: String,
        path: String,
    },

    /// `relative_to` was called with a base that is not an ancestor
    #[error("Path '{path}' is not a descendant of '{base}'")]
    NotDescendant {
        path: String,
        base: String,
    },
}

impl PathError {
    /// Create a parse error with position and input
    pub fn parse(message: impl Into<String>, position: usize, input: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            position,
            input: input.into(),
        }
    }

    pub fn key_not_found(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self::KeyNotFound {
            key: key.into(),
            path: path.into(),
        }
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: i64, length: usize, path: impl Into<String>) -> Self {
        Self::IndexOutOfBounds {
            index,
            length,
            path: path.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        expected: impl Into<String>,
        found: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
            path: path.into(),
        }
    }

    pub fn empty_path(operation: impl Into<String>) -> Self {
        Self::EmptyPath {
            operation: operation.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            path: path.into(),
        }
    }

    pub fn not_descendant(path: impl Into<String>, base: impl Into<String>) -> Self {
        Self::NotDescendant {
            path: path.into(),
            base: base.into(),
        }
    }

    /// True when the failure only means "nothing is there"
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. } | Self::IndexOutOfBounds { .. })
    }

    /// Get the error message with a caret under the failing position
    pub fn detailed_message(&self) -> String {
        match self {
            Self::Parse { message, position, input } => {
                let mut result = format!("Parse error at position {}: {}", position, message);
                if !input.is_empty() {
                    result.push_str(&format!("\nInput: {}", input));
                    if *position <= input.len() {
                        result.push_str(&format!("\n       {}^", " ".repeat(*position)));
                    }
                }
                result
            }
            _ => self.to_string(),
        }
    }
}
