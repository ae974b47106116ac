//! Core types shared across the conversion engine

use crate::error::MatchStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Resolved variable values, keyed by variable name
pub type Bindings = serde_json::Map<String, Value>;

/// What a debug event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugEventKind {
    /// A variable rendered as a missing marker
    UnresolvedVariable,
    /// A filter could not be applied and was skipped
    FilterFailed,
    /// A pluggable function was absent or returned an error
    FunctionFailed,
    /// A remapping processor failed and its rule was skipped
    ProcessorFailed,
    /// A dynamic array had no usable source sequence
    ArraySourceMissing,
    /// A dynamic array source was found by the fallback heuristic
    ArraySourceHeuristic,
    /// A control block was not evaluated
    ControlBlockSkipped,
    /// Expansion stopped at the maximum render depth
    DepthLimit,
}

impl fmt::Display for DebugEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DebugEventKind::UnresolvedVariable => "unresolved_variable",
            DebugEventKind::FilterFailed => "filter_failed",
            DebugEventKind::FunctionFailed => "function_failed",
            DebugEventKind::ProcessorFailed => "processor_failed",
            DebugEventKind::ArraySourceMissing => "array_source_missing",
            DebugEventKind::ArraySourceHeuristic => "array_source_heuristic",
            DebugEventKind::ControlBlockSkipped => "control_block_skipped",
            DebugEventKind::DepthLimit => "depth_limit",
        };
        write!(f, "{}", label)
    }
}

/// A degradation recorded while rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEvent {
    pub kind: DebugEventKind,
    /// Output path where it happened
    pub path: String,
    pub message: String,
}

/// Bookkeeping for one conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionMetadata {
    pub conversion_id: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub strategy: MatchStrategy,
}

/// Error summary carried by a failed conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionError {
    pub kind: String,
    pub message: String,
}

impl From<&crate::Error> for ConversionError {
    fn from(err: &crate::Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a `convert()` call; always returned, inspect `success`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ConversionError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_info: Vec<DebugEvent>,
    pub metadata: ConversionMetadata,
}

impl ConversionResult {
    /// True when rendering absorbed at least one failure
    pub fn is_degraded(&self) -> bool {
        !self.debug_info.is_empty()
    }

    /// Debug events of one kind
    pub fn events(&self, kind: DebugEventKind) -> impl Iterator<Item = &DebugEvent> {
        self.debug_info.iter().filter(move |event| event.kind == kind)
    }
}
