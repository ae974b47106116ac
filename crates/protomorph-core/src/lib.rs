//! Protomorph Core - template-driven conversion between message protocol families
//!
//! This crate matches structured messages against example templates of their
//! protocol family, extracts the variable bindings that made them match, and
//! renders those bindings into a template of another family.
//!
//! # Main Components
//!
//! - **Paths**: A small query language over JSON trees (`a.b[0]`, `items[*].name`, `opt?`)
//! - **Expressions**: Classification of `{{ }}` placeholders as regular, special or mapping
//! - **Matching**: Structural matching and weighted candidate scoring
//! - **Rendering**: Substitution with filters, pluggable functions and dynamic arrays
//! - **Remapping**: Cross-field transforms such as splitting an intersection into two roads
//!
//! # Example
//!
//! ```no_run
//! use protomorph_core::{ConversionEngine, Result, TemplateRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn example() -> Result<()> {
//!     let registry = Arc::new(TemplateRegistry::new());
//!     registry.load("A-1", "A", json!({"action": "DIAL", "name": "{{ person }}"}))?;
//!     registry.load("C-1", "C", json!({"intent": "call", "contact": "{{ person }}"}))?;
//!
//!     let engine = ConversionEngine::new(registry)?;
//!     let result = engine.convert("A", "C", &json!({"action": "DIAL", "name": "张三"}));
//!     assert!(result.success);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod matching;
pub mod path;
pub mod registry;
pub mod remap;
pub mod render;
pub mod template;
pub mod types;

#[cfg(test)]
mod proptest_strategies;

// Re-export main types for convenience
pub use config::{EngineConfig, MatchConfig, OptionalFieldPolicy, RenderConfig, ScoreWeights, TargetResolution};
pub use engine::{ConversionEngine, ConversionEngineBuilder};
pub use error::{Error, MatchStrategy, Result, Severity};
pub use expression::{Expression, ExpressionKind, Filter};
pub use matching::{
    CandidateScorer, MatchCandidate, MatchReport, StructuralMatcher, ValidationIssue, ValidationReport,
};
pub use path::{Path, PathError, PathSegment};
pub use registry::TemplateRegistry;
pub use remap::{FieldMappingRule, FieldRemapper, ProcessorTable, RemapConfig};
pub use render::{ConversionContext, FunctionRegistry, Renderer, SpecialFunction};
pub use template::{ArrayMarker, Template, VariableTable};
pub use types::{Bindings, ConversionResult, DebugEvent, DebugEventKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
