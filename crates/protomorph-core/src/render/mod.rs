//! Rendering of target templates
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

pub mod context;
pub mod expander;
pub mod filters;
pub mod functions;
pub mod renderer;

pub use context::{ConversionContext, ConversionScope, Progress};
pub use expander::ArrayExpander;
pub use filters::{apply_filter, FilterError};
pub use functions::{Fallible, FunctionError, FunctionRegistry, SpecialFunction};
pub use renderer::{function_error_marker, missing_marker, Renderer};
