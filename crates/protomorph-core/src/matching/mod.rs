//! Template matching
//!
//! [`StructuralMatcher`] decides whether input data has a template's shape;
//! [`CandidateScorer`] ranks the templates of a family when several could
//! match and extracts the bindings of the winner.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

pub mod scorer;
pub mod structural;
pub mod validation;


pub use scorer::{CandidateReport, CandidateScorer, MatchCandidate, MatchReport, MatchResult, ScoreBreakdown};
pub use structural::StructuralMatcher;
pub use validation::{ValidationIssue, ValidationReport};
