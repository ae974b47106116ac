//! Candidate scoring and ranking
//!
//! Each candidate gets three sub-scores in `[0, 1]`:
//!
//! - structural validity: 1.0 on a structural match, otherwise
//!   `max(0, 1 - 0.2 * errors)` (or 0 under the strict strategy)
//! - path coverage: share of the template's variable paths present in the data
//! - variable completeness: share of variables with a non-null value in the data
//!
//! The final score is their weighted sum, normalized by the total weight.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::structural::StructuralMatcher;
use super::validation::{ValidationIssue, ValidationReport};
use crate::config::MatchConfig;
use crate::error::{MatchStrategy, Severity};
use crate::path::Path;
use crate::template::Template;
use crate::types::Bindings;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Penalty per structural error outside the strict strategy
const ERROR_PENALTY: f64 = 0.2;

/// Issues of each severity printed per candidate in a [`MatchReport`]
const REPORTED_ERRORS: usize = 10;
const REPORTED_WARNINGS: usize = 5;

/// Sub-scores and counters behind a candidate's score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub structural: f64,
    pub coverage: f64,
    pub completeness: f64,
    pub structural_match: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

/// A scored template
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub template: Arc<Template>,
    pub score: f64,
    pub diagnostics: ScoreBreakdown,
}

/// The selected candidate with the bindings it extracted
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub candidate: MatchCandidate,
    pub bindings: Bindings,
}

/// How one template fared against the input, rejected or not
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub template_id: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Below the threshold, or a structural failure under the strict strategy
    pub rejected: bool,
    pub issues: Vec<ValidationIssue>,
    /// Variables with a value in the data, in declaration order
    pub extracted: Vec<String>,
    /// Variables without one, with their default when declared
    pub missing: Vec<(String, Option<Value>)>,
}

impl fmt::Display for CandidateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Template {}: score {:.3}{}",
            self.template_id,
            self.score,
            if self.rejected { " (rejected)" } else { "" }
        )?;
        writeln!(
            f,
            "  structural {:.2}, coverage {:.2}, completeness {:.2}, {} error(s), {} warning(s)",
            self.breakdown.structural,
            self.breakdown.coverage,
            self.breakdown.completeness,
            self.breakdown.error_count,
            self.breakdown.warning_count
        )?;

        let errors: Vec<&ValidationIssue> = self.issues.iter().filter(|issue| issue.is_error()).collect();
        for issue in errors.iter().take(REPORTED_ERRORS) {
            writeln!(f, "  {}", issue)?;
        }
        if errors.len() > REPORTED_ERRORS {
            writeln!(f, "  ... and {} more error(s)", errors.len() - REPORTED_ERRORS)?;
        }
        let warnings: Vec<&ValidationIssue> = self
            .issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
            .collect();
        for issue in warnings.iter().take(REPORTED_WARNINGS) {
            writeln!(f, "  {}", issue)?;
        }
        if warnings.len() > REPORTED_WARNINGS {
            writeln!(f, "  ... and {} more warning(s)", warnings.len() - REPORTED_WARNINGS)?;
        }

        if !self.extracted.is_empty() {
            writeln!(f, "  extracted: {}", self.extracted.join(", "))?;
        }
        for (name, default) in &self.missing {
            match default {
                Some(value) => writeln!(f, "  missing: {} (default {})", name, value)?,
                None => writeln!(f, "  missing: {}", name)?,
            }
        }
        Ok(())
    }
}

/// Every candidate of a family scored against one input, best first
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub strategy: MatchStrategy,
    pub threshold: f64,
    pub candidates: Vec<CandidateReport>,
}

impl MatchReport {
    /// Best candidate that was not rejected
    pub fn selected(&self) -> Option<&CandidateReport> {
        self.candidates.iter().find(|candidate| !candidate.rejected)
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Match report: {} candidate(s), strategy {}, threshold {:.2}",
            self.candidates.len(),
            self.strategy,
            self.threshold
        )?;
        match self.selected() {
            Some(candidate) => writeln!(f, "Selected: {}", candidate.template_id)?,
            None => writeln!(f, "Selected: none")?,
        }
        for candidate in &self.candidates {
            write!(f, "{}", candidate)?;
        }
        Ok(())
    }
}

/// Ranks templates of a family against input data
#[derive(Debug, Clone, Default)]
pub struct CandidateScorer {
    config: MatchConfig,
    matcher: StructuralMatcher,
}

impl CandidateScorer {
    pub fn new(config: MatchConfig) -> Self {
        let matcher = StructuralMatcher::new(config.optional_fields.clone());
        Self { config, matcher }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn matcher(&self) -> &StructuralMatcher {
        &self.matcher
    }

    /// Compute the sub-scores of `template` against `data`
    pub fn breakdown(&self, template: &Template, data: &Value) -> ScoreBreakdown {
        let report = self.matcher.validate(template.tree(), data);
        self.breakdown_of(template, data, &report)
    }

    fn breakdown_of(&self, template: &Template, data: &Value, report: &ValidationReport) -> ScoreBreakdown {
        let structural_match = report.is_valid();
        let error_count = report.error_count();

        let structural = if structural_match {
            1.0
        } else {
            match self.config.strategy {
                MatchStrategy::Strict => 0.0,
                MatchStrategy::Lenient | MatchStrategy::BestEffort => {
                    (1.0 - ERROR_PENALTY * error_count as f64).max(0.0)
                }
            }
        };

        let variables = template.variables();
        let expected: HashSet<&Path> = variables.expected_paths().collect();
        let coverage = if expected.is_empty() {
            1.0
        } else {
            let matched: HashSet<&Path> = report.matched_paths.iter().collect();
            expected.intersection(&matched).count() as f64 / expected.len() as f64
        };

        let completeness = if variables.is_empty() {
            1.0
        } else {
            let resolved = variables
                .iter()
                .filter(|info| variables.resolve_from_data(info, data).is_some())
                .count();
            resolved as f64 / variables.len() as f64
        };

        ScoreBreakdown {
            structural,
            coverage,
            completeness,
            structural_match,
            error_count,
            warning_count: report.warning_count(),
        }
    }

    /// Weighted score of a breakdown under the configured strategy
    pub fn combine(&self, breakdown: &ScoreBreakdown) -> f64 {
        if self.config.strategy == MatchStrategy::Strict && !breakdown.structural_match {
            return 0.0;
        }
        let weights = self.config.effective_weights();
        let total = weights.total();
        if total <= 0.0 {
            return 0.0;
        }
        let score = weights.structural * breakdown.structural
            + weights.coverage * breakdown.coverage
            + weights.completeness * breakdown.completeness;
        (score / total).clamp(0.0, 1.0)
    }

    /// Score `template` against `data`
    pub fn score(&self, template: &Template, data: &Value) -> (f64, ScoreBreakdown) {
        let breakdown = self.breakdown(template, data);
        (self.combine(&breakdown), breakdown)
    }

    /// Candidates at or above the threshold, best first.
    ///
    /// Ties keep the order in which candidates were supplied, which is the
    /// registration order when they come from the registry.
    pub fn rank<I>(&self, candidates: I, data: &Value) -> Vec<MatchCandidate>
    where
        I: IntoIterator<Item = Arc<Template>>,
    {
        let mut ranked: Vec<MatchCandidate> = candidates
            .into_iter()
            .filter_map(|template| {
                let (score, diagnostics) = self.score(&template, data);
                log::debug!(
                    "Candidate '{}' scored {:.3} (structural {:.2}, coverage {:.2}, completeness {:.2})",
                    template.id(),
                    score,
                    diagnostics.structural,
                    diagnostics.coverage,
                    diagnostics.completeness
                );
                if self.is_rejected(score, &diagnostics) {
                    None
                } else {
                    Some(MatchCandidate { template, score, diagnostics })
                }
            })
            .collect();

        // stable sort keeps supplied order among equal scores
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(self.config.max_candidates);
        ranked
    }

    fn is_rejected(&self, score: f64, breakdown: &ScoreBreakdown) -> bool {
        score < self.config.min_score_threshold
            || (self.config.strategy == MatchStrategy::Strict && !breakdown.structural_match)
    }

    /// Diagnostic view of every candidate, rejected ones included.
    ///
    /// Ordered like [`CandidateScorer::rank`] but without the candidate limit.
    pub fn match_report<I>(&self, candidates: I, data: &Value) -> MatchReport
    where
        I: IntoIterator<Item = Arc<Template>>,
    {
        let mut reports: Vec<CandidateReport> = candidates
            .into_iter()
            .map(|template| {
                let validation = self.matcher.validate(template.tree(), data);
                let breakdown = self.breakdown_of(&template, data, &validation);
                let score = self.combine(&breakdown);

                let variables = template.variables();
                let (extracted, missing): (Vec<_>, Vec<_>) = variables
                    .iter()
                    .partition(|info| variables.resolve_from_data(info, data).is_some());
                CandidateReport {
                    template_id: template.id().to_string(),
                    score,
                    breakdown,
                    rejected: self.is_rejected(score, &breakdown),
                    issues: validation.issues,
                    extracted: extracted.into_iter().map(|info| info.name.clone()).collect(),
                    missing: missing
                        .into_iter()
                        .map(|info| (info.name.clone(), info.default.clone()))
                        .collect(),
                }
            })
            .collect();
        reports.sort_by(|a, b| b.score.total_cmp(&a.score));

        MatchReport {
            strategy: self.config.strategy,
            threshold: self.config.min_score_threshold,
            candidates: reports,
        }
    }

    /// Best candidate with its extracted bindings
    pub fn best_match<I>(&self, candidates: I, data: &Value) -> Option<MatchResult>
    where
        I: IntoIterator<Item = Arc<Template>>,
    {
        let candidate = self.rank(candidates, data).into_iter().next()?;
        let bindings = candidate.template.extract(data);
        Some(MatchResult { candidate, bindings })
    }
}
