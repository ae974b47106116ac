//! Engine configuration
//!
//! All settings deserialize from JSON with defaults for every missing field,
//! and a few can be overridden from the environment:
//!
//! - `PROTOMORPH_MATCH_STRATEGY` (`strict`, `lenient`, `best_effort`)
//! - `PROTOMORPH_MIN_SCORE` (float in `[0, 1]`)
//! - `PROTOMORPH_MAX_RENDER_DEPTH` (positive integer)

use crate::error::{Error, MatchStrategy, Result};
use crate::remap::RemapConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path as FsPath;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchConfig,
    pub rendering: RenderConfig,
    pub targets: TargetResolution,
    pub remapping: RemapConfig,
}

/// Candidate matching and scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub strategy: MatchStrategy,
    /// Candidates scoring below this are discarded
    pub min_score_threshold: f64,
    /// Upper bound on ranked candidates returned
    pub max_candidates: usize,
    /// Weights for the strict and best-effort strategies
    pub weights: ScoreWeights,
    /// Weights for the lenient strategy
    pub lenient_weights: ScoreWeights,
    pub optional_fields: OptionalFieldPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::BestEffort,
            min_score_threshold: 0.3,
            max_candidates: 50,
            weights: ScoreWeights::default(),
            lenient_weights: ScoreWeights::lenient(),
            optional_fields: OptionalFieldPolicy::default(),
        }
    }
}

impl MatchConfig {
    /// Weights in effect for the configured strategy
    pub fn effective_weights(&self) -> ScoreWeights {
        match self.strategy {
            MatchStrategy::Lenient => self.lenient_weights,
            MatchStrategy::Strict | MatchStrategy::BestEffort => self.weights,
        }
    }
}

/// Weights of the three sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub structural: f64,
    pub coverage: f64,
    pub completeness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            structural: 0.6,
            coverage: 0.3,
            completeness: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn lenient() -> Self {
        Self {
            structural: 0.3,
            coverage: 0.5,
            completeness: 0.2,
        }
    }

    pub fn total(&self) -> f64 {
        self.structural + self.coverage + self.completeness
    }

    fn validate(&self, label: &str) -> Result<()> {
        let parts = [self.structural, self.coverage, self.completeness];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::config(format!("{} weights must be finite and non-negative", label)));
        }
        if self.total() <= 0.0 {
            return Err(Error::config(format!("{} weights must not all be zero", label)));
        }
        Ok(())
    }
}

/// How keyword matching treats field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeywordMatch {
    /// Key contains a keyword, case-insensitive
    #[default]
    Substring,
    /// Key equals a keyword, case-insensitive
    Exact,
}

/// Decides which template keys may be absent from matching data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionalFieldPolicy {
    pub keywords: Vec<String>,
    pub keyword_match: KeywordMatch,
    /// Treat expression leaves with a `default(...)` filter as optional
    pub honor_default_filter: bool,
}

impl Default for OptionalFieldPolicy {
    fn default() -> Self {
        Self {
            keywords: ["context", "metadata", "session_info", "processing"]
                .into_iter()
                .map(String::from)
                .collect(),
            keyword_match: KeywordMatch::Substring,
            honor_default_filter: true,
        }
    }
}

impl OptionalFieldPolicy {
    /// Policy with no optional keys at all
    pub fn none() -> Self {
        Self {
            keywords: Vec::new(),
            keyword_match: KeywordMatch::Exact,
            honor_default_filter: false,
        }
    }

    pub fn is_optional_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.keywords.iter().any(|keyword| {
            let keyword = keyword.to_lowercase();
            match self.keyword_match {
                KeywordMatch::Substring => key.contains(&keyword),
                KeywordMatch::Exact => key == keyword,
            }
        })
    }
}

/// Rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Keep non-string types when a leaf is exactly one unfiltered variable
    pub preserve_scalar_types: bool,
    /// Nesting of dynamic arrays beyond this is not expanded
    pub max_render_depth: usize,
    /// Drop `{% ... %}` blocks from output instead of keeping them verbatim
    pub strip_control_blocks: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            preserve_scalar_types: false,
            max_render_depth: 64,
            strip_control_blocks: true,
        }
    }
}

/// Pairing of matched source templates with target templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetResolution {
    /// Separator between family prefix and numeric suffix in template ids
    pub separator: String,
    /// Explicit pairings: source template id -> target family -> target id
    pub overrides: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for TargetResolution {
    fn default() -> Self {
        Self {
            separator: "-".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

impl TargetResolution {
    /// Target template id expected for `source_id` in `target_family`.
    ///
    /// Explicit overrides win; otherwise the suffix after the last separator
    /// is kept and the family prefix replaced.
    pub fn expected_target_id(&self, source_id: &str, target_family: &str) -> Option<String> {
        if let Some(target) = self
            .overrides
            .get(source_id)
            .and_then(|targets| targets.get(target_family))
        {
            return Some(target.clone());
        }
        if self.separator.is_empty() {
            return None;
        }
        let (_, suffix) = source_id.rsplit_once(self.separator.as_str())?;
        Some(format!("{}{}{}", target_family, self.separator, suffix))
    }
}

impl EngineConfig {
    /// Parse a configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_path(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| Error::Configuration {
            message: format!("failed to read {}", path.display()),
            source: Some(err.into()),
        })?;
        Self::from_json_str(&contents)
    }

    /// Apply `PROTOMORPH_*` environment overrides, ignoring invalid values
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(strategy) = std::env::var("PROTOMORPH_MATCH_STRATEGY") {
            match strategy.parse() {
                Ok(strategy) => self.matching.strategy = strategy,
                Err(err) => log::warn!("Ignoring PROTOMORPH_MATCH_STRATEGY: {}", err),
            }
        }

        if let Ok(score) = std::env::var("PROTOMORPH_MIN_SCORE") {
            match score.parse::<f64>() {
                Ok(score) if (0.0..=1.0).contains(&score) => self.matching.min_score_threshold = score,
                _ => log::warn!("Ignoring PROTOMORPH_MIN_SCORE: '{}' is not in [0, 1]", score),
            }
        }

        if let Ok(depth) = std::env::var("PROTOMORPH_MAX_RENDER_DEPTH") {
            match depth.parse::<usize>() {
                Ok(depth) if depth > 0 => self.rendering.max_render_depth = depth,
                _ => log::warn!("Ignoring PROTOMORPH_MAX_RENDER_DEPTH: '{}'", depth),
            }
        }

        self
    }

    /// Check value ranges; remapping rules are checked against the
    /// processor table when an engine is built
    pub fn validate(&self) -> Result<()> {
        let matching = &self.matching;
        if !(0.0..=1.0).contains(&matching.min_score_threshold) {
            return Err(Error::config("min_score_threshold must be within [0, 1]"));
        }
        if matching.max_candidates == 0 {
            return Err(Error::config("max_candidates must be positive"));
        }
        matching.weights.validate("matching")?;
        matching.lenient_weights.validate("lenient")?;

        if self.rendering.max_render_depth == 0 {
            return Err(Error::config("max_render_depth must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.matching.strategy, MatchStrategy::BestEffort);
        assert_eq!(config.matching.min_score_threshold, 0.3);
        assert_eq!(config.matching.max_candidates, 50);
        assert_eq!(config.matching.effective_weights(), ScoreWeights::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lenient_weights_selected() {
        let mut config = MatchConfig::default();
        config.strategy = MatchStrategy::Lenient;
        assert_eq!(config.effective_weights(), ScoreWeights::lenient());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json_str(
            r#"{"matching": {"strategy": "Strict", "optional_fields": {"keywords": ["extra"]}}}"#,
        )
        .unwrap();
        assert_eq!(config.matching.strategy, MatchStrategy::Strict);
        assert_eq!(config.matching.min_score_threshold, 0.3);
        assert!(config.matching.optional_fields.is_optional_key("extra_info"));
        assert!(!config.matching.optional_fields.is_optional_key("metadata"));
        assert!(config.matching.optional_fields.honor_default_filter);
    }

    #[test]
    fn test_strategy_names_in_documents() {
        for (name, expected) in [
            ("best_effort", MatchStrategy::BestEffort),
            ("BestEffort", MatchStrategy::BestEffort),
            ("strict", MatchStrategy::Strict),
            ("lenient", MatchStrategy::Lenient),
        ] {
            let document = format!(r#"{{"matching": {{"strategy": "{}"}}}}"#, name);
            assert_eq!(EngineConfig::from_json_str(&document).unwrap().matching.strategy, expected, "{}", name);
        }
        assert!(EngineConfig::from_json_str(r#"{"matching": {"strategy": "fuzzy"}}"#).is_err());

        let written = serde_json::to_value(MatchConfig::default()).unwrap();
        assert_eq!(written["strategy"], serde_json::json!("best_effort"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"matching": {"min_score_threshold": 1.5}}"#).is_err());
        assert!(EngineConfig::from_json_str(
            r#"{"matching": {"weights": {"structural": 0, "coverage": 0, "completeness": 0}}}"#
        )
        .is_err());
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_optional_policy_modes() {
        let policy = OptionalFieldPolicy::default();
        assert!(policy.is_optional_key("request_Context"));
        assert!(!policy.is_optional_key("slots"));

        let exact = OptionalFieldPolicy {
            keyword_match: KeywordMatch::Exact,
            ..OptionalFieldPolicy::default()
        };
        assert!(exact.is_optional_key("Metadata"));
        assert!(!exact.is_optional_key("metadata_v2"));
        assert!(!OptionalFieldPolicy::none().is_optional_key("metadata"));
    }

    #[test]
    fn test_target_resolution() {
        let mut targets = TargetResolution::default();
        assert_eq!(targets.expected_target_id("A-4", "B").as_deref(), Some("B-4"));
        assert_eq!(targets.expected_target_id("TestA-1", "TestC").as_deref(), Some("TestC-1"));
        assert_eq!(targets.expected_target_id("plain", "B"), None);

        targets
            .overrides
            .entry("A-4".to_string())
            .or_default()
            .insert("B".to_string(), "B-9".to_string());
        assert_eq!(targets.expected_target_id("A-4", "B").as_deref(), Some("B-9"));
        assert_eq!(targets.expected_target_id("A-4", "C").as_deref(), Some("C-4"));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("engine.json");
        std::fs::write(&file, r#"{"rendering": {"preserve_scalar_types": true}}"#).unwrap();
        let config = EngineConfig::from_path(&file).unwrap();
        assert!(config.rendering.preserve_scalar_types);

        let missing = EngineConfig::from_path(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(Error::Configuration { .. })));
    }
}
