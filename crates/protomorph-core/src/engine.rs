//! Conversion engine
//!
//! [`ConversionEngine::convert`] runs the whole pipeline for one input:
//!
//! 1. rank the source family's templates against the input
//! 2. extract bindings with the best candidate
//! 3. pair it with a target template of the target family
//! 4. render the target with a fresh conversion context
//!
//! Matching and pairing failures fail the conversion; rendering problems are
//! absorbed and reported through `debug_info`.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::matching::{CandidateScorer, MatchCandidate, MatchReport, MatchResult};
use crate::registry::TemplateRegistry;
use crate::remap::{FieldRemapper, Processor, ProcessorTable};
use crate::render::context::generate_conversion_id;
use crate::render::{ConversionContext, FunctionRegistry, Renderer, SpecialFunction};
use crate::types::{ConversionError, ConversionMetadata, ConversionResult, DebugEvent};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Matches inputs against a template registry and renders target templates
#[derive(Debug)]
pub struct ConversionEngine {
    registry: Arc<TemplateRegistry>,
    config: EngineConfig,
    scorer: CandidateScorer,
    renderer: Renderer,
}

/// Builder for [`ConversionEngine`]
pub struct ConversionEngineBuilder {
    registry: Option<Arc<TemplateRegistry>>,
    config: EngineConfig,
    functions: FunctionRegistry,
    processors: ProcessorTable,
}

impl Default for ConversionEngineBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            config: EngineConfig::default(),
            functions: FunctionRegistry::with_builtins(),
            processors: ProcessorTable::with_builtins(),
        }
    }
}

impl ConversionEngineBuilder {
    pub fn registry(mut self, registry: Arc<TemplateRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the function registry, builtins included
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn function(mut self, name: impl Into<String>, function: impl SpecialFunction + 'static) -> Self {
        self.functions.register(name, function);
        self
    }

    /// Replace the processor table, builtins included
    pub fn processors(mut self, processors: ProcessorTable) -> Self {
        self.processors = processors;
        self
    }

    pub fn processor(mut self, name: impl Into<String>, processor: impl Processor + 'static) -> Self {
        self.processors.register(name, processor);
        self
    }

    /// Validate the configuration and remapping rules and build the engine
    pub fn build(self) -> Result<ConversionEngine> {
        self.config.validate()?;

        let issues = self.config.remapping.validate(&self.processors);
        for issue in issues.iter().filter(|issue| !issue.is_error()) {
            log::warn!("Remapping rule: {}", issue);
        }
        if let Some(issue) = issues.iter().find(|issue| issue.is_error()) {
            return Err(Error::config(format!("invalid remapping rule: {}", issue)));
        }

        let remapper = FieldRemapper::new(self.config.remapping.clone(), self.processors);
        let renderer = Renderer::new(self.config.rendering.clone(), self.functions, remapper);
        let scorer = CandidateScorer::new(self.config.matching.clone());
        Ok(ConversionEngine {
            registry: self.registry.unwrap_or_default(),
            config: self.config,
            scorer,
            renderer,
        })
    }
}

/// Pieces of a successful conversion
struct Converted {
    matched: MatchResult,
    target_id: String,
    output: Value,
    debug_info: Vec<DebugEvent>,
}

impl ConversionEngine {
    pub fn builder() -> ConversionEngineBuilder {
        ConversionEngineBuilder::default()
    }

    /// Engine with default configuration and builtin functions and processors
    pub fn new(registry: Arc<TemplateRegistry>) -> Result<Self> {
        Self::builder().registry(registry).build()
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn scorer(&self) -> &CandidateScorer {
        &self.scorer
    }

    /// Ranked candidates of `family` for `input`, best first
    pub fn match_input(&self, family: &str, input: &Value) -> Vec<MatchCandidate> {
        self.scorer.rank(self.registry.templates_in_family(family), input)
    }

    /// Readable scoring of every `family` template against `input`
    pub fn match_report(&self, family: &str, input: &Value) -> MatchReport {
        self.scorer.match_report(self.registry.templates_in_family(family), input)
    }

    /// Convert `input` of `source_family` into `target_family`.
    ///
    /// Always returns a result; check `success`.
    pub fn convert(&self, source_family: &str, target_family: &str, input: &Value) -> ConversionResult {
        let started = Instant::now();
        let timestamp = Utc::now();
        let conversion_id = generate_conversion_id();

        let outcome = self.run(source_family, target_family, input, &conversion_id, timestamp);
        let metadata = ConversionMetadata {
            conversion_id,
            timestamp,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            strategy: self.config.matching.strategy,
        };

        match outcome {
            Ok(converted) => {
                log::info!(
                    "Converted {} -> {} via '{}' -> '{}' (score {:.3}, {} debug events)",
                    source_family,
                    target_family,
                    converted.matched.candidate.template.id(),
                    converted.target_id,
                    converted.matched.candidate.score,
                    converted.debug_info.len()
                );
                ConversionResult {
                    success: true,
                    result: Some(converted.output),
                    matched_template_id: Some(converted.matched.candidate.template.id().to_string()),
                    target_template_id: Some(converted.target_id),
                    bindings: Some(converted.matched.bindings),
                    score: Some(converted.matched.candidate.score),
                    error: None,
                    debug_info: converted.debug_info,
                    metadata,
                }
            }
            Err(err) => {
                log::warn!("Conversion {} -> {} failed: {}", source_family, target_family, err);
                ConversionResult {
                    success: false,
                    result: None,
                    matched_template_id: None,
                    target_template_id: None,
                    bindings: None,
                    score: None,
                    error: Some(ConversionError::from(&err)),
                    debug_info: Vec::new(),
                    metadata,
                }
            }
        }
    }

    fn run(
        &self,
        source_family: &str,
        target_family: &str,
        input: &Value,
        conversion_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Converted> {
        let candidates = self.registry.templates_in_family(source_family);
        let considered = candidates.len();
        let matched = self
            .scorer
            .best_match(candidates, input)
            .ok_or_else(|| Error::NoMatchingTemplate {
                family: source_family.to_string(),
                candidates: considered,
            })?;
        let source_id = matched.candidate.template.id().to_string();
        log::debug!("Matched '{}' with score {:.3}", source_id, matched.candidate.score);

        let target_id = self.resolve_target_id(&source_id, target_family)?;
        let target = self.registry.get(&target_id).ok_or_else(|| Error::NoCorrespondingTarget {
            source_id: source_id.clone(),
            target_family: target_family.to_string(),
            expected_id: target_id.clone(),
        })?;

        let context = ConversionContext::new(source_family, target_family, input.clone(), matched.bindings.clone())
            .with_template_ids(source_id, target_id.clone())
            .with_conversion_id(conversion_id)
            .with_timestamp(timestamp);
        let output = self.renderer.render(&target, &context);

        Ok(Converted {
            matched,
            target_id,
            output,
            debug_info: context.debug_events(),
        })
    }

    fn resolve_target_id(&self, source_id: &str, target_family: &str) -> Result<String> {
        let expected = self.config.targets.expected_target_id(source_id, target_family);
        let target_id = expected.ok_or_else(|| Error::NoCorrespondingTarget {
            source_id: source_id.to_string(),
            target_family: target_family.to_string(),
            expected_id: String::new(),
        })?;
        match self.registry.get(&target_id) {
            Some(target) if target.family() != target_family => Err(Error::NoCorrespondingTarget {
                source_id: source_id.to_string(),
                target_family: target_family.to_string(),
                expected_id: target_id,
            }),
            _ => Ok(target_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchStrategy;
    use crate::remap::RemapConfig;
    use crate::types::DebugEventKind;
    use serde_json::json;

    fn registry() -> Arc<TemplateRegistry> {
        let registry = TemplateRegistry::new();
        registry
            .load(
                "A-1",
                "A",
                json!({"domain": "telephone", "action": "DIAL", "slots": {"category": "{{ phone_type }}", "name": "{{ person }}"}}),
            )
            .unwrap();
        registry
            .load("A-2", "A", json!({"domain": "telephone", "action": "ANSWER"}))
            .unwrap();
        registry
            .load(
                "C-1",
                "C",
                json!({"intent": "call", "sid": "{{ __sid }}", "contact": "{{ person }}", "missing": "{{ nobody }}"}),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_convert_success() {
        let engine = ConversionEngine::new(registry()).unwrap();
        let input = json!({"domain": "telephone", "action": "DIAL", "slots": {"category": "手机", "name": "张三"}});
        let result = engine.convert("A", "C", &input);

        assert!(result.success);
        assert_eq!(result.matched_template_id.as_deref(), Some("A-1"));
        assert_eq!(result.target_template_id.as_deref(), Some("C-1"));
        assert_eq!(result.score, Some(1.0));
        let output = result.result.as_ref().unwrap();
        assert_eq!(output["sid"], json!("PHONE_TYPE_MOBILE"));
        assert_eq!(output["contact"], json!("张三"));
        assert_eq!(output["missing"], json!("[MISSING:nobody]"));
        assert!(result.is_degraded());
        assert_eq!(result.events(DebugEventKind::UnresolvedVariable).count(), 1);
        assert!(result.metadata.conversion_id.starts_with("conv_"));
    }

    #[test]
    fn test_missing_target_fails() {
        let engine = ConversionEngine::new(registry()).unwrap();
        let input = json!({"domain": "telephone", "action": "ANSWER"});
        let result = engine.convert("A", "C", &input);
        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error.kind, "NoCorrespondingTarget");
        assert!(error.message.contains("C-2"));
    }

    #[test]
    fn test_unknown_family_fails() {
        let engine = ConversionEngine::new(registry()).unwrap();
        let result = engine.convert("Z", "C", &json!({}));
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, "NoMatchingTemplate");
        assert!(result.result.is_none());
    }

    #[test]
    fn test_target_overrides() {
        let mut config = EngineConfig::default();
        config
            .targets
            .overrides
            .entry("A-2".to_string())
            .or_default()
            .insert("C".to_string(), "C-1".to_string());
        let engine = ConversionEngine::builder().registry(registry()).config(config).build().unwrap();
        let result = engine.convert("A", "C", &json!({"domain": "telephone", "action": "ANSWER"}));
        assert!(result.success);
        assert_eq!(result.target_template_id.as_deref(), Some("C-1"));
    }

    #[test]
    fn test_match_input_ranks() {
        let mut config = EngineConfig::default();
        config.matching.strategy = MatchStrategy::Strict;
        let engine = ConversionEngine::builder().registry(registry()).config(config).build().unwrap();
        let ranked = engine.match_input("A", &json!({"domain": "telephone", "action": "ANSWER"}));
        let ids: Vec<_> = ranked.iter().map(|c| c.template.id()).collect();
        assert_eq!(ids, vec!["A-2"]);
    }

    #[test]
    fn test_builder_rejects_bad_rules() {
        let mut config = EngineConfig::default();
        config.remapping = RemapConfig::intersection_routes();
        assert!(ConversionEngine::builder().config(config.clone()).build().is_ok());
        assert!(ConversionEngine::builder()
            .config(config)
            .processors(ProcessorTable::new())
            .build()
            .is_err());
    }

    #[test]
    fn test_custom_function() {
        let engine = ConversionEngine::builder()
            .registry(registry())
            .function("func_sid", |_: &ConversionContext| "CUSTOM".to_string())
            .build()
            .unwrap();
        let input = json!({"domain": "telephone", "action": "DIAL", "slots": {"category": "座机", "name": "李四"}});
        let result = engine.convert("A", "C", &input);
        assert_eq!(result.result.unwrap()["sid"], json!("CUSTOM"));
    }
}
