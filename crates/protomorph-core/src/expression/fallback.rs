//! Permissive expression extraction
//!
//! Used when the strict grammar rejects a block body. Only the leading name,
//! filter names, and a quoted `default` argument are recovered; anything
//! else in the body is ignored.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::{Expression, Filter, ParseTier};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn call_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(\$?[\p{L}_][\p{L}\p{N}_]*)\s*\(\s*\)\s*$").ok())
        .as_ref()
}

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(\$?[\p{L}_][\p{L}\p{N}_.]*)").ok())
        .as_ref()
}

fn default_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"^default\s*\(?\s*['"]([^'"]*)['"]"#).ok())
        .as_ref()
}

/// Extract an expression from a body the strict grammar rejected
pub fn fallback_regex_parse(body: &str, mapping_delimiter: bool, source: &str) -> Option<Expression> {
    if let Some(captures) = call_pattern().and_then(|pattern| pattern.captures(body)) {
        let (kind, name) = Expression::classify(&captures[1], mapping_delimiter, true);
        return Some(Expression {
            kind,
            name,
            attributes: Vec::new(),
            filters: Vec::new(),
            default: None,
            call: true,
            tier: ParseTier::Fallback,
            source: source.to_string(),
        });
    }

    let captures = name_pattern()?.captures(body)?;
    let mut parts = captures[1].split('.').filter(|part| !part.is_empty());
    let raw_name = parts.next()?;
    let attributes = parts.map(str::to_string).collect();

    let mut filters = Vec::new();
    if let Some((_, chain)) = body.split_once('|') {
        for piece in chain.split('|') {
            let piece = piece.trim();
            let filter_name: String = piece
                .chars()
                .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
                .collect();
            if filter_name.is_empty() {
                continue;
            }
            let args = default_pattern()
                .and_then(|pattern| pattern.captures(piece))
                .map(|default| vec![Value::String(default[1].to_string())])
                .unwrap_or_default();
            filters.push(Filter::with_args(filter_name, args));
        }
    }

    let (kind, name) = Expression::classify(raw_name, mapping_delimiter, false);
    let (filters, default) = Expression::lift_default(filters);
    Some(Expression {
        kind,
        name,
        attributes,
        filters,
        default,
        call: false,
        tier: ParseTier::Fallback,
        source: source.to_string(),
    })
}
