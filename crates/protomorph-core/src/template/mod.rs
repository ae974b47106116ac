//! Templates and their load-time analysis
//!
//! A [`Template`] is an example tree of one protocol family. Its variable
//! table and dynamic array markers are derived once, when the template is
//! loaded, and never change afterwards.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

pub mod markers;
pub mod variables;

pub use variables::{map_variables, LeafPattern, VariableInfo, VariableTable};

use crate::error::{Error, Result};
use crate::matching::ValidationIssue;
use crate::path::{Path, PathSegment};
use crate::types::Bindings;
use serde_json::Value;

/// An analyzed template tree: the whole template or a dynamic array item
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFragment {
    pub tree: Value,
    pub variables: VariableTable,
    pub array_markers: Vec<ArrayMarker>,
}

impl TemplateFragment {
    pub fn analyze(tree: Value) -> Self {
        let variables = map_variables(&tree);
        let array_markers = markers::find_markers(&tree);
        Self {
            tree,
            variables,
            array_markers,
        }
    }

    /// Variable-table warnings of this fragment and every item template
    /// below it, located by their path in the whole tree
    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.validate_within(&Path::root())
    }

    fn validate_within(&self, base: &Path) -> Vec<ValidationIssue> {
        let mut issues = self.variables.validate_within(base);
        for marker in &self.array_markers {
            let items = marker.field_path.prepend(base).append(PathSegment::ArrayWildcard);
            issues.extend(marker.item.validate_within(&items));
        }
        issues
    }

    /// Marker declared at `path` within this fragment
    pub fn marker_at(&self, path: &Path) -> Option<&ArrayMarker> {
        self.array_markers.iter().find(|marker| &marker.field_path == path)
    }

    /// Bindings for this scope plus `name_i` bindings for every element of
    /// each dynamic array found in `data`
    pub fn extract(&self, data: &Value) -> Bindings {
        let mut bindings = self.variables.extract_values(data);
        for marker in &self.array_markers {
            let Some(Value::Array(elements)) = marker.field_path.lookup(data) else {
                log::debug!("No sequence at '{}' for dynamic array", marker.field_path);
                continue;
            };
            for (i, element) in elements.iter().enumerate() {
                for (name, value) in marker.item.extract(element) {
                    bindings.insert(format!("{}_{}", name, i), value);
                }
            }
        }
        bindings
    }
}

/// A dynamic array declared in a template
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayMarker {
    /// Where the sequence lives, relative to the enclosing scope
    pub field_path: Path,
    pub item: TemplateFragment,
}

/// A loaded template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    id: String,
    family: String,
    body: TemplateFragment,
}

impl Template {
    /// Analyze `tree` as a template of `family`
    pub fn analyze(id: impl Into<String>, family: impl Into<String>, tree: Value) -> Result<Self> {
        let id = id.into();
        let family = family.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidTemplate {
                id,
                message: "template id must not be empty".to_string(),
            });
        }
        if family.trim().is_empty() {
            return Err(Error::InvalidTemplate {
                id,
                message: "template family must not be empty".to_string(),
            });
        }
        if !tree.is_object() {
            return Err(Error::InvalidTemplate {
                id,
                message: format!("template root must be a map, found {}", crate::path::kind_of(&tree)),
            });
        }

        let body = TemplateFragment::analyze(tree);
        log::debug!(
            "Analyzed template '{}' ({}): {} variables, {} dynamic arrays",
            id,
            family,
            body.variables.len(),
            body.array_markers.len()
        );
        Ok(Self { id, family, body })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn tree(&self) -> &Value {
        &self.body.tree
    }

    pub fn variables(&self) -> &VariableTable {
        &self.body.variables
    }

    pub fn array_markers(&self) -> &[ArrayMarker] {
        &self.body.array_markers
    }

    pub fn body(&self) -> &TemplateFragment {
        &self.body
    }

    /// Extract the bindings `data` provides for this template
    pub fn extract(&self, data: &Value) -> Bindings {
        self.body.extract(data)
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.body.validate()
    }
}
