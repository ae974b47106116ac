//! Template registry
//!
//! Templates are analyzed once when loaded and handed out as immutable
//! `Arc<Template>` snapshots. Reloading an id swaps in a new snapshot;
//! conversions already holding the old one are unaffected.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::{Arc, PoisonError, RwLock};

/// A template as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDocument {
    pub id: String,
    pub family: String,
    pub template: Value,
}

#[derive(Debug, Default)]
struct Entries {
    templates: HashMap<String, Arc<Template>>,
    /// Ids in first-registration order
    order: Vec<String>,
}

/// Thread-safe store of loaded templates
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    entries: RwLock<Entries>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze and store a template, replacing any template with the same id
    pub fn load(&self, id: impl Into<String>, family: impl Into<String>, tree: Value) -> Result<Arc<Template>> {
        let template = Arc::new(Template::analyze(id, family, tree)?);
        let id = template.id().to_string();
        for issue in template.validate() {
            log::warn!("Template '{}': {}", id, issue);
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.templates.insert(id.clone(), Arc::clone(&template)).is_some() {
            log::debug!("Replaced template '{}'", id);
        } else {
            log::debug!("Loaded template '{}' ({})", id, template.family());
            entries.order.push(id);
        }
        Ok(template)
    }

    /// Load every template of a JSON file holding one document or a list
    pub fn load_from_path(&self, path: impl AsRef<FsPath>) -> Result<Vec<Arc<Template>>> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| Error::Io {
            message: format!("failed to read {}", path.display()),
            source: err,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|err| Error::Json {
            message: format!("failed to parse {}", path.display()),
            source: err,
        })?;
        let documents: Vec<TemplateDocument> = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            single => vec![serde_json::from_value(single)?],
        };
        documents
            .into_iter()
            .map(|document| self.load(document.id, document.family, document.template))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Template>> {
        self.read().templates.get(id).cloned()
    }

    /// Ids of a family in registration order
    pub fn list_by_family(&self, family: &str) -> Vec<String> {
        let entries = self.read();
        entries
            .order
            .iter()
            .filter(|id| entries.templates.get(*id).is_some_and(|t| t.family() == family))
            .cloned()
            .collect()
    }

    /// Templates of a family in registration order
    pub fn templates_in_family(&self, family: &str) -> Vec<Arc<Template>> {
        let entries = self.read();
        entries
            .order
            .iter()
            .filter_map(|id| entries.templates.get(id))
            .filter(|template| template.family() == family)
            .cloned()
            .collect()
    }

    /// Families in order of first appearance
    pub fn list_families(&self) -> Vec<String> {
        let entries = self.read();
        let mut families: Vec<String> = Vec::new();
        for template in entries.order.iter().filter_map(|id| entries.templates.get(id)) {
            if !families.iter().any(|family| family == template.family()) {
                families.push(template.family().to_string());
            }
        }
        families
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Template>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.templates.remove(id)?;
        entries.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.read().templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().templates.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}
