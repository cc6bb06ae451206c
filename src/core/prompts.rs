//! Prompt templates: the text placed ahead of the document when asking for a continuation.
//!
//! Templates live in [`Settings::prompts`]; this module provides the operations the CLI and the
//! session coordinator need on top of that list.

use chrono::Utc;
use thiserror::Error;

use crate::core::config::{ModelFilter, PromptTemplate, Settings};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("No prompt template with id '{0}'")]
    NotFound(String),
    #[error("Prompt template name must not be empty")]
    EmptyName,
}

/// Partial update for [`Settings::update_template`]; `None` keeps the current value.
#[derive(Debug, Default, Clone)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub body: Option<String>,
    pub applies_to: Option<ModelFilter>,
    pub description: Option<String>,
}

const DEFAULT_TEMPLATES: &[(&str, &str, &str)] = &[
    (
        "Continue Writing",
        "Please continue the following text in a natural and engaging way:",
        "General purpose continuation prompt",
    ),
    (
        "Creative Story",
        "Continue this creative story with vivid descriptions and compelling narrative:",
        "For creative fiction writing",
    ),
    (
        "Technical Documentation",
        "Continue this technical documentation with clarity and precision:",
        "For technical writing and documentation",
    ),
    (
        "Formal Writing",
        "Continue this text in a formal, professional tone:",
        "For business and academic writing",
    ),
];

fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "template".to_string()
    } else {
        trimmed.to_string()
    }
}

impl Settings {
    pub fn create_template(
        &mut self,
        name: &str,
        body: &str,
        applies_to: ModelFilter,
        description: &str,
    ) -> Result<PromptTemplate, PromptError> {
        if name.trim().is_empty() {
            return Err(PromptError::EmptyName);
        }

        let template = PromptTemplate {
            id: self.unused_template_id(name),
            name: name.trim().to_string(),
            body: body.to_string(),
            applies_to,
            description: description.to_string(),
        };
        self.prompts.templates.push(template.clone());
        Ok(template)
    }

    fn unused_template_id(&self, name: &str) -> String {
        let base = format!("{}-{}", slugify(name), Utc::now().timestamp_millis());
        let mut candidate = base.clone();
        let mut counter = 2;
        while self.template(&candidate).is_some() {
            candidate = format!("{base}-{counter}");
            counter += 1;
        }
        candidate
    }

    pub fn template(&self, id: &str) -> Option<&PromptTemplate> {
        self.prompts.templates.iter().find(|t| t.id == id)
    }

    pub fn templates_for_model(&self, model: &str) -> Vec<&PromptTemplate> {
        self.prompts
            .templates
            .iter()
            .filter(|t| t.applies_to.matches(model))
            .collect()
    }

    pub fn update_template(&mut self, id: &str, update: TemplateUpdate) -> Result<(), PromptError> {
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(PromptError::EmptyName);
        }
        let template = self
            .prompts
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))?;

        if let Some(name) = update.name {
            template.name = name.trim().to_string();
        }
        if let Some(body) = update.body {
            template.body = body;
        }
        if let Some(applies_to) = update.applies_to {
            template.applies_to = applies_to;
        }
        if let Some(description) = update.description {
            template.description = description;
        }
        Ok(())
    }

    /// Remove a template, clearing the selection if it pointed at it.
    pub fn remove_template(&mut self, id: &str) -> Result<PromptTemplate, PromptError> {
        let index = self
            .prompts
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))?;
        if self.prompts.selected_template_id.as_deref() == Some(id) {
            self.prompts.selected_template_id = None;
        }
        Ok(self.prompts.templates.remove(index))
    }

    pub fn selected_template(&self) -> Option<&PromptTemplate> {
        self.prompts
            .selected_template_id
            .as_deref()
            .and_then(|id| self.template(id))
    }

    /// Select a template by id, or clear the selection with `None`.
    pub fn select_template(&mut self, id: Option<&str>) -> Result<(), PromptError> {
        if let Some(id) = id {
            if self.template(id).is_none() {
                return Err(PromptError::NotFound(id.to_string()));
            }
        }
        self.prompts.selected_template_id = id.map(str::to_string);
        Ok(())
    }

    /// Seed the built-in templates when the list is empty. Returns how many were added.
    pub fn ensure_default_templates(&mut self) -> usize {
        if !self.prompts.templates.is_empty() {
            return 0;
        }
        for (name, body, description) in DEFAULT_TEMPLATES {
            // Names are non-empty constants.
            let _ = self.create_template(name, body, ModelFilter::All, description);
        }
        self.prompts.templates.len()
    }
}

/// Find `id` among `templates`, but only if it may be used with `model`.
pub fn applicable_template<'a>(
    templates: &'a [PromptTemplate],
    id: &str,
    model: &str,
) -> Option<&'a PromptTemplate> {
    templates
        .iter()
        .find(|t| t.id == id)
        .filter(|t| t.applies_to.matches(model))
}
