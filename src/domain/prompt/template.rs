//! Prompt template parsing and rendering
//!
//! Supports variable syntax: `${var:variable-name:default-value}`
//! - `${var:name}` - Required variable, error if not provided
//! - `${var:name:default}` - Optional variable with default value
//!
//! Names are letters, digits and hyphens. Rendering is a single pass, so a
//! substituted value that itself looks like a variable is left untouched.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

/// Regex to match variable patterns: ${var:name} or ${var:name:default}
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{var:([a-zA-Z0-9][-a-zA-Z0-9]*)(?::([^}]*))?\}")
        .expect("variable pattern is a valid regex")
});

/// Any `${var:...}` opener, used to find malformed placeholders
static PLACEHOLDER_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{var:([^}:]*)").expect("placeholder pattern is a valid regex")
});

/// Template processing errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Missing required variable: {name}")]
    MissingVariable { name: String },

    #[error("Invalid variable name: {name}")]
    InvalidVariableName { name: String },
}

/// A parsed variable from a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptVariable {
    pub name: String,
    pub default: Option<String>,
}

impl PromptVariable {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    content: String,
    variables: Vec<PromptVariable>,
}

impl PromptTemplate {
    /// Parse a template string and extract variables
    pub fn parse(content: impl Into<String>) -> Result<Self, TemplateError> {
        let content = content.into();

        for cap in PLACEHOLDER_OPENER.captures_iter(&content) {
            let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let valid = name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric())
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(TemplateError::InvalidVariableName {
                    name: name.to_string(),
                });
            }
        }

        let mut seen = HashSet::new();
        let variables = VARIABLE_PATTERN
            .captures_iter(&content)
            .filter_map(|cap| {
                let name = cap.get(1)?.as_str().to_string();
                if !seen.insert(name.clone()) {
                    return None;
                }
                Some(PromptVariable {
                    name,
                    default: cap.get(2).map(|m| m.as_str().to_string()),
                })
            })
            .collect();

        Ok(Self { content, variables })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn variables(&self) -> &[PromptVariable] {
        &self.variables
    }

    /// Render the template with provided values, falling back to defaults
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .variables
            .iter()
            .find(|v| v.is_required() && !values.contains_key(&v.name))
        {
            return Err(TemplateError::MissingVariable {
                name: missing.name.clone(),
            });
        }

        let rendered = VARIABLE_PATTERN.replace_all(&self.content, |cap: &Captures<'_>| {
            let name = &cap[1];
            values
                .get(name)
                .map(String::as_str)
                .or_else(|| cap.get(2).map(|m| m.as_str()))
                .unwrap_or_default()
                .to_string()
        });

        Ok(rendered.into_owned())
    }
}

/// Convenience function to render a template string directly
pub fn render_template(
    template: &str,
    values: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    PromptTemplate::parse(template)?.render(values)
}
