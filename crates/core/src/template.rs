//! `{placeholder}` templates used by the catalog.
//!
//! Event ids, grouping metadata (collapse / thread / platform group ids) and
//! deep links are all rendered from templates such as
//! `"goal:{fixture_id}:{minute}"`. Placeholder names are lowercase
//! identifiers; rendering fails if the event does not supply one of them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::types::EventParams;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"));

static PLACEHOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("name pattern is valid"));

/// A parsed, validated template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    source: String,
    placeholders: Vec<String>,
}

impl Template {
    /// Parse and validate a template string.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut placeholders = Vec::new();
        for caps in PLACEHOLDER.captures_iter(source) {
            let name = &caps[1];
            if !PLACEHOLDER_NAME.is_match(name) {
                return Err(TemplateError::InvalidPlaceholder {
                    template: source.to_string(),
                    name: name.to_string(),
                });
            }
            if !placeholders.iter().any(|p| p == name) {
                placeholders.push(name.to_string());
            }
        }

        let stripped = PLACEHOLDER.replace_all(source, "");
        if stripped.contains('{') || stripped.contains('}') {
            return Err(TemplateError::Unbalanced {
                template: source.to_string(),
            });
        }

        Ok(Self {
            source: source.to_string(),
            placeholders,
        })
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The literal text before the first placeholder.
    pub fn literal_prefix(&self) -> &str {
        match self.source.find('{') {
            Some(idx) => &self.source[..idx],
            None => &self.source,
        }
    }

    /// Substitute every placeholder with the matching event parameter.
    ///
    /// The output is a pure function of the template and `params`, which is
    /// what makes rendered event ids usable as dedup keys.
    pub fn render(&self, params: &EventParams) -> Result<String, TemplateError> {
        if let Some(missing) = self.placeholders.iter().find(|p| !params.contains_key(*p)) {
            return Err(TemplateError::MissingParameter(missing.clone()));
        }

        let rendered = PLACEHOLDER.replace_all(&self.source, |caps: &regex::Captures<'_>| {
            params.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
