//! Message template validation

use netdesk_core::{Error, Result, types::MessageTemplate};
use regex::Regex;
use serde::Deserialize;
use std::{collections::BTreeSet, sync::LazyLock};

static PLACEHOLDER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}"));

/// Template form values
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TemplateInput {
    /// Template group
    #[serde(default)]
    pub category: String,
    /// Key within the group
    #[serde(default)]
    pub key: String,
    /// Body with `{{variable}}` placeholders
    #[serde(default)]
    pub content: String,
    /// Declared variables
    #[serde(default)]
    pub variables: Vec<String>,
    /// Operator-facing description
    #[serde(default)]
    pub description: Option<String>,
}

impl From<&MessageTemplate> for TemplateInput {
    fn from(template: &MessageTemplate) -> Self {
        Self {
            category: template.category.clone(),
            key: template.key.clone(),
            content: template.content.clone(),
            variables: template.variables.clone(),
            description: template.description.clone(),
        }
    }
}

/// Names of every `{{variable}}` in `content`, sorted and deduplicated
///
/// # Errors
///
/// Only fails if the placeholder pattern cannot be compiled.
pub fn referenced_variables(content: &str) -> Result<BTreeSet<String>> {
    let pattern = PLACEHOLDER
        .as_ref()
        .map_err(|e| Error::Other(format!("Invalid placeholder pattern: {e}")))?;
    Ok(pattern
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Validate the template form and build the template to save
///
/// # Errors
///
/// Returns [`Error::Validation`] for a missing required field and
/// [`Error::UndefinedTemplateVariables`] listing every referenced variable
/// that is not declared.
pub fn validate_template_form(input: &TemplateInput) -> Result<MessageTemplate> {
    for (field, value) in [
        ("category", &input.category),
        ("key", &input.key),
        ("content", &input.content),
    ] {
        if value.trim().is_empty() {
            return Err(Error::validation(field, "This field is required"));
        }
    }

    let declared: BTreeSet<&str> = input
        .variables
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    let undefined: Vec<String> = referenced_variables(&input.content)?
        .into_iter()
        .filter(|name| !declared.contains(name.as_str()))
        .collect();
    if !undefined.is_empty() {
        return Err(Error::UndefinedTemplateVariables {
            variables: undefined,
        });
    }

    Ok(MessageTemplate {
        category: input.category.trim().to_string(),
        key: input.key.trim().to_string(),
        content: input.content.clone(),
        variables: declared.into_iter().map(ToString::to_string).collect(),
        description: input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(ToString::to_string),
    })
}
