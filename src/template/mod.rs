//! `{key}` / `{key.field}` placeholder substitution over step parameters.
//!
//! Only top-level string parameters are rewritten; other values pass through
//! untouched. Unresolved placeholders expand to an empty string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::warn;

use crate::plan::Params;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z0-9_][A-Za-z0-9_\-]*)((?:\.[A-Za-z0-9_\-]+)*)\}")
        .expect("placeholder pattern is valid")
});

/// Source of values for placeholder expansion.
pub trait TemplateSource {
    /// Formatted output registered under `key`.
    fn output(&self, key: &str) -> Option<String>;

    /// A field of the structured result behind `key`.
    fn field(&self, key: &str, path: &[&str]) -> Option<String>;
}

/// Parameters after substitution, with the placeholders that could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub params: Params,
    pub unresolved: Vec<String>,
}

pub fn resolve_params<S>(params: &Params, source: &S) -> Resolution
where
    S: TemplateSource + ?Sized,
{
    let mut unresolved = Vec::new();
    let params = params
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => {
                    let (rendered, missing) = render(text, |key, path| {
                        if path.is_empty() {
                            source.output(key)
                        } else {
                            source.field(key, path)
                        }
                    });
                    for placeholder in &missing {
                        warn!(param = %name, placeholder = %placeholder, "unresolved template reference");
                    }
                    unresolved.extend(missing);
                    Value::String(rendered)
                }
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect();

    Resolution { params, unresolved }
}

/// Expands every placeholder in `input` using `lookup(key, path)`.
/// Returns the rendered text and the placeholders `lookup` could not answer.
pub fn render<F>(input: &str, mut lookup: F) -> (String, Vec<String>)
where
    F: FnMut(&str, &[&str]) -> Option<String>,
{
    let mut unresolved = Vec::new();
    let rendered = PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| {
        let key = &caps[1];
        let path: Vec<&str> = caps
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('.')
            .filter(|segment| !segment.is_empty())
            .collect();
        lookup(key, &path).unwrap_or_else(|| {
            unresolved.push(caps[0].to_string());
            String::new()
        })
    });
    (rendered.into_owned(), unresolved)
}

/// Whether `input` still carries anything that looks like a placeholder.
pub fn has_placeholders(input: &str) -> bool {
    PLACEHOLDER.is_match(input)
}

#[cfg(test)]
mod tests;
