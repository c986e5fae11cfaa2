use std::collections::HashMap;

use serde_json::{Value, json};

use crate::value::{lookup_path, response_text, value_to_text};

use super::{TemplateSource, has_placeholders, render, resolve_params};

#[derive(Default)]
struct Outputs {
    results: HashMap<String, Value>,
}

impl Outputs {
    fn with(mut self, key: &str, value: Value) -> Self {
        self.results.insert(key.to_string(), value);
        self
    }
}

impl TemplateSource for Outputs {
    fn output(&self, key: &str) -> Option<String> {
        self.results.get(key).map(response_text)
    }

    fn field(&self, key: &str, path: &[&str]) -> Option<String> {
        self.results
            .get(key)
            .and_then(|value| lookup_path(value, path))
            .map(value_to_text)
    }
}

fn params(value: Value) -> crate::plan::Params {
    value.as_object().cloned().unwrap()
}

#[test]
fn resolves_key_and_field_references() {
    let source = Outputs::default().with("k", json!({"response": "hello", "count": 3}));
    let resolution = resolve_params(
        &params(json!({"greeting": "{k}", "total": "{k.count} items"})),
        &source,
    );
    assert_eq!(resolution.params["greeting"], json!("hello"));
    assert_eq!(resolution.params["total"], json!("3 items"));
    assert!(resolution.unresolved.is_empty());
}

#[test]
fn nested_paths_walk_structured_results() {
    let source = Outputs::default().with("c", json!({"customer": {"email": "a@b.com"}}));
    let resolution = resolve_params(&params(json!({"to": "{c.customer.email}"})), &source);
    assert_eq!(resolution.params["to"], json!("a@b.com"));
}

#[test]
fn unresolved_references_expand_to_empty() {
    let source = Outputs::default();
    let resolution = resolve_params(&params(json!({"to": "Dear {c.name},"})), &source);
    assert_eq!(resolution.params["to"], json!("Dear ,"));
    assert_eq!(resolution.unresolved, vec!["{c.name}".to_string()]);
}

#[test]
fn numeric_step_ids_are_valid_keys() {
    let source = Outputs::default().with("1", json!({"email": "a@b.com"}));
    let resolution = resolve_params(
        &params(json!({"to": "{1.email}", "cc": "{2.email}"})),
        &source,
    );
    assert_eq!(resolution.params["to"], json!("a@b.com"));
    assert_eq!(resolution.params["cc"], json!(""));
    assert_eq!(resolution.unresolved, vec!["{2.email}".to_string()]);
}

#[test]
fn non_string_values_pass_through() {
    let source = Outputs::default().with("k", json!("hello"));
    let input = params(json!({
        "count": 3,
        "flags": ["{k}"],
        "nested": {"inner": "{k}"},
        "enabled": true
    }));
    let resolution = resolve_params(&input, &source);
    assert_eq!(resolution.params, input);
}

#[test]
fn resolving_substituted_params_is_a_no_op() {
    let source = Outputs::default().with("k", json!({"response": "hello", "count": 3}));
    let first = resolve_params(&params(json!({"a": "{k}", "b": "{k.count}", "c": 7})), &source);
    let second = resolve_params(&first.params, &source);
    assert_eq!(first.params, second.params);
    assert!(second.unresolved.is_empty());
}

#[test]
fn text_that_is_not_a_placeholder_is_preserved() {
    let (rendered, missing) = render("json: {\"a\": 1} and { spaced }", |_, _| None);
    assert_eq!(rendered, "json: {\"a\": 1} and { spaced }");
    assert!(missing.is_empty());
    assert!(!has_placeholders("{ spaced }"));
    assert!(has_placeholders("{order.id}"));
}
