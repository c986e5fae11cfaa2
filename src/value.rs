//! Helpers for reading tool results as text.

use serde_json::Value;

/// Keys probed, in order, when extracting the canonical response text of a result.
const RESPONSE_KEYS: &[&str] = &["response", "text", "message", "content", "result", "output"];

/// Renders a JSON value as plain text. Strings are emitted without quotes.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Extracts the human-facing text of a tool result.
pub fn response_text(value: &Value) -> String {
    if let Value::Object(map) = value {
        for key in RESPONSE_KEYS {
            if let Some(Value::String(text)) = map.get(*key) {
                return text.clone();
            }
        }
    }
    value_to_text(value)
}

/// Walks a dotted path (`a.b.0.c`) into a JSON value.
pub fn lookup_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => {
            let trimmed = text.trim();
            !(trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("false")
                || trimmed == "0"
                || trimmed.eq_ignore_ascii_case("no"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn response_text_prefers_response_field() {
        let value = json!({"response": "hello", "count": 3});
        assert_eq!(response_text(&value), "hello");
    }

    #[test]
    fn response_text_falls_back_to_json() {
        let value = json!({"count": 3});
        assert_eq!(response_text(&value), r#"{"count":3}"#);
        assert_eq!(response_text(&json!("plain")), "plain");
    }

    #[test]
    fn lookup_path_walks_objects_and_arrays() {
        let value = json!({"customer": {"emails": ["a@b.com", "c@d.com"]}});
        let found = lookup_path(&value, &["customer", "emails", "1"]);
        assert_eq!(found, Some(&json!("c@d.com")));
        assert!(lookup_path(&value, &["customer", "phone"]).is_none());
    }

    #[test]
    fn truthiness_rules() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!(2)));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([])));
    }
}
