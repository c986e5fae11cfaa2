use serde_json::Value;

use crate::error::ValidationError;

/// Planner output before validation: step entries are kept as loose JSON so
/// malformed ones can be dropped individually instead of failing the plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPlan {
    pub steps: Vec<Value>,
    pub summary: Option<String>,
}

impl RawPlan {
    /// Accepts either `{"steps": [...], "summary": "..."}` or a bare step array.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Array(steps) => Ok(Self {
                steps,
                summary: None,
            }),
            Value::Object(mut map) => {
                let steps = match map.remove("steps") {
                    Some(Value::Array(steps)) => steps,
                    Some(other) => {
                        return Err(ValidationError::Malformed(format!(
                            "'steps' must be an array, found {}",
                            json_kind(&other)
                        )));
                    }
                    None => Vec::new(),
                };
                let summary = map
                    .remove("summary")
                    .and_then(|summary| summary.as_str().map(str::to_string))
                    .filter(|summary| !summary.trim().is_empty());
                Ok(Self { steps, summary })
            }
            other => Err(ValidationError::Malformed(format!(
                "expected an object or array, found {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Parses planner text into a raw plan, tolerating surrounding chatter.
pub fn parse_plan_text(input: &str) -> Result<RawPlan, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPlan);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return RawPlan::from_value(value);
    }

    let fragment = extract_json_object(trimmed).ok_or_else(|| {
        ValidationError::Malformed("planner output did not contain a JSON object".to_string())
    })?;
    let value: Value = serde_json::from_str(&fragment)
        .map_err(|err| ValidationError::Malformed(err.to_string()))?;
    RawPlan::from_value(value)
}

/// Strips `<think>` blocks and returns the first balanced `{...}` object.
pub fn extract_json_object(input: &str) -> Option<String> {
    let mut cleaned = input.to_string();

    while let Some(think_start) = cleaned.find("<think>") {
        if let Some(think_end_pos) = cleaned[think_start..].find("</think>") {
            let absolute_end = think_start + think_end_pos + "</think>".len();
            cleaned.replace_range(think_start..absolute_end, "");
        } else {
            cleaned.replace_range(think_start.., "");
            break;
        }
    }

    let trimmed = cleaned.trim();
    let start = trimmed.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;
    for (idx, ch) in trimmed[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    end = Some(start + idx);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = end?;
    Some(trimmed[start..=end].to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
