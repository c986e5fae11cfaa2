use crate::state::StepResult;
use crate::template::render;
use crate::value::{lookup_path, value_to_text};

/// Turns a step result into a one-line, tool-specific description.
///
/// Formatters are presentational only; returning `None` falls back to the
/// generic `<family>.<tool>` label.
pub trait StepFormatter: Send + Sync {
    fn describe(&self, result: &StepResult) -> Option<String>;
}

/// Formatter driven by a sentence with `{param}` placeholders, rendered
/// against the step input; `{output.field}` reads from the tool result.
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    template: String,
}

impl TemplateFormatter {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl StepFormatter for TemplateFormatter {
    fn describe(&self, result: &StepResult) -> Option<String> {
        let (rendered, missing) = render(&self.template, |key, path| {
            if key == "output" {
                let output = result.output.as_ref()?;
                return lookup_path(output, path).map(value_to_text);
            }
            let value = result.input.get(key)?;
            if path.is_empty() {
                Some(value_to_text(value))
            } else {
                lookup_path(value, path).map(value_to_text)
            }
        });
        missing.is_empty().then_some(rendered)
    }
}

/// Formatter backed by a closure.
pub struct FnFormatter<F> {
    func: F,
}

impl<F> FnFormatter<F>
where
    F: Fn(&StepResult) -> Option<String> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> StepFormatter for FnFormatter<F>
where
    F: Fn(&StepResult) -> Option<String> + Send + Sync,
{
    fn describe(&self, result: &StepResult) -> Option<String> {
        (self.func)(result)
    }
}
