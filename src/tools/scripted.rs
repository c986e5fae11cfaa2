//! Canned tool handlers loaded from a JSON description.
//!
//! Used by the CLI to dry-run plans without live integrations, and by tests
//! to script failures. The file maps tool names to their behavior:
//!
//! ```json
//! {
//!   "lookup_customer": { "family": "crm", "response": {"email": "a@b.com"} },
//!   "send_fax": { "family": "fax", "error": "rate limit", "failTimes": 1,
//!                 "response": {"status": "queued"},
//!                 "describe": "Faxed {to}" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{TemplateFormatter, ToolHandler, ToolRegistryBuilder};
use crate::error::ToolError;
use crate::plan::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedErrorKind {
    Retryable,
    NonRetryable,
    /// Leave classification to the retry policy's message patterns.
    Unclassified,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedToolSpec {
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ScriptedErrorKind>,
    #[serde(default)]
    pub delay_ms: u64,
    /// Fail this many calls before answering with `response`. Without it an
    /// `error` fails every call.
    #[serde(default)]
    pub fail_times: Option<u32>,
    #[serde(default)]
    pub describe: Option<String>,
}

fn default_family() -> String {
    "scripted".to_string()
}

pub struct ScriptedTool {
    spec: ScriptedToolSpec,
    calls: AtomicU32,
}

impl ScriptedTool {
    pub fn new(spec: ScriptedToolSpec) -> Self {
        Self {
            spec,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn error(&self, message: &str) -> ToolError {
        match self.spec.error_kind.unwrap_or(ScriptedErrorKind::Unclassified) {
            ScriptedErrorKind::Retryable => ToolError::retryable(message),
            ScriptedErrorKind::NonRetryable => ToolError::non_retryable(message),
            ScriptedErrorKind::Unclassified => ToolError::failed(message),
        }
    }
}

#[async_trait]
impl ToolHandler for ScriptedTool {
    async fn call(&self, _params: Params) -> Result<Value, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.spec.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.spec.delay_ms)).await;
        }
        if let Some(message) = &self.spec.error {
            let failing = self.spec.fail_times.is_none_or(|times| call <= times);
            if failing {
                return Err(self.error(message));
            }
        }
        Ok(self.spec.response.clone())
    }
}

/// Reads a tool script file and registers each entry on `builder`.
pub fn load_tool_script(path: &Path, builder: ToolRegistryBuilder) -> Result<ToolRegistryBuilder> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tool script {}", path.display()))?;
    let specs: BTreeMap<String, ScriptedToolSpec> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tool script {}", path.display()))?;

    let builder = specs.into_iter().fold(builder, |builder, (name, spec)| {
        let family = spec.family.clone();
        match spec.describe.clone() {
            Some(template) => builder.register_with_formatter(
                family,
                name,
                ScriptedTool::new(spec),
                TemplateFormatter::new(template),
            ),
            None => builder.register(family, name, ScriptedTool::new(spec)),
        }
    });
    Ok(builder)
}
