use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{StepFormatter, ToolHandler, ToolInvoker};
use crate::error::ToolError;
use crate::plan::Params;
use crate::state::StepResult;

struct ToolEntry {
    family: String,
    handler: Arc<dyn ToolHandler>,
    formatter: Option<Arc<dyn StepFormatter>>,
}

/// Immutable name -> handler map shared by every run.
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.tools.contains_key(tool)
    }

    pub fn family(&self, tool: &str) -> Option<&str> {
        self.tools.get(tool).map(|entry| entry.family.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One-line description of a step result: the tool's formatter when it
    /// has one and it produces text, otherwise `<family>.<tool>`.
    pub fn describe(&self, result: &StepResult) -> String {
        let Some(entry) = self.tools.get(&result.tool) else {
            return format!("unknown.{}", result.tool);
        };
        entry
            .formatter
            .as_ref()
            .and_then(|formatter| formatter.describe(result))
            .unwrap_or_else(|| format!("{}.{}", entry.family, result.tool))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(&self, tool: &str, params: Params, timeout: Duration) -> Result<Value, ToolError> {
        let entry = self
            .tools
            .get(tool)
            .ok_or_else(|| ToolError::NotFound(tool.to_string()))?;

        debug!(tool, family = %entry.family, timeout_ms = timeout.as_millis() as u64, "invoking tool");
        match tokio::time::timeout(timeout, entry.handler.call(params)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(timeout)),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, ToolEntry>,
}

impl std::fmt::Debug for ToolRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistryBuilder")
            .field("tools", &names)
            .finish()
    }
}

impl ToolRegistryBuilder {
    /// Registers `handler` under `name`. A later registration with the same
    /// name replaces the earlier one.
    pub fn register<H>(mut self, family: impl Into<String>, name: impl Into<String>, handler: H) -> Self
    where
        H: ToolHandler + 'static,
    {
        self.insert(family.into(), name.into(), Arc::new(handler), None);
        self
    }

    pub fn register_with_formatter<H, F>(
        mut self,
        family: impl Into<String>,
        name: impl Into<String>,
        handler: H,
        formatter: F,
    ) -> Self
    where
        H: ToolHandler + 'static,
        F: StepFormatter + 'static,
    {
        self.insert(family.into(), name.into(), Arc::new(handler), Some(Arc::new(formatter)));
        self
    }

    fn insert(
        &mut self,
        family: String,
        name: String,
        handler: Arc<dyn ToolHandler>,
        formatter: Option<Arc<dyn StepFormatter>>,
    ) {
        if self.tools.contains_key(&name) {
            debug!(tool = %name, "replacing previously registered tool");
        }
        self.tools.insert(
            name,
            ToolEntry {
                family,
                handler,
                formatter,
            },
        );
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}
