//! Boundary to externally implemented tool handlers.
//!
//! Handlers are registered by name while building a [`ToolRegistry`]; the
//! registry is immutable afterwards and is shared with executors by `Arc`.

mod formatter;
mod registry;
mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::plan::Params;

pub use formatter::{FnFormatter, StepFormatter, TemplateFormatter};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use scripted::{ScriptedErrorKind, ScriptedTool, ScriptedToolSpec, load_tool_script};

/// Business-logic implementation of one tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Params) -> Result<Value, ToolError>;
}

/// Dispatches a named tool call under a deadline.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool: &str, params: Params, timeout: Duration) -> Result<Value, ToolError>;
}

/// Adapts an async closure into a [`ToolHandler`].
pub struct FnHandler<F> {
    func: F,
}

pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ToolError>> + Send,
{
    FnHandler { func }
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ToolError>> + Send,
{
    async fn call(&self, params: Params) -> Result<Value, ToolError> {
        (self.func)(params).await
    }
}
