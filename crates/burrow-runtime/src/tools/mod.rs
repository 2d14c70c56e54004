//! Tool trait, registry, and the built-in tool implementations.

pub mod fs;
pub mod shell;
pub mod web;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use burrow_core::{Tool, ToolResult};

/// One executable capability the model can invoke.
///
/// Execution never returns `Err`: every failure mode (bad arguments,
/// I/O trouble, timeouts, even panics) is folded into an error-flagged
/// `ToolResult` so the orchestration loop can feed it back to the model
/// instead of aborting the invocation.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema object describing the accepted arguments.
    fn parameters(&self) -> Value;
    async fn execute(
        &self,
        cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult;
}

/// Name-keyed collection of tools exposed to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Wire-format definitions for every registered tool, sorted by name
    /// so the request body is deterministic.
    pub fn definitions(&self) -> Vec<Tool> {
        let mut defs: Vec<Tool> = self
            .tools
            .values()
            .map(|t| Tool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run a tool by name. Unknown names and panicking tools both come
    /// back as error results rather than crashing the loop.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        name: &str,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::error(format!("Tool '{name}' not found."));
        };

        debug!(tool = name, "executing tool");
        match AssertUnwindSafe(tool.execute(cancel, args)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tool = name, %reason, "tool panicked");
                ToolResult::error(format!("Tool '{name}' panicked: {reason}"))
            }
        }
    }
}
