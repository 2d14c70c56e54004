use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use burrow_core::{Message, Result, Tool, ToolCall};

/// Generation parameters passed through to the endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The standardized response from one model call.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Textual reply (may be empty when the model only requests tools).
    pub content: String,
    /// Tool calls the model wants executed, in request order.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

/// Token usage counters reported by the endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait implemented by each model endpoint adapter.
///
/// A call either completes, fails with `BurrowError::Provider` (non-2xx
/// status, unreachable endpoint, malformed body), or fails with
/// `BurrowError::Cancelled` when the token fires mid-flight.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Human-readable vendor name, e.g. "openai", "deepseek".
    fn name(&self) -> &str;

    /// Send the full message list plus tool definitions and wait for the
    /// reply. No retries — the orchestration loop treats any failure as a
    /// hard failure of the invocation.
    async fn chat(
        &self,
        cancel: &CancellationToken,
        messages: &[Message],
        tools: &[Tool],
        model: &str,
        options: ChatOptions,
    ) -> Result<ChatResponse>;
}
