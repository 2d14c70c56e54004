//! Mock chat provider for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::provider::*;
use burrow_core::{BurrowError, Message, Result, Tool, ToolCall};

/// A chat provider that replays pre-configured responses in order.
///
/// # Example
/// ```
/// use burrow_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("Hello, world!");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Every message slice sent to the provider (for assertions in tests).
    pub requests: Arc<Mutex<Vec<Vec<Message>>>>,
    call_counter: AtomicU64,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Clone, Default)]
pub struct MockResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    /// If set, the provider returns this as a provider error instead.
    pub error: Option<String>,
}

impl MockResponse {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Default::default()
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            requests: Arc::new(Mutex::new(vec![])),
            call_counter: AtomicU64::new(0),
            name: name.into(),
        }
    }

    /// Queue a plain text response.
    pub fn with_response(self, content: &str) -> Self {
        self.responses.lock().unwrap().push(MockResponse::text(content));
        self
    }

    /// Queue a single tool call. `args` is serialized to the raw argument
    /// string the way a real endpoint would send it.
    pub fn with_tool_call(self, name: &str, args: serde_json::Value) -> Self {
        let id = self.call_counter.fetch_add(1, Ordering::Relaxed);
        self.responses.lock().unwrap().push(MockResponse {
            tool_calls: vec![ToolCall {
                id: format!("call_{id}"),
                name: name.to_string(),
                arguments: args.to_string(),
            }],
            ..Default::default()
        });
        self
    }

    /// Queue a tool call whose argument string is taken verbatim, valid
    /// JSON or not.
    pub fn with_raw_tool_call(self, name: &str, raw_args: &str) -> Self {
        let id = self.call_counter.fetch_add(1, Ordering::Relaxed);
        self.responses.lock().unwrap().push(MockResponse {
            tool_calls: vec![ToolCall {
                id: format!("call_{id}"),
                name: name.to_string(),
                arguments: raw_args.to_string(),
            }],
            ..Default::default()
        });
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().unwrap().push(MockResponse::error(error));
        self
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().unwrap().push(resp);
        self
    }

    /// All message slices this provider has received so far.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        Arc::clone(&self.requests)
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            MockResponse::text("(mock: no more queued responses)")
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        _cancel: &CancellationToken,
        messages: &[Message],
        _tools: &[Tool],
        _model: &str,
        _options: ChatOptions,
    ) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mock = self.next_response();

        if let Some(error) = mock.error {
            return Err(BurrowError::Provider(error));
        }

        Ok(ChatResponse {
            content: mock.content,
            tool_calls: mock.tool_calls,
            usage: mock.usage,
        })
    }
}
