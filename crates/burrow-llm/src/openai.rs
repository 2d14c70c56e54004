use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use burrow_core::{BurrowError, Message, Result, Role, Tool, ToolCall};

use crate::provider::*;

/// OpenAI-compatible chat-completions provider. Works with OpenAI itself and
/// every vendor that speaks the same dialect (DeepSeek, Groq, OpenRouter,
/// Ollama, …) — only the base URL and key differ.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    vendor: String,
}

impl OpenAiCompatProvider {
    pub fn new(vendor: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            vendor: vendor.into(),
        }
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    /// Map one runtime message to the wire shape. Assistant messages must
    /// echo their tool_calls array verbatim — the endpoint validates that a
    /// tool result answers a call it actually emitted.
    fn wire_message(msg: &Message) -> serde_json::Value {
        match msg.role {
            Role::System => serde_json::json!({ "role": "system", "content": msg.content }),
            Role::User => serde_json::json!({ "role": "user", "content": msg.content }),
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    serde_json::json!({ "role": "assistant", "content": msg.content })
                } else {
                    let calls: Vec<serde_json::Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            serde_json::json!({
                                "id": tc.id,
                                "type": "function",
                                "function": { "name": tc.name, "arguments": tc.arguments },
                            })
                        })
                        .collect();
                    let content = if msg.content.is_empty() {
                        serde_json::Value::Null
                    } else {
                        serde_json::json!(msg.content)
                    };
                    serde_json::json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": calls,
                    })
                }
            }
            Role::Tool => serde_json::json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
            }),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.vendor
    }

    async fn chat(
        &self,
        cancel: &CancellationToken,
        messages: &[Message],
        tools: &[Tool],
        model: &str,
        options: ChatOptions,
    ) -> Result<ChatResponse> {
        let wire_messages: Vec<serde_json::Value> = messages.iter().map(Self::wire_message).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": wire_messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        if !tools.is_empty() {
            let defs: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(defs);
        }

        debug!(vendor = %self.vendor, model, messages = messages.len(), "sending chat request");

        let mut request = self.client.post(self.completions_url()).json(&body);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = tokio::select! {
            _ = cancel.cancelled() => return Err(BurrowError::Cancelled),
            resp = request.send() => resp.map_err(|e| BurrowError::Provider(e.to_string()))?,
        };

        let status = resp.status();
        let text = tokio::select! {
            _ = cancel.cancelled() => return Err(BurrowError::Cancelled),
            text = resp.text() => text.map_err(|e| BurrowError::Provider(e.to_string()))?,
        };

        if !status.is_success() {
            return Err(BurrowError::Provider(format!("HTTP {status}: {text}")));
        }

        let data: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| BurrowError::Provider(format!("malformed response body: {e}")))?;

        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| BurrowError::Provider("no choices returned from endpoint".into()))?;

        let content = choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let tool_calls: Vec<ToolCall> = choice["message"]["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        Some(ToolCall {
                            id: c["id"].as_str()?.to_string(),
                            name: c["function"]["name"].as_str()?.to_string(),
                            arguments: c["function"]["arguments"]
                                .as_str()
                                .unwrap_or("{}")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = Usage {
            prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: data["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base: &str) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("openai", base, "sk-test")
    }

    #[test]
    fn url_appends_completions_path() {
        assert_eq!(
            provider("https://api.openai.com/v1").completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            provider("https://api.openai.com/v1/").completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn url_keeps_explicit_completions_path() {
        assert_eq!(
            provider("https://proxy.local/v1/chat/completions").completions_url(),
            "https://proxy.local/v1/chat/completions"
        );
    }

    #[test]
    fn assistant_tool_calls_echo_in_function_shape() {
        let mut msg = Message::text(Role::Assistant, "");
        msg.tool_calls = vec![ToolCall {
            id: "call_1".into(),
            name: "exec".into(),
            arguments: r#"{"command":"ls"}"#.into(),
        }];

        let wire = OpenAiCompatProvider::wire_message(&msg);
        assert_eq!(wire["role"], "assistant");
        assert!(wire["content"].is_null());
        assert_eq!(wire["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "exec");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"command":"ls"}"#);
    }

    #[test]
    fn tool_message_carries_call_id() {
        let msg = Message::tool_result("call_1", "output");
        let wire = OpenAiCompatProvider::wire_message(&msg);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert_eq!(wire["content"], "output");
    }
}
