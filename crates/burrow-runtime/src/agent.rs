//! The orchestration loop: system prompt, history, model calls, and tool
//! dispatch, bounded by the configured iteration ceiling.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use burrow_config::{AgentConfig, BurrowConfig, expand_home};
use burrow_core::{BurrowError, Message, Result, Role};
use burrow_llm::{ChatOptions, ChatProvider, provider_for_model};

use crate::context::ContextBuilder;
use crate::sandbox::Sandbox;
use crate::session::{SessionStore, workspace_sessions_dir};
use crate::tools::fs::{AppendFileTool, EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
use crate::tools::shell::ExecTool;
use crate::tools::web::WebSearchTool;
use crate::tools::ToolRegistry;

pub struct Agent {
    config: AgentConfig,
    provider: Arc<dyn ChatProvider>,
    model: String,
    registry: ToolRegistry,
    sessions: SessionStore,
    context: ContextBuilder,
}

impl Agent {
    /// Wire up a full agent from configuration: provider, sandbox, built-in
    /// tools, session store, and context builder. Creates the workspace
    /// directories if they do not exist yet.
    pub fn from_config(config: &BurrowConfig) -> Result<Self> {
        let (provider, model) = provider_for_model(config, &config.agent.model)?;

        let workspace = std::path::PathBuf::from(expand_home(&config.agent.workspace));
        std::fs::create_dir_all(&workspace)?;
        let sessions_dir = workspace_sessions_dir(&workspace);
        std::fs::create_dir_all(&sessions_dir)?;

        let sandbox = Sandbox::new(&workspace, config.agent.restrict_to_workspace);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ReadFileTool { sandbox: sandbox.clone() }));
        registry.register(Arc::new(WriteFileTool { sandbox: sandbox.clone() }));
        registry.register(Arc::new(AppendFileTool { sandbox: sandbox.clone() }));
        registry.register(Arc::new(ListDirTool { sandbox: sandbox.clone() }));
        registry.register(Arc::new(EditFileTool { sandbox: sandbox.clone() }));
        registry.register(Arc::new(ExecTool { sandbox }));
        registry.register(Arc::new(WebSearchTool::new()));

        Ok(Self {
            config: config.agent.clone(),
            provider,
            model,
            registry,
            sessions: SessionStore::new(sessions_dir),
            context: ContextBuilder::new(workspace),
        })
    }

    /// Assemble an agent from already-built parts. Used by tests and by
    /// anything that wants a non-default provider or tool set.
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
        registry: ToolRegistry,
        sessions: SessionStore,
        context: ContextBuilder,
    ) -> Self {
        Self {
            config,
            provider,
            model: model.into(),
            registry,
            sessions,
            context,
        }
    }

    /// Run one full turn for a session: load history, loop between the
    /// model and the tools until the model stops requesting calls or the
    /// iteration ceiling is hit, then persist the updated history.
    ///
    /// `on_reply` receives the model's text replies plus tool-use and
    /// ceiling notices as they happen.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        session_key: &str,
        user_input: &str,
        on_reply: impl Fn(&str),
    ) -> Result<()> {
        let tool_defs = self.registry.definitions();
        let system_prompt = self.context.build(&tool_defs);

        let history = self.sessions.load(session_key)?;
        info!(session = session_key, history = history.len(), "starting turn");

        // The system prompt is synthesized fresh at index 0 every turn and
        // never persisted.
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::text(Role::System, system_prompt));
        messages.extend(history);
        messages.push(Message::text(Role::User, user_input));

        let mut messages = self.sessions.compress(messages, self.config.max_tokens);

        let options = ChatOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let max_iterations = self.config.max_tool_iterations;
        let mut iterations = 0u32;
        let mut ended_naturally = false;

        while iterations < max_iterations {
            if cancel.is_cancelled() {
                return Err(BurrowError::Cancelled);
            }
            iterations += 1;

            let response = self
                .provider
                .chat(cancel, &messages, &tool_defs, &self.model, options)
                .await?;
            debug!(
                iteration = iterations,
                tool_calls = response.tool_calls.len(),
                "model replied"
            );

            // Echo the raw assistant message back into the history; the
            // endpoint rejects tool results whose originating call it
            // cannot find.
            let mut assistant = Message::text(Role::Assistant, response.content.clone());
            assistant.tool_calls = response.tool_calls.clone();
            messages.push(assistant);

            if !response.content.is_empty() {
                on_reply(&response.content);
                if response.tool_calls.is_empty() {
                    ended_naturally = true;
                    break;
                }
            }

            if response.tool_calls.is_empty() {
                ended_naturally = true;
                break;
            }

            for call in &response.tool_calls {
                let args: serde_json::Map<String, serde_json::Value> =
                    match serde_json::from_str(&call.arguments) {
                        Ok(args) => args,
                        Err(e) => {
                            messages.push(Message::tool_result(
                                call.id.as_str(),
                                format!("Failed to parse tool arguments: {e}"),
                            ));
                            continue;
                        }
                    };

                on_reply(&format!("[Agent uses tool: {}...]", call.name));
                let result = self.registry.execute(cancel, &call.name, &args).await;
                messages.push(Message::tool_result(call.id.as_str(), result.content));
            }
        }

        if !ended_naturally {
            on_reply("[Agent stopped: reached maximum tool iteration limit]");
        }

        // Strip the synthesized system prompt before persisting.
        let history_to_save: Vec<Message> = messages
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        self.sessions.save(session_key, &history_to_save)
    }
}
