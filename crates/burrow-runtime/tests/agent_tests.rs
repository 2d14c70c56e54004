//! End-to-end tests for the orchestration loop and the message bus,
//! driven by the mock provider.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use burrow_config::AgentConfig;
use burrow_core::{BurrowError, Role};
use burrow_llm::mock::MockProvider;
use burrow_runtime::tools::fs::ListDirTool;
use burrow_runtime::tools::shell::ExecTool;
use burrow_runtime::{Agent, ContextBuilder, InboundMessage, MessageBus, Sandbox, SessionStore, ToolRegistry};

struct Fixture {
    workspace: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            workspace: tempfile::tempdir().unwrap(),
        }
    }

    fn sessions_dir(&self) -> std::path::PathBuf {
        let dir = self.workspace.path().join("sessions");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn agent(&self, provider: MockProvider, max_tool_iterations: u32) -> Agent {
        let sandbox = Sandbox::new(self.workspace.path(), true);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ListDirTool { sandbox: sandbox.clone() }));
        registry.register(Arc::new(ExecTool { sandbox }));

        let config = AgentConfig {
            max_tool_iterations,
            ..AgentConfig::default()
        };

        Agent::new(
            config,
            Arc::new(provider),
            "test-model",
            registry,
            SessionStore::new(self.sessions_dir()),
            ContextBuilder::new(self.workspace.path()),
        )
    }

    fn store(&self) -> SessionStore {
        SessionStore::new(self.sessions_dir())
    }
}

fn collecting_replies() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str)) {
    let replies = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&replies);
    (replies, move |text: &str| {
        sink.lock().unwrap().push(text.to_string())
    })
}

#[tokio::test]
async fn tool_call_turn_persists_four_messages() {
    let fx = Fixture::new();
    std::fs::write(fx.workspace.path().join("notes.txt"), "x").unwrap();

    let provider = MockProvider::new("mock")
        .with_tool_call("list_dir", json!({"path": "."}))
        .with_response("There is one file: notes.txt");
    let agent = fx.agent(provider, 20);

    let (replies, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "list files", on_reply)
        .await
        .unwrap();

    let saved = fx.store().load("s1").unwrap();
    assert_eq!(saved.len(), 4);
    assert_eq!(saved[0].role, Role::User);
    assert_eq!(saved[0].content, "list files");
    assert_eq!(saved[1].role, Role::Assistant);
    assert_eq!(saved[1].tool_calls.len(), 1);
    assert_eq!(saved[2].role, Role::Tool);
    assert_eq!(saved[2].tool_call_id, saved[1].tool_calls[0].id.clone().into());
    assert!(saved[2].content.contains("notes.txt"));
    assert_eq!(saved[3].role, Role::Assistant);
    assert!(saved[3].tool_calls.is_empty());

    let replies = replies.lock().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], "[Agent uses tool: list_dir...]");
    assert_eq!(replies[1], "There is one file: notes.txt");
}

#[tokio::test]
async fn system_prompt_is_fresh_and_never_persisted() {
    let fx = Fixture::new();
    std::fs::write(fx.workspace.path().join("IDENTITY.md"), "I am Burrow").unwrap();

    let provider = MockProvider::new("mock").with_response("Hi!");
    let requests = provider.recorded_requests();
    let agent = fx.agent(provider, 20);

    let (_, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "hello", on_reply)
        .await
        .unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests[0][0].role, Role::System);
    assert!(requests[0][0].content.contains("[IDENTITY]"));
    drop(requests);

    let saved = fx.store().load("s1").unwrap();
    assert!(saved.iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn ceiling_fires_notice_and_still_saves() {
    let fx = Fixture::new();

    let mut provider = MockProvider::new("mock");
    for _ in 0..3 {
        provider = provider.with_tool_call("exec", json!({"command": "true"}));
    }
    // A fourth response exists but must never be requested.
    provider = provider.with_response("unreachable");
    let requests = provider.recorded_requests();
    let agent = fx.agent(provider, 3);

    let (replies, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "go", on_reply)
        .await
        .unwrap();

    assert_eq!(requests.lock().unwrap().len(), 3);
    let replies = replies.lock().unwrap();
    assert_eq!(
        replies.last().unwrap(),
        "[Agent stopped: reached maximum tool iteration limit]"
    );

    // user + 3 * (assistant, tool)
    let saved = fx.store().load("s1").unwrap();
    assert_eq!(saved.len(), 7);
}

#[tokio::test]
async fn natural_finish_at_last_iteration_has_no_notice() {
    let fx = Fixture::new();

    let provider = MockProvider::new("mock")
        .with_tool_call("exec", json!({"command": "true"}))
        .with_response("done");
    let agent = fx.agent(provider, 2);

    let (replies, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "go", on_reply)
        .await
        .unwrap();

    let replies = replies.lock().unwrap();
    assert!(replies.iter().all(|r| !r.contains("maximum tool iteration")));
    assert_eq!(replies.last().unwrap(), "done");
}

#[tokio::test]
async fn malformed_arguments_recover_as_tool_message() {
    let fx = Fixture::new();

    let provider = MockProvider::new("mock")
        .with_raw_tool_call("exec", "{not json")
        .with_response("recovered");
    let agent = fx.agent(provider, 20);

    let (replies, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "go", on_reply)
        .await
        .unwrap();

    let saved = fx.store().load("s1").unwrap();
    let tool_msg = saved.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_msg.content.starts_with("Failed to parse tool arguments:"));
    assert_eq!(tool_msg.tool_call_id, saved[1].tool_calls[0].id.clone().into());

    // No tool-use notice: the tool was never invoked.
    let replies = replies.lock().unwrap();
    assert!(replies.iter().all(|r| !r.starts_with("[Agent uses tool:")));
    assert_eq!(replies.last().unwrap(), "recovered");
}

#[tokio::test]
async fn unknown_tool_feeds_error_back_to_model() {
    let fx = Fixture::new();

    let provider = MockProvider::new("mock")
        .with_tool_call("teleport", json!({}))
        .with_response("ok");
    let agent = fx.agent(provider, 20);

    let (_, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "go", on_reply)
        .await
        .unwrap();

    let saved = fx.store().load("s1").unwrap();
    let tool_msg = saved.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_msg.content, "Tool 'teleport' not found.");
}

#[tokio::test]
async fn provider_error_aborts_without_saving() {
    let fx = Fixture::new();

    let provider = MockProvider::new("mock").with_error("HTTP 500: boom");
    let agent = fx.agent(provider, 20);

    let (replies, on_reply) = collecting_replies();
    let err = agent
        .run(&CancellationToken::new(), "s1", "go", on_reply)
        .await
        .unwrap_err();
    assert!(matches!(err, BurrowError::Provider(_)));

    assert!(fx.store().load("s1").unwrap().is_empty());
    assert!(replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_before_model_call() {
    let fx = Fixture::new();

    let provider = MockProvider::new("mock").with_response("never");
    let requests = provider.recorded_requests();
    let agent = fx.agent(provider, 20);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (_, on_reply) = collecting_replies();
    let err = agent.run(&cancel, "s1", "go", on_reply).await.unwrap_err();
    assert!(matches!(err, BurrowError::Cancelled));
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn history_accumulates_across_turns() {
    let fx = Fixture::new();

    let provider = MockProvider::new("mock")
        .with_response("first reply")
        .with_response("second reply");
    let requests = provider.recorded_requests();
    let agent = fx.agent(provider, 20);

    let (_, on_reply) = collecting_replies();
    agent
        .run(&CancellationToken::new(), "s1", "one", &on_reply)
        .await
        .unwrap();
    agent
        .run(&CancellationToken::new(), "s1", "two", &on_reply)
        .await
        .unwrap();

    let saved = fx.store().load("s1").unwrap();
    assert_eq!(saved.len(), 4);

    // Second request sees system + prior turn + new user message.
    let requests = requests.lock().unwrap();
    assert_eq!(requests[1].len(), 4);
    assert_eq!(requests[1][1].content, "one");
    assert_eq!(requests[1][3].content, "two");
}

// ── bus ────────────────────────────────────────────────────────

fn inbound(session: &str, content: &str) -> (InboundMessage, tokio::sync::mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (
        InboundMessage {
            channel: "cli".into(),
            chat_id: "chat".into(),
            content: content.into(),
            session_key: session.into(),
            reply: tx,
        },
        rx,
    )
}

async fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(text) = rx.recv().await {
        out.push(text);
    }
    out
}

#[tokio::test]
async fn bus_processes_messages_in_order() {
    let fx = Fixture::new();
    let provider = MockProvider::new("mock")
        .with_response("reply one")
        .with_response("reply two");
    let agent = Arc::new(fx.agent(provider, 20));

    let bus = MessageBus::new(agent);
    let handle = bus.handle();
    let cancel = CancellationToken::new();
    let worker = bus.start(cancel.clone());

    let (m1, rx1) = inbound("s1", "first");
    let (m2, rx2) = inbound("s2", "second");
    assert!(handle.send(m1).await);
    assert!(handle.send(m2).await);

    assert_eq!(drain(rx1).await, vec!["reply one"]);
    assert_eq!(drain(rx2).await, vec!["reply two"]);

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn bus_reports_agent_failure_into_reply_sink() {
    let fx = Fixture::new();
    let provider = MockProvider::new("mock").with_error("HTTP 503: unavailable");
    let agent = Arc::new(fx.agent(provider, 20));

    let bus = MessageBus::new(agent);
    let handle = bus.handle();
    let cancel = CancellationToken::new();
    let worker = bus.start(cancel.clone());

    let (msg, rx) = inbound("s1", "hello");
    assert!(handle.send(msg).await);

    let replies = drain(rx).await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("Agent encountered an error:"));
    assert!(replies[0].contains("HTTP 503"));

    cancel.cancel();
    worker.await.unwrap();
}
