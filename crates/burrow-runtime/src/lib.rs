//! # burrow-runtime
//!
//! The heart of Burrow: the tool-calling orchestration loop, the built-in
//! tool set with its workspace sandbox, session persistence, system prompt
//! assembly, and the message bus that serializes inbound traffic from
//! channels into the agent.

pub mod agent;
pub mod bus;
pub mod context;
pub mod sandbox;
pub mod session;
pub mod tools;

pub use agent::Agent;
pub use bus::{BusHandle, InboundMessage, MessageBus};
pub use context::ContextBuilder;
pub use sandbox::Sandbox;
pub use session::SessionStore;
pub use tools::{AgentTool, ToolRegistry};
