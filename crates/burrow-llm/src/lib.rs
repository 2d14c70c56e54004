//! # burrow-llm
//!
//! Model endpoint abstraction. Every vendor Burrow talks to speaks the
//! OpenAI chat-completions dialect, so there is one HTTP provider plus a
//! factory that routes "vendor/model" identifiers to the right base URL.

pub mod factory;
pub mod mock;
pub mod openai;
pub mod provider;

pub use factory::provider_for_model;
pub use provider::{ChatOptions, ChatProvider, ChatResponse, Usage};
