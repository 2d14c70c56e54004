//! # burrow-core
//!
//! Core types and error definitions for the Burrow local-first agent runtime.
//! This crate defines the shared vocabulary used by every other crate in the
//! workspace: conversation messages, tool definitions, and the unified error
//! type.

pub mod error;
pub mod message;
pub mod tool;

pub use error::{BurrowError, Result};
pub use message::{Message, Role};
pub use tool::{Tool, ToolCall, ToolResult};
