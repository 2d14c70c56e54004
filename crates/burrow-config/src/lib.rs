//! # burrow-config
//!
//! Configuration for the Burrow runtime, loaded from `~/.burrow/config.toml`
//! with `BURROW_*` environment overrides layered on top.

pub mod loader;
pub mod schema;

pub use loader::{expand_home, load, resolve_path};
pub use schema::{AgentConfig, BurrowConfig, ProviderConfig, TelegramConfig};
