//! # burrow-cli
//!
//! Command-line interface for the Burrow agent.
//!
//! ## Commands
//!
//! - `burrow onboard` — Initialize config and workspace
//! - `burrow agent` — Interactive chat, or one-shot with `-m`
//! - `burrow gateway` — Run the channel gateway (Telegram)
//! - `burrow status` — Show configuration and workspace health

pub mod commands;

pub use commands::Cli;
