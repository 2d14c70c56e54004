use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use burrow_core::{BurrowError, Result};

/// Root configuration — maps to `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BurrowConfig {
    pub agent: AgentConfig,
    /// Provider credentials keyed by vendor name ("openai", "deepseek", …).
    pub providers: HashMap<String, ProviderConfig>,
    pub channels: ChannelsConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Workspace directory — the sandbox root for all file/shell tools.
    pub workspace: String,
    /// Model identifier as "vendor/model", e.g. "openai/gpt-4o-mini".
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Iteration ceiling for the tool-calling loop.
    pub max_tool_iterations: u32,
    /// Keep file/shell tools confined to the workspace.
    pub restrict_to_workspace: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workspace: "~/.burrow/workspace".into(),
            model: "openai/gpt-4o-mini".into(),
            max_tokens: 8192,
            temperature: 0.7,
            max_tool_iterations: 20,
            restrict_to_workspace: true,
        }
    }
}

// ── Providers ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    /// Override the vendor's default API base URL.
    pub api_base: Option<String>,
}

// ── Channels ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    /// User IDs allowed to talk to the bot. Empty = allow everyone.
    pub allow_from: Vec<String>,
}

impl BurrowConfig {
    /// Split a "vendor/model" identifier. A bare model name defaults the
    /// vendor to "openai".
    pub fn split_model(model: &str) -> (&str, &str) {
        match model.split_once('/') {
            Some((vendor, name)) => (vendor, name),
            None => ("openai", model),
        }
    }

    /// Look up the provider entry for the given model identifier. The
    /// returned vendor slice borrows from `model`, not from `self`.
    pub fn provider_for<'a>(&'a self, model: &'a str) -> Result<(&'a str, &'a ProviderConfig)> {
        let (vendor, _) = Self::split_model(model);
        self.providers
            .get(vendor)
            .map(|p| (vendor, p))
            .ok_or_else(|| BurrowError::Config(format!("no provider configured for model: {model}")))
    }
}
