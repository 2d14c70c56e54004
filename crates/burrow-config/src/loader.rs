use std::path::{Path, PathBuf};
use tracing::{info, warn};

use burrow_core::{BurrowError, Result};

use crate::schema::BurrowConfig;

/// Resolve the config path: explicit path > BURROW_CONFIG env > ~/.burrow/config.toml
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var("BURROW_CONFIG") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".burrow")
        .join("config.toml")
}

/// Load the config from disk, falling back to defaults when the file does
/// not exist, then apply environment variable overrides.
pub fn load(path: Option<&Path>) -> Result<BurrowConfig> {
    let config_path = resolve_path(path);
    let mut config = if config_path.exists() {
        info!(?config_path, "loading configuration");
        let raw = std::fs::read_to_string(&config_path)?;
        toml::from_str::<BurrowConfig>(&raw).map_err(|e| {
            BurrowError::Config(format!("failed to parse {}: {e}", config_path.display()))
        })?
    } else {
        warn!(?config_path, "config file not found, using defaults");
        BurrowConfig::default()
    };

    apply_env_overrides(&mut config);
    config.agent.workspace = expand_home(&config.agent.workspace);
    Ok(config)
}

/// Apply env var overrides (BURROW_AGENT_MODEL, BURROW_AGENT_WORKSPACE, …).
fn apply_env_overrides(config: &mut BurrowConfig) {
    if let Ok(v) = std::env::var("BURROW_AGENT_MODEL") {
        config.agent.model = v;
    }
    if let Ok(v) = std::env::var("BURROW_AGENT_WORKSPACE") {
        config.agent.workspace = v;
    }
    if let Ok(v) = std::env::var("BURROW_AGENT_MAX_TOKENS")
        && let Ok(n) = v.parse::<u32>()
    {
        config.agent.max_tokens = n;
    }
    if let Ok(v) = std::env::var("BURROW_AGENT_TEMPERATURE")
        && let Ok(t) = v.parse::<f32>()
    {
        config.agent.temperature = t;
    }
    if let Ok(v) = std::env::var("BURROW_AGENT_MAX_TOOL_ITERATIONS")
        && let Ok(n) = v.parse::<u32>()
    {
        config.agent.max_tool_iterations = n;
    }
    if let Ok(v) = std::env::var("BURROW_TELEGRAM_TOKEN") {
        config.channels.telegram.bot_token = v;
        config.channels.telegram.enabled = true;
    }
    // API keys: config file takes priority, env var is the fallback.
    for vendor in ["openai", "deepseek", "groq", "openrouter", "zhipu"] {
        let env_name = format!("{}_API_KEY", vendor.to_uppercase());
        if let Ok(key) = std::env::var(&env_name) {
            let entry = config.providers.entry(vendor.to_string()).or_default();
            if entry.api_key.is_empty() {
                entry.api_key = key;
            }
        }
    }
}

/// Resolve a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{}", home.display(), &path[1..]);
        }
    }
    path.to_string()
}
