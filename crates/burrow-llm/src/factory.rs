use std::sync::Arc;

use burrow_config::BurrowConfig;
use burrow_core::{BurrowError, Result};

use crate::openai::OpenAiCompatProvider;
use crate::provider::ChatProvider;

/// Default API bases for the vendors we know out of the box. Any other
/// vendor works too, it just has to set `api_base` in its provider section.
fn default_api_base(vendor: &str) -> Option<&'static str> {
    match vendor {
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "zhipu" => Some("https://open.bigmodel.cn/api/paas/v4"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Build the provider for a `vendor/model` reference using the config's
/// provider credentials. Returns the bare model name alongside it.
pub fn provider_for_model(
    config: &BurrowConfig,
    model_ref: &str,
) -> Result<(Arc<dyn ChatProvider>, String)> {
    let (vendor, provider_cfg) = config.provider_for(model_ref)?;
    let (_, model) = BurrowConfig::split_model(model_ref);

    let base_url = match provider_cfg.api_base.as_deref() {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => default_api_base(vendor)
            .ok_or_else(|| {
                BurrowError::Config(format!(
                    "provider '{vendor}' has no api_base and no built-in default"
                ))
            })?
            .to_string(),
    };

    let provider = OpenAiCompatProvider::new(vendor, base_url, provider_cfg.api_key.clone());
    Ok((Arc::new(provider), model.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_config::ProviderConfig;

    fn config_with(vendor: &str, provider: ProviderConfig) -> BurrowConfig {
        let mut config = BurrowConfig::default();
        config.providers.insert(vendor.to_string(), provider);
        config
    }

    #[test]
    fn known_vendor_gets_default_base() {
        let config = config_with("openai", ProviderConfig {
            api_key: "sk-test".into(),
            api_base: None,
        });
        let (provider, model) = provider_for_model(&config, "openai/gpt-4o-mini").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_vendor_without_base_is_config_error() {
        let config = config_with("acme", ProviderConfig {
            api_key: "k".into(),
            api_base: None,
        });
        assert!(matches!(
            provider_for_model(&config, "acme/model-x"),
            Err(BurrowError::Config(_))
        ));
    }

    #[test]
    fn explicit_base_overrides_default() {
        let config = config_with("acme", ProviderConfig {
            api_key: "k".into(),
            api_base: Some("http://localhost:9999/v1".into()),
        });
        let (provider, model) = provider_for_model(&config, "acme/model-x").unwrap();
        assert_eq!(provider.name(), "acme");
        assert_eq!(model, "model-x");
    }

    #[test]
    fn missing_provider_entry_is_config_error() {
        let config = BurrowConfig::default();
        assert!(matches!(
            provider_for_model(&config, "openai/gpt-4o-mini"),
            Err(BurrowError::Config(_))
        ));
    }
}
