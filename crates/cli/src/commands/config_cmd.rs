//! `slotflow config`: configuration management commands.

use slotflow_config::AppConfig;

const REDACTED: &str = "***";

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:   {}", config.default_provider);
            println!("   Model:      {}", config.effective_model());
            println!("   Extraction: {}", config.extraction.strategy);
            println!("   Documents:  {}", config.documents.base_dir.display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

/// Non-fatal problems worth pointing out.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.has_api_key() && config.default_provider != "ollama" {
        warnings.push(
            "No API key set (set SLOTFLOW_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY)".into(),
        );
    }

    if !config.documents.base_dir.is_dir() {
        warnings.push(format!(
            "Documents directory {} does not exist",
            config.documents.base_dir.display()
        ));
    }

    warnings
}

/// Copy of the config with every API key masked.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotflow_config::ProviderConfig;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn keys_are_masked() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-or-secret".into()),
                ..ProviderConfig::default()
            },
        );

        let shown = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains(REDACTED));
    }

    #[test]
    fn missing_key_is_warned() {
        let mut config = AppConfig::default();
        config.documents.base_dir = std::env::temp_dir();
        let warnings = warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("API key"));
    }

    #[test]
    fn provider_key_satisfies_key_check() {
        let mut config = AppConfig::default();
        config.documents.base_dir = std::env::temp_dir();
        config.providers.insert(
            config.default_provider.clone(),
            ProviderConfig {
                api_key: Some("sk-provider".into()),
                ..ProviderConfig::default()
            },
        );
        assert!(warnings(&config).is_empty());
    }
}
