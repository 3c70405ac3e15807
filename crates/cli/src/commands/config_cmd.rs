//! `ledgerlens config` - Configuration management commands.

use ledgerlens_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.assistant.default_conversation.is_none() {
                warnings.push(
                    "No default conversation set; pass --conversation or LEDGERLENS_CONVERSATION",
                );
            }

            if config.assistant.reasoning.enabled
                && config.assistant.reasoning.effort.is_none()
                && config.assistant.reasoning.budget_tokens.is_none()
            {
                warnings.push("Reasoning enabled without an effort or token budget");
            }

            if !config.assistant.reasoning.enabled
                && (config.assistant.reasoning.effort.is_some()
                    || config.assistant.reasoning.budget_tokens.is_some())
            {
                warnings.push("Reasoning settings present but reasoning.enabled = false");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:      {}", config.assistant.default_provider);
            println!("   Model:         {}", config.assistant.default_model);
            println!(
                "   Conversation:  {}",
                config
                    .assistant
                    .default_conversation
                    .as_deref()
                    .unwrap_or("(none)")
            );
            println!(
                "   Reasoning:     {}",
                if config.assistant.reasoning.enabled { "enabled" } else { "disabled" }
            );
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
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();

    if config_path.exists() && !force {
        println!("   ⚠️  Config already exists at {}", config_path.display());
        println!("      Re-run with --force to overwrite it");
        return Ok(());
    }

    std::fs::create_dir_all(AppConfig::config_dir())?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("   ✅ Wrote default config to {}", config_path.display());
    Ok(())
}
