//! `ledgerlens status` - Show assistant settings.

use ledgerlens_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let assistant = &config.assistant;

    println!("📒 LedgerLens Status");
    println!("====================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {}", assistant.default_provider);
    println!("  Model:         {}", assistant.default_model);
    println!(
        "  Conversation:  {}",
        assistant.default_conversation.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Reasoning:     {}",
        if assistant.reasoning.enabled {
            assistant.reasoning.effort.as_deref().unwrap_or("enabled")
        } else {
            "disabled"
        }
    );
    println!("  Event bus:     {} slots", assistant.event_bus_capacity);
    println!("  Log filter:    {}", config.log.filter);

    if AppConfig::config_path().exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file - run `ledgerlens config init` first");
    }

    Ok(())
}
