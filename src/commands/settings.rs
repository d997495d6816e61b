use colored::Colorize;

use pagechat::config::Config;
use pagechat::error::{PageChatError, Result};
use pagechat::settings::{FileSettingsStore, GroundingMode, SettingsStore};

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

pub fn cmd_settings_show(config: &Config) -> Result<()> {
    let store = FileSettingsStore::new(config.settings_path.clone());
    let settings = store.get()?;

    println!("{} {}", "Settings".green().bold(), store.path().display());

    let key_status = match (&config.api_key, &settings.api_key) {
        (Some(active), Some(stored)) if active == stored => mask_key(active),
        (Some(active), _) => format!("{} (from GEMINI_API_KEY)", mask_key(active)),
        (None, _) => "not set".red().to_string(),
    };
    println!("  {:<16} {}", "api key", key_status);
    println!(
        "  {:<16} {}",
        "grounding",
        if settings.enable_grounding { "on" } else { "off" }
    );
    println!("  {:<16} {}", "grounding mode", settings.grounding_mode);
    println!("  {:<16} {}", "language", settings.language);
    println!(
        "  {:<16} {}",
        "auto summarize",
        if settings.auto_summarize { "on" } else { "off" }
    );

    Ok(())
}

pub fn cmd_settings_set(
    config: &Config,
    grounding: Option<bool>,
    mode: Option<&str>,
    language: Option<&str>,
    auto_summarize: Option<bool>,
    api_key: Option<&str>,
) -> Result<()> {
    let store = FileSettingsStore::new(config.settings_path.clone());
    let mut settings = store.get()?;

    if let Some(enabled) = grounding {
        settings.enable_grounding = enabled;
    }
    if let Some(mode) = mode {
        settings.grounding_mode = GroundingMode::from_str_loose(mode).ok_or_else(|| {
            PageChatError::Config(format!(
                "Unknown grounding mode '{}' (expected auto or always)",
                mode
            ))
        })?;
    }
    if let Some(language) = language {
        settings.language = language.trim().to_lowercase();
    }
    if let Some(enabled) = auto_summarize {
        settings.auto_summarize = enabled;
    }
    if let Some(key) = api_key {
        let key = key.trim();
        settings.api_key = (!key.is_empty()).then(|| key.to_string());
    }

    store.set(&settings)?;
    println!(
        "{} Settings saved to {}",
        "Done!".green().bold(),
        store.path().display()
    );

    Ok(())
}
