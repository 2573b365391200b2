// Configuration loader
// Loads the model API key from a settings file or environment variable
// (spec §6 "Environment variables consumed by the Pipeline"; SPEC_FULL
// "Configuration" extends the plain env-var read with a settings file and
// a diffmux-specific env var, matching the teacher's try-file-then-env-var
// loader shape).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;

use super::settings::Config;

#[derive(Debug, Deserialize)]
struct FileSettings {
    api_key: Option<String>,
}

/// Load configuration: `OPENAI_API_KEY` wins when present; otherwise try
/// `DIFFMUX_API_KEY`, then `~/.config/diffmux/config.toml`'s `api_key`
/// field. Absence of all three is a fatal `Config` error (spec §6, §7).
pub fn load_config() -> Result<Config> {
    if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
        if !api_key.is_empty() {
            return Ok(Config::new(api_key));
        }
    }

    if let Ok(api_key) = std::env::var("DIFFMUX_API_KEY") {
        if !api_key.is_empty() {
            return Ok(Config::new(api_key));
        }
    }

    if let Some(api_key) = try_load_from_config_file()? {
        return Ok(Config::new(api_key));
    }

    bail!(
        "OpenAI API key not found\n\n\
        Checked locations:\n\
        1. Environment variable: $OPENAI_API_KEY\n\
        2. Environment variable: $DIFFMUX_API_KEY\n\
        3. ~/.config/diffmux/config.toml (api_key field)\n\n\
        Quick setup:\n\
        export OPENAI_API_KEY=\"sk-...\""
    );
}

fn try_load_from_config_file() -> Result<Option<String>> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config_path = home.join(".config/diffmux/config.toml");

    if !config_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;

    let settings: FileSettings = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    Ok(settings.api_key)
}
