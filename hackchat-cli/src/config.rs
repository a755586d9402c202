//! Persistent configuration for the hackchat terminal client.
//!
//! Settings live at `~/.config/hackchat/config.toml`. A missing or broken file
//! is replaced with defaults so the next start has something to edit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hackchat_sdk::Settings;

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hackchat")
}

pub fn default_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Read settings from `path`, writing defaults there when it is missing or
/// cannot be parsed.
pub fn load_or_create(path: &Path) -> Result<Settings> {
    if path.exists() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read {}", path.display()))?;
        match toml::from_str::<Settings>(&text) {
            Ok(settings) => return Ok(settings.normalized()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Bad config file, rewriting defaults");
            }
        }
    }
    let settings = Settings::default();
    save(path, &settings)?;
    Ok(settings)
}

pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("can't create {}", dir.display()))?;
    }
    let text = toml::to_string_pretty(settings).context("can't serialize config")?;
    std::fs::write(path, text).with_context(|| format!("can't write {}", path.display()))?;
    Ok(())
}

/// Names accepted by [`set_field`].
pub const FIELDS: &[&str] = &[
    "server_url",
    "channel",
    "nick",
    "password",
    "prefix",
    "auto_connect",
    "max_message_length",
];

/// Change one setting by name, as typed by the user.
pub fn set_field(settings: &mut Settings, field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match field {
        "server_url" => settings.server_url = value.to_string(),
        "channel" => settings.channel = value.to_string(),
        "nick" => settings.nick = value.to_string(),
        "password" => settings.password = value.to_string(),
        "prefix" => settings.prefix = value.to_string(),
        "auto_connect" => {
            settings.auto_connect = value
                .parse()
                .with_context(|| format!("auto_connect must be true or false, got `{value}`"))?;
        }
        "max_message_length" => {
            settings.max_message_length = value
                .parse()
                .with_context(|| format!("max_message_length must be a number, got `{value}`"))?;
        }
        other => bail!("unknown setting `{other}` (one of: {})", FIELDS.join(", ")),
    }
    Ok(())
}
