use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub music_channel_id: u64,
    pub command_prefix: String,

    // Resolución
    pub ytdlp_bin: String,
    pub ytdlp_use_oauth_plugin: bool,
    pub staging_dir: PathBuf,

    // Reproducción
    pub max_queue_size: usize,
    pub reconnect_grace_secs: u64,
    pub event_buffer: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            music_channel_id: std::env::var("MUSIC_CHANNEL_ID")?.parse()?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "/".to_string()),

            // Resolución
            ytdlp_bin: std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string()),
            ytdlp_use_oauth_plugin: std::env::var("YTDLP_USE_OAUTH_PLUGIN")
                .map(|value| value == "true")
                .unwrap_or(false),
            staging_dir: std::env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),

            // Reproducción
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,
            reconnect_grace_secs: std::env::var("RECONNECT_GRACE_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            event_buffer: std::env::var("EVENT_BUFFER")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.staging_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// Catches the mistakes that would otherwise surface as confusing
    /// failures at runtime: a zero channel id panics inside serenity's id
    /// types, an empty prefix matches every message, and a zero-length grace
    /// window turns every renegotiation into a teardown.
    pub fn validate(&self) -> Result<()> {
        if self.music_channel_id == 0 {
            anyhow::bail!("MUSIC_CHANNEL_ID must be a non-zero channel id");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.reconnect_grace_secs == 0 || self.reconnect_grace_secs > 60 {
            anyhow::bail!(
                "Reconnect grace must be between 1 and 60 seconds, got: {}",
                self.reconnect_grace_secs
            );
        }

        if self.event_buffer == 0 {
            anyhow::bail!("Event buffer must be greater than 0");
        }

        Ok(())
    }

    /// Resumen de configuración para el log de arranque (sin secretos).
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Canal de música: {} (prefijo '{}')\n  \
            yt-dlp: {} (oauth: {})\n  \
            Staging: {}\n  \
            Límites: {} en cola, {}s de gracia, {} eventos en buffer",
            self.music_channel_id,
            self.command_prefix,
            self.ytdlp_bin,
            self.ytdlp_use_oauth_plugin,
            self.staging_dir.display(),
            self.max_queue_size,
            self.reconnect_grace_secs,
            self.event_buffer,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults razonables - deben proveerse)
            discord_token: String::new(),
            music_channel_id: 0,
            command_prefix: "/".to_string(),

            // Resolución
            ytdlp_bin: "yt-dlp".to_string(),
            ytdlp_use_oauth_plugin: false,
            staging_dir: std::env::temp_dir(),

            // Reproducción
            max_queue_size: 500,
            reconnect_grace_secs: 5,
            event_buffer: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation_once_channel_is_set() {
        let config = Config {
            music_channel_id: 123456789,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_values() {
        assert!(Config::default().validate().is_err());

        let empty_prefix = Config {
            music_channel_id: 1,
            command_prefix: String::new(),
            ..Config::default()
        };
        assert!(empty_prefix.validate().is_err());

        let zero_grace = Config {
            music_channel_id: 1,
            reconnect_grace_secs: 0,
            ..Config::default()
        };
        assert!(zero_grace.validate().is_err());
    }
}
