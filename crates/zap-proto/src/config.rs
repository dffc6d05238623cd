use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
}

/// Playlist source — an http(s) URL or a local file path, fetched as a
/// single text blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Empty means "no source configured yet" (set one in the UI or
    /// here); the saved prefs value overrides this default.
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Group selected on first load when none is chosen yet (matched
    /// trimmed, case-insensitive; falls back to the first group).
    #[serde(default = "default_preferred_group")]
    pub preferred_group: String,
    /// Channel id to auto-play when no last-played id is saved.
    #[serde(default = "default_fallback_channel_id")]
    pub fallback_channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            preferred_group: default_preferred_group(),
            fallback_channel_id: default_fallback_channel_id(),
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

fn default_preferred_group() -> String {
    "Tamil".to_string()
}

fn default_fallback_channel_id() -> String {
    "527".to_string()
}

fn default_volume() -> f32 {
    0.5
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.playlist.source.is_empty());
        assert_eq!(config.startup.preferred_group, "Tamil");
        assert_eq!(config.startup.fallback_channel_id, "527");
        assert_eq!(config.mpv.default_volume, 0.5);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config =
            toml::from_str("[playlist]\nsource = \"http://example.com/tv.m3u\"\n").unwrap();
        assert_eq!(config.playlist.source, "http://example.com/tv.m3u");
        assert_eq!(config.startup.fallback_channel_id, "527");
    }
}
