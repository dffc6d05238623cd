//! Persisted user preferences.
//!
//! Exactly three values survive restarts: the last played channel id,
//! the playlist source, and the controls-enabled flag.  Stored as JSON
//! in the data dir; a missing or unreadable file falls back to
//! defaults rather than erroring.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prefs {
    pub last_channel_id: Option<String>,
    pub playlist_source: Option<String>,
    #[serde(default)]
    pub controls_enabled: bool,
}

pub struct PrefsStore {
    path: PathBuf,
    prefs: Prefs,
}

impl PrefsStore {
    pub fn default_path() -> PathBuf {
        platform::data_dir().join("prefs.json")
    }

    pub fn load(path: PathBuf) -> Self {
        let prefs = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self { path, prefs }
    }

    pub fn prefs(&self) -> &Prefs {
        &self.prefs
    }

    pub async fn set_last_channel_id(&mut self, id: &str) {
        self.prefs.last_channel_id = Some(id.to_string());
        self.save().await;
    }

    pub async fn set_playlist_source(&mut self, source: &str) {
        self.prefs.playlist_source = Some(source.to_string());
        self.save().await;
    }

    pub async fn set_controls_enabled(&mut self, enabled: bool) {
        self.prefs.controls_enabled = enabled;
        self.save().await;
    }

    /// Best-effort write: a failed save is logged, never propagated.
    async fn save(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match serde_json::to_string_pretty(&self.prefs) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&self.path, json).await {
                    tracing::warn!("prefs: failed to write {}: {}", self.path.display(), e);
                }
            }
            Err(e) => tracing::warn!("prefs: failed to serialize: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let store = PrefsStore::load(PathBuf::from("/nonexistent/prefs.json"));
        assert!(store.prefs().last_channel_id.is_none());
        assert!(store.prefs().playlist_source.is_none());
        assert!(!store.prefs().controls_enabled);
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let dir = std::env::temp_dir().join("tvzap-prefs-test");
        let path = dir.join("prefs.json");
        let _ = std::fs::remove_file(&path);

        let mut store = PrefsStore::load(path.clone());
        store.set_last_channel_id("42").await;
        store.set_controls_enabled(true).await;

        let reloaded = PrefsStore::load(path);
        assert_eq!(reloaded.prefs().last_channel_id.as_deref(), Some("42"));
        assert!(reloaded.prefs().controls_enabled);
    }
}
