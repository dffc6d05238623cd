//! Shared application state snapshot.
//!
//! `ZapperCore` is the only writer; the UI shell reads clone-out
//! snapshots after a `StateUpdated` broadcast.  `rev` is bumped on
//! every mutation so readers can detect missed updates.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::catalog::Catalog;
use crate::playlist::Channel;

/// Health of the mpv player process as tracked by the core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayerHealth {
    /// No player process yet (before first play).
    #[default]
    Absent,
    /// Process spawning / IPC socket not yet available.
    Starting,
    /// IPC connected and responding.
    Ready,
    /// Process exited or socket closed.
    Dead,
}

#[derive(Debug, Clone)]
pub struct ZapState {
    /// Monotonic revision counter — incremented on every state change.
    pub rev: u64,
    pub catalog: Catalog,
    /// Currently playing channel; the catalog relation is re-resolved
    /// by URL on demand.
    pub playing: Option<Channel>,
    pub menu_visible: bool,
    /// Accumulated digit keys awaiting resolution.
    pub number_buffer: String,
    pub info_visible: bool,
    pub progress_visible: bool,
    pub time_pos_secs: Option<f64>,
    pub duration_secs: Option<f64>,
    pub loading: bool,
    pub controls_enabled: bool,
    pub player_health: PlayerHealth,
}

impl ZapState {
    /// The bottom player bar shows for the progress bar or, menu
    /// hidden, for the info overlay.  When both overlays are visible
    /// the progress bar takes visual priority; both timers keep
    /// running underneath.
    pub fn player_bar_visible(&self) -> bool {
        self.progress_visible
            || (self.info_visible && !self.menu_visible && self.playing.is_some())
    }
}

impl Default for ZapState {
    fn default() -> Self {
        Self {
            rev: 1,
            catalog: Catalog::default(),
            playing: None,
            // The menu is up until the first channel plays.
            menu_visible: true,
            number_buffer: String::new(),
            info_visible: false,
            progress_visible: false,
            time_pos_secs: None,
            duration_secs: None,
            loading: false,
            controls_enabled: false,
            player_health: PlayerHealth::Absent,
        }
    }
}

pub struct StateManager {
    state: Arc<RwLock<ZapState>>,
}

impl StateManager {
    pub fn new(controls_enabled: bool) -> Self {
        let state = ZapState {
            controls_enabled,
            ..ZapState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn arc(&self) -> Arc<RwLock<ZapState>> {
        Arc::clone(&self.state)
    }

    pub async fn get_state(&self) -> ZapState {
        self.state.read().await.clone()
    }

    // ── catalog ───────────────────────────────────────────────────────────────

    /// Apply a completed playlist load.  Clears the search query (via
    /// `Catalog::set_channels`); the playing channel survives unless
    /// its URL is gone from the new catalog.
    pub async fn set_catalog(&self, channels: Vec<Channel>) {
        let mut state = self.state.write().await;
        state.catalog.set_channels(channels);
        if let Some(playing) = &state.playing {
            if state.catalog.find_by_url(&playing.url).is_none() {
                state.playing = None;
            }
        }
        state.rev += 1;
    }

    pub async fn set_loading(&self, loading: bool) {
        let mut state = self.state.write().await;
        state.loading = loading;
        state.rev += 1;
    }

    pub async fn set_query(&self, query: &str) {
        let mut state = self.state.write().await;
        state.catalog.set_query(query);
        state.rev += 1;
    }

    pub async fn select_group(&self, name: &str) {
        let mut state = self.state.write().await;
        state.catalog.select_group(name);
        state.rev += 1;
    }

    pub async fn ensure_group_selected(&self, preferred: &str) {
        let mut state = self.state.write().await;
        state.catalog.ensure_group_selected(preferred);
        state.rev += 1;
    }

    // ── playback / navigation ─────────────────────────────────────────────────

    /// Mark a channel as playing: closes the menu, shows the info
    /// overlay, resets the timeline.
    pub async fn set_playing(&self, channel: Channel) {
        let mut state = self.state.write().await;
        state.playing = Some(channel);
        state.menu_visible = false;
        state.info_visible = true;
        state.time_pos_secs = None;
        state.duration_secs = None;
        state.rev += 1;
    }

    pub async fn set_menu_visible(&self, visible: bool) {
        let mut state = self.state.write().await;
        state.menu_visible = visible;
        state.rev += 1;
    }

    pub async fn set_number_buffer(&self, buffer: String) {
        let mut state = self.state.write().await;
        state.number_buffer = buffer;
        state.rev += 1;
    }

    pub async fn set_info_visible(&self, visible: bool) {
        let mut state = self.state.write().await;
        state.info_visible = visible;
        state.rev += 1;
    }

    pub async fn set_progress_visible(&self, visible: bool) {
        let mut state = self.state.write().await;
        state.progress_visible = visible;
        state.rev += 1;
    }

    pub async fn set_timeline(&self, time_pos_secs: Option<f64>, duration_secs: Option<f64>) {
        let mut state = self.state.write().await;
        state.time_pos_secs = time_pos_secs;
        state.duration_secs = duration_secs;
        state.rev += 1;
    }

    pub async fn set_controls_enabled(&self, enabled: bool) {
        let mut state = self.state.write().await;
        state.controls_enabled = enabled;
        state.rev += 1;
    }

    pub async fn set_player_health(&self, health: PlayerHealth) {
        let mut state = self.state.write().await;
        state.player_health = health;
        state.rev += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::Channel;

    fn ch(id: &str, url: &str) -> Channel {
        Channel {
            id: id.into(),
            name: format!("ch {id}"),
            group: "All".into(),
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn test_play_closes_menu_and_arms_info() {
        let sm = StateManager::new(false);
        sm.set_playing(ch("1", "http://x/1")).await;
        let state = sm.get_state().await;
        assert!(!state.menu_visible);
        assert!(state.info_visible);
        assert!(state.player_bar_visible());
    }

    #[tokio::test]
    async fn test_reload_drops_playing_only_when_url_gone() {
        let sm = StateManager::new(false);
        sm.set_catalog(vec![ch("1", "http://x/1"), ch("2", "http://x/2")])
            .await;
        sm.set_playing(ch("2", "http://x/2")).await;

        sm.set_catalog(vec![ch("1", "http://x/2")]).await;
        assert!(sm.get_state().await.playing.is_some());

        sm.set_catalog(vec![ch("1", "http://x/9")]).await;
        assert!(sm.get_state().await.playing.is_none());
    }

    #[tokio::test]
    async fn test_rev_increments() {
        let sm = StateManager::new(false);
        let before = sm.get_state().await.rev;
        sm.set_menu_visible(false).await;
        sm.set_number_buffer("52".into()).await;
        assert!(sm.get_state().await.rev >= before + 2);
    }

    #[tokio::test]
    async fn test_progress_bar_takes_visual_priority() {
        let sm = StateManager::new(true);
        sm.set_playing(ch("1", "http://x/1")).await;
        sm.set_progress_visible(true).await;
        let state = sm.get_state().await;
        // Both flags are up; rendering picks the progress layer.
        assert!(state.info_visible && state.progress_visible);
        assert!(state.player_bar_visible());
    }
}
