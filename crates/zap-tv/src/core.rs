/// ZapperCore — single-owner event loop for all mutable state.
///
/// Runs embedded in the TUI process.  Every task that needs to mutate
/// playback or catalog state sends a `CoreEvent` into this loop;
/// ZapperCore owns `StateManager`, `MpvDriver`, the overlay timers and
/// the prefs store exclusively.
///
/// After each event that mutates state, ZapperCore broadcasts
/// `BroadcastMessage::StateUpdated` via a `tokio::sync::broadcast`
/// channel; the UI shell re-renders from a fresh state snapshot.
///
/// Two generation counters keep slow side work honest:
/// - overlay timers: a re-arm supersedes the countdown in flight;
/// - playlist loads: a newer reload supersedes an unfinished fetch.
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use zap_proto::config::Config;
use zap_proto::playlist::Channel;
use zap_proto::prefs::PrefsStore;
use zap_proto::state::{PlayerHealth, StateManager};

use crate::loader::{spawn_load, LoadError};
use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, SessionState, OBS_PAUSE};
use crate::overlay::{OverlayKind, OverlayTimers};
use crate::BroadcastMessage;

// ── CoreCommand / CoreEvent ───────────────────────────────────────────────────

/// User-initiated commands from the UI shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Tune to the channel with this URL (menu selection).
    Play { url: String },
    ZapNext,
    ZapPrev,
    /// A digit key; accumulates into the number buffer.
    Digit(char),
    OpenMenu,
    CloseMenu,
    SeekRelative(f64),
    TogglePause,
    SetQuery(String),
    SelectGroup(String),
    SetControlsEnabled(bool),
    /// Reload the playlist; `Some` also persists a new source.
    Reload { source: Option<String> },
}

/// All inputs into the ZapperCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    Command(CoreCommand),
    /// An overlay auto-hide countdown fired.
    OverlayExpired {
        kind: OverlayKind,
        generation: u64,
    },
    /// A playlist fetch + parse completed.
    LoadFinished {
        generation: u64,
        result: Result<Vec<Channel>, LoadError>,
    },
    /// Raw mpv unsolicited event (forwarded from reader task).
    MpvEvent(MpvEvent),
    Shutdown,
}

// ── ZapperCore ────────────────────────────────────────────────────────────────

pub struct ZapperCore {
    config: Config,
    prefs: PrefsStore,
    state_manager: Arc<StateManager>,
    mpv_driver: MpvDriver,
    /// Live handle to the mpv IO tasks.  `None` until the first play.
    mpv_handle: Option<MpvHandle>,
    /// Handle for the 500ms timeline poll task.
    poll_task: Option<AbortHandle>,
    /// Channel to feed timers, loads and mpv events back into our loop.
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    overlays: OverlayTimers,
    /// Source given on the command line; persisted by the first load.
    initial_source: Option<String>,
    /// One-shot startup latch: the first successful load may auto-tune.
    has_auto_played: bool,
    load_generation: u64,
    /// Pause flag as last pushed by mpv property observation.
    obs_pause: bool,
}

impl ZapperCore {
    pub fn new(
        config: Config,
        prefs: PrefsStore,
        initial_source: Option<String>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let controls_enabled = prefs.prefs().controls_enabled;
        let state_manager = Arc::new(StateManager::new(controls_enabled));
        let mpv_driver = MpvDriver::new(config.mpv.default_volume);
        let overlays = OverlayTimers::new(event_tx.clone());

        Self {
            config,
            prefs,
            state_manager,
            mpv_driver,
            mpv_handle: None,
            poll_task: None,
            event_tx,
            broadcast_tx,
            overlays,
            initial_source,
            has_auto_played: false,
            load_generation: 0,
            obs_pause: false,
        }
    }

    pub fn state_manager(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is
    /// received or the event channel is closed (UI exited).
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("ZapperCore: starting event loop");

        // Kick off the initial playlist load: a command-line source wins
        // (and is persisted), else the saved source, else the configured
        // one.
        let initial = self.initial_source.take();
        self.start_load(initial).await;

        loop {
            let evt = event_rx.recv().await;
            match evt {
                None => {
                    info!("ZapperCore: event channel closed, shutting down");
                    break;
                }

                Some(CoreEvent::Shutdown) => {
                    info!("ZapperCore: shutdown requested");
                    break;
                }

                Some(CoreEvent::Command(cmd)) => {
                    debug!("ZapperCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd).await {
                        error!("ZapperCore: command error: {}", e);
                    }
                }

                Some(CoreEvent::OverlayExpired { kind, generation }) => {
                    self.handle_overlay_expired(kind, generation).await;
                }

                Some(CoreEvent::LoadFinished { generation, result }) => {
                    self.handle_load_finished(generation, result).await;
                }

                Some(CoreEvent::MpvEvent(evt)) => {
                    self.handle_mpv_event(evt).await;
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: CoreCommand) -> anyhow::Result<()> {
        match cmd {
            CoreCommand::Play { url } => {
                let channel = self.state_manager.get_state().await.catalog.find_by_url(&url).cloned();
                match channel {
                    Some(ch) => self.play(ch).await,
                    None => warn!("ZapperCore: play for unknown url {}", url),
                }
            }
            CoreCommand::ZapNext => self.zap(true).await,
            CoreCommand::ZapPrev => self.zap(false).await,
            CoreCommand::Digit(c) => self.push_digit(c).await,
            CoreCommand::OpenMenu => self.open_menu().await,
            CoreCommand::CloseMenu => {
                self.state_manager.set_menu_visible(false).await;
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
            CoreCommand::SeekRelative(secs) => self.seek_relative(secs).await,
            CoreCommand::TogglePause => self.toggle_pause().await,
            CoreCommand::SetQuery(q) => {
                self.state_manager.set_query(&q).await;
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
            CoreCommand::SelectGroup(name) => {
                self.state_manager.select_group(&name).await;
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
            CoreCommand::SetControlsEnabled(enabled) => {
                self.set_controls_enabled(enabled).await;
            }
            CoreCommand::Reload { source } => self.start_load(source).await,
        }
        Ok(())
    }

    async fn play(&mut self, channel: Channel) {
        info!("ZapperCore: tuning to '{}' ({})", channel.name, channel.url);
        self.prefs.set_last_channel_id(&channel.id).await;
        self.state_manager.set_playing(channel.clone()).await;
        self.overlays.arm(OverlayKind::Info);
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);

        match self.ensure_player_handle().await {
            Some(handle) => {
                if let Err(e) = handle.load(&channel.url).await {
                    warn!("ZapperCore: failed to load '{}': {}", channel.name, e);
                }
                self.restart_poll_task(handle);
            }
            None => {
                warn!("ZapperCore: no player available for '{}'", channel.name);
            }
        }
    }

    async fn zap(&mut self, forward: bool) {
        let state = self.state_manager.get_state().await;
        let current_url = state.playing.as_ref().map(|c| c.url.as_str());
        let target = if forward {
            state.catalog.zap_next(current_url)
        } else {
            state.catalog.zap_prev(current_url)
        }
        .cloned();
        if let Some(ch) = target {
            self.play(ch).await;
        }
    }

    /// Append a digit and restart the resolution countdown.  The buffer
    /// accepts anything while typing; validity is judged only when the
    /// timer fires.
    async fn push_digit(&mut self, c: char) {
        let mut buffer = self.state_manager.get_state().await.number_buffer;
        buffer.push(c);
        self.state_manager.set_number_buffer(buffer).await;
        self.overlays.arm(OverlayKind::NumberBuffer);
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    async fn open_menu(&mut self) {
        self.state_manager.set_menu_visible(true).await;

        // Bring the menu to the playing channel: select its group (when
        // not searching) and tell the UI where to scroll.
        let state = self.state_manager.get_state().await;
        if let Some(playing) = &state.playing {
            if !state.catalog.is_searching() {
                self.state_manager.select_group(&playing.group).await;
            }
            let state = self.state_manager.get_state().await;
            if let Some(idx) = state.catalog.position_in_visible(&playing.url) {
                let _ = self.broadcast_tx.send(BroadcastMessage::ScrollTo(idx));
            }
        }
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    async fn seek_relative(&mut self, secs: f64) {
        let state = self.state_manager.get_state().await;
        if !state.controls_enabled || state.playing.is_none() {
            return;
        }
        if let Some(handle) = self.mpv_handle.as_ref() {
            if let Err(e) = handle.seek_relative(secs).await {
                warn!("ZapperCore: seek failed: {}", e);
            }
        }
        self.show_progress_bar().await;
    }

    async fn toggle_pause(&mut self) {
        let state = self.state_manager.get_state().await;
        if !state.controls_enabled || state.playing.is_none() {
            return;
        }
        if let Some(handle) = self.mpv_handle.as_ref() {
            // Use the observed pause flag rather than an IPC round-trip
            // (avoids a 5-second timeout if mpv is stalled).
            if let Err(e) = handle.set_pause(!self.obs_pause).await {
                warn!("ZapperCore: pause toggle failed: {}", e);
            }
        }
        self.show_progress_bar().await;
    }

    async fn show_progress_bar(&mut self) {
        self.state_manager.set_progress_visible(true).await;
        self.overlays.arm(OverlayKind::ProgressBar);
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    async fn set_controls_enabled(&mut self, enabled: bool) {
        self.prefs.set_controls_enabled(enabled).await;
        self.state_manager.set_controls_enabled(enabled).await;
        if let Some(handle) = self.mpv_handle.as_ref() {
            if let Err(e) = handle.set_osc_visibility(enabled).await {
                debug!("ZapperCore: osc-visibility update failed: {}", e);
            }
        }
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    // ── playlist loading ──────────────────────────────────────────────────────

    /// Start a playlist load.  A `Some` source is persisted and used
    /// directly; `None` resolves prefs first, then config.
    async fn start_load(&mut self, source: Option<String>) {
        if let Some(src) = &source {
            self.prefs.set_playlist_source(src).await;
        }
        let effective = source
            .or_else(|| self.prefs.prefs().playlist_source.clone())
            .unwrap_or_else(|| self.config.playlist.source.clone());

        self.load_generation += 1;
        self.state_manager.set_loading(true).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        spawn_load(effective, self.load_generation, self.event_tx.clone());
    }

    async fn handle_load_finished(
        &mut self,
        generation: u64,
        result: Result<Vec<Channel>, LoadError>,
    ) {
        if generation != self.load_generation {
            debug!(
                "ZapperCore: dropping stale load gen={} (current {})",
                generation, self.load_generation
            );
            return;
        }
        self.state_manager.set_loading(false).await;

        match result {
            Err(e) => {
                // Keep whatever catalog we have; an empty one stays empty.
                warn!("ZapperCore: playlist load failed: {}", e);
            }
            Ok(channels) => {
                info!("ZapperCore: catalog replaced, {} channels", channels.len());
                self.state_manager.set_catalog(channels).await;
                self.state_manager
                    .ensure_group_selected(&self.config.startup.preferred_group)
                    .await;
                self.maybe_auto_play().await;
            }
        }
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    /// First successful load only: tune to the last played channel, or
    /// the configured fallback.  Neither found leaves the menu open and
    /// keeps the latch armed for a later reload.
    async fn maybe_auto_play(&mut self) {
        if self.has_auto_played {
            return;
        }
        let state = self.state_manager.get_state().await;
        let target = self
            .prefs
            .prefs()
            .last_channel_id
            .as_deref()
            .and_then(|id| state.catalog.find_by_id(id))
            .or_else(|| {
                state
                    .catalog
                    .find_by_id(&self.config.startup.fallback_channel_id)
            })
            .cloned();

        if let Some(ch) = target {
            self.has_auto_played = true;
            self.play(ch).await;
        } else {
            debug!("ZapperCore: no auto-play target, menu stays open");
        }
    }

    // ── overlay expiry ────────────────────────────────────────────────────────

    async fn handle_overlay_expired(&mut self, kind: OverlayKind, generation: u64) {
        if !self.overlays.is_current(kind, generation) {
            debug!("ZapperCore: stale {:?} expiry gen={}", kind, generation);
            return;
        }
        match kind {
            OverlayKind::Info => {
                self.state_manager.set_info_visible(false).await;
            }
            OverlayKind::ProgressBar => {
                self.state_manager.set_progress_visible(false).await;
            }
            OverlayKind::NumberBuffer => {
                let buffer = self.state_manager.get_state().await.number_buffer;
                self.state_manager.set_number_buffer(String::new()).await;
                let target = self
                    .state_manager
                    .get_state()
                    .await
                    .catalog
                    .resolve_number(&buffer)
                    .cloned();
                match target {
                    Some(ch) => self.play(ch).await,
                    // Invalid entry clears silently; the buffer is gone
                    // either way.
                    None => debug!("ZapperCore: number '{}' resolves to nothing", buffer),
                }
            }
        }
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    // ── mpv events ────────────────────────────────────────────────────────────

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if let Some((obs_id, data)) = evt.as_property_change() {
            if obs_id == OBS_PAUSE {
                let val = data.as_bool().unwrap_or(false);
                if val != self.obs_pause {
                    debug!("mpv: pause → {}", val);
                    self.obs_pause = val;
                }
            }
            return;
        }

        match evt.event_name() {
            Some("end-file") => {
                let reason = evt
                    .raw
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                info!("mpv: end-file reason={}", reason);
                self.state_manager.set_timeline(None, None).await;
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
            Some("file-loaded") => {
                debug!("mpv: file-loaded");
            }
            _ => {}
        }
    }

    // ── player handle management ──────────────────────────────────────────────

    async fn set_player_health(&mut self, health: PlayerHealth) {
        self.state_manager.set_player_health(health).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    async fn ensure_player_handle(&mut self) -> Option<MpvHandle> {
        // If we have a handle, check that the process is still alive.
        if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
            warn!("ZapperCore: mpv process died, dropping handle");
            self.mpv_handle = None;
            self.mpv_driver.mark_dead();
            self.obs_pause = false;
            self.set_player_health(PlayerHealth::Dead).await;
        }

        if self.mpv_handle.is_none() {
            if self.mpv_driver.session() == SessionState::Disposed {
                return None;
            }

            // One forwarder task per connection; it dies with the
            // reader side of this channel.
            let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
            let core_tx = self.event_tx.clone();
            tokio::spawn(async move {
                while let Some(evt) = event_rx.recv().await {
                    if core_tx.send(CoreEvent::MpvEvent(evt)).await.is_err() {
                        break;
                    }
                }
            });

            self.set_player_health(PlayerHealth::Starting).await;
            let controls = self.state_manager.get_state().await.controls_enabled;
            let handle = match self.mpv_driver.spawn_and_connect(event_tx, controls).await {
                Ok(h) => h,
                Err(e) => {
                    warn!("ZapperCore: failed to start mpv: {}", e);
                    self.set_player_health(PlayerHealth::Dead).await;
                    return None;
                }
            };
            self.set_player_health(PlayerHealth::Ready).await;

            let h_clone = handle.clone();
            tokio::spawn(async move {
                h_clone.observe_playback_properties().await;
            });

            self.mpv_handle = Some(handle);
        }

        self.mpv_handle.clone()
    }

    /// Restart the 500ms timeline poll for a fresh playback.  The old
    /// task is aborted so only one poller ever runs.
    fn restart_poll_task(&mut self, handle: MpvHandle) {
        if let Some(prev) = self.poll_task.take() {
            prev.abort();
        }
        let state_manager = Arc::clone(&self.state_manager);
        let broadcast_tx = self.broadcast_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
                // A failed query skips the tick; the stale timeline
                // stays until the next successful one.
                let pos = match handle.get_time_pos().await {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let dur = handle.get_duration().await.unwrap_or(None);
                state_manager.set_timeline(pos, dur).await;
                let _ = broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
        });
        self.poll_task = Some(task.abort_handle());
    }

    // ── teardown ──────────────────────────────────────────────────────────────

    async fn cleanup(&mut self) {
        info!("ZapperCore: cleanup, disposing player");
        if let Some(prev) = self.poll_task.take() {
            prev.abort();
        }
        // In-flight overlay countdowns become stale; an expiry arriving
        // during teardown is dropped by the generation check.
        self.overlays.cancel(OverlayKind::Info);
        self.overlays.cancel(OverlayKind::NumberBuffer);
        self.overlays.cancel(OverlayKind::ProgressBar);
        self.mpv_handle = None;
        self.mpv_driver.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: usize) -> Channel {
        Channel {
            id: id.to_string(),
            name: format!("Channel {id}"),
            group: "All".into(),
            url: format!("http://stream/{id}"),
        }
    }

    fn catalog_of(n: usize) -> Vec<Channel> {
        (1..=n).map(ch).collect()
    }

    /// A core with a disposed player session: navigation and state flow
    /// run for real, player spawning is a guaranteed no-op.
    async fn test_core(name: &str) -> (ZapperCore, mpsc::Receiver<CoreEvent>) {
        let prefs_path = std::env::temp_dir()
            .join(format!("tvzap-core-{name}"))
            .join("prefs.json");
        let _ = std::fs::remove_file(&prefs_path);
        let prefs = PrefsStore::load(prefs_path);

        let (broadcast_tx, _broadcast_rx) = broadcast::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let mut core = ZapperCore::new(Config::default(), prefs, None, broadcast_tx, event_tx);
        core.mpv_driver.dispose().await;
        (core, event_rx)
    }

    async fn drain_expiries(core: &mut ZapperCore, rx: &mut mpsc::Receiver<CoreEvent>, n: usize) {
        for _ in 0..n {
            match rx.recv().await {
                Some(CoreEvent::OverlayExpired { kind, generation }) => {
                    core.handle_overlay_expired(kind, generation).await;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_digit_sequence_resolves_on_expiry_and_clears() {
        let (mut core, mut event_rx) = test_core("digits").await;
        core.state_manager.set_catalog(catalog_of(600)).await;

        for d in ['5', '2', '7'] {
            core.push_digit(d).await;
        }
        assert_eq!(core.state_manager.get_state().await.number_buffer, "527");

        // Each keystroke re-armed the countdown; the two earlier
        // generations are stale when they fire, only the last resolves.
        tokio::time::advance(OverlayKind::NumberBuffer.delay()).await;
        drain_expiries(&mut core, &mut event_rx, 3).await;

        let state = core.state_manager.get_state().await;
        assert_eq!(state.playing.as_ref().map(|c| c.id.as_str()), Some("527"));
        assert!(state.number_buffer.is_empty());
        assert!(!state.menu_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_number_clears_without_playing() {
        let (mut core, mut event_rx) = test_core("digits-overflow").await;
        core.state_manager.set_catalog(catalog_of(10)).await;

        for d in ['9', '9'] {
            core.push_digit(d).await;
        }
        tokio::time::advance(OverlayKind::NumberBuffer.delay()).await;
        drain_expiries(&mut core, &mut event_rx, 2).await;

        let state = core.state_manager.get_state().await;
        assert!(state.playing.is_none());
        assert!(state.number_buffer.is_empty());
    }

    #[tokio::test]
    async fn test_stale_load_result_is_dropped() {
        let (mut core, _event_rx) = test_core("stale-load").await;
        core.load_generation = 2;

        // A slow fetch from a superseded reload completes late.
        core.handle_load_finished(1, Ok(catalog_of(3))).await;
        assert!(core.state_manager.get_state().await.catalog.is_empty());

        core.handle_load_finished(2, Ok(catalog_of(3))).await;
        assert_eq!(core.state_manager.get_state().await.catalog.len(), 3);
    }

    #[tokio::test]
    async fn test_auto_play_latch_falls_back_and_closes() {
        let (mut core, _event_rx) = test_core("auto-play").await;

        // No saved id and the fallback id is absent: latch stays open.
        core.handle_load_finished(0, Ok(catalog_of(10))).await;
        assert!(core.state_manager.get_state().await.playing.is_none());
        assert!(!core.has_auto_played);

        // A later catalog that contains the fallback auto-tunes once.
        core.handle_load_finished(0, Ok(catalog_of(600))).await;
        let state = core.state_manager.get_state().await;
        assert_eq!(state.playing.as_ref().map(|c| c.id.as_str()), Some("527"));
        assert!(core.has_auto_played);

        // Latch closed: a reload that drops the playing URL does not
        // re-trigger auto-play.
        core.handle_load_finished(0, Ok(catalog_of(3))).await;
        assert!(core.state_manager.get_state().await.playing.is_none());
    }

    #[tokio::test]
    async fn test_auto_play_prefers_persisted_last_channel() {
        let (mut core, _event_rx) = test_core("auto-play-last").await;
        core.prefs.set_last_channel_id("3").await;

        core.handle_load_finished(0, Ok(catalog_of(600))).await;
        let state = core.state_manager.get_state().await;
        assert_eq!(state.playing.as_ref().map(|c| c.id.as_str()), Some("3"));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_prior_catalog() {
        let (mut core, _event_rx) = test_core("failed-load").await;
        core.handle_load_finished(0, Ok(catalog_of(5))).await;

        core.handle_load_finished(0, Err(LoadError::NoSource)).await;
        let state = core.state_manager.get_state().await;
        assert_eq!(state.catalog.len(), 5);
        assert!(!state.loading);
    }
}
