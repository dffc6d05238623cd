//! App — terminal shell and event loop.
//!
//! - A `tokio::mpsc` channel carries `AppMessage` events in from
//!   background tasks (keyboard reader, core broadcast bridge).
//! - The loop draws a frame whenever a message changed something.
//! - Commands to ZapperCore flow out through the core event channel;
//!   the app never mutates shared state directly.

use std::io;
use std::sync::Arc;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use zap_proto::state::{StateManager, ZapState};

use crate::core::{CoreCommand, CoreEvent};
use crate::input::{self, RouteAction};
use crate::ui::{self, FilterAction, MenuView};
use crate::BroadcastMessage;

// ── internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    StateUpdated(ZapState),
    /// Position the menu cursor (menu opened onto the playing channel).
    ScrollTo(usize),
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    core_tx: mpsc::Sender<CoreEvent>,
    state_manager: Arc<StateManager>,
    /// Latest state snapshot; refreshed on every StateUpdated.
    state: ZapState,
    menu: MenuView,
    should_quit: bool,
}

impl App {
    pub fn new(core_tx: mpsc::Sender<CoreEvent>, state_manager: Arc<StateManager>) -> Self {
        Self {
            core_tx,
            state_manager,
            state: ZapState::default(),
            menu: MenuView::default(),
            should_quit: false,
        }
    }

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.state = self.state_manager.get_state().await;

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (ZapperCore → AppMessage) ─────
        let bc_tx = tx.clone();
        let bc_state_manager = Arc::clone(&self.state_manager);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        let app_msg = match msg {
                            BroadcastMessage::StateUpdated => {
                                let state = bc_state_manager.get_state().await;
                                AppMessage::StateUpdated(state)
                            }
                            BroadcastMessage::ScrollTo(idx) => AppMessage::ScrollTo(idx),
                        };
                        if bc_tx.send(app_msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| ui::draw(f, &self.state, &mut self.menu))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            match rx.recv().await {
                None => break,
                Some(msg) => {
                    needs_redraw = self.handle_message(msg).await;
                    // Coalesce bursts: state broadcasts arrive faster
                    // than redraws are useful.
                    while let Ok(next) = rx.try_recv() {
                        needs_redraw |= self.handle_message(next).await;
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        let _ = self.core_tx.send(CoreEvent::Shutdown).await;
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::StateUpdated(state) => {
                self.state = state;
                self.menu.clamp_selection(self.state.catalog.visible().len());
                true
            }
            AppMessage::ScrollTo(idx) => {
                self.menu.list.select(Some(idx));
                true
            }
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key).await
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
        }
    }

    // ── key handling ──────────────────────────────────────────────────────────

    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return false;
        }

        if self.state.menu_visible {
            self.handle_menu_key(key).await
        } else {
            self.handle_surface_key(key).await
        }
    }

    async fn handle_menu_key(&mut self, key: KeyEvent) -> bool {
        if self.menu.filter.active {
            match self.menu.filter.handle_key(key) {
                FilterAction::Changed(q) => {
                    self.send(CoreCommand::SetQuery(q)).await;
                    self.menu.list.select(Some(0));
                }
                FilterAction::Confirmed => {}
                FilterAction::Cancelled => {
                    self.send(CoreCommand::SetQuery(String::new())).await;
                }
            }
            return true;
        }

        let visible_len = self.state.catalog.visible().len();
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('/') => {
                self.menu.filter.activate();
            }
            KeyCode::Up => self.menu.move_selection(-1, visible_len),
            KeyCode::Down => self.menu.move_selection(1, visible_len),
            KeyCode::PageUp => self.menu.move_selection(-10, visible_len),
            KeyCode::PageDown => self.menu.move_selection(10, visible_len),
            KeyCode::Left => self.cycle_group(-1).await,
            KeyCode::Right => self.cycle_group(1).await,
            KeyCode::Enter => {
                let url = self
                    .menu
                    .list
                    .selected()
                    .and_then(|i| self.state.catalog.visible().get(i).map(|c| c.url.clone()));
                if let Some(url) = url {
                    self.send(CoreCommand::Play { url }).await;
                }
            }
            KeyCode::Char('r') => {
                self.send(CoreCommand::Reload { source: None }).await;
            }
            KeyCode::Char('v') => {
                self.send(CoreCommand::SetControlsEnabled(!self.state.controls_enabled))
                    .await;
            }
            KeyCode::Esc | KeyCode::Char('m') => {
                // Back to the playback surface, but only once something
                // is actually playing.
                if self.state.playing.is_some() {
                    self.send(CoreCommand::CloseMenu).await;
                }
            }
            _ => return false,
        }
        true
    }

    /// Step the selected group left/right in partition order, wrapping.
    /// No-op while a search is active.
    async fn cycle_group(&mut self, delta: i64) {
        if self.state.catalog.is_searching() {
            return;
        }
        let names: Vec<String> = self
            .state
            .catalog
            .group_names()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return;
        }
        let cur = self
            .state
            .catalog
            .selected_group()
            .and_then(|sel| names.iter().position(|n| n == sel))
            .unwrap_or(0) as i64;
        let next = (cur + delta).rem_euclid(names.len() as i64) as usize;
        self.menu.list.select(Some(0));
        self.send(CoreCommand::SelectGroup(names[next].clone())).await;
    }

    async fn handle_surface_key(&mut self, key: KeyEvent) -> bool {
        let Some(action) = input::route(key.code, self.state.controls_enabled) else {
            return false;
        };
        debug!("surface key {:?} → {:?}", key.code, action);
        let cmd = match action {
            RouteAction::Digit(c) => CoreCommand::Digit(c),
            RouteAction::SeekBy(secs) => CoreCommand::SeekRelative(secs as f64),
            RouteAction::TogglePause => CoreCommand::TogglePause,
            RouteAction::ZapNext => CoreCommand::ZapNext,
            RouteAction::ZapPrev => CoreCommand::ZapPrev,
            RouteAction::OpenMenu => CoreCommand::OpenMenu,
        };
        self.send(cmd).await;
        true
    }

    async fn send(&self, cmd: CoreCommand) {
        let _ = self.core_tx.send(CoreEvent::Command(cmd)).await;
    }
}
