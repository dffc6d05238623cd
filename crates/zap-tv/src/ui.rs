//! Rendering: the channel menu and the playback surface overlays.
//!
//! The draw path is a pure function of the latest `ZapState` snapshot
//! plus the menu's local cursor (`MenuView`).  Video itself renders in
//! the external mpv window; this surface carries only the overlays.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};
use unicode_width::UnicodeWidthStr;

use zap_proto::state::{PlayerHealth, ZapState};

use crate::theme;

/// MM:SS; hours fold into minutes (live TV rarely shows a duration
/// anyway).
pub fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn truncated(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    for ch in s.chars() {
        if out.width() + 1 >= max_width {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

// ── search input ──────────────────────────────────────────────────────────────

pub enum FilterAction {
    Changed(String),
    Confirmed,
    Cancelled,
}

/// Wraps tui-input for the channel search bar.
#[derive(Default)]
pub struct FilterInput {
    input: Input,
    pub active: bool,
}

impl FilterInput {
    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc clears first, closes second; Enter confirms and closes.
    pub fn handle_key(&mut self, key: KeyEvent) -> FilterAction {
        match key.code {
            KeyCode::Esc => {
                if !self.input.value().is_empty() {
                    self.input = Input::default();
                    FilterAction::Changed(String::new())
                } else {
                    self.active = false;
                    FilterAction::Cancelled
                }
            }
            KeyCode::Enter => {
                self.active = false;
                FilterAction::Confirmed
            }
            _ => {
                self.input
                    .handle_event(&ratatui::crossterm::event::Event::Key(key));
                FilterAction::Changed(self.input.value().to_string())
            }
        }
    }
}

// ── menu cursor ───────────────────────────────────────────────────────────────

/// UI-local menu state: the list cursor and the search input.  Catalog
/// contents always come from the state snapshot.
#[derive(Default)]
pub struct MenuView {
    pub list: ListState,
    pub filter: FilterInput,
}

impl MenuView {
    pub fn clamp_selection(&mut self, visible_len: usize) {
        if visible_len == 0 {
            self.list.select(None);
        } else {
            let sel = self.list.selected().unwrap_or(0).min(visible_len - 1);
            self.list.select(Some(sel));
        }
    }

    pub fn move_selection(&mut self, delta: i64, visible_len: usize) {
        if visible_len == 0 {
            return;
        }
        let cur = self.list.selected().unwrap_or(0) as i64;
        let next = (cur + delta).clamp(0, visible_len as i64 - 1);
        self.list.select(Some(next as usize));
    }
}

// ── top-level draw ────────────────────────────────────────────────────────────

pub fn draw(frame: &mut Frame, state: &ZapState, menu: &mut MenuView) {
    let area = frame.area();
    frame.render_widget(
        Block::default().style(Style::default().bg(theme::C_BG)),
        area,
    );

    if state.menu_visible {
        draw_menu(frame, area, state, menu);
    } else {
        draw_playback_surface(frame, area, state);
    }

    draw_number_badge(frame, area, state);
}

// ── menu ──────────────────────────────────────────────────────────────────────

fn draw_menu(frame: &mut Frame, area: Rect, state: &ZapState, menu: &mut MenuView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(3),    // body
            Constraint::Length(1), // search bar / key hints
        ])
        .split(area);

    draw_header(frame, rows[0], state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(20)])
        .split(rows[1]);

    draw_group_rail(frame, body[0], state);
    draw_channel_list(frame, body[1], state, menu);

    if menu.filter.active || state.catalog.is_searching() {
        draw_search_bar(frame, rows[2], menu);
    } else {
        draw_key_hints(frame, rows[2], state);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, state: &ZapState) {
    let mut spans = vec![
        Span::styled(" tvzap ", Style::default().fg(theme::C_ACCENT)),
        Span::styled(
            format!("{} channels", state.catalog.len()),
            theme::style_secondary(),
        ),
    ];
    if state.loading {
        spans.push(Span::styled("  loading…", Style::default().fg(theme::C_ACCENT)));
    }
    if let Some(playing) = &state.playing {
        spans.push(Span::styled("  ▶ ", theme::style_playing()));
        spans.push(Span::styled(playing.name.clone(), theme::style_playing()));
    }
    if state.player_health == PlayerHealth::Dead {
        spans.push(Span::styled(
            "  player died",
            Style::default().fg(theme::C_ERROR),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_group_rail(frame: &mut Frame, area: Rect, state: &ZapState) {
    let searching = state.catalog.is_searching();
    let items: Vec<ListItem> = state
        .catalog
        .group_names()
        .map(|g| {
            let style = if !searching && state.catalog.selected_group() == Some(g) {
                theme::style_selected()
            } else {
                theme::style_secondary()
            };
            ListItem::new(truncated(g, area.width.saturating_sub(3) as usize)).style(style)
        })
        .collect();

    let title = if searching { " search " } else { " groups " };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::RIGHT)
            .border_style(Style::default().fg(theme::C_MUTED))
            .title(Span::styled(title, theme::style_secondary())),
    );
    frame.render_widget(list, area);
}

fn draw_channel_list(frame: &mut Frame, area: Rect, state: &ZapState, menu: &mut MenuView) {
    let visible = state.catalog.visible();
    let playing_url = state.playing.as_ref().map(|c| c.url.as_str());
    let name_width = area.width.saturating_sub(8) as usize;

    let items: Vec<ListItem> = visible
        .iter()
        .map(|c| {
            let style = if Some(c.url.as_str()) == playing_url {
                theme::style_playing()
            } else {
                theme::style_default()
            };
            let line = Line::from(vec![
                Span::styled(format!("{:>4} ", c.id), theme::style_secondary()),
                Span::styled(truncated(&c.name, name_width), style),
            ]);
            ListItem::new(line)
        })
        .collect();

    if items.is_empty() {
        let msg = if state.loading {
            "loading playlist…"
        } else if state.catalog.is_searching() {
            "no channels match"
        } else {
            "no channels"
        };
        frame.render_widget(
            Paragraph::new(msg)
                .style(theme::style_secondary())
                .alignment(Alignment::Center),
            area,
        );
        return;
    }

    let list = List::new(items).highlight_style(theme::style_selected());
    frame.render_stateful_widget(list, area, &mut menu.list);
}

fn draw_search_bar(frame: &mut Frame, area: Rect, menu: &MenuView) {
    let value = menu.filter.text();
    let line = Line::from(vec![
        Span::styled("/ ", Style::default().fg(theme::C_MUTED)),
        Span::styled(value.to_string(), Style::default().fg(theme::C_FILTER_FG)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
    if menu.filter.active {
        let cursor_x = area.x + 2 + value.width() as u16;
        frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(1)), area.y));
    }
}

fn draw_key_hints(frame: &mut Frame, area: Rect, state: &ZapState) {
    let controls = if state.controls_enabled { "on" } else { "off" };
    let hints = format!(
        " ↑↓ select  ←→ group  ⏎ tune  / search  r reload  v controls:{}  q quit",
        controls
    );
    frame.render_widget(
        Paragraph::new(hints).style(theme::style_secondary()),
        area,
    );
}

// ── playback surface ──────────────────────────────────────────────────────────

/// Which layer the bottom bar renders.  The progress bar takes visual
/// priority over the info banner; both hide timers keep running
/// underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarLayer {
    Info,
    Progress,
}

fn bar_layer(state: &ZapState) -> Option<BarLayer> {
    if !state.player_bar_visible() {
        None
    } else if state.progress_visible {
        Some(BarLayer::Progress)
    } else {
        Some(BarLayer::Info)
    }
}

fn draw_playback_surface(frame: &mut Frame, area: Rect, state: &ZapState) {
    match bar_layer(state) {
        Some(layer) => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(1)])
                .split(area);
            draw_player_bar(frame, rows[1], state, layer);
        }
        None if area.height > 0 => {
            // A single muted hint so a fresh screen is not a dead end.
            let hint = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
            frame.render_widget(
                Paragraph::new(" m menu").style(Style::default().fg(theme::C_MUTED)),
                hint,
            );
        }
        None => {}
    }
}

fn draw_player_bar(frame: &mut Frame, area: Rect, state: &ZapState, layer: BarLayer) {
    let Some(playing) = &state.playing else {
        return;
    };

    match layer {
        BarLayer::Progress => {
            let (ratio, label) = match (state.time_pos_secs, state.duration_secs) {
                (Some(pos), Some(dur)) if dur > 0.0 => (
                    (pos / dur).clamp(0.0, 1.0),
                    format!("{} / {}", format_time(pos), format_time(dur)),
                ),
                (Some(pos), _) => (0.0, format_time(pos)),
                _ => (0.0, "--:--".to_string()),
            };
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(theme::C_ACCENT).bg(theme::C_BADGE_BG))
                .ratio(ratio)
                .label(label);
            frame.render_widget(gauge, area);
        }
        BarLayer::Info => {
            let info = Line::from(vec![
                Span::styled(
                    format!(" {} ", playing.id),
                    Style::default().fg(theme::C_ACCENT).bg(theme::C_BADGE_BG),
                ),
                Span::raw(" "),
                Span::styled(playing.name.clone(), theme::style_default()),
                Span::styled(format!("  {}", playing.group), theme::style_secondary()),
            ]);
            frame.render_widget(Paragraph::new(info), area);
        }
    }
}

// ── number buffer badge ───────────────────────────────────────────────────────

fn draw_number_badge(frame: &mut Frame, area: Rect, state: &ZapState) {
    if state.number_buffer.is_empty() {
        return;
    }
    let text = format!(" {} ", state.number_buffer);
    let w = text.width() as u16;
    if area.width < w + 1 {
        return;
    }
    let badge = Rect::new(area.x + area.width - w - 1, area.y, w, 1);
    frame.render_widget(
        Paragraph::new(text).style(
            Style::default()
                .fg(theme::C_ACCENT)
                .bg(theme::C_BADGE_BG),
        ),
        badge,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use zap_proto::playlist::Channel;

    fn playing_state() -> ZapState {
        ZapState {
            menu_visible: false,
            playing: Some(Channel {
                id: "1".into(),
                name: "News One".into(),
                group: "News".into(),
                url: "http://x/1".into(),
            }),
            ..ZapState::default()
        }
    }

    #[test]
    fn test_progress_layer_replaces_info_row() {
        let mut state = playing_state();
        state.info_visible = true;
        assert_eq!(bar_layer(&state), Some(BarLayer::Info));

        // Both overlays up: only the progress layer renders.
        state.progress_visible = true;
        assert_eq!(bar_layer(&state), Some(BarLayer::Progress));

        // Info timer expiring first changes nothing visually.
        state.info_visible = false;
        assert_eq!(bar_layer(&state), Some(BarLayer::Progress));

        state.progress_visible = false;
        assert_eq!(bar_layer(&state), None);
    }

    #[test]
    fn test_no_bar_while_menu_is_open() {
        let mut state = playing_state();
        state.info_visible = true;
        state.menu_visible = true;
        assert_eq!(bar_layer(&state), None);

        // The progress layer still wins over the menu gate.
        state.progress_visible = true;
        assert_eq!(bar_layer(&state), Some(BarLayer::Progress));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(59.9), "00:59");
        assert_eq!(format_time(65.0), "01:05");
        assert_eq!(format_time(3671.0), "61:11");
        assert_eq!(format_time(-5.0), "00:00");
    }

    #[test]
    fn test_truncated_respects_width() {
        assert_eq!(truncated("short", 10), "short");
        let t = truncated("a rather long channel name", 10);
        assert!(t.width() <= 10);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn test_menu_selection_clamps() {
        let mut m = MenuView::default();
        m.list.select(Some(9));
        m.clamp_selection(4);
        assert_eq!(m.list.selected(), Some(3));
        m.clamp_selection(0);
        assert_eq!(m.list.selected(), None);
    }

    #[test]
    fn test_filter_esc_clears_then_closes() {
        let mut f = FilterInput::default();
        f.activate();
        f.handle_key(KeyEvent::from(KeyCode::Char('a')));
        assert_eq!(f.text(), "a");

        match f.handle_key(KeyEvent::from(KeyCode::Esc)) {
            FilterAction::Changed(s) => assert!(s.is_empty()),
            _ => panic!("first Esc should clear"),
        }
        assert!(f.active);

        match f.handle_key(KeyEvent::from(KeyCode::Esc)) {
            FilterAction::Cancelled => {}
            _ => panic!("second Esc should cancel"),
        }
        assert!(!f.active);
    }
}
