//! Remote-key routing for the playback surface (menu hidden).
//!
//! Two key maps exist, switched by the controls-enabled flag:
//! - controls on: arrows seek, Enter/Space toggles pause, channel
//!   up/down rides the vertical axis;
//! - controls off: every directional key zaps, Enter opens the menu.
//!
//! Digits win in both modes so numeric channel entry always works.
//! Keys pressed while the menu is open never reach this router; the
//! menu handles them itself.

use ratatui::crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Digit(char),
    /// Relative seek in whole seconds.
    SeekBy(i64),
    TogglePause,
    ZapNext,
    ZapPrev,
    OpenMenu,
}

pub fn route(code: KeyCode, controls_enabled: bool) -> Option<RouteAction> {
    if let KeyCode::Char(c) = code {
        if c.is_ascii_digit() {
            return Some(RouteAction::Digit(c));
        }
    }

    if controls_enabled {
        match code {
            KeyCode::Right => Some(RouteAction::SeekBy(10)),
            KeyCode::Left => Some(RouteAction::SeekBy(-10)),
            KeyCode::Enter | KeyCode::Char(' ') => Some(RouteAction::TogglePause),
            KeyCode::Up | KeyCode::PageUp => Some(RouteAction::ZapNext),
            KeyCode::Down | KeyCode::PageDown => Some(RouteAction::ZapPrev),
            KeyCode::Char('m') | KeyCode::Esc => Some(RouteAction::OpenMenu),
            _ => None,
        }
    } else {
        match code {
            KeyCode::Up | KeyCode::Right | KeyCode::PageUp => Some(RouteAction::ZapNext),
            KeyCode::Down | KeyCode::Left | KeyCode::PageDown => Some(RouteAction::ZapPrev),
            KeyCode::Enter | KeyCode::Char('m') | KeyCode::Esc => Some(RouteAction::OpenMenu),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_win_in_both_modes() {
        for enabled in [true, false] {
            assert_eq!(
                route(KeyCode::Char('5'), enabled),
                Some(RouteAction::Digit('5'))
            );
            assert_eq!(
                route(KeyCode::Char('0'), enabled),
                Some(RouteAction::Digit('0'))
            );
        }
    }

    #[test]
    fn test_controls_on_maps_transport_keys() {
        assert_eq!(route(KeyCode::Right, true), Some(RouteAction::SeekBy(10)));
        assert_eq!(route(KeyCode::Left, true), Some(RouteAction::SeekBy(-10)));
        assert_eq!(route(KeyCode::Enter, true), Some(RouteAction::TogglePause));
        assert_eq!(
            route(KeyCode::Char(' '), true),
            Some(RouteAction::TogglePause)
        );
        assert_eq!(route(KeyCode::Up, true), Some(RouteAction::ZapNext));
        assert_eq!(route(KeyCode::Down, true), Some(RouteAction::ZapPrev));
    }

    #[test]
    fn test_controls_off_every_direction_zaps() {
        assert_eq!(route(KeyCode::Up, false), Some(RouteAction::ZapNext));
        assert_eq!(route(KeyCode::Right, false), Some(RouteAction::ZapNext));
        assert_eq!(route(KeyCode::Down, false), Some(RouteAction::ZapPrev));
        assert_eq!(route(KeyCode::Left, false), Some(RouteAction::ZapPrev));
        assert_eq!(route(KeyCode::Enter, false), Some(RouteAction::OpenMenu));
    }

    #[test]
    fn test_menu_key_works_in_both_modes() {
        for enabled in [true, false] {
            assert_eq!(
                route(KeyCode::Char('m'), enabled),
                Some(RouteAction::OpenMenu)
            );
            assert_eq!(route(KeyCode::Esc, enabled), Some(RouteAction::OpenMenu));
        }
    }

    #[test]
    fn test_unmapped_keys_fall_through() {
        assert_eq!(route(KeyCode::Char('x'), true), None);
        assert_eq!(route(KeyCode::Tab, false), None);
    }
}
