// Keyboard input handling.
//
// Translates crossterm key events into `UserCommand`s for the orchestrator.
// Which keys do anything depends on the screen in the latest snapshot.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use smashpass_core::protocol::{Decision, Screen, SessionView, UserCommand};

/// Map a key press to a command, or `None` if it means nothing right now.
pub fn handle_key(key_event: KeyEvent, view: Option<&SessionView>) -> Option<UserCommand> {
    // Only process key press events. On Windows, crossterm emits both
    // Press and Release events for each physical keypress.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL)
        && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }
    if key_event.code == KeyCode::Char('q') {
        return Some(UserCommand::Quit);
    }

    let view = view?;

    if view.feed_error.is_some() && key_event.code == KeyCode::Char('r') {
        return Some(UserCommand::RetryFeed);
    }

    match view.screen {
        Screen::Playing => match key_event.code {
            KeyCode::Char('s') | KeyCode::Char('l') | KeyCode::Right => {
                Some(UserCommand::Decide(Decision::Smash))
            }
            KeyCode::Char('p') | KeyCode::Char('h') | KeyCode::Left => {
                Some(UserCommand::Decide(Decision::Pass))
            }
            _ => None,
        },
        Screen::Confirming => match key_event.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(UserCommand::Confirm(true)),
            KeyCode::Char('n') | KeyCode::Esc => Some(UserCommand::Confirm(false)),
            _ => None,
        },
        Screen::ShowingResult => match key_event.code {
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('n') => {
                Some(UserCommand::Advance)
            }
            KeyCode::Char('t') => Some(UserCommand::OpenStats),
            _ => None,
        },
        Screen::ShowingYourStats { .. } => match key_event.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('t') => Some(UserCommand::CloseStats),
            _ => None,
        },
        Screen::GameOver => match key_event.code {
            KeyCode::Char('t') => Some(UserCommand::OpenStats),
            KeyCode::Char('g') => Some(UserCommand::NewGame),
            _ => None,
        },
    }
}

/// Key hints shown in the footer for the given screen.
pub fn hints(screen: Screen) -> &'static str {
    match screen {
        Screen::Playing => "[s/→] smash  [p/←] pass  [q] quit",
        Screen::Confirming => "[y/Enter] confirm  [n/Esc] cancel",
        Screen::ShowingResult => "[Enter] next  [t] your stats  [q] quit",
        Screen::ShowingYourStats { .. } => "[Enter/Esc] close",
        Screen::GameOver => "[t] your stats  [g] new game  [q] quit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use smashpass_core::protocol::{PlayerStats, StatsOrigin};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn view_on(screen: Screen) -> SessionView {
        SessionView {
            session: 1,
            screen,
            item: None,
            cursor: 0,
            total: 10,
            pending_decision: Decision::Undecided,
            last_decision: Decision::Undecided,
            loading: false,
            feed_error: None,
            player_stats: PlayerStats::default(),
        }
    }

    #[test]
    fn quit_works_without_a_session() {
        assert_eq!(handle_key(press(KeyCode::Char('q')), None), Some(UserCommand::Quit));
        let ctrl_c = KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..press(KeyCode::Char('c'))
        };
        assert_eq!(handle_key(ctrl_c, None), Some(UserCommand::Quit));
        assert_eq!(handle_key(press(KeyCode::Char('s')), None), None);
    }

    #[test]
    fn release_events_are_ignored() {
        let release = KeyEvent {
            kind: KeyEventKind::Release,
            ..press(KeyCode::Char('q'))
        };
        assert_eq!(handle_key(release, None), None);
    }

    #[test]
    fn playing_keys_make_decisions() {
        let view = view_on(Screen::Playing);
        assert_eq!(
            handle_key(press(KeyCode::Char('s')), Some(&view)),
            Some(UserCommand::Decide(Decision::Smash))
        );
        assert_eq!(
            handle_key(press(KeyCode::Left), Some(&view)),
            Some(UserCommand::Decide(Decision::Pass))
        );
        assert_eq!(handle_key(press(KeyCode::Enter), Some(&view)), None);
    }

    #[test]
    fn confirming_keys_confirm_or_cancel() {
        let view = view_on(Screen::Confirming);
        assert_eq!(
            handle_key(press(KeyCode::Char('y')), Some(&view)),
            Some(UserCommand::Confirm(true))
        );
        assert_eq!(
            handle_key(press(KeyCode::Esc), Some(&view)),
            Some(UserCommand::Confirm(false))
        );
        assert_eq!(handle_key(press(KeyCode::Char('s')), Some(&view)), None);
    }

    #[test]
    fn result_keys_advance_or_open_stats() {
        let view = view_on(Screen::ShowingResult);
        assert_eq!(
            handle_key(press(KeyCode::Enter), Some(&view)),
            Some(UserCommand::Advance)
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('t')), Some(&view)),
            Some(UserCommand::OpenStats)
        );
    }

    #[test]
    fn stats_and_game_over_keys() {
        let stats = view_on(Screen::ShowingYourStats {
            origin: StatsOrigin::GameOver,
        });
        assert_eq!(
            handle_key(press(KeyCode::Esc), Some(&stats)),
            Some(UserCommand::CloseStats)
        );

        let over = view_on(Screen::GameOver);
        assert_eq!(
            handle_key(press(KeyCode::Char('g')), Some(&over)),
            Some(UserCommand::NewGame)
        );
        assert_eq!(handle_key(press(KeyCode::Enter), Some(&over)), None);
    }

    #[test]
    fn retry_only_offered_when_feed_failed() {
        let mut view = view_on(Screen::Playing);
        assert_eq!(handle_key(press(KeyCode::Char('r')), Some(&view)), None);
        view.feed_error = Some("timeout".into());
        assert_eq!(
            handle_key(press(KeyCode::Char('r')), Some(&view)),
            Some(UserCommand::RetryFeed)
        );
    }
}
