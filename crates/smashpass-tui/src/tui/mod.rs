// Terminal front end: input handling and screen rendering.
//
// The TUI owns a `ViewState` holding the latest session snapshot. The app
// orchestrator pushes `UiUpdate` messages over an mpsc channel; the TUI
// applies them to `ViewState` and re-renders at ~30 fps. Key presses are
// mapped to `UserCommand`s and sent back over `cmd_tx`.

pub mod input;
pub mod screens;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use smashpass_core::protocol::{SessionView, UiUpdate, UserCommand};

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local mirror of the session, replaced wholesale on every snapshot.
#[derive(Debug, Default)]
pub struct ViewState {
    /// `None` until the orchestrator sends its first snapshot.
    pub view: Option<SessionView>,
}

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Snapshot(view) => {
            state.view = Some(*view);
        }
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop until the user quits or the app goes away.
///
/// Initializes the terminal, installs a panic hook that restores it, then
/// selects over UI updates, keyboard input and render ticks.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    // Channel closed: app is shutting down
                    None => break Ok(()),
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, view_state.view.as_ref()) {
                            debug!("Key {:?} -> {:?}", key_event.code, cmd);
                            let quit = cmd == UserCommand::Quit;
                            if cmd_tx.send(cmd).await.is_err() || quit {
                                break Ok(());
                            }
                        }
                    }
                    // Mouse and resize events; resize is picked up by the next draw.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(anyhow::Error::from(e).context("terminal input error")),
                    None => break Ok(()),
                }
            }

            _ = render_tick.tick() => {
                if let Err(e) = terminal.draw(|frame| screens::render_frame(frame, &view_state)) {
                    break Err(anyhow::Error::from(e).context("failed to draw frame"));
                }
            }
        }
    };

    ratatui::restore();
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use smashpass_core::protocol::{Decision, PlayerStats, Screen};

    fn snapshot(screen: Screen, cursor: usize) -> UiUpdate {
        UiUpdate::Snapshot(Box::new(SessionView {
            session: 1,
            screen,
            item: None,
            cursor,
            total: 10,
            pending_decision: Decision::Undecided,
            last_decision: Decision::Undecided,
            loading: true,
            feed_error: None,
            player_stats: PlayerStats::default(),
        }))
    }

    #[test]
    fn view_state_starts_empty() {
        assert!(ViewState::default().view.is_none());
    }

    #[test]
    fn snapshot_replaces_view() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, snapshot(Screen::Playing, 0));
        apply_ui_update(&mut state, snapshot(Screen::GameOver, 9));

        let view = state.view.unwrap();
        assert_eq!(view.screen, Screen::GameOver);
        assert_eq!(view.cursor, 9);
    }
}
