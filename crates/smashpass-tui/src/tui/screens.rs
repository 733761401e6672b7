// Screen rendering.
//
// One function per session screen, drawn into the main area between a
// status bar and a help bar. The confirmation step is a modal over the
// item card.

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use serde_json::Value;

use smashpass_core::protocol::{Decision, ItemView, Screen, SessionView};

use super::input::hints;
use super::ViewState;

const DIALOG_WIDTH: u16 = 36;
const DIALOG_HEIGHT: u16 = 5;

/// Profile keys already used for the card title.
const TITLE_KEYS: [&str; 3] = ["name", "title", "username"];

/// Render the complete frame for the current view.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let [status_bar, main, help_bar] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let Some(view) = state.view.as_ref() else {
        let paragraph = Paragraph::new("Connecting...").block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Smash or Pass "),
        );
        frame.render_widget(paragraph, main);
        render_help_bar(frame, help_bar, " q:Quit");
        return;
    };

    render_status_bar(frame, status_bar, view);

    match view.screen {
        Screen::Playing => render_item(frame, main, view),
        Screen::Confirming => {
            render_item(frame, main, view);
            render_confirm(frame, main, view.pending_decision);
        }
        Screen::ShowingResult => render_result(frame, main, view),
        Screen::ShowingYourStats { .. } => render_your_stats(frame, main, view),
        Screen::GameOver => render_game_over(frame, main, view),
    }

    let help = if view.feed_error.is_some() {
        format!(" {}  [r] retry", hints(view.screen))
    } else {
        format!(" {}", hints(view.screen))
    };
    render_help_bar(frame, help_bar, &help);
}

fn render_status_bar(frame: &mut Frame, area: Rect, view: &SessionView) {
    let position = if view.total == 0 {
        "-/-".to_string()
    } else {
        format!("{}/{}", (view.cursor + 1).min(view.total), view.total)
    };
    let mut text = format!(
        " Item {} | Smashed {} | Passed {}",
        position, view.player_stats.smashed, view.player_stats.passed
    );
    if view.loading {
        text.push_str(" | loading...");
    }

    let mut spans = vec![Span::styled(text, Style::default().fg(Color::White))];
    if let Some(error) = &view.feed_error {
        spans.push(Span::styled(
            format!(" | feed error: {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_help_bar(frame: &mut Frame, area: Rect, text: &str) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text.to_string(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Item card
// ---------------------------------------------------------------------------

fn render_item(frame: &mut Frame, area: Rect, view: &SessionView) {
    let Some(item_view) = view.item.as_ref() else {
        render_loading(frame, area, view);
        return;
    };

    let title = format!(" {} ", item_view.item.display_name());
    let paragraph = Paragraph::new(profile_lines(item_view))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )));
    frame.render_widget(paragraph, area);
}

fn render_loading(frame: &mut Frame, area: Rect, view: &SessionView) {
    let text = match &view.feed_error {
        Some(error) => format!("Could not load the next item: {error}\nPress r to retry."),
        None => "Loading...".to_string(),
    };
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

/// Remaining scalar profile fields as `key: value` lines.
fn profile_lines(item_view: &ItemView) -> Vec<Line<'static>> {
    item_view
        .item
        .profile
        .iter()
        .filter(|(key, _)| !TITLE_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(Line::from(vec![
                Span::styled(format!("{key}: "), Style::default().fg(Color::Cyan)),
                Span::raw(text),
            ]))
        })
        .collect()
}

fn decision_style(decision: Decision) -> Style {
    match decision {
        Decision::Smash => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        Decision::Pass => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Decision::Undecided => Style::default(),
    }
}

// ---------------------------------------------------------------------------
// Confirm modal
// ---------------------------------------------------------------------------

fn render_confirm(frame: &mut Frame, area: Rect, decision: Decision) {
    let dialog_area = centered_rect(DIALOG_WIDTH, DIALOG_HEIGHT, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " Confirm ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));

    let text = Line::from(vec![
        Span::raw("  Really "),
        Span::styled(decision.label().to_uppercase(), decision_style(decision)),
        Span::raw("? ("),
        Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("/"),
        Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw(")"),
    ]);

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}

/// Compute a centered rectangle of the given size within `area`, clamped to
/// the available space.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width);
    let clamped_height = height.min(area.height);

    let vertical = Layout::vertical([Constraint::Length(clamped_height)])
        .flex(Flex::Center)
        .split(area);

    let horizontal = Layout::horizontal([Constraint::Length(clamped_width)])
        .flex(Flex::Center)
        .split(vertical[0]);

    horizontal[0]
}

// ---------------------------------------------------------------------------
// Result, stats and game over
// ---------------------------------------------------------------------------

fn render_result(frame: &mut Frame, area: Rect, view: &SessionView) {
    let Some(item_view) = view.item.as_ref() else {
        render_loading(frame, area, view);
        return;
    };

    let tally = item_view.tally;
    let mut lines = vec![
        Line::from(vec![
            Span::raw("You chose "),
            Span::styled(
                view.last_decision.label().to_uppercase(),
                decision_style(view.last_decision),
            ),
        ]),
        Line::raw(""),
    ];
    match tally.smash_percent() {
        Some(percent) => {
            lines.push(Line::raw(format!(
                "{percent:.0}% smashed, {:.0}% passed",
                100.0 - percent
            )));
            lines.push(Line::raw(format!(
                "{} smashes, {} passes, {} votes",
                tally.smashes, tally.passes, tally.total_votes
            )));
        }
        None => lines.push(Line::raw("No votes yet")),
    }

    let title = format!(" {} ", item_view.item.display_name());
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}

fn render_your_stats(frame: &mut Frame, area: Rect, view: &SessionView) {
    let stats = view.player_stats;
    let mut lines = vec![
        Line::raw(format!("Smashed: {}", stats.smashed)),
        Line::raw(format!("Passed:  {}", stats.passed)),
        Line::raw(format!("Decided: {}", stats.decided())),
    ];
    if stats.decided() > 0 {
        let rate = stats.smashed as f64 * 100.0 / stats.decided() as f64;
        lines.push(Line::raw(""));
        lines.push(Line::raw(format!("You smash {rate:.0}% of the time")));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Your stats "));
    frame.render_widget(paragraph, area);
}

fn render_game_over(frame: &mut Frame, area: Rect, view: &SessionView) {
    let stats = view.player_stats;
    let lines = vec![
        Line::styled("Game over", Style::default().add_modifier(Modifier::BOLD)),
        Line::raw(""),
        Line::raw(format!(
            "You rated {} items: {} smashed, {} passed",
            stats.decided(),
            stats.smashed,
            stats.passed
        )),
    ];
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::{json, Map};
    use smashpass_core::protocol::{Item, ItemId, PlayerStats, StatsOrigin, Tally};

    fn view_on(screen: Screen) -> SessionView {
        let mut profile = Map::new();
        profile.insert("name".into(), json!("Ada"));
        profile.insert("bio".into(), json!("Writes programs"));
        let item = Item {
            id: ItemId::from("ada"),
            smashes: 3,
            passes: 1,
            total_votes: 4,
            profile,
        };
        SessionView {
            session: 1,
            screen,
            item: Some(ItemView {
                tally: item.tally(),
                item,
            }),
            cursor: 0,
            total: 10,
            pending_decision: Decision::Smash,
            last_decision: Decision::Smash,
            loading: false,
            feed_error: None,
            player_stats: PlayerStats {
                smashed: 2,
                passed: 1,
            },
        }
    }

    fn draw(state: &ViewState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|frame| render_frame(frame, state))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn state_for(view: SessionView) -> ViewState {
        ViewState { view: Some(view) }
    }

    #[test]
    fn centered_rect_is_centered() {
        let area = Rect::new(0, 0, 80, 24);
        let result = centered_rect(DIALOG_WIDTH, DIALOG_HEIGHT, area);
        assert_eq!(result.width, DIALOG_WIDTH);
        assert_eq!(result.height, DIALOG_HEIGHT);
        let dx = (result.x + result.width / 2) as i32 - (area.width / 2) as i32;
        let dy = (result.y + result.height / 2) as i32 - (area.height / 2) as i32;
        assert!(dx.unsigned_abs() <= 1);
        assert!(dy.unsigned_abs() <= 1);
    }

    #[test]
    fn centered_rect_clamps_to_small_area() {
        let area = Rect::new(0, 0, 10, 3);
        let result = centered_rect(DIALOG_WIDTH, DIALOG_HEIGHT, area);
        assert!(result.width <= area.width);
        assert!(result.height <= area.height);
    }

    #[test]
    fn render_without_session_does_not_panic() {
        let text = draw(&ViewState::default());
        assert!(text.contains("Connecting"));
    }

    #[test]
    fn playing_shows_item_card() {
        let text = draw(&state_for(view_on(Screen::Playing)));
        assert!(text.contains("Ada"));
        assert!(text.contains("bio: Writes programs"));
        assert!(text.contains("Item 1/10"));
    }

    #[test]
    fn confirming_shows_modal() {
        let text = draw(&state_for(view_on(Screen::Confirming)));
        assert!(text.contains("Really SMASH?"));
    }

    #[test]
    fn result_shows_percentages() {
        let text = draw(&state_for(view_on(Screen::ShowingResult)));
        assert!(text.contains("You chose SMASH"));
        assert!(text.contains("75% smashed, 25% passed"));
    }

    #[test]
    fn result_without_votes() {
        let mut view = view_on(Screen::ShowingResult);
        if let Some(item_view) = view.item.as_mut() {
            item_view.tally = Tally::default();
        }
        let text = draw(&state_for(view));
        assert!(text.contains("No votes yet"));
    }

    #[test]
    fn your_stats_and_game_over_render() {
        let stats = draw(&state_for(view_on(Screen::ShowingYourStats {
            origin: StatsOrigin::Result,
        })));
        assert!(stats.contains("Smashed: 2"));
        assert!(stats.contains("You smash 67% of the time"));

        let over = draw(&state_for(view_on(Screen::GameOver)));
        assert!(over.contains("Game over"));
        assert!(over.contains("You rated 3 items"));
    }

    #[test]
    fn loading_and_feed_error() {
        let mut view = view_on(Screen::Playing);
        view.item = None;
        view.loading = true;
        assert!(draw(&state_for(view.clone())).contains("Loading..."));

        view.feed_error = Some("status 503".into());
        let text = draw(&state_for(view));
        assert!(text.contains("Press r to retry."));
        assert!(text.contains("[r] retry"));
    }
}
