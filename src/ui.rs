pub mod screen;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, AppState},
    round::{Outcome, RoundState},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
/// Countdown turns red at or below this many seconds
const LOW_TIME_SECS: u32 = 5;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

fn outcome_style(outcome: Outcome) -> Style {
    match outcome {
        Outcome::Correct => bold().fg(Color::Green),
        Outcome::Incorrect => bold().fg(Color::Red),
        Outcome::TimedOut => bold().fg(Color::Yellow),
    }
}

fn player_line(app: &App) -> Line<'static> {
    match app.identity.player() {
        Some(player) => {
            let name = app
                .identity
                .username()
                .map(str::to_string)
                .unwrap_or_else(|| player.abbreviated());
            Line::from(vec![
                Span::styled("player ", dim()),
                Span::styled(name, bold().fg(Color::Cyan)),
            ])
        }
        None => Line::from(Span::styled(
            "not signed in, scores will not be saved (ctrl+p to sign in)",
            italic().fg(Color::Yellow),
        )),
    }
}

fn warning_line(app: &App) -> Line<'static> {
    match &app.warning {
        Some(warning) => Line::from(Span::styled(warning.clone(), italic().fg(Color::Yellow))),
        None => Line::default(),
    }
}

pub fn render_game(app: &App, f: &mut Frame) {
    let area = f.area();
    let ctrl = &app.controller;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // player
            Constraint::Length(1), // streak and session tally
            Constraint::Min(1),    // padding
            Constraint::Length(1), // status / countdown
            Constraint::Length(1), // padding
            Constraint::Length(1), // input
            Constraint::Length(1), // result message
            Constraint::Min(1),    // padding
            Constraint::Length(1), // warning
            Constraint::Length(1), // legend
        ])
        .split(area);

    f.render_widget(Paragraph::new(player_line(app)), chunks[0]);

    let streak = ctrl.streak();
    let mut tally_spans = vec![
        Span::styled(format!("streak {}", streak.current()), bold().fg(Color::Magenta)),
        Span::styled(format!("   best {}", streak.best()), dim()),
        Span::styled(format!("   session {}", app.tally.summary_line()), dim()),
    ];
    if let Some(rank) = app.identity.player().and_then(|p| app.feed.rank_of(p)) {
        tally_spans.push(Span::styled(format!("   rank #{}", rank), dim()));
    }
    f.render_widget(Paragraph::new(Line::from(tally_spans)), chunks[1]);

    let status = match ctrl.state() {
        RoundState::Idle => Span::styled("press enter to hear a word", italic()),
        RoundState::Speaking => Span::styled("listen...", italic().fg(Color::Cyan)),
        RoundState::Awaiting => {
            let secs = ctrl.remaining_secs();
            let style = if secs <= LOW_TIME_SECS {
                bold().fg(Color::Red)
            } else {
                bold()
            };
            Span::styled(format!("{}s", secs), style)
        }
        RoundState::Resolved => Span::styled("press enter for the next word", italic()),
    };
    f.render_widget(
        Paragraph::new(Line::from(status)).alignment(Alignment::Center),
        chunks[3],
    );

    let input = ctrl.input();
    let input_line = match ctrl.state() {
        RoundState::Awaiting => Line::from(vec![
            Span::styled(input.to_string(), bold()),
            Span::styled("_", dim().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        RoundState::Resolved => Line::from(Span::styled(input.to_string(), dim())),
        _ => Line::default(),
    };
    f.render_widget(
        Paragraph::new(input_line).alignment(Alignment::Center),
        chunks[5],
    );

    if ctrl.state() == RoundState::Resolved {
        if let Some(resolution) = &app.last_resolution {
            let message = Paragraph::new(Span::styled(
                resolution.message(),
                outcome_style(resolution.outcome),
            ))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            f.render_widget(message, chunks[6]);
        }
    }

    f.render_widget(Paragraph::new(warning_line(app)), chunks[8]);

    let legend = match ctrl.state() {
        RoundState::Awaiting => "(enter) submit / (ctrl+r) replay / (ctrl+u) clear / (esc)ape",
        _ => "(enter) play / (ctrl+l) leaderboard / (ctrl+s) stats / (ctrl+p) sign in / (esc)ape",
    };
    f.render_widget(Paragraph::new(Span::styled(legend, italic())), chunks[9]);
}

pub fn render_leaderboard(app: &App, f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let me = app.identity.player();
    let rows: Vec<Row> = app
        .feed
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let style = if Some(&entry.player_id) == me {
                bold().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(format!("{}", idx + 1)),
                Cell::from(entry.display_name()),
                Cell::from(entry.score.to_string()),
            ])
            .style(style)
        })
        .collect();

    let title = if app.feed.is_loading() {
        " Leaderboard (refreshing) "
    } else {
        " Leaderboard "
    };

    if rows.is_empty() {
        let empty = Paragraph::new(Span::styled("no scores yet", italic()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, chunks[0]);
    } else {
        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(12),
                Constraint::Length(8),
            ],
        )
        .header(Row::new(vec!["#", "player", "streak"]).style(bold().fg(Color::Yellow)))
        .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(table, chunks[0]);
    }

    f.render_widget(Paragraph::new(warning_line(app)), chunks[1]);
    f.render_widget(
        Paragraph::new(Span::styled("(r)efresh / (esc) back", italic())),
        chunks[2],
    );
}

pub fn render_stats(app: &App, f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(8),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let Some(view) = &app.stats_view else {
        let unavailable = Paragraph::new(Span::styled("no stats available", italic()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Stats "));
        f.render_widget(unavailable, area);
        return;
    };

    let summary = &view.summary;
    let last_played = summary
        .last_played
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    let avg_answer = summary
        .avg_answer_ms
        .map(|ms| format!("{:.1}s", ms / 1000.0))
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled("rounds      ", dim()),
            Span::styled(summary.rounds.to_string(), bold()),
        ]),
        Line::from(vec![
            Span::styled("correct     ", dim()),
            Span::styled(
                format!("{} ({:.0}%)", summary.correct, summary.accuracy()),
                bold().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::styled("timed out   ", dim()),
            Span::styled(summary.timed_out.to_string(), bold()),
        ]),
        Line::from(vec![
            Span::styled("best streak ", dim()),
            Span::styled(summary.best_streak.to_string(), bold().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            Span::styled("avg answer  ", dim()),
            Span::styled(avg_answer, bold()),
        ]),
        Line::from(vec![
            Span::styled("last played ", dim()),
            Span::styled(last_played, bold()),
        ]),
    ];
    let title = format!(" Stats for {} ", view.player);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        chunks[0],
    );

    let missed: Vec<Row> = view
        .most_missed
        .iter()
        .map(|(word, misses)| Row::new(vec![word.clone(), misses.to_string()]))
        .collect();
    let table = Table::new(missed, [Constraint::Min(12), Constraint::Length(8)])
        .header(Row::new(vec!["word", "misses"]).style(bold().fg(Color::Yellow)))
        .block(Block::default().borders(Borders::ALL).title(" Most missed "));
    f.render_widget(table, chunks[1]);

    f.render_widget(
        Paragraph::new(Span::styled("(esc) back  (ctrl-x) clear history", italic())),
        chunks[2],
    );
}

/// Centered box of `width` x `height` inside `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub fn render_sign_in(app: &App, f: &mut Frame) {
    let input = &app.sign_in_input;
    let width = (input.width() as u16 + 6).max(48);
    let area = centered(f.area(), width, 5);

    let lines = vec![
        Line::from(vec![
            Span::styled(input.clone(), bold()),
            Span::styled("_", dim()),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "player id, optional name; empty signs out",
            italic(),
        )),
    ];
    let prompt = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Sign in (enter / esc) "),
    );
    f.render_widget(prompt, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::leaderboard::LeaderboardFeed;
    use crate::round::{NoticeLog, RoundController};
    use crate::stats::StatsDb;
    use crate::store::MemoryStore;
    use crate::timer::ManualScheduler;
    use crate::words::WordList;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use std::time::Duration;

    fn app(identity: Identity) -> App {
        let store = Arc::new(MemoryStore::new());
        let controller = RoundController::new(
            WordList::new(vec!["galaxy".to_string()]),
            Box::new(ManualScheduler::new()),
            Box::new(NoticeLog::new()),
        );
        let feed = LeaderboardFeed::inline(store, Duration::from_secs(15), 10);
        App::new(controller, feed, identity, Some(StatsDb::in_memory().unwrap()))
    }

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| draw(app, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn idle_game_screen_prompts_sign_in() {
        let text = rendered(&app(Identity::anonymous()));
        assert!(text.contains("press enter to hear a word"));
        assert!(text.contains("not signed in"));
    }

    #[test]
    fn speaking_never_shows_the_word() {
        let mut app = app(Identity::resolve(Some("p1")));
        app.controller.start_round().unwrap();
        let text = rendered(&app);
        assert!(!text.contains("galaxy"));
    }

    #[test]
    fn every_screen_renders() {
        let mut app = app(Identity::anonymous());
        for state in [
            AppState::Game,
            AppState::Leaderboard,
            AppState::Stats,
            AppState::SignIn,
        ] {
            app.state = state;
            assert!(!rendered(&app).trim().is_empty());
        }
    }

    #[test]
    fn centered_box_fits_small_areas() {
        let area = Rect::new(0, 0, 20, 4);
        let inner = centered(area, 48, 5);
        assert_eq!(inner.width, 20);
        assert_eq!(inner.height, 4);
    }
}
