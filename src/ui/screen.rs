use ratatui::Frame;

use crate::{
    app::{App, AppState},
    ui::{render_game, render_leaderboard, render_sign_in, render_stats},
};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Round in progress or between rounds
pub struct GameScreen;

impl Screen for GameScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_game(app, f);
    }
}

pub struct LeaderboardScreen;

impl Screen for LeaderboardScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_leaderboard(app, f);
    }
}

pub struct StatsScreen;

impl Screen for StatsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_stats(app, f);
    }
}

/// Sign-in prompt drawn on its own
pub struct SignInScreen;

impl Screen for SignInScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_sign_in(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Game => Box::new(GameScreen),
        AppState::Leaderboard => Box::new(LeaderboardScreen),
        AppState::Stats => Box::new(StatsScreen),
        AppState::SignIn => Box::new(SignInScreen),
    }
}
