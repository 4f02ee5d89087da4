// Library surface shared by the binary and the integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod identity;
pub mod leaderboard;
pub mod logging;
pub mod round;
pub mod runtime;
pub mod server;
pub mod session;
pub mod sound;
pub mod speech;
pub mod stats;
pub mod store;
pub mod submit;
pub mod timer;
pub mod ui;
pub mod words;
