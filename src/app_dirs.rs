use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "wordmint";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/wordmint`, or the platform data dir without a HOME
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join(APP_NAME),
            )
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("wordmint_config.json"))
    }

    fn state_file(name: &str) -> PathBuf {
        Self::state_dir()
            .map(|dir| dir.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }

    /// Per-round history used by the stats screen
    pub fn db_path() -> PathBuf {
        Self::state_file("stats.db")
    }

    pub fn leaderboard_path() -> PathBuf {
        Self::state_file("leaderboard.json")
    }

    pub fn leaderboard_db_path() -> PathBuf {
        Self::state_file("leaderboard.db")
    }

    /// The TUI owns stdout, so its log goes here
    pub fn log_path() -> PathBuf {
        Self::state_file("wordmint.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_files_share_a_directory() {
        let db = AppDirs::db_path();
        let board = AppDirs::leaderboard_path();
        assert_eq!(db.parent(), board.parent());
        assert_eq!(board.file_name().unwrap(), "leaderboard.json");
        assert_eq!(AppDirs::leaderboard_db_path().extension().unwrap(), "db");
    }

    #[test]
    fn config_lives_in_config_json() {
        assert_eq!(AppDirs::config_path().file_name().unwrap(), "config.json");
    }
}
