use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::leaderboard::DEFAULT_REFRESH_SECS;
use crate::round::{RoundSettings, DEFAULT_ROUND_SECS};
use crate::store::{StoreKind, LEADERBOARD_LIMIT};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub round_secs: u32,
    pub speech_fallback_ms: u64,
    pub speech_timeout_secs: u64,
    pub leaderboard_refresh_secs: u64,
    pub leaderboard_size: usize,
    pub speech_command: Option<String>,
    pub store: StoreKind,
    pub store_path: Option<PathBuf>,
    pub server_url: String,
    pub word_list_url: Option<String>,
    pub player: Option<String>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            round_secs: DEFAULT_ROUND_SECS,
            speech_fallback_ms: 1500,
            speech_timeout_secs: 10,
            leaderboard_refresh_secs: DEFAULT_REFRESH_SECS,
            leaderboard_size: LEADERBOARD_LIMIT,
            speech_command: None,
            store: StoreKind::File,
            store_path: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            word_list_url: None,
            player: None,
            log_level: None,
        }
    }
}

impl Config {
    pub fn round_settings(&self) -> RoundSettings {
        RoundSettings {
            round_secs: self.round_secs.max(1),
            speech_fallback: Duration::from_millis(self.speech_fallback_ms),
            speech_timeout: Duration::from_secs(self.speech_timeout_secs.max(1)),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.leaderboard_refresh_secs.max(1))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!(
                    "ignoring unreadable config {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
