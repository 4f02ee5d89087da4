use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PLAYER_ENV: &str = "WORDMINT_PLAYER";

#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("player id must not be empty")]
    Empty,
    #[error("player id must not contain control characters")]
    ControlCharacter,
}

/// Stable player identifier (account id, wallet address or chosen handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(IdentityError::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `abcd...wxyz` for ids longer than 10 characters
    pub fn abbreviated(&self) -> String {
        abbreviate(&self.0)
    }
}

pub fn abbreviate(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        id.to_string()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

/// Emitted whenever the signed-in player changes
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityChange {
    SignedIn(PlayerId),
    SignedOut,
}

impl IdentityChange {
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            IdentityChange::SignedIn(id) => Some(id.clone()),
            IdentityChange::SignedOut => None,
        }
    }
}

/// Current player for this session, if any
#[derive(Debug, Clone, Default)]
pub struct Identity {
    player: Option<PlayerId>,
    username: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(player: PlayerId) -> Self {
        Self {
            player: Some(player),
            username: None,
        }
    }

    /// First valid candidate wins: explicit value, then `WORDMINT_PLAYER`
    pub fn resolve(explicit: Option<&str>) -> Self {
        let from_env = std::env::var(PLAYER_ENV).ok();
        explicit
            .into_iter()
            .chain(from_env.as_deref())
            .find_map(|raw| PlayerId::parse(raw).ok())
            .map(Self::signed_in)
            .unwrap_or_default()
    }

    pub fn player(&self) -> Option<&PlayerId> {
        self.player.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
    }

    pub fn is_signed_in(&self) -> bool {
        self.player.is_some()
    }

    /// Returns a change only when the player actually differs
    pub fn sign_in(&mut self, raw: &str) -> Result<Option<IdentityChange>, IdentityError> {
        let id = PlayerId::parse(raw)?;
        if self.player.as_ref() == Some(&id) {
            return Ok(None);
        }
        self.player = Some(id.clone());
        self.username = None;
        Ok(Some(IdentityChange::SignedIn(id)))
    }

    pub fn sign_out(&mut self) -> Option<IdentityChange> {
        self.username = None;
        self.player.take().map(|_| IdentityChange::SignedOut)
    }
}
