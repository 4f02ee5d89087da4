use std::time::Duration;

use include_dir::{include_dir, Dir};
use log::{debug, error, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

static LANG_DIR: Dir = include_dir!("src/lang");

const BUILTIN_FILE: &str = "words.json";
const FETCH_TIMEOUT_SECS: u64 = 5;

/// Last resort when the embedded list cannot be read
const EMERGENCY_WORDS: &[&str] = &["galaxy", "rhythm", "library", "volcano", "whisper"];

#[derive(Debug, Error)]
pub enum WordSourceError {
    #[error("word list request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("word list could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("word list is empty")]
    Empty,
    #[error("embedded word list `{0}` is missing")]
    MissingBuiltin(String),
}

#[derive(Deserialize, Clone, Debug)]
struct BundledWords {
    #[allow(dead_code)]
    name: String,
    words: Vec<String>,
}

/// Accepted shapes for a remote list: a bare array or `{"words": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteWords {
    Plain(Vec<String>),
    Wrapped { words: Vec<String> },
}

/// Ordered candidate words for rounds
#[derive(Debug, Clone, PartialEq)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// Wrap an already-clean list. May be empty; the round controller
    /// refuses to start rounds from an empty list.
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    /// The list compiled into the binary
    pub fn builtin() -> Self {
        match read_builtin(BUILTIN_FILE) {
            Ok(list) => list,
            Err(e) => {
                error!("{}", e);
                Self::new(EMERGENCY_WORDS.iter().map(|w| w.to_string()).collect())
            }
        }
    }

    /// Parse a remote payload, keeping lowercase alphabetic words only
    pub fn from_json(body: &str) -> Result<Self, WordSourceError> {
        let words = match serde_json::from_str::<RemoteWords>(body)? {
            RemoteWords::Plain(words) | RemoteWords::Wrapped { words } => words,
        };

        let cleaned: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty() && w.chars().all(|c| c.is_alphabetic()))
            .collect();

        if cleaned.is_empty() {
            return Err(WordSourceError::Empty);
        }
        Ok(Self::new(cleaned))
    }

    /// Download a list from a public word-list endpoint
    pub fn fetch(url: &str) -> Result<Self, WordSourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        let body = client.get(url).send()?.error_for_status()?.text()?;
        Self::from_json(&body)
    }

    /// Remote list when configured and healthy, built-in list otherwise.
    /// The second element carries a warning for the UI when falling back.
    pub fn load(url: Option<&str>) -> (Self, Option<String>) {
        let Some(url) = url else {
            return (Self::builtin(), None);
        };

        match Self::fetch(url) {
            Ok(list) => {
                debug!("loaded {} words from {}", list.len(), url);
                (list, None)
            }
            Err(e) => {
                warn!("falling back to built-in words: {}", e);
                (
                    Self::builtin(),
                    Some(format!("Word list unavailable ({}), using built-in words", e)),
                )
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Uniform pick with replacement; consecutive rounds may repeat a word
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.words.choose(rng).map(String::as_str)
    }
}

fn read_builtin(file_name: &str) -> Result<WordList, WordSourceError> {
    let contents = LANG_DIR
        .get_file(file_name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| WordSourceError::MissingBuiltin(file_name.to_string()))?;

    let bundled: BundledWords = serde_json::from_str(contents)?;
    if bundled.words.is_empty() {
        return Err(WordSourceError::Empty);
    }
    Ok(WordList::new(bundled.words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn builtin_list_is_playable() {
        let list = WordList::builtin();
        assert!(!list.is_empty());
        assert!(list
            .words()
            .iter()
            .all(|w| w.chars().all(|c| c.is_ascii_lowercase())));
    }

    #[test]
    fn read_missing_builtin_file() {
        let result = read_builtin("nonexistent.json");
        assert!(matches!(result, Err(WordSourceError::MissingBuiltin(_))));
    }

    #[test]
    fn from_json_accepts_plain_array() {
        let list = WordList::from_json(r#"["Hello", " world ", "x-ray", "", "42"]"#).unwrap();
        assert_eq!(list.words(), &["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn from_json_accepts_wrapped_object() {
        let list = WordList::from_json(r#"{"words": ["apple", "banana"]}"#).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn from_json_rejects_empty_or_garbage() {
        assert!(matches!(
            WordList::from_json("[]"),
            Err(WordSourceError::Empty)
        ));
        assert!(matches!(
            WordList::from_json(r#"["123", "!!"]"#),
            Err(WordSourceError::Empty)
        ));
        assert!(matches!(
            WordList::from_json("not json"),
            Err(WordSourceError::Parse(_))
        ));
    }

    #[test]
    fn load_without_url_uses_builtin() {
        let (list, warning) = WordList::load(None);
        assert_eq!(list, WordList::builtin());
        assert!(warning.is_none());
    }

    #[test]
    fn load_with_unreachable_url_falls_back() {
        let (list, warning) = WordList::load(Some("http://127.0.0.1:9/words.json"));
        assert!(!list.is_empty());
        assert!(warning.is_some());
    }

    #[test]
    fn choose_from_empty_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(WordList::new(vec![]).choose(&mut rng).is_none());
    }

    #[test]
    fn choose_stays_within_list() {
        let mut rng = StdRng::seed_from_u64(7);
        let list = WordList::new(vec!["alpha".into(), "beta".into()]);
        for _ in 0..50 {
            let w = list.choose(&mut rng).unwrap();
            assert!(w == "alpha" || w == "beta");
        }
    }
}
