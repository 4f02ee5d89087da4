use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;

use super::{LeaderboardEntry, ScoreStore, StoreError};

const REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for a remote `wordmint serve` instance
#[derive(Debug, Clone)]
pub struct HttpStore {
    endpoint: String,
    client: Client,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/leaderboard", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .map(|body| body.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());

    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

impl ScoreStore for HttpStore {
    fn submit(&self, entry: LeaderboardEntry) -> Result<(), StoreError> {
        debug!("posting score {} for {}", entry.score, entry.player_id);
        let response = self.client.post(&self.endpoint).json(&entry).send()?;
        check(response)?;
        Ok(())
    }

    fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let response = check(self.client.get(&self.endpoint).send()?)?;
        let mut entries: Vec<LeaderboardEntry> = response.json()?;
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_normalized() {
        let store = HttpStore::new("http://127.0.0.1:3000/").unwrap();
        assert_eq!(store.endpoint(), "http://127.0.0.1:3000/leaderboard");
    }

    #[test]
    fn unreachable_server_is_an_http_error() {
        let store = HttpStore::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(store.top(10), Err(StoreError::Http(_))));
    }
}
