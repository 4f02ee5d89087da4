//! HTTP front for a score store: `GET /leaderboard` and `POST /leaderboard`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::store::{LeaderboardEntry, ScoreStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScoreStore>,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn app(store: Arc<dyn ScoreStore>, limit: usize) -> Router {
    Router::new()
        .route("/leaderboard", get(get_leaderboard).post(post_score))
        .with_state(Arc::new(AppState { store, limit }))
}

/// Top entries, or an empty list when the store cannot be read
pub async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Json<Vec<LeaderboardEntry>> {
    let store = Arc::clone(&state.store);
    let limit = state.limit;

    match tokio::task::spawn_blocking(move || store.top(limit)).await {
        Ok(Ok(entries)) => Json(entries),
        Ok(Err(e)) => {
            error!("failed to read leaderboard: {}", e);
            Json(Vec::new())
        }
        Err(e) => {
            error!("leaderboard read task failed: {}", e);
            Json(Vec::new())
        }
    }
}

pub async fn post_score(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!("rejecting malformed score body: {}", e);
        ApiError::BadRequest("body must be a JSON object".to_string())
    })?;

    let entry = LeaderboardEntry::from_payload(&payload).map_err(|e| match e {
        StoreError::InvalidPayload(message) => {
            warn!("rejecting score submission: {}", message);
            ApiError::BadRequest(message)
        }
        other => ApiError::BadRequest(other.to_string()),
    })?;

    debug!("score {} for {}", entry.score, entry.player_id);
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || store.submit(entry)).await {
        Ok(Ok(())) => Ok(Json(SubmitResponse { success: true })),
        Ok(Err(e)) => {
            error!("failed to save score: {}", e);
            Err(ApiError::Internal("failed to save score".to_string()))
        }
        Err(e) => {
            error!("score write task failed: {}", e);
            Err(ApiError::Internal("failed to save score".to_string()))
        }
    }
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_listener<F>(
    listener: TcpListener,
    store: Arc<dyn ScoreStore>,
    limit: usize,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app(store, limit))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn serve(
    bind: SocketAddr,
    store: Arc<dyn ScoreStore>,
    limit: usize,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("leaderboard listening on http://{}", listener.local_addr()?);
    serve_listener(listener, store, limit, shutdown_signal()).await?;
    info!("leaderboard server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PlayerId;
    use crate::store::MemoryStore;

    struct UnreadableStore;

    impl ScoreStore for UnreadableStore {
        fn submit(&self, _entry: LeaderboardEntry) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }

        fn top(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    fn state_with(store: Arc<dyn ScoreStore>) -> State<Arc<AppState>> {
        State(Arc::new(AppState { store, limit: 10 }))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn post_then_get_returns_ranked_entries() {
        let store = Arc::new(MemoryStore::new());

        for body in [
            r#"{"playerId": "p1", "score": 3}"#,
            r#"{"playerId": "p2", "score": 9, "username": "Bo"}"#,
            r#"{"wallet": "p1", "score": 4}"#,
        ] {
            let Json(response) = post_score(state_with(store.clone()), Bytes::from(body))
                .await
                .unwrap();
            assert!(response.success);
        }

        let Json(entries) = get_leaderboard(state_with(store.clone())).await;
        let scores: Vec<(String, u64)> = entries
            .iter()
            .map(|e| (e.player_id.to_string(), e.score))
            .collect();
        assert_eq!(scores, vec![("p2".into(), 9), ("p1".into(), 4)]);
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected_without_writing() {
        let store = Arc::new(MemoryStore::new());

        for body in [
            "not json",
            r#"{"score": 3}"#,
            r#"{"playerId": "p1"}"#,
            r#"{"playerId": "p1", "score": "ten"}"#,
            r#"{"playerId": "p1", "score": -2}"#,
            r#"{"playerId": "", "score": 2}"#,
        ] {
            let response = post_score(state_with(store.clone()), Bytes::from(body))
                .await
                .unwrap_err()
                .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert!(body_json(response).await["error"].is_string());
        }

        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn read_failure_serves_empty_list() {
        let Json(entries) = get_leaderboard(state_with(Arc::new(UnreadableStore))).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_a_server_error() {
        let response = post_score(
            state_with(Arc::new(UnreadableStore)),
            Bytes::from(r#"{"playerId": "p1", "score": 1}"#),
        )
        .await
        .unwrap_err()
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn get_respects_limit() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..15u64 {
            store
                .submit(LeaderboardEntry::new(
                    PlayerId::parse(&format!("p{}", i)).unwrap(),
                    i,
                ))
                .unwrap();
        }

        let Json(entries) = get_leaderboard(state_with(store)).await;
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].score, 14);
    }
}
