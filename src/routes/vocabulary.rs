use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::{validate_user_id, TransportAuth};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;

const MAX_DUE_LIMIT: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:user_id/sync", post(sync_vocabulary))
        .route("/:user_id/due", get(due_words))
        .route("/:user_id/words", post(add_word))
}

async fn sync_vocabulary(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let summary = state.engine().sync_vocabulary(user_id).await?;
    Ok(ok(summary))
}

#[derive(Debug, Deserialize)]
struct DueQuery {
    limit: Option<usize>,
}

/// Due count plus the first `limit` due entries, soonest first.
async fn due_words(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    Query(q): Query<DueQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let limit = q
        .limit
        .unwrap_or(state.engine().config().local_batch)
        .clamp(1, MAX_DUE_LIMIT);
    let due = state.engine().due_count(user_id)?;
    let words = state.store().due_vocabulary(user_id, Utc::now(), limit)?;
    Ok(ok(serde_json::json!({
        "due": due,
        "words": words,
    })))
}

#[derive(Debug, Deserialize)]
struct AddWordRequest {
    word: String,
    translation: String,
}

async fn add_word(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AddWordRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let added = state
        .engine()
        .add_word(user_id, &req.word, &req.translation)
        .await?;
    Ok(created(added))
}
