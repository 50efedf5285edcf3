use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::{validate_user_id, TransportAuth};
use crate::drill::engine::{CancelOutcome, SessionStarted};
use crate::drill::TrainingType;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:user_id/start", post(start_training))
        .route("/:user_id/answer", post(submit_answer))
        .route("/:user_id/cancel", post(cancel_training))
        .route("/:user_id/report", get(final_report))
        .route("/:user_id/resend", post(resend_pending))
        .route("/:user_id/cache", get(cache_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    #[serde(default = "default_training_type")]
    training_type: TrainingType,
}

fn default_training_type() -> TrainingType {
    TrainingType::RemoteSynced
}

async fn start_training(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let started: SessionStarted = state
        .engine()
        .start_session(user_id, req.training_type)
        .await?;
    Ok(created(started))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    word_index: usize,
    selected_option_id: String,
}

async fn submit_answer(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AnswerRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    if req.selected_option_id.trim().is_empty() {
        return Err(AppError::bad_request(
            "INVALID_OPTION",
            "selectedOptionId must not be empty",
        ));
    }
    let outcome = state
        .engine()
        .submit_answer(user_id, req.word_index, req.selected_option_id.trim())
        .await?;
    Ok(ok(outcome))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelResponse {
    message: &'static str,
    outcome: CancelOutcome,
}

/// Always succeeds; the outcome says what actually happened.
async fn cancel_training(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let outcome = state.engine().cancel_session(user_id).await;
    let message = match outcome {
        CancelOutcome::Cancelled => "Training cancelled. Answered words stay cached.",
        CancelOutcome::NoSession => "No active training.",
        CancelOutcome::NotCancellable { .. } => "Training is finishing and can no longer be cancelled.",
        CancelOutcome::Busy => "Training is busy, try again in a moment.",
    };
    Ok(ok(CancelResponse { message, outcome }))
}

async fn final_report(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let report = state.engine().final_report(user_id).await?;
    let text = report.render();
    Ok(ok(serde_json::json!({
        "report": report,
        "text": text,
    })))
}

async fn resend_pending(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let outcome = state.engine().resend_pending(user_id).await?;
    Ok(ok(outcome))
}

async fn cache_status(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    Ok(ok(state.engine().cache_status(user_id)?))
}
