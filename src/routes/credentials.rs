use axum::extract::{Path, State};
use axum::routing::put;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::{validate_user_id, TransportAuth};
use crate::drill::remote::vendor_marker;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:user_id", put(set_credential).delete(delete_credential))
}

#[derive(Debug, Deserialize)]
struct CredentialRequest {
    cookies: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialSaved {
    saved: bool,
    has_vendor_marker: bool,
}

async fn set_credential(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CredentialRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let cookies = req.cookies.trim();
    if cookies.is_empty() {
        return Err(AppError::bad_request(
            "INVALID_CREDENTIAL",
            "cookies must not be empty",
        ));
    }
    state.store().set_credential(user_id, cookies)?;
    tracing::info!(user_id, "Provider credential stored");
    Ok(ok(CredentialSaved {
        saved: true,
        has_vendor_marker: vendor_marker(cookies).is_some(),
    }))
}

async fn delete_credential(
    _auth: TransportAuth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let removed = state.store().delete_credential(user_id)?;
    Ok(ok(serde_json::json!({ "removed": removed })))
}
