use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use sha2::{Digest, Sha256};

use crate::response::AppError;
use crate::state::AppState;

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth_header| auth_header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Compares digests in constant time with respect to their content.
fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Proof that the caller is the chat transport holding `TRANSPORT_TOKEN`.
#[derive(Debug, Clone, Copy)]
pub struct TransportAuth;

#[axum::async_trait]
impl<S> FromRequestParts<S> for TransportAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

        if !digests_match(&hash_token(&token), app_state.transport_token_hash()) {
            return Err(AppError::unauthorized("Invalid transport token"));
        }
        Ok(TransportAuth)
    }
}

/// User ids become store key segments; reject what cannot be one.
pub fn validate_user_id(user_id: &str) -> Result<&str, AppError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() || trimmed.len() > 64 {
        return Err(AppError::bad_request("INVALID_USER_ID", "user id must be 1-64 characters"));
    }
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(AppError::bad_request(
            "INVALID_USER_ID",
            "user id may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(trimmed)
}
