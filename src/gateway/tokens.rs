//! `/tokens`: session tokens over HTTP.

use super::dispatch::{HandlerOutcome, HandlerResult, RequestData};
use super::users::PHONE_MIN_LEN;
use super::AppState;
use crate::auth::TokenError;
use crate::error::ApiError;

/// POST: required: phone, password. Returns the new token.
pub async fn create(state: &AppState, request: &RequestData) -> HandlerResult {
    let phone = request.payload_string("phone", PHONE_MIN_LEN);
    let password = request.payload_string("password", 1);
    let (Some(phone), Some(password)) = (phone, password) else {
        return Err(ApiError::bad_request("Missing required field(s)"));
    };

    let token = state.tokens.issue(&phone, &password).await?;
    let body = serde_json::to_value(&token)
        .map_err(|e| ApiError::internal("Could not create the new token", e))?;
    Ok(HandlerOutcome::ok_with(body))
}

/// GET: required: `id` query parameter.
pub async fn read(state: &AppState, request: &RequestData) -> HandlerResult {
    let id = token_id(state, request.query.get("id").map(String::as_str))
        .ok_or_else(|| ApiError::bad_request("Missing required field"))?;

    let token = match state.tokens.lookup(&id).await {
        Ok(token) => token,
        Err(TokenError::NotFound) => return Err(ApiError::not_found("Token not found")),
        Err(e) => return Err(e.into()),
    };
    let body = serde_json::to_value(&token)
        .map_err(|e| ApiError::internal("Could not render the token", e))?;
    Ok(HandlerOutcome::ok_with(body))
}

/// PUT: required: id, `extend: true`.
pub async fn update(state: &AppState, request: &RequestData) -> HandlerResult {
    let id = token_id(state, request.payload.get("id").and_then(|v| v.as_str()));
    let extend = request.payload_bool("extend") == Some(true);
    let (Some(id), true) = (id, extend) else {
        return Err(ApiError::bad_request(
            "Missing required field(s) or field(s) are invalid",
        ));
    };

    state.tokens.extend(&id).await?;
    Ok(HandlerOutcome::ok())
}

/// DELETE: required: id (body, or query string).
pub async fn delete(state: &AppState, request: &RequestData) -> HandlerResult {
    let id = token_id(state, request.payload.get("id").and_then(|v| v.as_str()))
        .or_else(|| token_id(state, request.query.get("id").map(String::as_str)))
        .ok_or_else(|| ApiError::bad_request("Missing required field"))?;

    match state.tokens.revoke(&id).await {
        Ok(()) => Ok(HandlerOutcome::ok()),
        Err(TokenError::NotFound) => Err(ApiError::bad_request("Could not find the specified token")),
        Err(e) => Err(e.into()),
    }
}

/// A trimmed id of exactly the configured token length.
fn token_id(state: &AppState, raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|id| id.chars().count() == state.tokens.id_length())
        .map(str::to_owned)
}
