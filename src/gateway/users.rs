//! `/users`: account records keyed by phone number.
//!
//! Create is open; read, update and delete need a `token` header that
//! verifies against the target phone.

use super::dispatch::{HandlerOutcome, HandlerResult, RequestData};
use super::AppState;
use crate::auth::{PublicUser, UserRecord, USERS_COLLECTION};
use crate::error::ApiError;
use crate::store::StoreError;

/// Shortest accepted phone number, in characters.
pub const PHONE_MIN_LEN: usize = 10;

/// Header carrying the bearer token.
pub const TOKEN_HEADER: &str = "token";

const NO_SUCH_USER: &str = "The specified user does not exist";

/// POST: required: firstName, lastName, phone, password, tosAgreement.
pub async fn create(state: &AppState, request: &RequestData) -> HandlerResult {
    let first_name = request.payload_string("firstName", 1);
    let last_name = request.payload_string("lastName", 1);
    let phone = request.payload_string("phone", PHONE_MIN_LEN);
    let password = request.payload_string("password", 1);
    let tos_agreement = request.payload_bool("tosAgreement") == Some(true);

    let (Some(first_name), Some(last_name), Some(phone), Some(password), true) =
        (first_name, last_name, phone, password, tos_agreement)
    else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    match state.store.read(USERS_COLLECTION, &phone).await {
        Ok(_) => return Err(ApiError::Conflict("User already registered".into())),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let record = UserRecord {
        first_name,
        last_name,
        hashed_password: state.hasher.hash(&password)?,
        phone,
        tos_agreement: true,
    };
    let value = serde_json::to_value(&record)
        .map_err(|e| ApiError::internal("Could not create the new user", e))?;

    match state.store.create(USERS_COLLECTION, &record.phone, &value).await {
        Ok(()) => {
            tracing::info!(phone = %record.phone, "User created");
            Ok(HandlerOutcome::ok())
        }
        Err(StoreError::AlreadyExists { .. }) => {
            Err(ApiError::Conflict("User already registered".into()))
        }
        Err(e @ StoreError::InvalidKey(_)) => Err(e.into()),
        Err(e) => Err(ApiError::internal("Could not create the new user", e)),
    }
}

/// GET: required: `phone` query parameter and a token for that phone.
pub async fn read(state: &AppState, request: &RequestData) -> HandlerResult {
    let phone = request
        .query_string("phone", PHONE_MIN_LEN)
        .ok_or_else(|| ApiError::bad_request("Missing required field"))?;

    authorize(state, request, &phone).await?;

    let record = load_user(state, &phone)
        .await?
        .ok_or_else(|| ApiError::not_found(NO_SUCH_USER))?;
    let public = serde_json::to_value(PublicUser::from(record))
        .map_err(|e| ApiError::internal("Could not render the user", e))?;
    Ok(HandlerOutcome::ok_with(public))
}

/// PUT: required: phone; at least one of firstName, lastName, password.
pub async fn update(state: &AppState, request: &RequestData) -> HandlerResult {
    let phone = request
        .payload_string("phone", PHONE_MIN_LEN)
        .ok_or_else(|| ApiError::bad_request("Missing required field"))?;

    let first_name = request.payload_string("firstName", 1);
    let last_name = request.payload_string("lastName", 1);
    let password = request.payload_string("password", 1);
    if first_name.is_none() && last_name.is_none() && password.is_none() {
        return Err(ApiError::bad_request("Missing fields to update"));
    }

    authorize(state, request, &phone).await?;

    let mut record = load_user(state, &phone)
        .await?
        .ok_or_else(|| ApiError::bad_request(NO_SUCH_USER))?;
    if let Some(first_name) = first_name {
        record.first_name = first_name;
    }
    if let Some(last_name) = last_name {
        record.last_name = last_name;
    }
    if let Some(password) = password {
        record.hashed_password = state.hasher.hash(&password)?;
    }

    let value = serde_json::to_value(&record)
        .map_err(|e| ApiError::internal("Could not update the user", e))?;
    match state.store.update(USERS_COLLECTION, &phone, &value).await {
        Ok(()) => {
            tracing::info!(phone = %phone, "User updated");
            Ok(HandlerOutcome::ok())
        }
        Err(e) if e.is_not_found() => Err(ApiError::bad_request(NO_SUCH_USER)),
        Err(e) => Err(ApiError::internal("Could not update the user", e)),
    }
}

/// DELETE: required: phone (body, or query string) and a token for that phone.
///
/// Tokens issued to the phone are left in place.
pub async fn delete(state: &AppState, request: &RequestData) -> HandlerResult {
    let phone = request
        .payload_string("phone", PHONE_MIN_LEN)
        .or_else(|| request.query_string("phone", PHONE_MIN_LEN))
        .ok_or_else(|| ApiError::bad_request("Missing required field"))?;

    authorize(state, request, &phone).await?;

    if load_user(state, &phone).await?.is_none() {
        return Err(ApiError::bad_request(NO_SUCH_USER));
    }
    match state.store.delete(USERS_COLLECTION, &phone).await {
        Ok(()) => {
            tracing::info!(phone = %phone, "User deleted");
            Ok(HandlerOutcome::ok())
        }
        Err(e) if e.is_not_found() => Err(ApiError::bad_request(NO_SUCH_USER)),
        Err(e) => Err(ApiError::internal("Could not delete the user", e)),
    }
}

/// Require a `token` header that verifies against `phone`.
async fn authorize(state: &AppState, request: &RequestData, phone: &str) -> Result<(), ApiError> {
    let verified = match request.header(TOKEN_HEADER).map(str::trim) {
        Some(token) if !token.is_empty() => state.tokens.verify(token, phone).await,
        _ => false,
    };
    if verified {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Missing required token in header, or token is invalid",
        ))
    }
}

/// Missing and unparseable records both read as `None`.
async fn load_user(state: &AppState, phone: &str) -> Result<Option<UserRecord>, ApiError> {
    match state.store.read(USERS_COLLECTION, phone).await {
        Ok(value) => match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(phone = %phone, "Stored user record is malformed: {e}");
                Ok(None)
            }
        },
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
