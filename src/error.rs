//! Request-level failures and their HTTP shape.
//!
//! Every handler outcome that is not a success becomes a status code plus a
//! `{"Error": "..."}` body. Internal causes are logged, never sent.

use crate::auth::{HashError, TokenError};
use crate::store::StoreError;
use axum::http::StatusCode;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input, detected before storage is touched.
    #[error("{0}")]
    BadRequest(String),

    /// Identity already registered.
    #[error("{0}")]
    Conflict(String),

    /// Credentials did not match a user.
    #[error("{0}")]
    Unauthorized(String),

    /// Token exists but its expiry has passed.
    #[error("{0}")]
    Expired(String),

    #[error("{0}")]
    NotFound(String),

    /// Token verification failed.
    #[error("{0}")]
    Forbidden(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Storage or hashing failure. The message is already client-safe.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Log `cause` and return an `Internal` error carrying only `public_msg`.
    pub fn internal(public_msg: &str, cause: impl std::fmt::Display) -> Self {
        tracing::error!("{public_msg}: {cause}");
        Self::Internal(public_msg.to_owned())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Conflict(_) | Self::Unauthorized(_) | Self::Expired(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        json!({ "Error": self.to_string() })
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidKey(_) => Self::bad_request("Invalid identifier"),
            StoreError::NotFound { .. } => Self::not_found("Record not found"),
            other => Self::internal("Storage failure", other),
        }
    }
}

impl From<HashError> for ApiError {
    fn from(err: HashError) -> Self {
        Self::internal("Could not hash the user's password", err)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Unauthorized => Self::Unauthorized("Invalid phone or password".into()),
            TokenError::NotFound => Self::bad_request("Specified token does not exist"),
            TokenError::Expired => {
                Self::Expired("The token has already expired and cannot be extended".into())
            }
            TokenError::IdCollision => {
                Self::internal("Could not create the new token", TokenError::IdCollision)
            }
            TokenError::Hash(e) => e.into(),
            TokenError::Store(e) => Self::internal("Storage failure", e),
        }
    }
}
