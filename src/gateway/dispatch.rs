//! Request normalization, the static route table, and response shaping.
//!
//! Every request reaches [`dispatch`] through the router fallback. It is turned
//! into a [`RequestData`], routed by `(Resource, Verb)` to a handler, and the
//! handler's [`HandlerOutcome`] is turned back into a JSON response. The
//! response is built only after the handler future resolves.

use super::{tokens, users, AppState};
use crate::error::ApiError;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Uniform call shape handed to resource handlers.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    /// Path with leading and trailing `/` stripped.
    pub path: String,
    /// Lower-case method token.
    pub method: String,
    pub query: HashMap<String, String>,
    /// Header names are lower-case; first value wins.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body. Always an object; anything unparseable becomes `{}`.
    pub payload: Value,
}

impl RequestData {
    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Self {
        let query = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let mut header_map = HashMap::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                header_map
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_insert_with(|| value.to_owned());
            }
        }

        Self {
            path: trim_path(uri.path()),
            method: method.as_str().to_ascii_lowercase(),
            query,
            headers: header_map,
            payload: parse_payload(body),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Trimmed payload string of at least `min_len` characters. Never empty.
    pub fn payload_string(&self, field: &str, min_len: usize) -> Option<String> {
        trimmed_at_least(self.payload.get(field).and_then(Value::as_str), min_len)
    }

    /// Trimmed query parameter of at least `min_len` characters. Never empty.
    pub fn query_string(&self, field: &str, min_len: usize) -> Option<String> {
        trimmed_at_least(self.query.get(field).map(String::as_str), min_len)
    }

    pub fn payload_bool(&self, field: &str) -> Option<bool> {
        self.payload.get(field).and_then(Value::as_bool)
    }
}

fn trimmed_at_least(value: Option<&str>, min_len: usize) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.chars().count() >= min_len)
        .map(str::to_owned)
}

pub fn trim_path(path: &str) -> String {
    path.trim_matches('/').to_owned()
}

/// Best-effort body parse. Malformed or non-object JSON becomes `{}`.
pub fn parse_payload(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Tokens,
    Ping,
    NotFound,
}

impl Resource {
    pub fn from_path(trimmed_path: &str) -> Self {
        match trimmed_path {
            "users" => Self::Users,
            "tokens" => Self::Tokens,
            "ping" => Self::Ping,
            _ => Self::NotFound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Post,
    Get,
    Put,
    Delete,
}

impl Verb {
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "post" => Some(Self::Post),
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// What a handler produced, before normalization into a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    pub status: Option<u16>,
    pub payload: Option<Value>,
}

pub type HandlerResult = Result<HandlerOutcome, ApiError>;

impl HandlerOutcome {
    /// 200 with an empty object.
    pub fn ok() -> Self {
        Self {
            status: Some(200),
            payload: None,
        }
    }

    pub fn ok_with(payload: Value) -> Self {
        Self {
            status: Some(200),
            payload: Some(payload),
        }
    }

    /// Invalid or missing status becomes 200; non-object payload becomes `{}`.
    pub fn normalize(self) -> (StatusCode, Value) {
        let status = self
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        let payload = match self.payload {
            Some(value @ Value::Object(_)) => value,
            _ => Value::Object(Map::new()),
        };
        (status, payload)
    }
}

impl From<ApiError> for HandlerOutcome {
    fn from(err: ApiError) -> Self {
        Self {
            status: Some(err.status().as_u16()),
            payload: Some(err.body()),
        }
    }
}

impl IntoResponse for HandlerOutcome {
    fn into_response(self) -> Response {
        let (status, payload) = self.normalize();
        (status, Json(payload)).into_response()
    }
}

/// Route a normalized request to its handler.
pub async fn route(state: &AppState, request: &RequestData) -> HandlerOutcome {
    let resource = Resource::from_path(&request.path);
    let result = match (resource, Verb::parse(&request.method)) {
        (Resource::NotFound, _) => Err(ApiError::not_found("Not found")),
        (Resource::Ping, _) => Ok(HandlerOutcome::ok()),
        (_, None) => Err(ApiError::MethodNotAllowed),
        (Resource::Users, Some(Verb::Post)) => users::create(state, request).await,
        (Resource::Users, Some(Verb::Get)) => users::read(state, request).await,
        (Resource::Users, Some(Verb::Put)) => users::update(state, request).await,
        (Resource::Users, Some(Verb::Delete)) => users::delete(state, request).await,
        (Resource::Tokens, Some(Verb::Post)) => tokens::create(state, request).await,
        (Resource::Tokens, Some(Verb::Get)) => tokens::read(state, request).await,
        (Resource::Tokens, Some(Verb::Put)) => tokens::update(state, request).await,
        (Resource::Tokens, Some(Verb::Delete)) => tokens::delete(state, request).await,
    };
    result.unwrap_or_else(HandlerOutcome::from)
}

/// Router fallback: the single entry point for every request.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = RequestData::from_parts(&method, &uri, &headers, &body);
    let response = route(&state, &request).await.into_response();
    tracing::debug!(
        method = %request.method,
        path = %request.path,
        status = response.status().as_u16(),
        "Request handled"
    );
    response
}
