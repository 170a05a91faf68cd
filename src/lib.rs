//! tokengate: a small JSON API for user accounts and session tokens.
//!
//! - [`store`]: flat-file (or in-memory) record store addressed by `(collection, key)`
//! - [`auth`]: password hashing and the bearer-token life-cycle
//! - [`gateway`]: axum server, request dispatch and the `/users` and `/tokens` handlers
//! - [`config`]: TOML configuration with environment overrides

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;

pub use config::Config;
pub use error::ApiError;
pub use gateway::{build_router, run_gateway, AppState};
