//! Identity and session handling.
//!
//! Provides:
//! - Password hashing (HMAC-SHA256 keyed by a server-side secret, hex-encoded)
//! - User record types, with a public view that never carries the hash
//! - Bearer tokens bound to one phone-number identity, with a fixed TTL
//!
//! ## Design Decisions
//! - Tokens are opaque random ids stored as records in the `tokens` collection;
//!   the id is both the primary key and the credential.
//! - Deleting a user leaves its tokens in place. They still verify against the
//!   phone string until they expire.

pub mod password;
pub mod tokens;
pub mod user;

pub use password::{HashError, PasswordHasher};
pub use tokens::{now_millis, Token, TokenError, TokenService, TOKENS_COLLECTION};
pub use user::{PublicUser, UserRecord, USERS_COLLECTION};
