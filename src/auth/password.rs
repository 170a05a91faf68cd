//! Keyed password hashing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("cannot hash an empty password")]
    EmptyInput,
    #[error("invalid hashing key")]
    InvalidKey,
}

/// HMAC-SHA256 keyed by the configured hashing secret, hex-encoded.
///
/// Deterministic for a given secret so a stored hash can be compared against
/// a freshly computed one.
#[derive(Clone)]
pub struct PasswordHasher {
    secret: Vec<u8>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl PasswordHasher {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        if password.is_empty() {
            return Err(HashError::EmptyInput);
        }
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| HashError::InvalidKey)?;
        mac.update(password.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// True if `candidate` hashes to `stored_hash`. Compared in constant time.
    pub fn matches(&self, candidate: &str, stored_hash: &str) -> bool {
        match self.hash(candidate) {
            Ok(computed) => constant_time_eq(computed.as_bytes(), stored_hash.as_bytes()),
            Err(_) => false,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
