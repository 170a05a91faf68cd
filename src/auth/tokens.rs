//! Bearer-token life-cycle: issue, verify, extend, revoke.
//!
//! Expiry is an absolute wall-clock instant (Unix epoch milliseconds) fixed at
//! issuance or extension. Verification is a plain comparison against it and
//! never writes.

use super::password::{HashError, PasswordHasher};
use super::user::{UserRecord, USERS_COLLECTION};
use crate::config::AuthConfig;
use crate::store::{ObjectStore, StoreError};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Collection holding token records, keyed by token id.
pub const TOKENS_COLLECTION: &str = "tokens";

/// Fresh ids tried before giving up on a colliding id.
const ISSUE_ATTEMPTS: usize = 3;

const ID_ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A session token as persisted and as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// Identity (phone number) the token is bound to.
    pub phone: String,
    pub id: String,
    /// Expiry, Unix epoch milliseconds.
    pub expires: i64,
}

impl Token {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(now_millis())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("identity or password did not match")]
    Unauthorized,
    #[error("token not found")]
    NotFound,
    #[error("token has already expired")]
    Expired,
    #[error("could not allocate an unused token id")]
    IdCollision,
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        match err {
            // An id that cannot be a store key cannot name a stored token either.
            StoreError::NotFound { .. } | StoreError::InvalidKey(_) => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn ObjectStore>,
    hasher: PasswordHasher,
    ttl_ms: i64,
    id_length: usize,
}

impl TokenService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        hasher: PasswordHasher,
        ttl_secs: u64,
        id_length: usize,
    ) -> Self {
        Self {
            store,
            hasher,
            ttl_ms: i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            id_length,
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, hasher: PasswordHasher, config: &AuthConfig) -> Self {
        Self::new(store, hasher, config.token_ttl_secs, config.token_length)
    }

    pub fn id_length(&self) -> usize {
        self.id_length
    }

    /// Random lowercase alphanumeric id of the configured length.
    pub fn generate_id(&self) -> String {
        let mut rng = rand::rng();
        (0..self.id_length)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }

    fn expiry_from_now(&self) -> i64 {
        now_millis().saturating_add(self.ttl_ms)
    }

    /// Check `password` against the stored user and mint a token for `identity`.
    pub async fn issue(&self, identity: &str, password: &str) -> Result<Token, TokenError> {
        let user: UserRecord = match self.store.read(USERS_COLLECTION, identity).await {
            Ok(value) => serde_json::from_value(value).map_err(|e| {
                tracing::warn!(phone = %identity, "Stored user record is malformed: {e}");
                TokenError::Unauthorized
            })?,
            Err(StoreError::NotFound { .. } | StoreError::InvalidKey(_)) => {
                return Err(TokenError::Unauthorized);
            }
            Err(e) => return Err(TokenError::Store(e)),
        };

        if !self.hasher.matches(password, &user.hashed_password) {
            return Err(TokenError::Unauthorized);
        }

        for _ in 0..ISSUE_ATTEMPTS {
            let token = Token {
                phone: identity.to_owned(),
                id: self.generate_id(),
                expires: self.expiry_from_now(),
            };
            let value = serde_json::to_value(&token).map_err(StoreError::from)?;
            match self.store.create(TOKENS_COLLECTION, &token.id, &value).await {
                Ok(()) => {
                    tracing::info!(phone = %identity, "Token issued");
                    return Ok(token);
                }
                Err(StoreError::AlreadyExists { .. }) => {
                    tracing::warn!("Token id collision, retrying with a fresh id");
                }
                Err(e) => return Err(TokenError::Store(e)),
            }
        }
        Err(TokenError::IdCollision)
    }

    /// Fetch a token whether or not it has expired.
    pub async fn lookup(&self, id: &str) -> Result<Token, TokenError> {
        let value = self.store.read(TOKENS_COLLECTION, id).await?;
        serde_json::from_value(value).map_err(|e| {
            tracing::warn!("Stored token record is malformed: {e}");
            TokenError::NotFound
        })
    }

    /// True iff `id` names an unexpired token bound to `identity`.
    pub async fn verify(&self, id: &str, identity: &str) -> bool {
        match self.lookup(id).await {
            Ok(token) => token.phone == identity && token.is_valid_at(now_millis()),
            Err(TokenError::NotFound) => false,
            Err(e) => {
                tracing::warn!("Token verification failed closed: {e}");
                false
            }
        }
    }

    /// Push the expiry of a still-valid token to now + TTL.
    pub async fn extend(&self, id: &str) -> Result<Token, TokenError> {
        let mut token = self.lookup(id).await?;
        if token.is_expired() {
            return Err(TokenError::Expired);
        }
        token.expires = self.expiry_from_now();
        let value = serde_json::to_value(&token).map_err(StoreError::from)?;
        self.store.update(TOKENS_COLLECTION, id, &value).await?;
        tracing::debug!(phone = %token.phone, "Token extended");
        Ok(token)
    }

    pub async fn revoke(&self, id: &str) -> Result<(), TokenError> {
        self.store.delete(TOKENS_COLLECTION, id).await?;
        tracing::debug!("Token revoked");
        Ok(())
    }

    /// Delete every expired token. Returns how many were removed.
    ///
    /// A token that cannot be read or deleted is logged and skipped. Only a
    /// failure to list the collection is returned as an error.
    pub async fn purge_expired(&self) -> Result<usize, TokenError> {
        let now = now_millis();
        let mut removed = 0;
        for id in self.store.list(TOKENS_COLLECTION).await? {
            let token = match self.lookup(&id).await {
                Ok(token) => token,
                Err(TokenError::NotFound) => continue,
                Err(e) => {
                    tracing::warn!(token = %id, "Skipping unreadable token during purge: {e}");
                    continue;
                }
            };
            if token.is_valid_at(now) {
                continue;
            }
            match self.store.delete(TOKENS_COLLECTION, &id).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => tracing::warn!(token = %id, "Could not delete expired token: {e}"),
            }
        }
        Ok(removed)
    }
}

/// Current Unix epoch in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};
    use serde_json::json;

    const PHONE: &str = "5551234567";

    async fn service_with_user(password: &str) -> (Arc<dyn ObjectStore>, TokenService) {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::new("test-secret");
        let user = UserRecord {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: PHONE.into(),
            hashed_password: hasher.hash(password).unwrap(),
            tos_agreement: true,
        };
        store
            .create(USERS_COLLECTION, PHONE, &serde_json::to_value(user).unwrap())
            .await
            .unwrap();
        let service = TokenService::new(Arc::clone(&store), hasher, 3600, 20);
        (store, service)
    }

    async fn plant_token(store: &Arc<dyn ObjectStore>, id: &str, phone: &str, expires: i64) {
        let token = Token {
            phone: phone.into(),
            id: id.into(),
            expires,
        };
        store
            .create(TOKENS_COLLECTION, id, &serde_json::to_value(token).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn generated_ids_have_configured_length_and_alphabet() {
        let service = TokenService::new(
            Arc::new(MemoryStore::new()),
            PasswordHasher::new("s"),
            3600,
            20,
        );
        let id = service.generate_id();
        assert_eq!(id.len(), 20);
        assert!(id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        assert_ne!(id, service.generate_id());
    }

    #[test]
    fn token_validity_is_strictly_before_expiry() {
        let token = Token {
            phone: PHONE.into(),
            id: "x".into(),
            expires: 1_000,
        };
        assert!(token.is_valid_at(999));
        assert!(!token.is_valid_at(1_000));
        assert!(!token.is_valid_at(1_001));
    }

    #[tokio::test]
    async fn issue_persists_token_expiring_in_one_hour() {
        let (store, service) = service_with_user("secret").await;
        let before = now_millis();
        let token = service.issue(PHONE, "secret").await.unwrap();
        let after = now_millis();

        assert_eq!(token.phone, PHONE);
        assert_eq!(token.id.len(), 20);
        assert!(token.expires >= before + 3_600_000);
        assert!(token.expires <= after + 3_600_000);

        let stored = store.read(TOKENS_COLLECTION, &token.id).await.unwrap();
        assert_eq!(stored, serde_json::to_value(&token).unwrap());
    }

    #[tokio::test]
    async fn issue_rejects_wrong_password_and_unknown_identity() {
        let (store, service) = service_with_user("secret").await;

        assert!(matches!(
            service.issue(PHONE, "wrong").await,
            Err(TokenError::Unauthorized)
        ));
        assert!(matches!(
            service.issue("5550000000000", "secret").await,
            Err(TokenError::Unauthorized)
        ));
        assert!(store.list(TOKENS_COLLECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn issue_rejects_malformed_user_record() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        store
            .create(USERS_COLLECTION, PHONE, &json!({"phone": PHONE}))
            .await
            .unwrap();
        let service = TokenService::new(store, PasswordHasher::new("s"), 3600, 20);
        assert!(matches!(
            service.issue(PHONE, "secret").await,
            Err(TokenError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn verify_requires_matching_identity() {
        let (_store, service) = service_with_user("secret").await;
        let token = service.issue(PHONE, "secret").await.unwrap();

        assert!(service.verify(&token.id, PHONE).await);
        assert!(!service.verify(&token.id, "5559999999999").await);
        assert!(!service.verify("doesnotexist00000000", PHONE).await);
        assert!(!service.verify("../../etc/passwd", PHONE).await);
    }

    #[tokio::test]
    async fn verify_is_false_for_expired_token_even_with_right_identity() {
        let (store, service) = service_with_user("secret").await;
        plant_token(&store, "expiredtoken00000000", PHONE, now_millis() - 1_000).await;

        assert!(!service.verify("expiredtoken00000000", PHONE).await);
    }

    #[tokio::test]
    async fn extend_pushes_expiry_forward() {
        let (store, service) = service_with_user("secret").await;
        let soon = now_millis() + 5_000;
        plant_token(&store, "livetoken00000000000", PHONE, soon).await;

        let extended = service.extend("livetoken00000000000").await.unwrap();
        assert!(extended.expires > soon);

        let stored = service.lookup("livetoken00000000000").await.unwrap();
        assert_eq!(stored.expires, extended.expires);
    }

    #[tokio::test]
    async fn extend_expired_token_fails_and_leaves_expiry_untouched() {
        let (store, service) = service_with_user("secret").await;
        let past = now_millis() - 1_000;
        plant_token(&store, "expiredtoken00000000", PHONE, past).await;

        assert!(matches!(
            service.extend("expiredtoken00000000").await,
            Err(TokenError::Expired)
        ));
        let stored = service.lookup("expiredtoken00000000").await.unwrap();
        assert_eq!(stored.expires, past);
    }

    #[tokio::test]
    async fn extend_and_revoke_missing_token_are_not_found() {
        let (_store, service) = service_with_user("secret").await;
        assert!(matches!(
            service.extend("missing0000000000000").await,
            Err(TokenError::NotFound)
        ));
        assert!(matches!(
            service.revoke("missing0000000000000").await,
            Err(TokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn revoke_removes_token() {
        let (_store, service) = service_with_user("secret").await;
        let token = service.issue(PHONE, "secret").await.unwrap();

        service.revoke(&token.id).await.unwrap();
        assert!(!service.verify(&token.id, PHONE).await);
        assert!(matches!(
            service.lookup(&token.id).await,
            Err(TokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_tokens() {
        let (store, service) = service_with_user("secret").await;
        let live = service.issue(PHONE, "secret").await.unwrap();
        plant_token(&store, "expiredaaaaaaaaaaaaa", PHONE, now_millis() - 1).await;
        plant_token(&store, "expiredbbbbbbbbbbbbb", PHONE, now_millis() - 60_000).await;

        assert_eq!(service.purge_expired().await.unwrap(), 2);
        assert_eq!(
            store.list(TOKENS_COLLECTION).await.unwrap(),
            vec![live.id.clone()]
        );
        assert_eq!(service.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purge_skips_unreadable_entries_and_keeps_going() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file_store = FileStore::open(tmp.path()).unwrap();
        // a directory named like a record lists as a key but fails to read with an I/O error
        std::fs::create_dir_all(tmp.path().join(TOKENS_COLLECTION).join("aaaaaaaaaaaaaaaaaaaa.json"))
            .unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(file_store);
        plant_token(&store, "expiredzzzzzzzzzzzzz", PHONE, now_millis() - 1).await;
        let service = TokenService::new(Arc::clone(&store), PasswordHasher::new("s"), 3600, 20);

        assert_eq!(service.purge_expired().await.unwrap(), 1);
        assert_eq!(
            store.list(TOKENS_COLLECTION).await.unwrap(),
            vec!["aaaaaaaaaaaaaaaaaaaa".to_string()]
        );
    }
}
