use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

/// `[gateway]`: HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Allow binding a non-loopback address.
    pub allow_public_bind: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            allow_public_bind: false,
        }
    }
}

/// `[storage]`: record persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// "file" or "memory".
    pub backend: String,
    /// Base directory of the file store. `~` and `$VARS` are expanded.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".into(),
            data_dir: ".data".into(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        match shellexpand::full(&self.data_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!("Could not expand data_dir {:?}: {e}", self.data_dir);
                PathBuf::from(&self.data_dir)
            }
        }
    }
}

/// `[auth]`: password hashing and token life-cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for password hashes. Changing it invalidates every stored hash.
    pub hashing_secret: String,
    pub token_ttl_secs: u64,
    pub token_length: usize,
    /// Interval of the expired-token sweep. 0 disables it.
    pub sweep_interval_secs: u64,
}

/// Used when no secret is configured; startup logs a warning.
pub const DEFAULT_HASHING_SECRET: &str = "change-me-hashing-secret";

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hashing_secret: DEFAULT_HASHING_SECRET.into(),
            token_ttl_secs: 3600,
            token_length: 20,
            sweep_interval_secs: 0,
        }
    }
}
