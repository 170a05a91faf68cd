//! TOML configuration with environment overrides.
//!
//! Resolution order: built-in defaults, then the config file (if present),
//! then `TOKENGATE_*` environment variables, then CLI flags (applied by `main`).

pub mod schema;

pub use schema::{AuthConfig, Config, GatewayConfig, StorageConfig, DEFAULT_HASHING_SECRET};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

const ENV_HOST: &str = "TOKENGATE_HOST";
const ENV_PORT: &str = "TOKENGATE_PORT";
const ENV_DATA_DIR: &str = "TOKENGATE_DATA_DIR";
const ENV_HASHING_SECRET: &str = "TOKENGATE_HASHING_SECRET";

/// Accepted token id lengths.
const TOKEN_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 8..=64;

/// `<platform config dir>/tokengate/config.toml`, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tokengate")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from `path` (or the default location). A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {}", p.display()))?;
                let parsed = Self::from_toml(&raw)
                    .with_context(|| format!("Failed to parse config file {}", p.display()))?;
                tracing::debug!(path = %p.display(), "Loaded config file");
                parsed
            }
            _ => Self::default(),
        };

        config.apply_env_overrides_from(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `TOKENGATE_*` overrides read through `lookup`.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = non_empty(ENV_HOST) {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty(ENV_PORT) {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("{ENV_PORT} must be a port number, got {port:?}"))?;
        }
        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.storage.data_dir = dir;
        }
        if let Some(secret) = non_empty(ENV_HASHING_SECRET) {
            self.auth.hashing_secret = secret;
        }
        Ok(())
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.port == 0 {
            bail!("gateway.port must be non-zero");
        }
        if self.auth.hashing_secret.is_empty() {
            bail!("auth.hashing_secret must not be empty");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than zero");
        }
        if !TOKEN_LENGTH_RANGE.contains(&self.auth.token_length) {
            bail!(
                "auth.token_length must be within {}..={}, got {}",
                TOKEN_LENGTH_RANGE.start(),
                TOKEN_LENGTH_RANGE.end(),
                self.auth.token_length
            );
        }
        match self.storage.backend.as_str() {
            "file" | "memory" => {}
            other => bail!("storage.backend must be \"file\" or \"memory\", got {other:?}"),
        }
        if self.auth.hashing_secret == DEFAULT_HASHING_SECRET {
            tracing::warn!(
                "auth.hashing_secret is the built-in default; set {ENV_HASHING_SECRET} in production"
            );
        }
        Ok(())
    }
}
