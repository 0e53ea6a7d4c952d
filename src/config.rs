//! Service configuration.
//!
//! Configuration lives in a JSON file with camelCase keys, every field
//! optional with the defaults below. A missing file is created with the
//! defaults so a fresh deployment starts with something editable. The bind
//! address can additionally be overridden through the `BYTEDROP_HOST` and
//! `BYTEDROP_PORT` environment variables, which win over the file.
//!
//! ```json
//! {
//!   "host": "127.0.0.1",
//!   "port": 8080,
//!   "keyLength": 7,
//!   "lifetimeMinutes": 1440,
//!   "cacheExpiryMinutes": 10,
//!   "cacheMaxSizeMb": 200,
//!   "maxContentLengthMb": 10,
//!   "corePoolSize": 16,
//!   "postRateLimitPeriodMins": 10,
//!   "postRateLimit": 30,
//!   "readRateLimitPeriodMins": 10,
//!   "readRateLimit": 100
//! }
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Generated key length; must be at least 2.
    pub key_length: usize,
    /// How long a record lives after creation.
    pub lifetime_minutes: u64,
    /// Cache idle TTL; doubles as the expiry sweep interval.
    pub cache_expiry_minutes: u64,
    /// Cache weight budget, in megabytes of stored bodies.
    pub cache_max_size_mb: u64,
    /// Per-record stored-size cap, in megabytes.
    pub max_content_length_mb: u64,
    /// Blocking worker threads for disk I/O.
    pub core_pool_size: usize,
    /// Upload rate-limit window, in minutes.
    pub post_rate_limit_period_mins: u64,
    /// Uploads admitted per window per address.
    pub post_rate_limit: u32,
    /// Read rate-limit window, in minutes.
    pub read_rate_limit_period_mins: u64,
    /// Reads admitted per window per address.
    pub read_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            key_length: 7,
            lifetime_minutes: 1440,
            cache_expiry_minutes: 10,
            cache_max_size_mb: 200,
            max_content_length_mb: 10,
            core_pool_size: 16,
            post_rate_limit_period_mins: 10,
            post_rate_limit: 30,
            read_rate_limit_period_mins: 10,
            read_rate_limit: 100,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, creating the file with defaults when
    /// it does not exist, then applies environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        } else {
            let config = Self::default();
            let text = serde_json::to_string_pretty(&config).expect("serialize default config");
            fs::write(path, text)
                .with_context(|| format!("failed to write default config {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote default config");
            config
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = env::var("BYTEDROP_HOST") {
            self.host = host;
        }
        if let Ok(port) = env::var("BYTEDROP_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("invalid BYTEDROP_PORT {port:?}"))?;
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Record lifetime.
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_minutes * 60)
    }

    /// Cache idle TTL / sweep interval.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_minutes * 60)
    }

    /// Cache weight budget in bytes.
    pub fn cache_max_bytes(&self) -> u64 {
        self.cache_max_size_mb * 1024 * 1024
    }

    /// Stored-size cap in bytes.
    pub fn max_content_length(&self) -> usize {
        (self.max_content_length_mb * 1024 * 1024) as usize
    }

    /// Upload rate-limit window.
    pub fn post_rate_period(&self) -> Duration {
        Duration::from_secs(self.post_rate_limit_period_mins * 60)
    }

    /// Read rate-limit window.
    pub fn read_rate_period(&self) -> Duration {
        Duration::from_secs(self.read_rate_limit_period_mins * 60)
    }
}
