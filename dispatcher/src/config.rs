//! Dispatcher configuration
//!
//! Loaded from a TOML file or from `DISPATCHER_*` environment variables (a `.env` file is read
//! first when present).

use crate::{DispatchError, Result};
use ledger_core::{AccountId, Asset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// String that never shows up in `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw value
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queue database
    pub database: DatabaseConfig,

    /// Ledger gateway
    pub gateway: GatewayConfig,

    /// Network and envelope parameters
    pub network: NetworkConfig,

    /// Signing identities
    pub signers: SignerConfig,

    /// Polling
    pub dispatch: DispatchConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string (may contain credentials)
    pub url: Secret,

    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Secret::new("postgres://localhost/dispatcher"),
            max_connections: 10,
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the REST gateway
    pub url: String,

    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl GatewayConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Passphrase the network id is derived from
    pub passphrase: String,

    /// `native` or `CODE:ISSUER`
    pub asset: String,

    /// Fee per operation
    pub base_fee: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            passphrase: "Test SDF Network ; September 2015".to_string(),
            asset: "native".to_string(),
            base_fee: 100,
        }
    }
}

impl NetworkConfig {
    /// Parse the configured asset
    pub fn asset(&self) -> Result<Asset> {
        let raw = self.asset.trim();
        if raw.eq_ignore_ascii_case("native") {
            return Ok(Asset::Native);
        }
        match raw.split_once(':') {
            Some((code, issuer)) if !issuer.is_empty() => {
                Ok(Asset::credit(code, AccountId::new(issuer))?)
            }
            _ => Err(DispatchError::Config(format!(
                "asset must be 'native' or 'CODE:ISSUER', got '{}'",
                raw
            ))),
        }
    }
}

/// Signing identities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Hex seed of the account payments are sent from
    pub funding_seed: Secret,

    /// Hex seeds of the channel accounts
    pub channel_seeds: Vec<Secret>,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Interval between claim attempts (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
        }
    }
}

impl DispatchConfig {
    /// Interval between claim attempts
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| DispatchError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, starting from defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(url) = lookup("DISPATCHER_DATABASE_URL") {
            config.database.url = Secret::new(url);
        }
        if let Some(n) = lookup("DISPATCHER_DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections =
                parse_var("DISPATCHER_DATABASE_MAX_CONNECTIONS", &n)?;
        }
        if let Some(url) = lookup("DISPATCHER_GATEWAY_URL") {
            config.gateway.url = url;
        }
        if let Some(ms) = lookup("DISPATCHER_GATEWAY_TIMEOUT_MS") {
            config.gateway.timeout_ms = parse_var("DISPATCHER_GATEWAY_TIMEOUT_MS", &ms)?;
        }
        if let Some(passphrase) = lookup("DISPATCHER_NETWORK_PASSPHRASE") {
            config.network.passphrase = passphrase;
        }
        if let Some(asset) = lookup("DISPATCHER_ASSET") {
            config.network.asset = asset;
        }
        if let Some(fee) = lookup("DISPATCHER_BASE_FEE") {
            config.network.base_fee = parse_var("DISPATCHER_BASE_FEE", &fee)?;
        }
        if let Some(seed) = lookup("DISPATCHER_FUNDING_SEED") {
            config.signers.funding_seed = Secret::new(seed);
        }
        if let Some(seeds) = lookup("DISPATCHER_CHANNEL_SEEDS") {
            config.signers.channel_seeds = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Secret::new)
                .collect();
        }
        if let Some(ms) = lookup("DISPATCHER_POLL_INTERVAL_MS") {
            config.dispatch.poll_interval_ms = parse_var("DISPATCHER_POLL_INTERVAL_MS", &ms)?;
        }

        Ok(config)
    }

    /// Reject configurations the dispatcher cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.signers.channel_seeds.is_empty() {
            return Err(DispatchError::Config("at least one channel seed is required".into()));
        }
        if self.signers.funding_seed.is_empty() {
            return Err(DispatchError::Config("funding seed is required".into()));
        }
        if self.dispatch.poll_interval_ms == 0 {
            return Err(DispatchError::Config("poll interval must be positive".into()));
        }
        if self.network.base_fee == 0 {
            return Err(DispatchError::Config("base fee must be positive".into()));
        }
        if self.database.max_connections == 0 {
            return Err(DispatchError::Config(
                "database pool needs at least one connection".into(),
            ));
        }
        self.network.asset()?;
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DispatchError::Config(format!("{}='{}': {}", key, value, e)))
}
