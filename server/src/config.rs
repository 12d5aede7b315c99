//! Process configuration read from the environment.
//!
//! Every setting has a default, so an empty environment yields a working
//! configuration pointed at `mongodb://mongo:27017`. Numeric values that do
//! not parse fall back to their default with a warning.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_MONGO_URI: &str = "mongodb://mongo:27017";
pub const DEFAULT_DATABASE: &str = "todos_db";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 120;
/// Floor for `DB_WAIT_INTERVAL_MS` so the startup wait never busy-loops.
pub const MIN_WAIT_INTERVAL_MS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown STORE_BACKEND {0:?} (expected \"mongo\" or \"memory\")")]
    UnknownBackend(String),

    #[error("invalid BIND_ADDR {0:?}")]
    InvalidBindAddr(String),

    #[error("MONGO_MIN_POOL_SIZE ({min}) exceeds MONGO_MAX_POOL_SIZE ({max})")]
    PoolBounds { min: u32, max: u32 },
}

/// Which `TodoStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Connection settings for the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
    /// Bound on server selection for the pooled client.
    pub connect_timeout: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MONGO_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            min_pool_size: 10,
            max_pool_size: 50,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Startup wait settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub enabled: bool,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            interval: Duration::from_secs(1),
        }
    }
}

/// Settings consumed by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSettings {
    pub max_page_size: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: SocketAddr,
    pub backend: StoreBackend,
    pub mongo: MongoConfig,
    pub wait: WaitConfig,
    pub api: ApiSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = match get("BIND_ADDR") {
            Some(raw) => raw
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidBindAddr(raw))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT);

        let backend = match get("STORE_BACKEND").as_deref() {
            None | Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let defaults = MongoConfig::default();
        let mongo = MongoConfig {
            uri: get("MONGO_URI").unwrap_or(defaults.uri),
            database: get("MONGO_DB").unwrap_or(defaults.database),
            min_pool_size: parse_or(
                get("MONGO_MIN_POOL_SIZE"),
                "MONGO_MIN_POOL_SIZE",
                defaults.min_pool_size,
            ),
            max_pool_size: parse_or(
                get("MONGO_MAX_POOL_SIZE"),
                "MONGO_MAX_POOL_SIZE",
                defaults.max_pool_size,
            ),
            connect_timeout: defaults.connect_timeout,
        };
        if mongo.min_pool_size > mongo.max_pool_size {
            return Err(ConfigError::PoolBounds {
                min: mongo.min_pool_size,
                max: mongo.max_pool_size,
            });
        }

        let wait = WaitConfig {
            enabled: get("RUN_DB_WAIT").as_deref() != Some("0"),
            timeout: Duration::from_secs(parse_or(
                get("DB_WAIT_TIMEOUT"),
                "DB_WAIT_TIMEOUT",
                DEFAULT_WAIT_TIMEOUT_SECS,
            )),
            interval: Duration::from_millis(
                parse_or::<u64>(get("DB_WAIT_INTERVAL_MS"), "DB_WAIT_INTERVAL_MS", 1000)
                    .max(MIN_WAIT_INTERVAL_MS),
            ),
        };

        let api = ApiSettings {
            max_page_size: parse_or(get("MAX_PAGE_SIZE"), "MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)
                .max(1),
        };

        Ok(Self {
            bind: SocketAddr::new(host, port),
            backend,
            mongo,
            wait,
            api,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, %default, "ignoring unparsable setting");
            default
        }),
    }
}
