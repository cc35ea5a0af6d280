use anyhow::{Context, Result};
use std::str::FromStr;

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    /// A device whose last heartbeat is older than this is offline.
    pub heartbeat_threshold: chrono::Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite:./data/chaos_devices.db".to_string(),
            port: 8080,
            max_connections: 10,
            heartbeat_threshold: chrono::Duration::seconds(60),
            default_page_size: 20,
            max_page_size: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let heartbeat_secs: i64 = parse_or(&lookup, "CHAOS_HEARTBEAT_THRESHOLD_SECS", 60)?;
        if heartbeat_secs <= 0 {
            anyhow::bail!("CHAOS_HEARTBEAT_THRESHOLD_SECS must be positive, got {}", heartbeat_secs);
        }

        let config = Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            max_connections: parse_or(&lookup, "CHAOS_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            heartbeat_threshold: chrono::Duration::seconds(heartbeat_secs),
            default_page_size: parse_or(&lookup, "CHAOS_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: parse_or(&lookup, "CHAOS_MAX_PAGE_SIZE", defaults.max_page_size)?,
        };

        if config.max_page_size == 0 || config.default_page_size == 0 {
            anyhow::bail!("page sizes must be at least 1");
        }
        if config.default_page_size > config.max_page_size {
            anyhow::bail!(
                "CHAOS_DEFAULT_PAGE_SIZE ({}) exceeds CHAOS_MAX_PAGE_SIZE ({})",
                config.default_page_size,
                config.max_page_size
            );
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
