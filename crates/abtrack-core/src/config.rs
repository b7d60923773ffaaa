use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Upper bound for day-valued settings. Keeps every derived window and expiry
/// inside chrono's representable range.
pub const MAX_DAYS: u32 = 36_500;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    /// Maximum records returned by one range-query page.
    pub page_size: usize,
    /// Aggregation gives up after this many pages.
    pub max_pages: usize,
    /// Days until a written event expires. `0` disables expiry.
    pub event_ttl_days: u32,
    /// Length of the trailing stats window when the caller supplies no `from`.
    pub default_window_days: u32,
    pub request_timeout_secs: u64,
    /// Interval of the background TTL sweep. `0` disables the sweep.
    pub expiry_interval_secs: u64,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    DuckDb,
    Memory,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            store: StoreBackend::DuckDb,
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            page_size: 1000,
            max_pages: 10_000,
            event_ttl_days: 30,
            default_window_days: 30,
            request_timeout_secs: 30,
            expiry_interval_secs: 3600,
            cors_origins: Vec::new(),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn ensure(
    key: &'static str,
    value: impl std::fmt::Display,
    ok: bool,
    reason: &str,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes
    /// `std::env::var`; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let store = match lookup("ABTRACK_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("duckdb") => StoreBackend::DuckDb,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ABTRACK_STORE",
                    value: other.to_string(),
                    reason: "expected duckdb or memory".to_string(),
                })
            }
        };
        let page_size: usize = parse_or(&lookup, "ABTRACK_PAGE_SIZE", defaults.page_size)?;
        ensure("ABTRACK_PAGE_SIZE", page_size, page_size > 0, "must be at least 1")?;

        let event_ttl_days: u32 =
            parse_or(&lookup, "ABTRACK_EVENT_TTL_DAYS", defaults.event_ttl_days)?;
        ensure(
            "ABTRACK_EVENT_TTL_DAYS",
            event_ttl_days,
            event_ttl_days <= MAX_DAYS,
            "must be at most 36500",
        )?;

        let default_window_days: u32 = parse_or(
            &lookup,
            "ABTRACK_DEFAULT_WINDOW_DAYS",
            defaults.default_window_days,
        )?;
        ensure(
            "ABTRACK_DEFAULT_WINDOW_DAYS",
            default_window_days,
            default_window_days <= MAX_DAYS,
            "must be at most 36500",
        )?;

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            "ABTRACK_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout_secs,
        )?;
        ensure(
            "ABTRACK_REQUEST_TIMEOUT_SECS",
            request_timeout_secs,
            request_timeout_secs > 0,
            "must be at least 1",
        )?;

        Ok(Self {
            port: parse_or(&lookup, "ABTRACK_PORT", defaults.port)?,
            store,
            data_dir: lookup("ABTRACK_DATA_DIR").unwrap_or(defaults.data_dir),
            duckdb_memory_limit: lookup("ABTRACK_DUCKDB_MEMORY")
                .unwrap_or(defaults.duckdb_memory_limit),
            page_size,
            max_pages: parse_or(&lookup, "ABTRACK_MAX_PAGES", defaults.max_pages)?,
            event_ttl_days,
            default_window_days,
            request_timeout_secs,
            expiry_interval_secs: parse_or(
                &lookup,
                "ABTRACK_EXPIRY_INTERVAL_SECS",
                defaults.expiry_interval_secs,
            )?,
            cors_origins: lookup("ABTRACK_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn expiry_interval(&self) -> Option<Duration> {
        (self.expiry_interval_secs > 0).then(|| Duration::from_secs(self.expiry_interval_secs))
    }

    pub fn event_ttl(&self) -> Option<chrono::Duration> {
        (self.event_ttl_days > 0).then(|| chrono::Duration::days(i64::from(self.event_ttl_days)))
    }

    pub fn default_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.default_window_days))
    }
}
