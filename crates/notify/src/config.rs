//! Engine configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

/// Errors raised while reading configuration. Fatal at start-up.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the notification catalog is loaded from at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// The JSON file at `catalog_path`.
    File,
    /// The `notification_catalog` table.
    Database,
}

impl FromStr for CatalogSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "db" | "database" => Ok(Self::Database),
            other => Err(format!("expected \"file\" or \"db\", got {other:?}")),
        }
    }
}

/// Push provider connection settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-request timeout for send and device-state calls.
    pub timeout: Duration,
}

/// Runtime configuration for the dispatcher, the reconciliation job and the
/// worker binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub catalog_source: CatalogSource,
    pub catalog_path: PathBuf,
    pub provider: ProviderConfig,
    /// Candidates processed concurrently within one dispatch (default: `16`).
    pub dispatch_concurrency: usize,
    /// Wall-clock offset used to evaluate every type's quiet hours.
    pub quiet_hours_offset: FixedOffset,
    pub reconcile_batch_size: usize,
    pub reconcile_interval: Duration,
}

impl EngineConfig {
    pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 16;
    pub const DEFAULT_RECONCILE_BATCH_SIZE: usize = 200;

    /// Load configuration from environment variables.
    ///
    /// | Env Var                          | Default                              |
    /// |----------------------------------|--------------------------------------|
    /// | `DATABASE_URL`                   | (required)                           |
    /// | `NOTIFICATION_CATALOG_SOURCE`    | `file` (`file` or `db`)              |
    /// | `NOTIFICATION_CATALOG_PATH`      | `config/notification_catalog.json`   |
    /// | `PUSH_PROVIDER_URL`              | (required)                           |
    /// | `PUSH_PROVIDER_API_KEY`          | unset                                |
    /// | `PUSH_PROVIDER_TIMEOUT_SECS`     | `10`                                 |
    /// | `DISPATCH_CONCURRENCY`           | `16`                                 |
    /// | `QUIET_HOURS_UTC_OFFSET_MINUTES` | `0`                                  |
    /// | `RECONCILE_BATCH_SIZE`           | `200`                                |
    /// | `RECONCILE_INTERVAL_SECS`        | `3600`                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let catalog_source = parse_or(&lookup, "NOTIFICATION_CATALOG_SOURCE", CatalogSource::File)?;
        let catalog_path = lookup("NOTIFICATION_CATALOG_PATH")
            .unwrap_or_else(|| "config/notification_catalog.json".into())
            .into();

        let provider = ProviderConfig {
            base_url: required("PUSH_PROVIDER_URL")?
                .trim_end_matches('/')
                .to_string(),
            api_key: lookup("PUSH_PROVIDER_API_KEY").filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(parse_or(&lookup, "PUSH_PROVIDER_TIMEOUT_SECS", 10u64)?),
        };

        let dispatch_concurrency = parse_or(
            &lookup,
            "DISPATCH_CONCURRENCY",
            Self::DEFAULT_DISPATCH_CONCURRENCY,
        )?;
        if dispatch_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "DISPATCH_CONCURRENCY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let offset_minutes: i32 = parse_or(&lookup, "QUIET_HOURS_UTC_OFFSET_MINUTES", 0)?;
        let quiet_hours_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                name: "QUIET_HOURS_UTC_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
                reason: "offset must be within +/- 24h".into(),
            })?;

        let reconcile_batch_size = parse_or(
            &lookup,
            "RECONCILE_BATCH_SIZE",
            Self::DEFAULT_RECONCILE_BATCH_SIZE,
        )?
        .max(1);
        let reconcile_interval =
            Duration::from_secs(parse_or(&lookup, "RECONCILE_INTERVAL_SECS", 3600u64)?.max(1));

        Ok(Self {
            database_url,
            catalog_source,
            catalog_path,
            provider,
            dispatch_concurrency,
            quiet_hours_offset,
            reconcile_batch_size,
            reconcile_interval,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
