use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Configuration - layered with Figment
// ============================================================================
//
// Precedence, lowest first:
// 1. Built-in defaults
// 2. order_fetch.toml (or the file given on the command line)
// 3. ORDER_FETCH_* environment variables, nested with `__`
//    e.g. ORDER_FETCH_FETCH__MAX_ROWS=500
//
// ============================================================================

pub const DEFAULT_CONFIG_FILE: &str = "order_fetch.toml";
pub const ENV_PREFIX: &str = "ORDER_FETCH_";

/// Upper bound for `fetch.max_rows`.
pub const MAX_ROWS_LIMIT: usize = 100_000;

/// Knobs of the fetching core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Rows materialized per root query; later rows are dropped.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_max_name_pattern_len")]
    pub max_name_pattern_len: usize,

    /// Fail, rather than fetch, when a strategy that promised no
    /// secondary lookups needs one.
    #[serde(default)]
    pub strict_fetch: bool,

    /// Deadline applied per unit of work. None leaves timeouts to the store.
    #[serde(default)]
    pub store_timeout_ms: Option<u64>,
}

impl FetchConfig {
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            bail!("fetch.max_rows must be at least 1");
        }
        if self.max_rows > MAX_ROWS_LIMIT {
            bail!(
                "fetch.max_rows must be at most {} (got {})",
                MAX_ROWS_LIMIT,
                self.max_rows
            );
        }
        if self.max_name_pattern_len == 0 {
            bail!("fetch.max_name_pattern_len must be at least 1");
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            max_name_pattern_len: default_max_name_pattern_len(),
            strict_fetch: false,
            store_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string; the seeded in-memory store is used when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Serve Prometheus metrics on this port when set.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: default_pool_size(),
            metrics_port: None,
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from defaults, the config file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: AppConfig = Self::figment(path).extract()?;
        config.fetch.validate()?;
        Ok(config)
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        tracing::debug!("Loading configuration from: {}", path.display());

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(AppConfig::default()))
            // Missing files are skipped
            .merge(Toml::file(path))
            // Environment variables have highest priority
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

fn default_max_rows() -> usize {
    1000
}

fn default_max_name_pattern_len() -> usize {
    64
}

fn default_pool_size() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.fetch.max_rows, 1000);
        assert_eq!(config.fetch.max_name_pattern_len, 64);
        assert!(!config.fetch.strict_fetch);
        assert!(config.fetch.store_timeout().is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(
                r#"
                metrics_port = 9090

                [fetch]
                max_rows = 250
                strict_fetch = true
                store_timeout_ms = 1500
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.metrics_port, Some(9090));
        assert_eq!(config.fetch.max_rows, 250);
        assert!(config.fetch.strict_fetch);
        assert_eq!(config.fetch.store_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.fetch.max_name_pattern_len, 64);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config: AppConfig = AppConfig::figment(Some(Path::new("does/not/exist.toml")))
            .extract()
            .unwrap();
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn test_zero_row_cap_rejected() {
        let fetch = FetchConfig {
            max_rows: 0,
            ..FetchConfig::default()
        };
        assert!(fetch.validate().is_err());
    }

    #[test]
    fn test_row_cap_upper_bound() {
        let at_limit = FetchConfig {
            max_rows: MAX_ROWS_LIMIT,
            ..FetchConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        let huge = FetchConfig {
            max_rows: usize::MAX,
            ..FetchConfig::default()
        };
        let err = huge.validate().unwrap_err();
        assert!(err.to_string().contains("at most"));
    }
}
