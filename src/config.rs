//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! command-line flags.
//!
//! ```yaml
//! pages: 2
//! lang: en
//! max_workers: 40
//! search:
//!   area: com
//!   time_period: week
//!   sort_by_date: true
//! retry:
//!   attempts: 3
//!   delay_secs: 0.25
//! http:
//!   timeout_secs: 20
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::harness::{HarnessError, MismatchPolicy, PoolConfig, Retry, retry};
use crate::news::DEFAULT_ARTICLE_WORKERS;
use crate::scrapers::search::SearchOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: retry::DEFAULT_ATTEMPTS,
            delay_secs: retry::DEFAULT_DELAY.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("news_pool/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pages: u32,
    pub lang: String,
    pub max_workers: usize,
    pub mismatch: MismatchPolicy,
    pub search: SearchOptions,
    pub retry: RetrySettings,
    pub http: HttpSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pages: 2,
            lang: "en".to_string(),
            max_workers: DEFAULT_ARTICLE_WORKERS,
            mismatch: MismatchPolicy::default(),
            search: SearchOptions::default(),
            retry: RetrySettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the YAML file at `path` when one is given.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply flags given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(pages) = cli.pages {
            self.pages = pages;
        }
        if let Some(lang) = &cli.lang {
            self.lang = lang.clone();
        }
        if let Some(area) = &cli.area {
            self.search.area = area.clone();
        }
        if cli.ncr {
            self.search.ncr = true;
        }
        if cli.time_period.is_some() {
            self.search.time_period = cli.time_period;
        }
        if cli.no_sort_by_date {
            self.search.sort_by_date = false;
        }
        if let Some(first_page) = cli.first_page {
            self.search.first_page = first_page;
        }
        if let Some(max_workers) = cli.max_workers {
            self.max_workers = max_workers;
        }
        if let Some(attempts) = cli.retries {
            self.retry.attempts = attempts;
        }
        if let Some(delay) = cli.retry_delay {
            self.retry.delay_secs = delay;
        }
    }

    /// Retry policy for HTTP requests.
    pub fn http_retry(&self) -> Result<Retry, HarnessError> {
        Retry::new("http_get")
            .with_attempts(self.retry.attempts)?
            .with_delay_secs(self.retry.delay_secs)
    }

    /// Fire-and-forget pool for article downloads.
    pub fn article_pool(&self) -> PoolConfig {
        PoolConfig::default()
            .with_max_workers(Some(self.max_workers))
            .with_mismatch(self.mismatch)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::search::TimePeriod;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pages, 2);
        assert_eq!(config.lang, "en");
        assert_eq!(config.max_workers, 40);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay_secs, 0.25);
        assert!(config.search.sort_by_date);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "pages: 5\nsearch:\n  time_period: month\nretry:\n  attempts: 4\n",
        )
        .unwrap();
        assert_eq!(config.pages, 5);
        assert_eq!(config.search.time_period, Some(TimePeriod::Month));
        assert_eq!(config.search.area, "com");
        assert_eq!(config.retry.attempts, 4);
        assert_eq!(config.retry.delay_secs, 0.25);
        assert_eq!(config.lang, "en");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = AppConfig::load(Some("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig::from_yaml("pages: 5\nlang: fr\n").unwrap();
        let cli = Cli::parse_from(["news_pool", "q", "-p", "1", "--retries", "2", "--ncr"]);
        config.apply_cli(&cli);
        assert_eq!(config.pages, 1);
        assert_eq!(config.lang, "fr");
        assert_eq!(config.retry.attempts, 2);
        assert!(config.search.ncr);
    }

    #[test]
    fn test_invalid_retry_settings_are_rejected() {
        let mut config = AppConfig::default();
        config.retry.attempts = 0;
        assert!(config.http_retry().is_err());

        config.retry.attempts = 2;
        config.retry.delay_secs = -0.5;
        assert!(config.http_retry().is_err());
    }

    #[test]
    fn test_article_pool_is_fire_and_forget() {
        let pool = AppConfig::default().article_pool();
        assert_eq!(pool.max_workers, 40);
        assert!(!pool.return_val);
    }
}
