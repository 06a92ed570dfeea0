//! Configuration infrastructure
//!
//! All tunables of the export pipeline live here, layered from three
//! sources: compiled-in defaults, an optional TOML file, and environment
//! overrides (prefix `PORTAL_EXPORT`). The `defaults` module names the
//! fixed business rules so no magic number appears in pipeline code.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Named default values, documented where they are business rules.
pub mod defaults {
    /// Concurrency bound of the download orchestrator.
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 2;

    /// Total fetch attempts per order before a task turns terminal.
    pub const MAX_RETRY_ATTEMPTS: u32 = 5;

    /// Base delay of the exponential retry backoff.
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Debounce window for coalescing host-page mutation bursts.
    pub const DEBOUNCE_DELAY_MS: u64 = 250;

    /// How long a delivered export artifact stays referenced before the
    /// sink is asked to release it.
    pub const ARTIFACT_CLEANUP_DELAY_MS: u64 = 10_000;

    /// HTTP request timeout.
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// GraphQL endpoint of the dealer portal.
    pub const QUERY_ENDPOINT: &str = "https://portal.husqvarnagroup.com/api/graphql";

    /// Site identifier sent with every order query.
    pub const SITE_IDENTIFIER: &str = "de";

    pub const USER_AGENT: &str = "portal-order-export/0.2";
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub download: DownloadConfig,
    pub controller: ControllerConfig,
    pub http: HttpClientConfig,
    pub logging: LoggingConfig,
}

/// Download orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum concurrently fetching orders.
    pub max_concurrent_downloads: usize,

    /// Total attempts per order, first try included.
    pub max_retry_attempts: u32,

    /// Base backoff delay in milliseconds; attempt `n` waits
    /// `base * 2^(n-1)` before the next try.
    pub retry_base_delay_ms: u64,

    /// Delay before a delivered artifact is released, in milliseconds.
    pub artifact_cleanup_delay_ms: u64,

    /// Site identifier forming the cache key together with the order
    /// number.
    pub site: String,

    /// Early-payment discount applied during mapping.
    pub discount_factor: f64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: defaults::MAX_CONCURRENT_DOWNLOADS,
            max_retry_attempts: defaults::MAX_RETRY_ATTEMPTS,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            artifact_cleanup_delay_ms: defaults::ARTIFACT_CLEANUP_DELAY_MS,
            site: defaults::SITE_IDENTIFIER.to_string(),
            discount_factor: crate::domain::constants::DISCOUNT_FACTOR,
        }
    }
}

impl DownloadConfig {
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub fn artifact_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.artifact_cleanup_delay_ms)
    }
}

/// Re-extraction controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Debounce window in milliseconds.
    pub debounce_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce_delay_ms: defaults::DEBOUNCE_DELAY_MS,
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::QUERY_ENDPOINT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
            follow_redirects: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Enable console output.
    pub console_output: bool,
    /// Enable file output next to the executable.
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration by layering defaults, an optional file, and
    /// `PORTAL_EXPORT__*` environment overrides.
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&Self::default())
                .context("failed to serialize default configuration")?,
        );

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PORTAL_EXPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to assemble configuration")?;

        let loaded: Self = settings
            .try_deserialize()
            .context("configuration has invalid shape")?;

        info!(
            max_concurrent = loaded.download.max_concurrent_downloads,
            max_retries = loaded.download.max_retry_attempts,
            site = %loaded.download.site,
            "configuration loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reflect_the_documented_business_rules() {
        let config = AppConfig::default();
        assert_eq!(config.download.max_concurrent_downloads, 2);
        assert_eq!(config.download.max_retry_attempts, 5);
        assert!((config.download.discount_factor - 0.97).abs() < f64::EPSILON);
        assert_eq!(config.download.site, "de");
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(
            config.download.max_retry_attempts,
            defaults::MAX_RETRY_ATTEMPTS
        );
        assert_eq!(config.controller.debounce_delay_ms, defaults::DEBOUNCE_DELAY_MS);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.toml");
        std::fs::write(
            &path,
            "[download]\nmax_concurrent_downloads = 4\nsite = \"at\"\n",
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.download.max_concurrent_downloads, 4);
        assert_eq!(config.download.site, "at");
        // untouched sections keep their defaults
        assert_eq!(config.download.max_retry_attempts, 5);
    }
}
