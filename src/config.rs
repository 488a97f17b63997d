//! Configuration loading and management.
//!
//! This module provides layered configuration for the SDK using figment.
//! Configuration is loaded from (in order of priority):
//! 1. Default values (compiled in)
//! 2. Config file: `tracekit.toml` in the working directory (optional)
//! 3. Environment variables with the `TRACEKIT_` prefix
//!
//! Nested sections use a double underscore in environment variables so
//! section keys keep their own underscores:
//!
//! | Variable | Config path |
//! |----------|-------------|
//! | `TRACEKIT_API_KEY` | `api_key` |
//! | `TRACEKIT_API_URL` | `api_url` |
//! | `TRACEKIT_SAMPLE_RATE` | `sample_rate` |
//! | `TRACEKIT_TRANSPORT__MAX_BATCH_SIZE` | `transport.max_batch_size` |
//! | `TRACEKIT_STORAGE__DIRECTORY` | `storage.directory` |
//!
//! Most applications configure the SDK programmatically through
//! [`Config::builder`] instead.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "tracekit.toml";
const ENV_PREFIX: &str = "TRACEKIT_";

/// Default ingestion endpoint.
pub const DEFAULT_API_URL: &str = "https://app.tracekit.dev";

/// Fallback service name when neither config nor app context supplies one.
pub const DEFAULT_SERVICE_NAME: &str = "rust-app";

/// Main configuration struct for the SDK.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project API key. The SDK is inert without one.
    pub api_key: String,
    /// Ingestion endpoint base URL.
    pub api_url: String,
    /// Logical service name; falls back to the app bundle id, then to
    /// [`DEFAULT_SERVICE_NAME`].
    pub service_name: Option<String>,
    /// Deployment environment reported with every payload.
    pub environment: String,
    /// Application release or version string.
    pub release: Option<String>,
    /// Master switch; when false, payloads are accepted and dropped.
    pub enabled: bool,
    /// Emit payload contents to the log at debug level.
    pub debug: bool,
    /// Trace sampling rate in `[0, 1]`; applied when spans finish.
    pub sample_rate: f64,
    /// Ring buffer capacity for breadcrumbs.
    pub max_breadcrumbs: usize,
    /// Batching transport configuration.
    pub transport: TransportConfig,
    /// Durable storage configuration.
    pub storage: StorageConfig,
    /// Tracking helper configuration.
    pub instrumentation: InstrumentationConfig,
    /// Snapshot / code monitoring configuration.
    pub monitoring: MonitoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            service_name: None,
            environment: "production".to_string(),
            release: None,
            enabled: true,
            debug: false,
            sample_rate: 1.0,
            max_breadcrumbs: 100,
            transport: TransportConfig::default(),
            storage: StorageConfig::default(),
            instrumentation: InstrumentationConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from all sources.
    ///
    /// Configuration is loaded in the following order (later sources override
    /// earlier): defaults, `tracekit.toml` if it exists, then `TRACEKIT_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from a custom config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if config_path.as_ref().exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract()
    }

    /// Creates a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Whether a usable API key is present.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Resolves the service name against an optional app bundle id.
    pub fn resolved_service_name(&self, bundle_id: Option<&str>) -> String {
        self.service_name
            .clone()
            .or_else(|| bundle_id.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string())
    }

    /// Builds the URL exclusion filter from the instrumentation section.
    pub fn url_filter(&self) -> crate::sanitize::UrlFilter {
        crate::sanitize::UrlFilter::new(
            self.instrumentation.exclude_urls.clone(),
            self.instrumentation.exclude_url_patterns.clone(),
        )
    }
}

/// Batching transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Periodic flush interval in milliseconds.
    #[serde(with = "duration_ms")]
    pub flush_interval: Duration,
    /// Maximum payloads per flush; reaching it triggers an inline flush.
    pub max_batch_size: usize,
    /// Offline overflow queue capacity.
    pub max_queue_size: usize,
    /// HTTP request timeout in milliseconds.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    /// Additional headers to send with every export request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(30),
            max_batch_size: 50,
            max_queue_size: 1000,
            request_timeout: Duration::from_secs(10),
            headers: HashMap::new(),
        }
    }
}

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file-backed store; in-memory when unset.
    pub directory: Option<PathBuf>,
    /// Cap on each pending payload list; oldest entries are trimmed.
    pub max_pending_items: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_pending_items: 1000,
        }
    }
}

/// Tracking helper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Record spans for `track_network_request` calls.
    pub network: bool,
    /// Record spans for `track_screen` calls.
    pub navigation: bool,
    /// Substring patterns for URLs to exclude from network tracking.
    pub exclude_urls: Vec<String>,
    /// Compiled regex exclusions; only settable programmatically.
    #[serde(skip)]
    pub exclude_url_patterns: Vec<Regex>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            network: true,
            navigation: true,
            exclude_urls: Vec::new(),
            exclude_url_patterns: Vec::new(),
        }
    }
}

/// Snapshot / code monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Whether the snapshot client runs at all.
    pub enabled: bool,
    /// Breakpoint poll interval in milliseconds.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Builder for constructing configuration programmatically.
#[must_use = "builders do nothing unless .build() is called"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new config builder with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Sets the project API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    /// Sets the ingestion endpoint base URL.
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.config.api_url = api_url.into();
        self
    }

    /// Sets the logical service name.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = Some(name.into());
        self
    }

    /// Sets the deployment environment.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    /// Sets the application release string.
    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.config.release = Some(release.into());
        self
    }

    /// Enables or disables the SDK.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Enables debug logging of payload contents.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Sets the trace sampling rate.
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Sets the breadcrumb ring buffer capacity.
    pub fn max_breadcrumbs(mut self, max: usize) -> Self {
        self.config.max_breadcrumbs = max;
        self
    }

    /// Sets the periodic flush interval.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.transport.flush_interval = interval;
        self
    }

    /// Sets the flush batch size.
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.transport.max_batch_size = size;
        self
    }

    /// Sets the offline overflow queue capacity.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.transport.max_queue_size = size;
        self
    }

    /// Sets the HTTP request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.request_timeout = timeout;
        self
    }

    /// Adds a header to every export request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.transport.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the directory for the file-backed store.
    pub fn storage_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.storage.directory = Some(directory.into());
        self
    }

    /// Sets the cap on each pending payload list.
    pub fn max_pending_items(mut self, max: usize) -> Self {
        self.config.storage.max_pending_items = max;
        self
    }

    /// Enables or disables network request spans.
    pub fn network_tracing(mut self, enabled: bool) -> Self {
        self.config.instrumentation.network = enabled;
        self
    }

    /// Enables or disables screen tracking spans.
    pub fn navigation_tracing(mut self, enabled: bool) -> Self {
        self.config.instrumentation.navigation = enabled;
        self
    }

    /// Excludes URLs containing the given substring from network tracking.
    pub fn exclude_url(mut self, pattern: impl Into<String>) -> Self {
        self.config.instrumentation.exclude_urls.push(pattern.into());
        self
    }

    /// Excludes URLs matching the given regex from network tracking.
    pub fn exclude_url_pattern(mut self, pattern: Regex) -> Self {
        self.config
            .instrumentation
            .exclude_url_patterns
            .push(pattern);
        self
    }

    /// Enables or disables the snapshot client.
    pub fn code_monitoring(mut self, enabled: bool) -> Self {
        self.config.monitoring.enabled = enabled;
        self
    }

    /// Sets the breakpoint poll interval.
    pub fn monitoring_poll_interval(mut self, interval: Duration) -> Self {
        self.config.monitoring.poll_interval = interval;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
