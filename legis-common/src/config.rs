//! Configuration loading and resolution
//!
//! Config file resolution follows this priority order:
//! 1. Explicit path (command-line argument)
//! 2. `LEGIS_CONFIG` environment variable
//! 3. `<config dir>/legis/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! An explicit path that cannot be read is an error. A `LEGIS_CONFIG` path that
//! does not exist logs a warning and falls back to compiled defaults, as does a
//! missing default file. A file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LEGIS_CONFIG";

/// Batch size ceiling before an automatic flush
pub const DEFAULT_MAX_OPERATIONS: usize = 250;

/// Pause after every batch commit (milliseconds)
pub const DEFAULT_PAUSE_BETWEEN_BATCHES_MS: u64 = 500;

/// Complete configuration for an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
    pub progress: ProgressConfig,
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Write batching against the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Operations queued before the writer flushes on its own
    pub max_operations: usize,
    /// Pause after each commit, to stay under the store's ingestion limits
    pub pause_between_batches_ms: u64,
}

impl BatchConfig {
    pub fn pause_between_batches(&self) -> Duration {
        Duration::from_millis(self.pause_between_batches_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            pause_between_batches_ms: DEFAULT_PAUSE_BETWEEN_BATCHES_MS,
        }
    }
}

/// Fixed-delay retry bounds for remote calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total invocations, including the first one
    pub max_attempts: u32,
    /// Delay between attempts (not grown between attempts)
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

/// Pacing between successive upstream requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub pause_between_requests_ms: u64,
}

impl PacingConfig {
    pub fn pause_between_requests(&self) -> Duration {
        Duration::from_millis(self.pause_between_requests_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            pause_between_requests_ms: 250,
        }
    }
}

/// Slice of the 0-100 progress range owned by one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRange {
    pub start: u8,
    pub end: u8,
}

impl PhaseRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Width of the range (zero for an inverted range)
    pub fn weight(&self) -> u8 {
        self.end.saturating_sub(self.start)
    }

    /// Overall percent after `completed` of `total` units of this phase
    ///
    /// `round(completed / total * weight) + start`; a phase with no units is complete.
    pub fn percent(&self, completed: usize, total: usize) -> u8 {
        if total == 0 {
            return self.end;
        }
        let fraction = completed.min(total) as f64 / total as f64;
        let scaled = (fraction * self.weight() as f64).round() as u8;
        self.start.saturating_add(scaled).min(100)
    }
}

/// Partition of the progress range between phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub extract: PhaseRange,
    pub transform: PhaseRange,
    pub load: PhaseRange,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            extract: PhaseRange::new(0, 50),
            transform: PhaseRange::new(50, 75),
            load: PhaseRange::new(75, 100),
        }
    }
}

/// Upstream public API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API root, e.g. `https://api.example.org/v1`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Record field holding the document id
    pub id_field: String,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
            user_agent: format!("legis/{}", env!("CARGO_PKG_VERSION")),
            id_field: "id".to_string(),
        }
    }
}

/// Document store location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file; platform data directory when unset
    pub database_path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Logging defaults (overridden by `RUST_LOG`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl IngestConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Check tunables for values that would break a run
    ///
    /// Returns one message per problem; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.batch.max_operations == 0 {
            errors.push("batch.max_operations must be greater than zero".to_string());
        }
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }

        let ranges = [
            ("extract", self.progress.extract),
            ("transform", self.progress.transform),
            ("load", self.progress.load),
        ];
        for (name, range) in ranges {
            if range.start > range.end || range.end > 100 {
                errors.push(format!(
                    "progress.{} range {}-{} is not within 0-100 in ascending order",
                    name, range.start, range.end
                ));
            }
        }
        for pair in ranges.windows(2) {
            let (prev_name, prev) = pair[0];
            let (next_name, next) = pair[1];
            if next.start < prev.end {
                errors.push(format!(
                    "progress.{} starts before progress.{} ends",
                    next_name, prev_name
                ));
            }
        }

        errors
    }
}

/// Load configuration from a TOML file
pub fn load_config_file(path: &Path) -> Result<IngestConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    IngestConfig::from_toml_str(&content)
}

/// Platform config file location (`~/.config/legis/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("legis").join("config.toml"))
}

/// Platform database location (`~/.local/share/legis/documents.db` on Linux)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("legis"))
        .unwrap_or_else(|| PathBuf::from("./legis_data"))
        .join("documents.db")
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    DefaultFile(PathBuf),
    CompiledDefaults,
}

/// Resolves and loads the configuration following the priority order
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Pick the config source without reading it
    pub fn resolve_source(&self) -> ConfigSource {
        if let Some(path) = &self.explicit_path {
            return ConfigSource::CommandLine(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        match default_config_path() {
            Some(path) if path.exists() => ConfigSource::DefaultFile(path),
            _ => ConfigSource::CompiledDefaults,
        }
    }

    /// Load the configuration
    ///
    /// An explicit path that cannot be read is an error; an environment-named file
    /// that does not exist falls back to compiled defaults with a warning.
    pub fn load(&self) -> Result<(IngestConfig, ConfigSource)> {
        let source = self.resolve_source();

        let config = match &source {
            ConfigSource::CommandLine(path) => load_config_file(path)?,
            ConfigSource::Environment(path) => {
                if path.exists() {
                    load_config_file(path)?
                } else {
                    warn!(
                        "{} points to missing file {}; using compiled defaults",
                        CONFIG_ENV_VAR,
                        path.display()
                    );
                    IngestConfig::default()
                }
            }
            ConfigSource::DefaultFile(path) => load_config_file(path)?,
            ConfigSource::CompiledDefaults => {
                info!("No config file found; using compiled defaults");
                IngestConfig::default()
            }
        };

        Ok((config, source))
    }
}
