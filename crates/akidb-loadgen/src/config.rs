//! Configuration for load test runs.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables (`AKIDB_LOADTEST_*`)
//! 3. TOML configuration file
//! 4. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::orchestrator::{RunConfig, DEFAULT_PROGRESS_INTERVAL};
use crate::profile::{ProfileEntry, ProfileTable};
use crate::rest::DEFAULT_MAX_IN_FLIGHT;
use crate::service::{IndexParams, SearchParams, DEFAULT_COLLECTION, DEFAULT_DIMENSION};

/// Main configuration structure for the load tester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadTestConfig {
    /// Target service
    #[serde(default)]
    pub target: TargetConfig,

    /// Phase timing and intensity
    #[serde(default)]
    pub run: RunSection,

    /// Vector and query shape
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Extra or replacement pressure tiers, keyed by level name
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend used to reach the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// AkiDB REST API over HTTP
    #[default]
    Rest,
    /// In-process simulated engine (dry run)
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(Self::Rest),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown backend `{other}` (expected rest or memory)")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => f.write_str("rest"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Target service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Service address (default: "localhost:19530")
    #[serde(default = "default_address")]
    pub address: String,

    /// Backend kind (default: rest)
    #[serde(default)]
    pub backend: Backend,

    /// Collection created and dropped by the run (default: "akidb_load_test")
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// HTTP requests the REST backend keeps open across all workers (default: 256)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_requests: usize,
}

/// Phase timing and intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    /// Insertion phase duration (default: "30s")
    #[serde(default = "default_duration", with = "duration_str")]
    pub duration: Duration,

    /// Search phase duration (default: a quarter of `duration`)
    #[serde(default, with = "option_duration_str", skip_serializing_if = "Option::is_none")]
    pub search_duration: Option<Duration>,

    /// Pressure level name (default: "medium")
    #[serde(default = "default_pressure")]
    pub pressure: String,

    /// Ramp batch size linearly during insertion (default: false)
    #[serde(default)]
    pub ramp_up: bool,

    /// Log throughput while phases run (default: false)
    #[serde(default)]
    pub real_time: bool,

    /// Interval between progress lines (default: "1s")
    #[serde(default = "default_progress_interval", with = "duration_str")]
    pub progress_interval: Duration,

    /// Seed for vector generation (default: 0)
    #[serde(default)]
    pub seed: u64,
}

/// Vector and query shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Vector dimension (default: 8)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Results per query (default: 3)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Query vectors per search request (default: 1)
    #[serde(default = "default_queries_per_request")]
    pub queries_per_request: usize,

    /// Worker count override for the resolved pressure level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Batch size override for the resolved pressure level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Index built after insertion
    #[serde(default)]
    pub index: IndexParams,

    /// Search-time parameters
    #[serde(default)]
    pub search: SearchParams,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty, json (default: "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_address() -> String {
    "localhost:19530".to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_duration() -> Duration {
    Duration::from_secs(30)
}

fn default_pressure() -> String {
    ProfileTable::DEFAULT_LEVEL.as_str().to_string()
}

fn default_progress_interval() -> Duration {
    DEFAULT_PROGRESS_INTERVAL
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_top_k() -> usize {
    3
}

fn default_queries_per_request() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            backend: Backend::default(),
            collection: default_collection(),
            timeout_seconds: default_timeout(),
            max_in_flight_requests: default_max_in_flight(),
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            search_duration: None,
            pressure: default_pressure(),
            ramp_up: false,
            real_time: false,
            progress_interval: default_progress_interval(),
            seed: 0,
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            top_k: default_top_k(),
            queries_per_request: default_queries_per_request(),
            workers: None,
            batch_size: None,
            index: IndexParams::default(),
            search: SearchParams::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoadTestConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file doesn't exist or has invalid TOML syntax.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Loads `path` (or defaults when `None`), applies environment overrides
    /// and validates the result.
    ///
    /// Supported environment variables:
    /// - `AKIDB_LOADTEST_ADDRESS` - Target address
    /// - `AKIDB_LOADTEST_BACKEND` - `rest` or `memory`
    /// - `AKIDB_LOADTEST_COLLECTION` - Collection name
    /// - `AKIDB_LOADTEST_MAX_IN_FLIGHT` - REST request cap
    /// - `AKIDB_LOADTEST_DURATION` - Insertion duration (`30s`, `2m`, ...)
    /// - `AKIDB_LOADTEST_SEARCH_DURATION` - Search duration
    /// - `AKIDB_LOADTEST_PRESSURE` - Pressure level
    /// - `AKIDB_LOADTEST_RAMP_UP` - `true`/`false`
    /// - `AKIDB_LOADTEST_SEED` - Vector seed
    /// - `AKIDB_LOADTEST_LOG_LEVEL` - Log level
    /// - `AKIDB_LOADTEST_LOG_FORMAT` - Log format
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var("AKIDB_LOADTEST_ADDRESS") {
            self.target.address = address;
        }

        if let Ok(backend) = std::env::var("AKIDB_LOADTEST_BACKEND") {
            if let Ok(backend) = backend.parse() {
                self.target.backend = backend;
            }
        }

        if let Ok(collection) = std::env::var("AKIDB_LOADTEST_COLLECTION") {
            self.target.collection = collection;
        }

        if let Ok(limit) = std::env::var("AKIDB_LOADTEST_MAX_IN_FLIGHT") {
            if let Ok(limit) = limit.parse() {
                self.target.max_in_flight_requests = limit;
            }
        }

        if let Ok(duration) = std::env::var("AKIDB_LOADTEST_DURATION") {
            if let Ok(duration) = parse_duration(&duration) {
                self.run.duration = duration;
            }
        }

        if let Ok(duration) = std::env::var("AKIDB_LOADTEST_SEARCH_DURATION") {
            if let Ok(duration) = parse_duration(&duration) {
                self.run.search_duration = Some(duration);
            }
        }

        if let Ok(pressure) = std::env::var("AKIDB_LOADTEST_PRESSURE") {
            self.run.pressure = pressure;
        }

        if let Ok(ramp_up) = std::env::var("AKIDB_LOADTEST_RAMP_UP") {
            if let Ok(ramp_up) = ramp_up.parse() {
                self.run.ramp_up = ramp_up;
            }
        }

        if let Ok(seed) = std::env::var("AKIDB_LOADTEST_SEED") {
            if let Ok(seed) = seed.parse() {
                self.run.seed = seed;
            }
        }

        if let Ok(level) = std::env::var("AKIDB_LOADTEST_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("AKIDB_LOADTEST_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.address.trim().is_empty() {
            return Err(ConfigError::validation("target.address must not be empty"));
        }

        if self.target.collection.trim().is_empty() {
            return Err(ConfigError::validation("target.collection must not be empty"));
        }

        if self.target.timeout_seconds == 0 {
            return Err(ConfigError::validation("target.timeout_seconds must be non-zero"));
        }

        if self.target.max_in_flight_requests == 0 {
            return Err(ConfigError::validation(
                "target.max_in_flight_requests must be non-zero",
            ));
        }

        if self.run.duration.is_zero() {
            return Err(ConfigError::validation("run.duration must be non-zero"));
        }

        if self.run.search_duration == Some(Duration::ZERO) {
            return Err(ConfigError::validation("run.search_duration must be non-zero"));
        }

        if self.run.progress_interval.is_zero() {
            return Err(ConfigError::validation("run.progress_interval must be non-zero"));
        }

        if self.workload.dimension == 0 {
            return Err(ConfigError::validation("workload.dimension must be non-zero"));
        }

        if self.workload.top_k == 0 {
            return Err(ConfigError::validation("workload.top_k must be non-zero"));
        }

        if self.workload.queries_per_request == 0 {
            return Err(ConfigError::validation(
                "workload.queries_per_request must be non-zero",
            ));
        }

        if self.workload.workers == Some(0) || self.workload.batch_size == Some(0) {
            return Err(ConfigError::validation(
                "workload.workers and workload.batch_size must be non-zero",
            ));
        }

        if self.workload.index.nlist == 0 || self.workload.search.nprobe == 0 {
            return Err(ConfigError::validation(
                "workload.index.nlist and workload.search.nprobe must be non-zero",
            ));
        }

        for (name, entry) in &self.profiles {
            if entry.workers == 0 || entry.batch_size == 0 {
                return Err(ConfigError::validation(format!(
                    "profiles.{name} must have non-zero workers and batch_size"
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }

    /// Built-in pressure tiers with `[profiles.*]` layered on top.
    #[must_use]
    pub fn profile_table(&self) -> ProfileTable {
        ProfileTable::default().merged_with(&self.profiles)
    }

    /// Resolves the pressure level and builds the parameters for one run.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        let profile = self
            .profile_table()
            .resolve(Some(&self.run.pressure))
            .with_overrides(self.workload.workers, self.workload.batch_size);

        RunConfig {
            address: self.target.address.clone(),
            collection: self.target.collection.clone(),
            dimension: self.workload.dimension,
            duration: self.run.duration,
            search_duration: self.run.search_duration,
            profile,
            ramp_up: self.run.ramp_up,
            real_time: self.run.real_time,
            progress_interval: self.run.progress_interval,
            seed: self.run.seed,
            top_k: self.workload.top_k,
            queries_per_request: self.workload.queries_per_request,
            index: self.workload.index.clone(),
            search: self.workload.search.clone(),
            stop_after_batches: None,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Creates a `ValidationError` variant.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

/// Parses a duration such as `30s`, `2m`, `1h`, `1m30s`, `1.5s` or `500ms`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(format!("invalid duration `{input}`: expected a number"));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid duration `{input}`: bad number"))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "" => return Err(format!("invalid duration `{input}`: missing unit")),
            unit => return Err(format!("invalid duration `{input}`: unknown unit `{unit}`")),
        };
        nanos += value * scale;
        rest = &rest[unit_end..];
    }

    if nanos > u64::MAX as f64 {
        return Err(format!("invalid duration `{input}`: out of range"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Formats a duration in the syntax accepted by [`parse_duration`].
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let subsec = duration.subsec_nanos();
    if subsec != 0 {
        if subsec % 1_000_000 == 0 {
            return format!("{}ms", duration.as_millis());
        }
        return format!("{}ns", duration.as_nanos());
    }

    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3_600, secs / 60 % 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod option_duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_str(&super::format_duration(*duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| super::parse_duration(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoadTestConfig::default();

        assert_eq!(config.target.address, "localhost:19530");
        assert_eq!(config.target.backend, Backend::Rest);
        assert_eq!(config.target.collection, "akidb_load_test");
        assert_eq!(config.run.duration, Duration::from_secs(30));
        assert_eq!(config.run.pressure, "medium");
        assert_eq!(config.workload.dimension, 8);
        assert_eq!(config.workload.index.nlist, 16);
        assert_eq!(config.workload.search.nprobe, 10);
        assert_eq!(config.target.max_in_flight_requests, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3_600)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1_500)));
        assert_eq!(parse_duration(" 0 "), Ok(Duration::ZERO));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3_600)), "1h");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");

        let odd = Duration::from_secs(7_261);
        assert_eq!(parse_duration(&format_duration(odd)), Ok(odd));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            [target]
            address = "http://127.0.0.1:8080"
            backend = "memory"
            max_in_flight_requests = 8

            [run]
            duration = "1m30s"
            search_duration = "10s"
            pressure = "HIGH"
            ramp_up = true
            seed = 42

            [workload]
            dimension = 128
            batch_size = 250

            [workload.index]
            index_type = "IVF_FLAT"
            metric = "cosine"
            nlist = 64

            [profiles.burst]
            workers = 200
            batch_size = 50

            [logging]
            format = "json"
        "#;

        let config: LoadTestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.backend, Backend::Memory);
        assert_eq!(config.target.collection, "akidb_load_test");
        assert_eq!(config.target.max_in_flight_requests, 8);
        assert_eq!(config.run.duration, Duration::from_secs(90));
        assert_eq!(config.run.search_duration, Some(Duration::from_secs(10)));
        assert!(config.run.ramp_up);
        assert_eq!(config.workload.index.nlist, 64);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());

        let run = config.run_config();
        assert_eq!(run.profile.level, "high");
        assert_eq!(run.profile.workers, 50);
        assert_eq!(run.profile.batch_size, 250);
        assert_eq!(run.dimension, 128);
        assert_eq!(run.effective_search_duration(), Duration::from_secs(10));

        assert_eq!(config.profile_table().get("burst"), Some(&ProfileEntry::new(200, 50)));
    }

    #[test]
    fn test_bad_duration_in_toml() {
        let result: Result<LoadTestConfig, _> = toml::from_str("[run]\nduration = \"soon\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_serialization_round_trip() {
        let mut config = LoadTestConfig::default();
        config.run.search_duration = Some(Duration::from_millis(7_500));

        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("duration = \"30s\""));

        let parsed: LoadTestConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_validation_zero_dimension() {
        let mut config = LoadTestConfig::default();
        config.workload.dimension = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("workload.dimension must be non-zero"));
    }

    #[test]
    fn test_config_validation_zero_in_flight() {
        let mut config = LoadTestConfig::default();
        config.target.max_in_flight_requests = 0;

        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("target.max_in_flight_requests must be non-zero"));
    }

    #[test]
    fn test_config_validation_zero_profile() {
        let mut config = LoadTestConfig::default();
        config.profiles.insert("empty".to_string(), ProfileEntry::new(0, 100));

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = LoadTestConfig::default();
        config.logging.format = "xml".to_string();

        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("logging.format must be"));
    }

    #[test]
    fn test_unknown_pressure_falls_back() {
        let mut config = LoadTestConfig::default();
        config.run.pressure = "ludicrous".to_string();

        let run = config.run_config();
        assert_eq!(run.profile.level, "medium");
        assert!(run.profile.defaulted);
        assert_eq!(run.profile.workers, 20);
    }

    #[test]
    fn test_load_missing_file() {
        let result = LoadTestConfig::load(Some(Path::new("/nonexistent/loadtest.toml")));
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("AKIDB_LOADTEST_COLLECTION", "env_collection");
        std::env::set_var("AKIDB_LOADTEST_DURATION", "2m");
        std::env::set_var("AKIDB_LOADTEST_BACKEND", "memory");
        std::env::set_var("AKIDB_LOADTEST_SEED", "not-a-number");

        let mut config = LoadTestConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.target.collection, "env_collection");
        assert_eq!(config.run.duration, Duration::from_secs(120));
        assert_eq!(config.target.backend, Backend::Memory);
        assert_eq!(config.run.seed, 0);

        // Clean up
        std::env::remove_var("AKIDB_LOADTEST_COLLECTION");
        std::env::remove_var("AKIDB_LOADTEST_DURATION");
        std::env::remove_var("AKIDB_LOADTEST_BACKEND");
        std::env::remove_var("AKIDB_LOADTEST_SEED");
    }
}
