//! Configuration module for dcbulk.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::transfer::{ResolutionStrategy, Velocity};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for dcbulk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transfer: TransferConfig,
    pub keys: KeysConfig,
    pub logging: LoggingConfig,
}

/// Upload batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Default velocity: `low`, `normal`, or `high`.
    pub velocity: String,
    /// Maximum in-flight uploads per velocity level.
    pub velocity_limits: VelocityLimits,
    /// Default resolution strategy: `fail`, `overwrite`, or `autorename`.
    pub default_strategy: String,
    /// Sibling folders created in parallel during replication.
    pub folder_concurrency: usize,
    /// Page size used when listing a parent's children.
    pub listing_page_size: usize,
}

/// In-flight upload limits for each velocity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityLimits {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
}

/// Key distribution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Users equipped in parallel.
    pub concurrency: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dcbulk/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dcbulk")
            .join("config.yaml")
    }
}

impl TransferConfig {
    /// Parsed default velocity.
    pub fn velocity(&self) -> Result<Velocity, DomainError> {
        self.velocity.parse()
    }

    /// Parsed default resolution strategy.
    pub fn strategy(&self) -> Result<ResolutionStrategy, DomainError> {
        self.default_strategy.parse()
    }

    /// In-flight upload limit for `velocity`, never below 1.
    pub fn velocity_limit(&self, velocity: Velocity) -> usize {
        let limit = match velocity {
            Velocity::Low => self.velocity_limits.low,
            Velocity::Normal => self.velocity_limits.normal,
            Velocity::High => self.velocity_limits.high,
        };
        limit.max(1)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            velocity: Velocity::default().name().to_string(),
            velocity_limits: VelocityLimits::default(),
            default_strategy: ResolutionStrategy::default().name().to_string(),
            folder_concurrency: 10,
            listing_page_size: 500,
        }
    }
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self {
            low: Velocity::Low.default_limit(),
            normal: Velocity::Normal.default_limit(),
            high: Velocity::High.default_limit(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.velocity"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- transfer ---
        if let Err(e) = self.transfer.velocity() {
            errors.push(ValidationError {
                field: "transfer.velocity".into(),
                message: e.to_string(),
            });
        }
        if let Err(e) = self.transfer.strategy() {
            errors.push(ValidationError {
                field: "transfer.default_strategy".into(),
                message: e.to_string(),
            });
        }

        let limits = &self.transfer.velocity_limits;
        for (name, value) in [
            ("low", limits.low),
            ("normal", limits.normal),
            ("high", limits.high),
        ] {
            if value == 0 {
                errors.push(ValidationError {
                    field: format!("transfer.velocity_limits.{name}"),
                    message: "must be greater than 0".into(),
                });
            }
        }
        if limits.low > limits.normal || limits.normal > limits.high {
            errors.push(ValidationError {
                field: "transfer.velocity_limits".into(),
                message: "limits must not decrease from low to high".into(),
            });
        }

        if self.transfer.folder_concurrency == 0 {
            errors.push(ValidationError {
                field: "transfer.folder_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.transfer.listing_page_size == 0 {
            errors.push(ValidationError {
                field: "transfer.listing_page_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- keys ---
        if self.keys.concurrency == 0 {
            errors.push(ValidationError {
                field: "keys.concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- transfer ---

    pub fn transfer_velocity(mut self, velocity: Velocity) -> Self {
        self.config.transfer.velocity = velocity.name().to_string();
        self
    }

    pub fn transfer_velocity_limits(mut self, low: usize, normal: usize, high: usize) -> Self {
        self.config.transfer.velocity_limits = VelocityLimits { low, normal, high };
        self
    }

    pub fn transfer_default_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.config.transfer.default_strategy = strategy.name().to_string();
        self
    }

    pub fn transfer_folder_concurrency(mut self, n: usize) -> Self {
        self.config.transfer.folder_concurrency = n;
        self
    }

    pub fn transfer_listing_page_size(mut self, n: usize) -> Self {
        self.config.transfer.listing_page_size = n;
        self
    }

    // --- keys ---

    pub fn keys_concurrency(mut self, n: usize) -> Self {
        self.config.keys.concurrency = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
