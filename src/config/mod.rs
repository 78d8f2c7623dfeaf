//! # Configuration Management Module
//!
//! Loads and writes the TOML configuration for gitquest. Every section has
//! serde defaults, so a partial file (or an empty one) is a valid config.
//!
//! ## Configuration Structure
//!
//! - [`AppConfig`] - Display name and description
//! - [`StorageConfig`] - Data directory, sled database and seed file locations
//! - [`ScoringConfig`] - Base points, time bonus and attempt penalty
//! - [`ValidationConfig`] - Flag handling default, command length cap, stuck threshold
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gitquest::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Database: {}", config.storage.db_path().display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//!
//! [scoring]
//! base_points = 100
//! max_bonus = 50
//! target_seconds = 60
//!
//! [validation]
//! ignore_flags_by_default = true
//! stuck_threshold = 3
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub description: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "GitQuest".to_string(),
            description: "Learn git one quest at a time".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Optional override for the sled database path; defaults to `<data_dir>/gitquest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// Optional seed file; the built-in worlds are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            db_path: None,
            seed_file: None,
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("gitquest"),
        }
    }
}

/// Points awarded for a completed step.
///
/// A step is worth `base_points + bonus`. The bonus is `max_bonus` when the
/// step took at most `target_seconds`, and loses one point per
/// `bonus_decay_seconds` beyond that. Each earlier failed attempt removes
/// `attempt_penalty` from the base, never below `min_base_points`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoringConfig {
    #[serde(default = "default_base_points")]
    pub base_points: u32,
    #[serde(default = "default_max_bonus")]
    pub max_bonus: u32,
    #[serde(default = "default_target_seconds")]
    pub target_seconds: u64,
    #[serde(default = "default_bonus_decay_seconds")]
    pub bonus_decay_seconds: u64,
    #[serde(default = "default_attempt_penalty")]
    pub attempt_penalty: u32,
    #[serde(default = "default_min_base_points")]
    pub min_base_points: u32,
}

fn default_base_points() -> u32 {
    100
}

fn default_max_bonus() -> u32 {
    50
}

fn default_target_seconds() -> u64 {
    60
}

fn default_bonus_decay_seconds() -> u64 {
    10
}

fn default_attempt_penalty() -> u32 {
    10
}

fn default_min_base_points() -> u32 {
    10
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: default_base_points(),
            max_bonus: default_max_bonus(),
            target_seconds: default_target_seconds(),
            bonus_decay_seconds: default_bonus_decay_seconds(),
            attempt_penalty: default_attempt_penalty(),
            min_base_points: default_min_base_points(),
        }
    }
}

impl ScoringConfig {
    /// Best possible score for a single step.
    pub fn flawless_score(&self) -> u32 {
        self.base_points.saturating_add(self.max_bonus)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Flag handling for steps that do not set `ignore_flags` themselves
    #[serde(default = "default_ignore_flags")]
    pub ignore_flags_by_default: bool,
    /// Longer submissions are rejected before matching
    #[serde(default = "default_max_command_length")]
    pub max_command_length: usize,
    /// Failed attempts on the active step before a quest is reported STUCK
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: usize,
}

fn default_ignore_flags() -> bool {
    true
}

fn default_max_command_length() -> usize {
    512
}

fn default_stuck_threshold() -> usize {
    3
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            ignore_flags_by_default: default_ignore_flags(),
            max_command_length: default_max_command_length(),
            stuck_threshold: default_stuck_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("gitquest.log".to_string()),
        }
    }
}

impl LoggingConfig {
    /// Map the configured level name to a filter; unknown names fall back to info.
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.to_ascii_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" | "warning" => log::LevelFilter::Warn,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values that would make scoring or validation meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.scoring.bonus_decay_seconds == 0 {
            return Err(anyhow!("scoring.bonus_decay_seconds must be greater than 0"));
        }
        if self.scoring.min_base_points > self.scoring.base_points {
            return Err(anyhow!(
                "scoring.min_base_points ({}) exceeds scoring.base_points ({})",
                self.scoring.min_base_points,
                self.scoring.base_points
            ));
        }
        if self.scoring.base_points.checked_add(self.scoring.max_bonus).is_none() {
            return Err(anyhow!(
                "scoring.base_points + scoring.max_bonus must fit in {} points",
                u32::MAX
            ));
        }
        if self.validation.max_command_length == 0 {
            return Err(anyhow!("validation.max_command_length must be greater than 0"));
        }
        if self.validation.stuck_threshold == 0 {
            return Err(anyhow!("validation.stuck_threshold must be greater than 0"));
        }
        Ok(())
    }
}
