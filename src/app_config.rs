use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::PipelineConfig;
use crate::production::GenerationSettings;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Generation service connection
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Database file; the platform data directory when absent
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Settings used when a run does not supply its own
    #[serde(default)]
    pub defaults: GenerationSettings,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Generation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Service URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether the service's publishing endpoint is available
    #[serde(default = "default_true")]
    pub publishing: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            publishing: true,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pipeline tuning as stored in the config file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PipelineSection {
    #[serde(default = "default_render_poll_interval_ms")]
    pub render_poll_interval_ms: u64,

    #[serde(default = "default_render_max_poll_attempts")]
    pub render_max_poll_attempts: u32,

    /// Scenes composed into shots concurrently
    #[serde(default = "default_shot_composition_concurrency")]
    pub shot_composition_concurrency: usize,

    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            render_poll_interval_ms: default_render_poll_interval_ms(),
            render_max_poll_attempts: default_render_max_poll_attempts(),
            shot_composition_concurrency: default_shot_composition_concurrency(),
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

impl PipelineSection {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_render_polling(
                Duration::from_millis(self.render_poll_interval_ms),
                self.render_max_poll_attempts,
            )
            .with_shot_composition_concurrency(self.shot_composition_concurrency)
            .with_lease_ttl(Duration::from_secs(self.lease_ttl_secs))
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8600".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_render_poll_interval_ms() -> u64 {
    5000
}

fn default_render_max_poll_attempts() -> u32 {
    120
}

fn default_shot_composition_concurrency() -> usize {
    4
}

fn default_lease_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Load the config at `path`, writing a default one first if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values.
    ///
    /// The gateway endpoint is only required when real collaborators are used.
    pub fn validate(&self, dry_run: bool) -> Result<()> {
        self.defaults
            .validate()
            .context("Invalid default generation settings")?;

        if !dry_run && self.gateway.endpoint.trim().is_empty() {
            return Err(anyhow!("Gateway endpoint is required unless running with --dry-run"));
        }
        if self.pipeline.render_max_poll_attempts == 0 {
            return Err(anyhow!("render_max_poll_attempts must be at least 1"));
        }
        if self.pipeline.shot_composition_concurrency == 0 {
            return Err(anyhow!("shot_composition_concurrency must be at least 1"));
        }

        Ok(())
    }

    /// Configured database path, or the platform default
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::database::DatabaseConnection::default_database_path(),
        }
    }
}
