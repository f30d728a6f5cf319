use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// Environment prefix for configuration overrides, e.g.
/// `JOB_PROCESSOR_PROCESSOR__MAX_CONCURRENT_JOBS=5`
pub const ENV_PREFIX: &str = "JOB_PROCESSOR_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Scheduler loop, maintenance and lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// How often the scheduler loop looks for due jobs
    #[serde(default = "default_tick_interval", with = "duration_serde::duration")]
    pub tick_interval: Duration,
    /// How often the maintenance sweeper runs
    #[serde(default = "default_maintenance_interval", with = "duration_serde::duration")]
    pub maintenance_interval: Duration,
    /// Global cap on jobs executing at the same time in this worker
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Delay before the one-shot tick that follows startup
    #[serde(default = "default_startup_delay", with = "duration_serde::duration")]
    pub startup_delay: Duration,
    /// Upper bound on how long shutdown waits for in-flight jobs
    #[serde(default = "default_shutdown_timeout", with = "duration_serde::duration")]
    pub shutdown_timeout: Duration,
    /// How often shutdown re-checks the running set
    #[serde(default = "default_shutdown_poll_interval", with = "duration_serde::duration")]
    pub shutdown_poll_interval: Duration,
    /// Age after which a `running` log entry is reconciled to `failed`
    #[serde(default = "default_stale_running_after", with = "duration_serde::duration")]
    pub stale_running_after: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    #[serde(default = "default_generator_endpoint")]
    pub endpoint: String,
    /// Whole-request timeout for one generation call
    #[serde(default = "default_generator_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    #[serde(default = "default_generator_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    /// Optional bearer token sent with every generation request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Completed execution log entries older than this are purged
    #[serde(default = "default_execution_log_retention", with = "duration_serde::duration")]
    pub execution_logs: Duration,
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

fn default_maintenance_interval() -> Duration {
    DEFAULT_MAINTENANCE_INTERVAL
}

fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}

fn default_startup_delay() -> Duration {
    DEFAULT_STARTUP_DELAY
}

fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

fn default_shutdown_poll_interval() -> Duration {
    DEFAULT_SHUTDOWN_POLL_INTERVAL
}

fn default_stale_running_after() -> Duration {
    DEFAULT_STALE_RUNNING_AFTER
}

fn default_generator_base_url() -> String {
    DEFAULT_GENERATOR_BASE_URL.to_string()
}

fn default_generator_endpoint() -> String {
    DEFAULT_GENERATOR_ENDPOINT.to_string()
}

fn default_generator_timeout() -> Duration {
    DEFAULT_GENERATOR_TIMEOUT
}

fn default_generator_connect_timeout() -> Duration {
    DEFAULT_GENERATOR_CONNECT_TIMEOUT
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_execution_log_retention() -> Duration {
    DEFAULT_EXECUTION_LOG_RETENTION
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            maintenance_interval: default_maintenance_interval(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            startup_delay: default_startup_delay(),
            shutdown_timeout: default_shutdown_timeout(),
            shutdown_poll_interval: default_shutdown_poll_interval(),
            stale_running_after: default_stale_running_after(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_base_url(),
            endpoint: default_generator_endpoint(),
            timeout: default_generator_timeout(),
            connect_timeout: default_generator_connect_timeout(),
            api_key: None,
        }
    }
}

impl GeneratorConfig {
    /// Full URL of the generation endpoint
    pub fn generation_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            execution_logs: default_execution_log_retention(),
        }
    }
}

impl ProcessorConfig {
    /// Reject settings that would stall or spin the processor
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_jobs == 0 {
            return Err("processor.max_concurrent_jobs must be at least 1".to_string());
        }
        if self.tick_interval.is_zero() {
            return Err("processor.tick_interval must be greater than zero".to_string());
        }
        if self.maintenance_interval.is_zero() {
            return Err("processor.maintenance_interval must be greater than zero".to_string());
        }
        if self.shutdown_poll_interval.is_zero() {
            return Err("processor.shutdown_poll_interval must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layer defaults, the TOML file (if present) and `JOB_PROCESSOR_*` environment variables
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if Path::new(config_file).exists() {
            info!("Loading configuration from {}", config_file);
            figment = figment.merge(Toml::file(config_file));
        } else {
            info!("Config file {} not found, using defaults", config_file);
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {config_file}"))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.processor
            .validate()
            .map_err(|message| anyhow::anyhow!("Invalid configuration: {message}"))?;

        // A run still waiting on the generator must never be reconciled as abandoned
        if self.processor.stale_running_after <= self.generator.timeout {
            anyhow::bail!(
                "Invalid configuration: processor.stale_running_after ({}) must exceed generator.timeout ({})",
                humantime::format_duration(self.processor.stale_running_after),
                humantime::format_duration(self.generator.timeout)
            );
        }
        Ok(())
    }

    /// Write the default configuration as a starter file
    pub fn write_default(config_file: &str) -> Result<()> {
        let contents = toml::to_string_pretty(&Self::default())?;
        std::fs::write(config_file, contents)
            .with_context(|| format!("Failed to write {config_file}"))?;
        info!("Created default config file: {}", config_file);
        Ok(())
    }
}
