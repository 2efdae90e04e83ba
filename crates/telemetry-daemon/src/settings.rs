//! Daemon Settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `ECU_TELEMETRY__<SECTION>__<KEY>` environment variables.

use anyhow::{ensure, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use ecu_link::wire::{POLLED_PRODUCT_ID, POLLED_VENDOR_ID, STREAMING_DEVICE};
use ecu_link::{HandshakeTiming, PolledTarget, DEFAULT_BREAK_MS, DEFAULT_RESPONSE_TIMEOUT_MS};
use poll_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use telemetry_pipeline::DEFAULT_CHANNEL_CAPACITY;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "ecu-telemetry";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ECU_TELEMETRY";

/// Append-only diagnostic log
pub const DEFAULT_LOG_FILE: &str = "/tmp/dashboard.log";

/// Polled-protocol adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolledConfig {
    pub enabled: bool,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Serial device path; skips USB enumeration when set
    pub device: Option<String>,
    pub response_timeout_ms: u64,
    /// Wake-up break duration
    pub break_ms: u64,
}

impl Default for PolledConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vendor_id: POLLED_VENDOR_ID,
            product_id: POLLED_PRODUCT_ID,
            device: None,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            break_ms: DEFAULT_BREAK_MS,
        }
    }
}

impl PolledConfig {
    pub fn target(&self) -> PolledTarget {
        PolledTarget {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            device: self.device.clone(),
        }
    }

    pub fn timing(&self) -> HandshakeTiming {
        HandshakeTiming {
            break_duration: Duration::from_millis(self.break_ms),
            response_timeout: Duration::from_millis(self.response_timeout_ms),
        }
    }
}

/// Streaming gauge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub enabled: bool,
    pub device: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device: STREAMING_DEVICE.to_string(),
        }
    }
}

/// Tier cadences. The per-request timeout lives in `[polled]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CadenceConfig {
    pub high_ms: u64,
    pub medium_ms: u64,
    pub low_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            high_ms: defaults.high_ms,
            medium_ms: defaults.medium_ms,
            low_ms: defaults.low_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Alternate ingestion listener; disabled without an address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub addr: Option<String>,
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub polled: PolledConfig,
    pub streaming: StreamingConfig,
    pub scheduler: CadenceConfig,
    pub pipeline: PipelineConfig,
    pub ingest: IngestConfig,
    pub log_file: String,
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            polled: PolledConfig::default(),
            streaming: StreamingConfig::default(),
            scheduler: CadenceConfig::default(),
            pipeline: PipelineConfig::default(),
            ingest: IngestConfig::default(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Scheduler settings with the polled response timeout applied
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            high_ms: self.scheduler.high_ms,
            medium_ms: self.scheduler.medium_ms,
            low_ms: self.scheduler.low_ms,
            response_timeout_ms: self.polled.response_timeout_ms,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.polled.enabled || self.streaming.enabled || self.ingest.addr.is_some(),
            "No telemetry source enabled"
        );
        ensure!(
            self.pipeline.channel_capacity > 0,
            "pipeline.channel_capacity must be greater than zero"
        );
        ensure!(self.polled.break_ms > 0, "polled.break_ms must be greater than zero");
        if self.polled.enabled {
            self.scheduler_config()
                .validate()
                .context("Invalid scheduler settings")?;
        }
        Ok(())
    }
}

/// Load configuration from `path` (or `ecu-telemetry.toml` if present) and the environment
pub fn load_config(path: Option<&str>) -> Result<TelemetryConfig> {
    let file = match path {
        Some(path) => File::with_name(path),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    from_builder(builder)
}

fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<TelemetryConfig> {
    let config: TelemetryConfig = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}
