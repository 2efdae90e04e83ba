//! ECU Telemetry Daemon
//!
//! Opens the configured links, runs the telemetry pipeline and prints every
//! published reading as one JSON line on stdout.

use anyhow::{Context, Result};
use ecu_link::{handshake, open_polled, open_streaming, EcuLink};
use poll_scheduler::PollScheduler;
use sensor_registry::{SensorReading, SensorRegistry};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use telemetry_pipeline::{IngestListener, PipelineBuilder};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod settings;

pub use settings::{
    load_config, CadenceConfig, IngestConfig, PipelineConfig, PolledConfig, StreamingConfig,
    TelemetryConfig, DEFAULT_CONFIG_FILE, DEFAULT_LOG_FILE, ENV_PREFIX,
};

/// Initialize logging into the append-only diagnostic log
pub fn init_logging(log_file: &str, level: &str) -> Result<()> {
    let level: Level = level
        .parse()
        .with_context(|| format!("Unknown log level {:?}", level))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// One JSON line per reading
pub fn format_reading(reading: &SensorReading) -> Result<String> {
    serde_json::to_string(reading).context("Failed to serialize reading")
}

/// Wake the ECU on a prepared `link` and add it to the pipeline.
///
/// The scheduler is only built once the handshake succeeded, so a failed
/// handshake ends startup before any sensor is polled.
pub async fn attach_polled<L>(
    builder: PipelineBuilder,
    mut link: L,
    config: &TelemetryConfig,
    registry: Arc<SensorRegistry>,
) -> Result<PipelineBuilder>
where
    L: EcuLink + 'static,
{
    let identity = handshake(&mut link, &config.polled.timing())
        .await
        .context("Failed to initialize the polled ECU link")?;
    info!("Polled link ready (ECU {})", identity);

    let scheduler = PollScheduler::new(config.scheduler_config(), &registry)
        .context("Invalid scheduler settings")?;
    Ok(builder.polled(scheduler, link, registry))
}

/// Run until Ctrl-C or until every producer has stopped
pub async fn run(config: TelemetryConfig) -> Result<()> {
    let polled_registry = Arc::new(SensorRegistry::polled());
    let mut builder = PipelineBuilder::new(config.pipeline.channel_capacity);

    if config.polled.enabled {
        let link = open_polled(&config.polled.target())
            .context("Failed to open the polled ECU adapter")?;
        builder = attach_polled(builder, link, &config, polled_registry.clone()).await?;
    }

    if config.streaming.enabled {
        let link = open_streaming(&config.streaming.device)
            .with_context(|| format!("Failed to open streaming device {}", config.streaming.device))?;
        info!("Streaming link ready on {}", config.streaming.device);
        builder = builder.streaming(link, Arc::new(SensorRegistry::streaming()));
    }

    if let Some(addr) = &config.ingest.addr {
        let listener = IngestListener::bind(addr, polled_registry.clone())
            .await
            .with_context(|| format!("Failed to bind ingest listener on {}", addr))?;
        builder = builder.ingest(listener);
    }

    let (mut readings, handle) = builder.build();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            reading = readings.recv() => {
                let Some(reading) = reading else { break };
                println!("{}", format_reading(&reading)?);
            }
            _ = &mut ctrl_c => {
                info!("Ctrl-C received");
                handle.shutdown();
                break;
            }
        }
    }

    // Unblock producers waiting on a full output channel
    drop(readings);
    handle.join().await.context("Telemetry pipeline failed")?;
    info!("ECU telemetry stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecu_link::{EcuError, MockLink, MockReply};

    #[test]
    fn test_format_reading() {
        let registry = SensorRegistry::polled();
        let reading = registry.decode(0x21, 256.0, 0).unwrap();
        let line = format_reading(&reading).unwrap();

        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["label"], "Engine RPM");
        assert_eq!(json["source_type"], "polled-sensor");
        assert_eq!(json["value"], 8000.0);
        assert_eq!(json["unit"], "RPM");
        assert!(!line.contains('\n'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_handshake_polls_nothing() {
        let link = MockLink::scripted(vec![MockReply::Bytes(vec![0x01, 0x02, 0x03])]);
        let log = link.event_log();
        let builder = PipelineBuilder::new(8);

        let result = attach_polled(
            builder,
            link,
            &TelemetryConfig::default(),
            Arc::new(SensorRegistry::polled()),
        )
        .await;

        let err = result.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<EcuError>(),
            Some(EcuError::Handshake { sent: 0xFF, received: 3 })
        ));
        assert_eq!(log.writes(), vec![vec![0xFF]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_starts_after_handshake() {
        let link = MockLink::ecu(|_| MockReply::Bytes(vec![0x3C]));
        let log = link.event_log();

        let builder = attach_polled(
            PipelineBuilder::new(8),
            link,
            &TelemetryConfig::default(),
            Arc::new(SensorRegistry::polled()),
        )
        .await
        .unwrap();
        let (mut readings, handle) = builder.build();

        let reading = readings.recv().await.unwrap();
        assert_eq!(reading.source_type, "polled-sensor");
        handle.shutdown();
        drop(readings);
        handle.join().await.unwrap();

        let writes = log.writes();
        assert_eq!(&writes[..2], &[vec![0xFF], vec![0xFE]]);
        assert!(writes[2..].iter().all(|w| w.len() == 2));
    }

    #[tokio::test]
    async fn test_bad_ingest_address_fails_startup() {
        let config = TelemetryConfig {
            polled: PolledConfig {
                enabled: false,
                ..PolledConfig::default()
            },
            ingest: IngestConfig {
                addr: Some("not-an-address".to_string()),
            },
            ..TelemetryConfig::default()
        };
        assert!(run(config).await.is_err());
    }
}
