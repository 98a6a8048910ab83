mod aggregator;
mod config;
mod models;
mod mqtt;
mod publish;
mod scheduler;
mod utils;

use log::{error, info, warn};
use std::sync::Arc;
use time::UtcOffset;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};

use aggregator::{ConditionsAggregator, StalenessGuard};
use config::WeatherConfig;
use mqtt::{MeasurementDecoder, MqttTransport};
use publish::{metrics, PwsPublisher, Publisher};
use scheduler::PublishScheduler;
use utils::{format_datetime, resolve_local_offset, Clock, LocalClock};

const TRANSPORT_CLOSE_TIMEOUT_MS: u64 = 250;

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run(config: WeatherConfig, offset: UtcOffset) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting weather metrics service");

    let clock = Arc::new(LocalClock::new(offset));
    info!(
        "Local time is {} (UTC offset {})",
        format_datetime(&clock.now()),
        clock.offset()
    );

    let aggregator = Arc::new(ConditionsAggregator::new(clock.clone()));

    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
    if let Some(pws) = config.pws.clone() {
        info!("Publishing to PWS station {}", pws.id);
        publishers.push(Box::new(PwsPublisher::new(pws)?));
    }

    if let Some(addr) = config.metrics_addr {
        let listener = metrics::bind(addr).await?;
        let aggregator = aggregator.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(listener, aggregator).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    // Transport -> channel -> scheduler
    let (tx, rx) = mpsc::unbounded_channel();
    let (transport, eventloop) = MqttTransport::new(&config.mqtt);
    let transport = Arc::new(transport);
    let decoder = MeasurementDecoder::new(clock.offset());

    info!(
        "Connecting to tcp://{}:{}",
        config.mqtt.host, config.mqtt.port
    );
    let transport_handle = {
        let transport = transport.clone();
        tokio::spawn(async move { transport.run(eventloop, decoder, tx).await })
    };

    // Handle Ctrl+C / SIGTERM gracefully
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(());
    });

    let mut scheduler = PublishScheduler::new(
        aggregator,
        publishers,
        clock,
        StalenessGuard::new(config.max_age),
        config.publish_interval,
    );
    let state = scheduler.run(rx, shutdown_rx).await;
    info!("Scheduler finished in state {:?}", state);

    info!("Unsubscribing and disconnecting...");
    transport.close();
    if timeout(
        Duration::from_millis(TRANSPORT_CLOSE_TIMEOUT_MS),
        transport_handle,
    )
    .await
    .is_err()
    {
        warn!("MQTT transport did not shut down in time");
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Must happen before the runtime starts its worker threads
    let offset = resolve_local_offset().unwrap_or_else(|e| {
        warn!("Could not determine local UTC offset ({}), using UTC", e);
        UtcOffset::UTC
    });

    // Load configuration
    let config = match WeatherConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(config, offset));

    match &result {
        Ok(_) => info!("Program terminated. Exiting gracefully."),
        Err(e) => error!("Fatal error: {}", e),
    }
    result
}
