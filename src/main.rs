use anyhow::Context;
use chrono::Utc;
use modemlink::application::{metrics, Bridge, Inbound};
use modemlink::config::Config;
use modemlink::infrastructure::{OutboundChannel, VirtualInterfaces};
use modemlink::interface::stdio;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration file is the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    // Initialize tracing; stdout carries the records
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting modemlink");
    info!("Configuration loaded: {:?}", config);
    metrics::describe_metrics();

    let (outbound, outbound_rx) = OutboundChannel::new();
    let writer = tokio::spawn(stdio::write_outbound(outbound_rx, tokio::io::stdout()));

    let (tx, mut rx) = mpsc::channel(64);
    let reader = tokio::spawn(stdio::read_inbound(BufReader::new(tokio::io::stdin()), tx));

    let mut bridge = Bridge::new(&config, outbound.clone(), outbound, VirtualInterfaces::new());
    let mut ticker = tokio::time::interval(config.core.tick_interval());

    info!(
        "Bridge ready: {} call slots, {} bearers, interfaces {}N",
        config.core.max_calls, config.core.max_bearers, config.interfaces.prefix
    );

    loop {
        tokio::select! {
            inbound = rx.recv() => match inbound {
                Some(inbound) => bridge.handle(inbound, Utc::now()),
                None => break,
            },
            _ = ticker.tick() => bridge.handle(Inbound::Tick, Utc::now()),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    // Dropping the bridge closes the outbound channel and lets the writer drain
    drop(bridge);
    if let Err(e) = writer.await.context("writer task panicked")? {
        error!("Output failed: {}", e);
    }
    reader.abort();

    info!("modemlink stopped");
    Ok(())
}
