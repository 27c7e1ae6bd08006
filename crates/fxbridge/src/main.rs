//! fxbridge: poll an MT5 terminal gateway, republish quotes to Redis.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxbridge_lib::{
    Metrics, Mt5Gateway, Publisher, PublisherConfig, QuoteSink, RedisSink, ServerState,
    SymbolTable, Terminal,
};

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let symbols =
        SymbolTable::parse(&config.symbol_entries()).context("invalid FX_SYMBOLS")?;

    info!(
        gateway = %config.gateway_url,
        redis = %config.redis_url(),
        instruments = symbols.len(),
        poll_interval_ms = config.poll_interval_ms,
        "fxbridge starting"
    );

    // Initial connects are fatal. The loop only retries sessions that were
    // up at least once.
    let mut terminal = Mt5Gateway::new(&config.gateway_url, symbols.sources());
    terminal
        .connect()
        .await
        .context("initial terminal connect failed")?;
    info!(watched = ?terminal.watched_instruments(), "terminal connected");

    let mut sink = RedisSink::new(config.redis_url());
    sink.connect()
        .await
        .context("initial Redis connect failed")?;

    let metrics = Arc::new(Metrics::new());
    let publisher_config = PublisherConfig {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        ..PublisherConfig::default()
    };
    let mut publisher = Publisher::new(
        terminal,
        sink,
        symbols,
        publisher_config,
        Arc::clone(&metrics),
    );

    let listen_addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("invalid BRIDGE_LISTEN_ADDR")?;
    let server_state = ServerState::new(
        publisher.terminal_connected_handle(),
        publisher.sink_connected_handle(),
        Arc::clone(&metrics),
    );
    tokio::spawn(async move {
        if let Err(e) = fxbridge_lib::run_server(listen_addr, server_state).await {
            error!(error = %e, "health server error");
        }
    });
    info!(addr = %listen_addr, "health server started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_tx.send(true).ok();
    });

    publisher.run(shutdown_rx).await;
    info!("fxbridge stopped");
    Ok(())
}

/// Listen for SIGTERM (pod termination) or ctrl-c.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
    let ctrl_c = tokio::signal::ctrl_c();

    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = ctrl_c => info!("ctrl-c received"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
}
