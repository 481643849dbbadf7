//! Prometheus exporter for Mirth Connect.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use mirth_exporter::{CommandFetcher, ExporterConfig, HttpServer, MirthCollector, init_tracing};

/// Prometheus exporter for Mirth Connect.
#[derive(Parser, Debug)]
#[command(name = "mirth-exporter")]
#[command(about = "Export Mirth Connect channel statistics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Address to listen on for telemetry (overrides config).
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Path under which to expose metrics (overrides config).
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// Path to mccommand for Mirth Connect CLI (overrides config).
    #[arg(long = "mccli.path")]
    mccli_path: Option<String>,

    /// Log level: DEBUG, INFO, WARN, ERROR (overrides config).
    #[arg(long)]
    loglevel: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(listen_address) = self.listen_address {
            config.web.listen_address = listen_address;
        }
        if let Some(telemetry_path) = self.telemetry_path {
            config.web.telemetry_path = telemetry_path;
        }
        if let Some(mccli_path) = self.mccli_path {
            config.mccli.path = mccli_path;
        }
        if let Some(loglevel) = self.loglevel {
            config.logging.level = loglevel;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI flags win over the file
    args.apply(&mut config);
    config.validate()?;

    init_tracing(config.log_level()?, config.logging.format)?;

    info!(
        mccli = %config.mccli.path,
        timeout_secs = config.mccli.timeout_secs,
        "Starting Mirth Exporter"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collector = Arc::new(MirthCollector::new(CommandFetcher::from_config(
        &config.mccli,
    )));
    let http_server = HttpServer::new(
        collector,
        config.listen_addr()?,
        config.web.telemetry_path.clone(),
    );

    // Fail startup if the address cannot be bound
    let listener = http_server.bind().await?;
    let mut http_task = tokio::spawn(async move { http_server.serve(listener, shutdown_rx).await });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            result??;
            anyhow::bail!("HTTP server stopped unexpectedly");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
