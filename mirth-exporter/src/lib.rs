//! Prometheus exporter for Mirth Connect.
//!
//! On every scrape the exporter runs the Mirth Connect CLI (`mccommand`) with
//! a fixed `status` / `channel stats` script, parses the plain-text report and
//! exposes channel deployment state and per-channel message statistics via an
//! HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   mccommand     │<────│    Collector    │<────│   HTTP Server   │
//! │  (subprocess)   │────>│  (parse report) │────>│   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! mirth-exporter --mccli.path /opt/mirthconnect/mccommand
//! mirth-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;
pub mod fetcher;
pub mod http;
pub mod parser;

pub use collector::{MirthCollector, SharedCollector};
pub use config::{ExporterConfig, LogFormat};
pub use error::FetchError;
pub use fetcher::{CommandFetcher, ReportFetcher};
pub use http::HttpServer;

use tracing::Level;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_tracing(level: Level, format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}
