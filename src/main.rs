//! Traffic dashboard - polls proxy traffic statistics and renders rollups
//!
//! Each cycle turns one stats snapshot into:
//! - Summary totals and per-user / per-API / per-country / per-IP rollups
//! - A geolocated heat map of destination traffic
//! - Log tables and a live JSON/SSE dashboard feed

mod config;
mod enrich;
mod events;
mod format;
mod geo;
mod poller;
mod sinks;
mod stats;
mod view;
mod web;

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, GeoProvider};
use crate::geo::{GeoCache, GeoLookup, HttpGeoLookup, MaxMindLookup};
use crate::poller::{HttpStatsSource, Poller};
use crate::sinks::{ConsoleSink, SharedSink};

fn init_logging(default_level: &str) {
    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves once `signal` fires. If the handler could not be installed this
/// never resolves, so the poller keeps running until the process is killed.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for Ctrl-C, graceful shutdown disabled: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // Logging needs the configured level, so load configuration first
    let config = Config::load()?;
    init_logging(&config.logging.level);
    info!("Starting traffic dashboard...");

    let mut http = reqwest::Client::builder();
    if let Some(secs) = config.source.request_timeout_secs {
        http = http.timeout(Duration::from_secs(secs));
    }
    let http = http.build()?;

    let lookup: Arc<dyn GeoLookup> = match config.geoip.provider {
        GeoProvider::Http => {
            info!("GeoIP via {}", config.geoip.url);
            Arc::new(HttpGeoLookup::new(http.clone(), config.geoip.url.clone()))
        }
        GeoProvider::Maxmind => {
            let maxmind = MaxMindLookup::new(&config.geoip.database);
            if maxmind.is_available() {
                info!("GeoIP enabled");
            } else {
                info!("GeoIP disabled (database not found), using fallback locations");
            }
            Arc::new(maxmind)
        }
    };
    let cache = Arc::new(GeoCache::new(lookup, config.geoip.seed));

    let mut sinks: Vec<SharedSink> = vec![Arc::new(ConsoleSink) as SharedSink];

    if config.server.enabled {
        let (event_tx, _) = tokio::sync::broadcast::channel(64);
        let state = Arc::new(web::DashboardState::new(events::EventBus::new(event_tx)));
        sinks.push(state.clone());

        let server_config = config.server.clone();
        tokio::spawn(async move {
            if let Err(e) = web::start_server(&server_config, state).await {
                error!("Dashboard server failed: {}", e);
            }
        });
    }

    let source = Arc::new(HttpStatsSource::new(http, config.source.stats_url.clone()));
    info!("Polling {}", config.source.stats_url);

    let poller = Poller::new(
        source,
        cache,
        sinks,
        config.polling.intervals(),
        config.map.weighting(),
    );

    poller.run_until(shutdown_on(tokio::signal::ctrl_c())).await;

    info!("Shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn signal_resolves_shutdown() {
        let signal = async { Ok::<(), io::Error>(()) };
        let result = tokio::time::timeout(Duration::from_secs(1), shutdown_on(signal)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failed_signal_handler_never_shuts_down() {
        let failing = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no signal handler")) };
        let result = tokio::time::timeout(Duration::from_millis(50), shutdown_on(failing)).await;
        assert!(result.is_err());
    }
}
