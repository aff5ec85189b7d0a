//! bomwatch service entry point
//!
//! Wires the config, feed client, snapshot store, and refresh scheduler
//! together. Runs as a long-lived service by default; `--once` performs a
//! single forced refresh cycle, logs the snapshot summaries, and exits.

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bomwatch::cache::DiskCache;
use bomwatch::cli::Cli;
use bomwatch::config::AppConfig;
use bomwatch::feed::FeedClient;
use bomwatch::model::Domain;
use bomwatch::scheduler::RefreshScheduler;
use bomwatch::snapshot::{SnapshotStore, SnapshotSummary};

fn log_summaries(store: &SnapshotStore) {
    for domain in Domain::ALL {
        match store.current(domain) {
            Some(snapshot) => {
                let summary = SnapshotSummary::of(&snapshot);
                match &summary.highest {
                    Some((station, score)) => info!(
                        %domain,
                        stations = summary.station_count,
                        with_data = summary.stations_with_data,
                        highest_station = %station,
                        highest_score = format!("{score:.3}"),
                        "snapshot summary"
                    ),
                    None => info!(
                        %domain,
                        stations = summary.station_count,
                        "snapshot summary (no station scored)"
                    ),
                }
            }
            None => warn!(%domain, "no snapshot published"),
        }
    }
    if let Some(forecasts) = store.current_forecasts() {
        info!(records = forecasts.records.len(), "forecast summary");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(secs) = cli.interval {
        config.tick_secs = Some(secs);
    }

    let mut client = FeedClient::new();
    if !cli.no_disk_cache {
        match DiskCache::new() {
            Some(cache) => client = client.with_disk_cache(cache),
            None => warn!("no cache directory available, running without disk cache"),
        }
    }

    let store = SnapshotStore::new();
    let (scheduler, _refresh) = RefreshScheduler::new(client, config, store.clone());

    if cli.once {
        let report = scheduler.run_cycle(true).await;
        log_summaries(&store);
        if !report.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("starting refresh scheduler");
    scheduler.run().await;
    Ok(())
}
