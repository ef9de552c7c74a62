use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use ratakartta_core::model::{EnrichedPosition, StationDirectory};
use ratakartta_core::schema::Database;
use ratakartta_feed::{
    Config, DigitrafficClient, MetadataStore, PositionFeed, PositionPoller, Snapshot,
    ThrottledExecutor,
};

use super::load_stations;

/// Poll live positions until interrupted or `ticks` polls have printed.
pub async fn run_watch(config: &Config, ticks: Option<u64>, json: bool) -> Result<()> {
    let client = Arc::new(
        DigitrafficClient::new(config.api_base_url.as_str())
            .context("Failed to create HTTP client")?,
    );
    let stations = load_stations(&client).await;

    let poller = build_poller(config, client, open_store(&config.database_path));

    log::info!(
        "Polling every {}s, at most {} timetable lookups per {}s",
        config.poll_interval_secs,
        config.max_requests_per_window,
        config.window_secs
    );
    let handle = poller.spawn(config.poll_interval());
    let mut snapshots = handle.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seen = 0u64;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    log::error!("Poll loop stopped unexpectedly");
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                if json {
                    println!("{}", serde_json::to_string(snapshot.as_slice())?);
                } else {
                    print_table(&snapshot, &stations);
                }
                seen += 1;
                if ticks.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                log::info!("Interrupted, stopping");
                break;
            }
        }
    }

    handle.shutdown();
    Ok(())
}

/// Open the durable cache at `path`, falling back to memory only.
fn open_store(path: &Path) -> MetadataStore {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!(
                "Cannot create {}, caching in memory only: {}",
                parent.display(),
                e
            );
            return MetadataStore::in_memory();
        }
    }
    match Database::open(path) {
        Ok(db) => MetadataStore::new(db),
        Err(e) => {
            log::warn!(
                "Cannot open database {}, caching in memory only: {}",
                path.display(),
                e
            );
            MetadataStore::in_memory()
        }
    }
}

fn build_poller(
    config: &Config,
    client: Arc<DigitrafficClient>,
    store: MetadataStore,
) -> PositionPoller {
    let executor = match config.max_backlog {
        Some(limit) => ThrottledExecutor::with_max_backlog(
            config.max_requests_per_window,
            config.window(),
            limit,
        ),
        None => ThrottledExecutor::new(config.max_requests_per_window, config.window()),
    };
    PositionPoller::new(
        Arc::clone(&client) as Arc<dyn PositionFeed>,
        client,
        Arc::new(store),
        executor,
    )
}

fn print_table(snapshot: &Snapshot, stations: &StationDirectory) {
    let routed = snapshot.iter().filter(|p| p.origin().is_some()).count();
    println!("\n{} trains, {} with a known route", snapshot.len(), routed);
    for position in snapshot.iter() {
        println!("{}", format_row(position, stations));
    }
}

fn format_row(position: &EnrichedPosition, stations: &StationDirectory) -> String {
    format!(
        "{:>6}  {} → {}  {:.0} km/h",
        position.train_number(),
        stations.display_name(position.origin()),
        stations.display_name(position.dest()),
        position.position.speed
    )
}
