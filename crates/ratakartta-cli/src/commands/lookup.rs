use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use ratakartta_core::model::{TrainNumber, TripMetadata};
use ratakartta_feed::{Config, DigitrafficClient};

use super::load_stations;

/// Fetch one train's timetable directly, bypassing the cache and throttle.
pub async fn run_lookup(config: &Config, train: TrainNumber, date: Option<NaiveDate>) -> Result<()> {
    let day = date.unwrap_or_else(|| Utc::now().date_naive());
    let client = DigitrafficClient::new(config.api_base_url.as_str())
        .context("Failed to create HTTP client")?;

    let timetables = client
        .train(day, train)
        .await
        .with_context(|| format!("Failed to fetch timetable for train {train} on {day}"))?;

    if timetables.is_empty() {
        println!("Train {} does not run on {}", train, day);
        return Ok(());
    }

    let metadata = TripMetadata::from_timetables(&timetables);
    let stations = load_stations(&client).await;

    println!("Train {} on {}", train, day);
    println!(
        "  Origin:      {}",
        stations.display_name(metadata.origin.as_deref())
    );
    println!(
        "  Destination: {}",
        stations.display_name(metadata.dest.as_deref())
    );

    Ok(())
}
