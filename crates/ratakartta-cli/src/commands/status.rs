use anyhow::Result;
use chrono::Utc;

use ratakartta_core::schema::Database;
use ratakartta_feed::Config;

pub fn show_status(config: &Config) -> Result<()> {
    let db_path = &config.database_path;

    println!("\nRatakartta Status\n");
    println!("  Database: {}", db_path.display());

    if !db_path.exists() {
        println!("  No cache yet. Run `ratakartta watch` to start collecting routes.");
        return Ok(());
    }

    let db = Database::open(db_path)?;
    let today = Utc::now().date_naive();

    println!(
        "  Cached routes today ({}): {}",
        today,
        db.count_trip_metadata_for_day(today)?
    );
    println!("  Cached routes total: {}", db.count_trip_metadata()?);
    println!("  API: {}", config.api_base_url);
    println!(
        "  Lookup budget: {} per {}s, polling every {}s",
        config.max_requests_per_window, config.window_secs, config.poll_interval_secs
    );

    Ok(())
}
