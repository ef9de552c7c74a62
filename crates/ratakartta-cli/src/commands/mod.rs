pub mod config;
pub mod lookup;
pub mod status;
pub mod watch;

pub use lookup::run_lookup;
pub use status::show_status;
pub use watch::run_watch;

use ratakartta_core::model::StationDirectory;
use ratakartta_feed::DigitrafficClient;

/// Fetch station names, falling back to bare station codes.
async fn load_stations(client: &DigitrafficClient) -> StationDirectory {
    match client.stations().await {
        Ok(stations) => {
            let directory = StationDirectory::from_stations(stations);
            log::debug!("Loaded {} stations", directory.len());
            directory
        }
        Err(e) => {
            log::warn!("Station names unavailable, showing codes: {}", e);
            StationDirectory::default()
        }
    }
}
