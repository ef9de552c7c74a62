use anyhow::Result;
use ratakartta_feed::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let config_path = config::config_file_path();
    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  api_base_url: {}", config.api_base_url);
    println!("  database_path: {}", config.database_path.display());
    println!("  poll_interval_secs: {}", config.poll_interval_secs);
    println!("  max_requests_per_window: {}", config.max_requests_per_window);
    println!("  window_secs: {}", config.window_secs);
    println!(
        "  max_backlog: {}",
        config
            .max_backlog
            .map_or_else(|| "<unbounded>".to_string(), |n| n.to_string())
    );
    println!("  log_level: {}", config.log_level);

    println!("\nPriority: CLI args > ENV vars (RATA_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure ratakartta.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
