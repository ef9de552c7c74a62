use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for ratakartta.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (RATA_* prefix)
/// 3. Config file (~/.config/ratakartta/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Digitraffic rail API.
    ///
    /// Can be set via:
    /// - ENV: RATA_API_BASE_URL
    /// - Config: api_base_url = "..."
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path to the SQLite database holding the durable metadata cache.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: RATA_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/ratakartta/ratakartta.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Seconds between live position polls.
    #[serde(
        default = "default_poll_interval_secs",
        deserialize_with = "number_or_string"
    )]
    pub poll_interval_secs: u64,

    /// Timetable requests admitted per rate window.
    #[serde(
        default = "default_max_requests_per_window",
        deserialize_with = "number_or_string"
    )]
    pub max_requests_per_window: u32,

    /// Length of the rate window in seconds.
    #[serde(default = "default_window_secs", deserialize_with = "number_or_string")]
    pub window_secs: u64,

    /// Optional cap on queued timetable requests. Unbounded when unset.
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub max_backlog: Option<usize>,

    /// Default log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            database_path: default_db_path(),
            poll_interval_secs: default_poll_interval_secs(),
            max_requests_per_window: default_max_requests_per_window(),
            window_secs: default_window_secs(),
            max_backlog: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/ratakartta/config.toml
    /// Reads environment variables with RATA_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting values are out of range.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("rata");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if self.window_secs == 0 {
            anyhow::bail!("window_secs must be greater than zero");
        }
        if self.max_requests_per_window == 0 {
            anyhow::bail!("max_requests_per_window must be greater than zero");
        }
        Ok(())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Accept a number either as a native value or as a string, since
/// environment overrides always arrive as strings.
fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn optional_number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    number_or_string(deserializer).map(Some)
}

fn default_api_base_url() -> String {
    "https://rata.digitraffic.fi/api/v1".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    10
}

const fn default_max_requests_per_window() -> u32 {
    50
}

const fn default_window_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Get the default database path.
///
/// Returns: ~/.local/share/ratakartta/ratakartta.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ratakartta")
        .join("ratakartta.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/ratakartta/config.toml
/// - macOS: ~/Library/Application Support/ratakartta/config.toml
/// - Windows: %APPDATA%\ratakartta\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ratakartta")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Ratakartta Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (RATA_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Digitraffic rail API base URL
# Environment: RATA_API_BASE_URL
#api_base_url = "https://rata.digitraffic.fi/api/v1"

# Path to the SQLite database caching trip origin/destination per day
# CLI: ratakartta --db /custom/path.db watch
# Environment: RATA_DATABASE_PATH
#database_path = "/path/to/custom/ratakartta.db"

# Seconds between live position polls
#poll_interval_secs = 10

# Timetable lookups admitted per window, and the window length in seconds.
# Digitraffic throttles clients that exceed its request budget.
#max_requests_per_window = 50
#window_secs = 60

# Maximum number of queued timetable lookups (unbounded when unset)
#max_backlog = 500

# Log filter used when RUST_LOG is not set
#log_level = "info"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
