use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub darwin: DarwinConfig,
    pub hsp: HspConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Darwin PushPort STOMP connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DarwinConfig {
    pub host: String,
    pub port: u16,
    /// Topic to subscribe to, e.g. `/topic/darwin.pushport-v16`.
    pub topic: String,
    pub username: String,
    pub password: String,
    /// Heartbeat interval in milliseconds, both directions (default: 15000)
    #[serde(default = "DarwinConfig::default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    /// Seconds to sleep before reconnecting after a drop (default: 15)
    #[serde(default = "DarwinConfig::default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// STOMP subscription id (default: "1")
    #[serde(default = "DarwinConfig::default_subscription_id")]
    pub subscription_id: String,
}

impl DarwinConfig {
    fn default_heartbeat_ms() -> u64 {
        15000
    }
    fn default_reconnect_delay_secs() -> u64 {
        15
    }
    fn default_subscription_id() -> String {
        "1".to_string()
    }
}

/// HSP service-details endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HspConfig {
    pub service_details_url: String,
    pub username: String,
    pub password: String,
    /// Request timeout in seconds (default: 20)
    #[serde(default = "HspConfig::default_timeout_secs")]
    pub timeout_secs: f64,
}

impl HspConfig {
    fn default_timeout_secs() -> f64 {
        20.0
    }
}

/// On-disk locations for the database, model artifacts, and reference data.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "PathsConfig::default_database")]
    pub database: PathBuf,
    #[serde(default = "PathsConfig::default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "PathsConfig::default_weights_dir")]
    pub weights_dir: PathBuf,
    #[serde(default = "PathsConfig::default_stations_csv")]
    pub stations_csv: PathBuf,
    /// Optional holiday calendar; absent means no holidays are flagged.
    #[serde(default)]
    pub holidays_csv: Option<PathBuf>,
}

impl PathsConfig {
    fn default_database() -> PathBuf {
        PathBuf::from("data/database/realtime_predictions.db")
    }
    fn default_models_dir() -> PathBuf {
        PathBuf::from("data/models")
    }
    fn default_weights_dir() -> PathBuf {
        PathBuf::from("data/weights")
    }
    fn default_stations_csv() -> PathBuf {
        PathBuf::from("data/resources/tiploc.csv")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: Self::default_database(),
            models_dir: Self::default_models_dir(),
            weights_dir: Self::default_weights_dir(),
            stations_csv: Self::default_stations_csv(),
            holidays_csv: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
