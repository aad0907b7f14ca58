// config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

const APP_NAME: &str = "moontrack";
const CONFIG_FILE_NAME: &str = "config.json";

fn default_config_path() -> PathBuf {
    let mut dir = dirs_next::config_dir().unwrap_or_else(|| {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    });
    dir.push(APP_NAME);
    dir.push(CONFIG_FILE_NAME);
    dir
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Observer's QTH name, informational only
    pub qth: String,
    /// Latitude, signed decimal degrees or hemisphere form ("47.468 N")
    pub latitude: String,
    /// Longitude, signed decimal degrees or hemisphere form ("9.732 E")
    pub longitude: String,
    /// Elevation above sea level at the QTH, meters
    pub elevation_m: f64,
    /// Host of the rotor control daemon (e.g. hamlib rotctld)
    pub rotctld_host: String,
    /// Port of the rotor control daemon
    pub rotctld_port: u16,
    /// Azimuth of the park position, degrees
    pub rotctld_park_az: f64,
    /// Elevation of the park position, degrees
    pub rotctld_park_el: f64,
    /// Maximum accepted park elevation, degrees
    pub rotctld_park_max_el: f64,
    /// Tracking loop interval, seconds
    pub tick_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qth: "Lauterach".to_string(),
            latitude: "47.468 N".to_string(),
            longitude: "9.732 E".to_string(),
            elevation_m: 500.0,
            rotctld_host: "127.0.0.1".to_string(),
            rotctld_port: 4533,
            rotctld_park_az: 0.0,
            rotctld_park_el: 0.0,
            rotctld_park_max_el: 90.0,
            tick_interval_secs: 5,
        }
    }
}

impl Config {
    /// Load from `path` (or the per-user default location). A missing file
    /// is written with default values so the user has something to edit.
    pub fn load_or_init(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let cfg = serde_json::from_str(&raw)?;
            Ok(cfg)
        } else {
            let cfg = Config::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Save this config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }
}
