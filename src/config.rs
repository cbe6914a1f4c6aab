use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub geo: GeoConfig,
    pub location: LocationConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,           // Log backend, also the origin checked for precise location
    pub poll_interval_seconds: u64, // 0 disables polling
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeoConfig {
    pub reverse_geocode_url: String,
    pub ip_geolocation_url: String,
    pub language: String, // Accept-Language for reverse geocoding
    pub http_timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSource {
    None,
    Manual,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationConfig {
    pub device: DeviceSource, // "none" disables precise location entirely
    pub manual_lat: f64,      // Reported as the device position if device = "manual"
    pub manual_lon: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UiConfig {
    pub show_details: bool,
    pub state_file: String, // Where the location prompt record lives
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:5000".to_string(),
                poll_interval_seconds: 30,
            },
            geo: GeoConfig {
                reverse_geocode_url: "https://nominatim.openstreetmap.org".to_string(),
                ip_geolocation_url: "https://ipapi.co".to_string(),
                language: "fr".to_string(),
                http_timeout_seconds: 10,
            },
            location: LocationConfig {
                device: DeviceSource::None,
                manual_lat: 45.7640,
                manual_lon: 4.8357,
            },
            ui: UiConfig {
                show_details: false,
                state_file: "state.toml".to_string(),
            },
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Config::default();
                }
            }
        }

        // Save default config to disk for the user to edit later
        let default_config = Config::default();
        if let Err(e) = default_config.save_to(path) {
            warn!("Could not write default {} to disk: {}", path.display(), e);
        }

        info!("Loaded default configuration.");
        default_config
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn edited_file_is_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.api.base_url = "https://logs.example.com".to_string();
        config.location.device = DeviceSource::Manual;
        config.ui.show_details = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_file_falls_back_without_overwriting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbroken").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[api\nbroken");
    }

    #[test]
    fn device_source_uses_lowercase_names() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("device = \"none\""));
    }
}
