//! Daemon configuration: YAML file plus connection endpoints.
//!
//! Every YAML field has a default, so an empty or missing file yields a
//! config that polls both Trafikverket streams every 30 seconds. The
//! Sundsvall city-works stream is opt-in.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ingress_clients::{DEFAULT_CITY_WORKS_URL, DEFAULT_WEATHER_BOX};

use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngressConfig {
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub streams: StreamsConfig,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            streams: StreamsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamsConfig {
    pub weather: WeatherStreamConfig,
    pub road_accidents: RoadAccidentStreamConfig,
    pub city_works: CityWorksStreamConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherStreamConfig {
    pub enabled: bool,
    /// SWEREF99TM box, `"x1 y1, x2 y2"`.
    pub bounding_box: String,
}

impl Default for WeatherStreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bounding_box: DEFAULT_WEATHER_BOX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoadAccidentStreamConfig {
    pub enabled: bool,
    /// Trafikverket county number; all counties when unset.
    pub county: Option<u32>,
}

impl Default for RoadAccidentStreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            county: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CityWorksStreamConfig {
    pub enabled: bool,
    /// GeoJSON feature collection of ongoing works.
    pub url: String,
}

impl Default for CityWorksStreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_CITY_WORKS_URL.to_string(),
        }
    }
}

impl IngressConfig {
    /// Load and validate the config at `path`. The file must exist.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: IngressConfig = if contents.trim().is_empty() {
            IngressConfig::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Like [`IngressConfig::load_at`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_at(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }
        let streams = &self.streams;
        if !streams.weather.enabled && !streams.road_accidents.enabled && !streams.city_works.enabled
        {
            return Err(ConfigError::Invalid("no stream is enabled".into()));
        }
        if self.streams.weather.enabled && self.streams.weather.bounding_box.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "streams.weather.bounding_box must not be empty".into(),
            ));
        }
        if self.streams.city_works.enabled && self.streams.city_works.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "streams.city_works.url must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where to read changes from and write entities to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_url: String,
    pub auth_key: String,
    pub broker_url: String,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.yaml");
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("dir");
        let config = IngressConfig::load_or_default(&dir.path().join("absent.yaml")).expect("load");
        assert_eq!(config, IngressConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.streams.weather.bounding_box, DEFAULT_WEATHER_BOX);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().expect("dir");
        let path = write(
            &dir,
            "poll_interval_secs: 60\nstreams:\n  road_accidents:\n    county: 22\n",
        );

        let config = IngressConfig::load_at(&path).expect("load");

        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.streams.weather.enabled);
        assert!(config.streams.road_accidents.enabled);
        assert_eq!(config.streams.road_accidents.county, Some(22));
        assert!(!config.streams.city_works.enabled);
    }

    #[test]
    fn city_works_can_be_the_only_stream() {
        let dir = TempDir::new().expect("dir");
        let path = write(
            &dir,
            "streams:\n  weather:\n    enabled: false\n  road_accidents:\n    enabled: false\n  city_works:\n    enabled: true\n",
        );

        let config = IngressConfig::load_at(&path).expect("load");

        assert!(config.streams.city_works.enabled);
        assert_eq!(config.streams.city_works.url, DEFAULT_CITY_WORKS_URL);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = TempDir::new().expect("dir");
        let path = write(&dir, "poll_interval_secs: [not a number\n");

        let err = IngressConfig::load_at(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().expect("dir");
        let path = write(&dir, "pol_interval_secs: 5\n");
        assert!(matches!(
            IngressConfig::load_at(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let dir = TempDir::new().expect("dir");
        let path = write(&dir, "poll_interval_secs: 0\n");
        assert!(matches!(
            IngressConfig::load_at(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn at_least_one_stream_must_be_enabled() {
        let mut config = IngressConfig::default();
        config.streams.weather.enabled = false;
        config.validate().expect("accidents alone is fine");

        config.streams.road_accidents.enabled = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no stream is enabled"));
    }
}
