//! Configuration loading and typed config structures for the dispatch engine.
//!
//! The canonical configuration lives in `rescue-config.yaml` at the project
//! root. Every field has a default, so an empty or missing file yields a
//! runnable configuration with an empty fleet.

use std::path::Path;

use rescue_types::{CapacityLevel, FacilityId, ResponderId, UnitType};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration, mirroring `rescue-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RescueConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ListenConfig,

    /// Fanout hub sizing.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resources registered at startup.
    #[serde(default)]
    pub seed: SeedConfig,
}

impl RescueConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `RESCUE_HOST` and `RESCUE_PORT` override `server.host` and
    /// `server.port` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string. A blank document yields
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_env_overrides();
        Ok(config)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ListenConfig {
    /// Override the listener with `RESCUE_HOST` / `RESCUE_PORT` when set.
    ///
    /// An unparseable port is ignored and the configured value kept.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RESCUE_HOST") {
            self.host = val;
        }
        if let Some(port) = std::env::var("RESCUE_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.port = port;
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Fanout hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FanoutConfig {
    /// Per-audience broadcast buffer. Members further behind than this skip
    /// ahead.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Resources registered when the daemon starts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeedConfig {
    /// Fleet.
    #[serde(default)]
    pub vehicles: Vec<SeedVehicle>,

    /// Field crews.
    #[serde(default)]
    pub responders: Vec<SeedResponder>,

    /// Receiving facilities.
    #[serde(default)]
    pub facilities: Vec<SeedFacility>,
}

/// A vehicle registered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedVehicle {
    /// Unit designator.
    pub id: String,

    /// Capability class.
    #[serde(default)]
    pub unit_type: UnitType,
}

/// A responder registered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedResponder {
    /// Fixed identity; generated when omitted.
    #[serde(default)]
    pub id: Option<ResponderId>,

    /// Display name.
    pub name: String,

    /// Opted in to assignments at startup.
    #[serde(default = "default_true")]
    pub available: bool,
}

/// A facility mirrored at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedFacility {
    /// Fixed identity the capacity collaborator addresses; generated when
    /// omitted.
    #[serde(default)]
    pub id: Option<FacilityId>,

    /// Facility name.
    pub name: String,

    /// Street address.
    #[serde(default)]
    pub address: String,

    /// Licensed beds.
    #[serde(default)]
    pub total_beds: u32,

    /// Beds free at startup. Defaults to all of them.
    #[serde(default)]
    pub available_beds: Option<u32>,

    /// Emergency department load.
    #[serde(default)]
    pub capacity: CapacityLevel,
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RescueConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.fanout.channel_capacity, 256);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.seed.vehicles.is_empty());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"

fanout:
  channel_capacity: 64

logging:
  level: "debug"
  json: true

seed:
  vehicles:
    - id: "AMB-001"
      unit_type: ADVANCED
    - id: "AMB-002"
  responders:
    - name: "Fatmata Sesay"
    - name: "Ibrahim Conteh"
      available: false
  facilities:
    - name: "Connaught Hospital"
      address: "Percival Street, Freetown"
      total_beds: 300
      available_beds: 45
      capacity: MODERATE
"#;

        let config = RescueConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.fanout.channel_capacity, 64);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.seed.vehicles.len(), 2);
        assert_eq!(
            config.seed.vehicles.first().map(|v| v.unit_type),
            Some(UnitType::Advanced)
        );
        assert_eq!(
            config.seed.vehicles.get(1).map(|v| v.unit_type),
            Some(UnitType::Basic)
        );
        assert_eq!(
            config.seed.responders.iter().filter(|r| r.available).count(),
            1
        );
        let facility = config.seed.facilities.first();
        assert_eq!(facility.and_then(|f| f.available_beds), Some(45));
        assert_eq!(facility.map(|f| f.capacity), Some(CapacityLevel::Moderate));
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "fanout:\n  channel_capacity: 8\n";
        let config = RescueConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.fanout.channel_capacity, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(RescueConfig::parse("").is_ok());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = RescueConfig::parse("fanout: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("rescue-config.yaml");
        if path.exists() {
            let config = RescueConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
