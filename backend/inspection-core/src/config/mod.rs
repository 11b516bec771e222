pub mod state;

pub use state::{ConfigChange, ConfigCommand, ConfigState};

use crate::codec::plc::PlcLayout;
use crate::error::config::ConfigError;

use common::ErrorLocation;
use models::Protocol;

use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "gateway.json";
const CONFIG_VERSION: u32 = 1;

// ============================================
// CONFIG STRUCTS
// ============================================

/// Line-control endpoint and transport tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_connection_type")]
    pub connection_type: Protocol,
    #[serde(default = "default_plc_host")]
    pub plc_host: String,
    #[serde(default = "default_plc_port")]
    pub plc_port: u16,
    #[serde(default = "default_galc_host")]
    pub galc_host: String,
    #[serde(default = "default_galc_port")]
    pub galc_port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Read timeout of the line read loop; connection status is re-emitted at this cadence.
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_type: default_connection_type(),
            plc_host: default_plc_host(),
            plc_port: default_plc_port(),
            galc_host: default_galc_host(),
            galc_port: default_galc_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            read_poll_ms: default_read_poll_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    /// Host and port configured for `mode`.
    pub fn endpoint_for(&self, mode: Protocol) -> (String, u16) {
        match mode {
            Protocol::Plc => (self.plc_host.clone(), self.plc_port),
            Protocol::Galc => (self.galc_host.clone(), self.galc_port),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Thresholds and budget of the inspection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionConfig {
    #[serde(default = "default_min_conf_threshold")]
    pub min_conf_threshold: f32,
    #[serde(default = "default_gray_gate_threshold")]
    pub gray_gate_threshold: f32,
    #[serde(default = "default_gray_detection_enabled")]
    pub gray_detection_enabled: bool,
    #[serde(default = "default_inspection_timeout_ms")]
    pub inspection_timeout_ms: u64,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            min_conf_threshold: default_min_conf_threshold(),
            gray_gate_threshold: default_gray_gate_threshold(),
            gray_detection_enabled: default_gray_detection_enabled(),
            inspection_timeout_ms: default_inspection_timeout_ms(),
            labels: default_labels(),
        }
    }
}

impl InspectionConfig {
    pub fn inspection_timeout(&self) -> Duration {
        Duration::from_millis(self.inspection_timeout_ms)
    }
}

/// Wire-level choices that differ between line installations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub plc_layout: PlcLayout,
    /// Send a GALC stop frame (status 1) when a queued car is rejected.
    #[serde(default)]
    pub galc_stop_on_reject: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub inspection: InspectionConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            connection: ConnectionConfig::default(),
            inspection: InspectionConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_connection_type() -> Protocol {
    Protocol::Plc
}
fn default_plc_host() -> String {
    "169.254.53.31".to_string()
}
fn default_plc_port() -> u16 {
    12345
}
fn default_galc_host() -> String {
    "127.0.0.1".to_string()
}
fn default_galc_port() -> u16 {
    54321
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2_000
}
fn default_read_poll_ms() -> u64 {
    1_000
}
fn default_write_timeout_ms() -> u64 {
    2_000
}
fn default_min_conf_threshold() -> f32 {
    0.5
}
fn default_gray_gate_threshold() -> f32 {
    60.0
}
fn default_gray_detection_enabled() -> bool {
    true
}
fn default_inspection_timeout_ms() -> u64 {
    30_000
}
fn default_labels() -> Vec<String> {
    ["amorfo", "chico", "mediano", "grande"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl GatewayConfig {
    /// Load config from {config_dir}/gateway.json.
    ///
    /// A missing file yields defaults; a present but corrupt or invalid file is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: GatewayConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/gateway.json via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// True when `other` points the line connection somewhere else.
    pub fn endpoint_changed(&self, other: &GatewayConfig) -> bool {
        let (a, b) = (&self.connection, &other.connection);
        a.connection_type != b.connection_type
            || a.endpoint_for(a.connection_type) != b.endpoint_for(b.connection_type)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::validation(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        let connection = &self.connection;
        for (name, host, port) in [
            ("plc", &connection.plc_host, connection.plc_port),
            ("galc", &connection.galc_host, connection.galc_port),
        ] {
            if host.trim().is_empty() {
                return Err(ConfigError::validation(format!("{name}_host cannot be empty")));
            }
            if port == 0 {
                return Err(ConfigError::validation(format!("{name}_port cannot be 0")));
            }
        }

        if connection.max_retries == 0 {
            return Err(ConfigError::validation("max_retries must be at least 1"));
        }

        for (name, value) in [
            ("connect_timeout_ms", connection.connect_timeout_ms),
            ("read_poll_ms", connection.read_poll_ms),
            ("write_timeout_ms", connection.write_timeout_ms),
            ("inspection_timeout_ms", self.inspection.inspection_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::validation(format!("{name} must be non-zero")));
            }
        }

        let inspection = &self.inspection;
        if !(inspection.min_conf_threshold > 0.0 && inspection.min_conf_threshold <= 1.0) {
            return Err(ConfigError::validation(format!(
                "Invalid min_conf_threshold: {} (must be in (0, 1])",
                inspection.min_conf_threshold
            )));
        }

        if !(0.0..=100.0).contains(&inspection.gray_gate_threshold) {
            return Err(ConfigError::validation(format!(
                "Invalid gray_gate_threshold: {} (must be 0-100)",
                inspection.gray_gate_threshold
            )));
        }

        if inspection.labels.is_empty() {
            return Err(ConfigError::validation("labels cannot be empty"));
        }

        Ok(())
    }
}
