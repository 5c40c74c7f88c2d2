//! Configuration
//!
//! TOML file, every key optional. Looked up at an explicit path or at
//! `<config dir>/novacontrol/config.toml`; defaults otherwise.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::event::{ArmMode, ControlMode};

/// Default per-subscriber queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Per-subscriber event queue capacity
    pub event_queue_size: usize,
    pub safety: SafetyConfig,
    pub intent: IntentConfig,
    pub keyboard: KeyboardConfig,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            event_queue_size: DEFAULT_QUEUE_SIZE,
            safety: SafetyConfig::default(),
            intent: IntentConfig::default(),
            keyboard: KeyboardConfig::default(),
            status: StatusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Safety gating thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Arming state at startup
    pub default_mode: ArmMode,
    /// Intents below this confidence are rejected
    pub min_confidence: f64,
    /// Minimum gap between clicks; scrolls use the same value
    pub click_cooldown_ms: u64,
    /// How long a pinch must be held before a drag starts
    pub drag_hold_ms: u64,
    pub auto_disarm_on_tracking_loss: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            default_mode: ArmMode::Safe,
            min_confidence: 0.6,
            click_cooldown_ms: 250,
            drag_hold_ms: 600,
            auto_disarm_on_tracking_loss: true,
        }
    }
}

/// Intent recognition thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Fist hold before a precise click fires (and re-fires)
    pub fist_click_ms: u64,
    pub initial_control_mode: ControlMode,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            fist_click_ms: 100,
            initial_control_mode: ControlMode::Eye,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub arm_key: String,
    pub emergency_key: String,
    /// Pressing the arm key toggles ARMED/SAFE instead of only arming
    pub toggle_arm: bool,
    /// Releasing the arm key disarms (hold-to-arm)
    pub safe_on_release: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            arm_key: "space".to_string(),
            emergency_key: "esc".to_string(),
            toggle_arm: true,
            safe_on_release: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Status report period; 0 disables the reporter
    pub interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    /// Also write logs to `<log_dir>/novacontrol.log`
    pub file: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl LoggingConfig {
    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join("novacontrol.log")
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("novacontrol").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_size must be at least 1".to_string(),
            ));
        }
        let min_confidence = self.safety.min_confidence;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "safety.min_confidence must be within [0, 1], got {min_confidence}"
            )));
        }
        Ok(())
    }
}
