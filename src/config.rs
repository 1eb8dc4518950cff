//! Configuration loading and persistence.
//!
//! Reads `config.json` from the devbridge config directory and describes the
//! simulated devices to register before scripts run.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::lua::primitives::BoardInfo;
use crate::saul::{class, DeviceRegistry, SaulDevice, SimulatedDriver};

/// File name inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Configuration for the devbridge runtime.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Propagate script errors instead of logging them.
    pub strict: bool,
    /// Board name exposed as `sys.BOARD`.
    pub board: String,
    /// MCU name exposed as `sys.MCU`.
    pub mcu: String,
    /// Extra directory searched by `require` and for relative script paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_dir: Option<PathBuf>,
    /// Devices registered at startup.
    pub devices: Vec<DeviceConfig>,
}

/// One simulated device.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    /// Name used for `saul.<name>` lookups.
    pub name: String,
    /// Class name, e.g. `"SENSE_TEMP"`.
    pub class: String,
    /// Initial reading (1 to 3 values). For write-only devices only the
    /// count matters.
    #[serde(default)]
    pub values: Vec<f64>,
    /// Whether reads succeed.
    #[serde(default = "default_true")]
    pub readable: bool,
    /// Whether writes succeed.
    #[serde(default = "default_true")]
    pub writable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict: false,
            board: "native".to_string(),
            mcu: "native".to_string(),
            script_dir: None,
            devices: vec![
                DeviceConfig {
                    name: "Servomotor".to_string(),
                    class: "ACT_SERVO".to_string(),
                    values: vec![0.0],
                    readable: false,
                    writable: true,
                },
                DeviceConfig {
                    name: "TSL45315".to_string(),
                    class: "SENSE_LIGHT".to_string(),
                    values: vec![250.0],
                    readable: true,
                    writable: false,
                },
            ],
        }
    }
}

impl DeviceConfig {
    fn driver(&self) -> Result<SimulatedDriver> {
        let code = class::lookup_by_name(&self.class)
            .with_context(|| format!("Device {}: bad class {:?}", self.name, self.class))?;
        let values: &[f64] = if self.values.is_empty() {
            &[0.0]
        } else {
            &self.values
        };

        let driver = match (self.readable, self.writable) {
            (true, true) => SimulatedDriver::new(code, values),
            (true, false) => SimulatedDriver::sensor(code, values),
            (false, true) => Ok(SimulatedDriver::actuator(code, values.len())),
            (false, false) => bail!("Device {} is neither readable nor writable", self.name),
        };
        driver.with_context(|| format!("Device {}: bad initial values", self.name))
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// Directory selection priority:
    /// 1. `DEVBRIDGE_CONFIG_DIR` env var
    /// 2. Platform config dir (Linux: `~/.config/devbridge`)
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("DEVBRIDGE_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("devbridge"))
    }

    /// Loads configuration from the config directory, with environment
    /// variable overrides. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_dir(&Self::config_dir()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads `config.json` from `dir`, or the defaults if it does not exist.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Loads a specific config file. Unlike [`Config::load_from_dir`], a
    /// missing file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies `DEVBRIDGE_STRICT` and `DEVBRIDGE_BOARD`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(strict) = var("DEVBRIDGE_STRICT") {
            self.strict = strict == "1";
        }
        if let Some(board) = var("DEVBRIDGE_BOARD") {
            self.board = board;
        }
    }

    /// Persists the configuration to `dir`, creating it if necessary.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Board facts exposed to scripts.
    pub fn board_info(&self) -> BoardInfo {
        BoardInfo {
            board: self.board.clone(),
            mcu: self.mcu.clone(),
        }
    }

    /// Builds a registry holding one simulated driver per configured device.
    pub fn build_registry(&self) -> Result<DeviceRegistry> {
        let registry = DeviceRegistry::new();
        for device in &self.devices {
            let driver = device.driver()?;
            registry.add(SaulDevice::new(device.name.clone(), Arc::new(driver)));
        }
        log::info!("Registered {} simulated device(s)", registry.len());
        Ok(registry)
    }
}
