//! Configuration for hitit-scanner
//!
//! Two tiers:
//! 1. **TOML bootstrap** (`[scanner]` section): bind address, timing
//!    constants, platform bridging. Read once at startup.
//! 2. **Database runtime**: user preferences in the `settings` table, see
//!    [`crate::settings`].
//!
//! A missing config file is normal; every key has a built-in default.

use crate::orientation::{SensorPolarity, SensorScale};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default HTTP port for the scanner service
pub const DEFAULT_PORT: u16 = 5780;

/// Database file name inside the root folder
pub const DB_FILE_NAME: &str = "hitit.db";

/// Whole TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Root folder for the database (also read by root folder resolution)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub scanner: ScannerConfig,
}

/// `[scanner]` section
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Artificial latency of the built-in card table, emulating a network lookup
    #[serde(default = "default_lookup_delay_ms")]
    pub simulated_lookup_delay_ms: u64,

    /// Grace period after the flip prompt appears before the sensor counts
    #[serde(default = "default_flip_arm_delay_ms")]
    pub flip_arm_delay_ms: u64,

    /// Release preview builds never auto-flip, whatever the stored setting says
    #[serde(default)]
    pub release_preview: bool,

    #[serde(default = "default_deezer_api_base")]
    pub deezer_api_base: String,

    #[serde(default)]
    pub sensor_scale: SensorScale,

    #[serde(default)]
    pub sensor_polarity: SensorPolarity,

    /// URL schemes the desktop launcher reports as handled (e.g. `deezer`)
    #[serde(default)]
    pub installed_schemes: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            simulated_lookup_delay_ms: default_lookup_delay_ms(),
            flip_arm_delay_ms: default_flip_arm_delay_ms(),
            release_preview: false,
            deezer_api_base: default_deezer_api_base(),
            sensor_scale: SensorScale::default(),
            sensor_polarity: SensorPolarity::default(),
            installed_schemes: Vec::new(),
        }
    }
}

impl ScannerConfig {
    pub fn simulated_lookup_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_lookup_delay_ms)
    }

    pub fn flip_arm_delay(&self) -> Duration {
        Duration::from_millis(self.flip_arm_delay_ms)
    }
}

/// Load the config file, falling back to defaults when it is missing or invalid
pub fn load(path: Option<&Path>) -> ConfigFile {
    let path = path
        .map(Path::to_path_buf)
        .or_else(hitit_common::config::default_config_path);
    hitit_common::config::load_toml_or_default(path.as_deref())
}

/// Path of the settings database under `root_folder`
pub fn db_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DB_FILE_NAME)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_lookup_delay_ms() -> u64 {
    300
}

fn default_flip_arm_delay_ms() -> u64 {
    500
}

fn default_deezer_api_base() -> String {
    crate::deezer::DEEZER_API_BASE.to_string()
}
