//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name used under platform config/data folders
pub const APP_DIR: &str = "hitit";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    let config_path = config_file.map(Path::to_path_buf).or_else(default_config_path);
    if let Some(config_path) = config_path {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    default_root_folder()
}

/// Default configuration file path for the platform, if it exists
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/hitit/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./hitit_data"))
}

/// Parse a TOML config file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Load a TOML config file, degrading to `T::default()` when it is missing
///
/// A missing file is normal on first run and only logged at debug level; an
/// unreadable or malformed file is logged as a warning.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> T {
    let Some(path) = path else {
        debug!("No config file given, using defaults");
        return T::default();
    };

    if !path.exists() {
        debug!("Config file {} not found, using defaults", path.display());
        return T::default();
    }

    match load_toml(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{} - using defaults", e);
            T::default()
        }
    }
}
