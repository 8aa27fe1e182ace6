//! Configuration loading and watch root resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "STDFP_CONFIG";

/// Environment variable overriding the watched root directory
pub const WATCH_ROOT_ENV_VAR: &str = "STDFP_WATCH_ROOT";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Directory holding the per-stage log files
    pub directory: PathBuf,

    /// Lines written to a stage log before it is rotated
    pub max_lines: usize,

    /// Rotated copies kept per stage (`name.log.1` .. `name.log.N`)
    pub backup_count: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            level: defaults.log_level,
            directory: defaults.log_directory,
            max_lines: 1000,
            backup_count: 1,
        }
    }
}

/// Built-in fallbacks used when neither CLI, environment nor TOML provide a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub watch_root: PathBuf,
    pub log_level: String,
    pub log_directory: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let watch_root = if cfg!(target_os = "windows") {
            PathBuf::from("\\\\gpm-pe-data\\ENGI_MCD_STDF")
        } else {
            PathBuf::from("/prj/ENGI_MCD_STDF")
        };

        let log_directory = dirs::data_local_dir()
            .map(|d| d.join("stdfp").join("logs"))
            .unwrap_or_else(|| PathBuf::from("./logs"));

        Self {
            watch_root,
            log_level: "info".to_string(),
            log_directory,
        }
    }
}

/// Locate the configuration file.
///
/// Priority order:
/// 1. Explicit path (command line)
/// 2. `STDFP_CONFIG` environment variable
/// 3. `~/.config/stdfp/config.toml`
/// 4. `/etc/stdfp/config.toml` (Linux only)
///
/// Returns `None` when nothing exists; callers fall back to defaults.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("stdfp").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/stdfp/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load and deserialize a TOML configuration document.
///
/// A missing location yields `T::default()` with a warning; a file that exists
/// but cannot be read or parsed is an error.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No configuration file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Watch root resolution.
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. `STDFP_WATCH_ROOT` environment variable
/// 3. TOML `watch_root`
/// 4. Compiled default (fallback)
#[derive(Debug, Clone, Default)]
pub struct WatchRootResolver {
    cli_arg: Option<PathBuf>,
}

impl WatchRootResolver {
    pub fn new(cli_arg: Option<PathBuf>) -> Self {
        Self { cli_arg }
    }

    pub fn resolve(&self, toml_value: Option<&Path>) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(WATCH_ROOT_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = toml_value {
            return path.to_path_buf();
        }

        CompiledDefaults::for_current_platform().watch_root
    }
}
