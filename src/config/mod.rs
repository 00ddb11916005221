// src/config/mod.rs
mod schema;

use std::path::{Path, PathBuf};
use config::{Config as ConfigLoader, FileFormat};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn, Level};

pub use schema::{Settings, GlobalConfig, ReaderConfig};

use crate::error::{UtilResult, UtilError};

/// Verbosity returned when no configuration file provides one
pub const DEFAULT_VERBOSITY: u8 = 5;

const DEFAULT_SETTINGS: &str = include_str!("../../config/default.toml");

static SETTINGS: OnceCell<Settings> = OnceCell::new();

impl Settings {
    /// Load settings from the built-in defaults, an optional user file and the environment
    pub fn load(config_path: Option<&Path>) -> UtilResult<Self> {
        info!("Loading configuration");

        let mut config_builder = ConfigLoader::builder();

        // Default configuration
        config_builder = config_builder.add_source(
            config::File::from_str(DEFAULT_SETTINGS, FileFormat::Toml)
        );

        // User-provided configuration
        if let Some(path) = config_path {
            if path.exists() {
                config_builder = config_builder.add_source(config::File::from(path));
                info!("Loading user configuration from: {}", path.display());
            } else {
                warn!("Specified configuration file not found: {}", path.display());
            }
        } else {
            let default_path = Self::get_default_config_path();
            if default_path.exists() {
                config_builder = config_builder.add_source(config::File::from(default_path.as_path()));
                info!("Loading default configuration from: {}", default_path.display());
            } else {
                debug!("No existing configuration found, using built-in defaults");
            }
        }

        // Environment variables, e.g. PARUTIL_READER__DEFAULT_POOL_SIZE=8
        config_builder = config_builder.add_source(
            config::Environment::with_prefix("PARUTIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
        );

        let settings: Settings = match config_builder.build() {
            Ok(c) => match c.try_deserialize() {
                Ok(settings) => settings,
                Err(e) => return Err(UtilError::ConfigError(format!("Failed to parse configuration: {}", e))),
            },
            Err(e) => return Err(UtilError::ConfigError(format!("Failed to build configuration: {}", e))),
        };

        Ok(settings)
    }

    /// Get the default configuration path
    pub fn get_default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".parutil/config.toml")
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> UtilResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| UtilError::SerializationError(format!("Failed to serialize configuration: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| UtilError::PathError {
                    path: parent.to_path_buf(),
                    message: format!("Failed to create directory: {}", e),
                })?;
        }

        std::fs::write(path, config_str)
            .map_err(|e| UtilError::FileError {
                path: path.to_path_buf(),
                message: format!("Failed to write configuration: {}", e),
            })?;

        info!("Configuration saved to {}", path.display());

        Ok(())
    }
}

/// Install the process-wide settings. Only the first call has an effect.
pub fn init(settings: Settings) -> &'static Settings {
    if SETTINGS.get().is_some() {
        debug!("Settings already initialised, keeping the existing value");
    }
    SETTINGS.get_or_init(|| settings)
}

/// Process-wide settings, falling back to the built-in defaults
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}

/// Look up a verbosity level in a configuration file that lives next to `anchor`.
///
/// `anchor` is usually a source file or a directory; `config_name` is resolved
/// relative to its directory. The nested key `global.verbosity` wins over a
/// top-level `verbosity`. Any missing file, missing key or unreadable value
/// yields `default`.
pub fn verbosity_lookup(anchor: &Path, config_name: &str, default: u8) -> u8 {
    let base = if anchor.is_dir() {
        anchor.to_path_buf()
    } else {
        anchor.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    let path = base.join(config_name);

    if !path.is_file() {
        debug!("No verbosity config at {}, using {}", path.display(), default);
        return default;
    }

    let loaded = ConfigLoader::builder()
        .add_source(config::File::from(path.as_path()).required(false))
        .build();

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to read verbosity config {}: {}", path.display(), e);
            return default;
        }
    };

    for key in ["global.verbosity", "verbosity"] {
        if let Ok(value) = config.get_int(key) {
            if let Ok(level) = u8::try_from(value) {
                return level;
            }
            warn!("Verbosity {} in {} is out of range", value, path.display());
        }
    }

    default
}

/// Map a numeric verbosity onto a tracing level
pub fn verbosity_to_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2..=5 => Level::INFO,
        6..=9 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
