//! Application settings loaded from config.toml
//!
//! The settings file is optional: a missing file yields the defaults, while a file
//! that exists but cannot be read or parsed is a configuration error. The
//! `DATABASE_URL` environment variable overrides the database location from the file.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Default file name offered when exporting
pub const DEFAULT_EXPORT_FILE_NAME: &str = "notas_fiscais.xlsx";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Store settings
    pub database: DatabaseSettings,
    /// Spreadsheet export settings
    pub export: ExportSettings,
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// `SeaORM` connection URL of the invoice store
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[export]` section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportSettings {
    /// File name proposed when asking for the export destination
    pub default_file_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            default_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns `Error::Config` if the TOML syntax is invalid or a field has the wrong type.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from a TOML file, falling back to defaults when the file is absent.
///
/// # Errors
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        debug!("No settings file at {:?}, using defaults", path_ref);
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    let settings = parse_settings(&contents)?;
    info!("Loaded settings from {:?}", path_ref);
    Ok(settings)
}

/// Resolves the database URL: explicit override, then `DATABASE_URL`, then the settings.
#[must_use]
pub fn resolve_database_url(settings: &Settings, override_url: Option<&str>) -> String {
    if let Some(url) = override_url {
        return url.to_string();
    }
    std::env::var("DATABASE_URL").unwrap_or_else(|_| settings.database.url.clone())
}
