//! Application configuration.
//!
//! User config lives at `~/.olist/olist.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OlistError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "olist.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".olist";

// ---------------------------------------------------------------------------
// Config structs (matching olist.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the CSV tables live and how their files are named.
    #[serde(default)]
    pub data: DataConfig,

    /// Default flags for the training-set assembly.
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// `[data]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory; relative paths resolve against the working directory.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Directory under `root_dir` holding the CSV files.
    #[serde(default = "default_csv_subdir")]
    pub csv_subdir: String,

    /// File name prefix stripped when deriving table names.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// File stem suffix stripped when deriving table names.
    #[serde(default = "default_table_suffix")]
    pub table_suffix: String,

    /// Extension of the files to load (without the dot).
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            csv_subdir: default_csv_subdir(),
            table_prefix: default_table_prefix(),
            table_suffix: default_table_suffix(),
            extension: default_extension(),
        }
    }
}

fn default_root_dir() -> String {
    ".".into()
}
fn default_csv_subdir() -> String {
    "data/csv".into()
}
fn default_table_prefix() -> String {
    "olist_".into()
}
fn default_table_suffix() -> String {
    "_dataset".into()
}
fn default_extension() -> String {
    "csv".into()
}

/// `[features]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Keep only delivered orders in the wait-time derivation.
    #[serde(default = "default_true")]
    pub is_delivered: bool,

    /// Join the seller-customer distance into the training set.
    #[serde(default)]
    pub with_distance_seller_customer: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            is_delivered: true,
            with_distance_seller_customer: false,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.olist/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| OlistError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.olist/olist.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OlistError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OlistError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| OlistError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| OlistError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| OlistError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}
