//! Dataset loader: CSV directory discovery and typed snapshot.
//!
//! The loader scans `<root_dir>/<csv_subdir>` (default `data/csv`) for CSV
//! files, derives a table name from each file name and parses it into a
//! [`Table`]. [`Dataset`] then turns the raw tables into typed records.

mod dataset;
mod table;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use olist_shared::{AppConfig, OlistError, Result};
use tracing::{debug, info, instrument, warn};

pub use dataset::{Dataset, REQUIRED_COLUMNS, validate_schema};
pub use table::{Column, ColumnType, Table, Value};

/// Loaded tables keyed by derived table name.
pub type TableMap = BTreeMap<String, Table>;

// ---------------------------------------------------------------------------
// LoaderConfig
// ---------------------------------------------------------------------------

/// Where to find the CSV files and how to name the resulting tables.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Root directory the CSV subdirectory is resolved against.
    pub root_dir: PathBuf,
    /// Directory under `root_dir` holding the CSV files.
    pub csv_subdir: PathBuf,
    /// Prefix stripped from file names (`olist_`).
    pub table_prefix: String,
    /// Suffix stripped from file stems (`_dataset`).
    pub table_suffix: String,
    /// Extension of the files to load, without the dot.
    pub extension: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for LoaderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            root_dir: PathBuf::from(&config.data.root_dir),
            csv_subdir: PathBuf::from(&config.data.csv_subdir),
            table_prefix: config.data.table_prefix.clone(),
            table_suffix: config.data.table_suffix.clone(),
            extension: config.data.extension.clone(),
        }
    }
}

impl LoaderConfig {
    /// Replace the root directory.
    pub fn with_root(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Directory that is scanned for CSV files.
    pub fn csv_dir(&self) -> PathBuf {
        self.root_dir.join(&self.csv_subdir)
    }

    /// Derive a table name from a file name.
    ///
    /// `olist_orders_dataset.csv` → `orders`, `translation.csv` →
    /// `translation`. Returns `None` when the extension does not match.
    pub fn table_name(&self, file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(&format!(".{}", self.extension))?;
        let stem = stem.strip_prefix(&self.table_prefix).unwrap_or(stem);
        let stem = stem.strip_suffix(&self.table_suffix).unwrap_or(stem);
        (!stem.is_empty()).then(|| stem.to_string())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting loader status.
pub trait LoadProgress {
    /// Called after each table is parsed.
    fn table_loaded(&self, name: &str, rows: usize, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl LoadProgress for SilentProgress {
    fn table_loaded(&self, _name: &str, _rows: usize, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Load every CSV file directly inside the configured directory.
///
/// Files whose extension does not match are skipped silently. Fails with
/// [`OlistError::FileAccess`] when the directory is missing or unreadable.
#[instrument(skip_all, fields(dir = %config.csv_dir().display()))]
pub fn load_tables(config: &LoaderConfig, progress: &dyn LoadProgress) -> Result<TableMap> {
    let dir = config.csv_dir();
    let files = discover_files(config, &dir)?;
    let total = files.len();

    let mut tables = TableMap::new();
    for (i, (name, path)) in files.into_iter().enumerate() {
        let table = Table::from_path(name.clone(), &path)?;
        debug!(table = %name, rows = table.row_count(), path = %path.display(), "table parsed");
        progress.table_loaded(&name, table.row_count(), i + 1, total);

        if tables.insert(name.clone(), table).is_some() {
            warn!(table = %name, path = %path.display(), "duplicate table name, keeping the later file");
        }
    }

    info!(tables = tables.len(), "csv tables loaded");
    Ok(tables)
}

/// List `(table name, path)` pairs in file-name order.
fn discover_files(config: &LoaderConfig, dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| OlistError::file_access(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| config.table_name(n))
        else {
            continue;
        };
        files.push((name, path));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Diagnostic no-op.
pub fn ping() -> &'static str {
    "pong"
}
