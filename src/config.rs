//! Runtime configuration: storage locations and scan timing

use crate::debouncer::{DEFAULT_DISPLAY_WINDOW, DEFAULT_REARM_COOLDOWN};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where data lives and how the scanner is paced
#[derive(Debug, Clone)]
pub struct Config {
    /// Application-private root, e.g. `~/.local/share/scan_inventory`
    pub data_dir: PathBuf,
    pub rearm_cooldown: Duration,
    pub display_window: Duration,
}

impl Config {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// SQLite file backing the key-value store
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.db")
    }

    /// Root passed to the file store (`data/` and `exports/` live below it)
    pub fn file_store_root(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rearm_cooldown: DEFAULT_REARM_COOLDOWN,
            display_window: DEFAULT_DISPLAY_WINDOW,
        }
    }
}

/// Returns the default data directory: ~/.local/share/scan_inventory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scan_inventory")
}
