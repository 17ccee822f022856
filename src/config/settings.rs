//! User settings for the execution core
//!
//! Settings live in `settings.toml` next to the app state. Every field has a
//! default, so a missing file or a partial file is fine.
//!
//! ```toml
//! [execution]
//! max_stdout_lines = 1000
//!
//! [persistence]
//! backup_count = 5
//! use_swap = true
//!
//! [scripting]
//! max_operations = 5000000
//!
//! [node_packs]
//! installed_dirs = ["/opt/nodezator/packs"]
//! ```

use super::{app_data_dir, ensure_app_data_dir};
use crate::error::{NodezatorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename
pub const SETTINGS_FILE: &str = "settings.toml";

/// Default number of captured stdout lines kept per execution
pub const DEFAULT_MAX_STDOUT_LINES: usize = 1000;

/// Default number of timestamped backups kept per document
pub const DEFAULT_BACKUP_COUNT: usize = 5;

/// All user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub execution: ExecutionSettings,
    pub persistence: PersistenceSettings,
    pub scripting: ScriptingSettings,
    pub node_packs: NodePackSettings,
}

/// Execution engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Lines kept in the captured stdout buffer; oldest are dropped first
    pub max_stdout_lines: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_stdout_lines: DEFAULT_MAX_STDOUT_LINES,
        }
    }
}

/// Document persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Timestamped backups kept next to a document; 0 disables backups
    pub backup_count: usize,
    /// Maintain a swap file while a document is open
    pub use_swap: bool,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            backup_count: DEFAULT_BACKUP_COUNT,
            use_swap: true,
        }
    }
}

/// Safety limits applied to node scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingSettings {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptingSettings {
    fn default() -> Self {
        Self {
            max_operations: 5_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_string_size: 10_000_000,
            max_array_size: 1_000_000,
            max_map_size: 100_000,
        }
    }
}

/// Where installed node packs are looked up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NodePackSettings {
    /// Searched in order before the environment and the app data directory
    pub installed_dirs: Vec<PathBuf>,
}

impl Settings {
    /// Path of the settings file in the app data directory
    pub fn default_path() -> Option<PathBuf> {
        app_data_dir().map(|p| p.join(SETTINGS_FILE))
    }

    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path().ok_or_else(|| {
            NodezatorError::Config("Could not determine settings path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load settings, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load settings from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| NodezatorError::Config(format!("Failed to read settings: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| NodezatorError::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(&dir.join(SETTINGS_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NodezatorError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| NodezatorError::Config(format!("Failed to write settings: {}", e)))
    }
}
