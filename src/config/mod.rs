//! Configuration module for nodezator-rs
//!
//! This module handles configuration that lives outside documents:
//! - Application state (recent files, recent node packs, bookmarks)
//! - User settings (see [`settings`])
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.nodezator-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.nodezator-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.nodezator-rs\`
//!
//! # Files
//!
//! - `app_state.json` - Recent files, known node packs and bookmarks
//! - `settings.toml` - Execution, persistence and scripting settings
//! - `node_packs/` - Installed node packs
//! - `logs/` - Rolling log files written by the command line tool

pub mod settings;

pub use settings::*;

use crate::error::{NodezatorError, Result};
use crate::nodepack::NodePackRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.nodezator-rs";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Directory under the app data dir holding installed node packs
pub const NODE_PACKS_DIR: &str = "node_packs";

/// Maximum number of recent files to remember
pub const MAX_RECENT_FILES: usize = 10;

/// Maximum number of recent node packs to remember
pub const MAX_RECENT_PACKS: usize = 10;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        NodezatorError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            NodezatorError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

/// Get the directory holding installed node packs
pub fn installed_packs_dir() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(NODE_PACKS_DIR))
}

// ==================== Recent File Entry ====================

/// Information about a recently opened document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentFile {
    /// Path to the document
    pub path: PathBuf,

    /// When the document was last opened
    pub last_opened: DateTime<Utc>,
}

impl RecentFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_opened: Utc::now(),
        }
    }

    /// Check if the document still exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// A named directory shortcut
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub name: String,
    pub path: PathBuf,
}

// ==================== App State ====================

/// Persistent application state
///
/// Stores history that persists across sessions, separate from documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Recently opened documents, most recent first
    #[serde(default)]
    pub recent_files: Vec<RecentFile>,

    /// Recently used node packs, most recent first
    #[serde(default)]
    pub recent_packs: Vec<NodePackRef>,

    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            recent_files: Vec::new(),
            recent_packs: Vec::new(),
            bookmarks: Vec::new(),
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            NodezatorError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load app state from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| NodezatorError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| NodezatorError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(&dir.join(APP_STATE_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| NodezatorError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| NodezatorError::Config(format!("Failed to write app state: {}", e)))
    }

    /// Add or move a document to the front of the recent list
    pub fn add_recent_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.recent_files.retain(|f| f.path != path);
        self.recent_files.insert(0, RecentFile::new(path));
        self.recent_files.truncate(MAX_RECENT_FILES);
    }

    /// Add or move a node pack to the front of the recent list
    pub fn add_recent_pack(&mut self, pack: NodePackRef) {
        self.recent_packs.retain(|p| *p != pack);
        self.recent_packs.insert(0, pack);
        self.recent_packs.truncate(MAX_RECENT_PACKS);
    }

    /// Remove a document from recents (e.g., if file was deleted)
    pub fn remove_recent_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.recent_files.retain(|f| f.path != path);
    }

    /// Clean up recent documents and local packs that no longer exist
    pub fn cleanup_missing(&mut self) {
        self.recent_files.retain(|f| f.exists());
        self.recent_packs.retain(|p| match p {
            NodePackRef::Local(path) => path.is_dir(),
            NodePackRef::Installed(_) => true,
        });
    }

    /// Add a bookmark, replacing any with the same name
    pub fn set_bookmark(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        let name = name.into();
        let path = path.into();
        match self.bookmarks.iter_mut().find(|b| b.name == name) {
            Some(bookmark) => bookmark.path = path,
            None => self.bookmarks.push(Bookmark { name, path }),
        }
    }

    pub fn remove_bookmark(&mut self, name: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.name != name);
        self.bookmarks.len() != before
    }

    /// Get the most recent document if it still exists
    pub fn last_file(&self) -> Option<&Path> {
        self.recent_files
            .iter()
            .find(|f| f.exists())
            .map(|f| f.path.as_path())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_default() {
        let state = AppState::default();
        assert!(state.recent_files.is_empty());
        assert!(state.recent_packs.is_empty());
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_add_recent_file() {
        let mut state = AppState::default();

        state.add_recent_file("/path/to/one.ndz");
        state.add_recent_file("/path/to/two.ndz");
        assert_eq!(state.recent_files.len(), 2);
        assert_eq!(state.recent_files[0].path, PathBuf::from("/path/to/two.ndz"));

        // Adding same path again should move it, not duplicate
        state.add_recent_file("/path/to/one.ndz");
        assert_eq!(state.recent_files.len(), 2);
        assert_eq!(state.recent_files[0].path, PathBuf::from("/path/to/one.ndz"));
    }

    #[test]
    fn test_recent_files_max_limit() {
        let mut state = AppState::default();
        for i in 0..15 {
            state.add_recent_file(format!("/path/to/doc{}.ndz", i));
        }
        assert_eq!(state.recent_files.len(), MAX_RECENT_FILES);
    }

    #[test]
    fn test_recent_packs_dedup() {
        let mut state = AppState::default();
        state.add_recent_pack(NodePackRef::Installed("math".to_string()));
        state.add_recent_pack(NodePackRef::Local(PathBuf::from("/packs/text")));
        state.add_recent_pack(NodePackRef::Installed("math".to_string()));
        assert_eq!(state.recent_packs.len(), 2);
        assert_eq!(state.recent_packs[0], NodePackRef::Installed("math".to_string()));
    }

    #[test]
    fn test_bookmarks() {
        let mut state = AppState::default();
        state.set_bookmark("work", "/a");
        state.set_bookmark("work", "/b");
        assert_eq!(state.bookmarks.len(), 1);
        assert_eq!(state.bookmarks[0].path, PathBuf::from("/b"));
        assert!(state.remove_bookmark("work"));
        assert!(!state.remove_bookmark("work"));
    }

    #[test]
    fn test_cleanup_missing() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("kept.ndz");
        std::fs::write(&existing, "{}").unwrap();

        let mut state = AppState::default();
        state.add_recent_file(dir.path().join("gone.ndz"));
        state.add_recent_file(&existing);
        state.add_recent_pack(NodePackRef::Local(dir.path().join("no_such_pack")));
        state.cleanup_missing();

        assert_eq!(state.recent_files.len(), 1);
        assert_eq!(state.last_file(), Some(existing.as_path()));
        assert!(state.recent_packs.is_empty());
    }

    #[test]
    fn test_app_state_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(APP_STATE_FILE);

        let mut state = AppState::default();
        state.add_recent_file("/test/doc.ndz");
        state.add_recent_pack(NodePackRef::Installed("math".to_string()));
        state.set_bookmark("home", "/home/user");
        state.save_to(&path).unwrap();

        let loaded = AppState::load_from(&path).unwrap();
        assert_eq!(loaded, state);
    }
}
