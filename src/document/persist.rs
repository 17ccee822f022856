//! Reading and writing documents on disk
//!
//! # Files next to `graph.ndz`
//!
//! - `graph.ndz` - the document, always replaced atomically
//! - `.graph.ndz.swap` - mirror of the last saved or checkpointed state,
//!   present while the document is open
//! - `graph.ndz.20261019-142501123.bak` - previous versions, newest kept

use super::records::DocumentFile;
use crate::config::PersistenceSettings;
use crate::error::{NodezatorError, Result};
use crate::graph::Graph;
use crate::nodepack::{NodeLibrary, NodePackRef};
use std::io::Write;
use tempfile::NamedTempFile;
use std::path::{Path, PathBuf};

/// Native document extension
pub const EXTENSION: &str = "ndz";

const SWAP_SUFFIX: &str = "swap";
const BACKUP_SUFFIX: &str = "bak";
const BACKUP_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S%3f";
const BACKUP_STAMP_LEN: usize = 18;

/// Which version to keep when a stale swap file is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapChoice {
    Original,
    Swap,
}

/// Decides between a document and its swap file when they differ
#[cfg_attr(test, mockall::automock)]
pub trait SwapResolver {
    fn resolve(&self, original: &Path, swap: &Path) -> SwapChoice;
}

/// Always keeps the original document
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepOriginal;

impl SwapResolver for KeepOriginal {
    fn resolve(&self, _original: &Path, _swap: &Path) -> SwapChoice {
        SwapChoice::Original
    }
}

// ==================== Paths ====================

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Hidden sibling holding the swap copy of `path`
pub fn swap_path(path: &Path) -> PathBuf {
    parent_dir(path).join(format!(".{}.{}", file_name(path), SWAP_SUFFIX))
}

fn backup_path(path: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(BACKUP_STAMP_FORMAT);
    parent_dir(path).join(format!("{}.{}.{}", file_name(path), stamp, BACKUP_SUFFIX))
}

/// Backups of `path`, oldest first
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}.", file_name(path));
    let suffix = format!(".{}", BACKUP_SUFFIX);

    let mut backups: Vec<PathBuf> = std::fs::read_dir(parent_dir(path))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            let name = file_name(p);
            name.strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .is_some_and(|stamp| stamp.len() == BACKUP_STAMP_LEN)
        })
        .collect();
    backups.sort();
    Ok(backups)
}

// ==================== Reading and writing ====================

/// Parse a document file without building its graph
pub fn read_document(path: &Path) -> Result<DocumentFile> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| NodezatorError::DocumentParse(format!("{}: {}", path.display(), e)))
}

fn save_failed(path: &Path, message: String) -> NodezatorError {
    NodezatorError::SaveFailed {
        path: path.to_path_buf(),
        message,
    }
}

/// Write `bytes` to a temporary file next to `path`
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(parent_dir(path))
        .map_err(|e| save_failed(path, format!("Failed to create temporary file: {}", e)))?;
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| save_failed(path, format!("Failed to write temporary file: {}", e)))?;
    Ok(file)
}

/// Rename a staged file over `path`
fn commit(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged
        .persist(path)
        .map_err(|e| save_failed(path, format!("Failed to replace file: {}", e.error)))?;
    Ok(())
}

/// Replace `path` with `bytes` through a sibling temporary file
///
/// On failure the previous content of `path` is untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    commit(stage(path, bytes)?, path)
}

fn serialize(graph: &Graph) -> Result<Vec<u8>> {
    let doc = DocumentFile::from_graph(graph);
    Ok(serde_json::to_vec_pretty(&doc)?)
}

/// Resolve a pack reference stored in a document at `path`
///
/// Relative local paths are taken relative to the document's directory.
fn resolve_pack_ref(reference: &NodePackRef, path: &Path) -> NodePackRef {
    match reference {
        NodePackRef::Local(dir) if dir.is_relative() => {
            NodePackRef::Local(parent_dir(path).join(dir))
        }
        other => other.clone(),
    }
}

// ==================== Document Store ====================

/// Opens, saves and closes documents following [`PersistenceSettings`]
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    settings: PersistenceSettings,
}

impl DocumentStore {
    pub fn new(settings: PersistenceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PersistenceSettings {
        &self.settings
    }

    /// Open a document for editing
    ///
    /// A swap file that differs from the document is offered to `resolver`;
    /// choosing the swap replaces the document with it. The document's node
    /// packs are loaded into `library` before its nodes are built, and a
    /// fresh swap file is written.
    pub fn open(
        &self,
        path: &Path,
        library: &mut NodeLibrary,
        resolver: &dyn SwapResolver,
    ) -> Result<Graph> {
        if self.settings.use_swap {
            self.recover_swap(path, resolver)?;
        }

        let graph = self.load(path, library)?;

        if self.settings.use_swap {
            self.write_swap(&graph, path)?;
        }
        Ok(graph)
    }

    /// Load a document without touching its swap file
    pub fn load(&self, path: &Path, library: &mut NodeLibrary) -> Result<Graph> {
        let start_time = std::time::Instant::now();
        let doc = read_document(path)?;

        for reference in &doc.node_packs {
            library.load_pack(&resolve_pack_ref(reference, path))?;
        }

        let graph = doc.to_graph(library)?;
        tracing::info!(
            "Loaded {:?}: {} nodes in {:?}",
            path,
            graph.len(),
            start_time.elapsed()
        );
        Ok(graph)
    }

    fn recover_swap(&self, path: &Path, resolver: &dyn SwapResolver) -> Result<()> {
        let swap = swap_path(path);
        if !swap.exists() {
            return Ok(());
        }

        let swap_bytes = std::fs::read(&swap)?;
        let original = std::fs::read(path).ok();
        if original.as_deref() == Some(swap_bytes.as_slice()) {
            return Ok(());
        }

        match resolver.resolve(path, &swap) {
            SwapChoice::Swap => {
                tracing::warn!("Recovering {:?} from swap file {:?}", path, swap);
                write_atomic(path, &swap_bytes)
            }
            SwapChoice::Original => {
                tracing::warn!("Discarding swap file {:?}", swap);
                Ok(())
            }
        }
    }

    /// Write `graph` to `path`, backing up the previous version first
    ///
    /// Backups are only rotated once the new content is in place, so a
    /// failed save leaves both the document and its backups as they were.
    pub fn save(&self, graph: &Graph, path: &Path) -> Result<()> {
        let bytes = serialize(graph)?;
        let staged = stage(path, &bytes)?;

        let backup = if self.settings.backup_count > 0 && path.exists() {
            let existing = list_backups(path).map_err(|e| {
                save_failed(path, format!("Failed to list backups: {}", e))
            })?;
            Some((self.backup(path)?, existing))
        } else {
            None
        };

        if let Err(e) = commit(staged, path) {
            if let Some((created, existing)) = &backup {
                if !existing.contains(created) {
                    discard_backup(created);
                }
            }
            return Err(e);
        }
        if let Some((created, existing)) = backup {
            self.prune_backups(existing, created);
        }

        if self.settings.use_swap {
            write_atomic(&swap_path(path), &bytes)?;
        }

        tracing::info!("Saved {:?} ({} nodes)", path, graph.len());
        Ok(())
    }

    /// Checkpoint unsaved edits to the swap file only
    pub fn write_swap(&self, graph: &Graph, path: &Path) -> Result<()> {
        let swap = swap_path(path);
        write_atomic(&swap, &serialize(graph)?)?;
        tracing::debug!("Wrote swap file {:?}", swap);
        Ok(())
    }

    /// Finish editing `path`, removing its swap file
    pub fn close(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(swap_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy the current `path` to a new timestamped backup
    fn backup(&self, path: &Path) -> Result<PathBuf> {
        let target = backup_path(path);
        if let Err(e) = std::fs::copy(path, &target) {
            discard_backup(&target);
            return Err(save_failed(
                path,
                format!("Failed to write backup {:?}: {}", target, e),
            ));
        }
        Ok(target)
    }

    /// Keep only the newest `backup_count` of `existing` plus `created`
    fn prune_backups(&self, mut backups: Vec<PathBuf>, created: PathBuf) {
        if !backups.contains(&created) {
            backups.push(created);
        }
        backups.sort();
        let excess = backups.len().saturating_sub(self.settings.backup_count);
        for old in backups.into_iter().take(excess) {
            if let Err(e) = std::fs::remove_file(&old) {
                tracing::warn!("Failed to remove old backup {:?}: {}", old, e);
            }
        }
    }
}

fn discard_backup(backup: &Path) {
    match std::fs::remove_file(backup) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove unused backup {:?}: {}", backup, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InputAddr, OutputAddr, DEFAULT_OUTPUT};
    use crate::types::Value;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        let a = graph.add_data("int", Value::Int(3), None, [0.0, 0.0]);
        let neg = graph.add_operator("neg", [100.0, 0.0]).unwrap();
        graph
            .connect(&OutputAddr::new(a, DEFAULT_OUTPUT), &InputAddr::param(neg, "a"))
            .unwrap();
        graph
    }

    fn doc_path(dir: &TempDir) -> PathBuf {
        dir.path().join(format!("graph.{}", EXTENSION))
    }

    #[test]
    fn test_swap_path_is_hidden_sibling() {
        assert_eq!(
            swap_path(Path::new("/tmp/docs/graph.ndz")),
            PathBuf::from("/tmp/docs/.graph.ndz.swap")
        );
        assert_eq!(swap_path(Path::new("graph.ndz")), PathBuf::from("./.graph.ndz.swap"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::default();

        store.save(&sample_graph(), &path).unwrap();
        assert!(swap_path(&path).exists());

        let graph = store.load(&path, &mut NodeLibrary::new()).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.segments().len(), 1);

        store.close(&path).unwrap();
        assert!(!swap_path(&path).exists());
        store.close(&path).unwrap();
    }

    #[test]
    fn test_backups_are_pruned() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::new(PersistenceSettings {
            backup_count: 2,
            use_swap: false,
        });

        for _ in 0..5 {
            store.save(&sample_graph(), &path).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(list_backups(&path).unwrap().len(), 2);
        assert!(!swap_path(&path).exists());
    }

    #[test]
    fn test_prune_counts_the_new_backup() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::new(PersistenceSettings {
            backup_count: 2,
            use_swap: false,
        });
        let stamped = |stamp: &str| dir.path().join(format!("graph.ndz.{}.bak", stamp));
        let existing: Vec<PathBuf> = ["20260101-000000000", "20260102-000000000"]
            .into_iter()
            .map(stamped)
            .collect();
        let created = stamped("20260103-000000000");
        for backup in existing.iter().chain([&created]) {
            std::fs::write(backup, "{}").unwrap();
        }

        store.prune_backups(existing, created.clone());

        assert_eq!(
            list_backups(&path).unwrap(),
            vec![stamped("20260102-000000000"), created]
        );
    }

    #[test]
    fn test_backups_disabled() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::new(PersistenceSettings {
            backup_count: 0,
            use_swap: true,
        });
        store.save(&sample_graph(), &path).unwrap();
        store.save(&sample_graph(), &path).unwrap();
        assert!(list_backups(&path).unwrap().is_empty());
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();

        let err = DocumentStore::default()
            .load(&path, &mut NodeLibrary::new())
            .unwrap_err();
        assert!(matches!(err, NodezatorError::DocumentParse(_)));
    }

    #[test]
    fn test_identical_swap_is_not_offered() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::default();
        store.save(&sample_graph(), &path).unwrap();

        let mut resolver = MockSwapResolver::new();
        resolver.expect_resolve().times(0);

        let graph = store.open(&path, &mut NodeLibrary::new(), &resolver).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_choosing_swap_overwrites_original() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::default();
        store.save(&sample_graph(), &path).unwrap();

        // Unsaved edit checkpointed to the swap file
        let mut edited = sample_graph();
        edited.add_text_block("draft", [0.0, 50.0]);
        store.write_swap(&edited, &path).unwrap();

        let mut resolver = MockSwapResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| SwapChoice::Swap);

        let graph = store.open(&path, &mut NodeLibrary::new(), &resolver).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(
            std::fs::read(&path).unwrap(),
            std::fs::read(swap_path(&path)).unwrap()
        );
    }

    #[test]
    fn test_choosing_original_keeps_it() {
        let dir = TempDir::new().unwrap();
        let path = doc_path(&dir);
        let store = DocumentStore::default();
        store.save(&sample_graph(), &path).unwrap();

        let mut edited = sample_graph();
        edited.add_text_block("draft", [0.0, 50.0]);
        store.write_swap(&edited, &path).unwrap();

        let mut resolver = MockSwapResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| SwapChoice::Original);

        let graph = store.open(&path, &mut NodeLibrary::new(), &resolver).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_relative_local_pack_resolves_against_document() {
        let reference = NodePackRef::Local(PathBuf::from("packs/math"));
        assert_eq!(
            resolve_pack_ref(&reference, Path::new("/work/graph.ndz")),
            NodePackRef::Local(PathBuf::from("/work/packs/math"))
        );
        let installed = NodePackRef::Installed("math".into());
        assert_eq!(resolve_pack_ref(&installed, Path::new("/work/graph.ndz")), installed);
    }
}
