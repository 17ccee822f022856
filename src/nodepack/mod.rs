//! Node packs and the node library
//!
//! A node pack is a directory of node scripts grouped by category. The
//! [`NodeLibrary`] loads packs, records the socket-type relations they
//! declare, and resolves a [`ScriptId`] to a [`NodeDefinition`]: the
//! callable plus the signature its sockets are derived from.
//!
//! Embedding programs may also register Rust callables directly with
//! [`NodeLibrary::register_native`].

pub mod callable;
pub mod loader;
pub mod signature;

pub use callable::{CallContext, CallError, Callable, NativeCallable, ScriptCallable};
pub use signature::{BoundArgs, CallArgs, ParamKind, Parameter, Signature};

use crate::config::{installed_packs_dir, Settings};
use crate::error::{NodezatorError, Result};
use crate::graph::{OutputSocket, SocketType, TypeRegistry};
use crate::scripting::ScriptEngine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable listing extra directories of installed packs
pub const PACKS_PATH_ENV: &str = "NODEZATOR_PACKS_PATH";

/// Reference to a node pack as stored in documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePackRef {
    /// A pack directory on disk
    Local(PathBuf),
    /// A pack resolved by name through the installed-pack search path
    Installed(String),
}

impl fmt::Display for NodePackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePackRef::Local(path) => write!(f, "{}", path.display()),
            NodePackRef::Installed(name) => write!(f, "{}", name),
        }
    }
}

/// Identity of a node script: pack, category and script name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct ScriptId {
    pub pack: String,
    pub category: String,
    pub script: String,
}

impl ScriptId {
    pub fn new(pack: impl Into<String>, category: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            pack: pack.into(),
            category: category.into(),
            script: script.into(),
        }
    }
}

impl From<(String, String, String)> for ScriptId {
    fn from((pack, category, script): (String, String, String)) -> Self {
        Self {
            pack,
            category,
            script,
        }
    }
}

impl From<ScriptId> for (String, String, String) {
    fn from(id: ScriptId) -> Self {
        (id.pack, id.category, id.script)
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pack, self.category, self.script)
    }
}

/// Everything needed to instantiate and run a callable node
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub script_id: ScriptId,
    pub label: String,
    pub description: Option<String>,
    pub signature: Signature,
    pub callable: Callable,
}

impl NodeDefinition {
    pub fn new(script_id: ScriptId, signature: Signature, callable: Callable) -> Self {
        Self {
            label: script_id.script.clone(),
            script_id,
            description: None,
            signature,
            callable,
        }
    }
}

/// A pack the library has loaded
#[derive(Debug, Clone)]
pub struct LoadedPack {
    pub reference: NodePackRef,
    pub path: PathBuf,
    pub scripts: Vec<ScriptId>,
}

/// Registry of node definitions and socket-type relations
#[derive(Debug, Clone)]
pub struct NodeLibrary {
    definitions: IndexMap<ScriptId, Arc<NodeDefinition>>,
    packs: IndexMap<String, LoadedPack>,
    types: TypeRegistry,
    engine: ScriptEngine,
    installed_dirs: Vec<PathBuf>,
}

impl NodeLibrary {
    pub fn new() -> Self {
        Self {
            definitions: IndexMap::new(),
            packs: IndexMap::new(),
            types: TypeRegistry::new(),
            engine: ScriptEngine::new(),
            installed_dirs: Vec::new(),
        }
    }

    /// A library whose script engine and pack search path follow `settings`
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            engine: ScriptEngine::with_settings(&settings.scripting),
            installed_dirs: settings.node_packs.installed_dirs.clone(),
            ..Self::new()
        }
    }

    /// Register a Rust callable under `script_id`
    pub fn register_native(
        &mut self,
        script_id: ScriptId,
        signature: Signature,
        callable: impl NativeCallable + 'static,
    ) -> Result<Arc<NodeDefinition>> {
        signature
            .validate()
            .map_err(|message| NodezatorError::NodePackLoad {
                pack: script_id.pack.clone(),
                message: format!("{}: {}", script_id, message),
            })?;
        let definition = NodeDefinition::new(script_id, signature, Callable::native(callable));
        Ok(self.register(definition))
    }

    /// Add a definition, replacing any previous one with the same id
    pub fn register(&mut self, definition: NodeDefinition) -> Arc<NodeDefinition> {
        let definition = Arc::new(definition);
        self.definitions
            .insert(definition.script_id.clone(), definition.clone());
        definition
    }

    /// Directories searched for installed packs, in order
    pub fn installed_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.installed_dirs.clone();
        if let Some(paths) = std::env::var_os(PACKS_PATH_ENV) {
            dirs.extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        dirs.extend(installed_packs_dir());
        dirs
    }

    /// Load a pack, returning the ids of the scripts it provides
    ///
    /// Loading a pack whose name is already loaded is a no-op.
    pub fn load_pack(&mut self, reference: &NodePackRef) -> Result<Vec<ScriptId>> {
        let path = loader::resolve_pack_dir(reference, &self.installed_search_dirs())?;
        let name = loader::pack_name(&path)?;
        if let Some(loaded) = self.packs.get(&name) {
            return Ok(loaded.scripts.clone());
        }

        let contents = loader::load_pack_dir(&self.engine, &path)?;
        self.types.extend(&contents.types);

        let scripts: Vec<ScriptId> = contents
            .definitions
            .into_iter()
            .map(|def| self.register(def).script_id.clone())
            .collect();

        tracing::info!(
            "Loaded node pack '{}' from {:?} ({} scripts)",
            name,
            path,
            scripts.len()
        );

        self.packs.insert(
            name,
            LoadedPack {
                reference: reference.clone(),
                path,
                scripts: scripts.clone(),
            },
        );
        Ok(scripts)
    }

    pub fn get(&self, id: &ScriptId) -> Option<Arc<NodeDefinition>> {
        self.definitions.get(id).cloned()
    }

    /// Look up a definition, failing with `UnknownScriptId`
    pub fn resolve(&self, id: &ScriptId) -> Result<Arc<NodeDefinition>> {
        self.get(id)
            .ok_or_else(|| NodezatorError::UnknownScriptId(id.clone()))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.definitions.values()
    }

    pub fn packs(&self) -> impl Iterator<Item = &LoadedPack> {
        self.packs.values()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for NodeLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Single `output` socket of the given type
pub fn single_output(socket_type: impl Into<SocketType>) -> Vec<OutputSocket> {
    vec![OutputSocket::new(crate::graph::DEFAULT_OUTPUT, socket_type.into())]
}
