//! Rhai Scripting Engine for Node Callables
//!
//! Node scripts are plain Rhai files. A script defines one entry function
//! (named `main` unless the script's metadata says otherwise) whose
//! parameters become the node's input sockets:
//!
//! ```rhai
//! // <pack>/<category>/scale/main.rhai
//! fn main(value, factor) {
//!     print(`scaling ${value}`);
//!     value * factor
//! }
//! ```
//!
//! `print` and `debug` output is captured into the running execution's stdout
//! buffer. Scripts run under the operation, call-depth and size limits from
//! [`ScriptingSettings`](crate::config::ScriptingSettings).
//!
//! ## Helper Functions
//!
//! - `clamp(x, min, max)`, `lerp(a, b, t)`, `map_range(x, in_min, in_max, out_min, out_max)`
//! - `sign(x)`, `pi()`, `e()`

mod engine;

pub use engine::{call_error_from_rhai, ScriptEngine, SharedPrintSink};

use crate::error::{NodezatorError, Result};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A compiled node script
#[derive(Clone)]
pub struct CompiledScript {
    /// The compiled AST
    ast: AST,
    /// The original source code
    source: String,
    /// Name/identifier for this script
    name: String,
}

impl CompiledScript {
    /// Get the source code of this script
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the name of this script
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Parameter names of the first function called `name`
    pub fn fn_params(&self, name: &str) -> Option<Vec<String>> {
        self.ast
            .iter_functions()
            .find(|f| f.name == name)
            .map(|f| f.params.iter().map(|p| p.to_string()).collect())
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("name", &self.name)
            .field("source_len", &self.source.len())
            .finish()
    }
}

/// Cache for compiled scripts to avoid recompilation
///
/// Entries are keyed by script name (the file path for node scripts); an
/// entry whose source has changed is recompiled.
#[derive(Default)]
pub struct ScriptCache {
    /// Map from script name to compiled script
    cache: HashMap<String, CompiledScript>,
}

impl ScriptCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Get a cached script or compile and cache it
    pub fn get_or_compile(&mut self, engine: &Engine, name: &str, source: &str) -> Result<CompiledScript> {
        if let Some(script) = self.cache.get(name).filter(|s| s.source == source) {
            return Ok(script.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| NodezatorError::Script(format!("{}: {}", name, e)))?;

        let script = CompiledScript {
            ast,
            source: source.to_string(),
            name: name.to_string(),
        };

        self.cache.insert(name.to_string(), script.clone());
        Ok(script)
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Thread-safe script cache wrapper
pub type SharedScriptCache = Arc<RwLock<ScriptCache>>;

/// Create a new shared script cache
pub fn create_shared_cache() -> SharedScriptCache {
    Arc::new(RwLock::new(ScriptCache::new()))
}
