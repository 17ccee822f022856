//! Socket types and the compatibility registry
//!
//! A socket type is a name. `any` is the wildcard. Beyond equality, an input
//! of type `T` accepts an output of type `U` when the registry records `U` as
//! a subtype of `T`. The registry starts with the built-in numeric relations
//! and grows as node packs declare their own types; entries are never
//! removed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The wildcard type name
pub const ANY: &str = "any";

/// Name of a semantic socket type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketType(String);

impl SocketType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn any() -> Self {
        Self(ANY.to_string())
    }

    /// Normalize a parameter annotation into a socket type
    ///
    /// A missing or empty annotation is the wildcard.
    pub fn from_annotation(annotation: Option<&str>) -> Self {
        let name = match annotation.map(str::trim) {
            None | Some("") => ANY,
            Some("string") | Some("String") => "str",
            Some("integer") | Some("i64") => "int",
            Some("f64") | Some("double") => "float",
            Some("boolean") => "bool",
            Some("array") | Some("Array") | Some("vec") => "list",
            Some("map") | Some("Map") | Some("object") => "dict",
            Some("PathBuf") => "path",
            Some(other) => other,
        };
        Self(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        self.0 == ANY
    }

    /// Display colour as RGB
    ///
    /// Built-in names have fixed colours; other names get a colour derived
    /// from an FNV hash of the name so it is stable across sessions.
    pub fn color(&self) -> [u8; 3] {
        match self.0.as_str() {
            ANY => [200, 200, 200],
            "int" => [0, 160, 255],
            "float" => [0, 200, 140],
            "number" => [0, 180, 200],
            "bool" => [255, 150, 0],
            "str" => [230, 80, 80],
            "path" => [200, 90, 200],
            "list" => [140, 110, 255],
            "dict" => [250, 210, 60],
            "none" => [120, 120, 120],
            other => {
                let mut hash: u32 = 0x811c_9dc5;
                for byte in other.bytes() {
                    hash ^= byte as u32;
                    hash = hash.wrapping_mul(0x0100_0193);
                }
                let [r, g, b, _] = hash.to_le_bytes();
                [r / 2 + 96, g / 2 + 96, b / 2 + 96]
            }
        }
    }
}

impl Default for SocketType {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SocketType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Append-only subtype table: input type -> accepted output types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistry {
    accepts: BTreeMap<SocketType, BTreeSet<SocketType>>,
}

impl TypeRegistry {
    /// A registry with only the built-in relations
    pub fn new() -> Self {
        let mut registry = Self {
            accepts: BTreeMap::new(),
        };
        registry.register_subtype("float", "int");
        registry.register_subtype("int", "bool");
        registry.register_subtype("number", "int");
        registry.register_subtype("number", "float");
        registry.register_subtype("number", "bool");
        registry.register_subtype("path", "str");
        registry
    }

    /// Record that sockets of `in_type` accept values from `out_type`
    pub fn register_subtype(&mut self, in_type: impl Into<SocketType>, out_type: impl Into<SocketType>) {
        self.accepts
            .entry(in_type.into())
            .or_default()
            .insert(out_type.into());
    }

    /// Merge every relation of `other` into this registry
    pub fn extend(&mut self, other: &TypeRegistry) {
        for (in_type, outs) in &other.accepts {
            let entry = self.accepts.entry(in_type.clone()).or_default();
            entry.extend(outs.iter().cloned());
        }
    }

    /// Whether an output of `out_type` may feed an input of `in_type`
    pub fn is_connectable(&self, out_type: &SocketType, in_type: &SocketType) -> bool {
        if in_type.is_any() || out_type.is_any() || out_type == in_type {
            return true;
        }
        self.accepts
            .get(in_type)
            .is_some_and(|outs| outs.contains(out_type))
    }

    /// Whether a literal of kind `value_type` may be stored on a socket of `socket_type`
    pub fn is_assignable(&self, value_type: &str, socket_type: &SocketType) -> bool {
        value_type == "none" || self.is_connectable(&SocketType::new(value_type), socket_type)
    }

    pub fn len(&self) -> usize {
        self.accepts.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.accepts.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
