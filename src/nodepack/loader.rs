//! Node pack discovery and loading
//!
//! ```text
//! <pack>/                 pack name = directory name
//!   pack.toml             optional, [types] subtype declarations
//!   <category>/
//!     <script>/
//!       main.rhai         defines the entry function
//!       meta.toml         optional signature metadata
//! ```
//!
//! Entries whose names start with `.` or `_` are ignored; categories and
//! scripts are visited in name order.

use super::callable::{Callable, ScriptCallable};
use super::signature::{ParamKind, Parameter, Signature};
use super::{single_output, NodeDefinition, NodePackRef, ScriptId};
use crate::error::{NodezatorError, Result};
use crate::graph::{OutputSocket, SocketType, TypeRegistry, WidgetSpec};
use crate::scripting::ScriptEngine;
use crate::types::Value;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Script file inside each script directory
pub const SCRIPT_FILE: &str = "main.rhai";
/// Optional metadata next to the script
pub const SCRIPT_META_FILE: &str = "meta.toml";
/// Optional pack-level metadata
pub const PACK_META_FILE: &str = "pack.toml";
/// Entry function used when metadata names none
pub const DEFAULT_ENTRY: &str = "main";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PackMeta {
    description: Option<String>,
    /// in_type -> accepted out_types
    types: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScriptMeta {
    entry: Option<String>,
    label: Option<String>,
    description: Option<String>,
    return_type: Option<String>,
    outputs: Vec<OutputSocket>,
    params: IndexMap<String, ParamMeta>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ParamMeta {
    kind: Option<ParamKind>,
    #[serde(rename = "type")]
    socket_type: Option<String>,
    default: Option<Value>,
    widget: Option<WidgetSpec>,
}

/// What a pack directory provides
#[derive(Debug)]
pub struct PackContents {
    pub name: String,
    pub description: Option<String>,
    pub definitions: Vec<NodeDefinition>,
    pub types: TypeRegistry,
}

/// Find the directory behind a pack reference
pub fn resolve_pack_dir(reference: &NodePackRef, search_dirs: &[PathBuf]) -> Result<PathBuf> {
    match reference {
        NodePackRef::Local(path) => {
            if path.is_dir() {
                Ok(path.clone())
            } else {
                Err(NodezatorError::NodePackNotFound(path.display().to_string()))
            }
        }
        NodePackRef::Installed(name) => search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_dir())
            .ok_or_else(|| NodezatorError::NodePackNotFound(name.clone())),
    }
}

/// Pack name derived from its directory
pub fn pack_name(dir: &Path) -> Result<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| NodezatorError::NodePackNotFound(dir.display().to_string()))
}

fn load_error(pack: &str, message: impl Into<String>) -> NodezatorError {
    NodezatorError::NodePackLoad {
        pack: pack.to_string(),
        message: message.into(),
    }
}

fn is_visible(name: &str) -> bool {
    !name.starts_with('.') && !name.starts_with('_')
}

/// Visible subdirectories in name order
fn subdirs(dir: &Path, pack: &str) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| load_error(pack, format!("cannot read {}: {}", dir.display(), e)))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| load_error(pack, e.to_string()))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if path.is_dir() && is_visible(&name) {
            dirs.push((name, path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn read_toml<T: for<'de> Deserialize<'de> + Default>(path: &Path, pack: &str) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| load_error(pack, format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| load_error(pack, format!("{}: {}", path.display(), e)))
}

/// Load every node script of a pack directory
pub fn load_pack_dir(engine: &ScriptEngine, dir: &Path) -> Result<PackContents> {
    let name = pack_name(dir)?;
    let meta: PackMeta = read_toml(&dir.join(PACK_META_FILE), &name)?;

    let mut types = TypeRegistry::new();
    for (in_type, out_types) in &meta.types {
        for out_type in out_types {
            types.register_subtype(in_type.as_str(), out_type.as_str());
        }
    }

    let mut definitions = Vec::new();
    for (category, category_dir) in subdirs(dir, &name)? {
        for (script, script_dir) in subdirs(&category_dir, &name)? {
            let id = ScriptId::new(name.clone(), category.clone(), script);
            definitions.push(load_script(engine, id, &script_dir)?);
        }
    }

    if definitions.is_empty() {
        tracing::warn!("Node pack '{}' at {:?} has no node scripts", name, dir);
    }

    Ok(PackContents {
        name,
        description: meta.description,
        definitions,
        types,
    })
}

/// Load one script directory into a node definition
pub fn load_script(engine: &ScriptEngine, id: ScriptId, dir: &Path) -> Result<NodeDefinition> {
    let pack = id.pack.clone();
    let script_path = dir.join(SCRIPT_FILE);
    if !script_path.is_file() {
        return Err(load_error(&pack, format!("{}: missing {}", id, SCRIPT_FILE)));
    }

    let meta: ScriptMeta = read_toml(&dir.join(SCRIPT_META_FILE), &pack)?;
    let compiled = engine
        .compile_file(&script_path)
        .map_err(|e| load_error(&pack, format!("{}: {}", id, e)))?;

    let entry = meta.entry.clone().unwrap_or_else(|| DEFAULT_ENTRY.to_string());
    let fn_params = compiled
        .fn_params(&entry)
        .ok_or_else(|| NodezatorError::CallableNotFound {
            script_id: id.clone(),
            entry: entry.clone(),
        })?;

    if let Some(unknown) = meta.params.keys().find(|k| !fn_params.contains(*k)) {
        return Err(load_error(
            &pack,
            format!("{}: metadata for unknown parameter '{}'", id, unknown),
        ));
    }

    let params = fn_params
        .iter()
        .map(|param| {
            let info = meta.params.get(param);
            Parameter {
                name: param.clone(),
                kind: info
                    .and_then(|i| i.kind)
                    .unwrap_or(ParamKind::PositionalOrKeyword),
                default: info.and_then(|i| i.default.clone()),
                socket_type: SocketType::from_annotation(
                    info.and_then(|i| i.socket_type.as_deref()),
                ),
                widget: info.and_then(|i| i.widget.clone()),
            }
        })
        .collect();

    let outputs = if meta.outputs.is_empty() {
        single_output(SocketType::from_annotation(meta.return_type.as_deref()))
    } else {
        meta.outputs
    };

    let signature = Signature::new(params, outputs);
    signature
        .validate()
        .map_err(|message| load_error(&pack, format!("{}: {}", id, message)))?;

    let callable = Callable::Script(ScriptCallable::new(engine.clone(), compiled, entry));
    let mut definition = NodeDefinition::new(id, signature, callable);
    if let Some(label) = meta.label {
        definition.label = label;
    }
    definition.description = meta.description;

    tracing::debug!("Loaded node script {}", definition.script_id);
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_script(pack: &Path, category: &str, script: &str, source: &str, meta: Option<&str>) {
        let dir = pack.join(category).join(script);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SCRIPT_FILE), source).unwrap();
        if let Some(meta) = meta {
            fs::write(dir.join(SCRIPT_META_FILE), meta).unwrap();
        }
    }

    #[test]
    fn test_load_pack_with_metadata() {
        let root = tempfile::tempdir().unwrap();
        let pack = root.path().join("text_pack");
        write_script(
            &pack,
            "strings",
            "join",
            "fn main(parts, sep) { let out = \"\"; for p in parts { out += p + sep; } out }",
            Some(
                r#"
label = "Join"
return_type = "string"

[params.parts]
kind = "var_positional"
type = "str"

[params.sep]
kind = "keyword_only"
default = ", "
"#,
            ),
        );
        write_script(&pack, "_private", "hidden", "fn main() { 1 }", None);

        let engine = ScriptEngine::new();
        let contents = load_pack_dir(&engine, &pack).unwrap();
        assert_eq!(contents.name, "text_pack");
        assert_eq!(contents.definitions.len(), 1);

        let def = &contents.definitions[0];
        assert_eq!(def.script_id, ScriptId::new("text_pack", "strings", "join"));
        assert_eq!(def.label, "Join");
        assert_eq!(def.signature.params[0].kind, ParamKind::VarPositional);
        assert_eq!(def.signature.params[0].socket_type.name(), "str");
        assert_eq!(def.signature.params[1].default, Some(Value::from(", ")));
        assert_eq!(def.signature.outputs[0].socket_type.name(), "str");
    }

    #[test]
    fn test_missing_entry_is_callable_not_found() {
        let root = tempfile::tempdir().unwrap();
        let pack = root.path().join("p");
        write_script(&pack, "c", "s", "fn helper(x) { x }", None);

        let err = load_pack_dir(&ScriptEngine::new(), &pack).unwrap_err();
        assert!(matches!(err, NodezatorError::CallableNotFound { .. }));
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let root = tempfile::tempdir().unwrap();
        let pack = root.path().join("p");
        write_script(&pack, "c", "s", "fn main(x) { x + }", None);

        let err = load_pack_dir(&ScriptEngine::new(), &pack).unwrap_err();
        assert!(matches!(err, NodezatorError::NodePackLoad { .. }));
    }

    #[test]
    fn test_unknown_param_metadata_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let pack = root.path().join("p");
        write_script(&pack, "c", "s", "fn main(x) { x }", Some("[params.y]\ntype = \"int\"\n"));

        let err = load_pack_dir(&ScriptEngine::new(), &pack).unwrap_err();
        assert!(err.to_string().contains("unknown parameter 'y'"));
    }

    #[test]
    fn test_pack_types_are_registered() {
        let root = tempfile::tempdir().unwrap();
        let pack = root.path().join("p");
        fs::create_dir_all(&pack).unwrap();
        fs::write(pack.join(PACK_META_FILE), "[types]\nmeasure = [\"celsius\"]\n").unwrap();

        let contents = load_pack_dir(&ScriptEngine::new(), &pack).unwrap();
        assert!(contents
            .types
            .is_connectable(&SocketType::new("celsius"), &SocketType::new("measure")));
    }

    #[test]
    fn test_resolve_installed_pack() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("math")).unwrap();
        let dirs = vec![root.path().join("missing"), root.path().to_path_buf()];

        let found = resolve_pack_dir(&NodePackRef::Installed("math".into()), &dirs).unwrap();
        assert_eq!(found, root.path().join("math"));
        assert!(matches!(
            resolve_pack_dir(&NodePackRef::Installed("other".into()), &dirs),
            Err(NodezatorError::NodePackNotFound(_))
        ));
    }
}
