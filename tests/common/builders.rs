//! Test data builders for libraries, graphs and node packs

use nodezator_rs::graph::{InputAddr, OutputAddr, DEFAULT_OUTPUT};
use nodezator_rs::nodepack::{
    single_output, BoundArgs, CallContext, CallError, ParamKind, Parameter, Signature,
};
use nodezator_rs::{Graph, NodeId, NodeLibrary, ScriptId, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const TEST_PACK: &str = "test";

pub fn script_id(name: &str) -> ScriptId {
    ScriptId::new(TEST_PACK, "native", name)
}

fn number(args: &BoundArgs, name: &str) -> Result<Value, CallError> {
    match args.require(name)? {
        v @ (Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
        other => Err(CallError::type_error(format!(
            "expected a number, got {}",
            other.type_name()
        ))),
    }
}

fn scale(value: Value, by: &Value) -> Value {
    match (value, by) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a * b),
        (Value::Int(a), Value::Float(b)) => Value::Float(a as f64 * b),
        (Value::Float(a), Value::Int(b)) => Value::Float(a * *b as f64),
        (Value::Float(a), Value::Float(b)) => Value::Float(a * b),
        (other, _) => other,
    }
}

fn square(args: BoundArgs, _ctx: &CallContext<'_>) -> Result<Value, CallError> {
    let x = number(&args, "x")?;
    Ok(scale(x.clone(), &x))
}

fn double(args: BoundArgs, _ctx: &CallContext<'_>) -> Result<Value, CallError> {
    Ok(scale(number(&args, "x")?, &Value::Int(2)))
}

fn identity(args: BoundArgs, _ctx: &CallContext<'_>) -> Result<Value, CallError> {
    Ok(args.require("x")?.clone())
}

fn raise(_args: BoundArgs, _ctx: &CallContext<'_>) -> Result<Value, CallError> {
    Err(CallError::value_error("boom"))
}

fn concat(args: BoundArgs, _ctx: &CallContext<'_>) -> Result<Value, CallError> {
    let parts = args.require("parts")?.as_list().unwrap_or_default();
    let joined: String = parts
        .iter()
        .map(|p| match p {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    Ok(Value::Str(joined))
}

fn shout(args: BoundArgs, ctx: &CallContext<'_>) -> Result<Value, CallError> {
    let x = args.require("x")?.clone();
    ctx.print(&x.to_string());
    Ok(x)
}

fn echo(args: BoundArgs, _ctx: &CallContext<'_>) -> Result<Value, CallError> {
    Ok(Value::List(vec![
        args.require("a")?.clone(),
        args.require("b")?.clone(),
        args.require("rest")?.clone(),
    ]))
}

/// A library of Rust callables under the `test` pack
///
/// - `square(x)`, `double(x)`, `identity(x)`
/// - `raise()` always fails with `ValueError`
/// - `concat(*parts)` joins its arguments as strings
/// - `shout(x)` prints `x` and returns it
/// - `echo(a, b=2, *rest)` returns `[a, b, rest]`
pub fn test_library() -> NodeLibrary {
    let mut library = NodeLibrary::new();
    let x = || vec![Parameter::positional("x")];
    let any = || single_output("any");

    library.register_native(script_id("square"), Signature::new(x(), any()), square).unwrap();
    library.register_native(script_id("double"), Signature::new(x(), any()), double).unwrap();
    library.register_native(script_id("identity"), Signature::new(x(), any()), identity).unwrap();
    library.register_native(script_id("raise"), Signature::new(vec![], any()), raise).unwrap();
    library.register_native(script_id("shout"), Signature::new(x(), any()), shout).unwrap();
    library
        .register_native(
            script_id("concat"),
            Signature::new(
                vec![Parameter::new("parts", ParamKind::VarPositional)],
                single_output("str"),
            ),
            concat,
        )
        .unwrap();
    library
        .register_native(
            script_id("echo"),
            Signature::new(
                vec![
                    Parameter::positional("a"),
                    Parameter::positional("b").with_default(2),
                    Parameter::new("rest", ParamKind::VarPositional),
                ],
                single_output("list"),
            ),
            echo,
        )
        .unwrap();

    library
}

/// Builds graphs against a library with short helper calls
pub struct GraphBuilder<'a> {
    library: &'a NodeLibrary,
    graph: Graph,
    x: f32,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(library: &'a NodeLibrary) -> Self {
        Self {
            library,
            graph: Graph::with_types(library.types().clone()),
            x: 0.0,
        }
    }

    fn next_pos(&mut self) -> [f32; 2] {
        self.x += 240.0;
        [self.x, 100.0]
    }

    pub fn data(&mut self, value: impl Into<Value>) -> NodeId {
        let pos = self.next_pos();
        self.graph.add_data("any", value.into(), None, pos)
    }

    pub fn op(&mut self, operation: &str) -> NodeId {
        let pos = self.next_pos();
        self.graph.add_operator(operation, pos).unwrap()
    }

    pub fn callable(&mut self, name: &str) -> NodeId {
        let pos = self.next_pos();
        let definition = self.library.resolve(&script_id(name)).unwrap();
        self.graph.add_callable(definition, pos)
    }

    /// Link `from`'s default output into `param` of `to`
    pub fn link(&mut self, from: NodeId, to: NodeId, param: &str) -> InputAddr {
        self.graph
            .connect(&OutputAddr::new(from, DEFAULT_OUTPUT), &InputAddr::param(to, param))
            .unwrap()
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

/// Write a Rhai node script, with optional `meta.toml`, into a pack directory
pub fn write_script(pack: &Path, category: &str, script: &str, source: &str, meta: Option<&str>) -> PathBuf {
    let dir = pack.join(category).join(script);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("main.rhai"), source).unwrap();
    if let Some(meta) = meta {
        fs::write(dir.join("meta.toml"), meta).unwrap();
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_registers_every_callable() {
        let library = test_library();
        for name in ["square", "double", "identity", "raise", "concat", "shout", "echo"] {
            assert!(library.get(&script_id(name)).is_some(), "{name} missing");
        }
    }
}
