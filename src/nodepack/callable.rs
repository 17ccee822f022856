//! Node callables
//!
//! A node's behaviour is either a function in a Rhai script or a Rust
//! closure registered by the embedding program. Both receive bound arguments
//! and a [`CallContext`] and report failure as a [`CallError`], which the
//! engine records against the node instead of propagating.

use super::signature::BoundArgs;
use crate::execution::StdoutBuffer;
use crate::graph::NodeId;
use crate::scripting::{CompiledScript, ScriptEngine};
use crate::types::Value;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Failure raised by a callable: exception class, message and traceback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    pub kind: String,
    pub message: String,
    pub traceback: Vec<String>,
}

impl CallError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    /// Append a traceback frame, innermost last
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.traceback.push(frame.into());
        self
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "callable panicked".to_string()
        };
        Self::new("Panic", message)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CallError {}

/// What a running callable can reach besides its arguments
pub struct CallContext<'a> {
    node: NodeId,
    stdout: &'a StdoutBuffer,
}

impl<'a> CallContext<'a> {
    pub fn new(node: NodeId, stdout: &'a StdoutBuffer) -> Self {
        Self { node, stdout }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Write to the execution's captured stdout
    pub fn print(&self, text: &str) {
        self.stdout.println(text);
    }

    pub fn stdout(&self) -> &StdoutBuffer {
        self.stdout
    }
}

/// A callable implemented in Rust
pub trait NativeCallable: Send + Sync {
    fn call(&self, args: BoundArgs, ctx: &CallContext<'_>) -> Result<Value, CallError>;
}

impl<F> NativeCallable for F
where
    F: Fn(BoundArgs, &CallContext<'_>) -> Result<Value, CallError> + Send + Sync,
{
    fn call(&self, args: BoundArgs, ctx: &CallContext<'_>) -> Result<Value, CallError> {
        self(args, ctx)
    }
}

/// A script function bound to the engine that compiled it
#[derive(Clone)]
pub struct ScriptCallable {
    pub script: CompiledScript,
    pub entry: String,
    engine: ScriptEngine,
}

impl ScriptCallable {
    pub fn new(engine: ScriptEngine, script: CompiledScript, entry: impl Into<String>) -> Self {
        Self {
            script,
            entry: entry.into(),
            engine,
        }
    }
}

/// The behaviour behind a callable node
#[derive(Clone)]
pub enum Callable {
    Script(ScriptCallable),
    Native(Arc<dyn NativeCallable>),
}

impl Callable {
    pub fn native(f: impl NativeCallable + 'static) -> Self {
        Callable::Native(Arc::new(f))
    }

    /// Invoke with bound arguments; panics become `Panic` errors
    pub fn call(&self, args: BoundArgs, ctx: &CallContext<'_>) -> Result<Value, CallError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| match self {
            Callable::Script(script) => script.engine.call(
                &script.script,
                &script.entry,
                args.into_values(),
                ctx.stdout(),
            ),
            Callable::Native(native) => native.call(args, ctx),
        }));
        outcome.unwrap_or_else(|payload| Err(CallError::from_panic(payload)))
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Script(script) => f
                .debug_struct("Script")
                .field("name", &script.script.name())
                .field("entry", &script.entry)
                .finish(),
            Callable::Native(_) => f.write_str("Native"),
        }
    }
}
