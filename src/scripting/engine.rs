//! Rhai Script Engine Implementation
//!
//! One [`ScriptEngine`] is shared by every script callable loaded through a
//! [`NodeLibrary`](crate::nodepack::NodeLibrary). Cloning it is cheap; clones
//! share the Rhai engine, the compile cache and the print sink.

use crate::config::ScriptingSettings;
use crate::error::{NodezatorError, Result};
use crate::execution::StdoutBuffer;
use crate::nodepack::CallError;
use crate::scripting::{create_shared_cache, CompiledScript, SharedScriptCache};
use crate::types::Value;
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Where `print`/`debug` output goes while a script call is running
pub type SharedPrintSink = Arc<RwLock<Option<StdoutBuffer>>>;

/// The script engine used by node callables
#[derive(Clone)]
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Arc<Engine>,
    /// Cache of compiled scripts
    cache: SharedScriptCache,
    /// Buffer of the call in progress, if any
    sink: SharedPrintSink,
}

/// Clears the print sink when a call returns or unwinds
struct SinkGuard<'a>(&'a SharedPrintSink);

impl Drop for SinkGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut sink) = self.0.write() {
            *sink = None;
        }
    }
}

impl ScriptEngine {
    /// Create a new script engine with default limits
    pub fn new() -> Self {
        Self::with_settings(&ScriptingSettings::default())
    }

    /// Create a new script engine with the given limits
    pub fn with_settings(settings: &ScriptingSettings) -> Self {
        let sink: SharedPrintSink = Arc::new(RwLock::new(None));
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, settings, sink.clone());

        Self {
            engine: Arc::new(engine),
            cache: create_shared_cache(),
            sink,
        }
    }

    /// Configure the Rhai engine with helpers, output hooks and safety limits
    fn configure_engine(engine: &mut Engine, settings: &ScriptingSettings, sink: SharedPrintSink) {
        // Set safety limits
        engine.set_max_expr_depths(settings.max_expr_depth, settings.max_expr_depth);
        engine.set_max_call_levels(settings.max_call_levels);
        engine.set_max_operations(settings.max_operations);
        engine.set_max_string_size(settings.max_string_size);
        engine.set_max_array_size(settings.max_array_size);
        engine.set_max_map_size(settings.max_map_size);

        {
            let sink = sink.clone();
            engine.on_print(move |text| {
                if let Ok(guard) = sink.read() {
                    if let Some(buffer) = guard.as_ref() {
                        buffer.println(text);
                    }
                }
            });
        }
        engine.on_debug(move |text, source, pos| {
            if let Ok(guard) = sink.read() {
                if let Some(buffer) = guard.as_ref() {
                    let origin = match source {
                        Some(src) if !pos.is_none() => format!("{} @ {}", src, pos),
                        Some(src) => src.to_string(),
                        None if !pos.is_none() => pos.to_string(),
                        None => String::new(),
                    };
                    if origin.is_empty() {
                        buffer.println(text);
                    } else {
                        buffer.println(&format!("[{}] {}", origin, text));
                    }
                }
            }
        });

        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));
        engine.register_fn("clamp", |x: i64, min: i64, max: i64| x.clamp(min, max));
        engine.register_fn("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t);
        engine.register_fn(
            "map_range",
            |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );
        engine.register_fn("sign", |x: f64| {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        });
        engine.register_fn("pi", || std::f64::consts::PI);
        engine.register_fn("e", || std::f64::consts::E);
    }

    /// Compile a script through the cache
    pub fn compile(&self, name: &str, source: &str) -> Result<CompiledScript> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| NodezatorError::Script(format!("Failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(&self.engine, name, source)
    }

    /// Read and compile a script file
    pub fn compile_file(&self, path: &Path) -> Result<CompiledScript> {
        let source = std::fs::read_to_string(path)?;
        self.compile(&path.display().to_string(), &source)
    }

    /// Call `entry` in `script` with positional arguments
    ///
    /// Script output is routed to `stdout` for the duration of the call.
    pub fn call(
        &self,
        script: &CompiledScript,
        entry: &str,
        args: Vec<Value>,
        stdout: &StdoutBuffer,
    ) -> std::result::Result<Value, CallError> {
        if let Ok(mut sink) = self.sink.write() {
            *sink = Some(stdout.clone());
        }
        let _guard = SinkGuard(&self.sink);

        let args: Vec<Dynamic> = args.into_iter().map(Value::into_dynamic).collect();
        let mut scope = Scope::new();

        self.engine
            .call_fn::<Dynamic>(&mut scope, script.ast(), entry, args)
            .map(Value::from_dynamic)
            .map_err(|e| {
                let mut err = call_error_from_rhai(&e);
                err.traceback
                    .insert(0, format!("script {}, entry {}", script.name(), entry));
                err
            })
    }

    /// Check that a source compiles without caching it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| NodezatorError::Script(format!("Validation error: {}", e)))
    }

    pub fn clear_cache(&self) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| NodezatorError::Script(format!("Failed to acquire cache lock: {}", e)))?;
        cache.clear();
        Ok(())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn cache(&self) -> &SharedScriptCache {
        &self.cache
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cache_size", &self.cache.read().map(|c| c.len()).ok())
            .finish()
    }
}

fn at(pos: Position) -> String {
    if pos.is_none() {
        String::new()
    } else {
        format!(" at {}", pos)
    }
}

/// Translate a Rhai evaluation error into a callable error
///
/// Nested function-call errors are unwrapped; each level adds a traceback
/// frame, outermost first.
pub fn call_error_from_rhai(err: &EvalAltResult) -> CallError {
    use EvalAltResult::*;

    match err {
        ErrorInFunctionCall(name, source, inner, pos) => {
            let mut inner_err = call_error_from_rhai(inner);
            let origin = if source.is_empty() {
                String::new()
            } else {
                format!(" ({})", source)
            };
            inner_err
                .traceback
                .insert(0, format!("in call to {}{}{}", name, origin, at(*pos)));
            inner_err
        }
        ErrorRuntime(value, pos) => {
            let message = value.clone().into_string().unwrap_or_else(|_| value.to_string());
            CallError::new("RuntimeError", message).with_frame(format!("raised{}", at(*pos)))
        }
        ErrorArithmetic(message, pos) => {
            CallError::new("ArithmeticError", message.clone()).with_frame(format!("raised{}", at(*pos)))
        }
        ErrorFunctionNotFound(..) => CallError::new("FunctionNotFound", err.to_string()),
        ErrorMismatchDataType(..) | ErrorMismatchOutputType(..) => {
            CallError::type_error(err.to_string())
        }
        ErrorIndexingType(..) | ErrorArrayBounds(..) | ErrorStringBounds(..) => {
            CallError::new("IndexError", err.to_string())
        }
        ErrorVariableNotFound(..) => CallError::new("NameError", err.to_string()),
        ErrorPropertyNotFound(..) | ErrorDotExpr(..) => CallError::new("AttributeError", err.to_string()),
        ErrorTooManyOperations(..) => CallError::new("OperationLimitExceeded", err.to_string()),
        ErrorStackOverflow(..) => CallError::new("RecursionError", err.to_string()),
        ErrorDataTooLarge(..) => CallError::new("MemoryError", err.to_string()),
        ErrorParsing(..) => CallError::new("SyntaxError", err.to_string()),
        _ => CallError::new("ScriptError", err.to_string()),
    }
}
