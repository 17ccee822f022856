//! Callable signatures and argument binding
//!
//! A [`Signature`] describes a node callable's parameters with the five
//! parameter kinds of Python's calling convention. [`Signature::bind`]
//! matches positional and keyword arguments against it using the same rules,
//! so a script written against `*args`/`**kwargs` style metadata receives
//! exactly what the editor wired up.

use super::callable::CallError;
use crate::graph::{OutputSocket, SocketType, WidgetSpec};
use crate::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a parameter accepts arguments, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParamKind {
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub socket_type: SocketType,
    pub widget: Option<WidgetSpec>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            socket_type: SocketType::any(),
            widget: None,
        }
    }

    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_type(mut self, socket_type: impl Into<SocketType>) -> Self {
        self.socket_type = socket_type.into();
        self
    }

    pub fn with_widget(mut self, widget: WidgetSpec) -> Self {
        self.widget = Some(widget);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Parameters and declared outputs of a callable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Parameter>,
    pub outputs: Vec<OutputSocket>,
}

/// Arguments as assembled from a node's sockets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.positional.push(value);
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.keyword.insert(name.into(), value);
    }
}

/// Arguments bound to parameter names, defaults applied
///
/// A var-positional parameter is bound to a [`Value::List`] and a
/// var-keyword parameter to a [`Value::Map`], both possibly empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    values: IndexMap<String, Value>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Argument `name`, or a `TypeError` naming the missing parameter
    pub fn require(&self, name: &str) -> Result<&Value, CallError> {
        self.values
            .get(name)
            .ok_or_else(|| CallError::type_error(format!("missing argument '{}'", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values in parameter order
    pub fn into_values(self) -> Vec<Value> {
        self.values.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Signature {
    pub fn new(params: Vec<Parameter>, outputs: Vec<OutputSocket>) -> Self {
        Self { params, outputs }
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn var_positional(&self) -> Option<&Parameter> {
        self.params.iter().find(|p| p.kind == ParamKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<&Parameter> {
        self.params.iter().find(|p| p.kind == ParamKind::VarKeyword)
    }

    /// Check declaration rules: kind order, a single variadic of each kind,
    /// no defaults on variadics, no required positional after a defaulted one,
    /// unique parameter and output names
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        let mut last_kind = ParamKind::PositionalOnly;
        let mut positional_default = false;

        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter '{}'", param.name));
            }
            if param.kind < last_kind
                || (param.kind == last_kind && param.kind.is_variadic())
            {
                return Err(format!(
                    "parameter '{}' ({:?}) is out of order",
                    param.name, param.kind
                ));
            }
            last_kind = param.kind;

            if param.kind.is_variadic() && param.default.is_some() {
                return Err(format!(
                    "variadic parameter '{}' cannot have a default",
                    param.name
                ));
            }
            if param.kind.is_positional() {
                if param.default.is_some() {
                    positional_default = true;
                } else if positional_default {
                    return Err(format!(
                        "parameter '{}' without a default follows a parameter with one",
                        param.name
                    ));
                }
            }
        }

        let mut outputs = HashSet::new();
        for output in &self.outputs {
            if !outputs.insert(output.name.as_str()) {
                return Err(format!("duplicate output '{}'", output.name));
            }
        }
        Ok(())
    }

    /// Bind arguments to parameters
    pub fn bind(&self, args: CallArgs) -> Result<BoundArgs, CallError> {
        let CallArgs {
            positional,
            mut keyword,
        } = args;

        let mut values: IndexMap<String, Value> = IndexMap::new();
        let mut extra_positional = Vec::new();
        let mut extra_keyword = IndexMap::new();

        let positional_params: Vec<&Parameter> = self
            .params
            .iter()
            .filter(|p| p.kind.is_positional())
            .collect();
        let given = positional.len();
        let mut positional = positional.into_iter();

        for param in &positional_params {
            match positional.next() {
                Some(value) => {
                    values.insert(param.name.clone(), value);
                }
                None => break,
            }
        }
        extra_positional.extend(positional);

        if !extra_positional.is_empty() && self.var_positional().is_none() {
            return Err(CallError::type_error(format!(
                "takes {} positional arguments but {} were given",
                positional_params.len(),
                given
            )));
        }

        for param in &self.params {
            match param.kind {
                ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly => {
                    if let Some(value) = keyword.shift_remove(&param.name) {
                        if values.contains_key(&param.name) {
                            return Err(CallError::type_error(format!(
                                "got multiple values for argument '{}'",
                                param.name
                            )));
                        }
                        values.insert(param.name.clone(), value);
                    }
                }
                _ => {}
            }
        }

        for (name, value) in keyword {
            let positional_only = self
                .params
                .iter()
                .any(|p| p.name == name && p.kind == ParamKind::PositionalOnly);
            if self.var_keyword().is_some() {
                extra_keyword.insert(name, value);
            } else if positional_only {
                return Err(CallError::type_error(format!(
                    "positional-only argument '{}' passed as keyword",
                    name
                )));
            } else {
                return Err(CallError::type_error(format!(
                    "got an unexpected keyword argument '{}'",
                    name
                )));
            }
        }

        let mut bound = IndexMap::new();
        let mut missing = Vec::new();
        let mut extra_positional = Some(extra_positional);
        let mut extra_keyword = Some(extra_keyword);

        for param in &self.params {
            let value = match param.kind {
                ParamKind::VarPositional => {
                    Some(Value::List(extra_positional.take().unwrap_or_default()))
                }
                ParamKind::VarKeyword => Some(Value::Map(extra_keyword.take().unwrap_or_default())),
                _ => values
                    .shift_remove(&param.name)
                    .or_else(|| param.default.clone()),
            };
            match value {
                Some(value) => {
                    bound.insert(param.name.clone(), value);
                }
                None => missing.push(format!("'{}'", param.name)),
            }
        }

        if !missing.is_empty() {
            return Err(CallError::type_error(format!(
                "missing {} required argument{}: {}",
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
                missing.join(", ")
            )));
        }

        Ok(BoundArgs { values: bound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: Vec<Parameter>) -> Signature {
        Signature::new(params, vec![OutputSocket::new("output", SocketType::any())])
    }

    #[test]
    fn test_bind_positional_and_keyword() {
        let s = sig(vec![
            Parameter::new("a", ParamKind::PositionalOnly),
            Parameter::positional("b"),
            Parameter::new("c", ParamKind::KeywordOnly).with_default(3),
        ]);
        let mut args = CallArgs::new();
        args.push(Value::Int(1));
        args.set("b", Value::Int(2));
        let bound = s.bind(args).unwrap();
        assert_eq!(
            bound.into_values(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_bind_collects_variadics() {
        let s = sig(vec![
            Parameter::positional("first"),
            Parameter::new("rest", ParamKind::VarPositional),
            Parameter::new("options", ParamKind::VarKeyword),
        ]);
        let mut args = CallArgs::new();
        args.push(Value::Int(1));
        args.push(Value::Int(2));
        args.push(Value::Int(3));
        args.set("flag", Value::Bool(true));
        let bound = s.bind(args).unwrap();
        assert_eq!(bound.get("first"), Some(&Value::Int(1)));
        assert_eq!(
            bound.get("rest"),
            Some(&Value::List(vec![Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(bound.get("options").unwrap().as_map().unwrap()["flag"], Value::Bool(true));
    }

    #[test]
    fn test_bind_missing_argument() {
        let s = sig(vec![Parameter::positional("a"), Parameter::positional("b")]);
        let mut args = CallArgs::new();
        args.push(Value::Int(1));
        let err = s.bind(args).unwrap_err();
        assert_eq!(err.kind, "TypeError");
        assert!(err.message.contains("'b'"));
    }

    #[test]
    fn test_bind_rejects_duplicates_and_unknowns() {
        let s = sig(vec![Parameter::positional("a")]);

        let mut args = CallArgs::new();
        args.push(Value::Int(1));
        args.set("a", Value::Int(2));
        assert!(s.bind(args).unwrap_err().message.contains("multiple values"));

        let mut args = CallArgs::new();
        args.set("z", Value::Int(2));
        assert!(s.bind(args).unwrap_err().message.contains("unexpected keyword"));

        let mut args = CallArgs::new();
        args.push(Value::Int(1));
        args.push(Value::Int(2));
        assert!(s.bind(args).unwrap_err().message.contains("positional arguments"));
    }

    #[test]
    fn test_validate_order_rules() {
        assert!(sig(vec![
            Parameter::new("a", ParamKind::KeywordOnly),
            Parameter::positional("b"),
        ])
        .validate()
        .is_err());

        assert!(sig(vec![
            Parameter::positional("a").with_default(1),
            Parameter::positional("b"),
        ])
        .validate()
        .is_err());

        assert!(sig(vec![
            Parameter::new("a", ParamKind::VarPositional),
            Parameter::new("b", ParamKind::VarPositional),
        ])
        .validate()
        .is_err());

        assert!(sig(vec![
            Parameter::positional("a"),
            Parameter::new("args", ParamKind::VarPositional),
            Parameter::new("k", ParamKind::KeywordOnly),
            Parameter::new("kwargs", ParamKind::VarKeyword),
        ])
        .validate()
        .is_ok());
    }
}
