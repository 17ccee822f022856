//! Core value type carried along segments
//!
//! [`Value`] covers the literal kinds producible by widgets and data nodes,
//! plus an opaque variant for script values that fall outside that set. Values
//! cross the Rhai boundary through [`Value::from_dynamic`] and
//! [`Value::into_dynamic`].

use indexmap::IndexMap;
use rhai::{Array, Dynamic, ImmutableString};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// A value flowing from an output socket to an input socket
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// A script value with no literal representation; never persisted
    Opaque(OpaqueValue),
}

/// Wrapper around a script value the core cannot inspect
#[derive(Debug, Clone)]
pub struct OpaqueValue(Dynamic);

impl OpaqueValue {
    pub fn new(value: Dynamic) -> Self {
        Self(value)
    }

    /// Type name reported by the script engine
    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn inner(&self) -> &Dynamic {
        &self.0
    }
}

impl Value {
    /// Name of this value's kind, using socket-type vocabulary
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Path(_) => "path",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Opaque(o) => o.type_name(),
        }
    }

    /// Socket type a widget producing this value would declare
    pub fn socket_type_name(&self) -> &str {
        match self {
            Value::Opaque(_) => "any",
            other => other.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Python truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Path(p) => !p.as_os_str().is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Opaque(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Numeric view with int-to-float promotion
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a script result into a value
    pub fn from_dynamic(value: Dynamic) -> Self {
        if value.is::<()>() {
            Value::None
        } else if value.is::<bool>() {
            Value::Bool(value.cast::<bool>())
        } else if value.is::<i64>() {
            Value::Int(value.cast::<i64>())
        } else if value.is::<f64>() {
            Value::Float(value.cast::<f64>())
        } else if value.is::<ImmutableString>() {
            Value::Str(value.cast::<ImmutableString>().to_string())
        } else if value.is::<char>() {
            Value::Str(value.cast::<char>().to_string())
        } else if value.is::<Array>() {
            Value::List(
                value
                    .cast::<Array>()
                    .into_iter()
                    .map(Value::from_dynamic)
                    .collect(),
            )
        } else if value.is::<rhai::Map>() {
            Value::Map(
                value
                    .cast::<rhai::Map>()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), Value::from_dynamic(v)))
                    .collect(),
            )
        } else {
            Value::Opaque(OpaqueValue(value))
        }
    }

    /// Convert into a script argument
    pub fn into_dynamic(self) -> Dynamic {
        match self {
            Value::None => Dynamic::UNIT,
            Value::Bool(b) => Dynamic::from(b),
            Value::Int(i) => Dynamic::from(i),
            Value::Float(f) => Dynamic::from(f),
            Value::Str(s) => Dynamic::from(ImmutableString::from(s)),
            Value::Path(p) => Dynamic::from(ImmutableString::from(p.to_string_lossy().as_ref())),
            Value::List(items) => {
                Dynamic::from_array(items.into_iter().map(Value::into_dynamic).collect())
            }
            Value::Map(map) => {
                let mut out = rhai::Map::new();
                for (k, v) in map {
                    out.insert(k.into(), v.into_dynamic());
                }
                Dynamic::from_map(out)
            }
            Value::Opaque(o) => o.0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => {
                a.type_name() == b.type_name() && a.0.to_string() == b.0.to_string()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Path(p) => write!(f, "Path({:?})", p),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Opaque(o) => write!(f, "<{} {}>", o.type_name(), o.0),
        }
    }
}

// ==================== Conversions ====================

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Value::Path(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

// ==================== Serde ====================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Path(p) => serializer.serialize_str(&p.to_string_lossy()),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Opaque(o) => Err(ser::Error::custom(format!(
                "opaque value of type '{}' cannot be persisted",
                o.type_name()
            ))),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a literal value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
        Ok(i64::try_from(u)
            .map(Value::Int)
            .unwrap_or(Value::Float(u as f64)))
    }

    fn visit_f64<E: de::Error>(self, x: f64) -> Result<Value, E> {
        Ok(Value::Float(x))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Str(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::Str(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = IndexMap::new();
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
