//! Built-in operator table
//!
//! Operator nodes run one of these plain functions instead of a node-pack
//! callable. Arguments are bound against [`Operation::signature`] exactly
//! like callable nodes, so missing inputs and type errors surface the same
//! way. Numeric semantics follow Python: ints promote to floats, `//` floors,
//! `%` takes the sign of the divisor, `and`/`or` return an operand.

use crate::nodepack::{single_output, BoundArgs, CallError, ParamKind, Parameter, Signature};
use crate::types::Value;
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Longest string or list a repetition may produce
const MAX_SEQUENCE_LEN: usize = 1 << 28;

/// Number of operands an operation takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    /// Any number of positional operands collected into `values`
    Variadic,
}

type OpFn = fn(&BoundArgs) -> Result<Value, CallError>;

/// One entry of the operator table
pub struct Operation {
    pub id: &'static str,
    pub symbol: &'static str,
    pub arity: Arity,
    params: &'static [&'static str],
    output_type: &'static str,
    func: OpFn,
}

impl Operation {
    /// Parameters as seen by the binder and by the node's input sockets
    pub fn signature(&self) -> Signature {
        let params = match self.arity {
            Arity::Variadic => vec![Parameter::new(self.params[0], ParamKind::VarPositional)],
            _ => self.params.iter().map(|p| Parameter::positional(*p)).collect(),
        };
        Signature::new(params, single_output(self.output_type))
    }

    pub fn apply(&self, args: &BoundArgs) -> Result<Value, CallError> {
        (self.func)(args)
    }

    /// Like [`apply`](Self::apply), but panics become `Panic` errors
    pub fn call(&self, args: &BoundArgs) -> Result<Value, CallError> {
        catch_unwind(AssertUnwindSafe(|| self.apply(args)))
            .unwrap_or_else(|payload| Err(CallError::from_panic(payload)))
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("symbol", &self.symbol)
            .field("arity", &self.arity)
            .finish()
    }
}

const AB: &[&str] = &["a", "b"];
const A: &[&str] = &["a"];

macro_rules! op {
    ($id:literal, $symbol:literal, $arity:ident, $params:expr, $out:literal, $func:expr) => {
        Operation {
            id: $id,
            symbol: $symbol,
            arity: Arity::$arity,
            params: $params,
            output_type: $out,
            func: $func,
        }
    };
}

static OPERATIONS: &[Operation] = &[
    op!("add", "+", Binary, AB, "any", |args| binary(args, add)),
    op!("sub", "-", Binary, AB, "any", |args| binary(args, sub)),
    op!("mul", "*", Binary, AB, "any", |args| binary(args, mul)),
    op!("truediv", "/", Binary, AB, "float", |args| binary(args, truediv)),
    op!("floordiv", "//", Binary, AB, "any", |args| binary(args, floordiv)),
    op!("mod", "%", Binary, AB, "any", |args| binary(args, modulo)),
    op!("pow", "**", Binary, AB, "any", |args| binary(args, pow)),
    op!("eq", "==", Binary, AB, "bool", |args| binary(args, |a, b| Ok(Value::Bool(equals(a, b))))),
    op!("ne", "!=", Binary, AB, "bool", |args| binary(args, |a, b| Ok(Value::Bool(!equals(a, b))))),
    op!("lt", "<", Binary, AB, "bool", |args| binary(args, |a, b| compare_op(a, b, "<", Ordering::is_lt))),
    op!("le", "<=", Binary, AB, "bool", |args| binary(args, |a, b| compare_op(a, b, "<=", Ordering::is_le))),
    op!("gt", ">", Binary, AB, "bool", |args| binary(args, |a, b| compare_op(a, b, ">", Ordering::is_gt))),
    op!("ge", ">=", Binary, AB, "bool", |args| binary(args, |a, b| compare_op(a, b, ">=", Ordering::is_ge))),
    op!("and", "and", Binary, AB, "any", |args| {
        binary(args, |a, b| Ok(if a.is_truthy() { b.clone() } else { a.clone() }))
    }),
    op!("or", "or", Binary, AB, "any", |args| {
        binary(args, |a, b| Ok(if a.is_truthy() { a.clone() } else { b.clone() }))
    }),
    op!("not", "not", Unary, A, "bool", |args| Ok(Value::Bool(!args.require("a")?.is_truthy()))),
    op!("neg", "neg", Unary, A, "any", |args| neg(args.require("a")?)),
    op!("pos", "pos", Unary, A, "any", |args| pos(args.require("a")?)),
    op!("getitem", "[]", Binary, &["obj", "key"], "any", |args| {
        getitem(args.require("obj")?, args.require("key")?)
    }),
    op!("getattr", ".", Binary, &["obj", "name"], "any", |args| {
        getattr(args.require("obj")?, args.require("name")?)
    }),
    op!("min", "min", Variadic, &["values"], "any", |args| extremum(args, "min", Ordering::is_lt)),
    op!("max", "max", Variadic, &["values"], "any", |args| extremum(args, "max", Ordering::is_gt)),
];

/// Find an operation by id or symbol
pub fn lookup(id_or_symbol: &str) -> Option<&'static Operation> {
    OPERATIONS
        .iter()
        .find(|op| op.id == id_or_symbol)
        .or_else(|| OPERATIONS.iter().find(|op| op.symbol == id_or_symbol))
}

/// Every operation, in table order
pub fn all() -> &'static [Operation] {
    OPERATIONS
}

// ==================== Helpers ====================

#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::I(*i)),
        Value::Bool(b) => Some(Num::I(*b as i64)),
        Value::Float(x) => Some(Num::F(*x)),
        _ => None,
    }
}

fn float(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::F(x) => x,
    }
}

fn binary(args: &BoundArgs, f: impl Fn(&Value, &Value) -> Result<Value, CallError>) -> Result<Value, CallError> {
    f(args.require("a")?, args.require("b")?)
}

fn unsupported(symbol: &str, a: &Value, b: &Value) -> CallError {
    CallError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        a.type_name(),
        b.type_name()
    ))
}

fn overflow() -> CallError {
    CallError::new("OverflowError", "integer result out of range")
}

fn zero_division(message: &str) -> CallError {
    CallError::new("ZeroDivisionError", message)
}

fn int_op(
    a: &Value,
    b: &Value,
    symbol: &str,
    ints: impl Fn(i64, i64) -> Result<Value, CallError>,
    floats: impl Fn(f64, f64) -> Result<Value, CallError>,
) -> Result<Value, CallError> {
    match (num(a), num(b)) {
        (Some(Num::I(x)), Some(Num::I(y))) => ints(x, y),
        (Some(x), Some(y)) => floats(float(x), float(y)),
        _ => Err(unsupported(symbol, a, b)),
    }
}

/// Repetition count for `len` items, checked against [`MAX_SEQUENCE_LEN`]
fn repeat_count(len: usize, times: i64) -> Result<usize, CallError> {
    let times = usize::try_from(times.max(0)).map_err(|_| overflow())?;
    match len.checked_mul(times) {
        None => Err(CallError::new(
            "OverflowError",
            "repeated sequence length does not fit in an index",
        )),
        Some(total) if total > MAX_SEQUENCE_LEN => Err(CallError::new(
            "MemoryError",
            format!("repeated sequence of length {} is too large", total),
        )),
        Some(_) => Ok(times),
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, CallError> {
    let times = repeat_count(items.len(), times)?;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

// ==================== Arithmetic ====================

fn add(a: &Value, b: &Value) -> Result<Value, CallError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
        (Value::List(x), Value::List(y)) => Ok(Value::List(x.iter().chain(y).cloned().collect())),
        _ => int_op(
            a,
            b,
            "+",
            |x, y| x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            |x, y| Ok(Value::Float(x + y)),
        ),
    }
}

fn sub(a: &Value, b: &Value) -> Result<Value, CallError> {
    int_op(
        a,
        b,
        "-",
        |x, y| x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
        |x, y| Ok(Value::Float(x - y)),
    )
}

fn mul(a: &Value, b: &Value) -> Result<Value, CallError> {
    match (a, b) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat_count(s.len(), *n)?)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            Ok(Value::List(repeat(items, *n)?))
        }
        _ => int_op(
            a,
            b,
            "*",
            |x, y| x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            |x, y| Ok(Value::Float(x * y)),
        ),
    }
}

fn truediv(a: &Value, b: &Value) -> Result<Value, CallError> {
    match (num(a), num(b)) {
        (Some(x), Some(y)) => {
            let y = float(y);
            if y == 0.0 {
                Err(zero_division("division by zero"))
            } else {
                Ok(Value::Float(float(x) / y))
            }
        }
        _ => Err(unsupported("/", a, b)),
    }
}

fn floordiv(a: &Value, b: &Value) -> Result<Value, CallError> {
    int_op(
        a,
        b,
        "//",
        |x, y| {
            if y == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        },
        |x, y| {
            if y == 0.0 {
                Err(zero_division("float floor division by zero"))
            } else {
                Ok(Value::Float((x / y).floor()))
            }
        },
    )
}

fn modulo(a: &Value, b: &Value) -> Result<Value, CallError> {
    int_op(
        a,
        b,
        "%",
        |x, y| {
            if y == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
        },
        |x, y| {
            if y == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }))
        },
    )
}

fn pow(a: &Value, b: &Value) -> Result<Value, CallError> {
    int_op(
        a,
        b,
        "**",
        |x, y| {
            if y < 0 {
                if x == 0 {
                    return Err(zero_division("0 cannot be raised to a negative power"));
                }
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        },
        |x, y| {
            if x == 0.0 && y < 0.0 {
                Err(zero_division("0.0 cannot be raised to a negative power"))
            } else {
                Ok(Value::Float(x.powf(y)))
            }
        },
    )
}

fn neg(a: &Value) -> Result<Value, CallError> {
    match num(a) {
        Some(Num::I(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Num::F(x)) => Ok(Value::Float(-x)),
        None => Err(CallError::type_error(format!(
            "bad operand type for unary -: '{}'",
            a.type_name()
        ))),
    }
}

fn pos(a: &Value) -> Result<Value, CallError> {
    match num(a) {
        Some(Num::I(i)) => Ok(Value::Int(i)),
        Some(Num::F(x)) => Ok(Value::Float(x)),
        None => Err(CallError::type_error(format!(
            "bad operand type for unary +: '{}'",
            a.type_name()
        ))),
    }
}

// ==================== Comparison ====================

fn equals(a: &Value, b: &Value) -> bool {
    match (num(a), num(b)) {
        (Some(Num::I(x)), Some(Num::I(y))) => x == y,
        (Some(x), Some(y)) => float(x) == float(y),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value, symbol: &str) -> Result<Ordering, CallError> {
    let unordered = || {
        CallError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            a.type_name(),
            b.type_name()
        ))
    };
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            for (l, r) in x.iter().zip(y) {
                match compare(l, r, symbol)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => match (num(a), num(b)) {
            (Some(Num::I(x)), Some(Num::I(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => float(x).partial_cmp(&float(y)).ok_or_else(unordered),
            _ => Err(unordered()),
        },
    }
}

fn compare_op(a: &Value, b: &Value, symbol: &str, test: fn(Ordering) -> bool) -> Result<Value, CallError> {
    Ok(Value::Bool(test(compare(a, b, symbol)?)))
}

fn extremum(args: &BoundArgs, name: &str, better: fn(Ordering) -> bool) -> Result<Value, CallError> {
    let values = args.require("values")?.as_list().unwrap_or_default();
    let items = match values {
        [Value::List(inner)] => inner.as_slice(),
        other => other,
    };
    let mut best: Option<&Value> = None;
    for item in items {
        best = match best {
            Some(current) if !better(compare(item, current, "<")?) => Some(current),
            _ => Some(item),
        };
    }
    best.cloned()
        .ok_or_else(|| CallError::value_error(format!("{}() arg is an empty sequence", name)))
}

// ==================== Access ====================

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

fn getitem(obj: &Value, key: &Value) -> Result<Value, CallError> {
    match (obj, key) {
        (Value::List(items), Value::Int(i)) => normalize_index(*i, items.len())
            .map(|idx| items[idx].clone())
            .ok_or_else(|| CallError::new("IndexError", "list index out of range")),
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(*i, chars.len())
                .map(|idx| Value::Str(chars[idx].to_string()))
                .ok_or_else(|| CallError::new("IndexError", "string index out of range"))
        }
        (Value::Map(map), Value::Str(k)) => map
            .get(k)
            .cloned()
            .ok_or_else(|| CallError::new("KeyError", format!("{:?}", k))),
        (Value::Map(_), other) => Err(CallError::new("KeyError", other.to_string())),
        (Value::List(_), other) | (Value::Str(_), other) => Err(CallError::type_error(format!(
            "indices must be integers, not '{}'",
            other.type_name()
        ))),
        _ => Err(CallError::type_error(format!(
            "'{}' object is not subscriptable",
            obj.type_name()
        ))),
    }
}

fn getattr(obj: &Value, name: &Value) -> Result<Value, CallError> {
    let Value::Str(name) = name else {
        return Err(CallError::type_error(format!(
            "attribute name must be string, not '{}'",
            name.type_name()
        )));
    };
    match obj {
        Value::Map(map) if map.contains_key(name) => Ok(map[name].clone()),
        _ => Err(CallError::new(
            "AttributeError",
            format!("'{}' object has no attribute '{}'", obj.type_name(), name),
        )),
    }
}
