//! Runtime value variants and their semantics.
//!
//! Aggregates share structure via `Rc`. Equality is structural for
//! primitives, `none`, arrays, and enums (payloads recursively); structs
//! and closures compare by host-level identity. Tuples share the array
//! representation; the type system keeps them apart.

use std::rc::Rc;

/// A tagged runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<String>),
    /// The `none` value: absence for `?T`, and the unit value.
    None,
    /// Arrays and tuples.
    Array(Rc<Vec<Value>>),
    Struct(Rc<StructValue>),
    Enum(Rc<EnumValue>),
    Closure(Rc<ClosureValue>),
    /// A user-level failure carrying a payload.
    Error(Rc<Value>),
    /// A network handle owned by the VM's socket tables.
    Socket { id: u32, is_listener: bool },
}

#[derive(Debug)]
pub struct StructValue {
    pub type_id: u32,
    pub type_name: String,
    /// Field name -> value, in declaration order.
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug)]
pub struct EnumValue {
    pub type_id: u32,
    pub enum_name: String,
    pub variant: String,
    pub payload: Option<Vec<Value>>,
}

#[derive(Debug)]
pub struct ClosureValue {
    pub func_index: usize,
    pub captures: Vec<Value>,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    /// Whether this value is a failure (`Error` or `none`), as consumed
    /// by `or` and `!`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Value::Error(_) | Value::None)
    }

    /// Truthiness: `false`, `none`, `0`, and the empty string are false;
    /// everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::None => false,
            Value::Int(0) => false,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Render for `print` and `to_string`: strings pass through unquoted
    /// at the top level but are quoted inside aggregates.
    pub fn inspect(&self) -> String {
        match self {
            Value::Str(s) => s.as_ref().clone(),
            other => other.inspect_nested(),
        }
    }

    /// Render with strings quoted (aggregate-element position).
    pub fn inspect_nested(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(x) => format_float(*x),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => format!("'{}'", s),
            Value::None => "none".to_string(),
            Value::Array(elems) => {
                let inner: Vec<String> = elems.iter().map(|v| v.inspect_nested()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Struct(s) => {
                let fields: Vec<String> = s
                    .fields
                    .iter()
                    .map(|(name, value)| format!("{}: {}", name, value.inspect_nested()))
                    .collect();
                format!("{}{{ {} }}", s.type_name, fields.join(", "))
            }
            Value::Enum(e) => match &e.payload {
                Some(payload) if !payload.is_empty() => {
                    let inner: Vec<String> =
                        payload.iter().map(|v| v.inspect_nested()).collect();
                    format!("{}.{}({})", e.enum_name, e.variant, inner.join(", "))
                }
                _ => format!("{}.{}", e.enum_name, e.variant),
            },
            Value::Closure(c) => format!("<fn #{}>", c.func_index),
            Value::Error(payload) => format!("error({})", payload.inspect_nested()),
            Value::Socket { id, is_listener } => {
                if *is_listener {
                    format!("<listener {}>", id)
                } else {
                    format!("<socket {}>", id)
                }
            }
        }
    }
}

/// Floats always print a decimal point so `1` and `1.0` stay distinct.
fn format_float(x: f64) -> String {
    if x.fract() == 0.0 && x.is_finite() {
        format!("{:.1}", x)
    } else {
        x.to_string()
    }
}

/// Structural equality as defined by the `eq` opcode.
///
/// Reflexive, symmetric, and transitive on primitives and `none`. Enums
/// compare by enum name, variant name, and recursively-equal payloads.
/// Structs and closures are equal iff they are the same host value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::None, Value::None) => true,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Enum(x), Value::Enum(y)) => {
            x.enum_name == y.enum_name
                && x.variant == y.variant
                && match (&x.payload, &y.payload) {
                    (None, None) => true,
                    (Some(p), Some(q)) => {
                        p.len() == q.len()
                            && p.iter().zip(q.iter()).all(|(a, b)| values_equal(a, b))
                    }
                    _ => false,
                }
        }
        (Value::Struct(x), Value::Struct(y)) => Rc::ptr_eq(x, y),
        (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
        (Value::Error(x), Value::Error(y)) => values_equal(x, y),
        (Value::Socket { id: x, .. }, Value::Socket { id: y, .. }) => x == y,
        _ => false,
    }
}
