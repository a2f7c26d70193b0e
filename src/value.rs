//! The decoded `Value` type and the scalar coercion rule (§4.5).

use std::fmt;

use indexmap::IndexMap;

/// A leaf value, or a nested mapping used for plain-mapping dump input
/// and `Tree::to_value`'s flattened view of a class (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Coerces a single raw scalar run per §4.5: trim, exact `true`/`false`,
/// a single quoted span (peeling one layer and un-doubling `""` — only
/// when the *entire* trimmed scalar is itself one quoted span), float,
/// then int, else string.
pub(crate) fn coerce_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();

    if trimmed == "true" {
        return Value::Bool(true);
    }
    if trimmed == "false" {
        return Value::Bool(false);
    }

    if let Some(inner) = single_quoted_span(trimmed) {
        return Value::String(inner);
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        let as_int = f as i64;
        if as_int as f64 == f {
            return Value::Int(as_int);
        }
        return Value::Float(f);
    }

    Value::String(trimmed.to_string())
}

/// If `s` both starts and ends with `"` (and is at least two characters
/// long), returns its content with `""` un-doubled to `"`. Otherwise
/// returns `None` — a scalar with embedded-but-not-enclosing quotes is
/// left completely untouched.
fn single_quoted_span(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'"' || bytes[bytes.len() - 1] != b'"' {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    Some(inner.replace("\"\"", "\""))
}

/// Recursively coerces a parsed `RawValue` tree (array recursion plus
/// dropping whitespace-only string elements inside arrays).
pub(crate) fn coerce(raw: &crate::parser::RawValue) -> Value {
    use crate::parser::RawValue;
    match raw {
        RawValue::Scalar(s) => coerce_scalar(s),
        RawValue::Array(items) => {
            let values: Vec<Value> = items
                .iter()
                .map(coerce)
                .filter(|v| !matches!(v, Value::String(s) if s.trim().is_empty()))
                .collect();
            Value::List(values)
        }
    }
}
