//! Dynamic runtime value (closed tagged union)
//!
//! Every element flowing through a pipeline is a `Value`. The set of variants
//! is closed so that expression evaluation and backend kernels can dispatch
//! exhaustively, with no trait objects in the hot path.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ExprError;

/// A dynamically typed value.
///
/// Numeric coercion rules:
/// - `Int` op `Float` promotes to `Float`
/// - `/` always produces `Float` (true division); `floor_div` keeps `Int`
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absence of a value (e.g. the result of a pure side-effect pipeline)
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Key-value record with string keys, deterministic iteration order
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Runtime type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Truthiness, used by filter stages: zero, empty and unit are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Unit => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Record(fields) => !fields.is_empty(),
        }
    }

    /// Numeric view, promoting `Int` to `Float`
    pub fn as_f64(&self) -> Result<f64, ExprError> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(ExprError::Unsupported {
                op: "numeric coercion".to_string(),
                type_name: other.type_name(),
            }),
        }
    }

    /// Integer view; bitwise operations require exact `Int` operands
    pub fn as_i64(&self) -> Result<i64, ExprError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(ExprError::Unsupported {
                op: "integer coercion".to_string(),
                type_name: other.type_name(),
            }),
        }
    }

    /// String view for record key access and string methods
    pub fn as_str(&self) -> Result<&str, ExprError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(ExprError::Unsupported {
                op: "string coercion".to_string(),
                type_name: other.type_name(),
            }),
        }
    }

    /// Render this value as a grouping key. Only scalar variants are keyable.
    pub fn as_group_key(&self) -> Result<String, ExprError> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            other => Err(ExprError::Unsupported {
                op: "group key".to_string(),
                type_name: other.type_name(),
            }),
        }
    }

    /// Build a record from string-keyed pairs
    pub fn record<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list from anything convertible to values
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
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
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
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
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
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

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Value::Record(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("x".to_string()).truthy());
        assert!(!Value::Unit.truthy());
        assert!(!Value::List(vec![]).truthy());
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Int(3).as_f64().unwrap(), 3.0);
        assert_eq!(Value::Float(2.5).as_f64().unwrap(), 2.5);
        assert!(Value::Str("3".to_string()).as_f64().is_err());
        assert_eq!(Value::Int(7).as_i64().unwrap(), 7);
        assert!(Value::Float(7.0).as_i64().is_err());
    }

    #[test]
    fn test_record_builder_and_display() {
        let rec = Value::record([("name", Value::from("alice")), ("age", Value::from(30))]);
        assert_eq!(rec.to_string(), "{age: 30, name: alice}");
    }
}
