use crate::error::{AkibareError, Result};
use crate::helpers::HelperRef;
use crate::output::Output;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Runtime value for template contexts.
///
/// A closed tagged variant: scalars, sequences, mappings, invocables
/// (`Helper`) and already-rendered fragment sequences (`Rendered`).
/// Dispatch is always on the tag; there is no dynamic invocability test.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An invocable context value; called with `(scope, args)` when expanded.
    Helper(HelperRef),
    /// Rendered output passed through as a value; never escaped again.
    Rendered(Output),
}

impl Value {
    /// Convert a JSON value to a template Value.
    ///
    /// Floats are accepted only when they are whole numbers; the value
    /// model is integer-only.
    pub fn from_json(json: JsonValue) -> Result<Self> {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Ok(Value::Int(f as i64))
                    } else {
                        Err(AkibareError::TypeError {
                            message: format!("Unsupported non-integer number: {}", f),
                        })
                    }
                } else {
                    Err(AkibareError::TypeError {
                        message: "Invalid number".to_string(),
                    })
                }
            }
            JsonValue::String(s) => Ok(Value::Str(s)),
            JsonValue::Array(arr) => {
                let values: Result<Vec<Value>> = arr.into_iter().map(Value::from_json).collect();
                Ok(Value::List(values?))
            }
            JsonValue::Object(obj) => {
                let mut map = BTreeMap::new();
                for (k, v) in obj {
                    map.insert(k, Value::from_json(v)?);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Truthiness: false, null, 0, "", empty list/map are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Helper(_) => true,
            Value::Rendered(out) => !out.is_empty(),
        }
    }

    /// Stringify for expansion output (before any escaping).
    pub fn render_string(&self) -> String {
        let mut result = String::new();
        self.write_string(&mut result);
        result
    }

    fn write_string(&self, out: &mut String) {
        match self {
            Value::Null => {}
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => {
                let _ = write!(out, "{}", n);
            }
            Value::Str(s) => out.push_str(s),
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_string(out);
                }
                out.push(']');
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(k);
                    out.push_str(": ");
                    v.write_string(out);
                }
                out.push('}');
            }
            Value::Helper(_) => {}
            Value::Rendered(o) => out.push_str(&o.clone().into_string()),
        }
    }

    /// Ordering for `compare` and `each` sorting; `None` when the two
    /// values have no meaningful order.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            // null orders before everything else (stable sort placement)
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            _ => None,
        }
    }

    /// Membership test for the `compare` helper's `in` operator.
    pub fn contained_in(&self, container: &Value) -> Result<bool> {
        match container {
            Value::List(items) => Ok(items.contains(self)),
            Value::Str(s) => match self {
                Value::Str(needle) => Ok(s.contains(needle.as_str())),
                other => Err(AkibareError::TypeError {
                    message: format!("Cannot search string for {}", other.type_name()),
                }),
            },
            Value::Map(map) => match self {
                Value::Str(key) => Ok(map.contains_key(key)),
                other => Err(AkibareError::TypeError {
                    message: format!("Cannot use {} as a map key", other.type_name()),
                }),
            },
            other => Err(AkibareError::TypeError {
                message: format!("'in' requires a sequence, got {}", other.type_name()),
            }),
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Helper(_) => "helper",
            Value::Rendered(_) => "rendered output",
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Helper(_) => f.write_str("Helper(..)"),
            Value::Rendered(out) => f.debug_tuple("Rendered").field(out).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Helper(a), Value::Helper(b)) => std::sync::Arc::ptr_eq(a, b),
            (Value::Rendered(a), Value::Rendered(b)) => a == b,
            _ => false,
        }
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
