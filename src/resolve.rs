//! Structural path resolution.
//!
//! Pure functions shared by the compiler's emitted lookups and by helpers.
//! Resolution narrows a binding segment by segment and works uniformly
//! across list- and map-shaped contexts; absence is `None`, never an error.

use crate::ast::PathSeg;
use crate::scope::Binding;
use crate::value::Value;

/// Resolve a path against a binding, returning the final binding.
///
/// Empty segments are no-ops; an absent intermediate short-circuits to
/// `None`. Parent markers only mean something on scopes; on a raw value
/// they resolve to nothing.
pub fn resolve_binding(start: &Binding, segments: &[PathSeg]) -> Option<Binding> {
    let mut current = start.clone();
    for segment in segments {
        match segment {
            PathSeg::Parent => {
                current = current.get("__parent")?;
            }
            PathSeg::Named(name) if name.is_empty() => {}
            PathSeg::Named(name) => match &current {
                Binding::Scope(_) => {
                    current = current.get(name)?;
                }
                Binding::Value(value) => {
                    current = Binding::Value(structural_get(value, name)?);
                }
            },
        }
    }
    Some(current)
}

/// Resolve a path to a plain value.
pub fn resolve(start: &Binding, segments: &[PathSeg]) -> Option<Value> {
    resolve_binding(start, segments).map(|b| b.to_value())
}

/// Narrow a single value by one segment: integer indexing for lists
/// (negative counts from the end), key lookup for maps.
fn structural_get(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::List(items) => {
            let index: i64 = segment.parse().ok()?;
            let index = if index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                index as usize
            };
            items.get(index).cloned()
        }
        Value::Map(map) => map.get(segment).cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding(json: serde_json::Value) -> Binding {
        Binding::Value(Value::from_json(json).unwrap())
    }

    fn segs(names: &[&str]) -> Vec<PathSeg> {
        names.iter().map(|s| PathSeg::Named(s.to_string())).collect()
    }

    #[test]
    fn test_resolve_nested_list_index() {
        let ctx = binding(json!({"a": {"b": [10, 20, 30]}}));
        assert_eq!(
            resolve(&ctx, &segs(&["a", "b", "1"])),
            Some(Value::Int(20))
        );
    }

    #[test]
    fn test_resolve_null_context() {
        let ctx = Binding::Value(Value::Null);
        assert_eq!(resolve(&ctx, &segs(&["a"])), None);
    }

    #[test]
    fn test_resolve_missing_key() {
        let ctx = binding(json!({"a": 1}));
        assert_eq!(resolve(&ctx, &segs(&["missing"])), None);
    }

    #[test]
    fn test_resolve_empty_segments_noop() {
        let ctx = binding(json!({"a": {"b": 1}}));
        assert_eq!(
            resolve(&ctx, &segs(&["a", "", "b", ""])),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn test_resolve_negative_index() {
        let ctx = binding(json!([1, 2, 3]));
        assert_eq!(resolve(&ctx, &segs(&["-1"])), Some(Value::Int(3)));
    }

    #[test]
    fn test_resolve_out_of_range_index() {
        let ctx = binding(json!([1, 2, 3]));
        assert_eq!(resolve(&ctx, &segs(&["7"])), None);
        assert_eq!(resolve(&ctx, &segs(&["x"])), None);
    }

    #[test]
    fn test_resolve_through_parent_marker() {
        use crate::scope::Scope;

        let outer = Value::from_json(json!({"title": "Top"})).unwrap();
        let inner = Value::from_json(json!({"name": "Inner"})).unwrap();
        let outer_scope = Scope::new(outer.clone().into(), outer.into());
        let inner_scope = Scope::new(inner.into(), Binding::Scope(outer_scope));

        let segments = vec![PathSeg::Parent, PathSeg::Named("title".into())];
        assert_eq!(
            resolve(&Binding::Scope(inner_scope), &segments),
            Some(Value::from("Top"))
        );
    }
}
