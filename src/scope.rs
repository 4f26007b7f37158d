//! Runtime scope chain.
//!
//! A `Scope` binds a context value, a parent (either an enclosing scope or
//! the raw context a block was entered with) and a shared data map used for
//! `@`-prefixed lookups. Path resolution walks `Binding`s, which is what
//! lets `../` step from a value back into the enclosing scope.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Either a plain value or a scope; the two shapes a path segment can land on.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Scope(Rc<Scope>),
}

impl Binding {
    /// Look up a name on this binding: scope rules for scopes, key lookup
    /// for map values. `None` means absent (distinct from a present falsy
    /// value).
    pub fn get(&self, name: &str) -> Option<Binding> {
        match self {
            Binding::Scope(scope) => scope.get(name),
            Binding::Value(Value::Map(map)) => map.get(name).cloned().map(Binding::Value),
            Binding::Value(_) => None,
        }
    }

    /// The underlying context value (a scope's innermost context).
    pub fn to_value(&self) -> Value {
        match self {
            Binding::Value(v) => v.clone(),
            Binding::Scope(scope) => scope.context().to_value(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Binding::Value(v) => v.is_truthy(),
            Binding::Scope(_) => true,
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

/// Evaluation-time scope: context + parent linkage + shared data.
#[derive(Debug)]
pub struct Scope {
    context: Binding,
    parent: Option<Binding>,
    data: Rc<RefCell<HashMap<String, Value>>>,
}

impl Scope {
    /// Create a scope over `context`. A `Scope` parent shares its data map
    /// with the child; any other parent gets the child a fresh map.
    pub fn new(context: Binding, parent: Binding) -> Rc<Self> {
        let data = match &parent {
            Binding::Scope(p) => Rc::clone(&p.data),
            Binding::Value(_) => Rc::new(RefCell::new(HashMap::new())),
        };
        Rc::new(Self {
            context,
            parent: Some(parent),
            data,
        })
    }

    /// Create a scope and merge `data` entries into the shared map.
    /// The map itself is never replaced, only extended at creation time.
    pub fn with_data(
        context: Binding,
        parent: Binding,
        data: HashMap<String, Value>,
    ) -> Rc<Self> {
        let scope = Self::new(context, parent);
        scope.data.borrow_mut().extend(data);
        scope
    }

    pub fn context(&self) -> &Binding {
        &self.context
    }

    /// Scope lookup: `__parent` climbs the chain, `this` is the own context,
    /// `@name` reads the shared data map, anything else is a context lookup.
    pub fn get(&self, name: &str) -> Option<Binding> {
        if name == "__parent" {
            return self.parent.clone();
        }
        if name == "this" {
            return Some(self.context.clone());
        }
        if let Some(data_key) = name.strip_prefix('@') {
            return self
                .data
                .borrow()
                .get(data_key)
                .cloned()
                .map(Binding::Value);
        }
        self.context.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(entries: &[(&str, Value)]) -> Value {
        let mut m = BTreeMap::new();
        for (k, v) in entries {
            m.insert(k.to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn test_get_context_key() {
        let ctx = map(&[("name", Value::from("Alice"))]);
        let scope = Scope::new(ctx.clone().into(), ctx.into());
        assert_eq!(
            scope.get("name").map(|b| b.to_value()),
            Some(Value::from("Alice"))
        );
        assert!(scope.get("missing").is_none());
    }

    #[test]
    fn test_get_this() {
        let ctx = map(&[("name", Value::from("Alice"))]);
        let scope = Scope::new(ctx.clone().into(), ctx.clone().into());
        assert_eq!(scope.get("this").map(|b| b.to_value()), Some(ctx));
    }

    #[test]
    fn test_get_parent() {
        let outer = map(&[("title", Value::from("Top"))]);
        let inner = map(&[("name", Value::from("Inner"))]);
        let outer_scope = Scope::new(outer.clone().into(), outer.into());
        let inner_scope = Scope::new(inner.into(), Binding::Scope(outer_scope));

        let parent = inner_scope.get("__parent").unwrap();
        assert_eq!(
            parent.get("title").map(|b| b.to_value()),
            Some(Value::from("Top"))
        );
    }

    #[test]
    fn test_shared_data() {
        let ctx = map(&[]);
        let mut data = HashMap::new();
        data.insert("user".to_string(), Value::from("admin"));
        let root = Scope::with_data(ctx.clone().into(), ctx.into(), data);
        assert_eq!(
            root.get("@user").map(|b| b.to_value()),
            Some(Value::from("admin"))
        );

        // child created under a scope parent sees the same data map
        let child = Scope::new(Value::Null.into(), Binding::Scope(root));
        assert_eq!(
            child.get("@user").map(|b| b.to_value()),
            Some(Value::from("admin"))
        );
    }

    #[test]
    fn test_absent_vs_falsy() {
        let ctx = map(&[("empty", Value::from(""))]);
        let scope = Scope::new(ctx.clone().into(), ctx.into());
        assert!(scope.get("empty").is_some());
        assert!(scope.get("absent").is_none());
    }
}
