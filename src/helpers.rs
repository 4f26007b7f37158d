//! Helper registry and built-in helpers.
//!
//! Helpers share one signature: `(context binding, options bag, arguments)`.
//! Block helpers render their bodies through the options bag; in value
//! position the bag carries no bodies and renders nothing. The built-in
//! table is never mutated: call-site registries are merged over it per
//! render.

use crate::error::{AkibareError, Result};
use crate::output::Output;
use crate::renderer::Options;
use crate::scope::{Binding, Scope};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What a helper returns: `None` renders nothing; a `Value::Rendered`
/// passes fragments through untouched; any other value is stringified.
pub type HelperResult = Result<Option<Value>>;

/// The helper calling convention.
pub type HelperFn = dyn for<'a> Fn(&Binding, &Options<'a>, &Args) -> HelperResult + Send + Sync;

/// A shared, invocable helper.
pub type HelperRef = Arc<HelperFn>;

/// Evaluated arguments for one helper invocation, in source order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Args {
    pub fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: Vec::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// A keyword argument that must be an integer when present.
    pub fn named_int(&self, name: &str) -> Result<Option<i64>> {
        match self.named(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(AkibareError::TypeError {
                message: format!("'{}' must be an integer, got {}", name, other.type_name()),
            }),
        }
    }

    /// A keyword argument that must be a string when present.
    pub fn named_str(&self, name: &str) -> Result<Option<&str>> {
        match self.named(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(other) => Err(AkibareError::TypeError {
                message: format!("'{}' must be a string, got {}", name, other.type_name()),
            }),
        }
    }
}

/// A mapping from helper name to invocable.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    map: HashMap<String, HelperRef>,
}

impl HelperRegistry {
    /// An empty registry (for call-site overrides).
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in helper set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("if", helper_if);
        registry.register("unless", helper_unless);
        registry.register("with", helper_with);
        registry.register("each", helper_each);
        registry.register("compare", helper_compare);
        registry.register("ifeq", helper_ifeq);
        registry.register("if_match", helper_if_match);
        registry.register("blockHelperMissing", helper_block_helper_missing);
        registry.register("helperMissing", helper_missing);
        registry
    }

    /// Register a helper, replacing any existing one of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: for<'a> Fn(&Binding, &Options<'a>, &Args) -> HelperResult + Send + Sync + 'static,
    {
        self.map.insert(name.into(), Arc::new(helper));
    }

    pub fn get(&self, name: &str) -> Option<&HelperRef> {
        self.map.get(name)
    }

    /// Layer `overrides` on top of this registry; overrides win by name.
    pub fn merged(&self, overrides: &HelperRegistry) -> HelperRegistry {
        let mut map = self.map.clone();
        for (name, helper) in &overrides.map {
            map.insert(name.clone(), Arc::clone(helper));
        }
        HelperRegistry { map }
    }
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("names", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn arg_or_null(args: &Args, index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

/// Invoke a value resolved to an invocable (computed condition/expansion).
fn call_value(
    helper: &HelperRef,
    this: &Binding,
    options: &Options<'_>,
    args: &Args,
) -> HelperResult {
    helper(this, &options.without_blocks(), args)
}

/// `{{#if cond}}..{{else}}..{{/if}}`; an invocable condition is called
/// with the current scope first.
fn helper_if(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let mut condition = arg_or_null(args, 0);
    if let Value::Helper(f) = condition.clone() {
        condition = call_value(&f, this, options, &Args::default())?.unwrap_or(Value::Null);
    }
    let body = if condition.is_truthy() {
        options.fn_with(this)?
    } else {
        options.inverse_with(this)?
    };
    Ok(Some(Value::Rendered(body)))
}

/// `{{#unless cond}}..{{/unless}}`; renders nothing on a truthy condition
/// (there is no inverse branch).
fn helper_unless(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    if arg_or_null(args, 0).is_truthy() {
        Ok(None)
    } else {
        Ok(Some(Value::Rendered(options.fn_with(this)?)))
    }
}

/// `{{#with ctx}}..{{else}}..{{/with}}`; rebinds the context.
fn helper_with(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let context = arg_or_null(args, 0);
    let body = if context.is_truthy() {
        let scope = Scope::new(Binding::Value(context), this.clone());
        options.fn_with(&Binding::Scope(scope))?
    } else {
        options.inverse_with(this)?
    };
    Ok(Some(Value::Rendered(body)))
}

/// `{{#each seq order="field [desc]" offset=N limit=N}}..{{/each}}`
fn helper_each(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let sequence = arg_or_null(args, 0);
    if !sequence.is_truthy() {
        return Ok(None);
    }
    let items = sequence.as_list().ok_or_else(|| AkibareError::TypeError {
        message: format!("each requires a list, got {}", sequence.type_name()),
    })?;

    let mut items: Vec<Value> = items.to_vec();
    if let Some(order) = args.named_str("order")? {
        let mut parts = order.split_whitespace();
        let field = parts.next().unwrap_or_default().to_string();
        let descending = parts.next() == Some("desc");
        items.sort_by(|a, b| {
            sort_key(a, &field)
                .compare(&sort_key(b, &field))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if descending {
            items.reverse();
        }
    }

    let offset = usize_kwarg(args, "offset")?.unwrap_or(0);
    let limit = usize_kwarg(args, "limit")?.unwrap_or(usize::MAX);

    let mut result = Output::new();
    for item in items.into_iter().skip(offset).take(limit) {
        let scope = Scope::new(Binding::Value(item), this.clone());
        result.push_output(options.fn_with(&Binding::Scope(scope))?);
    }
    Ok(Some(Value::Rendered(result)))
}

fn sort_key(item: &Value, field: &str) -> Value {
    match item {
        Value::Map(map) => map.get(field).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn usize_kwarg(args: &Args, name: &str) -> Result<Option<usize>> {
    match args.named_int(name)? {
        None => Ok(None),
        Some(n) if n >= 0 => Ok(Some(n as usize)),
        Some(n) => Err(AkibareError::TypeError {
            message: format!("'{}' must not be negative, got {}", name, n),
        }),
    }
}

/// `{{#compare a b operator="<"}}..{{else}}..{{/compare}}`
fn helper_compare(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let val1 = arg_or_null(args, 0);
    let val2 = arg_or_null(args, 1);
    let operator = args.named_str("operator")?.unwrap_or("=");

    let ordered = |expected: &[std::cmp::Ordering]| -> Result<bool> {
        let ordering = val1.compare(&val2).ok_or_else(|| AkibareError::TypeError {
            message: format!(
                "Cannot compare {} with {}",
                val1.type_name(),
                val2.type_name()
            ),
        })?;
        Ok(expected.contains(&ordering))
    };

    use std::cmp::Ordering::{Equal, Greater, Less};
    let result = match operator {
        "=" => val1 == val2,
        // the original computes equality here as well; kept as a
        // compatibility quirk
        "!=" => val1 == val2,
        "<=" => ordered(&[Less, Equal])?,
        ">=" => ordered(&[Greater, Equal])?,
        "<" => ordered(&[Less])?,
        ">" => ordered(&[Greater])?,
        "in" => val1.contained_in(&val2)?,
        "not in" => !val1.contained_in(&val2)?,
        other => {
            return Err(AkibareError::Config {
                operator: other.to_string(),
            })
        }
    };

    let body = if result {
        options.fn_with(this)?
    } else {
        options.inverse_with(this)?
    };
    Ok(Some(Value::Rendered(body)))
}

/// `{{#ifeq a b}}..{{else}}..{{/ifeq}}`
fn helper_ifeq(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let body = if arg_or_null(args, 0) == arg_or_null(args, 1) {
        options.fn_with(this)?
    } else {
        options.inverse_with(this)?
    };
    Ok(Some(Value::Rendered(body)))
}

/// `{{#if_match value pattern}}..{{else}}..{{/if_match}}`
///
/// `%` in the pattern matches any run of characters; the match is anchored
/// at the start of the value and may end before its end.
fn helper_if_match(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let value = arg_or_null(args, 0);
    let text = match &value {
        v if !v.is_truthy() => String::new(),
        Value::Str(s) => s.clone(),
        other => other.render_string(),
    };
    let pattern = match args.get(1) {
        Some(Value::Str(p)) => p.clone(),
        other => {
            return Err(AkibareError::TypeError {
                message: format!(
                    "if_match requires a string pattern, got {}",
                    other.map_or("nothing", |v| v.type_name())
                ),
            })
        }
    };

    let body = if wildcard_match(&pattern, &text) {
        options.fn_with(this)?
    } else {
        options.inverse_with(this)?
    };
    Ok(Some(Value::Rendered(body)))
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('%');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    for part in parts {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    true
}

/// Fallback for a block whose symbol is not a registered helper.
fn helper_block_helper_missing(
    this: &Binding,
    options: &Options<'_>,
    args: &Args,
) -> HelperResult {
    let mut value = arg_or_null(args, 0);
    if let Value::Helper(f) = value.clone() {
        value = call_value(&f, this, options, &Args::default())?.unwrap_or(Value::Null);
    }

    let is_empty_string = matches!(&value, Value::Str(s) if s.is_empty());
    if !is_empty_string && !value.is_truthy() {
        return Ok(Some(Value::Rendered(options.inverse_with(this)?)));
    }

    if let Some(items) = value.as_list() {
        // sequence-shaped values iterate like `each`
        let mut result = Output::new();
        for item in items {
            let scope = Scope::new(Binding::Value(item.clone()), this.clone());
            result.push_output(options.fn_with(&Binding::Scope(scope))?);
        }
        return Ok(Some(Value::Rendered(result)));
    }

    let body = if value == Value::Bool(true) {
        options.fn_with(this)?
    } else {
        let scope = Scope::new(Binding::Value(value), this.clone());
        options.fn_with(&Binding::Scope(scope))?
    };
    Ok(Some(Value::Rendered(body)))
}

/// Fallback for a simple-path expansion that resolved to nothing. With no
/// explicit arguments this is a silent empty result; with arguments it is
/// a hard failure. The failing name arrives as the first positional value.
fn helper_missing(_this: &Binding, _options: &Options<'_>, args: &Args) -> HelperResult {
    let name = match args.get(0) {
        Some(Value::Str(name)) => name.clone(),
        _ => String::new(),
    };
    if args.positional.len() <= 1 && args.named.is_empty() {
        return Ok(None);
    }
    Err(AkibareError::MissingHelper { name })
}

/// `{{#paginate items limit=10 offset=0 url=request_url}}..{{/paginate}}`
///
/// Not auto-registered; applications opt in with
/// `registry.register("paginate", akibare::helpers::paginate)`.
///
/// Exposes the computed record under the key `paginate`: the page slice
/// (`data`), `count`, `page_no`, `num_pages`, `item_first`, `item_last`,
/// optional `previous`/`next` descriptors, and a `parts` window spanning
/// pages max(1, page-2)..=min(num_pages, page+1), each with an `active`
/// flag and a URL with its `&offset=N` parameter rewritten.
pub fn paginate(this: &Binding, options: &Options<'_>, args: &Args) -> HelperResult {
    let sequence = arg_or_null(args, 0);
    if !sequence.is_truthy() {
        return Ok(Some(Value::Rendered(options.inverse_with(this)?)));
    }
    let items = sequence.as_list().ok_or_else(|| AkibareError::TypeError {
        message: format!("paginate requires a list, got {}", sequence.type_name()),
    })?;

    let limit = args.named_int("limit")?.unwrap_or(10);
    let offset = args.named_int("offset")?.unwrap_or(0);
    if limit <= 0 || offset < 0 {
        return Err(AkibareError::TypeError {
            message: format!("invalid pagination bounds: limit={}, offset={}", limit, offset),
        });
    }

    let count = items.len() as i64;
    let page_no = offset / limit + 1;
    let num_pages = (count + limit - 1) / limit;

    let slice_start = (offset as usize).min(items.len());
    let slice_end = ((offset + limit) as usize).min(items.len());

    let mut base_url = args
        .named_str("url")?
        .map(strip_offset_param)
        .unwrap_or_default();
    if !base_url.contains('?') {
        base_url.push('?');
    }
    let page_url = |page: i64| Value::Str(format!("{}&offset={}", base_url, (page - 1) * limit));

    let mut record = BTreeMap::new();
    record.insert(
        "data".to_string(),
        Value::List(items[slice_start..slice_end].to_vec()),
    );
    record.insert("limit".to_string(), Value::Int(limit));
    record.insert("offset".to_string(), Value::Int(offset));
    record.insert("count".to_string(), Value::Int(count));
    record.insert("item_first".to_string(), Value::Int(offset + 1));
    record.insert(
        "item_last".to_string(),
        Value::Int((offset + limit).min(count)),
    );
    record.insert("page_no".to_string(), Value::Int(page_no));
    record.insert("num_pages".to_string(), Value::Int(num_pages));

    if page_no > 1 {
        let mut previous = BTreeMap::new();
        previous.insert("page_no".to_string(), Value::Int(page_no - 1));
        previous.insert("url".to_string(), page_url(page_no - 1));
        record.insert("previous".to_string(), Value::Map(previous));
    }
    if page_no < num_pages {
        let mut next = BTreeMap::new();
        next.insert("page_no".to_string(), Value::Int(page_no + 1));
        next.insert("url".to_string(), page_url(page_no + 1));
        record.insert("next".to_string(), Value::Map(next));
    }

    let mut parts = Vec::new();
    if num_pages > 1 {
        let first = (page_no - 2).max(1);
        let last = (page_no + 1).min(num_pages);
        for page in first..=last {
            let mut part = BTreeMap::new();
            part.insert("page_no".to_string(), Value::Int(page));
            part.insert("active".to_string(), Value::Bool(page == page_no));
            part.insert("url".to_string(), page_url(page));
            parts.push(Value::Map(part));
        }
    }
    record.insert("parts".to_string(), Value::List(parts));

    let mut context = BTreeMap::new();
    context.insert("paginate".to_string(), Value::Map(record));
    let scope = Scope::new(Binding::Value(Value::Map(context)), this.clone());
    Ok(Some(Value::Rendered(
        options.fn_with(&Binding::Scope(scope))?,
    )))
}

/// Remove every `&offset=<digits>` query parameter from a URL.
fn strip_offset_param(url: &str) -> String {
    const PARAM: &str = "&offset=";
    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(i) = rest.find(PARAM) {
        let after = &rest[i + PARAM.len()..];
        let digits = after.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 {
            out.push_str(&rest[..i]);
            rest = &after[digits..];
        } else {
            out.push_str(&rest[..i + PARAM.len()]);
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("abc", "abcdef"));
        assert!(!wildcard_match("abc", "xabc"));
        assert!(wildcard_match("a%c", "abbbc"));
        assert!(wildcard_match("a%c", "ac"));
        assert!(wildcard_match("%c", "abc"));
        assert!(wildcard_match("a%", "a"));
        assert!(!wildcard_match("a%c", "ab"));
    }

    #[test]
    fn test_strip_offset_param() {
        assert_eq!(
            strip_offset_param("/items?q=x&offset=20&limit=5"),
            "/items?q=x&limit=5"
        );
        assert_eq!(strip_offset_param("/items?q=x"), "/items?q=x");
        assert_eq!(
            strip_offset_param("/a?offset=1&offset=2"),
            "/a?offset=1"
        );
    }

    #[test]
    fn test_registry_merge_overrides() {
        let base = HelperRegistry::builtin();
        let mut overrides = HelperRegistry::new();
        overrides.register("if", |_this: &Binding, _o: &Options<'_>, _a: &Args| {
            Ok(Some(Value::from("override")))
        });
        let merged = base.merged(&overrides);
        assert!(merged.get("each").is_some());
        assert!(merged.get("if").is_some());
        // the base set is untouched
        assert!(!Arc::ptr_eq(
            base.get("if").unwrap(),
            merged.get("if").unwrap()
        ));
    }

    #[test]
    fn test_args_kwarg_typing() {
        let args = Args {
            positional: vec![],
            named: vec![
                ("limit".to_string(), Value::Int(5)),
                ("order".to_string(), Value::from("n desc")),
            ],
        };
        assert_eq!(args.named_int("limit").unwrap(), Some(5));
        assert_eq!(args.named_str("order").unwrap(), Some("n desc"));
        assert_eq!(args.named_int("missing").unwrap(), None);
        assert!(args.named_int("order").is_err());
    }
}
