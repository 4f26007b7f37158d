//! Akibare is a mustache-style template engine: `{{path}}` expansions,
//! `{{#block}}` helpers with `{{else}}` branches, `{{>partial}}` inclusion
//! and HTML escaping by default.
//!
//! Templates compile once into an immutable [`Program`] and render against
//! a JSON context any number of times, from any thread:
//!
//! ```
//! use serde_json::json;
//!
//! let out = akibare::render("Hello {{name}}!", json!({"name": "Ada"})).unwrap();
//! assert_eq!(out, "Hello Ada!");
//! ```
//!
//! Block helpers see the context the block was entered with; `each` walks
//! a sequence, rebinding `this` per item:
//!
//! ```
//! use serde_json::json;
//!
//! let template = akibare::Template::compile(
//!     "{{#each users}}<li>{{name}}</li>{{/each}}",
//! ).unwrap();
//! let out = template
//!     .render(json!({"users": [{"name": "a"}, {"name": "b"}]}))
//!     .unwrap();
//! assert_eq!(out, "<li>a</li><li>b</li>");
//! ```
//!
//! Custom helpers and partials are supplied per render call through
//! [`RenderSettings`]; the built-in set (`if`, `unless`, `with`, `each`,
//! `compare`, `ifeq`, `if_match`) is always available underneath.

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod helpers;
pub mod html_escape;
pub mod output;
pub mod parser;
pub mod renderer;
pub mod resolve;
pub mod scope;
pub mod value;

pub use cache::TemplateCache;
pub use compiler::Program;
pub use error::{AkibareError, Location, Result};
pub use helpers::{Args, HelperRef, HelperRegistry, HelperResult};
pub use output::Output;
pub use renderer::{Options, PartialRegistry};
pub use scope::{Binding, Scope};
pub use value::Value;

use renderer::Renderer;
use std::collections::HashMap;
use std::sync::OnceLock;

fn builtin_helpers() -> &'static HelperRegistry {
    static BUILTINS: OnceLock<HelperRegistry> = OnceLock::new();
    BUILTINS.get_or_init(HelperRegistry::builtin)
}

/// Per-call render configuration: extra helpers, partials and initial
/// `@name` data entries.
#[derive(Debug, Default)]
pub struct RenderSettings {
    pub helpers: HelperRegistry,
    pub partials: PartialRegistry,
    pub data: HashMap<String, Value>,
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a helper; same-named built-ins are shadowed.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: for<'a> Fn(&Binding, &Options<'a>, &Args) -> HelperResult + Send + Sync + 'static,
    {
        self.helpers.register(name, helper);
    }

    /// Register a compiled template as `{{>name}}`.
    pub fn register_partial(&mut self, name: impl Into<String>, template: &Template) {
        self.partials.register(name, template);
    }

    /// Seed a `@name` data entry visible to the whole render.
    pub fn set_data(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }
}

/// A compiled template, immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct Template {
    program: Program,
}

impl Template {
    /// Parse and compile `source`. Parse failures come back wrapped with
    /// the offending source as [`AkibareError::Compile`].
    pub fn compile(source: &str) -> Result<Self> {
        let ast = parser::parse(source).map_err(|e| e.into_compile_error(source))?;
        Ok(Self {
            program: compiler::compile(&ast),
        })
    }

    pub(crate) fn program(&self) -> &Program {
        &self.program
    }

    /// Render against a JSON context with default settings.
    pub fn render(&self, context: serde_json::Value) -> Result<String> {
        self.render_with(context, &RenderSettings::new())
    }

    /// Render against any serializable context.
    pub fn render_serializable<T: serde::Serialize>(&self, context: &T) -> Result<String> {
        let json = serde_json::to_value(context).map_err(|e| AkibareError::TypeError {
            message: e.to_string(),
        })?;
        self.render(json)
    }

    /// Render against a JSON context with extra helpers, partials and data.
    pub fn render_with(
        &self,
        context: serde_json::Value,
        settings: &RenderSettings,
    ) -> Result<String> {
        self.render_value(Value::from_json(context)?, settings)
    }

    /// Render against an already-converted [`Value`] context.
    pub fn render_value(&self, context: Value, settings: &RenderSettings) -> Result<String> {
        let helpers = builtin_helpers().merged(&settings.helpers);
        let renderer = Renderer::new(&helpers, &settings.partials);
        let root = Binding::Value(context);
        let scope = Scope::with_data(root.clone(), root, settings.data.clone());
        let output = renderer.render_program(&self.program, &Binding::Scope(scope))?;
        Ok(output.into_string())
    }
}

/// Compile and render in one step.
pub fn render(source: &str, context: serde_json::Value) -> Result<String> {
    Template::compile(source)?.render(context)
}
