//! Program execution.
//!
//! A `Renderer` borrows the effective helper and partial registries for one
//! render call and walks a `Program`'s ops, growing an `Output` fragment
//! tree. Block bodies are exposed to helpers through an `Options` bag so a
//! helper never sees ops, only "render my body against this binding".

use crate::compiler::{CompiledArg, CompiledArgs, CompiledPath, Op, Program};
use crate::error::{AkibareError, Result};
use crate::helpers::{Args, HelperRef, HelperRegistry};
use crate::html_escape::escape;
use crate::output::Output;
use crate::resolve::{resolve, resolve_binding};
use crate::scope::{Binding, Scope};
use crate::value::Value;
use std::collections::HashMap;

/// Compiled partials available to `{{>name}}` during a render.
///
/// Lookup happens at render time, so partials may be registered in any
/// order and may reference each other.
#[derive(Debug, Clone, Default)]
pub struct PartialRegistry {
    map: HashMap<String, Program>,
}

impl PartialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled template under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, template: &crate::Template) {
        self.map.insert(name.into(), template.program().clone());
    }

    pub fn get(&self, name: &str) -> Option<&Program> {
        self.map.get(name)
    }
}

/// One render call's execution state.
pub(crate) struct Renderer<'a> {
    helpers: &'a HelperRegistry,
    partials: &'a PartialRegistry,
}

/// The bag handed to helpers: the block's compiled bodies plus a way to
/// render them. In value position both bodies are absent and render to
/// nothing.
pub struct Options<'a> {
    fn_program: Option<&'a Program>,
    inverse_program: Option<&'a Program>,
    renderer: &'a Renderer<'a>,
}

impl<'a> Options<'a> {
    /// Render the primary body against `context`.
    pub fn fn_with(&self, context: &Binding) -> Result<Output> {
        match self.fn_program {
            Some(program) => self.renderer.render_program(program, context),
            None => Ok(Output::new()),
        }
    }

    /// Render the `{{else}}` body against `context`.
    pub fn inverse_with(&self, context: &Binding) -> Result<Output> {
        match self.inverse_program {
            Some(program) => self.renderer.render_program(program, context),
            None => Ok(Output::new()),
        }
    }

    /// The same render state with no block bodies, for invoking a value in
    /// expansion position.
    pub fn without_blocks(&self) -> Options<'a> {
        Options {
            fn_program: None,
            inverse_program: None,
            renderer: self.renderer,
        }
    }
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(helpers: &'a HelperRegistry, partials: &'a PartialRegistry) -> Self {
        Self { helpers, partials }
    }

    pub(crate) fn render_program(&self, program: &Program, context: &Binding) -> Result<Output> {
        let mut out = Output::new();
        for op in &program.ops {
            self.render_op(op, context, &mut out)?;
        }
        Ok(out)
    }

    fn render_op(&self, op: &Op, context: &Binding, out: &mut Output) -> Result<()> {
        match op {
            Op::Literal(text) => {
                out.push_str(text);
                Ok(())
            }
            Op::Expand { path, args, escape } => self.render_expand(path, args, *escape, context, out),
            Op::Block {
                symbol,
                args,
                body,
                alt,
            } => self.render_block(symbol, args, body, alt.as_ref(), context, out),
            Op::InvertedBlock { symbol, body } => {
                let truthy = context.get(symbol).is_some_and(|b| b.is_truthy());
                if !truthy {
                    out.push_output(self.render_program(body, context)?);
                }
                Ok(())
            }
            Op::Partial { symbol, arg } => self.render_partial(symbol, arg.as_ref(), context, out),
        }
    }

    fn render_expand(
        &self,
        path: &CompiledPath,
        args: &CompiledArgs,
        escape_output: bool,
        context: &Binding,
        out: &mut Output,
    ) -> Result<()> {
        let args = self.eval_args(args, context)?;
        let value = match path {
            CompiledPath::Simple(name) => self.lookup_simple(name, &args, context)?,
            CompiledPath::Structural(segments) => {
                match resolve(context, segments) {
                    Some(Value::Helper(helper)) => self.invoke(&helper, context, &args)?,
                    other => other,
                }
            }
        };

        match value {
            None | Some(Value::Null) => {}
            // rendered fragments pass through untouched in both positions
            Some(Value::Rendered(fragment)) => out.push_output(fragment),
            Some(value) => {
                let text = value.render_string();
                if escape_output {
                    out.push_str(&escape(&text));
                } else {
                    out.push_str(&text);
                }
            }
        }
        Ok(())
    }

    /// Single-symbol lookup: the helper registry wins over the context;
    /// a miss with explicit arguments falls through to `helperMissing`.
    fn lookup_simple(
        &self,
        name: &str,
        args: &Args,
        context: &Binding,
    ) -> Result<Option<Value>> {
        if let Some(helper) = self.helpers.get(name) {
            let helper = HelperRef::clone(helper);
            return self.invoke(&helper, context, args);
        }
        match resolve(context, &[crate::ast::PathSeg::Named(name.to_string())]) {
            Some(Value::Helper(helper)) => self.invoke(&helper, context, args),
            Some(value) => Ok(Some(value)),
            None => {
                if args.is_empty() {
                    return Ok(None);
                }
                let mut missing_args = Args {
                    positional: Vec::with_capacity(args.positional.len() + 1),
                    named: args.named.clone(),
                };
                missing_args.positional.push(Value::from(name));
                missing_args.positional.extend(args.positional.iter().cloned());
                match self.helpers.get("helperMissing") {
                    Some(helper) => {
                        let helper = HelperRef::clone(helper);
                        self.invoke(&helper, context, &missing_args)
                    }
                    None => Err(AkibareError::MissingHelper {
                        name: name.to_string(),
                    }),
                }
            }
        }
    }

    /// Call a helper in value position: fresh scope over the current
    /// context, no block bodies.
    fn invoke(
        &self,
        helper: &HelperRef,
        context: &Binding,
        args: &Args,
    ) -> Result<Option<Value>> {
        let this = Binding::Scope(Scope::new(context.clone(), context.clone()));
        let options = Options {
            fn_program: None,
            inverse_program: None,
            renderer: self,
        };
        helper(&this, &options, args)
    }

    fn render_block(
        &self,
        symbol: &str,
        args: &CompiledArgs,
        body: &Program,
        alt: Option<&Program>,
        context: &Binding,
        out: &mut Output,
    ) -> Result<()> {
        let options = Options {
            fn_program: Some(body),
            inverse_program: alt,
            renderer: self,
        };

        let result = if let Some(helper) = self.helpers.get(symbol) {
            let helper = HelperRef::clone(helper);
            let args = self.eval_args(args, context)?;
            let this = Binding::Scope(Scope::new(context.clone(), context.clone()));
            helper(&this, &options, &args)?
        } else {
            // unknown symbol: treat it as a context value and dispatch to
            // blockHelperMissing
            let value = context.get(symbol).map(|b| b.to_value()).unwrap_or(Value::Null);
            match self.helpers.get("blockHelperMissing") {
                Some(helper) => {
                    let helper = HelperRef::clone(helper);
                    helper(context, &options, &Args::positional(vec![value]))?
                }
                None => {
                    return Err(AkibareError::MissingHelper {
                        name: symbol.to_string(),
                    })
                }
            }
        };

        match result {
            None => {}
            Some(Value::Rendered(fragment)) => out.push_output(fragment),
            Some(value) => out.push_str(&value.render_string()),
        }
        Ok(())
    }

    fn render_partial(
        &self,
        symbol: &str,
        arg: Option<&CompiledArg>,
        context: &Binding,
        out: &mut Output,
    ) -> Result<()> {
        let program = self
            .partials
            .get(symbol)
            .ok_or_else(|| AkibareError::MissingPartial {
                name: symbol.to_string(),
            })?;
        let inner = match arg {
            Some(arg) => Binding::Value(self.eval_arg(arg, context)?),
            None => context.clone(),
        };
        let scope = Scope::new(inner, context.clone());
        out.push_output(self.render_program(program, &Binding::Scope(scope))?);
        Ok(())
    }

    fn eval_args(&self, compiled: &CompiledArgs, context: &Binding) -> Result<Args> {
        let mut args = Args::default();
        for arg in &compiled.positional {
            args.positional.push(self.eval_arg(arg, context)?);
        }
        for (name, arg) in &compiled.named {
            args.named.push((name.clone(), self.eval_arg(arg, context)?));
        }
        Ok(args)
    }

    /// Path arguments that resolve to nothing become null; helpers see
    /// absent and null alike.
    fn eval_arg(&self, arg: &CompiledArg, context: &Binding) -> Result<Value> {
        match arg {
            CompiledArg::Literal(value) => Ok(value.clone()),
            CompiledArg::Path(segments) => Ok(resolve_binding(context, segments)
                .map(|b| b.to_value())
                .unwrap_or(Value::Null)),
        }
    }
}
