//! AST-to-program compilation.
//!
//! The compiler walks the AST once and emits a tree of render operations;
//! nested block bodies become owned sub-programs. Compilation never fails
//! on a well-formed AST; malformed shapes are rejected by the parser.

use crate::ast::{ArgValue, Argument, Node, Path, PathSeg, TemplateAst};
use crate::value::Value;

/// The compiled, executable counterpart of a parsed template.
///
/// Immutable after compilation and safe to share across concurrent,
/// independent render calls.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) ops: Vec<Op>,
}

/// One render step.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    /// Append literal text verbatim
    Literal(String),
    /// Look up a path (and maybe invoke it) and append the result
    Expand {
        path: CompiledPath,
        args: CompiledArgs,
        escape: bool,
    },
    /// Dispatch a block helper with compiled primary/alternate bodies
    Block {
        symbol: String,
        args: CompiledArgs,
        body: Program,
        alt: Option<Program>,
    },
    /// Render the body only when the symbol resolves falsy/absent
    InvertedBlock { symbol: String, body: Program },
    /// Invoke a partial from the registry against a child scope
    Partial {
        symbol: String,
        arg: Option<CompiledArg>,
    },
}

/// How an expansion path is looked up at render time.
///
/// Only a bare single-symbol reference can shadow a helper; self references
/// and multi-segment paths resolve structurally and bypass the registry.
#[derive(Debug, Clone)]
pub(crate) enum CompiledPath {
    Simple(String),
    Structural(Vec<PathSeg>),
}

/// A compiled argument: a path resolved against the context at render
/// time, or a literal fixed at compile time.
#[derive(Debug, Clone)]
pub(crate) enum CompiledArg {
    Path(Vec<PathSeg>),
    Literal(Value),
}

/// Compiled argument list, positional and keyword, in source order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledArgs {
    pub(crate) positional: Vec<CompiledArg>,
    pub(crate) named: Vec<(String, CompiledArg)>,
}

/// Compile a parsed template into an executable program.
pub fn compile(ast: &TemplateAst) -> Program {
    let ops = ast
        .nodes
        .iter()
        .filter_map(compile_node)
        .collect();
    Program { ops }
}

fn compile_node(node: &Node) -> Option<Op> {
    match node {
        Node::Literal(text) => Some(Op::Literal(text.clone())),
        Node::Comment => None,
        Node::Expand { path, args } => Some(Op::Expand {
            path: compile_path(path),
            args: compile_args(args),
            escape: false,
        }),
        Node::EscapedExpand { path, args } => Some(Op::Expand {
            path: compile_path(path),
            args: compile_args(args),
            escape: true,
        }),
        Node::Block {
            symbol,
            args,
            body,
            alt,
        } => Some(Op::Block {
            symbol: symbol.clone(),
            args: compile_args(args),
            body: compile(body),
            alt: alt.as_ref().map(compile),
        }),
        // inverted blocks take no arguments at render time
        Node::InvertedBlock { symbol, body, .. } => Some(Op::InvertedBlock {
            symbol: symbol.clone(),
            body: compile(body),
        }),
        Node::Partial { symbol, args } => Some(Op::Partial {
            symbol: symbol.clone(),
            arg: args.iter().find_map(|arg| match arg {
                Argument::Positional(value) => Some(compile_arg_value(value)),
                Argument::Keyword(..) => None,
            }),
        }),
    }
}

/// `this` normalizes to the self segment; a single non-empty segment is a
/// helper-eligible simple path, everything else resolves structurally.
fn compile_path(path: &Path) -> CompiledPath {
    let segments: Vec<PathSeg> = path
        .segments
        .iter()
        .map(|seg| match seg {
            PathSeg::Named(s) if s == "this" => PathSeg::Named(String::new()),
            other => other.clone(),
        })
        .collect();

    match segments.as_slice() {
        [PathSeg::Named(name)] if !name.is_empty() => CompiledPath::Simple(name.clone()),
        _ => CompiledPath::Structural(segments),
    }
}

fn compile_args(args: &[Argument]) -> CompiledArgs {
    let mut compiled = CompiledArgs::default();
    for arg in args {
        match arg {
            Argument::Positional(value) => {
                compiled.positional.push(compile_arg_value(value));
            }
            Argument::Keyword(name, value) => {
                compiled.named.push((name.clone(), compile_arg_value(value)));
            }
        }
    }
    compiled
}

fn compile_arg_value(value: &ArgValue) -> CompiledArg {
    match value {
        ArgValue::Path(path) => {
            let segments = path
                .segments
                .iter()
                .map(|seg| match seg {
                    PathSeg::Named(s) if s == "this" => PathSeg::Named(String::new()),
                    other => other.clone(),
                })
                .collect();
            CompiledArg::Path(segments)
        }
        ArgValue::Str(s) => CompiledArg::Literal(Value::Str(s.clone())),
        ArgValue::Int(n) => CompiledArg::Literal(Value::Int(*n)),
        ArgValue::Bool(b) => CompiledArg::Literal(Value::Bool(*b)),
    }
}
