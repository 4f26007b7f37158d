//! AST produced by the parser and consumed by the compiler.

/// Root node representing a parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAst {
    pub nodes: Vec<Node>,
}

/// All possible AST node types
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw text outside of mustaches
    Literal(String),
    /// `{{! ... }}`; kept in the tree, compiled to nothing
    Comment,
    /// `{{{path args}}}` or `{{&path args}}`; no escaping
    Expand { path: Path, args: Vec<Argument> },
    /// `{{path args}}`; HTML-escaped
    EscapedExpand { path: Path, args: Vec<Argument> },
    /// `{{#symbol args}} body [{{else}} alt] {{/symbol}}`
    Block {
        symbol: String,
        args: Vec<Argument>,
        body: TemplateAst,
        alt: Option<TemplateAst>,
    },
    /// `{{^symbol args}} body {{/symbol}}`
    InvertedBlock {
        symbol: String,
        args: Vec<Argument>,
        body: TemplateAst,
    },
    /// `{{>symbol args}}`
    Partial { symbol: String, args: Vec<Argument> },
}

/// A dotted/slashed reference such as `user.profile.name` or `../title`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: Vec<PathSeg>,
}

/// One path segment.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSeg {
    /// A symbol; the empty string refers to the current context (`.`, `this`)
    Named(String),
    /// `../`; resolved by the enclosing scope, one level up
    Parent,
}

/// A positional or keyword argument in a directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(ArgValue),
    Keyword(String, ArgValue),
}

/// The value side of an argument: a path resolved at render time, or a
/// literal fixed at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Path(Path),
    Str(String),
    Int(i64),
    Bool(bool),
}
