use crate::ast::{ArgValue, Argument, Node, Path, PathSeg, TemplateAst};
use crate::error::{AkibareError, Location, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Recursive descent parser for Handlebars-style templates.
///
/// Operates directly on the source characters (the grammar is PEG-shaped,
/// with no separate token stream) and tracks line/column for errors.
pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Parser {
    /// Create a new parser for the given source
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Parse the source into an AST
    pub fn parse(&mut self) -> Result<TemplateAst> {
        let template = self.parse_template()?;
        if !self.eof() {
            // parse_template only stops early at a close tag or an
            // else/inverse separator; neither belongs at the top level
            return Err(self.error_here("Unexpected closing or else tag"));
        }
        Ok(template)
    }

    fn parse_template(&mut self) -> Result<TemplateAst> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.match_str(OPEN) {
                if self.at_close_tag() || self.at_alt_tag() {
                    break;
                }
                nodes.push(self.parse_directive()?);
            } else {
                nodes.push(self.parse_text());
            }
        }
        Ok(TemplateAst { nodes })
    }

    fn parse_text(&mut self) -> Node {
        let mut text = String::new();
        while !self.eof() && !self.match_str(OPEN) {
            text.push(self.advance());
        }
        Node::Literal(text)
    }

    fn parse_directive(&mut self) -> Result<Node> {
        let start = self.location();
        self.advance(); // {
        self.advance(); // {

        match self.current_char() {
            Some('!') => self.parse_comment(start),
            Some('{') => {
                self.advance();
                let (path, args) = self.parse_expression_inner(start)?;
                if !self.consume_str("}") {
                    return Err(self.error_at(start, "Expected '}}}' to close raw expression"));
                }
                Ok(Node::Expand { path, args })
            }
            Some('&') => {
                self.advance();
                let (path, args) = self.parse_expression_inner(start)?;
                Ok(Node::Expand { path, args })
            }
            Some('>') => {
                self.advance();
                let (symbol, args) = self.parse_block_inner(start)?;
                Ok(Node::Partial { symbol, args })
            }
            Some('#') => {
                self.advance();
                self.parse_block(start)
            }
            Some('^') => {
                self.advance();
                self.parse_inverted_block(start)
            }
            _ => {
                let (path, args) = self.parse_expression_inner(start)?;
                Ok(Node::EscapedExpand { path, args })
            }
        }
    }

    fn parse_comment(&mut self, start: Location) -> Result<Node> {
        self.advance(); // !
        while !self.eof() && !self.match_str(CLOSE) {
            self.advance();
        }
        if self.eof() {
            return Err(self.error_at(start, "Unclosed comment"));
        }
        self.advance(); // }
        self.advance(); // }
        Ok(Node::Comment)
    }

    /// `<spaces> <path> <arguments> <spaces> "}}"`
    fn parse_expression_inner(&mut self, start: Location) -> Result<(Path, Vec<Argument>)> {
        self.skip_spaces();
        let path = self.parse_path()?;
        let args = self.parse_arguments()?;
        self.skip_spaces();
        if !self.consume_str(CLOSE) {
            return Err(self.error_at(start, "Unterminated expression"));
        }
        Ok((path, args))
    }

    /// `<spaces> <symbol> <arguments> <spaces> "}}"`
    fn parse_block_inner(&mut self, start: Location) -> Result<(String, Vec<Argument>)> {
        self.skip_spaces();
        let symbol = self.parse_symbol()?;
        let args = self.parse_arguments()?;
        self.skip_spaces();
        if !self.consume_str(CLOSE) {
            return Err(self.error_at(start, "Unterminated tag"));
        }
        Ok((symbol, args))
    }

    fn parse_block(&mut self, start: Location) -> Result<Node> {
        let (symbol, args) = self.parse_block_inner(start)?;
        let body = self.parse_template()?;
        let alt = if self.at_alt_tag() {
            self.consume_alt_tag()?;
            Some(self.parse_template()?)
        } else {
            None
        };
        self.consume_close_tag(&symbol)?;
        Ok(Node::Block {
            symbol,
            args,
            body,
            alt,
        })
    }

    fn parse_inverted_block(&mut self, start: Location) -> Result<Node> {
        let (symbol, args) = self.parse_block_inner(start)?;
        let body = self.parse_template()?;
        self.consume_close_tag(&symbol)?;
        Ok(Node::InvertedBlock { symbol, args, body })
    }

    /// `{{/symbol}}`; no interior whitespace, symbol must match the opener.
    fn consume_close_tag(&mut self, expected: &str) -> Result<()> {
        let start = self.location();
        if !self.consume_str(OPEN) || !self.consume_str("/") {
            return Err(self.error_at(start, format!("Expected closing tag {{{{/{}}}}}", expected)));
        }
        let found = self.parse_symbol()?;
        if found != expected {
            return Err(self.error_at(
                start,
                format!("Mismatched closing tag: expected '{}', found '{}'", expected, found),
            ));
        }
        if !self.consume_str(CLOSE) {
            return Err(self.error_at(start, "Unterminated closing tag"));
        }
        Ok(())
    }

    /// True at `{{/`.
    fn at_close_tag(&self) -> bool {
        self.match_str_at(self.pos, OPEN) && self.chars.get(self.pos + 2) == Some(&'/')
    }

    /// True at `{{^}}` or `{{else}}` (spaces allowed inside the mustaches).
    fn at_alt_tag(&self) -> bool {
        if !self.match_str_at(self.pos, OPEN) {
            return false;
        }
        let mut i = self.pos + 2;
        while matches!(self.chars.get(i), Some(c) if Self::is_space(*c)) {
            i += 1;
        }
        if self.chars.get(i) == Some(&'^') {
            i += 1;
        } else if self.match_str_at(i, "else") {
            i += 4;
        } else {
            return false;
        }
        while matches!(self.chars.get(i), Some(c) if Self::is_space(*c)) {
            i += 1;
        }
        self.match_str_at(i, CLOSE)
    }

    fn consume_alt_tag(&mut self) -> Result<()> {
        let start = self.location();
        self.advance(); // {
        self.advance(); // {
        self.skip_spaces();
        if self.current_char() == Some('^') {
            self.advance();
        } else if !self.consume_str("else") {
            return Err(self.error_at(start, "Expected else tag"));
        }
        self.skip_spaces();
        if !self.consume_str(CLOSE) {
            return Err(self.error_at(start, "Unterminated else tag"));
        }
        Ok(())
    }

    /// `~('/') pathseg+`; segments separated by `.` or `/`, with `../`
    /// producing a parent marker and a bare `.` the current context.
    fn parse_path(&mut self) -> Result<Path> {
        if self.current_char() == Some('/') {
            return Err(self.error_here("Path cannot start with '/'"));
        }
        let mut segments = Vec::new();
        while let Some(seg) = self.parse_pathseg()? {
            segments.push(seg);
        }
        if segments.is_empty() {
            return Err(self.error_here("Expected a path"));
        }
        Ok(Path { segments })
    }

    fn parse_pathseg(&mut self) -> Result<Option<PathSeg>> {
        if self.at_symbol_start() {
            return Ok(Some(PathSeg::Named(self.parse_symbol()?)));
        }
        match self.current_char() {
            Some('/') => {
                self.advance();
                Ok(Some(PathSeg::Named(String::new())))
            }
            Some('.') => {
                if self.match_str("../") {
                    self.advance();
                    self.advance();
                    self.advance();
                    Ok(Some(PathSeg::Parent))
                } else {
                    self.advance();
                    Ok(Some(PathSeg::Named(String::new())))
                }
            }
            _ => Ok(None),
        }
    }

    /// `'['? (letterOrDigit | '-' | '@')+ ']'?`
    ///
    /// Fails where an else/inverse separator could start instead, so that
    /// `{{else}}` is never read as an expression path.
    fn parse_symbol(&mut self) -> Result<String> {
        if self.at_alt_inner() {
            return Err(self.error_here("Expected a symbol"));
        }
        if self.current_char() == Some('[') {
            self.advance();
        }
        let mut symbol = String::new();
        while let Some(c) = self.current_char() {
            if Self::is_symbol_char(c) {
                symbol.push(self.advance());
            } else {
                break;
            }
        }
        if symbol.is_empty() {
            return Err(self.error_here("Expected a symbol"));
        }
        if self.current_char() == Some(']') {
            self.advance();
        }
        Ok(symbol)
    }

    fn at_symbol_start(&self) -> bool {
        if self.at_alt_inner() {
            return false;
        }
        match self.current_char() {
            Some('[') => true,
            Some(c) => Self::is_symbol_char(c),
            None => false,
        }
    }

    /// True where the remaining input reads `<spaces> ('^'|'else') <spaces> "}}"`.
    fn at_alt_inner(&self) -> bool {
        let mut i = self.pos;
        while matches!(self.chars.get(i), Some(c) if Self::is_space(*c)) {
            i += 1;
        }
        if self.chars.get(i) == Some(&'^') {
            i += 1;
        } else if self.match_str_at(i, "else") {
            i += 4;
        } else {
            return false;
        }
        while matches!(self.chars.get(i), Some(c) if Self::is_space(*c)) {
            i += 1;
        }
        self.match_str_at(i, CLOSE)
    }

    /// `(space+ (kwliteral | literal | path))*`
    fn parse_arguments(&mut self) -> Result<Vec<Argument>> {
        let mut args = Vec::new();
        loop {
            let saved = self.save();
            if !self.skip_spaces() {
                break;
            }
            match self.parse_argument()? {
                Some(arg) => args.push(arg),
                None => {
                    self.restore(saved);
                    break;
                }
            }
        }
        Ok(args)
    }

    fn parse_argument(&mut self) -> Result<Option<Argument>> {
        // keyword argument: symbol '=' (literal | path)
        if self.at_symbol_start() {
            let saved = self.save();
            let symbol = self.parse_symbol()?;
            if self.current_char() == Some('=') {
                self.advance();
                let value = match self.parse_literal()? {
                    Some(lit) => lit,
                    None => ArgValue::Path(self.parse_path()?),
                };
                return Ok(Some(Argument::Keyword(symbol, value)));
            }
            self.restore(saved);
        }
        if let Some(lit) = self.parse_literal()? {
            return Ok(Some(Argument::Positional(lit)));
        }
        if self.at_symbol_start() || matches!(self.current_char(), Some('.')) {
            return Ok(Some(Argument::Positional(ArgValue::Path(
                self.parse_path()?,
            ))));
        }
        Ok(None)
    }

    /// `string | integer | boolean`; digit runs and the words true/false
    /// only count as literals when not followed by more symbol characters.
    fn parse_literal(&mut self) -> Result<Option<ArgValue>> {
        match self.current_char() {
            Some('"') => Ok(Some(self.parse_string_literal()?)),
            Some(c) if c.is_ascii_digit() => {
                let saved = self.save();
                let mut digits = String::new();
                while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                    digits.push(self.advance());
                }
                if matches!(self.current_char(), Some(c) if Self::is_symbol_char(c)) {
                    self.restore(saved);
                    return Ok(None);
                }
                let n = digits.parse::<i64>().map_err(|_| {
                    self.error_here(format!("Integer literal out of range: {}", digits))
                })?;
                Ok(Some(ArgValue::Int(n)))
            }
            Some('t' | 'f') => {
                let saved = self.save();
                let word = if self.consume_str("true") {
                    Some(true)
                } else if self.consume_str("false") {
                    Some(false)
                } else {
                    None
                };
                match word {
                    Some(b)
                        if !matches!(self.current_char(), Some(c) if Self::is_symbol_char(c)) =>
                    {
                        Ok(Some(ArgValue::Bool(b)))
                    }
                    _ => {
                        self.restore(saved);
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    fn parse_string_literal(&mut self) -> Result<ArgValue> {
        let start = self.location();
        self.advance(); // "
        let mut value = String::new();
        loop {
            match self.current_char() {
                Some('"') => {
                    self.advance();
                    return Ok(ArgValue::Str(value));
                }
                Some('\\') if self.peek_char() == Some('"') => {
                    self.advance();
                    value.push(self.advance());
                }
                Some(_) => value.push(self.advance()),
                None => return Err(self.error_at(start, "Unterminated string literal")),
            }
        }
    }

    // -- cursor helpers -------------------------------------------------

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn current_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_str(&self, s: &str) -> bool {
        self.match_str_at(self.pos, s)
    }

    fn match_str_at(&self, pos: usize, s: &str) -> bool {
        let remaining = &self.chars[pos.min(self.chars.len())..];
        if remaining.len() < s.chars().count() {
            return false;
        }
        s.chars().zip(remaining.iter()).all(|(a, b)| a == *b)
    }

    fn consume_str(&mut self, s: &str) -> bool {
        if self.match_str(s) {
            for _ in s.chars() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    /// Skip whitespace; true if at least one character was skipped.
    fn skip_spaces(&mut self) -> bool {
        let mut skipped = false;
        while matches!(self.current_char(), Some(c) if Self::is_space(c)) {
            self.advance();
            skipped = true;
        }
        skipped
    }

    fn save(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.column)
    }

    fn restore(&mut self, saved: (usize, usize, usize)) {
        self.pos = saved.0;
        self.line = saved.1;
        self.column = saved.2;
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn error_here(&self, message: impl Into<String>) -> AkibareError {
        self.error_at(self.location(), message)
    }

    fn error_at(&self, location: Location, message: impl Into<String>) -> AkibareError {
        AkibareError::Syntax {
            message: message.into(),
            location,
        }
    }

    fn is_space(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\n')
    }

    fn is_symbol_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '-' || c == '@' || c == '_'
    }
}

/// Parse a template source into an AST.
pub fn parse(source: &str) -> Result<TemplateAst> {
    Parser::new(source).parse()
}
