//! Append-only output fragment sequence.
//!
//! Rendering accumulates text as a tree of fragments rather than a flat
//! string. Nested fragments mark content that has already been rendered
//! (and escaped where required), so an escaped expansion that receives one
//! appends it verbatim instead of escaping it a second time. The tree is
//! joined into a `String` exactly once, at the outermost render call.

/// A single chunk of accumulated output.
#[derive(Debug, Clone, PartialEq)]
enum Chunk {
    Text(String),
    Nested(Output),
}

/// An append-only, flattenable sequence of output fragments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    chunks: Vec<Chunk>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text fragment.
    pub fn push_str(&mut self, text: impl Into<String>) {
        self.chunks.push(Chunk::Text(text.into()));
    }

    /// Append an already-rendered fragment sequence.
    pub fn push_output(&mut self, nested: Output) {
        self.chunks.push(Chunk::Nested(nested));
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|c| match c {
            Chunk::Text(t) => t.is_empty(),
            Chunk::Nested(o) => o.is_empty(),
        })
    }

    /// Flatten the fragment tree into a single string.
    pub fn into_string(self) -> String {
        let mut result = String::new();
        self.flatten_into(&mut result);
        result
    }

    fn flatten_into(&self, result: &mut String) {
        for chunk in &self.chunks {
            match chunk {
                Chunk::Text(t) => result.push_str(t),
                Chunk::Nested(o) => o.flatten_into(result),
            }
        }
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        let mut out = Output::new();
        out.push_str(text);
        out
    }
}
