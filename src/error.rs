use thiserror::Error;

/// Source location for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// All errors that can occur in Akibare
#[derive(Error, Debug)]
pub enum AkibareError {
    #[error("Syntax error at {location}: {message}")]
    Syntax { message: String, location: Location },

    #[error("Failed to compile template: {cause}")]
    Compile {
        template: String,
        #[source]
        cause: Box<AkibareError>,
    },

    #[error("Failed to load template '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find helper or property '{name}'")]
    MissingHelper { name: String },

    #[error("Missing partial: {name}")]
    MissingPartial { name: String },

    #[error("Invalid operator: '{operator}'")]
    Config { operator: String },

    #[error("Type error: {message}")]
    TypeError { message: String },
}

/// Result type alias for Akibare operations
pub type Result<T> = std::result::Result<T, AkibareError>;

impl AkibareError {
    /// Wrap a parse failure together with the offending template source.
    pub fn into_compile_error(self, template: &str) -> Self {
        AkibareError::Compile {
            template: template.to_string(),
            cause: Box::new(self),
        }
    }
}
