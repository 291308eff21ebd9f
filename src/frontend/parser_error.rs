use crate::frontend::token::FileLocation;

/// A structural or resolution error with the source location of the token
/// that triggered it.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub loc: FileLocation,
}

impl ParseError {
    pub fn new(message: impl Into<String>, loc: FileLocation) -> Self {
        ParseError {
            message: message.into(),
            loc,
        }
    }
}

impl std::fmt::Display for ParseError {
    /// Formats as `source:row:col: message`, 1-based row/column.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.loc, self.message)
    }
}

impl std::error::Error for ParseError {}
