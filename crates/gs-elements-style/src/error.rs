//! Error types for the style cache.

/// Result type alias for style operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the style cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// CSS text failed validation.
    #[error("CSS parse error in '{id}' at line {line}, column {column}: {message}")]
    Parse {
        id: String,
        message: String,
        line: u32,
        column: u32,
    },
}

impl Error {
    /// Create a parse error.
    pub fn parse(id: impl Into<String>, message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::Parse {
            id: id.into(),
            message: message.into(),
            line,
            column,
        }
    }
}
