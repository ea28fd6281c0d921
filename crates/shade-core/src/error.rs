/// Core error types for the shade compiler.
use crate::position::Position;

/// A specialized Result type for shade operations.
pub type ShadeResult<T> = Result<T, ShadeError>;

/// Top-level error type for every stage of the pipeline.
///
/// All variants are fatal for the compilation that raised them; nothing in
/// the pipeline collects diagnostics or resumes after an error.
#[derive(Debug, thiserror::Error)]
pub enum ShadeError {
    #[error("lex error: {message} at {path}:{line}:{column} (in `{span}`)")]
    Lex {
        message: String,
        path: String,
        line: usize,
        column: usize,
        span: String,
    },

    #[error("parse error: {message} at {path}:{line}:{column}")]
    Parse {
        message: String,
        path: String,
        line: usize,
        column: usize,
    },

    #[error("lowering error: {0}")]
    Lowering(String),

    #[error("include error: {message} ({path})")]
    Include { message: String, path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("compilation cancelled")]
    Cancelled,
}

impl ShadeError {
    /// Create a lex error at the given position, quoting the offending text.
    pub fn lex(
        message: impl Into<String>,
        path: impl Into<String>,
        position: Position,
        span: impl Into<String>,
    ) -> Self {
        ShadeError::Lex {
            message: message.into(),
            path: path.into(),
            line: position.line,
            column: position.column,
            span: span.into(),
        }
    }

    /// Create a parse error with source location.
    pub fn parse(message: impl Into<String>, path: impl Into<String>, position: Position) -> Self {
        ShadeError::Parse {
            message: message.into(),
            path: path.into(),
            line: position.line,
            column: position.column,
        }
    }

    /// Create a lowering error.
    pub fn lowering(message: impl Into<String>) -> Self {
        ShadeError::Lowering(message.into())
    }

    /// Create an include error for a path that could not be opened or resolved.
    pub fn include(message: impl Into<String>, path: impl Into<String>) -> Self {
        ShadeError::Include {
            message: message.into(),
            path: path.into(),
        }
    }

    /// The source position carried by lex and parse errors.
    pub fn position(&self) -> Option<Position> {
        match self {
            ShadeError::Lex { line, column, .. } | ShadeError::Parse { line, column, .. } => {
                Some(Position::new(*line, *column))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ShadeError::parse("unexpected token", "sprite.shade", Position::new(10, 5));
        assert_eq!(
            err.to_string(),
            "parse error: unexpected token at sprite.shade:10:5"
        );
    }

    #[test]
    fn test_lex_error_display_quotes_span() {
        let err = ShadeError::lex("unknown token '$'", "a.shade", Position::new(2, 7), "$x");
        assert_eq!(
            err.to_string(),
            "lex error: unknown token '$' at a.shade:2:7 (in `$x`)"
        );
        assert_eq!(err.position(), Some(Position::new(2, 7)));
    }

    #[test]
    fn test_lowering_error_has_no_position() {
        let err = ShadeError::lowering("unmapped primitive");
        assert!(err.to_string().contains("unmapped primitive"));
        assert_eq!(err.position(), None);
    }
}
