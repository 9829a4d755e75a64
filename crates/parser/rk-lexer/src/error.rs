//! Lexer errors

use rk_span::Span;
use thiserror::Error;

/// Errors produced while tokenizing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A byte sequence that starts no token
    #[error("unexpected character `{text}` at {span}")]
    UnexpectedCharacter {
        /// The offending text
        text: String,
        /// Location of the offending text
        span: Span,
    },

    /// A string or character literal with an unknown escape sequence
    #[error("invalid escape sequence `\\{escape}` at {span}")]
    InvalidEscape {
        /// The character following the backslash
        escape: char,
        /// Location of the literal
        span: Span,
    },
}

impl LexError {
    /// Location of the error
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedCharacter { span, .. } | Self::InvalidEscape { span, .. } => *span,
        }
    }
}
