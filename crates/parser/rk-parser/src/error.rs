//! Rich error reporting for the parser
//!
//! Fields are read by miette's `#[derive(Diagnostic)]` expansion.

#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use rk_lexer::{DeclarationKind, LexError};
use rk_span::Span;
use thiserror::Error;

/// Parse error with rich diagnostic information
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum ParseError {
    /// The lexer rejected the input
    #[error("{error}")]
    #[diagnostic(code(parser::lex_error))]
    Lex {
        /// Underlying lexer error
        error: LexError,
        /// Source location
        #[label("not valid here")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: NamedSource<String>,
    },

    /// A token other than the expected one
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(parser::unexpected_token))]
    UnexpectedToken {
        /// What was expected
        expected: String,
        /// What was found
        found: String,
        /// Source location
        #[label("expected {expected} here")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: NamedSource<String>,
    },

    /// Construct outside the supported subset
    #[error("invalid {construct}")]
    #[diagnostic(code(parser::invalid_syntax))]
    InvalidSyntax {
        /// Kind of construct
        construct: String,
        /// How to fix it
        #[help]
        suggestion: Option<String>,
        /// Source location
        #[label("{construct} is invalid")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: NamedSource<String>,
    },

    /// A fragment parsed as a different declaration kind than requested
    #[error("expected a {expected} declaration, found a {found} declaration")]
    #[diagnostic(code(parser::kind_mismatch))]
    KindMismatch {
        /// Requested kind
        expected: DeclarationKind,
        /// Parsed kind
        found: DeclarationKind,
        /// Source location
        #[label("this is a {found}")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: NamedSource<String>,
    },
}

impl ParseError {
    /// Byte range the error points at
    #[must_use]
    pub fn span(&self) -> Span {
        let span = match self {
            Self::Lex { span, .. }
            | Self::UnexpectedToken { span, .. }
            | Self::InvalidSyntax { span, .. }
            | Self::KindMismatch { span, .. } => span,
        };
        Span::from_range(span.offset()..span.offset() + span.len())
    }

    /// Source text the error was reported against
    #[must_use]
    pub fn source_text(&self) -> &str {
        match self {
            Self::Lex { src, .. }
            | Self::UnexpectedToken { src, .. }
            | Self::InvalidSyntax { src, .. }
            | Self::KindMismatch { src, .. } => src.inner(),
        }
    }
}

pub(crate) fn source_span(span: Span) -> SourceSpan {
    SourceSpan::from(span.range())
}
