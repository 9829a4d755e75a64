//! Quote resolution errors

use crate::FragmentRole;
use rk_ir::{Diagnostic, DiagnosticKind};
use rk_lexer::Classification;
use rk_parser::ParseError;
use rk_span::FileSpan;
use thiserror::Error;

/// Failure to bind a name or type inside a fragment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A name that is neither local, a member nor declared in the session
    #[error("unresolved reference `{name}`")]
    UnresolvedReference {
        /// Referenced name
        name: String,
        /// Location of the reference
        span: FileSpan,
    },

    /// An expression whose type does not conform to the expected one
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        /// Rendered expected type
        expected: String,
        /// Rendered inferred type
        found: String,
        /// Location of the expression
        span: FileSpan,
    },

    /// Arguments that do not fit any candidate, or a non-callable callee
    #[error("{message}")]
    InvalidCall {
        /// Description of the problem
        message: String,
        /// Location of the call
        span: FileSpan,
    },
}

impl BindError {
    /// Location of the error
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::UnresolvedReference { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::InvalidCall { span, .. } => *span,
        }
    }

    /// Converts the error into an error diagnostic
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let kind = match self {
            Self::UnresolvedReference { .. } => DiagnosticKind::UnresolvedReference,
            Self::TypeMismatch { .. } | Self::InvalidCall { .. } => DiagnosticKind::TypeMismatch,
        };
        Diagnostic::error(kind, self.to_string(), self.span())
    }
}

/// Failure to resolve a quoted fragment
#[derive(Error, Debug)]
pub enum QuoteError {
    /// The fragment does not parse as the kind its first token announces
    #[error("malformed quoted fragment, expected a {kind}: {error}")]
    Parse {
        /// Kind announced by the leading token
        kind: Classification,
        /// Offending fragment text
        fragment: String,
        /// Underlying parser error
        error: ParseError,
    },

    /// A declaration was requested but the fragment is an expression, or the
    /// other way around
    #[error("quoted fragment is {found:?} but was used as {expected:?}")]
    RoleMismatch {
        /// Role requested by the caller
        expected: FragmentRole,
        /// What the fragment classifies as
        found: Classification,
    },

    /// The fragment parsed but does not bind against the session
    #[error("quoted fragment does not resolve: {}", render(errors))]
    Bind {
        /// Every binding error, in source order
        errors: Vec<BindError>,
    },
}

impl QuoteError {
    /// Converts the error into diagnostics anchored at `anchor`
    #[must_use]
    pub fn to_diagnostics(&self, anchor: FileSpan) -> Vec<Diagnostic> {
        match self {
            Self::Parse { .. } | Self::RoleMismatch { .. } => vec![Diagnostic::error(
                DiagnosticKind::ParseError,
                self.to_string(),
                anchor,
            )],
            Self::Bind { errors } => errors
                .iter()
                .map(|error| {
                    let mut diagnostic = error.to_diagnostic();
                    if diagnostic.span.file.is_synthetic() {
                        diagnostic.span = anchor;
                    }
                    diagnostic
                })
                .collect(),
        }
    }
}

fn render(errors: &[BindError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
