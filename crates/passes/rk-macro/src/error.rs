//! Macro expansion error types

use rk_ir::{Diagnostic, DiagnosticKind};
use rk_lexer::DeclarationKind;
use rk_quote::QuoteError;
use rk_span::FileSpan;
use thiserror::Error;

/// Failure of one macro expansion
#[derive(Error, Debug)]
pub enum MacroError {
    /// A quoted fragment did not parse or bind
    #[error(transparent)]
    Quote(#[from] QuoteError),

    /// A fragment classified as a different declaration kind than the rule
    /// asked for
    #[error("expected a {expected} fragment, found a {found}")]
    UnexpectedFragment {
        /// Kind the rule asked for
        expected: DeclarationKind,
        /// Kind the fragment declares
        found: DeclarationKind,
    },

    /// The macro was applied to a declaration it cannot expand
    #[error("`@{id}` {reason}")]
    UnsupportedTarget {
        /// Macro id
        id: &'static str,
        /// Why the target does not fit
        reason: String,
    },
}

impl MacroError {
    /// Converts the error into diagnostics anchored at the annotation
    #[must_use]
    pub fn to_diagnostics(&self, anchor: FileSpan) -> Vec<Diagnostic> {
        match self {
            Self::Quote(error) => error.to_diagnostics(anchor),
            Self::UnexpectedFragment { .. } => vec![Diagnostic::error(
                DiagnosticKind::ParseError,
                self.to_string(),
                anchor,
            )],
            Self::UnsupportedTarget { .. } => vec![Diagnostic::error(
                DiagnosticKind::MacroReport,
                self.to_string(),
                anchor,
            )],
        }
    }
}

/// Registry misconfiguration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A meta annotation without an implementation
    #[error("no macro implementation registered for `@{id}`")]
    UnregisteredMacro {
        /// Annotation name
        id: String,
    },

    /// Two implementations claim the same id
    #[error("macro `@{id}` is registered twice")]
    DuplicateMacro {
        /// Annotation name
        id: String,
    },
}

impl ConfigurationError {
    /// Converts the error into a diagnostic at `span`
    #[must_use]
    pub fn to_diagnostic(&self, span: FileSpan) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::ConfigurationError, self.to_string(), span)
    }
}
