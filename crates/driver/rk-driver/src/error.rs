//! Driver error types

use rk_ir::{Diagnostic, DiagnosticKind};
use rk_span::FileSpan;
use thiserror::Error;

/// Malformed driver configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The text is not valid TOML or does not match the schema
    #[error("invalid driver configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A generated declaration that cannot be attached to the tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The operation names a container the file does not declare
    #[error("no declaration `{path}` to attach generated members to")]
    MissingContainer {
        /// Dotted container path
        path: String,
    },

    /// Companion members aimed at the file level
    #[error("companion members need an enclosing class")]
    NotAClass,

    /// The annotated expression to replace is no longer in the tree
    #[error("no annotated expression left to replace")]
    MissingExpression,
}

impl MergeError {
    /// Converts the error into a diagnostic at the annotation that produced
    /// the operation
    #[must_use]
    pub fn to_diagnostic(&self, anchor: FileSpan) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::MacroReport, self.to_string(), anchor)
    }
}
