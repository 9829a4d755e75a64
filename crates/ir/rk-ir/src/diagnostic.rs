//! Diagnostics attached to a compilation unit

use parking_lot::Mutex;
use rk_span::FileSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported but compilation continues
    Warning,
    /// Fails the compilation unit
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Malformed source or quoted fragment
    ParseError,
    /// Unregistered macro id or invalid configuration
    ConfigurationError,
    /// A name in a fragment resolved to nothing
    UnresolvedReference,
    /// A fragment does not fit its declared type
    TypeMismatch,
    /// An effect call inside an escaping closure
    UnsafeCaptureDetected,
    /// A macro rule skipped because its input was absent
    SkippedRule,
    /// Reported by a macro implementation
    MacroReport,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A diagnostic message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Producer
    pub kind: DiagnosticKind,
    /// Message
    pub message: String,
    /// Location
    pub span: FileSpan,
}

impl Diagnostic {
    /// Error diagnostic
    #[must_use]
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, span: FileSpan) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            span,
        }
    }

    /// Warning diagnostic
    #[must_use]
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, span: FileSpan) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            span,
        }
    }

    /// Whether this is an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.kind, self.span, self.message
        )
    }
}

/// Thread-safe diagnostic sink
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticBag {
    /// Creates an empty bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a diagnostic
    pub fn push(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }

    /// Appends several diagnostics
    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.lock().extend(diagnostics);
    }

    /// Number of diagnostics
    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.lock().len()
    }

    /// Whether nothing was reported
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.lock().is_empty()
    }

    /// Whether any error was reported
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.lock().iter().any(Diagnostic::is_error)
    }

    /// Copy of the current diagnostics
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Consumes the bag, returning diagnostics ordered by location
    #[must_use]
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics.into_inner();
        diagnostics.sort_by(|a, b| a.span.cmp(&b.span).then_with(|| a.message.cmp(&b.message)));
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_span::{FileId, Span};

    #[test]
    fn sorted_by_location() {
        let bag = DiagnosticBag::new();
        let at = |start| FileSpan::new(FileId(0), Span::new(start, start + 1));
        bag.push(Diagnostic::warning(DiagnosticKind::MacroReport, "late", at(40)));
        bag.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "early", at(3)));
        assert!(bag.has_errors());
        let messages: Vec<String> = bag.into_sorted().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["early", "late"]);
    }

    #[test]
    fn display_names_kind_and_location() {
        let diagnostic = Diagnostic::error(
            DiagnosticKind::UnsafeCaptureDetected,
            "boom",
            FileSpan::new(FileId(1), Span::new(2, 5)),
        );
        assert_eq!(
            diagnostic.to_string(),
            "error[UnsafeCaptureDetected] file#1:2..5: boom"
        );
    }
}
