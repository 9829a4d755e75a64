//! What a macro sees while it expands

use rk_intern::Interner;
use rk_ir::{Annotation, Diagnostic, DiagnosticKind, Session, Severity};
use rk_span::FileSpan;
use serde::{Deserialize, Serialize};

/// What happens to a rule whose input is absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionMode {
    /// Skip the rule silently
    #[default]
    Lenient,
    /// Skip the rule and report a `SkippedRule` warning
    Strict,
}

/// Per-annotation expansion context
#[derive(Clone, Copy)]
pub struct MacroContext<'a> {
    session: &'a dyn Session,
    annotation: &'a Annotation,
    mode: ExpansionMode,
}

impl<'a> MacroContext<'a> {
    /// Context for expanding `annotation`
    #[must_use]
    pub fn new(session: &'a dyn Session, annotation: &'a Annotation, mode: ExpansionMode) -> Self {
        Self {
            session,
            annotation,
            mode,
        }
    }

    /// The compilation session
    #[must_use]
    pub fn session(&self) -> &'a dyn Session {
        self.session
    }

    /// The session's interner
    #[must_use]
    pub fn interner(&self) -> &'a Interner {
        self.session.interner()
    }

    /// The annotation being expanded
    #[must_use]
    pub fn annotation(&self) -> &'a Annotation {
        self.annotation
    }

    /// How absent rule inputs are handled
    #[must_use]
    pub fn mode(&self) -> ExpansionMode {
        self.mode
    }

    /// Location diagnostics default to
    #[must_use]
    pub fn span(&self) -> FileSpan {
        self.annotation.span
    }

    /// Reports a macro-authored diagnostic at the annotation
    pub fn report(&self, severity: Severity, message: impl Into<String>) {
        self.report_at(severity, message, self.span());
    }

    /// Reports a macro-authored diagnostic at `span`
    pub fn report_at(&self, severity: Severity, message: impl Into<String>, span: FileSpan) {
        let diagnostic = match severity {
            Severity::Warning => Diagnostic::warning(DiagnosticKind::MacroReport, message, span),
            Severity::Error => Diagnostic::error(DiagnosticKind::MacroReport, message, span),
        };
        self.session.report(diagnostic);
    }
}
