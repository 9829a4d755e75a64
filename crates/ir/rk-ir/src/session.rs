//! The compilation session seen by the passes

use crate::{Diagnostic, DiagnosticBag, SymbolTable};
use rk_intern::Interner;

/// Shared, read-mostly state of one compilation unit.
///
/// Passes only query symbols and append diagnostics, so a session can be
/// borrowed by many workers at once.
pub trait Session: Sync {
    /// Interner owning every symbol of the unit
    fn interner(&self) -> &Interner;

    /// Declarations visible to the unit
    fn symbols(&self) -> &SymbolTable;

    /// Attaches a diagnostic to the unit
    fn report(&self, diagnostic: Diagnostic);
}

/// Session backed by a symbol table snapshot and a [`DiagnosticBag`]
#[derive(Debug)]
pub struct CompilationSession {
    interner: Interner,
    symbols: SymbolTable,
    diagnostics: DiagnosticBag,
}

impl CompilationSession {
    /// Creates a session over `symbols`
    #[must_use]
    pub fn new(interner: Interner, symbols: SymbolTable) -> Self {
        Self {
            interner,
            symbols,
            diagnostics: DiagnosticBag::new(),
        }
    }

    /// Diagnostics reported so far
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    /// Consumes the session, returning its diagnostics ordered by location
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_sorted()
    }
}

impl Session for CompilationSession {
    fn interner(&self) -> &Interner {
        &self.interner
    }

    fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
