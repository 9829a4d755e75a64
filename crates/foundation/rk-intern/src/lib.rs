//! String interning for symbols

pub use lasso::Spur as Symbol;
use lasso::ThreadedRodeo;
use std::fmt;
use std::sync::Arc;

/// Thread-safe string interner.
///
/// Cloning is cheap and every clone shares the same table, so one interner
/// can be handed to every worker of a compilation.
#[derive(Clone)]
pub struct Interner {
    inner: Arc<ThreadedRodeo>,
}

impl Interner {
    /// Creates an empty interner
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ThreadedRodeo::new()),
        }
    }

    /// Interns `s`, returning the existing symbol if it was seen before
    pub fn intern(&self, s: &str) -> Symbol {
        self.inner.get_or_intern(s)
    }

    /// Looks up `s` without interning it
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.inner.get(s)
    }

    /// Resolves a symbol to its text
    #[must_use]
    pub fn resolve(&self, sym: &Symbol) -> &str {
        self.inner.resolve(sym)
    }

    /// Resolves a symbol that may come from another interner
    #[must_use]
    pub fn try_resolve(&self, sym: &Symbol) -> Option<&str> {
        self.inner.try_resolve(sym)
    }

    /// Number of interned strings
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing has been interned yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_table() {
        let interner = Interner::new();
        let other = interner.clone();
        let sym = interner.intern("product");
        assert_eq!(other.get("product"), Some(sym));
        assert_eq!(other.resolve(&sym), "product");
    }

    #[test]
    fn interning_is_idempotent() {
        let interner = Interner::new();
        let first = interner.intern("create");
        let second = interner.intern("create");
        assert_eq!(first, second);
        assert_eq!(interner.len(), 1);
    }
}
