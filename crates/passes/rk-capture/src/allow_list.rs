//! Calls known to run their lambda arguments before returning

use rustc_hash::FxHashSet;

/// Standard library functions that invoke their lambda eagerly
const DEFAULT_EAGER_CALLS: &[&str] = &[
    "map", "forEach", "filter", "flatMap", "fold", "any", "all", "count", "let", "also",
    "apply", "run", "with", "repeat", "takeIf",
];

/// Names of calls whose lambda arguments never escape.
///
/// Built-in names only vouch for the standard library functions they
/// describe; a user declaration with the same name is trusted only when it
/// is listed explicitly through [`extend`](Self::extend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagerCallAllowList {
    names: FxHashSet<String>,
    configured: FxHashSet<String>,
}

impl EagerCallAllowList {
    /// An empty list
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: FxHashSet::default(),
            configured: FxHashSet::default(),
        }
    }

    /// Adds names
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.configured.insert(name.clone());
            self.names.insert(name);
        }
    }

    /// Whether calls to `name` are eager
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether a call to `name` is eager, given whether the callee is
    /// declared in user code rather than the standard library
    #[must_use]
    pub fn covers(&self, name: &str, user_declared: bool) -> bool {
        if user_declared {
            self.configured.contains(name)
        } else {
            self.names.contains(name)
        }
    }

    /// Number of names
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for EagerCallAllowList {
    fn default() -> Self {
        Self {
            names: DEFAULT_EAGER_CALLS.iter().map(|name| (*name).to_string()).collect(),
            configured: FxHashSet::default(),
        }
    }
}
