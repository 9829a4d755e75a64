//! Capture-safety checking
//!
//! Functions annotated `@DisallowLambdaCapture` perform effects that are only
//! valid while their receiver is in scope, such as raising through a
//! `context(Raise<E>)` receiver. Calling one from a closure that may outlive
//! the call site is reported as
//! [`UnsafeCaptureDetected`](rk_ir::DiagnosticKind::UnsafeCaptureDetected).
//!
//! A closure is safe when it runs before its call site returns: it is passed
//! to a call in the [`EagerCallAllowList`], to an `inline` function, to a
//! parameter annotated `@CallsInPlace`, or invoked in place. Every other
//! closure escapes, and so does every closure nested in an escaping one.
//!
//! # Example
//!
//! ```rust,ignore
//! let checker = CaptureChecker::new(CaptureConfig::default());
//! let report = checker.check_function(&session, &DeclPath::root(), function);
//! for diagnostic in report.diagnostics {
//!     session.report(diagnostic);
//! }
//! ```

mod allow_list;
mod checker;
mod state;

pub use allow_list::EagerCallAllowList;
pub use state::{CaptureSite, ClosureState};

use checker::ClosureWalker;
use rk_ir::{DeclPath, Diagnostic, FunctionDecl, Session, Severity};
use rk_quote::QuoteScope;
use serde::{Deserialize, Serialize};

/// Checker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Severity of [`rk_ir::DiagnosticKind::UnsafeCaptureDetected`]
    pub severity: Severity,
    /// Calls appended to the built-in eager allow-list
    pub eager_calls: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            severity: Severity::Error,
            eager_calls: Vec::new(),
        }
    }
}

/// Outcome of checking one function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Every closure literal of the body, in walk order
    pub sites: Vec<CaptureSite>,
    /// One diagnostic per effect call made from an escaping closure
    pub diagnostics: Vec<Diagnostic>,
}

impl CaptureReport {
    /// Whether no closure ended [`ClosureState::EscapingUnsafe`]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.sites
            .iter()
            .all(|site| site.state != ClosureState::EscapingUnsafe)
    }
}

/// Capture checker, shareable across threads
#[derive(Debug, Clone)]
pub struct CaptureChecker {
    config: CaptureConfig,
    allow_list: EagerCallAllowList,
}

impl CaptureChecker {
    /// Creates a checker; configured eager calls extend the defaults
    #[must_use]
    pub fn new(config: CaptureConfig) -> Self {
        let mut allow_list = EagerCallAllowList::default();
        allow_list.extend(config.eager_calls.iter().cloned());
        Self { config, allow_list }
    }

    /// The eager calls in effect
    #[must_use]
    pub fn allow_list(&self) -> &EagerCallAllowList {
        &self.allow_list
    }

    /// Checks a function declared in `container`.
    ///
    /// Callees are resolved with lenient inference, so a body with unrelated
    /// type errors is still checked; calls that do not resolve are never
    /// effect calls.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn check_function(
        &self,
        session: &dyn Session,
        container: &DeclPath,
        function: &FunctionDecl,
    ) -> CaptureReport {
        let Some(body) = &function.body else {
            return CaptureReport::default();
        };
        let scope = match container.segments.last() {
            Some(&owner) => QuoteScope::in_class(owner),
            None => QuoteScope::top_level(),
        };
        let inference = rk_quote::infer_function(session, &scope, function);
        if !inference.errors.is_empty() {
            tracing::trace!(errors = inference.errors.len(), "checking a body with binding errors");
        }

        let mut walker = ClosureWalker::new(session, &self.config, &self.allow_list, function, &inference);
        walker.run(body);
        tracing::debug!(
            closures = walker.sites.len(),
            diagnostics = walker.diagnostics.len(),
            "capture check finished"
        );
        CaptureReport {
            sites: walker.sites,
            diagnostics: walker.diagnostics,
        }
    }
}

impl Default for CaptureChecker {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_intern::Interner;
    use rk_ir::{CompilationSession, Decl, DiagnosticKind, SourceFile};
    use rk_span::FileId;

    const RAISE: &str = r#"
        class Raise<E> {
            @DisallowLambdaCapture
            fun raise(value: E): Nothing = error(value.toString())
        }
    "#;

    struct Checked {
        report: CaptureReport,
        source: String,
    }

    fn check(source: &str, function: &str, config: CaptureConfig) -> Checked {
        let source = format!("{RAISE}\n{source}");
        let interner = Interner::new();
        let file = rk_parser::parse_file(&source, FileId(0), &interner).expect("parses");
        let symbols = rk_quote::build_symbols(&interner, &file).expect("prelude parses");
        let session = CompilationSession::new(interner.clone(), symbols);
        let function = find(&file, &interner, function);
        let report = CaptureChecker::new(config).check_function(&session, &DeclPath::root(), function);
        Checked { report, source }
    }

    fn find<'f>(file: &'f SourceFile, interner: &Interner, name: &str) -> &'f FunctionDecl {
        let name = interner.intern(name);
        file.decls
            .iter()
            .find_map(|decl| match decl {
                Decl::Function(function) if function.name == name => Some(function),
                _ => None,
            })
            .expect("function exists")
    }

    impl Checked {
        fn flagged_text(&self) -> Vec<&str> {
            self.report
                .diagnostics
                .iter()
                .map(|diagnostic| {
                    let span = diagnostic.span.span;
                    &self.source[span.start as usize..span.end as usize]
                })
                .collect()
        }
    }

    #[test]
    fn eager_calls_keep_closures_safe() {
        let checked = check(
            r#"
            context(Raise<String>)
            fun lengths(items: List<String>): List<Int> = items.map { item ->
                if (item.length == 0) raise("empty")
                item.length
            }
            "#,
            "lengths",
            CaptureConfig::default(),
        );
        assert!(checked.report.diagnostics.is_empty(), "{:?}", checked.report.diagnostics);
        assert_eq!(checked.report.sites.len(), 1);
        let site = &checked.report.sites[0];
        assert!(site.immediately_invoked);
        assert!(site.contains_effect_call);
        assert_eq!(site.state, ClosureState::ImmediateInvokeSafe);
        assert!(checked.report.is_clean());
    }

    #[test]
    fn returned_closure_is_flagged_once_at_the_effect_call() {
        let checked = check(
            r#"
            context(Raise<String>)
            fun deferred(): () -> Unit {
                return { raise("boom") }
            }
            "#,
            "deferred",
            CaptureConfig::default(),
        );
        assert_eq!(checked.report.diagnostics.len(), 1);
        let diagnostic = &checked.report.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::UnsafeCaptureDetected);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(
            diagnostic.message,
            "detected call to member @DisallowLambdaCapture `raise` in non-inline anonymous function"
        );
        assert_eq!(checked.flagged_text(), vec![r#"raise("boom")"#]);
        assert_eq!(checked.report.sites[0].state, ClosureState::EscapingUnsafe);
        assert!(!checked.report.is_clean());
    }

    #[test]
    fn calls_in_place_parameters_keep_closures_safe() {
        let checked = check(
            r#"
            fun <R> guarded(@CallsInPlace block: () -> R): R = block()

            context(Raise<String>)
            fun checked(): Int = guarded { raise("boom") }
            "#,
            "checked",
            CaptureConfig::default(),
        );
        assert!(checked.report.diagnostics.is_empty(), "{:?}", checked.report.diagnostics);
    }

    #[test]
    fn uncontracted_calls_let_closures_escape() {
        let checked = check(
            r#"
            fun later(block: () -> Unit) {}

            context(Raise<String>)
            fun scheduled() {
                later { raise("boom") }
                later { println("fine") }
            }
            "#,
            "scheduled",
            CaptureConfig::default(),
        );
        assert_eq!(checked.flagged_text(), vec![r#"raise("boom")"#]);
        let states: Vec<_> = checked.report.sites.iter().map(|site| site.state).collect();
        assert_eq!(
            states,
            vec![ClosureState::EscapingUnsafe, ClosureState::ImmediateInvokeSafe]
        );
    }

    #[test]
    fn escaping_is_inherited_by_nested_closures() {
        let checked = check(
            r#"
            context(Raise<String>)
            fun nested(items: List<String>): () -> Unit {
                val block = { items.forEach { raise(it) } }
                return block
            }
            "#,
            "nested",
            CaptureConfig::default(),
        );
        assert_eq!(checked.flagged_text(), vec!["raise(it)"]);
        let sites = &checked.report.sites;
        assert_eq!(sites.len(), 2);
        assert!(sites[1].immediately_invoked);
        assert!(sites[1].escapes);
        assert!(sites.iter().all(|site| site.state == ClosureState::EscapingUnsafe));
    }

    #[test]
    fn closures_invoked_in_place_are_safe() {
        let checked = check(
            r#"
            context(Raise<String>)
            fun direct(): Int {
                { raise("boom") }()
                return 1
            }
            "#,
            "direct",
            CaptureConfig::default(),
        );
        assert!(checked.report.diagnostics.is_empty(), "{:?}", checked.report.diagnostics);
        assert_eq!(checked.report.sites.len(), 1);
    }

    #[test]
    fn annotation_message_and_severity_are_used() {
        let checked = check(
            r#"
            class Scope {
                @DisallowLambdaCapture(msg = "shift escapes its reset")
                fun shift(): Int = 1
            }

            context(Scope)
            fun stored(): () -> Int = { shift() }
            "#,
            "stored",
            CaptureConfig {
                severity: Severity::Warning,
                ..CaptureConfig::default()
            },
        );
        assert_eq!(checked.report.diagnostics.len(), 1);
        let diagnostic = &checked.report.diagnostics[0];
        assert_eq!(diagnostic.message, "shift escapes its reset");
        assert_eq!(diagnostic.severity, Severity::Warning);
    }

    #[test]
    fn configured_eager_calls_extend_the_allow_list() {
        let source = r#"
            fun later(block: () -> Unit) {}

            context(Raise<String>)
            fun scheduled() {
                later { raise("boom") }
            }
        "#;
        let config = CaptureConfig {
            eager_calls: vec!["later".to_string()],
            ..CaptureConfig::default()
        };
        let checked = check(source, "scheduled", config);
        assert!(checked.report.diagnostics.is_empty());
    }

    #[test]
    fn user_functions_shadow_built_in_eager_names() {
        let checked = check(
            r#"
            fun run(block: () -> Unit) {}

            context(Raise<String>)
            fun leak() {
                run { raise("boom") }
            }
            "#,
            "leak",
            CaptureConfig::default(),
        );
        assert_eq!(checked.flagged_text(), vec![r#"raise("boom")"#]);
        assert_eq!(checked.report.sites[0].state, ClosureState::EscapingUnsafe);
    }

    #[test]
    fn effect_calls_outside_closures_are_fine() {
        let checked = check(
            r#"
            context(Raise<String>)
            fun plain(value: Int): Int {
                if (value < 0) raise("negative")
                return value
            }
            "#,
            "plain",
            CaptureConfig::default(),
        );
        assert!(checked.report.diagnostics.is_empty());
        assert!(checked.report.sites.is_empty());
    }
}
