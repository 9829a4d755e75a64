//! Compilation driver
//!
//! [`Compiler::compile`] runs one source file through the whole pipeline:
//!
//! 1. parse the file; a syntax error ends compilation of that file
//! 2. build the session over the file and the prelude
//! 3. scan annotations for registered macros and undeclared meta annotations
//! 4. expand every macro use in parallel against the unchanged tree
//! 5. merge the resulting operations into the tree in source order
//! 6. run the capture checker over every function of the merged file
//!
//! Diagnostics from every stage are returned together, ordered by location.

mod config;
mod error;
mod merge;
mod scan;

pub use config::{DriverConfig, ExpansionConfig};
pub use error::{ConfigError, MergeError};

use merge::Merger;
use rayon::prelude::*;
use rk_capture::CaptureChecker;
use rk_intern::Interner;
use rk_ir::{CompilationSession, Diagnostic, DiagnosticBag, DiagnosticKind, Session, SourceFile};
use rk_macro::{MacroContext, MacroRegistry, TransformOperation};
use rk_parser::ParseError;
use rk_span::{FileId, FileSpan};
use scan::MacroUse;
use tracing_subscriber::EnvFilter;

/// Result of compiling one file
#[derive(Debug)]
pub struct CompilationOutput {
    /// The file with generated declarations merged in; empty when it did not
    /// parse
    pub file: SourceFile,
    /// Diagnostics of every stage, ordered by location
    pub diagnostics: Vec<Diagnostic>,
    /// Operations produced by expansion, in the order they were applied
    pub operations: Vec<TransformOperation>,
}

impl CompilationOutput {
    /// Whether any stage reported an error
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Diagnostics of one kind
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.kind == kind)
    }
}

/// Compiles source files against a macro registry
pub struct Compiler {
    config: DriverConfig,
    registry: &'static MacroRegistry,
    checker: CaptureChecker,
    interner: Interner,
}

impl Compiler {
    /// Compiler using the built-in macros
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self::with_registry(config, MacroRegistry::global())
    }

    /// Compiler using a custom registry
    #[must_use]
    pub fn with_registry(config: DriverConfig, registry: &'static MacroRegistry) -> Self {
        let checker = CaptureChecker::new(config.capture.clone());
        Self {
            config,
            registry,
            checker,
            interner: Interner::new(),
        }
    }

    /// Interner shared by every file this compiler produces
    #[must_use]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Compiles one file
    #[tracing::instrument(level = "info", skip(self, source))]
    pub fn compile(&self, file: FileId, source: &str) -> CompilationOutput {
        let diagnostics = DiagnosticBag::new();
        let mut parsed = match rk_parser::parse_file(source, file, &self.interner) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::debug!(%error, "file did not parse");
                diagnostics.push(parse_diagnostic(file, &error));
                return CompilationOutput {
                    file: SourceFile::new(file),
                    diagnostics: diagnostics.into_sorted(),
                    operations: Vec::new(),
                };
            }
        };

        let Some(session) = self.session(&parsed, &diagnostics) else {
            return CompilationOutput {
                file: parsed,
                diagnostics: diagnostics.into_sorted(),
                operations: Vec::new(),
            };
        };
        let expanded = {
            let uses = scan::scan(&parsed, self.registry, &session);
            self.expand(&session, &uses)
        };
        diagnostics.extend(session.into_diagnostics());

        let mut merger = Merger::new(&mut parsed, &self.interner);
        for (anchor, operation) in &expanded {
            if let Err(error) = merger.apply(operation, *anchor) {
                diagnostics.push(error.to_diagnostic(*anchor));
            }
        }
        let operations = expanded.into_iter().map(|(_, operation)| operation).collect();

        if let Some(checked) = self.session(&parsed, &diagnostics) {
            self.check_captures(&checked, &parsed, &diagnostics);
            diagnostics.extend(checked.into_diagnostics());
        }

        CompilationOutput {
            file: parsed,
            diagnostics: diagnostics.into_sorted(),
            operations,
        }
    }

    fn session(&self, file: &SourceFile, diagnostics: &DiagnosticBag) -> Option<CompilationSession> {
        match rk_quote::build_symbols(&self.interner, file) {
            Ok(symbols) => Some(CompilationSession::new(self.interner.clone(), symbols)),
            Err(error) => {
                diagnostics.push(parse_diagnostic(FileId::PRELUDE, &error));
                None
            }
        }
    }

    /// Expands every use in parallel; operations come back in use order,
    /// each paired with the annotation span synthetic spans were moved to
    fn expand(&self, session: &dyn Session, uses: &[MacroUse<'_>]) -> Vec<(FileSpan, TransformOperation)> {
        let mode = self.config.expansion.mode;
        let results: Vec<_> = uses
            .par_iter()
            .map(|pending| {
                let ctx = MacroContext::new(session, pending.annotation, mode);
                let result = match pending.target() {
                    Some(target) => pending.implementation.expand(target, &ctx),
                    None => Ok(Vec::new()),
                };
                (pending.annotation.span, result)
            })
            .collect();

        let mut expanded = Vec::new();
        for (anchor, result) in results {
            match result {
                Ok(operations) => {
                    expanded.extend(operations.into_iter().map(|mut operation| {
                        operation.relocate(anchor);
                        (anchor, operation)
                    }));
                }
                Err(error) => {
                    tracing::debug!(%error, "expansion failed");
                    for diagnostic in error.to_diagnostics(anchor) {
                        session.report(diagnostic);
                    }
                }
            }
        }
        tracing::debug!(operations = expanded.len(), "expansion finished");
        expanded
    }

    fn check_captures(&self, session: &dyn Session, file: &SourceFile, diagnostics: &DiagnosticBag) {
        let mut functions = Vec::new();
        file.for_each_function(|container, function| functions.push((container.clone(), function)));
        let found: Vec<Diagnostic> = functions
            .par_iter()
            .flat_map_iter(|(container, function)| {
                self.checker
                    .check_function(session, container, function)
                    .diagnostics
            })
            .collect();
        tracing::debug!(functions = functions.len(), diagnostics = found.len(), "capture check finished");
        diagnostics.extend(found);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

fn parse_diagnostic(file: FileId, error: &ParseError) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::ParseError,
        error.to_string(),
        FileSpan::new(file, error.span()),
    )
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// warnings. Does nothing when a subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_ir::{Decl, DeclPath, Severity};
    use rk_macro::{AttachMode, ExpansionMode};

    const FILE: FileId = FileId(0);

    fn compile(source: &str) -> (Compiler, CompilationOutput) {
        init_tracing();
        let compiler = Compiler::default();
        let output = compiler.compile(FILE, source);
        (compiler, output)
    }

    fn text<'s>(source: &'s str, diagnostic: &Diagnostic) -> &'s str {
        &source[diagnostic.span.range()]
    }

    fn member_names(compiler: &Compiler, output: &CompilationOutput, class: &str) -> Vec<String> {
        let interner = compiler.interner();
        let path = DeclPath::root().child(interner.intern(class));
        output
            .file
            .class(&path)
            .expect("class")
            .members
            .iter()
            .map(|decl| interner.resolve(&decl.name()).to_string())
            .collect()
    }

    #[test]
    fn syntax_errors_stop_the_file() {
        let source = "fun broken( {";
        let (_, output) = compile(source);
        assert!(output.file.decls.is_empty());
        assert!(output.operations.is_empty());
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::ParseError);
        assert_eq!(output.diagnostics[0].span.file, FILE);
    }

    #[test]
    fn plain_files_pass_through() {
        let source = "fun answer(): Int = 42";
        let (_, output) = compile(source);
        assert!(output.diagnostics.is_empty());
        assert!(output.operations.is_empty());
        assert_eq!(output.file.decls.len(), 1);
    }

    #[test]
    fn product_members_are_merged_into_the_class() {
        let source = "@Product data class Sample(val foo: Int, val bar: String)";
        let (compiler, output) = compile(source);
        assert!(!output.has_errors(), "{:?}", output.diagnostics);
        assert_eq!(output.operations.len(), 1);
        assert_eq!(member_names(&compiler, &output, "Sample"), vec!["product"]);

        let Some(Decl::Class(sample)) = output.file.decls.first() else {
            panic!("expected the class");
        };
        let Decl::Function(product) = &sample.members[0] else {
            panic!("expected a function");
        };
        let annotation = sample.annotations[0].span;
        assert_eq!(product.span, annotation);
    }

    #[test]
    fn factory_creates_a_companion() {
        let source = "@Factory class SimpleProduct";
        let (compiler, output) = compile(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert_eq!(member_names(&compiler, &output, "SimpleProduct"), vec!["Companion"]);
        let interner = compiler.interner();
        let path = DeclPath::root()
            .child(interner.intern("SimpleProduct"))
            .child(interner.intern("Companion"));
        let companion = output.file.class(&path).expect("companion");
        assert!(companion.is_companion());
        assert_eq!(interner.resolve(&companion.members[0].name()), "create");
    }

    #[test]
    fn factory_extends_an_existing_companion() {
        let source = r#"
            @Factory
            class Widget {
                companion object {
                    val label: String = "widget"
                }
            }
        "#;
        let (compiler, output) = compile(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert_eq!(member_names(&compiler, &output, "Widget"), vec!["Companion"]);
        let interner = compiler.interner();
        let path = DeclPath::root()
            .child(interner.intern("Widget"))
            .child(interner.intern("Companion"));
        let names: Vec<_> = output
            .file
            .class(&path)
            .expect("companion")
            .members
            .iter()
            .map(|decl| interner.resolve(&decl.name()).to_string())
            .collect();
        assert_eq!(names, vec!["label", "create"]);
    }

    #[test]
    fn decorator_replaces_the_original() {
        let source = "@Decorator fun foo(value: Int): Int = value + 41";
        let (compiler, output) = compile(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let interner = compiler.interner();
        let names: Vec<_> = output
            .file
            .decls
            .iter()
            .map(|decl| interner.resolve(&decl.name()).to_string())
            .collect();
        assert_eq!(names, vec!["foo", "foo__decorated"]);
        let modes: Vec<_> = output
            .operations
            .iter()
            .map(|operation| match operation {
                TransformOperation::AttachFunction { mode, .. } => *mode,
                other => panic!("unexpected operation {other:?}"),
            })
            .collect();
        assert_eq!(modes, vec![AttachMode::Add, AttachMode::Replace]);
    }

    #[test]
    fn decorator_replaces_only_the_matching_overload() {
        let source = "fun foo(value: String): String = value\n@Decorator fun foo(value: Int): Int = value + 41";
        let (compiler, output) = compile(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let interner = compiler.interner();
        let signatures: Vec<_> = output
            .file
            .decls
            .iter()
            .map(|decl| match decl {
                Decl::Function(function) => format!(
                    "{}({})",
                    interner.resolve(&function.name),
                    function.params[0].ty.display(interner)
                ),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            signatures,
            vec!["foo(String)", "foo(Int)", "foo__decorated(Int)"]
        );
    }

    #[test]
    fn nested_declarations_are_expanded() {
        let source = r"
            class Outer {
                @HelloClassTransform
                class Inner
            }
        ";
        let (compiler, output) = compile(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let interner = compiler.interner();
        let path = DeclPath::root()
            .child(interner.intern("Outer"))
            .child(interner.intern("Inner"));
        let inner = output.file.class(&path).expect("nested class");
        assert_eq!(inner.members.len(), 2);
    }

    #[test]
    fn expression_macros_replace_their_sites() {
        let source = r"
            class Counter {
                val start = @Increment 9
                fun next(): Int {
                    val step = @Increment 1
                    return start + step
                }
            }

            fun untouched(): Int = @Suppress 1
        ";
        let (compiler, output) = compile(source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert_eq!(output.operations.len(), 2);
        assert!(output.operations.iter().all(|operation| matches!(
            operation,
            TransformOperation::ReplaceExpression { .. }
        )));

        let annotated = |body: &rk_ir::Body| {
            body.exprs
                .iter()
                .filter(|(_, expr)| matches!(expr, rk_ir::Expr::Annotated { .. }))
                .count()
        };
        let path = DeclPath::root().child(compiler.interner().intern("Counter"));
        let counter = output.file.class(&path).expect("class");
        for member in &counter.members {
            let body = match member {
                Decl::Property(property) => property.initializer.as_ref(),
                Decl::Function(function) => function.body.as_ref(),
                _ => None,
            };
            assert_eq!(annotated(body.expect("body")), 0);
        }
        let Some(Decl::Function(untouched)) = output.file.decls.last() else {
            panic!("expected the function");
        };
        assert_eq!(annotated(untouched.body.as_ref().expect("body")), 1);
    }

    #[test]
    fn undeclared_meta_annotations_are_configuration_errors() {
        let source = "@Meta annotation class Missing\n\n@Missing class Target\n@Documented class Plain";
        let (_, output) = compile(source);
        let errors: Vec<_> = output.diagnostics_of(DiagnosticKind::ConfigurationError).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(text(source, errors[0]), "@Missing");
        assert!(errors[0].message.contains("`@Missing`"));
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn failed_expansions_do_not_stop_the_others() {
        let source = "@Product fun notAClass() {}\n@HelloClassTransform class Greeter";
        let (compiler, output) = compile(source);
        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::MacroReport);
        assert_eq!(text(source, diagnostic), "@Product");
        assert_eq!(member_names(&compiler, &output, "Greeter"), vec!["hello", "world"]);
    }

    #[test]
    fn macros_on_properties_are_rejected() {
        let source = "@Product val answer: Int = 42";
        let (_, output) = compile(source);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(
            output.diagnostics[0].message,
            "`@Product` only applies to classes and functions"
        );
    }

    #[test]
    fn macro_reports_come_back_sorted() {
        let source = "@Log class Second\n@Log fun first() {}\n@Log class Third";
        let (_, output) = compile(source);
        let messages: Vec<_> = output.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "found declaration: Second",
                "found declaration: first",
                "found declaration: Third"
            ]
        );
        assert!(output.diagnostics.iter().all(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn escaping_effect_calls_are_reported_after_the_merge() {
        let source = r#"
            class Raise<E> {
                @DisallowLambdaCapture
                fun raise(value: E): Nothing = error(value.toString())
            }

            context(Raise<String>)
            fun leaky(): () -> Unit {
                return { raise("boom") }
            }

            context(Raise<String>)
            fun lengths(items: List<String>): List<Int> = items.map { item ->
                if (item.length == 0) raise("empty")
                item.length
            }
        "#;
        let (_, output) = compile(source);
        let unsafe_calls: Vec<_> = output.diagnostics_of(DiagnosticKind::UnsafeCaptureDetected).collect();
        assert_eq!(unsafe_calls.len(), 1, "{:?}", output.diagnostics);
        assert_eq!(text(source, unsafe_calls[0]), r#"raise("boom")"#);
        assert!(unsafe_calls[0].is_error());
    }

    #[test]
    fn configuration_reaches_every_pass() {
        let config = DriverConfig::from_toml_str(
            "[expansion]\nmode = \"strict\"\n\n[capture]\nseverity = \"warning\"\neager_calls = [\"later\"]",
        )
        .expect("parses");
        let compiler = Compiler::new(config);
        assert_eq!(compiler.config().expansion.mode, ExpansionMode::Strict);
        let source = r#"
            class Raise<E> {
                @DisallowLambdaCapture
                fun raise(value: E): Nothing = error(value.toString())
            }

            fun later(block: () -> Unit) {}

            context(Raise<String>)
            fun deferred() {
                later { raise("boom") }
            }
        "#;
        let output = compiler.compile(FILE, source);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    }
}
