//! Integration test utilities
//!
//! A [`TestFixture`] compiles one host program with the driver and runs the
//! merged result on the evaluator. Fixture files under `tests/fixtures/`
//! carry their expectations in leading comments:
//!
//! ```text
//! // eval main: Hello World!
//! // diagnostics UnsafeCaptureDetected: 1
//! ```
//!
//! A fixture without `diagnostics` lines expects a clean compilation.

use anyhow::{Context, Result, anyhow};
use rk_driver::{CompilationOutput, Compiler, DriverConfig};
use rk_interp::Interpreter;
use rk_ir::{Diagnostic, SourceFile};
use rk_span::FileId;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A compiled program ready to run
pub struct TestFixture {
    compiler: Compiler,
    prelude: SourceFile,
    source: String,
    output: CompilationOutput,
}

impl TestFixture {
    /// Compiles `source` with the default configuration
    ///
    /// # Errors
    ///
    /// Fails only if the prelude does not parse.
    pub fn new(source: &str) -> Result<Self> {
        Self::with_config(source, DriverConfig::default())
    }

    /// Compiles `source` with `config`
    ///
    /// # Errors
    ///
    /// Fails only if the prelude does not parse.
    pub fn with_config(source: &str, config: DriverConfig) -> Result<Self> {
        let compiler = Compiler::new(config);
        let prelude = rk_quote::prelude(compiler.interner()).context("Failed to parse the prelude")?;
        let output = compiler.compile(FileId(0), source);
        Ok(Self {
            compiler,
            prelude,
            source: source.to_string(),
            output,
        })
    }

    /// Compiles the fixture file at `path`
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::new(&source)
    }

    /// Driver output
    #[must_use]
    pub fn output(&self) -> &CompilationOutput {
        &self.output
    }

    /// Source text a diagnostic points at
    #[must_use]
    pub fn text(&self, diagnostic: &Diagnostic) -> &str {
        self.source.get(diagnostic.span.range()).unwrap_or_default()
    }

    /// Number of diagnostics per kind, keyed by the kind's name
    #[must_use]
    pub fn diagnostic_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in &self.output.diagnostics {
            *counts.entry(format!("{:?}", diagnostic.kind)).or_insert(0) += 1;
        }
        counts
    }

    /// Evaluator over the prelude and the merged file
    #[must_use]
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(self.compiler.interner(), [&self.prelude, &self.output.file])
    }

    /// Calls the argument-less function `name` and renders its result
    ///
    /// # Errors
    ///
    /// Fails when evaluation fails.
    pub fn eval(&self, name: &str) -> Result<String> {
        let mut interpreter = self.interpreter();
        let value = interpreter
            .call(name, Vec::new())
            .with_context(|| format!("Failed to evaluate `{name}()`"))?;
        Ok(interpreter.render(&value))
    }
}

/// What a fixture file expects of its compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Functions to call, with their rendered result
    pub evals: Vec<(String, String)>,
    /// Expected diagnostic counts per kind
    pub diagnostics: BTreeMap<String, usize>,
}

impl Expectations {
    /// Reads the expectation comments of a fixture
    ///
    /// # Errors
    ///
    /// Fails on a malformed expectation line.
    pub fn parse(source: &str) -> Result<Self> {
        let mut expectations = Self::default();
        for line in source.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("// eval ") {
                let (function, expected) = rest
                    .split_once(": ")
                    .ok_or_else(|| anyhow!("Malformed eval expectation: {line}"))?;
                expectations
                    .evals
                    .push((function.to_string(), expected.to_string()));
            } else if let Some(rest) = line.strip_prefix("// diagnostics ") {
                let (kind, count) = rest
                    .split_once(": ")
                    .ok_or_else(|| anyhow!("Malformed diagnostics expectation: {line}"))?;
                let count = count
                    .parse()
                    .with_context(|| format!("Invalid diagnostic count in: {line}"))?;
                expectations.diagnostics.insert(kind.to_string(), count);
            }
        }
        Ok(expectations)
    }
}

/// Fixture files under `dir`, sorted by name
///
/// # Errors
///
/// Fails when the directory cannot be read.
pub fn fixture_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "kt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn expectation_comments_are_read() {
        let expectations = Expectations::parse(
            "// eval main: Hello World!\n  // diagnostics MacroReport: 2\nfun main() {}",
        )
        .expect("parses");
        assert_eq!(
            expectations.evals,
            vec![("main".to_string(), "Hello World!".to_string())]
        );
        assert_eq!(expectations.diagnostics.get("MacroReport"), Some(&2));
    }

    #[test]
    fn malformed_expectations_are_errors() {
        assert!(Expectations::parse("// eval main").is_err());
        assert!(Expectations::parse("// diagnostics ParseError: many").is_err());
    }
}
