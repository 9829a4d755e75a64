//! Runs every fixture under `tests/fixtures/` against its expectations

use integration_tests::{Expectations, TestFixture, fixture_files};
use std::fs;
use std::path::PathBuf;

#[test]
fn all_fixtures_meet_their_expectations() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let files = fixture_files(&dir).expect("fixture directory");
    assert!(!files.is_empty(), "no fixtures found in {}", dir.display());

    let mut failures = Vec::new();
    for path in &files {
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("unknown");
        let source = fs::read_to_string(path).expect("readable fixture");
        let expectations = Expectations::parse(&source).expect("well-formed expectations");
        let fixture = TestFixture::new(&source).expect("prelude parses");

        let counts = fixture.diagnostic_counts();
        if counts != expectations.diagnostics {
            failures.push(format!(
                "{name}: expected diagnostics {:?}, got {:?}",
                expectations.diagnostics,
                fixture.output().diagnostics
            ));
            continue;
        }
        for (function, expected) in &expectations.evals {
            match fixture.eval(function) {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => failures.push(format!(
                    "{name}: `{function}()` returned {actual:?}, expected {expected:?}"
                )),
                Err(error) => failures.push(format!("{name}: {error:#}")),
            }
        }
    }
    assert!(failures.is_empty(), "fixture failures:\n{}", failures.join("\n"));
}
