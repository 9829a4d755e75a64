//! End-to-end checks of the macro scenarios, beyond what fixture comments
//! can express

use integration_tests::TestFixture;
use pretty_assertions::assert_eq;
use rk_driver::DriverConfig;
use rk_ir::{Decl, DiagnosticKind, Severity};
use std::io::Write;
use std::path::PathBuf;

fn fixture(name: &str) -> TestFixture {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    TestFixture::load(path).expect("fixture loads")
}

#[test]
fn factory_companion_creates_instances() {
    let fixture = fixture("factory.kt");
    assert!(fixture.output().diagnostics.is_empty());
    assert_eq!(fixture.output().operations.len(), 1);
    assert_eq!(fixture.eval("main").expect("evaluates"), "simple");
}

#[test]
fn product_pairs_compare_structurally() {
    let fixture = fixture("product.kt");
    assert_eq!(fixture.eval("main").expect("evaluates"), "true");
    assert_eq!(
        fixture.eval("pairs").expect("evaluates"),
        "[(foo, 0), (bar, abc)]"
    );
}

#[test]
fn returned_closure_is_flagged_at_the_effect_call() {
    let fixture = fixture("capture_returned.kt");
    let diagnostics = &fixture.output().diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::UnsafeCaptureDetected);
    assert_eq!(fixture.text(&diagnostics[0]), r#"raise("boom")"#);
}

#[test]
fn in_place_closures_are_not_flagged() {
    let fixture = fixture("capture_in_place.kt");
    assert!(
        fixture.output().diagnostics.is_empty(),
        "{:?}",
        fixture.output().diagnostics
    );
}

#[test]
fn hello_members_build_on_each_other() {
    let fixture = fixture("hello.kt");
    assert_eq!(fixture.eval("main").expect("evaluates"), "Hello World!");
}

#[test]
fn decorated_function_forwards_incremented_arguments() {
    let fixture = fixture("decorator.kt");
    assert_eq!(fixture.eval("main").expect("evaluates"), "42");
    let file = &fixture.output().file;
    let Some(Decl::Function(foo)) = file.decls.first() else {
        panic!("expected the replacement first");
    };
    assert!(foo.annotations.is_empty());
}

#[test]
fn decorator_leaves_other_overloads_alone() {
    let source = r#"
        fun foo(value: String): String = value

        @Decorator
        fun foo(value: Int): Int = value + 41

        fun main(): String = "" + foo(0) + "|" + foo("x")
    "#;
    let fixture = TestFixture::new(source).expect("compiles");
    assert!(
        fixture.output().diagnostics.is_empty(),
        "{:?}",
        fixture.output().diagnostics
    );
    assert_eq!(fixture.output().file.decls.len(), 4);
    assert_eq!(fixture.eval("main").expect("evaluates"), "42|x");
}

#[test]
fn increment_reports_non_constant_operands() {
    let source = "fun seed(): Int = 1\n\nfun main(): Int = @Increment seed()\n\nfun text(): String = @Increment \"a\"";
    let fixture = TestFixture::new(source).expect("compiles");
    let diagnostics = &fixture.output().diagnostics;
    let reported: Vec<(&str, &str)> = diagnostics
        .iter()
        .map(|d| (fixture.text(d), d.message.as_str()))
        .collect();
    assert_eq!(
        reported,
        vec![
            ("@Increment", "@Increment only works on constant expressions of type `Int`"),
            ("@Increment", "found `\"a\"` but @Increment expects a constant of type `Int`"),
        ]
    );
    assert!(fixture.output().operations.is_empty());
    assert_eq!(fixture.eval("main").expect("evaluates"), "1");
}

#[test]
fn strict_mode_reports_skipped_rules() {
    let source = "@Factory class Point(val x: Int)\n\nfun main(): Int = Point(7).x";

    let lenient = TestFixture::new(source).expect("compiles");
    assert!(lenient.output().diagnostics.is_empty());

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[expansion]\nmode = \"strict\"").expect("write");
    let config = DriverConfig::load(file.path()).expect("config loads");
    let strict = TestFixture::with_config(source, config).expect("compiles");
    let diagnostics = &strict.output().diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::SkippedRule);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(strict.text(&diagnostics[0]), "@Factory");
    assert_eq!(strict.eval("main").expect("evaluates"), "7");
}

#[test]
fn capture_severity_is_configurable() {
    let source = std::fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/capture_returned.kt"),
    )
    .expect("fixture");
    let config = DriverConfig::from_toml_str("[capture]\nseverity = \"warning\"").expect("parses");
    let fixture = TestFixture::with_config(&source, config).expect("compiles");
    let diagnostics = &fixture.output().diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert!(!fixture.output().has_errors());
}
