//! Parser for host source files and quoted fragments
//!
//! Recursive descent over [`rk_lexer`] tokens, producing [`rk_ir`]
//! declarations and bodies. Only the subset of the host language that macros
//! generate and that test programs use is accepted; anything else is a
//! [`ParseError`].

mod decl;
mod error;
mod expr;
mod parser;

pub use error::ParseError;

use parser::Parser;
use rk_intern::Interner;
use rk_ir::{Body, BodyKind, Decl, SourceFile};
use rk_lexer::{DeclarationKind, TokenKind};
use rk_span::FileId;

/// Parses a whole source file
///
/// # Errors
///
/// Returns the first syntax error.
#[tracing::instrument(level = "debug", skip(source, interner))]
pub fn parse_file(source: &str, file: FileId, interner: &Interner) -> Result<SourceFile, ParseError> {
    let mut parser = Parser::new(source, file, interner)?;
    let decls = parser.parse_decls_to_end()?;
    Ok(SourceFile { file, decls })
}

/// Parses exactly one declaration of the `expected` kind
///
/// # Errors
///
/// Returns a syntax error, [`ParseError::KindMismatch`] when the text
/// declares a different kind, or an error for trailing input.
pub fn parse_declaration(
    source: &str,
    expected: DeclarationKind,
    file: FileId,
    interner: &Interner,
) -> Result<Decl, ParseError> {
    let mut parser = Parser::new(source, file, interner)?;
    parser.skip_semis();
    let decl = parser.parse_decl()?;
    let found = declaration_kind_of(&decl);
    if found != expected {
        return Err(ParseError::KindMismatch {
            expected,
            found,
            span: error::source_span(decl.span().span),
            src: parser.source_name(),
        });
    }
    parser.skip_semis();
    if !parser.at_eof() {
        return Err(parser.unexpected("end of declaration"));
    }
    Ok(decl)
}

/// Parses a single expression into its own body
///
/// # Errors
///
/// Returns a syntax error or an error for trailing input.
pub fn parse_expression(source: &str, file: FileId, interner: &Interner) -> Result<Body, ParseError> {
    let mut parser = Parser::new(source, file, interner)?;
    let mut body = Body::new(BodyKind::Expression);
    parser.skip_semis();
    body.root = parser.parse_expr(&mut body)?;
    parser.skip_semis();
    if !parser.at(TokenKind::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(body)
}

/// Declaration kind of a parsed declaration
#[must_use]
pub fn declaration_kind_of(decl: &Decl) -> DeclarationKind {
    match decl {
        Decl::Class(_) => DeclarationKind::Class,
        Decl::Function(_) => DeclarationKind::Function,
        Decl::Property(_) => DeclarationKind::Property,
        Decl::TypeAlias(_) => DeclarationKind::TypeAlias,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_ir::{Binding, ClassKind, Expr, Modifiers, Stmt, TypeRef};

    fn parse(source: &str) -> (SourceFile, Interner) {
        let interner = Interner::new();
        let file = parse_file(source, FileId(0), &interner).expect("parses");
        (file, interner)
    }

    #[test]
    fn data_class_with_annotation() {
        let (file, interner) = parse("@Product\ndata class Sample(val foo: Int, val bar: String)");
        let Decl::Class(class) = &file.decls[0] else {
            panic!("expected class");
        };
        assert_eq!(interner.resolve(&class.name), "Sample");
        assert_eq!(class.kind, ClassKind::Class);
        assert!(class.modifiers.contains(Modifiers::DATA));
        assert_eq!(interner.resolve(&class.annotations[0].name), "Product");
        let params: Vec<(&str, Option<Binding>)> = class
            .primary_ctor
            .iter()
            .map(|p| (interner.resolve(&p.name), p.binding))
            .collect();
        assert_eq!(
            params,
            vec![("foo", Some(Binding::Val)), ("bar", Some(Binding::Val))]
        );
    }

    #[test]
    fn annotation_arguments() {
        let (file, interner) =
            parse("@DisallowLambdaCapture(\"no raise\", level = 2)\nfun raise(e: String): Nothing");
        let annotation = &file.decls[0].annotations()[0];
        assert_eq!(annotation.args[0].value, "no raise");
        assert_eq!(annotation.args[1].name, Some(interner.intern("level")));
        assert_eq!(annotation.args[1].value, "2");
    }

    #[test]
    fn context_receivers_and_extension_receiver() {
        let (file, interner) = parse(
            "context(Raise<String>)\nfun <T> List<T>.firstOrRaise(): T = first()",
        );
        let Decl::Function(function) = &file.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(function.context_receivers.len(), 1);
        assert_eq!(
            function.receiver.as_ref().and_then(TypeRef::head),
            Some(interner.intern("List"))
        );
        assert_eq!(interner.resolve(&function.name), "firstOrRaise");
        assert_eq!(function.body.as_ref().map(|b| b.kind), Some(BodyKind::Expression));
    }

    #[test]
    fn unnamed_companion_object() {
        let (file, interner) = parse(
            "class SimpleProduct {\n  companion object {\n    fun create(): SimpleProduct = SimpleProduct()\n  }\n}",
        );
        let Decl::Class(class) = &file.decls[0] else {
            panic!("expected class");
        };
        let companion = class.companion().expect("companion");
        assert_eq!(interner.resolve(&companion.name), "Companion");
        assert_eq!(companion.kind, ClassKind::Object);
        assert_eq!(companion.functions().count(), 1);
    }

    #[test]
    fn function_types_with_receiver() {
        let (file, _) = parse("fun run(block: Raise<String>.() -> Unit, f: (Int) -> String?) {}");
        let Decl::Function(function) = &file.decls[0] else {
            panic!("expected function");
        };
        assert!(matches!(
            &function.params[0].ty,
            TypeRef::Function { receiver: Some(_), params, .. } if params.is_empty()
        ));
        assert!(matches!(&function.params[1].ty, TypeRef::Function { params, .. } if params.len() == 1));
    }

    #[test]
    fn infix_pairs_inside_call() {
        let interner = Interner::new();
        let body = parse_expression(
            "listOf(\"foo\" to this.foo, \"bar\" to this.bar)",
            FileId::SYNTHETIC,
            &interner,
        )
        .expect("parses");
        let Expr::Call { name, args, .. } = body.expr(body.root) else {
            panic!("expected call");
        };
        assert_eq!(interner.resolve(name), "listOf");
        assert_eq!(args.len(), 2);
        assert!(matches!(
            body.expr(args[0].value),
            Expr::Call { infix: true, .. }
        ));
    }

    #[test]
    fn trailing_lambda_and_implicit_it() {
        let interner = Interner::new();
        let body = parse_expression("listOf(1, 2, 3).map { it + 1 }", FileId(0), &interner)
            .expect("parses");
        let Expr::Call { receiver, args, .. } = body.expr(body.root) else {
            panic!("expected call");
        };
        assert!(receiver.is_some());
        assert!(args[0].trailing);
        assert!(matches!(body.expr(args[0].value), Expr::Lambda { params, .. } if params.is_empty()));
    }

    #[test]
    fn lambda_parameters() {
        let interner = Interner::new();
        let body = parse_expression("{ a, b: Int -> a + b }", FileId(0), &interner).expect("parses");
        let Expr::Lambda { params, .. } = body.expr(body.root) else {
            panic!("expected lambda");
        };
        assert_eq!(params.len(), 2);
        assert!(params[1].ty.is_some());
    }

    #[test]
    fn line_break_ends_statement() {
        let (file, _) = parse("fun f(): Int {\n  val x = 1\n  -x\n  return x\n}");
        let Decl::Function(function) = &file.decls[0] else {
            panic!("expected function");
        };
        let body = function.body.as_ref().expect("body");
        let Expr::Block { stmts, tail, .. } = body.expr(body.root) else {
            panic!("expected block");
        };
        assert_eq!(stmts.len(), 2);
        assert!(matches!(body.stmt(stmts[0]), Stmt::Local { .. }));
        assert!(matches!(body.stmt(stmts[1]), Stmt::Expr { .. }));
        assert!(matches!(body.expr(tail.expect("tail")), Expr::Return { .. }));
    }

    #[test]
    fn member_chain_continues_across_lines() {
        let interner = Interner::new();
        let body = parse_expression("{\n  items\n    .map { it }\n    .size\n}", FileId(0), &interner)
            .expect("parses");
        let Expr::Lambda { body: block, .. } = body.expr(body.root) else {
            panic!("expected lambda");
        };
        let Expr::Block { stmts, tail, .. } = body.expr(*block) else {
            panic!("expected block");
        };
        assert!(stmts.is_empty());
        assert!(matches!(body.expr(tail.expect("tail")), Expr::Member { .. }));
    }

    #[test]
    fn when_if_and_try() {
        let interner = Interner::new();
        let source = "when (x) {\n  1, 2 -> if (y) a else b\n  else -> try { c } catch (e: Exception) { d }\n}";
        let body = parse_expression(source, FileId(0), &interner).expect("parses");
        let Expr::When { subject, branches, else_branch, .. } = body.expr(body.root) else {
            panic!("expected when");
        };
        assert!(subject.is_some());
        assert_eq!(branches[0].conditions.len(), 2);
        assert!(matches!(body.expr(branches[0].body), Expr::If { else_branch: Some(_), .. }));
        assert!(matches!(body.expr(else_branch.expect("else")), Expr::Try { .. }));
    }

    #[test]
    fn declaration_kind_must_match() {
        let interner = Interner::new();
        let err = parse_declaration("fun hello() = \"Hello\"", DeclarationKind::Class, FileId::SYNTHETIC, &interner)
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::KindMismatch {
                expected: DeclarationKind::Class,
                found: DeclarationKind::Function,
                ..
            }
        ));
    }

    #[test]
    fn reports_unexpected_token() {
        let interner = Interner::new();
        let err = parse_declaration("fun broken( = 1", DeclarationKind::Function, FileId::SYNTHETIC, &interner)
            .unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
        assert_eq!(err.source_text(), "fun broken( = 1");
    }

    #[test]
    fn enum_entries_become_objects() {
        let (file, interner) = parse("enum class Color { RED, GREEN; fun dark() = false }");
        let Decl::Class(class) = &file.decls[0] else {
            panic!("expected class");
        };
        let names: Vec<&str> = class.members.iter().map(|m| interner.resolve(&m.name())).collect();
        assert_eq!(names, vec!["RED", "GREEN", "dark"]);
    }

    #[test]
    fn annotated_expressions_bind_tighter_than_operators() {
        let interner = Interner::new();
        let body = parse_expression("@Increment 41 * 2", FileId(0), &interner).expect("parses");
        let Expr::Binary { lhs, .. } = body.expr(body.root) else {
            panic!("expected binary, found {:?}", body.expr(body.root));
        };
        let Expr::Annotated { annotation, expr, span } = body.expr(*lhs) else {
            panic!("expected annotated operand");
        };
        assert_eq!(interner.resolve(&annotation.name), "Increment");
        assert_eq!(span.range(), 0..13);
        assert!(matches!(body.expr(*expr), Expr::Literal { .. }));
    }

    #[test]
    fn stacked_annotations_nest_outward() {
        let (file, interner) = parse("fun f() {\n  val x = @A @B(1) g()\n}");
        let Decl::Function(function) = &file.decls[0] else {
            panic!("expected function");
        };
        let body = function.body.as_ref().expect("body");
        let Expr::Block { stmts, .. } = body.expr(body.root) else {
            panic!("expected block");
        };
        let Stmt::Local { init: Some(init), .. } = body.stmt(stmts[0]) else {
            panic!("expected local");
        };
        let Expr::Annotated { annotation: outer, expr: inner, span: outer_span } = body.expr(*init)
        else {
            panic!("expected annotated initializer");
        };
        let Expr::Annotated { annotation, expr, span } = body.expr(*inner) else {
            panic!("expected nested annotation");
        };
        assert!(span.span.start > outer_span.span.start);
        assert_eq!(span.span.end, outer_span.span.end);
        assert_eq!(interner.resolve(&outer.name), "A");
        assert_eq!(interner.resolve(&annotation.name), "B");
        assert_eq!(annotation.args[0].value, "1");
        assert!(matches!(body.expr(*expr), Expr::Call { .. }));
    }

    #[test]
    fn assignment_statements() {
        let (file, _) = parse("fun f() {\n  var total = 0\n  total += 2\n  this.count = total\n}");
        let Decl::Function(function) = &file.decls[0] else {
            panic!("expected function");
        };
        let body = function.body.as_ref().expect("body");
        let Expr::Block { stmts, tail, .. } = body.expr(body.root) else {
            panic!("expected block");
        };
        assert_eq!(stmts.len(), 3);
        assert!(tail.is_none());
    }
}
