//! Quasiquote resolution
//!
//! A quoted fragment is source text a macro wants to splice into the tree.
//! [`resolve`] classifies it by its leading token, parses it as the matching
//! declaration kind or as an expression, and binds every name against the
//! session's symbol table and the built-in prelude. The result is a
//! [`TypedNode`] whose static type is known, or a [`QuoteError`] listing
//! everything that failed to bind. [`resolve_expression`] does the same for
//! text spliced in place of an expression.
//!
//! [`infer_function`] and [`infer_expression`] run the same inference over
//! code of the session without failing, for passes that only need call
//! resolution.

mod bind;
mod error;
mod prelude;
mod unify;

pub use bind::{CallDispatch, ResolvedCall};
pub use error::{BindError, QuoteError};
pub use prelude::{PRELUDE_SOURCE, build_symbols, is_native, prelude};
pub use unify::{Snapshot, Unifier, UnifyError, ancestors, upcast};

use bind::{Binder, Bound};
use rk_arena::ArenaMap;
use rk_intern::Symbol;
use rk_ir::{
    Body, ClassDecl, Decl, ExprId, FunctionDecl, FunctionSignature, PropertyDecl, Session, Ty,
    TypeAliasDecl,
};
use rk_lexer::{Classification, classify};
use rk_span::FileId;
use rustc_hash::FxHashMap;

/// What the caller intends to do with a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentRole {
    /// Spliced as a declaration
    Declaration,
    /// Spliced as an expression
    Expression,
}

/// Quoted source text with its intended role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    /// Source text
    pub text: String,
    /// Intended role
    pub role: FragmentRole,
}

impl SourceFragment {
    /// A fragment to be spliced as a declaration
    #[must_use]
    pub fn declaration(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: FragmentRole::Declaration,
        }
    }

    /// A fragment to be spliced as an expression
    #[must_use]
    pub fn expression(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: FragmentRole::Expression,
        }
    }
}

/// Where a fragment will land.
///
/// `pending` holds signatures emitted earlier in the same expansion batch;
/// they are not in the session's table yet but later fragments may call
/// them.
#[derive(Debug, Clone, Default)]
pub struct QuoteScope {
    /// Class the fragment is spliced into; its members are in scope through
    /// an implicit `this`
    pub owner: Option<Symbol>,
    /// Locals visible at the splice point
    pub locals: Vec<(Symbol, Ty)>,
    /// Functions emitted earlier in the batch
    pub pending: Vec<FunctionSignature>,
    /// Result type of the enclosing function, for `return` fragments
    pub return_type: Option<Ty>,
}

impl QuoteScope {
    /// Scope of a top-level declaration
    #[must_use]
    pub fn top_level() -> Self {
        Self::default()
    }

    /// Scope of a member of class `owner`
    #[must_use]
    pub fn in_class(owner: Symbol) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Adds a local visible at the splice point
    #[must_use]
    pub fn with_local(mut self, name: Symbol, ty: Ty) -> Self {
        self.locals.push((name, ty));
        self
    }

    /// Records a function emitted earlier in the batch
    pub fn add_pending(&mut self, signature: FunctionSignature) {
        self.pending.push(signature);
    }
}

/// A parsed and bound fragment
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedNode {
    /// Class, object or interface
    Class(ClassDecl),
    /// Function
    Function(FunctionDecl),
    /// Property
    Property(PropertyDecl),
    /// Type alias
    TypeAlias(TypeAliasDecl),
    /// Expression in its own body
    Expression(Body),
}

impl ResolvedNode {
    fn from_decl(decl: Decl) -> Self {
        match decl {
            Decl::Class(class) => Self::Class(class),
            Decl::Function(function) => Self::Function(function),
            Decl::Property(property) => Self::Property(property),
            Decl::TypeAlias(alias) => Self::TypeAlias(alias),
        }
    }

    /// The declaration, or `None` for expressions
    #[must_use]
    pub fn into_decl(self) -> Option<Decl> {
        match self {
            Self::Class(class) => Some(Decl::Class(class)),
            Self::Function(function) => Some(Decl::Function(function)),
            Self::Property(property) => Some(Decl::Property(property)),
            Self::TypeAlias(alias) => Some(Decl::TypeAlias(alias)),
            Self::Expression(_) => None,
        }
    }

    /// The expression body, or `None` for declarations
    #[must_use]
    pub fn into_body(self) -> Option<Body> {
        match self {
            Self::Expression(body) => Some(body),
            _ => None,
        }
    }
}

/// A resolved fragment with its static type
#[derive(Debug, Clone)]
pub struct TypedNode {
    /// The fragment's tree
    pub node: ResolvedNode,
    /// Static type; never contains [`Ty::Error`]
    pub ty: Ty,
    /// Type of every expression of the node's main body
    pub types: ArenaMap<ExprId, Ty>,
    /// Resolved named calls of the node's main body
    pub calls: FxHashMap<ExprId, ResolvedCall>,
}

/// Lenient inference over a function of the session
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Function type
    pub ty: Ty,
    /// Type of every expression of the body
    pub types: ArenaMap<ExprId, Ty>,
    /// Resolved named calls of the body
    pub calls: FxHashMap<ExprId, ResolvedCall>,
    /// Binding errors, which lenient callers may ignore
    pub errors: Vec<BindError>,
}

/// Resolves a quoted fragment against the session.
///
/// Returns `Ok(None)` exactly when the fragment's leading token classifies
/// as neither a declaration nor a control-flow expression.
///
/// # Errors
///
/// [`QuoteError::Parse`] for malformed text, [`QuoteError::RoleMismatch`]
/// when the fragment's kind contradicts its role, and [`QuoteError::Bind`]
/// when a name does not resolve or a type does not conform.
#[tracing::instrument(level = "debug", skip_all, fields(fragment = %fragment.text))]
pub fn resolve(
    session: &dyn Session,
    fragment: &SourceFragment,
    scope: &QuoteScope,
) -> Result<Option<TypedNode>, QuoteError> {
    let classification = classify(&fragment.text);
    let role_fits = match classification {
        Classification::None => {
            tracing::debug!("fragment does not classify");
            return Ok(None);
        }
        Classification::Declaration(_) => fragment.role == FragmentRole::Declaration,
        Classification::Expression(_) => fragment.role == FragmentRole::Expression,
    };
    if !role_fits {
        return Err(QuoteError::RoleMismatch {
            expected: fragment.role,
            found: classification,
        });
    }

    let interner = session.interner();
    let malformed = |error: rk_parser::ParseError| QuoteError::Parse {
        kind: classification,
        fragment: fragment.text.clone(),
        error,
    };
    let mut binder = Binder::new(session, scope);
    let (node, ty) = match classification {
        Classification::Declaration(kind) => {
            let decl = rk_parser::parse_declaration(&fragment.text, kind, FileId::SYNTHETIC, interner)
                .map_err(malformed)?;
            let ty = binder.bind_decl(&decl);
            (ResolvedNode::from_decl(decl), ty)
        }
        _ => {
            let body = rk_parser::parse_expression(&fragment.text, FileId::SYNTHETIC, interner)
                .map_err(malformed)?;
            let ty = binder.bind_expression(&body);
            (ResolvedNode::Expression(body), ty)
        }
    };
    typed(binder, node, &ty, &fragment.text, interner).map(Some)
}

/// Resolves `text` as an expression spliced in place of another one.
///
/// Unlike [`resolve`], any expression is accepted regardless of its leading
/// token.
///
/// # Errors
///
/// [`QuoteError::Parse`] for malformed text and [`QuoteError::Bind`] when a
/// name does not resolve or a type does not conform.
#[tracing::instrument(level = "debug", skip_all, fields(fragment = %text))]
pub fn resolve_expression(
    session: &dyn Session,
    text: &str,
    scope: &QuoteScope,
) -> Result<TypedNode, QuoteError> {
    let interner = session.interner();
    let body = rk_parser::parse_expression(text, FileId::SYNTHETIC, interner).map_err(|error| {
        QuoteError::Parse {
            kind: classify(text),
            fragment: text.to_string(),
            error,
        }
    })?;
    let mut binder = Binder::new(session, scope);
    let ty = binder.bind_expression(&body);
    typed(binder, ResolvedNode::Expression(body), &ty, text, interner)
}

fn typed(
    binder: Binder<'_>,
    node: ResolvedNode,
    ty: &Ty,
    text: &str,
    interner: &rk_intern::Interner,
) -> Result<TypedNode, QuoteError> {
    let ty = binder.finish_ty(ty);
    let Bound {
        types,
        calls,
        errors,
    } = binder.finish();

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "fragment does not bind");
        return Err(QuoteError::Bind { errors });
    }
    if ty.contains_error() {
        return Err(QuoteError::Bind {
            errors: vec![BindError::InvalidCall {
                message: format!("fragment has no valid type: `{}`", ty.display(interner)),
                span: rk_span::FileSpan::synthetic(rk_span::Span::new(
                    0,
                    u32::try_from(text.len()).unwrap_or(u32::MAX),
                )),
            }],
        });
    }
    tracing::debug!(ty = %ty.display(interner), "resolved fragment");
    Ok(TypedNode {
        node,
        ty,
        types,
        calls,
    })
}

/// Infers the types and calls of `function` without failing
#[must_use]
pub fn infer_function(
    session: &dyn Session,
    scope: &QuoteScope,
    function: &FunctionDecl,
) -> InferenceResult {
    let mut binder = Binder::new(session, scope);
    let ty = binder.bind_function(function);
    let ty = binder.finish_ty(&ty);
    let Bound {
        types,
        calls,
        errors,
    } = binder.finish();
    InferenceResult {
        ty,
        types,
        calls,
        errors,
    }
}

/// Infers the types and calls of a standalone body, such as a property
/// initializer, without failing
#[must_use]
pub fn infer_expression(session: &dyn Session, scope: &QuoteScope, body: &Body) -> InferenceResult {
    let mut binder = Binder::new(session, scope);
    let ty = binder.bind_expression(body);
    let ty = binder.finish_ty(&ty);
    let Bound {
        types,
        calls,
        errors,
    } = binder.finish();
    InferenceResult {
        ty,
        types,
        calls,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_intern::Interner;
    use rk_ir::{CompilationSession, Expr, SourceFile};
    use rk_lexer::DeclarationKind;

    fn session(source: &str) -> CompilationSession {
        let interner = Interner::new();
        let file = rk_parser::parse_file(source, FileId(0), &interner).expect("parses");
        let symbols = build_symbols(&interner, &file).expect("prelude parses");
        CompilationSession::new(interner, symbols)
    }

    fn render(session: &CompilationSession, ty: &Ty) -> String {
        ty.display(session.interner()).to_string()
    }

    fn function<'a>(file: &'a SourceFile, name: &str, interner: &Interner) -> &'a FunctionDecl {
        let name = interner.intern(name);
        file.decls
            .iter()
            .find_map(|decl| match decl {
                Decl::Function(function) if function.name == name => Some(function),
                _ => None,
            })
            .expect("function exists")
    }

    #[test]
    fn unclassified_fragments_resolve_to_none() {
        let session = session("");
        let scope = QuoteScope::top_level();
        for text in ["foo.bar()", "", "   ", "@Foo class X", "1 + 2"] {
            let fragment = SourceFragment::expression(text);
            assert!(resolve(&session, &fragment, &scope).expect("no error").is_none());
        }
    }

    #[test]
    fn product_member_resolves_inside_class() {
        let session = session("data class Sample(val foo: Int, val bar: String)");
        let scope = QuoteScope::in_class(session.interner().intern("Sample"));
        let fragment = SourceFragment::declaration(
            r#"fun product(): List<Pair<String, *>> = listOf("foo" to this.foo, "bar" to bar)"#,
        );
        let node = resolve(&session, &fragment, &scope)
            .expect("resolves")
            .expect("classified");
        assert!(matches!(node.node, ResolvedNode::Function(_)));
        assert_eq!(render(&session, &node.ty), "() -> List<Pair<String, *>>");
    }

    #[test]
    fn heterogeneous_list_widens_to_common_supertype() {
        let session = session("");
        let fragment =
            SourceFragment::expression(r#"if (true) listOf("a" to 1, "b" to "c") else emptyList()"#);
        let node = resolve(&session, &fragment, &QuoteScope::top_level())
            .expect("resolves")
            .expect("classified");
        assert_eq!(render(&session, &node.ty), "List<Pair<String, Any>>");
    }

    #[test]
    fn unresolved_reference_fails_binding() {
        let session = session("");
        let fragment = SourceFragment::declaration("fun broken(): Int = missing()");
        let error = resolve(&session, &fragment, &QuoteScope::top_level()).unwrap_err();
        let QuoteError::Bind { errors } = error else {
            panic!("expected a bind error, got {error:?}");
        };
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            BindError::UnresolvedReference { name, .. } if name == "missing"
        ));
    }

    #[test]
    fn declared_type_mismatch_fails_binding() {
        let session = session("");
        let fragment = SourceFragment::declaration(r#"fun wrong(): Int = "text""#);
        let error = resolve(&session, &fragment, &QuoteScope::top_level()).unwrap_err();
        let QuoteError::Bind { errors } = error else {
            panic!("expected a bind error, got {error:?}");
        };
        assert_eq!(
            errors[0].to_string(),
            "type mismatch: expected `Int`, found `String`"
        );
    }

    #[test]
    fn malformed_fragment_is_a_parse_error() {
        let session = session("");
        let fragment = SourceFragment::declaration("fun (): Int = 1");
        let error = resolve(&session, &fragment, &QuoteScope::top_level()).unwrap_err();
        let QuoteError::Parse { kind, fragment: text, .. } = &error else {
            panic!("expected a parse error, got {error:?}");
        };
        assert_eq!(*kind, Classification::Declaration(DeclarationKind::Function));
        assert_eq!(text, "fun (): Int = 1");
        assert!(
            error.to_string().starts_with("malformed quoted fragment, expected a function declaration: "),
            "{error}"
        );
        let diagnostics = error.to_diagnostics(rk_span::FileSpan::synthetic(rk_span::Span::point(0)));
        assert!(diagnostics[0].message.contains("function declaration"));
    }

    #[test]
    fn spliced_expressions_need_no_leading_keyword() {
        let session = session("");
        let scope = QuoteScope::top_level();
        let typed = resolve_expression(&session, "41 + 1", &scope).expect("resolves");
        assert_eq!(render(&session, &typed.ty), "Int");
        assert!(matches!(typed.node, ResolvedNode::Expression(_)));

        let error = resolve_expression(&session, "41 +", &scope).unwrap_err();
        assert!(
            error.to_string().starts_with("malformed quoted fragment, expected a plain expression: "),
            "{error}"
        );
        assert!(matches!(
            resolve_expression(&session, "missing + 1", &scope),
            Err(QuoteError::Bind { .. })
        ));
    }

    #[test]
    fn role_must_match_classification() {
        let session = session("");
        let fragment = SourceFragment::declaration("if (true) 1 else 2");
        let error = resolve(&session, &fragment, &QuoteScope::top_level()).unwrap_err();
        assert!(matches!(
            error,
            QuoteError::RoleMismatch {
                expected: FragmentRole::Declaration,
                found: Classification::Expression(_),
            }
        ));
    }

    #[test]
    fn pending_functions_of_the_batch_are_callable() {
        let session = session("class Greeter");
        let interner = session.interner();
        let greeter = interner.intern("Greeter");
        let mut scope = QuoteScope::in_class(greeter);

        let hello = resolve(
            &session,
            &SourceFragment::declaration(r#"fun hello(): String = "Hello""#),
            &scope,
        )
        .expect("resolves")
        .expect("classified");
        let Some(Decl::Function(hello)) = hello.node.into_decl() else {
            panic!("expected a function");
        };
        scope.add_pending(FunctionSignature::of(&hello, Some(greeter)));

        let world = resolve(
            &session,
            &SourceFragment::declaration(r#"fun world(): String = hello() + " World!""#),
            &scope,
        );
        assert!(world.expect("resolves").is_some());
    }

    #[test]
    fn lambda_parameters_come_from_the_expected_function_type() {
        let session = session("");
        let interner = session.interner();
        let list_of_strings = Ty::Class {
            name: interner.intern("List"),
            args: vec![Ty::String],
        };
        let scope = QuoteScope::top_level().with_local(interner.intern("items"), list_of_strings);
        let fragment = SourceFragment::expression("return items.map { it.length }");
        let scope = QuoteScope {
            return_type: Some(Ty::Class {
                name: interner.intern("List"),
                args: vec![Ty::Int],
            }),
            ..scope
        };
        let node = resolve(&session, &fragment, &scope)
            .expect("resolves")
            .expect("classified");
        assert_eq!(render(&session, &node.ty), "Nothing");
    }

    #[test]
    fn companion_factory_fragment_resolves() {
        let session = session("class SimpleProduct");
        let scope = QuoteScope::in_class(session.interner().intern("SimpleProduct"));
        let fragment = SourceFragment::declaration(
            "companion object { fun create(): SimpleProduct = SimpleProduct() }",
        );
        let node = resolve(&session, &fragment, &scope)
            .expect("resolves")
            .expect("classified");
        let ResolvedNode::Class(companion) = node.node else {
            panic!("expected a class");
        };
        assert!(companion.is_companion());
    }

    #[test]
    fn context_receiver_calls_dispatch_through_the_context() {
        let source = r#"
            class Raise<E> {
                @DisallowLambdaCapture
                fun raise(value: E): Nothing = error(value.toString())
            }

            context(Raise<String>)
            fun failing(): Int {
                val block = { raise("boom") }
                return 1
            }
        "#;
        let interner = Interner::new();
        let file = rk_parser::parse_file(source, FileId(0), &interner).expect("parses");
        let symbols = build_symbols(&interner, &file).expect("prelude parses");
        let session = CompilationSession::new(interner.clone(), symbols);

        let failing = function(&file, "failing", &interner);
        let result = infer_function(&session, &QuoteScope::top_level(), failing);
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let body = failing.body.as_ref().expect("body");
        let raise = interner.intern("raise");
        let (_, call) = result
            .calls
            .iter()
            .find(|(id, _)| matches!(body.expr(**id), Expr::Call { name, .. } if *name == raise))
            .expect("raise resolved");
        assert_eq!(call.dispatch, CallDispatch::Context);
        assert!(
            call.signature
                .annotation(interner.intern("DisallowLambdaCapture"))
                .is_some()
        );
    }

    #[test]
    fn lenient_inference_keeps_going_after_errors() {
        let source = "fun broken(): Int { val x = missing(); return 1 }";
        let interner = Interner::new();
        let file = rk_parser::parse_file(source, FileId(0), &interner).expect("parses");
        let symbols = build_symbols(&interner, &file).expect("prelude parses");
        let session = CompilationSession::new(interner.clone(), symbols);

        let broken = function(&file, "broken", &interner);
        let result = infer_function(&session, &QuoteScope::top_level(), broken);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(render(&session, &result.ty), "() -> Int");
    }
}
