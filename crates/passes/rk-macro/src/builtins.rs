//! Built-in macro implementations

use crate::{
    Generated, MacroContext, MacroError, MacroImplementation, TransformFactory, TransformOperation,
    TransformTarget,
};
use rk_intern::{Interner, Symbol};
use rk_ir::{
    Binding, Body, ClassDecl, ClassKind, Decl, Expr, FunctionDecl, KnownNames, Literal, Modifiers,
    Session, Severity, Stmt, TypeRef,
};
use rk_quote::{InferenceResult, QuoteScope, upcast};
use rk_span::FileSpan;

/// Every built-in macro, in registration order
pub(crate) static ALL: &[&dyn MacroImplementation] = &[
    &Product,
    &HelloClassTransform,
    &Factory,
    &Decorator,
    &Log,
    &Immutable,
    &Increment,
];

fn unsupported(id: &'static str, reason: &str) -> MacroError {
    MacroError::UnsupportedTarget {
        id,
        reason: reason.to_string(),
    }
}

/// `fun product(): List<Pair<String, *>>` over the constructor's `val`s
pub struct Product;

impl MacroImplementation for Product {
    fn id(&self) -> &'static str {
        "Product"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let Some(class) = target.as_class() else {
            return Err(unsupported(self.id(), "only applies to classes"));
        };
        let interner = ctx.interner();
        let pairs = class
            .primary_ctor
            .iter()
            .filter(|param| param.binding == Some(Binding::Val))
            .map(|param| {
                let name = interner.resolve(&param.name);
                format!("\"{name}\" to this.{name}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut factory = TransformFactory::new(target, ctx);
        let product = factory.function(&format!(
            "fun product(): List<Pair<String, *>> {{\n    return listOf({pairs})\n}}"
        ))?;
        factory.create("product", product);
        Ok(factory.build())
    }
}

/// Adds `hello()` and `world()`, the second built on the first
pub struct HelloClassTransform;

impl MacroImplementation for HelloClassTransform {
    fn id(&self) -> &'static str {
        "HelloClassTransform"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        if target.as_class().is_none() {
            return Err(unsupported(self.id(), "only applies to classes"));
        }
        let mut factory = TransformFactory::new(target, ctx);
        let hello = factory.function(r#"fun hello(): String = "Hello""#)?;
        factory.create("hello", hello);
        let world = factory.function(r#"fun world(): String = "World!""#)?;
        factory.create("world", world);
        Ok(factory.build())
    }
}

/// Companion `create()` for classes constructible without arguments
pub struct Factory;

impl Factory {
    fn instantiable(class: &ClassDecl) -> bool {
        class.kind == ClassKind::Class
            && class.primary_ctor.is_empty()
            && !class.modifiers.intersects(
                Modifiers::ABSTRACT | Modifiers::SEALED | Modifiers::ENUM | Modifiers::ANNOTATION,
            )
    }
}

impl MacroImplementation for Factory {
    fn id(&self) -> &'static str {
        "Factory"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let Some(class) = target.as_class() else {
            return Err(unsupported(self.id(), "only applies to classes"));
        };
        let mut factory = TransformFactory::new(target, ctx);
        let companion = if Self::instantiable(class) {
            let interner = ctx.interner();
            let name = interner.resolve(&class.name);
            let params = class
                .type_params
                .iter()
                .map(|param| interner.resolve(&param.name))
                .collect::<Vec<_>>()
                .join(", ");
            let (generics, args) = if params.is_empty() {
                (String::new(), String::new())
            } else {
                (format!("<{params}> "), format!("<{params}>"))
            };
            factory.companion(&format!(
                "companion object {{\n    fun {generics}create(): {name}{args} = {name}()\n}}"
            ))?
        } else {
            None
        };
        factory.create("create", companion);
        Ok(factory.build())
    }
}

/// Keeps the original as `<name>__decorated` and replaces the function with
/// a call to it that increments every `Int` argument
pub struct Decorator;

impl Decorator {
    fn replacement(function: &FunctionDecl, decorated: &str, interner: &Interner) -> String {
        let render = |ty: &TypeRef| ty.display(interner).to_string();
        let mut text = String::new();
        if !function.context_receivers.is_empty() {
            let receivers: Vec<String> = function.context_receivers.iter().map(render).collect();
            text.push_str(&format!("context({})\n", receivers.join(", ")));
        }
        text.push_str("fun ");
        if !function.type_params.is_empty() {
            let params: Vec<String> = function
                .type_params
                .iter()
                .map(|param| {
                    let name = interner.resolve(&param.name);
                    match &param.bound {
                        Some(bound) => format!("{name} : {}", render(bound)),
                        None => name.to_string(),
                    }
                })
                .collect();
            text.push_str(&format!("<{}> ", params.join(", ")));
        }
        if let Some(receiver) = &function.receiver {
            text.push_str(&format!("{}.", render(receiver)));
        }
        let params: Vec<String> = function
            .params
            .iter()
            .map(|param| format!("{}: {}", interner.resolve(&param.name), render(&param.ty)))
            .collect();
        text.push_str(&format!(
            "{}({})",
            interner.resolve(&function.name),
            params.join(", ")
        ));
        if let Some(ret) = &function.return_type {
            text.push_str(&format!(": {}", render(ret)));
        }

        let args: Vec<String> = function
            .params
            .iter()
            .map(|param| {
                let name = interner.resolve(&param.name);
                if is_int(&param.ty, interner) {
                    format!("{name} + 1")
                } else {
                    name.to_string()
                }
            })
            .collect();
        let callee = if function.receiver.is_some() {
            format!("this.{decorated}")
        } else {
            decorated.to_string()
        };
        text.push_str(&format!(" = {callee}({})", args.join(", ")));
        text
    }
}

fn is_int(ty: &TypeRef, interner: &Interner) -> bool {
    matches!(
        ty,
        TypeRef::Named { name, args, nullable: false, .. }
            if args.is_empty() && interner.resolve(name) == "Int"
    )
}

impl MacroImplementation for Decorator {
    fn id(&self) -> &'static str {
        "Decorator"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let Some(function) = target.as_function() else {
            return Err(unsupported(self.id(), "only applies to functions"));
        };
        if function.params.iter().any(|param| param.vararg) {
            return Err(unsupported(self.id(), "cannot forward `vararg` parameters"));
        }
        if function.body.is_none() {
            return Err(unsupported(self.id(), "needs a function with a body"));
        }
        let interner = ctx.interner();
        let annotation = ctx.annotation().name;
        let decorated_name = format!("{}__decorated", interner.resolve(&function.name));

        let mut decorated = function.clone();
        decorated.name = interner.intern(&decorated_name);
        decorated.annotations.retain(|a| a.name != annotation);

        let mut factory = TransformFactory::new(target, ctx);
        factory.create("decorated", Some(decorated.clone()));
        let replacement = factory
            .function(&Self::replacement(function, &decorated_name, interner))?
            .map(|mut replacement| {
                replacement.annotations = decorated.annotations;
                replacement.modifiers = function.modifiers;
                Generated::Replacement(replacement)
            });
        factory.create("replace", replacement);
        Ok(factory.build())
    }
}

/// Reports every declaration it is applied to
pub struct Log;

impl MacroImplementation for Log {
    fn id(&self) -> &'static str {
        "Log"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let name = ctx.interner().resolve(&target.name());
        ctx.report(Severity::Warning, format!("found declaration: {name}"));
        Ok(Vec::new())
    }
}

/// Rejects `var` properties, constructor parameters and locals, and calls
/// that produce mutable iterables
pub struct Immutable;

const MUTABLE_VAR: &str = "mutable vars are forbidden in `Immutable` container";
const MUTABLE_ITERABLE: &str = "mutable iterables are forbidden in `Immutable` container";

struct MutabilityScan<'s> {
    session: &'s dyn Session,
    mutable_iterable: Symbol,
    found: Vec<(FileSpan, &'static str)>,
}

impl MutabilityScan<'_> {
    fn class(&mut self, class: &ClassDecl) {
        let scope = QuoteScope::in_class(class.name);
        for param in &class.primary_ctor {
            if param.binding == Some(Binding::Var) {
                self.found.push((param.span, MUTABLE_VAR));
            }
        }
        for member in &class.members {
            match member {
                Decl::Property(property) => {
                    if property.binding == Binding::Var {
                        self.found.push((property.span, MUTABLE_VAR));
                    }
                    if let Some(initializer) = &property.initializer {
                        let inferred = rk_quote::infer_expression(self.session, &scope, initializer);
                        self.body(initializer, &inferred);
                    }
                }
                Decl::Function(function) => self.function(function, &scope),
                Decl::Class(nested) => self.class(nested),
                Decl::TypeAlias(_) => {}
            }
        }
    }

    fn function(&mut self, function: &FunctionDecl, scope: &QuoteScope) {
        if let Some(body) = &function.body {
            let inferred = rk_quote::infer_function(self.session, scope, function);
            self.body(body, &inferred);
        }
    }

    fn body(&mut self, body: &Body, inferred: &InferenceResult) {
        for (_, stmt) in body.stmts.iter() {
            if let Stmt::Local {
                mutable: true,
                span,
                ..
            } = stmt
            {
                self.found.push((*span, MUTABLE_VAR));
            }
        }
        let symbols = self.session.symbols();
        for &call in inferred.calls.keys() {
            let Some(ty) = inferred.types.get(call) else {
                continue;
            };
            if upcast(symbols, ty.non_null(), self.mutable_iterable).is_some() {
                self.found.push((body.expr(call).span(), MUTABLE_ITERABLE));
            }
        }
    }
}

impl MacroImplementation for Immutable {
    fn id(&self) -> &'static str {
        "Immutable"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let mut scan = MutabilityScan {
            session: ctx.session(),
            mutable_iterable: KnownNames::new(ctx.interner()).mutable_iterable,
            found: Vec::new(),
        };
        match target {
            TransformTarget::Class { class, .. } => scan.class(class),
            TransformTarget::Function {
                function,
                container,
            } => {
                let scope = match container.segments.last() {
                    Some(owner) => QuoteScope::in_class(*owner),
                    None => QuoteScope::top_level(),
                };
                scan.function(function, &scope);
            }
            TransformTarget::Expression { .. } => {
                return Err(unsupported(self.id(), "only applies to classes and functions"));
            }
        }
        let mut found = scan.found;
        found.sort_by_key(|(span, _)| (span.file, span.span.start));
        tracing::debug!(count = found.len(), "mutable declarations");
        for (span, message) in found {
            ctx.report_at(Severity::Error, message, span);
        }
        Ok(Vec::new())
    }
}

/// `@Increment 41` becomes `41 + 1`
pub struct Increment;

const NOT_CONSTANT: &str = "@Increment only works on constant expressions of type `Int`";

impl MacroImplementation for Increment {
    fn id(&self) -> &'static str {
        "Increment"
    }

    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let Some((body, expr)) = target.as_expression() else {
            return Err(unsupported(self.id(), "only applies to expressions"));
        };
        let incremented = match body.expr(expr) {
            Expr::Literal {
                value: Literal::Int(value),
                ..
            } => format!("{value} + 1"),
            Expr::Literal {
                value: Literal::Long(value),
                ..
            } => format!("{value}L + 1"),
            Expr::Literal { value, .. } => {
                ctx.report(
                    Severity::Error,
                    format!("found `{value}` but @Increment expects a constant of type `Int`"),
                );
                return Ok(Vec::new());
            }
            _ => {
                ctx.report(Severity::Error, NOT_CONSTANT);
                return Ok(Vec::new());
            }
        };
        let mut factory = TransformFactory::new(target, ctx);
        let replacement = factory.expression(&incremented)?;
        factory.create("increment", replacement);
        Ok(factory.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use crate::{AttachMode, ExpansionMode};
    use pretty_assertions::assert_eq;
    use rk_ir::DiagnosticKind;

    fn expand_class(
        implementation: &dyn MacroImplementation,
        fixture: &Fixture,
        name: &str,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let class = fixture.class(name);
        let ctx = MacroContext::new(&fixture.session, &class.annotations[0], ExpansionMode::Lenient);
        implementation.expand(
            TransformTarget::Class {
                class,
                container: &fixture.root,
            },
            &ctx,
        )
    }

    fn expand_function(
        implementation: &dyn MacroImplementation,
        fixture: &Fixture,
        name: &str,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let function = fixture.function(name);
        let ctx = MacroContext::new(
            &fixture.session,
            &function.annotations[0],
            ExpansionMode::Lenient,
        );
        implementation.expand(
            TransformTarget::Function {
                function,
                container: &fixture.root,
            },
            &ctx,
        )
    }

    fn expand_expression(
        fixture: &Fixture,
        name: &str,
    ) -> Result<Vec<TransformOperation>, MacroError> {
        let function = fixture.function(name);
        let body = function.body.as_ref().expect("body");
        let Expr::Annotated { annotation, .. } = body.expr(body.root) else {
            panic!("expected an annotated body");
        };
        let ctx = MacroContext::new(&fixture.session, annotation, ExpansionMode::Lenient);
        Increment.expand(
            TransformTarget::Expression {
                owner: function.name,
                body,
                expr: body.root,
                container: &fixture.root,
            },
            &ctx,
        )
    }

    fn attached(operation: &TransformOperation) -> (&FunctionDecl, AttachMode) {
        match operation {
            TransformOperation::AttachFunction { function, mode, .. } => (function, *mode),
            _ => panic!("expected a function, got {operation:?}"),
        }
    }

    #[test]
    fn product_lists_constructor_values() {
        let fixture = Fixture::new("@Product data class Sample(val foo: Int, val bar: String)");
        let operations = expand_class(&Product, &fixture, "Sample").expect("expands");
        assert_eq!(operations.len(), 1);
        let (function, mode) = attached(&operations[0]);
        assert_eq!(mode, AttachMode::Add);
        assert_eq!(fixture.session.interner().resolve(&function.name), "product");
        assert!(function.params.is_empty());
    }

    #[test]
    fn product_rejects_functions() {
        let fixture = Fixture::new("@Product fun f() {}");
        let error = expand_function(&Product, &fixture, "f").unwrap_err();
        assert_eq!(error.to_string(), "`@Product` only applies to classes");
    }

    #[test]
    fn hello_adds_two_functions_in_order() {
        let fixture = Fixture::new("@HelloClassTransform class Greeter");
        let operations = expand_class(&HelloClassTransform, &fixture, "Greeter").expect("expands");
        let interner = fixture.session.interner();
        let names: Vec<&str> = operations
            .iter()
            .map(|operation| interner.resolve(&attached(operation).0.name))
            .collect();
        assert_eq!(names, vec!["hello", "world"]);
    }

    #[test]
    fn factory_adds_a_companion_create() {
        let fixture = Fixture::new("@Factory class SimpleProduct");
        let operations = expand_class(&Factory, &fixture, "SimpleProduct").expect("expands");
        let [TransformOperation::AttachCompanionFactory { members, .. }] = operations.as_slice()
        else {
            panic!("expected one companion operation, got {operations:?}");
        };
        assert_eq!(members.len(), 1);
        assert_eq!(
            fixture.session.interner().resolve(&members[0].name()),
            "create"
        );
    }

    #[test]
    fn factory_skips_classes_with_constructor_parameters() {
        let fixture = Fixture::new("@Factory class Point(val x: Int)");
        let operations = expand_class(&Factory, &fixture, "Point").expect("expands");
        assert!(operations.is_empty());
        assert!(fixture.session.diagnostics().is_empty());
    }

    #[test]
    fn decorator_keeps_original_and_replaces_it() {
        let fixture = Fixture::new("@Decorator fun foo(value: Int, label: String): Int = value + 41");
        let operations = expand_function(&Decorator, &fixture, "foo").expect("expands");
        let interner = fixture.session.interner();
        assert_eq!(operations.len(), 2);

        let (decorated, mode) = attached(&operations[0]);
        assert_eq!(mode, AttachMode::Add);
        assert_eq!(interner.resolve(&decorated.name), "foo__decorated");
        assert!(decorated.annotations.is_empty());

        let (replacement, mode) = attached(&operations[1]);
        assert_eq!(mode, AttachMode::Replace);
        assert_eq!(interner.resolve(&replacement.name), "foo");
        assert!(operations.iter().all(|op| op.context().is_root()));
    }

    #[test]
    fn decorator_renders_the_forwarding_call() {
        let fixture = Fixture::new("@Decorator fun foo(value: Int, label: String?): Int = value");
        let text = Decorator::replacement(
            fixture.function("foo"),
            "foo__decorated",
            fixture.session.interner(),
        );
        assert_eq!(
            text,
            "fun foo(value: Int, label: String?): Int = foo__decorated(value + 1, label)"
        );
    }

    #[test]
    fn log_reports_the_declaration() {
        let fixture = Fixture::new("@Log class Logged");
        let operations = expand_class(&Log, &fixture, "Logged").expect("expands");
        assert!(operations.is_empty());
        let diagnostics = fixture.session.diagnostics().snapshot();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MacroReport);
        assert_eq!(diagnostics[0].message, "found declaration: Logged");
    }

    #[test]
    fn immutable_reports_every_var() {
        let source = r"
            @Immutable
            class Account(var balance: Int, val id: String) {
                var history: Int = 0
                fun touch() {
                    var local = 1
                    val fixed = 2
                }
            }
        ";
        let fixture = Fixture::new(source);
        expand_class(&Immutable, &fixture, "Account").expect("expands");
        let diagnostics = fixture.session.diagnostics().snapshot();
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().all(|d| d.is_error() && d.message == MUTABLE_VAR));
    }

    #[test]
    fn immutable_reports_calls_producing_mutable_iterables() {
        let source = r"
            @Immutable
            class Inventory {
                val items = mutableListOf(1, 2)
                val fixed = listOf(1, 2)
                fun restock(): Int {
                    val extra = mutableListOf(3)
                    return extra.size
                }
            }

            @Immutable
            fun snapshot(): List<Int> = listOf(1)
        ";
        let fixture = Fixture::new(source);
        expand_class(&Immutable, &fixture, "Inventory").expect("expands");
        expand_function(&Immutable, &fixture, "snapshot").expect("expands");
        let found: Vec<(&str, String)> = fixture
            .session
            .diagnostics()
            .snapshot()
            .into_iter()
            .map(|d| (&source[d.span.range()], d.message))
            .collect();
        assert_eq!(
            found,
            vec![
                ("mutableListOf(1, 2)", MUTABLE_ITERABLE.to_string()),
                ("mutableListOf(3)", MUTABLE_ITERABLE.to_string()),
            ]
        );
    }

    #[test]
    fn increment_adds_one_to_int_and_long_constants() {
        let fixture = Fixture::new("fun int() = @Increment 41\nfun long() = @Increment 41L");
        for (name, rendered) in [("int", "41 + 1"), ("long", "41L + 1")] {
            let operations = expand_expression(&fixture, name).expect("expands");
            let [TransformOperation::ReplaceExpression { at, replacement, context }] =
                operations.as_slice()
            else {
                panic!("expected one replacement, got {operations:?}");
            };
            let function = fixture.function(name);
            let body = function.body.as_ref().expect("body");
            assert_eq!(*at, body.expr(body.root).span(), "{rendered}");
            assert!(context.is_root());
            assert!(matches!(
                replacement.expr(replacement.root),
                Expr::Binary { op: rk_ir::BinaryOp::Add, .. }
            ));
        }
        assert!(fixture.session.diagnostics().is_empty());
    }

    #[test]
    fn increment_rejects_other_expressions() {
        let fixture = Fixture::new("fun text() = @Increment \"x\"\nfun call() = @Increment listOf(1)");
        assert!(expand_expression(&fixture, "text").expect("reports").is_empty());
        assert!(expand_expression(&fixture, "call").expect("reports").is_empty());
        let messages: Vec<String> = fixture
            .session
            .diagnostics()
            .snapshot()
            .into_iter()
            .filter(|d| d.is_error())
            .map(|d| d.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "found `\"x\"` but @Increment expects a constant of type `Int`".to_string(),
                NOT_CONSTANT.to_string(),
            ]
        );
    }

    #[test]
    fn increment_rejects_declarations() {
        let fixture = Fixture::new("@Increment fun f() = 1");
        let function = fixture.function("f");
        let ctx = MacroContext::new(&fixture.session, &function.annotations[0], ExpansionMode::Lenient);
        let error = Increment
            .expand(
                TransformTarget::Function {
                    function,
                    container: &fixture.root,
                },
                &ctx,
            )
            .unwrap_err();
        assert_eq!(error.to_string(), "`@Increment` only applies to expressions");
    }
}
