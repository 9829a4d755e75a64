//! The transform factory
//!
//! Macros describe their output as a list of rules. Each rule quotes source
//! text through [`TransformFactory::function`],
//! [`TransformFactory::companion`] or [`TransformFactory::expression`] and
//! hands the result to
//! [`TransformFactory::create`], which turns it into a
//! [`TransformOperation`]. Functions created by earlier rules are visible to
//! the fragments of later ones.

use crate::{AttachMode, ExpansionMode, MacroContext, MacroError, TransformOperation, TransformTarget};
use rk_ir::{
    Body, ClassDecl, Decl, DeclPath, Diagnostic, DiagnosticKind, FunctionDecl, FunctionSignature,
};
use rk_lexer::DeclarationKind;
use rk_quote::{QuoteScope, SourceFragment};

/// Output of one rule
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    /// A new member (class targets) or sibling (function targets)
    Function(FunctionDecl),
    /// Replaces the function of the same name
    Replacement(FunctionDecl),
    /// Members for the companion object
    Companion(ClassDecl),
    /// Replaces the annotated expression
    Expression(Body),
}

impl From<FunctionDecl> for Generated {
    fn from(function: FunctionDecl) -> Self {
        Self::Function(function)
    }
}

impl From<ClassDecl> for Generated {
    fn from(companion: ClassDecl) -> Self {
        Self::Companion(companion)
    }
}

impl From<Body> for Generated {
    fn from(body: Body) -> Self {
        Self::Expression(body)
    }
}

/// Collects the operations of one expansion
pub struct TransformFactory<'a> {
    target: TransformTarget<'a>,
    ctx: &'a MacroContext<'a>,
    scope: QuoteScope,
    operations: Vec<TransformOperation>,
}

impl<'a> TransformFactory<'a> {
    /// Factory for expanding `target`
    #[must_use]
    pub fn new(target: TransformTarget<'a>, ctx: &'a MacroContext<'a>) -> Self {
        let owner = match target {
            TransformTarget::Class { class, .. } => Some(class.name),
            TransformTarget::Function { container, .. }
            | TransformTarget::Expression { container, .. } => container.segments.last().copied(),
        };
        Self {
            target,
            ctx,
            scope: QuoteScope {
                owner,
                ..QuoteScope::default()
            },
            operations: Vec::new(),
        }
    }

    /// The declaration being expanded
    #[must_use]
    pub fn target(&self) -> TransformTarget<'a> {
        self.target
    }

    /// The expansion context
    #[must_use]
    pub fn context(&self) -> &'a MacroContext<'a> {
        self.ctx
    }

    /// Quotes a function. `Ok(None)` when the text is not a declaration.
    ///
    /// # Errors
    ///
    /// Fails when the fragment does not parse or bind, or declares something
    /// other than a function.
    pub fn function(&self, code: &str) -> Result<Option<FunctionDecl>, MacroError> {
        match self.quote(code)? {
            None => Ok(None),
            Some(Decl::Function(function)) => Ok(Some(function)),
            Some(other) => Err(MacroError::UnexpectedFragment {
                expected: DeclarationKind::Function,
                found: rk_parser::declaration_kind_of(&other),
            }),
        }
    }

    /// Quotes a `companion object`. `Ok(None)` when the text is not a
    /// declaration.
    ///
    /// # Errors
    ///
    /// Fails when the fragment does not parse or bind, or declares something
    /// other than a class.
    pub fn companion(&self, code: &str) -> Result<Option<ClassDecl>, MacroError> {
        match self.quote(code)? {
            None => Ok(None),
            Some(Decl::Class(class)) => Ok(Some(class)),
            Some(other) => Err(MacroError::UnexpectedFragment {
                expected: DeclarationKind::Class,
                found: rk_parser::declaration_kind_of(&other),
            }),
        }
    }

    /// Quotes an expression to splice in place of the annotated one.
    /// `Ok(None)` when the text is blank.
    ///
    /// # Errors
    ///
    /// Fails when the fragment does not parse or bind.
    pub fn expression(&self, code: &str) -> Result<Option<Body>, MacroError> {
        if code.trim().is_empty() {
            return Ok(None);
        }
        let typed = rk_quote::resolve_expression(self.ctx.session(), code, &self.scope)?;
        Ok(typed.node.into_body())
    }

    fn quote(&self, code: &str) -> Result<Option<Decl>, MacroError> {
        let fragment = SourceFragment::declaration(code);
        let node = rk_quote::resolve(self.ctx.session(), &fragment, &self.scope)?;
        Ok(node.and_then(|node| node.node.into_decl()))
    }

    /// Records the output of rule `rule`; an absent output skips the rule
    pub fn create(&mut self, rule: &str, generated: Option<impl Into<Generated>>) {
        let Some(generated) = generated else {
            self.skip(rule);
            return;
        };
        let context = self.target.member_context();
        let operation = match generated.into() {
            Generated::Function(function) => {
                self.pend(&context, &function);
                TransformOperation::AttachFunction {
                    context,
                    function,
                    mode: AttachMode::Add,
                }
            }
            Generated::Replacement(function) => TransformOperation::AttachFunction {
                context,
                function,
                mode: AttachMode::Replace,
            },
            Generated::Companion(companion) => TransformOperation::AttachCompanionFactory {
                context,
                members: companion.members,
            },
            Generated::Expression(replacement) => TransformOperation::ReplaceExpression {
                context,
                at: self.target.span(),
                replacement,
            },
        };
        tracing::debug!(rule, "rule produced an operation");
        self.operations.push(operation);
    }

    /// Makes a generated function callable from later fragments
    fn pend(&mut self, context: &DeclPath, function: &FunctionDecl) {
        let owner = context.segments.last().copied();
        self.scope
            .add_pending(FunctionSignature::of(function, owner));
    }

    fn skip(&self, rule: &str) {
        tracing::debug!(rule, mode = ?self.ctx.mode(), "rule input absent, skipping");
        if self.ctx.mode() == ExpansionMode::Strict {
            let macro_name = self.ctx.interner().resolve(&self.ctx.annotation().name);
            self.ctx.session().report(Diagnostic::warning(
                DiagnosticKind::SkippedRule,
                format!("rule `{rule}` of `@{macro_name}` skipped: its input is absent"),
                self.ctx.span(),
            ));
        }
    }

    /// The operations in rule order
    #[must_use]
    pub fn build(self) -> Vec<TransformOperation> {
        self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Fixture;
    use pretty_assertions::assert_eq;
    use rk_ir::Session;

    fn hello_world(fixture: &Fixture, mode: ExpansionMode) -> Vec<TransformOperation> {
        let class = fixture.class("Greeter");
        let ctx = MacroContext::new(&fixture.session, &class.annotations[0], mode);
        let target = TransformTarget::Class {
            class,
            container: &fixture.root,
        };
        let mut factory = TransformFactory::new(target, &ctx);
        let hello = factory
            .function(r#"fun hello(): String = "Hello""#)
            .expect("quotes");
        factory.create("hello", hello);
        let world = factory
            .function(r#"fun world(): String = hello() + " World!""#)
            .expect("quotes");
        factory.create("world", world);
        factory.build()
    }

    #[test]
    fn later_rules_see_earlier_functions() {
        let fixture = Fixture::new("@HelloClassTransform class Greeter");
        let operations = hello_world(&fixture, ExpansionMode::Lenient);
        assert_eq!(operations.len(), 2);
        let greeter = fixture.session.interner().intern("Greeter");
        for operation in &operations {
            assert!(matches!(
                operation,
                TransformOperation::AttachFunction {
                    mode: AttachMode::Add,
                    ..
                }
            ));
            assert_eq!(operation.context().segments, vec![greeter]);
        }
    }

    #[test]
    fn identical_targets_build_identical_operations() {
        let fixture = Fixture::new("@HelloClassTransform class Greeter");
        let first = hello_world(&fixture, ExpansionMode::Lenient);
        let second = hello_world(&fixture, ExpansionMode::Lenient);
        assert_eq!(first, second);
    }

    #[test]
    fn absent_input_is_skipped_per_mode() {
        let fixture = Fixture::new("@Factory class Plain(val x: Int)");
        let class = fixture.class("Plain");
        let annotation = &class.annotations[0];
        let target = TransformTarget::Class {
            class,
            container: &fixture.root,
        };

        let lenient = MacroContext::new(&fixture.session, annotation, ExpansionMode::Lenient);
        let mut factory = TransformFactory::new(target, &lenient);
        factory.create("create", None::<ClassDecl>);
        assert!(factory.build().is_empty());
        assert!(fixture.session.diagnostics().is_empty());

        let strict = MacroContext::new(&fixture.session, annotation, ExpansionMode::Strict);
        let mut factory = TransformFactory::new(target, &strict);
        factory.create("create", None::<ClassDecl>);
        assert!(factory.build().is_empty());
        let diagnostics = fixture.session.diagnostics().snapshot();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::SkippedRule);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn wrong_fragment_kind_is_an_error() {
        let fixture = Fixture::new("@Log class Greeter");
        let class = fixture.class("Greeter");
        let ctx = MacroContext::new(&fixture.session, &class.annotations[0], ExpansionMode::Lenient);
        let target = TransformTarget::Class {
            class,
            container: &fixture.root,
        };
        let factory = TransformFactory::new(target, &ctx);
        let error = factory
            .function(r#"val greeting: String = "hi""#)
            .unwrap_err();
        assert!(matches!(
            error,
            MacroError::UnexpectedFragment {
                expected: DeclarationKind::Function,
                found: DeclarationKind::Property,
            }
        ));
        assert_eq!(factory.function("hello()").expect("not an error"), None);
    }
}
