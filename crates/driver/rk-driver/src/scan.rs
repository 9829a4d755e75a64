//! Finding the annotations that trigger macros

use rk_intern::Symbol;
use rk_ir::{
    Annotation, Body, Decl, DeclPath, Expr, ExprId, KnownNames, Modifiers, Session, SourceFile,
    find_annotation,
};
use rk_macro::{MacroError, MacroImplementation, MacroRegistry, TransformTarget};
use rustc_hash::FxHashSet;

/// Where an annotation sits
pub(crate) enum Site<'a> {
    Decl(&'a Decl),
    /// An [`Expr::Annotated`] node inside the body of `owner`
    Expression {
        owner: Symbol,
        body: &'a Body,
        expr: ExprId,
    },
}

/// One annotation to expand
pub(crate) struct MacroUse<'a> {
    pub site: Site<'a>,
    pub container: DeclPath,
    pub annotation: &'a Annotation,
    pub implementation: &'static dyn MacroImplementation,
}

impl MacroUse<'_> {
    pub fn target(&self) -> Option<TransformTarget<'_>> {
        match self.site {
            Site::Decl(decl) => TransformTarget::of(decl, &self.container),
            Site::Expression { owner, body, expr } => Some(TransformTarget::Expression {
                owner,
                body,
                expr,
                container: &self.container,
            }),
        }
    }
}

/// Collects macro uses in source order, outer declarations before their
/// members and bodies. Meta annotations without an implementation are
/// reported.
pub(crate) fn scan<'a>(
    file: &'a SourceFile,
    registry: &MacroRegistry,
    session: &dyn Session,
) -> Vec<MacroUse<'a>> {
    let known = KnownNames::new(session.interner());
    let mut meta = FxHashSet::default();
    collect_meta(&file.decls, known.meta, &mut meta);

    let mut scanner = Scanner {
        registry,
        session,
        meta,
        uses: Vec::new(),
    };
    scanner.decls(&file.decls, &mut DeclPath::root());
    tracing::debug!(uses = scanner.uses.len(), "scanned annotations");
    scanner.uses
}

/// Names of `@Meta annotation class` declarations
fn collect_meta(decls: &[Decl], meta_name: Symbol, found: &mut FxHashSet<Symbol>) {
    for decl in decls {
        if let Decl::Class(class) = decl {
            if class.modifiers.contains(Modifiers::ANNOTATION)
                && find_annotation(&class.annotations, meta_name).is_some()
            {
                found.insert(class.name);
            }
            collect_meta(&class.members, meta_name, found);
        }
    }
}

struct Scanner<'a, 's> {
    registry: &'s MacroRegistry,
    session: &'s dyn Session,
    meta: FxHashSet<Symbol>,
    uses: Vec<MacroUse<'a>>,
}

impl<'a> Scanner<'a, '_> {
    fn decls(&mut self, decls: &'a [Decl], path: &mut DeclPath) {
        for decl in decls {
            self.annotations(decl, path);
            match decl {
                Decl::Class(class) => {
                    path.segments.push(class.name);
                    self.decls(&class.members, path);
                    path.segments.pop();
                }
                Decl::Function(function) => {
                    if let Some(body) = &function.body {
                        self.expressions(function.name, body, path);
                    }
                }
                Decl::Property(property) => {
                    if let Some(initializer) = &property.initializer {
                        self.expressions(property.name, initializer, path);
                    }
                }
                Decl::TypeAlias(_) => {}
            }
        }
    }

    fn lookup(&self, annotation: &Annotation) -> Option<&'static dyn MacroImplementation> {
        let name = self.session.interner().resolve(&annotation.name);
        match self.registry.lookup(name) {
            Ok(implementation) => Some(implementation),
            Err(error) => {
                if self.meta.contains(&annotation.name) {
                    self.session.report(error.to_diagnostic(annotation.span));
                }
                None
            }
        }
    }

    fn annotations(&mut self, decl: &'a Decl, path: &DeclPath) {
        for annotation in decl.annotations() {
            let Some(implementation) = self.lookup(annotation) else {
                continue;
            };
            if matches!(decl, Decl::Property(_) | Decl::TypeAlias(_)) {
                let error = MacroError::UnsupportedTarget {
                    id: implementation.id(),
                    reason: "only applies to classes and functions".to_string(),
                };
                for diagnostic in error.to_diagnostics(annotation.span) {
                    self.session.report(diagnostic);
                }
                continue;
            }
            self.uses.push(MacroUse {
                site: Site::Decl(decl),
                container: path.clone(),
                annotation,
                implementation,
            });
        }
    }

    fn expressions(&mut self, owner: Symbol, body: &'a Body, path: &DeclPath) {
        let mut annotated: Vec<(ExprId, &'a Annotation)> = body
            .exprs
            .iter()
            .filter_map(|(id, expr)| match expr {
                Expr::Annotated { annotation, .. } => Some((id, annotation)),
                _ => None,
            })
            .collect();
        annotated.sort_by_key(|(_, annotation)| annotation.span.span.start);
        for (expr, annotation) in annotated {
            let Some(implementation) = self.lookup(annotation) else {
                continue;
            };
            self.uses.push(MacroUse {
                site: Site::Expression { owner, body, expr },
                container: path.clone(),
                annotation,
                implementation,
            });
        }
    }
}
