//! Applying transform operations to the tree
//!
//! Expansion runs in parallel against a frozen tree; this is the only place
//! the tree is edited, one operation at a time.

use crate::MergeError;
use rk_intern::Interner;
use rk_ir::{
    Body, ClassDecl, ClassKind, Decl, DeclPath, Expr, ExprId, FunctionDecl, KnownNames, Modifiers,
    SourceFile,
};
use rk_macro::{AttachMode, TransformOperation};
use rk_span::FileSpan;

/// Applies operations in order to one file
pub(crate) struct Merger<'a> {
    file: &'a mut SourceFile,
    interner: &'a Interner,
    known: KnownNames,
}

impl<'a> Merger<'a> {
    pub fn new(file: &'a mut SourceFile, interner: &'a Interner) -> Self {
        Self {
            file,
            interner,
            known: KnownNames::new(interner),
        }
    }

    /// Applies one operation; `anchor` locates a companion created for it
    pub fn apply(&mut self, operation: &TransformOperation, anchor: FileSpan) -> Result<(), MergeError> {
        match operation {
            TransformOperation::AttachFunction {
                context,
                function,
                mode,
            } => {
                let members = self.container(context)?;
                attach_function(members, function.clone(), *mode);
            }
            TransformOperation::AttachCompanionFactory { context, members } => {
                if context.is_root() {
                    return Err(MergeError::NotAClass);
                }
                let companion_name = self.known.companion;
                let container = self.container(context)?;
                let companion = container.iter_mut().find_map(|decl| match decl {
                    Decl::Class(class) if class.is_companion() => Some(class),
                    _ => None,
                });
                match companion {
                    Some(companion) => companion.members.extend(members.iter().cloned()),
                    None => {
                        tracing::trace!("creating a companion object");
                        container.push(Decl::Class(ClassDecl {
                            name: companion_name,
                            kind: ClassKind::Object,
                            modifiers: Modifiers::COMPANION,
                            annotations: Vec::new(),
                            type_params: Vec::new(),
                            primary_ctor: Vec::new(),
                            supertypes: Vec::new(),
                            members: members.clone(),
                            span: anchor,
                        }));
                    }
                }
            }
            TransformOperation::ReplaceExpression {
                context,
                at,
                replacement,
            } => {
                let container = self.container(context)?;
                let site = container.iter_mut().find_map(|decl| {
                    let body = match decl {
                        Decl::Function(function) => function.body.as_mut(),
                        Decl::Property(property) => property.initializer.as_mut(),
                        Decl::Class(_) | Decl::TypeAlias(_) => None,
                    }?;
                    let slot = annotated_at(body, *at)?;
                    Some((body, slot))
                });
                let Some((body, slot)) = site else {
                    return Err(MergeError::MissingExpression);
                };
                body.splice(slot, replacement);
            }
        }
        Ok(())
    }

    fn container(&mut self, path: &DeclPath) -> Result<&mut Vec<Decl>, MergeError> {
        let interner = self.interner;
        self.file
            .container_mut(path)
            .ok_or_else(|| MergeError::MissingContainer {
                path: path.display(interner),
            })
    }
}

/// The annotated expression spanning exactly `at`
fn annotated_at(body: &Body, at: FileSpan) -> Option<ExprId> {
    body.exprs.iter().find_map(|(id, expr)| match expr {
        Expr::Annotated { span, .. } if *span == at => Some(id),
        _ => None,
    })
}

fn attach_function(members: &mut Vec<Decl>, function: FunctionDecl, mode: AttachMode) {
    if mode == AttachMode::Replace {
        let existing = members
            .iter_mut()
            .find(|decl| matches!(decl, Decl::Function(existing) if existing.same_signature(&function)));
        if let Some(slot) = existing {
            *slot = Decl::Function(function);
            return;
        }
        tracing::debug!("nothing to replace, adding the function instead");
    }
    members.push(Decl::Function(function));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_span::{FileId, Span};

    fn parse(interner: &Interner, source: &str) -> SourceFile {
        rk_parser::parse_file(source, FileId(0), interner).expect("parses")
    }

    fn function(interner: &Interner, source: &str) -> FunctionDecl {
        match parse(interner, source).decls.pop() {
            Some(Decl::Function(function)) => function,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    fn names(interner: &Interner, decls: &[Decl]) -> Vec<String> {
        decls
            .iter()
            .map(|decl| interner.resolve(&decl.name()).to_string())
            .collect()
    }

    const ANCHOR: FileSpan = FileSpan {
        file: FileId(0),
        span: Span { start: 0, end: 8 },
    };

    #[test]
    fn add_appends_and_replace_swaps_in_place() {
        let interner = Interner::new();
        let mut file = parse(&interner, "fun foo(): Int = 1\nfun bar(): Int = 2");
        let added = function(&interner, "fun baz(): Int = 3");
        let replacement = function(&interner, "fun foo(): Int = 4");
        let mut merger = Merger::new(&mut file, &interner);
        merger
            .apply(
                &TransformOperation::AttachFunction {
                    context: DeclPath::root(),
                    function: added,
                    mode: AttachMode::Add,
                },
                ANCHOR,
            )
            .expect("applies");
        merger
            .apply(
                &TransformOperation::AttachFunction {
                    context: DeclPath::root(),
                    function: replacement.clone(),
                    mode: AttachMode::Replace,
                },
                ANCHOR,
            )
            .expect("applies");
        assert_eq!(names(&interner, &file.decls), vec!["foo", "bar", "baz"]);
        assert_eq!(file.decls[0], Decl::Function(replacement));
    }

    #[test]
    fn replace_picks_the_matching_overload() {
        let interner = Interner::new();
        let mut file = parse(
            &interner,
            "fun foo(value: String): String = value\nfun foo(value: Int): Int = value",
        );
        let replacement = function(&interner, "fun foo(value: Int): Int = value + 1");
        let mut merger = Merger::new(&mut file, &interner);
        merger
            .apply(
                &TransformOperation::AttachFunction {
                    context: DeclPath::root(),
                    function: replacement.clone(),
                    mode: AttachMode::Replace,
                },
                ANCHOR,
            )
            .expect("applies");
        assert_eq!(file.decls.len(), 2);
        let Decl::Function(untouched) = &file.decls[0] else {
            panic!("expected a function");
        };
        assert_eq!(untouched.params[0].ty.head(), Some(interner.intern("String")));
        assert_eq!(file.decls[1], Decl::Function(replacement));
    }

    #[test]
    fn replace_expression_splices_at_the_annotated_site() {
        let interner = Interner::new();
        let source = "fun f(): Int {\n    val a = @Increment 1\n    val b = @Increment 2\n    return a + b\n}";
        let mut file = parse(&interner, source);
        let start = u32::try_from(source.find("@Increment 2").expect("site")).expect("fits");
        let at = FileSpan::new(FileId(0), Span::new(start, start + 12));
        let replacement =
            rk_parser::parse_expression("2 + 1", FileId::SYNTHETIC, &interner).expect("parses");
        let mut merger = Merger::new(&mut file, &interner);
        merger
            .apply(
                &TransformOperation::ReplaceExpression {
                    context: DeclPath::root(),
                    at,
                    replacement,
                },
                ANCHOR,
            )
            .expect("applies");

        let Decl::Function(function) = &file.decls[0] else {
            panic!("expected a function");
        };
        let body = function.body.as_ref().expect("body");
        let annotated = body
            .exprs
            .iter()
            .filter(|(_, expr)| matches!(expr, Expr::Annotated { .. }))
            .count();
        assert_eq!(annotated, 1);
        assert!(annotated_at(body, at).is_none());
        assert!(body.exprs.iter().any(|(_, expr)| matches!(expr, Expr::Binary { .. })));

        let mut merger = Merger::new(&mut file, &interner);
        let error = merger.apply(
            &TransformOperation::ReplaceExpression {
                context: DeclPath::root(),
                at,
                replacement: Body::new(rk_ir::BodyKind::Expression),
            },
            ANCHOR,
        );
        assert_eq!(error, Err(MergeError::MissingExpression));
    }

    #[test]
    fn companions_are_created_once_then_extended() {
        let interner = Interner::new();
        let mut file = parse(&interner, "class Widget");
        let path = DeclPath::root().child(interner.intern("Widget"));
        let mut merger = Merger::new(&mut file, &interner);
        for source in ["fun create(): Widget = Widget()", "fun empty(): Widget = Widget()"] {
            merger
                .apply(
                    &TransformOperation::AttachCompanionFactory {
                        context: path.clone(),
                        members: vec![Decl::Function(function(&interner, source))],
                    },
                    ANCHOR,
                )
                .expect("applies");
        }
        let widget = file.class(&path).expect("class");
        let companion = widget.companion().expect("companion");
        assert_eq!(interner.resolve(&companion.name), "Companion");
        assert_eq!(companion.kind, ClassKind::Object);
        assert_eq!(companion.span, ANCHOR);
        assert_eq!(names(&interner, &companion.members), vec!["create", "empty"]);
        assert_eq!(widget.members.len(), 1);
    }

    #[test]
    fn unknown_containers_are_errors() {
        let interner = Interner::new();
        let mut file = parse(&interner, "class Widget");
        let mut merger = Merger::new(&mut file, &interner);
        let missing = DeclPath::root().child(interner.intern("Gadget"));
        let error = merger.apply(
            &TransformOperation::AttachFunction {
                context: missing,
                function: function(&interner, "fun f() {}"),
                mode: AttachMode::Add,
            },
            ANCHOR,
        );
        assert_eq!(
            error,
            Err(MergeError::MissingContainer {
                path: "Gadget".to_string()
            })
        );
        let error = merger.apply(
            &TransformOperation::AttachCompanionFactory {
                context: DeclPath::root(),
                members: Vec::new(),
            },
            ANCHOR,
        );
        assert_eq!(error, Err(MergeError::NotAClass));
    }
}
