//! Expansion targets and the edit operations produced for them

use rk_intern::Symbol;
use rk_ir::{Annotation, Body, ClassDecl, Decl, DeclPath, Expr, ExprId, FunctionDecl};
use rk_span::FileSpan;

/// Declaration or expression being expanded, with the path of its container.
///
/// A target is a shared borrow of the tree; macros never edit it. They
/// describe edits as [`TransformOperation`]s instead.
#[derive(Debug, Clone, Copy)]
pub enum TransformTarget<'a> {
    /// An annotated class, object or interface
    Class {
        /// The class
        class: &'a ClassDecl,
        /// Classes enclosing it
        container: &'a DeclPath,
    },
    /// An annotated function
    Function {
        /// The function
        function: &'a FunctionDecl,
        /// Classes enclosing it; empty for top-level functions
        container: &'a DeclPath,
    },
    /// An annotated expression such as `@Increment 41`
    Expression {
        /// Function or property whose body holds the expression
        owner: Symbol,
        /// That body
        body: &'a Body,
        /// The [`Expr::Annotated`] node
        expr: ExprId,
        /// Classes enclosing the owner
        container: &'a DeclPath,
    },
}

impl<'a> TransformTarget<'a> {
    /// Target for a declaration, if it is a class or a function
    #[must_use]
    pub fn of(decl: &'a Decl, container: &'a DeclPath) -> Option<Self> {
        match decl {
            Decl::Class(class) => Some(Self::Class { class, container }),
            Decl::Function(function) => Some(Self::Function {
                function,
                container,
            }),
            Decl::Property(_) | Decl::TypeAlias(_) => None,
        }
    }

    /// Declared name
    #[must_use]
    pub fn name(&self) -> Symbol {
        match *self {
            Self::Class { class, .. } => class.name,
            Self::Function { function, .. } => function.name,
            Self::Expression { owner, .. } => owner,
        }
    }

    /// Annotations on the declaration, or the one on the expression
    #[must_use]
    pub fn annotations(&self) -> &'a [Annotation] {
        match *self {
            Self::Class { class, .. } => &class.annotations,
            Self::Function { function, .. } => &function.annotations,
            Self::Expression { body, expr, .. } => match body.expr(expr) {
                Expr::Annotated { annotation, .. } => std::slice::from_ref(annotation),
                _ => &[],
            },
        }
    }

    /// Source location of the declaration or expression
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match *self {
            Self::Class { class, .. } => class.span,
            Self::Function { function, .. } => function.span,
            Self::Expression { body, expr, .. } => body.expr(expr).span(),
        }
    }

    /// Classes enclosing the declaration
    #[must_use]
    pub fn container(&self) -> &'a DeclPath {
        match *self {
            Self::Class { container, .. }
            | Self::Function { container, .. }
            | Self::Expression { container, .. } => container,
        }
    }

    /// Path generated members are attached to: the class itself for class
    /// targets, the enclosing container for functions
    #[must_use]
    pub fn member_context(&self) -> DeclPath {
        match *self {
            Self::Class { class, container } => container.child(class.name),
            Self::Function { container, .. } | Self::Expression { container, .. } => {
                container.clone()
            }
        }
    }

    /// The class, for class targets
    #[must_use]
    pub fn as_class(&self) -> Option<&'a ClassDecl> {
        match *self {
            Self::Class { class, .. } => Some(class),
            Self::Function { .. } | Self::Expression { .. } => None,
        }
    }

    /// The function, for function targets
    #[must_use]
    pub fn as_function(&self) -> Option<&'a FunctionDecl> {
        match *self {
            Self::Function { function, .. } => Some(function),
            Self::Class { .. } | Self::Expression { .. } => None,
        }
    }

    /// The body and the expression under the annotation, for expression
    /// targets
    #[must_use]
    pub fn as_expression(&self) -> Option<(&'a Body, ExprId)> {
        match *self {
            Self::Expression { body, expr, .. } => match body.expr(expr) {
                Expr::Annotated { expr: inner, .. } => Some((body, *inner)),
                _ => Some((body, expr)),
            },
            Self::Class { .. } | Self::Function { .. } => None,
        }
    }
}

/// How an attached function enters its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachMode {
    /// Appended as a new member
    Add,
    /// Swapped for the existing function of the same name
    Replace,
}

/// An edit to apply to the tree during the merge step
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOperation {
    /// Attach a function to the container at `context`
    AttachFunction {
        /// Container path; empty for the file level
        context: DeclPath,
        /// Generated function
        function: FunctionDecl,
        /// Add or replace
        mode: AttachMode,
    },
    /// Add members to the companion object of the class at `context`,
    /// creating the companion if the class has none
    AttachCompanionFactory {
        /// Path of the class
        context: DeclPath,
        /// Companion members
        members: Vec<Decl>,
    },
    /// Swap the annotated expression at `at` for `replacement`
    ReplaceExpression {
        /// Path of the classes enclosing the expression's owner
        context: DeclPath,
        /// Location of the annotated expression
        at: FileSpan,
        /// Replacement tree
        replacement: Body,
    },
}

impl TransformOperation {
    /// Container path the operation edits
    #[must_use]
    pub fn context(&self) -> &DeclPath {
        match self {
            Self::AttachFunction { context, .. }
            | Self::AttachCompanionFactory { context, .. }
            | Self::ReplaceExpression { context, .. } => context,
        }
    }

    /// Replaces synthetic spans of the generated tree with `anchor`
    pub fn relocate(&mut self, anchor: FileSpan) {
        match self {
            Self::AttachFunction { function, .. } => function.relocate(anchor),
            Self::AttachCompanionFactory { members, .. } => {
                for member in members {
                    member.relocate(anchor);
                }
            }
            Self::ReplaceExpression { replacement, .. } => replacement.relocate(anchor),
        }
    }
}
