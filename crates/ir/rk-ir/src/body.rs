//! Function and initializer bodies
//!
//! Expressions and statements live in per-body arenas and refer to each
//! other by index. Lambdas share the arena of the body they appear in.

use crate::decl::relocate_span;
use crate::{Annotation, TypeRef};
use rk_arena::{Arena, Idx};
use rk_intern::Symbol;
use rk_span::{FileId, FileSpan, Span};
use rustc_hash::FxHashMap;
use std::fmt;

/// Expression id
pub type ExprId = Idx<Expr>;
/// Statement id
pub type StmtId = Idx<Stmt>;

/// Whether a body was written as a block or as `= expr`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// `{ ... }`; the root is an [`Expr::Block`]
    Block,
    /// `= expr`; the root is the returned expression
    Expression,
}

/// Expression and statement storage of one body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// Expression arena
    pub exprs: Arena<Expr>,
    /// Statement arena
    pub stmts: Arena<Stmt>,
    /// Root expression
    pub root: ExprId,
    /// How the body was written
    pub kind: BodyKind,
}

impl Body {
    /// Creates a body whose root is a placeholder `Unit` block
    #[must_use]
    pub fn new(kind: BodyKind) -> Self {
        let mut exprs = Arena::new();
        let root = exprs.alloc(Expr::Block {
            stmts: Vec::new(),
            tail: None,
            span: FileSpan::new(FileId::SYNTHETIC, Span::point(0)),
        });
        Self {
            exprs,
            stmts: Arena::new(),
            root,
            kind,
        }
    }

    /// Allocates an expression
    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.alloc(expr)
    }

    /// Allocates a statement
    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.alloc(stmt)
    }

    /// Expression by id
    #[must_use]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    /// Statement by id
    #[must_use]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    /// Replaces the expression at `slot` with a copy of `other`'s tree
    pub fn splice(&mut self, slot: ExprId, other: &Body) {
        let placeholder = FileSpan::new(FileId::SYNTHETIC, Span::point(0));
        let mut exprs = FxHashMap::default();
        for (id, _) in other.exprs.iter() {
            let copy = if id == other.root {
                slot
            } else {
                self.alloc_expr(Expr::Break { span: placeholder })
            };
            exprs.insert(id, copy);
        }
        let mut stmts = FxHashMap::default();
        for (id, _) in other.stmts.iter() {
            let copy = self.alloc_stmt(Stmt::Expr {
                expr: slot,
                span: placeholder,
            });
            stmts.insert(id, copy);
        }
        let expr_of = |id: ExprId| exprs[&id];
        let stmt_of = |id: StmtId| stmts[&id];
        for (id, expr) in other.exprs.iter() {
            self.exprs[expr_of(id)] = expr.remap(&expr_of, &stmt_of);
        }
        for (id, stmt) in other.stmts.iter() {
            self.stmts[stmt_of(id)] = stmt.remap(&expr_of);
        }
    }

    /// Replaces every synthetic span in the body with `anchor`
    pub fn relocate(&mut self, anchor: FileSpan) {
        for (_, expr) in self.exprs.iter_mut() {
            relocate_span(expr.span_mut(), anchor);
            match expr {
                Expr::Lambda { params, .. } => {
                    for param in params {
                        if let Some(ty) = &mut param.ty {
                            ty.relocate(anchor);
                        }
                    }
                }
                Expr::Annotated { annotation, .. } => relocate_span(&mut annotation.span, anchor),
                _ => {}
            }
        }
        for (_, stmt) in self.stmts.iter_mut() {
            match stmt {
                Stmt::Local { span, ty, .. } => {
                    relocate_span(span, anchor);
                    if let Some(ty) = ty {
                        ty.relocate(anchor);
                    }
                }
                Stmt::Expr { span, .. } | Stmt::Assign { span, .. } => {
                    relocate_span(span, anchor);
                }
            }
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `42`
    Int(i64),
    /// `42L`
    Long(i64),
    /// `4.2`
    Double(f64),
    /// `true` / `false`
    Bool(bool),
    /// `'c'`
    Char(char),
    /// `"text"`
    String(String),
    /// `null`
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}L"),
            Self::Double(value) => write!(f, "{value:?}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Char(value) => write!(f, "'{value}'"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `?:`
    Elvis,
    /// `..`
    Range,
}

impl BinaryOp {
    /// Source spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Elvis => "?:",
            Self::Range => "..",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

/// Call argument
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Name of a `name = value` argument
    pub name: Option<Symbol>,
    /// Argument expression
    pub value: ExprId,
    /// Lambda written after the closing parenthesis
    pub trailing: bool,
}

/// Lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaParam {
    /// Parameter name
    pub name: Symbol,
    /// Declared type
    pub ty: Option<TypeRef>,
}

/// Branch of a `when`
#[derive(Debug, Clone, PartialEq)]
pub struct WhenBranch {
    /// Comma separated conditions; with a subject they are compared to it
    pub conditions: Vec<ExprId>,
    /// Branch result
    pub body: ExprId,
}

/// `catch (name: Type) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Bound exception name
    pub name: Symbol,
    /// Caught type
    pub ty: TypeRef,
    /// Handler block
    pub body: ExprId,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal {
        /// Value
        value: Literal,
        /// Source location
        span: FileSpan,
    },
    /// Simple name
    Name {
        /// Referenced name
        name: Symbol,
        /// Source location
        span: FileSpan,
    },
    /// `this`
    This {
        /// Source location
        span: FileSpan,
    },
    /// Named call `f(x)`, `recv.f(x)`, `recv?.f(x)` or infix `a f b`
    Call {
        /// Explicit receiver
        receiver: Option<ExprId>,
        /// Called through `?.`
        safe: bool,
        /// Callee name
        name: Symbol,
        /// Arguments, trailing lambda last
        args: Vec<Arg>,
        /// Written in infix form
        infix: bool,
        /// Source location
        span: FileSpan,
    },
    /// Invocation of a non-name callee, such as `{ ... }()`
    Invoke {
        /// Callee expression
        callee: ExprId,
        /// Arguments
        args: Vec<Arg>,
        /// Source location
        span: FileSpan,
    },
    /// Property access `recv.name` or `recv?.name`
    Member {
        /// Receiver
        receiver: ExprId,
        /// Accessed through `?.`
        safe: bool,
        /// Property name
        name: Symbol,
        /// Source location
        span: FileSpan,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: ExprId,
        /// Right operand
        rhs: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// Prefix operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// `expr!!`
    NotNull {
        /// Operand
        operand: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// An expression with a leading annotation, such as `@Increment 41`
    Annotated {
        /// The annotation
        annotation: Annotation,
        /// Annotated expression
        expr: ExprId,
        /// Source location, annotation included
        span: FileSpan,
    },
    /// `{ a, b -> ... }`; no explicit parameters means `it` may be implied
    Lambda {
        /// Declared parameters
        params: Vec<LambdaParam>,
        /// Lambda body, always an [`Expr::Block`]
        body: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// Statements followed by an optional value
    Block {
        /// Statements
        stmts: Vec<StmtId>,
        /// Trailing expression that yields the block's value
        tail: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// `if (c) a else b`
    If {
        /// Condition
        condition: ExprId,
        /// Then branch
        then_branch: ExprId,
        /// Else branch
        else_branch: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// `when (subject) { ... }` or subject-less `when { ... }`
    When {
        /// Subject
        subject: Option<ExprId>,
        /// Branches in order
        branches: Vec<WhenBranch>,
        /// `else ->` branch
        else_branch: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// `try { } catch (e: T) { } finally { }`
    Try {
        /// Protected block
        body: ExprId,
        /// Handlers
        catches: Vec<CatchClause>,
        /// Finalizer
        finally: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// `return value`
    Return {
        /// Returned value
        value: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// `throw value`
    Throw {
        /// Thrown value
        value: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// `break`
    Break {
        /// Source location
        span: FileSpan,
    },
    /// `continue`
    Continue {
        /// Source location
        span: FileSpan,
    },
    /// `while (c) body`
    While {
        /// Condition
        condition: ExprId,
        /// Loop body
        body: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// `do body while (c)`
    DoWhile {
        /// Loop body
        body: ExprId,
        /// Condition
        condition: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// `for (name in iterable) body`
    For {
        /// Loop variable
        binding: Symbol,
        /// Iterated expression
        iterable: ExprId,
        /// Loop body
        body: ExprId,
        /// Source location
        span: FileSpan,
    },
}

impl Expr {
    /// Source location
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Literal { span, .. }
            | Self::Name { span, .. }
            | Self::This { span }
            | Self::Call { span, .. }
            | Self::Invoke { span, .. }
            | Self::Member { span, .. }
            | Self::Binary { span, .. }
            | Self::Unary { span, .. }
            | Self::NotNull { span, .. }
            | Self::Annotated { span, .. }
            | Self::Lambda { span, .. }
            | Self::Block { span, .. }
            | Self::If { span, .. }
            | Self::When { span, .. }
            | Self::Try { span, .. }
            | Self::Return { span, .. }
            | Self::Throw { span, .. }
            | Self::Break { span }
            | Self::Continue { span }
            | Self::While { span, .. }
            | Self::DoWhile { span, .. }
            | Self::For { span, .. } => *span,
        }
    }

    /// Copy of the expression with its child ids translated
    fn remap(&self, e: &impl Fn(ExprId) -> ExprId, s: &impl Fn(StmtId) -> StmtId) -> Self {
        let args = |args: &[Arg]| -> Vec<Arg> {
            args.iter()
                .map(|arg| Arg {
                    value: e(arg.value),
                    ..arg.clone()
                })
                .collect()
        };
        match self {
            Self::Literal { .. }
            | Self::Name { .. }
            | Self::This { .. }
            | Self::Break { .. }
            | Self::Continue { .. } => self.clone(),
            Self::Call {
                receiver,
                safe,
                name,
                args: call_args,
                infix,
                span,
            } => Self::Call {
                receiver: receiver.map(e),
                safe: *safe,
                name: *name,
                args: args(call_args),
                infix: *infix,
                span: *span,
            },
            Self::Invoke {
                callee,
                args: call_args,
                span,
            } => Self::Invoke {
                callee: e(*callee),
                args: args(call_args),
                span: *span,
            },
            Self::Member {
                receiver,
                safe,
                name,
                span,
            } => Self::Member {
                receiver: e(*receiver),
                safe: *safe,
                name: *name,
                span: *span,
            },
            Self::Binary { op, lhs, rhs, span } => Self::Binary {
                op: *op,
                lhs: e(*lhs),
                rhs: e(*rhs),
                span: *span,
            },
            Self::Unary { op, operand, span } => Self::Unary {
                op: *op,
                operand: e(*operand),
                span: *span,
            },
            Self::NotNull { operand, span } => Self::NotNull {
                operand: e(*operand),
                span: *span,
            },
            Self::Annotated {
                annotation,
                expr,
                span,
            } => Self::Annotated {
                annotation: annotation.clone(),
                expr: e(*expr),
                span: *span,
            },
            Self::Lambda { params, body, span } => Self::Lambda {
                params: params.clone(),
                body: e(*body),
                span: *span,
            },
            Self::Block { stmts, tail, span } => Self::Block {
                stmts: stmts.iter().copied().map(s).collect(),
                tail: tail.map(e),
                span: *span,
            },
            Self::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => Self::If {
                condition: e(*condition),
                then_branch: e(*then_branch),
                else_branch: else_branch.map(e),
                span: *span,
            },
            Self::When {
                subject,
                branches,
                else_branch,
                span,
            } => Self::When {
                subject: subject.map(e),
                branches: branches
                    .iter()
                    .map(|branch| WhenBranch {
                        conditions: branch.conditions.iter().copied().map(e).collect(),
                        body: e(branch.body),
                    })
                    .collect(),
                else_branch: else_branch.map(e),
                span: *span,
            },
            Self::Try {
                body,
                catches,
                finally,
                span,
            } => Self::Try {
                body: e(*body),
                catches: catches
                    .iter()
                    .map(|catch| CatchClause {
                        body: e(catch.body),
                        ..catch.clone()
                    })
                    .collect(),
                finally: finally.map(e),
                span: *span,
            },
            Self::Return { value, span } => Self::Return {
                value: value.map(e),
                span: *span,
            },
            Self::Throw { value, span } => Self::Throw {
                value: e(*value),
                span: *span,
            },
            Self::While {
                condition,
                body,
                span,
            } => Self::While {
                condition: e(*condition),
                body: e(*body),
                span: *span,
            },
            Self::DoWhile {
                body,
                condition,
                span,
            } => Self::DoWhile {
                body: e(*body),
                condition: e(*condition),
                span: *span,
            },
            Self::For {
                binding,
                iterable,
                body,
                span,
            } => Self::For {
                binding: *binding,
                iterable: e(*iterable),
                body: e(*body),
                span: *span,
            },
        }
    }

    fn span_mut(&mut self) -> &mut FileSpan {
        match self {
            Self::Literal { span, .. }
            | Self::Name { span, .. }
            | Self::This { span }
            | Self::Call { span, .. }
            | Self::Invoke { span, .. }
            | Self::Member { span, .. }
            | Self::Binary { span, .. }
            | Self::Unary { span, .. }
            | Self::NotNull { span, .. }
            | Self::Annotated { span, .. }
            | Self::Lambda { span, .. }
            | Self::Block { span, .. }
            | Self::If { span, .. }
            | Self::When { span, .. }
            | Self::Try { span, .. }
            | Self::Return { span, .. }
            | Self::Throw { span, .. }
            | Self::Break { span }
            | Self::Continue { span }
            | Self::While { span, .. }
            | Self::DoWhile { span, .. }
            | Self::For { span, .. } => span,
        }
    }
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `val` / `var` local
    Local {
        /// Local name
        name: Symbol,
        /// Declared with `var`
        mutable: bool,
        /// Declared type
        ty: Option<TypeRef>,
        /// Initializer
        init: Option<ExprId>,
        /// Source location
        span: FileSpan,
    },
    /// Expression statement
    Expr {
        /// Expression
        expr: ExprId,
        /// Source location
        span: FileSpan,
    },
    /// Assignment to a name or property
    Assign {
        /// Assigned place; a name or member access
        target: ExprId,
        /// Operator
        op: AssignOp,
        /// Assigned value
        value: ExprId,
        /// Source location
        span: FileSpan,
    },
}

impl Stmt {
    fn remap(&self, e: &impl Fn(ExprId) -> ExprId) -> Self {
        match self {
            Self::Local {
                name,
                mutable,
                ty,
                init,
                span,
            } => Self::Local {
                name: *name,
                mutable: *mutable,
                ty: ty.clone(),
                init: init.map(e),
                span: *span,
            },
            Self::Expr { expr, span } => Self::Expr {
                expr: e(*expr),
                span: *span,
            },
            Self::Assign {
                target,
                op,
                value,
                span,
            } => Self::Assign {
                target: e(*target),
                op: *op,
                value: e(*value),
                span: *span,
            },
        }
    }

    /// Source location
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Local { span, .. } | Self::Expr { span, .. } | Self::Assign { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rk_intern::Interner;

    fn at(start: u32) -> FileSpan {
        FileSpan::new(FileId(0), Span::new(start, start + 1))
    }

    fn literal(body: &mut Body, value: i64, start: u32) -> ExprId {
        body.alloc_expr(Expr::Literal {
            value: Literal::Int(value),
            span: at(start),
        })
    }

    #[test]
    fn literals_render_in_source_spelling() {
        let rendered: Vec<String> = [
            Literal::Int(41),
            Literal::Long(7),
            Literal::Double(4.0),
            Literal::Char('c'),
            Literal::String("hi".to_string()),
            Literal::Null,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(rendered, vec!["41", "7L", "4.0", "'c'", "\"hi\"", "null"]);
    }

    #[test]
    fn splice_copies_nested_statements_into_the_slot() {
        let interner = Interner::default();
        let mut donor = Body::new(BodyKind::Expression);
        let one = literal(&mut donor, 1, 0);
        let local = donor.alloc_stmt(Stmt::Local {
            name: interner.intern("x"),
            mutable: false,
            ty: None,
            init: Some(one),
            span: at(1),
        });
        let two = literal(&mut donor, 2, 2);
        donor.root = donor.alloc_expr(Expr::Block {
            stmts: vec![local],
            tail: Some(two),
            span: at(3),
        });

        let mut host = Body::new(BodyKind::Expression);
        let slot = literal(&mut host, 7, 9);
        host.root = slot;
        let before = host.exprs.len();
        host.splice(slot, &donor);

        assert_eq!(host.exprs.len(), before + donor.exprs.len() - 1);
        let Expr::Block { stmts, tail, .. } = host.expr(host.root) else {
            panic!("expected a block, found {:?}", host.expr(host.root));
        };
        assert_eq!(host.expr(tail.expect("tail")), donor.expr(two));
        let Stmt::Local { init, .. } = host.stmt(stmts[0]) else {
            panic!("expected a local");
        };
        assert_eq!(host.expr(init.expect("init")), donor.expr(one));
    }
}
