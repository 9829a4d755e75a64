//! Body traversal

use crate::{Body, Expr, ExprId, Stmt, StmtId};

/// Visitor over the expressions and statements of a [`Body`].
///
/// Overridden methods call [`walk_expr`] / [`walk_stmt`] to keep
/// descending.
pub trait Visitor {
    /// Visit an expression
    fn visit_expr(&mut self, body: &Body, id: ExprId) {
        walk_expr(self, body, id);
    }

    /// Visit a statement
    fn visit_stmt(&mut self, body: &Body, id: StmtId) {
        walk_stmt(self, body, id);
    }
}

/// Visits the children of an expression in evaluation order
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, body: &Body, id: ExprId) {
    match body.expr(id) {
        Expr::Literal { .. }
        | Expr::Name { .. }
        | Expr::This { .. }
        | Expr::Break { .. }
        | Expr::Continue { .. } => {}
        Expr::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                visitor.visit_expr(body, *receiver);
            }
            for arg in args {
                visitor.visit_expr(body, arg.value);
            }
        }
        Expr::Invoke { callee, args, .. } => {
            visitor.visit_expr(body, *callee);
            for arg in args {
                visitor.visit_expr(body, arg.value);
            }
        }
        Expr::Member { receiver, .. } => visitor.visit_expr(body, *receiver),
        Expr::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(body, *lhs);
            visitor.visit_expr(body, *rhs);
        }
        Expr::Unary { operand, .. } | Expr::NotNull { operand, .. } => {
            visitor.visit_expr(body, *operand);
        }
        Expr::Annotated { expr, .. } => visitor.visit_expr(body, *expr),
        Expr::Lambda { body: inner, .. } => visitor.visit_expr(body, *inner),
        Expr::Block { stmts, tail, .. } => {
            for stmt in stmts {
                visitor.visit_stmt(body, *stmt);
            }
            if let Some(tail) = tail {
                visitor.visit_expr(body, *tail);
            }
        }
        Expr::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            visitor.visit_expr(body, *condition);
            visitor.visit_expr(body, *then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_expr(body, *else_branch);
            }
        }
        Expr::When {
            subject,
            branches,
            else_branch,
            ..
        } => {
            if let Some(subject) = subject {
                visitor.visit_expr(body, *subject);
            }
            for branch in branches {
                for condition in &branch.conditions {
                    visitor.visit_expr(body, *condition);
                }
                visitor.visit_expr(body, branch.body);
            }
            if let Some(else_branch) = else_branch {
                visitor.visit_expr(body, *else_branch);
            }
        }
        Expr::Try {
            body: inner,
            catches,
            finally,
            ..
        } => {
            visitor.visit_expr(body, *inner);
            for catch in catches {
                visitor.visit_expr(body, catch.body);
            }
            if let Some(finally) = finally {
                visitor.visit_expr(body, *finally);
            }
        }
        Expr::Return { value, .. } => {
            if let Some(value) = value {
                visitor.visit_expr(body, *value);
            }
        }
        Expr::Throw { value, .. } => visitor.visit_expr(body, *value),
        Expr::While {
            condition,
            body: inner,
            ..
        } => {
            visitor.visit_expr(body, *condition);
            visitor.visit_expr(body, *inner);
        }
        Expr::DoWhile {
            body: inner,
            condition,
            ..
        } => {
            visitor.visit_expr(body, *inner);
            visitor.visit_expr(body, *condition);
        }
        Expr::For {
            iterable,
            body: inner,
            ..
        } => {
            visitor.visit_expr(body, *iterable);
            visitor.visit_expr(body, *inner);
        }
    }
}

/// Visits the expressions of a statement
pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, body: &Body, id: StmtId) {
    match body.stmt(id) {
        Stmt::Local { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expr(body, *init);
            }
        }
        Stmt::Expr { expr, .. } => visitor.visit_expr(body, *expr),
        Stmt::Assign { target, value, .. } => {
            visitor.visit_expr(body, *target);
            visitor.visit_expr(body, *value);
        }
    }
}
