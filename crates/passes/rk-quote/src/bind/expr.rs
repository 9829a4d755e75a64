//! Expression and statement inference

use super::Binder;
use super::call::CallSite;
use crate::upcast;
use rk_intern::Symbol;
use rk_ir::{
    AssignOp, BinaryOp, Body, CatchClause, Expr, ExprId, LambdaParam, Literal, Stmt, StmtId, Ty,
    UnaryOp, WhenBranch, substitute_params,
};
use rk_span::FileSpan;
use rustc_hash::FxHashMap;

impl Binder<'_> {
    /// Infers the type of `id`, using `expected` to type lambda parameters
    pub(crate) fn infer(&mut self, body: &Body, id: ExprId, expected: Option<&Ty>) -> Ty {
        let ty = self.infer_expr(body, id, expected);
        self.types.insert(id, ty.clone());
        ty
    }

    /// Infers `id` and requires it to conform to `expected`
    pub(crate) fn check(&mut self, body: &Body, id: ExprId, expected: &Ty) {
        let actual = self.infer(body, id, Some(expected));
        self.expect_ty(&actual, expected, body.expr(id).span());
    }

    fn infer_expr(&mut self, body: &Body, id: ExprId, expected: Option<&Ty>) -> Ty {
        match body.expr(id) {
            Expr::Literal { value, .. } => match value {
                Literal::Int(_) => Ty::Int,
                Literal::Long(_) => Ty::Long,
                Literal::Double(_) => Ty::Double,
                Literal::Bool(_) => Ty::Boolean,
                Literal::Char(_) => Ty::Char,
                Literal::String(_) => Ty::String,
                Literal::Null => Ty::Nothing.nullable(),
            },
            Expr::Name { name, span } => self.infer_name(*name, *span),
            Expr::This { span } => match self.receivers.last() {
                Some(this) => this.clone(),
                None => {
                    self.invalid("`this` is not defined in this context".to_string(), *span);
                    Ty::Error
                }
            },
            Expr::Call {
                receiver,
                safe,
                name,
                args,
                span,
                ..
            } => self.infer_call(
                body,
                id,
                &CallSite {
                    receiver: *receiver,
                    safe: *safe,
                    name: *name,
                    args,
                    span: *span,
                },
            ),
            Expr::Invoke { callee, args, span } => {
                let callee_ty = self.infer(body, *callee, None);
                self.invoke(body, &callee_ty, args, *span)
            }
            Expr::Member {
                receiver,
                safe,
                name,
                span,
            } => self.infer_member(body, *receiver, *safe, *name, *span),
            Expr::Binary {
                op,
                lhs,
                rhs,
                span,
            } => self.infer_binary(body, *op, *lhs, *rhs, *span),
            Expr::Unary { op, operand, span } => match op {
                UnaryOp::Not => {
                    self.check(body, *operand, &Ty::Boolean);
                    Ty::Boolean
                }
                UnaryOp::Neg => {
                    let operand = self.infer(body, *operand, None);
                    self.arithmetic(BinaryOp::Sub, &Ty::Int, &operand, *span)
                }
            },
            Expr::NotNull { operand, .. } => {
                let ty = self.infer(body, *operand, None);
                self.unifier.resolve(&ty).non_null().clone()
            }
            Expr::Annotated { expr, .. } => self.infer(body, *expr, expected),
            Expr::Lambda {
                params,
                body: block,
                ..
            } => self.infer_lambda(body, params, *block, expected),
            Expr::Block { stmts, tail, .. } => {
                self.push_scope();
                for stmt in stmts {
                    self.bind_stmt(body, *stmt);
                }
                let ty = match tail {
                    Some(tail) => self.infer(body, *tail, expected),
                    None => Ty::Unit,
                };
                self.pop_scope();
                ty
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.check(body, *condition, &Ty::Boolean);
                let then_ty = self.infer(body, *then_branch, expected);
                match else_branch {
                    Some(else_branch) => {
                        let else_ty = self.infer(body, *else_branch, expected);
                        self.unifier.join(&self.symbols, &then_ty, &else_ty)
                    }
                    None => Ty::Unit,
                }
            }
            Expr::When {
                subject,
                branches,
                else_branch,
                ..
            } => self.infer_when(body, *subject, branches, *else_branch, expected),
            Expr::Try {
                body: protected,
                catches,
                finally,
                ..
            } => self.infer_try(body, *protected, catches, *finally, expected),
            Expr::Return { value, span } => {
                let expected = self.return_ty.clone();
                match value {
                    Some(value) => {
                        let actual = self.infer(body, *value, expected.as_ref());
                        if let Some(expected) = &expected {
                            self.expect_ty(&actual, expected, body.expr(*value).span());
                        }
                    }
                    None => {
                        if let Some(expected) = &expected {
                            self.expect_ty(&Ty::Unit, expected, *span);
                        }
                    }
                }
                Ty::Nothing
            }
            Expr::Throw { value, span } => {
                let thrown = self.infer(body, *value, None);
                self.expect_throwable(&thrown, *span);
                Ty::Nothing
            }
            Expr::Break { .. } | Expr::Continue { .. } => Ty::Nothing,
            Expr::While {
                condition,
                body: looped,
                ..
            }
            | Expr::DoWhile {
                body: looped,
                condition,
                ..
            } => {
                self.check(body, *condition, &Ty::Boolean);
                self.infer(body, *looped, None);
                Ty::Unit
            }
            Expr::For {
                binding,
                iterable,
                body: looped,
                span,
            } => {
                let iterable = self.infer(body, *iterable, None);
                let element = self.element_type(&iterable, *span);
                self.push_scope();
                self.declare(*binding, element);
                self.infer(body, *looped, None);
                self.pop_scope();
                Ty::Unit
            }
        }
    }

    fn bind_stmt(&mut self, body: &Body, id: StmtId) {
        match body.stmt(id) {
            Stmt::Local { name, ty, init, .. } => {
                let declared = ty.as_ref().map(|ty| self.lower(ty));
                let local = match (declared, init) {
                    (Some(declared), Some(init)) => {
                        self.check(body, *init, &declared);
                        declared
                    }
                    (Some(declared), None) => declared,
                    (None, Some(init)) => self.infer(body, *init, None),
                    (None, None) => self.unifier.fresh(),
                };
                self.declare(*name, local);
            }
            Stmt::Expr { expr, .. } => {
                self.infer(body, *expr, None);
            }
            Stmt::Assign {
                target,
                op,
                value,
                span,
            } => {
                let target = self.infer(body, *target, None);
                match op {
                    AssignOp::Assign => self.check(body, *value, &target),
                    AssignOp::AddAssign | AssignOp::SubAssign => {
                        let value = self.infer(body, *value, None);
                        let op = if *op == AssignOp::AddAssign {
                            BinaryOp::Add
                        } else {
                            BinaryOp::Sub
                        };
                        let result = self.arithmetic(op, &target, &value, *span);
                        self.expect_ty(&result, &target, *span);
                    }
                }
            }
        }
    }

    // === Names and members ===

    fn infer_name(&mut self, name: Symbol, span: FileSpan) -> Ty {
        if let Some(local) = self.lookup_local(name) {
            return local;
        }
        if let Some(property) = self.implicit_property(name) {
            return property;
        }
        if let Some(property) = self.symbols.property(name) {
            let written = property.ty.clone();
            return match written {
                Some(written) => self.lower(&written),
                None => self.unifier.fresh(),
            };
        }
        if let Some(class) = self.symbols.class(name) {
            if class.kind == rk_ir::ClassKind::Object {
                return Ty::class(name);
            }
        }
        self.unresolved(name, span);
        Ty::Error
    }

    fn implicit_property(&mut self, name: Symbol) -> Option<Ty> {
        self.implicit_receivers()
            .iter()
            .find_map(|receiver| self.property_of(receiver, name))
    }

    /// Type of property `name` on a value of type `receiver`
    pub(crate) fn property_of(&mut self, receiver: &Ty, name: Symbol) -> Option<Ty> {
        let receiver = self.unifier.resolve(receiver).non_null().clone();
        if receiver == Ty::String && name == self.known.length {
            return Some(Ty::Int);
        }
        if !matches!(receiver, Ty::Class { .. }) {
            return None;
        }
        for ancestor in crate::ancestors(&self.symbols, &receiver) {
            let Ty::Class { name: class, args } = &ancestor else {
                continue;
            };
            let Some(symbol) = self.symbols.class(*class) else {
                continue;
            };
            let Some(property) = symbol.properties.get(&name) else {
                continue;
            };
            let Some(written) = &property.ty else {
                return Some(self.unifier.fresh());
            };
            let substitution: FxHashMap<Symbol, Ty> = symbol
                .type_params
                .iter()
                .copied()
                .zip(args.iter().cloned())
                .collect();
            let lowered = self.symbols.lower_type(written, &symbol.type_params);
            return Some(substitute_params(&lowered, &substitution));
        }
        None
    }

    /// Class named by a bare name used as a call or member receiver, such as
    /// `Factory.create()` or `Color.RED`
    pub(crate) fn static_class(&self, body: &Body, id: ExprId) -> Option<Symbol> {
        let Expr::Name { name, .. } = body.expr(id) else {
            return None;
        };
        let shadowed = self.lookup_local(*name).is_some() || self.symbols.property(*name).is_some();
        (!shadowed && self.symbols.class(*name).is_some()).then_some(*name)
    }

    fn infer_member(
        &mut self,
        body: &Body,
        receiver: ExprId,
        safe: bool,
        name: Symbol,
        span: FileSpan,
    ) -> Ty {
        if let Some(class) = self.static_class(body, receiver) {
            self.types.insert(receiver, Ty::class(class));
            // enum entries and nested objects are registered by simple name
            let nested = Ty::class(name);
            if self.symbols.class(name).is_some() && upcast(&self.symbols, &nested, class).is_some()
            {
                return nested;
            }
            let companion = self
                .symbols
                .class(class)
                .and_then(|symbol| symbol.companion.as_deref())
                .and_then(|companion| companion.properties.get(&name))
                .map(|property| property.ty.clone());
            return match companion {
                Some(Some(written)) => self.lower(&written),
                Some(None) => self.unifier.fresh(),
                None => {
                    self.unresolved(name, span);
                    Ty::Error
                }
            };
        }

        let receiver = self.infer(body, receiver, None);
        let receiver = self.unifier.resolve(&receiver);
        if receiver == Ty::Error {
            return Ty::Error;
        }
        match self.property_of(&receiver, name) {
            Some(ty) if safe => ty.nullable(),
            Some(ty) => ty,
            None => {
                self.unresolved(name, span);
                Ty::Error
            }
        }
    }

    // === Operators ===

    fn infer_binary(
        &mut self,
        body: &Body,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        span: FileSpan,
    ) -> Ty {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                self.check(body, lhs, &Ty::Boolean);
                self.check(body, rhs, &Ty::Boolean);
                Ty::Boolean
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                self.infer(body, lhs, None);
                self.infer(body, rhs, None);
                Ty::Boolean
            }
            BinaryOp::Elvis => {
                let left = self.infer(body, lhs, None);
                let left = self.unifier.resolve(&left).non_null().clone();
                let right = self.infer(body, rhs, Some(&left));
                self.unifier.join(&self.symbols, &left, &right)
            }
            BinaryOp::Range => {
                self.check(body, lhs, &Ty::Int);
                self.check(body, rhs, &Ty::Int);
                Ty::class(self.known.int_range)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let left = self.infer(body, lhs, None);
                let right = self.infer(body, rhs, None);
                let left = self.unifier.resolve(&left);
                let right = self.unifier.resolve(&right);
                let comparable = match (&left, &right) {
                    (Ty::Error, _) | (_, Ty::Error) => true,
                    (Ty::String, Ty::String) | (Ty::Char, Ty::Char) => true,
                    _ => self.numeric(&left, &right).is_some(),
                };
                if !comparable {
                    self.operator_error(op, &left, &right, span);
                }
                Ty::Boolean
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let left = self.infer(body, lhs, None);
                let right = self.infer(body, rhs, None);
                self.arithmetic(op, &left, &right, span)
            }
        }
    }

    /// Result of an arithmetic operator; `String + x` concatenates
    pub(crate) fn arithmetic(&mut self, op: BinaryOp, left: &Ty, right: &Ty, span: FileSpan) -> Ty {
        let left = self.unifier.resolve(left);
        let right = self.unifier.resolve(right);
        if op == BinaryOp::Add && left == Ty::String {
            return Ty::String;
        }
        if left == Ty::Error || right == Ty::Error {
            return Ty::Error;
        }
        if let Some(result) = self.numeric(&left, &right) {
            return result;
        }
        self.operator_error(op, &left, &right, span);
        Ty::Error
    }

    /// Wider of two numeric types; unconstrained variables become numeric
    fn numeric(&mut self, left: &Ty, right: &Ty) -> Option<Ty> {
        let rank = |ty: &Ty| match ty {
            Ty::Int => Some(0),
            Ty::Long => Some(1),
            Ty::Double => Some(2),
            _ => None,
        };
        match (left, right) {
            (Ty::Var(_), Ty::Var(_)) => {
                self.unifier.constrain(&self.symbols, left, &Ty::Int).ok()?;
                self.unifier.constrain(&self.symbols, right, &Ty::Int).ok()?;
                Some(Ty::Int)
            }
            (Ty::Var(_), other) | (other, Ty::Var(_)) if rank(other).is_some() => {
                let var = if matches!(left, Ty::Var(_)) { left } else { right };
                self.unifier.constrain(&self.symbols, var, other).ok()?;
                Some(other.clone())
            }
            _ => {
                let (l, r) = (rank(left)?, rank(right)?);
                Some(if l >= r { left.clone() } else { right.clone() })
            }
        }
    }

    fn operator_error(&mut self, op: BinaryOp, left: &Ty, right: &Ty, span: FileSpan) {
        let message = format!(
            "operator `{}` cannot be applied to `{}` and `{}`",
            op.as_str(),
            self.render(left),
            self.render(right)
        );
        self.invalid(message, span);
    }

    // === Lambdas and invocation ===

    fn infer_lambda(
        &mut self,
        body: &Body,
        params: &[LambdaParam],
        block: ExprId,
        expected: Option<&Ty>,
    ) -> Ty {
        let expected = expected.map(|ty| self.unifier.resolve(ty));
        let shape = match expected.as_ref().map(Ty::non_null) {
            Some(Ty::Function {
                receiver,
                params,
                ret,
            }) => Some((receiver.clone(), params.clone(), (**ret).clone())),
            _ => None,
        };
        let (receiver, expected_params, expected_ret) = match shape {
            Some((receiver, params, ret)) => (receiver, Some(params), Some(ret)),
            None => (None, None, None),
        };

        self.push_scope();
        let mut param_tys = Vec::new();
        if params.is_empty() {
            if let Some(expected_params) = expected_params {
                if let [single] = expected_params.as_slice() {
                    self.declare(self.known.it, single.clone());
                }
                param_tys = expected_params;
            }
        } else {
            for (index, param) in params.iter().enumerate() {
                let hint = expected_params
                    .as_ref()
                    .and_then(|expected| expected.get(index))
                    .cloned();
                let ty = match (&param.ty, hint) {
                    (Some(written), _) => self.lower(written),
                    (None, Some(hint)) => hint,
                    (None, None) => self.unifier.fresh(),
                };
                self.declare(param.name, ty.clone());
                param_tys.push(ty);
            }
        }
        if let Some(receiver) = &receiver {
            self.receivers.push((**receiver).clone());
        }

        let discards_result = expected_ret.as_ref() == Some(&Ty::Unit);
        let result = if discards_result {
            self.infer(body, block, None);
            Ty::Unit
        } else {
            let actual = self.infer(body, block, expected_ret.as_ref());
            if let Some(expected_ret) = &expected_ret {
                self.expect_ty(&actual, expected_ret, body.expr(block).span());
            }
            actual
        };

        if receiver.is_some() {
            self.receivers.pop();
        }
        self.pop_scope();
        Ty::Function {
            receiver,
            params: param_tys,
            ret: Box::new(result),
        }
    }

    /// Invokes a value of function type with positional arguments
    pub(crate) fn invoke(
        &mut self,
        body: &Body,
        callee: &Ty,
        args: &[rk_ir::Arg],
        span: FileSpan,
    ) -> Ty {
        let callee = self.unifier.resolve(callee);
        match callee.non_null() {
            Ty::Function { params, ret, .. } => {
                if params.len() != args.len() {
                    self.invalid(
                        format!("expected {} arguments, found {}", params.len(), args.len()),
                        span,
                    );
                    self.infer_loosely(body, args);
                    return (**ret).clone();
                }
                for (arg, param) in args.iter().zip(params) {
                    self.check(body, arg.value, param);
                }
                (**ret).clone()
            }
            Ty::Var(_) => {
                let params = args
                    .iter()
                    .map(|arg| self.infer(body, arg.value, None))
                    .collect();
                let ret = self.unifier.fresh();
                let shape = Ty::Function {
                    receiver: None,
                    params,
                    ret: Box::new(ret.clone()),
                };
                self.expect_ty(&shape, &callee, span);
                ret
            }
            Ty::Error => {
                self.infer_loosely(body, args);
                Ty::Error
            }
            other => {
                let message = format!("`{}` cannot be invoked", self.render(other));
                self.invalid(message, span);
                self.infer_loosely(body, args);
                Ty::Error
            }
        }
    }

    pub(crate) fn infer_loosely(&mut self, body: &Body, args: &[rk_ir::Arg]) {
        for arg in args {
            self.infer(body, arg.value, None);
        }
    }

    // === Control flow ===

    fn infer_when(
        &mut self,
        body: &Body,
        subject: Option<ExprId>,
        branches: &[WhenBranch],
        else_branch: Option<ExprId>,
        expected: Option<&Ty>,
    ) -> Ty {
        if let Some(subject) = subject {
            self.infer(body, subject, None);
        }
        let mut result: Option<Ty> = None;
        for branch in branches {
            for condition in &branch.conditions {
                if subject.is_some() {
                    self.infer(body, *condition, None);
                } else {
                    self.check(body, *condition, &Ty::Boolean);
                }
            }
            let ty = self.infer(body, branch.body, expected);
            result = Some(match result {
                Some(previous) => self.unifier.join(&self.symbols, &previous, &ty),
                None => ty,
            });
        }
        let Some(else_branch) = else_branch else {
            return Ty::Unit;
        };
        let ty = self.infer(body, else_branch, expected);
        match result {
            Some(previous) => self.unifier.join(&self.symbols, &previous, &ty),
            None => ty,
        }
    }

    fn infer_try(
        &mut self,
        body: &Body,
        protected: ExprId,
        catches: &[CatchClause],
        finally: Option<ExprId>,
        expected: Option<&Ty>,
    ) -> Ty {
        let mut result = self.infer(body, protected, expected);
        for clause in catches {
            self.push_scope();
            let caught = self.lower(&clause.ty);
            self.declare(clause.name, caught);
            let handler = self.infer(body, clause.body, expected);
            self.pop_scope();
            result = self.unifier.join(&self.symbols, &result, &handler);
        }
        if let Some(finally) = finally {
            self.infer(body, finally, None);
        }
        result
    }

    fn expect_throwable(&mut self, thrown: &Ty, span: FileSpan) {
        let thrown = self.unifier.resolve(thrown);
        let ok = match &thrown {
            Ty::Error | Ty::Nothing | Ty::Var(_) => true,
            Ty::Class { .. } => upcast(&self.symbols, &thrown, self.known.throwable).is_some(),
            _ => false,
        };
        if !ok {
            self.errors.push(crate::BindError::TypeMismatch {
                expected: "Throwable".to_string(),
                found: self.render(&thrown),
                span,
            });
        }
    }

    /// Element type of a `for` loop over `iterable`
    fn element_type(&mut self, iterable: &Ty, span: FileSpan) -> Ty {
        let iterable = self.unifier.resolve(iterable);
        if iterable == Ty::Error {
            return Ty::Error;
        }
        if let Some(Ty::Class { args, .. }) =
            upcast(&self.symbols, iterable.non_null(), self.known.iterable)
        {
            if let Some(element) = args.into_iter().next() {
                return element;
            }
        }
        self.errors.push(crate::BindError::TypeMismatch {
            expected: "Iterable<*>".to_string(),
            found: self.render(&iterable),
            span,
        });
        Ty::Error
    }
}
