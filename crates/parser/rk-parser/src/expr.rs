//! Expressions and statements
//!
//! Precedence climbs from `||` down to postfix operators, following the host
//! language: disjunction, conjunction, equality, comparison, elvis, infix
//! calls, range, additive, multiplicative, prefix, postfix.

use crate::parser::{PResult, Parser};
use rk_ir::{
    Arg, AssignOp, BinaryOp, Body, CatchClause, Expr, ExprId, LambdaParam, Literal, Stmt,
    StmtId, UnaryOp, WhenBranch,
};
use rk_lexer::TokenKind;
use rk_span::FileSpan;

/// A parsed statement whose role depends on its position in the block
enum Pending {
    Stmt(StmtId),
    Expr(ExprId, FileSpan),
}

impl Parser<'_> {
    /// Parses an expression into `body`
    pub(crate) fn parse_expr(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.parse_disjunction(body)
    }

    // === Binary levels ===

    fn binary_level(
        &mut self,
        body: &mut Body,
        ops: &[(TokenKind, BinaryOp)],
        across_lines: bool,
        next: fn(&mut Self, &mut Body) -> PResult<ExprId>,
    ) -> PResult<ExprId> {
        let start = self.start();
        let mut lhs = next(self, body)?;
        loop {
            let kind = self.peek().kind;
            let Some(op) = ops.iter().find(|(k, _)| *k == kind).map(|(_, op)| *op) else {
                return Ok(lhs);
            };
            if !across_lines && self.line_break() {
                return Ok(lhs);
            }
            self.bump();
            let rhs = next(self, body)?;
            lhs = body.alloc_expr(Expr::Binary {
                op,
                lhs,
                rhs,
                span: self.span_from(start),
            });
        }
    }

    fn parse_disjunction(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[(TokenKind::OrOr, BinaryOp::Or)],
            true,
            Self::parse_conjunction,
        )
    }

    fn parse_conjunction(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[(TokenKind::AndAnd, BinaryOp::And)],
            true,
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::NotEq, BinaryOp::NotEq)],
            false,
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            false,
            Self::parse_elvis,
        )
    }

    fn parse_elvis(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[(TokenKind::Elvis, BinaryOp::Elvis)],
            true,
            Self::parse_infix_call,
        )
    }

    /// `lhs name rhs`, such as `"foo" to this.foo`
    fn parse_infix_call(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        let mut lhs = self.parse_range(body)?;
        while self.at_same_line(TokenKind::Ident) {
            let name = self.expect_ident()?;
            let rhs = self.parse_range(body)?;
            lhs = body.alloc_expr(Expr::Call {
                receiver: Some(lhs),
                safe: false,
                name,
                args: vec![Arg {
                    name: None,
                    value: rhs,
                    trailing: false,
                }],
                infix: true,
                span: self.span_from(start),
            });
        }
        Ok(lhs)
    }

    fn parse_range(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[(TokenKind::DotDot, BinaryOp::Range)],
            false,
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            false,
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.binary_level(
            body,
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
            false,
            Self::parse_prefix,
        )
    }

    fn parse_prefix(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::At => return self.parse_annotated(body),
            _ => return self.parse_postfix(body),
        };
        self.bump();
        let operand = self.parse_prefix(body)?;
        Ok(body.alloc_expr(Expr::Unary {
            op,
            operand,
            span: self.span_from(start),
        }))
    }

    /// `@A @B operand`; the annotation closest to the operand wraps it first
    fn parse_annotated(&mut self, body: &mut Body) -> PResult<ExprId> {
        let annotations = self.parse_annotations()?;
        let mut expr = self.parse_prefix(body)?;
        for annotation in annotations.into_iter().rev() {
            let span = self.span_from(annotation.span.span.start);
            expr = body.alloc_expr(Expr::Annotated {
                annotation,
                expr,
                span,
            });
        }
        Ok(expr)
    }

    // === Postfix ===

    fn parse_postfix(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        let mut expr = self.parse_primary(body)?;
        loop {
            match self.peek().kind {
                TokenKind::Dot | TokenKind::SafeDot => {
                    let safe = self.bump().kind == TokenKind::SafeDot;
                    let name = self.expect_ident()?;
                    expr = if self.at_same_line(TokenKind::LParen)
                        || self.at_same_line(TokenKind::LBrace)
                    {
                        let args = self.parse_call_suffix(body)?;
                        body.alloc_expr(Expr::Call {
                            receiver: Some(expr),
                            safe,
                            name,
                            args,
                            infix: false,
                            span: self.span_from(start),
                        })
                    } else {
                        body.alloc_expr(Expr::Member {
                            receiver: expr,
                            safe,
                            name,
                            span: self.span_from(start),
                        })
                    };
                }
                TokenKind::BangBang if !self.line_break() => {
                    self.bump();
                    expr = body.alloc_expr(Expr::NotNull {
                        operand: expr,
                        span: self.span_from(start),
                    });
                }
                TokenKind::LParen if !self.line_break() => {
                    let args = self.parse_call_suffix(body)?;
                    expr = body.alloc_expr(Expr::Invoke {
                        callee: expr,
                        args,
                        span: self.span_from(start),
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `(args)` followed by an optional trailing lambda, or a lone trailing
    /// lambda
    fn parse_call_suffix(&mut self, body: &mut Body) -> PResult<Vec<Arg>> {
        let mut args = if self.at(TokenKind::LParen) {
            self.parse_call_args(body)?
        } else {
            Vec::new()
        };
        if self.at_same_line(TokenKind::LBrace) {
            let value = self.parse_lambda(body)?;
            args.push(Arg {
                name: None,
                value,
                trailing: true,
            });
        }
        Ok(args)
    }

    /// Parenthesized argument list
    pub(crate) fn parse_call_args(&mut self, body: &mut Body) -> PResult<Vec<Arg>> {
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            let name = if self.at(TokenKind::Ident) && self.nth_at(1, TokenKind::Eq) {
                let name = self.expect_ident()?;
                self.bump();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expr(body)?;
            args.push(Arg {
                name,
                value,
                trailing: false,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.exit();
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    // === Primary ===

    fn parse_primary(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        let token = self.peek();
        let literal = match token.kind {
            TokenKind::Int => Some(Literal::Int(self.parse_int(token, "")?)),
            TokenKind::Long => Some(Literal::Long(self.parse_int(token, "L")?)),
            TokenKind::Double => {
                let text = self.text(token).replace('_', "");
                let value = text
                    .parse()
                    .map_err(|_| self.invalid("number", None, token.span))?;
                Some(Literal::Double(value))
            }
            TokenKind::True => Some(Literal::Bool(true)),
            TokenKind::False => Some(Literal::Bool(false)),
            TokenKind::Null => Some(Literal::Null),
            TokenKind::String => {
                let text = rk_lexer::unescape(self.text(token), token.span).map_err(|err| {
                    self.invalid("string literal", Some(&err.to_string()), token.span)
                })?;
                Some(Literal::String(text))
            }
            TokenKind::Char => {
                let text = rk_lexer::unescape(self.text(token), token.span).map_err(|err| {
                    self.invalid("character literal", Some(&err.to_string()), token.span)
                })?;
                let c = text
                    .chars()
                    .next()
                    .ok_or_else(|| self.invalid("character literal", None, token.span))?;
                Some(Literal::Char(c))
            }
            _ => None,
        };
        if let Some(value) = literal {
            self.bump();
            return Ok(body.alloc_expr(Expr::Literal {
                value,
                span: self.span_from(start),
            }));
        }

        match token.kind {
            TokenKind::Ident => {
                let name = self.expect_ident()?;
                if self.at_same_line(TokenKind::LParen) || self.at_same_line(TokenKind::LBrace) {
                    let args = self.parse_call_suffix(body)?;
                    return Ok(body.alloc_expr(Expr::Call {
                        receiver: None,
                        safe: false,
                        name,
                        args,
                        infix: false,
                        span: self.span_from(start),
                    }));
                }
                Ok(body.alloc_expr(Expr::Name {
                    name,
                    span: self.span_from(start),
                }))
            }
            TokenKind::This => {
                self.bump();
                Ok(body.alloc_expr(Expr::This {
                    span: self.span_from(start),
                }))
            }
            TokenKind::LParen => {
                self.bump();
                self.enter(false);
                let inner = self.parse_expr(body)?;
                self.exit();
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBrace => self.parse_lambda(body),
            TokenKind::If => self.parse_if(body),
            TokenKind::When => self.parse_when(body),
            TokenKind::Try => self.parse_try(body),
            TokenKind::Return => {
                self.bump();
                let value = if self.can_start_value() {
                    Some(self.parse_expr(body)?)
                } else {
                    None
                };
                Ok(body.alloc_expr(Expr::Return {
                    value,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Throw => {
                self.bump();
                let value = self.parse_expr(body)?;
                Ok(body.alloc_expr(Expr::Throw {
                    value,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Break => {
                self.bump();
                Ok(body.alloc_expr(Expr::Break {
                    span: self.span_from(start),
                }))
            }
            TokenKind::Continue => {
                self.bump();
                Ok(body.alloc_expr(Expr::Continue {
                    span: self.span_from(start),
                }))
            }
            TokenKind::While => self.parse_while(body),
            TokenKind::Do => self.parse_do_while(body),
            TokenKind::For => self.parse_for(body),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_int(&self, token: rk_lexer::Token, suffix: &str) -> PResult<i64> {
        let text = self.text(token);
        let digits = text.strip_suffix(suffix).unwrap_or(text).replace('_', "");
        digits
            .parse()
            .map_err(|_| self.invalid("number", Some("integer literal out of range"), token.span))
    }

    /// Whether the current token can start the value of a `return`
    fn can_start_value(&self) -> bool {
        !self.line_break()
            && !matches!(
                self.peek().kind,
                TokenKind::RBrace
                    | TokenKind::RParen
                    | TokenKind::Semi
                    | TokenKind::Comma
                    | TokenKind::Else
                    | TokenKind::Eof
            )
    }

    // === Lambdas and blocks ===

    fn parse_lambda(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::LBrace)?;
        self.enter(true);
        let params = self.parse_lambda_params();
        let (stmts, tail) = self.parse_statements(body)?;
        self.exit();
        self.expect(TokenKind::RBrace)?;
        let span = self.span_from(start);
        let block = body.alloc_expr(Expr::Block { stmts, tail, span });
        Ok(body.alloc_expr(Expr::Lambda {
            params,
            body: block,
            span,
        }))
    }

    /// `a, b: Int ->`; restores the cursor when no arrow follows
    fn parse_lambda_params(&mut self) -> Vec<LambdaParam> {
        let checkpoint = self.pos;
        if self.eat(TokenKind::Arrow) {
            return Vec::new();
        }
        let mut params = Vec::new();
        while self.at(TokenKind::Ident) {
            let Ok(name) = self.expect_ident() else { break };
            let ty = if self.eat(TokenKind::Colon) {
                match self.parse_type() {
                    Ok(ty) => Some(ty),
                    Err(_) => break,
                }
            } else {
                None
            };
            params.push(LambdaParam { name, ty });
            if self.eat(TokenKind::Arrow) {
                return params;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.pos = checkpoint;
        Vec::new()
    }

    /// `{ statements }` as an [`Expr::Block`]
    pub(crate) fn parse_block(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::LBrace)?;
        self.enter(true);
        let (stmts, tail) = self.parse_statements(body)?;
        self.exit();
        self.expect(TokenKind::RBrace)?;
        Ok(body.alloc_expr(Expr::Block {
            stmts,
            tail,
            span: self.span_from(start),
        }))
    }

    /// Statements up to the closing brace; a final expression statement
    /// becomes the block's value
    fn parse_statements(&mut self, body: &mut Body) -> PResult<(Vec<StmtId>, Option<ExprId>)> {
        let mut pending = Vec::new();
        loop {
            self.skip_semis();
            if self.at(TokenKind::RBrace) || self.at_eof() {
                break;
            }
            pending.push(self.parse_statement(body)?);
            if !(self.at(TokenKind::RBrace)
                || self.at(TokenKind::Semi)
                || self.at_eof()
                || self.peek().newline_before)
            {
                return Err(self.unexpected("a line break or `;`"));
            }
        }

        let tail = match pending.last() {
            Some(Pending::Expr(expr, _)) => {
                let expr = *expr;
                pending.pop();
                Some(expr)
            }
            _ => None,
        };
        let stmts = pending
            .into_iter()
            .map(|item| match item {
                Pending::Stmt(stmt) => stmt,
                Pending::Expr(expr, span) => body.alloc_stmt(Stmt::Expr { expr, span }),
            })
            .collect();
        Ok((stmts, tail))
    }

    fn parse_statement(&mut self, body: &mut Body) -> PResult<Pending> {
        let start = self.start();
        if self.at(TokenKind::Val) || self.at(TokenKind::Var) {
            let mutable = self.bump().kind == TokenKind::Var;
            let name = self.expect_ident()?;
            let ty = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let init = if self.eat(TokenKind::Eq) {
                Some(self.parse_expr(body)?)
            } else {
                None
            };
            let stmt = body.alloc_stmt(Stmt::Local {
                name,
                mutable,
                ty,
                init,
                span: self.span_from(start),
            });
            return Ok(Pending::Stmt(stmt));
        }

        let expr = self.parse_expr(body)?;
        let op = match self.peek().kind {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::AddAssign),
            TokenKind::MinusEq => Some(AssignOp::SubAssign),
            _ => None,
        };
        match op {
            Some(op) if !self.line_break() => {
                let target_span = body.expr(expr).span();
                if !matches!(body.expr(expr), Expr::Name { .. } | Expr::Member { .. }) {
                    return Err(self.invalid(
                        "assignment target",
                        Some("only names and properties can be assigned"),
                        target_span.span,
                    ));
                }
                self.bump();
                let value = self.parse_expr(body)?;
                let stmt = body.alloc_stmt(Stmt::Assign {
                    target: expr,
                    op,
                    value,
                    span: self.span_from(start),
                });
                Ok(Pending::Stmt(stmt))
            }
            _ => Ok(Pending::Expr(expr, self.span_from(start))),
        }
    }

    /// Body of `if`, loops and `when` branches: a block or one expression
    fn parse_control_body(&mut self, body: &mut Body) -> PResult<ExprId> {
        if self.at(TokenKind::LBrace) {
            self.parse_block(body)
        } else {
            self.parse_expr(body)
        }
    }

    fn parse_condition(&mut self, body: &mut Body) -> PResult<ExprId> {
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let condition = self.parse_expr(body)?;
        self.exit();
        self.expect(TokenKind::RParen)?;
        Ok(condition)
    }

    // === Control flow ===

    fn parse_if(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::If)?;
        let condition = self.parse_condition(body)?;
        let then_branch = self.parse_control_body(body)?;
        // `else ->` on the next line belongs to an enclosing `when`
        let else_branch = if self.at(TokenKind::Else) && !self.nth_at(1, TokenKind::Arrow) {
            self.bump();
            Some(self.parse_control_body(body)?)
        } else {
            None
        };
        Ok(body.alloc_expr(Expr::If {
            condition,
            then_branch,
            else_branch,
            span: self.span_from(start),
        }))
    }

    fn parse_when(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::When)?;
        let subject = if self.at(TokenKind::LParen) {
            Some(self.parse_condition(body)?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;
        self.enter(true);
        let mut branches = Vec::new();
        let mut else_branch = None;
        loop {
            self.skip_semis();
            if self.at(TokenKind::RBrace) || self.at_eof() {
                break;
            }
            if self.eat(TokenKind::Else) {
                self.expect(TokenKind::Arrow)?;
                else_branch = Some(self.parse_control_body(body)?);
                continue;
            }
            let mut conditions = vec![self.parse_expr(body)?];
            while self.eat(TokenKind::Comma) {
                conditions.push(self.parse_expr(body)?);
            }
            self.expect(TokenKind::Arrow)?;
            let branch_body = self.parse_control_body(body)?;
            branches.push(WhenBranch {
                conditions,
                body: branch_body,
            });
        }
        self.exit();
        self.expect(TokenKind::RBrace)?;
        Ok(body.alloc_expr(Expr::When {
            subject,
            branches,
            else_branch,
            span: self.span_from(start),
        }))
    }

    fn parse_try(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::Try)?;
        let protected = self.parse_block(body)?;
        let mut catches = Vec::new();
        while self.eat(TokenKind::Catch) {
            self.expect(TokenKind::LParen)?;
            self.enter(false);
            let name = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            self.exit();
            self.expect(TokenKind::RParen)?;
            let handler = self.parse_block(body)?;
            catches.push(CatchClause {
                name,
                ty,
                body: handler,
            });
        }
        let finally = if self.eat(TokenKind::Finally) {
            Some(self.parse_block(body)?)
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            return Err(self.unexpected("`catch` or `finally`"));
        }
        Ok(body.alloc_expr(Expr::Try {
            body: protected,
            catches,
            finally,
            span: self.span_from(start),
        }))
    }

    fn parse_while(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::While)?;
        let condition = self.parse_condition(body)?;
        let loop_body = self.parse_control_body(body)?;
        Ok(body.alloc_expr(Expr::While {
            condition,
            body: loop_body,
            span: self.span_from(start),
        }))
    }

    fn parse_do_while(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::Do)?;
        let loop_body = self.parse_block(body)?;
        self.expect(TokenKind::While)?;
        let condition = self.parse_condition(body)?;
        Ok(body.alloc_expr(Expr::DoWhile {
            body: loop_body,
            condition,
            span: self.span_from(start),
        }))
    }

    fn parse_for(&mut self, body: &mut Body) -> PResult<ExprId> {
        let start = self.start();
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let binding = self.expect_ident()?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expr(body)?;
        self.exit();
        self.expect(TokenKind::RParen)?;
        let loop_body = self.parse_control_body(body)?;
        Ok(body.alloc_expr(Expr::For {
            binding,
            iterable,
            body: loop_body,
            span: self.span_from(start),
        }))
    }
}
