//! Declarations, annotations and types

use crate::parser::{PResult, Parser};
use rk_ir::{
    Annotation, AnnotationArg, Binding, Body, BodyKind, ClassDecl, ClassKind, CtorParam, Decl,
    FunctionDecl, Modifiers, Param, PropertyDecl, TypeAliasDecl, TypeParam, TypeRef,
    Variance,
};
use rk_lexer::TokenKind;

impl Parser<'_> {
    /// Parses top-level declarations until end of input
    pub(crate) fn parse_decls_to_end(&mut self) -> PResult<Vec<Decl>> {
        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            if self.at_eof() {
                return Ok(decls);
            }
            if self.at_word("package") || self.at_word("import") {
                self.skip_header_line();
                continue;
            }
            decls.push(self.parse_decl()?);
        }
    }

    fn skip_header_line(&mut self) {
        self.bump();
        while !self.at_eof() && !self.peek().newline_before {
            self.bump();
        }
    }

    /// Parses one declaration with its annotations and modifiers
    pub(crate) fn parse_decl(&mut self) -> PResult<Decl> {
        let start = self.start();
        let annotations = self.parse_annotations()?;
        let mut modifiers = self.parse_modifiers();
        let context_receivers = if self.at_word("context") && self.nth_at(1, TokenKind::LParen) {
            self.bump();
            self.parse_context_receivers()?
        } else {
            Vec::new()
        };
        modifiers |= self.parse_modifiers();

        match self.peek().kind {
            TokenKind::Class | TokenKind::Interface | TokenKind::Object => {
                self.parse_class(start, annotations, modifiers)
            }
            TokenKind::Fun => self
                .parse_function(start, annotations, modifiers, context_receivers)
                .map(Decl::Function),
            TokenKind::Val | TokenKind::Var => self
                .parse_property(start, annotations, modifiers)
                .map(Decl::Property),
            TokenKind::TypeAlias => self.parse_type_alias(start, annotations),
            _ => Err(self.unexpected("a declaration")),
        }
    }

    // === Annotations and modifiers ===

    pub(crate) fn parse_annotations(&mut self) -> PResult<Vec<Annotation>> {
        let mut annotations = Vec::new();
        while self.at(TokenKind::At) {
            let start = self.start();
            self.bump();
            let name = self.expect_ident()?;
            let args = if self.at_same_line(TokenKind::LParen) {
                self.parse_annotation_args()?
            } else {
                Vec::new()
            };
            annotations.push(Annotation {
                name,
                args,
                span: self.span_from(start),
            });
        }
        Ok(annotations)
    }

    fn parse_annotation_args(&mut self) -> PResult<Vec<AnnotationArg>> {
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
            let token = self.bump();
            let value = match token.kind {
                TokenKind::String => rk_lexer::unescape(self.text(token), token.span)
                    .map_err(|_| self.invalid("string literal", None, token.span))?,
                TokenKind::Int
                | TokenKind::Long
                | TokenKind::Double
                | TokenKind::True
                | TokenKind::False => self.text(token).to_string(),
                _ => {
                    return Err(self.invalid(
                        "annotation argument",
                        Some("annotation arguments must be literals"),
                        token.span,
                    ));
                }
            };
            args.push(AnnotationArg { name, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.exit();
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::empty();
        loop {
            let token = self.peek();
            if token.kind != TokenKind::Ident {
                return modifiers;
            }
            let Some(modifier) = Modifiers::from_keyword(self.text(token)) else {
                return modifiers;
            };
            let next = self.nth(1).kind;
            let starts_decl = matches!(
                next,
                TokenKind::Class
                    | TokenKind::Interface
                    | TokenKind::Object
                    | TokenKind::Fun
                    | TokenKind::Val
                    | TokenKind::Var
                    | TokenKind::Ident
            );
            if !starts_decl {
                return modifiers;
            }
            self.bump();
            modifiers |= modifier;
        }
    }

    fn parse_context_receivers(&mut self) -> PResult<Vec<TypeRef>> {
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let mut receivers = Vec::new();
        while !self.at(TokenKind::RParen) {
            receivers.push(self.parse_type()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.exit();
        self.expect(TokenKind::RParen)?;
        Ok(receivers)
    }

    fn parse_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        let mut params = Vec::new();
        if !self.eat(TokenKind::Lt) {
            return Ok(params);
        }
        while !self.at(TokenKind::Gt) {
            let mut variance = Variance::Invariant;
            if self.eat(TokenKind::In) {
                variance = Variance::In;
            } else if self.at_word("out") && self.nth_at(1, TokenKind::Ident) {
                self.bump();
                variance = Variance::Out;
            }
            if self.at_word("reified") && self.nth_at(1, TokenKind::Ident) {
                self.bump();
            }
            let name = self.expect_ident()?;
            let bound = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(TypeParam {
                name,
                variance,
                bound,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt)?;
        Ok(params)
    }

    // === Classes ===

    fn parse_class(
        &mut self,
        start: u32,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
    ) -> PResult<Decl> {
        let kind = match self.bump().kind {
            TokenKind::Interface => ClassKind::Interface,
            TokenKind::Object => ClassKind::Object,
            _ => ClassKind::Class,
        };
        let name = if self.at(TokenKind::Ident) {
            self.expect_ident()?
        } else if kind == ClassKind::Object && modifiers.contains(Modifiers::COMPANION) {
            self.intern("Companion")
        } else {
            return Err(self.unexpected("a class name"));
        };
        let type_params = self.parse_type_params()?;
        let primary_ctor = if kind == ClassKind::Class && self.at_same_line(TokenKind::LParen) {
            self.parse_ctor_params()?
        } else {
            Vec::new()
        };
        let supertypes = if self.eat(TokenKind::Colon) {
            self.parse_supertypes()?
        } else {
            Vec::new()
        };
        let mut class = ClassDecl {
            name,
            kind,
            modifiers,
            annotations,
            type_params,
            primary_ctor,
            supertypes,
            members: Vec::new(),
            span: self.span_from(start),
        };
        if self.at_same_line(TokenKind::LBrace) {
            class.members = self.parse_class_body(&class)?;
        }
        class.span = self.span_from(start);
        Ok(Decl::Class(class))
    }

    fn parse_ctor_params(&mut self) -> PResult<Vec<CtorParam>> {
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let start = self.start();
            let annotations = self.parse_annotations()?;
            self.parse_modifiers();
            let binding = match self.peek().kind {
                TokenKind::Val => Some(Binding::Val),
                TokenKind::Var => Some(Binding::Var),
                _ => None,
            };
            if binding.is_some() {
                self.bump();
            }
            let name = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let default = self.parse_default()?;
            params.push(CtorParam {
                name,
                ty,
                binding,
                annotations,
                default,
                span: self.span_from(start),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.exit();
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_default(&mut self) -> PResult<Option<Body>> {
        if !self.eat(TokenKind::Eq) {
            return Ok(None);
        }
        let mut body = Body::new(BodyKind::Expression);
        body.root = self.parse_expr(&mut body)?;
        Ok(Some(body))
    }

    fn parse_supertypes(&mut self) -> PResult<Vec<TypeRef>> {
        let mut supertypes = Vec::new();
        loop {
            supertypes.push(self.parse_type()?);
            if self.at_same_line(TokenKind::LParen) {
                // superclass constructor arguments are evaluated by nobody
                let mut scratch = Body::new(BodyKind::Expression);
                self.parse_call_args(&mut scratch)?;
            }
            if !self.eat(TokenKind::Comma) {
                return Ok(supertypes);
            }
        }
    }

    fn parse_class_body(&mut self, class: &ClassDecl) -> PResult<Vec<Decl>> {
        self.expect(TokenKind::LBrace)?;
        self.enter(true);
        let mut members = Vec::new();
        if class.modifiers.contains(Modifiers::ENUM) {
            members.extend(self.parse_enum_entries(class)?);
        }
        loop {
            self.skip_semis();
            if self.at(TokenKind::RBrace) || self.at_eof() {
                break;
            }
            members.push(self.parse_decl()?);
        }
        self.exit();
        self.expect(TokenKind::RBrace)?;
        Ok(members)
    }

    /// Enum entries become nested objects extending the enum
    fn parse_enum_entries(&mut self, class: &ClassDecl) -> PResult<Vec<Decl>> {
        let mut entries = Vec::new();
        while self.at(TokenKind::Ident) && self.at_enum_entry() {
            let start = self.start();
            let name = self.expect_ident()?;
            let span = self.span_from(start);
            entries.push(Decl::Class(ClassDecl {
                name,
                kind: ClassKind::Object,
                modifiers: Modifiers::empty(),
                annotations: Vec::new(),
                type_params: Vec::new(),
                primary_ctor: Vec::new(),
                supertypes: vec![TypeRef::named(class.name, span)],
                members: Vec::new(),
                span,
            }));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.eat(TokenKind::Semi);
        Ok(entries)
    }

    fn at_enum_entry(&self) -> bool {
        let next = self.nth(1);
        next.newline_before
            || matches!(
                next.kind,
                TokenKind::Comma | TokenKind::Semi | TokenKind::RBrace
            )
    }

    // === Functions ===

    fn parse_function(
        &mut self,
        start: u32,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
        context_receivers: Vec<TypeRef>,
    ) -> PResult<FunctionDecl> {
        self.expect(TokenKind::Fun)?;
        let type_params = self.parse_type_params()?;
        let receiver = self.parse_receiver()?;
        let name = self.expect_ident()?;
        let params = self.parse_params()?;
        let return_type = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = if self.eat(TokenKind::Eq) {
            let mut body = Body::new(BodyKind::Expression);
            body.root = self.parse_expr(&mut body)?;
            Some(body)
        } else if self.at_same_line(TokenKind::LBrace) {
            let mut body = Body::new(BodyKind::Block);
            body.root = self.parse_block(&mut body)?;
            Some(body)
        } else {
            None
        };
        Ok(FunctionDecl {
            name,
            modifiers,
            annotations,
            type_params,
            context_receivers,
            receiver,
            params,
            return_type,
            body,
            span: self.span_from(start),
        })
    }

    /// `Recv.` before a function name
    fn parse_receiver(&mut self) -> PResult<Option<TypeRef>> {
        let checkpoint = self.pos;
        if self.at(TokenKind::Ident) && !self.nth_at(1, TokenKind::LParen) {
            if let Ok(mut ty) = self.parse_simple_type() {
                if self.eat(TokenKind::Dot) {
                    return Ok(Some(ty));
                }
                // `Any?.name` lexes the `?` into the safe-call token
                if self.eat(TokenKind::SafeDot) {
                    if let TypeRef::Named { nullable, .. } = &mut ty {
                        *nullable = true;
                    }
                    return Ok(Some(ty));
                }
            }
        }
        self.pos = checkpoint;
        Ok(None)
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let start = self.start();
            let annotations = self.parse_annotations()?;
            let modifiers = self.parse_modifiers();
            let name = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let default = self.parse_default()?;
            params.push(Param {
                name,
                ty,
                annotations,
                vararg: modifiers.contains(Modifiers::VARARG),
                default,
                span: self.span_from(start),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.exit();
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    // === Properties and aliases ===

    fn parse_property(
        &mut self,
        start: u32,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
    ) -> PResult<PropertyDecl> {
        let binding = if self.bump().kind == TokenKind::Var {
            Binding::Var
        } else {
            Binding::Val
        };
        let name = self.expect_ident()?;
        let ty = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = self.parse_default()?;
        Ok(PropertyDecl {
            name,
            binding,
            modifiers,
            annotations,
            ty,
            initializer,
            span: self.span_from(start),
        })
    }

    fn parse_type_alias(&mut self, start: u32, annotations: Vec<Annotation>) -> PResult<Decl> {
        self.expect(TokenKind::TypeAlias)?;
        let name = self.expect_ident()?;
        let type_params = self.parse_type_params()?;
        self.expect(TokenKind::Eq)?;
        let target = self.parse_type()?;
        Ok(Decl::TypeAlias(TypeAliasDecl {
            name,
            annotations,
            type_params,
            target,
            span: self.span_from(start),
        }))
    }

    // === Types ===

    /// Parses a type, including function types
    pub(crate) fn parse_type(&mut self) -> PResult<TypeRef> {
        let start = self.start();
        if self.at(TokenKind::LParen) {
            return self.parse_paren_type(start, None);
        }
        let simple = self.parse_simple_type()?;
        if self.at(TokenKind::Dot) && self.nth_at(1, TokenKind::LParen) {
            self.bump();
            return self.parse_paren_type(start, Some(simple));
        }
        Ok(simple)
    }

    fn parse_paren_type(&mut self, start: u32, receiver: Option<TypeRef>) -> PResult<TypeRef> {
        self.expect(TokenKind::LParen)?;
        self.enter(false);
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            // named function type parameters: `(value: Int) -> Unit`
            if self.at(TokenKind::Ident) && self.nth_at(1, TokenKind::Colon) {
                self.bump();
                self.bump();
            }
            params.push(self.parse_type()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.exit();
        self.expect(TokenKind::RParen)?;

        if self.eat(TokenKind::Arrow) {
            let ret = self.parse_type()?;
            return Ok(TypeRef::Function {
                receiver: receiver.map(Box::new),
                params,
                ret: Box::new(ret),
                nullable: false,
                span: self.span_from(start),
            });
        }
        if receiver.is_some() || params.len() != 1 {
            return Err(self.unexpected("`->`"));
        }
        let mut inner = params.remove(0);
        if self.eat(TokenKind::Question) {
            match &mut inner {
                TypeRef::Named { nullable, .. } | TypeRef::Function { nullable, .. } => {
                    *nullable = true;
                }
                TypeRef::Star { .. } => {}
            }
        }
        Ok(inner)
    }

    pub(crate) fn parse_simple_type(&mut self) -> PResult<TypeRef> {
        let start = self.start();
        let name = self.expect_ident()?;
        let mut args = Vec::new();
        if self.at(TokenKind::Lt) {
            self.bump();
            while !self.at(TokenKind::Gt) {
                if self.at(TokenKind::Star) {
                    let star = self.bump();
                    args.push(TypeRef::Star {
                        span: self.span_from(star.span.start),
                    });
                } else {
                    if self.at(TokenKind::In)
                        || (self.at_word("out") && self.nth_at(1, TokenKind::Ident))
                    {
                        self.bump();
                    }
                    args.push(self.parse_type()?);
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt)?;
        }
        let nullable = self.eat(TokenKind::Question);
        Ok(TypeRef::Named {
            name,
            args,
            nullable,
            span: self.span_from(start),
        })
    }
}
