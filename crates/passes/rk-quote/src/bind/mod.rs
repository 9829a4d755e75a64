//! Name binding and type inference
//!
//! A [`Binder`] walks one parsed fragment (or one function of the session)
//! with a stack of lexical scopes and implicit receivers. Every expression
//! gets a type in an [`ArenaMap`]; every named call remembers the signature
//! it resolved to, which the capture checker reuses.

mod call;
mod expr;

pub use call::{CallDispatch, ResolvedCall};

use crate::{BindError, QuoteScope, Unifier};
use rk_arena::ArenaMap;
use rk_intern::{Interner, Symbol};
use rk_ir::{
    Body, BodyKind, ClassDecl, Decl, ExprId, FunctionDecl, KnownNames, PropertyDecl, Session,
    SymbolTable, Ty, TypeAliasDecl, TypeRef,
};
use rk_span::FileSpan;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::iter;

/// Everything a binder learned about one body
pub(crate) struct Bound {
    pub(crate) types: ArenaMap<ExprId, Ty>,
    pub(crate) calls: FxHashMap<ExprId, ResolvedCall>,
    pub(crate) errors: Vec<BindError>,
}

pub(crate) struct Binder<'a> {
    /// Borrowed from the session until a quoted class has to be made visible
    symbols: Cow<'a, SymbolTable>,
    interner: &'a Interner,
    known: KnownNames,
    scope: &'a QuoteScope,
    unifier: Unifier,
    /// Generic parameters in scope, outermost first
    generics: Vec<Symbol>,
    locals: Vec<FxHashMap<Symbol, Ty>>,
    /// Implicit `this` receivers, innermost last
    receivers: Vec<Ty>,
    /// `context(...)` receivers of the enclosing function
    context: Vec<Ty>,
    /// Declared or inferred result of the enclosing function
    return_ty: Option<Ty>,
    types: ArenaMap<ExprId, Ty>,
    calls: FxHashMap<ExprId, ResolvedCall>,
    errors: Vec<BindError>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(session: &'a dyn Session, scope: &'a QuoteScope) -> Self {
        let symbols = session.symbols();
        let mut binder = Self {
            symbols: Cow::Borrowed(symbols),
            interner: session.interner(),
            known: *symbols.known(),
            scope,
            unifier: Unifier::new(),
            generics: Vec::new(),
            locals: vec![FxHashMap::default()],
            receivers: Vec::new(),
            context: Vec::new(),
            return_ty: scope.return_type.clone(),
            types: ArenaMap::default(),
            calls: FxHashMap::default(),
            errors: Vec::new(),
        };
        if let Some(owner) = scope.owner {
            if let Some(class) = binder.symbols.class(owner) {
                let params = class.type_params.clone();
                binder.receivers.push(Ty::Class {
                    name: owner,
                    args: params.iter().copied().map(Ty::Param).collect(),
                });
                binder.generics.extend(params);
            }
        }
        for (name, ty) in &scope.locals {
            binder.declare(*name, ty.clone());
        }
        binder
    }

    /// Resolves variables in `ty`, defaulting unconstrained ones to `Any`
    pub(crate) fn finish_ty(&self, ty: &Ty) -> Ty {
        self.unifier.finish(ty)
    }

    pub(crate) fn finish(self) -> Bound {
        let mut types = ArenaMap::default();
        for (id, ty) in self.types.iter() {
            types.insert(id, self.unifier.finish(ty));
        }
        Bound {
            types,
            calls: self.calls,
            errors: self.errors,
        }
    }

    // === Declarations ===

    pub(crate) fn bind_decl(&mut self, decl: &Decl) -> Ty {
        match decl {
            Decl::Class(class) => self.bind_class(class),
            Decl::Function(function) => self.bind_function(function),
            Decl::Property(property) => self.bind_property(property),
            Decl::TypeAlias(alias) => self.bind_alias(alias),
        }
    }

    pub(crate) fn bind_expression(&mut self, body: &Body) -> Ty {
        self.infer(body, body.root, None)
    }

    /// Binds a function; the body's types land in this binder
    pub(crate) fn bind_function(&mut self, function: &FunctionDecl) -> Ty {
        let generics = self.generics.len();
        let receivers = self.receivers.len();
        let context = self.context.len();
        let outer_return = self.return_ty.take();

        self.generics
            .extend(function.type_params.iter().map(|param| param.name));
        for param in &function.type_params {
            if let Some(bound) = &param.bound {
                self.lower(bound);
            }
        }
        for context_receiver in &function.context_receivers {
            let ty = self.lower(context_receiver);
            self.context.push(ty);
        }
        let receiver = function.receiver.as_ref().map(|r| self.lower(r));
        if let Some(receiver) = &receiver {
            self.receivers.push(receiver.clone());
        }

        self.push_scope();
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let ty = self.lower(&param.ty);
            if let Some(default) = &param.default {
                self.check_detached(default, &ty);
            }
            let local = if param.vararg {
                Ty::Class {
                    name: self.known.list,
                    args: vec![ty.clone()],
                }
            } else {
                ty.clone()
            };
            self.declare(param.name, local);
            params.push(ty);
        }

        let ret = match (&function.return_type, &function.body) {
            (Some(written), _) => self.lower(written),
            (None, Some(body)) if body.kind == BodyKind::Expression => self.unifier.fresh(),
            _ => Ty::Unit,
        };
        self.return_ty = Some(ret.clone());
        if let Some(body) = &function.body {
            match body.kind {
                BodyKind::Expression => {
                    let actual = self.infer(body, body.root, Some(&ret));
                    self.expect_ty(&actual, &ret, body.expr(body.root).span());
                }
                BodyKind::Block => {
                    self.infer(body, body.root, None);
                }
            }
        }
        self.pop_scope();

        self.return_ty = outer_return;
        self.context.truncate(context);
        self.receivers.truncate(receivers);
        self.generics.truncate(generics);
        Ty::Function {
            receiver: receiver.map(Box::new),
            params,
            ret: Box::new(ret),
        }
    }

    fn bind_class(&mut self, class: &ClassDecl) -> Ty {
        // the fragment's own class must be visible to its members
        let symbols = self.symbols.to_mut();
        symbols.insert(&Decl::Class(class.clone()));
        if let Some(companion) = class.companion() {
            symbols.insert(&Decl::Class(companion.clone()));
        }

        let generics = self.generics.len();
        self.generics
            .extend(class.type_params.iter().map(|param| param.name));
        let this = Ty::Class {
            name: class.name,
            args: class
                .type_params
                .iter()
                .map(|param| Ty::Param(param.name))
                .collect(),
        };
        for supertype in &class.supertypes {
            self.lower(supertype);
        }

        self.push_scope();
        for param in &class.primary_ctor {
            let ty = self.lower(&param.ty);
            if let Some(default) = &param.default {
                self.check_detached(default, &ty);
            }
            self.declare(param.name, ty);
        }
        self.receivers.push(this.clone());
        for member in &class.members {
            match member {
                Decl::Function(function) => {
                    self.detached(|binder| {
                        binder.bind_function(function);
                    });
                }
                Decl::Property(property) => {
                    self.detached(|binder| {
                        binder.bind_property(property);
                    });
                }
                Decl::Class(nested) => {
                    self.bind_class(nested);
                }
                Decl::TypeAlias(alias) => {
                    self.bind_alias(alias);
                }
            }
        }
        self.receivers.pop();
        self.pop_scope();
        self.generics.truncate(generics);
        this
    }

    fn bind_property(&mut self, property: &PropertyDecl) -> Ty {
        let declared = property.ty.as_ref().map(|ty| self.lower(ty));
        match (declared, &property.initializer) {
            (Some(declared), Some(initializer)) => {
                let actual = self.infer(initializer, initializer.root, Some(&declared));
                self.expect_ty(&actual, &declared, initializer.expr(initializer.root).span());
                declared
            }
            (Some(declared), None) => declared,
            (None, Some(initializer)) => self.infer(initializer, initializer.root, None),
            (None, None) => {
                let name = self.interner.resolve(&property.name).to_string();
                self.errors.push(BindError::InvalidCall {
                    message: format!("property `{name}` needs a type or an initializer"),
                    span: property.span,
                });
                Ty::Error
            }
        }
    }

    fn bind_alias(&mut self, alias: &TypeAliasDecl) -> Ty {
        let generics = self.generics.len();
        self.generics
            .extend(alias.type_params.iter().map(|param| param.name));
        let target = self.lower(&alias.target);
        self.generics.truncate(generics);
        target
    }

    /// Runs `f` against a separate type table, for bodies that live in their
    /// own arena (defaults, member bodies of a quoted class)
    fn detached(&mut self, f: impl FnOnce(&mut Self)) {
        let types = std::mem::take(&mut self.types);
        let calls = std::mem::take(&mut self.calls);
        f(self);
        self.types = types;
        self.calls = calls;
    }

    fn check_detached(&mut self, body: &Body, expected: &Ty) {
        self.detached(|binder| {
            let actual = binder.infer(body, body.root, Some(expected));
            binder.expect_ty(&actual, expected, body.expr(body.root).span());
        });
    }

    // === Scopes ===

    fn push_scope(&mut self) {
        self.locals.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare(&mut self, name: Symbol, ty: Ty) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name, ty);
        }
    }

    fn lookup_local(&self, name: Symbol) -> Option<Ty> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).cloned())
    }

    /// Implicit receivers, innermost first, followed by context receivers
    fn implicit_receivers(&self) -> Vec<Ty> {
        self.receivers
            .iter()
            .rev()
            .chain(self.context.iter())
            .cloned()
            .collect()
    }

    // === Types ===

    /// Lowers a written type, reporting names that do not resolve
    fn lower(&mut self, ty: &TypeRef) -> Ty {
        let lowered = self.symbols.lower_type(ty, &self.generics);
        if lowered.contains_error() {
            self.report_bad_type(ty);
        }
        lowered
    }

    fn lowers_cleanly(&self, ty: &TypeRef) -> bool {
        !self.symbols.lower_type(ty, &self.generics).contains_error()
    }

    fn report_bad_type(&mut self, ty: &TypeRef) {
        match ty {
            TypeRef::Star { .. } => {}
            TypeRef::Function {
                receiver,
                params,
                ret,
                ..
            } => {
                let parts = receiver
                    .as_deref()
                    .into_iter()
                    .chain(params.iter())
                    .chain(iter::once(&**ret));
                for part in parts {
                    if !self.lowers_cleanly(part) {
                        self.report_bad_type(part);
                    }
                }
            }
            TypeRef::Named {
                name, args, span, ..
            } => {
                if let Some(arg) = args.iter().find(|arg| !self.lowers_cleanly(arg)) {
                    self.report_bad_type(arg);
                    return;
                }
                let text = self.interner.resolve(name).to_string();
                if self.symbols.class(*name).is_some() {
                    self.errors.push(BindError::InvalidCall {
                        message: format!("wrong number of type arguments for `{text}`"),
                        span: *span,
                    });
                } else {
                    self.errors.push(BindError::UnresolvedReference {
                        name: text,
                        span: *span,
                    });
                }
            }
        }
    }

    // === Errors ===

    fn unresolved(&mut self, name: Symbol, span: FileSpan) {
        self.errors.push(BindError::UnresolvedReference {
            name: self.interner.resolve(&name).to_string(),
            span,
        });
    }

    fn invalid(&mut self, message: String, span: FileSpan) {
        self.errors.push(BindError::InvalidCall { message, span });
    }

    fn render(&self, ty: &Ty) -> String {
        self.unifier.finish(ty).display(self.interner).to_string()
    }

    /// Requires `actual` to conform to `expected`, recording a mismatch
    fn expect_ty(&mut self, actual: &Ty, expected: &Ty, span: FileSpan) {
        if self
            .unifier
            .constrain(&self.symbols, actual, expected)
            .is_err()
        {
            let error = BindError::TypeMismatch {
                expected: self.render(expected),
                found: self.render(actual),
                span,
            };
            self.errors.push(error);
        }
    }
}
