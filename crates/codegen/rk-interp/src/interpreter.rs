//! Tree-walking interpreter over declarations and bodies

#![allow(
    clippy::min_ident_chars,
    reason = "Short identifiers like op, l, r, f are conventional in operator implementations"
)]

use crate::{
    EvalError,
    env::{Env, Scope},
    native,
    value::{Closure, Object, Value},
};
use rk_intern::{Interner, Symbol};
use rk_ir::{
    Arg, AssignOp, BinaryOp, Body, BodyKind, ClassDecl, ClassKind, CtorParam, Decl, DeclPath,
    Expr, ExprId, FunctionDecl, KnownNames, Literal, Modifiers, Param, PropertyDecl, SourceFile,
    Stmt, StmtId, TypeRef, UnaryOp,
};
use rk_span::FileId;
use rustc_hash::FxHashMap;
use std::{cell::RefCell, cmp::Ordering, rc::Rc};

/// Maximum nesting of host calls
const MAX_DEPTH: usize = 100;

/// Non-local exits travelling up the Rust stack
#[derive(Debug)]
pub(crate) enum Unwind<'p> {
    /// `return` from the innermost function
    Return(Value<'p>),
    /// `break` out of the innermost loop
    Break,
    /// `continue` the innermost loop
    Continue,
    /// A thrown host exception
    Throw(Value<'p>),
    /// Evaluation failed
    Error(EvalError),
}

impl From<EvalError> for Unwind<'_> {
    fn from(error: EvalError) -> Self {
        Self::Error(error)
    }
}

pub(crate) type Flow<'p> = Result<Value<'p>, Unwind<'p>>;

/// Evaluated call argument
#[derive(Debug, Clone)]
pub(crate) struct Argument<'p> {
    pub(crate) name: Option<Symbol>,
    pub(crate) trailing: bool,
    pub(crate) value: Value<'p>,
}

impl<'p> Argument<'p> {
    pub(crate) fn positional(value: Value<'p>) -> Self {
        Self {
            name: None,
            trailing: false,
            value,
        }
    }
}

/// Where an expression is evaluated
#[derive(Clone)]
struct Frame<'p> {
    body: &'p Body,
    env: Env<'p>,
    /// Implicit receivers, innermost first
    receivers: Rc<[Value<'p>]>,
}

impl<'p> Frame<'p> {
    fn child(&self) -> Self {
        Self {
            body: self.body,
            env: Scope::child(&self.env),
            receivers: Rc::clone(&self.receivers),
        }
    }
}

/// A parameter of a function or primary constructor
struct ParamSpec<'p> {
    name: Symbol,
    ty: &'p TypeRef,
    vararg: bool,
    default: Option<&'p Body>,
}

impl<'p> ParamSpec<'p> {
    fn of_function(params: &'p [Param]) -> Vec<Self> {
        params
            .iter()
            .map(|param| Self {
                name: param.name,
                ty: &param.ty,
                vararg: param.vararg,
                default: param.default.as_ref(),
            })
            .collect()
    }

    fn of_ctor(params: &'p [CtorParam]) -> Vec<Self> {
        params
            .iter()
            .map(|param| Self {
                name: param.name,
                ty: &param.ty,
                vararg: false,
                default: param.default.as_ref(),
            })
            .collect()
    }
}

/// A class and where it is declared
struct ClassEntry<'p> {
    decl: &'p ClassDecl,
    path: DeclPath,
}

/// Interpreter state
pub struct Interpreter<'p> {
    interner: &'p Interner,
    known: KnownNames,
    /// Classes by simple name; companions are reached through their owner
    classes: FxHashMap<Symbol, ClassEntry<'p>>,
    /// Top-level functions, in declaration order
    functions: FxHashMap<Symbol, Vec<&'p FunctionDecl>>,
    properties: FxHashMap<Symbol, &'p PropertyDecl>,
    globals: FxHashMap<Symbol, Value<'p>>,
    /// Objects and companion objects, created on first use
    singletons: FxHashMap<DeclPath, Value<'p>>,
    output: String,
    depth: usize,
}

impl<'p> Interpreter<'p> {
    /// Creates an interpreter over `files`; later files shadow classes of
    /// earlier ones, so the prelude goes first.
    pub fn new(interner: &'p Interner, files: impl IntoIterator<Item = &'p SourceFile>) -> Self {
        let mut interpreter = Self {
            interner,
            known: KnownNames::new(interner),
            classes: FxHashMap::default(),
            functions: FxHashMap::default(),
            properties: FxHashMap::default(),
            globals: FxHashMap::default(),
            singletons: FxHashMap::default(),
            output: String::new(),
            depth: 0,
        };
        for file in files {
            for decl in &file.decls {
                interpreter.declare(decl, &DeclPath::root());
            }
        }
        interpreter
    }

    fn declare(&mut self, decl: &'p Decl, container: &DeclPath) {
        match decl {
            Decl::Class(class) => {
                let path = container.child(class.name);
                for member in &class.members {
                    if let Decl::Class(_) = member {
                        self.declare(member, &path);
                    }
                }
                if !class.is_companion() {
                    self.classes.insert(class.name, ClassEntry { decl: class, path });
                }
            }
            Decl::Function(function) if container.is_root() => {
                self.functions.entry(function.name).or_default().push(function);
            }
            Decl::Property(property) if container.is_root() => {
                self.properties.insert(property.name, property);
            }
            Decl::Function(_) | Decl::Property(_) | Decl::TypeAlias(_) => {}
        }
    }

    /// The interner owning every name of the program
    pub fn interner(&self) -> &'p Interner {
        self.interner
    }

    /// Text printed by `println` and `print` so far
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Takes the printed text, leaving the buffer empty
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Renders a value like the host's `toString()`
    pub fn render(&self, value: &Value<'p>) -> String {
        value.display(self.interner).to_string()
    }

    /// Calls the top-level function `name`
    ///
    /// # Errors
    ///
    /// Returns `EvalError` when no function accepts `args`, evaluation fails
    /// or an exception escapes the call.
    #[tracing::instrument(level = "debug", skip(self, args))]
    pub fn call(&mut self, name: &str, args: Vec<Value<'p>>) -> Result<Value<'p>, EvalError> {
        let symbol = self.interner.intern(name);
        let args: Vec<_> = args.into_iter().map(Argument::positional).collect();
        let Some(function) = self.top_level(symbol, None, &args) else {
            return Err(EvalError::UnresolvedCall {
                name: name.to_string(),
            });
        };
        let result = self.call_function(function, None, &[], args);
        self.finish(result)
    }

    fn finish(&self, flow: Flow<'p>) -> Result<Value<'p>, EvalError> {
        match flow {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Break) => Err(EvalError::StrayJump { keyword: "break" }),
            Err(Unwind::Continue) => Err(EvalError::StrayJump {
                keyword: "continue",
            }),
            Err(Unwind::Throw(thrown)) => Err(self.uncaught(&thrown)),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    fn uncaught(&self, thrown: &Value<'p>) -> EvalError {
        let (class, message) = match thrown {
            Value::Object(object) => (
                self.name(object.class.name).to_string(),
                object
                    .field(self.intern("message"))
                    .map_or_else(|| "null".to_string(), |message| self.render(&message)),
            ),
            other => (other.kind().to_string(), self.render(other)),
        };
        EvalError::Uncaught { class, message }
    }

    pub(crate) fn name(&self, symbol: Symbol) -> &'p str {
        self.interner.resolve(&symbol)
    }

    pub(crate) fn intern(&self, text: &str) -> Symbol {
        self.interner.intern(text)
    }

    pub(crate) fn known(&self) -> &KnownNames {
        &self.known
    }

    pub(crate) fn print(&mut self, text: &str) {
        tracing::trace!(text, "program output");
        self.output.push_str(text);
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::StackOverflow { limit: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }

    // === Calls ===

    fn call_function(
        &mut self,
        function: &'p FunctionDecl,
        this: Option<Value<'p>>,
        caller_receivers: &[Value<'p>],
        args: Vec<Argument<'p>>,
    ) -> Flow<'p> {
        let Some(body) = &function.body else {
            if function.span.file == FileId::PRELUDE {
                let name = self.name(function.name);
                return native::invoke(self, name, this, args);
            }
            return Err(EvalError::Unsupported(format!(
                "call to abstract function `{}`",
                self.name(function.name)
            ))
            .into());
        };
        tracing::trace!(function = self.name(function.name), depth = self.depth, "call");

        let mut receivers: Vec<_> = this.into_iter().collect();
        for context in &function.context_receivers {
            if let Some(found) = caller_receivers
                .iter()
                .find(|receiver| self.fits(receiver, context, &[]))
            {
                receivers.push(found.clone());
            }
        }
        let frame = Frame {
            body,
            env: Scope::root(),
            receivers: receivers.into(),
        };
        let specs = ParamSpec::of_function(&function.params);

        self.enter()?;
        let result = self
            .bind_args(function.name, &specs, args, &frame.env, &frame.receivers)
            .and_then(|()| self.eval(&frame, body.root));
        self.depth -= 1;
        match result {
            Ok(_) if body.kind == BodyKind::Block => Ok(Value::Unit),
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(unwind) => Err(unwind),
        }
    }

    /// Invokes a closure; `receiver` becomes the innermost implicit receiver
    pub(crate) fn call_closure(
        &mut self,
        closure: &Closure<'p>,
        receiver: Option<Value<'p>>,
        args: Vec<Value<'p>>,
    ) -> Flow<'p> {
        let env = Scope::child(&closure.env);
        if closure.params.is_empty() {
            if let [it] = args.as_slice() {
                env.define(self.known.it, it.clone());
            }
        } else {
            if args.len() < closure.params.len() {
                return Err(EvalError::ArgumentMismatch {
                    function: "lambda".to_string(),
                    reason: format!("expected {} arguments, found {}", closure.params.len(), args.len()),
                }
                .into());
            }
            for (param, value) in closure.params.iter().zip(args) {
                env.define(param.name, value);
            }
        }
        let receivers = match receiver {
            Some(receiver) => std::iter::once(receiver)
                .chain(closure.receivers.iter().cloned())
                .collect(),
            None => Rc::clone(&closure.receivers),
        };
        let frame = Frame {
            body: closure.body,
            env,
            receivers,
        };
        self.enter()?;
        let result = self.eval(&frame, closure.block);
        self.depth -= 1;
        result
    }

    /// Invokes a function value
    pub(crate) fn call_value(
        &mut self,
        callee: &Value<'p>,
        receiver: Option<Value<'p>>,
        args: Vec<Value<'p>>,
    ) -> Flow<'p> {
        match callee {
            Value::Closure(closure) => self.call_closure(closure, receiver, args),
            other => Err(mismatch("function", other, self.interner).into()),
        }
    }

    /// Binds arguments to parameters in `env`, evaluating defaults of
    /// omitted parameters in order
    fn bind_args(
        &mut self,
        function: Symbol,
        specs: &[ParamSpec<'p>],
        args: Vec<Argument<'p>>,
        env: &Env<'p>,
        receivers: &[Value<'p>],
    ) -> Result<(), Unwind<'p>> {
        let function = self.name(function);
        let invalid = |reason: String| EvalError::ArgumentMismatch {
            function: function.to_string(),
            reason,
        };
        let mut slots: Vec<Option<Value<'p>>> = vec![None; specs.len()];
        let mut spread = Vec::new();
        let mut positional = 0;
        for arg in args {
            let index = if let Some(name) = arg.name {
                specs
                    .iter()
                    .position(|spec| spec.name == name)
                    .ok_or_else(|| invalid(format!("no parameter named `{}`", self.name(name))))?
            } else if arg.trailing {
                specs
                    .len()
                    .checked_sub(1)
                    .ok_or_else(|| invalid("unexpected trailing lambda".to_string()))?
            } else {
                match specs.get(positional) {
                    Some(spec) if spec.vararg => {
                        spread.push(arg.value);
                        continue;
                    }
                    Some(_) => {
                        positional += 1;
                        positional - 1
                    }
                    None => return Err(invalid("too many arguments".to_string()).into()),
                }
            };
            slots[index] = Some(arg.value);
        }

        for (spec, slot) in specs.iter().zip(slots) {
            let value = match (slot, spec.default) {
                (Some(value), _) => value,
                (None, _) if spec.vararg => Value::list(std::mem::take(&mut spread)),
                (None, Some(default)) => self.eval_detached(default, env, receivers)?,
                (None, None) => {
                    return Err(invalid(format!("missing argument `{}`", self.name(spec.name))).into());
                }
            };
            env.define(spec.name, value);
        }
        Ok(())
    }

    /// Whether `args` can be bound to `specs` by name, position and runtime
    /// type
    fn accepts(&self, specs: &[ParamSpec<'p>], args: &[Argument<'p>]) -> bool {
        let mut provided = vec![false; specs.len()];
        let mut positional = 0;
        for arg in args {
            let index = if let Some(name) = arg.name {
                specs.iter().position(|spec| spec.name == name)
            } else if arg.trailing {
                specs.len().checked_sub(1)
            } else {
                match specs.get(positional) {
                    Some(spec) if spec.vararg => Some(positional),
                    Some(_) => {
                        positional += 1;
                        Some(positional - 1)
                    }
                    None => None,
                }
            };
            let Some(index) = index else {
                return false;
            };
            let spec = &specs[index];
            if !spec.vararg && !self.admits(&arg.value, spec.ty) {
                return false;
            }
            provided[index] = true;
        }
        specs
            .iter()
            .zip(provided)
            .all(|(spec, given)| given || spec.vararg || spec.default.is_some())
    }

    /// Overload filter: names that are neither classes nor built-in types
    /// are type parameters and admit anything
    fn admits(&self, value: &Value<'p>, ty: &TypeRef) -> bool {
        let TypeRef::Named { name, .. } = ty else {
            return self.fits(value, ty, &[]);
        };
        let known = &self.known;
        let builtin = [
            known.any,
            known.unit,
            known.boolean,
            known.int,
            known.long,
            known.double,
            known.char,
            known.string,
            known.list,
            known.mutable_list,
            known.mutable_iterable,
            known.iterable,
        ];
        if !builtin.contains(name) && !self.classes.contains_key(name) {
            return true;
        }
        match value {
            Value::Int(_) if *name == known.long => true,
            _ => self.fits(value, ty, &[]),
        }
    }

    /// Top-level function `name` applicable to `receiver` and `args`; later
    /// declarations win
    pub(crate) fn top_level(
        &self,
        name: Symbol,
        receiver: Option<&Value<'p>>,
        args: &[Argument<'p>],
    ) -> Option<&'p FunctionDecl> {
        let candidates = self.functions.get(&name)?;
        candidates.iter().rev().copied().find(|function| {
            let type_params: Vec<_> = function.type_params.iter().map(|param| param.name).collect();
            let receiver_fits = match (receiver, &function.receiver) {
                (None, None) => true,
                (Some(value), Some(ty)) => self.fits(value, ty, &type_params),
                _ => false,
            };
            receiver_fits && self.accepts(&ParamSpec::of_function(&function.params), args)
        })
    }

    /// Member function `name` of `class` or its supertypes
    fn find_member(
        &self,
        class: &'p ClassDecl,
        name: Symbol,
        args: &[Argument<'p>],
    ) -> Option<&'p FunctionDecl> {
        class
            .functions()
            .find(|function| {
                function.name == name
                    && function.receiver.is_none()
                    && self.accepts(&ParamSpec::of_function(&function.params), args)
            })
            .or_else(|| {
                self.supertypes(class)
                    .into_iter()
                    .find_map(|parent| self.find_member(parent, name, args))
            })
    }

    fn supertypes(&self, class: &'p ClassDecl) -> Vec<&'p ClassDecl> {
        class
            .supertypes
            .iter()
            .filter_map(TypeRef::head)
            .filter_map(|name| self.classes.get(&name))
            .map(|entry| entry.decl)
            .filter(|parent| !std::ptr::eq(*parent, class))
            .collect()
    }

    fn is_subclass(&self, class: &'p ClassDecl, target: Symbol) -> bool {
        class.name == target
            || target == self.known.any
            || self
                .supertypes(class)
                .into_iter()
                .any(|parent| self.is_subclass(parent, target))
    }

    /// Runtime type test against a written type
    fn fits(&self, value: &Value<'p>, ty: &TypeRef, type_params: &[Symbol]) -> bool {
        match ty {
            TypeRef::Star { .. } => true,
            TypeRef::Function { nullable, .. } => {
                matches!(value, Value::Closure(_)) || (*nullable && value.is_null())
            }
            TypeRef::Named { name, nullable, .. } => {
                if type_params.contains(name) {
                    return true;
                }
                if value.is_null() {
                    return *nullable;
                }
                let known = &self.known;
                match value {
                    _ if *name == known.any => true,
                    Value::Unit => *name == known.unit,
                    Value::Bool(_) => *name == known.boolean,
                    Value::Int(_) => *name == known.int,
                    Value::Long(_) => *name == known.long,
                    Value::Double(_) => *name == known.double,
                    Value::Char(_) => *name == known.char,
                    Value::String(_) => *name == known.string,
                    Value::List(_) => {
                        *name == known.list
                            || *name == known.mutable_list
                            || *name == known.mutable_iterable
                            || *name == known.iterable
                            || self.name(*name) == "Collection"
                    }
                    Value::Object(object) => self.is_subclass(object.class, *name),
                    Value::Null | Value::Closure(_) => false,
                }
            }
        }
    }

    // === Objects ===

    /// Builds an instance of `class`
    pub(crate) fn instantiate(&mut self, class: &'p ClassDecl, args: Vec<Argument<'p>>) -> Flow<'p> {
        tracing::trace!(class = self.name(class.name), "instantiate");
        let env = Scope::root();
        let specs = ParamSpec::of_ctor(&class.primary_ctor);
        self.enter()?;
        let result = self.bind_args(class.name, &specs, args, &env, &[]).and_then(|()| {
            let object = Rc::new(Object {
                class,
                fields: RefCell::default(),
            });
            self.initialize(class, &object, &env)?;
            Ok(Value::Object(object))
        });
        self.depth -= 1;
        result
    }

    /// Fills the properties of `class` and its superclasses, inherited ones
    /// first. Constructor arguments are passed up by name.
    fn initialize(&mut self, class: &'p ClassDecl, object: &Rc<Object<'p>>, env: &Env<'p>) -> Result<(), Unwind<'p>> {
        for parent in self.supertypes(class) {
            if parent.kind == ClassKind::Class {
                self.initialize(parent, object, env)?;
            }
        }
        for param in &class.primary_ctor {
            if param.binding.is_none() {
                continue;
            }
            let value = match env.lookup(param.name) {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => self.eval_detached(default, env, &[])?,
                    None => Value::Null,
                },
            };
            object.fields.borrow_mut().insert(param.name, value);
        }
        let this = [Value::Object(Rc::clone(object))];
        for property in class.properties() {
            let value = match &property.initializer {
                Some(initializer) => self.eval_detached(initializer, env, &this)?,
                None => Value::Null,
            };
            object.fields.borrow_mut().insert(property.name, value);
        }
        Ok(())
    }

    fn eval_detached(&mut self, body: &'p Body, env: &Env<'p>, receivers: &[Value<'p>]) -> Flow<'p> {
        let frame = Frame {
            body,
            env: Scope::child(env),
            receivers: receivers.into(),
        };
        self.eval(&frame, body.root)
    }

    /// Instance of the prelude or program class `name`
    pub(crate) fn construct(&mut self, name: &str, args: Vec<Value<'p>>) -> Flow<'p> {
        let symbol = self.intern(name);
        let Some(class) = self.classes.get(&symbol).map(|entry| entry.decl) else {
            return Err(EvalError::UnresolvedCall {
                name: name.to_string(),
            }
            .into());
        };
        self.instantiate(class, args.into_iter().map(Argument::positional).collect())
    }

    /// Throws a new instance of exception class `name`
    pub(crate) fn throw(&mut self, name: &str, message: &str) -> Flow<'p> {
        let exception = self.construct(name, vec![Value::string(message)])?;
        Err(Unwind::Throw(exception))
    }

    fn singleton(&mut self, path: DeclPath, class: &'p ClassDecl) -> Flow<'p> {
        if let Some(value) = self.singletons.get(&path) {
            return Ok(value.clone());
        }
        let value = self.instantiate(class, Vec::new())?;
        self.singletons.insert(path, value.clone());
        Ok(value)
    }

    /// The object a class name denotes in expressions: the object itself or
    /// the class's companion
    fn static_target(&mut self, name: Symbol) -> Option<Flow<'p>> {
        let entry = self.classes.get(&name)?;
        let (decl, path) = (entry.decl, entry.path.clone());
        if decl.kind == ClassKind::Object {
            return Some(self.singleton(path, decl));
        }
        let companion = decl.companion()?;
        Some(self.singleton(path.child(companion.name), companion))
    }

    fn is_instantiable(class: &ClassDecl) -> bool {
        class.kind == ClassKind::Class && !class.modifiers.contains(Modifiers::ABSTRACT)
    }

    // === Expressions ===

    fn eval(&mut self, frame: &Frame<'p>, id: ExprId) -> Flow<'p> {
        let body = frame.body;
        match body.expr(id) {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Int(i) => Value::Int(*i),
                Literal::Long(i) => Value::Long(*i),
                Literal::Double(d) => Value::Double(*d),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Char(c) => Value::Char(*c),
                Literal::String(s) => Value::string(s.as_str()),
                Literal::Null => Value::Null,
            }),
            Expr::Name { name, .. } => self.lookup_name(frame, *name),
            Expr::This { .. } => frame
                .receivers
                .first()
                .cloned()
                .ok_or_else(|| EvalError::Unsupported("`this` outside of a receiver".to_string()).into()),
            Expr::Call {
                receiver,
                safe,
                name,
                args,
                ..
            } => self.eval_call(frame, *receiver, *safe, *name, args),
            Expr::Invoke { callee, args, .. } => {
                let callee = self.eval(frame, *callee)?;
                let args = self.eval_args(frame, args)?;
                self.call_value(&callee, None, args.into_iter().map(|arg| arg.value).collect())
            }
            Expr::Member {
                receiver,
                safe,
                name,
                ..
            } => {
                let target = self.eval(frame, *receiver)?;
                if *safe && target.is_null() {
                    return Ok(Value::Null);
                }
                self.property(&target, *name)
            }
            Expr::Binary { op, lhs, rhs, .. } => self.eval_binary(frame, *op, *lhs, *rhs),
            Expr::Unary { op, operand, .. } => {
                let value = self.eval(frame, *operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                    (UnaryOp::Neg, Value::Long(i)) => Ok(Value::Long(i.wrapping_neg())),
                    (UnaryOp::Neg, Value::Double(d)) => Ok(Value::Double(-d)),
                    (UnaryOp::Not, other) => Err(mismatch("Boolean", &other, self.interner).into()),
                    (UnaryOp::Neg, other) => Err(mismatch("number", &other, self.interner).into()),
                }
            }
            Expr::NotNull { operand, .. } => match self.eval(frame, *operand)? {
                Value::Null => Err(EvalError::NullDereference.into()),
                value => Ok(value),
            },
            Expr::Annotated { expr, .. } => self.eval(frame, *expr),
            Expr::Lambda {
                params, body: block, ..
            } => Ok(Value::Closure(Rc::new(Closure {
                body,
                params,
                block: *block,
                env: Rc::clone(&frame.env),
                receivers: Rc::clone(&frame.receivers),
            }))),
            Expr::Block { stmts, tail, .. } => {
                let inner = frame.child();
                for stmt in stmts {
                    self.exec(&inner, *stmt)?;
                }
                match tail {
                    Some(tail) => self.eval(&inner, *tail),
                    None => Ok(Value::Unit),
                }
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.condition(frame, *condition)? {
                    self.eval(frame, *then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.eval(frame, *else_branch)
                } else {
                    Ok(Value::Unit)
                }
            }
            Expr::When {
                subject,
                branches,
                else_branch,
                ..
            } => {
                let subject = subject.map(|subject| self.eval(frame, subject)).transpose()?;
                for branch in branches {
                    for condition in &branch.conditions {
                        let matched = match &subject {
                            Some(subject) => self.eval(frame, *condition)? == *subject,
                            None => self.condition(frame, *condition)?,
                        };
                        if matched {
                            return self.eval(frame, branch.body);
                        }
                    }
                }
                match else_branch {
                    Some(else_branch) => self.eval(frame, *else_branch),
                    None => Ok(Value::Unit),
                }
            }
            Expr::Try {
                body: protected,
                catches,
                finally,
                ..
            } => {
                let result = match self.eval(frame, *protected) {
                    Err(Unwind::Throw(thrown)) => {
                        let handler = catches.iter().find(|clause| {
                            clause.ty.head().is_some_and(|ty| {
                                thrown
                                    .as_object()
                                    .is_some_and(|object| self.is_subclass(object.class, ty))
                            })
                        });
                        match handler {
                            Some(clause) => {
                                let inner = frame.child();
                                inner.env.define(clause.name, thrown);
                                self.eval(&inner, clause.body)
                            }
                            None => Err(Unwind::Throw(thrown)),
                        }
                    }
                    other => other,
                };
                if let Some(finally) = finally {
                    self.eval(frame, *finally)?;
                }
                result
            }
            Expr::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.eval(frame, *value)?,
                    None => Value::Unit,
                };
                Err(Unwind::Return(value))
            }
            Expr::Throw { value, .. } => {
                let thrown = self.eval(frame, *value)?;
                Err(Unwind::Throw(thrown))
            }
            Expr::Break { .. } => Err(Unwind::Break),
            Expr::Continue { .. } => Err(Unwind::Continue),
            Expr::While {
                condition, body, ..
            } => {
                while self.condition(frame, *condition)? {
                    if !self.loop_body(frame, *body)? {
                        break;
                    }
                }
                Ok(Value::Unit)
            }
            Expr::DoWhile {
                body, condition, ..
            } => {
                while self.loop_body(frame, *body)? && self.condition(frame, *condition)? {}
                Ok(Value::Unit)
            }
            Expr::For {
                binding,
                iterable,
                body,
                ..
            } => {
                let iterable = self.eval(frame, *iterable)?;
                for item in self.iterate(&iterable)? {
                    let inner = frame.child();
                    inner.env.define(*binding, item);
                    if !self.loop_body(&inner, *body)? {
                        break;
                    }
                }
                Ok(Value::Unit)
            }
        }
    }

    /// Runs one loop iteration; `false` on `break`
    fn loop_body(&mut self, frame: &Frame<'p>, body: ExprId) -> Result<bool, Unwind<'p>> {
        match self.eval(frame, body) {
            Ok(_) | Err(Unwind::Continue) => Ok(true),
            Err(Unwind::Break) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn condition(&mut self, frame: &Frame<'p>, id: ExprId) -> Result<bool, Unwind<'p>> {
        let value = self.eval(frame, id)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch("Boolean", &value, self.interner).into())
    }

    /// Elements of a list or an `IntRange`
    pub(crate) fn iterate(&self, value: &Value<'p>) -> Result<Vec<Value<'p>>, EvalError> {
        if let Some(items) = value.to_items() {
            return Ok(items);
        }
        if let Some(object) = value.as_object() {
            if object.class.name == self.known.int_range {
                let bound = |name| object.field(name).and_then(|value| value.as_int());
                if let (Some(first), Some(last)) = (bound(self.known.first), bound(self.intern("last"))) {
                    return Ok((first..=last).map(Value::Int).collect());
                }
            }
        }
        Err(mismatch("Iterable", value, self.interner))
    }

    fn exec(&mut self, frame: &Frame<'p>, id: StmtId) -> Result<(), Unwind<'p>> {
        match frame.body.stmt(id) {
            Stmt::Local { name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(frame, *init)?,
                    None => Value::Null,
                };
                frame.env.define(*name, value);
            }
            Stmt::Expr { expr, .. } => {
                self.eval(frame, *expr)?;
            }
            Stmt::Assign {
                target, op, value, ..
            } => {
                let mut value = self.eval(frame, *value)?;
                if *op != AssignOp::Assign {
                    let current = self.eval(frame, *target)?;
                    let op = if *op == AssignOp::AddAssign {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Sub
                    };
                    value = self.binary(op, &current, &value)?;
                }
                self.assign(frame, *target, value)?;
            }
        }
        Ok(())
    }

    fn assign(&mut self, frame: &Frame<'p>, target: ExprId, value: Value<'p>) -> Result<(), Unwind<'p>> {
        match frame.body.expr(target) {
            Expr::Name { name, .. } => {
                if frame.env.assign(*name, value.clone()) {
                    return Ok(());
                }
                for receiver in frame.receivers.iter() {
                    if let Some(object) = receiver.as_object() {
                        if object.fields.borrow().contains_key(name) {
                            object.fields.borrow_mut().insert(*name, value);
                            return Ok(());
                        }
                    }
                }
                if self.properties.contains_key(name) {
                    self.globals.insert(*name, value);
                    return Ok(());
                }
                Err(EvalError::UnresolvedName {
                    name: self.name(*name).to_string(),
                }
                .into())
            }
            Expr::Member { receiver, name, .. } => match self.eval(frame, *receiver)? {
                Value::Object(object) => {
                    object.fields.borrow_mut().insert(*name, value);
                    Ok(())
                }
                other => Err(mismatch("object", &other, self.interner).into()),
            },
            _ => Err(EvalError::Unsupported("assignment to a non-name".to_string()).into()),
        }
    }

    fn lookup_name(&mut self, frame: &Frame<'p>, name: Symbol) -> Flow<'p> {
        if let Some(value) = frame.env.lookup(name) {
            return Ok(value);
        }
        for receiver in frame.receivers.iter() {
            if let Some(value) = receiver.as_object().and_then(|object| object.field(name)) {
                return Ok(value);
            }
        }
        if let Some(value) = self.global(name) {
            return value;
        }
        if let Some(target) = self.static_target(name) {
            return target;
        }
        Err(EvalError::UnresolvedName {
            name: self.name(name).to_string(),
        }
        .into())
    }

    /// Top-level property `name`, initialized on first read
    fn global(&mut self, name: Symbol) -> Option<Flow<'p>> {
        if let Some(value) = self.globals.get(&name) {
            return Some(Ok(value.clone()));
        }
        let property = *self.properties.get(&name)?;
        let value = match &property.initializer {
            Some(initializer) => match self.eval_detached(initializer, &Scope::root(), &[]) {
                Ok(value) => value,
                Err(unwind) => return Some(Err(unwind)),
            },
            None => Value::Null,
        };
        self.globals.insert(name, value.clone());
        Some(Ok(value))
    }

    /// Property `name` of a value
    fn property(&mut self, target: &Value<'p>, name: Symbol) -> Flow<'p> {
        if let Some(value) = target.as_object().and_then(|object| object.field(name)) {
            return Ok(value);
        }
        match target {
            Value::String(s) if name == self.known.length => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) if name == self.known.size => Ok(Value::Int(items.borrow().len() as i64)),
            _ => Err(EvalError::UnresolvedName {
                name: format!("{}.{}", target.kind(), self.name(name)),
            }
            .into()),
        }
    }

    fn eval_args(&mut self, frame: &Frame<'p>, args: &'p [Arg]) -> Result<Vec<Argument<'p>>, Unwind<'p>> {
        args.iter()
            .map(|arg| {
                Ok(Argument {
                    name: arg.name,
                    trailing: arg.trailing,
                    value: self.eval(frame, arg.value)?,
                })
            })
            .collect()
    }

    fn eval_call(
        &mut self,
        frame: &Frame<'p>,
        receiver: Option<ExprId>,
        safe: bool,
        name: Symbol,
        args: &'p [Arg],
    ) -> Flow<'p> {
        if let Some(receiver) = receiver {
            let target = self.eval(frame, receiver)?;
            if safe && target.is_null() {
                return Ok(Value::Null);
            }
            let args = self.eval_args(frame, args)?;
            return self.call_method(target, name, args, &frame.receivers);
        }

        if let Some(callee @ Value::Closure(_)) = frame.env.lookup(name) {
            let args = self.eval_args(frame, args)?;
            return self.call_value(&callee, None, args.into_iter().map(|arg| arg.value).collect());
        }
        let args = self.eval_args(frame, args)?;
        for receiver in frame.receivers.iter() {
            if let Some(object) = receiver.as_object() {
                if let Some(function) = self.find_member(object.class, name, &args) {
                    return self.call_function(function, Some(receiver.clone()), &frame.receivers, args);
                }
                if let Some(callee @ Value::Closure(_)) = object.field(name) {
                    return self.call_value(&callee, None, args.into_iter().map(|arg| arg.value).collect());
                }
            }
            if let Some(function) = self
                .top_level(name, Some(receiver), &args)
                .filter(|function| function.body.is_some())
            {
                return self.call_function(function, Some(receiver.clone()), &frame.receivers, args);
            }
        }
        if let Some(function) = self.top_level(name, None, &args) {
            return self.call_function(function, None, &frame.receivers, args);
        }
        if let Some(class) = self.classes.get(&name).map(|entry| entry.decl) {
            if Self::is_instantiable(class) {
                return self.instantiate(class, args);
            }
        }
        for receiver in frame.receivers.iter() {
            if let Some(function) = self.top_level(name, Some(receiver), &args) {
                return self.call_function(function, Some(receiver.clone()), &frame.receivers, args);
            }
        }
        Err(EvalError::UnresolvedCall {
            name: self.name(name).to_string(),
        }
        .into())
    }

    /// Calls `name` on an explicit receiver
    fn call_method(
        &mut self,
        target: Value<'p>,
        name: Symbol,
        args: Vec<Argument<'p>>,
        caller_receivers: &[Value<'p>],
    ) -> Flow<'p> {
        if let Some(object) = target.as_object() {
            if let Some(function) = self.find_member(object.class, name, &args) {
                return self.call_function(function, Some(target), caller_receivers, args);
            }
            if let Some(callee @ Value::Closure(_)) = object.field(name) {
                return self.call_value(&callee, None, args.into_iter().map(|arg| arg.value).collect());
            }
        }
        if name == self.known.invoke && matches!(target, Value::Closure(_)) {
            return self.call_value(&target, None, args.into_iter().map(|arg| arg.value).collect());
        }
        if let Some(function) = self.top_level(name, Some(&target), &args) {
            return self.call_function(function, Some(target), caller_receivers, args);
        }
        let name = self.name(name);
        native::invoke(self, name, Some(target), args)
    }

    // === Operators ===

    fn eval_binary(&mut self, frame: &Frame<'p>, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> Flow<'p> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let left = self.condition(frame, lhs)?;
                if left == (op == BinaryOp::Or) {
                    return Ok(Value::Bool(left));
                }
                Ok(Value::Bool(self.condition(frame, rhs)?))
            }
            BinaryOp::Elvis => match self.eval(frame, lhs)? {
                Value::Null => self.eval(frame, rhs),
                value => Ok(value),
            },
            BinaryOp::Range => {
                let first = self.eval(frame, lhs)?;
                let last = self.eval(frame, rhs)?;
                self.construct("IntRange", vec![first, last])
            }
            _ => {
                let left = self.eval(frame, lhs)?;
                let right = self.eval(frame, rhs)?;
                Ok(self.binary(op, &left, &right)?)
            }
        }
    }

    fn binary(&self, op: BinaryOp, l: &Value<'p>, r: &Value<'p>) -> Result<Value<'p>, EvalError> {
        match op {
            BinaryOp::Eq => return Ok(Value::Bool(l == r)),
            BinaryOp::NotEq => return Ok(Value::Bool(l != r)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = self.compare(l, r)?;
                return Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }));
            }
            _ => {}
        }
        if op == BinaryOp::Add {
            if let Value::String(s) = l {
                return Ok(Value::string(format!("{s}{}", r.display(self.interner))));
            }
        }
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => integer(op, *a, *b).map(Value::Int),
            (Value::Int(a) | Value::Long(a), Value::Int(b) | Value::Long(b)) => {
                integer(op, *a, *b).map(Value::Long)
            }
            _ => match (as_double(l), as_double(r)) {
                (Some(a), Some(b)) => double(op, a, b).map(Value::Double),
                (None, _) => Err(mismatch("number", l, self.interner)),
                (_, None) => Err(mismatch("number", r, self.interner)),
            },
        }
    }

    fn compare(&self, l: &Value<'p>, r: &Value<'p>) -> Result<Ordering, EvalError> {
        match (l, r) {
            (Value::Int(a) | Value::Long(a), Value::Int(b) | Value::Long(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Ok(a.cmp(b)),
            _ => match (as_double(l), as_double(r)) {
                (Some(a), Some(b)) => Ok(a.total_cmp(&b)),
                _ => Err(mismatch("comparable", r, self.interner)),
            },
        }
    }
}

fn integer(op: BinaryOp, a: i64, b: i64) -> Result<i64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a.wrapping_add(b)),
        BinaryOp::Sub => Ok(a.wrapping_sub(b)),
        BinaryOp::Mul => Ok(a.wrapping_mul(b)),
        BinaryOp::Div => a.checked_div(b).ok_or(EvalError::DivisionByZero),
        BinaryOp::Rem => a.checked_rem(b).ok_or(EvalError::DivisionByZero),
        other => Err(EvalError::Unsupported(format!("operator `{}` on integers", other.as_str()))),
    }
}

fn double(op: BinaryOp, a: f64, b: f64) -> Result<f64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => Ok(a / b),
        BinaryOp::Rem => Ok(a % b),
        other => Err(EvalError::Unsupported(format!("operator `{}` on doubles", other.as_str()))),
    }
}

#[allow(clippy::cast_precision_loss, reason = "host numbers widen to Double like Kotlin")]
fn as_double(value: &Value<'_>) -> Option<f64> {
    match value {
        Value::Int(i) | Value::Long(i) => Some(*i as f64),
        Value::Double(d) => Some(*d),
        _ => None,
    }
}

pub(crate) fn mismatch(expected: &'static str, found: &Value<'_>, interner: &Interner) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: format!("{} `{}`", found.kind(), found.display(interner)),
    }
}
