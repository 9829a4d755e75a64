//! Lexical scopes

use crate::Value;
use rk_intern::Symbol;
use rustc_hash::FxHashMap;
use std::{cell::RefCell, rc::Rc};

/// Shared handle to a scope; closures keep their defining scope alive
pub type Env<'p> = Rc<Scope<'p>>;

/// Locals of one block, chained to the enclosing block
#[derive(Debug, Default)]
pub struct Scope<'p> {
    vars: RefCell<FxHashMap<Symbol, Value<'p>>>,
    parent: Option<Env<'p>>,
}

impl<'p> Scope<'p> {
    /// A scope with no parent
    pub fn root() -> Env<'p> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: None,
        })
    }

    /// A scope nested in `parent`
    pub fn child(parent: &Env<'p>) -> Env<'p> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Declares `name` in this scope, shadowing outer declarations
    pub fn define(&self, name: Symbol, value: Value<'p>) {
        self.vars.borrow_mut().insert(name, value);
    }

    /// Value of the innermost `name`
    pub fn lookup(&self, name: Symbol) -> Option<Value<'p>> {
        if let Some(value) = self.vars.borrow().get(&name) {
            return Some(value.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }

    /// Overwrites the innermost `name`; `false` when it is not declared
    pub fn assign(&self, name: Symbol, value: Value<'p>) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(&name) {
            *slot = value;
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.assign(name, value))
    }
}
