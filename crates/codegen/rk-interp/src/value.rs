//! Runtime value representation

#![allow(
    clippy::min_ident_chars,
    reason = "Short identifiers like i, f, b, s are conventional in value implementations"
)]

use crate::env::Env;
use indexmap::IndexMap;
use rk_intern::{Interner, Symbol};
use rk_ir::{Body, ClassDecl, ExprId, LambdaParam, Modifiers};
use std::{cell::RefCell, fmt, rc::Rc};

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value<'p> {
    /// `Unit`
    Unit,
    /// `null`
    Null,
    /// `Boolean`
    Bool(bool),
    /// `Int`
    Int(i64),
    /// `Long`
    Long(i64),
    /// `Double`
    Double(f64),
    /// `Char`
    Char(char),
    /// `String`
    String(Rc<str>),
    /// `List` and `MutableList`; lists share their storage
    List(Rc<RefCell<Vec<Self>>>),
    /// Class instance or object
    Object(Rc<Object<'p>>),
    /// Lambda together with what it captured
    Closure(Rc<Closure<'p>>),
}

/// Instance of a declared class
#[derive(Debug)]
pub struct Object<'p> {
    /// Class of the instance
    pub class: &'p ClassDecl,
    /// Properties in declaration order, inherited ones first
    pub fields: RefCell<IndexMap<Symbol, Value<'p>>>,
}

impl<'p> Object<'p> {
    /// Whether instances compare by their constructor properties
    pub fn is_data(&self) -> bool {
        self.class.modifiers.contains(Modifiers::DATA)
    }

    /// Value of property `name`
    pub fn field(&self, name: Symbol) -> Option<Value<'p>> {
        self.fields.borrow().get(&name).cloned()
    }
}

/// A lambda literal closed over its defining scope
#[derive(Debug)]
pub struct Closure<'p> {
    /// Body the lambda is allocated in
    pub body: &'p Body,
    /// Declared parameters
    pub params: &'p [LambdaParam],
    /// The lambda's block
    pub block: ExprId,
    /// Captured locals
    pub env: Env<'p>,
    /// Captured implicit receivers, innermost first
    pub receivers: Rc<[Value<'p>]>,
}

impl<'p> Value<'p> {
    /// Creates a string value
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Self::String(text.into())
    }

    /// Creates a list value
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Get the value as a boolean, if possible
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as an integer, if possible
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) | Self::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a string slice, if possible
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The instance, if this is one
    #[must_use]
    pub fn as_object(&self) -> Option<&Rc<Object<'p>>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Snapshot of the elements, if this is a list
    #[must_use]
    pub fn to_items(&self) -> Option<Vec<Self>> {
        match self {
            Self::List(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// Whether this is `null`
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short description used in error messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "Unit",
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Int",
            Self::Long(_) => "Long",
            Self::Double(_) => "Double",
            Self::Char(_) => "Char",
            Self::String(_) => "String",
            Self::List(_) => "List",
            Self::Object(_) => "object",
            Self::Closure(_) => "function",
        }
    }

    /// Renders the value like the host's `toString()`
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a Interner) -> ValueDisplay<'a, 'p> {
        ValueDisplay {
            value: self,
            interner,
        }
    }
}

/// Structural equality: data classes compare their properties, other
/// objects and closures compare by identity.
impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) | (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Self::Object(a), Self::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                a.is_data()
                    && std::ptr::eq(a.class, b.class)
                    && *a.fields.borrow() == *b.fields.borrow()
            }
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Helper returned by [`Value::display`]
pub struct ValueDisplay<'a, 'p> {
    value: &'a Value<'p>,
    interner: &'a Interner,
}

impl ValueDisplay<'_, '_> {
    fn nested<'b, 'p>(&'b self, value: &'b Value<'p>) -> ValueDisplay<'b, 'p> {
        ValueDisplay {
            value,
            interner: self.interner,
        }
    }
}

impl fmt::Display for ValueDisplay<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Unit => write!(f, "kotlin.Unit"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) | Value::Long(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.nested(item))?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                let name = self.interner.resolve(&object.class.name);
                if !object.is_data() {
                    return write!(f, "{name}@{:x}", Rc::as_ptr(object).addr());
                }
                let fields = object.fields.borrow();
                // Pair prints as a tuple
                if name == "Pair" {
                    write!(f, "(")?;
                    for (i, value) in fields.values().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", self.nested(value))?;
                    }
                    return write!(f, ")");
                }
                write!(f, "{name}(")?;
                for (i, (field, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", self.interner.resolve(field), self.nested(value))?;
                }
                write!(f, ")")
            }
            Value::Closure(_) => write!(f, "(lambda)"),
        }
    }
}
