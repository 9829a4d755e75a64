//! Syntactic type references and semantic types

use crate::decl::relocate_span;
use rk_intern::{Interner, Symbol};
use rk_span::FileSpan;
use std::fmt;

/// A type as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// `Name<Args>?`
    Named {
        /// Type name
        name: Symbol,
        /// Generic arguments
        args: Vec<TypeRef>,
        /// Trailing `?`
        nullable: bool,
        /// Source location
        span: FileSpan,
    },
    /// `*` projection
    Star {
        /// Source location
        span: FileSpan,
    },
    /// `(A, B) -> R` or `Recv.(A) -> R`
    Function {
        /// Receiver type of a function type with receiver
        receiver: Option<Box<TypeRef>>,
        /// Parameter types
        params: Vec<TypeRef>,
        /// Return type
        ret: Box<TypeRef>,
        /// Parenthesized and followed by `?`
        nullable: bool,
        /// Source location
        span: FileSpan,
    },
}

impl TypeRef {
    /// Plain named type without arguments
    #[must_use]
    pub fn named(name: Symbol, span: FileSpan) -> Self {
        Self::Named {
            name,
            args: Vec::new(),
            nullable: false,
            span,
        }
    }

    /// Source location
    #[must_use]
    pub fn span(&self) -> FileSpan {
        match self {
            Self::Named { span, .. } | Self::Star { span } | Self::Function { span, .. } => *span,
        }
    }

    /// Head name of a named type
    #[must_use]
    pub fn head(&self) -> Option<Symbol> {
        match self {
            Self::Named { name, .. } => Some(*name),
            Self::Star { .. } | Self::Function { .. } => None,
        }
    }

    /// Structural equality that ignores source locations
    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Named {
                    name: a,
                    args: a_args,
                    nullable: a_null,
                    ..
                },
                Self::Named {
                    name: b,
                    args: b_args,
                    nullable: b_null,
                    ..
                },
            ) => a == b && a_null == b_null && same_types(a_args, b_args),
            (Self::Star { .. }, Self::Star { .. }) => true,
            (
                Self::Function {
                    receiver: a_recv,
                    params: a_params,
                    ret: a_ret,
                    nullable: a_null,
                    ..
                },
                Self::Function {
                    receiver: b_recv,
                    params: b_params,
                    ret: b_ret,
                    nullable: b_null,
                    ..
                },
            ) => {
                let receivers = match (a_recv, b_recv) {
                    (Some(a), Some(b)) => a.same_type(b),
                    (None, None) => true,
                    _ => false,
                };
                receivers && a_null == b_null && same_types(a_params, b_params) && a_ret.same_type(b_ret)
            }
            _ => false,
        }
    }

    /// Renders the type as source text
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a Interner) -> TypeRefDisplay<'a> {
        TypeRefDisplay { ty: self, interner }
    }

    pub(crate) fn relocate(&mut self, anchor: FileSpan) {
        match self {
            Self::Named { args, span, .. } => {
                relocate_span(span, anchor);
                for arg in args {
                    arg.relocate(anchor);
                }
            }
            Self::Star { span } => relocate_span(span, anchor),
            Self::Function {
                receiver,
                params,
                ret,
                span,
                ..
            } => {
                relocate_span(span, anchor);
                if let Some(receiver) = receiver {
                    receiver.relocate(anchor);
                }
                for param in params {
                    param.relocate(anchor);
                }
                ret.relocate(anchor);
            }
        }
    }
}

fn same_types(a: &[TypeRef], b: &[TypeRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same_type(b))
}

/// [`fmt::Display`] adapter returned by [`TypeRef::display`]
pub struct TypeRefDisplay<'a> {
    ty: &'a TypeRef,
    interner: &'a Interner,
}

impl fmt::Display for TypeRefDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = self.interner;
        let list = |f: &mut fmt::Formatter<'_>, items: &[TypeRef]| -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", item.display(interner))?;
            }
            Ok(())
        };
        match self.ty {
            TypeRef::Named {
                name,
                args,
                nullable,
                ..
            } => {
                f.write_str(interner.resolve(name))?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    list(f, args)?;
                    f.write_str(">")?;
                }
                if *nullable {
                    f.write_str("?")?;
                }
                Ok(())
            }
            TypeRef::Star { .. } => f.write_str("*"),
            TypeRef::Function {
                receiver,
                params,
                ret,
                nullable,
                ..
            } => {
                if *nullable {
                    f.write_str("(")?;
                }
                if let Some(receiver) = receiver {
                    write!(f, "{}.", receiver.display(interner))?;
                }
                f.write_str("(")?;
                list(f, params)?;
                write!(f, ") -> {}", ret.display(interner))?;
                if *nullable {
                    f.write_str(")?")?;
                }
                Ok(())
            }
        }
    }
}

/// Inference variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// A semantic type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// `Int`
    Int,
    /// `Long`
    Long,
    /// `Double`
    Double,
    /// `Boolean`
    Boolean,
    /// `Char`
    Char,
    /// `String`
    String,
    /// `Unit`
    Unit,
    /// `Nothing`; subtype of every type
    Nothing,
    /// `Any`; supertype of every non-null type
    Any,
    /// `T?`
    Nullable(Box<Ty>),
    /// Class type with arguments, including `List` and `Pair`
    Class {
        /// Class name
        name: Symbol,
        /// Type arguments
        args: Vec<Ty>,
    },
    /// Function type
    Function {
        /// Receiver of a function type with receiver
        receiver: Option<Box<Ty>>,
        /// Parameter types
        params: Vec<Ty>,
        /// Return type
        ret: Box<Ty>,
    },
    /// Reference to a declared generic parameter
    Param(Symbol),
    /// `*` projection
    Star,
    /// Unresolved inference variable
    Var(TyVar),
    /// Placeholder for a type that failed to resolve
    Error,
}

impl Ty {
    /// Class type without arguments
    #[must_use]
    pub fn class(name: Symbol) -> Self {
        Self::Class {
            name,
            args: Vec::new(),
        }
    }

    /// Makes the type nullable; idempotent
    #[must_use]
    pub fn nullable(self) -> Self {
        match self {
            Self::Nullable(_) | Self::Error | Self::Star => self,
            other => Self::Nullable(Box::new(other)),
        }
    }

    /// Strips one level of nullability
    #[must_use]
    pub fn non_null(&self) -> &Self {
        match self {
            Self::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Whether the type or any of its components is [`Ty::Error`]
    #[must_use]
    pub fn contains_error(&self) -> bool {
        self.any(&|ty| matches!(ty, Self::Error))
    }

    /// Whether the type still mentions an inference variable
    #[must_use]
    pub fn has_vars(&self) -> bool {
        self.any(&|ty| matches!(ty, Self::Var(_)))
    }

    fn any(&self, pred: &impl Fn(&Self) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Self::Nullable(inner) => inner.any(pred),
            Self::Class { args, .. } => args.iter().any(|arg| arg.any(pred)),
            Self::Function {
                receiver,
                params,
                ret,
            } => {
                receiver.as_deref().is_some_and(|r| r.any(pred))
                    || params.iter().any(|p| p.any(pred))
                    || ret.any(pred)
            }
            _ => false,
        }
    }

    /// Renders the type with resolved names
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a Interner) -> TyDisplay<'a> {
        TyDisplay { ty: self, interner }
    }
}

/// [`fmt::Display`] adapter returned by [`Ty::display`]
pub struct TyDisplay<'a> {
    ty: &'a Ty,
    interner: &'a Interner,
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = self.interner;
        let list = |f: &mut fmt::Formatter<'_>, items: &[Ty]| -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", item.display(interner))?;
            }
            Ok(())
        };
        match self.ty {
            Ty::Int => f.write_str("Int"),
            Ty::Long => f.write_str("Long"),
            Ty::Double => f.write_str("Double"),
            Ty::Boolean => f.write_str("Boolean"),
            Ty::Char => f.write_str("Char"),
            Ty::String => f.write_str("String"),
            Ty::Unit => f.write_str("Unit"),
            Ty::Nothing => f.write_str("Nothing"),
            Ty::Any => f.write_str("Any"),
            Ty::Nullable(inner) => write!(f, "{}?", inner.display(interner)),
            Ty::Class { name, args } => {
                f.write_str(interner.resolve(name))?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    list(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            Ty::Function {
                receiver,
                params,
                ret,
            } => {
                if let Some(receiver) = receiver {
                    write!(f, "{}.", receiver.display(interner))?;
                }
                f.write_str("(")?;
                list(f, params)?;
                write!(f, ") -> {}", ret.display(interner))
            }
            Ty::Param(name) => f.write_str(interner.resolve(name)),
            Ty::Star => f.write_str("*"),
            Ty::Var(var) => write!(f, "?{}", var.0),
            Ty::Error => f.write_str("<error>"),
        }
    }
}
