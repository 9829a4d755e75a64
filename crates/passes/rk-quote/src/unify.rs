//! Type variables, subtyping constraints and least upper bounds
//!
//! Inference is unification with a subtyping twist: a constraint reads
//! "`actual` must conform to `expected`". Variables are bound to the first
//! type they meet. Class arguments follow the declared variance of the class,
//! so `List<Pair<String, Int>>` conforms to `List<Pair<String, *>>`.

use rk_intern::Symbol;
use rk_ir::{SymbolTable, Ty, TyVar, Variance, substitute_params};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Supertype chains deeper than this are treated as cyclic
const MAX_HIERARCHY_DEPTH: usize = 32;

/// Unification failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    /// `found` does not conform to `expected`
    #[error("type mismatch")]
    Mismatch {
        /// Expected type
        expected: Ty,
        /// Found type
        found: Ty,
    },

    /// Binding would create an infinite type
    #[error("occurs check failed")]
    OccursCheck {
        /// Variable being bound
        var: TyVar,
        /// Type containing the variable
        ty: Ty,
    },
}

/// Saved unifier state, see [`Unifier::snapshot`]
#[derive(Debug, Clone)]
pub struct Snapshot(Vec<Option<Ty>>);

/// Substitution of inference variables
#[derive(Debug, Default, Clone)]
pub struct Unifier {
    bindings: Vec<Option<Ty>>,
}

impl Unifier {
    /// Creates an empty substitution
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh unbound variable
    pub fn fresh(&mut self) -> Ty {
        let var = TyVar(self.bindings.len() as u32);
        self.bindings.push(None);
        Ty::Var(var)
    }

    /// Captures the current bindings
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.bindings.clone())
    }

    /// Restores bindings captured by [`Unifier::snapshot`]; variables created
    /// since stay allocated but unbound
    pub fn rollback(&mut self, snapshot: Snapshot) {
        let len = self.bindings.len();
        self.bindings = snapshot.0;
        self.bindings.resize(len, None);
    }

    /// Follows bindings at the top of `ty` only
    fn shallow(&self, ty: &Ty) -> Ty {
        let mut current = ty.clone();
        while let Ty::Var(var) = current {
            match self.bindings.get(var.0 as usize).and_then(Option::as_ref) {
                Some(bound) => current = bound.clone(),
                None => break,
            }
        }
        current
    }

    /// Applies the substitution to every component of `ty`
    #[must_use]
    pub fn resolve(&self, ty: &Ty) -> Ty {
        match self.shallow(ty) {
            Ty::Nullable(inner) => self.resolve(&inner).nullable(),
            Ty::Class { name, args } => Ty::Class {
                name,
                args: args.iter().map(|arg| self.resolve(arg)).collect(),
            },
            Ty::Function {
                receiver,
                params,
                ret,
            } => Ty::Function {
                receiver: receiver.map(|r| Box::new(self.resolve(&r))),
                params: params.iter().map(|p| self.resolve(p)).collect(),
                ret: Box::new(self.resolve(&ret)),
            },
            other => other,
        }
    }

    /// Resolves `ty` and defaults the variables nothing constrained to `Any`
    #[must_use]
    pub fn finish(&self, ty: &Ty) -> Ty {
        default_vars(&self.resolve(ty))
    }

    fn bind(&mut self, var: TyVar, ty: &Ty) -> Result<(), UnifyError> {
        let ty = self.resolve(ty);
        if ty == Ty::Var(var) {
            return Ok(());
        }
        if occurs(var, &ty) {
            return Err(UnifyError::OccursCheck { var, ty });
        }
        self.bindings[var.0 as usize] = Some(ty);
        Ok(())
    }

    /// Requires `actual` to conform to `expected`, binding variables on
    /// either side
    ///
    /// # Errors
    ///
    /// Returns [`UnifyError::Mismatch`] when the types are incompatible.
    pub fn constrain(
        &mut self,
        symbols: &SymbolTable,
        actual: &Ty,
        expected: &Ty,
    ) -> Result<(), UnifyError> {
        let actual = self.shallow(actual);
        let expected = self.shallow(expected);
        if actual == expected {
            return Ok(());
        }
        let mismatch = || UnifyError::Mismatch {
            expected: expected.clone(),
            found: actual.clone(),
        };
        match (&actual, &expected) {
            (Ty::Error, _) | (_, Ty::Error) | (_, Ty::Star) | (Ty::Star, _) => Ok(()),
            (Ty::Var(var), _) => self.bind(*var, &expected),
            (_, Ty::Var(var)) => self.bind(*var, &actual),
            (Ty::Nothing, _) => Ok(()),
            (Ty::Nullable(found), Ty::Nullable(wanted)) => self.constrain(symbols, found, wanted),
            (Ty::Nullable(_), _) => Err(mismatch()),
            (_, Ty::Nullable(wanted)) => self.constrain(symbols, &actual, wanted),
            (_, Ty::Any) => Ok(()),
            (
                Ty::Function {
                    receiver: found_receiver,
                    params: found_params,
                    ret: found_ret,
                },
                Ty::Function {
                    receiver: wanted_receiver,
                    params: wanted_params,
                    ret: wanted_ret,
                },
            ) => {
                if found_params.len() != wanted_params.len() {
                    return Err(mismatch());
                }
                match (found_receiver, wanted_receiver) {
                    (Some(found), Some(wanted)) => self.constrain(symbols, wanted, found)?,
                    (None, None) => {}
                    _ => return Err(mismatch()),
                }
                for (found, wanted) in found_params.iter().zip(wanted_params) {
                    self.constrain(symbols, wanted, found)?;
                }
                // any result is discarded where `Unit` is expected
                if self.shallow(wanted_ret) == Ty::Unit {
                    return Ok(());
                }
                self.constrain(symbols, found_ret, wanted_ret)
            }
            (Ty::Class { .. }, Ty::Class { name, args: wanted }) => {
                let Some(Ty::Class { args: found, .. }) = upcast(symbols, &actual, *name) else {
                    return Err(mismatch());
                };
                let variances = variances(symbols, *name, wanted.len());
                for ((found, wanted), variance) in found.iter().zip(wanted).zip(variances) {
                    match variance {
                        Variance::Out => self.constrain(symbols, found, wanted)?,
                        Variance::In => self.constrain(symbols, wanted, found)?,
                        Variance::Invariant => {
                            self.constrain(symbols, found, wanted)?;
                            self.constrain(symbols, wanted, found)?;
                        }
                    }
                }
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }

    /// Least upper bound of two types; unrelated types meet at `Any`
    pub fn join(&mut self, symbols: &SymbolTable, left: &Ty, right: &Ty) -> Ty {
        let left = self.resolve(left);
        let right = self.resolve(right);
        if left == right {
            return left;
        }
        match (&left, &right) {
            (Ty::Var(var), other) | (other, Ty::Var(var)) => {
                if self.bind(*var, other).is_ok() {
                    other.clone()
                } else {
                    Ty::Any
                }
            }
            (Ty::Error, other) | (other, Ty::Error) | (Ty::Nothing, other) | (other, Ty::Nothing) => {
                other.clone()
            }
            (Ty::Nullable(l), Ty::Nullable(r)) => self.join(symbols, l, r).nullable(),
            (Ty::Nullable(inner), other) | (other, Ty::Nullable(inner)) => {
                // `null` literals are `Nothing?`
                self.join(symbols, inner, other).nullable()
            }
            (Ty::Class { .. }, Ty::Class { .. }) => self.join_classes(symbols, &left, &right),
            _ => Ty::Any,
        }
    }

    fn join_classes(&mut self, symbols: &SymbolTable, left: &Ty, right: &Ty) -> Ty {
        for candidate in ancestors(symbols, left) {
            let Ty::Class { name, args: left_args } = &candidate else {
                continue;
            };
            let Some(Ty::Class { args: right_args, .. }) = upcast(symbols, right, *name) else {
                continue;
            };
            let variances = variances(symbols, *name, left_args.len());
            let args = left_args
                .iter()
                .zip(&right_args)
                .zip(variances)
                .map(|((l, r), variance)| match variance {
                    Variance::Out => self.join(symbols, l, r),
                    _ if self.resolve(l) == self.resolve(r) => self.resolve(l),
                    _ => Ty::Star,
                })
                .collect();
            return Ty::Class { name: *name, args };
        }
        Ty::Any
    }
}

fn occurs(var: TyVar, ty: &Ty) -> bool {
    match ty {
        Ty::Var(other) => *other == var,
        Ty::Nullable(inner) => occurs(var, inner),
        Ty::Class { args, .. } => args.iter().any(|arg| occurs(var, arg)),
        Ty::Function {
            receiver,
            params,
            ret,
        } => {
            receiver.as_deref().is_some_and(|r| occurs(var, r))
                || params.iter().any(|p| occurs(var, p))
                || occurs(var, ret)
        }
        _ => false,
    }
}

fn default_vars(ty: &Ty) -> Ty {
    match ty {
        Ty::Var(_) => Ty::Any,
        Ty::Nullable(inner) => default_vars(inner).nullable(),
        Ty::Class { name, args } => Ty::Class {
            name: *name,
            args: args.iter().map(default_vars).collect(),
        },
        Ty::Function {
            receiver,
            params,
            ret,
        } => Ty::Function {
            receiver: receiver.as_deref().map(|r| Box::new(default_vars(r))),
            params: params.iter().map(default_vars).collect(),
            ret: Box::new(default_vars(ret)),
        },
        other => other.clone(),
    }
}

fn variances(symbols: &SymbolTable, class: Symbol, arity: usize) -> Vec<Variance> {
    symbols.class(class).map_or_else(
        || vec![Variance::Invariant; arity],
        |class| class.variances.clone(),
    )
}

/// Supertypes of `class` with its arguments substituted in
fn direct_supertypes(symbols: &SymbolTable, ty: &Ty) -> Vec<Ty> {
    let Ty::Class { name, args } = ty else {
        return Vec::new();
    };
    let Some(class) = symbols.class(*name) else {
        return Vec::new();
    };
    let substitution: FxHashMap<Symbol, Ty> = class
        .type_params
        .iter()
        .copied()
        .zip(args.iter().cloned())
        .collect();
    class
        .supertypes
        .iter()
        .map(|supertype| {
            substitute_params(&symbols.lower_type(supertype, &class.type_params), &substitution)
        })
        .filter(|supertype| matches!(supertype, Ty::Class { .. }))
        .collect()
}

/// Views a class type as its supertype named `target`, if it has one
#[must_use]
pub fn upcast(symbols: &SymbolTable, ty: &Ty, target: Symbol) -> Option<Ty> {
    let mut pending = vec![(ty.clone(), 0)];
    while let Some((current, depth)) = pending.pop() {
        if matches!(&current, Ty::Class { name, .. } if *name == target) {
            return Some(current);
        }
        if depth < MAX_HIERARCHY_DEPTH {
            pending.extend(
                direct_supertypes(symbols, &current)
                    .into_iter()
                    .map(|supertype| (supertype, depth + 1)),
            );
        }
    }
    None
}

/// `ty` followed by its supertypes, nearest first
#[must_use]
pub fn ancestors(symbols: &SymbolTable, ty: &Ty) -> Vec<Ty> {
    let mut chain = vec![ty.clone()];
    let mut next = 0;
    while next < chain.len() && chain.len() < MAX_HIERARCHY_DEPTH {
        for supertype in direct_supertypes(symbols, &chain[next]) {
            if !chain.contains(&supertype) {
                chain.push(supertype);
            }
        }
        next += 1;
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::build_symbols;
    use pretty_assertions::assert_eq;
    use rk_intern::Interner;
    use rk_ir::SourceFile;
    use rk_span::FileId;

    fn setup() -> (Interner, SymbolTable) {
        let interner = Interner::new();
        let symbols =
            build_symbols(&interner, &SourceFile::new(FileId(0))).expect("prelude parses");
        (interner, symbols)
    }

    fn class(interner: &Interner, name: &str, args: Vec<Ty>) -> Ty {
        Ty::Class {
            name: interner.intern(name),
            args,
        }
    }

    #[test]
    fn variables_bind_to_the_first_type_met() {
        let (_, symbols) = setup();
        let mut unifier = Unifier::new();
        let var = unifier.fresh();
        unifier.constrain(&symbols, &Ty::Int, &var).expect("binds");
        assert_eq!(unifier.resolve(&var), Ty::Int);
        assert!(unifier.constrain(&symbols, &Ty::String, &var).is_err());
    }

    #[test]
    fn covariant_arguments_accept_star() {
        let (interner, symbols) = setup();
        let mut unifier = Unifier::new();
        let pair = |second| class(&interner, "Pair", vec![Ty::String, second]);
        let found = class(&interner, "List", vec![pair(Ty::Int)]);
        let wanted = class(&interner, "List", vec![pair(Ty::Star)]);
        unifier.constrain(&symbols, &found, &wanted).expect("conforms");
    }

    #[test]
    fn lists_upcast_to_iterable() {
        let (interner, symbols) = setup();
        let list = class(&interner, "List", vec![Ty::String]);
        assert_eq!(
            upcast(&symbols, &list, interner.intern("Iterable")),
            Some(class(&interner, "Iterable", vec![Ty::String]))
        );
    }

    #[test]
    fn join_widens_pair_arguments() {
        let (interner, symbols) = setup();
        let mut unifier = Unifier::new();
        let left = class(&interner, "Pair", vec![Ty::String, Ty::Int]);
        let right = class(&interner, "Pair", vec![Ty::String, Ty::String]);
        let joined = unifier.join(&symbols, &left, &right);
        assert_eq!(joined.display(&interner).to_string(), "Pair<String, Any>");
        assert_eq!(unifier.join(&symbols, &Ty::Int, &Ty::Nothing.nullable()), Ty::Int.nullable());
    }

    #[test]
    fn invariant_arguments_must_match() {
        let (interner, symbols) = setup();
        let mut unifier = Unifier::new();
        let found = class(&interner, "MutableList", vec![Ty::Int]);
        let wanted = class(&interner, "MutableList", vec![Ty::Any]);
        assert!(unifier.constrain(&symbols, &found, &wanted).is_err());
        let covariant = class(&interner, "List", vec![Ty::Any]);
        unifier.constrain(&symbols, &found, &covariant).expect("List is covariant");
    }

    #[test]
    fn rollback_forgets_bindings() {
        let (_, symbols) = setup();
        let mut unifier = Unifier::new();
        let var = unifier.fresh();
        let snapshot = unifier.snapshot();
        unifier.constrain(&symbols, &Ty::Int, &var).expect("binds");
        unifier.rollback(snapshot);
        assert_eq!(unifier.finish(&var), Ty::Any);
    }
}
