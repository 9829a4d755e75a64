//! Call resolution
//!
//! Candidates are gathered in lookup order: members of the implicit
//! receivers (innermost first) and extensions applicable to them, members of
//! `context(...)` receivers, top-level functions and finally constructors.
//! The first candidate whose parameters accept the argument shape wins.

use super::Binder;
use crate::prelude::is_native;
use rk_intern::Symbol;
use rk_ir::{
    Arg, Body, ClassKind, Expr, ExprId, FunctionSignature, Modifiers, ParamSignature, Ty,
    TypeRef, substitute_params,
};
use rk_span::FileSpan;
use rustc_hash::FxHashMap;

/// How a call reached its callee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDispatch {
    /// Member of an implicit or explicit receiver's class
    Member,
    /// Extension function applied to a receiver
    Extension,
    /// Member of a `context(...)` receiver
    Context,
    /// Top-level function
    TopLevel,
    /// Primary constructor
    Constructor,
}

/// Declaration a named call resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    /// Callee signature; constructors get a synthesized one
    pub signature: FunctionSignature,
    /// Lookup path that found the callee
    pub dispatch: CallDispatch,
    /// For each argument, the index of the parameter it is passed to
    pub arg_params: Vec<Option<usize>>,
}

impl ResolvedCall {
    /// Parameter receiving argument `index`
    #[must_use]
    pub fn param_of(&self, index: usize) -> Option<&ParamSignature> {
        self.arg_params
            .get(index)
            .copied()
            .flatten()
            .and_then(|param| self.signature.params.get(param))
    }
}

pub(crate) struct CallSite<'b> {
    pub(crate) receiver: Option<ExprId>,
    pub(crate) safe: bool,
    pub(crate) name: Symbol,
    pub(crate) args: &'b [Arg],
    pub(crate) span: FileSpan,
}

struct Candidate {
    signature: FunctionSignature,
    dispatch: CallDispatch,
    /// Type parameters of the declaring class
    class_params: Vec<Symbol>,
    /// Class type parameters bound by the receiver's arguments
    substitution: FxHashMap<Symbol, Ty>,
    /// Receiver an extension is applied to
    receiver: Option<Ty>,
}

impl Candidate {
    fn new(signature: &FunctionSignature, dispatch: CallDispatch) -> Self {
        Self {
            signature: signature.clone(),
            dispatch,
            class_params: Vec::new(),
            substitution: FxHashMap::default(),
            receiver: None,
        }
    }
}

impl Binder<'_> {
    pub(crate) fn infer_call(&mut self, body: &Body, id: ExprId, call: &CallSite<'_>) -> Ty {
        let candidates = match call.receiver {
            None => {
                if let Some(value) = self.callable_value(call.name) {
                    return self.invoke(body, &value, call.args, call.span);
                }
                self.receiverless_candidates(call.name)
            }
            Some(receiver) => {
                if let Some(class) = self.static_class(body, receiver) {
                    self.types.insert(receiver, Ty::class(class));
                    self.static_candidates(class, call.name)
                } else {
                    let receiver = self.infer(body, receiver, None);
                    let receiver = self.unifier.resolve(&receiver);
                    let receiver = if call.safe {
                        receiver.non_null().clone()
                    } else {
                        receiver
                    };
                    if receiver == Ty::Error {
                        self.infer_loosely(body, call.args);
                        return Ty::Error;
                    }
                    if call.name == self.known.invoke && matches!(receiver, Ty::Function { .. }) {
                        return self.invoke(body, &receiver, call.args, call.span);
                    }
                    let mut candidates =
                        self.member_candidates(&receiver, call.name, CallDispatch::Member);
                    candidates.extend(self.extension_candidates(&receiver, call.name));
                    candidates
                }
            }
        };

        if candidates.is_empty() {
            self.unresolved(call.name, call.span);
            self.infer_loosely(body, call.args);
            return Ty::Error;
        }
        let chosen = candidates.into_iter().find_map(|candidate| {
            map_args(&candidate.signature.params, call.args).map(|mapping| (candidate, mapping))
        });
        let Some((candidate, mapping)) = chosen else {
            let name = self.interner.resolve(&call.name).to_string();
            self.invalid(
                format!("no overload of `{name}` accepts these arguments"),
                call.span,
            );
            self.infer_loosely(body, call.args);
            return Ty::Error;
        };
        tracing::trace!(
            name = self.interner.resolve(&call.name),
            dispatch = ?candidate.dispatch,
            "resolved call"
        );
        let ret = self.apply(body, &candidate, call.args, &mapping, call.span);
        let ret = if call.safe && call.receiver.is_some() {
            ret.nullable()
        } else {
            ret
        };
        self.calls.insert(
            id,
            ResolvedCall {
                signature: candidate.signature,
                dispatch: candidate.dispatch,
                arg_params: mapping.into_iter().map(Some).collect(),
            },
        );
        ret
    }

    /// A local or property of function type called by name, as in `block()`
    fn callable_value(&mut self, name: Symbol) -> Option<Ty> {
        let value = match self.lookup_local(name) {
            Some(local) => local,
            None => self
                .implicit_receivers()
                .iter()
                .find_map(|receiver| self.property_of(receiver, name))?,
        };
        let resolved = self.unifier.resolve(&value);
        matches!(resolved.non_null(), Ty::Function { .. }).then_some(resolved)
    }

    /// Instantiates the candidate, types the arguments against its
    /// parameters and returns the call's result type
    fn apply(
        &mut self,
        body: &Body,
        candidate: &Candidate,
        args: &[Arg],
        mapping: &[usize],
        span: FileSpan,
    ) -> Ty {
        let signature = &candidate.signature;
        let mut substitution = candidate.substitution.clone();
        for param in &signature.type_params {
            substitution.insert(*param, self.unifier.fresh());
        }
        let generics: Vec<Symbol> = signature
            .type_params
            .iter()
            .chain(&candidate.class_params)
            .copied()
            .collect();
        let lower = |binder: &Self, ty: &TypeRef| {
            substitute_params(&binder.symbols.lower_type(ty, &generics), &substitution)
        };

        if let (Some(actual), Some(written)) = (&candidate.receiver, &signature.receiver) {
            let receiver = lower(self, written);
            self.expect_ty(actual, &receiver, span);
        }
        let params: Vec<Ty> = signature.params.iter().map(|p| lower(self, &p.ty)).collect();
        let ret = match &signature.return_type {
            Some(written) => lower(self, written),
            None if signature.expression_body => self.unifier.fresh(),
            None => Ty::Unit,
        };

        // lambdas last, so their parameter types benefit from the others
        let mut vararg_values = Vec::new();
        for (arg, &slot) in args.iter().zip(mapping) {
            if is_lambda(body, arg.value) {
                continue;
            }
            if signature.params[slot].vararg {
                let value = self.infer(body, arg.value, None);
                vararg_values.push((value, body.expr(arg.value).span()));
            } else {
                self.check(body, arg.value, &params[slot]);
            }
        }
        if let Some(slot) = signature.params.iter().position(|p| p.vararg) {
            self.check_vararg(&vararg_values, &params[slot]);
        }
        for (arg, &slot) in args.iter().zip(mapping) {
            if is_lambda(body, arg.value) {
                self.check(body, arg.value, &params[slot]);
            }
        }
        ret
    }

    /// Vararg arguments are widened to their common supertype first, so
    /// `listOf("a" to 1, "b" to "c")` is a list of `Pair<String, Any>`
    fn check_vararg(&mut self, values: &[(Ty, FileSpan)], element: &Ty) {
        let Some(((first, span), rest)) = values.split_first() else {
            return;
        };
        let mut joined = first.clone();
        for (value, _) in rest {
            joined = self.unifier.join(&self.symbols, &joined, value);
        }
        self.expect_ty(&joined, element, *span);
    }

    // === Candidates ===

    fn receiverless_candidates(&mut self, name: Symbol) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for receiver in self.receivers.clone().iter().rev() {
            candidates.extend(self.member_candidates(receiver, name, CallDispatch::Member));
            if let Ty::Class { name: class, .. } = receiver {
                candidates.extend(self.companion_candidates(*class, name));
            }
            candidates.extend(self.extension_candidates(receiver, name));
        }
        for receiver in self.context.clone() {
            candidates.extend(self.member_candidates(&receiver, name, CallDispatch::Context));
        }
        candidates.extend(
            self.top_level(name)
                .filter(|signature| signature.receiver.is_none())
                .map(|signature| Candidate::new(signature, CallDispatch::TopLevel)),
        );
        candidates.extend(self.constructor(name));
        candidates
    }

    /// Members declared by the class of `receiver` or its supertypes
    fn member_candidates(
        &self,
        receiver: &Ty,
        name: Symbol,
        dispatch: CallDispatch,
    ) -> Vec<Candidate> {
        let receiver = self.unifier.resolve(receiver);
        let mut candidates = Vec::new();
        for ancestor in crate::ancestors(&self.symbols, receiver.non_null()) {
            let Ty::Class { name: class, args } = &ancestor else {
                continue;
            };
            let Some(symbol) = self.symbols.class(*class) else {
                continue;
            };
            let substitution: FxHashMap<Symbol, Ty> = symbol
                .type_params
                .iter()
                .copied()
                .zip(args.iter().cloned())
                .collect();
            let pending = self
                .scope
                .pending
                .iter()
                .filter(|signature| signature.owner == Some(*class));
            for signature in symbol.functions.iter().chain(pending) {
                if signature.name != name {
                    continue;
                }
                candidates.push(Candidate {
                    class_params: symbol.type_params.clone(),
                    substitution: substitution.clone(),
                    ..Candidate::new(signature, dispatch)
                });
            }
        }
        candidates
    }

    fn companion_candidates(&self, class: Symbol, name: Symbol) -> Vec<Candidate> {
        self.symbols
            .class(class)
            .and_then(|symbol| symbol.companion.as_deref())
            .map(|companion| {
                companion
                    .functions_named(name)
                    .map(|signature| Candidate::new(signature, CallDispatch::Member))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `Name.f()` where `Name` is an object or a class with a companion
    fn static_candidates(&self, class: Symbol, name: Symbol) -> Vec<Candidate> {
        let Some(symbol) = self.symbols.class(class) else {
            return Vec::new();
        };
        if symbol.kind == ClassKind::Object {
            return symbol
                .functions_named(name)
                .map(|signature| Candidate::new(signature, CallDispatch::Member))
                .collect();
        }
        self.companion_candidates(class, name)
    }

    /// Extension functions whose receiver type accepts `receiver`
    fn extension_candidates(&mut self, receiver: &Ty, name: Symbol) -> Vec<Candidate> {
        let extensions: Vec<FunctionSignature> = self
            .top_level(name)
            .filter(|signature| signature.receiver.is_some())
            .cloned()
            .collect();
        extensions
            .iter()
            .filter(|signature| self.accepts_receiver(signature, receiver))
            .map(|signature| Candidate {
                receiver: Some(receiver.clone()),
                ..Candidate::new(signature, CallDispatch::Extension)
            })
            .collect()
    }

    fn accepts_receiver(&mut self, signature: &FunctionSignature, receiver: &Ty) -> bool {
        let Some(written) = &signature.receiver else {
            return false;
        };
        let snapshot = self.unifier.snapshot();
        let substitution: FxHashMap<Symbol, Ty> = signature
            .type_params
            .iter()
            .map(|param| (*param, self.unifier.fresh()))
            .collect();
        let expected = substitute_params(
            &self.symbols.lower_type(written, &signature.type_params),
            &substitution,
        );
        let accepted = !expected.contains_error()
            && self
                .unifier
                .constrain(&self.symbols, receiver, &expected)
                .is_ok();
        self.unifier.rollback(snapshot);
        accepted
    }

    /// Top-level functions of the session and of the current batch; user
    /// declarations come before the prelude functions they shadow
    fn top_level(&self, name: Symbol) -> impl Iterator<Item = &FunctionSignature> {
        let declared = self.symbols.functions(name);
        declared
            .iter()
            .filter(|signature| !is_native(signature))
            .chain(
                self.scope
                    .pending
                    .iter()
                    .filter(move |signature| signature.owner.is_none() && signature.name == name),
            )
            .chain(declared.iter().filter(|signature| is_native(signature)))
    }

    /// Primary constructor of class `name`, as a signature
    fn constructor(&self, name: Symbol) -> Option<Candidate> {
        let class = self.symbols.class(name)?;
        if class.kind != ClassKind::Class
            || class
                .modifiers
                .intersects(Modifiers::ABSTRACT | Modifiers::ENUM | Modifiers::SEALED)
        {
            return None;
        }
        let return_type = TypeRef::Named {
            name,
            args: class
                .type_params
                .iter()
                .map(|param| TypeRef::named(*param, class.span))
                .collect(),
            nullable: false,
            span: class.span,
        };
        let signature = FunctionSignature {
            name,
            owner: Some(name),
            modifiers: Modifiers::empty(),
            annotations: Vec::new(),
            type_params: class.type_params.clone(),
            context_receivers: Vec::new(),
            receiver: None,
            params: class.ctor_params.clone(),
            return_type: Some(return_type),
            expression_body: false,
            span: class.span,
        };
        Some(Candidate::new(&signature, CallDispatch::Constructor))
    }
}

fn is_lambda(body: &Body, id: ExprId) -> bool {
    matches!(body.expr(id), Expr::Lambda { .. })
}

/// Maps arguments to parameter indices: named arguments by name, a trailing
/// lambda to the last parameter, positional ones in order with a `vararg`
/// parameter absorbing the rest. `None` when the shape does not fit.
fn map_args(params: &[ParamSignature], args: &[Arg]) -> Option<Vec<usize>> {
    let vararg = params.iter().position(|p| p.vararg);
    let mut filled = vec![false; params.len()];
    let mut mapping = Vec::with_capacity(args.len());
    let mut positional = 0;
    for arg in args {
        let slot = if let Some(name) = arg.name {
            params.iter().position(|p| p.name == name)?
        } else if arg.trailing {
            params.len().checked_sub(1)?
        } else {
            match vararg {
                Some(vararg) if positional >= vararg => vararg,
                _ => {
                    positional += 1;
                    positional - 1
                }
            }
        };
        if slot >= params.len() || (filled[slot] && Some(slot) != vararg) {
            return None;
        }
        filled[slot] = true;
        mapping.push(slot);
    }
    let complete = params
        .iter()
        .zip(&filled)
        .all(|(param, filled)| *filled || param.has_default || param.vararg);
    complete.then_some(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_intern::Interner;
    use rk_ir::BodyKind;
    use rk_span::Span;

    fn span() -> FileSpan {
        FileSpan::synthetic(Span::point(0))
    }

    fn params(interner: &Interner, spec: &[(&str, bool, bool)]) -> Vec<ParamSignature> {
        spec.iter()
            .map(|(name, vararg, has_default)| ParamSignature {
                name: interner.intern(name),
                ty: TypeRef::named(interner.intern("Int"), span()),
                annotations: Vec::new(),
                vararg: *vararg,
                has_default: *has_default,
            })
            .collect()
    }

    fn arg(name: Option<Symbol>, trailing: bool) -> Arg {
        let mut body = Body::new(BodyKind::Expression);
        let value = body.alloc_expr(Expr::This { span: span() });
        Arg {
            name,
            value,
            trailing,
        }
    }

    #[test]
    fn named_and_trailing_arguments_map_to_parameters() {
        let interner = Interner::new();
        let params = params(
            &interner,
            &[("a", false, false), ("b", false, true), ("block", false, false)],
        );
        let args = [
            arg(Some(interner.intern("b")), false),
            arg(None, false),
            arg(None, true),
        ];
        assert_eq!(map_args(&params, &args), Some(vec![1, 0, 2]));
    }

    #[test]
    fn missing_required_parameter_rejects_candidate() {
        let interner = Interner::new();
        let params = params(&interner, &[("a", false, false), ("b", false, false)]);
        assert_eq!(map_args(&params, &[arg(None, false)]), None);
        let extra = [arg(None, false), arg(None, false), arg(None, false)];
        assert_eq!(map_args(&params, &extra), None);
    }

    #[test]
    fn vararg_absorbs_remaining_positionals() {
        let interner = Interner::new();
        let params = params(&interner, &[("elements", true, false)]);
        let args = [arg(None, false), arg(None, false), arg(None, false)];
        assert_eq!(map_args(&params, &args), Some(vec![0, 0, 0]));
        assert_eq!(map_args(&params, &[]), Some(Vec::new()));
    }
}
