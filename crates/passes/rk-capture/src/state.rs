//! Per-closure analysis state

use rk_intern::Symbol;
use rk_ir::ExprId;

/// Where a closure literal is in its analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClosureState {
    /// Not reached yet
    #[default]
    Unvisited,
    /// Its body is being walked
    Scanning,
    /// Runs before its call site returns, or performs no effect call
    ImmediateInvokeSafe,
    /// May outlive its call site and performs an effect call
    EscapingUnsafe,
}

/// A closure literal and what the walk learned about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSite {
    /// Function containing the closure
    pub function: Symbol,
    /// The closure literal
    pub lambda: ExprId,
    /// Whether the closure, or one enclosing it, may outlive its call site
    pub escapes: bool,
    /// Whether the closure is run in place
    pub immediately_invoked: bool,
    /// Whether an effect call occurs in the closure or in closures nested in
    /// it
    pub contains_effect_call: bool,
    /// Current state
    pub state: ClosureState,
}

impl CaptureSite {
    pub(crate) fn new(function: Symbol, lambda: ExprId, immediately_invoked: bool, inherited: bool) -> Self {
        Self {
            function,
            lambda,
            escapes: inherited || !immediately_invoked,
            immediately_invoked,
            contains_effect_call: false,
            state: ClosureState::Unvisited,
        }
    }

    /// Moves to [`ClosureState::Scanning`]
    pub(crate) fn enter(&mut self) {
        debug_assert_eq!(self.state, ClosureState::Unvisited);
        self.state = ClosureState::Scanning;
        tracing::trace!(lambda = ?self.lambda, escapes = self.escapes, "scanning closure");
    }

    /// Settles the final state once the body has been walked
    pub(crate) fn settle(&mut self) {
        debug_assert_eq!(self.state, ClosureState::Scanning);
        self.state = if self.escapes && self.contains_effect_call {
            ClosureState::EscapingUnsafe
        } else {
            ClosureState::ImmediateInvokeSafe
        };
        tracing::trace!(lambda = ?self.lambda, state = ?self.state, "closure settled");
    }
}
