//! Closure walk over one function body

use crate::{CaptureConfig, CaptureSite, EagerCallAllowList};
use rk_ir::{
    Body, Diagnostic, DiagnosticKind, Expr, ExprId, FunctionDecl, KnownNames, Session,
    visitor::{self, Visitor},
};
use rk_quote::{InferenceResult, ResolvedCall};
use rk_span::FileSpan;
use rustc_hash::FxHashSet;

/// Walks a body with a stack of the closures currently entered
pub(crate) struct ClosureWalker<'a> {
    session: &'a dyn Session,
    config: &'a CaptureConfig,
    allow_list: &'a EagerCallAllowList,
    function: &'a FunctionDecl,
    inference: &'a InferenceResult,
    known: KnownNames,
    /// Closures that run before their call site returns
    immediate: FxHashSet<ExprId>,
    /// Indices into `sites` of the closures enclosing the current expression
    stack: Vec<usize>,
    pub(crate) sites: Vec<CaptureSite>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> ClosureWalker<'a> {
    pub(crate) fn new(
        session: &'a dyn Session,
        config: &'a CaptureConfig,
        allow_list: &'a EagerCallAllowList,
        function: &'a FunctionDecl,
        inference: &'a InferenceResult,
    ) -> Self {
        Self {
            session,
            config,
            allow_list,
            function,
            inference,
            known: *session.symbols().known(),
            immediate: FxHashSet::default(),
            stack: Vec::new(),
            sites: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn run(&mut self, body: &Body) {
        self.immediate = self.immediate_closures(body);
        self.visit_expr(body, body.root);
    }

    /// Finds every closure literal that is invoked in place or handed to a
    /// call that runs it eagerly
    fn immediate_closures(&self, body: &Body) -> FxHashSet<ExprId> {
        let mut immediate = FxHashSet::default();
        for (id, expr) in body.exprs.iter() {
            match expr {
                Expr::Call {
                    receiver,
                    name,
                    args,
                    ..
                } => {
                    if *name == self.known.invoke {
                        if let Some(receiver) = receiver {
                            if is_lambda(body, *receiver) {
                                immediate.insert(*receiver);
                            }
                        }
                    }
                    let resolved = self.inference.calls.get(&id);
                    let callee = self.session.interner().resolve(name);
                    for (index, arg) in args.iter().enumerate() {
                        if is_lambda(body, arg.value) && self.runs_in_place(callee, resolved, index) {
                            immediate.insert(arg.value);
                        }
                    }
                }
                Expr::Invoke { callee, .. } if is_lambda(body, *callee) => {
                    immediate.insert(*callee);
                }
                _ => {}
            }
        }
        immediate
    }

    /// Whether the callee runs the lambda passed as argument `index` before
    /// returning
    fn runs_in_place(&self, callee: &str, resolved: Option<&ResolvedCall>, index: usize) -> bool {
        let user_declared = resolved.is_some_and(|resolved| !rk_quote::is_native(&resolved.signature));
        if self.allow_list.covers(callee, user_declared) {
            return true;
        }
        let Some(resolved) = resolved else {
            return false;
        };
        resolved.signature.is_inline()
            || resolved.param_of(index).is_some_and(|param| {
                param
                    .annotations
                    .iter()
                    .any(|annotation| annotation.name == self.known.calls_in_place)
            })
    }

    fn enter_closure(&mut self, lambda: ExprId) {
        let inherited = self
            .stack
            .last()
            .is_some_and(|&index| self.sites[index].escapes);
        let mut site = CaptureSite::new(
            self.function.name,
            lambda,
            self.immediate.contains(&lambda),
            inherited,
        );
        site.enter();
        self.stack.push(self.sites.len());
        self.sites.push(site);
    }

    fn exit_closure(&mut self) {
        if let Some(index) = self.stack.pop() {
            self.sites[index].settle();
        }
    }

    fn check_call(&mut self, id: ExprId, span: FileSpan) {
        let Some(resolved) = self.inference.calls.get(&id) else {
            return;
        };
        let Some(annotation) = resolved.signature.annotation(self.known.disallow_lambda_capture)
        else {
            return;
        };
        for &index in &self.stack {
            self.sites[index].contains_effect_call = true;
        }
        let escaping = self
            .stack
            .last()
            .is_some_and(|&index| self.sites[index].escapes);
        if !escaping {
            return;
        }

        let interner = self.session.interner();
        let message = match annotation.arg(self.known.msg) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!(
                "detected call to member @DisallowLambdaCapture `{}` in non-inline anonymous function",
                interner.resolve(&resolved.signature.name)
            ),
        };
        tracing::debug!(%span, "effect call in escaping closure");
        self.diagnostics.push(Diagnostic {
            severity: self.config.severity,
            kind: DiagnosticKind::UnsafeCaptureDetected,
            message,
            span,
        });
    }
}

impl Visitor for ClosureWalker<'_> {
    fn visit_expr(&mut self, body: &Body, id: ExprId) {
        match body.expr(id) {
            Expr::Lambda { .. } => {
                self.enter_closure(id);
                visitor::walk_expr(self, body, id);
                self.exit_closure();
            }
            Expr::Call { span, .. } => {
                self.check_call(id, *span);
                visitor::walk_expr(self, body, id);
            }
            _ => visitor::walk_expr(self, body, id),
        }
    }
}

fn is_lambda(body: &Body, id: ExprId) -> bool {
    matches!(body.expr(id), Expr::Lambda { .. })
}
