//! Verification of lekvar IR.
//!
//! This crate implements:
//! - Lexical name resolution over hard (module, function, class) and soft
//!   (branch, loop) scopes, with closure capture and ambiguity detection
//! - Nominal and structural type compatibility, and overload resolution
//! - Dependent/forward placeholders: argument types left open by a function
//!   and decided per call site by scoped *targeting*
//! - Per-node verification with flow analysis for return paths
//!
//! Verification mutates the IR in place: references are linked, variables
//! typed, calls resolved. A [`Verifier`] owns every piece of pass-wide
//! state (scope stack, type-switch buffer, binding environment) and restores
//! it on every exit path, so a failed verification leaves no frames or
//! bindings behind.

pub mod trace;

mod compat;
mod dependent;
mod resolve;
mod scope;
mod verify;

use std::path::Path;

use lek_ir::{
    CallResolution, Function, FunctionType, Ir, NodeId, NodeKind, Placeholder, Span, Stats,
};

pub use lek_diag::{Category, Diagnostic, DiagnosticError, SourceLocation};
pub use resolve::ResolutionOutcome;
pub use scope::{Flow, FrameKind};
pub use trace::{VerifyAction, VerifyStep};
pub use verify::captures;

use scope::{BindingEnv, ScopeStack, TypeSwitch};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Knobs for a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Longest proxy/placeholder chain a value lookup may follow before it
    /// is reported as a cycle.
    pub max_link_depth: usize,
    /// Record a [`VerifyStep`] trace from the start of the run.
    pub trace: bool,
    /// Maximum number of trace steps kept.
    pub trace_limit: usize,
    /// File suffix used when an import falls back to a source file.
    pub source_extension: String,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            max_link_depth: 256,
            trace: false,
            trace_limit: 10_000,
            source_extension: "lk".to_string(),
        }
    }
}

/// Finds and builds the module an import head names when no binding of that
/// name is visible.
pub trait SourceLoader {
    /// Build the module named `name` into `ir`, relative to the importing
    /// module's source file. `Ok(None)` means no such source exists.
    fn load(
        &mut self,
        ir: &mut Ir,
        importer: Option<&Path>,
        name: &str,
    ) -> Result<Option<NodeId>, Diagnostic>;
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// State of one verification run over an [`Ir`].
pub struct Verifier<'a> {
    ir: &'a mut Ir,
    builtins: Option<NodeId>,
    options: VerifyOptions,
    scopes: ScopeStack,
    switches: TypeSwitch,
    bindings: BindingEnv,
    loader: Option<&'a mut dyn SourceLoader>,
    /// Nesting depth of `speculate` brackets; evidence is never committed
    /// while positive.
    speculating: usize,
    /// Evidence checks in progress, to cut cycles between placeholders
    /// that recorded each other.
    evidence_stack: Vec<(NodeId, NodeId)>,
    tracing: bool,
    trace: Vec<VerifyStep>,
}

impl<'a> Verifier<'a> {
    pub fn new(ir: &'a mut Ir) -> Self {
        Self {
            ir,
            builtins: None,
            options: VerifyOptions::default(),
            scopes: ScopeStack::default(),
            switches: TypeSwitch::default(),
            bindings: BindingEnv::default(),
            loader: None,
            speculating: 0,
            evidence_stack: Vec::new(),
            tracing: false,
            trace: Vec::new(),
        }
    }

    /// Module searched after every lexical scope during name resolution.
    pub fn with_builtins(mut self, builtins: NodeId) -> Self {
        self.builtins = Some(builtins);
        self
    }

    pub fn with_options(mut self, options: VerifyOptions) -> Self {
        self.tracing = options.trace;
        self.options = options;
        self
    }

    pub fn with_loader(mut self, loader: &'a mut dyn SourceLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn ir(&self) -> &Ir {
        self.ir
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn builtins(&self) -> Option<NodeId> {
        self.builtins
    }

    /// Verify `root` and everything reachable from it.
    ///
    /// The builtins module, if any, is verified first. Repeated calls are
    /// cheap: verified nodes are skipped.
    pub fn verify(&mut self, root: NodeId) -> Result<(), Diagnostic> {
        if let Some(builtins) = self.builtins {
            self.verify_node(builtins)?;
        }
        self.verify_node(root)
    }

    /// Number of active scope frames. Zero between top-level calls.
    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    /// Number of active placeholder bindings. Zero between top-level calls.
    pub fn binding_depth(&self) -> usize {
        self.bindings.len()
    }

    /// Call-site resolution recorded when `call` was verified.
    pub fn resolve_call(&self, call: NodeId) -> Result<CallResolution, Diagnostic> {
        match self.ir.kind(call) {
            NodeKind::Call(data) => data.resolution.clone().ok_or_else(|| {
                self.internal(call, "call queried before it was verified".to_string())
            }),
            other => Err(self.internal(call, format!("{} is not a call", other.as_str()))),
        }
    }

    /// Flow and staticness facts computed for a scope.
    pub fn stats(&self, id: NodeId) -> Option<Stats> {
        self.ir.node(id).stats
    }

    // -----------------------------------------------------------------------
    // Tracing API (zero overhead when disabled)
    // -----------------------------------------------------------------------

    /// Enable step-by-step tracing for observability tools.
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// The verification trace (empty if tracing was not enabled).
    pub fn trace(&self) -> &[VerifyStep] {
        &self.trace
    }

    pub(crate) fn push_step(&mut self, action: VerifyAction, node: NodeId, detail: String) {
        if !self.tracing || self.trace.len() >= self.options.trace_limit {
            return;
        }
        let span = self.ir.span(node);
        self.trace.push(VerifyStep {
            step: self.trace.len() + 1,
            action,
            node: self.ir.label(node),
            detail,
            span: (!span.is_synthetic()).then_some((span.start, span.end)),
        });
    }

    // -----------------------------------------------------------------------
    // Node access
    // -----------------------------------------------------------------------

    pub(crate) fn function_data(&self, id: NodeId) -> Result<&Function, Diagnostic> {
        match self.ir.kind(id) {
            NodeKind::Function(function) => Ok(function),
            other => Err(self.internal(id, format!("expected a function, found {}", other.as_str()))),
        }
    }

    pub(crate) fn function_mut(&mut self, id: NodeId) -> Option<&mut Function> {
        match self.ir.kind_mut(id) {
            NodeKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub(crate) fn function_type_data(&self, id: NodeId) -> Option<&FunctionType> {
        match self.ir.kind(id) {
            NodeKind::FunctionType(ty) => Some(ty),
            _ => None,
        }
    }

    pub(crate) fn placeholder_data(&self, id: NodeId) -> Option<&Placeholder> {
        match self.ir.kind(id) {
            NodeKind::Placeholder(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    pub(crate) fn placeholder_mut(&mut self, id: NodeId) -> Option<&mut Placeholder> {
        match self.ir.kind_mut(id) {
            NodeKind::Placeholder(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    /// The function's `FunctionType`, set when its verification began.
    pub(crate) fn signature_of(&self, function: NodeId) -> Result<NodeId, Diagnostic> {
        self.function_data(function)?.signature.ok_or_else(|| {
            self.internal(
                function,
                format!("`{}` has no signature yet", self.ir.label(function)),
            )
        })
    }

    /// Builtin type named `name`, if the builtins module defines one.
    pub(crate) fn builtin_type(&self, name: &str) -> Option<NodeId> {
        let builtins = self.builtins?;
        let context = self.ir.scope_context(builtins)?;
        let id = self.ir.context(context).get(name)?;
        matches!(self.ir.kind(id), NodeKind::Builtin).then_some(id)
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub(crate) fn location(&self, id: NodeId) -> SourceLocation {
        span_to_location(self.ir.span(id))
    }

    pub(crate) fn error(&self, category: Category, id: NodeId, message: String) -> Diagnostic {
        Diagnostic::error(category, message).at(self.location(id))
    }

    pub(crate) fn internal(&self, id: NodeId, message: String) -> Diagnostic {
        self.error(Category::Internal, id, message)
            .with_help(Category::Internal.example_fix())
    }
}

/// Verify `root` against an optional builtins module with default options.
pub fn verify_module(
    ir: &mut Ir,
    root: NodeId,
    builtins: Option<NodeId>,
) -> Result<(), Diagnostic> {
    let mut verifier = Verifier::new(ir);
    if let Some(builtins) = builtins {
        verifier = verifier.with_builtins(builtins);
    }
    verifier.verify(root)
}

fn span_to_location(span: Span) -> SourceLocation {
    SourceLocation {
        file_id: span.file.0,
        start: span.start,
        end: span.end,
    }
}


#[cfg(test)]
mod verify_tests;
