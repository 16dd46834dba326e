//! Verification-pass state that must follow lexical nesting exactly.
//!
//! Three stacks live here: the active scope frames, the type-switch buffer
//! used while speculatively trying overloads, and the binding environment
//! holding placeholder targets. Every push is paired with a pop by the
//! bracket helpers on `Verifier`, which restore state on error paths too.

use lek_ir::{NodeId, NodeKind};

use crate::trace::VerifyAction;
use crate::{Diagnostic, Verifier};

// ---------------------------------------------------------------------------
// Scope frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Module, function, or class: bounds lexical walks and returns.
    Hard,
    /// Branch or loop body.
    Soft,
}

/// Flow-analysis facts collected while a frame is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flow {
    pub definitely_returns: bool,
    pub might_return: bool,
}

impl Flow {
    /// Fold a nested statement's flow into this frame.
    pub fn absorb(&mut self, nested: Flow) {
        self.definitely_returns |= nested.definitely_returns;
        self.might_return |= nested.might_return;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub scope: NodeId,
    pub kind: FrameKind,
    pub flow: Flow,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn push(&mut self, scope: NodeId, kind: FrameKind) {
        self.frames.push(Frame {
            scope,
            kind,
            flow: Flow::default(),
        });
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Nearest frame marked hard.
    pub fn current_hard_scope(&self) -> Option<NodeId> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.kind == FrameKind::Hard)
            .map(|frame| frame.scope)
    }

    /// Nearest frame (soft or hard) on top of the stack.
    pub fn current_soft_scope(&self) -> Option<NodeId> {
        self.frames.last().map(|frame| frame.scope)
    }

    /// Scan from the top for a soft frame matching `predicate`, stopping at
    /// the first hard boundary.
    pub fn nearest_soft_scope_matching(
        &self,
        mut predicate: impl FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        for frame in self.frames.iter().rev() {
            if frame.kind == FrameKind::Hard {
                return None;
            }
            if predicate(frame.scope) {
                return Some(frame.scope);
            }
        }
        None
    }

    /// Soft frames above the nearest hard frame, innermost first.
    pub fn soft_frames(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.frames
            .iter()
            .rev()
            .take_while(|frame| frame.kind == FrameKind::Soft)
            .map(|frame| frame.scope)
    }

    pub fn contains(&self, scope: NodeId) -> bool {
        self.frames.iter().any(|frame| frame.scope == scope)
    }
}

// ---------------------------------------------------------------------------
// Type switch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct SwitchFrame {
    /// Records made by the attempt in progress.
    attempt: Vec<(NodeId, NodeId)>,
    /// Records from accepted attempts, committed on exit.
    kept: Vec<(NodeId, NodeId)>,
}

/// Buffer of placeholder candidates collected while alternatives are tried.
///
/// Reentrant: nested switches keep their own buffers.
#[derive(Debug, Clone, Default)]
pub struct TypeSwitch {
    frames: Vec<SwitchFrame>,
}

impl TypeSwitch {
    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn enter(&mut self) {
        self.frames.push(SwitchFrame::default());
    }

    /// Buffer a candidate; returns false if no switch is active.
    pub fn record(&mut self, placeholder: NodeId, candidate: NodeId) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.attempt.push((placeholder, candidate));
                true
            }
            None => false,
        }
    }

    fn attempt_mark(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.attempt.len())
    }

    fn finish_attempt(&mut self, mark: usize, accepted: bool) {
        if let Some(frame) = self.frames.last_mut() {
            let records = frame.attempt.split_off(mark);
            if accepted {
                frame.kept.extend(records);
            }
        }
    }

    /// Pop the innermost switch, grouping kept candidates per placeholder.
    fn exit(&mut self) -> Vec<(NodeId, Vec<NodeId>)> {
        let Some(mut frame) = self.frames.pop() else {
            return Vec::new();
        };
        frame.kept.append(&mut frame.attempt);
        let mut grouped: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
        for (placeholder, candidate) in frame.kept {
            match grouped.iter_mut().find(|(existing, _)| *existing == placeholder) {
                Some((_, candidates)) => {
                    if !candidates.contains(&candidate) {
                        candidates.push(candidate);
                    }
                }
                None => grouped.push((placeholder, vec![candidate])),
            }
        }
        grouped
    }
}

// ---------------------------------------------------------------------------
// Binding environment
// ---------------------------------------------------------------------------

/// Placeholder targets active at this point of the pass. Later bindings
/// shadow earlier ones; brackets truncate back to a mark on exit.
#[derive(Debug, Clone, Default)]
pub struct BindingEnv {
    bindings: Vec<(NodeId, NodeId)>,
}

impl BindingEnv {
    pub fn get(&self, placeholder: NodeId) -> Option<NodeId> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == placeholder)
            .map(|(_, value)| *value)
    }

    pub fn push(&mut self, placeholder: NodeId, value: NodeId) {
        self.bindings.push((placeholder, value));
    }

    pub fn mark(&self) -> usize {
        self.bindings.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.bindings.truncate(mark);
    }

    /// Remove and return every binding pushed since `mark`.
    pub fn drain_from(&mut self, mark: usize) -> Vec<(NodeId, NodeId)> {
        self.bindings.split_off(mark.min(self.bindings.len()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Brackets
// ---------------------------------------------------------------------------

impl Verifier<'_> {
    /// Run `body` with `scope` pushed, popping it on every exit path.
    ///
    /// Returns the body's result together with the flow facts gathered in
    /// the frame.
    pub(crate) fn with_scope<T>(
        &mut self,
        scope: NodeId,
        kind: FrameKind,
        body: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<(T, Flow), Diagnostic> {
        self.scopes.push(scope, kind);
        self.push_step(VerifyAction::EnterScope, scope, format!("{kind:?}"));
        let depth = self.scopes.depth();
        let result = body(self);
        debug_assert_eq!(self.scopes.depth(), depth, "unbalanced scope frames");
        let frame = self.scopes.pop();
        self.push_step(VerifyAction::ExitScope, scope, String::new());
        let flow = frame.map(|frame| frame.flow).unwrap_or_default();
        result.map(|value| (value, flow))
    }

    /// Mark the innermost frame as returning.
    pub(crate) fn mark_returns(&mut self) {
        if let Some(frame) = self.scopes.top_mut() {
            frame.flow.definitely_returns = true;
            frame.flow.might_return = true;
        }
    }

    /// Fold flow facts of a finished nested statement into the innermost frame.
    pub(crate) fn absorb_flow(&mut self, flow: Flow) {
        if let Some(frame) = self.scopes.top_mut() {
            frame.flow.absorb(flow);
        }
    }

    /// Run `body` inside a type switch. Candidates recorded by accepted
    /// attempts are committed, one alternative set per placeholder, when the
    /// switch exits, including when `body` fails.
    pub(crate) fn with_type_switch<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        self.switches.enter();
        let result = body(self);
        for (placeholder, candidates) in self.switches.exit() {
            self.commit_evidence(placeholder, candidates);
        }
        result
    }

    /// One speculative attempt inside the active switch: its records are
    /// kept only if `body` returns `Ok(true)`.
    pub(crate) fn attempt(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<bool, Diagnostic>,
    ) -> Result<bool, Diagnostic> {
        let mark = self.switches.attempt_mark();
        let result = body(self);
        let accepted = matches!(result, Ok(true));
        self.switches.finish_attempt(mark, accepted);
        result
    }

    /// Run `body` without leaving any placeholder evidence behind.
    pub(crate) fn speculate<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        self.speculating += 1;
        self.switches.enter();
        let result = body(self);
        self.switches.exit();
        self.speculating -= 1;
        result
    }

    /// Run `body` with the binding environment restored to its current
    /// state afterwards, whatever `body` pushed and however it exits.
    pub(crate) fn with_binding_mark<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        let mark = self.bindings.mark();
        let result = body(self);
        for (placeholder, value) in self.bindings.drain_from(mark).into_iter().rev() {
            let detail = format!("released from `{}`", self.ir.label(value));
            self.push_step(VerifyAction::Untarget, placeholder, detail);
        }
        result
    }

    /// Current scope is a loop body or nested inside one.
    pub(crate) fn enclosing_loop(&self) -> Option<NodeId> {
        self.scopes
            .nearest_soft_scope_matching(|scope| matches!(self.ir.kind(scope), NodeKind::Loop(_)))
    }
}
