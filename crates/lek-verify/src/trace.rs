//! Tracing types for verifier observability.
//!
//! These types capture a step-by-step record of scope entry, name
//! resolution, compatibility checks, and placeholder targeting so tools can
//! show why a program verified (or did not). All tracing is opt-in via
//! `Verifier::enable_tracing()`; nothing is recorded otherwise.

use serde::Serialize;

/// A single step in a verification trace.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyStep {
    pub step: usize,
    pub action: VerifyAction,
    /// Label of the node the step is about.
    pub node: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(u32, u32)>,
}

/// What happened during a verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyAction {
    /// A scope frame was pushed.
    EnterScope,
    /// A scope frame was popped.
    ExitScope,
    /// An identifier resolved to exactly one binding.
    Resolve,
    /// A variable was synthesized or its type inferred from a value.
    Infer,
    /// A closure captured an outer, non-static binding.
    Capture,
    /// A compatibility check succeeded.
    Compatible,
    /// A compatibility check failed.
    Incompatible,
    /// An unlocked placeholder recorded a candidate type.
    Record,
    /// Buffered candidates were committed as one alternative set.
    Commit,
    /// A placeholder was bound to a value.
    Target,
    /// Bindings made since a mark were reverted.
    Untarget,
    /// An overload was selected.
    Overload,
    /// Overload ambiguity was deferred to a switch placeholder.
    Defer,
    /// An import head was loaded from a source file.
    Import,
}
