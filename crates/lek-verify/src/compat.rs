//! Type compatibility and call resolution.
//!
//! `check_compatibility(expected, actual)` is asymmetric: the expected side
//! decides first, and only if it declines does the actual side get a say.
//! Open placeholders never decline; they either collect evidence (while
//! their scope is still being verified) or answer from the evidence they
//! collected (once locked).

use lek_ir::{
    CallResolution, Derivation, LinkKind, NodeId, NodeKind, PlaceholderKind, SwitchCandidates,
    VerifyState,
};

use crate::trace::VerifyAction;
use crate::{Category, Diagnostic, Verifier};

impl Verifier<'_> {
    // -----------------------------------------------------------------------
    // Compatibility
    // -----------------------------------------------------------------------

    /// Whether a value of type `actual` may be used where `expected` is
    /// required.
    pub fn check_compatibility(&mut self, expected: NodeId, actual: NodeId) -> Result<bool, Diagnostic> {
        let a = self.resolve_value(expected)?;
        let b = self.resolve_value(actual)?;
        let compatible = if a == b {
            true
        } else {
            match self.compatibility_of(a, b)? {
                Some(result) => result,
                None => self.compatibility_of(b, a)?.unwrap_or(false),
            }
        };
        let action = if compatible {
            VerifyAction::Compatible
        } else {
            VerifyAction::Incompatible
        };
        let detail = format!("with `{}`", self.ir.label(b));
        self.push_step(action, a, detail);
        Ok(compatible)
    }

    /// `a`'s own verdict on `b`; `None` declines.
    fn compatibility_of(&mut self, a: NodeId, b: NodeId) -> Result<Option<bool>, Diagnostic> {
        let b_defers = matches!(self.ir.kind(b), NodeKind::Void | NodeKind::Placeholder(_));
        match self.ir.kind(a) {
            NodeKind::Void => Ok(Some(true)),
            NodeKind::Placeholder(_) => self.placeholder_compatibility(a, b).map(Some),
            NodeKind::Builtin => match self.ir.kind(b) {
                NodeKind::Builtin => Ok(Some(self.ir.name(a) == self.ir.name(b))),
                _ if b_defers => Ok(None),
                _ => Ok(Some(false)),
            },
            NodeKind::Class(_) | NodeKind::Module(_) => {
                Ok(if b_defers { None } else { Some(false) })
            }
            NodeKind::FunctionType(_) => match self.ir.kind(b) {
                NodeKind::FunctionType(_) => self.function_types_compatible(a, b).map(Some),
                _ if b_defers => Ok(None),
                _ => Ok(Some(false)),
            },
            other => Err(self.internal(
                a,
                format!(
                    "{} `{}` used as a type",
                    other.as_str(),
                    self.ir.label(a)
                ),
            )),
        }
    }

    /// Same arity, arguments checked callee-first, return covariant. A
    /// caller that expects nothing back accepts any return.
    fn function_types_compatible(&mut self, callee: NodeId, caller: NodeId) -> Result<bool, Diagnostic> {
        let (Some(callee_ty), Some(caller_ty)) = (
            self.function_type_data(callee).cloned(),
            self.function_type_data(caller).cloned(),
        ) else {
            return Ok(false);
        };
        if callee_ty.args.len() != caller_ty.args.len() {
            return Ok(false);
        }
        for (declared, supplied) in callee_ty.args.iter().zip(&caller_ty.args) {
            if !self.check_compatibility(*declared, *supplied)? {
                return Ok(false);
            }
        }
        match (callee_ty.ret, caller_ty.ret) {
            (_, None) => Ok(true),
            (None, Some(expected)) => {
                let expected = self.resolve_value(expected)?;
                Ok(matches!(self.ir.kind(expected), NodeKind::Void))
            }
            (Some(provided), Some(expected)) => self.check_compatibility(expected, provided),
        }
    }

    fn placeholder_compatibility(&mut self, placeholder: NodeId, candidate: NodeId) -> Result<bool, Diagnostic> {
        if !self.is_locked(placeholder) {
            self.record(placeholder, candidate);
            return Ok(true);
        }
        if self.is_open_placeholder(candidate) && !self.is_locked(candidate) {
            let sets = self
                .placeholder_data(placeholder)
                .map(|data| data.evidence.clone())
                .unwrap_or_default();
            for set in sets {
                self.commit_evidence(candidate, set);
            }
            return Ok(true);
        }
        self.check_evidence(placeholder, candidate)
    }

    // -----------------------------------------------------------------------
    // Evidence
    // -----------------------------------------------------------------------

    /// Note that `placeholder` was used as `candidate`: buffered inside a
    /// type switch, committed as a singleton alternative set otherwise.
    fn record(&mut self, placeholder: NodeId, candidate: NodeId) {
        if self.switches.record(placeholder, candidate) {
            let detail = format!("candidate `{}`", self.ir.label(candidate));
            self.push_step(VerifyAction::Record, placeholder, detail);
        } else {
            self.commit_evidence(placeholder, vec![candidate]);
        }
    }

    /// Append one alternative set to a placeholder's evidence.
    pub(crate) fn commit_evidence(&mut self, placeholder: NodeId, candidates: Vec<NodeId>) {
        if self.speculating > 0 || candidates.is_empty() {
            return;
        }
        let detail = candidates
            .iter()
            .map(|candidate| format!("`{}`", self.ir.label(*candidate)))
            .collect::<Vec<_>>()
            .join(" | ");
        let Some(data) = self.placeholder_mut(placeholder) else {
            return;
        };
        if data.evidence.contains(&candidates) {
            return;
        }
        data.evidence.push(candidates);
        self.push_step(VerifyAction::Commit, placeholder, detail);
    }

    /// A candidate satisfies a placeholder's evidence when every recorded
    /// alternative set has exactly one member compatible with it.
    pub(crate) fn check_evidence(&mut self, placeholder: NodeId, candidate: NodeId) -> Result<bool, Diagnostic> {
        if self.evidence_stack.contains(&(placeholder, candidate)) {
            return Ok(true);
        }
        let sets = self
            .placeholder_data(placeholder)
            .map(|data| data.evidence.clone())
            .unwrap_or_default();
        self.evidence_stack.push((placeholder, candidate));
        let result = self.sets_admit(&sets, candidate);
        self.evidence_stack.pop();
        result
    }

    fn sets_admit(&mut self, sets: &[Vec<NodeId>], candidate: NodeId) -> Result<bool, Diagnostic> {
        for set in sets {
            let mut matching = 0;
            for member in set {
                let member = *member;
                if self.speculate(|v| v.check_compatibility(member, candidate))? {
                    matching += 1;
                }
            }
            if matching != 1 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Call resolution
    // -----------------------------------------------------------------------

    /// Resolve calling `callee` with the argument types of `call_type`.
    pub(crate) fn resolve_call_on(&mut self, callee: NodeId, call_type: NodeId) -> Result<CallResolution, Diagnostic> {
        let value = self.resolve_value(callee)?;
        match self.ir.kind(value) {
            NodeKind::Function(_) => self.resolve_function_call(value, call_type, None),
            NodeKind::Method(method) => {
                let overloads = method.overloads.clone();
                self.resolve_overloads(value, &overloads, call_type, None)
            }
            NodeKind::Class(class) => match class.constructor {
                Some(constructor) => {
                    let overloads = match self.ir.kind(constructor) {
                        NodeKind::Method(method) => method.overloads.clone(),
                        _ => Vec::new(),
                    };
                    self.resolve_overloads(constructor, &overloads, call_type, Some(value))
                }
                None => {
                    let arity = self.function_type_data(call_type).map_or(0, |ty| ty.args.len());
                    if arity != 0 {
                        return Err(self.error(
                            Category::Type,
                            call_type,
                            format!(
                                "`{}` has no constructor, but is called with {arity} argument(s)",
                                self.ir.label(value)
                            ),
                        ));
                    }
                    Ok(CallResolution {
                        function: value,
                        call_type,
                        targets: Vec::new(),
                        constructs: Some(value),
                    })
                }
            },
            NodeKind::Placeholder(_) => {
                let args = self.call_args(call_type);
                let function = self.derive_child(value, Derivation::Call(args))?;
                Ok(CallResolution {
                    function,
                    call_type,
                    targets: Vec::new(),
                    constructs: None,
                })
            }
            _ => {
                let ty = self.resolve_type(value)?;
                self.resolve_instance_call(value, ty, call_type)
            }
        }
    }

    /// Resolve calling an instance whose type is `ty`.
    pub(crate) fn resolve_instance_call(
        &mut self,
        site: NodeId,
        ty: NodeId,
        call_type: NodeId,
    ) -> Result<CallResolution, Diagnostic> {
        let ty = self.resolve_value(ty)?;
        match self.ir.kind(ty) {
            NodeKind::FunctionType(function_type) => {
                let owner = function_type.owner;
                if !self.check_compatibility(ty, call_type)? {
                    return Err(self.mismatch(site, ty, call_type));
                }
                match owner {
                    Some(function) => self.function_resolution(function, call_type, None),
                    None => Ok(CallResolution {
                        function: ty,
                        call_type,
                        targets: Vec::new(),
                        constructs: None,
                    }),
                }
            }
            NodeKind::Placeholder(_) => {
                let args = self.call_args(call_type);
                let function = self.derive_child(ty, Derivation::InstanceCall(args))?;
                Ok(CallResolution {
                    function,
                    call_type,
                    targets: Vec::new(),
                    constructs: None,
                })
            }
            _ => Err(self.error(
                Category::Type,
                site,
                format!(
                    "`{}` of type `{}` is not callable",
                    self.ir.label(site),
                    self.ir.label(ty)
                ),
            )),
        }
    }

    pub(crate) fn resolve_function_call(
        &mut self,
        function: NodeId,
        call_type: NodeId,
        constructs: Option<NodeId>,
    ) -> Result<CallResolution, Diagnostic> {
        self.verify_node(function)?;
        let signature = self.signature_of(function)?;
        if !self.check_compatibility(signature, call_type)? {
            return Err(self.mismatch(function, signature, call_type));
        }
        self.function_resolution(function, call_type, constructs)
    }

    /// Pair the function's dependent argument placeholders with the
    /// supplied types. A function with such targets is reached through a
    /// `ForwardTarget` link carrying them.
    pub(crate) fn function_resolution(
        &mut self,
        function: NodeId,
        call_type: NodeId,
        constructs: Option<NodeId>,
    ) -> Result<CallResolution, Diagnostic> {
        let args = self.function_data(function)?.args.clone();
        let supplied = self.call_args(call_type);
        let mut targets = Vec::new();
        for (arg, supplied) in args.iter().zip(supplied) {
            let NodeKind::Variable(variable) = self.ir.kind(*arg) else {
                continue;
            };
            if let Some(ty) = variable.ty
                && let Some(placeholder) = self.placeholder_data(ty)
                && placeholder.kind == PlaceholderKind::Dependent
                && placeholder.scope == function
            {
                targets.push((ty, supplied));
            }
        }
        let resolved = if targets.is_empty() {
            function
        } else {
            let span = self.ir.span(call_type);
            let link = self
                .ir
                .link(LinkKind::ForwardTarget(targets.clone()), function, span);
            self.ir.node_mut(link).state = VerifyState::Verified;
            link
        };
        Ok(CallResolution {
            function: resolved,
            call_type,
            targets,
            constructs,
        })
    }

    /// Pick the overload matching `call_type`.
    ///
    /// Exactly one match is required. Several matches are deferred to a
    /// switch placeholder only when an argument type is still an open
    /// placeholder of a scope being verified; otherwise they are ambiguous.
    pub(crate) fn resolve_overloads(
        &mut self,
        method: NodeId,
        overloads: &[NodeId],
        call_type: NodeId,
        constructs: Option<NodeId>,
    ) -> Result<CallResolution, Diagnostic> {
        for overload in overloads {
            self.verify_node(*overload)?;
        }
        let matches = self.with_type_switch(|v| {
            let mut matches = Vec::new();
            for overload in overloads {
                let signature = v.signature_of(*overload)?;
                if v.attempt(|v| v.check_compatibility(signature, call_type))? {
                    matches.push(*overload);
                }
            }
            Ok(matches)
        })?;

        match matches.as_slice() {
            [single] => {
                let detail = format!("selected for `{}`", self.ir.label(call_type));
                self.push_step(VerifyAction::Overload, *single, detail);
                self.function_resolution(*single, call_type, constructs)
            }
            [] => {
                let mut diag = self.error(
                    Category::Type,
                    call_type,
                    format!(
                        "no overload of `{}` accepts `{}`",
                        self.ir.label(method),
                        self.ir.label(call_type)
                    ),
                );
                for overload in overloads {
                    let signature = self.signature_of(*overload)?;
                    diag = diag.with_label(
                        self.location(*overload),
                        format!("candidate `{}`", self.ir.label(signature)),
                    );
                }
                Err(diag)
            }
            _ => {
                let mut open = Vec::new();
                for arg in self.call_args(call_type) {
                    let arg = self.resolve_value(arg)?;
                    if self.is_open_placeholder(arg) && !self.is_locked(arg) && !open.contains(&arg) {
                        open.push(arg);
                    }
                }
                if open.is_empty() {
                    let mut diag = self.error(
                        Category::Ambiguity,
                        call_type,
                        format!(
                            "call to `{}` with `{}` matches {} overloads",
                            self.ir.label(method),
                            self.ir.label(call_type),
                            matches.len()
                        ),
                    );
                    for candidate in &matches {
                        let signature = self.signature_of(*candidate)?;
                        diag = diag.with_label(
                            self.location(*candidate),
                            format!("matching overload `{}`", self.ir.label(signature)),
                        );
                    }
                    return Err(diag.with_help(Category::Ambiguity.example_fix()));
                }
                self.defer_overloads(method, matches.clone(), call_type, constructs, open)
            }
        }
    }

    fn defer_overloads(
        &mut self,
        method: NodeId,
        candidates: Vec<NodeId>,
        call_type: NodeId,
        constructs: Option<NodeId>,
        open: Vec<NodeId>,
    ) -> Result<CallResolution, Diagnostic> {
        let Some(scope) = self.scopes.current_hard_scope() else {
            return Err(self.internal(call_type, "overload deferred outside of any scope".to_string()));
        };
        let name = self.ir.name(method).unwrap_or("overload").to_string();
        let span = self.ir.span(call_type);
        let switch = self.ir.placeholder(PlaceholderKind::Switch, scope, &name, span);
        let count = candidates.len();
        if let Some(data) = self.placeholder_mut(switch) {
            data.switch = Some(SwitchCandidates {
                candidates,
                call_type,
            });
        }
        for placeholder in open {
            if let Some(data) = self.placeholder_mut(placeholder) {
                data.derived.push((Derivation::Switch, switch));
            }
        }
        self.push_step(
            VerifyAction::Defer,
            switch,
            format!("{count} overloads pending"),
        );
        Ok(CallResolution {
            function: switch,
            call_type,
            targets: Vec::new(),
            constructs,
        })
    }

    pub(crate) fn call_args(&self, call_type: NodeId) -> Vec<NodeId> {
        self.function_type_data(call_type)
            .map(|ty| ty.args.clone())
            .unwrap_or_default()
    }

    fn mismatch(&self, callee: NodeId, signature: NodeId, call_type: NodeId) -> Diagnostic {
        self.error(
            Category::Type,
            call_type,
            format!(
                "`{}` expects `{}`, but is called with `{}`",
                self.ir.label(callee),
                self.ir.label(signature),
                self.ir.label(call_type)
            ),
        )
    }
}
