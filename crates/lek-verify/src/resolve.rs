//! Name resolution and value/type queries.
//!
//! Identifier lookup walks soft frames first, then the lexical chain of hard
//! scopes, then the builtins module, and unions every hit. Value queries
//! follow proxy nodes (references, attributes, imports, links) and
//! placeholder bindings to the underlying node; type queries build on them.

use std::collections::BTreeSet;

use lek_ir::{Derivation, FunctionType, LinkKind, NodeId, NodeKind, Variable, VerifyState};

use crate::trace::VerifyAction;
use crate::{Category, Diagnostic, Verifier};

/// Result of resolving the target of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The name is bound; assign to the existing object.
    Found(NodeId),
    /// Nothing was bound; a fresh variable was injected into the current
    /// hard scope and the assignment should infer its type.
    Inferred(NodeId),
}

impl ResolutionOutcome {
    pub fn node(self) -> NodeId {
        match self {
            ResolutionOutcome::Found(id) | ResolutionOutcome::Inferred(id) => id,
        }
    }
}

impl Verifier<'_> {
    // -----------------------------------------------------------------------
    // Identifier lookup
    // -----------------------------------------------------------------------

    /// Every binding named `name` visible from the current position.
    ///
    /// Non-static hits found outside the innermost enclosing function are
    /// replaced by that function's closed-over link for the name.
    pub(crate) fn resolve_identifier(
        &mut self,
        name: &str,
        exclude: Option<NodeId>,
    ) -> Result<Vec<NodeId>, Diagnostic> {
        let mut hits = Vec::new();

        let soft: Vec<NodeId> = self.scopes.soft_frames().collect();
        for scope in soft {
            if let Some(context) = self.ir.scope_context(scope)
                && let Some(hit) = self.ir.context(context).get(name)
            {
                hits.push(hit);
            }
        }

        let mut saw_builtins = false;
        let mut closure = None;
        let mut scope = self.scopes.current_hard_scope();
        let mut depth = 0;
        while let Some(current) = scope {
            depth += 1;
            if depth > self.options.max_link_depth {
                return Err(self.internal(current, "scope chain does not terminate".to_string()));
            }
            saw_builtins |= Some(current) == self.builtins;
            for hit in self.local_hits(current, name) {
                match closure {
                    Some(function) if function != current && !self.is_static(hit) => {
                        let link = self.capture(function, name, hit)?;
                        hits.push(link);
                    }
                    _ => hits.push(hit),
                }
            }
            if closure.is_none() && matches!(self.ir.kind(current), NodeKind::Function(_)) {
                closure = Some(current);
            }
            scope = self.ir.parent_scope(current);
        }

        if !saw_builtins
            && let Some(builtins) = self.builtins
            && let Some(context) = self.ir.scope_context(builtins)
            && let Some(hit) = self.ir.context(context).get(name)
        {
            hits.push(hit);
        }

        hits.retain(|hit| Some(*hit) != exclude);
        let mut seen = BTreeSet::new();
        hits.retain(|hit| seen.insert(*hit));
        Ok(hits)
    }

    /// Names a hard or soft scope binds directly.
    fn local_hits(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        let mut hits = Vec::new();
        match self.ir.kind(scope) {
            NodeKind::Module(module) => hits.extend(self.ir.context(module.context).get(name)),
            NodeKind::Function(function) => {
                hits.extend(self.ir.context(function.context).get(name));
                if let Some(self_arg) = function.self_arg
                    && self.ir.name(self_arg) == Some(name)
                {
                    hits.push(self_arg);
                }
            }
            NodeKind::Branch(_) | NodeKind::Loop(_) => {
                if let Some(context) = self.ir.scope_context(scope) {
                    hits.extend(self.ir.context(context).get(name));
                }
            }
            // Instance members are reached through `self`, never by bare name.
            _ => {}
        }
        hits
    }

    /// The closed-over link `function` holds for `value`, created on first use.
    fn capture(&mut self, function: NodeId, name: &str, value: NodeId) -> Result<NodeId, Diagnostic> {
        let closed = self.function_data(function)?.closed_context;
        if let Some(existing) = self.ir.context(closed).get(name) {
            return Ok(existing);
        }
        let span = self.ir.span(value);
        let link = self.ir.link(LinkKind::Closed, value, span);
        self.ir.node_mut(link).name = Some(name.to_string());
        self.ir.bind(closed, link);
        let detail = format!("captured by `{}`", self.ir.label(function));
        self.push_step(VerifyAction::Capture, value, detail);
        Ok(link)
    }

    /// Whether `id` can be resolved independently of any runtime instance.
    pub fn is_static(&self, id: NodeId) -> bool {
        let mut current = id;
        for _ in 0..self.options.max_link_depth {
            match self.ir.kind(current) {
                NodeKind::Module(_) | NodeKind::Builtin | NodeKind::Void => return true,
                NodeKind::Placeholder(_) => return false,
                NodeKind::Link(link) => {
                    current = link.value;
                    continue;
                }
                NodeKind::Variable(_) => {
                    return self
                        .ir
                        .parent_scope(current)
                        .is_some_and(|parent| matches!(self.ir.kind(parent), NodeKind::Module(_)));
                }
                _ => {}
            }
            match self.ir.parent_scope(current) {
                None => return true,
                Some(parent) if matches!(self.ir.kind(parent), NodeKind::Class(_)) => return false,
                Some(parent) => current = parent,
            }
        }
        false
    }

    /// Resolve `name` for the reference node `site`: exactly one hit.
    pub(crate) fn resolve_name(&mut self, site: NodeId, name: &str) -> Result<NodeId, Diagnostic> {
        let hits = self.resolve_identifier(name, None)?;
        match hits.as_slice() {
            [] => Err(self.missing(site, name)),
            [hit] => {
                let detail = format!("`{name}` -> {}", self.ir.kind(*hit).as_str());
                self.push_step(VerifyAction::Resolve, *hit, detail);
                Ok(*hit)
            }
            _ => Err(self.ambiguous(site, name, &hits)),
        }
    }

    /// Resolve the name an assignment writes to, inferring a variable if the
    /// name is not bound anywhere.
    pub(crate) fn resolve_assignment_target(
        &mut self,
        site: NodeId,
        name: &str,
    ) -> Result<ResolutionOutcome, Diagnostic> {
        let hits = self.resolve_identifier(name, None)?;
        match hits.as_slice() {
            [] => {
                let Some(scope) = self.scopes.current_hard_scope() else {
                    return Err(self.internal(site, "assignment outside of any scope".to_string()));
                };
                let context = match self.ir.kind(scope) {
                    NodeKind::Module(_) | NodeKind::Function(_) => self.ir.scope_context(scope),
                    _ => None,
                };
                let Some(context) = context else {
                    return Err(self.error(
                        Category::Syntax,
                        site,
                        format!(
                            "cannot introduce `{name}` in {} `{}`",
                            self.ir.kind(scope).as_str(),
                            self.ir.label(scope)
                        ),
                    ));
                };
                let span = self.ir.span(site);
                let variable = self.ir.variable(name, None, span);
                self.ir.bind(context, variable);
                let detail = format!("new variable in `{}`", self.ir.label(scope));
                self.push_step(VerifyAction::Infer, variable, detail);
                Ok(ResolutionOutcome::Inferred(variable))
            }
            [hit] => Ok(ResolutionOutcome::Found(*hit)),
            _ => Err(self.ambiguous(site, name, &hits)),
        }
    }

    fn missing(&self, site: NodeId, name: &str) -> Diagnostic {
        self.error(
            Category::MissingReference,
            site,
            format!("no binding named `{name}` is visible here"),
        )
        .with_help(Category::MissingReference.example_fix())
    }

    fn ambiguous(&self, site: NodeId, name: &str, hits: &[NodeId]) -> Diagnostic {
        let mut diag = self.error(
            Category::Ambiguity,
            site,
            format!("`{name}` is ambiguous: {} bindings are visible", hits.len()),
        );
        for hit in hits {
            let scope = self
                .ir
                .parent_scope(*hit)
                .map(|scope| format!(" in `{}`", self.ir.label(scope)))
                .unwrap_or_default();
            diag = diag.with_label(self.location(*hit), format!("candidate defined here{scope}"));
        }
        diag.with_help(Category::Ambiguity.example_fix())
    }

    // -----------------------------------------------------------------------
    // Value queries
    // -----------------------------------------------------------------------

    /// Follow proxies and bound placeholders to the underlying node.
    ///
    /// Stops at `ForwardTarget` links so the bindings they carry stay visible
    /// to type queries.
    pub fn resolve_value(&self, id: NodeId) -> Result<NodeId, Diagnostic> {
        self.follow(id, false)
    }

    /// Like [`Verifier::resolve_value`], but also looks through
    /// `ForwardTarget` links.
    pub fn extract_value(&self, id: NodeId) -> Result<NodeId, Diagnostic> {
        self.follow(id, true)
    }

    fn follow(&self, id: NodeId, through_targets: bool) -> Result<NodeId, Diagnostic> {
        let mut current = id;
        let mut seen = BTreeSet::new();
        loop {
            if !seen.insert(current) {
                return Err(self.internal(
                    id,
                    format!("resolving `{}` runs in a cycle", self.ir.label(id)),
                ));
            }
            if seen.len() > self.options.max_link_depth {
                return Err(self.internal(
                    id,
                    format!(
                        "resolving `{}` exceeds the link depth of {}",
                        self.ir.label(id),
                        self.options.max_link_depth
                    ),
                ));
            }
            let next = match self.ir.kind(current) {
                NodeKind::Reference(reference) => Some(self.resolved_or(current, reference.resolved)?),
                NodeKind::Attribute(attribute) => Some(self.resolved_or(current, attribute.resolved)?),
                NodeKind::Import(import) => Some(self.resolved_or(current, import.resolved)?),
                NodeKind::Link(link) => match link.kind {
                    LinkKind::ForwardTarget(_) if !through_targets => None,
                    _ => Some(link.value),
                },
                NodeKind::Placeholder(placeholder) => {
                    placeholder.target.or_else(|| self.bindings.get(current))
                }
                _ => None,
            };
            match next {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
    }

    fn resolved_or(&self, id: NodeId, resolved: Option<NodeId>) -> Result<NodeId, Diagnostic> {
        resolved.ok_or_else(|| {
            self.internal(
                id,
                format!("`{}` was queried before it was resolved", self.ir.label(id)),
            )
        })
    }

    // -----------------------------------------------------------------------
    // Type queries
    // -----------------------------------------------------------------------

    /// The type of the value `id` stands for.
    pub fn resolve_type(&mut self, id: NodeId) -> Result<NodeId, Diagnostic> {
        let value = self.resolve_value(id)?;
        match self.ir.kind(value) {
            NodeKind::Builtin
            | NodeKind::Void
            | NodeKind::FunctionType(_)
            | NodeKind::Class(_)
            | NodeKind::Module(_) => Ok(value),
            NodeKind::Function(_) => self.signature_of(value),
            NodeKind::Method(method) => match method.overloads.as_slice() {
                [single] => {
                    let single = *single;
                    self.signature_of(single)
                }
                overloads => Err(self.error(
                    Category::Type,
                    id,
                    format!(
                        "`{}` has {} overloads, so it has no single type",
                        self.ir.label(value),
                        overloads.len()
                    ),
                )),
            },
            NodeKind::Variable(variable) => match variable.ty {
                Some(ty) => self.resolve_value(ty),
                None if variable.declared.is_some() => {
                    self.verify_node(value)?;
                    match self.ir.kind(value) {
                        NodeKind::Variable(Variable { ty: Some(ty), .. }) => {
                            let ty = *ty;
                            self.resolve_value(ty)
                        }
                        _ => Err(self.internal(
                            id,
                            format!("variable `{}` has no type", self.ir.label(value)),
                        )),
                    }
                }
                None => Err(self.internal(
                    id,
                    format!("variable `{}` is used before it has a type", self.ir.label(value)),
                )),
            },
            NodeKind::Literal(literal) => {
                let ty = literal.ty;
                self.resolve_value(ty)
            }
            NodeKind::Call(_) => self.call_return_type(value),
            NodeKind::Link(link) => {
                let LinkKind::ForwardTarget(targets) = &link.kind else {
                    return Err(self.internal(value, "unfollowed link".to_string()));
                };
                let (targets, inner) = (targets.clone(), link.value);
                self.with_targets(&targets, |v| {
                    let ty = v.resolve_type(inner)?;
                    v.concretize(ty)
                })
            }
            NodeKind::Placeholder(_) => self.derive_child(value, Derivation::Type),
            other => Err(self.internal(
                id,
                format!("{} `{}` has no type", other.as_str(), self.ir.label(value)),
            )),
        }
    }

    /// Return type of calling `callee`, a function-like value.
    pub(crate) fn function_return_type(&mut self, callee: NodeId) -> Result<NodeId, Diagnostic> {
        let value = self.resolve_value(callee)?;
        match self.ir.kind(value) {
            NodeKind::Function(_) => {
                let signature = self.signature_of(value)?;
                match self.function_type_data(signature).and_then(|ty| ty.ret) {
                    Some(ret) => Ok(ret),
                    None if self.ir.node(value).state == VerifyState::InProgress => {
                        self.forward_return(value)
                    }
                    None => Ok(self.ir.void()),
                }
            }
            NodeKind::Link(link) => {
                let LinkKind::ForwardTarget(targets) = &link.kind else {
                    return Err(self.internal(value, "unfollowed link".to_string()));
                };
                let (targets, inner) = (targets.clone(), link.value);
                self.with_targets(&targets, |v| {
                    let ret = v.function_return_type(inner)?;
                    let ret = v.resolve_value(ret)?;
                    v.concretize(ret)
                })
            }
            NodeKind::FunctionType(ty) => Ok(ty.ret.unwrap_or(self.ir.void())),
            NodeKind::Method(method) if method.overloads.len() == 1 => {
                let single = method.overloads[0];
                self.function_return_type(single)
            }
            NodeKind::Class(_) => Ok(value),
            NodeKind::Placeholder(_) => self.derive_child(value, Derivation::Return),
            _ => Err(self.error(
                Category::Type,
                callee,
                format!("`{}` is not callable", self.ir.label(value)),
            )),
        }
    }

    /// Type a verified call evaluates to, computed under its call-site
    /// targets. Repeatable: every query re-enters the same bindings.
    pub fn call_return_type(&mut self, call: NodeId) -> Result<NodeId, Diagnostic> {
        let resolution = self.resolve_call(call)?;
        if let Some(class) = resolution.constructs {
            return Ok(class);
        }
        self.with_targets(&resolution.targets, |v| {
            let ret = v.function_return_type(resolution.function)?;
            let ret = v.resolve_value(ret)?;
            v.concretize(ret)
        })
    }

    /// Rebuild a function type whose components resolve differently under
    /// the current bindings. Other types are returned resolved.
    pub fn concretize(&mut self, ty: NodeId) -> Result<NodeId, Diagnostic> {
        let ty = self.resolve_value(ty)?;
        let Some(function_type) = self.function_type_data(ty) else {
            return Ok(ty);
        };
        let FunctionType { args, ret, owner } = function_type.clone();

        let mut changed = false;
        let mut concrete_args = Vec::with_capacity(args.len());
        for arg in args {
            let concrete = self.concretize(arg)?;
            changed |= concrete != arg;
            concrete_args.push(concrete);
        }
        let concrete_ret = match ret {
            Some(ret) => {
                let concrete = self.concretize(ret)?;
                changed |= concrete != ret;
                Some(concrete)
            }
            None => None,
        };
        if !changed {
            return Ok(ty);
        }
        let span = self.ir.span(ty);
        let rebuilt = self.ir.alloc(
            span,
            None,
            NodeKind::FunctionType(FunctionType {
                args: concrete_args,
                ret: concrete_ret,
                owner,
            }),
        );
        self.ir.node_mut(rebuilt).state = VerifyState::Verified;
        Ok(rebuilt)
    }
}
