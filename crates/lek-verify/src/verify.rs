//! Per-node verification.
//!
//! `verify_node` is idempotent: a node is verified at most once, and a node
//! whose verification is in progress (a function reached again through
//! recursion) is treated as already verified. Each node kind links its
//! children, checks types, and records flow facts on the enclosing frame.

use lek_ir::{Derivation, Ir, LinkKind, NodeId, NodeKind, PlaceholderKind, Stats, VerifyState};

use crate::resolve::ResolutionOutcome;
use crate::scope::{Flow, FrameKind};
use crate::trace::VerifyAction;
use crate::{Category, Diagnostic, Verifier};

impl Verifier<'_> {
    pub(crate) fn verify_node(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        match self.ir.node(id).state {
            VerifyState::Verified | VerifyState::InProgress => return Ok(()),
            VerifyState::Unverified => {}
        }
        self.ir.node_mut(id).state = VerifyState::InProgress;
        let result = self.verify_kind(id);
        self.ir.node_mut(id).state = if result.is_ok() {
            VerifyState::Verified
        } else {
            VerifyState::Unverified
        };
        result
    }

    fn verify_kind(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        match self.ir.kind(id) {
            NodeKind::Module(_) => self.verify_module_scope(id),
            NodeKind::Function(_) => self.verify_function(id),
            NodeKind::FunctionType(ty) => {
                let parts: Vec<NodeId> = ty.args.iter().copied().chain(ty.ret).collect();
                for part in parts {
                    self.verify_node(part)?;
                    self.type_value(part)?;
                }
                Ok(())
            }
            NodeKind::Method(method) => {
                for overload in method.overloads.clone() {
                    self.verify_node(overload)?;
                }
                Ok(())
            }
            NodeKind::Class(_) => self.verify_class(id),
            NodeKind::Variable(_) => self.verify_variable(id),
            NodeKind::Literal(literal) => {
                let ty = literal.ty;
                self.verify_node(ty)?;
                self.type_value(ty).map(|_| ())
            }
            NodeKind::Assignment(_) => self.verify_assignment(id),
            NodeKind::Call(_) => self.verify_call(id),
            NodeKind::Return(_) => self.verify_return(id),
            NodeKind::Branch(_) => self.verify_branch(id),
            NodeKind::Loop(_) => self.verify_loop(id),
            NodeKind::Break(_) => self.verify_break(id),
            NodeKind::Reference(_) => self.verify_reference(id),
            NodeKind::Attribute(_) => self.verify_attribute(id),
            NodeKind::Link(link) => {
                let value = link.value;
                self.verify_node(value)
            }
            NodeKind::Import(_) => self.verify_import(id),
            NodeKind::Builtin | NodeKind::Void | NodeKind::Comment(_) | NodeKind::Placeholder(_) => {
                Ok(())
            }
        }
    }

    /// `expr` must evaluate to a type; returns that type.
    fn type_value(&self, expr: NodeId) -> Result<NodeId, Diagnostic> {
        let ty = self.resolve_value(expr)?;
        if self.ir.kind(ty).is_type() {
            Ok(ty)
        } else {
            Err(self.error(
                Category::Type,
                expr,
                format!(
                    "`{}` is a {}, not a type",
                    self.ir.label(expr),
                    self.ir.kind(ty).as_str()
                ),
            ))
        }
    }

    fn record_stats(&mut self, id: NodeId, forward: bool, flow: Flow) {
        let stats = Stats {
            is_static: self.is_static(id),
            forward,
            definitely_returns: flow.definitely_returns,
            might_return: flow.might_return,
        };
        self.ir.node_mut(id).stats = Some(stats);
    }

    /// `scope` has untyped arguments, or is nested in a scope that has.
    /// Modules and builtin types end the chain.
    fn is_forward_scope(&self, scope: NodeId) -> bool {
        match self.ir.kind(scope) {
            NodeKind::Module(_) | NodeKind::Builtin | NodeKind::Void => false,
            NodeKind::Function(function) if function.dependent => true,
            _ => self
                .ir
                .parent_scope(scope)
                .is_some_and(|parent| self.is_forward_scope(parent)),
        }
    }

    /// Forward flag a soft scope inherits from the hard frame it runs in.
    fn soft_scope_forward(&self) -> bool {
        self.scopes
            .current_hard_scope()
            .is_some_and(|scope| self.is_forward_scope(scope))
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    fn verify_module_scope(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Module(module) = self.ir.kind(id) else {
            return Ok(());
        };
        let (context, main) = (module.context, module.main.clone());
        let ((), flow) = self.with_scope(id, FrameKind::Hard, |v| {
            for instruction in main {
                v.verify_node(instruction)?;
            }
            let children: Vec<NodeId> = v.ir.context(context).children().collect();
            for child in children {
                v.verify_node(child)?;
            }
            Ok(())
        })?;
        self.record_stats(id, false, flow);
        Ok(())
    }

    fn verify_function(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let function = self.function_data(id)?;
        let args = function.args.clone();
        let body = function.body.clone();
        let return_type = function.return_type;
        let constructor_of = function.constructor_of;
        let intrinsic = function.intrinsic;
        let self_arg = function.self_arg;
        let context = function.context;
        let name = self.ir.label(id);

        let result = self.with_scope(id, FrameKind::Hard, |v| {
            let mut arg_types = Vec::with_capacity(args.len());
            let mut dependent = false;
            for arg in &args {
                let declared = match v.ir.kind(*arg) {
                    NodeKind::Variable(variable) => variable.declared,
                    other => {
                        return Err(v.internal(
                            *arg,
                            format!("argument of `{name}` is a {}", other.as_str()),
                        ));
                    }
                };
                if declared.is_some() {
                    v.verify_node(*arg)?;
                    arg_types.push(v.resolve_type(*arg)?);
                    continue;
                }
                let arg_name = v.ir.name(*arg).unwrap_or("arg").to_string();
                let span = v.ir.span(*arg);
                let placeholder = v
                    .ir
                    .placeholder(PlaceholderKind::Dependent, id, &arg_name, span);
                if let NodeKind::Variable(variable) = v.ir.kind_mut(*arg) {
                    variable.ty = Some(placeholder);
                }
                v.ir.node_mut(*arg).state = VerifyState::Verified;
                dependent = true;
                arg_types.push(placeholder);
            }
            if let Some(self_arg) = self_arg {
                v.verify_node(self_arg)?;
            }

            let ret = match (constructor_of, return_type) {
                (Some(class), _) => Some(class),
                (None, Some(expr)) => {
                    v.verify_node(expr)?;
                    Some(v.type_value(expr)?)
                }
                (None, None) => None,
            };
            let span = v.ir.span(id);
            let signature = v.ir.function_type(arg_types, ret, span);
            if let NodeKind::FunctionType(ty) = v.ir.kind_mut(signature) {
                ty.owner = Some(id);
            }
            v.ir.node_mut(signature).state = VerifyState::Verified;
            if let Some(function) = v.function_mut(id) {
                function.signature = Some(signature);
                function.dependent = dependent;
            }

            for instruction in body {
                v.verify_node(instruction)?;
            }
            let nested: Vec<NodeId> = v.ir.context(context).children().collect();
            for child in nested {
                v.verify_node(child)?;
            }
            Ok((signature, dependent))
        });
        let ((signature, dependent), flow) = result
            .map_err(|err| err.with_label(self.location(id), format!("while verifying function `{name}`")))?;

        self.finish_forward_return(id)?;

        if !intrinsic && constructor_of.is_none() {
            let ret = self.function_type_data(signature).and_then(|ty| ty.ret);
            if let Some(ret) = ret {
                let ret = self.resolve_value(ret)?;
                if !matches!(self.ir.kind(ret), NodeKind::Void) && !flow.definitely_returns {
                    return Err(self
                        .error(
                            Category::Type,
                            id,
                            format!(
                                "all code paths must return a value of type `{}` in `{name}`",
                                self.ir.label(ret)
                            ),
                        )
                        .with_help("add a `return` at the end of the function body"));
                }
            }
        }
        let forward = dependent || self.is_forward_scope(id);
        self.record_stats(id, forward, flow);
        Ok(())
    }

    fn verify_class(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Class(class) = self.ir.kind(id) else {
            return Ok(());
        };
        let (constructor, instance_context) = (class.constructor, class.instance_context);
        let name = self.ir.label(id);

        let constructors = match constructor.map(|method| self.ir.kind(method)) {
            Some(NodeKind::Method(method)) => method.overloads.clone(),
            _ => Vec::new(),
        };
        for overload in &constructors {
            if let Some(function) = self.function_mut(*overload) {
                function.constructor_of = Some(id);
            }
        }

        let members: Vec<NodeId> = self.ir.context(instance_context).children().collect();
        let mut functions = constructors;
        for member in &members {
            match self.ir.kind(*member) {
                NodeKind::Method(method) => functions.extend(method.overloads.iter().copied()),
                NodeKind::Function(_) => functions.push(*member),
                _ => {}
            }
        }
        for function in functions {
            let (context, has_self) = match self.function_data(function) {
                Ok(data) => (data.context, data.self_arg.is_some()),
                Err(_) => continue,
            };
            if has_self {
                continue;
            }
            let span = self.ir.span(function);
            let self_arg = self.ir.variable("self", Some(id), span);
            self.ir.fake_bind(context, self_arg);
            if let Some(data) = self.function_mut(function) {
                data.self_arg = Some(self_arg);
            }
        }

        let ((), flow) = self
            .with_scope(id, FrameKind::Hard, |v| {
                if let Some(constructor) = constructor {
                    v.verify_node(constructor)?;
                }
                for member in members {
                    v.verify_node(member)?;
                }
                Ok(())
            })
            .map_err(|err| err.with_label(self.location(id), format!("while verifying class `{name}`")))?;
        let forward = self.is_forward_scope(id);
        self.record_stats(id, forward, flow);
        Ok(())
    }

    fn verify_variable(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Variable(variable) = self.ir.kind(id) else {
            return Ok(());
        };
        let Some(declared) = variable.declared else {
            return Ok(());
        };
        self.verify_node(declared)?;
        let ty = self.resolve_value(declared)?;
        if !self.ir.kind(ty).is_type() {
            return Err(self.error(
                Category::Type,
                id,
                format!(
                    "variable `{}` is declared with `{}`, which is not a type",
                    self.ir.label(id),
                    self.ir.label(declared)
                ),
            ));
        }
        if let NodeKind::Variable(variable) = self.ir.kind_mut(id) {
            variable.ty = Some(ty);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Instructions
    // -----------------------------------------------------------------------

    fn verify_assignment(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Assignment(assignment) = self.ir.kind(id) else {
            return Ok(());
        };
        let (target, value) = (assignment.target, assignment.value);
        self.verify_node(value)?;

        let slot = match self.ir.kind(target) {
            NodeKind::Reference(reference) if reference.resolved.is_none() => {
                let name = self.ir.name(target).unwrap_or_default().to_string();
                let outcome = self.resolve_assignment_target(target, &name)?;
                if let NodeKind::Reference(reference) = self.ir.kind_mut(target) {
                    reference.resolved = Some(outcome.node());
                }
                self.ir.node_mut(target).state = VerifyState::Verified;
                if let ResolutionOutcome::Found(found) = outcome {
                    self.verify_node(found)?;
                }
                outcome.node()
            }
            _ => {
                self.verify_node(target)?;
                target
            }
        };
        self.assign_to(id, slot, value)
            .map_err(|err| err.with_label(self.location(id), "while verifying assignment"))
    }

    /// Check `value` against the storage `slot` resolves to, inferring the
    /// type of a fresh variable.
    fn assign_to(&mut self, assignment: NodeId, slot: NodeId, value: NodeId) -> Result<(), Diagnostic> {
        let storage = self.resolve_value(slot)?;
        let value_type = self.resolve_type(value)?;
        match self.ir.kind(storage) {
            NodeKind::Variable(variable) => match variable.ty {
                None => {
                    if let NodeKind::Variable(variable) = self.ir.kind_mut(storage) {
                        variable.ty = Some(value_type);
                    }
                    let detail = format!("inferred as `{}`", self.ir.label(value_type));
                    self.push_step(VerifyAction::Infer, storage, detail);
                    Ok(())
                }
                Some(declared) => {
                    if self.check_compatibility(declared, value_type)? {
                        Ok(())
                    } else {
                        Err(self.error(
                            Category::Type,
                            assignment,
                            format!(
                                "cannot assign `{}` to `{}` of type `{}`",
                                self.ir.label(value_type),
                                self.ir.label(slot),
                                self.ir.label(declared)
                            ),
                        ))
                    }
                }
            },
            NodeKind::Placeholder(_) if self.is_open_placeholder(storage) => {
                let ty = self.derive_child(storage, Derivation::Type)?;
                if self.check_compatibility(ty, value_type)? {
                    Ok(())
                } else {
                    Err(self.error(
                        Category::Type,
                        assignment,
                        format!(
                            "cannot assign `{}` to `{}`",
                            self.ir.label(value_type),
                            self.ir.label(slot)
                        ),
                    ))
                }
            }
            other => Err(self.error(
                Category::Type,
                slot,
                format!(
                    "{} `{}` is not assignable",
                    other.as_str(),
                    self.ir.label(slot)
                ),
            )),
        }
    }

    fn verify_call(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Call(call) = self.ir.kind(id) else {
            return Ok(());
        };
        let (callee, args) = (call.callee, call.args.clone());
        self.resolve_call_site(id, callee, &args).map_err(|err| {
            err.at_if_unset(self.location(id))
                .with_label(self.location(id), "while verifying this call")
                .with_label(
                    self.location(callee),
                    format!("callee `{}`", self.ir.label(callee)),
                )
        })
    }

    fn resolve_call_site(&mut self, id: NodeId, callee: NodeId, args: &[NodeId]) -> Result<(), Diagnostic> {
        self.verify_node(callee)?;
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            self.verify_node(*arg)?;
            arg_types.push(self.resolve_type(*arg)?);
        }
        let span = self.ir.span(id);
        let call_type = self.ir.function_type(arg_types, None, span);
        self.ir.node_mut(call_type).state = VerifyState::Verified;

        let resolution = self.resolve_call_on(callee, call_type)?;
        if let NodeKind::Call(call) = self.ir.kind_mut(id) {
            call.resolution = Some(resolution);
        }
        self.call_return_type(id).map(|_| ())
    }

    fn verify_return(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Return(ret) = self.ir.kind(id) else {
            return Ok(());
        };
        let value = ret.value;
        let function = match self.scopes.current_hard_scope() {
            Some(scope) if matches!(self.ir.kind(scope), NodeKind::Function(_)) => scope,
            _ => {
                return Err(self.error(
                    Category::Syntax,
                    id,
                    "`return` outside of a function".to_string(),
                ));
            }
        };
        if let Some(class) = self.function_data(function)?.constructor_of {
            return Err(self.error(
                Category::Syntax,
                id,
                format!(
                    "`return` is not allowed in a constructor of `{}`",
                    self.ir.label(class)
                ),
            ));
        }
        let signature = self.signature_of(function)?;
        let established = self.function_type_data(signature).and_then(|ty| ty.ret);
        let name = self.ir.label(function);

        match (value, established) {
            (Some(value), None) => {
                self.verify_node(value)?;
                let ty = self.resolve_type(value)?;
                if let NodeKind::FunctionType(signature) = self.ir.kind_mut(signature) {
                    signature.ret = Some(ty);
                }
            }
            (Some(value), Some(expected)) => {
                self.verify_node(value)?;
                let ty = self.resolve_type(value)?;
                if !self.check_compatibility(expected, ty)? {
                    return Err(self.error(
                        Category::Type,
                        id,
                        format!(
                            "`{name}` returns `{}`, but this returns `{}`",
                            self.ir.label(expected),
                            self.ir.label(ty)
                        ),
                    ));
                }
            }
            (None, Some(expected)) => {
                let expected = self.resolve_value(expected)?;
                if !matches!(self.ir.kind(expected), NodeKind::Void) {
                    return Err(self.error(
                        Category::Type,
                        id,
                        format!(
                            "bare `return` in `{name}`, which returns `{}`",
                            self.ir.label(expected)
                        ),
                    ));
                }
            }
            (None, None) => {}
        }

        if let NodeKind::Return(ret) = self.ir.kind_mut(id) {
            ret.function = Some(function);
        }
        self.mark_returns();
        Ok(())
    }

    /// Verify a whole if/elif/else chain starting at `head`.
    ///
    /// The chain definitely returns only if it ends in `else` and every arm
    /// definitely returns.
    fn verify_branch(&mut self, head: NodeId) -> Result<(), Diagnostic> {
        let boolean = self.builtin_type("Bool");
        let forward = self.soft_scope_forward();
        let mut all_return = true;
        let mut might_return = false;
        let mut has_else = false;
        let mut current = Some(head);

        while let Some(arm) = current {
            let NodeKind::Branch(branch) = self.ir.kind(arm) else {
                return Err(self.internal(arm, "branch chain continues with a non-branch".to_string()));
            };
            let (condition, body, next) = (branch.condition, branch.body.clone(), branch.next);
            if arm != head {
                self.ir.node_mut(arm).state = VerifyState::InProgress;
            }

            match condition {
                Some(condition) => {
                    self.verify_node(condition)?;
                    if let Some(boolean) = boolean {
                        let ty = self.resolve_type(condition)?;
                        if !self.check_compatibility(boolean, ty)? {
                            return Err(self.error(
                                Category::Type,
                                condition,
                                format!(
                                    "branch condition has type `{}`, expected `Bool`",
                                    self.ir.label(ty)
                                ),
                            ));
                        }
                    }
                }
                None => has_else = true,
            }

            let ((), flow) = self.with_scope(arm, FrameKind::Soft, |v| {
                for instruction in body {
                    v.verify_node(instruction)?;
                }
                Ok(())
            })?;
            all_return &= flow.definitely_returns;
            might_return |= flow.might_return;
            self.record_stats(arm, forward, flow);
            if arm != head {
                self.ir.node_mut(arm).state = VerifyState::Verified;
            }
            current = next;
        }

        self.absorb_flow(Flow {
            definitely_returns: all_return && has_else,
            might_return,
        });
        Ok(())
    }

    fn verify_loop(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Loop(lp) = self.ir.kind(id) else {
            return Ok(());
        };
        let body = lp.body.clone();
        let forward = self.soft_scope_forward();
        let ((), body_flow) = self.with_scope(id, FrameKind::Soft, |v| {
            for instruction in body {
                v.verify_node(instruction)?;
            }
            Ok(())
        })?;
        // A `break` or a zero-iteration run can leave the loop without
        // reaching a `return`, so only the possibility carries outward.
        let flow = Flow {
            definitely_returns: false,
            might_return: body_flow.might_return,
        };
        self.record_stats(id, forward, flow);
        self.absorb_flow(flow);
        Ok(())
    }

    fn verify_break(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let Some(target) = self.enclosing_loop() else {
            return Err(self.error(
                Category::Syntax,
                id,
                "`break` outside of a loop".to_string(),
            ));
        };
        if let NodeKind::Break(brk) = self.ir.kind_mut(id) {
            brk.target = Some(target);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Proxies
    // -----------------------------------------------------------------------

    fn verify_reference(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let resolved = match self.ir.kind(id) {
            NodeKind::Reference(reference) => reference.resolved,
            _ => None,
        };
        let target = match resolved {
            Some(target) => target,
            None => {
                let Some(name) = self.ir.name(id).map(str::to_string) else {
                    return Err(self.internal(id, "reference without a name".to_string()));
                };
                let target = self.resolve_name(id, &name)?;
                if let NodeKind::Reference(reference) = self.ir.kind_mut(id) {
                    reference.resolved = Some(target);
                }
                target
            }
        };
        self.verify_node(target)
    }

    fn verify_attribute(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Attribute(attribute) = self.ir.kind(id) else {
            return Ok(());
        };
        let object = attribute.object;
        let name = self.ir.name(id).unwrap_or_default().to_string();
        self.verify_node(object)?;

        let value = self.resolve_value(object)?;
        let resolved = match self.ir.kind(value) {
            NodeKind::Module(_) | NodeKind::Class(_) => self.member(id, value, &name)?,
            _ => {
                let ty = self.resolve_type(value)?;
                let ty = self.resolve_value(ty)?;
                if self.ir.instance_context(ty).is_some() {
                    self.member(id, ty, &name)?
                } else if self.is_open_placeholder(ty) {
                    self.derive_child(ty, Derivation::Attribute(name.clone()))?
                } else {
                    return Err(self.error(
                        Category::Type,
                        id,
                        format!(
                            "values of type `{}` have no attribute `{name}`",
                            self.ir.label(ty)
                        ),
                    ));
                }
            }
        };
        if let NodeKind::Attribute(attribute) = self.ir.kind_mut(id) {
            attribute.resolved = Some(resolved);
        }
        self.verify_node(resolved)
    }

    /// Named member of a module, or instance member of a class.
    fn member(&self, site: NodeId, owner: NodeId, name: &str) -> Result<NodeId, Diagnostic> {
        self.ir
            .instance_context(owner)
            .and_then(|context| self.ir.context(context).get(name))
            .ok_or_else(|| {
                self.error(
                    Category::MissingReference,
                    site,
                    format!(
                        "{} `{}` has no attribute `{name}`",
                        self.ir.kind(owner).as_str(),
                        self.ir.label(owner)
                    ),
                )
            })
    }

    fn verify_import(&mut self, id: NodeId) -> Result<(), Diagnostic> {
        let NodeKind::Import(import) = self.ir.kind(id) else {
            return Ok(());
        };
        let path = import.path.clone();
        let Some((head, rest)) = path.split_first() else {
            return Err(self.internal(id, "import with an empty path".to_string()));
        };

        let hits = self.resolve_identifier(head, Some(id))?;
        let mut current = match hits.as_slice() {
            [hit] => {
                let hit = *hit;
                self.verify_node(hit)?;
                hit
            }
            [] => self.load_import(id, head, &path)?,
            _ => {
                return Err(self.error(
                    Category::Ambiguity,
                    id,
                    format!("import head `{head}` matches {} bindings", hits.len()),
                ));
            }
        };

        for segment in rest {
            let owner = self.resolve_value(current)?;
            current = self.member(id, owner, segment)?;
            self.verify_node(current)?;
        }

        if let NodeKind::Import(import) = self.ir.kind_mut(id) {
            import.resolved = Some(current);
        }
        Ok(())
    }

    /// Import fallback: build the module from a source file next to the
    /// importing module.
    fn load_import(&mut self, id: NodeId, head: &str, path: &[String]) -> Result<NodeId, Diagnostic> {
        let importer = self
            .scopes
            .current_hard_scope()
            .and_then(|scope| self.ir.enclosing_module(scope))
            .and_then(|module| match self.ir.kind(module) {
                NodeKind::Module(module) => module.path.clone(),
                _ => None,
            });
        let site = self.location(id);
        let loaded = match self.loader.as_deref_mut() {
            Some(loader) => loader
                .load(self.ir, importer.as_deref(), head)
                .map_err(|err| err.with_label(site, "while loading import"))?,
            None => None,
        };
        let Some(module) = loaded else {
            return Err(self
                .error(
                    Category::Import,
                    id,
                    format!(
                        "cannot resolve import `{}`: no binding or source file named `{head}`",
                        path.join(".")
                    ),
                )
                .with_help(Category::Import.example_fix()));
        };
        let detail = format!("`{head}` loaded from source");
        self.push_step(VerifyAction::Import, module, detail);
        self.verify_node(module)?;
        Ok(module)
    }
}

/// Closed-over links a function captured, in capture order.
pub fn captures(ir: &Ir, function: NodeId) -> Vec<NodeId> {
    match ir.kind(function) {
        NodeKind::Function(data) => ir
            .context(data.closed_context)
            .children()
            .filter(|link| {
                matches!(
                    ir.kind(*link),
                    NodeKind::Link(link) if link.kind == LinkKind::Closed
                )
            })
            .collect(),
        _ => Vec::new(),
    }
}
