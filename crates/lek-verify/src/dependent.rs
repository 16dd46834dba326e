//! Dependent and forward placeholders.
//!
//! A placeholder stands for a type or value that is not known while its
//! scope is verified: the type of an untyped argument, an attribute of such
//! a type, the function a call on it resolves to, and so on. Every such
//! derived placeholder is memoized on its parent under a [`Derivation`], so
//! repeated access yields the same node.
//!
//! Targeting binds placeholders to concrete values for the duration of a
//! bracket. Binding a parent cascades to each derived child, which is bound
//! to the same derivation of the parent's value (the attribute of the
//! concrete class, the return type of the concrete function, ...). All
//! bindings pushed inside a bracket are dropped when it exits.

use lek_ir::{Derivation, NodeId, PlaceholderKind};

use crate::trace::VerifyAction;
use crate::{Category, Diagnostic, Verifier};

impl Verifier<'_> {
    /// A placeholder is locked once verification has left its birth scope.
    pub(crate) fn is_locked(&self, placeholder: NodeId) -> bool {
        self.placeholder_data(placeholder)
            .is_some_and(|data| !self.scopes.contains(data.scope))
    }

    /// A placeholder with neither a permanent target nor an active binding.
    pub(crate) fn is_open_placeholder(&self, id: NodeId) -> bool {
        self.placeholder_data(id)
            .is_some_and(|data| data.target.is_none())
            && self.bindings.get(id).is_none()
    }

    /// The child of `parent` derived by `derivation`, conjured on first use.
    ///
    /// A locked placeholder no longer grows attributes: only attributes
    /// conjured while it was open can be looked up.
    pub(crate) fn derive_child(
        &mut self,
        parent: NodeId,
        derivation: Derivation,
    ) -> Result<NodeId, Diagnostic> {
        let Some(data) = self.placeholder_data(parent) else {
            return Err(self.internal(
                parent,
                format!("cannot derive from non-placeholder `{}`", self.ir.label(parent)),
            ));
        };
        if let Some(child) = data.derived_child(&derivation) {
            return Ok(child);
        }
        let scope = data.scope;
        if let Derivation::Attribute(name) = &derivation
            && self.is_locked(parent)
        {
            return Err(self.error(
                Category::MissingReference,
                parent,
                format!(
                    "`{}` has no attribute `{name}` in any of its uses",
                    self.ir.label(parent)
                ),
            ));
        }
        let base = self.ir.name(parent).unwrap_or("_").to_string();
        let name = match &derivation {
            Derivation::Type => format!("{base}.type"),
            Derivation::Attribute(attribute) => format!("{base}.{attribute}"),
            Derivation::Call(_) => format!("{base}.call"),
            Derivation::InstanceCall(_) => format!("{base}.instance_call"),
            Derivation::Return => format!("{base}.return"),
            Derivation::Switch => format!("{base}.switch"),
        };
        let span = self.ir.span(parent);
        let child = self.ir.placeholder(PlaceholderKind::Forward, scope, &name, span);
        if let Some(data) = self.placeholder_mut(parent) {
            data.derived.push((derivation, child));
        }
        Ok(child)
    }

    // -----------------------------------------------------------------------
    // Targeting
    // -----------------------------------------------------------------------

    /// Run `body` with each `(placeholder, value)` pair bound.
    ///
    /// Every pair is bound before any cascade runs, so derivations that
    /// depend on several arguments see all of them. All bindings made here
    /// are released when `body` returns, on success or failure.
    pub fn with_targets<T>(
        &mut self,
        targets: &[(NodeId, NodeId)],
        body: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        if targets.is_empty() {
            return body(self);
        }
        self.with_binding_mark(|v| {
            let mut bound = Vec::new();
            for (placeholder, value) in targets {
                if v.bind_target(*placeholder, *value)? {
                    bound.push(*placeholder);
                }
            }
            for placeholder in bound {
                v.cascade(placeholder, 0)?;
            }
            body(v)
        })
    }

    /// Push one binding. Returns false when nothing had to change: the
    /// placeholder already resolves to `value`, is permanently resolved, or
    /// `value` leads back to it.
    fn bind_target(&mut self, placeholder: NodeId, value: NodeId) -> Result<bool, Diagnostic> {
        let current = self.resolve_value(placeholder)?;
        let value = self.resolve_value(value)?;
        if current == value || value == placeholder {
            return Ok(false);
        }
        let Some(data) = self.placeholder_data(placeholder) else {
            return Ok(false);
        };
        if data.target.is_some() {
            return Ok(false);
        }
        if !self.check_evidence(placeholder, value)? {
            return Err(self.inconsistent_use(placeholder, value));
        }
        self.bindings.push(placeholder, value);
        let detail = format!("bound to `{}`", self.ir.label(value));
        self.push_step(VerifyAction::Target, placeholder, detail);
        Ok(true)
    }

    /// Bind every derived child of a bound placeholder.
    fn cascade(&mut self, placeholder: NodeId, depth: usize) -> Result<(), Diagnostic> {
        if depth > self.options.max_link_depth {
            return Err(self.internal(
                placeholder,
                format!("targeting `{}` does not terminate", self.ir.label(placeholder)),
            ));
        }
        let Some(value) = self.bindings.get(placeholder) else {
            return Ok(());
        };
        let derived = self
            .placeholder_data(placeholder)
            .map(|data| data.derived.clone())
            .unwrap_or_default();
        for (derivation, child) in derived {
            let target = self.apply_derivation(&derivation, child, value)?;
            if self.bind_target(child, target)? {
                self.cascade(child, depth + 1)?;
            }
        }
        Ok(())
    }

    /// The part of `value` that `child` mirrors.
    fn apply_derivation(
        &mut self,
        derivation: &Derivation,
        child: NodeId,
        value: NodeId,
    ) -> Result<NodeId, Diagnostic> {
        match derivation {
            Derivation::Type => self.resolve_type(value),
            Derivation::Attribute(name) => self.attribute_of(value, name, child),
            Derivation::Call(args) => {
                let call_type = self.derived_call_type(args, child);
                Ok(self.resolve_call_on(value, call_type)?.function)
            }
            Derivation::InstanceCall(args) => {
                let call_type = self.derived_call_type(args, child);
                Ok(self.resolve_instance_call(child, value, call_type)?.function)
            }
            Derivation::Return => self.function_return_type(value),
            Derivation::Switch => self.choose_switch(child),
        }
    }

    fn derived_call_type(&mut self, args: &[NodeId], child: NodeId) -> NodeId {
        let span = self.ir.span(child);
        self.ir.function_type(args.to_vec(), None, span)
    }

    /// Attribute `name` of a concrete value, for a conjured attribute child.
    fn attribute_of(&mut self, value: NodeId, name: &str, child: NodeId) -> Result<NodeId, Diagnostic> {
        let value = self.resolve_value(value)?;
        if let Some(context) = self.ir.instance_context(value) {
            let member = self.ir.context(context).get(name).ok_or_else(|| {
                self.error(
                    Category::Dependency,
                    child,
                    format!("`{}` has no attribute `{name}`", self.ir.label(value)),
                )
                .with_label(
                    self.location(value),
                    format!("`{}` defined here", self.ir.label(value)),
                )
                .with_help(Category::Dependency.example_fix())
            })?;
            self.verify_node(member)?;
            return Ok(member);
        }
        if self.is_open_placeholder(value) {
            return self.derive_child(value, Derivation::Attribute(name.to_string()));
        }
        Err(self
            .error(
                Category::Dependency,
                child,
                format!(
                    "values of type `{}` have no attribute `{name}`",
                    self.ir.label(value)
                ),
            )
            .with_help(Category::Dependency.example_fix()))
    }

    /// First candidate of a switch placeholder accepting its call shape
    /// under the current bindings.
    fn choose_switch(&mut self, switch: NodeId) -> Result<NodeId, Diagnostic> {
        let Some(candidates) = self.placeholder_data(switch).and_then(|data| data.switch.clone())
        else {
            return Err(self.internal(switch, "switch placeholder without candidates".to_string()));
        };
        let call_type = self.concretize(candidates.call_type)?;
        for candidate in candidates.candidates {
            let signature = self.signature_of(candidate)?;
            if self.speculate(|v| v.check_compatibility(signature, call_type))? {
                let detail = format!("chosen for `{}`", self.ir.label(call_type));
                self.push_step(VerifyAction::Overload, candidate, detail);
                return Ok(self.function_resolution(candidate, call_type, None)?.function);
            }
        }
        Err(self.error(
            Category::Type,
            switch,
            format!(
                "no overload of `{}` accepts `{}`",
                self.ir.label(switch),
                self.ir.label(call_type)
            ),
        ))
    }

    fn inconsistent_use(&self, placeholder: NodeId, value: NodeId) -> Diagnostic {
        let mut diag = self.error(
            Category::Type,
            placeholder,
            format!(
                "`{}` is not compatible with how `{}` is used",
                self.ir.label(value),
                self.ir.label(placeholder)
            ),
        );
        if let Some(data) = self.placeholder_data(placeholder) {
            for set in &data.evidence {
                let uses = set
                    .iter()
                    .map(|ty| format!("`{}`", self.ir.label(*ty)))
                    .collect::<Vec<_>>()
                    .join(" or ");
                diag = diag.with_label(
                    self.location(placeholder),
                    format!("used as {uses}"),
                );
            }
        }
        diag
    }

    // -----------------------------------------------------------------------
    // Permanent resolution
    // -----------------------------------------------------------------------

    /// Provisional return type handed to calls that recurse into `function`
    /// before any `return` established its type.
    pub(crate) fn forward_return(&mut self, function: NodeId) -> Result<NodeId, Diagnostic> {
        if let Some(existing) = self.function_data(function)?.forward_return {
            return Ok(existing);
        }
        let name = format!("{}.return", self.ir.label(function));
        let span = self.ir.span(function);
        let placeholder = self
            .ir
            .placeholder(PlaceholderKind::Forward, function, &name, span);
        if let Some(data) = self.function_mut(function) {
            data.forward_return = Some(placeholder);
        }
        Ok(placeholder)
    }

    /// Resolve the forward return placeholder of a finished function to the
    /// return type it established, or to void.
    pub(crate) fn finish_forward_return(&mut self, function: NodeId) -> Result<(), Diagnostic> {
        let Some(forward) = self.function_data(function)?.forward_return else {
            return Ok(());
        };
        let signature = self.signature_of(function)?;
        let established = match self.function_type_data(signature).and_then(|ty| ty.ret) {
            Some(ret) => self.resolve_value(ret)?,
            None => self.ir.void(),
        };
        // Every return went through the recursion: the only concrete type
        // is whatever a later return was checked against.
        let target = if established == forward {
            self.placeholder_data(forward)
                .and_then(|data| data.evidence.iter().find(|set| set.len() == 1))
                .map_or(self.ir.void(), |set| set[0])
        } else {
            established
        };
        if !self.check_evidence(forward, target)? {
            return Err(self
                .inconsistent_use(forward, target)
                .with_label(
                    self.location(function),
                    format!("while resolving recursive calls to `{}`", self.ir.label(function)),
                ));
        }
        self.settle(forward, target, 0)
    }

    /// Give a placeholder and its derived children permanent targets.
    fn settle(&mut self, placeholder: NodeId, value: NodeId, depth: usize) -> Result<(), Diagnostic> {
        if depth > self.options.max_link_depth {
            return Err(self.internal(
                placeholder,
                format!("resolving `{}` does not terminate", self.ir.label(placeholder)),
            ));
        }
        let value = self.resolve_value(value)?;
        let value = if value == placeholder { self.ir.void() } else { value };
        let Some(data) = self.placeholder_mut(placeholder) else {
            return Ok(());
        };
        if data.target.is_some() {
            return Ok(());
        }
        data.target = Some(value);
        let derived = data.derived.clone();
        let detail = format!("resolved to `{}`", self.ir.label(value));
        self.push_step(VerifyAction::Target, placeholder, detail);
        for (derivation, child) in derived {
            let target = self.apply_derivation(&derivation, child, value)?;
            self.settle(child, target, depth + 1)?;
        }
        Ok(())
    }
}

