//! Construction API used by the parser (and by tests) to build unverified IR.
//!
//! Every constructor allocates one node; scope constructors also allocate
//! their contexts. Linking named children into scopes goes through
//! [`Ir::define`], which maintains the context back-references.

use std::path::PathBuf;

use crate::{
    Assignment, Attribute, Branch, Break, BuildError, Call, Class, ContextId, Function,
    FunctionType, Import, Ir, Link, LinkKind, Lit, Literal, Loop, Method, Module, NodeId, NodeKind,
    Placeholder, PlaceholderKind, Reference, Return, Span, Variable,
};

/// Name under which a class binds its constructor method.
pub const CONSTRUCTOR_NAME: &str = "__init__";

impl Ir {
    // -- Scopes --

    pub fn module(&mut self, name: &str, span: Span) -> NodeId {
        self.module_at(name, None, span)
    }

    /// A module parsed from `path`; imports inside it resolve files relative to it.
    pub fn module_at(&mut self, name: &str, path: Option<PathBuf>, span: Span) -> NodeId {
        let id = self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Module(Module {
                context: ContextId(u32::MAX),
                main: Vec::new(),
                path,
            }),
        );
        let context = self.alloc_context(id);
        if let NodeKind::Module(module) = self.kind_mut(id) {
            module.context = context;
        }
        id
    }

    pub fn module_context(&self, module: NodeId) -> Result<ContextId, BuildError> {
        match self.kind(module) {
            NodeKind::Module(module) => Ok(module.context),
            other => Err(BuildError::new("take the module context of", other)),
        }
    }

    pub fn push_main(&mut self, module: NodeId, instruction: NodeId) {
        if let NodeKind::Module(module) = self.kind_mut(module) {
            module.main.push(instruction);
        }
    }

    /// Function with the given argument variables and optional declared return type.
    pub fn function(
        &mut self,
        name: &str,
        args: Vec<NodeId>,
        return_type: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        let id = self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Function(Function {
                args: args.clone(),
                body: Vec::new(),
                return_type,
                context: ContextId(u32::MAX),
                closed_context: ContextId(u32::MAX),
                signature: None,
                self_arg: None,
                constructor_of: None,
                intrinsic: false,
                dependent: false,
                forward_return: None,
            }),
        );
        let context = self.alloc_context(id);
        let closed_context = self.alloc_context(id);
        if let NodeKind::Function(function) = self.kind_mut(id) {
            function.context = context;
            function.closed_context = closed_context;
        }
        for arg in args {
            self.bind(context, arg);
        }
        id
    }

    /// Body-less builtin function with positional typed arguments.
    pub fn intrinsic(
        &mut self,
        name: &str,
        arg_types: Vec<NodeId>,
        return_type: Option<NodeId>,
        span: Span,
    ) -> NodeId {
        let args = arg_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.variable(&format!("arg{index}"), Some(ty), span))
            .collect();
        let id = self.function(name, args, return_type, span);
        if let NodeKind::Function(function) = self.kind_mut(id) {
            function.intrinsic = true;
        }
        id
    }

    pub fn push_body(&mut self, function: NodeId, instruction: NodeId) {
        if let NodeKind::Function(function) = self.kind_mut(function) {
            function.body.push(instruction);
        }
    }

    pub fn method(&mut self, name: &str, span: Span) -> NodeId {
        self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Method(Method::default()),
        )
    }

    pub fn add_overload(&mut self, method: NodeId, function: NodeId) {
        let context = self.node(method).bound_context;
        if let NodeKind::Method(method) = self.kind_mut(method) {
            method.overloads.push(function);
        }
        if let Some(context) = context {
            self.fake_bind(context, function);
        }
    }

    pub fn class(&mut self, name: &str, span: Span) -> NodeId {
        let id = self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Class(Class {
                constructor: None,
                instance_context: ContextId(u32::MAX),
            }),
        );
        let instance_context = self.alloc_context(id);
        if let NodeKind::Class(class) = self.kind_mut(id) {
            class.instance_context = instance_context;
        }
        id
    }

    /// Add a constructor overload, creating the constructor method on first use.
    pub fn add_constructor(&mut self, class: NodeId, function: NodeId) -> Result<(), BuildError> {
        let (existing, instance_context) = match self.kind(class) {
            NodeKind::Class(class) => (class.constructor, class.instance_context),
            other => return Err(BuildError::new("add a constructor to", other)),
        };
        let method = match existing {
            Some(method) => method,
            None => {
                let span = self.span(class);
                let method = self.method(CONSTRUCTOR_NAME, span);
                self.fake_bind(instance_context, method);
                if let NodeKind::Class(class) = self.kind_mut(class) {
                    class.constructor = Some(method);
                }
                method
            }
        };
        self.add_overload(method, function);
        Ok(())
    }

    /// Bind a named child into the lookup context of a scope.
    ///
    /// Modules and functions bind into their context, classes into their
    /// instance context.
    pub fn define(&mut self, scope: NodeId, child: NodeId) -> Result<(), BuildError> {
        let context = match self.kind(scope) {
            NodeKind::Module(module) => module.context,
            NodeKind::Function(function) => function.context,
            NodeKind::Class(class) => class.instance_context,
            other => return Err(BuildError::new("define children in", other)),
        };
        self.bind(context, child);
        Ok(())
    }

    // -- Values and types --

    pub fn variable(&mut self, name: &str, declared: Option<NodeId>, span: Span) -> NodeId {
        self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Variable(Variable { declared, ty: None }),
        )
    }

    pub fn builtin_type(&mut self, name: &str, span: Span) -> NodeId {
        self.alloc(span, Some(name.to_string()), NodeKind::Builtin)
    }

    pub fn function_type(&mut self, args: Vec<NodeId>, ret: Option<NodeId>, span: Span) -> NodeId {
        self.alloc(
            span,
            None,
            NodeKind::FunctionType(FunctionType {
                args,
                ret,
                owner: None,
            }),
        )
    }

    pub fn literal(&mut self, value: Lit, ty: NodeId, span: Span) -> NodeId {
        self.alloc(span, None, NodeKind::Literal(Literal { value, ty }))
    }

    pub fn reference(&mut self, name: &str, span: Span) -> NodeId {
        self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Reference(Reference::default()),
        )
    }

    pub fn attribute(&mut self, object: NodeId, name: &str, span: Span) -> NodeId {
        self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Attribute(Attribute {
                object,
                resolved: None,
            }),
        )
    }

    pub fn link(&mut self, kind: LinkKind, value: NodeId, span: Span) -> NodeId {
        let name = self.node(value).name.clone();
        self.alloc(span, name, NodeKind::Link(Link { kind, value }))
    }

    pub fn placeholder(
        &mut self,
        kind: PlaceholderKind,
        scope: NodeId,
        name: &str,
        span: Span,
    ) -> NodeId {
        self.alloc(
            span,
            Some(name.to_string()),
            NodeKind::Placeholder(Placeholder::new(kind, scope)),
        )
    }

    // -- Instructions --

    pub fn assign(&mut self, target: NodeId, value: NodeId, span: Span) -> NodeId {
        self.alloc(
            span,
            None,
            NodeKind::Assignment(Assignment { target, value }),
        )
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>, span: Span) -> NodeId {
        self.alloc(
            span,
            None,
            NodeKind::Call(Call {
                callee,
                args,
                resolution: None,
            }),
        )
    }

    pub fn ret(&mut self, value: Option<NodeId>, span: Span) -> NodeId {
        self.alloc(
            span,
            None,
            NodeKind::Return(Return {
                value,
                function: None,
            }),
        )
    }

    /// One arm of a branch chain; `condition: None` is a trailing `else`.
    pub fn branch(&mut self, condition: Option<NodeId>, body: Vec<NodeId>, span: Span) -> NodeId {
        self.alloc(
            span,
            None,
            NodeKind::Branch(Branch {
                condition,
                body,
                next: None,
                local: None,
            }),
        )
    }

    /// Chain `next` after the arm `branch` (elif/else).
    pub fn set_next_branch(&mut self, branch: NodeId, next: NodeId) {
        if let NodeKind::Branch(branch) = self.kind_mut(branch) {
            branch.next = Some(next);
        }
    }

    pub fn loop_(&mut self, body: Vec<NodeId>, span: Span) -> NodeId {
        self.alloc(span, None, NodeKind::Loop(Loop { body, local: None }))
    }

    /// Give a branch arm or loop body its own lookup context.
    pub fn soft_local_context(&mut self, soft_scope: NodeId) -> Result<ContextId, BuildError> {
        match self.kind(soft_scope) {
            NodeKind::Branch(_) | NodeKind::Loop(_) => {}
            other => return Err(BuildError::new("give a local context to", other)),
        }
        let context = self.alloc_context(soft_scope);
        match self.kind_mut(soft_scope) {
            NodeKind::Branch(branch) => branch.local = Some(context),
            NodeKind::Loop(lp) => lp.local = Some(context),
            _ => {}
        }
        Ok(context)
    }

    pub fn brk(&mut self, span: Span) -> NodeId {
        self.alloc(span, None, NodeKind::Break(Break::default()))
    }

    pub fn comment(&mut self, text: &str, span: Span) -> NodeId {
        self.alloc(span, None, NodeKind::Comment(text.to_string()))
    }

    /// `import a.b.c` (bound as `c`) or `import a.b.c as name`.
    pub fn import(&mut self, path: &[&str], alias: Option<&str>, span: Span) -> NodeId {
        let name = alias
            .or_else(|| path.last().copied())
            .unwrap_or_default()
            .to_string();
        self.alloc(
            span,
            Some(name),
            NodeKind::Import(Import {
                path: path.iter().map(|segment| segment.to_string()).collect(),
                resolved: None,
            }),
        )
    }
}
