//! Backend traversal over verified IR.
//!
//! A backend (native emitter, interpreter, pretty printer) implements
//! [`IrVisitor`] with one method per node kind it cares about and keeps any
//! per-node results in a [`SideTable`] instead of on the nodes.

use std::collections::BTreeMap;

use crate::{
    Assignment, Attribute, Branch, Break, Call, Class, Function, FunctionType, Import, Ir, Link,
    Literal, Loop, Method, Module, NodeId, NodeKind, Placeholder, Reference, Return, Variable,
};

/// One arm per node kind. Unhandled kinds fall through to [`IrVisitor::visit_default`].
#[allow(unused_variables)]
pub trait IrVisitor {
    type Output;

    fn visit_default(&mut self, ir: &Ir, id: NodeId) -> Self::Output;

    fn visit_module(&mut self, ir: &Ir, id: NodeId, module: &Module) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_function(&mut self, ir: &Ir, id: NodeId, function: &Function) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_function_type(&mut self, ir: &Ir, id: NodeId, ty: &FunctionType) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_method(&mut self, ir: &Ir, id: NodeId, method: &Method) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_class(&mut self, ir: &Ir, id: NodeId, class: &Class) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_variable(&mut self, ir: &Ir, id: NodeId, variable: &Variable) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_literal(&mut self, ir: &Ir, id: NodeId, literal: &Literal) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_assignment(&mut self, ir: &Ir, id: NodeId, assign: &Assignment) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_call(&mut self, ir: &Ir, id: NodeId, call: &Call) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_return(&mut self, ir: &Ir, id: NodeId, ret: &Return) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_branch(&mut self, ir: &Ir, id: NodeId, branch: &Branch) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_loop(&mut self, ir: &Ir, id: NodeId, lp: &Loop) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_break(&mut self, ir: &Ir, id: NodeId, brk: &Break) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_reference(&mut self, ir: &Ir, id: NodeId, reference: &Reference) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_attribute(&mut self, ir: &Ir, id: NodeId, attribute: &Attribute) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_link(&mut self, ir: &Ir, id: NodeId, link: &Link) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_import(&mut self, ir: &Ir, id: NodeId, import: &Import) -> Self::Output {
        self.visit_default(ir, id)
    }
    fn visit_placeholder(&mut self, ir: &Ir, id: NodeId, placeholder: &Placeholder) -> Self::Output {
        self.visit_default(ir, id)
    }
}

/// Call the visitor arm matching the kind of `id`.
pub fn dispatch<V: IrVisitor>(ir: &Ir, id: NodeId, visitor: &mut V) -> V::Output {
    match ir.kind(id) {
        NodeKind::Module(module) => visitor.visit_module(ir, id, module),
        NodeKind::Function(function) => visitor.visit_function(ir, id, function),
        NodeKind::FunctionType(ty) => visitor.visit_function_type(ir, id, ty),
        NodeKind::Method(method) => visitor.visit_method(ir, id, method),
        NodeKind::Class(class) => visitor.visit_class(ir, id, class),
        NodeKind::Variable(variable) => visitor.visit_variable(ir, id, variable),
        NodeKind::Literal(literal) => visitor.visit_literal(ir, id, literal),
        NodeKind::Assignment(assign) => visitor.visit_assignment(ir, id, assign),
        NodeKind::Call(call) => visitor.visit_call(ir, id, call),
        NodeKind::Return(ret) => visitor.visit_return(ir, id, ret),
        NodeKind::Branch(branch) => visitor.visit_branch(ir, id, branch),
        NodeKind::Loop(lp) => visitor.visit_loop(ir, id, lp),
        NodeKind::Break(brk) => visitor.visit_break(ir, id, brk),
        NodeKind::Reference(reference) => visitor.visit_reference(ir, id, reference),
        NodeKind::Attribute(attribute) => visitor.visit_attribute(ir, id, attribute),
        NodeKind::Link(link) => visitor.visit_link(ir, id, link),
        NodeKind::Import(import) => visitor.visit_import(ir, id, import),
        NodeKind::Placeholder(placeholder) => visitor.visit_placeholder(ir, id, placeholder),
        NodeKind::Builtin | NodeKind::Void | NodeKind::Comment(_) => visitor.visit_default(ir, id),
    }
}

/// Syntactic children of a node, in source order.
///
/// Resolution results (resolved references, call targets) are not children.
pub fn children(ir: &Ir, id: NodeId) -> Vec<NodeId> {
    match ir.kind(id) {
        NodeKind::Module(module) => module
            .main
            .iter()
            .copied()
            .chain(ir.context(module.context).children())
            .collect(),
        NodeKind::Function(function) => {
            let mut out = function.args.clone();
            out.extend(function.return_type);
            out.extend(function.body.iter().copied());
            out.extend(
                ir.context(function.context)
                    .children()
                    .filter(|child| !function.args.contains(child)),
            );
            out
        }
        NodeKind::FunctionType(ty) => ty.args.iter().copied().chain(ty.ret).collect(),
        NodeKind::Method(method) => method.overloads.clone(),
        NodeKind::Class(class) => class
            .constructor
            .into_iter()
            .chain(ir.context(class.instance_context).children())
            .collect(),
        NodeKind::Variable(variable) => variable.declared.into_iter().collect(),
        NodeKind::Literal(literal) => vec![literal.ty],
        NodeKind::Assignment(assign) => vec![assign.target, assign.value],
        NodeKind::Call(call) => std::iter::once(call.callee)
            .chain(call.args.iter().copied())
            .collect(),
        NodeKind::Return(ret) => ret.value.into_iter().collect(),
        NodeKind::Branch(branch) => branch
            .condition
            .into_iter()
            .chain(branch.body.iter().copied())
            .chain(branch.next)
            .collect(),
        NodeKind::Loop(lp) => lp.body.clone(),
        NodeKind::Attribute(attribute) => vec![attribute.object],
        NodeKind::Builtin
        | NodeKind::Void
        | NodeKind::Break(_)
        | NodeKind::Comment(_)
        | NodeKind::Reference(_)
        | NodeKind::Link(_)
        | NodeKind::Import(_)
        | NodeKind::Placeholder(_) => Vec::new(),
    }
}

/// Pre-order walk over syntactic children, visiting each node once.
pub fn preorder(ir: &Ir, root: NodeId) -> Vec<NodeId> {
    let mut seen = std::collections::BTreeSet::new();
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        let mut kids = children(ir, id);
        kids.reverse();
        stack.extend(kids);
    }
    order
}

/// Backend-private data keyed by node.
#[derive(Debug, Clone)]
pub struct SideTable<T> {
    entries: BTreeMap<NodeId, T>,
}

impl<T> Default for SideTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> SideTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, value: T) -> Option<T> {
        self.entries.insert(id, value)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_or_insert_with(&mut self, id: NodeId, make: impl FnOnce() -> T) -> &mut T {
        self.entries.entry(id).or_insert_with(make)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> + '_ {
        self.entries.iter().map(|(id, value)| (*id, value))
    }
}
