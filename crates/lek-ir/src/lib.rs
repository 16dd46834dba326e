//! The lekvar intermediate representation.
//!
//! A parser produces a tree of loosely-typed nodes; the verifier in
//! `lek-verify` links and types it in place. Nodes live in an arena ([`Ir`])
//! and refer to each other by [`NodeId`]. Named children are owned by a
//! [`Context`]; a child only keeps a non-owning [`ContextId`] back-reference
//! (`bound_context`) used to find its lexical parent scope.
//!
//! Backend-private data never lives on nodes. Backends walk the verified
//! tree with [`walk::IrVisitor`] and keep their results in a
//! [`walk::SideTable`].

pub mod builder;
pub mod walk;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Source spans
// ---------------------------------------------------------------------------

/// Identifies a source file in the compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for compiler-generated nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }

    pub fn is_synthetic(self) -> bool {
        self.file.0 == u32::MAX
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Index of a node in the [`Ir`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Index of a context in the [`Ir`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContextId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Node payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

/// Top-level scope: named children plus the instructions run on load.
#[derive(Debug, Clone)]
pub struct Module {
    pub context: ContextId,
    pub main: Vec<NodeId>,
    /// Source file this module was parsed from. Used by import fallback.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Function {
    /// Argument variables, in order. Also bound into `context`.
    pub args: Vec<NodeId>,
    pub body: Vec<NodeId>,
    /// Declared return type expression.
    pub return_type: Option<NodeId>,
    /// Locals, arguments, and nested definitions.
    pub context: ContextId,
    /// Closed-over links, one per captured outer binding.
    pub closed_context: ContextId,
    /// Set by verification: the function's `FunctionType`.
    pub signature: Option<NodeId>,
    /// Synthetic `self` argument for methods and constructors (fake-linked).
    pub self_arg: Option<NodeId>,
    /// Owning class when this overload is a constructor.
    pub constructor_of: Option<NodeId>,
    /// Body-less builtin; exempt from return-path checks.
    pub intrinsic: bool,
    /// True if any argument lacked a declared type.
    pub dependent: bool,
    /// Provisional return type handed out to recursive callers.
    pub forward_return: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    /// Argument type expressions.
    pub args: Vec<NodeId>,
    /// Return type expression; `None` means nothing is promised.
    pub ret: Option<NodeId>,
    /// The function this is the signature of, if any.
    pub owner: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Method {
    pub overloads: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Class {
    /// Constructor method; each overload is rewritten into a constructor.
    pub constructor: Option<NodeId>,
    /// Attributes and methods visible on instances.
    pub instance_context: ContextId,
}

#[derive(Debug, Clone, Default)]
pub struct Variable {
    /// Declared type expression.
    pub declared: Option<NodeId>,
    /// Declared or inferred type, set by verification.
    pub ty: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: Lit,
    /// Type expression of the constant.
    pub ty: NodeId,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: NodeId,
    pub value: NodeId,
}

/// The verifier's record of what a call site resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResolution {
    /// Resolved callee: a function, a `ForwardTarget` link over one, a
    /// switch placeholder, or a callable value.
    pub function: NodeId,
    /// FunctionType built from the verified argument types.
    pub call_type: NodeId,
    /// Placeholder bindings that apply at this call site.
    pub targets: Vec<(NodeId, NodeId)>,
    /// Class being instantiated, for constructor calls.
    pub constructs: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub callee: NodeId,
    pub args: Vec<NodeId>,
    pub resolution: Option<CallResolution>,
}

#[derive(Debug, Clone, Default)]
pub struct Return {
    pub value: Option<NodeId>,
    /// Enclosing function, set by verification.
    pub function: Option<NodeId>,
}

/// One arm of an if/elif/else chain. A missing condition marks `else`.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    pub condition: Option<NodeId>,
    pub body: Vec<NodeId>,
    pub next: Option<NodeId>,
    pub local: Option<ContextId>,
}

#[derive(Debug, Clone, Default)]
pub struct Loop {
    pub body: Vec<NodeId>,
    pub local: Option<ContextId>,
}

#[derive(Debug, Clone, Default)]
pub struct Break {
    /// Enclosing loop, set by verification.
    pub target: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Reference {
    pub resolved: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub object: NodeId,
    pub resolved: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// Named alias bound into a context.
    Bound,
    /// A closure's capture of a non-static outer binding.
    Closed,
    /// A value seen through a set of placeholder bindings.
    ForwardTarget(Vec<(NodeId, NodeId)>),
}

/// Transparent proxy: every query is forwarded to `value`.
#[derive(Debug, Clone)]
pub struct Link {
    pub kind: LinkKind,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: Vec<String>,
    pub resolved: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    /// Type of an argument declared without one.
    Dependent,
    /// Conjured from another placeholder, or a provisional return type.
    Forward,
    /// Closed list of candidates chosen by a determiner.
    Switch,
}

/// How a cached child placeholder was derived from its parent. Targeting the
/// parent at a concrete value retargets each child at the same derivation of
/// that value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// `resolveType()` of the parent.
    Type,
    /// Instance attribute of the parent type.
    Attribute(String),
    /// Function resolved by calling the parent value with these argument types.
    Call(Vec<NodeId>),
    /// Function type resolved by calling an instance of the parent type.
    InstanceCall(Vec<NodeId>),
    /// Return type of the parent function.
    Return,
    /// A deferred overload switch registered on the parent.
    Switch,
}

/// Candidates of a switch placeholder and the call shape that decides them.
#[derive(Debug, Clone)]
pub struct SwitchCandidates {
    pub candidates: Vec<NodeId>,
    pub call_type: NodeId,
}

#[derive(Debug, Clone)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    /// Scope in which the placeholder is still mutable.
    pub scope: NodeId,
    /// Alternative sets of compatible types observed while unlocked.
    pub evidence: Vec<Vec<NodeId>>,
    /// Memoized derived children.
    pub derived: Vec<(Derivation, NodeId)>,
    /// Permanent resolution.
    pub target: Option<NodeId>,
    pub switch: Option<SwitchCandidates>,
}

impl Placeholder {
    pub fn new(kind: PlaceholderKind, scope: NodeId) -> Self {
        Self {
            kind,
            scope,
            evidence: Vec::new(),
            derived: Vec::new(),
            target: None,
            switch: None,
        }
    }

    pub fn derived_child(&self, derivation: &Derivation) -> Option<NodeId> {
        self.derived
            .iter()
            .find(|(existing, _)| existing == derivation)
            .map(|(_, child)| *child)
    }
}

/// Closed set of node kinds.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Module(Module),
    Function(Function),
    FunctionType(FunctionType),
    Method(Method),
    Class(Class),
    Variable(Variable),
    Literal(Literal),
    /// Nominal builtin type; its name is the node name.
    Builtin,
    /// Unit type. Compatible with everything.
    Void,
    Assignment(Assignment),
    Call(Call),
    Return(Return),
    Branch(Branch),
    Loop(Loop),
    Break(Break),
    Comment(String),
    Reference(Reference),
    Attribute(Attribute),
    Link(Link),
    Import(Import),
    Placeholder(Placeholder),
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module(_) => "module",
            NodeKind::Function(_) => "function",
            NodeKind::FunctionType(_) => "function type",
            NodeKind::Method(_) => "method",
            NodeKind::Class(_) => "class",
            NodeKind::Variable(_) => "variable",
            NodeKind::Literal(_) => "literal",
            NodeKind::Builtin => "builtin type",
            NodeKind::Void => "void type",
            NodeKind::Assignment(_) => "assignment",
            NodeKind::Call(_) => "call",
            NodeKind::Return(_) => "return",
            NodeKind::Branch(_) => "branch",
            NodeKind::Loop(_) => "loop",
            NodeKind::Break(_) => "break",
            NodeKind::Comment(_) => "comment",
            NodeKind::Reference(_) => "reference",
            NodeKind::Attribute(_) => "attribute",
            NodeKind::Link(_) => "link",
            NodeKind::Import(_) => "import",
            NodeKind::Placeholder(_) => "placeholder",
        }
    }

    /// Nodes whose value is a type.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::Module(_)
                | NodeKind::FunctionType(_)
                | NodeKind::Class(_)
                | NodeKind::Builtin
                | NodeKind::Void
                | NodeKind::Placeholder(_)
        )
    }

    /// Nodes that only make sense as statements.
    pub fn is_instruction(&self) -> bool {
        matches!(
            self,
            NodeKind::Assignment(_)
                | NodeKind::Return(_)
                | NodeKind::Branch(_)
                | NodeKind::Loop(_)
                | NodeKind::Break(_)
                | NodeKind::Comment(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyState {
    #[default]
    Unverified,
    InProgress,
    Verified,
}

/// Computed per-scope facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    /// Resolvable before and independent of any runtime instance.
    pub is_static: bool,
    /// Still a placeholder awaiting resolution, or nested inside one.
    pub forward: bool,
    pub definitely_returns: bool,
    pub might_return: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub span: Span,
    /// Name of a bound object.
    pub name: Option<String>,
    /// Non-owning back-reference to the owning context.
    pub bound_context: Option<ContextId>,
    pub state: VerifyState,
    pub stats: Option<Stats>,
    pub kind: NodeKind,
}

/// Ordered-by-insertion name to node mapping owned by a scope.
#[derive(Debug, Clone)]
pub struct Context {
    pub scope: NodeId,
    children: Vec<(String, NodeId)>,
}

impl Context {
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.children
            .iter()
            .find(|(child_name, _)| child_name == name)
            .map(|(_, id)| *id)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().map(|(_, id)| *id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.children.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Construction errors
// ---------------------------------------------------------------------------

/// A builder call made on a node of the wrong kind. Nothing is modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a {kind} node")]
pub struct BuildError {
    pub action: &'static str,
    pub kind: &'static str,
}

impl BuildError {
    pub(crate) fn new(action: &'static str, found: &NodeKind) -> Self {
        Self {
            action,
            kind: found.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Arena owning every node and context of one verification run.
#[derive(Debug, Clone)]
pub struct Ir {
    nodes: Vec<Node>,
    contexts: Vec<Context>,
    void: NodeId,
}

impl Default for Ir {
    fn default() -> Self {
        Self::new()
    }
}

impl Ir {
    pub fn new() -> Self {
        let mut ir = Self {
            nodes: Vec::new(),
            contexts: Vec::new(),
            void: NodeId(0),
        };
        ir.void = ir.alloc(Span::synthetic(), Some("None".into()), NodeKind::Void);
        ir
    }

    /// The canonical unit type.
    pub fn void(&self) -> NodeId {
        self.void
    }

    pub fn alloc(&mut self, span: Span, name: Option<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            span,
            name,
            bound_context: None,
            state: VerifyState::Unverified,
            stats: None,
            kind,
        });
        id
    }

    pub fn alloc_context(&mut self, scope: NodeId) -> ContextId {
        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(Context {
            scope,
            children: Vec::new(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.node_mut(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    pub fn context(&self, id: ContextId) -> &Context {
        &self.contexts[id.0 as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Bind `child` into `context`, replacing any child of the same name in place.
    pub fn bind(&mut self, context: ContextId, child: NodeId) {
        let name = self.name(child).unwrap_or_default().to_string();
        let children = &mut self.contexts[context.0 as usize].children;
        if let Some(slot) = children.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = child;
        } else {
            children.push((name, child));
        }
        self.fake_bind(context, child);
    }

    /// Link `child` to `context` without listing it among the context's children.
    pub fn fake_bind(&mut self, context: ContextId, child: NodeId) {
        self.node_mut(child).bound_context = Some(context);
        if let NodeKind::Method(method) = self.kind(child) {
            let overloads = method.overloads.clone();
            for overload in overloads {
                self.node_mut(overload).bound_context = Some(context);
            }
        }
    }

    /// Lexical parent scope: the scope owning this node's bound context.
    pub fn parent_scope(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .bound_context
            .map(|context| self.context(context).scope)
    }

    /// Lexical lookup context of a scope node.
    pub fn scope_context(&self, id: NodeId) -> Option<ContextId> {
        match self.kind(id) {
            NodeKind::Module(module) => Some(module.context),
            NodeKind::Function(function) => Some(function.context),
            NodeKind::Branch(branch) => branch.local,
            NodeKind::Loop(lp) => lp.local,
            _ => None,
        }
    }

    /// Context of attributes visible on instances of a type node.
    pub fn instance_context(&self, id: NodeId) -> Option<ContextId> {
        match self.kind(id) {
            NodeKind::Class(class) => Some(class.instance_context),
            NodeKind::Module(module) => Some(module.context),
            _ => None,
        }
    }

    /// Nearest enclosing module, including `id` itself.
    pub fn enclosing_module(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if matches!(self.kind(node), NodeKind::Module(_)) {
                return Some(node);
            }
            current = self.parent_scope(node);
        }
        None
    }

    /// Short human-readable label for diagnostics.
    pub fn label(&self, id: NodeId) -> String {
        let node = self.node(id);
        match (&node.kind, node.name.as_deref()) {
            (NodeKind::FunctionType(ft), _) => {
                let args = ft
                    .args
                    .iter()
                    .map(|arg| self.label(*arg))
                    .collect::<Vec<_>>()
                    .join(", ");
                match ft.ret {
                    Some(ret) => format!("({args}) -> {}", self.label(ret)),
                    None => format!("({args})"),
                }
            }
            (NodeKind::Literal(literal), _) => match &literal.value {
                Lit::Int(value) => value.to_string(),
                Lit::Float(value) => value.to_string(),
                Lit::Bool(value) => value.to_string(),
                Lit::String(value) => format!("{value:?}"),
            },
            (NodeKind::Placeholder(_), Some(name)) => format!("<{name}>"),
            (NodeKind::Attribute(attr), Some(name)) => {
                format!("{}.{name}", self.label(attr.object))
            }
            (_, Some(name)) => name.to_string(),
            (kind, None) => kind.as_str().to_string(),
        }
    }
}
