//! Verification of hand-built IR.
//!
//! Each test builds a small program against a fixture builtins module and
//! checks what the verifier linked, inferred, or rejected.

use std::path::Path;

use lek_ir::{FileId, Ir, LinkKind, Lit, NodeId, NodeKind, PlaceholderKind, Span};

use crate::{Category, Diagnostic, SourceLoader, SourceLocation, Verifier, captures};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn s() -> Span {
    Span::new(FileId(0), 0, 1)
}

struct Fixture {
    ir: Ir,
    builtins: NodeId,
    module: NodeId,
    int: NodeId,
    string: NodeId,
    boolean: NodeId,
}

impl Fixture {
    /// Builtins: `Int64`, `String`, `Bool`, `None`, `add` and `print`
    /// overloaded over `Int64`/`String`, and `lt(Int64, Int64) -> Bool`.
    fn new() -> Self {
        let mut ir = Ir::new();
        let builtins = ir.module("builtins", s());
        let int = ir.builtin_type("Int64", s());
        let string = ir.builtin_type("String", s());
        let boolean = ir.builtin_type("Bool", s());
        for ty in [int, string, boolean] {
            ir.define(builtins, ty).unwrap();
        }
        let none = ir.void();
        ir.define(builtins, none).unwrap();

        let add = ir.method("add", s());
        ir.define(builtins, add).unwrap();
        for ty in [int, string] {
            let overload = ir.intrinsic("add", vec![ty, ty], Some(ty), s());
            ir.add_overload(add, overload);
        }
        let print = ir.method("print", s());
        ir.define(builtins, print).unwrap();
        for ty in [int, string] {
            let overload = ir.intrinsic("print", vec![ty], None, s());
            ir.add_overload(print, overload);
        }
        let lt = ir.intrinsic("lt", vec![int, int], Some(boolean), s());
        ir.define(builtins, lt).unwrap();

        let module = ir.module("main", s());
        Self {
            ir,
            builtins,
            module,
            int,
            string,
            boolean,
        }
    }

    fn verifier(&mut self) -> Verifier<'_> {
        Verifier::new(&mut self.ir).with_builtins(self.builtins)
    }

    fn verify(&mut self) -> Result<(), Diagnostic> {
        let module = self.module;
        self.verifier().verify(module)
    }

    fn int_lit(&mut self, value: i64) -> NodeId {
        self.ir.literal(Lit::Int(value), self.int, s())
    }

    fn str_lit(&mut self, value: &str) -> NodeId {
        self.ir.literal(Lit::String(value.to_string()), self.string, s())
    }

    fn var(&mut self, name: &str) -> NodeId {
        self.ir.reference(name, s())
    }

    fn call(&mut self, callee: &str, args: Vec<NodeId>) -> NodeId {
        let callee = self.ir.reference(callee, s());
        self.ir.call(callee, args, s())
    }

    fn assign(&mut self, name: &str, value: NodeId) -> NodeId {
        let target = self.ir.reference(name, s());
        self.ir.assign(target, value, s())
    }

    fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.ir.ret(value, s())
    }

    fn main(&mut self, instruction: NodeId) {
        self.ir.push_main(self.module, instruction);
    }

    /// `def name(args) -> ret` with `body`, defined in `scope`.
    fn function(
        &mut self,
        scope: NodeId,
        name: &str,
        args: &[(&str, Option<NodeId>)],
        ret: Option<NodeId>,
        body: Vec<NodeId>,
    ) -> NodeId {
        let args = args
            .iter()
            .map(|(arg, ty)| self.ir.variable(arg, *ty, s()))
            .collect();
        let function = self.ir.function(name, args, ret, s());
        for instruction in body {
            self.ir.push_body(function, instruction);
        }
        self.ir.define(scope, function).unwrap();
        function
    }

    fn global_type(&self, name: &str) -> Option<NodeId> {
        let context = self.ir.module_context(self.module).unwrap();
        let id = self.ir.context(context).get(name)?;
        match self.ir.kind(id) {
            NodeKind::Variable(variable) => variable.ty,
            _ => None,
        }
    }

    fn arg_placeholder(&self, function: NodeId, index: usize) -> NodeId {
        let NodeKind::Function(data) = self.ir.kind(function) else {
            panic!("expected function");
        };
        let NodeKind::Variable(arg) = self.ir.kind(data.args[index]) else {
            panic!("expected argument variable");
        };
        arg.ty.expect("argument type")
    }
}

fn label_count(diag: &Diagnostic, needle: &str) -> usize {
    diag.labels
        .iter()
        .filter(|label| label.message.contains(needle))
        .count()
}

// ---------------------------------------------------------------------------
// Calls and inference
// ---------------------------------------------------------------------------

#[test]
fn call_to_typed_function_has_declared_return_type() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let (a, b) = (fx.var("a"), fx.var("b"));
    let inner = fx.call("add", vec![a, b]);
    let ret = fx.ret(Some(inner));
    let sum = fx.function(
        module,
        "sum",
        &[("a", Some(int)), ("b", Some(int))],
        Some(int),
        vec![ret],
    );
    let args = vec![fx.int_lit(1), fx.int_lit(2)];
    let call = fx.call("sum", args);
    let assign = fx.assign("total", call);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), int);
    assert_eq!(verifier.resolve_call(call).unwrap().function, sum);
    assert_eq!(verifier.scope_depth(), 0);
    assert_eq!(fx.global_type("total"), Some(int));
}

#[test]
fn function_without_return_returns_void() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let void = fx.ir.void();
    let noop = fx.function(module, "noop", &[], None, vec![]);
    let call = fx.call("noop", vec![]);
    let assign = fx.assign("nothing", call);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), void);
    let stats = verifier.stats(noop).expect("function stats");
    assert!(!stats.definitely_returns);
    assert!(stats.is_static);
}

#[test]
fn declared_return_type_requires_return_on_every_path() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    fx.function(module, "answer", &[], Some(int), vec![]);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("all code paths must return"), "{diag}");
}

#[test]
fn unbound_name_is_missing_reference() {
    let mut fx = Fixture::new();
    let x = fx.var("x");
    let assign = fx.assign("y", x);
    fx.main(assign);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::MissingReference);
    assert!(diag.message.contains("`x`"));
}

#[test]
fn assignment_to_fresh_name_infers_variable() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let one = fx.int_lit(1);
    let assign = fx.assign("y", one);
    fx.main(assign);

    fx.verify().unwrap();
    let context = fx.ir.module_context(module).unwrap();
    let y = fx.ir.context(context).get("y").expect("inferred variable");
    assert_eq!(fx.ir.parent_scope(y), Some(module));
    assert_eq!(fx.global_type("y"), Some(int));
}

#[test]
fn reassignment_checks_declared_type() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let count = fx.ir.variable("count", Some(int), s());
    fx.ir.define(module, count).unwrap();
    let text = fx.str_lit("many");
    let assign = fx.assign("count", text);
    fx.main(assign);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("cannot assign `String`"), "{diag}");
}

#[test]
fn name_bound_in_module_and_builtins_is_ambiguous() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let helper = fx.ir.intrinsic("helper", vec![], None, s());
    fx.ir.define(fx.builtins, helper).unwrap();
    fx.function(module, "helper", &[], None, vec![]);
    let call = fx.call("helper", vec![]);
    fx.main(call);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Ambiguity);
    assert_eq!(label_count(&diag, "candidate defined here"), 2, "{diag}");
}

#[test]
fn ambiguity_labels_point_at_each_definition() {
    let mut fx = Fixture::new();
    let (module, builtins) = (fx.module, fx.builtins);
    let prelude_span = Span::new(FileId(1), 10, 16);
    let app_span = Span::new(FileId(2), 20, 26);
    let prelude_helper = fx.ir.function("helper", vec![], None, prelude_span);
    fx.ir.define(builtins, prelude_helper).unwrap();
    let app_helper = fx.ir.function("helper", vec![], None, app_span);
    fx.ir.define(module, app_helper).unwrap();
    let call = fx.call("helper", vec![]);
    fx.function(module, "caller", &[], None, vec![call]);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Ambiguity);
    let mut candidates: Vec<SourceLocation> = diag
        .labels
        .iter()
        .filter(|label| label.message.contains("candidate defined here"))
        .map(|label| label.location)
        .collect();
    candidates.sort_by_key(|location| location.file_id);
    assert_eq!(
        candidates,
        vec![
            SourceLocation { file_id: 1, start: 10, end: 16 },
            SourceLocation { file_id: 2, start: 20, end: 26 },
        ],
        "{diag}"
    );
    assert_eq!(label_count(&diag, "while verifying function `caller`"), 1, "{diag}");
}

#[test]
fn variable_declared_with_function_is_rejected() {
    let mut fx = Fixture::new();
    let module = fx.module;
    fx.function(module, "f", &[], None, vec![]);
    let declared = fx.var("f");
    let v = fx.ir.variable("v", Some(declared), s());
    fx.ir.define(module, v).unwrap();

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("which is not a type"), "{diag}");
}

// ---------------------------------------------------------------------------
// Overloads
// ---------------------------------------------------------------------------

#[test]
fn overload_selected_by_argument_types() {
    let mut fx = Fixture::new();
    let (module, string) = (fx.module, fx.string);
    let args = vec![fx.str_lit("a"), fx.str_lit("b")];
    let call = fx.call("add", args);
    let assign = fx.assign("joined", call);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), string);
}

#[test]
fn no_matching_overload_lists_candidates() {
    let mut fx = Fixture::new();
    let args = vec![fx.int_lit(1), fx.str_lit("s")];
    let call = fx.call("add", args);
    fx.main(call);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("no overload of `add`"), "{diag}");
    assert_eq!(label_count(&diag, "candidate `"), 2);
}

#[test]
fn overloads_matching_concrete_arguments_are_ambiguous() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let show = fx.ir.method("show", s());
    fx.ir.define(module, show).unwrap();
    for _ in 0..2 {
        let x = fx.ir.variable("x", Some(int), s());
        let overload = fx.ir.function("show", vec![x], None, s());
        fx.ir.add_overload(show, overload);
    }
    let one = fx.int_lit(1);
    let call = fx.call("show", vec![one]);
    fx.main(call);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Ambiguity);
    assert_eq!(label_count(&diag, "matching overload"), 2, "{diag}");
}

// ---------------------------------------------------------------------------
// Dependent arguments
// ---------------------------------------------------------------------------

#[test]
fn identity_takes_type_of_each_call_site() {
    let mut fx = Fixture::new();
    let (module, int, string) = (fx.module, fx.int, fx.string);
    let x = fx.var("x");
    let ret = fx.ret(Some(x));
    let identity = fx.function(module, "identity", &[("x", None)], None, vec![ret]);
    let one = fx.int_lit(1);
    let first = fx.call("identity", vec![one]);
    let a = fx.assign("a", first);
    fx.main(a);
    let text = fx.str_lit("s");
    let second = fx.call("identity", vec![text]);
    let b = fx.assign("b", second);
    fx.main(b);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(first).unwrap(), int);
    assert_eq!(verifier.call_return_type(second).unwrap(), string);
    assert_eq!(verifier.binding_depth(), 0);
    let targets = verifier.resolve_call(first).unwrap().targets;

    let placeholder = fx.arg_placeholder(identity, 0);
    assert_eq!(targets, vec![(placeholder, int)]);
    let NodeKind::Placeholder(data) = fx.ir.kind(placeholder) else {
        panic!("expected placeholder");
    };
    assert_eq!(data.kind, PlaceholderKind::Dependent);
    assert_eq!(data.target, None);
    assert_eq!(fx.global_type("a"), Some(int));
    assert_eq!(fx.global_type("b"), Some(string));
}

#[test]
fn overloads_on_dependent_argument_are_deferred_to_call_site() {
    let mut fx = Fixture::new();
    let (module, int, string) = (fx.module, fx.int, fx.string);
    let (x1, x2) = (fx.var("x"), fx.var("x"));
    let doubled = fx.call("add", vec![x1, x2]);
    let ret = fx.ret(Some(doubled));
    let twice = fx.function(module, "twice", &[("x", None)], None, vec![ret]);
    let two = fx.int_lit(2);
    let numeric = fx.call("twice", vec![two]);
    fx.main(numeric);
    let word = fx.str_lit("ab");
    let textual = fx.call("twice", vec![word]);
    fx.main(textual);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(numeric).unwrap(), int);
    assert_eq!(verifier.call_return_type(textual).unwrap(), string);

    let placeholder = fx.arg_placeholder(twice, 0);
    let NodeKind::Placeholder(data) = fx.ir.kind(placeholder) else {
        panic!("expected placeholder");
    };
    assert_eq!(data.evidence, vec![vec![int, string]]);
}

#[test]
fn dependent_argument_rejects_type_outside_its_evidence() {
    let mut fx = Fixture::new();
    let (module, boolean) = (fx.module, fx.boolean);
    let (x1, x2) = (fx.var("x"), fx.var("x"));
    let doubled = fx.call("add", vec![x1, x2]);
    let ret = fx.ret(Some(doubled));
    fx.function(module, "twice", &[("x", None)], None, vec![ret]);
    let flag = fx.ir.literal(Lit::Bool(true), boolean, s());
    let call = fx.call("twice", vec![flag]);
    fx.main(call);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
}

fn point_class(fx: &mut Fixture) -> NodeId {
    let (module, int) = (fx.module, fx.int);
    let point = fx.ir.class("Point", s());
    let y = fx.ir.variable("y", Some(int), s());
    fx.ir.define(point, y).unwrap();
    fx.ir.define(module, point).unwrap();
    point
}

fn gety(fx: &mut Fixture) -> NodeId {
    let module = fx.module;
    let p = fx.var("p");
    let attribute = fx.ir.attribute(p, "y", s());
    let ret = fx.ret(Some(attribute));
    fx.function(module, "gety", &[("p", None)], None, vec![ret])
}

#[test]
fn attribute_of_dependent_argument_follows_call_site_class() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    point_class(&mut fx);
    gety(&mut fx);
    let make = fx.call("Point", vec![]);
    let get = fx.call("gety", vec![make]);
    let assign = fx.assign("v", get);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(get).unwrap(), int);
    assert_eq!(verifier.binding_depth(), 0);
}

#[test]
fn attribute_missing_on_call_site_type_is_dependency_error() {
    let mut fx = Fixture::new();
    gety(&mut fx);
    let one = fx.int_lit(1);
    let get = fx.call("gety", vec![one]);
    fx.main(get);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Dependency);
    assert!(diag.message.contains("no attribute `y`"), "{diag}");
}

// ---------------------------------------------------------------------------
// Scopes and control flow
// ---------------------------------------------------------------------------

#[test]
fn nested_function_captures_enclosing_variable() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let one = fx.int_lit(1);
    let set = fx.assign("n", one);
    let call_inner = fx.call("inner", vec![]);
    let outer_ret = fx.ret(Some(call_inner));
    let outer = fx.function(module, "outer", &[], None, vec![set, outer_ret]);
    let n = fx.var("n");
    let inner_ret = fx.ret(Some(n));
    let inner = fx.function(outer, "inner", &[], None, vec![inner_ret]);
    let call = fx.call("outer", vec![]);
    fx.main(call);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), int);

    let links = captures(&fx.ir, inner);
    assert_eq!(links.len(), 1);
    let NodeKind::Link(link) = fx.ir.kind(links[0]) else {
        panic!("expected link");
    };
    assert_eq!(link.kind, LinkKind::Closed);
    assert_eq!(fx.ir.parent_scope(link.value), Some(outer));
    assert!(captures(&fx.ir, outer).is_empty());
}

#[test]
fn branch_local_context_is_visible_inside_arm() {
    let mut fx = Fixture::new();
    let (module, int, boolean) = (fx.module, fx.int, fx.boolean);
    let tmp_ref = fx.var("tmp");
    let inside = fx.ret(Some(tmp_ref));
    let c = fx.var("c");
    let arm = fx.ir.branch(Some(c), vec![inside], s());
    let local = fx.ir.soft_local_context(arm).unwrap();
    let tmp = fx.ir.variable("tmp", Some(int), s());
    fx.ir.bind(local, tmp);
    let zero = fx.int_lit(0);
    let fallback = fx.ret(Some(zero));
    fx.function(
        module,
        "pick",
        &[("c", Some(boolean))],
        Some(int),
        vec![arm, fallback],
    );

    fx.verify().unwrap();
    let NodeKind::Reference(reference) = fx.ir.kind(tmp_ref) else {
        panic!("expected reference");
    };
    assert_eq!(reference.resolved, Some(tmp));
}

fn pick(fx: &mut Fixture, with_else: bool) -> NodeId {
    let (module, int, boolean) = (fx.module, fx.int, fx.boolean);
    let c = fx.var("c");
    let one = fx.int_lit(1);
    let then = fx.ret(Some(one));
    let arm = fx.ir.branch(Some(c), vec![then], s());
    if with_else {
        let two = fx.int_lit(2);
        let otherwise = fx.ret(Some(two));
        let other = fx.ir.branch(None, vec![otherwise], s());
        fx.ir.set_next_branch(arm, other);
    }
    fx.function(module, "pick", &[("c", Some(boolean))], Some(int), vec![arm])
}

#[test]
fn if_else_returning_on_both_arms_returns() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let function = pick(&mut fx, true);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    let stats = verifier.stats(function).expect("function stats");
    assert!(stats.definitely_returns);
    assert!(stats.might_return);
}

#[test]
fn if_without_else_does_not_return_on_every_path() {
    let mut fx = Fixture::new();
    pick(&mut fx, false);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("all code paths must return"), "{diag}");
}

#[test]
fn branch_condition_must_be_bool() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let condition = fx.int_lit(1);
    let arm = fx.ir.branch(Some(condition), vec![], s());
    fx.function(module, "f", &[], None, vec![arm]);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("expected `Bool`"), "{diag}");
}

#[test]
fn break_binds_to_enclosing_loop() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let brk = fx.ir.brk(s());
    let lp = fx.ir.loop_(vec![brk], s());
    fx.function(module, "f", &[], None, vec![lp]);

    fx.verify().unwrap();
    let NodeKind::Break(data) = fx.ir.kind(brk) else {
        panic!("expected break");
    };
    assert_eq!(data.target, Some(lp));
}

/// `def f(c: Bool) -> Int64` whose body is `loop { if c { break }; return 1 }`
/// followed by `tail`.
fn loop_with_early_break(fx: &mut Fixture, tail: Vec<NodeId>) -> (NodeId, NodeId) {
    let (module, int, boolean) = (fx.module, fx.int, fx.boolean);
    let c = fx.var("c");
    let brk = fx.ir.brk(s());
    let arm = fx.ir.branch(Some(c), vec![brk], s());
    let one = fx.int_lit(1);
    let inside = fx.ret(Some(one));
    let lp = fx.ir.loop_(vec![arm, inside], s());
    let mut body = vec![lp];
    body.extend(tail);
    let f = fx.function(module, "f", &[("c", Some(boolean))], Some(int), body);
    (f, lp)
}

#[test]
fn return_inside_loop_does_not_return_on_every_path() {
    let mut fx = Fixture::new();
    loop_with_early_break(&mut fx, vec![]);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert!(diag.message.contains("all code paths must return"), "{diag}");
}

#[test]
fn return_inside_loop_might_return() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let zero = fx.int_lit(0);
    let tail = fx.ret(Some(zero));
    let (f, lp) = loop_with_early_break(&mut fx, vec![tail]);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    let loop_stats = verifier.stats(lp).expect("loop stats");
    assert!(loop_stats.might_return);
    assert!(!loop_stats.definitely_returns);
    let function_stats = verifier.stats(f).expect("function stats");
    assert!(function_stats.might_return);
    assert!(function_stats.definitely_returns);
}

#[test]
fn scopes_nested_in_dependent_function_are_forward() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let brk = fx.ir.brk(s());
    let lp = fx.ir.loop_(vec![brk], s());
    let outer = fx.function(module, "outer", &[("x", None)], None, vec![lp]);
    let inner = fx.function(outer, "inner", &[], None, vec![]);
    let one = fx.int_lit(1);
    let ret = fx.ret(Some(one));
    let typed = fx.function(module, "typed", &[("n", Some(int))], Some(int), vec![ret]);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert!(verifier.stats(outer).expect("outer stats").forward);
    assert!(verifier.stats(inner).expect("inner stats").forward);
    assert!(verifier.stats(lp).expect("loop stats").forward);
    assert!(!verifier.stats(typed).expect("typed stats").forward);
}

#[test]
fn break_outside_loop_is_syntax_error() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let brk = fx.ir.brk(s());
    fx.function(module, "f", &[], None, vec![brk]);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Syntax);
}

#[test]
fn return_at_module_level_is_syntax_error() {
    let mut fx = Fixture::new();
    let ret = fx.ret(None);
    fx.main(ret);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Syntax);
    assert!(diag.message.contains("outside of a function"));
}

#[test]
fn return_in_constructor_is_syntax_error() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let point = fx.ir.class("Point", s());
    let ret = fx.ret(None);
    let constructor = fx.ir.function("new", vec![], None, s());
    fx.ir.push_body(constructor, ret);
    fx.ir.add_constructor(point, constructor).unwrap();
    fx.ir.define(module, point).unwrap();

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Syntax);
    assert!(diag.message.contains("constructor of `Point`"), "{diag}");
}

#[test]
fn constructor_call_has_class_type() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let point = fx.ir.class("Point", s());
    let x = fx.ir.variable("x", Some(int), s());
    let constructor = fx.ir.function("new", vec![x], None, s());
    fx.ir.add_constructor(point, constructor).unwrap();
    fx.ir.define(module, point).unwrap();
    let one = fx.int_lit(1);
    let call = fx.call("Point", vec![one]);
    let assign = fx.assign("origin", call);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    let resolution = verifier.resolve_call(call).unwrap();
    assert_eq!(resolution.constructs, Some(point));
    assert_eq!(resolution.function, constructor);
    assert_eq!(fx.global_type("origin"), Some(point));

    let NodeKind::Function(data) = fx.ir.kind(constructor) else {
        panic!("expected function");
    };
    assert_eq!(data.constructor_of, Some(point));
    assert!(data.self_arg.is_some());
}

#[test]
fn attribute_assignment_checks_member_type() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let point = fx.ir.class("Point", s());
    let x = fx.ir.variable("x", Some(int), s());
    fx.ir.define(point, x).unwrap();
    let constructor = fx.ir.function("new", vec![], None, s());
    fx.ir.add_constructor(point, constructor).unwrap();
    fx.ir.define(module, point).unwrap();

    let call = fx.call("Point", vec![]);
    let create = fx.assign("origin", call);
    fx.main(create);
    for value in [fx.int_lit(3), fx.str_lit("three")] {
        let object = fx.var("origin");
        let target = fx.ir.attribute(object, "x", s());
        let assign = fx.ir.assign(target, value, s());
        fx.main(assign);
    }

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Type);
    assert_eq!(
        diag.message,
        "cannot assign `String` to `origin.x` of type `Int64`"
    );
}

// ---------------------------------------------------------------------------
// Recursion
// ---------------------------------------------------------------------------

#[test]
fn recursive_return_type_comes_from_later_return() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let n = fx.var("n");
    let one = fx.int_lit(1);
    let condition = fx.call("lt", vec![n, one]);
    let n_again = fx.var("n");
    let recurse = fx.call("fact", vec![n_again]);
    let then = fx.ret(Some(recurse));
    let arm = fx.ir.branch(Some(condition), vec![then], s());
    let base = fx.int_lit(1);
    let otherwise = fx.ret(Some(base));
    let other = fx.ir.branch(None, vec![otherwise], s());
    fx.ir.set_next_branch(arm, other);
    fx.function(module, "fact", &[("n", Some(int))], None, vec![arm]);
    let three = fx.int_lit(3);
    let call = fx.call("fact", vec![three]);
    fx.main(call);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), int);
}

#[test]
fn recursion_without_base_case_returns_void() {
    let mut fx = Fixture::new();
    let (module, int) = (fx.module, fx.int);
    let void = fx.ir.void();
    let n = fx.var("n");
    let recurse = fx.call("spin", vec![n]);
    let ret = fx.ret(Some(recurse));
    fx.function(module, "spin", &[("n", Some(int))], None, vec![ret]);
    let one = fx.int_lit(1);
    let call = fx.call("spin", vec![one]);
    fx.main(call);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), void);
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// Serves a single `util` module exporting `answer() -> Int64`.
struct UtilLoader {
    int: NodeId,
    loads: usize,
}

impl SourceLoader for UtilLoader {
    fn load(
        &mut self,
        ir: &mut Ir,
        _importer: Option<&Path>,
        name: &str,
    ) -> Result<Option<NodeId>, Diagnostic> {
        if name != "util" {
            return Ok(None);
        }
        self.loads += 1;
        let module = ir.module("util", s());
        let value = ir.literal(Lit::Int(42), self.int, s());
        let ret = ir.ret(Some(value), s());
        let answer = ir.function("answer", vec![], Some(self.int), s());
        ir.push_body(answer, ret);
        ir.define(module, answer).unwrap();
        Ok(Some(module))
    }
}

#[test]
fn import_falls_back_to_source_loader() {
    let mut fx = Fixture::new();
    let (module, builtins, int) = (fx.module, fx.builtins, fx.int);
    let import = fx.ir.import(&["util"], None, s());
    fx.ir.define(module, import).unwrap();
    fx.main(import);
    let util = fx.var("util");
    let answer = fx.ir.attribute(util, "answer", s());
    let call = fx.ir.call(answer, vec![], s());
    let assign = fx.assign("v", call);
    fx.main(assign);

    let mut loader = UtilLoader { int, loads: 0 };
    let mut verifier = Verifier::new(&mut fx.ir)
        .with_builtins(builtins)
        .with_loader(&mut loader);
    verifier.verify(module).unwrap();
    assert_eq!(verifier.call_return_type(call).unwrap(), int);
    drop(verifier);
    assert_eq!(loader.loads, 1);
}

#[test]
fn unresolvable_import_is_import_error() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let import = fx.ir.import(&["nowhere", "thing"], None, s());
    fx.ir.define(module, import).unwrap();
    fx.main(import);

    let diag = fx.verify().unwrap_err();
    assert_eq!(diag.category, Category::Import);
    assert!(diag.message.contains("nowhere.thing"), "{diag}");
}

// ---------------------------------------------------------------------------
// Trace and idempotence
// ---------------------------------------------------------------------------

#[test]
fn trace_serializes_to_json() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let one = fx.int_lit(1);
    let first = fx.assign("y", one);
    fx.main(first);
    let y = fx.var("y");
    let second = fx.assign("z", y);
    fx.main(second);

    let mut verifier = fx.verifier();
    verifier.enable_tracing();
    verifier.verify(module).unwrap();
    let json = serde_json::to_value(verifier.trace()).unwrap();
    let steps = json.as_array().expect("trace is an array");
    assert_eq!(steps[0]["action"], "enter_scope");
    assert_eq!(steps[0]["step"], 1);
    assert!(steps.iter().any(|step| step["action"] == "infer"));
    assert!(steps.iter().any(|step| step["action"] == "resolve"));
}

#[test]
fn trace_is_empty_unless_enabled() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let one = fx.int_lit(1);
    let assign = fx.assign("y", one);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    assert!(!verifier.is_tracing());
    assert!(verifier.trace().is_empty());
}

#[test]
fn verifying_twice_changes_nothing() {
    let mut fx = Fixture::new();
    let module = fx.module;
    let x = fx.var("x");
    let ret = fx.ret(Some(x));
    fx.function(module, "identity", &[("x", None)], None, vec![ret]);
    let one = fx.int_lit(1);
    let call = fx.call("identity", vec![one]);
    let assign = fx.assign("a", call);
    fx.main(assign);

    let mut verifier = fx.verifier();
    verifier.verify(module).unwrap();
    let count = verifier.ir().node_count();
    verifier.verify(module).unwrap();
    assert_eq!(verifier.ir().node_count(), count);
}
