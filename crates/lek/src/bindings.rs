//! Human-readable summary of what a verified module binds.

use lek_ir::walk::{IrVisitor, SideTable, dispatch};
use lek_ir::{Function, Ir, Method, NodeId, Variable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBinding {
    pub name: String,
    pub kind: String,
    pub ty: String,
}

/// One entry per name in `module`'s context, in binding order.
pub fn module_bindings(ir: &Ir, module: NodeId) -> Vec<ModuleBinding> {
    let Ok(context) = ir.module_context(module) else {
        return Vec::new();
    };
    let mut describe = Describe::default();
    ir.context(context)
        .children()
        .map(|child| ModuleBinding {
            name: ir.name(child).unwrap_or("?").to_string(),
            kind: ir.kind(child).as_str().to_string(),
            ty: describe.of(ir, child),
        })
        .collect()
}

#[derive(Default)]
struct Describe {
    seen: SideTable<String>,
}

impl Describe {
    fn of(&mut self, ir: &Ir, id: NodeId) -> String {
        if let Some(text) = self.seen.get(id) {
            return text.clone();
        }
        let text = dispatch(ir, id, self);
        self.seen.insert(id, text.clone());
        text
    }
}

impl IrVisitor for Describe {
    type Output = String;

    fn visit_default(&mut self, ir: &Ir, id: NodeId) -> String {
        ir.label(id)
    }

    fn visit_function(&mut self, ir: &Ir, _id: NodeId, function: &Function) -> String {
        function
            .signature
            .map(|signature| ir.label(signature))
            .unwrap_or_else(|| "?".to_string())
    }

    fn visit_method(&mut self, ir: &Ir, _id: NodeId, method: &Method) -> String {
        method
            .overloads
            .iter()
            .map(|overload| self.of(ir, *overload))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn visit_variable(&mut self, ir: &Ir, _id: NodeId, variable: &Variable) -> String {
        match variable.ty {
            Some(ty) => ir.label(ty),
            None => "?".to_string(),
        }
    }
}
