//! The builtins module searched after every lexical scope.

use lek_ir::{BuildError, Ir, NodeId, Span};

pub const BUILTINS_MODULE: &str = "builtins";

/// Handles to the builtin types installed into an [`Ir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtins {
    pub module: NodeId,
    pub int64: NodeId,
    pub int32: NodeId,
    pub float64: NodeId,
    pub boolean: NodeId,
    pub string: NodeId,
    /// The void type, bound as `None`.
    pub none: NodeId,
}

impl Builtins {
    pub fn numeric(&self) -> [NodeId; 3] {
        [self.int64, self.int32, self.float64]
    }

    /// Builtin type bound under `name`.
    pub fn type_named(&self, name: &str) -> Option<NodeId> {
        match name {
            "Int64" => Some(self.int64),
            "Int32" => Some(self.int32),
            "Float64" => Some(self.float64),
            "Bool" => Some(self.boolean),
            "String" => Some(self.string),
            "None" => Some(self.none),
            _ => None,
        }
    }
}

/// Build the builtins module: nominal types, `None`, and the intrinsic
/// methods.
///
/// Arithmetic (`add`, `sub`, `mul`) is overloaded over the numeric types,
/// comparisons (`eq`, `lt`) return `Bool`, and `print` accepts `Int64`,
/// `String`, or `Bool`.
pub fn install(ir: &mut Ir) -> Result<Builtins, BuildError> {
    let span = Span::synthetic();
    let module = ir.module(BUILTINS_MODULE, span);

    let define_type = |ir: &mut Ir, name: &str| {
        let id = ir.builtin_type(name, span);
        ir.define(module, id).map(|()| id)
    };
    let int64 = define_type(ir, "Int64")?;
    let int32 = define_type(ir, "Int32")?;
    let float64 = define_type(ir, "Float64")?;
    let boolean = define_type(ir, "Bool")?;
    let string = define_type(ir, "String")?;
    let none = ir.void();
    ir.define(module, none)?;

    let builtins = Builtins {
        module,
        int64,
        int32,
        float64,
        boolean,
        string,
        none,
    };

    for name in ["add", "sub", "mul"] {
        let overloads = builtins.numeric().map(|ty| (vec![ty, ty], ty));
        intrinsic_method(ir, module, name, overloads)?;
    }
    for name in ["eq", "lt"] {
        let overloads = builtins.numeric().map(|ty| (vec![ty, ty], boolean));
        intrinsic_method(ir, module, name, overloads)?;
    }
    let printable = [int64, string, boolean].map(|ty| (vec![ty], none));
    intrinsic_method(ir, module, "print", printable)?;

    Ok(builtins)
}

fn intrinsic_method(
    ir: &mut Ir,
    module: NodeId,
    name: &str,
    overloads: impl IntoIterator<Item = (Vec<NodeId>, NodeId)>,
) -> Result<(), BuildError> {
    let span = Span::synthetic();
    let method = ir.method(name, span);
    ir.define(module, method)?;
    for (args, ret) in overloads {
        let overload = ir.intrinsic(name, args, Some(ret), span);
        ir.add_overload(method, overload);
    }
    Ok(())
}
