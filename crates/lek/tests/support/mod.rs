//! A line-oriented toy front end for driving the facade from source text.
//!
//! One statement per line:
//!
//! ```text
//! import util            # or `import a.b as c`
//! def f(x, y: Int64) -> Int64 = add(x, y)
//! total = f(1, 2)
//! print(total)
//! ```

use std::path::Path;

use lek::{Category, Diagnostic, ModuleParser};
use lek_ir::{FileId, Ir, Lit, NodeId, Span};

#[derive(Debug, Default)]
pub struct LineParser {
    pub parsed: Vec<String>,
}

impl ModuleParser for LineParser {
    fn parse(
        &mut self,
        ir: &mut Ir,
        name: &str,
        path: &Path,
        source: &str,
    ) -> Result<NodeId, Diagnostic> {
        self.parsed.push(name.to_string());
        let file = FileId(self.parsed.len() as u32 - 1);
        let module = ir.module_at(name, Some(path.to_path_buf()), Span::new(file, 0, 0));

        let mut offset = 0u32;
        for raw in source.lines() {
            let span = Span::new(file, offset, offset + raw.len() as u32);
            offset += raw.len() as u32 + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("import ") {
                let (path, alias) = match rest.split_once(" as ") {
                    Some((path, alias)) => (path.trim(), Some(alias.trim())),
                    None => (rest.trim(), None),
                };
                let segments: Vec<&str> = path.split('.').collect();
                let import = ir.import(&segments, alias, span);
                ir.define(module, import).map_err(internal)?;
                ir.push_main(module, import);
            } else if let Some(rest) = line.strip_prefix("def ") {
                let function = parse_def(ir, rest, span)?;
                ir.define(module, function).map_err(internal)?;
            } else if let Some((target, value)) = line.split_once(" = ") {
                let value = parse_expr(ir, value.trim(), span)?;
                let target = parse_expr(ir, target.trim(), span)?;
                let assign = ir.assign(target, value, span);
                ir.push_main(module, assign);
            } else {
                let expr = parse_expr(ir, line, span)?;
                ir.push_main(module, expr);
            }
        }
        Ok(module)
    }
}

fn internal(err: lek_ir::BuildError) -> Diagnostic {
    Diagnostic::error(Category::Internal, err.to_string())
}

fn syntax(message: String) -> Diagnostic {
    Diagnostic::error(Category::Syntax, message)
}

/// `name(args) [-> Type] [= expr]`
fn parse_def(ir: &mut Ir, text: &str, span: Span) -> Result<NodeId, Diagnostic> {
    let (head, body) = match text.split_once(" = ") {
        Some((head, body)) => (head.trim(), Some(body.trim())),
        None => (text.trim(), None),
    };
    let (signature, ret) = match head.split_once("->") {
        Some((signature, ret)) => (signature.trim(), Some(ret.trim())),
        None => (head, None),
    };
    let open = signature
        .find('(')
        .ok_or_else(|| syntax(format!("expected `(` in `{signature}`")))?;
    let name = &signature[..open];
    let inner = signature[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| syntax(format!("expected `)` in `{signature}`")))?;

    let mut args = Vec::new();
    for arg in split_args(inner) {
        let variable = match arg.split_once(':') {
            Some((arg, ty)) => {
                let declared = ir.reference(ty.trim(), span);
                ir.variable(arg.trim(), Some(declared), span)
            }
            None => ir.variable(arg, None, span),
        };
        args.push(variable);
    }
    let return_type = ret.map(|ret| ir.reference(ret, span));
    let function = ir.function(name, args, return_type, span);
    if let Some(body) = body {
        let value = parse_expr(ir, body, span)?;
        let ret = ir.ret(Some(value), span);
        ir.push_body(function, ret);
    }
    Ok(function)
}

fn parse_expr(ir: &mut Ir, text: &str, span: Span) -> Result<NodeId, Diagnostic> {
    if text.is_empty() {
        return Err(syntax("expected an expression".to_string()));
    }
    if let Ok(value) = text.parse::<i64>() {
        let ty = ir.reference("Int64", span);
        return Ok(ir.literal(Lit::Int(value), ty, span));
    }
    if text.starts_with(|c: char| c.is_ascii_digit())
        && let Ok(value) = text.parse::<f64>()
    {
        let ty = ir.reference("Float64", span);
        return Ok(ir.literal(Lit::Float(value), ty, span));
    }
    if text == "true" || text == "false" {
        let ty = ir.reference("Bool", span);
        return Ok(ir.literal(Lit::Bool(text == "true"), ty, span));
    }
    if let Some(inner) = text.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        let ty = ir.reference("String", span);
        return Ok(ir.literal(Lit::String(inner.to_string()), ty, span));
    }
    if let Some(inner) = text.strip_suffix(')')
        && let Some(open) = inner.find('(')
    {
        let callee = parse_expr(ir, &inner[..open], span)?;
        let mut args = Vec::new();
        for arg in split_args(&inner[open + 1..]) {
            args.push(parse_expr(ir, arg, span)?);
        }
        return Ok(ir.call(callee, args, span));
    }
    if let Some((object, name)) = text.rsplit_once('.') {
        let object = parse_expr(ir, object, span)?;
        return Ok(ir.attribute(object, name, span));
    }
    if text.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(ir.reference(text, span));
    }
    Err(syntax(format!("cannot parse `{text}`")))
}

/// Split on commas outside parentheses.
fn split_args(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}
