//! Verification entry points for a compile unit.

use std::fs;
use std::path::{Path, PathBuf};

use lek_diag::{Category, Diagnostic, DiagnosticError};
use lek_ir::{BuildError, Ir, NodeId};
use lek_verify::{SourceLoader, Verifier, VerifyOptions, VerifyStep};

use crate::bindings::{ModuleBinding, module_bindings};
use crate::builtins::{self, Builtins};
use crate::loader::{FsLoader, ModuleParser};

/// Options for a unit plus where imports without a source path are looked up.
#[derive(Debug, Clone)]
pub struct UnitConfig {
    pub options: VerifyOptions,
    pub search_root: PathBuf,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            options: VerifyOptions::default(),
            search_root: PathBuf::from("."),
        }
    }
}

impl UnitConfig {
    pub fn new(search_root: impl Into<PathBuf>) -> Self {
        Self {
            search_root: search_root.into(),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: VerifyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.options.trace = true;
        self
    }
}

#[derive(Debug)]
pub struct VerifiedUnit {
    pub ir: Ir,
    pub root: NodeId,
    pub builtins: Builtins,
    pub bindings: Vec<ModuleBinding>,
    /// Empty unless tracing was enabled in the options.
    pub trace: Vec<VerifyStep>,
}

impl VerifiedUnit {
    pub fn binding(&self, name: &str) -> Option<&ModuleBinding> {
        self.bindings.iter().find(|binding| binding.name == name)
    }

    pub fn trace_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.trace)
    }
}

/// Verify a module tree already built into `ir`, searching `builtins` after
/// every lexical scope. Returns the recorded trace.
pub fn verify_unit(
    ir: &mut Ir,
    root: NodeId,
    builtins: &Builtins,
    loader: Option<&mut dyn SourceLoader>,
    options: &VerifyOptions,
) -> Result<Vec<VerifyStep>, DiagnosticError> {
    let mut verifier = Verifier::new(ir)
        .with_builtins(builtins.module)
        .with_options(options.clone());
    if let Some(loader) = loader {
        verifier = verifier.with_loader(loader);
    }
    verifier.verify(root)?;
    Ok(verifier.trace().to_vec())
}

/// Parse `source` as module `name` on top of a fresh builtins module and
/// verify it. Imports go through `loader` when given.
pub fn verify_source<P: ModuleParser>(
    name: &str,
    source: &str,
    parser: &mut P,
    loader: Option<&mut dyn SourceLoader>,
    options: &VerifyOptions,
) -> Result<VerifiedUnit, DiagnosticError> {
    let mut ir = Ir::new();
    let builtins = builtins::install(&mut ir).map_err(build_failure)?;
    let path = PathBuf::from(format!("{name}.{}", options.source_extension));
    let root = parser.parse(&mut ir, name, &path, source)?;
    let trace = verify_unit(&mut ir, root, &builtins, loader, options)?;
    Ok(finish(ir, root, builtins, trace))
}

/// Read, parse, and verify the file at `path`. Imports resolve to sibling
/// source files, parsed with the same parser.
pub fn verify_file<P: ModuleParser>(
    path: &Path,
    mut parser: P,
    config: &UnitConfig,
) -> Result<VerifiedUnit, DiagnosticError> {
    let source = fs::read_to_string(path).map_err(|err| {
        Diagnostic::error(
            Category::Import,
            format!("failed to read `{}`: {err}", path.display()),
        )
        .with_help(Category::Import.example_fix())
    })?;
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("main")
        .to_string();

    let mut ir = Ir::new();
    let builtins = builtins::install(&mut ir).map_err(build_failure)?;
    let root = parser.parse(&mut ir, &name, path, &source)?;

    let mut loader = FsLoader::new(
        parser,
        config.search_root.clone(),
        config.options.source_extension.clone(),
    );
    let trace = verify_unit(&mut ir, root, &builtins, Some(&mut loader), &config.options)?;
    Ok(finish(ir, root, builtins, trace))
}

fn build_failure(err: BuildError) -> Diagnostic {
    Diagnostic::error(Category::Internal, err.to_string())
        .with_help(Category::Internal.example_fix())
}

fn finish(ir: Ir, root: NodeId, builtins: Builtins, trace: Vec<VerifyStep>) -> VerifiedUnit {
    let bindings = module_bindings(&ir, root);
    VerifiedUnit {
        ir,
        root,
        builtins,
        bindings,
        trace,
    }
}
