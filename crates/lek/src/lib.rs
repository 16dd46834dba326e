//! Compile-unit facade for lek.
//!
//! Installs the builtins module, wires import fallback to source files, and
//! runs verification over a parsed module tree. Parsing itself is supplied by
//! the caller through [`ModuleParser`].

mod bindings;
mod builtins;
mod loader;
mod unit;

pub use bindings::{ModuleBinding, module_bindings};
pub use builtins::{BUILTINS_MODULE, Builtins, install as install_builtins};
pub use loader::{FsLoader, MemoryLoader, ModuleParser};
pub use unit::{UnitConfig, VerifiedUnit, verify_file, verify_source, verify_unit};

pub use lek_diag::{Category, Diagnostic, DiagnosticError};
pub use lek_verify::{SourceLoader, VerifyOptions, VerifyStep};
