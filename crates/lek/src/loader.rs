//! Import fallback: building modules from source when no binding of the
//! imported name is visible.
//!
//! Loaders only locate and read sources. Turning text into IR is delegated
//! to a [`ModuleParser`], so the front end stays pluggable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lek_diag::{Category, Diagnostic};
use lek_ir::{Ir, NodeId};
use lek_verify::SourceLoader;

/// Builds an unverified module from source text.
pub trait ModuleParser {
    /// Parse `source` into a module named `name`. `path` is where the
    /// source came from; the module should record it so its own imports
    /// resolve next to it.
    fn parse(
        &mut self,
        ir: &mut Ir,
        name: &str,
        path: &Path,
        source: &str,
    ) -> Result<NodeId, Diagnostic>;
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Resolves `import name` to `<dir of importing module>/<name>.<ext>`, or to
/// `<search root>/<name>.<ext>` for modules without a source path.
///
/// Each file is parsed once per loader; repeated imports share the module.
#[derive(Debug)]
pub struct FsLoader<P> {
    parser: P,
    search_root: PathBuf,
    extension: String,
    loaded: BTreeMap<PathBuf, NodeId>,
}

impl<P: ModuleParser> FsLoader<P> {
    pub fn new(parser: P, search_root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            parser,
            search_root: search_root.into(),
            extension: extension.into(),
            loaded: BTreeMap::new(),
        }
    }

    /// Files parsed so far, with their modules.
    pub fn loaded(&self) -> impl Iterator<Item = (&Path, NodeId)> + '_ {
        self.loaded.iter().map(|(path, id)| (path.as_path(), *id))
    }

    fn candidate(&self, importer: Option<&Path>, name: &str) -> PathBuf {
        let dir = importer
            .and_then(Path::parent)
            .unwrap_or(self.search_root.as_path());
        dir.join(format!("{name}.{}", self.extension))
    }
}

impl<P: ModuleParser> SourceLoader for FsLoader<P> {
    fn load(
        &mut self,
        ir: &mut Ir,
        importer: Option<&Path>,
        name: &str,
    ) -> Result<Option<NodeId>, Diagnostic> {
        let path = self.candidate(importer, name);
        if let Some(module) = self.loaded.get(&path) {
            return Ok(Some(*module));
        }
        if !path.is_file() {
            return Ok(None);
        }
        let source = fs::read_to_string(&path).map_err(|err| {
            Diagnostic::error(
                Category::Import,
                format!("failed to read `{}`: {err}", path.display()),
            )
        })?;
        let module = self.parser.parse(ir, name, &path, &source)?;
        self.loaded.insert(path, module);
        Ok(Some(module))
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Serves module sources registered by name, for tests and embedders.
#[derive(Debug)]
pub struct MemoryLoader<P> {
    parser: P,
    extension: String,
    sources: BTreeMap<String, String>,
    loaded: BTreeMap<String, NodeId>,
}

impl<P: ModuleParser> MemoryLoader<P> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            extension: "lk".to_string(),
            sources: BTreeMap::new(),
            loaded: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(name.into(), source.into());
        self
    }

    /// Number of modules parsed so far.
    pub fn load_count(&self) -> usize {
        self.loaded.len()
    }
}

impl<P: ModuleParser> SourceLoader for MemoryLoader<P> {
    fn load(
        &mut self,
        ir: &mut Ir,
        _importer: Option<&Path>,
        name: &str,
    ) -> Result<Option<NodeId>, Diagnostic> {
        if let Some(module) = self.loaded.get(name) {
            return Ok(Some(*module));
        }
        let Some(source) = self.sources.get(name) else {
            return Ok(None);
        };
        let path = PathBuf::from(format!("{name}.{}", self.extension));
        let module = self.parser.parse(ir, name, &path, source)?;
        self.loaded.insert(name.to_string(), module);
        Ok(Some(module))
    }
}
