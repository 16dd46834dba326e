//! Error reporting and diagnostics for lek.
//!
//! This crate provides structured diagnostics with source location tracking.
//! A diagnostic carries a primary message plus an ordered chain of labeled
//! spans: every verification layer that a failure passes through appends a
//! label ("while verifying call", "while resolving `f`", ...), so the final
//! error reads outermost-last.
//!
//! Diagnostics are created by other crates (for example, `lek-verify`) and
//! rendered by front-ends; source excerpts are not produced here.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Kind of failure. Every verification error belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Malformed structural placement (`break` outside a loop, `return` in a constructor).
    Syntax,
    /// Incompatible types, not callable, not assignable, missing return paths.
    Type,
    /// A name resolves to nothing in the visible scope chain, builtins included.
    MissingReference,
    /// A name or overload resolves to more than one candidate.
    Ambiguity,
    /// A dependent context placeholder required an attribute its target lacks.
    Dependency,
    /// An import path head resolves neither as a name nor as a file.
    Import,
    /// A verifier invariant was violated.
    Internal,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Syntax,
        Category::Type,
        Category::MissingReference,
        Category::Ambiguity,
        Category::Dependency,
        Category::Import,
        Category::Internal,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Type => "type",
            Category::MissingReference => "missing_reference",
            Category::Ambiguity => "ambiguity",
            Category::Dependency => "dependency",
            Category::Import => "import",
            Category::Internal => "internal",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::Syntax => "E0101",
            Category::Type => "E0102",
            Category::MissingReference => "E0103",
            Category::Ambiguity => "E0104",
            Category::Dependency => "E0105",
            Category::Import => "E0106",
            Category::Internal => "E0107",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Syntax => "A construct appears where the language does not allow it.",
            Category::Type => "Types are incompatible at an assignment, call, or return.",
            Category::MissingReference => "A referenced name is not visible from this scope.",
            Category::Ambiguity => "A name or overload matches more than one candidate.",
            Category::Dependency => {
                "A generic use requires an attribute the concrete type does not provide."
            }
            Category::Import => "An import path cannot be resolved as a name or a source file.",
            Category::Internal => "The verifier reached a state it considers impossible.",
        }
    }

    pub fn example_fix(self) -> &'static str {
        match self {
            Category::Syntax => "Move the statement into a loop, function, or method body.",
            Category::Type => "Adjust the expression or the declared type so they agree.",
            Category::MissingReference => "Define or import the name, or fix the spelling.",
            Category::Ambiguity => "Rename one of the candidates so exactly one is visible.",
            Category::Dependency => "Add the attribute to the type passed at the call site.",
            Category::Import => "Check the module name and that the source file exists.",
            Category::Internal => "Report this as a compiler bug with the input program.",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of lek-ir's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. Callers convert from `lek-ir` spans to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0102).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Ordered context chain, innermost first.
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagLabel {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the primary location only if none was set by an inner layer.
    pub fn at_if_unset(mut self, location: SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Every location the diagnostic refers to, primary first.
    pub fn locations(&self) -> impl Iterator<Item = SourceLocation> + '_ {
        self.location
            .into_iter()
            .chain(self.labels.iter().map(|label| label.location))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        for label in &self.labels {
            write!(f, "\n  note: {}", label.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }

    /// Category of the first (primary) diagnostic.
    pub fn category(&self) -> Option<Category> {
        self.0.first().map(|diag| diag.category)
    }
}

impl From<Diagnostic> for DiagnosticError {
    fn from(diag: Diagnostic) -> Self {
        Self::single(diag)
    }
}
