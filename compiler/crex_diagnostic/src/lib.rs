//! Diagnostic reporting for the preprocessor toolchain.
//!
//! Diagnostics are deliberately plain: one line per message in the
//! classic `path:line:col: message` shape that editors and build tools
//! already parse. The [`DiagnosticQueue`] collects everything emitted
//! during a run (mirroring it to stderr) so drivers can decide the exit
//! code and tests can assert on exactly what was reported.

use std::fmt;
use std::path::{Path, PathBuf};

/// How serious a diagnostic is.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// One reported problem, located in a source file.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Diagnostic {
    pub path: PathBuf,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub col: u32,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(path: &Path, line: u32, col: u32, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            path: path.to_path_buf(),
            line,
            col,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(path: &Path, line: u32, col: u32, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            path: path.to_path_buf(),
            line,
            col,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    /// `path:line:col: message`, with an explicit marker for warnings so
    /// they are distinguishable from hard errors in mixed output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: ", self.path.display(), self.line, self.col)?;
        if self.severity == Severity::Warning {
            write!(f, "warning: ")?;
        }
        write!(f, "{}", self.message)
    }
}

/// Collects diagnostics for one run.
///
/// `emit` prints to stderr immediately and keeps the diagnostic for
/// later inspection. Not shareable across threads by design — one queue
/// per translation unit.
#[derive(Default, Debug)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    /// Suppress stderr mirroring (used by tests).
    quiet: bool,
}

impl DiagnosticQueue {
    pub fn new() -> DiagnosticQueue {
        DiagnosticQueue::default()
    }

    /// A queue that only collects, without printing. Tests use this to
    /// keep output clean.
    pub fn quiet() -> DiagnosticQueue {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            quiet: true,
        }
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if !self.quiet {
            eprintln!("{diagnostic}");
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}
