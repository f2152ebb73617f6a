//! Preprocessor error type.
//!
//! Most failures surface as diagnostics first (`path:line:col: message`
//! on stderr via the queue) and then abort the `parse` call with
//! [`PreprocError::Fatal`] carrying the same diagnostic. The non-fatal
//! directives (`#warning`, `#pragma`) never produce one of these.

use std::path::PathBuf;

use crex_diagnostic::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocError {
    /// The built-in lexer tables failed to compile.
    #[error("failed to build lexer: {0}")]
    LexerInit(#[from] crex_regex::ParseError),

    /// A source or include file could not be loaded.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A diagnostic-bearing failure; the diagnostic was already emitted.
    #[error("{0}")]
    Fatal(Diagnostic),
}
