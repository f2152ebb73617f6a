//! C preprocessor, phase 3: directives, conditionals, and macro
//! replacement over the [`crex_lexer`] token stream.
//!
//! A [`TranslationUnit`] owns one root source file plus everything
//! `#include` pulls in (file loading itself sits behind the
//! [`FileLoader`] trait — search-path policy is the embedder's
//! business). Running [`TranslationUnit::parse`] walks the unit line by
//! line, maintains the [`MacroTable`], evaluates conditional groups,
//! and accumulates the preprocessed token stream in emission order.
//!
//! Failures follow the directive contract: `#error`, redefinition
//! mismatches, malformed directives, and misplaced `#else`/`#endif`
//! abort the parse after emitting a `path:line:col:` diagnostic;
//! `#warning` and `#pragma` never do.

mod error;
mod macro_table;
mod preproc;
mod source;

pub use error::PreprocError;
pub use macro_table::{normalize_body, MacroDef, MacroTable, Params, Redefinition};
pub use preproc::TranslationUnit;
pub use source::{FileLoader, FsLoader, MemoryLoader};
