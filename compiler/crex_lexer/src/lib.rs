//! C token layer over the [`crex_regex`] engine.
//!
//! This crate owns the classic lex grammar for C: the named lexical
//! macros (`O D NZ L A H HP E P FS IS CP SP ES WS WS2 SPLICE`) and the
//! ordered token pattern list, from fused directive tokens down to
//! single-character operators. [`CLexer`] wires them into an engine and
//! hands out typed [`Token`]s with 1-based source positions.
//!
//! Two contracts matter to the preprocessor sitting on top:
//!
//! - End of input produces a synthetic `Newline` token exactly once, so
//!   the directive machine always sees a terminated final line.
//! - A byte no pattern matches produces a length-one `BadChar` token
//!   instead of an error; only skipped conditional sections tolerate
//!   these.

mod lexer;
mod token;

pub use lexer::CLexer;
pub use token::{Token, TokenKind};
