//! Backtracking regular-expression engine built to drive lexers.
//!
//! This crate is a standalone pattern matcher with **zero `crex_*`
//! dependencies**: the preprocessor stack layers on top of it, but
//! external tools (a grep driver, other tokenizers) can use it on its
//! own.
//!
//! # Architecture
//!
//! A pattern compiles into a chain of arena-allocated nodes
//! (anchors, literals, character classes, quantifiers, groups,
//! alternations) terminated by a `True` node. Evaluation is NFA-style
//! backtracking that returns the longest match. The [`Engine`] holds any
//! number of compiled patterns plus named macros referenced as `{NAME}`
//! inside pattern text, and [`Engine::lex_token`] performs
//! longest-match-wins multi-pattern lexing with registration order as
//! the tie-break — the contract lexer layers rely on.
//!
//! # Usage
//!
//! ```
//! use crex_regex::{Engine, EngineFlags};
//!
//! let mut engine = Engine::new(EngineFlags::empty());
//! engine.add_macro("D", "[0-9]").unwrap();
//! engine.add_pattern("{D}+", 1).unwrap();
//! engine.add_pattern("[a-z]+", 2).unwrap();
//!
//! let mut offset = 0;
//! let tok = engine.lex_token(b"127abc", &mut offset).unwrap();
//! assert_eq!((tok.id, tok.len), (1, 3));
//! ```
//!
//! # Supported syntax
//!
//! A PCRE-like subset: `^ $ . | ( ) (?= (?! (?: * + ? {m} {m,} {m,n}`,
//! lazy quantifiers via a trailing `?`, bracket classes with ranges and
//! POSIX `[:name:]` sets, `\d \D \s \S \w \W`, `\xHH`, octal, `\cX`,
//! `\u{...}`/`\uHHHH` (as UTF-8 bytes), and `{NAME}` macro references.
//! No backreferences, no lookbehind, no capture extraction.

mod char_class;
mod engine;
mod error;
mod eval;
mod node;
mod parser;
mod printer;

pub use char_class::CharClass;
pub use engine::{Engine, EngineFlags, LexedToken, Position};
pub use error::{ParseError, ParseErrorKind};
