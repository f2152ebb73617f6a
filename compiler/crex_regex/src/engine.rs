//! Pattern registry and longest-match lexer driver.
//!
//! The engine owns the node arena, the named macros usable as `{NAME}`
//! inside patterns, and the ordered pattern list. `lex_token` is the
//! lexer entry point: it evaluates every registered pattern at the
//! current offset, keeps the longest match, breaks ties in favor of the
//! earliest-registered pattern, and advances line/column counters over
//! the matched bytes.
//!
//! Compiled patterns are immutable once registered, so a finished engine
//! can be shared read-only; the mutable pieces are the position counters
//! used while lexing.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::error::{ParseError, ParseErrorKind};
use crate::eval::eval;
use crate::node::{NodeArena, Pattern};
use crate::parser::parse_pattern;
use crate::printer::print_chain;

bitflags! {
    /// Engine-wide configuration flags.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct EngineFlags: u32 {
        /// Make `.` reject `\n` and `\r` instead of matching every byte.
        const DOT_NO_NEWLINE = 1 << 0;
    }
}

/// Line/column state, 1-based on both axes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Default for Position {
    fn default() -> Position {
        Position { line: 1, col: 1 }
    }
}

/// A successful `lex_token` result.
///
/// `line`/`col` locate the start of the match; the engine's counters have
/// already advanced past it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexedToken {
    /// Caller-supplied id of the winning pattern.
    pub id: usize,
    /// Byte offset where the match begins.
    pub start: usize,
    /// Match length in bytes; never zero.
    pub len: usize,
    pub line: u32,
    pub col: u32,
}

/// A compiled multi-pattern matcher.
pub struct Engine {
    arena: NodeArena,
    macros: FxHashMap<Box<str>, Box<str>>,
    patterns: Vec<Pattern>,
    flags: EngineFlags,
    pos: Position,
    saved: Vec<Position>,
}

impl Engine {
    pub fn new(flags: EngineFlags) -> Engine {
        Engine {
            arena: NodeArena::new(),
            macros: FxHashMap::default(),
            patterns: Vec::new(),
            flags,
            pos: Position::default(),
            saved: Vec::new(),
        }
    }

    /// Register a named macro for use as `{NAME}` in later patterns.
    ///
    /// The name must be an identifier: `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn add_macro(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        let mut bytes = name.bytes().enumerate();
        match bytes.next() {
            Some((_, b)) if b.is_ascii_alphabetic() || b == b'_' => {}
            _ => return Err(ParseError::new(0, ParseErrorKind::InvalidMacroName)),
        }
        for (i, b) in bytes {
            if !b.is_ascii_alphanumeric() && b != b'_' {
                return Err(ParseError::new(i, ParseErrorKind::InvalidMacroName));
            }
        }
        self.macros.insert(name.into(), value.into());
        Ok(())
    }

    /// Compile `pattern` and append it to the registry under `id`.
    ///
    /// Registration order is significant: when two patterns produce
    /// equal-length matches, the earlier one wins.
    pub fn add_pattern(&mut self, pattern: &str, id: usize) -> Result<(), ParseError> {
        let dot_matches_newline = !self.flags.contains(EngineFlags::DOT_NO_NEWLINE);
        let head = parse_pattern(&mut self.arena, &self.macros, dot_matches_newline, pattern)?;
        self.patterns.push(Pattern { head, id });
        Ok(())
    }

    /// Number of registered patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Lex one token at `*offset`.
    ///
    /// Evaluates every pattern at the offset and picks the longest match
    /// (earliest-registered on ties; zero-length matches never win). On
    /// success the offset advances past the match and the line/column
    /// counters are updated by scanning the matched bytes for newlines.
    pub fn lex_token(&mut self, buf: &[u8], offset: &mut usize) -> Option<LexedToken> {
        let start = *offset;
        let mut best: Option<(usize, usize)> = None;

        for pattern in &self.patterns {
            if let Some(end) = eval(&self.arena, pattern.head, buf, start) {
                if end > start && best.map_or(true, |(b, _)| end > b) {
                    best = Some((end, pattern.id));
                }
            }
        }

        let (end, id) = best?;
        let token = LexedToken {
            id,
            start,
            len: end - start,
            line: self.pos.line,
            col: self.pos.col,
        };
        self.advance_position(&buf[start..end]);
        *offset = end;
        Some(token)
    }

    /// Search `buf` from `start` for the first match of any pattern.
    ///
    /// Patterns are tried in registration order, each scanned across all
    /// offsets, so an early-registered pattern matching late in the
    /// buffer beats a later-registered pattern matching early. Returns
    /// `(id, offset, len)`.
    pub fn find(&self, buf: &[u8], start: usize) -> Option<(usize, usize, usize)> {
        for pattern in &self.patterns {
            for offset in start..buf.len() {
                if let Some(end) = eval(&self.arena, pattern.head, buf, offset) {
                    return Some((pattern.id, offset, end - offset));
                }
            }
        }
        None
    }

    /// Render the pattern at `index` back into regex syntax.
    pub fn print_pattern(&self, index: usize) -> Option<String> {
        let pattern = self.patterns.get(index)?;
        let mut out = String::new();
        print_chain(&self.arena, pattern.head, &mut out);
        Some(out)
    }

    /// The id registered for the pattern at `index`.
    pub fn pattern_id(&self, index: usize) -> Option<usize> {
        self.patterns.get(index).map(|p| p.id)
    }

    /// Current line/column counters.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Overwrite the line/column counters (used by `#line`).
    pub fn set_position(&mut self, pos: Position) {
        self.pos = pos;
    }

    /// Save the counters and reset to 1:1 for a nested file context.
    pub fn push_position(&mut self) {
        self.saved.push(self.pos);
        self.pos = Position::default();
    }

    /// Restore the counters saved by the matching `push_position`.
    pub fn pop_position(&mut self) {
        if let Some(saved) = self.saved.pop() {
            self.pos = saved;
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "token and line lengths fit u32 in any real source file"
    )]
    fn advance_position(&mut self, matched: &[u8]) {
        match memchr::memrchr(b'\n', matched) {
            Some(last) => {
                let newlines = memchr::memchr_iter(b'\n', matched).count();
                self.pos.line += newlines as u32;
                self.pos.col = (matched.len() - last) as u32;
            }
            None => {
                self.pos.col += matched.len() as u32;
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("patterns", &self.patterns.len())
            .field("macros", &self.macros.len())
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}
