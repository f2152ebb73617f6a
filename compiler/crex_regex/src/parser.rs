//! Left-to-right pattern parser.
//!
//! Regular expressions are regular: the first byte of the remaining
//! pattern always determines the next fragment, so parsing is one pass
//! with no backtracking. Each fragment appends a node to the tail of the
//! chain being built; `|`, `)`, and the quantifiers restructure the tail
//! in place (wrap the left alternative, close the open group, steal the
//! preceding node as a child).
//!
//! `{NAME}` references expand by recursively parsing the macro's value
//! into the current chain, which is how the lexer layers build token
//! patterns out of named subexpressions.

use rustc_hash::FxHashMap;

use crate::char_class::CharClass;
use crate::error::{ParseError, ParseErrorKind};
use crate::node::{GroupKind, Literal, NodeArena, NodeId, NodeKind, Repeat};

/// Macro values may reference other macros; this bounds the nesting (and
/// turns accidental cycles into an error instead of a blown stack).
const MAX_MACRO_DEPTH: u32 = 64;

/// Byte cursor over a pattern string.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Cursor<'a> {
        Cursor { input, pos: 0 }
    }

    #[inline]
    fn next(&mut self) -> Option<u8> {
        let b = self.input.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    #[inline]
    fn bump_by(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Chain-building state for one pattern.
pub(crate) struct Parser<'a> {
    arena: &'a mut NodeArena,
    macros: &'a FxHashMap<Box<str>, Box<str>>,
    dot_matches_newline: bool,
    root: NodeId,
    /// Nodes appended after the root in the current flat chain, including
    /// any still-open `GroupStart` markers.
    spine: Vec<NodeId>,
    depth: u32,
}

/// Parse `pattern` into a fresh chain in `arena`, returning the root.
///
/// The returned chain is fully terminated: it ends in `True`, every
/// group has been closed, and no `GroupStart` survives.
pub(crate) fn parse_pattern(
    arena: &mut NodeArena,
    macros: &FxHashMap<Box<str>, Box<str>>,
    dot_matches_newline: bool,
    pattern: &str,
) -> Result<NodeId, ParseError> {
    let root = arena.alloc(NodeKind::Root);
    let mut parser = Parser {
        arena,
        macros,
        dot_matches_newline,
        root,
        spine: Vec::new(),
        depth: 0,
    };
    parser.parse_chain(pattern.as_bytes())?;

    let unclosed = parser
        .spine
        .iter()
        .any(|&id| matches!(parser.arena.kind(id), NodeKind::GroupStart { .. }));
    if unclosed {
        return Err(ParseError::new(
            pattern.len(),
            ParseErrorKind::UnexpectedEnd,
        ));
    }

    let done = parser.arena.alloc(NodeKind::True);
    let tail = parser.tail();
    parser.arena.set_next(tail, Some(done));
    Ok(root)
}

impl Parser<'_> {
    fn tail(&self) -> NodeId {
        self.spine.last().copied().unwrap_or(self.root)
    }

    fn parse_chain(&mut self, input: &[u8]) -> Result<(), ParseError> {
        let mut cur = Cursor::new(input);
        while cur.peek().is_some() {
            self.parse_fragment(&mut cur)?;
        }
        Ok(())
    }

    /// Append a node to the chain tail.
    fn append(&mut self, kind: NodeKind) -> NodeId {
        let id = self.arena.alloc(kind);
        let tail = self.tail();
        self.arena.set_next(tail, Some(id));
        self.spine.push(id);
        id
    }

    /// Append a literal byte, coalescing into the tail literal node while
    /// its buffer has room.
    fn add_byte(&mut self, byte: u8) {
        if let Some(&last) = self.spine.last() {
            if let NodeKind::Literal(lit) = self.arena.kind_mut(last) {
                if lit.push(byte) {
                    return;
                }
            }
        }
        self.append(NodeKind::Literal(Literal::single(byte)));
    }

    /// Wrap the preceding node in a quantifier.
    fn add_quantifier(
        &mut self,
        offset: usize,
        min: usize,
        max: usize,
    ) -> Result<(), ParseError> {
        let last = match self.spine.last().copied() {
            Some(id) if !matches!(self.arena.kind(id), NodeKind::GroupStart { .. }) => id,
            _ => {
                return Err(ParseError::new(
                    offset,
                    ParseErrorKind::NoPreviousExpression,
                ))
            }
        };
        self.spine.pop();

        // The stolen node becomes its own one-node child chain.
        let done = self.arena.alloc(NodeKind::True);
        self.arena.set_next(last, Some(done));

        let repeat = Repeat {
            min,
            max,
            lazy: false,
        };
        let q = self.arena.alloc(NodeKind::Quantifier {
            child: last,
            repeat,
        });
        let tail = self.tail();
        self.arena.set_next(tail, Some(q));
        self.spine.push(q);
        Ok(())
    }

    /// Split the current chain segment into the left arm of an alternation.
    fn alternate(&mut self) {
        let seg_start = self
            .spine
            .iter()
            .rposition(|&id| matches!(self.arena.kind(id), NodeKind::GroupStart { .. }))
            .map_or(0, |i| i + 1);

        if seg_start == self.spine.len() {
            // Nothing on the left: a bare `|` is just a pipe character.
            self.add_byte(b'|');
            return;
        }

        let first = self.spine[seg_start];
        let seg_tail = self.tail();
        let done = self.arena.alloc(NodeKind::True);
        self.arena.set_next(seg_tail, Some(done));
        self.spine.truncate(seg_start);

        let alt = self.arena.alloc(NodeKind::Alternation { child: first });
        let tail = self.tail();
        self.arena.set_next(tail, Some(alt));
        self.spine.push(alt);
    }

    /// Close the nearest open group, or treat `)` as a literal if none.
    fn close_group(&mut self) {
        let Some(g) = self
            .spine
            .iter()
            .rposition(|&id| matches!(self.arena.kind(id), NodeKind::GroupStart { .. }))
        else {
            self.add_byte(b')');
            return;
        };

        let start = self.spine[g];
        let done = self.arena.alloc(NodeKind::True);
        let child = if g + 1 < self.spine.len() {
            let seg_tail = self.tail();
            self.arena.set_next(seg_tail, Some(done));
            self.spine[g + 1]
        } else {
            done
        };

        let kind = match *self.arena.kind(start) {
            NodeKind::GroupStart { kind } => kind,
            _ => GroupKind::default(),
        };
        *self.arena.kind_mut(start) = NodeKind::Group { child, kind };
        self.arena.set_next(start, None);
        self.spine.truncate(g + 1);
    }

    fn parse_fragment(&mut self, cur: &mut Cursor<'_>) -> Result<(), ParseError> {
        let start = cur.pos();
        let Some(c) = cur.next() else {
            return Err(ParseError::new(start, ParseErrorKind::UnexpectedEnd));
        };

        match c {
            b'^' => {
                self.append(NodeKind::AnchorBegin);
            }
            b'$' => {
                self.append(NodeKind::AnchorEnd);
            }
            b'.' => {
                if self.dot_matches_newline {
                    self.append(NodeKind::DotAll);
                } else {
                    self.append(NodeKind::DotNoNewline);
                }
            }
            b'{' => self.parse_brace(cur, start)?,
            b'|' => self.alternate(),
            b'(' => self.open_group(cur, start)?,
            b')' => self.close_group(),
            b'*' => self.add_quantifier(start, 0, usize::MAX)?,
            b'+' => self.add_quantifier(start, 1, usize::MAX)?,
            b'?' => {
                // A `?` directly after a quantifier flips it to lazy.
                let mut made_lazy = false;
                if let Some(id) = self.spine.last().copied() {
                    if let NodeKind::Quantifier { repeat, .. } = self.arena.kind_mut(id) {
                        repeat.lazy = true;
                        made_lazy = true;
                    }
                }
                if !made_lazy {
                    self.add_quantifier(start, 0, 1)?;
                }
            }
            b'\\' => self.parse_escape(cur, start)?,
            b'[' => self.parse_class(cur, start)?,
            _ => self.add_byte(c),
        }
        Ok(())
    }

    /// `{` starts a macro reference, a counted quantifier, or nothing legal.
    fn parse_brace(&mut self, cur: &mut Cursor<'_>, start: usize) -> Result<(), ParseError> {
        if let Some(name_len) = macro_ref_len(cur.rest()) {
            let name = std::str::from_utf8(&cur.rest()[..name_len])
                .map_err(|_| ParseError::new(start, ParseErrorKind::MalformedBrace))?;
            let macros = self.macros;
            let Some(value) = macros.get(name) else {
                return Err(ParseError::new(
                    start,
                    ParseErrorKind::UnknownMacro {
                        name: name.to_string(),
                    },
                ));
            };
            let name = name.to_string();
            cur.bump_by(name_len + 1);

            self.depth += 1;
            if self.depth > MAX_MACRO_DEPTH {
                self.depth -= 1;
                return Err(ParseError::new(start, ParseErrorKind::MacroDepthExceeded));
            }
            let result = self.parse_chain(value.as_bytes());
            self.depth -= 1;
            result.map_err(|source| {
                ParseError::new(
                    start,
                    ParseErrorKind::InMacro {
                        name,
                        source: Box::new(source),
                    },
                )
            })
        } else if quantifier_ref_is_valid(cur.rest()) {
            let min = parse_integer(cur);
            let mut max = min;
            if cur.peek() == Some(b',') {
                cur.next();
                max = if cur.peek() == Some(b'}') {
                    usize::MAX
                } else {
                    parse_integer(cur)
                };
            }
            cur.next(); // closing '}'
            self.add_quantifier(start, min, max)
        } else {
            Err(ParseError::new(start, ParseErrorKind::MalformedBrace))
        }
    }

    fn open_group(&mut self, cur: &mut Cursor<'_>, start: usize) -> Result<(), ParseError> {
        let mut kind = GroupKind::default();
        if cur.peek() == Some(b'?') {
            cur.next();
            match cur.peek() {
                Some(b'=') => {
                    cur.next();
                    kind.lookahead = true;
                }
                Some(b'!') => {
                    cur.next();
                    kind.lookahead = true;
                    kind.inverted = true;
                }
                Some(b'<') => {
                    return Err(ParseError::new(
                        start,
                        ParseErrorKind::LookbehindUnsupported,
                    ));
                }
                Some(b':') => {
                    cur.next();
                    kind.noncapturing = true;
                }
                _ => {}
            }
        }
        self.append(NodeKind::GroupStart { kind });
        Ok(())
    }

    /// Top-level `\` escape: `\u` codepoints become UTF-8 literal bytes;
    /// single-member escape classes coalesce as literals; the rest become
    /// class nodes.
    fn parse_escape(&mut self, cur: &mut Cursor<'_>, start: usize) -> Result<(), ParseError> {
        if cur.peek() == Some(b'u') {
            cur.next();
            let cp = parse_codepoint(cur, start)?;
            let ch = char::from_u32(cp)
                .ok_or_else(|| ParseError::new(start, ParseErrorKind::BadCodepoint))?;
            let mut buf = [0u8; 4];
            for &b in ch.encode_utf8(&mut buf).as_bytes() {
                self.add_byte(b);
            }
            return Ok(());
        }

        let class = parse_escape_class(cur, start, ParseErrorKind::BadEscape)?;
        if class.len() == 1 {
            if let Some(b) = class.first() {
                self.add_byte(b);
                return Ok(());
            }
        }
        self.append(NodeKind::Class(class));
        Ok(())
    }

    /// `[...]` bracket expression.
    fn parse_class(&mut self, cur: &mut Cursor<'_>, start: usize) -> Result<(), ParseError> {
        let unterminated = || ParseError::new(start, ParseErrorKind::UnterminatedClass);

        let mut invert = false;
        let mut class = CharClass::EMPTY;
        let mut prev: Option<u8> = None;

        let mut c = cur.next().ok_or_else(unterminated)?;
        if c == b'^' {
            invert = true;
            c = cur.next().ok_or_else(unterminated)?;
        }

        while c != b']' {
            if c == b'\\' {
                let e = parse_escape_class(cur, cur.pos(), ParseErrorKind::BadClassEscape)?;
                class = class.union(e);
                prev = None;
            } else if c == b'-' && (prev.is_none() || cur.peek() == Some(b']')) {
                // First, last, or dangling: a plain dash.
                class.add(b'-');
                prev = Some(b'-');
            } else if c == b'-' {
                let lo = prev.take().unwrap_or(b'-');
                let range_at = cur.pos();
                let mut hi = cur.next().ok_or_else(unterminated)?;
                if hi == b'\\' {
                    let e =
                        parse_escape_class(cur, range_at, ParseErrorKind::BadClassEscape)?;
                    hi = match (e.len(), e.first()) {
                        (1, Some(b)) => b,
                        _ => {
                            return Err(ParseError::new(
                                range_at,
                                ParseErrorKind::BadRangeEndpoint,
                            ))
                        }
                    };
                }
                if lo <= hi {
                    class.add_range(lo, hi);
                }
            } else if c == b'[' && cur.peek() == Some(b':') {
                cur.next();
                let named = parse_posix_name(cur)?;
                class = class.union(named);
                prev = None;
            } else {
                class.add(c);
                prev = Some(c);
            }

            c = cur.next().ok_or_else(unterminated)?;
        }

        if invert {
            class = class.invert();
        }
        self.append(NodeKind::Class(class));
        Ok(())
    }

}

/// `[:name:]` with the leading `[:` already consumed.
fn parse_posix_name(cur: &mut Cursor<'_>) -> Result<CharClass, ParseError> {
    let name_start = cur.pos();
    while cur.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
        cur.next();
    }
    let name = &cur.input[name_start..cur.pos()];
    let class = posix_class(name)
        .ok_or_else(|| ParseError::new(name_start, ParseErrorKind::BadClassName))?;
    if cur.next() != Some(b':') || cur.next() != Some(b']') {
        return Err(ParseError::new(name_start, ParseErrorKind::BadClassName));
    }
    Ok(class)
}

/// Length of the identifier in `{NAME}` if `rest` starts with one,
/// measured up to (not including) the closing brace.
fn macro_ref_len(rest: &[u8]) -> Option<usize> {
    let first = *rest.first()?;
    if !first.is_ascii_alphabetic() && first != b'_' {
        return None;
    }
    for (i, &b) in rest.iter().enumerate().skip(1) {
        if b == b'}' {
            return Some(i);
        }
        if !b.is_ascii_alphanumeric() && b != b'_' {
            return None;
        }
    }
    None
}

/// Does `rest` start with a `{m}`, `{m,}`, or `{m,n}` body (brace already
/// consumed)? Requires at least one digit or a comma form, ending in `}`.
fn quantifier_ref_is_valid(rest: &[u8]) -> bool {
    let mut i = 0;
    while rest.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let digits_before = i > 0;
    let mut has_comma = false;
    if rest.get(i) == Some(&b',') {
        has_comma = true;
        i += 1;
    }
    while rest.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    rest.get(i) == Some(&b'}') && (digits_before || has_comma) && i > 0
}

fn parse_integer(cur: &mut Cursor<'_>) -> usize {
    let mut n = 0usize;
    while let Some(d) = cur.peek().filter(u8::is_ascii_digit) {
        cur.next();
        n = n.saturating_mul(10).saturating_add(usize::from(d - b'0'));
    }
    n
}

fn hex_val(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some(u32::from(b - b'0')),
        b'a'..=b'f' => Some(u32::from(b - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(b - b'A') + 10),
        _ => None,
    }
}

/// `\u{H+}` or `\uHHHH`, with the `u` already consumed.
fn parse_codepoint(cur: &mut Cursor<'_>, start: usize) -> Result<u32, ParseError> {
    let bad = || ParseError::new(start, ParseErrorKind::BadCodepoint);

    if cur.peek() == Some(b'{') {
        cur.next();
        let mut value = 0u32;
        let mut digits = 0;
        loop {
            let b = cur.next().ok_or_else(bad)?;
            if b == b'}' {
                if digits == 0 {
                    return Err(bad());
                }
                return Ok(value);
            }
            let d = hex_val(b).ok_or_else(bad)?;
            value = value.checked_mul(16).ok_or_else(bad)?;
            value |= d;
            digits += 1;
        }
    }

    let mut value = 0u32;
    for _ in 0..4 {
        let b = cur.next().ok_or_else(bad)?;
        let d = hex_val(b).ok_or_else(bad)?;
        value = (value << 4) | d;
    }
    Ok(value)
}

/// Parse one escape after `\` into a character class. Shared between the
/// top level and bracket expressions; the caller picks the error kind.
fn parse_escape_class(
    cur: &mut Cursor<'_>,
    at: usize,
    error_kind: ParseErrorKind,
) -> Result<CharClass, ParseError> {
    let fail = || ParseError::new(at, error_kind.clone());

    let c = cur.next().ok_or_else(fail)?;
    let single = |b: u8| {
        let mut cc = CharClass::EMPTY;
        cc.add(b);
        Ok(cc)
    };

    match c {
        b'a' => single(0x07),
        b'b' => single(0x08),
        b'n' => single(b'\n'),
        b'r' => single(b'\r'),
        b't' => single(b'\t'),
        b'f' => single(0x0c),
        b'v' => single(0x0b),
        b'd' => Ok(CharClass::digit()),
        b'D' => Ok(CharClass::digit().invert()),
        b'w' => Ok(CharClass::word()),
        b'W' => Ok(CharClass::word().invert()),
        b's' => Ok(CharClass::whitespace()),
        b'S' => Ok(CharClass::whitespace().invert()),
        b'c' => match cur.peek() {
            Some(u @ b'A'..=b'Z') => {
                cur.next();
                single(u - b'A' + 1)
            }
            _ => Err(fail()),
        },
        b'x' => {
            let hi = cur.next().and_then(hex_val).ok_or_else(fail)?;
            let lo = cur.next().and_then(hex_val).ok_or_else(fail)?;
            #[allow(clippy::cast_possible_truncation, reason = "two hex digits fit a byte")]
            single(((hi << 4) | lo) as u8)
        }
        b'0' if !cur.peek().is_some_and(|b| (b'0'..=b'7').contains(&b)) => {
            // `\0` not followed by an octal digit is just NUL.
            single(0)
        }
        b'0'..=b'3' => {
            let mut value = u32::from(c - b'0');
            for _ in 0..2 {
                let d = cur.next().ok_or_else(fail)?;
                if !(b'0'..=b'7').contains(&d) {
                    return Err(fail());
                }
                value = (value << 3) | u32::from(d - b'0');
            }
            #[allow(clippy::cast_possible_truncation, reason = "\\377 is the maximum")]
            single(value as u8)
        }
        _ if c.is_ascii_punctuation() => single(c),
        _ => Err(fail()),
    }
}

/// POSIX-style `[:name:]` classes, plus the `ascii` and `word` extensions.
fn posix_class(name: &[u8]) -> Option<CharClass> {
    let mut c = CharClass::EMPTY;
    match name {
        b"ascii" => c.add_range(0x00, 0x7f),
        b"alnum" => {
            c.add_range(b'A', b'Z');
            c.add_range(b'a', b'z');
            c.add_range(b'0', b'9');
        }
        b"alpha" => {
            c.add_range(b'A', b'Z');
            c.add_range(b'a', b'z');
        }
        b"blank" => {
            c.add(b' ');
            c.add(b'\t');
        }
        b"cntrl" => {
            c.add_range(0x00, 0x1f);
            c.add(0x7f);
        }
        b"digit" => c.add_range(b'0', b'9'),
        b"graph" => c.add_range(0x21, 0x7e),
        b"lower" => c.add_range(b'a', b'z'),
        b"print" => c.add_range(0x20, 0x7e),
        b"punct" => {
            for &b in b"[]!\"#$%&'()*+,./:;<=>?@\\^_`{|}~-" {
                c.add(b);
            }
        }
        b"space" => {
            for &b in b" \t\r\n\x0b\x0c" {
                c.add(b);
            }
        }
        b"upper" => c.add_range(b'A', b'Z'),
        b"word" => c = CharClass::word(),
        b"xdigit" => {
            c.add_range(b'A', b'F');
            c.add_range(b'a', b'f');
            c.add_range(b'0', b'9');
        }
        _ => return None,
    }
    Some(c)
}
