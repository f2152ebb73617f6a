//! The C lexer: a regex engine loaded with the C token patterns.
//!
//! Patterns follow the classic lex grammar for C, composed from named
//! macros (`{D}`, `{WS2}`, `{SPLICE}`, ...). Longest match wins and
//! registration order breaks ties, which is how `#ifdef` beats `#if`,
//! keywords beat identifiers, and `##` beats `#`.
//!
//! Line splices (`\` at end of line) are not a separate translation
//! phase: the whitespace and comment patterns absorb them, so a spliced
//! line keeps flowing as one logical line without any buffer rewriting.

use crex_regex::{Engine, EngineFlags, ParseError, Position};

use crate::token::{Token, TokenKind};

/// Named subexpressions shared by the token patterns.
const C_MACROS: &[(&str, &str)] = &[
    ("O", "[0-7]"),
    ("D", "[0-9]"),
    ("NZ", "[1-9]"),
    ("L", "[a-zA-Z_]"),
    ("A", "[a-zA-Z_0-9]"),
    ("H", "[a-fA-F0-9]"),
    ("HP", "(0[xX])"),
    ("E", "([Ee][+-]?{D}+)"),
    ("P", "([Pp][+-]?{D}+)"),
    ("FS", "(f|F|l|L)"),
    ("IS", "(((u|U)(l|L|ll|LL)?)|((l|L|ll|LL)(u|U)?))"),
    ("CP", "(u|U|L)"),
    ("SP", "(u8|u|U|L)"),
    ("ES", r#"(\\(['"\?\\abfnrtv]|[0-7]{1,3}|x[a-fA-F0-9]+))"#),
    ("WS", r"[ \t\v\n\f\r]"),
    ("WS2", r"[ \t\v\f\r]"),
    ("SPLICE", r"\\[\r]*[\n]"),
];

/// The token patterns, in registration (tie-break) order.
const C_PATTERNS: &[(TokenKind, &str)] = &[
    (TokenKind::Op, r"\*"),
    (TokenKind::Include, r##"#{WS2}*include{WS2}*"[^\n"]+""##),
    (TokenKind::Include, r"#{WS2}*include{WS2}*<[^\n>]+>"),
    (TokenKind::Newline, r"\n"),
    (TokenKind::Whitespace, r"{WS2}+"),
    (TokenKind::Whitespace, r"{WS2}*({SPLICE}+{WS2}*)+"),
    (TokenKind::Define, r"#{WS2}*define"),
    (TokenKind::Elif, r"#{WS2}*elif"),
    (TokenKind::Else, r"#{WS2}*else"),
    (TokenKind::Endif, r"#{WS2}*endif"),
    (TokenKind::Error, r"#{WS2}*error"),
    (TokenKind::If, r"#{WS2}*if"),
    (TokenKind::Ifdef, r"#{WS2}*ifdef"),
    (TokenKind::Ifndef, r"#{WS2}*ifndef"),
    (TokenKind::Line, r"#{WS2}*line"),
    (TokenKind::Pragma, r"#{WS2}*pragma"),
    (TokenKind::Undef, r"#{WS2}*undef"),
    (TokenKind::Warning, r"#{WS2}*warning"),
    // Integers: hex, decimal, octal, character constant.
    (TokenKind::Integer, "{HP}{H}+{IS}?"),
    (TokenKind::Integer, "{NZ}{D}*{IS}?"),
    (TokenKind::Integer, "0{O}*{IS}?"),
    (TokenKind::Integer, r"{CP}?'([^'\\\n]|{ES})+'"),
    (TokenKind::Float, "{D}+{E}{FS}?"),
    (TokenKind::Float, r"{D}*\.{D}+{E}?{FS}?"),
    (TokenKind::Float, r"{D}+\.{E}?{FS}?"),
    (TokenKind::Float, "{HP}{H}+{P}{FS}?"),
    (TokenKind::Float, r"{HP}{H}*\.{H}+{P}{FS}?"),
    (TokenKind::Float, r"{HP}{H}+\.{P}{FS}?"),
    // Adjacent string literals concatenate; only horizontal whitespace
    // may sit between them so the logical-line newline survives.
    (TokenKind::StringLit, r#"({SP}?"([^"\\\n]|{ES})*"{WS2}*)+"#),
    (TokenKind::Keyword, "auto"),
    (TokenKind::Keyword, "break"),
    (TokenKind::Keyword, "case"),
    (TokenKind::Keyword, "char"),
    (TokenKind::Keyword, "const"),
    (TokenKind::Keyword, "continue"),
    (TokenKind::Keyword, "default"),
    (TokenKind::Keyword, "do"),
    (TokenKind::Keyword, "double"),
    (TokenKind::Keyword, "else"),
    (TokenKind::Keyword, "enum"),
    (TokenKind::Keyword, "extern"),
    (TokenKind::Keyword, "float"),
    (TokenKind::Keyword, "for"),
    (TokenKind::Keyword, "goto"),
    (TokenKind::Keyword, "if"),
    (TokenKind::Keyword, "inline"),
    (TokenKind::Keyword, "int"),
    (TokenKind::Keyword, "long"),
    (TokenKind::Keyword, "register"),
    (TokenKind::Keyword, "restrict"),
    (TokenKind::Keyword, "return"),
    (TokenKind::Keyword, "short"),
    (TokenKind::Keyword, "signed"),
    (TokenKind::Keyword, "sizeof"),
    (TokenKind::Keyword, "static"),
    (TokenKind::Keyword, "struct"),
    (TokenKind::Keyword, "switch"),
    (TokenKind::Keyword, "typedef"),
    (TokenKind::Keyword, "union"),
    (TokenKind::Keyword, "unsigned"),
    (TokenKind::Keyword, "void"),
    (TokenKind::Keyword, "volatile"),
    (TokenKind::Keyword, "while"),
    (TokenKind::Keyword, "_Alignas"),
    (TokenKind::Keyword, "_Alignof"),
    (TokenKind::Keyword, "_Atomic"),
    (TokenKind::Keyword, "_Bool"),
    (TokenKind::Keyword, "_Complex"),
    (TokenKind::Keyword, "_Generic"),
    (TokenKind::Keyword, "_Imaginary"),
    (TokenKind::Keyword, "_Noreturn"),
    (TokenKind::Keyword, "_Static_assert"),
    (TokenKind::Keyword, "_Thread_local"),
    (TokenKind::Keyword, "__func__"),
    (TokenKind::Ellipsis, r"\.\.\."),
    (TokenKind::Op, ">>="),
    (TokenKind::Op, "<<="),
    (TokenKind::Op, r"\+="),
    (TokenKind::Op, "-="),
    (TokenKind::Op, r"\*="),
    (TokenKind::Op, "/="),
    (TokenKind::Op, "%="),
    (TokenKind::Op, "&="),
    (TokenKind::Op, r"\^="),
    (TokenKind::Op, r"\|="),
    (TokenKind::Op, ">>"),
    (TokenKind::Op, "<<"),
    (TokenKind::Op, r"\+\+"),
    (TokenKind::Op, "--"),
    (TokenKind::Op, "->"),
    (TokenKind::Op, "&&"),
    (TokenKind::Op, r"\|\|"),
    (TokenKind::Op, "<="),
    (TokenKind::Op, ">="),
    (TokenKind::Op, "=="),
    (TokenKind::Op, "!="),
    (TokenKind::Op, ";"),
    (TokenKind::Op, r"\{"),
    (TokenKind::Op, "<%"),
    (TokenKind::Op, r"\}"),
    (TokenKind::Op, "%>"),
    (TokenKind::Comma, ","),
    (TokenKind::Op, ":"),
    (TokenKind::Op, "="),
    (TokenKind::ParenOpen, r"\("),
    (TokenKind::ParenClose, r"\)"),
    (TokenKind::Op, r"\["),
    (TokenKind::Op, "<:"),
    (TokenKind::Op, r"\]"),
    (TokenKind::Op, ":>"),
    (TokenKind::Op, r"\."),
    (TokenKind::Op, "&"),
    (TokenKind::Op, "!"),
    (TokenKind::Op, "~"),
    (TokenKind::Op, "-"),
    (TokenKind::Op, r"\+"),
    (TokenKind::Op, "/"),
    (TokenKind::Op, "%"),
    (TokenKind::Op, "<"),
    (TokenKind::Op, ">"),
    (TokenKind::Op, r"\^"),
    (TokenKind::Op, r"\|"),
    (TokenKind::Op, r"\?"),
    (TokenKind::PoundPound, "##"),
    (TokenKind::Pound, "#"),
    (TokenKind::Defined, "defined"),
    (TokenKind::Identifier, "{L}{A}*"),
    (TokenKind::Comment, r"\/\*.*?\*\/"),
    (TokenKind::Comment, r"\/\/.*?(?=\n)"),
    (TokenKind::Comment, r"\/\/([^\n]*?{SPLICE})+[^\n]*?(?=\n)"),
];

/// Lexer for C source, driven by the pattern registry above.
pub struct CLexer {
    engine: Engine,
    eof_newline_emitted: bool,
    saved_eof: Vec<bool>,
}

impl CLexer {
    /// Build the lexer: register every macro and pattern.
    ///
    /// Fails only if the built-in tables are broken, which a unit test
    /// pins down; callers still propagate the error rather than panic.
    pub fn new() -> Result<CLexer, ParseError> {
        let mut engine = Engine::new(EngineFlags::empty());
        for &(name, value) in C_MACROS {
            engine.add_macro(name, value)?;
        }
        for &(kind, pattern) in C_PATTERNS {
            engine.add_pattern(pattern, kind as usize)?;
        }
        Ok(CLexer {
            engine,
            eof_newline_emitted: false,
            saved_eof: Vec::new(),
        })
    }

    /// Lex the next token from `buf` at `*offset`.
    ///
    /// At end of input a synthetic `Newline` is returned exactly once,
    /// then `None`. A byte no pattern matches comes back as a
    /// length-one `BadChar` token.
    pub fn next_token(&mut self, buf: &str, offset: &mut usize) -> Option<Token> {
        let bytes = buf.as_bytes();

        if *offset >= bytes.len() {
            if self.eof_newline_emitted {
                return None;
            }
            self.eof_newline_emitted = true;
            let pos = self.engine.position();
            self.engine.set_position(Position {
                line: pos.line + 1,
                col: 1,
            });
            return Some(Token::new(TokenKind::Newline, "\n", pos.line, pos.col));
        }

        let start = *offset;
        match self.engine.lex_token(bytes, offset) {
            Some(lexed) => {
                let text = String::from_utf8_lossy(&bytes[lexed.start..lexed.start + lexed.len]);
                let kind = TokenKind::from_id(lexed.id).unwrap_or(TokenKind::BadChar);
                Some(Token::new(kind, text, lexed.line, lexed.col))
            }
            None => {
                // No pattern consumed this byte. Take one byte and move on;
                // the caller decides whether that is fatal.
                let pos = self.engine.position();
                let text = String::from_utf8_lossy(&bytes[start..start + 1]);
                *offset = start + 1;
                self.engine.set_position(Position {
                    line: pos.line,
                    col: pos.col + 1,
                });
                Some(Token::new(TokenKind::BadChar, text, pos.line, pos.col))
            }
        }
    }

    /// Save position state and start fresh for a nested file.
    pub fn push_context(&mut self) {
        self.engine.push_position();
        self.saved_eof.push(self.eof_newline_emitted);
        self.eof_newline_emitted = false;
    }

    /// Restore the state saved by the matching [`CLexer::push_context`].
    pub fn pop_context(&mut self) {
        self.engine.pop_position();
        if let Some(saved) = self.saved_eof.pop() {
            self.eof_newline_emitted = saved;
        }
    }

    /// Current line/column counters.
    pub fn position(&self) -> Position {
        self.engine.position()
    }

    /// Overwrite the line counter (used by `#line`).
    pub fn set_position(&mut self, pos: Position) {
        self.engine.set_position(pos);
    }
}

impl std::fmt::Debug for CLexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CLexer")
            .field("engine", &self.engine)
            .field("eof_newline_emitted", &self.eof_newline_emitted)
            .finish_non_exhaustive()
    }
}
