//! Token kinds and the token type produced by the C lexer.
//!
//! # Discriminant Layout
//!
//! Variants sit in semantic ranges with gaps for future expansion:
//!
//! | Range | Category             |
//! |-------|----------------------|
//! | 0-15  | Source tokens        |
//! | 32-63 | Preprocessing tokens |
//! | 255   | Error sentinel       |
//!
//! The discriminant doubles as the pattern id registered with the regex
//! engine, so the mapping between a winning pattern and its token kind
//! is a cast in one direction and [`TokenKind::from_id`] in the other.

/// Kind of a lexed C token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    // === Source tokens (0-15) ===
    Keyword = 0,
    Identifier = 1,
    Integer = 2,
    Float = 3,
    StringLit = 4,
    Op = 5,
    Whitespace = 6,
    Comment = 7,
    Newline = 8,
    Comma = 9,
    ParenOpen = 10,
    ParenClose = 11,
    /// `...`
    Ellipsis = 12,

    // === Preprocessing tokens (32-63) ===
    /// Stringizing `#` (also the start of an unrecognized directive).
    Pound = 32,
    /// Token-pasting `##`.
    PoundPound = 33,
    Define = 34,
    Include = 35,
    Ifdef = 36,
    Ifndef = 37,
    If = 38,
    Elif = 39,
    Else = 40,
    Endif = 41,
    Line = 42,
    Undef = 43,
    Error = 44,
    Warning = 45,
    Pragma = 46,
    Defined = 47,

    // === Error sentinel (255) ===
    /// A byte no pattern matched; emitted with length 1.
    BadChar = 255,
}

impl TokenKind {
    /// Reverse of `kind as usize` for pattern-id mapping.
    pub fn from_id(id: usize) -> Option<TokenKind> {
        let kind = match id {
            0 => TokenKind::Keyword,
            1 => TokenKind::Identifier,
            2 => TokenKind::Integer,
            3 => TokenKind::Float,
            4 => TokenKind::StringLit,
            5 => TokenKind::Op,
            6 => TokenKind::Whitespace,
            7 => TokenKind::Comment,
            8 => TokenKind::Newline,
            9 => TokenKind::Comma,
            10 => TokenKind::ParenOpen,
            11 => TokenKind::ParenClose,
            12 => TokenKind::Ellipsis,
            32 => TokenKind::Pound,
            33 => TokenKind::PoundPound,
            34 => TokenKind::Define,
            35 => TokenKind::Include,
            36 => TokenKind::Ifdef,
            37 => TokenKind::Ifndef,
            38 => TokenKind::If,
            39 => TokenKind::Elif,
            40 => TokenKind::Else,
            41 => TokenKind::Endif,
            42 => TokenKind::Line,
            43 => TokenKind::Undef,
            44 => TokenKind::Error,
            45 => TokenKind::Warning,
            46 => TokenKind::Pragma,
            47 => TokenKind::Defined,
            255 => TokenKind::BadChar,
            _ => return None,
        };
        Some(kind)
    }

    /// Whitespace and comments — skipped by `trim` operations, collapsed
    /// by macro-body normalization.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Tokens that can name a macro or be replaced by one. `defined` is
    /// an ordinary identifier outside `#if` conditions.
    pub fn is_identifier_like(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::Keyword | TokenKind::Defined
        )
    }

    /// The `#if`-family tokens that open a conditional group.
    pub fn opens_conditional(self) -> bool {
        matches!(self, TokenKind::If | TokenKind::Ifdef | TokenKind::Ifndef)
    }

    /// Any of the fused `#name` directive tokens.
    pub fn is_directive(self) -> bool {
        matches!(
            self,
            TokenKind::Define
                | TokenKind::Include
                | TokenKind::Ifdef
                | TokenKind::Ifndef
                | TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::Endif
                | TokenKind::Line
                | TokenKind::Undef
                | TokenKind::Error
                | TokenKind::Warning
                | TokenKind::Pragma
        )
    }

    /// Map a directive name (as spelled after a bare `#`) to its kind.
    pub fn directive_from_name(name: &str) -> Option<TokenKind> {
        let kind = match name {
            "define" => TokenKind::Define,
            "include" => TokenKind::Include,
            "ifdef" => TokenKind::Ifdef,
            "ifndef" => TokenKind::Ifndef,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "endif" => TokenKind::Endif,
            "line" => TokenKind::Line,
            "undef" => TokenKind::Undef,
            "error" => TokenKind::Error,
            "warning" => TokenKind::Warning,
            "pragma" => TokenKind::Pragma,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable label used by the token dump.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Integer => "INTEGER",
            TokenKind::Float => "FLOAT",
            TokenKind::StringLit => "STRING",
            TokenKind::Op => "OPERATOR",
            TokenKind::Whitespace => "\" \"",
            TokenKind::Comment => "/* */",
            TokenKind::Newline => "\"\\n\"",
            TokenKind::Comma => ",",
            TokenKind::ParenOpen => "(",
            TokenKind::ParenClose => ")",
            TokenKind::Ellipsis => "...",
            TokenKind::Pound => "#",
            TokenKind::PoundPound => "##",
            TokenKind::Define => "#define",
            TokenKind::Include => "#include",
            TokenKind::Ifdef => "#ifdef",
            TokenKind::Ifndef => "#ifndef",
            TokenKind::If => "#if",
            TokenKind::Elif => "#elif",
            TokenKind::Else => "#else",
            TokenKind::Endif => "#endif",
            TokenKind::Line => "#line",
            TokenKind::Undef => "#undef",
            TokenKind::Error => "#error",
            TokenKind::Warning => "#warning",
            TokenKind::Pragma => "#pragma",
            TokenKind::Defined => "defined",
            TokenKind::BadChar => "BADCHAR",
        }
    }
}

/// One lexed token.
///
/// Tokens own their text: synthetic tokens (the collapsed `" "` of
/// macro-body normalization, the end-of-file newline, pasted tokens)
/// have no backing source bytes, and owned text keeps tokens alive
/// independently of the include-file stack.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line of the token's first byte.
    pub line: u32,
    /// 1-based column of the token's first byte.
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, col: u32) -> Token {
        Token {
            kind,
            text: text.into(),
            line,
            col,
        }
    }

    /// The single-space whitespace token used when normalizing macro
    /// bodies.
    pub fn synthetic_space() -> Token {
        Token::new(TokenKind::Whitespace, " ", 0, 0)
    }

    /// Content equality: same kind, and byte-equal text — except that
    /// any two whitespace tokens (or any two comments) compare equal
    /// regardless of their spelling.
    pub fn same_content(&self, other: &Token) -> bool {
        if self.kind != other.kind {
            return false;
        }
        if self.kind.is_trivia() {
            return true;
        }
        self.text == other.text
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip() {
        for kind in [
            TokenKind::Keyword,
            TokenKind::Identifier,
            TokenKind::Ellipsis,
            TokenKind::Pound,
            TokenKind::PoundPound,
            TokenKind::Defined,
            TokenKind::BadChar,
        ] {
            assert_eq!(TokenKind::from_id(kind as usize), Some(kind));
        }
        assert_eq!(TokenKind::from_id(200), None);
    }

    #[test]
    fn directive_names_map_to_kinds() {
        assert_eq!(
            TokenKind::directive_from_name("define"),
            Some(TokenKind::Define)
        );
        assert_eq!(
            TokenKind::directive_from_name("warning"),
            Some(TokenKind::Warning)
        );
        assert_eq!(TokenKind::directive_from_name("definitely_not"), None);
    }

    #[test]
    fn content_equality_ignores_trivia_text() {
        let a = Token::new(TokenKind::Whitespace, "   ", 1, 1);
        let b = Token::new(TokenKind::Whitespace, "\t", 9, 4);
        assert!(a.same_content(&b));

        let c1 = Token::new(TokenKind::Comment, "/* one */", 1, 1);
        let c2 = Token::new(TokenKind::Comment, "// other", 2, 1);
        assert!(c1.same_content(&c2));
    }

    #[test]
    fn content_equality_compares_bytes_otherwise() {
        let a = Token::new(TokenKind::Identifier, "foo", 1, 1);
        let b = Token::new(TokenKind::Identifier, "foo", 5, 9);
        let c = Token::new(TokenKind::Identifier, "bar", 1, 1);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));

        let kw = Token::new(TokenKind::Keyword, "foo", 1, 1);
        assert!(!a.same_content(&kw));
    }
}
