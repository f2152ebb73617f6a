//! Macro definitions and the per-translation-unit macro table.
//!
//! Bodies are stored *whitespace-normalized*: leading and trailing
//! whitespace/comment tokens are stripped and every internal run of them
//! collapses to a single synthetic `" "` token. Normalization makes
//! structural equality well-defined, which is what the benign-
//! redefinition rule needs: defining a macro twice is fine exactly when
//! the two definitions are structurally equal.
//!
//! The table is keyed by name through `std`'s default hasher — SipHash
//! with per-process random keys, so macro names from hostile input
//! cannot be used for hash-flooding. The hasher state is injectable for
//! deterministic tests.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;

use crex_lexer::{Token, TokenKind};
use smallvec::SmallVec;

/// Parameter list storage; most macros have a handful at most.
pub type Params = SmallVec<[Token; 4]>;

/// One `#define` entry.
#[derive(Clone, Debug)]
pub struct MacroDef {
    pub name: String,
    /// Function-like (`#define f(a) ...`) vs object-like (`#define x ...`).
    pub is_function: bool,
    pub params: Params,
    /// Whitespace-normalized replacement list.
    pub body: Vec<Token>,
}

impl MacroDef {
    /// `true` when the last parameter is `...`.
    pub fn is_variadic(&self) -> bool {
        self.params
            .last()
            .is_some_and(|p| p.kind == TokenKind::Ellipsis)
    }

    /// Index of the parameter a body identifier refers to, if any.
    ///
    /// For variadic macros, `__VA_ARGS__` refers to the `...` slot.
    pub fn param_index(&self, text: &str) -> Option<usize> {
        if self.is_variadic() && text == "__VA_ARGS__" {
            return Some(self.params.len() - 1);
        }
        self.params
            .iter()
            .position(|p| p.kind != TokenKind::Ellipsis && p.text == text)
    }

    /// Structural equality: same name bytes, same flavor, same parameter
    /// spellings, same normalized body (token content equality).
    pub fn structurally_equal(&self, other: &MacroDef) -> bool {
        self.name == other.name
            && self.is_function == other.is_function
            && token_lists_equal(&self.params, &other.params)
            && token_lists_equal(&self.body, &other.body)
    }
}

fn token_lists_equal(a: &[Token], b: &[Token]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_content(y))
}

/// Strip leading/trailing trivia and collapse internal trivia runs to a
/// single synthetic space token.
pub fn normalize_body(tokens: &[Token]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut pending_space = false;
    for tok in tokens {
        if tok.kind.is_trivia() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(Token::synthetic_space());
            pending_space = false;
        }
        out.push(tok.clone());
    }
    out
}

/// Outcome of a `define` that could not be applied.
#[derive(Debug, PartialEq, Eq)]
pub struct Redefinition {
    pub name: String,
}

/// The `#define` table for one translation unit.
#[derive(Debug, Default)]
pub struct MacroTable {
    map: HashMap<String, MacroDef, RandomState>,
}

impl MacroTable {
    pub fn new() -> MacroTable {
        MacroTable::default()
    }

    /// Build with explicit hasher state (pinned by tests).
    pub fn with_hasher(state: RandomState) -> MacroTable {
        MacroTable {
            map: HashMap::with_hasher(state),
        }
    }

    /// Add a definition. The body is normalized here.
    ///
    /// Redefining a name with a structurally equal definition succeeds
    /// and keeps the original; a differing definition is rejected.
    pub fn define(
        &mut self,
        name: &Token,
        is_function: bool,
        params: Params,
        body: &[Token],
    ) -> Result<(), Redefinition> {
        let candidate = MacroDef {
            name: name.text.clone(),
            is_function,
            params,
            body: normalize_body(body),
        };

        if let Some(existing) = self.map.get(&candidate.name) {
            if existing.structurally_equal(&candidate) {
                return Ok(());
            }
            return Err(Redefinition {
                name: candidate.name,
            });
        }

        self.map.insert(candidate.name.clone(), candidate);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroDef> {
        self.map.get(name)
    }

    /// Remove a definition; absent names are fine.
    pub fn undef(&mut self, name: &str) -> bool {
        self.map.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token::new(kind, text, 1, 1)
    }

    fn ident(text: &str) -> Token {
        tok(TokenKind::Identifier, text)
    }

    fn ws(text: &str) -> Token {
        tok(TokenKind::Whitespace, text)
    }

    // === Normalization ===

    #[test]
    fn normalize_strips_ends_and_collapses_runs() {
        let body = [
            ws("  "),
            ident("a"),
            ws(" "),
            tok(TokenKind::Comment, "/* x */"),
            ws("\t"),
            ident("b"),
            ws("   "),
        ];
        let normalized = normalize_body(&body);
        let texts: Vec<&str> = normalized.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["a", " ", "b"]);
        assert_eq!(normalized[1].kind, TokenKind::Whitespace);
    }

    #[test]
    fn normalize_is_a_fixed_point() {
        let body = [ws(" "), ident("x"), ws(" "), ident("y"), ws(" ")];
        let once = normalize_body(&body);
        let twice = normalize_body(&once);
        assert!(token_lists_equal(&once, &twice));
    }

    #[test]
    fn normalize_empty_body() {
        assert!(normalize_body(&[]).is_empty());
        assert!(normalize_body(&[ws(" "), ws("\t")]).is_empty());
    }

    // === Redefinition rule (invariant 3) ===

    #[test]
    fn identical_redefinition_is_ok() {
        let mut table = MacroTable::new();
        let name = ident("X");
        let body = [ident("1")];
        assert!(table.define(&name, false, Params::new(), &body).is_ok());
        assert!(table.define(&name, false, Params::new(), &body).is_ok());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn equivalent_whitespace_redefinition_is_ok() {
        let mut table = MacroTable::new();
        let name = ident("X");
        let body_a = [ident("a"), ws(" "), ident("b")];
        let body_b = [ws("  "), ident("a"), ws("\t\t"), ident("b"), ws(" ")];
        assert!(table.define(&name, false, Params::new(), &body_a).is_ok());
        assert!(table.define(&name, false, Params::new(), &body_b).is_ok());
    }

    #[test]
    fn differing_redefinition_is_rejected() {
        let mut table = MacroTable::new();
        let name = ident("X");
        assert!(table
            .define(&name, false, Params::new(), &[ident("1")])
            .is_ok());
        let err = table
            .define(&name, false, Params::new(), &[ident("2")])
            .expect_err("must reject");
        assert_eq!(err.name, "X");
    }

    #[test]
    fn object_vs_function_flavor_differs() {
        let mut table = MacroTable::new();
        let name = ident("X");
        let body = [ident("1")];
        assert!(table.define(&name, false, Params::new(), &body).is_ok());
        assert!(table.define(&name, true, Params::new(), &body).is_err());
    }

    #[test]
    fn differing_params_are_rejected() {
        let mut table = MacroTable::new();
        let name = ident("f");
        let body = [ident("a")];
        let params_a: Params = SmallVec::from_vec(vec![ident("a")]);
        let params_b: Params = SmallVec::from_vec(vec![ident("b")]);
        assert!(table.define(&name, true, params_a, &body).is_ok());
        assert!(table.define(&name, true, params_b, &body).is_err());
    }

    // === Lookup / undef ===

    #[test]
    fn lookup_and_undef() {
        let mut table = MacroTable::new();
        table
            .define(&ident("X"), false, Params::new(), &[ident("1")])
            .expect("define");
        assert!(table.lookup("X").is_some());
        assert!(table.lookup("Y").is_none());

        assert!(table.undef("X"));
        assert!(!table.undef("X"), "undef of absent name is a quiet no-op");
        assert!(table.lookup("X").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn with_hasher_is_deterministic_per_state() {
        let table = MacroTable::with_hasher(RandomState::new());
        assert!(table.is_empty());
    }

    // === Variadic helpers ===

    #[test]
    fn variadic_detection_and_va_args() {
        let params: Params =
            SmallVec::from_vec(vec![ident("a"), tok(TokenKind::Ellipsis, "...")]);
        let mac = MacroDef {
            name: "f".to_string(),
            is_function: true,
            params,
            body: Vec::new(),
        };
        assert!(mac.is_variadic());
        assert_eq!(mac.param_index("a"), Some(0));
        assert_eq!(mac.param_index("__VA_ARGS__"), Some(1));
        assert_eq!(mac.param_index("b"), None);
    }

    // === Property tests ===

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn token_strategy() -> impl Strategy<Value = Token> {
            prop_oneof![
                Just(tok(TokenKind::Identifier, "x")),
                Just(tok(TokenKind::Identifier, "y")),
                Just(tok(TokenKind::Integer, "1")),
                Just(tok(TokenKind::Op, "+")),
                Just(ws(" ")),
                Just(ws("\t \t")),
                Just(tok(TokenKind::Comment, "/* c */")),
            ]
        }

        proptest! {
            #[test]
            fn normalization_fixed_point(body in proptest::collection::vec(token_strategy(), 0..24)) {
                let once = normalize_body(&body);
                let twice = normalize_body(&once);
                prop_assert!(token_lists_equal(&once, &twice));
            }

            #[test]
            fn normalized_bodies_never_start_or_end_with_trivia(
                body in proptest::collection::vec(token_strategy(), 0..24)
            ) {
                let normalized = normalize_body(&body);
                if let Some(first) = normalized.first() {
                    prop_assert!(!first.kind.is_trivia());
                }
                if let Some(last) = normalized.last() {
                    prop_assert!(!last.kind.is_trivia());
                }
            }
        }
    }
}
