//! The phase-3 directive state machine.
//!
//! A [`TranslationUnit`] pulls tokens from the current source file (an
//! include pushes a new file onto the stack; end of file pops back) and
//! walks logical lines. Lines that do not start with `#` stream through
//! the *add-token* path, where identifiers are replaced by their macro
//! definitions. Lines that do start with `#` dispatch to a directive
//! handler.
//!
//! Conditional inclusion runs in two modes. The kept branch of an
//! `#if`-family group stays in parse mode. Dead branches run in *skip*
//! mode: tokens are consumed but nothing is defined, included, or
//! emitted, nested groups are skipped whole, and unmatchable bytes
//! (`BadChar`) are tolerated. Skip mode ends at the `#elif`/`#else`/
//! `#endif` that changes the current group's state.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crex_diagnostic::{Diagnostic, DiagnosticQueue};
use crex_lexer::{CLexer, Token, TokenKind};
use crex_regex::Position;
use tracing::debug;

use crate::error::PreprocError;
use crate::macro_table::{MacroDef, MacroTable, Params};
use crate::source::{FileLoader, FsLoader, SourceFile};

/// Include nesting limit; deeper nesting is almost always a cycle.
const MAX_INCLUDE_DEPTH: usize = 32;

/// State for one open `#if`-family group whose kept branch is being
/// parsed.
#[derive(Debug)]
struct Conditional {
    /// The kept branch is the `#else` branch; further `#elif`/`#else`
    /// are errors.
    in_else: bool,
    /// Line of the opening directive, for unterminated-group reports.
    line: u32,
}

/// How a dead branch ended.
enum BranchEvent {
    Elif(Token),
    Else(Token),
    Endif(Token),
}

/// One root source file plus everything included into it.
pub struct TranslationUnit {
    lexer: CLexer,
    macros: MacroTable,
    files: Vec<SourceFile>,
    pending: VecDeque<Token>,
    output: Vec<Token>,
    diags: DiagnosticQueue,
    loader: Box<dyn FileLoader>,
    cond_stack: Vec<Conditional>,
    root_path: PathBuf,
}

impl TranslationUnit {
    /// Open `path` through the filesystem loader.
    pub fn open(path: impl AsRef<Path>) -> Result<TranslationUnit, PreprocError> {
        TranslationUnit::open_with(path, Box::new(FsLoader), DiagnosticQueue::new())
    }

    /// Open with an explicit loader and diagnostic queue.
    pub fn open_with(
        path: impl AsRef<Path>,
        loader: Box<dyn FileLoader>,
        diags: DiagnosticQueue,
    ) -> Result<TranslationUnit, PreprocError> {
        let lexer = CLexer::new()?;
        TranslationUnit::open_with_lexer(path, lexer, loader, diags)
    }

    /// Open reusing an already-built lexer. Compiling the pattern
    /// tables is the expensive part of setup, so drivers processing
    /// many units can share one.
    pub fn open_with_lexer(
        path: impl AsRef<Path>,
        lexer: CLexer,
        mut loader: Box<dyn FileLoader>,
        diags: DiagnosticQueue,
    ) -> Result<TranslationUnit, PreprocError> {
        let path = path.as_ref().to_path_buf();
        let buf = loader.load(&path).map_err(|source| PreprocError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(TranslationUnit {
            lexer,
            macros: MacroTable::new(),
            files: vec![SourceFile::new(path.clone(), buf)],
            pending: VecDeque::new(),
            output: Vec::new(),
            diags,
            loader,
            cond_stack: Vec::new(),
            root_path: path,
        })
    }

    /// Run the preprocessor over the whole translation unit.
    pub fn parse(&mut self) -> Result<(), PreprocError> {
        let mut at_line_start = true;
        while let Some(tok) = self.next_token() {
            if tok.kind.is_trivia() {
                self.output.push(tok);
                continue;
            }
            if tok.kind == TokenKind::Newline {
                self.output.push(tok);
                at_line_start = true;
                continue;
            }
            if tok.kind == TokenKind::BadChar {
                return Err(self.fatal(&tok, "unknown token"));
            }
            if at_line_start && (tok.kind.is_directive() || tok.kind == TokenKind::Pound) {
                self.dispatch_directive(&tok)?;
                at_line_start = true;
                continue;
            }
            at_line_start = false;
            self.add_token(tok)?;
        }

        if let Some(open) = self.cond_stack.pop() {
            return Err(self.fatal_at(open.line, 1, "unterminated #if"));
        }
        Ok(())
    }

    /// The emitted token stream, in add-token order.
    pub fn output(&self) -> &[Token] {
        &self.output
    }

    pub fn into_output(self) -> Vec<Token> {
        self.output
    }

    /// Reconstruct the preprocessed text from the emitted tokens.
    pub fn output_text(&self) -> String {
        self.output.iter().map(|t| t.text.as_str()).collect()
    }

    pub fn diagnostics(&self) -> &DiagnosticQueue {
        &self.diags
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    // === Token plumbing ===

    fn next_token(&mut self) -> Option<Token> {
        if let Some(tok) = self.pending.pop_front() {
            return Some(tok);
        }
        loop {
            let file = self.files.last_mut()?;
            let SourceFile { buf, offset, .. } = file;
            if let Some(tok) = self.lexer.next_token(buf, offset) {
                return Some(tok);
            }
            self.files.pop();
            if self.files.is_empty() {
                return None;
            }
            self.lexer.pop_context();
        }
    }

    fn push_back(&mut self, tok: Token) {
        self.pending.push_front(tok);
    }

    /// Skip whitespace/comments, returning the next significant token
    /// (`Newline` counts as significant).
    fn next_significant(&mut self, context: &Token) -> Result<Token, PreprocError> {
        loop {
            let Some(tok) = self.next_token() else {
                return Err(self.fatal(context, "unexpected end of file"));
            };
            if !tok.kind.is_trivia() {
                return Ok(tok);
            }
        }
    }

    /// Consume everything up to and including the next newline.
    fn skip_rest_of_line(&mut self) -> Result<(), PreprocError> {
        loop {
            match self.next_token() {
                None => return Ok(()),
                Some(tok) if tok.kind == TokenKind::Newline => return Ok(()),
                Some(_) => {}
            }
        }
    }

    /// Require that only trivia remains before the newline.
    fn expect_end_of_line(&mut self) -> Result<(), PreprocError> {
        loop {
            let Some(tok) = self.next_token() else {
                return Ok(());
            };
            if tok.kind.is_trivia() {
                continue;
            }
            if tok.kind == TokenKind::Newline {
                return Ok(());
            }
            return Err(self.fatal(&tok, "extra tokens after preprocessing directive"));
        }
    }

    // === Diagnostics ===

    fn current_path(&self) -> PathBuf {
        self.files
            .last()
            .map_or_else(|| self.root_path.clone(), |f| f.display_path.clone())
    }

    fn fatal_at(&mut self, line: u32, col: u32, msg: impl Into<String>) -> PreprocError {
        let diag = Diagnostic::error(&self.current_path(), line, col, msg);
        self.diags.emit(diag.clone());
        PreprocError::Fatal(diag)
    }

    fn fatal(&mut self, tok: &Token, msg: impl Into<String>) -> PreprocError {
        self.fatal_at(tok.line, tok.col, msg)
    }

    fn warn(&mut self, tok: &Token, msg: impl Into<String>) {
        let diag = Diagnostic::warning(&self.current_path(), tok.line, tok.col, msg);
        self.diags.emit(diag);
    }

    // === Directive dispatch ===

    fn dispatch_directive(&mut self, tok: &Token) -> Result<(), PreprocError> {
        let kind = if tok.kind == TokenKind::Pound {
            match self.read_directive_name()? {
                Some(kind) => kind,
                None => return Ok(()), // null directive
            }
        } else {
            tok.kind
        };
        debug!(directive = kind.name(), line = tok.line, "directive");

        match kind {
            TokenKind::Define => self.process_define(tok),
            TokenKind::Undef => self.process_undef(tok),
            TokenKind::Include => self.process_include(tok),
            TokenKind::Ifdef => self.process_ifdef(tok, false),
            TokenKind::Ifndef => self.process_ifdef(tok, true),
            TokenKind::If => self.process_if(tok),
            TokenKind::Elif | TokenKind::Else => self.process_branch_in_kept(tok, kind),
            TokenKind::Endif => self.process_endif(tok),
            TokenKind::Line => self.process_line_directive(tok),
            TokenKind::Error => self.process_error_directive(tok),
            TokenKind::Warning => self.process_warning_directive(tok),
            TokenKind::Pragma => self.skip_rest_of_line(),
            _ => Err(self.fatal(tok, "invalid preprocessing directive")),
        }
    }

    /// After a bare `#`: trim, then read the directive name.
    fn read_directive_name(&mut self) -> Result<Option<TokenKind>, PreprocError> {
        loop {
            let Some(tok) = self.next_token() else {
                return Ok(None);
            };
            if tok.kind.is_trivia() {
                continue;
            }
            if tok.kind == TokenKind::Newline {
                return Ok(None);
            }
            if tok.kind.is_identifier_like() {
                return match TokenKind::directive_from_name(&tok.text) {
                    Some(kind) => Ok(Some(kind)),
                    None => Err(self.fatal(&tok, "invalid preprocessing directive")),
                };
            }
            return Err(self.fatal(&tok, "invalid preprocessing directive"));
        }
    }

    // === #define / #undef ===

    fn process_define(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let name = self.next_significant(directive)?;
        if name.kind == TokenKind::Newline {
            return Err(self.fatal(&name, "missing macro name"));
        }
        if !name.kind.is_identifier_like() {
            return Err(self.fatal(&name, "macro name must be an identifier"));
        }

        // A parenthesis makes this function-like only when it is glued
        // directly to the name.
        let mut is_function = false;
        let mut params = Params::new();
        match self.next_token() {
            Some(tok) if tok.kind == TokenKind::ParenOpen => {
                is_function = true;
                self.parse_param_list(directive, &mut params)?;
            }
            Some(tok) => self.push_back(tok),
            None => {}
        }

        let mut body = Vec::new();
        loop {
            let Some(tok) = self.next_token() else { break };
            if tok.kind == TokenKind::Newline {
                break;
            }
            if tok.kind == TokenKind::BadChar {
                return Err(self.fatal(&tok, "unknown token"));
            }
            body.push(tok);
        }

        match self.macros.define(&name, is_function, params, &body) {
            Ok(()) => {
                debug!(name = %name.text, is_function, "defined macro");
                Ok(())
            }
            Err(redef) => Err(self.fatal(&name, format!("\"{}\" redefined", redef.name))),
        }
    }

    /// Parameter list with the opening `(` already consumed.
    fn parse_param_list(
        &mut self,
        directive: &Token,
        params: &mut Params,
    ) -> Result<(), PreprocError> {
        let mut tok = self.next_significant(directive)?;
        if tok.kind == TokenKind::ParenClose {
            return Ok(());
        }
        loop {
            match tok.kind {
                TokenKind::Ellipsis => {
                    params.push(tok);
                    let close = self.next_significant(directive)?;
                    if close.kind != TokenKind::ParenClose {
                        return Err(self.fatal(&close, "expected ')' after '...'"));
                    }
                    return Ok(());
                }
                kind if kind.is_identifier_like() => {
                    if params
                        .iter()
                        .any(|p| p.kind != TokenKind::Ellipsis && p.text == tok.text)
                    {
                        return Err(self.fatal(
                            &tok,
                            format!("duplicate macro parameter \"{}\"", tok.text),
                        ));
                    }
                    params.push(tok);
                    let sep = self.next_significant(directive)?;
                    match sep.kind {
                        TokenKind::Comma => tok = self.next_significant(directive)?,
                        TokenKind::ParenClose => return Ok(()),
                        TokenKind::Newline => {
                            return Err(self.fatal(&sep, "expected ')'"));
                        }
                        _ => {
                            return Err(
                                self.fatal(&sep, "unexpected token in macro parameter list")
                            )
                        }
                    }
                }
                TokenKind::Comma => {
                    // Empty slot: keep a placeholder so diagnostics can
                    // still point at the position.
                    params.push(Token::new(TokenKind::Identifier, "", tok.line, tok.col));
                    tok = self.next_significant(directive)?;
                }
                TokenKind::ParenClose => {
                    params.push(Token::new(TokenKind::Identifier, "", tok.line, tok.col));
                    return Ok(());
                }
                TokenKind::Newline => return Err(self.fatal(&tok, "expected ')'")),
                _ => {
                    return Err(self.fatal(&tok, "unexpected token in macro parameter list"))
                }
            }
        }
    }

    fn process_undef(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let name = self.next_significant(directive)?;
        if name.kind == TokenKind::Newline {
            return Err(self.fatal(&name, "missing macro name"));
        }
        if !name.kind.is_identifier_like() {
            return Err(self.fatal(&name, "macro name must be an identifier"));
        }
        self.macros.undef(&name.text);
        self.expect_end_of_line()
    }

    // === #include ===

    fn process_include(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let Some(path) = include_path_of(&directive.text) else {
            return Err(self.fatal(directive, "malformed #include"));
        };
        let path = PathBuf::from(path);
        self.expect_end_of_line()?;

        if self.files.len() >= MAX_INCLUDE_DEPTH {
            return Err(self.fatal(directive, "#include nested too deeply"));
        }

        let buf = match self.loader.load(&path) {
            Ok(buf) => buf,
            Err(err) => {
                return Err(self.fatal(
                    directive,
                    format!("cannot open {}: {err}", path.display()),
                ));
            }
        };

        debug!(path = %path.display(), depth = self.files.len(), "include");
        self.lexer.push_context();
        self.files.push(SourceFile::new(path, buf));
        Ok(())
    }

    // === Conditionals ===

    fn process_ifdef(&mut self, directive: &Token, invert: bool) -> Result<(), PreprocError> {
        let name = self.next_significant(directive)?;
        if name.kind == TokenKind::Newline {
            return Err(self.fatal(&name, "missing macro name"));
        }
        if !name.kind.is_identifier_like() {
            return Err(self.fatal(&name, "macro name must be an identifier"));
        }
        self.expect_end_of_line()?;
        let live = self.macros.lookup(&name.text).is_some() != invert;
        self.enter_group(directive, live)
    }

    fn process_if(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let live = self.eval_condition_line(directive)?;
        self.enter_group(directive, live)
    }

    /// Position parsing after a new `#if`-family group: either inside
    /// the first live branch, or past the whole group.
    fn enter_group(&mut self, opening: &Token, mut live: bool) -> Result<(), PreprocError> {
        let mut saw_else = false;
        loop {
            if live {
                self.cond_stack.push(Conditional {
                    in_else: saw_else,
                    line: opening.line,
                });
                return Ok(());
            }
            match self.skip_branch(opening)? {
                BranchEvent::Elif(tok) => {
                    if saw_else {
                        return Err(self.fatal(&tok, "#elif after #else"));
                    }
                    live = self.eval_condition_line(&tok)?;
                }
                BranchEvent::Else(tok) => {
                    if saw_else {
                        return Err(self.fatal(&tok, "#else after #else"));
                    }
                    saw_else = true;
                    self.expect_end_of_line()?;
                    live = true; // no earlier branch was taken
                }
                BranchEvent::Endif(_) => {
                    return self.skip_rest_of_line();
                }
            }
        }
    }

    /// `#elif`/`#else` reached while parsing a kept branch: the rest of
    /// the group is dead.
    fn process_branch_in_kept(
        &mut self,
        tok: &Token,
        kind: TokenKind,
    ) -> Result<(), PreprocError> {
        let elif = kind == TokenKind::Elif;
        let Some(cond) = self.cond_stack.last() else {
            let msg = if elif {
                "#elif without #if"
            } else {
                "#else without #if"
            };
            return Err(self.fatal(tok, msg));
        };
        if cond.in_else {
            let msg = if elif {
                "#elif after #else"
            } else {
                "#else after #else"
            };
            return Err(self.fatal(tok, msg));
        }

        let mut saw_else = !elif;
        self.skip_rest_of_line()?;
        loop {
            match self.skip_branch(tok)? {
                BranchEvent::Elif(t) => {
                    if saw_else {
                        return Err(self.fatal(&t, "#elif after #else"));
                    }
                    self.skip_rest_of_line()?;
                }
                BranchEvent::Else(t) => {
                    if saw_else {
                        return Err(self.fatal(&t, "#else after #else"));
                    }
                    saw_else = true;
                    self.skip_rest_of_line()?;
                }
                BranchEvent::Endif(_) => {
                    self.cond_stack.pop();
                    return self.expect_end_of_line();
                }
            }
        }
    }

    fn process_endif(&mut self, tok: &Token) -> Result<(), PreprocError> {
        if self.cond_stack.pop().is_none() {
            return Err(self.fatal(tok, "#endif without #if"));
        }
        self.expect_end_of_line()
    }

    /// Skip a dead branch until the directive that changes this group's
    /// state. Nested groups are consumed whole; nothing is interpreted
    /// or emitted, and `BadChar` bytes are tolerated.
    fn skip_branch(&mut self, opening: &Token) -> Result<BranchEvent, PreprocError> {
        let mut depth: u32 = 0;
        let mut at_line_start = true;
        loop {
            let Some(tok) = self.next_token() else {
                return Err(self.fatal(opening, "unterminated #if"));
            };
            match tok.kind {
                kind if kind.is_trivia() => {}
                TokenKind::Newline => at_line_start = true,
                kind if at_line_start && kind.opens_conditional() => {
                    depth += 1;
                    at_line_start = false;
                }
                TokenKind::Endif if at_line_start => {
                    if depth == 0 {
                        return Ok(BranchEvent::Endif(tok));
                    }
                    depth -= 1;
                    at_line_start = false;
                }
                TokenKind::Elif if at_line_start && depth == 0 => {
                    return Ok(BranchEvent::Elif(tok));
                }
                TokenKind::Else if at_line_start && depth == 0 => {
                    return Ok(BranchEvent::Else(tok));
                }
                _ => at_line_start = false,
            }
        }
    }

    /// Collect and evaluate the controlling expression of `#if`/`#elif`.
    fn eval_condition_line(&mut self, directive: &Token) -> Result<bool, PreprocError> {
        let mut toks = Vec::new();
        loop {
            let Some(tok) = self.next_token() else { break };
            if tok.kind == TokenKind::Newline {
                break;
            }
            if tok.kind.is_trivia() {
                continue;
            }
            toks.push(tok);
        }
        if toks.is_empty() {
            return Err(self.fatal(directive, "#if with no expression"));
        }
        match self.eval_condition(&toks) {
            Ok(value) => Ok(value),
            Err(msg) => Err(self.fatal(&toks[0], msg)),
        }
    }

    /// The condition evaluator covers `defined NAME`, `defined(NAME)`,
    /// integer literals, and single identifiers (expanded once through
    /// the macro table, undefined names evaluating to 0), all optionally
    /// negated by leading `!`s. Anything richer is rejected.
    fn eval_condition(&self, toks: &[Token]) -> Result<bool, String> {
        let mut idx = 0;
        let mut negate = false;
        while idx < toks.len() && toks[idx].kind == TokenKind::Op && toks[idx].text == "!" {
            negate = !negate;
            idx += 1;
        }
        let rest = &toks[idx..];

        let value = match rest.first() {
            None => return Err("#if with no expression".to_string()),
            Some(tok) if tok.kind == TokenKind::Defined => match rest.get(1) {
                Some(name) if name.kind.is_identifier_like() && rest.len() == 2 => {
                    self.macros.lookup(&name.text).is_some()
                }
                Some(open) if open.kind == TokenKind::ParenOpen => {
                    match (rest.get(2), rest.get(3), rest.len()) {
                        (Some(name), Some(close), 4)
                            if name.kind.is_identifier_like()
                                && close.kind == TokenKind::ParenClose =>
                        {
                            self.macros.lookup(&name.text).is_some()
                        }
                        _ => return Err("malformed defined()".to_string()),
                    }
                }
                _ => return Err("malformed defined()".to_string()),
            },
            Some(tok) if tok.kind == TokenKind::Integer && rest.len() == 1 => {
                parse_c_int(&tok.text)
                    .ok_or_else(|| format!("malformed integer \"{}\"", tok.text))?
                    != 0
            }
            Some(tok) if tok.kind.is_identifier_like() && rest.len() == 1 => {
                match self.macros.lookup(&tok.text) {
                    None => false,
                    Some(mac)
                        if !mac.is_function
                            && mac.body.len() == 1
                            && mac.body[0].kind == TokenKind::Integer =>
                    {
                        parse_c_int(&mac.body[0].text).is_some_and(|v| v != 0)
                    }
                    Some(_) => {
                        return Err(format!(
                            "unsupported #if expression at \"{}\"",
                            tok.text
                        ))
                    }
                }
            }
            Some(tok) => {
                return Err(format!("unsupported #if expression at \"{}\"", tok.text))
            }
        };

        Ok(value != negate)
    }

    // === #line / #error / #warning ===

    fn process_line_directive(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let num = self.next_significant(directive)?;
        if num.kind != TokenKind::Integer {
            return Err(self.fatal(&num, "#line requires a line number"));
        }
        let Some(line) = parse_c_int(&num.text).and_then(|v| u32::try_from(v).ok()) else {
            return Err(self.fatal(&num, format!("malformed line number \"{}\"", num.text)));
        };

        let mut next = self.next_significant(directive)?;
        if next.kind == TokenKind::StringLit {
            if let Some(name) = string_literal_contents(&next.text) {
                if let Some(file) = self.files.last_mut() {
                    file.display_path = PathBuf::from(name);
                }
            }
            next = self.next_significant(directive)?;
        }
        if next.kind != TokenKind::Newline {
            return Err(self.fatal(&next, "extra tokens after #line"));
        }

        // The directive's own newline is already consumed, so the next
        // line read is exactly `line`.
        self.lexer.set_position(Position { line, col: 1 });
        Ok(())
    }

    fn process_error_directive(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let msg = self.collect_message_line();
        let msg = if msg.is_empty() {
            "#error".to_string()
        } else {
            msg
        };
        Err(self.fatal(directive, msg))
    }

    fn process_warning_directive(&mut self, directive: &Token) -> Result<(), PreprocError> {
        let msg = self.collect_message_line();
        let msg = if msg.is_empty() {
            "#warning".to_string()
        } else {
            msg
        };
        self.warn(directive, msg);
        Ok(())
    }

    /// Gather the rest of the line as message text, trivia collapsed to
    /// single spaces.
    fn collect_message_line(&mut self) -> String {
        let mut out = String::new();
        let mut pending_space = false;
        loop {
            let Some(tok) = self.next_token() else { break };
            match tok.kind {
                TokenKind::Newline => break,
                kind if kind.is_trivia() => pending_space = !out.is_empty(),
                _ => {
                    if pending_space {
                        out.push(' ');
                        pending_space = false;
                    }
                    out.push_str(&tok.text);
                }
            }
        }
        out
    }

    // === Identifier replacement (add-token path) ===

    fn add_token(&mut self, tok: Token) -> Result<(), PreprocError> {
        if !tok.kind.is_identifier_like() {
            self.output.push(tok);
            return Ok(());
        }
        let Some(mac) = self.macros.lookup(&tok.text) else {
            self.output.push(tok);
            return Ok(());
        };

        if !mac.is_function {
            let body = mac.body.clone();
            debug!(name = %tok.text, "object-like expansion");
            self.output.extend(body);
            return Ok(());
        }

        let mac = mac.clone();

        // A function-like macro only expands when an argument list
        // follows on the same logical line.
        let mut held = Vec::new();
        let mut found_open = false;
        loop {
            match self.next_token() {
                None => break,
                Some(t) if t.kind.is_trivia() => held.push(t),
                Some(t) if t.kind == TokenKind::ParenOpen => {
                    found_open = true;
                    break;
                }
                Some(t) => {
                    held.push(t);
                    break;
                }
            }
        }
        if !found_open {
            self.output.push(tok);
            for t in held.into_iter().rev() {
                self.push_back(t);
            }
            return Ok(());
        }

        let args = self.collect_args(&mac, &tok)?;
        debug!(name = %tok.text, args = args.len(), "function-like expansion");
        let expansion = substitute(&mac, &args);
        self.output.extend(expansion);
        Ok(())
    }

    /// Collect a nest-balanced argument list; the `(` is consumed.
    ///
    /// For a variadic macro the `...` parameter binds the remainder of
    /// the list, commas included.
    fn collect_args(
        &mut self,
        mac: &MacroDef,
        name: &Token,
    ) -> Result<Vec<Vec<Token>>, PreprocError> {
        let split_limit = if mac.is_variadic() {
            mac.params.len().saturating_sub(1)
        } else {
            usize::MAX
        };

        let mut args: Vec<Vec<Token>> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut depth = 0u32;
        loop {
            let Some(tok) = self.next_token() else {
                return Err(self.fatal(
                    name,
                    format!("unterminated argument list for macro \"{}\"", name.text),
                ));
            };
            match tok.kind {
                TokenKind::ParenOpen => {
                    depth += 1;
                    current.push(tok);
                }
                TokenKind::ParenClose if depth == 0 => {
                    args.push(trim_trivia(current));
                    break;
                }
                TokenKind::ParenClose => {
                    depth -= 1;
                    current.push(tok);
                }
                TokenKind::Comma if depth == 0 && args.len() < split_limit => {
                    args.push(trim_trivia(std::mem::take(&mut current)));
                }
                // Arguments may span lines; the break becomes plain
                // whitespace inside the argument.
                TokenKind::Newline => current.push(Token::synthetic_space()),
                TokenKind::BadChar => return Err(self.fatal(&tok, "unknown token")),
                _ => current.push(tok),
            }
        }

        if args.len() == 1 && args[0].is_empty() && mac.params.is_empty() {
            args.clear();
        }
        if mac.is_variadic() && args.len() + 1 == mac.params.len() {
            args.push(Vec::new());
        }
        if args.len() != mac.params.len() {
            return Err(self.fatal(
                name,
                format!(
                    "macro \"{}\" expects {} argument(s), got {}",
                    name.text,
                    mac.params.len(),
                    args.len()
                ),
            ));
        }
        Ok(args)
    }
}

impl std::fmt::Debug for TranslationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationUnit")
            .field("root", &self.root_path)
            .field("files", &self.files.len())
            .field("macros", &self.macros.len())
            .field("output_tokens", &self.output.len())
            .finish_non_exhaustive()
    }
}

/// Substitute parameters into a function-like macro body, applying `#`
/// stringizing and `##` pasting. Arguments are spliced in unexpanded,
/// and the result is not rescanned.
fn substitute(mac: &MacroDef, args: &[Vec<Token>]) -> Vec<Token> {
    let body = &mac.body;
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let tok = &body[i];
        match tok.kind {
            TokenKind::Pound => {
                let mut j = i + 1;
                while j < body.len() && body[j].kind.is_trivia() {
                    j += 1;
                }
                let param = body
                    .get(j)
                    .filter(|n| n.kind.is_identifier_like())
                    .and_then(|n| mac.param_index(&n.text));
                if let Some(p) = param {
                    out.push(stringize(&args[p], tok));
                    i = j + 1;
                    continue;
                }
                out.push(tok.clone());
                i += 1;
            }
            TokenKind::PoundPound => {
                while out.last().is_some_and(|t| t.kind.is_trivia()) {
                    out.pop();
                }
                let mut j = i + 1;
                while j < body.len() && body[j].kind.is_trivia() {
                    j += 1;
                }
                let rhs: Vec<Token> = match body.get(j) {
                    Some(n) if n.kind.is_identifier_like() => match mac.param_index(&n.text) {
                        Some(p) => args[p].clone(),
                        None => vec![n.clone()],
                    },
                    Some(n) => vec![n.clone()],
                    None => Vec::new(),
                };
                match (out.pop(), rhs.split_first()) {
                    (Some(left), Some((first, rest))) => {
                        out.push(paste(&left, first));
                        out.extend(rest.iter().cloned());
                    }
                    (Some(left), None) => out.push(left),
                    (None, Some((first, rest))) => {
                        out.push(first.clone());
                        out.extend(rest.iter().cloned());
                    }
                    (None, None) => {}
                }
                i = (j + 1).min(body.len());
            }
            kind if kind.is_identifier_like() => {
                match mac.param_index(&tok.text) {
                    Some(p) => out.extend(args[p].iter().cloned()),
                    None => out.push(tok.clone()),
                }
                i += 1;
            }
            _ => {
                out.push(tok.clone());
                i += 1;
            }
        }
    }
    out
}

/// `#param` — the argument's spelling as a string literal, with `"` and
/// `\` escaped and interior whitespace collapsed.
fn stringize(arg: &[Token], at: &Token) -> Token {
    let mut text = String::new();
    let mut pending_space = false;
    for tok in arg {
        if tok.kind.is_trivia() {
            pending_space = !text.is_empty();
            continue;
        }
        if pending_space {
            text.push(' ');
            pending_space = false;
        }
        for c in tok.text.chars() {
            if c == '"' || c == '\\' {
                text.push('\\');
            }
            text.push(c);
        }
    }
    Token::new(TokenKind::StringLit, format!("\"{text}\""), at.line, at.col)
}

/// `left ## right` — one token from two spellings.
fn paste(left: &Token, right: &Token) -> Token {
    let text = format!("{}{}", left.text, right.text);
    let kind = if is_identifier_shaped(&text) {
        TokenKind::Identifier
    } else if text.bytes().all(|b| b.is_ascii_digit()) && !text.is_empty() {
        TokenKind::Integer
    } else {
        left.kind
    };
    Token::new(kind, text, left.line, left.col)
}

fn is_identifier_shaped(text: &str) -> bool {
    let mut bytes = text.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn trim_trivia(mut tokens: Vec<Token>) -> Vec<Token> {
    while tokens.first().is_some_and(|t| t.kind.is_trivia()) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(|t| t.kind.is_trivia()) {
        tokens.pop();
    }
    tokens
}

/// Pull the target out of a fused `#include` token: the text between
/// `"…"` or `<…>`.
fn include_path_of(text: &str) -> Option<&str> {
    if let Some(start) = text.find('"') {
        let rest = &text[start + 1..];
        let end = rest.find('"')?;
        return Some(&rest[..end]);
    }
    let start = text.find('<')?;
    let rest = &text[start + 1..];
    let end = rest.find('>')?;
    Some(&rest[..end])
}

/// Contents of a string-literal token (first quoted section).
fn string_literal_contents(text: &str) -> Option<&str> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

/// Parse a C integer literal: decimal, `0x` hex, leading-zero octal,
/// with any `uUlL` suffix run.
fn parse_c_int(text: &str) -> Option<u64> {
    let trimmed = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if trimmed.is_empty() {
        return None;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    if trimmed.len() > 1 && trimmed.starts_with('0') {
        return u64::from_str_radix(&trimmed[1..], 8).ok();
    }
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_path_extraction() {
        assert_eq!(include_path_of("#include \"a/b.h\""), Some("a/b.h"));
        assert_eq!(include_path_of("#include <stdio.h>"), Some("stdio.h"));
        assert_eq!(include_path_of("# include  <x>"), Some("x"));
        assert_eq!(include_path_of("#include"), None);
    }

    #[test]
    fn c_int_parsing() {
        assert_eq!(parse_c_int("0"), Some(0));
        assert_eq!(parse_c_int("42"), Some(42));
        assert_eq!(parse_c_int("0x1F"), Some(31));
        assert_eq!(parse_c_int("0755"), Some(0o755));
        assert_eq!(parse_c_int("10uL"), Some(10));
        assert_eq!(parse_c_int("'a'"), None);
        assert_eq!(parse_c_int("u"), None);
    }

    #[test]
    fn paste_reclassifies_results() {
        let a = Token::new(TokenKind::Identifier, "FO", 1, 1);
        let b = Token::new(TokenKind::Identifier, "O", 1, 4);
        let pasted = paste(&a, &b);
        assert_eq!(pasted.kind, TokenKind::Identifier);
        assert_eq!(pasted.text, "FOO");

        let one = Token::new(TokenKind::Integer, "1", 1, 1);
        let two = Token::new(TokenKind::Integer, "2", 1, 2);
        assert_eq!(paste(&one, &two).kind, TokenKind::Integer);
        assert_eq!(paste(&one, &two).text, "12");
    }

    #[test]
    fn stringize_preserves_spelling() {
        let arg = [
            Token::new(TokenKind::Identifier, "a", 1, 1),
            Token::new(TokenKind::Whitespace, "   ", 1, 2),
            Token::new(TokenKind::Op, "+", 1, 5),
            Token::new(TokenKind::Whitespace, " ", 1, 6),
            Token::new(TokenKind::Identifier, "b", 1, 7),
        ];
        let at = Token::new(TokenKind::Pound, "#", 1, 1);
        let lit = stringize(&arg, &at);
        assert_eq!(lit.kind, TokenKind::StringLit);
        assert_eq!(lit.text, "\"a + b\"");

        let glued = [
            Token::new(TokenKind::Identifier, "TEST1", 1, 1),
            Token::new(TokenKind::ParenOpen, "(", 1, 6),
            Token::new(TokenKind::Identifier, "k", 1, 7),
            Token::new(TokenKind::Comma, ",", 1, 8),
            Token::new(TokenKind::Identifier, "l", 1, 9),
            Token::new(TokenKind::ParenClose, ")", 1, 10),
        ];
        assert_eq!(stringize(&glued, &at).text, "\"TEST1(k,l)\"");
    }

    #[test]
    fn stringize_escapes_quotes_and_backslashes() {
        let arg = [Token::new(TokenKind::StringLit, "\"x\\n\"", 1, 1)];
        let at = Token::new(TokenKind::Pound, "#", 1, 1);
        let lit = stringize(&arg, &at);
        assert_eq!(lit.text, "\"\\\"x\\\\n\\\"\"");
    }

    #[test]
    fn trim_trivia_strips_both_ends() {
        let toks = vec![
            Token::new(TokenKind::Whitespace, " ", 1, 1),
            Token::new(TokenKind::Identifier, "x", 1, 2),
            Token::new(TokenKind::Comment, "/**/", 1, 3),
        ];
        let trimmed = trim_trivia(toks);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].text, "x");
    }
}
