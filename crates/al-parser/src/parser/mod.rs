//! Parser core: token cursor, delimiter-depth tracking, and panic-mode
//! recovery.
//!
//! # Newline significance
//!
//! Newlines never appear as tokens; the scanner attaches them as leading
//! trivia. A statement ends where the next token starts a new line. Inside
//! `()` and `[]` delimiters newlines are insignificant, so expression
//! continuation checks consult the current delimiter depth.
//!
//! # Error recovery
//!
//! On a parse error the parser records a diagnostic, produces an `Error`
//! sentinel node, and skips tokens until a context-appropriate anchor:
//! the next declaration-ish line at top level, the next statement boundary
//! inside a block, the next `,`/closer inside a delimited list, the next
//! arm inside a match. Recovery never skips past the closer of a bracket
//! pair it has entered without consuming that closer.

mod expressions;
mod items;
mod patterns;

use al_common::diagnostic::Diagnostic;
use al_common::span::Span;
use al_common::token::{Token, TokenKind};

use crate::ast;

/// Recovery context, selecting the synchronization anchor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recovery {
    /// Sync to the next line starting with a declaration keyword or
    /// identifier.
    TopLevel,
    /// Sync to the next statement boundary or `}`.
    Block,
    /// Sync to the next `,` or the given closer.
    Delimited(TokenKind),
    /// Sync to the next match arm or `}`.
    MatchArm,
}

pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Nesting depth of `(` and `[` -- newlines are insignificant inside.
    pub(crate) delim_depth: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            delim_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    // ── Lookahead ──────────────────────────────────────────────────────

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.current().kind
    }

    pub(crate) fn nth_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current().span
    }

    /// Whether the current token begins a new source line (outside
    /// delimiters this is a statement boundary).
    pub(crate) fn at_line_start(&self) -> bool {
        self.current().starts_line()
    }

    /// Whether an infix/postfix operator at the current token would
    /// continue the current expression. Inside `()`/`[]` newlines do not
    /// break expressions.
    pub(crate) fn continues_line(&self) -> bool {
        self.delim_depth > 0 || !self.at_line_start()
    }

    // ── Consumption ────────────────────────────────────────────────────

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => self.delim_depth += 1,
            TokenKind::RParen | TokenKind::RBracket => {
                self.delim_depth = self.delim_depth.saturating_sub(1)
            }
            _ => {}
        }
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Consume the current token if it matches.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind or record an error.
    ///
    /// Returns the consumed token on success. On failure the caller
    /// decides how to recover.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.advance())
        } else {
            self.error_here(format!(
                "expected {}, found {}",
                kind.describe(),
                self.kind().describe()
            ));
            None
        }
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    pub(crate) fn error_here(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(message, span);
    }

    pub(crate) fn error_at(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    // ── Recovery ───────────────────────────────────────────────────────

    /// Skip tokens until a synchronization anchor for the given context.
    ///
    /// Maintains a bracket stack while skipping so that anchors inside
    /// nested brackets are ignored until their closer has been consumed.
    pub(crate) fn recover(&mut self, context: Recovery) {
        let mut bracket_stack: Vec<TokenKind> = Vec::new();

        while !self.at_eof() {
            let kind = self.kind();

            // Never cross unbalanced brackets: track openers we skip and
            // only treat tokens at depth zero as anchors.
            match kind {
                TokenKind::LParen => bracket_stack.push(TokenKind::RParen),
                TokenKind::LBracket => bracket_stack.push(TokenKind::RBracket),
                TokenKind::LBrace => bracket_stack.push(TokenKind::RBrace),
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if bracket_stack.last() == Some(&kind) {
                        bracket_stack.pop();
                        self.advance();
                        continue;
                    }
                    // A closer we did not open belongs to the enclosing
                    // construct: stop here for every context.
                    return;
                }
                _ => {}
            }

            if bracket_stack.is_empty() && self.is_anchor(kind, context) {
                return;
            }
            self.advance();
        }
    }

    fn is_anchor(&self, kind: TokenKind, context: Recovery) -> bool {
        match context {
            Recovery::TopLevel => {
                self.at_line_start()
                    && (kind.starts_declaration()
                        || kind == TokenKind::Ident
                        || matches!(
                            kind,
                            TokenKind::If | TokenKind::Match | TokenKind::Assert
                        ))
            }
            Recovery::Block => self.at_line_start() || kind == TokenKind::RBrace,
            Recovery::Delimited(closer) => {
                kind == TokenKind::Comma
                    || kind == closer
                    // A declaration on a fresh line means the closer is
                    // missing entirely; stop rather than eat the file.
                    || (self.at_line_start() && kind.starts_declaration())
            }
            Recovery::MatchArm => self.at_line_start() || kind == TokenKind::RBrace,
        }
    }

    // ── Entry ──────────────────────────────────────────────────────────

    pub(crate) fn parse_program(&mut self) -> ast::Program {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            let before = self.pos;
            stmts.push(self.parse_stmt(true));
            if self.pos == before {
                // The statement parser failed to consume anything;
                // force progress so the loop terminates.
                let span = self.current_span();
                self.error_here(format!("unexpected {}", self.kind().describe()));
                self.advance();
                self.recover(Recovery::TopLevel);
                stmts.push(ast::Stmt::Error(span));
            }
        }
        ast::Program { stmts }
    }
}
