//! Token-stream printer with canonical spacing.
//!
//! Walks the trivia-bearing token stream and re-emits every token's raw
//! source text with normalized whitespace: single spaces per the spacing
//! table, two-space indentation derived from delimiter depth, comments
//! kept where they were, and runs of blank lines collapsed to one.

use al_common::span::LineIndex;
use al_common::token::{Token, TokenKind, TriviaKind};

const INDENT: &str = "  ";

pub(crate) fn print_tokens(tokens: &[Token], source: &str) -> String {
    let index = LineIndex::new(source);
    let mut printer = Printer {
        out: String::new(),
        depth: 0usize,
        line_has_content: false,
        pending_breaks: 0,
        prev: None,
        prev_minus_unary: false,
    };

    for token in tokens {
        printer.handle_trivia(token);
        if token.kind == TokenKind::Eof {
            break;
        }
        printer.emit_token(token, source, &index);
    }

    // Exactly one trailing newline.
    while printer.out.ends_with('\n') {
        printer.out.pop();
    }
    if !printer.out.is_empty() {
        printer.out.push('\n');
    }
    printer.out
}

struct Printer {
    out: String,
    depth: usize,
    line_has_content: bool,
    /// Newlines seen in trivia but not yet written.
    pending_breaks: usize,
    prev: Option<Token>,
    /// Whether the previously emitted token was a unary minus.
    prev_minus_unary: bool,
}

impl Printer {
    fn handle_trivia(&mut self, token: &Token) {
        for trivia in &token.leading_trivia {
            match trivia.kind {
                TriviaKind::Whitespace => {}
                TriviaKind::Newline => {
                    self.pending_breaks += trivia.text.matches('\n').count();
                }
                TriviaKind::LineComment => {
                    if self.pending_breaks == 0 && self.line_has_content {
                        // Trailing comment on the current line. The newline
                        // trivia that follows it supplies the line break.
                        self.out.push(' ');
                        self.out.push_str(&trivia.text);
                    } else {
                        self.flush_breaks(token.kind);
                        self.write_indent(token.kind);
                        self.out.push_str(&trivia.text);
                        self.line_has_content = true;
                    }
                    self.pending_breaks = 0;
                }
            }
        }
    }

    /// Write the pending line breaks (at most one blank line). Breaks
    /// before the first content are dropped so files never start blank.
    fn flush_breaks(&mut self, _next: TokenKind) {
        if self.pending_breaks == 0 {
            return;
        }
        if !self.out.is_empty() {
            self.out.push('\n');
            if self.pending_breaks > 1 {
                self.out.push('\n');
            }
        }
        self.pending_breaks = 0;
        self.line_has_content = false;
    }

    fn write_indent(&mut self, next: TokenKind) {
        if self.line_has_content {
            return;
        }
        let mut depth = self.depth;
        if is_closer(next) {
            depth = depth.saturating_sub(1);
        }
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn emit_token(&mut self, token: &Token, source: &str, index: &LineIndex) {
        if self.pending_breaks > 0 {
            self.flush_breaks(token.kind);
            self.write_indent(token.kind);
        } else if self.line_has_content {
            if self.needs_space(token) {
                self.out.push(' ');
            }
        } else {
            self.write_indent(token.kind);
        }

        let text = &source[token.span.byte_range(index)];
        self.out.push_str(text);
        self.line_has_content = true;

        match token.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.depth = self.depth.saturating_sub(1)
            }
            _ => {}
        }

        self.prev_minus_unary =
            token.kind == TokenKind::Minus && !self.prev.as_ref().is_some_and(ends_value);
        self.prev = Some(token.clone());
    }

    /// The canonical spacing table: whether a space separates the
    /// previous token from `cur` on the same line.
    fn needs_space(&self, cur: &Token) -> bool {
        let Some(prev) = &self.prev else {
            return false;
        };
        use TokenKind::*;

        // Tight punctuation, regardless of context.
        match cur.kind {
            Comma | RParen | RBracket | Dot | Colon => return false,
            DotDot => return prev.kind == Comma,
            _ => {}
        }
        match prev.kind {
            LParen | LBracket | Dot | DotDot | Question => return false,
            Minus if self.prev_minus_unary => return false,
            Bang if starts_value(cur.kind) => return false,
            LBrace => return cur.kind != RBrace,
            _ => {}
        }

        match cur.kind {
            // Calls, signatures, and grouping after a value or `fn`.
            LParen => !matches!(prev.kind, Ident | RParen | RBracket | Fn),
            // Indexing and array types stay tight after a value.
            LBracket => !matches!(prev.kind, Ident | RParen | RBracket),
            // Struct literals (`User{ .. }`) keep the author's adjacency;
            // a block after a return type keeps its space.
            LBrace => !(prev.kind == Ident && adjacent(prev, cur)),
            // Postfix `!` and result types (`Int!E`) are tight.
            Bang => !ends_value(prev),
            _ => true,
        }
    }
}

fn is_closer(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace
    )
}

/// Token kinds that can end an expression (so a following `-`/`!` is a
/// binary/postfix operator rather than a prefix one).
fn ends_value(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::StrInterp
            | TokenKind::Char
            | TokenKind::True
            | TokenKind::False
            | TokenKind::NoneKw
            | TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::RBrace
    )
}

/// Token kinds that can begin a value (operand position after `!`).
fn starts_value(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::StrInterp
            | TokenKind::Char
            | TokenKind::True
            | TokenKind::False
            | TokenKind::NoneKw
            | TokenKind::LParen
            | TokenKind::LBracket
    )
}

/// Whether two tokens were directly adjacent in the original source.
fn adjacent(prev: &Token, cur: &Token) -> bool {
    cur.leading_trivia.is_empty()
        && prev.span.end_line == cur.span.start_line
        && prev.span.end_col == cur.span.start_col
}
