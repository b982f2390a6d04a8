// AL scanner -- converts source text into tokens with attached trivia.

mod cursor;

use al_common::diagnostic::Diagnostic;
use al_common::span::Span;
use al_common::token::{keyword_from_str, Token, TokenKind, Trivia, TriviaKind};
use cursor::Cursor;

/// Decode a single escape character (the character following a backslash).
///
/// Returns `None` for unknown escapes. The valid set is `\n \t \r \0 \' \\ \$`.
/// Shared with the parser, which decodes interpolation-flagged strings
/// itself (their literals are kept raw so `\$` stays distinguishable from
/// an interpolation marker).
pub fn decode_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        '\'' => Some('\''),
        '\\' => Some('\\'),
        '$' => Some('$'),
        _ => None,
    }
}

/// The AL scanner. Converts source text into a token stream.
///
/// Whitespace, newlines, and `//` comments are captured as leading trivia
/// on the next significant token (trailing trivia attaches to `Eof`), so
/// the token stream round-trips the original layout. Lexer errors are
/// recorded as diagnostics; the scanner re-synchronizes by skipping the
/// offending character.
pub struct Scanner<'src> {
    cursor: Cursor<'src>,
    /// Trivia collected since the last significant token.
    pending_trivia: Vec<Trivia>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Scanner<'src> {
    /// Create a new scanner for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            pending_trivia: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the entire source.
    ///
    /// The returned token list always ends with an `Eof` token. Diagnostics
    /// cover unterminated strings, unknown escapes, and stray characters.
    pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, scanner.diagnostics)
    }

    /// Produce the next significant token with its leading trivia attached.
    fn next_token(&mut self) -> Token {
        loop {
            self.collect_trivia();

            let start_line = self.cursor.line();
            let start_col = self.cursor.col();

            let Some(c) = self.cursor.peek() else {
                let mut token =
                    Token::new(TokenKind::Eof, Span::point(start_line, start_col));
                token.leading_trivia = std::mem::take(&mut self.pending_trivia);
                return token;
            };

            let token = match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '?' => self.single(TokenKind::Question),
                '*' => self.single(TokenKind::Star),
                '%' => self.single(TokenKind::Percent),
                '/' => self.single(TokenKind::Slash),
                '+' => self.single(TokenKind::Plus),
                '-' => self.lex_minus(),
                '=' => self.lex_eq(),
                '!' => self.lex_bang(),
                '<' => self.lex_lt(),
                '>' => self.lex_gt(),
                '&' => self.lex_amp(),
                '|' => self.lex_pipe(),
                '.' => self.lex_dot(),
                '\'' => self.lex_string(),
                '`' => self.lex_char(),
                '0'..='9' => self.lex_number(),
                c if is_ident_start(c) => self.lex_ident(),
                _ => {
                    // Stray character: record and skip, then retry.
                    self.cursor.advance();
                    self.diagnostics.push(Diagnostic::error(
                        format!("unexpected character '{}'", c),
                        Span::new(start_line, start_col, self.cursor.line(), self.cursor.col()),
                    ));
                    continue;
                }
            };

            let Some(mut token) = token else {
                // The lexing helper consumed input but produced no token
                // (recoverable error); try again.
                continue;
            };
            token.leading_trivia = std::mem::take(&mut self.pending_trivia);
            return token;
        }
    }

    // ── Trivia ─────────────────────────────────────────────────────────

    /// Gather whitespace, newlines, and line comments into pending trivia.
    fn collect_trivia(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(' ') | Some('\t') => {
                    let start = self.cursor.pos();
                    self.cursor.eat_while(|c| c == ' ' || c == '\t');
                    let text = self.cursor.slice(start, self.cursor.pos()).to_string();
                    self.pending_trivia
                        .push(Trivia::new(TriviaKind::Whitespace, text));
                }
                Some('\n') | Some('\r') => {
                    let start = self.cursor.pos();
                    self.cursor.eat_while(|c| c == '\n' || c == '\r');
                    let text = self.cursor.slice(start, self.cursor.pos()).to_string();
                    self.pending_trivia
                        .push(Trivia::new(TriviaKind::Newline, text));
                }
                Some('/') if self.cursor.peek_next() == Some('/') => {
                    let start = self.cursor.pos();
                    self.cursor.eat_while(|c| c != '\n');
                    let text = self.cursor.slice(start, self.cursor.pos()).to_string();
                    self.pending_trivia
                        .push(Trivia::new(TriviaKind::LineComment, text));
                }
                _ => break,
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(start_line, start_col, self.cursor.line(), self.cursor.col())
    }

    /// Consume one character and produce a token of the given kind.
    fn single(&mut self, kind: TokenKind) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        self.cursor.advance();
        Some(Token::new(kind, self.span_from(line, col)))
    }

    /// Consume one or two characters: `second` upgrades to `two`.
    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        self.cursor.advance();
        let kind = if self.cursor.peek() == Some(second) {
            self.cursor.advance();
            two
        } else {
            one
        };
        Some(Token::new(kind, self.span_from(line, col)))
    }

    // ── Operators ──────────────────────────────────────────────────────

    /// `-` -> `Minus`, `->` -> `Arrow`
    fn lex_minus(&mut self) -> Option<Token> {
        self.one_or_two('>', TokenKind::Minus, TokenKind::Arrow)
    }

    /// `=` -> `Eq`, `==` -> `EqEq`
    fn lex_eq(&mut self) -> Option<Token> {
        self.one_or_two('=', TokenKind::Eq, TokenKind::EqEq)
    }

    /// `!` -> `Bang`, `!=` -> `NotEq`
    fn lex_bang(&mut self) -> Option<Token> {
        self.one_or_two('=', TokenKind::Bang, TokenKind::NotEq)
    }

    /// `<` -> `Lt`, `<=` -> `LtEq`
    fn lex_lt(&mut self) -> Option<Token> {
        self.one_or_two('=', TokenKind::Lt, TokenKind::LtEq)
    }

    /// `>` -> `Gt`, `>=` -> `GtEq`
    fn lex_gt(&mut self) -> Option<Token> {
        self.one_or_two('=', TokenKind::Gt, TokenKind::GtEq)
    }

    /// `&&` -> `AmpAmp`; a lone `&` is an error.
    fn lex_amp(&mut self) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        self.cursor.advance();
        if self.cursor.peek() == Some('&') {
            self.cursor.advance();
            Some(Token::new(TokenKind::AmpAmp, self.span_from(line, col)))
        } else {
            self.diagnostics.push(Diagnostic::error(
                "unexpected character '&' (did you mean '&&'?)",
                self.span_from(line, col),
            ));
            None
        }
    }

    /// `||` -> `PipePipe`, `|` -> `Pipe`
    fn lex_pipe(&mut self) -> Option<Token> {
        self.one_or_two('|', TokenKind::Pipe, TokenKind::PipePipe)
    }

    /// `.` -> `Dot`, `..` -> `DotDot`
    fn lex_dot(&mut self) -> Option<Token> {
        self.one_or_two('.', TokenKind::Dot, TokenKind::DotDot)
    }

    // ── Literals and identifiers ───────────────────────────────────────

    fn lex_ident(&mut self) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        let start = self.cursor.pos();
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());
        let span = self.span_from(line, col);
        match keyword_from_str(text) {
            Some(kind) => Some(Token::new(kind, span)),
            None => Some(Token::with_literal(TokenKind::Ident, span, text)),
        }
    }

    /// Integer or float. The decimal point is consumed only when a digit
    /// follows, so `1..5` lexes as `1`, `..`, `5`.
    fn lex_number(&mut self) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        let start = self.cursor.pos();
        self.cursor.eat_while(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.advance(); // consume '.'
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Int
        };
        Some(Token::with_literal(kind, self.span_from(line, col), text))
    }

    /// `'`-delimited string with escapes; flagged `StrInterp` when an
    /// unescaped `$` appears.
    ///
    /// Plain strings decode their escapes into the literal. Interpolated
    /// strings keep the raw inner text so the parser can split parts and
    /// decode without conflating `\$` and `$`.
    fn lex_string(&mut self) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        self.cursor.advance(); // opening quote
        let content_start = self.cursor.pos();

        let mut decoded = String::new();
        let mut interpolated = false;

        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    let span = self.span_from(line, col);
                    self.diagnostics
                        .push(Diagnostic::error("unterminated string literal", span));
                    let raw = self.cursor.slice(content_start, self.cursor.pos());
                    return Some(Token::with_literal(TokenKind::Error, span, raw));
                }
                Some('\'') => {
                    let content_end = self.cursor.pos();
                    self.cursor.advance(); // closing quote
                    let span = self.span_from(line, col);
                    let kind = if interpolated {
                        TokenKind::StrInterp
                    } else {
                        TokenKind::Str
                    };
                    let literal = if interpolated {
                        self.cursor.slice(content_start, content_end).to_string()
                    } else {
                        decoded
                    };
                    return Some(Token::with_literal(kind, span, literal));
                }
                Some('\\') => {
                    let esc_line = self.cursor.line();
                    let esc_col = self.cursor.col();
                    self.cursor.advance(); // backslash
                    match self.cursor.peek() {
                        Some(esc) => {
                            self.cursor.advance();
                            match decode_escape(esc) {
                                Some(c) => decoded.push(c),
                                None => {
                                    self.diagnostics.push(Diagnostic::error(
                                        format!("unknown escape sequence '\\{}'", esc),
                                        Span::new(
                                            esc_line,
                                            esc_col,
                                            self.cursor.line(),
                                            self.cursor.col(),
                                        ),
                                    ));
                                    decoded.push(esc);
                                }
                            }
                        }
                        None => {} // unterminated; reported on next loop turn
                    }
                }
                Some('$') => {
                    interpolated = true;
                    decoded.push('$');
                    self.cursor.advance();
                }
                Some(c) => {
                    decoded.push(c);
                    self.cursor.advance();
                }
            }
        }
    }

    /// Backtick single-character literal, e.g. `` `x` `` or `` `\n` ``.
    fn lex_char(&mut self) -> Option<Token> {
        let (line, col) = (self.cursor.line(), self.cursor.col());
        self.cursor.advance(); // opening backtick

        let c = match self.cursor.peek() {
            None | Some('\n') | Some('`') => {
                if self.cursor.peek() == Some('`') {
                    self.cursor.advance();
                }
                let span = self.span_from(line, col);
                self.diagnostics
                    .push(Diagnostic::error("empty character literal", span));
                return Some(Token::new(TokenKind::Error, span));
            }
            Some('\\') => {
                self.cursor.advance();
                let esc = self.cursor.advance();
                match esc.and_then(decode_escape) {
                    Some(c) => c,
                    None => {
                        let span = self.span_from(line, col);
                        self.diagnostics.push(Diagnostic::error(
                            format!(
                                "unknown escape sequence '\\{}'",
                                esc.map(String::from).unwrap_or_default()
                            ),
                            span,
                        ));
                        esc.unwrap_or('\0')
                    }
                }
            }
            Some(c) => {
                self.cursor.advance();
                c
            }
        };

        if self.cursor.peek() == Some('`') {
            self.cursor.advance();
            Some(Token::with_literal(
                TokenKind::Char,
                self.span_from(line, col),
                c.to_string(),
            ))
        } else {
            // Skip to the closing backtick or end of line.
            self.cursor.eat_while(|c| c != '`' && c != '\n');
            if self.cursor.peek() == Some('`') {
                self.cursor.advance();
            }
            let span = self.span_from(line, col);
            self.diagnostics
                .push(Diagnostic::error("unterminated character literal", span));
            Some(Token::new(TokenKind::Error, span))
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Scanner::tokenize(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn literals(source: &str) -> Vec<Option<String>> {
        let (tokens, _) = Scanner::tokenize(source);
        tokens.into_iter().map(|t| t.literal).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("fn let const foo"),
            vec![
                TokenKind::Fn,
                TokenKind::Let,
                TokenKind::Const,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("+ - * / % == != < <= > >= && || ! = -> .. ? |"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Bang,
                TokenKind::Eq,
                TokenKind::Arrow,
                TokenKind::DotDot,
                TokenKind::Question,
                TokenKind::Pipe,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("42 3.14"),
            vec![TokenKind::Int, TokenKind::Float, TokenKind::Eof]
        );
        assert_eq!(
            literals("42 3.14"),
            vec![Some("42".into()), Some("3.14".into()), None]
        );
    }

    #[test]
    fn range_does_not_consume_decimal_point() {
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::Int, TokenKind::DotDot, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn trailing_dot_is_member_access() {
        assert_eq!(
            kinds("1.foo"),
            vec![TokenKind::Int, TokenKind::Dot, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn plain_string_decodes_escapes() {
        let (tokens, diags) = Scanner::tokenize(r"'a\nb\'c\\d'");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].literal.as_deref(), Some("a\nb'c\\d"));
    }

    #[test]
    fn escaped_dollar_is_not_interpolation() {
        let (tokens, diags) = Scanner::tokenize(r"'cost: \$5'");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].literal.as_deref(), Some("cost: $5"));
    }

    #[test]
    fn unescaped_dollar_flags_interpolation() {
        let (tokens, diags) = Scanner::tokenize("'hello $name'");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::StrInterp);
        // Interpolated literals keep the raw inner text.
        assert_eq!(tokens[0].literal.as_deref(), Some("hello $name"));
    }

    #[test]
    fn unterminated_string_reports() {
        let (tokens, diags) = Scanner::tokenize("'oops\nlet x = 1");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert!(diags.iter().any(|d| d.message.contains("unterminated string")));
        // Scanning continues on the next line.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Let));
    }

    #[test]
    fn unknown_escape_reports_and_continues() {
        let (tokens, diags) = Scanner::tokenize(r"'a\qb'");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert!(diags.iter().any(|d| d.message.contains("unknown escape")));
    }

    #[test]
    fn char_literals() {
        let (tokens, diags) = Scanner::tokenize("`x` `\\n`");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Char);
        assert_eq!(tokens[0].literal.as_deref(), Some("x"));
        assert_eq!(tokens[1].literal.as_deref(), Some("\n"));
    }

    #[test]
    fn stray_character_is_skipped_with_diagnostic() {
        let (tokens, diags) = Scanner::tokenize("let @ x");
        assert!(diags.iter().any(|d| d.message.contains("unexpected character '@'")));
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Let, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn comments_become_trivia() {
        let (tokens, diags) = Scanner::tokenize("// header\nlet x = 1");
        assert!(diags.is_empty());
        let let_tok = &tokens[0];
        assert_eq!(let_tok.kind, TokenKind::Let);
        assert!(let_tok
            .leading_trivia
            .iter()
            .any(|t| t.kind == TriviaKind::LineComment && t.text == "// header"));
        assert!(let_tok.starts_line());
    }

    #[test]
    fn trailing_trivia_attaches_to_eof() {
        let (tokens, _) = Scanner::tokenize("x // tail\n");
        let eof = tokens.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert!(eof
            .leading_trivia
            .iter()
            .any(|t| t.kind == TriviaKind::LineComment));
    }

    #[test]
    fn positions_are_one_based() {
        let (tokens, _) = Scanner::tokenize("ab\n cd");
        assert_eq!((tokens[0].line(), tokens[0].column()), (1, 1));
        assert_eq!((tokens[1].line(), tokens[1].column()), (2, 2));
        assert_eq!(tokens[1].span.end_col, 4);
    }

    #[test]
    fn blank_lines_are_counted_in_trivia() {
        let (tokens, _) = Scanner::tokenize("a\n\n\nb");
        let b = &tokens[1];
        let blank: u32 = b.leading_trivia.iter().map(|t| t.blank_lines()).sum();
        assert_eq!(blank, 2);
    }
}
