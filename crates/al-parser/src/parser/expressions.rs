//! Expression parsing with explicit precedence climbing.
//!
//! Precedence, low to high: `or` < `||` < `&&` < comparisons < `..` <
//! `+ -` < `* / %` < unary `! -` < postfix (call, index, property,
//! propagate `!`) < primary.

use al_common::span::Span;
use al_common::token::{Token, TokenKind};
use al_lexer::decode_escape;

use super::{Parser, Recovery};
use crate::ast::{
    ArrayElem, BinaryOp, Expr, FieldInit, MatchArm, Stmt, StrPart, UnaryOp,
};

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Expr {
        self.parse_or_expr()
    }

    /// `value or fallback`, `value or err -> fallback`; fallback may be a
    /// block. Left-associative.
    fn parse_or_expr(&mut self) -> Expr {
        let mut lhs = self.parse_logic_or();
        while self.at(TokenKind::Or) && self.continues_line() {
            self.advance();

            let receiver = if self.at(TokenKind::Ident) && self.nth_kind(1) == TokenKind::Arrow {
                let tok = self.advance();
                self.advance(); // `->`
                Some((tok.literal.clone().unwrap_or_default(), tok.span))
            } else {
                None
            };

            let fallback = if self.at(TokenKind::LBrace) {
                self.parse_block_expr()
            } else {
                self.parse_logic_or()
            };
            let span = lhs.span().merge(fallback.span());
            lhs = Expr::Or {
                value: Box::new(lhs),
                receiver,
                fallback: Box::new(fallback),
                span,
            };
        }
        lhs
    }

    fn parse_logic_or(&mut self) -> Expr {
        let mut lhs = self.parse_logic_and();
        while self.at(TokenKind::PipePipe) && self.continues_line() {
            self.advance();
            let rhs = self.parse_logic_and();
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_logic_and(&mut self) -> Expr {
        let mut lhs = self.parse_comparison();
        while self.at(TokenKind::AmpAmp) && self.continues_line() {
            self.advance();
            let rhs = self.parse_comparison();
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut lhs = self.parse_range_expr();
        loop {
            let op = match self.kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            if !self.continues_line() {
                break;
            }
            self.advance();
            let rhs = self.parse_range_expr();
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    /// `start..end`, half-open.
    fn parse_range_expr(&mut self) -> Expr {
        let lhs = self.parse_additive();
        if self.at(TokenKind::DotDot) && self.continues_line() {
            self.advance();
            let rhs = self.parse_additive();
            let span = lhs.span().merge(rhs.span());
            Expr::Range {
                start: Box::new(lhs),
                end: Box::new(rhs),
                span,
            }
        } else {
            lhs
        }
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            if !self.continues_line() {
                break;
            }
            self.advance();
            let rhs = self.parse_multiplicative();
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            if !self.continues_line() {
                break;
            }
            self.advance();
            let rhs = self.parse_unary();
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.current_span();
        let op = match self.kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(operand.span());
            Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            }
        } else {
            self.parse_postfix()
        }
    }

    /// Postfix chain: calls, indexing, property access, tuple index, and
    /// failure propagation `x!`. Chains do not continue across a newline
    /// outside delimiters.
    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            if !self.continues_line() {
                break;
            }
            match self.kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.at(TokenKind::RParen) && !self.at_eof() {
                        args.push(self.parse_expr());
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.current_span();
                    if self.expect(TokenKind::RParen).is_none() {
                        self.recover(Recovery::Delimited(TokenKind::RParen));
                        self.eat(TokenKind::RParen);
                    }
                    let span = expr.span().merge(end);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    let end = self.current_span();
                    if self.expect(TokenKind::RBracket).is_none() {
                        self.recover(Recovery::Delimited(TokenKind::RBracket));
                        self.eat(TokenKind::RBracket);
                    }
                    let span = expr.span().merge(end);
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    match self.kind() {
                        TokenKind::Ident => {
                            let tok = self.advance();
                            let span = expr.span().merge(tok.span);
                            expr = Expr::Property {
                                object: Box::new(expr),
                                name: tok.literal.clone().unwrap_or_default(),
                                name_span: tok.span,
                                span,
                            };
                        }
                        TokenKind::Int => {
                            let tok = self.advance();
                            let index = tok
                                .literal
                                .as_deref()
                                .and_then(|s| s.parse::<u32>().ok())
                                .unwrap_or(0);
                            let span = expr.span().merge(tok.span);
                            expr = Expr::TupleIndex {
                                object: Box::new(expr),
                                index,
                                span,
                            };
                        }
                        _ => {
                            self.error_here("expected a field name or tuple index after '.'");
                            break;
                        }
                    }
                }
                TokenKind::Bang => {
                    let tok = self.advance();
                    let span = expr.span().merge(tok.span);
                    expr = Expr::Propagate {
                        value: Box::new(expr),
                        span,
                    };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.current_span();
        match self.kind() {
            TokenKind::Int => {
                let tok = self.advance();
                self.int_literal(&tok)
            }
            TokenKind::Float => {
                let tok = self.advance();
                let value = tok
                    .literal
                    .as_deref()
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(0.0);
                Expr::Float {
                    value,
                    span: tok.span,
                }
            }
            TokenKind::Str | TokenKind::Char => {
                let tok = self.advance();
                Expr::Str {
                    value: tok.literal.clone().unwrap_or_default(),
                    span: tok.span,
                }
            }
            TokenKind::StrInterp => {
                let tok = self.advance();
                self.interpolated_string(&tok)
            }
            TokenKind::True => {
                let tok = self.advance();
                Expr::Bool {
                    value: true,
                    span: tok.span,
                }
            }
            TokenKind::False => {
                let tok = self.advance();
                Expr::Bool {
                    value: false,
                    span: tok.span,
                }
            }
            TokenKind::NoneKw => {
                let tok = self.advance();
                Expr::None { span: tok.span }
            }
            TokenKind::Ident => self.parse_ident_expr(),
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_block_expr(),
            TokenKind::If => self.parse_if_expr(),
            TokenKind::Match => self.parse_match_expr(),
            TokenKind::Fn => self.parse_fn_expr(),
            TokenKind::ErrorKw => {
                self.advance();
                let payload = self.parse_logic_or();
                let span = start.merge(payload.span());
                Expr::ErrorValue {
                    payload: Box::new(payload),
                    span,
                }
            }
            TokenKind::Error => {
                // The scanner already reported this token.
                self.advance();
                Expr::Error { span: start }
            }
            _ => {
                self.error_here(format!(
                    "expected an expression, found {}",
                    self.kind().describe()
                ));
                Expr::Error { span: start }
            }
        }
    }

    fn int_literal(&mut self, tok: &Token) -> Expr {
        match tok.literal.as_deref().map(str::parse::<i64>) {
            Some(Ok(value)) => Expr::Int {
                value,
                span: tok.span,
            },
            _ => {
                self.error_at("integer literal out of range", tok.span);
                Expr::Error { span: tok.span }
            }
        }
    }

    /// Identifier, or a struct literal when an uppercase name is directly
    /// followed by `{`.
    fn parse_ident_expr(&mut self) -> Expr {
        let tok = self.advance();
        let name = tok.literal.clone().unwrap_or_default();

        let is_type_name = name.starts_with(|c: char| c.is_uppercase());
        if is_type_name && self.at(TokenKind::LBrace) && self.continues_line() {
            return self.parse_struct_init(name, tok.span);
        }
        Expr::Ident {
            name,
            span: tok.span,
        }
    }

    fn parse_struct_init(&mut self, name: String, name_span: Span) -> Expr {
        self.advance(); // `{`
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            let Some(field_tok) = self.expect(TokenKind::Ident) else {
                self.recover(Recovery::Delimited(TokenKind::RBrace));
                self.eat(TokenKind::Comma);
                if self.pos == before {
                    self.advance();
                }
                continue;
            };
            if self.expect(TokenKind::Colon).is_none() {
                self.recover(Recovery::Delimited(TokenKind::RBrace));
                self.eat(TokenKind::Comma);
                continue;
            }
            let value = self.parse_expr();
            fields.push(FieldInit {
                name: field_tok.literal.clone().unwrap_or_default(),
                name_span: field_tok.span,
                value,
            });
            if !self.eat(TokenKind::Comma) && !self.at(TokenKind::RBrace) && !self.at_line_start() {
                break;
            }
        }
        let end = self.current_span();
        self.expect(TokenKind::RBrace);
        Expr::StructInit {
            name,
            name_span,
            fields,
            span: name_span.merge(end),
        }
    }

    /// `(e)` grouping or `(a, b)` tuple literal.
    fn parse_paren_expr(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // `(`
        if self.at(TokenKind::RParen) {
            let end = self.current_span();
            self.advance();
            self.error_at("empty parentheses are not an expression", start.merge(end));
            return Expr::Error {
                span: start.merge(end),
            };
        }

        let first = self.parse_expr();
        if self.at(TokenKind::Comma) {
            let mut elems = vec![first];
            while self.eat(TokenKind::Comma) {
                if self.at(TokenKind::RParen) {
                    break;
                }
                elems.push(self.parse_expr());
            }
            let end = self.current_span();
            self.expect(TokenKind::RParen);
            Expr::Tuple {
                elems,
                span: start.merge(end),
            }
        } else {
            self.expect(TokenKind::RParen);
            first
        }
    }

    fn parse_array_literal(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // `[`
        let mut elems = Vec::new();
        while !self.at(TokenKind::RBracket) && !self.at_eof() {
            if self.at(TokenKind::DotDot) {
                self.advance();
                let expr = self.parse_expr();
                elems.push(ArrayElem::Spread(expr));
            } else {
                elems.push(ArrayElem::Item(self.parse_expr()));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let end = self.current_span();
        if self.expect(TokenKind::RBracket).is_none() {
            self.recover(Recovery::Delimited(TokenKind::RBracket));
            self.eat(TokenKind::RBracket);
        }
        Expr::Array {
            elems,
            span: start.merge(end),
        }
    }

    /// `{ stmts }` -- the block's value is its final expression statement.
    pub(crate) fn parse_block_expr(&mut self) -> Expr {
        let start = self.current_span();
        if self.expect(TokenKind::LBrace).is_none() {
            return Expr::Error { span: start };
        }
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            let stmt = self.parse_stmt(false);
            let failed = matches!(stmt, Stmt::Error(_))
                || matches!(&stmt, Stmt::Expr(Expr::Error { .. }));
            stmts.push(stmt);
            if failed {
                if self.pos == before {
                    // The failed parse consumed nothing; force progress.
                    self.advance();
                }
                self.recover(Recovery::Block);
            }
        }
        let end = self.current_span();
        self.expect(TokenKind::RBrace);
        Expr::Block {
            stmts,
            span: start.merge(end),
        }
    }

    fn parse_if_expr(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // `if`
        let cond = self.parse_expr();
        let then_branch = self.parse_block_expr();
        let else_branch = if self.at(TokenKind::Else) {
            self.advance();
            if self.at(TokenKind::If) {
                Some(Box::new(self.parse_if_expr()))
            } else {
                Some(Box::new(self.parse_block_expr()))
            }
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|e| e.span())
            .unwrap_or_else(|| then_branch.span());
        Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
            span: start.merge(end),
        }
    }

    fn parse_match_expr(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // `match`
        let subject = self.parse_expr();
        if self.expect(TokenKind::LBrace).is_none() {
            return Expr::Error {
                span: start.merge(self.current_span()),
            };
        }

        let mut arms = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            let pattern = self.parse_pattern();
            if self.expect(TokenKind::Arrow).is_none() {
                self.recover(Recovery::MatchArm);
                self.eat(TokenKind::Comma);
                if self.pos == before {
                    self.advance();
                }
                continue;
            }
            let body = self.parse_expr();
            let span = pattern.span().merge(body.span());
            arms.push(MatchArm {
                pattern,
                body,
                span,
            });
            self.eat(TokenKind::Comma);
        }
        let end = self.current_span();
        self.expect(TokenKind::RBrace);
        Expr::Match {
            subject: Box::new(subject),
            arms,
            span: start.merge(end),
        }
    }

    /// Anonymous function: `fn(params) ret { body }`.
    fn parse_fn_expr(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // `fn`
        let Some((params, return_ty)) = self.parse_fn_signature() else {
            return Expr::Error {
                span: start.merge(self.current_span()),
            };
        };
        let body = self.parse_block_expr();
        let span = start.merge(body.span());
        Expr::FnExpr {
            params,
            return_ty,
            body: Box::new(body),
            span,
        }
    }

    /// Split an interpolation-flagged string literal into parts. The
    /// token carries the raw inner text; escapes are decoded here so that
    /// `\$` stays literal while `$name` becomes an interpolation part.
    fn interpolated_string(&mut self, tok: &Token) -> Expr {
        let raw = tok.literal.clone().unwrap_or_default();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(esc) = chars.next() {
                        // The scanner already diagnosed unknown escapes.
                        text.push(decode_escape(esc).unwrap_or(esc));
                    }
                }
                '$' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next.is_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        self.error_at("expected an identifier after '$'", tok.span);
                        text.push('$');
                    } else {
                        if !text.is_empty() {
                            parts.push(StrPart::Text(std::mem::take(&mut text)));
                        }
                        parts.push(StrPart::Ident(name, tok.span));
                    }
                }
                _ => text.push(c),
            }
        }
        if !text.is_empty() {
            parts.push(StrPart::Text(text));
        }
        Expr::InterpStr {
            parts,
            span: tok.span,
        }
    }
}
