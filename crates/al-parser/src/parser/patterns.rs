//! Pattern parsing for match arms and `let` bindings.

use al_common::token::TokenKind;

use super::{Parser, Recovery};
use crate::ast::Pattern;

impl Parser<'_> {
    /// Parse a pattern, including or-alternation `p1 | p2 | ...`.
    pub(crate) fn parse_pattern(&mut self) -> Pattern {
        let first = self.parse_single_pattern();
        if !self.at(TokenKind::Pipe) {
            return first;
        }
        let mut alts = vec![first];
        while self.eat(TokenKind::Pipe) {
            alts.push(self.parse_single_pattern());
        }
        let span = alts
            .first()
            .map(|p| p.span())
            .unwrap_or_else(|| self.current_span())
            .merge(alts.last().map(|p| p.span()).unwrap_or_else(|| self.current_span()));
        Pattern::Or { alts, span }
    }

    fn parse_single_pattern(&mut self) -> Pattern {
        let start = self.current_span();
        match self.kind() {
            TokenKind::Int | TokenKind::Minus => self.parse_number_pattern(),
            TokenKind::Float => {
                let tok = self.advance();
                let value = tok
                    .literal
                    .as_deref()
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(0.0);
                Pattern::Float {
                    value,
                    span: tok.span,
                }
            }
            TokenKind::Str | TokenKind::Char => {
                let tok = self.advance();
                Pattern::Str {
                    value: tok.literal.clone().unwrap_or_default(),
                    span: tok.span,
                }
            }
            TokenKind::StrInterp => {
                let tok = self.advance();
                self.error_at("interpolated strings cannot be used as patterns", tok.span);
                Pattern::Wildcard { span: tok.span }
            }
            TokenKind::True => {
                let tok = self.advance();
                Pattern::Bool {
                    value: true,
                    span: tok.span,
                }
            }
            TokenKind::False => {
                let tok = self.advance();
                Pattern::Bool {
                    value: false,
                    span: tok.span,
                }
            }
            TokenKind::NoneKw => {
                let tok = self.advance();
                Pattern::None { span: tok.span }
            }
            TokenKind::Else => {
                let tok = self.advance();
                Pattern::Wildcard { span: tok.span }
            }
            TokenKind::LParen => {
                self.advance();
                let mut elems = vec![self.parse_pattern()];
                while self.eat(TokenKind::Comma) {
                    if self.at(TokenKind::RParen) {
                        break;
                    }
                    elems.push(self.parse_pattern());
                }
                let end = self.current_span();
                self.expect(TokenKind::RParen);
                let span = start.merge(end);
                if elems.len() == 1 {
                    elems.pop().unwrap()
                } else {
                    Pattern::Tuple { elems, span }
                }
            }
            TokenKind::LBracket => self.parse_array_pattern(),
            TokenKind::Ident => self.parse_ident_pattern(),
            _ => {
                self.error_here(format!(
                    "expected a pattern, found {}",
                    self.kind().describe()
                ));
                Pattern::Wildcard { span: start }
            }
        }
    }

    /// Integer literal or half-open range pattern, with optional leading
    /// minus on either bound.
    fn parse_number_pattern(&mut self) -> Pattern {
        let start = self.current_span();
        let Some(value) = self.parse_signed_int() else {
            return Pattern::Wildcard { span: start };
        };
        if self.at(TokenKind::DotDot) {
            self.advance();
            let end_span = self.current_span();
            let Some(end) = self.parse_signed_int() else {
                return Pattern::Wildcard {
                    span: start.merge(end_span),
                };
            };
            Pattern::Range {
                start: value,
                end,
                span: start.merge(end_span),
            }
        } else {
            Pattern::Int { value, span: start }
        }
    }

    fn parse_signed_int(&mut self) -> Option<i64> {
        let negative = self.eat(TokenKind::Minus);
        let tok = self.expect(TokenKind::Int)?;
        let value = tok.literal.as_deref().and_then(|s| s.parse::<i64>().ok());
        match value {
            Some(v) => Some(if negative { -v } else { v }),
            None => {
                self.error_at("integer literal out of range", tok.span);
                None
            }
        }
    }

    /// `[p1, p2, ..rest]` -- the spread binding must be trailing.
    fn parse_array_pattern(&mut self) -> Pattern {
        let start = self.current_span();
        self.advance(); // `[`
        let mut elems = Vec::new();
        let mut rest = None;
        while !self.at(TokenKind::RBracket) && !self.at_eof() {
            if self.at(TokenKind::DotDot) {
                self.advance();
                match self.expect(TokenKind::Ident) {
                    Some(tok) => {
                        rest = Some((tok.literal.clone().unwrap_or_default(), tok.span));
                    }
                    None => self.recover(Recovery::Delimited(TokenKind::RBracket)),
                }
                if !self.at(TokenKind::RBracket) {
                    self.error_here("spread binding must be the last array pattern element");
                    self.recover(Recovery::Delimited(TokenKind::RBracket));
                }
                break;
            }
            elems.push(self.parse_pattern());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let end = self.current_span();
        self.expect(TokenKind::RBracket);
        Pattern::Array {
            elems,
            rest,
            span: start.merge(end),
        }
    }

    /// Identifier-led pattern: a binding, a variant shorthand `V`/`V(p)`,
    /// or a qualified variant `Enum.V`/`Enum.V(p)`.
    fn parse_ident_pattern(&mut self) -> Pattern {
        let tok = self.advance();
        let name = tok.literal.clone().unwrap_or_default();
        let start = tok.span;

        // Qualified form: `Enum.Variant`.
        if self.at(TokenKind::Dot) && self.nth_kind(1) == TokenKind::Ident {
            self.advance(); // `.`
            let variant_tok = self.advance();
            let variant = variant_tok.literal.clone().unwrap_or_default();
            let payload = self.parse_variant_payload();
            let span = start.merge(self.prev_span(variant_tok.span, &payload));
            return Pattern::Variant {
                enum_name: Some(name),
                name: variant,
                name_span: variant_tok.span,
                payload,
                span,
            };
        }

        // Call-shaped shorthand: `Variant(p1, p2)`.
        if self.at(TokenKind::LParen) {
            let payload = self.parse_variant_payload();
            let span = start.merge(self.prev_span(start, &payload));
            return Pattern::Variant {
                enum_name: None,
                name,
                name_span: start,
                payload,
                span,
            };
        }

        // Bare identifier: a binding, unless the type checker resolves it
        // to a payload-free variant of the subject's enum.
        Pattern::Name { name, span: start }
    }

    fn parse_variant_payload(&mut self) -> Option<Vec<Pattern>> {
        if !self.at(TokenKind::LParen) {
            return None;
        }
        self.advance(); // `(`
        let mut subs = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            subs.push(self.parse_pattern());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        Some(subs)
    }

    fn prev_span(
        &self,
        fallback: al_common::span::Span,
        payload: &Option<Vec<Pattern>>,
    ) -> al_common::span::Span {
        payload
            .as_ref()
            .and_then(|subs| subs.last().map(|p| p.span()))
            .unwrap_or(fallback)
    }
}
