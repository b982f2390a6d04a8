//! Statement and declaration parsing: `let`, `const`, `fn`, `struct`,
//! `enum`, `assert`, `import`/`export`, assignment, and written types.

use al_common::span::Span;
use al_common::token::TokenKind;

use super::{Parser, Recovery};
use crate::ast::{
    AssertStmt, AssignStmt, ConstStmt, EnumDecl, FieldDef, FnDecl, ImportStmt, LetStmt, Param,
    Stmt, StructDecl, TypeExpr, VariantDef,
};

impl Parser<'_> {
    /// Parse one statement. `top_level` selects the recovery anchor set.
    pub(crate) fn parse_stmt(&mut self, top_level: bool) -> Stmt {
        let recovery = if top_level {
            Recovery::TopLevel
        } else {
            Recovery::Block
        };
        match self.kind() {
            TokenKind::Let => self.parse_let(recovery),
            TokenKind::Const => self.parse_const(recovery),
            // `fn name(...)` is a declaration; `fn(...)` is an expression.
            TokenKind::Fn if self.nth_kind(1) == TokenKind::Ident => self.parse_fn_decl(recovery),
            TokenKind::Struct => self.parse_struct(recovery),
            TokenKind::Enum => self.parse_enum(recovery),
            TokenKind::Assert => self.parse_assert(),
            TokenKind::Import => self.parse_import(recovery),
            TokenKind::Export => self.parse_export(recovery),
            TokenKind::Ident if self.nth_kind(1) == TokenKind::Eq => self.parse_assign(),
            _ => Stmt::Expr(self.parse_expr()),
        }
    }

    fn parse_let(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `let`

        let pattern = self.parse_pattern();
        let ty = if !self.at(TokenKind::Eq) && self.at_type_start() {
            Some(self.parse_type())
        } else {
            None
        };

        if self.expect(TokenKind::Eq).is_none() {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        }
        let value = self.parse_expr();
        let span = start.merge(value.span());
        Stmt::Let(LetStmt {
            pattern,
            ty,
            value,
            span,
        })
    }

    fn parse_const(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `const`

        let Some(name_tok) = self.expect(TokenKind::Ident) else {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        };
        let name = name_tok.literal.clone().unwrap_or_default();
        let name_span = name_tok.span;

        let ty = if !self.at(TokenKind::Eq) && self.at_type_start() {
            Some(self.parse_type())
        } else {
            None
        };

        if self.expect(TokenKind::Eq).is_none() {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        }
        let value = self.parse_expr();
        let span = start.merge(value.span());
        Stmt::Const(ConstStmt {
            name,
            name_span,
            ty,
            value,
            span,
        })
    }

    fn parse_assign(&mut self) -> Stmt {
        let name_tok = self.advance();
        let name = name_tok.literal.clone().unwrap_or_default();
        self.advance(); // `=`
        let value = self.parse_expr();
        let span = name_tok.span.merge(value.span());
        Stmt::Assign(AssignStmt {
            name,
            name_span: name_tok.span,
            value,
            span,
        })
    }

    fn parse_fn_decl(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `fn`

        let Some(name_tok) = self.expect(TokenKind::Ident) else {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        };
        let name = name_tok.literal.clone().unwrap_or_default();

        let Some((params, return_ty)) = self.parse_fn_signature() else {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        };

        let body = self.parse_block_expr();
        let span = start.merge(body.span());
        Stmt::Fn(FnDecl {
            name,
            name_span: name_tok.span,
            params,
            return_ty,
            body,
            span,
        })
    }

    /// Parse `(params)` plus an optional return type. Shared between
    /// declarations and function expressions.
    pub(crate) fn parse_fn_signature(&mut self) -> Option<(Vec<Param>, Option<TypeExpr>)> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            match self.parse_param() {
                Some(param) => params.push(param),
                None => self.recover(Recovery::Delimited(TokenKind::RParen)),
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let return_ty = if self.at_type_start() && !self.at(TokenKind::LBrace) {
            Some(self.parse_type())
        } else {
            None
        };
        Some((params, return_ty))
    }

    fn parse_param(&mut self) -> Option<Param> {
        let name_tok = self.expect(TokenKind::Ident)?;
        let name = name_tok.literal.clone().unwrap_or_default();
        let ty = if self.at_type_start() && !self.at(TokenKind::Comma) && !self.at(TokenKind::RParen)
        {
            Some(self.parse_type())
        } else {
            None
        };
        let span = match &ty {
            Some(t) => name_tok.span.merge(t.span()),
            None => name_tok.span,
        };
        Some(Param {
            name,
            name_span: name_tok.span,
            ty,
            span,
        })
    }

    fn parse_struct(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `struct`

        let Some(name_tok) = self.expect(TokenKind::Ident) else {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        };
        let name = name_tok.literal.clone().unwrap_or_default();
        let type_params = self.parse_type_params();

        if self.expect(TokenKind::LBrace).is_none() {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        }

        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            match self.parse_field_def() {
                Some(field) => fields.push(field),
                None => self.recover(Recovery::Delimited(TokenKind::RBrace)),
            }
            self.eat(TokenKind::Comma);
            if self.pos == before {
                self.advance();
            }
        }
        let end = self.current_span();
        self.expect(TokenKind::RBrace);

        Stmt::Struct(StructDecl {
            name,
            name_span: name_tok.span,
            type_params,
            fields,
            span: start.merge(end),
        })
    }

    fn parse_field_def(&mut self) -> Option<FieldDef> {
        let name_tok = self.expect(TokenKind::Ident)?;
        let name = name_tok.literal.clone().unwrap_or_default();
        if !self.at_type_start() {
            self.error_here("expected a type after struct field name");
            return None;
        }
        let ty = self.parse_type();
        let span = name_tok.span.merge(ty.span());
        Some(FieldDef {
            name,
            name_span: name_tok.span,
            ty,
            span,
        })
    }

    fn parse_enum(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `enum`

        let Some(name_tok) = self.expect(TokenKind::Ident) else {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        };
        let name = name_tok.literal.clone().unwrap_or_default();
        let type_params = self.parse_type_params();

        if self.expect(TokenKind::LBrace).is_none() {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        }

        let mut variants = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            match self.parse_variant_def() {
                Some(variant) => variants.push(variant),
                None => self.recover(Recovery::Delimited(TokenKind::RBrace)),
            }
            self.eat(TokenKind::Comma);
            if self.pos == before {
                self.advance();
            }
        }
        let end = self.current_span();
        self.expect(TokenKind::RBrace);

        Stmt::Enum(EnumDecl {
            name,
            name_span: name_tok.span,
            type_params,
            variants,
            span: start.merge(end),
        })
    }

    fn parse_variant_def(&mut self) -> Option<VariantDef> {
        let name_tok = self.expect(TokenKind::Ident)?;
        let name = name_tok.literal.clone().unwrap_or_default();
        let mut payload = Vec::new();
        let mut span = name_tok.span;
        if self.at(TokenKind::LParen) {
            self.advance();
            while !self.at(TokenKind::RParen) && !self.at_eof() {
                payload.push(self.parse_type());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            let end = self.current_span();
            self.expect(TokenKind::RParen);
            span = span.merge(end);
        }
        Some(VariantDef {
            name,
            name_span: name_tok.span,
            payload,
            span,
        })
    }

    /// Optional `(a, b)` lowercase type-parameter list on struct/enum
    /// declarations.
    fn parse_type_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        if self.at(TokenKind::LParen) {
            self.advance();
            while !self.at(TokenKind::RParen) && !self.at_eof() {
                if let Some(tok) = self.expect(TokenKind::Ident) {
                    params.push(tok.literal.clone().unwrap_or_default());
                } else {
                    self.recover(Recovery::Delimited(TokenKind::RParen));
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen);
        }
        params
    }

    fn parse_assert(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance(); // `assert`
        let cond = self.parse_expr();
        let span = start.merge(cond.span());
        Stmt::Assert(AssertStmt { cond, span })
    }

    fn parse_import(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `import`
        let Some(name_tok) = self.expect(TokenKind::Ident) else {
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        };
        Stmt::Import(ImportStmt {
            name: name_tok.literal.clone().unwrap_or_default(),
            span: start.merge(name_tok.span),
        })
    }

    fn parse_export(&mut self, recovery: Recovery) -> Stmt {
        let start = self.current_span();
        self.advance(); // `export`
        if !matches!(
            self.kind(),
            TokenKind::Fn | TokenKind::Struct | TokenKind::Enum | TokenKind::Const
        ) {
            self.error_here("expected a declaration after 'export'");
            self.recover(recovery);
            return Stmt::Error(start.merge(self.current_span()));
        }
        let inner = self.parse_stmt(true);
        let span = start.merge(inner.span());
        Stmt::Export(Box::new(inner), span)
    }

    // ── Types ──────────────────────────────────────────────────────────

    /// Whether the current token can begin a written type.
    pub(crate) fn at_type_start(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Ident
                | TokenKind::LBracket
                | TokenKind::Question
                | TokenKind::Fn
                | TokenKind::LParen
        )
    }

    /// Parse a type, including the `T!E` result form.
    pub(crate) fn parse_type(&mut self) -> TypeExpr {
        let ok = self.parse_type_prefix();
        if self.at(TokenKind::Bang) && self.continues_line() {
            self.advance();
            let err = self.parse_type_prefix();
            let span = ok.span().merge(err.span());
            TypeExpr::Result {
                ok: Box::new(ok),
                err: Box::new(err),
                span,
            }
        } else {
            ok
        }
    }

    fn parse_type_prefix(&mut self) -> TypeExpr {
        let start = self.current_span();
        match self.kind() {
            TokenKind::Question => {
                self.advance();
                let inner = self.parse_type_prefix();
                let span = start.merge(inner.span());
                TypeExpr::Option {
                    inner: Box::new(inner),
                    span,
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let elem = self.parse_type();
                let end = self.current_span();
                self.expect(TokenKind::RBracket);
                TypeExpr::Array {
                    elem: Box::new(elem),
                    span: start.merge(end),
                }
            }
            TokenKind::Fn => self.parse_fn_type(start),
            TokenKind::LParen => {
                self.advance();
                let mut elems = vec![self.parse_type()];
                while self.eat(TokenKind::Comma) {
                    if self.at(TokenKind::RParen) {
                        break;
                    }
                    elems.push(self.parse_type());
                }
                let end = self.current_span();
                self.expect(TokenKind::RParen);
                let span = start.merge(end);
                if elems.len() == 1 {
                    // `(T)` is grouping, not a one-tuple.
                    elems.pop().unwrap()
                } else {
                    TypeExpr::Tuple { elems, span }
                }
            }
            TokenKind::Ident => {
                let tok = self.advance();
                let name = tok.literal.clone().unwrap_or_default();
                let mut args = Vec::new();
                let mut span = tok.span;
                // Generic application: `Box(Int)`. Only uppercase names
                // take arguments; a lowercase name is a type variable.
                if self.at(TokenKind::LParen)
                    && self.continues_line()
                    && name.starts_with(|c: char| c.is_uppercase())
                {
                    self.advance();
                    while !self.at(TokenKind::RParen) && !self.at_eof() {
                        args.push(self.parse_type());
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.current_span();
                    self.expect(TokenKind::RParen);
                    span = span.merge(end);
                }
                TypeExpr::Named { name, args, span }
            }
            _ => {
                self.error_here(format!("expected a type, found {}", self.kind().describe()));
                TypeExpr::Named {
                    name: String::new(),
                    args: Vec::new(),
                    span: start,
                }
            }
        }
    }

    /// `fn(A, B) R` -- the return type's `!E` folds into the function's
    /// error slot.
    fn parse_fn_type(&mut self, start: Span) -> TypeExpr {
        self.advance(); // `fn`
        self.expect(TokenKind::LParen);
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            params.push(self.parse_type());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        let ret = self.parse_type();
        let span = start.merge(ret.span());
        match ret {
            TypeExpr::Result { ok, err, .. } => TypeExpr::Function {
                params,
                ret: ok,
                err: Some(err),
                span,
            },
            other => TypeExpr::Function {
                params,
                ret: Box::new(other),
                err: None,
                span,
            },
        }
    }
}
