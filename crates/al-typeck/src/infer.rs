//! The checking pass: syntactic AST -> typed AST.
//!
//! One forward walk with two substages sharing a pass:
//!
//! 1. **Hoisting** -- all top-level `struct`/`enum` declarations get ids
//!    and registry entries, and all top-level `fn`/`const` signatures are
//!    inserted into the global scope, so mutual recursion type-checks.
//! 2. **Checking** -- every statement is visited in order; expressions
//!    get types via local inference and unification. A failed unification
//!    records a diagnostic and checking continues.
//!
//! Enum shorthand resolution: `V(..)` or bare `V` resolves to `E.V` when
//! the expected type is enum `E` with variant `V`, or when exactly one
//! declared enum owns a variant named `V`.

use al_common::span::Span;
use al_parser::ast::{self, BinaryOp, Expr, Pattern, Stmt, TypeExpr, UnaryOp};
use rustc_hash::FxHashMap;

use crate::builtins;
use crate::env::TypeEnv;
use crate::error::TypeError;
use crate::exhaustiveness;
use crate::registry::{EnumDef, StructDef, TypeRegistry};
use crate::ty::{Prim, Scheme, Ty, TyVar};
use crate::typed::{
    FailureKind, TArrayElem, TExpr, TFnDecl, TMatchArm, TParam, TPattern, TProgram, TStmt,
    TStrPart,
};
use crate::unify::InferCtx;

/// The enclosing function's return contract, for `error`/`!` checking.
pub(crate) struct FnCtx {
    ret: Ty,
    err: Option<Ty>,
}

/// How a bare variant name resolved.
enum VariantLookup {
    Found(EnumDef),
    Ambiguous,
    NotFound,
}

pub(crate) struct Checker {
    pub(crate) ctx: InferCtx,
    pub(crate) env: TypeEnv,
    pub(crate) registry: TypeRegistry,
    pub(crate) span_types: FxHashMap<Span, Ty>,
    pub(crate) current_fn: Option<FnCtx>,
}

impl Checker {
    pub(crate) fn new() -> Self {
        let mut ctx = InferCtx::new();
        let mut env = TypeEnv::new();
        builtins::register(&mut env, &mut ctx);
        Checker {
            ctx,
            env,
            registry: TypeRegistry::new(),
            span_types: FxHashMap::default(),
            current_fn: None,
        }
    }

    // ── Hoisting ───────────────────────────────────────────────────────

    pub(crate) fn check_program(&mut self, program: &ast::Program) -> TProgram {
        // Pass A: reserve ids for every struct/enum name.
        for stmt in &program.stmts {
            self.reserve_type_decl(peel_export(stmt));
        }
        // Pass B: lower field/variant types now that every name resolves.
        for stmt in &program.stmts {
            self.fill_type_decl(peel_export(stmt));
        }
        // Pass C: hoist fn signatures and const names.
        for stmt in &program.stmts {
            match peel_export(stmt) {
                Stmt::Fn(decl) => self.hoist_fn(decl),
                Stmt::Const(decl) => {
                    let var = self.ctx.fresh_var();
                    self.env.insert(decl.name.clone(), Scheme::mono(var), false);
                }
                _ => {}
            }
        }
        // Pass D: check in order.
        let mut stmts = Vec::new();
        for stmt in &program.stmts {
            if let Some(t) = self.check_stmt(peel_export(stmt), true) {
                stmts.push(t);
            }
        }
        TProgram { stmts }
    }

    fn reserve_type_decl(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Struct(decl) => {
                let id = self.registry.fresh_id();
                let param_vars: Vec<TyVar> =
                    decl.type_params.iter().map(|_| self.ctx.fresh_key()).collect();
                self.registry.insert_struct(StructDef {
                    id,
                    name: decl.name.clone(),
                    type_params: decl.type_params.clone(),
                    param_vars,
                    fields: Vec::new(),
                });
            }
            Stmt::Enum(decl) => {
                let id = self.registry.fresh_id();
                let param_vars: Vec<TyVar> =
                    decl.type_params.iter().map(|_| self.ctx.fresh_key()).collect();
                self.registry.insert_enum(EnumDef {
                    id,
                    name: decl.name.clone(),
                    type_params: decl.type_params.clone(),
                    param_vars,
                    variants: Vec::new(),
                });
            }
            _ => {}
        }
    }

    fn fill_type_decl(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Struct(decl) => {
                let Some(def) = self.registry.struct_by_name(&decl.name).cloned() else {
                    return;
                };
                let mut vars = self.param_var_map(&def.type_params, &def.param_vars);
                let mut fields = Vec::new();
                for field in &decl.fields {
                    if fields.iter().any(|(n, _)| n == &field.name) {
                        self.ctx.errors.push(TypeError::DuplicateField {
                            field: field.name.clone(),
                            span: field.name_span,
                        });
                        continue;
                    }
                    let ty = self.lower_decl_type(&field.ty, &mut vars, &decl.name);
                    fields.push((field.name.clone(), ty));
                }
                let mut updated = def;
                updated.fields = fields;
                self.registry.insert_struct(updated);
            }
            Stmt::Enum(decl) => {
                let Some(def) = self.registry.enum_by_name(&decl.name).cloned() else {
                    return;
                };
                let mut vars = self.param_var_map(&def.type_params, &def.param_vars);
                let mut variants = Vec::new();
                for variant in &decl.variants {
                    let payload = variant
                        .payload
                        .iter()
                        .map(|t| self.lower_decl_type(t, &mut vars, &decl.name))
                        .collect();
                    variants.push((variant.name.clone(), payload));
                }
                let mut updated = def;
                updated.variants = variants;
                self.registry.insert_enum(updated);
            }
            _ => {}
        }
    }

    fn param_var_map(&self, params: &[String], vars: &[TyVar]) -> FxHashMap<String, TyVar> {
        params
            .iter()
            .cloned()
            .zip(vars.iter().copied())
            .collect()
    }

    /// Lower a type inside a struct/enum declaration: lowercase names must
    /// be declared type parameters.
    fn lower_decl_type(
        &mut self,
        ty: &TypeExpr,
        vars: &mut FxHashMap<String, TyVar>,
        owner: &str,
    ) -> Ty {
        if let TypeExpr::Named { name, args, span } = ty {
            if is_type_var_name(name) && !vars.contains_key(name) {
                self.ctx.errors.push(TypeError::UnknownType {
                    name: format!("{} (not a type parameter of {})", name, owner),
                    span: *span,
                });
                let var = self.ctx.fresh_key();
                vars.insert(name.clone(), var);
            }
            let _ = args;
        }
        self.lower_type(ty, vars)
    }

    fn hoist_fn(&mut self, decl: &ast::FnDecl) {
        self.ctx.enter_level();
        let mut vars: FxHashMap<String, TyVar> = FxHashMap::default();
        let params: Vec<Ty> = decl
            .params
            .iter()
            .map(|p| match &p.ty {
                Some(t) => self.lower_type(t, &mut vars),
                None => self.ctx.fresh_var(),
            })
            .collect();
        let (ret, err) = match &decl.return_ty {
            Some(TypeExpr::Result { ok, err, .. }) => (
                self.lower_type(ok, &mut vars),
                Some(self.lower_type(err, &mut vars)),
            ),
            Some(other) => (self.lower_type(other, &mut vars), None),
            None => (self.ctx.fresh_var(), None),
        };
        self.ctx.leave_level();
        let fn_ty = Ty::function(params, ret, err);
        self.env.insert(decl.name.clone(), Scheme::mono(fn_ty), false);
    }

    // ── Type lowering ──────────────────────────────────────────────────

    /// Lower a written type. Lowercase names become shared type variables
    /// from `vars` (created on first use).
    fn lower_type(&mut self, ty: &TypeExpr, vars: &mut FxHashMap<String, TyVar>) -> Ty {
        match ty {
            TypeExpr::Named { name, args, span } => {
                match name.as_str() {
                    "Int" => return Ty::int(),
                    "Float" => return Ty::float(),
                    "String" => return Ty::string(),
                    "Bool" => return Ty::bool(),
                    "None" => return Ty::None,
                    _ => {}
                }
                if is_type_var_name(name) {
                    let var = match vars.get(name) {
                        Some(v) => *v,
                        None => {
                            let v = self.ctx.fresh_key();
                            vars.insert(name.clone(), v);
                            v
                        }
                    };
                    return Ty::Var(var);
                }
                let lowered_args: Vec<Ty> =
                    args.iter().map(|a| self.lower_type(a, vars)).collect();
                if let Some(def) = self.registry.struct_by_name(name).cloned() {
                    self.check_type_arity(&def.name, def.type_params.len(), &lowered_args, *span);
                    return Ty::Struct {
                        id: def.id,
                        name: def.name,
                        args: lowered_args,
                    };
                }
                if let Some(def) = self.registry.enum_by_name(name).cloned() {
                    self.check_type_arity(&def.name, def.type_params.len(), &lowered_args, *span);
                    return Ty::Enum {
                        id: def.id,
                        name: def.name,
                        args: lowered_args,
                    };
                }
                self.ctx.errors.push(TypeError::UnknownType {
                    name: name.clone(),
                    span: *span,
                });
                self.ctx.fresh_var()
            }
            TypeExpr::Array { elem, .. } => Ty::array(self.lower_type(elem, vars)),
            TypeExpr::Option { inner, .. } => Ty::option(self.lower_type(inner, vars)),
            TypeExpr::Result { ok, err, .. } => {
                Ty::result(self.lower_type(ok, vars), self.lower_type(err, vars))
            }
            TypeExpr::Function {
                params, ret, err, ..
            } => Ty::function(
                params.iter().map(|p| self.lower_type(p, vars)).collect(),
                self.lower_type(ret, vars),
                err.as_ref().map(|e| self.lower_type(e, vars)),
            ),
            TypeExpr::Tuple { elems, .. } => {
                Ty::Tuple(elems.iter().map(|e| self.lower_type(e, vars)).collect())
            }
        }
    }

    fn check_type_arity(&mut self, name: &str, expected: usize, args: &[Ty], span: Span) {
        if expected != args.len() && !args.is_empty() {
            self.ctx.errors.push(TypeError::ArityMismatch {
                what: format!("type {}", name),
                expected,
                found: args.len(),
                span,
            });
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn check_stmt(&mut self, stmt: &Stmt, top_level: bool) -> Option<TStmt> {
        match stmt {
            Stmt::Let(decl) => self.check_let(decl),
            Stmt::Const(decl) => self.check_const(decl, top_level),
            Stmt::Assign(decl) => self.check_assign(decl),
            Stmt::Fn(decl) => Some(self.check_fn_decl(decl, top_level)),
            Stmt::Struct(_) | Stmt::Enum(_) => {
                if !top_level {
                    // Nested type declarations are hoisted too for
                    // simplicity of a single registry; reserve and fill
                    // on first sight.
                    self.reserve_type_decl(stmt);
                    self.fill_type_decl(stmt);
                }
                None
            }
            Stmt::Assert(decl) => {
                let (cond, cond_ty) = self.check_expr(&decl.cond, Some(&Ty::bool()));
                let _ = self.ctx.unify(Ty::bool(), cond_ty, decl.cond.span());
                Some(TStmt::Assert {
                    cond,
                    span: decl.span,
                })
            }
            Stmt::Import(_) => None,
            Stmt::Export(inner, _) => self.check_stmt(inner, top_level),
            Stmt::Expr(expr) => {
                let (texpr, _) = self.check_expr(expr, None);
                Some(TStmt::Expr(texpr))
            }
            Stmt::Error(_) => None,
        }
    }

    fn check_let(&mut self, decl: &ast::LetStmt) -> Option<TStmt> {
        let annotation = decl.ty.as_ref().map(|t| {
            let mut vars = FxHashMap::default();
            self.lower_type(t, &mut vars)
        });
        let (value, value_ty) = self.check_expr(&decl.value, annotation.as_ref());
        let bound_ty = match annotation {
            Some(ann) => {
                let _ = self
                    .ctx
                    .unify(ann.clone(), value_ty, decl.value.span());
                ann
            }
            None => value_ty,
        };

        self.validate_binding_pattern(&decl.pattern);
        let pattern = self.check_pattern(&decl.pattern, &bound_ty);
        Some(TStmt::Let {
            pattern,
            ty: bound_ty,
            value,
            span: decl.span,
        })
    }

    /// `let` accepts names, tuple destructuring, and enum-variant
    /// (type-pattern) bindings; refutable literal forms are rejected.
    fn validate_binding_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Name { .. } | Pattern::Wildcard { .. } => {}
            Pattern::Tuple { elems, .. } => {
                for p in elems {
                    self.validate_binding_pattern(p);
                }
            }
            Pattern::Variant { payload, .. } => {
                if let Some(subs) = payload {
                    for p in subs {
                        self.validate_binding_pattern(p);
                    }
                }
            }
            other => {
                self.ctx.errors.push(TypeError::InvalidBindingPattern {
                    reason: "only names, tuples, and enum variants can appear in a binding"
                        .to_string(),
                    span: other.span(),
                });
            }
        }
    }

    fn check_const(&mut self, decl: &ast::ConstStmt, top_level: bool) -> Option<TStmt> {
        let annotation = decl.ty.as_ref().map(|t| {
            let mut vars = FxHashMap::default();
            self.lower_type(t, &mut vars)
        });
        let (value, value_ty) = self.check_expr(&decl.value, annotation.as_ref());
        let ty = match annotation {
            Some(ann) => {
                let _ = self.ctx.unify(ann.clone(), value_ty, decl.value.span());
                ann
            }
            None => value_ty,
        };
        if top_level {
            // Hoisting already inserted a fresh var; constrain it.
            if let Some(binding) = self.env.lookup(&decl.name) {
                let hoisted = binding.scheme.ty.clone();
                let _ = self.ctx.unify(hoisted, ty.clone(), decl.name_span);
            }
        } else {
            self.env
                .insert(decl.name.clone(), Scheme::mono(ty.clone()), false);
        }
        self.span_types.insert(decl.name_span, ty.clone());
        Some(TStmt::Const {
            name: decl.name.clone(),
            ty,
            value,
            span: decl.span,
        })
    }

    fn check_assign(&mut self, decl: &ast::AssignStmt) -> Option<TStmt> {
        let target_ty = match self.env.lookup(&decl.name) {
            Some(binding) => {
                if !binding.assignable {
                    self.ctx.errors.push(TypeError::NotAssignable {
                        name: decl.name.clone(),
                        span: decl.name_span,
                    });
                }
                Some(binding.scheme.ty.clone())
            }
            None => {
                self.ctx.errors.push(TypeError::UnboundVariable {
                    name: decl.name.clone(),
                    span: decl.name_span,
                });
                None
            }
        };
        let (value, value_ty) = self.check_expr(&decl.value, target_ty.as_ref());
        if let Some(target) = target_ty {
            let _ = self.ctx.unify(target, value_ty, decl.value.span());
        }
        Some(TStmt::Assign {
            name: decl.name.clone(),
            value,
            span: decl.span,
        })
    }

    fn check_fn_decl(&mut self, decl: &ast::FnDecl, hoisted: bool) -> TStmt {
        if !hoisted {
            self.hoist_fn(decl);
        }
        let fn_ty = self
            .env
            .lookup(&decl.name)
            .map(|b| b.scheme.ty.clone())
            .unwrap_or_else(|| self.ctx.fresh_var());
        let (param_tys, ret, err) = match self.ctx.resolve(fn_ty.clone()) {
            Ty::Function { params, ret, err } => (params, *ret, err.map(|e| *e)),
            _ => {
                let fresh = self.ctx.fresh_var();
                (vec![], fresh, None)
            }
        };

        self.env.push_scope();
        self.ctx.enter_level();
        let mut params = Vec::new();
        for (param, ty) in decl.params.iter().zip(param_tys.iter()) {
            self.env
                .insert(param.name.clone(), Scheme::mono(ty.clone()), true);
            self.span_types.insert(param.name_span, ty.clone());
            params.push(TParam {
                name: param.name.clone(),
                ty: ty.clone(),
                span: param.span,
            });
        }

        let saved = self.current_fn.replace(FnCtx {
            ret: ret.clone(),
            err: err.clone(),
        });
        let (body, body_ty) = self.check_expr(&decl.body, Some(&ret));
        let _ = self.ctx.unify(ret.clone(), body_ty, decl.body.span());
        self.current_fn = saved;

        self.ctx.leave_level();
        self.env.pop_scope();

        // Upgrade the hoisted monomorphic signature to its generalized
        // scheme so later call sites instantiate fresh variables.
        let scheme = self.ctx.generalize(fn_ty);
        self.env.update_scheme(&decl.name, scheme);
        self.span_types.insert(decl.name_span, Ty::function(param_tys, ret.clone(), err.clone()));

        TStmt::Fn(TFnDecl {
            name: decl.name.clone(),
            params,
            ret,
            err,
            body,
            span: decl.span,
        })
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn check_expr(&mut self, expr: &Expr, expected: Option<&Ty>) -> (TExpr, Ty) {
        let (texpr, ty) = self.check_expr_inner(expr, expected);
        self.span_types.insert(expr.span(), ty.clone());
        (texpr, ty)
    }

    fn check_expr_inner(&mut self, expr: &Expr, expected: Option<&Ty>) -> (TExpr, Ty) {
        match expr {
            Expr::Int { value, span } => (
                TExpr::Int {
                    value: *value,
                    span: *span,
                },
                Ty::int(),
            ),
            Expr::Float { value, span } => (
                TExpr::Float {
                    value: *value,
                    span: *span,
                },
                Ty::float(),
            ),
            Expr::Str { value, span } => (
                TExpr::Str {
                    value: value.clone(),
                    span: *span,
                },
                Ty::string(),
            ),
            Expr::Bool { value, span } => (
                TExpr::Bool {
                    value: *value,
                    span: *span,
                },
                Ty::bool(),
            ),
            Expr::None { span } => {
                let inner = self.ctx.fresh_var();
                (TExpr::None { span: *span }, Ty::option(inner))
            }
            Expr::InterpStr { parts, span } => self.check_interp(parts, *span),
            Expr::Ident { name, span } => self.check_ident(name, *span, expected),
            Expr::Block { stmts, span } => self.check_block(stmts, *span, expected),
            Expr::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => self.check_if(cond, then_branch, else_branch.as_deref(), *span, expected),
            Expr::Match {
                subject,
                arms,
                span,
            } => self.check_match(subject, arms, *span, expected),
            Expr::Or {
                value,
                receiver,
                fallback,
                span,
            } => self.check_or(value, receiver.as_ref(), fallback, *span),
            Expr::ErrorValue { payload, span } => {
                let (tp, payload_ty) = self.check_expr(payload, None);
                match self.current_fn.as_ref().map(|f| f.err.clone()) {
                    Some(Some(err)) => {
                        let _ = self.ctx.unify(err, payload_ty, payload.span());
                    }
                    _ => {
                        self.ctx
                            .errors
                            .push(TypeError::ErrorOutsideResultFn { span: *span });
                    }
                }
                let ty = self.ctx.fresh_var();
                (
                    TExpr::ErrorValue {
                        payload: Box::new(tp),
                        span: *span,
                    },
                    ty,
                )
            }
            Expr::Propagate { value, span } => self.check_propagate(value, *span),
            Expr::Binary { op, lhs, rhs, span } => self.check_binary(*op, lhs, rhs, *span),
            Expr::Unary { op, operand, span } => {
                let (to, operand_ty) = self.check_expr(operand, None);
                let ty = match op {
                    UnaryOp::Not => {
                        let _ = self.ctx.unify(Ty::bool(), operand_ty, operand.span());
                        Ty::bool()
                    }
                    UnaryOp::Neg => {
                        let resolved = self.ctx.resolve(operand_ty.clone());
                        match resolved {
                            Ty::Prim(Prim::Int) | Ty::Prim(Prim::Float) | Ty::Var(_) => {
                                operand_ty
                            }
                            other => {
                                self.ctx.errors.push(TypeError::Mismatch {
                                    expected: Ty::int(),
                                    found: other,
                                    span: operand.span(),
                                });
                                Ty::int()
                            }
                        }
                    }
                };
                (
                    TExpr::Unary {
                        op: *op,
                        operand: Box::new(to),
                        span: *span,
                    },
                    ty,
                )
            }
            Expr::Call { callee, args, span } => self.check_call(callee, args, *span, expected),
            Expr::Property {
                object,
                name,
                name_span,
                span,
            } => self.check_property(object, name, *name_span, *span),
            Expr::TupleIndex {
                object,
                index,
                span,
            } => {
                let (to, object_ty) = self.check_expr(object, None);
                let resolved = self.ctx.resolve(object_ty);
                let ty = match &resolved {
                    Ty::Tuple(elems) => match elems.get(*index as usize) {
                        Some(t) => t.clone(),
                        None => {
                            self.ctx.errors.push(TypeError::TupleIndexOutOfBounds {
                                ty: resolved.clone(),
                                index: *index,
                                span: *span,
                            });
                            self.ctx.fresh_var()
                        }
                    },
                    _ => {
                        self.ctx.errors.push(TypeError::NoSuchField {
                            ty: resolved.clone(),
                            field: index.to_string(),
                            span: *span,
                        });
                        self.ctx.fresh_var()
                    }
                };
                (
                    TExpr::TupleIndex {
                        object: Box::new(to),
                        index: *index,
                        span: *span,
                    },
                    ty,
                )
            }
            Expr::Array { elems, span } => self.check_array(elems, *span, expected),
            Expr::Tuple { elems, span } => {
                let mut telems = Vec::new();
                let mut tys = Vec::new();
                for e in elems {
                    let (te, ty) = self.check_expr(e, None);
                    telems.push(te);
                    tys.push(ty);
                }
                (
                    TExpr::Tuple {
                        elems: telems,
                        span: *span,
                    },
                    Ty::Tuple(tys),
                )
            }
            Expr::Index {
                object,
                index,
                span,
            } => {
                let (to, object_ty) = self.check_expr(object, None);
                let (ti, index_ty) = self.check_expr(index, None);
                let _ = self.ctx.unify(Ty::int(), index_ty, index.span());
                let elem = self.ctx.fresh_var();
                let resolved = self.ctx.resolve(object_ty.clone());
                match resolved {
                    Ty::Array(_) | Ty::Var(_) => {
                        let _ = self
                            .ctx
                            .unify(Ty::array(elem.clone()), object_ty, object.span());
                    }
                    other => {
                        self.ctx.errors.push(TypeError::NotIndexable {
                            ty: other,
                            span: *span,
                        });
                    }
                }
                (
                    TExpr::Index {
                        object: Box::new(to),
                        index: Box::new(ti),
                        span: *span,
                    },
                    elem,
                )
            }
            Expr::Range { start, end, span } => {
                let (ts, start_ty) = self.check_expr(start, None);
                let (te, end_ty) = self.check_expr(end, None);
                let _ = self.ctx.unify(Ty::int(), start_ty, start.span());
                let _ = self.ctx.unify(Ty::int(), end_ty, end.span());
                (
                    TExpr::Range {
                        start: Box::new(ts),
                        end: Box::new(te),
                        span: *span,
                    },
                    Ty::array(Ty::int()),
                )
            }
            Expr::StructInit {
                name,
                name_span,
                fields,
                span,
            } => self.check_struct_init(name, *name_span, fields, *span),
            Expr::FnExpr {
                params,
                return_ty,
                body,
                span,
            } => self.check_fn_expr(params, return_ty.as_ref(), body, *span),
            Expr::Error { span } => {
                // Already diagnosed by the parser; keep traversal alive.
                let ty = self.ctx.fresh_var();
                (TExpr::None { span: *span }, ty)
            }
        }
    }

    fn check_interp(&mut self, parts: &[ast::StrPart], span: Span) -> (TExpr, Ty) {
        let mut tparts = Vec::new();
        for part in parts {
            match part {
                ast::StrPart::Text(text) => tparts.push(TStrPart::Text(text.clone())),
                ast::StrPart::Ident(name, ident_span) => {
                    if self.env.lookup(name).is_none() {
                        self.ctx.errors.push(TypeError::UnboundVariable {
                            name: name.clone(),
                            span: *ident_span,
                        });
                    }
                    tparts.push(TStrPart::Ident(name.clone()));
                }
            }
        }
        (
            TExpr::InterpStr {
                parts: tparts,
                span,
            },
            Ty::string(),
        )
    }

    fn check_ident(&mut self, name: &str, span: Span, expected: Option<&Ty>) -> (TExpr, Ty) {
        if let Some(binding) = self.env.lookup(name) {
            let scheme = binding.scheme.clone();
            let ty = self.ctx.instantiate(&scheme);
            return (
                TExpr::Ident {
                    name: name.to_string(),
                    ty: ty.clone(),
                    span,
                },
                ty,
            );
        }
        // Enum shorthand: a bare variant name in an enum-typed context.
        match self.lookup_variant_enum(name, expected) {
            VariantLookup::Found(def) => {
                return self.construct_variant(&def, name, &[], span, span);
            }
            VariantLookup::Ambiguous => {
                self.ctx.errors.push(TypeError::AmbiguousVariant {
                    variant: name.to_string(),
                    candidates: self
                        .registry
                        .enums_with_variant(name)
                        .to_vec(),
                    span,
                });
            }
            VariantLookup::NotFound => {
                self.ctx.errors.push(TypeError::UnboundVariable {
                    name: name.to_string(),
                    span,
                });
            }
        }
        let ty = self.ctx.fresh_var();
        (
            TExpr::Ident {
                name: name.to_string(),
                ty: ty.clone(),
                span,
            },
            ty,
        )
    }

    /// Resolve which enum a bare variant name belongs to: the expected
    /// enum type wins; otherwise the name must belong to exactly one enum.
    fn lookup_variant_enum(&mut self, variant: &str, expected: Option<&Ty>) -> VariantLookup {
        if let Some(exp) = expected {
            let mut resolved = self.ctx.resolve(exp.clone());
            // Peel failure wrappers: `fn f() ?Shape { Point }`.
            loop {
                match resolved {
                    Ty::Option(inner) => resolved = *inner,
                    Ty::Result { ok, .. } => resolved = *ok,
                    other => {
                        resolved = other;
                        break;
                    }
                }
            }
            if let Ty::Enum { name, .. } = &resolved {
                if let Some(def) = self.registry.enum_by_name(name) {
                    if def.variant(variant).is_some() {
                        return VariantLookup::Found(def.clone());
                    }
                }
            }
        }
        match self.registry.enums_with_variant(variant) {
            [] => VariantLookup::NotFound,
            [single] => {
                let single = single.clone();
                VariantLookup::Found(
                    self.registry
                        .enum_by_name(&single)
                        .expect("variant owner must exist")
                        .clone(),
                )
            }
            _ => VariantLookup::Ambiguous,
        }
    }

    fn construct_variant(
        &mut self,
        def: &EnumDef,
        variant: &str,
        args: &[Expr],
        name_span: Span,
        span: Span,
    ) -> (TExpr, Ty) {
        let fresh_args: Vec<Ty> = def.param_vars.iter().map(|_| self.ctx.fresh_var()).collect();
        let subs: FxHashMap<TyVar, Ty> = def
            .param_vars
            .iter()
            .copied()
            .zip(fresh_args.iter().cloned())
            .collect();

        let payload_tys: Vec<Ty> = match def.variant(variant) {
            Some(tys) => tys
                .clone()
                .iter()
                .map(|t| self.ctx.substitute(t, &subs))
                .collect(),
            None => {
                self.ctx.errors.push(TypeError::UnknownVariant {
                    enum_name: Some(def.name.clone()),
                    variant: variant.to_string(),
                    span: name_span,
                });
                Vec::new()
            }
        };

        if args.len() != payload_tys.len() {
            self.ctx.errors.push(TypeError::ArityMismatch {
                what: format!("variant {}.{}", def.name, variant),
                expected: payload_tys.len(),
                found: args.len(),
                span,
            });
        }

        let mut payload = Vec::new();
        for (arg, pty) in args.iter().zip(payload_tys.iter()) {
            let (targ, arg_ty) = self.check_expr(arg, Some(pty));
            let _ = self.ctx.unify(pty.clone(), arg_ty, arg.span());
            payload.push(targ);
        }

        let ty = Ty::Enum {
            id: def.id,
            name: def.name.clone(),
            args: fresh_args,
        };
        (
            TExpr::Variant {
                enum_id: def.id,
                enum_name: def.name.clone(),
                variant: variant.to_string(),
                payload,
                span,
            },
            ty,
        )
    }

    fn check_block(
        &mut self,
        stmts: &[Stmt],
        span: Span,
        expected: Option<&Ty>,
    ) -> (TExpr, Ty) {
        self.env.push_scope();
        let mut tstmts = Vec::new();
        let mut block_ty = Ty::None;
        let last_index = stmts.len().saturating_sub(1);
        for (i, stmt) in stmts.iter().enumerate() {
            let is_last = i == last_index;
            match stmt {
                Stmt::Expr(expr) if is_last => {
                    let (texpr, ty) = self.check_expr(expr, expected);
                    block_ty = ty;
                    tstmts.push(TStmt::Expr(texpr));
                }
                _ => {
                    if let Some(t) = self.check_stmt(stmt, false) {
                        tstmts.push(t);
                    }
                    block_ty = Ty::None;
                }
            }
        }
        self.env.pop_scope();
        (
            TExpr::Block {
                stmts: tstmts,
                ty: block_ty.clone(),
                span,
            },
            block_ty,
        )
    }

    fn check_if(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        span: Span,
        expected: Option<&Ty>,
    ) -> (TExpr, Ty) {
        let (tc, cond_ty) = self.check_expr(cond, Some(&Ty::bool()));
        let _ = self.ctx.unify(Ty::bool(), cond_ty, cond.span());
        let (tt, then_ty) = self.check_expr(then_branch, expected);
        match else_branch {
            Some(else_expr) => {
                let (te, else_ty) = self.check_expr(else_expr, expected);
                let _ = self
                    .ctx
                    .unify(then_ty.clone(), else_ty, else_expr.span());
                (
                    TExpr::If {
                        cond: Box::new(tc),
                        then_branch: Box::new(tt),
                        else_branch: Some(Box::new(te)),
                        span,
                    },
                    then_ty,
                )
            }
            None => {
                // Without an else the false path yields none.
                let resolved = self.ctx.resolve(then_ty);
                let ty = match resolved {
                    Ty::None => Ty::None,
                    Ty::Option(_) => resolved,
                    other => Ty::option(other),
                };
                (
                    TExpr::If {
                        cond: Box::new(tc),
                        then_branch: Box::new(tt),
                        else_branch: None,
                        span,
                    },
                    ty,
                )
            }
        }
    }

    fn check_match(
        &mut self,
        subject: &Expr,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Ty>,
    ) -> (TExpr, Ty) {
        let (ts, subject_ty) = self.check_expr(subject, None);
        let mut tarms = Vec::new();
        let mut result_ty: Option<Ty> = None;

        for arm in arms {
            self.env.push_scope();
            let pattern = self.check_pattern(&arm.pattern, &subject_ty);
            let (body, body_ty) = self.check_expr(&arm.body, expected);
            self.env.pop_scope();

            match &result_ty {
                Some(prev) => {
                    let _ = self.ctx.unify(prev.clone(), body_ty, arm.body.span());
                }
                None => result_ty = Some(body_ty),
            }
            tarms.push(TMatchArm {
                pattern,
                body,
                span: arm.span,
            });
        }

        // Exhaustiveness for closed enum subjects.
        let resolved_subject = self.ctx.resolve(subject_ty.clone());
        if let Ty::Enum { name, .. } = &resolved_subject {
            if let Some(def) = self.registry.enum_by_name(name).cloned() {
                if let Some(err) = exhaustiveness::check_enum_match(&def, &tarms, span) {
                    self.ctx.errors.push(err);
                }
            }
        }

        let ty = result_ty.unwrap_or(Ty::None);
        (
            TExpr::Match {
                subject: Box::new(ts),
                subject_ty: resolved_subject,
                arms: tarms,
                span,
            },
            ty,
        )
    }

    fn check_or(
        &mut self,
        value: &Expr,
        receiver: Option<&(String, Span)>,
        fallback: &Expr,
        span: Span,
    ) -> (TExpr, Ty) {
        let (tv, value_ty) = self.check_expr(value, None);
        let mut resolved = self.ctx.resolve(value_ty.clone());

        // An unconstrained value is assumed optional.
        if let Ty::Var(_) = resolved {
            let inner = self.ctx.fresh_var();
            let _ = self
                .ctx
                .unify(value_ty.clone(), Ty::option(inner), value.span());
            resolved = self.ctx.resolve(value_ty.clone());
        }

        match resolved {
            Ty::Option(inner) => {
                if receiver.is_some() {
                    self.ctx.errors.push(TypeError::InvalidOrReceiver { span });
                }
                let (tf, fb_ty) = self.check_expr(fallback, Some(&*inner));
                let _ = self
                    .ctx
                    .unify(Ty::option((*inner).clone()), fb_ty.clone(), fallback.span());
                // `x or fallback` keeps optionality only when the
                // fallback itself is optional.
                let resolved_ty = match self.ctx.resolve(fb_ty) {
                    Ty::Option(_) | Ty::None => Ty::option((*inner).clone()),
                    _ => (*inner).clone(),
                };
                (
                    TExpr::Or {
                        value: Box::new(tv),
                        kind: FailureKind::Option,
                        receiver: None,
                        fallback: Box::new(tf),
                        resolved_ty: resolved_ty.clone(),
                        span,
                    },
                    resolved_ty,
                )
            }
            Ty::Result { ok, err } => {
                self.env.push_scope();
                if let Some((name, receiver_span)) = receiver {
                    self.env
                        .insert(name.clone(), Scheme::mono((*err).clone()), false);
                    self.span_types.insert(*receiver_span, (*err).clone());
                }
                let (tf, fb_ty) = self.check_expr(fallback, Some(&*ok));
                self.env.pop_scope();
                let _ = self.ctx.unify((*ok).clone(), fb_ty, fallback.span());
                let resolved_ty = (*ok).clone();
                (
                    TExpr::Or {
                        value: Box::new(tv),
                        kind: FailureKind::Result,
                        receiver: receiver.map(|(n, _)| n.clone()),
                        fallback: Box::new(tf),
                        resolved_ty: resolved_ty.clone(),
                        span,
                    },
                    resolved_ty,
                )
            }
            other => {
                self.ctx.errors.push(TypeError::InvalidOr {
                    ty: other.clone(),
                    span,
                });
                let (tf, _) = self.check_expr(fallback, None);
                (
                    TExpr::Or {
                        value: Box::new(tv),
                        kind: FailureKind::Option,
                        receiver: None,
                        fallback: Box::new(tf),
                        resolved_ty: other.clone(),
                        span,
                    },
                    other,
                )
            }
        }
    }

    fn check_propagate(&mut self, value: &Expr, span: Span) -> (TExpr, Ty) {
        let (tv, value_ty) = self.check_expr(value, None);
        let resolved = self.ctx.resolve(value_ty);

        let (kind, result_ty) = match resolved {
            Ty::Option(inner) => {
                match self.current_fn.as_ref().map(|f| f.ret.clone()) {
                    Some(ret) => {
                        let ret_resolved = self.ctx.resolve(ret.clone());
                        match ret_resolved {
                            Ty::Option(_) => {}
                            Ty::Var(_) => {
                                let fresh = self.ctx.fresh_var();
                                let _ = self.ctx.unify(ret, Ty::option(fresh), span);
                            }
                            _ => {
                                self.ctx.errors.push(TypeError::InvalidPropagate {
                                    reason:
                                        "the enclosing function must return an option ('?T')"
                                            .to_string(),
                                    span,
                                });
                            }
                        }
                    }
                    None => {
                        self.ctx.errors.push(TypeError::InvalidPropagate {
                            reason: "'!' cannot be used outside a function".to_string(),
                            span,
                        });
                    }
                }
                (FailureKind::Option, *inner)
            }
            Ty::Result { ok, err } => {
                match self.current_fn.as_ref().map(|f| f.err.clone()) {
                    Some(Some(fn_err)) => {
                        let _ = self.ctx.unify(fn_err, (*err).clone(), span);
                    }
                    Some(None) => {
                        self.ctx.errors.push(TypeError::InvalidPropagate {
                            reason:
                                "the enclosing function must declare a compatible error type"
                                    .to_string(),
                            span,
                        });
                    }
                    None => {
                        self.ctx.errors.push(TypeError::InvalidPropagate {
                            reason: "'!' cannot be used outside a function".to_string(),
                            span,
                        });
                    }
                }
                (FailureKind::Result, *ok)
            }
            other => {
                self.ctx.errors.push(TypeError::InvalidPropagate {
                    reason: format!("a value of type {} can never fail", other),
                    span,
                });
                (FailureKind::Option, other)
            }
        };

        (
            TExpr::Propagate {
                value: Box::new(tv),
                kind,
                resolved_ty: result_ty.clone(),
                span,
            },
            result_ty,
        )
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> (TExpr, Ty) {
        let (tl, lhs_ty) = self.check_expr(lhs, None);
        let (tr, rhs_ty) = self.check_expr(rhs, None);

        let ty = match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod => {
                let rl = self.ctx.resolve(lhs_ty.clone());
                let rr = self.ctx.resolve(rhs_ty.clone());
                // Mixed Int/Float arithmetic widens to Float at runtime,
                // so concrete numeric operands need not unify.
                if is_numeric(&rl) && is_numeric(&rr) {
                    if rl == Ty::float() || rr == Ty::float() {
                        Ty::float()
                    } else {
                        Ty::int()
                    }
                } else {
                    let _ = self.ctx.unify(lhs_ty.clone(), rhs_ty, rhs.span());
                    let resolved = self.ctx.resolve(lhs_ty.clone());
                    let numeric_ok = matches!(resolved, Ty::Prim(Prim::Int) | Ty::Prim(Prim::Float) | Ty::Var(_));
                    let concat_ok = op == BinaryOp::Add && resolved == Ty::string();
                    if !numeric_ok && !concat_ok {
                        self.ctx.errors.push(TypeError::Mismatch {
                            expected: Ty::int(),
                            found: resolved,
                            span: lhs.span(),
                        });
                    }
                    lhs_ty
                }
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let rl = self.ctx.resolve(lhs_ty.clone());
                let rr = self.ctx.resolve(rhs_ty.clone());
                if !(is_numeric(&rl) && is_numeric(&rr)) {
                    let _ = self.ctx.unify(lhs_ty.clone(), rhs_ty, rhs.span());
                    let resolved = self.ctx.resolve(lhs_ty);
                    if !matches!(
                        resolved,
                        Ty::Prim(Prim::Int) | Ty::Prim(Prim::Float) | Ty::Var(_)
                    ) {
                        self.ctx.errors.push(TypeError::Mismatch {
                            expected: Ty::int(),
                            found: resolved,
                            span: lhs.span(),
                        });
                    }
                }
                Ty::bool()
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                let _ = self.ctx.unify(lhs_ty, rhs_ty, rhs.span());
                Ty::bool()
            }
            BinaryOp::And | BinaryOp::Or => {
                let _ = self.ctx.unify(Ty::bool(), lhs_ty, lhs.span());
                let _ = self.ctx.unify(Ty::bool(), rhs_ty, rhs.span());
                Ty::bool()
            }
        };

        (
            TExpr::Binary {
                op,
                lhs: Box::new(tl),
                rhs: Box::new(tr),
                ty: ty.clone(),
                span,
            },
            ty,
        )
    }

    fn check_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        span: Span,
        expected: Option<&Ty>,
    ) -> (TExpr, Ty) {
        // Qualified variant construction: `Shape.Circle(1.0)`.
        if let Expr::Property { object, name, name_span, .. } = callee {
            if let Expr::Ident {
                name: type_name, ..
            } = object.as_ref()
            {
                if self.env.lookup(type_name).is_none() {
                    if let Some(def) = self.registry.enum_by_name(type_name).cloned() {
                        return self.construct_variant(&def, name, args, *name_span, span);
                    }
                }
            }
        }

        // Shorthand variant construction: `Circle(1.0)`.
        if let Expr::Ident { name, span: id_span } = callee {
            if self.env.lookup(name).is_none() {
                match self.lookup_variant_enum(name, expected) {
                    VariantLookup::Found(def) => {
                        return self.construct_variant(&def, name, args, *id_span, span);
                    }
                    VariantLookup::Ambiguous => {
                        self.ctx.errors.push(TypeError::AmbiguousVariant {
                            variant: name.clone(),
                            candidates: self.registry.enums_with_variant(name).to_vec(),
                            span: *id_span,
                        });
                        let ty = self.ctx.fresh_var();
                        for arg in args {
                            let _ = self.check_expr(arg, None);
                        }
                        return (
                            TExpr::Ident {
                                name: name.clone(),
                                ty: ty.clone(),
                                span: *id_span,
                            },
                            ty,
                        );
                    }
                    VariantLookup::NotFound => {}
                }
            }
        }

        let (tc, callee_ty) = self.check_expr(callee, None);
        let resolved = self.ctx.resolve(callee_ty.clone());
        match resolved {
            Ty::Function { params, ret, err } => {
                if params.len() != args.len() {
                    self.ctx.errors.push(TypeError::ArityMismatch {
                        what: describe_callee(callee),
                        expected: params.len(),
                        found: args.len(),
                        span,
                    });
                }
                let mut targs = Vec::new();
                for (arg, pty) in args.iter().zip(params.iter()) {
                    let (targ, arg_ty) = self.check_expr(arg, Some(pty));
                    let _ = self.ctx.unify(pty.clone(), arg_ty, arg.span());
                    targs.push(targ);
                }
                for arg in args.iter().skip(params.len()) {
                    let (targ, _) = self.check_expr(arg, None);
                    targs.push(targ);
                }
                let ty = match err {
                    Some(e) => Ty::result(*ret, *e),
                    None => *ret,
                };
                (
                    TExpr::Call {
                        callee: Box::new(tc),
                        args: targs,
                        span,
                    },
                    ty,
                )
            }
            Ty::Var(_) => {
                let mut targs = Vec::new();
                let mut param_tys = Vec::new();
                for arg in args {
                    let (targ, arg_ty) = self.check_expr(arg, None);
                    targs.push(targ);
                    param_tys.push(arg_ty);
                }
                let ret = self.ctx.fresh_var();
                let _ = self.ctx.unify(
                    callee_ty,
                    Ty::function(param_tys, ret.clone(), None),
                    span,
                );
                (
                    TExpr::Call {
                        callee: Box::new(tc),
                        args: targs,
                        span,
                    },
                    ret,
                )
            }
            other => {
                self.ctx.errors.push(TypeError::NotAFunction {
                    ty: other,
                    span: callee.span(),
                });
                let mut targs = Vec::new();
                for arg in args {
                    let (targ, _) = self.check_expr(arg, None);
                    targs.push(targ);
                }
                let ty = self.ctx.fresh_var();
                (
                    TExpr::Call {
                        callee: Box::new(tc),
                        args: targs,
                        span,
                    },
                    ty,
                )
            }
        }
    }

    fn check_property(
        &mut self,
        object: &Expr,
        name: &str,
        name_span: Span,
        span: Span,
    ) -> (TExpr, Ty) {
        // Bare qualified variant: `Shape.Point`.
        if let Expr::Ident {
            name: type_name, ..
        } = object
        {
            if self.env.lookup(type_name).is_none() {
                if let Some(def) = self.registry.enum_by_name(type_name).cloned() {
                    return self.construct_variant(&def, name, &[], name_span, span);
                }
            }
        }

        let (to, object_ty) = self.check_expr(object, None);
        let resolved = self.ctx.resolve(object_ty);
        let ty = match &resolved {
            Ty::Struct { id, args, .. } => {
                match self.registry.struct_by_id(*id).cloned() {
                    Some(def) => match def.field(name) {
                        Some(field_ty) => {
                            let subs: FxHashMap<TyVar, Ty> = def
                                .param_vars
                                .iter()
                                .copied()
                                .zip(args.iter().cloned())
                                .collect();
                            let field_ty = field_ty.clone();
                            self.ctx.substitute(&field_ty, &subs)
                        }
                        None => {
                            self.ctx.errors.push(TypeError::NoSuchField {
                                ty: resolved.clone(),
                                field: name.to_string(),
                                span: name_span,
                            });
                            self.ctx.fresh_var()
                        }
                    },
                    None => self.ctx.fresh_var(),
                }
            }
            other => {
                self.ctx.errors.push(TypeError::NoSuchField {
                    ty: other.clone(),
                    field: name.to_string(),
                    span: name_span,
                });
                self.ctx.fresh_var()
            }
        };
        self.span_types.insert(name_span, ty.clone());
        (
            TExpr::Field {
                object: Box::new(to),
                field: name.to_string(),
                span,
            },
            ty,
        )
    }

    fn check_array(
        &mut self,
        elems: &[ast::ArrayElem],
        span: Span,
        expected: Option<&Ty>,
    ) -> (TExpr, Ty) {
        let elem_ty = match expected.map(|e| self.ctx.resolve(e.clone())) {
            Some(Ty::Array(elem)) => *elem,
            _ => self.ctx.fresh_var(),
        };
        let mut telems = Vec::new();
        for elem in elems {
            match elem {
                ast::ArrayElem::Item(expr) => {
                    let (te, ty) = self.check_expr(expr, Some(&elem_ty));
                    let _ = self.ctx.unify(elem_ty.clone(), ty, expr.span());
                    telems.push(TArrayElem::Item(te));
                }
                ast::ArrayElem::Spread(expr) => {
                    let (te, ty) = self.check_expr(expr, None);
                    let _ = self
                        .ctx
                        .unify(Ty::array(elem_ty.clone()), ty, expr.span());
                    telems.push(TArrayElem::Spread(te));
                }
            }
        }
        (
            TExpr::Array {
                elems: telems,
                span,
            },
            Ty::array(elem_ty),
        )
    }

    fn check_struct_init(
        &mut self,
        name: &str,
        name_span: Span,
        fields: &[ast::FieldInit],
        span: Span,
    ) -> (TExpr, Ty) {
        let Some(def) = self.registry.struct_by_name(name).cloned() else {
            self.ctx.errors.push(TypeError::UnknownType {
                name: name.to_string(),
                span: name_span,
            });
            for field in fields {
                let _ = self.check_expr(&field.value, None);
            }
            let ty = self.ctx.fresh_var();
            return (TExpr::None { span }, ty);
        };

        let fresh_args: Vec<Ty> = def.param_vars.iter().map(|_| self.ctx.fresh_var()).collect();
        let subs: FxHashMap<TyVar, Ty> = def
            .param_vars
            .iter()
            .copied()
            .zip(fresh_args.iter().cloned())
            .collect();

        // Duplicate / unknown field detection.
        let mut seen: Vec<&str> = Vec::new();
        for field in fields {
            if seen.contains(&field.name.as_str()) {
                self.ctx.errors.push(TypeError::DuplicateField {
                    field: field.name.clone(),
                    span: field.name_span,
                });
            }
            seen.push(&field.name);
            if def.field(&field.name).is_none() {
                self.ctx.errors.push(TypeError::UnknownField {
                    struct_name: def.name.clone(),
                    field: field.name.clone(),
                    span: field.name_span,
                });
            }
        }

        // Check values and collect them in declaration order; every
        // declared field must be present exactly once.
        let mut tfields = Vec::new();
        for (decl_name, decl_ty) in &def.fields {
            match fields.iter().find(|f| &f.name == decl_name) {
                Some(field) => {
                    let expected_ty = {
                        let decl_ty = decl_ty.clone();
                        self.ctx.substitute(&decl_ty, &subs)
                    };
                    let (tv, value_ty) = self.check_expr(&field.value, Some(&expected_ty));
                    let _ = self
                        .ctx
                        .unify(expected_ty, value_ty, field.value.span());
                    tfields.push((decl_name.clone(), tv));
                }
                None => {
                    self.ctx.errors.push(TypeError::MissingField {
                        struct_name: def.name.clone(),
                        field: decl_name.clone(),
                        span,
                    });
                }
            }
        }

        let ty = Ty::Struct {
            id: def.id,
            name: def.name.clone(),
            args: fresh_args,
        };
        (
            TExpr::StructInit {
                struct_id: def.id,
                name: def.name.clone(),
                fields: tfields,
                span,
            },
            ty,
        )
    }

    fn check_fn_expr(
        &mut self,
        params: &[ast::Param],
        return_ty: Option<&TypeExpr>,
        body: &Expr,
        span: Span,
    ) -> (TExpr, Ty) {
        self.ctx.enter_level();
        let mut vars: FxHashMap<String, TyVar> = FxHashMap::default();
        let param_tys: Vec<Ty> = params
            .iter()
            .map(|p| match &p.ty {
                Some(t) => self.lower_type(t, &mut vars),
                None => self.ctx.fresh_var(),
            })
            .collect();
        let (ret, err) = match return_ty {
            Some(TypeExpr::Result { ok, err, .. }) => (
                self.lower_type(ok, &mut vars),
                Some(self.lower_type(err, &mut vars)),
            ),
            Some(other) => (self.lower_type(other, &mut vars), None),
            None => (self.ctx.fresh_var(), None),
        };

        self.env.push_scope();
        let mut tparams = Vec::new();
        for (param, ty) in params.iter().zip(param_tys.iter()) {
            self.env
                .insert(param.name.clone(), Scheme::mono(ty.clone()), true);
            tparams.push(TParam {
                name: param.name.clone(),
                ty: ty.clone(),
                span: param.span,
            });
        }
        let saved = self.current_fn.replace(FnCtx {
            ret: ret.clone(),
            err: err.clone(),
        });
        let (tbody, body_ty) = self.check_expr(body, Some(&ret));
        let _ = self.ctx.unify(ret.clone(), body_ty, body.span());
        self.current_fn = saved;
        self.env.pop_scope();
        self.ctx.leave_level();

        let ty = Ty::function(param_tys, ret.clone(), err.clone());
        (
            TExpr::FnExpr {
                params: tparams,
                ret,
                err,
                body: Box::new(tbody),
                span,
            },
            ty,
        )
    }

    // ── Patterns ───────────────────────────────────────────────────────

    /// Check a pattern against the subject type, inserting bindings into
    /// the current scope.
    fn check_pattern(&mut self, pattern: &Pattern, subject: &Ty) -> TPattern {
        match pattern {
            Pattern::Int { value, span } => {
                let _ = self.ctx.unify(subject.clone(), Ty::int(), *span);
                TPattern::Int {
                    value: *value,
                    span: *span,
                }
            }
            Pattern::Float { value, span } => {
                let _ = self.ctx.unify(subject.clone(), Ty::float(), *span);
                TPattern::Float {
                    value: *value,
                    span: *span,
                }
            }
            Pattern::Str { value, span } => {
                let _ = self.ctx.unify(subject.clone(), Ty::string(), *span);
                TPattern::Str {
                    value: value.clone(),
                    span: *span,
                }
            }
            Pattern::Bool { value, span } => {
                let _ = self.ctx.unify(subject.clone(), Ty::bool(), *span);
                TPattern::Bool {
                    value: *value,
                    span: *span,
                }
            }
            Pattern::None { span } => {
                let inner = self.ctx.fresh_var();
                let _ = self.ctx.unify(subject.clone(), Ty::option(inner), *span);
                TPattern::None { span: *span }
            }
            Pattern::Wildcard { span } => TPattern::Wildcard { span: *span },
            Pattern::Range { start, end, span } => {
                let _ = self.ctx.unify(subject.clone(), Ty::int(), *span);
                TPattern::Range {
                    start: *start,
                    end: *end,
                    span: *span,
                }
            }
            Pattern::Name { name, span } => {
                // A bare name matching a variant of the subject's enum is
                // the variant shorthand; otherwise it binds.
                let resolved = self.ctx.resolve(subject.clone());
                if let Ty::Enum {
                    id,
                    name: enum_name,
                    ..
                } = &resolved
                {
                    if let Some(def) = self.registry.enum_by_id(*id) {
                        if def.variant(name).is_some() {
                            return TPattern::Variant {
                                enum_id: *id,
                                enum_name: enum_name.clone(),
                                variant: name.clone(),
                                payload: None,
                                span: *span,
                            };
                        }
                    }
                }
                self.env
                    .insert(name.clone(), Scheme::mono(subject.clone()), true);
                self.span_types.insert(*span, subject.clone());
                TPattern::Name {
                    name: name.clone(),
                    ty: subject.clone(),
                    span: *span,
                }
            }
            Pattern::Tuple { elems, span } => {
                let elem_tys: Vec<Ty> = elems.iter().map(|_| self.ctx.fresh_var()).collect();
                let _ = self.ctx.unify(
                    subject.clone(),
                    Ty::Tuple(elem_tys.clone()),
                    *span,
                );
                let telems = elems
                    .iter()
                    .zip(elem_tys.iter())
                    .map(|(p, t)| self.check_pattern(p, t))
                    .collect();
                TPattern::Tuple {
                    elems: telems,
                    span: *span,
                }
            }
            Pattern::Array { elems, rest, span } => {
                let elem_ty = self.ctx.fresh_var();
                let _ = self
                    .ctx
                    .unify(subject.clone(), Ty::array(elem_ty.clone()), *span);
                let telems = elems
                    .iter()
                    .map(|p| self.check_pattern(p, &elem_ty))
                    .collect();
                if let Some((name, rest_span)) = rest {
                    let rest_ty = Ty::array(elem_ty);
                    self.env
                        .insert(name.clone(), Scheme::mono(rest_ty.clone()), true);
                    self.span_types.insert(*rest_span, rest_ty);
                }
                TPattern::Array {
                    elems: telems,
                    rest: rest.as_ref().map(|(n, _)| n.clone()),
                    span: *span,
                }
            }
            Pattern::Or { alts, span } => {
                let mut talts = Vec::new();
                let mut first_bindings: Option<Vec<String>> = None;
                for (i, alt) in alts.iter().enumerate() {
                    let talt = if i == 0 {
                        self.check_pattern(alt, subject)
                    } else {
                        // Later alternatives bind in a throwaway scope;
                        // their binding types must agree with the first's.
                        self.env.push_scope();
                        let talt = self.check_pattern(alt, subject);
                        self.env.pop_scope();
                        for (name, inner_ty) in collect_typed_bindings(&talt) {
                            if let Some(outer) = self.env.lookup(&name) {
                                let outer_ty = outer.scheme.ty.clone();
                                let _ = self.ctx.unify(outer_ty, inner_ty, alt.span());
                            }
                        }
                        talt
                    };
                    let bindings = talt.bindings();
                    match &first_bindings {
                        Some(expected) => {
                            let mut sorted_e = expected.clone();
                            let mut sorted_f = bindings.clone();
                            sorted_e.sort();
                            sorted_f.sort();
                            if sorted_e != sorted_f {
                                self.ctx.errors.push(TypeError::OrPatternBindingMismatch {
                                    expected: expected.clone(),
                                    found: bindings,
                                    span: alt.span(),
                                });
                            }
                        }
                        None => first_bindings = Some(bindings),
                    }
                    talts.push(talt);
                }
                TPattern::Or {
                    alts: talts,
                    span: *span,
                }
            }
            Pattern::Variant {
                enum_name,
                name,
                name_span,
                payload,
                span,
            } => self.check_variant_pattern(
                enum_name.as_deref(),
                name,
                *name_span,
                payload.as_deref(),
                subject,
                *span,
            ),
        }
    }

    fn check_variant_pattern(
        &mut self,
        enum_name: Option<&str>,
        variant: &str,
        name_span: Span,
        payload: Option<&[Pattern]>,
        subject: &Ty,
        span: Span,
    ) -> TPattern {
        let def = match enum_name {
            Some(name) => match self.registry.enum_by_name(name).cloned() {
                Some(def) => Some(def),
                None => {
                    self.ctx.errors.push(TypeError::UnknownType {
                        name: name.to_string(),
                        span,
                    });
                    None
                }
            },
            None => match self.lookup_variant_enum(variant, Some(subject)) {
                VariantLookup::Found(def) => Some(def),
                VariantLookup::Ambiguous => {
                    self.ctx.errors.push(TypeError::AmbiguousVariant {
                        variant: variant.to_string(),
                        candidates: self.registry.enums_with_variant(variant).to_vec(),
                        span: name_span,
                    });
                    None
                }
                VariantLookup::NotFound => {
                    self.ctx.errors.push(TypeError::UnknownVariant {
                        enum_name: None,
                        variant: variant.to_string(),
                        span: name_span,
                    });
                    None
                }
            },
        };

        let Some(def) = def else {
            return TPattern::Wildcard { span };
        };

        let fresh_args: Vec<Ty> = def.param_vars.iter().map(|_| self.ctx.fresh_var()).collect();
        let subs: FxHashMap<TyVar, Ty> = def
            .param_vars
            .iter()
            .copied()
            .zip(fresh_args.iter().cloned())
            .collect();
        let _ = self.ctx.unify(
            subject.clone(),
            Ty::Enum {
                id: def.id,
                name: def.name.clone(),
                args: fresh_args,
            },
            span,
        );

        let payload_tys: Vec<Ty> = match def.variant(variant) {
            Some(tys) => {
                let tys = tys.clone();
                tys.iter().map(|t| self.ctx.substitute(t, &subs)).collect()
            }
            None => {
                self.ctx.errors.push(TypeError::UnknownVariant {
                    enum_name: Some(def.name.clone()),
                    variant: variant.to_string(),
                    span: name_span,
                });
                Vec::new()
            }
        };

        let tpayload = match payload {
            Some(subs_pats) => {
                if subs_pats.len() != payload_tys.len() {
                    self.ctx.errors.push(TypeError::ArityMismatch {
                        what: format!("variant {}.{}", def.name, variant),
                        expected: payload_tys.len(),
                        found: subs_pats.len(),
                        span,
                    });
                }
                Some(
                    subs_pats
                        .iter()
                        .zip(payload_tys.iter())
                        .map(|(p, t)| self.check_pattern(p, t))
                        .collect(),
                )
            }
            None => None,
        };

        TPattern::Variant {
            enum_id: def.id,
            enum_name: def.name.clone(),
            variant: variant.to_string(),
            payload: tpayload,
            span,
        }
    }
}

/// Collect `(name, type)` pairs bound by a checked pattern.
fn collect_typed_bindings(pattern: &TPattern) -> Vec<(String, Ty)> {
    fn walk(pattern: &TPattern, out: &mut Vec<(String, Ty)>) {
        match pattern {
            TPattern::Name { name, ty, .. } => out.push((name.clone(), ty.clone())),
            TPattern::Tuple { elems, .. } => {
                for p in elems {
                    walk(p, out);
                }
            }
            TPattern::Array { elems, .. } => {
                for p in elems {
                    walk(p, out);
                }
            }
            TPattern::Or { alts, .. } => {
                if let Some(first) = alts.first() {
                    walk(first, out);
                }
            }
            TPattern::Variant { payload, .. } => {
                if let Some(subs) = payload {
                    for p in subs {
                        walk(p, out);
                    }
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(pattern, &mut out);
    out
}

fn peel_export(stmt: &Stmt) -> &Stmt {
    match stmt {
        Stmt::Export(inner, _) => peel_export(inner),
        other => other,
    }
}

fn describe_callee(callee: &Expr) -> String {
    match callee {
        Expr::Ident { name, .. } => format!("function '{}'", name),
        _ => "function".to_string(),
    }
}

fn is_type_var_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_lowercase())
}

fn is_numeric(ty: &Ty) -> bool {
    matches!(ty, Ty::Prim(Prim::Int) | Ty::Prim(Prim::Float))
}
