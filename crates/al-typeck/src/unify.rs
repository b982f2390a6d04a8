//! Unification engine for AL type inference.
//!
//! Built on `ena`'s union-find table, with occurs check, level-based
//! generalization, and scheme instantiation by substitution. Two
//! AL-specific rules live here: a plain `T` unifies into `?T` (a value is
//! a valid optional) and into `T!E` (a value is a valid result), because
//! options and results are untagged at runtime.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use al_common::span::Span;

use crate::error::TypeError;
use crate::ty::{Scheme, Ty, TyVar};

/// The inference context: owns the unification table, generalization
/// levels, and accumulated type errors.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    /// Current let-nesting level for generalization.
    current_level: u32,
    /// Level at which each variable was created, indexed by `TyVar.0`.
    var_levels: Vec<u32>,
    pub errors: Vec<TypeError>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            current_level: 0,
            var_levels: Vec::new(),
            errors: Vec::new(),
        }
    }

    // ── Variables ──────────────────────────────────────────────────────

    /// Create a fresh type variable at the current level.
    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.fresh_key())
    }

    pub fn fresh_key(&mut self) -> TyVar {
        let var = self.table.new_key(None);
        while self.var_levels.len() <= var.0 as usize {
            self.var_levels.push(0);
        }
        self.var_levels[var.0 as usize] = self.current_level;
        var
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Follow union-find indirection, rebuilding compound types with
    /// resolved children.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            Ty::Array(elem) => Ty::Array(Box::new(self.resolve(*elem))),
            Ty::Option(inner) => Ty::Option(Box::new(self.resolve(*inner))),
            Ty::Function { params, ret, err } => Ty::Function {
                params: params.into_iter().map(|p| self.resolve(p)).collect(),
                ret: Box::new(self.resolve(*ret)),
                err: err.map(|e| Box::new(self.resolve(*e))),
            },
            Ty::Result { ok, err } => Ty::Result {
                ok: Box::new(self.resolve(*ok)),
                err: Box::new(self.resolve(*err)),
            },
            Ty::Tuple(elems) => {
                Ty::Tuple(elems.into_iter().map(|e| self.resolve(e)).collect())
            }
            Ty::Struct { id, name, args } => Ty::Struct {
                id,
                name,
                args: args.into_iter().map(|a| self.resolve(a)).collect(),
            },
            Ty::Enum { id, name, args } => Ty::Enum {
                id,
                name,
                args: args.into_iter().map(|a| self.resolve(a)).collect(),
            },
            other => other,
        }
    }

    // ── Occurs check ───────────────────────────────────────────────────

    /// Whether `var` occurs anywhere inside `ty` (prevents infinite types
    /// like `a ~ fn(a) Int`).
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if *v == var {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Prim(_) | Ty::None => false,
            Ty::Array(elem) | Ty::Option(elem) => self.occurs_in(var, elem),
            Ty::Function { params, ret, err } => {
                params.iter().any(|p| self.occurs_in(var, p))
                    || self.occurs_in(var, ret)
                    || err.as_ref().map_or(false, |e| self.occurs_in(var, e))
            }
            Ty::Result { ok, err } => self.occurs_in(var, ok) || self.occurs_in(var, err),
            Ty::Tuple(elems) => elems.iter().any(|e| self.occurs_in(var, e)),
            Ty::Struct { args, .. } | Ty::Enum { args, .. } => {
                args.iter().any(|a| self.occurs_in(var, a))
            }
        }
    }

    // ── Unification ────────────────────────────────────────────────────

    /// Unify two types. On failure a [`TypeError`] is recorded against
    /// `span` and `Err` is returned so callers can stop early.
    pub fn unify(&mut self, a: Ty, b: Ty, span: Span) -> Result<(), ()> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),
            (Ty::Var(v1), Ty::Var(v2)) => {
                self.table
                    .unify_var_var(v1, v2)
                    .expect("unifying two unbound vars cannot fail");
                Ok(())
            }
            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    self.errors.push(TypeError::InfiniteType { var: v, ty, span });
                    Err(())
                } else {
                    self.table
                        .unify_var_value(v, Some(ty))
                        .expect("binding after occurs check cannot fail");
                    Ok(())
                }
            }

            (Ty::Prim(p1), Ty::Prim(p2)) if p1 == p2 => Ok(()),
            (Ty::None, Ty::None) => Ok(()),

            (Ty::Array(e1), Ty::Array(e2)) => self.unify(*e1, *e2, span),

            (Ty::Option(i1), Ty::Option(i2)) => self.unify(*i1, *i2, span),
            // `none` (and the no-value type) inhabits every option.
            (Ty::Option(_), Ty::None) | (Ty::None, Ty::Option(_)) => Ok(()),
            // An option is never a result and vice versa.
            (a @ Ty::Option(_), b @ Ty::Result { .. })
            | (a @ Ty::Result { .. }, b @ Ty::Option(_)) => {
                self.mismatch(a, b, span)
            }
            // A plain `T` coerces into `?T`: options are untagged.
            (Ty::Option(inner), other) | (other, Ty::Option(inner)) => {
                self.unify(*inner, other, span)
            }

            (
                Ty::Result { ok: o1, err: e1 },
                Ty::Result { ok: o2, err: e2 },
            ) => {
                self.unify(*o1, *o2, span)?;
                self.unify(*e1, *e2, span)
            }
            // A plain `T` coerces into `T!E`.
            (Ty::Result { ok, .. }, other) | (other, Ty::Result { ok, .. }) => {
                self.unify(*ok, other, span)
            }

            (
                Ty::Function {
                    params: p1,
                    ret: r1,
                    err: e1,
                },
                Ty::Function {
                    params: p2,
                    ret: r2,
                    err: e2,
                },
            ) => {
                if p1.len() != p2.len() {
                    self.errors.push(TypeError::ArityMismatch {
                        what: "function".into(),
                        expected: p1.len(),
                        found: p2.len(),
                        span,
                    });
                    return Err(());
                }
                for (a, b) in p1.into_iter().zip(p2) {
                    self.unify(a, b, span)?;
                }
                self.unify(*r1, *r2, span)?;
                match (e1, e2) {
                    (None, None) => Ok(()),
                    (Some(a), Some(b)) => self.unify(*a, *b, span),
                    (Some(e), None) | (None, Some(e)) => {
                        let f = Ty::Result {
                            ok: Box::new(Ty::None),
                            err: e,
                        };
                        self.mismatch(f, Ty::None, span)
                    }
                }
            }

            (Ty::Tuple(e1), Ty::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    self.errors.push(TypeError::ArityMismatch {
                        what: "tuple".into(),
                        expected: e1.len(),
                        found: e2.len(),
                        span,
                    });
                    return Err(());
                }
                for (a, b) in e1.into_iter().zip(e2) {
                    self.unify(a, b, span)?;
                }
                Ok(())
            }

            // Nominal types unify by id.
            (
                Ty::Struct {
                    id: i1, args: a1, ..
                },
                Ty::Struct {
                    id: i2,
                    name,
                    args: a2,
                },
            ) if i1 == i2 => self.unify_args(a1, a2, &name, span),
            (
                Ty::Enum {
                    id: i1, args: a1, ..
                },
                Ty::Enum {
                    id: i2,
                    name,
                    args: a2,
                },
            ) if i1 == i2 => self.unify_args(a1, a2, &name, span),

            (a, b) => self.mismatch(a, b, span),
        }
    }

    fn unify_args(
        &mut self,
        a: Vec<Ty>,
        b: Vec<Ty>,
        name: &str,
        span: Span,
    ) -> Result<(), ()> {
        // An uninstantiated reference (`args` empty) matches any
        // instantiation of the same nominal type.
        if a.is_empty() || b.is_empty() {
            return Ok(());
        }
        if a.len() != b.len() {
            self.errors.push(TypeError::ArityMismatch {
                what: format!("type {}", name),
                expected: a.len(),
                found: b.len(),
                span,
            });
            return Err(());
        }
        for (x, y) in a.into_iter().zip(b) {
            self.unify(x, y, span)?;
        }
        Ok(())
    }

    fn mismatch(&mut self, expected: Ty, found: Ty, span: Span) -> Result<(), ()> {
        self.errors.push(TypeError::Mismatch {
            expected,
            found,
            span,
        });
        Err(())
    }

    // ── Levels ─────────────────────────────────────────────────────────

    pub fn enter_level(&mut self) {
        self.current_level += 1;
    }

    pub fn leave_level(&mut self) {
        debug_assert!(self.current_level > 0, "cannot leave level 0");
        self.current_level -= 1;
    }

    // ── Generalization ─────────────────────────────────────────────────

    /// Generalize a type into a scheme, quantifying the variables created
    /// at a deeper level than the current one.
    pub fn generalize(&mut self, ty: Ty) -> Scheme {
        let resolved = self.resolve(ty);
        let mut vars = Vec::new();
        self.collect_generalizable(&resolved, &mut vars);
        let mut seen = std::collections::HashSet::new();
        vars.retain(|v| seen.insert(*v));
        Scheme { vars, ty: resolved }
    }

    fn collect_generalizable(&mut self, ty: &Ty, out: &mut Vec<TyVar>) {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.collect_generalizable(&inner, out),
                None => {
                    let level = self.var_levels.get(v.0 as usize).copied().unwrap_or(0);
                    if level > self.current_level {
                        out.push(*v);
                    }
                }
            },
            Ty::Prim(_) | Ty::None => {}
            Ty::Array(elem) | Ty::Option(elem) => self.collect_generalizable(elem, out),
            Ty::Function { params, ret, err } => {
                for p in params {
                    self.collect_generalizable(p, out);
                }
                self.collect_generalizable(ret, out);
                if let Some(e) = err {
                    self.collect_generalizable(e, out);
                }
            }
            Ty::Result { ok, err } => {
                self.collect_generalizable(ok, out);
                self.collect_generalizable(err, out);
            }
            Ty::Tuple(elems) => {
                for e in elems {
                    self.collect_generalizable(e, out);
                }
            }
            Ty::Struct { args, .. } | Ty::Enum { args, .. } => {
                for a in args {
                    self.collect_generalizable(a, out);
                }
            }
        }
    }

    // ── Instantiation ──────────────────────────────────────────────────

    /// Instantiate a scheme with fresh variables for its quantified ones.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Ty {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }
        let subs: FxHashMap<TyVar, Ty> = scheme
            .vars
            .iter()
            .map(|v| (*v, self.fresh_var()))
            .collect();
        self.substitute(&scheme.ty, &subs)
    }

    /// Apply a substitution map to a type, following bound variables
    /// through the table.
    pub fn substitute(&mut self, ty: &Ty, subs: &FxHashMap<TyVar, Ty>) -> Ty {
        match ty {
            Ty::Var(v) => {
                if let Some(replacement) = subs.get(v) {
                    replacement.clone()
                } else {
                    match self.table.probe_value(*v) {
                        Some(inner) => self.substitute(&inner, subs),
                        None => ty.clone(),
                    }
                }
            }
            Ty::Prim(_) | Ty::None => ty.clone(),
            Ty::Array(elem) => Ty::Array(Box::new(self.substitute(elem, subs))),
            Ty::Option(inner) => Ty::Option(Box::new(self.substitute(inner, subs))),
            Ty::Function { params, ret, err } => Ty::Function {
                params: params.iter().map(|p| self.substitute(p, subs)).collect(),
                ret: Box::new(self.substitute(ret, subs)),
                err: err.as_ref().map(|e| Box::new(self.substitute(e, subs))),
            },
            Ty::Result { ok, err } => Ty::Result {
                ok: Box::new(self.substitute(ok, subs)),
                err: Box::new(self.substitute(err, subs)),
            },
            Ty::Tuple(elems) => {
                Ty::Tuple(elems.iter().map(|e| self.substitute(e, subs)).collect())
            }
            Ty::Struct { id, name, args } => Ty::Struct {
                id: *id,
                name: name.clone(),
                args: args.iter().map(|a| self.substitute(a, subs)).collect(),
            },
            Ty::Enum { id, name, args } => Ty::Enum {
                id: *id,
                name: name.clone(),
                args: args.iter().map(|a| self.substitute(a, subs)).collect(),
            },
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::point(1, 1)
    }

    #[test]
    fn unify_var_chain_resolves() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        assert!(ctx.unify(a.clone(), b.clone(), span()).is_ok());
        assert!(ctx.unify(a.clone(), Ty::int(), span()).is_ok());
        assert_eq!(ctx.resolve(b), Ty::int());
    }

    #[test]
    fn unify_mismatch_records_error() {
        let mut ctx = InferCtx::new();
        assert!(ctx.unify(Ty::int(), Ty::string(), span()).is_err());
        assert!(matches!(ctx.errors[0], TypeError::Mismatch { .. }));
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let fun = Ty::function(vec![a.clone()], Ty::int(), None);
        assert!(ctx.unify(a, fun, span()).is_err());
        assert!(matches!(ctx.errors[0], TypeError::InfiniteType { .. }));
    }

    #[test]
    fn plain_value_coerces_into_option() {
        let mut ctx = InferCtx::new();
        // T unifies into ?T (fallback of an option may be a plain value).
        assert!(ctx
            .unify(Ty::option(Ty::int()), Ty::int(), span())
            .is_ok());
        // none inhabits every option.
        assert!(ctx.unify(Ty::option(Ty::int()), Ty::None, span()).is_ok());
    }

    #[test]
    fn plain_value_coerces_into_result() {
        let mut ctx = InferCtx::new();
        assert!(ctx
            .unify(Ty::result(Ty::int(), Ty::string()), Ty::int(), span())
            .is_ok());
    }

    #[test]
    fn option_is_not_result() {
        let mut ctx = InferCtx::new();
        assert!(ctx
            .unify(
                Ty::option(Ty::int()),
                Ty::result(Ty::int(), Ty::string()),
                span()
            )
            .is_err());
    }

    #[test]
    fn nominal_types_unify_by_id() {
        use crate::ty::TypeId;
        let mut ctx = InferCtx::new();
        let user0 = Ty::Struct {
            id: TypeId(0),
            name: "User".into(),
            args: vec![],
        };
        let user0b = user0.clone();
        let other = Ty::Struct {
            id: TypeId(1),
            name: "Other".into(),
            args: vec![],
        };
        assert!(ctx.unify(user0.clone(), user0b, span()).is_ok());
        assert!(ctx.unify(user0, other, span()).is_err());
    }

    #[test]
    fn generalize_and_instantiate_fresh_vars() {
        let mut ctx = InferCtx::new();
        ctx.enter_level();
        let a = ctx.fresh_var();
        let identity = Ty::function(vec![a.clone()], a, None);
        ctx.leave_level();

        let scheme = ctx.generalize(identity);
        assert_eq!(scheme.vars.len(), 1);

        let inst1 = ctx.instantiate(&scheme);
        let inst2 = ctx.instantiate(&scheme);
        match (&inst1, &inst2) {
            (Ty::Function { params: p1, .. }, Ty::Function { params: p2, .. }) => {
                assert_ne!(p1[0], p2[0], "instantiations must be independent");
            }
            _ => panic!("expected function types"),
        }

        // Each instantiation constrains independently.
        assert!(ctx.unify(inst1, Ty::function(vec![Ty::int()], Ty::int(), None), span()).is_ok());
        assert!(ctx
            .unify(
                inst2,
                Ty::function(vec![Ty::string()], Ty::string(), None),
                span()
            )
            .is_ok());
    }

    #[test]
    fn vars_at_current_level_do_not_generalize() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var(); // level 0
        let scheme = ctx.generalize(a);
        assert!(scheme.vars.is_empty());
    }

    #[test]
    fn function_arity_mismatch() {
        let mut ctx = InferCtx::new();
        let f1 = Ty::function(vec![Ty::int()], Ty::int(), None);
        let f2 = Ty::function(vec![Ty::int(), Ty::int()], Ty::int(), None);
        assert!(ctx.unify(f1, f2, span()).is_err());
        assert!(matches!(
            ctx.errors[0],
            TypeError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }
}
