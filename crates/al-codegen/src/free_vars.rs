//! Free-variable analysis over the typed AST.
//!
//! Used to decide which top-level functions are self-contained (their
//! only free names are other top-level functions and built-ins). Those
//! compile to direct `make_closure` references from anywhere, which is
//! what makes mutual recursion between top-level functions work without
//! capture cells.

use rustc_hash::FxHashSet;

use al_typeck::typed::{TArrayElem, TExpr, TFnDecl, TPattern, TStmt, TStrPart};

/// Names referenced by a function body that are not bound within it.
pub(crate) fn fn_free_vars(decl: &TFnDecl) -> FxHashSet<String> {
    let mut scopes: Vec<FxHashSet<String>> = vec![FxHashSet::default()];
    for param in &decl.params {
        scopes[0].insert(param.name.clone());
    }
    if let Some(scope) = scopes.first_mut() {
        scope.insert(decl.name.clone()); // direct self-recursion is not free
    }
    let mut free = FxHashSet::default();
    walk_expr(&decl.body, &mut scopes, &mut free);
    free
}

fn is_bound(scopes: &[FxHashSet<String>], name: &str) -> bool {
    scopes.iter().any(|s| s.contains(name))
}

fn reference(scopes: &[FxHashSet<String>], free: &mut FxHashSet<String>, name: &str) {
    if !is_bound(scopes, name) {
        free.insert(name.to_string());
    }
}

fn walk_stmt(stmt: &TStmt, scopes: &mut Vec<FxHashSet<String>>, free: &mut FxHashSet<String>) {
    match stmt {
        TStmt::Let { pattern, value, .. } => {
            walk_expr(value, scopes, free);
            bind_pattern(pattern, scopes);
        }
        TStmt::Const { name, value, .. } => {
            walk_expr(value, scopes, free);
            scopes.last_mut().unwrap().insert(name.clone());
        }
        TStmt::Assign { name, value, .. } => {
            reference(scopes, free, name);
            walk_expr(value, scopes, free);
        }
        TStmt::Fn(decl) => {
            scopes.last_mut().unwrap().insert(decl.name.clone());
            scopes.push(FxHashSet::default());
            for param in &decl.params {
                scopes.last_mut().unwrap().insert(param.name.clone());
            }
            walk_expr(&decl.body, scopes, free);
            scopes.pop();
        }
        TStmt::Assert { cond, .. } => walk_expr(cond, scopes, free),
        TStmt::Expr(expr) => walk_expr(expr, scopes, free),
    }
}

fn walk_expr(expr: &TExpr, scopes: &mut Vec<FxHashSet<String>>, free: &mut FxHashSet<String>) {
    match expr {
        TExpr::Int { .. }
        | TExpr::Float { .. }
        | TExpr::Str { .. }
        | TExpr::Bool { .. }
        | TExpr::None { .. } => {}
        TExpr::InterpStr { parts, .. } => {
            for part in parts {
                if let TStrPart::Ident(name) = part {
                    reference(scopes, free, name);
                }
            }
        }
        TExpr::Ident { name, .. } => reference(scopes, free, name),
        TExpr::Variant { payload, .. } => {
            for p in payload {
                walk_expr(p, scopes, free);
            }
        }
        TExpr::Block { stmts, .. } => {
            scopes.push(FxHashSet::default());
            for stmt in stmts {
                walk_stmt(stmt, scopes, free);
            }
            scopes.pop();
        }
        TExpr::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            walk_expr(cond, scopes, free);
            walk_expr(then_branch, scopes, free);
            if let Some(e) = else_branch {
                walk_expr(e, scopes, free);
            }
        }
        TExpr::Match { subject, arms, .. } => {
            walk_expr(subject, scopes, free);
            for arm in arms {
                scopes.push(FxHashSet::default());
                bind_pattern(&arm.pattern, scopes);
                walk_expr(&arm.body, scopes, free);
                scopes.pop();
            }
        }
        TExpr::Or {
            value,
            receiver,
            fallback,
            ..
        } => {
            walk_expr(value, scopes, free);
            scopes.push(FxHashSet::default());
            if let Some(name) = receiver {
                scopes.last_mut().unwrap().insert(name.clone());
            }
            walk_expr(fallback, scopes, free);
            scopes.pop();
        }
        TExpr::Propagate { value, .. } => walk_expr(value, scopes, free),
        TExpr::ErrorValue { payload, .. } => walk_expr(payload, scopes, free),
        TExpr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, scopes, free);
            walk_expr(rhs, scopes, free);
        }
        TExpr::Unary { operand, .. } => walk_expr(operand, scopes, free),
        TExpr::Call { callee, args, .. } => {
            walk_expr(callee, scopes, free);
            for arg in args {
                walk_expr(arg, scopes, free);
            }
        }
        TExpr::Field { object, .. } => walk_expr(object, scopes, free),
        TExpr::TupleIndex { object, .. } => walk_expr(object, scopes, free),
        TExpr::Array { elems, .. } => {
            for elem in elems {
                match elem {
                    TArrayElem::Item(e) | TArrayElem::Spread(e) => walk_expr(e, scopes, free),
                }
            }
        }
        TExpr::Tuple { elems, .. } => {
            for e in elems {
                walk_expr(e, scopes, free);
            }
        }
        TExpr::Index { object, index, .. } => {
            walk_expr(object, scopes, free);
            walk_expr(index, scopes, free);
        }
        TExpr::Range { start, end, .. } => {
            walk_expr(start, scopes, free);
            walk_expr(end, scopes, free);
        }
        TExpr::StructInit { fields, .. } => {
            for (_, value) in fields {
                walk_expr(value, scopes, free);
            }
        }
        TExpr::FnExpr { params, body, .. } => {
            scopes.push(FxHashSet::default());
            for param in params {
                scopes.last_mut().unwrap().insert(param.name.clone());
            }
            walk_expr(body, scopes, free);
            scopes.pop();
        }
    }
}

fn bind_pattern(pattern: &TPattern, scopes: &mut Vec<FxHashSet<String>>) {
    match pattern {
        TPattern::Name { name, .. } => {
            scopes.last_mut().unwrap().insert(name.clone());
        }
        TPattern::Tuple { elems, .. } => {
            for p in elems {
                bind_pattern(p, scopes);
            }
        }
        TPattern::Array { elems, rest, .. } => {
            for p in elems {
                bind_pattern(p, scopes);
            }
            if let Some(name) = rest {
                scopes.last_mut().unwrap().insert(name.clone());
            }
        }
        TPattern::Or { alts, .. } => {
            for p in alts {
                bind_pattern(p, scopes);
            }
        }
        TPattern::Variant { payload, .. } => {
            if let Some(subs) = payload {
                for p in subs {
                    bind_pattern(p, scopes);
                }
            }
        }
        _ => {}
    }
}
