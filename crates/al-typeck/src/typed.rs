//! Typed AST: the checker's output tree.
//!
//! Mirrors the syntactic AST shape but carries resolved information the
//! compiler needs: enum-variant resolutions (including shorthands), struct
//! ids, failure-handling kinds on `or`/`!`, and the resolved type of each
//! binding. Function expressions keep no name; named functions are the
//! separate [`TFnDecl`] statement.

use al_common::span::Span;
use al_parser::ast::{BinaryOp, UnaryOp};

use crate::ty::{Ty, TypeId};

#[derive(Debug, Clone)]
pub struct TProgram {
    pub stmts: Vec<TStmt>,
}

#[derive(Debug, Clone)]
pub enum TStmt {
    Let {
        pattern: TPattern,
        ty: Ty,
        value: TExpr,
        span: Span,
    },
    Const {
        name: String,
        ty: Ty,
        value: TExpr,
        span: Span,
    },
    Assign {
        name: String,
        value: TExpr,
        span: Span,
    },
    Fn(TFnDecl),
    Assert {
        cond: TExpr,
        span: Span,
    },
    Expr(TExpr),
}

impl TStmt {
    pub fn span(&self) -> Span {
        match self {
            TStmt::Let { span, .. }
            | TStmt::Const { span, .. }
            | TStmt::Assign { span, .. }
            | TStmt::Assert { span, .. } => *span,
            TStmt::Fn(f) => f.span,
            TStmt::Expr(e) => e.span(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TFnDecl {
    pub name: String,
    pub params: Vec<TParam>,
    pub ret: Ty,
    pub err: Option<Ty>,
    pub body: TExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TParam {
    pub name: String,
    pub ty: Ty,
    pub span: Span,
}

/// Which failure shape an `or`/`!` operates on. This is the
/// `resolved_type` annotation the compiler dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// `?T`: the failure value is `none`, with no payload.
    Option,
    /// `T!E`: the failure value carries an error payload.
    Result,
}

#[derive(Debug, Clone)]
pub enum TExpr {
    Int {
        value: i64,
        span: Span,
    },
    Float {
        value: f64,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    InterpStr {
        parts: Vec<TStrPart>,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    None {
        span: Span,
    },
    /// A resolved variable/function reference.
    Ident {
        name: String,
        ty: Ty,
        span: Span,
    },
    /// A resolved enum variant construction, including shorthands:
    /// `Shape.Circle(r)`, `Circle(r)`, bare `Point`.
    Variant {
        enum_id: TypeId,
        enum_name: String,
        variant: String,
        payload: Vec<TExpr>,
        span: Span,
    },
    Block {
        stmts: Vec<TStmt>,
        ty: Ty,
        span: Span,
    },
    If {
        cond: Box<TExpr>,
        then_branch: Box<TExpr>,
        else_branch: Option<Box<TExpr>>,
        span: Span,
    },
    Match {
        subject: Box<TExpr>,
        subject_ty: Ty,
        arms: Vec<TMatchArm>,
        span: Span,
    },
    Or {
        value: Box<TExpr>,
        kind: FailureKind,
        receiver: Option<String>,
        fallback: Box<TExpr>,
        /// The type of the whole expression after fallback handling.
        resolved_ty: Ty,
        span: Span,
    },
    Propagate {
        value: Box<TExpr>,
        kind: FailureKind,
        /// The success type the propagation produces.
        resolved_ty: Ty,
        span: Span,
    },
    ErrorValue {
        payload: Box<TExpr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<TExpr>,
        rhs: Box<TExpr>,
        ty: Ty,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<TExpr>,
        span: Span,
    },
    Call {
        callee: Box<TExpr>,
        args: Vec<TExpr>,
        span: Span,
    },
    /// Struct field access; `field` is resolved against the registry.
    Field {
        object: Box<TExpr>,
        field: String,
        span: Span,
    },
    TupleIndex {
        object: Box<TExpr>,
        index: u32,
        span: Span,
    },
    Array {
        elems: Vec<TArrayElem>,
        span: Span,
    },
    Tuple {
        elems: Vec<TExpr>,
        span: Span,
    },
    Index {
        object: Box<TExpr>,
        index: Box<TExpr>,
        span: Span,
    },
    Range {
        start: Box<TExpr>,
        end: Box<TExpr>,
        span: Span,
    },
    StructInit {
        struct_id: TypeId,
        name: String,
        /// Field values in declaration order.
        fields: Vec<(String, TExpr)>,
        span: Span,
    },
    FnExpr {
        params: Vec<TParam>,
        ret: Ty,
        err: Option<Ty>,
        body: Box<TExpr>,
        span: Span,
    },
}

impl TExpr {
    pub fn span(&self) -> Span {
        match self {
            TExpr::Int { span, .. }
            | TExpr::Float { span, .. }
            | TExpr::Str { span, .. }
            | TExpr::InterpStr { span, .. }
            | TExpr::Bool { span, .. }
            | TExpr::None { span }
            | TExpr::Ident { span, .. }
            | TExpr::Variant { span, .. }
            | TExpr::Block { span, .. }
            | TExpr::If { span, .. }
            | TExpr::Match { span, .. }
            | TExpr::Or { span, .. }
            | TExpr::Propagate { span, .. }
            | TExpr::ErrorValue { span, .. }
            | TExpr::Binary { span, .. }
            | TExpr::Unary { span, .. }
            | TExpr::Call { span, .. }
            | TExpr::Field { span, .. }
            | TExpr::TupleIndex { span, .. }
            | TExpr::Array { span, .. }
            | TExpr::Tuple { span, .. }
            | TExpr::Index { span, .. }
            | TExpr::Range { span, .. }
            | TExpr::StructInit { span, .. }
            | TExpr::FnExpr { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TStrPart {
    Text(String),
    /// Interpolated identifier reference.
    Ident(String),
}

#[derive(Debug, Clone)]
pub enum TArrayElem {
    Item(TExpr),
    Spread(TExpr),
}

#[derive(Debug, Clone)]
pub struct TMatchArm {
    pub pattern: TPattern,
    pub body: TExpr,
    pub span: Span,
}

/// A checked pattern. Variant shorthands are resolved; every binding
/// carries its type.
#[derive(Debug, Clone)]
pub enum TPattern {
    Int {
        value: i64,
        span: Span,
    },
    Float {
        value: f64,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    None {
        span: Span,
    },
    Name {
        name: String,
        ty: Ty,
        span: Span,
    },
    Wildcard {
        span: Span,
    },
    Range {
        start: i64,
        end: i64,
        span: Span,
    },
    Tuple {
        elems: Vec<TPattern>,
        span: Span,
    },
    Array {
        elems: Vec<TPattern>,
        rest: Option<String>,
        span: Span,
    },
    Or {
        alts: Vec<TPattern>,
        span: Span,
    },
    Variant {
        enum_id: TypeId,
        enum_name: String,
        variant: String,
        /// `None` for a bare variant pattern; `Some` when parenthesized.
        payload: Option<Vec<TPattern>>,
        span: Span,
    },
}

impl TPattern {
    pub fn span(&self) -> Span {
        match self {
            TPattern::Int { span, .. }
            | TPattern::Float { span, .. }
            | TPattern::Str { span, .. }
            | TPattern::Bool { span, .. }
            | TPattern::None { span }
            | TPattern::Name { span, .. }
            | TPattern::Wildcard { span }
            | TPattern::Range { span, .. }
            | TPattern::Tuple { span, .. }
            | TPattern::Array { span, .. }
            | TPattern::Or { span, .. }
            | TPattern::Variant { span, .. } => *span,
        }
    }

    /// Whether this pattern matches every value of its subject type.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            TPattern::Name { .. } | TPattern::Wildcard { .. } => true,
            TPattern::Tuple { elems, .. } => elems.iter().all(|p| p.is_irrefutable()),
            TPattern::Or { alts, .. } => alts.iter().any(|p| p.is_irrefutable()),
            _ => false,
        }
    }

    /// Binding names in left-to-right order.
    pub fn bindings(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings(&self, out: &mut Vec<String>) {
        match self {
            TPattern::Name { name, .. } => out.push(name.clone()),
            TPattern::Tuple { elems, .. } => {
                for p in elems {
                    p.collect_bindings(out);
                }
            }
            TPattern::Array { elems, rest, .. } => {
                for p in elems {
                    p.collect_bindings(out);
                }
                if let Some(name) = rest {
                    out.push(name.clone());
                }
            }
            TPattern::Or { alts, .. } => {
                if let Some(first) = alts.first() {
                    first.collect_bindings(out);
                }
            }
            TPattern::Variant { payload, .. } => {
                if let Some(subs) = payload {
                    for p in subs {
                        p.collect_bindings(out);
                    }
                }
            }
            _ => {}
        }
    }
}
