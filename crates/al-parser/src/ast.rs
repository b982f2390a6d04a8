//! Syntactic AST for the AL language.
//!
//! A closed sum of expressions plus a distinct statement sum for
//! declarations, exactly as produced by the parser. Every node carries a
//! span. Nodes contain no resolved type information; the type checker
//! produces its own mirrored tree.

use al_common::span::Span;

/// A parsed source file: an ordered list of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

// ── Statements ─────────────────────────────────────────────────────────

/// A statement. Declarations and bindings live here; everything else is an
/// expression statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let pattern = value` with optional type annotation.
    Let(LetStmt),
    /// `const NAME = value`.
    Const(ConstStmt),
    /// `name = value` -- reassignment of an existing binding.
    Assign(AssignStmt),
    /// `fn name(params) ret { body }`.
    Fn(FnDecl),
    /// `struct Name(type params) { fields }`.
    Struct(StructDecl),
    /// `enum Name(type params) { variants }`.
    Enum(EnumDecl),
    /// `assert cond`.
    Assert(AssertStmt),
    /// `import name`.
    Import(ImportStmt),
    /// `export <declaration>`.
    Export(Box<Stmt>, Span),
    /// A bare expression.
    Expr(Expr),
    /// Sentinel produced by panic-mode recovery.
    Error(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(s) => s.span,
            Stmt::Const(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::Fn(s) => s.span,
            Stmt::Struct(s) => s.span,
            Stmt::Enum(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Import(s) => s.span,
            Stmt::Export(_, span) => *span,
            Stmt::Expr(e) => e.span(),
            Stmt::Error(span) => *span,
        }
    }
}

/// `let pattern (type)? = value`. The pattern may be a plain name, a tuple
/// destructuring, or an enum-variant (type-pattern) binding.
#[derive(Debug, Clone, PartialEq)]
pub struct LetStmt {
    pub pattern: Pattern,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstStmt {
    pub name: String,
    pub name_span: Span,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub name: String,
    pub name_span: Span,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    /// Declared return type; `None` means inferred.
    pub return_ty: Option<TypeExpr>,
    pub body: Expr,
    pub span: Span,
}

/// A function parameter: `x` or `x Int`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub name_span: Span,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub name_span: Span,
    /// Lowercase type parameters, e.g. `struct Box(t)`.
    pub type_params: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub name_span: Span,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub name_span: Span,
    pub type_params: Vec<String>,
    pub variants: Vec<VariantDef>,
    pub span: Span,
}

/// An enum variant: `Point` or `Circle(Float)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDef {
    pub name: String,
    pub name_span: Span,
    pub payload: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssertStmt {
    pub cond: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    pub name: String,
    pub span: Span,
}

// ── Type expressions ───────────────────────────────────────────────────

/// A written type: `Int`, `[T]`, `?T`, `T!E`, `(A, B)`, `fn(A) R`,
/// `Box(Int)`. Lowercase names are type variables.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A named type, possibly applied to arguments: `User`, `Box(Int)`.
    Named {
        name: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `[T]`
    Array { elem: Box<TypeExpr>, span: Span },
    /// `?T`
    Option { inner: Box<TypeExpr>, span: Span },
    /// `T!E`
    Result {
        ok: Box<TypeExpr>,
        err: Box<TypeExpr>,
        span: Span,
    },
    /// `fn(A, B) R` or `fn(A) R!E`
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        err: Option<Box<TypeExpr>>,
        span: Span,
    },
    /// `(A, B)`
    Tuple { elems: Vec<TypeExpr>, span: Span },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Option { span, .. }
            | TypeExpr::Result { span, .. }
            | TypeExpr::Function { span, .. }
            | TypeExpr::Tuple { span, .. } => *span,
        }
    }
}

// ── Expressions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Int { value: i64, span: Span },
    /// Float literal.
    Float { value: f64, span: Span },
    /// Plain string literal (escapes decoded).
    Str { value: String, span: Span },
    /// Interpolated string: an ordered sequence of parts.
    InterpStr { parts: Vec<StrPart>, span: Span },
    /// `true` / `false`.
    Bool { value: bool, span: Span },
    /// `none`.
    None { span: Span },
    /// Variable or function reference. May be resolved by the type
    /// checker to an enum-variant shorthand.
    Ident { name: String, span: Span },
    /// `{ stmts }` -- value is the final expression statement.
    Block { stmts: Vec<Stmt>, span: Span },
    /// `if cond { .. } else { .. }` -- else branch optional.
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        span: Span,
    },
    /// `match subject { pattern -> body, .. }`.
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    /// `value or fallback` / `value or err -> fallback`.
    Or {
        value: Box<Expr>,
        /// Error receiver binding, e.g. `err` in `x or err -> 0`.
        receiver: Option<(String, Span)>,
        fallback: Box<Expr>,
        span: Span,
    },
    /// `error payload` -- constructs a failure value.
    ErrorValue { payload: Box<Expr>, span: Span },
    /// `value!` -- propagate a failure to the caller.
    Propagate { value: Box<Expr>, span: Span },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// Unary operation (`!x`, `-x`).
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `callee(args)`.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `object.name` -- field access or enum-variant path.
    Property {
        object: Box<Expr>,
        name: String,
        name_span: Span,
        span: Span,
    },
    /// `tuple.0`
    TupleIndex {
        object: Box<Expr>,
        index: u32,
        span: Span,
    },
    /// `[a, b, ..rest]`
    Array { elems: Vec<ArrayElem>, span: Span },
    /// `(a, b)` -- at least two elements; `(a)` is grouping.
    Tuple { elems: Vec<Expr>, span: Span },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// `start..end` (half-open).
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        span: Span,
    },
    /// `User{ id: 1, name: 'x' }`
    StructInit {
        name: String,
        name_span: Span,
        fields: Vec<FieldInit>,
        span: Span,
    },
    /// Anonymous function expression: `fn(x) { x + 1 }`.
    FnExpr {
        params: Vec<Param>,
        return_ty: Option<TypeExpr>,
        body: Box<Expr>,
        span: Span,
    },
    /// Sentinel produced by panic-mode recovery.
    Error { span: Span },
}

/// One part of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    /// Literal text (escapes decoded).
    Text(String),
    /// `$name` interpolation.
    Ident(String, Span),
}

/// One element of an array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElem {
    Item(Expr),
    /// `..expr` splices an array's elements.
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub name_span: Span,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// Source text of the operator, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Int { span, .. }
            | Expr::Float { span, .. }
            | Expr::Str { span, .. }
            | Expr::InterpStr { span, .. }
            | Expr::Bool { span, .. }
            | Expr::None { span }
            | Expr::Ident { span, .. }
            | Expr::Block { span, .. }
            | Expr::If { span, .. }
            | Expr::Match { span, .. }
            | Expr::Or { span, .. }
            | Expr::ErrorValue { span, .. }
            | Expr::Propagate { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Property { span, .. }
            | Expr::TupleIndex { span, .. }
            | Expr::Array { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Index { span, .. }
            | Expr::Range { span, .. }
            | Expr::StructInit { span, .. }
            | Expr::FnExpr { span, .. }
            | Expr::Error { span } => *span,
        }
    }
}

// ── Patterns ───────────────────────────────────────────────────────────

/// A match-arm (or `let`) pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Integer literal pattern.
    Int { value: i64, span: Span },
    /// Float literal pattern.
    Float { value: f64, span: Span },
    /// String literal pattern.
    Str { value: String, span: Span },
    /// Boolean literal pattern.
    Bool { value: bool, span: Span },
    /// `none` literal pattern.
    None { span: Span },
    /// Identifier binding. The type checker may resolve this to a bare
    /// enum-variant shorthand instead.
    Name { name: String, span: Span },
    /// Wildcard: the `else` keyword.
    Wildcard { span: Span },
    /// Half-open integer range `a..b`.
    Range { start: i64, end: i64, span: Span },
    /// `(p1, p2)`
    Tuple { elems: Vec<Pattern>, span: Span },
    /// `[p1, p2, ..rest]` -- spread binding optional and trailing.
    Array {
        elems: Vec<Pattern>,
        rest: Option<(String, Span)>,
        span: Span,
    },
    /// `p1 | p2 | ...`
    Or { alts: Vec<Pattern>, span: Span },
    /// `Enum.Variant(sub)`, `Variant(sub)`, or `Variant` shorthand.
    Variant {
        /// Explicit enum name, if written (`Shape.Circle`).
        enum_name: Option<String>,
        name: String,
        name_span: Span,
        /// `None` for a bare variant, `Some` when parenthesized.
        payload: Option<Vec<Pattern>>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Int { span, .. }
            | Pattern::Float { span, .. }
            | Pattern::Str { span, .. }
            | Pattern::Bool { span, .. }
            | Pattern::None { span }
            | Pattern::Name { span, .. }
            | Pattern::Wildcard { span }
            | Pattern::Range { span, .. }
            | Pattern::Tuple { span, .. }
            | Pattern::Array { span, .. }
            | Pattern::Or { span, .. }
            | Pattern::Variant { span, .. } => *span,
        }
    }

    /// Collect the variable names this pattern binds, in order.
    pub fn bindings(&self) -> Vec<(String, Span)> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings(&self, out: &mut Vec<(String, Span)>) {
        match self {
            Pattern::Name { name, span } => out.push((name.clone(), *span)),
            Pattern::Tuple { elems, .. } => {
                for p in elems {
                    p.collect_bindings(out);
                }
            }
            Pattern::Array { elems, rest, .. } => {
                for p in elems {
                    p.collect_bindings(out);
                }
                if let Some((name, span)) = rest {
                    out.push((name.clone(), *span));
                }
            }
            Pattern::Or { alts, .. } => {
                // Alternatives must bind identical sets; the checker
                // verifies that, so the first alternative is representative.
                if let Some(first) = alts.first() {
                    first.collect_bindings(out);
                }
            }
            Pattern::Variant { payload, .. } => {
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
