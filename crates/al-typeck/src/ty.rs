//! Type representation for the AL type system.
//!
//! Defines the core [`Ty`] sum, inference variables ([`TyVar`]), and
//! polymorphic type schemes ([`Scheme`]). Struct and enum types carry a
//! stable integer id assigned at declaration; their field and variant
//! tables live in the [`crate::registry::TypeRegistry`].

use std::fmt;

/// An inference variable, identified by a `u32` index into the
/// unification table. `ena` handles the union-find mechanics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// A stable type id assigned to each struct/enum at declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// The built-in primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Prim {
    Int,
    Float,
    String,
    Bool,
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prim::Int => write!(f, "Int"),
            Prim::Float => write!(f, "Float"),
            Prim::String => write!(f, "String"),
            Prim::Bool => write!(f, "Bool"),
        }
    }
}

/// An AL type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// A primitive type.
    Prim(Prim),
    /// `[T]`
    Array(Box<Ty>),
    /// `?T` -- at runtime either a `T` value or `none`.
    Option(Box<Ty>),
    /// `fn(params) ret` with an optional error type (`fn(A) R!E`).
    Function {
        params: Vec<Ty>,
        ret: Box<Ty>,
        err: Option<Box<Ty>>,
    },
    /// `T!E` -- at runtime either a `T` value or an `Error` payload.
    Result { ok: Box<Ty>, err: Box<Ty> },
    /// `(A, B)`
    Tuple(Vec<Ty>),
    /// A declared struct type, identified by id; `args` instantiate its
    /// type parameters (empty when not yet instantiated).
    Struct {
        id: TypeId,
        name: String,
        args: Vec<Ty>,
    },
    /// A declared enum type, identified by id.
    Enum {
        id: TypeId,
        name: String,
        args: Vec<Ty>,
    },
    /// The unit type: the value `none` and nothing else. Blocks without a
    /// trailing expression and `print` calls have this type.
    None,
    /// An inference variable.
    Var(TyVar),
}

impl Ty {
    pub fn int() -> Ty {
        Ty::Prim(Prim::Int)
    }

    pub fn float() -> Ty {
        Ty::Prim(Prim::Float)
    }

    pub fn string() -> Ty {
        Ty::Prim(Prim::String)
    }

    pub fn bool() -> Ty {
        Ty::Prim(Prim::Bool)
    }

    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn option(inner: Ty) -> Ty {
        Ty::Option(Box::new(inner))
    }

    pub fn result(ok: Ty, err: Ty) -> Ty {
        Ty::Result {
            ok: Box::new(ok),
            err: Box::new(err),
        }
    }

    pub fn function(params: Vec<Ty>, ret: Ty, err: Option<Ty>) -> Ty {
        Ty::Function {
            params,
            ret: Box::new(ret),
            err: err.map(Box::new),
        }
    }

    /// Whether this (already resolved) type is a failure-capable type.
    pub fn is_failure_capable(&self) -> bool {
        matches!(self, Ty::Option(_) | Ty::Result { .. })
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Prim(p) => write!(f, "{}", p),
            Ty::Array(elem) => write!(f, "[{}]", elem),
            Ty::Option(inner) => write!(f, "?{}", inner),
            Ty::Function { params, ret, err } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") {}", ret)?;
                if let Some(err) = err {
                    write!(f, "!{}", err)?;
                }
                Ok(())
            }
            Ty::Result { ok, err } => write!(f, "{}!{}", ok, err),
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Ty::Struct { name, args, .. } | Ty::Enum { name, args, .. } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Ty::None => write!(f, "None"),
            Ty::Var(v) => write!(f, "?t{}", v.0),
        }
    }
}

/// A polymorphic type scheme: a type with universally quantified
/// variables. `identity(x a) a` has the scheme `forall a. fn(a) a`.
#[derive(Clone, Debug)]
pub struct Scheme {
    pub vars: Vec<TyVar>,
    pub ty: Ty,
}

impl Scheme {
    /// A monomorphic scheme (no quantified variables).
    pub fn mono(ty: Ty) -> Self {
        Scheme {
            vars: Vec::new(),
            ty,
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(format!("{}", Ty::int()), "Int");
        assert_eq!(format!("{}", Ty::array(Ty::string())), "[String]");
        assert_eq!(format!("{}", Ty::option(Ty::int())), "?Int");
        assert_eq!(
            format!("{}", Ty::result(Ty::int(), Ty::string())),
            "Int!String"
        );
        assert_eq!(
            format!("{}", Ty::function(vec![Ty::int()], Ty::bool(), None)),
            "fn(Int) Bool"
        );
        assert_eq!(
            format!(
                "{}",
                Ty::function(vec![Ty::int()], Ty::int(), Some(Ty::string()))
            ),
            "fn(Int) Int!String"
        );
        assert_eq!(
            format!("{}", Ty::Tuple(vec![Ty::int(), Ty::bool()])),
            "(Int, Bool)"
        );
        assert_eq!(format!("{}", Ty::None), "None");
    }

    #[test]
    fn display_named_types() {
        let user = Ty::Struct {
            id: TypeId(0),
            name: "User".into(),
            args: vec![],
        };
        assert_eq!(format!("{}", user), "User");
        let boxed = Ty::Struct {
            id: TypeId(1),
            name: "Box".into(),
            args: vec![Ty::int()],
        };
        assert_eq!(format!("{}", boxed), "Box(Int)");
    }
}
