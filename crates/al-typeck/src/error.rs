//! Type error variants and their rendering to diagnostics.

use al_common::diagnostic::Diagnostic;
use al_common::span::Span;

use crate::ty::{Ty, TyVar};

/// A semantic error found during type checking.
///
/// Each variant carries the span the diagnostic points at (the narrower
/// side of a failed unification) plus enough context for an actionable
/// message.
#[derive(Clone, Debug)]
pub enum TypeError {
    /// Two types that should be equal are not.
    Mismatch {
        expected: Ty,
        found: Ty,
        span: Span,
    },
    /// A type variable appears inside its own solution (infinite type).
    InfiniteType { var: TyVar, ty: Ty, span: Span },
    /// A function or variant applied to the wrong number of arguments.
    ArityMismatch {
        what: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// A name is used but not bound in any scope.
    UnboundVariable { name: String, span: Span },
    /// A written type name does not resolve.
    UnknownType { name: String, span: Span },
    /// A non-function value is called.
    NotAFunction { ty: Ty, span: Span },
    /// A variant name does not belong to the expected (or any) enum.
    UnknownVariant {
        enum_name: Option<String>,
        variant: String,
        span: Span,
    },
    /// A bare variant name matches more than one enum.
    AmbiguousVariant {
        variant: String,
        candidates: Vec<String>,
        span: Span,
    },
    /// A struct literal omits a declared field.
    MissingField {
        struct_name: String,
        field: String,
        span: Span,
    },
    /// A struct literal names an undeclared field.
    UnknownField {
        struct_name: String,
        field: String,
        span: Span,
    },
    /// A struct literal repeats a field.
    DuplicateField { field: String, span: Span },
    /// Field access on a type without that field.
    NoSuchField { ty: Ty, field: String, span: Span },
    /// Tuple index past the tuple's arity.
    TupleIndexOutOfBounds {
        ty: Ty,
        index: u32,
        span: Span,
    },
    /// Indexing a non-array value.
    NotIndexable { ty: Ty, span: Span },
    /// A match over a closed enum does not cover every variant.
    NonExhaustiveMatch {
        enum_name: String,
        missing: Vec<String>,
        span: Span,
    },
    /// Or-pattern alternatives bind different variable sets.
    OrPatternBindingMismatch {
        expected: Vec<String>,
        found: Vec<String>,
        span: Span,
    },
    /// `x!` outside a function with a failure-compatible return type.
    InvalidPropagate { reason: String, span: Span },
    /// `x or err -> ..` where `x` is an option (no payload to receive).
    InvalidOrReceiver { span: Span },
    /// `error <payload>` inside a function with no declared error type.
    ErrorOutsideResultFn { span: Span },
    /// `x or ..` applied to a value that can never fail.
    InvalidOr { ty: Ty, span: Span },
    /// Assignment to a `const`, function, or built-in.
    NotAssignable { name: String, span: Span },
    /// A pattern that cannot apply to the subject's type.
    PatternMismatch {
        subject: Ty,
        pattern: String,
        span: Span,
    },
    /// `let` pattern that could fail at runtime in a position requiring
    /// irrefutability is reported here.
    InvalidBindingPattern { reason: String, span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::InfiniteType { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::UnboundVariable { span, .. }
            | TypeError::UnknownType { span, .. }
            | TypeError::NotAFunction { span, .. }
            | TypeError::UnknownVariant { span, .. }
            | TypeError::AmbiguousVariant { span, .. }
            | TypeError::MissingField { span, .. }
            | TypeError::UnknownField { span, .. }
            | TypeError::DuplicateField { span, .. }
            | TypeError::NoSuchField { span, .. }
            | TypeError::TupleIndexOutOfBounds { span, .. }
            | TypeError::NotIndexable { span, .. }
            | TypeError::NonExhaustiveMatch { span, .. }
            | TypeError::OrPatternBindingMismatch { span, .. }
            | TypeError::InvalidPropagate { span, .. }
            | TypeError::InvalidOrReceiver { span }
            | TypeError::ErrorOutsideResultFn { span }
            | TypeError::InvalidOr { span, .. }
            | TypeError::NotAssignable { span, .. }
            | TypeError::PatternMismatch { span, .. }
            | TypeError::InvalidBindingPattern { span, .. } => *span,
        }
    }

    /// Render to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = match self {
            TypeError::Mismatch {
                expected, found, ..
            } => format!("type mismatch: expected {}, found {}", expected, found),
            TypeError::InfiniteType { ty, .. } => {
                format!("cannot construct the infinite type arising from {}", ty)
            }
            TypeError::ArityMismatch {
                what,
                expected,
                found,
                ..
            } => format!(
                "{} expects {} argument{}, found {}",
                what,
                expected,
                if *expected == 1 { "" } else { "s" },
                found
            ),
            TypeError::UnboundVariable { name, .. } => {
                format!("undefined variable '{}'", name)
            }
            TypeError::UnknownType { name, .. } => format!("unknown type '{}'", name),
            TypeError::NotAFunction { ty, .. } => {
                format!("value of type {} is not callable", ty)
            }
            TypeError::UnknownVariant {
                enum_name, variant, ..
            } => match enum_name {
                Some(e) => format!("enum {} has no variant '{}'", e, variant),
                None => format!("unknown variant '{}'", variant),
            },
            TypeError::AmbiguousVariant {
                variant,
                candidates,
                ..
            } => format!(
                "variant '{}' is ambiguous between {}; qualify it with the enum name",
                variant,
                candidates.join(", ")
            ),
            TypeError::MissingField {
                struct_name, field, ..
            } => format!("missing field '{}' in {} literal", field, struct_name),
            TypeError::UnknownField {
                struct_name, field, ..
            } => format!("struct {} has no field '{}'", struct_name, field),
            TypeError::DuplicateField { field, .. } => {
                format!("field '{}' specified more than once", field)
            }
            TypeError::NoSuchField { ty, field, .. } => {
                format!("type {} has no field '{}'", ty, field)
            }
            TypeError::TupleIndexOutOfBounds { ty, index, .. } => {
                format!("tuple {} has no element {}", ty, index)
            }
            TypeError::NotIndexable { ty, .. } => {
                format!("value of type {} cannot be indexed", ty)
            }
            TypeError::NonExhaustiveMatch {
                enum_name, missing, ..
            } => format!(
                "non-exhaustive match on {}: unhandled variant{} {}",
                enum_name,
                if missing.len() == 1 { "" } else { "s" },
                missing.join(", ")
            ),
            TypeError::OrPatternBindingMismatch {
                expected, found, ..
            } => format!(
                "or-pattern alternatives bind different variables: [{}] vs [{}]",
                expected.join(", "),
                found.join(", ")
            ),
            TypeError::InvalidPropagate { reason, .. } => {
                format!("invalid '!' propagation: {}", reason)
            }
            TypeError::InvalidOrReceiver { .. } => {
                "an error receiver requires a result value ('T!E'); options carry no payload"
                    .to_string()
            }
            TypeError::ErrorOutsideResultFn { .. } => {
                "'error' requires the enclosing function to declare an error type ('T!E')"
                    .to_string()
            }
            TypeError::InvalidOr { ty, .. } => {
                format!("'or' applied to {}, which can never be a failure", ty)
            }
            TypeError::NotAssignable { name, .. } => {
                format!("cannot assign to '{}'", name)
            }
            TypeError::PatternMismatch {
                subject, pattern, ..
            } => format!("pattern {} cannot match a value of type {}", pattern, subject),
            TypeError::InvalidBindingPattern { reason, .. } => {
                format!("invalid binding pattern: {}", reason)
            }
        };
        Diagnostic::error(message, self.span())
    }
}
