//! AL type checker: Hindley-Milner inference over the syntactic AST.
//!
//! Walks the parsed program in a single forward pass (hoisting, then
//! checking) and produces a typed AST, the struct/enum registry, a
//! span -> type map for the LSP, and a diagnostic list. Unification uses
//! `ena`'s union-find with occurs check; generics work by scheme
//! instantiation at call sites.
//!
//! # Architecture
//!
//! - [`ty`]: core type representation (`Ty`, `TyVar`, `Scheme`)
//! - [`registry`]: struct/enum definitions with stable integer ids
//! - [`unify`]: unification engine and substitution
//! - [`env`]: scope-stacked type environment
//! - [`builtins`]: built-in function schemes
//! - [`infer`]: the checking pass producing the typed AST
//! - [`exhaustiveness`]: closed-enum match coverage
//! - [`typed`]: the typed AST consumed by the bytecode compiler
//! - [`error`]: semantic error variants

pub mod builtins;
pub mod env;
pub mod error;
pub mod exhaustiveness;
mod infer;
pub mod registry;
pub mod ty;
pub mod typed;
pub mod unify;

use al_common::diagnostic::Diagnostic;
use al_common::span::Span;
use rustc_hash::FxHashMap;

use crate::error::TypeError;
use crate::registry::TypeRegistry;
use crate::typed::TProgram;

/// The result of type checking a program.
pub struct TypeckResult {
    /// The typed AST (spans retained).
    pub program: TProgram,
    /// Struct/enum ids with their field/variant tables, for the compiler.
    pub registry: TypeRegistry,
    /// Semantic errors in discovery order.
    pub errors: Vec<TypeError>,
    /// Resolved type strings keyed by source span, for LSP hover.
    pub span_types: FxHashMap<Span, String>,
    /// The global scope after checking: top-level names (functions,
    /// constants, built-ins) and their resolved types.
    pub globals: FxHashMap<String, String>,
}

impl TypeckResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render the semantic errors as diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(TypeError::to_diagnostic).collect()
    }

    /// The resolved type at the smallest span containing the position.
    pub fn type_at(&self, line: u32, col: u32) -> Option<&str> {
        self.span_types
            .iter()
            .filter(|(span, _)| span.contains(line, col))
            .min_by_key(|(span, _)| {
                (
                    span.end_line - span.start_line,
                    span.end_col.saturating_sub(span.start_col),
                )
            })
            .map(|(_, ty)| ty.as_str())
    }
}

/// Type-check a parsed program.
pub fn check(program: &al_parser::ast::Program) -> TypeckResult {
    let mut checker = infer::Checker::new();
    let typed = checker.check_program(program);

    let infer::Checker {
        mut ctx,
        env,
        registry,
        span_types,
        ..
    } = checker;

    let span_types = span_types
        .into_iter()
        .map(|(span, ty)| {
            let resolved = ctx.resolve(ty);
            (span, resolved.to_string())
        })
        .collect();

    let globals = env
        .globals()
        .map(|(name, binding)| {
            let resolved = ctx.resolve(binding.scheme.ty.clone());
            (name.clone(), resolved.to_string())
        })
        .collect();

    TypeckResult {
        program: typed,
        registry,
        errors: ctx.errors,
        span_types,
        globals,
    }
}
