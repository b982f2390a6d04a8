//! Bytecode compiler: typed AST -> [`al_bytecode::Program`].
//!
//! Lowering maintains, per function being compiled: a local slot table,
//! the ordered capture list, the current binding name (for `push_self`
//! on direct self-recursion), and a tail-position flag. Function bodies
//! are emitted inline behind a jump; jump targets are absolute code
//! addresses patched after the target is known.
//!
//! Compile errors are internal inconsistencies (a name the checker
//! resolved that the compiler cannot, an arity drift between checker and
//! builtin table). They are fatal and distinct from semantic errors.
//!
//! [`SessionCompiler`] keeps the lowering state alive across inputs so
//! the REPL can append each new input as a chunk of the entry function
//! and execute only that chunk on a persistent VM.

mod compile;
mod free_vars;

use al_common::span::Span;

pub use compile::{compile, SessionCompiler};

/// A fatal internal inconsistency discovered during lowering.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub span: Option<Span>,
}

impl CompileError {
    pub(crate) fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => write!(
                f,
                "compile error at {}:{}: {}",
                span.start_line, span.start_col, self.message
            ),
            None => write!(f, "compile error: {}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}
