//! Recursive-descent parser for the AL language.
//!
//! Consumes the scanner's token stream and produces a syntactic [`ast`]
//! tree plus diagnostics. Operator precedence is climbed explicitly; parse
//! errors trigger panic-mode recovery with per-context synchronization
//! anchors, leaving `Error` sentinel nodes in the tree so later stages can
//! keep reporting.

pub mod ast;
mod parser;

use al_common::diagnostic::Diagnostic;
use al_common::token::Token;

/// The result of scanning and parsing a source file.
///
/// `tokens` is retained (with trivia) for the formatter; `diagnostics`
/// contains scanner and parser errors in the order they were found.
pub struct ParseResult {
    pub program: ast::Program,
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Whether any error-severity diagnostic was produced.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Scan and parse a source file.
pub fn parse(source: &str) -> ParseResult {
    let (tokens, mut diagnostics) = al_lexer::Scanner::tokenize(source);
    let mut parser = parser::Parser::new(&tokens);
    let program = parser.parse_program();
    diagnostics.extend(parser.into_diagnostics());
    ParseResult {
        program,
        tokens,
        diagnostics,
    }
}
