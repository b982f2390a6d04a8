//! Per-document analysis: run the parser and type checker, convert
//! diagnostics to LSP shape, and index binding sites and doc comments
//! for hover and go-to-definition.

use al_common::span::Span;
use al_common::token::{Token, TriviaKind};
use al_parser::ast::{ArrayElem, Expr, Pattern, Program, Stmt, StrPart};
use rustc_hash::FxHashMap;
use tower_lsp::lsp_types::{self, DiagnosticSeverity, Position, Range};

/// Everything the server needs to answer queries about one document.
pub struct AnalysisResult {
    pub diagnostics: Vec<lsp_types::Diagnostic>,
    /// Resolved type strings keyed by source span.
    pub span_types: FxHashMap<Span, String>,
    /// Binding sites: name -> definition span, in declaration order.
    pub definitions: Vec<(String, Span)>,
    /// Identifier references: name + span.
    pub references: Vec<(String, Span)>,
    /// Doc comments: declaration name -> the `//` block directly above it.
    pub docs: FxHashMap<String, String>,
}

/// Analyze a document: scan, parse, type-check, index.
pub fn analyze_document(source: &str) -> AnalysisResult {
    let parse = al_parser::parse(source);
    let typeck = al_typeck::check(&parse.program);

    let mut diagnostics: Vec<lsp_types::Diagnostic> = parse
        .diagnostics
        .iter()
        .chain(typeck.diagnostics().iter())
        .map(to_lsp_diagnostic)
        .collect();
    diagnostics.sort_by_key(|d| (d.range.start.line, d.range.start.character));

    let mut index = Index::default();
    index.walk_program(&parse.program);

    AnalysisResult {
        diagnostics,
        span_types: typeck.span_types,
        definitions: index.definitions,
        references: index.references,
        docs: collect_docs(&parse.program, &parse.tokens),
    }
}

/// Map top-level declarations to the comment block written above them.
///
/// The scanner attaches comments as leading trivia on the next token, so
/// the block above a declaration hangs off the declaration's first token.
fn collect_docs(program: &Program, tokens: &[Token]) -> FxHashMap<String, String> {
    let mut docs = FxHashMap::default();
    for stmt in &program.stmts {
        let Some(name) = decl_name(peel_export(stmt)) else {
            continue;
        };
        // The doc trivia sits on the outermost statement's first token
        // (the `export` keyword for exported declarations).
        if let Some(doc) = doc_comment_for(tokens, stmt.span()) {
            docs.insert(name, doc);
        }
    }
    docs
}

fn peel_export(stmt: &Stmt) -> &Stmt {
    match stmt {
        Stmt::Export(inner, _) => peel_export(inner),
        other => other,
    }
}

fn decl_name(stmt: &Stmt) -> Option<String> {
    match stmt {
        Stmt::Fn(decl) => Some(decl.name.clone()),
        Stmt::Const(decl) => Some(decl.name.clone()),
        Stmt::Struct(decl) => Some(decl.name.clone()),
        Stmt::Enum(decl) => Some(decl.name.clone()),
        Stmt::Let(decl) => match &decl.pattern {
            Pattern::Name { name, .. } => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// The contiguous `//` block directly above the token starting at the
/// given span -- a blank line detaches it.
fn doc_comment_for(tokens: &[Token], span: Span) -> Option<String> {
    let position = tokens.iter().position(|t| {
        t.span.start_line == span.start_line && t.span.start_col == span.start_col
    })?;
    let trivia = &tokens[position].leading_trivia;

    let mut lines: Vec<String> = Vec::new();
    for (i, piece) in trivia.iter().enumerate().rev() {
        match piece.kind {
            TriviaKind::Whitespace => {}
            TriviaKind::Newline => {
                if piece.blank_lines() > 0 {
                    break;
                }
            }
            TriviaKind::LineComment => {
                // A doc line starts its own line; a comment trailing the
                // previous statement does not document this one.
                let on_own_line = position == 0
                    || trivia[..i]
                        .iter()
                        .rev()
                        .find(|p| p.kind != TriviaKind::Whitespace)
                        .map_or(false, |p| p.kind == TriviaKind::Newline);
                if !on_own_line {
                    break;
                }
                lines.push(piece.text.trim_start_matches('/').trim().to_string());
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        lines.reverse();
        Some(lines.join("\n"))
    }
}

fn to_lsp_diagnostic(diag: &al_common::diagnostic::Diagnostic) -> lsp_types::Diagnostic {
    lsp_types::Diagnostic {
        range: span_to_range(diag.span),
        severity: Some(match diag.severity {
            al_common::diagnostic::Severity::Error => DiagnosticSeverity::ERROR,
            al_common::diagnostic::Severity::Warning => DiagnosticSeverity::WARNING,
        }),
        source: Some("al".to_string()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

/// Convert a 1-based AL span to a 0-based LSP range.
pub fn span_to_range(span: Span) -> Range {
    Range::new(
        Position::new(
            span.start_line.saturating_sub(1),
            span.start_col.saturating_sub(1),
        ),
        Position::new(span.end_line.saturating_sub(1), span.end_col.saturating_sub(1)),
    )
}

/// Convert a 0-based LSP position to 1-based AL coordinates.
pub fn position_to_point(position: &Position) -> (u32, u32) {
    (position.line + 1, position.character + 1)
}

/// The resolved type string at the smallest span containing the point.
pub fn type_at(result: &AnalysisResult, line: u32, col: u32) -> Option<&str> {
    result
        .span_types
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

/// The definition span for the identifier under the point, if any.
pub fn definition_at(result: &AnalysisResult, line: u32, col: u32) -> Option<Span> {
    let (name, _) = result
        .references
        .iter()
        .find(|(_, span)| span.contains(line, col))?;
    result
        .definitions
        .iter()
        .rev()
        .find(|(def_name, _)| def_name == name)
        .map(|(_, span)| *span)
}

/// The identifier name under the point: a reference, or a binding site.
fn name_at(result: &AnalysisResult, line: u32, col: u32) -> Option<&str> {
    result
        .references
        .iter()
        .chain(result.definitions.iter())
        .find(|(_, span)| span.contains(line, col))
        .map(|(name, _)| name.as_str())
}

/// The doc comment of the declaration named under the point, if any.
pub fn doc_at(result: &AnalysisResult, line: u32, col: u32) -> Option<&str> {
    let name = name_at(result, line, col)?;
    result.docs.get(name).map(String::as_str)
}

/// AST walker collecting binding sites and identifier references.
#[derive(Default)]
struct Index {
    definitions: Vec<(String, Span)>,
    references: Vec<(String, Span)>,
}

impl Index {
    fn walk_program(&mut self, program: &Program) {
        for stmt in &program.stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let(decl) => {
                self.walk_expr(&decl.value);
                self.bind_pattern(&decl.pattern);
            }
            Stmt::Const(decl) => {
                self.walk_expr(&decl.value);
                self.definitions.push((decl.name.clone(), decl.name_span));
            }
            Stmt::Assign(decl) => {
                self.references.push((decl.name.clone(), decl.name_span));
                self.walk_expr(&decl.value);
            }
            Stmt::Fn(decl) => {
                self.definitions.push((decl.name.clone(), decl.name_span));
                for param in &decl.params {
                    self.definitions.push((param.name.clone(), param.name_span));
                }
                self.walk_expr(&decl.body);
            }
            Stmt::Struct(decl) => {
                self.definitions.push((decl.name.clone(), decl.name_span));
            }
            Stmt::Enum(decl) => {
                self.definitions.push((decl.name.clone(), decl.name_span));
                for variant in &decl.variants {
                    self.definitions
                        .push((variant.name.clone(), variant.name_span));
                }
            }
            Stmt::Assert(decl) => self.walk_expr(&decl.cond),
            Stmt::Import(_) => {}
            Stmt::Export(inner, _) => self.walk_stmt(inner),
            Stmt::Expr(expr) => self.walk_expr(expr),
            Stmt::Error(_) => {}
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern) {
        for (name, span) in pattern.bindings() {
            self.definitions.push((name, span));
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident { name, span } => {
                self.references.push((name.clone(), *span));
            }
            Expr::InterpStr { parts, .. } => {
                for part in parts {
                    if let StrPart::Ident(name, span) = part {
                        self.references.push((name.clone(), *span));
                    }
                }
            }
            Expr::Block { stmts, .. } => {
                for stmt in stmts {
                    self.walk_stmt(stmt);
                }
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.walk_expr(cond);
                self.walk_expr(then_branch);
                if let Some(e) = else_branch {
                    self.walk_expr(e);
                }
            }
            Expr::Match { subject, arms, .. } => {
                self.walk_expr(subject);
                for arm in arms {
                    self.bind_pattern(&arm.pattern);
                    self.walk_expr(&arm.body);
                }
            }
            Expr::Or {
                value,
                receiver,
                fallback,
                ..
            } => {
                self.walk_expr(value);
                if let Some((name, span)) = receiver {
                    self.definitions.push((name.clone(), *span));
                }
                self.walk_expr(fallback);
            }
            Expr::ErrorValue { payload, .. } => self.walk_expr(payload),
            Expr::Propagate { value, .. } => self.walk_expr(value),
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs);
                self.walk_expr(rhs);
            }
            Expr::Unary { operand, .. } => self.walk_expr(operand),
            Expr::Call { callee, args, .. } => {
                self.walk_expr(callee);
                for arg in args {
                    self.walk_expr(arg);
                }
            }
            Expr::Property { object, .. } => self.walk_expr(object),
            Expr::TupleIndex { object, .. } => self.walk_expr(object),
            Expr::Array { elems, .. } => {
                for elem in elems {
                    match elem {
                        ArrayElem::Item(e) | ArrayElem::Spread(e) => self.walk_expr(e),
                    }
                }
            }
            Expr::Tuple { elems, .. } => {
                for e in elems {
                    self.walk_expr(e);
                }
            }
            Expr::Index { object, index, .. } => {
                self.walk_expr(object);
                self.walk_expr(index);
            }
            Expr::Range { start, end, .. } => {
                self.walk_expr(start);
                self.walk_expr(end);
            }
            Expr::StructInit { fields, .. } => {
                for field in fields {
                    self.walk_expr(&field.value);
                }
            }
            Expr::FnExpr { params, body, .. } => {
                for param in params {
                    self.definitions.push((param.name.clone(), param.name_span));
                }
                self.walk_expr(body);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_converted_to_lsp_ranges() {
        let result = analyze_document("let x = missing_name");
        assert!(!result.diagnostics.is_empty());
        let diag = &result.diagnostics[0];
        assert_eq!(diag.range.start.line, 0);
        assert!(diag.message.contains("missing_name"));
    }

    #[test]
    fn hover_finds_the_identifier_type() {
        let src = "fn add(a Int, b Int) Int { a + b }";
        let result = analyze_document(src);
        // `a` in the body is at 1-based column 28.
        assert_eq!(type_at(&result, 1, 28), Some("Int"));
    }

    #[test]
    fn definition_resolves_to_binding_site() {
        let src = "fn double(x Int) Int { x * 2 }\ndouble(2)";
        let result = analyze_document(src);
        // `double` reference on line 2.
        let def = definition_at(&result, 2, 1).expect("definition");
        assert_eq!(def.start_line, 1);
        assert_eq!(def.start_col, 4);
    }

    #[test]
    fn clean_documents_have_no_diagnostics() {
        let result = analyze_document("let x = 1 + 2");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn doc_comment_is_found_on_definition_and_reference() {
        let src = "// Doubles a number.\nfn double(x Int) Int { x * 2 }\ndouble(3)";
        let result = analyze_document(src);
        // On the definition name.
        assert_eq!(doc_at(&result, 2, 4), Some("Doubles a number."));
        // On a reference.
        assert_eq!(doc_at(&result, 3, 1), Some("Doubles a number."));
    }

    #[test]
    fn doc_comment_joins_contiguous_lines() {
        let src = "// Adds things.\n// Really.\nfn add(a Int, b Int) Int { a + b }";
        let result = analyze_document(src);
        assert_eq!(doc_at(&result, 3, 4), Some("Adds things.\nReally."));
    }

    #[test]
    fn blank_line_detaches_a_comment() {
        let src = "// stray note\n\nfn f() Int { 1 }\nf()";
        let result = analyze_document(src);
        assert_eq!(doc_at(&result, 4, 1), None);
    }

    #[test]
    fn trailing_comment_does_not_document_next_binding() {
        let src = "let a = 1 // about a\nlet b = 2\nb";
        let result = analyze_document(src);
        assert_eq!(doc_at(&result, 3, 1), None);
    }

    #[test]
    fn doc_comments_cover_let_and_const() {
        let src = "// The answer.\nconst ANSWER = 42\n// A greeting.\nlet hello = 'hi'\nANSWER";
        let result = analyze_document(src);
        assert_eq!(doc_at(&result, 5, 1), Some("The answer."));
        assert_eq!(doc_at(&result, 4, 5), Some("A greeting."));
    }

    #[test]
    fn position_conversions_are_zero_to_one_based() {
        assert_eq!(position_to_point(&Position::new(0, 0)), (1, 1));
        let range = span_to_range(Span::new(1, 1, 1, 5));
        assert_eq!(range.start, Position::new(0, 0));
        assert_eq!(range.end, Position::new(0, 4));
    }
}
