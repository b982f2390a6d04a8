//! Diagnostics shared by every pipeline stage.
//!
//! The scanner, parser, and type checker all collect `Diagnostic`s instead
//! of aborting; the driver renders them together once the stage completes.
//! Rendering uses `ariadne` for the labeled source gutter, preceded by a
//! `error: <msg> --> file:line:col` header and followed by a
//! `Found N errors` summary.

use std::fmt;

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::span::{LineIndex, Span};

/// How severe a diagnostic is. Errors block the next pipeline stage;
/// warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic: severity, message, and the source span it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Render a single diagnostic with its source gutter.
pub fn render(diag: &Diagnostic, source: &str, filename: &str, color: bool) -> String {
    let index = LineIndex::new(source);
    let range = diag.span.byte_range(&index);
    let start = range.start;
    let end = range.end.max(start + 1).min(source.len().max(start + 1));

    let mut out = format!(
        "{}: {}\n  --> {}:{}:{}\n",
        diag.severity, diag.message, filename, diag.span.start_line, diag.span.start_col
    );

    let kind = match diag.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let mut rendered = Vec::new();
    let report = Report::<std::ops::Range<usize>>::build(kind, start..end)
        .with_config(Config::default().with_color(color))
        .with_message(&diag.message)
        .with_label(Label::new(start..end).with_message(&diag.message))
        .finish();
    if report.write(Source::from(source), &mut rendered).is_ok() {
        out.push_str(&String::from_utf8_lossy(&rendered));
    }
    out
}

/// Render all diagnostics in source order, followed by the error count.
///
/// Returns the rendered text and whether any error-severity diagnostic was
/// present.
pub fn render_all(diags: &[Diagnostic], source: &str, filename: &str, color: bool) -> (String, bool) {
    let mut sorted: Vec<&Diagnostic> = diags.iter().collect();
    sorted.sort_by_key(|d| (d.span.start_line, d.span.start_col));

    let mut out = String::new();
    for diag in &sorted {
        out.push_str(&render(diag, source, filename, color));
    }

    let error_count = sorted.iter().filter(|d| d.is_error()).count();
    if error_count > 0 {
        out.push_str(&format!("Found {} error{}\n", error_count, plural(error_count)));
    }
    (out, error_count > 0)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_location_header() {
        let src = "let x = \n";
        let diag = Diagnostic::error("unexpected end of line", Span::new(1, 9, 1, 10));
        let out = render(&diag, src, "main.al", false);
        assert!(out.starts_with("error: unexpected end of line\n  --> main.al:1:9\n"));
    }

    #[test]
    fn render_all_sorts_and_counts() {
        let src = "a\nb\nc\n";
        let diags = vec![
            Diagnostic::error("second", Span::new(3, 1, 3, 2)),
            Diagnostic::error("first", Span::new(1, 1, 1, 2)),
        ];
        let (out, has_errors) = render_all(&diags, src, "t.al", false);
        assert!(has_errors);
        let first = out.find("first").unwrap();
        let second = out.find("second").unwrap();
        assert!(first < second, "diagnostics must print in source order");
        assert!(out.ends_with("Found 2 errors\n"));
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let src = "x\n";
        let diags = vec![Diagnostic::warning("unused", Span::new(1, 1, 1, 2))];
        let (out, has_errors) = render_all(&diags, src, "t.al", false);
        assert!(!has_errors);
        assert!(!out.contains("Found"));
    }
}
