//! Round-trip formatter for AL source files.
//!
//! The formatter re-emits the scanner's token stream with canonical
//! spacing and indentation, preserving comments and (up to one) blank
//! lines from trivia. Because tokens are reproduced verbatim from the
//! source, `parse(fmt(s))` equals `parse(s)` modulo spans and trivia,
//! and the output is a fixpoint: `fmt(fmt(s)) == fmt(s)`.
//!
//! Files with parse errors are never reformatted.

mod printer;

use al_common::diagnostic::Diagnostic;

/// Format a source file.
///
/// Returns the formatted text, or the parse/scan diagnostics when the
/// source does not parse (in which case the caller must leave the file
/// untouched).
pub fn format_source(source: &str) -> Result<String, Vec<Diagnostic>> {
    let parse = al_parser::parse(source);
    if parse.has_errors() {
        return Err(parse.diagnostics);
    }
    Ok(printer::print_tokens(&parse.tokens, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(source: &str) -> String {
        format_source(source).expect("source must format")
    }

    #[test]
    fn canonical_spacing_around_operators() {
        assert_eq!(fmt("let x=1+2*3"), "let x = 1 + 2 * 3\n");
    }

    #[test]
    fn no_space_inside_calls_and_indexing() {
        assert_eq!(fmt("f ( 1 , 2 )"), "f(1, 2)\n");
        assert_eq!(fmt("xs [ 0 ]"), "xs[0]\n");
    }

    #[test]
    fn range_is_tight() {
        assert_eq!(fmt("0 .. 10"), "0..10\n");
    }

    #[test]
    fn block_indentation() {
        let input = "fn add(a Int, b Int) Int {\na + b\n}\n";
        assert_eq!(fmt(input), "fn add(a Int, b Int) Int {\n  a + b\n}\n");
    }

    #[test]
    fn nested_indentation() {
        let input = "fn f(x Int) Int {\nif x > 0 {\n1\n} else {\n2\n}\n}\n";
        let expected = "fn f(x Int) Int {\n  if x > 0 {\n    1\n  } else {\n    2\n  }\n}\n";
        assert_eq!(fmt(input), expected);
    }

    #[test]
    fn comments_are_preserved() {
        let input = "// header\nlet x = 1 // trailing\n// between\nlet y = 2\n";
        let output = fmt(input);
        assert!(output.contains("// header\n"));
        assert!(output.contains("let x = 1 // trailing\n"));
        assert!(output.contains("// between\nlet y = 2\n"));
    }

    #[test]
    fn blank_lines_collapse_to_one() {
        let input = "let a = 1\n\n\n\nlet b = 2\n";
        assert_eq!(fmt(input), "let a = 1\n\nlet b = 2\n");
    }

    #[test]
    fn struct_literal_spacing() {
        assert_eq!(
            fmt("let u = User{id:0,name:'guest'}"),
            "let u = User{ id: 0, name: 'guest' }\n"
        );
    }

    #[test]
    fn option_and_result_types_stay_tight() {
        assert_eq!(
            fmt("fn f(a Int) Int!DivisionError {\na\n}"),
            "fn f(a Int) Int!DivisionError {\n  a\n}\n"
        );
        assert_eq!(fmt("fn g() ?Int {\nnone\n}"), "fn g() ?Int {\n  none\n}\n");
    }

    #[test]
    fn unary_operators_stay_tight() {
        assert_eq!(fmt("let x = -1"), "let x = -1\n");
        assert_eq!(fmt("let y = !done"), "let y = !done\n");
        assert_eq!(fmt("let z = a - -1"), "let z = a - -1\n");
    }

    #[test]
    fn propagate_stays_tight() {
        assert_eq!(
            fmt("fn f() ?Int {\ng()! + 1\n}"),
            "fn f() ?Int {\n  g()! + 1\n}\n"
        );
    }

    #[test]
    fn string_escapes_survive() {
        assert_eq!(fmt(r"let s = 'a\nb'"), "let s = 'a\\nb'\n");
    }

    #[test]
    fn idempotence() {
        let inputs = [
            "fn add(a Int, b Int) Int {\na+b\n}\n\n\nlet x = add(1,2) // call\n",
            "enum Shape {\nCircle(Float)\nPoint\n}\nmatch s {\nCircle(r) -> r\nelse -> 0.0\n}\n",
            "let xs = [1, 2, ..rest]\nlet t = (1, 'a')\n// tail comment\n",
        ];
        for input in inputs {
            let once = fmt(input);
            let twice = fmt(&once);
            assert_eq!(once, twice, "fmt must be idempotent for {:?}", input);
        }
    }

    #[test]
    fn parse_errors_refuse_formatting() {
        assert!(format_source("fn broken( {").is_err());
    }

    #[test]
    fn formatting_preserves_the_token_stream() {
        // Reformatting only moves whitespace: the significant tokens
        // (kinds and literals) are identical, so the parse is too.
        let input =
            "fn area(s Shape) Float {\nmatch s {\nCircle(r) -> 3.14*r*r\nelse->0.0\n}\n}\n";
        let output = fmt(input);
        let (before, _) = al_lexer::Scanner::tokenize(input);
        let (after, _) = al_lexer::Scanner::tokenize(&output);
        let strip = |tokens: &[al_common::token::Token]| {
            tokens
                .iter()
                .map(|t| (t.kind, t.literal.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&before), strip(&after));
    }

    #[test]
    fn ends_with_single_newline() {
        assert_eq!(fmt("let x = 1"), "let x = 1\n");
        assert_eq!(fmt("let x = 1\n\n"), "let x = 1\n");
    }
}
