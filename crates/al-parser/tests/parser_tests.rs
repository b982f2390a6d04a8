//! Parser integration tests: precedence, declarations, patterns, and
//! panic-mode recovery.

use al_parser::ast::*;
use al_parser::parse;

fn parse_ok(source: &str) -> Program {
    let result = parse(source);
    assert!(
        !result.has_errors(),
        "unexpected diagnostics for {:?}: {:?}",
        source,
        result.diagnostics
    );
    result.program
}

fn first_expr(source: &str) -> Expr {
    let program = parse_ok(source);
    match program.stmts.into_iter().next() {
        Some(Stmt::Expr(e)) => e,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn precedence_mul_binds_tighter_than_add() {
    let expr = first_expr("1 + 2 * 3");
    let Expr::Binary { op, rhs, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(
        *rhs,
        Expr::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn precedence_comparison_over_logic() {
    let expr = first_expr("a < b && c > d");
    let Expr::Binary { op, lhs, rhs, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::And);
    assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Lt, .. }));
    assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Gt, .. }));
}

#[test]
fn unary_binds_tighter_than_mul() {
    let expr = first_expr("-a * b");
    let Expr::Binary { op, lhs, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Mul);
    assert!(matches!(*lhs, Expr::Unary { op: UnaryOp::Neg, .. }));
}

#[test]
fn or_expression_with_plain_fallback() {
    let expr = first_expr("find(0) or default_user()");
    let Expr::Or {
        receiver, fallback, ..
    } = expr
    else {
        panic!("expected or expression");
    };
    assert!(receiver.is_none());
    assert!(matches!(*fallback, Expr::Call { .. }));
}

#[test]
fn or_expression_with_error_receiver() {
    let expr = first_expr("divide(10, 0) or err -> 0");
    let Expr::Or { receiver, .. } = expr else {
        panic!("expected or expression");
    };
    assert_eq!(receiver.unwrap().0, "err");
}

#[test]
fn or_expression_with_block_fallback() {
    let expr = first_expr("read() or { 0 }");
    let Expr::Or { fallback, .. } = expr else {
        panic!("expected or expression");
    };
    assert!(matches!(*fallback, Expr::Block { .. }));
}

#[test]
fn propagate_is_postfix() {
    let expr = first_expr("divide(1, 2)! + 1");
    let Expr::Binary { lhs, .. } = expr else {
        panic!("expected binary");
    };
    assert!(matches!(*lhs, Expr::Propagate { .. }));
}

#[test]
fn range_between_comparison_and_additive() {
    let expr = first_expr("0..n + 1");
    let Expr::Range { end, .. } = expr else {
        panic!("expected range, got {:?}", expr);
    };
    assert!(matches!(*end, Expr::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn call_index_property_chain() {
    let expr = first_expr("users[0].name");
    let Expr::Property { object, name, .. } = expr else {
        panic!("expected property access");
    };
    assert_eq!(name, "name");
    assert!(matches!(*object, Expr::Index { .. }));
}

#[test]
fn tuple_index_access() {
    let expr = first_expr("pair.0");
    assert!(matches!(expr, Expr::TupleIndex { index: 0, .. }));
}

#[test]
fn struct_init_requires_uppercase_name() {
    let expr = first_expr("User{ id: 0, name: 'guest' }");
    let Expr::StructInit { name, fields, .. } = expr else {
        panic!("expected struct init");
    };
    assert_eq!(name, "User");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "id");
}

#[test]
fn if_condition_is_not_struct_init() {
    // `x {` must not be parsed as a struct literal.
    let expr = first_expr("if ready { 1 } else { 2 }");
    assert!(matches!(expr, Expr::If { .. }));
}

#[test]
fn fn_expression_has_no_name() {
    let expr = first_expr("fn(x) { x + 1 }");
    let Expr::FnExpr { params, .. } = expr else {
        panic!("expected fn expression");
    };
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].name, "x");
}

#[test]
fn interpolated_string_parts() {
    let expr = first_expr("'hi $name, bye'");
    let Expr::InterpStr { parts, .. } = expr else {
        panic!("expected interpolated string");
    };
    assert_eq!(
        parts,
        vec![
            StrPart::Text("hi ".into()),
            StrPart::Ident("name".into(), parts_span(&parts)),
            StrPart::Text(", bye".into()),
        ]
    );
}

fn parts_span(parts: &[StrPart]) -> al_common::span::Span {
    parts
        .iter()
        .find_map(|p| match p {
            StrPart::Ident(_, span) => Some(*span),
            _ => None,
        })
        .unwrap()
}

#[test]
fn fn_declaration_with_types() {
    let program = parse_ok("fn add(a Int, b Int) Int { a + b }");
    let Stmt::Fn(decl) = &program.stmts[0] else {
        panic!("expected fn decl");
    };
    assert_eq!(decl.name, "add");
    assert_eq!(decl.params.len(), 2);
    assert!(matches!(
        decl.params[0].ty,
        Some(TypeExpr::Named { ref name, .. }) if name == "Int"
    ));
    assert!(decl.return_ty.is_some());
}

#[test]
fn fn_declaration_result_return_type() {
    let program = parse_ok("fn divide(a Int, b Int) Int!DivisionError { a / b }");
    let Stmt::Fn(decl) = &program.stmts[0] else {
        panic!("expected fn decl");
    };
    assert!(matches!(decl.return_ty, Some(TypeExpr::Result { .. })));
}

#[test]
fn option_and_array_types() {
    let program = parse_ok("fn find(ids [Int]) ?Int { none }");
    let Stmt::Fn(decl) = &program.stmts[0] else {
        panic!("expected fn decl");
    };
    assert!(matches!(decl.params[0].ty, Some(TypeExpr::Array { .. })));
    assert!(matches!(decl.return_ty, Some(TypeExpr::Option { .. })));
}

#[test]
fn function_type_with_error_folds() {
    let program = parse_ok("fn apply(f fn(Int) Int!String, x Int) Int { x }");
    let Stmt::Fn(decl) = &program.stmts[0] else {
        panic!("expected fn decl");
    };
    let Some(TypeExpr::Function { err, .. }) = &decl.params[0].ty else {
        panic!("expected function type");
    };
    assert!(err.is_some());
}

#[test]
fn struct_and_enum_declarations() {
    let program = parse_ok(
        "struct Box(t) {\n  value t\n}\nenum Shape {\n  Circle(Float)\n  Rect(Float, Float)\n  Point\n}",
    );
    let Stmt::Struct(s) = &program.stmts[0] else {
        panic!("expected struct");
    };
    assert_eq!(s.type_params, vec!["t"]);
    assert_eq!(s.fields.len(), 1);

    let Stmt::Enum(e) = &program.stmts[1] else {
        panic!("expected enum");
    };
    assert_eq!(e.variants.len(), 3);
    assert_eq!(e.variants[1].payload.len(), 2);
    assert!(e.variants[2].payload.is_empty());
}

#[test]
fn let_with_tuple_destructuring() {
    let program = parse_ok("let (a, b) = (1, 2)");
    let Stmt::Let(l) = &program.stmts[0] else {
        panic!("expected let");
    };
    assert!(matches!(l.pattern, Pattern::Tuple { .. }));
}

#[test]
fn match_with_all_pattern_forms() {
    let program = parse_ok(
        "match x {\n  0 -> 'zero'\n  1..10 -> 'small'\n  'hi' | 'hey' -> 'greeting'\n  Shape.Circle(r) -> 'circle'\n  Rect(w, h) -> 'rect'\n  Point -> 'point'\n  [first, ..rest] -> 'list'\n  (a, b) -> 'pair'\n  else -> 'other'\n}",
    );
    let Stmt::Expr(Expr::Match { arms, .. }) = &program.stmts[0] else {
        panic!("expected match");
    };
    assert_eq!(arms.len(), 9);
    assert!(matches!(arms[0].pattern, Pattern::Int { value: 0, .. }));
    assert!(matches!(
        arms[1].pattern,
        Pattern::Range { start: 1, end: 10, .. }
    ));
    assert!(matches!(arms[2].pattern, Pattern::Or { .. }));
    assert!(matches!(
        arms[3].pattern,
        Pattern::Variant {
            enum_name: Some(_),
            ..
        }
    ));
    assert!(matches!(
        arms[4].pattern,
        Pattern::Variant {
            enum_name: None,
            payload: Some(_),
            ..
        }
    ));
    // Bare `Point` parses as a name; the checker resolves it to a variant.
    assert!(matches!(arms[5].pattern, Pattern::Name { .. }));
    assert!(matches!(
        arms[6].pattern,
        Pattern::Array { rest: Some(_), .. }
    ));
    assert!(matches!(arms[7].pattern, Pattern::Tuple { .. }));
    assert!(matches!(arms[8].pattern, Pattern::Wildcard { .. }));
}

#[test]
fn array_literal_with_spread() {
    let expr = first_expr("[1, 2, ..rest]");
    let Expr::Array { elems, .. } = expr else {
        panic!("expected array");
    };
    assert_eq!(elems.len(), 3);
    assert!(matches!(elems[2], ArrayElem::Spread(_)));
}

#[test]
fn error_expression() {
    let program = parse_ok("fn fail() Int!String { error 'boom' }");
    let Stmt::Fn(decl) = &program.stmts[0] else {
        panic!("expected fn");
    };
    let Expr::Block { stmts, .. } = &decl.body else {
        panic!("expected block body");
    };
    assert!(matches!(stmts[0], Stmt::Expr(Expr::ErrorValue { .. })));
}

#[test]
fn export_wraps_declaration() {
    let program = parse_ok("export fn pub_fn() { 1 }");
    assert!(matches!(program.stmts[0], Stmt::Export(_, _)));
}

#[test]
fn import_statement() {
    let program = parse_ok("import util");
    let Stmt::Import(i) = &program.stmts[0] else {
        panic!("expected import");
    };
    assert_eq!(i.name, "util");
}

#[test]
fn assignment_statement() {
    let program = parse_ok("let x = 1\nx = 2");
    assert!(matches!(program.stmts[1], Stmt::Assign(_)));
}

#[test]
fn newline_terminates_expression() {
    // `- b` on its own line is a new statement, not a continuation.
    let program = parse_ok("let x = a\n-b");
    assert_eq!(program.stmts.len(), 2);
    assert!(matches!(
        program.stmts[1],
        Stmt::Expr(Expr::Unary { op: UnaryOp::Neg, .. })
    ));
}

#[test]
fn newlines_insignificant_inside_parens() {
    let expr = first_expr("f(1,\n  2,\n  3)");
    let Expr::Call { args, .. } = expr else {
        panic!("expected call");
    };
    assert_eq!(args.len(), 3);
}

// ── Error recovery ─────────────────────────────────────────────────────

#[test]
fn recovery_keeps_later_declarations() {
    let result = parse("fn broken( { }\nfn ok() { 1 }");
    assert!(result.has_errors());
    let has_ok = result.program.stmts.iter().any(|s| match s {
        Stmt::Fn(f) => f.name == "ok",
        _ => false,
    });
    assert!(has_ok, "parser must recover and keep the next declaration");
}

#[test]
fn recovery_inserts_error_node() {
    let result = parse("let = 5\nlet y = 2");
    assert!(result.has_errors());
    assert!(result
        .program
        .stmts
        .iter()
        .any(|s| matches!(s, Stmt::Error(_))));
    assert!(result.program.stmts.iter().any(|s| match s {
        Stmt::Let(l) => matches!(&l.pattern, Pattern::Name { name, .. } if name == "y"),
        _ => false,
    }));
}

#[test]
fn recovery_in_array_resyncs_at_comma() {
    let result = parse("let xs = [1, *, 3]\nlet y = 4");
    assert!(result.has_errors());
    let ok_let = result.program.stmts.iter().any(|s| match s {
        Stmt::Let(l) => matches!(&l.pattern, Pattern::Name { name, .. } if name == "y"),
        _ => false,
    });
    assert!(ok_let);
}

#[test]
fn recovery_does_not_cross_balanced_brackets() {
    let result = parse("fn f() { g(] }\nfn h() { 2 }");
    assert!(result.has_errors());
    let has_h = result.program.stmts.iter().any(|s| match s {
        Stmt::Fn(f) => f.name == "h",
        _ => false,
    });
    assert!(has_h);
}

#[test]
fn spans_are_attached() {
    let program = parse_ok("let x = 1");
    let span = program.stmts[0].span();
    assert_eq!(span.start_line, 1);
    assert_eq!(span.start_col, 1);
    assert!(span.end_col > span.start_col);
}
