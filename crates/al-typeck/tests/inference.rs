//! Type inference integration tests: literals, functions, generics,
//! failure handling, and structural types.

use al_typeck::error::TypeError;
use al_typeck::{check, TypeckResult};

fn check_source(source: &str) -> TypeckResult {
    let parse = al_parser::parse(source);
    assert!(
        !parse.has_errors(),
        "parse errors in test source: {:?}",
        parse.diagnostics
    );
    check(&parse.program)
}

fn check_ok(source: &str) -> TypeckResult {
    let result = check_source(source);
    assert!(
        !result.has_errors(),
        "unexpected type errors: {:?}",
        result.errors
    );
    result
}

// ── Well-typed programs ────────────────────────────────────────────────

#[test]
fn arithmetic_is_int() {
    let result = check_ok("let x = 1 + 2 * 3");
    assert_eq!(result.type_at(1, 5), Some("Int"));
}

#[test]
fn function_with_annotations() {
    check_ok("fn add(a Int, b Int) Int { a + b }\nlet r = add(1, 2)");
}

#[test]
fn unannotated_params_are_inferred() {
    let result = check_ok("fn double(x) { x * 2 }\nlet y = double(21)");
    assert_eq!(result.type_at(2, 5), Some("Int"));
}

#[test]
fn generic_identity_instantiates_per_call() {
    check_ok("fn identity(x a) a { x }\nlet s = identity('hi')\nlet n = identity(42)");
}

#[test]
fn if_branches_must_agree() {
    check_ok("let x = if true { 1 } else { 2 }");
    let result = check_source("let x = if true { 1 } else { 'two' }");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::Mismatch { .. })));
}

#[test]
fn if_condition_must_be_bool() {
    let result = check_source("let x = if 1 { 2 } else { 3 }");
    assert!(result.has_errors());
}

#[test]
fn struct_declaration_and_access() {
    let result = check_ok(
        "struct User {\n  id Int\n  name String\n}\nlet u = User{ id: 1, name: 'x' }\nlet n = u.name",
    );
    assert_eq!(result.type_at(6, 5), Some("String"));
}

#[test]
fn struct_missing_field_is_error() {
    let result = check_source("struct User {\n  id Int\n  name String\n}\nlet u = User{ id: 1 }");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::MissingField { .. })));
}

#[test]
fn struct_unknown_field_is_error() {
    let result =
        check_source("struct User {\n  id Int\n}\nlet u = User{ id: 1, age: 2 }");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::UnknownField { .. })));
}

#[test]
fn generic_struct_instantiation() {
    let result = check_ok(
        "struct Box(t) {\n  value t\n}\nlet b = Box{ value: 42 }\nlet v = b.value",
    );
    assert_eq!(result.type_at(5, 5), Some("Int"));
}

#[test]
fn enum_qualified_and_shorthand_construction() {
    check_ok(
        "enum Shape {\n  Circle(Float)\n  Point\n}\nlet a = Shape.Circle(1.0)\nlet b Shape = Point",
    );
}

#[test]
fn enum_shorthand_by_unique_variant() {
    check_ok("enum Shape {\n  Circle(Float)\n  Point\n}\nlet c = Circle(2.0)");
}

#[test]
fn match_on_enum_with_payload_binding() {
    check_ok(
        "enum Shape {\n  Circle(Float)\n  Point\n}\nfn area(s Shape) Float {\n  match s {\n    Circle(r) -> 3.14 * r * r\n    Point -> 0.0\n  }\n}",
    );
}

#[test]
fn option_fallback_with_or() {
    let result = check_ok(
        "fn find(id Int) ?Int {\n  if id == 1 { 7 } else { none }\n}\nlet v = find(0) or 0",
    );
    assert_eq!(result.type_at(4, 5), Some("Int"));
}

#[test]
fn result_fallback_with_receiver() {
    check_ok(
        "struct DivisionError {\n  message String\n}\nfn divide(a Int, b Int) Int!DivisionError {\n  if b == 0 {\n    error DivisionError{ message: 'division by zero' }\n  } else {\n    a / b\n  }\n}\nlet q = divide(10, 0) or err -> 0",
    );
}

#[test]
fn propagate_requires_compatible_return() {
    check_ok(
        "fn inner() Int!String {\n  error 'bad'\n}\nfn outer() Int!String {\n  inner()! + 1\n}",
    );
    let result = check_source("fn inner() Int!String {\n  error 'bad'\n}\nfn outer() Int {\n  inner()! + 1\n}");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::InvalidPropagate { .. })));
}

#[test]
fn tuples_and_destructuring() {
    let result = check_ok("let pair = (1, 'a')\nlet (n, s) = pair\nlet m = n + 1");
    assert_eq!(result.type_at(3, 5), Some("Int"));
}

#[test]
fn arrays_are_homogeneous() {
    check_ok("let xs = [1, 2, 3]\nlet y = xs[0] + 1");
    let result = check_source("let xs = [1, 'two']");
    assert!(result.has_errors());
}

#[test]
fn array_spread_must_match_element_type() {
    check_ok("let a = [1, 2]\nlet b = [..a, 3]");
    let result = check_source("let a = ['x']\nlet b = [..a, 3]");
    assert!(result.has_errors());
}

#[test]
fn string_interpolation_resolves_names() {
    check_ok("let name = 'world'\nlet msg = 'hello $name'");
    let result = check_source("let msg = 'hello $nobody'");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::UnboundVariable { .. })));
}

#[test]
fn closures_and_first_class_functions() {
    check_ok(
        "fn apply(f fn(Int) Int, x Int) Int { f(x) }\nlet inc = fn(n) { n + 1 }\nlet r = apply(inc, 41)",
    );
}

#[test]
fn builtin_print_accepts_anything() {
    check_ok("print(1)\nprint('x')\nprint([1, 2])");
}

#[test]
fn builtin_shadowing_is_allowed() {
    check_ok("fn shadowed() Int {\n  let print = 5\n  print + 1\n}");
}

#[test]
fn mutual_recursion_via_hoisting() {
    check_ok(
        "fn is_even(n Int) Bool {\n  if n == 0 { true } else { is_odd(n - 1) }\n}\nfn is_odd(n Int) Bool {\n  if n == 0 { false } else { is_even(n - 1) }\n}",
    );
}

#[test]
fn assignment_to_let_binding() {
    check_ok("let x = 1\nx = 2");
}

// ── Errors ─────────────────────────────────────────────────────────────

#[test]
fn undefined_variable() {
    let result = check_source("let x = missing");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::UnboundVariable { .. })));
}

#[test]
fn wrong_arity_call() {
    let result = check_source("fn f(a Int) Int { a }\nlet x = f(1, 2)");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::ArityMismatch { .. })));
}

#[test]
fn calling_non_function() {
    let result = check_source("let x = 1\nlet y = x(2)");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::NotAFunction { .. })));
}

#[test]
fn assignment_to_const_rejected() {
    let result = check_source("const LIMIT = 10\nLIMIT = 11");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::NotAssignable { .. })));
}

#[test]
fn non_exhaustive_match_reported() {
    let result = check_source(
        "enum Shape {\n  Circle(Float)\n  Point\n}\nfn f(s Shape) Int {\n  match s {\n    Point -> 0\n  }\n}",
    );
    let missing: Vec<_> = result
        .errors
        .iter()
        .filter_map(|e| match e {
            TypeError::NonExhaustiveMatch { missing, .. } => Some(missing.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec![vec!["Circle".to_string()]]);
}

#[test]
fn wildcard_makes_match_exhaustive() {
    check_ok(
        "enum Shape {\n  Circle(Float)\n  Point\n}\nfn f(s Shape) Int {\n  match s {\n    Point -> 0\n    else -> 1\n  }\n}",
    );
}

#[test]
fn or_pattern_binding_mismatch() {
    let result = check_source(
        "enum E {\n  A(Int)\n  B(Int)\n  C\n}\nfn f(e E) Int {\n  match e {\n    A(x) | B(y) -> 1\n    else -> 0\n  }\n}",
    );
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::OrPatternBindingMismatch { .. })));
}

#[test]
fn or_pattern_same_bindings_ok() {
    check_ok(
        "enum E {\n  A(Int)\n  B(Int)\n  C\n}\nfn f(e E) Int {\n  match e {\n    A(x) | B(x) -> x\n    else -> 0\n  }\n}",
    );
}

#[test]
fn ambiguous_variant_requires_qualification() {
    let result = check_source(
        "enum A {\n  Dot\n}\nenum B {\n  Dot\n}\nlet x = Dot",
    );
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::AmbiguousVariant { .. })));
}

#[test]
fn expected_type_disambiguates_variant() {
    check_ok("enum A {\n  Dot\n}\nenum B {\n  Dot\n}\nlet x A = Dot\nlet y B = Dot");
}

#[test]
fn error_value_outside_result_fn() {
    let result = check_source("fn f() Int {\n  error 'x'\n}");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::ErrorOutsideResultFn { .. })));
}

#[test]
fn or_on_non_failure_value() {
    let result = check_source("let x = 1 or 2");
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::InvalidOr { .. })));
}

#[test]
fn receiver_on_option_rejected() {
    let result = check_source(
        "fn find() ?Int { none }\nlet x = find() or err -> 0",
    );
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, TypeError::InvalidOrReceiver { .. })));
}

#[test]
fn span_types_cover_identifiers() {
    let result = check_ok("fn add(a Int, b Int) Int { a + b }");
    // The parameter `a` usage inside the body is Int.
    assert_eq!(result.type_at(1, 28), Some("Int"));
}
