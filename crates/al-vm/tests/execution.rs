//! End-to-end execution tests: source -> tokens -> AST -> typed AST ->
//! bytecode -> value.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use al_bytecode::value::values_equal;
use al_bytecode::Value;
use al_vm::{RuntimeError, Vm};

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn compile(source: &str) -> al_bytecode::Program {
    let parse = al_parser::parse(source);
    assert!(
        !parse.has_errors(),
        "parse errors: {:?}",
        parse.diagnostics
    );
    let typeck = al_typeck::check(&parse.program);
    assert!(!typeck.has_errors(), "type errors: {:?}", typeck.errors);
    al_codegen::compile(&typeck.program, &typeck.registry).expect("lowering failed")
}

fn run(source: &str) -> Value {
    let program = compile(source);
    Vm::new(program).run().expect("execution failed")
}

fn run_err(source: &str) -> RuntimeError {
    let program = compile(source);
    Vm::new(program).run().expect_err("expected a runtime error")
}

fn run_with_output(source: &str) -> (Value, String) {
    let program = compile(source);
    let buf = SharedBuf::default();
    let value = Vm::with_output(program, Box::new(buf.clone()))
        .run()
        .expect("execution failed");
    (value, buf.contents())
}

fn assert_value(actual: &Value, expected: &Value) {
    assert!(
        values_equal(actual, expected),
        "expected {}, got {}",
        expected.inspect_nested(),
        actual.inspect_nested()
    );
}

// ── The six end-to-end scenarios ───────────────────────────────────────

#[test]
fn scenario_arithmetic() {
    assert_value(&run("1 + 2 * 3"), &Value::Int(7));
}

#[test]
fn scenario_optional_fallback() {
    let result = run(
        "struct User {\n  id Int\n  name String\n}\nfn find(id Int) ?User {\n  if id == 1 { User{ id: 1, name: 'admin' } } else { none }\n}\nfind(0) or User{ id: 0, name: 'guest' }",
    );
    let Value::Struct(s) = &result else {
        panic!("expected struct, got {}", result.inspect_nested());
    };
    assert_eq!(s.type_name, "User");
    assert_value(s.field("id").unwrap(), &Value::Int(0));
    assert_value(s.field("name").unwrap(), &Value::str("guest"));
}

#[test]
fn scenario_error_fallback_with_receiver() {
    let result = run(
        "struct DivisionError {\n  message String\n}\nfn divide(a Int, b Int) Int!DivisionError {\n  if b == 0 {\n    error DivisionError{ message: 'division by zero' }\n  } else {\n    a / b\n  }\n}\ndivide(10, 0) or err -> 0",
    );
    assert_value(&result, &Value::Int(0));
}

#[test]
fn scenario_pattern_matching_on_literal_payload() {
    let result = run(
        "enum Outcome {\n  Ok(String)\n  Err(String)\n}\nmatch Ok('special') {\n  Ok('special') -> 'A'\n  Ok(x) -> 'B'\n  Err(e) -> 'C'\n}",
    );
    assert_value(&result, &Value::str("A"));
}

#[test]
fn scenario_generic_identity() {
    assert_value(
        &run("fn identity(x a) a { x }\nidentity('hi')"),
        &Value::str("hi"),
    );
    assert_value(&run("fn identity(x a) a { x }\nidentity(42)"), &Value::Int(42));
}

#[test]
fn scenario_tail_recursion_does_not_grow_frames() {
    let result = run(
        "fn count(n Int) String {\n  if n == 0 { 'done' } else { count(n - 1) }\n}\ncount(100000)",
    );
    assert_value(&result, &Value::str("done"));
}

// ── Language behavior ──────────────────────────────────────────────────

#[test]
fn float_widening() {
    assert_value(&run("1 + 2.5"), &Value::Float(3.5));
    assert_value(&run("2.0 * 3"), &Value::Float(6.0));
}

#[test]
fn string_concat_with_plus() {
    assert_value(&run("'foo' + 'bar'"), &Value::str("foobar"));
}

#[test]
fn short_circuit_and_or() {
    // The right operand would divide by zero if evaluated.
    assert_value(
        &run("fn boom() Bool { 1 / 0 == 0 }\nfalse && boom()"),
        &Value::Bool(false),
    );
    assert_value(
        &run("fn boom() Bool { 1 / 0 == 0 }\ntrue || boom()"),
        &Value::Bool(true),
    );
}

#[test]
fn if_without_else_yields_none() {
    assert_value(&run("if false { 1 }"), &Value::None);
}

#[test]
fn block_value_is_last_expression() {
    assert_value(&run("let x = {\n  let y = 2\n  y * 3\n}\nx"), &Value::Int(6));
}

#[test]
fn closures_capture_by_value() {
    let result = run(
        "fn make_adder(n Int) fn(Int) Int {\n  fn(x) { x + n }\n}\nlet add5 = make_adder(5)\nadd5(37)",
    );
    assert_value(&result, &Value::Int(42));
}

#[test]
fn closure_self_recursion_via_push_self() {
    let result = run(
        "let base = 1\nfn fact(n Int) Int {\n  if n <= base { 1 } else { n * fact(n - 1) }\n}\nfact(5)",
    );
    // `fact` captures `base`, so self-recursion goes through push_self.
    assert_value(&result, &Value::Int(120));
}

#[test]
fn mutual_recursion_between_top_level_fns() {
    let result = run(
        "fn is_even(n Int) Bool {\n  if n == 0 { true } else { is_odd(n - 1) }\n}\nfn is_odd(n Int) Bool {\n  if n == 0 { false } else { is_even(n - 1) }\n}\nis_even(10)",
    );
    assert_value(&result, &Value::Bool(true));
}

#[test]
fn match_ranges_and_wildcard() {
    let source = |n: i64| {
        format!(
            "fn label(n Int) String {{\n  match n {{\n    0 -> 'zero'\n    1..10 -> 'small'\n    else -> 'big'\n  }}\n}}\nlabel({})",
            n
        )
    };
    assert_value(&run(&source(0)), &Value::str("zero"));
    assert_value(&run(&source(5)), &Value::str("small"));
    assert_value(&run(&source(10)), &Value::str("big"));
    assert_value(&run(&source(-3)), &Value::str("big"));
}

#[test]
fn match_or_pattern_binds_shared_name() {
    let result = run(
        "enum E {\n  A(Int)\n  B(Int)\n  C\n}\nfn get(e E) Int {\n  match e {\n    A(x) | B(x) -> x\n    C -> 0\n  }\n}\nget(B(9)) + get(A(1))",
    );
    assert_value(&result, &Value::Int(10));
}

#[test]
fn match_tuple_and_array_patterns() {
    assert_value(
        &run("match (1, 'a') {\n  (1, x) -> x\n  else -> 'no'\n}"),
        &Value::str("a"),
    );
    let result = run(
        "match [1, 2, 3, 4] {\n  [first, ..rest] -> first + len(rest)\n  else -> 0\n}",
    );
    assert_value(&result, &Value::Int(4));
}

#[test]
fn match_fall_through_yields_none() {
    assert_value(&run("match 5 {\n  1 -> 'one'\n}"), &Value::None);
}

#[test]
fn enum_equality_respects_payloads() {
    assert_value(
        &run("enum E {\n  V(Int)\n  W\n}\nV(1) == V(1)"),
        &Value::Bool(true),
    );
    assert_value(
        &run("enum E {\n  V(Int)\n  W\n}\nV(1) == V(2)"),
        &Value::Bool(false),
    );
}

#[test]
fn propagate_returns_failure_to_caller() {
    let result = run(
        "fn inner(flag Bool) Int!String {\n  if flag { error 'bad' } else { 3 }\n}\nfn outer(flag Bool) Int!String {\n  inner(flag)! * 2\n}\nouter(false) or err -> 0 - 1",
    );
    assert_value(&result, &Value::Int(6));

    let result = run(
        "fn inner(flag Bool) Int!String {\n  if flag { error 'bad' } else { 3 }\n}\nfn outer(flag Bool) Int!String {\n  inner(flag)! * 2\n}\nouter(true) or err -> 0 - 1",
    );
    assert_value(&result, &Value::Int(-1));
}

#[test]
fn or_receiver_binds_error_payload() {
    let result = run(
        "fn fail() Int!String {\n  error 'oops'\n}\nfail() or err -> len(str_split(err, ''))",
    );
    assert_value(&result, &Value::Int(4));
}

#[test]
fn option_propagation() {
    let result = run(
        "fn first(xs [Int]) ?Int {\n  if len(xs) == 0 { none } else { xs[0] }\n}\nfn double_first(xs [Int]) ?Int {\n  first(xs)! * 2\n}\ndouble_first([21]) or 0",
    );
    assert_value(&result, &Value::Int(42));
    let result = run(
        "fn first(xs [Int]) ?Int {\n  if len(xs) == 0 { none } else { xs[0] }\n}\nfn double_first(xs [Int]) ?Int {\n  first(xs)! * 2\n}\ndouble_first([]) or 0",
    );
    assert_value(&result, &Value::Int(0));
}

#[test]
fn string_interpolation() {
    let result = run("let name = 'world'\nlet n = 3\n'hello $name $n'");
    assert_value(&result, &Value::str("hello world 3"));
}

#[test]
fn array_spread_and_concat() {
    let result = run("let a = [1, 2]\nlet b = [..a, 3, 4]\nlen(b)");
    assert_value(&result, &Value::Int(4));
    let result = run("let a = [1, 2]\nlet b = [..a, 3]\nb[2]");
    assert_value(&result, &Value::Int(3));
}

#[test]
fn range_produces_half_open_array() {
    assert_value(&run("len(0..5)"), &Value::Int(5));
    assert_value(&run("let r = 2..5\nr[0]"), &Value::Int(2));
    assert_value(&run("len(3..3)"), &Value::Int(0));
}

#[test]
fn tuple_indexing() {
    assert_value(&run("let pair = (7, 'x')\npair.0"), &Value::Int(7));
    assert_value(&run("let pair = (7, 'x')\npair.1"), &Value::str("x"));
}

#[test]
fn tuple_destructuring_in_let() {
    assert_value(&run("let (a, b) = (3, 4)\na * b"), &Value::Int(12));
}

#[test]
fn assignment_updates_local() {
    assert_value(&run("let x = 1\nx = x + 41\nx"), &Value::Int(42));
}

#[test]
fn builtin_as_first_class_value() {
    let result = run(
        "fn apply(f fn(String) String, x String) String { f(x) }\napply(to_string, 'ok')",
    );
    assert_value(&result, &Value::str("ok"));
}

#[test]
fn higher_order_functions() {
    let result = run(
        "fn map_one(f fn(Int) Int, x Int) Int { f(x) }\nmap_one(fn(n) { n * n }, 9)",
    );
    assert_value(&result, &Value::Int(81));
}

#[test]
fn generic_struct_round_trip() {
    let result = run(
        "struct Box(t) {\n  value t\n}\nfn unbox(b Box(Int)) Int { b.value }\nunbox(Box{ value: 99 })",
    );
    assert_value(&result, &Value::Int(99));
}

#[test]
fn print_writes_inspected_values() {
    let (value, output) = run_with_output(
        "print(1 + 1)\nprint('plain')\nprint(['a', 'b'])\nprint(none)",
    );
    assert_value(&value, &Value::None);
    assert_eq!(output, "2\nplain\n['a', 'b']\nnone\n");
}

#[test]
fn print_struct_and_enum_rendering() {
    let (_, output) = run_with_output(
        "struct User {\n  id Int\n  name String\n}\nenum Shape {\n  Circle(Float)\n  Point\n}\nprint(User{ id: 0, name: 'guest' })\nprint(Circle(1.5))\nprint(Shape.Point)",
    );
    assert_eq!(
        output,
        "User{ id: 0, name: 'guest' }\nShape.Circle(1.5)\nShape.Point\n"
    );
}

#[test]
fn assert_failure_becomes_error_value() {
    let result = run("fn check(n Int) Int!String {\n  assert n > 0\n  n\n}\ncheck(0 - 5) or err -> 0 - 1");
    assert_value(&result, &Value::Int(-1));
    let result = run("fn check(n Int) Int!String {\n  assert n > 0\n  n\n}\ncheck(5) or err -> 0 - 1");
    assert_value(&result, &Value::Int(5));
}

#[test]
fn const_values_are_visible() {
    assert_value(&run("const LIMIT = 40\nLIMIT + 2"), &Value::Int(42));
}

#[test]
fn shadowing_in_nested_blocks() {
    let result = run("let x = 1\nlet y = {\n  let x = 2\n  x\n}\nx + y");
    assert_value(&result, &Value::Int(3));
}

// ── Runtime errors ─────────────────────────────────────────────────────

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = run_err("1 / 0");
    assert!(err.message.contains("division by zero"));
}

#[test]
fn array_out_of_bounds() {
    let err = run_err("let xs = [1]\nxs[3]");
    assert!(err.message.contains("out of bounds"));
}

#[test]
fn io_requires_flag() {
    let err = run_err("file_read('/tmp/x') or err -> ''");
    assert!(err.message.contains("--experimental-shitty-io"));
}

#[test]
fn io_failure_surfaces_as_error_value_when_enabled() {
    let program = compile("file_read('/definitely/missing/path') or err -> 'fallback'");
    let mut vm = Vm::new(program);
    vm.enable_io();
    let value = vm.run().expect("run failed");
    assert_value(&value, &Value::str("fallback"));
}

#[test]
fn tcp_requires_io_flag() {
    let err = run_err("tcp_listen(4096) or err -> 0");
    assert!(err.message.contains("--experimental-shitty-io"));
}

#[test]
fn tcp_error_values_surface_through_or() {
    let program = compile("tcp_read(99) or err -> err");
    let mut vm = Vm::new(program);
    vm.enable_io();
    let value = vm.run().expect("run failed");
    let Value::Str(message) = &value else {
        panic!("expected a string, got {}", value.inspect_nested());
    };
    assert!(
        message.contains("unknown socket"),
        "unexpected message: {}",
        message
    );
}

#[test]
fn tcp_round_trip_with_io_enabled() {
    let port: u16 = 47631;
    let source = format!(
        "let listener = tcp_listen({port}) or err -> 0\n\
         let conn = tcp_accept(listener) or err -> 0\n\
         let data = tcp_read(conn) or err -> ''\n\
         tcp_write(conn, str_concat('pong:', data))\n\
         tcp_close(conn)\n\
         tcp_close(listener)\n\
         data"
    );
    let program = compile(&source);

    // The client runs on its own thread; the VM itself stays
    // single-threaded and blocks inside accept/read.
    let client = std::thread::spawn(move || {
        use std::io::{Read, Write};
        let mut stream = None;
        for _ in 0..100 {
            match std::net::TcpStream::connect(("127.0.0.1", port)) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(50)),
            }
        }
        let mut stream = stream.expect("server never started listening");
        stream.write_all(b"ping").unwrap();
        let mut reply = Vec::new();
        // The server closes the connection after writing, so read to EOF.
        stream.read_to_end(&mut reply).unwrap();
        String::from_utf8_lossy(&reply).into_owned()
    });

    let mut vm = Vm::new(program);
    vm.enable_io();
    let value = vm.run().expect("run failed");
    assert_value(&value, &Value::str("ping"));
    assert_eq!(client.join().unwrap(), "pong:ping");
}

#[test]
fn file_round_trip_with_io_enabled() {
    let dir = std::env::temp_dir().join(format!("al-vm-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("data.txt");
    let source = format!(
        "file_write('{p}', 'payload') or err -> none\nfile_read('{p}') or err -> ''",
        p = path.display()
    );
    let program = compile(&source);
    let mut vm = Vm::new(program);
    vm.enable_io();
    let value = vm.run().expect("run failed");
    assert_value(&value, &Value::str("payload"));
    let _ = std::fs::remove_dir_all(&dir);
}
