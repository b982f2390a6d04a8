//! Lowering-shape tests: instruction patterns the compiler must emit.

use al_bytecode::{Op, Program, Value};

fn compile(source: &str) -> Program {
    let parse = al_parser::parse(source);
    assert!(!parse.has_errors(), "parse errors: {:?}", parse.diagnostics);
    let typeck = al_typeck::check(&parse.program);
    assert!(!typeck.has_errors(), "type errors: {:?}", typeck.errors);
    al_codegen::compile(&typeck.program, &typeck.registry).expect("lowering failed")
}

fn ops(program: &Program) -> Vec<Op> {
    program.code.iter().map(|i| i.op).collect()
}

#[test]
fn tail_position_call_becomes_tail_call() {
    let program = compile(
        "fn count(n Int) String {\n  if n == 0 { 'done' } else { count(n - 1) }\n}\ncount(3)",
    );
    let ops = ops(&program);
    assert!(ops.contains(&Op::TailCall), "expected a tail_call");
    // The top-level invocation is not in tail position.
    assert!(ops.contains(&Op::Call));
}

#[test]
fn non_tail_recursion_uses_plain_call() {
    let program = compile(
        "fn fact(n Int) Int {\n  if n <= 1 { 1 } else { n * fact(n - 1) }\n}\nfact(4)",
    );
    // `n * fact(..)` keeps the multiply pending, so no tail call exists.
    assert!(!ops(&program).contains(&Op::TailCall));
}

#[test]
fn capture_count_matches_discovered_captures() {
    let program = compile(
        "fn make_adder(n Int) fn(Int) Int {\n  fn(x) { x + n }\n}\nmake_adder(2)",
    );
    let inner = program
        .functions
        .iter()
        .find(|f| f.name == "<fn>")
        .expect("closure function");
    assert_eq!(inner.capture_count, 1);
    // Exactly one make_closure references the inner function and will pop
    // one capture.
    let closures = program
        .code
        .iter()
        .filter(|i| i.op == Op::MakeClosure)
        .count();
    assert!(closures >= 1);
}

#[test]
fn self_contained_fns_have_no_captures() {
    let program = compile(
        "fn is_even(n Int) Bool {\n  if n == 0 { true } else { is_odd(n - 1) }\n}\nfn is_odd(n Int) Bool {\n  if n == 0 { false } else { is_even(n - 1) }\n}\nis_even(4)",
    );
    for func in &program.functions {
        if func.name == "is_even" || func.name == "is_odd" {
            assert_eq!(func.capture_count, 0, "{} must not capture", func.name);
        }
    }
}

#[test]
fn or_lowering_uses_dup_is_failure() {
    let program = compile("fn find() ?Int { none }\nfind() or 9");
    let ops = ops(&program);
    let dup_then_failure = ops
        .windows(3)
        .any(|w| w == [Op::Dup, Op::IsFailure, Op::JumpIfFalse]);
    assert!(dup_then_failure, "or must lower via dup; is_failure; jump_if_false");
}

#[test]
fn propagate_lowering_returns_failure_unmodified() {
    let program = compile(
        "fn inner() Int!String { 3 }\nfn outer() Int!String { inner()! + 1 }\nouter() or err -> 0",
    );
    let ops = ops(&program);
    let shape = ops
        .windows(4)
        .any(|w| w == [Op::Dup, Op::IsFailure, Op::JumpIfFalse, Op::Ret]);
    assert!(shape, "x! must lower to dup; is_failure; jump_if_false skip; ret");
}

#[test]
fn short_circuit_uses_conditional_jumps() {
    let program = compile("true && false");
    let ops1 = ops(&program);
    assert!(ops1
        .windows(2)
        .any(|w| w == [Op::Dup, Op::JumpIfFalse]));

    let program2 = compile("false || true");
    let ops2 = ops(&program2);
    assert!(ops2.windows(2).any(|w| w == [Op::Dup, Op::JumpIfTrue]));
}

#[test]
fn match_fall_through_emits_pop_push_none() {
    let program = compile("match 1 {\n  2 -> 'two'\n}");
    let ops = ops(&program);
    assert!(ops.windows(2).any(|w| w == [Op::Pop, Op::PushNone]));
}

#[test]
fn constants_are_deduplicated() {
    let program = compile("let a = 'same'\nlet b = 'same'\nlet c = 7\nlet d = 7\na");
    let same_count = program
        .constants
        .iter()
        .filter(|c| matches!(c, Value::Str(s) if s.as_str() == "same"))
        .count();
    assert_eq!(same_count, 1);
    let seven_count = program
        .constants
        .iter()
        .filter(|c| matches!(c, Value::Int(7)))
        .count();
    assert_eq!(seven_count, 1);
}

#[test]
fn jump_targets_are_absolute_and_in_range() {
    let program = compile(
        "fn label(n Int) String {\n  match n {\n    0 -> 'zero'\n    1..10 -> 'small'\n    else -> 'big'\n  }\n}\nlabel(5)",
    );
    for instr in &program.code {
        if matches!(instr.op, Op::Jump | Op::JumpIfFalse | Op::JumpIfTrue) {
            assert!(
                (instr.operand as usize) <= program.code.len(),
                "jump target {} out of range",
                instr.operand
            );
        }
    }
}

#[test]
fn entry_function_is_recorded() {
    let program = compile("1 + 1");
    let entry = &program.functions[program.entry];
    assert_eq!(entry.name, "<main>");
    assert_eq!(entry.arity, 0);
    assert_eq!(program.code[entry.code_start + entry.code_len - 1].op, Op::Halt);
}

#[test]
fn builtin_calls_compile_to_opcodes() {
    let program = compile("print('x')");
    let ops = ops(&program);
    assert!(ops.contains(&Op::Print));
    // No call instruction is needed for a direct built-in invocation.
    assert!(!ops.contains(&Op::Call));
}

#[test]
fn shadowed_builtin_uses_local_not_opcode() {
    let program = compile("fn own() Int {\n  let print = 5\n  print + 1\n}\nown()");
    // The body's `print` is a local; the Print opcode must not appear.
    assert!(!ops(&program).contains(&Op::Print));
}
