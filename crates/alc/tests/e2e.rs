//! End-to-end tests for the `alc` binary: each test writes an `.al`
//! source file, invokes the CLI, and asserts on stdout/stderr and exit
//! codes.

use std::path::PathBuf;
use std::process::Command;

fn alc() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_alc"))
}

struct CliOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

fn run_alc(args: &[&str]) -> CliOutput {
    let output = Command::new(alc())
        .args(args)
        .output()
        .expect("failed to invoke alc");
    CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    }
}

fn write_program(source: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("main.al");
    std::fs::write(&path, source).expect("write source");
    (dir, path)
}

// ── run ────────────────────────────────────────────────────────────────

#[test]
fn run_prints_final_value() {
    let (_dir, path) = write_program("1 + 2 * 3\n");
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "7\n");
}

#[test]
fn run_suppresses_none_result() {
    let (_dir, path) = write_program("print('hi')\n");
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(out.success);
    assert_eq!(out.stdout, "hi\n");
}

#[test]
fn run_reports_type_errors_with_location() {
    let (_dir, path) = write_program("let x = 1 + 'two'\n");
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(!out.success);
    assert!(out.stderr.contains("error:"), "stderr: {}", out.stderr);
    assert!(out.stderr.contains("-->"), "stderr: {}", out.stderr);
    assert!(out.stderr.contains("Found 1 error"), "stderr: {}", out.stderr);
}

#[test]
fn run_reports_runtime_errors() {
    let (_dir, path) = write_program("1 / 0\n");
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(!out.success);
    assert!(out.stderr.contains("division by zero"));
}

#[test]
fn run_full_program() {
    let source = "\
struct User {
  id Int
  name String
}

fn find(id Int) ?User {
  if id == 1 { User{ id: 1, name: 'admin' } } else { none }
}

let user = find(0) or User{ id: 0, name: 'guest' }
print(user.name)
user.id
";
    let (_dir, path) = write_program(source);
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "guest\n0\n");
}

#[test]
fn run_with_imports_splices_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("util.al"),
        "fn triple(x Int) Int { x * 3 }\n",
    )
    .unwrap();
    let main = dir.path().join("main.al");
    std::fs::write(&main, "import util\ntriple(14)\n").unwrap();

    let out = run_alc(&["run", main.to_str().unwrap()]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "42\n");
}

#[test]
fn run_import_cycle_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.al"), "import b\nlet x = 1\n").unwrap();
    std::fs::write(dir.path().join("b.al"), "import a\nlet y = 2\n").unwrap();
    let out = run_alc(&["run", dir.path().join("a.al").to_str().unwrap()]);
    assert!(!out.success);
    assert!(out.stderr.contains("import cycle"));
}

#[test]
fn io_builtin_without_flag_aborts() {
    let (_dir, path) = write_program("file_read('x') or err -> ''\n");
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(!out.success);
    assert!(out.stderr.contains("--experimental-shitty-io"));
}

#[test]
fn io_builtin_with_flag_works() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.txt");
    std::fs::write(&data, "hello file").unwrap();
    let main = dir.path().join("main.al");
    std::fs::write(
        &main,
        format!("file_read('{}') or err -> 'failed'\n", data.display()),
    )
    .unwrap();

    let out = run_alc(&[
        "run",
        main.to_str().unwrap(),
        "--experimental-shitty-io",
    ]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "hello file\n");
}

#[test]
fn std_lib_flag_enables_prelude() {
    let (_dir, path) = write_program("join(['a', 'b'], '+')\n");
    let without = run_alc(&["run", path.to_str().unwrap()]);
    assert!(!without.success);

    let with = run_alc(&["run", path.to_str().unwrap(), "--experimental-std-lib"]);
    assert!(with.success, "stderr: {}", with.stderr);
    assert_eq!(with.stdout, "a+b\n");
}

// ── check ──────────────────────────────────────────────────────────────

#[test]
fn check_passes_clean_programs() {
    let (_dir, path) = write_program("fn id(x a) a { x }\nid(1)\n");
    let out = run_alc(&["check", path.to_str().unwrap()]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert!(out.stdout.is_empty());
}

#[test]
fn check_fails_on_parse_error_and_keeps_reporting() {
    let (_dir, path) = write_program("fn broken( {\n}\nlet x = undefined_name\n");
    let out = run_alc(&["check", path.to_str().unwrap()]);
    assert!(!out.success);
    // Panic-mode recovery lets the checker still see the later statement.
    assert!(out.stderr.contains("undefined_name"), "stderr: {}", out.stderr);
}

#[test]
fn check_reports_non_exhaustive_match() {
    let source = "\
enum Shape {
  Circle(Float)
  Point
}

fn f(s Shape) Int {
  match s {
    Point -> 0
  }
}
";
    let (_dir, path) = write_program(source);
    let out = run_alc(&["check", path.to_str().unwrap()]);
    assert!(!out.success);
    assert!(out.stderr.contains("non-exhaustive"), "stderr: {}", out.stderr);
    assert!(out.stderr.contains("Circle"));
}

// ── build ──────────────────────────────────────────────────────────────

#[test]
fn build_prints_reformatted_program() {
    let (_dir, path) = write_program("let x=1+2\n");
    let out = run_alc(&["build", path.to_str().unwrap()]);
    assert!(out.success);
    assert_eq!(out.stdout, "let x = 1 + 2\n");
}

// ── fmt ────────────────────────────────────────────────────────────────

#[test]
fn fmt_rewrites_file_in_place() {
    let (_dir, path) = write_program("let x=1\n");
    let out = run_alc(&["fmt", path.to_str().unwrap()]);
    assert!(out.success);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "let x = 1\n");
}

#[test]
fn fmt_check_detects_unformatted_files() {
    let (_dir, path) = write_program("let x=1\n");
    let out = run_alc(&["fmt", path.to_str().unwrap(), "--check"]);
    assert!(!out.success);
    // --check never modifies the file.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "let x=1\n");

    let (_dir2, formatted) = write_program("let x = 1\n");
    let out = run_alc(&["fmt", formatted.to_str().unwrap(), "--check"]);
    assert!(out.success);
}

#[test]
fn fmt_refuses_files_with_parse_errors() {
    let (_dir, path) = write_program("fn broken( {\n");
    let before = std::fs::read_to_string(&path).unwrap();
    let out = run_alc(&["fmt", path.to_str().unwrap()]);
    assert!(!out.success);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn fmt_is_idempotent_via_cli() {
    let (_dir, path) = write_program("fn  f ( a Int )Int{\na+1\n}\n");
    assert!(run_alc(&["fmt", path.to_str().unwrap()]).success);
    let once = std::fs::read_to_string(&path).unwrap();
    assert!(run_alc(&["fmt", path.to_str().unwrap()]).success);
    let twice = std::fs::read_to_string(&path).unwrap();
    assert_eq!(once, twice);
}

// ── scenarios from the language reference ──────────────────────────────

#[test]
fn scenario_error_receiver() {
    let source = "\
struct DivisionError {
  message String
}

fn divide(a Int, b Int) Int!DivisionError {
  if b == 0 {
    error DivisionError{ message: 'division by zero' }
  } else {
    a / b
  }
}

divide(10, 0) or err -> 0
";
    let (_dir, path) = write_program(source);
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "0\n");
}

#[test]
fn scenario_tail_recursion() {
    let source = "\
fn count(n Int) String {
  if n == 0 { 'done' } else { count(n - 1) }
}

count(100000)
";
    let (_dir, path) = write_program(source);
    let out = run_alc(&["run", path.to_str().unwrap()]);
    assert!(out.success, "stderr: {}", out.stderr);
    assert_eq!(out.stdout, "done\n");
}
