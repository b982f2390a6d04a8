//! The embedded standard-library prelude.
//!
//! Enabled by `--experimental-std-lib`: the prelude source is prepended
//! to the user program and compiled with it, so its functions are
//! ordinary top-level declarations.

pub const PRELUDE: &str = "\
fn min(a Int, b Int) Int {
  if a < b { a } else { b }
}

fn max(a Int, b Int) Int {
  if a > b { a } else { b }
}

fn abs(n Int) Int {
  if n < 0 { 0 - n } else { n }
}

fn is_empty(xs [a]) Bool {
  len(xs) == 0
}

fn first(xs [a]) ?a {
  if len(xs) == 0 { none } else { xs[0] }
}

fn last(xs [a]) ?a {
  if len(xs) == 0 { none } else { xs[len(xs) - 1] }
}

fn contains(xs [a], target a) Bool {
  match xs {
    [] -> false
    [head, ..rest] -> if head == target { true } else { contains(rest, target) }
  }
}

fn repeat(s String, times Int) String {
  if times <= 0 { '' } else { s + repeat(s, times - 1) }
}

fn join(parts [String], sep String) String {
  match parts {
    [] -> ''
    [head, ..rest] -> if is_empty(rest) { head } else { head + sep + join(rest, sep) }
  }
}
";
