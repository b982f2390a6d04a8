//! Interactive REPL loop for AL.
//!
//! Reads lines with `rustyline`, detects unfinished input (unclosed
//! delimiters or an unterminated string) for multiline continuation, and
//! evaluates each complete input against the session's accumulated
//! definitions.

mod session;

pub use session::Session;

use al_common::token::TokenKind;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Whether the input needs more lines before it can be evaluated.
///
/// True when delimiters are unbalanced or a string literal is left open.
pub fn is_incomplete(input: &str) -> bool {
    let (tokens, diagnostics) = al_lexer::Scanner::tokenize(input);
    if diagnostics
        .iter()
        .any(|d| d.message.contains("unterminated string"))
    {
        return true;
    }
    let mut depth: i64 = 0;
    for token in &tokens {
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}

/// Run the interactive loop until `:quit` or end-of-input.
///
/// `prelude` is an optional source block (the standard library) loaded
/// into the session before the first prompt.
pub fn run(io_enabled: bool, prelude: Option<&str>) -> Result<(), ReadlineError> {
    let mut editor = DefaultEditor::new()?;
    let mut session = Session::new();
    session.io_enabled = io_enabled;
    if let Some(prelude) = prelude {
        if let Err(message) = session.evaluate(prelude) {
            eprint!("{}", ensure_newline(message));
        }
    }

    println!("AL repl -- :quit to exit, :reset to clear the session");

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "al> " } else { "..> " };
        match editor.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    match line.trim() {
                        ":quit" | ":exit" => break,
                        ":reset" => {
                            session.reset();
                            println!("session cleared");
                            continue;
                        }
                        "" => continue,
                        _ => {}
                    }
                }

                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if is_incomplete(&buffer) {
                    continue;
                }

                let input = std::mem::take(&mut buffer);
                let _ = editor.add_history_entry(input.replace('\n', " "));
                match session.evaluate(&input) {
                    Ok(Some(rendered)) => println!("{}", rendered),
                    Ok(None) => {}
                    Err(message) => eprint!("{}", ensure_newline(message)),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C drops any pending multiline input.
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn ensure_newline(mut s: String) -> String {
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_input_is_complete() {
        assert!(!is_incomplete("1 + 2"));
        assert!(!is_incomplete("fn f() Int { 1 }"));
    }

    #[test]
    fn unclosed_brackets_continue() {
        assert!(is_incomplete("fn f() Int {"));
        assert!(is_incomplete("let xs = [1, 2,"));
        assert!(is_incomplete("f(1,"));
    }

    #[test]
    fn unterminated_string_continues() {
        assert!(is_incomplete("let s = 'oops"));
    }

    #[test]
    fn extra_closers_do_not_hang() {
        // Malformed, but complete: let the parser report it.
        assert!(!is_incomplete("}"));
    }
}
