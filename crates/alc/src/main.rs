//! The AL compiler CLI.
//!
//! Subcommands:
//!
//! - `alc run <file>` -- compile and execute; print the final value
//! - `alc check <file>` -- scan, parse, type-check
//! - `alc build <file>` -- scan and parse; print the reformatted program
//! - `alc fmt [<path>] [--check] [--stdin]` -- round-trip format
//! - `alc repl` -- interactive session
//! - `alc lsp` -- language server over stdio
//!
//! `--experimental-shitty-io` enables the file/network built-ins;
//! `--experimental-std-lib` prepends the embedded prelude.

mod stdlib;

use std::collections::HashSet;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use al_common::diagnostic::{render_all, Diagnostic};

#[derive(Parser)]
#[command(name = "alc", version, about = "The AL compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable the file and network built-ins.
    #[arg(long = "experimental-shitty-io", global = true)]
    shitty_io: bool,

    /// Prepend the embedded standard-library prelude.
    #[arg(long = "experimental-std-lib", global = true)]
    std_lib: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute a program, printing its final value
    Run { file: PathBuf },
    /// Scan, parse, and type-check without executing
    Check { file: PathBuf },
    /// Scan and parse, printing the reformatted program
    Build { file: PathBuf },
    /// Reformat a file in place (or stdin to stdout)
    Fmt {
        path: Option<PathBuf>,
        /// Exit non-zero when the output would differ, without writing.
        #[arg(long)]
        check: bool,
        /// Read from stdin and write the result to stdout.
        #[arg(long)]
        stdin: bool,
    },
    /// Start an interactive session
    Repl,
    /// Speak the language server protocol over stdio
    Lsp,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { ref file } => run(file, cli.shitty_io, cli.std_lib),
        Commands::Check { ref file } => check(file, cli.std_lib),
        Commands::Build { ref file } => build(file),
        Commands::Fmt {
            ref path,
            check,
            stdin,
        } => fmt(path.as_deref(), check, stdin),
        Commands::Repl => repl(cli.shitty_io, cli.std_lib),
        Commands::Lsp => lsp(),
    };
    match result {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

// ── Pipeline driver ────────────────────────────────────────────────────

/// Read a source file, splicing `import name` dependencies (include
/// semantics: `name.al` next to the importing file) ahead of it. Each
/// file is spliced at most once (diamond imports are fine); a cycle --
/// re-entering a file that is still being loaded -- is an error.
fn load_source(
    path: &Path,
    loaded: &mut HashSet<PathBuf>,
    in_progress: &mut Vec<PathBuf>,
) -> Result<String, String> {
    let canonical = path
        .canonicalize()
        .map_err(|e| format!("cannot open '{}': {}", path.display(), e))?;
    if in_progress.contains(&canonical) {
        return Err(format!("import cycle through '{}'", path.display()));
    }
    if !loaded.insert(canonical.clone()) {
        return Ok(String::new());
    }
    in_progress.push(canonical);

    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;

    let parse = al_parser::parse(&source);
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut spliced = String::new();
    for stmt in &parse.program.stmts {
        if let al_parser::ast::Stmt::Import(import) = stmt {
            let dep = dir.join(format!("{}.al", import.name));
            spliced.push_str(&load_source(&dep, loaded, in_progress)?);
            spliced.push('\n');
        }
    }
    spliced.push_str(&source);
    in_progress.pop();
    Ok(spliced)
}

fn load_program(path: &Path, std_lib: bool) -> Result<String, String> {
    let mut loaded = HashSet::new();
    let mut in_progress = Vec::new();
    let source = load_source(path, &mut loaded, &mut in_progress)?;
    if std_lib {
        Ok(format!("{}\n{}", stdlib::PRELUDE, source))
    } else {
        Ok(source)
    }
}

/// Report diagnostics; returns true when any error was printed.
fn report(diags: &[Diagnostic], source: &str, filename: &str) -> bool {
    if diags.is_empty() {
        return false;
    }
    let color = std::io::stderr().is_terminal();
    let (rendered, has_errors) = render_all(diags, source, filename, color);
    eprint!("{}", rendered);
    has_errors
}

fn run(file: &Path, io_enabled: bool, std_lib: bool) -> Result<ExitCode, String> {
    let source = load_program(file, std_lib)?;
    let filename = file.display().to_string();

    let parse = al_parser::parse(&source);
    if report(&parse.diagnostics, &source, &filename) {
        return Ok(ExitCode::FAILURE);
    }

    let typeck = al_typeck::check(&parse.program);
    if report(&typeck.diagnostics(), &source, &filename) {
        return Ok(ExitCode::FAILURE);
    }

    let program = al_codegen::compile(&typeck.program, &typeck.registry)
        .map_err(|e| e.to_string())?;

    let mut vm = al_vm::Vm::new(program);
    if io_enabled {
        vm.enable_io();
    }
    match vm.run() {
        Ok(al_bytecode::Value::None) => Ok(ExitCode::SUCCESS),
        Ok(value) => {
            println!("{}", value.inspect());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check(file: &Path, std_lib: bool) -> Result<ExitCode, String> {
    let source = load_program(file, std_lib)?;
    let filename = file.display().to_string();

    let parse = al_parser::parse(&source);
    let parse_failed = report(&parse.diagnostics, &source, &filename);

    let typeck = al_typeck::check(&parse.program);
    let typeck_failed = report(&typeck.diagnostics(), &source, &filename);

    if parse_failed || typeck_failed {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn build(file: &Path) -> Result<ExitCode, String> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read '{}': {}", file.display(), e))?;
    let filename = file.display().to_string();
    match al_fmt::format_source(&source) {
        Ok(formatted) => {
            print!("{}", formatted);
            Ok(ExitCode::SUCCESS)
        }
        Err(diags) => {
            report(&diags, &source, &filename);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn fmt(path: Option<&Path>, check_only: bool, stdin: bool) -> Result<ExitCode, String> {
    if stdin {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| format!("cannot read stdin: {}", e))?;
        return match al_fmt::format_source(&source) {
            Ok(formatted) => {
                if check_only {
                    if formatted == source {
                        Ok(ExitCode::SUCCESS)
                    } else {
                        Ok(ExitCode::FAILURE)
                    }
                } else {
                    print!("{}", formatted);
                    Ok(ExitCode::SUCCESS)
                }
            }
            Err(diags) => {
                report(&diags, &source, "<stdin>");
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let Some(path) = path else {
        return Err("fmt requires a path or --stdin".to_string());
    };
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let filename = path.display().to_string();

    match al_fmt::format_source(&source) {
        Ok(formatted) => {
            if check_only {
                if formatted == source {
                    Ok(ExitCode::SUCCESS)
                } else {
                    eprintln!("{} is not formatted", filename);
                    Ok(ExitCode::FAILURE)
                }
            } else {
                if formatted != source {
                    std::fs::write(path, &formatted)
                        .map_err(|e| format!("cannot write '{}': {}", filename, e))?;
                }
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(diags) => {
            // Never modify a file that does not parse.
            report(&diags, &source, &filename);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn repl(io_enabled: bool, std_lib: bool) -> Result<ExitCode, String> {
    let prelude = std_lib.then_some(stdlib::PRELUDE);
    al_repl::run(io_enabled, prelude).map_err(|e| e.to_string())?;
    Ok(ExitCode::SUCCESS)
}

fn lsp() -> Result<ExitCode, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    runtime.block_on(al_lsp::run_stdio());
    Ok(ExitCode::SUCCESS)
}
