//! REPL session state.
//!
//! Accumulates top-level declarations across inputs so later expressions
//! can reference earlier definitions. Each complete input is re-checked
//! against the accumulated block, but only the fresh portion runs: the
//! new statements are lowered as an appended chunk of the entry function
//! (via [`SessionCompiler`]) and executed on a persistent [`Vm`] whose
//! entry-frame locals carry earlier bindings forward. Persisted
//! initializers and their side effects therefore never replay.

use al_codegen::SessionCompiler;
use al_parser::ast::Stmt;
use al_vm::Vm;

/// Persistent state for a REPL session.
pub struct Session {
    /// Accumulated declaration source, in entry order.
    definitions: Vec<String>,
    /// Number of inputs evaluated so far.
    eval_counter: u64,
    /// Whether the file/network built-ins are enabled.
    pub io_enabled: bool,
    /// Lowering state shared by every chunk.
    compiler: SessionCompiler,
    /// The VM executing the chunks; created on first evaluation.
    vm: Option<Vm>,
    /// How many typed top-level statements have already been lowered and
    /// executed (the accumulated block's prefix in the next check).
    executed_stmts: usize,
}

impl Session {
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            eval_counter: 0,
            io_enabled: false,
            compiler: SessionCompiler::new(),
            vm: None,
            executed_stmts: 0,
        }
    }

    /// All accumulated definitions as a single source block.
    pub fn definitions_source(&self) -> String {
        self.definitions.join("\n")
    }

    pub fn eval_counter(&self) -> u64 {
        self.eval_counter
    }

    /// Clear all accumulated state, dropping the VM and its bindings.
    pub fn reset(&mut self) {
        self.definitions.clear();
        self.eval_counter = 0;
        self.compiler = SessionCompiler::new();
        self.vm = None;
        self.executed_stmts = 0;
    }

    /// Evaluate one complete input against the accumulated definitions.
    ///
    /// The accumulated block plus the input is re-checked as a whole;
    /// on success only the input's statements are lowered and executed.
    /// The rendered result value is returned (`None` when the result is
    /// `none` or the input was purely declarations), and inputs
    /// containing declarations are added to the session. On failure the
    /// rendered diagnostics are returned and nothing is persisted.
    pub fn evaluate(&mut self, input: &str) -> Result<Option<String>, String> {
        self.eval_counter += 1;

        let mut source = self.definitions_source();
        if !source.is_empty() {
            source.push('\n');
        }
        source.push_str(input);

        let parse = al_parser::parse(&source);
        if parse.has_errors() {
            let (rendered, _) = al_common::diagnostic::render_all(
                &parse.diagnostics,
                &source,
                "<repl>",
                false,
            );
            return Err(rendered);
        }

        let typeck = al_typeck::check(&parse.program);
        if typeck.has_errors() {
            let (rendered, _) = al_common::diagnostic::render_all(
                &typeck.diagnostics(),
                &source,
                "<repl>",
                false,
            );
            return Err(rendered);
        }

        // Lower only the statements past the already-executed prefix.
        let fresh = typeck
            .program
            .stmts
            .get(self.executed_stmts..)
            .unwrap_or(&[]);
        let (program, resume) = self
            .compiler
            .append(fresh, &typeck.registry)
            .map_err(|e| e.to_string())?;

        if let Some(vm) = self.vm.as_mut() {
            vm.swap_program(program);
        } else {
            let mut vm = Vm::new(program);
            if self.io_enabled {
                vm.enable_io();
            }
            self.vm = Some(vm);
        }
        let vm = self.vm.as_mut().expect("vm was just created");
        let value = vm.run_from(resume).map_err(|e| e.to_string())?;

        // Persist inputs that declare things for future evaluations.
        let input_parse = al_parser::parse(input);
        if input_parse
            .program
            .stmts
            .iter()
            .any(Self::stmt_is_declaration)
        {
            self.definitions.push(input.to_string());
            self.executed_stmts = typeck.program.stmts.len();
        }

        match value {
            al_bytecode::Value::None => Ok(None),
            other => Ok(Some(other.inspect_nested())),
        }
    }

    fn stmt_is_declaration(stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Fn(_)
            | Stmt::Struct(_)
            | Stmt::Enum(_)
            | Stmt::Const(_)
            | Stmt::Let(_)
            | Stmt::Import(_) => true,
            Stmt::Export(inner, _) => Self::stmt_is_declaration(inner),
            _ => false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
