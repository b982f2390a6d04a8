//! The lowering pass itself.
//!
//! One flat instruction stream: function bodies are emitted inline behind
//! an unconditional jump, and the function table records their
//! `code_start`. Top-level functions whose only free names are other
//! top-level functions and built-ins compile to direct `make_closure`
//! references (so mutual recursion needs no capture slots); everything
//! else lives in local slots and is captured by value at closure
//! creation.

use rustc_hash::{FxHashMap, FxHashSet};

use al_bytecode::value::values_equal;
use al_bytecode::{Function, Instruction, Op, Program, Value};
use al_common::span::Span;
use al_parser::ast::{BinaryOp, UnaryOp};
use al_typeck::registry::TypeRegistry;
use al_typeck::typed::{
    TArrayElem, TExpr, TFnDecl, TParam, TPattern, TProgram, TStmt, TStrPart,
};

use crate::free_vars::fn_free_vars;
use crate::CompileError;

/// Built-in name -> opcode and arity.
fn builtin(name: &str) -> Option<(Op, usize)> {
    match name {
        "print" => Some((Op::Print, 1)),
        "to_string" => Some((Op::ToString, 1)),
        "len" => Some((Op::ArrayLen, 1)),
        "str_concat" => Some((Op::StrConcat, 2)),
        "str_split" => Some((Op::StrSplit, 2)),
        "file_read" => Some((Op::FileRead, 1)),
        "file_write" => Some((Op::FileWrite, 2)),
        "tcp_listen" => Some((Op::TcpListen, 1)),
        "tcp_accept" => Some((Op::TcpAccept, 1)),
        "tcp_read" => Some((Op::TcpRead, 1)),
        "tcp_write" => Some((Op::TcpWrite, 2)),
        "tcp_close" => Some((Op::TcpClose, 1)),
        _ => None,
    }
}

/// How a name resolves at the current compilation point.
enum NameKind {
    Local(usize),
    Capture(usize),
    /// The name of the function currently being compiled.
    SelfRef,
    /// Found in an enclosing function's scope; becomes a capture.
    Outer,
    /// A self-contained top-level function.
    GlobalFn(usize),
    Builtin(Op, usize),
    Unknown,
}

/// Per-function compilation state.
struct FnScope {
    /// Slot index -> name. Dead (block-exited) slots hold an empty name.
    locals: Vec<String>,
    /// Watermarks for lexical blocks inside the function.
    block_marks: Vec<usize>,
    /// Ordered capture list; `capture_count` is its final length.
    captures: Vec<String>,
    /// Name bound to this function, for `push_self`.
    binding_name: Option<String>,
}

pub fn compile(program: &TProgram, registry: &TypeRegistry) -> Result<Program, CompileError> {
    let mut session = SessionCompiler::new();
    let (compiled, _) = session.append(&program.stmts, registry)?;
    Ok(compiled)
}

/// A compiler whose state persists across inputs, for the REPL.
///
/// Each [`append`](SessionCompiler::append) call lowers a batch of
/// top-level statements as a new chunk of the entry function's body,
/// ending in `halt`. Constants, function indices, and entry local slots
/// are append-only, so values produced by earlier chunks (closures
/// included) stay valid against every later program snapshot, and a VM
/// can resume its entry frame at the new chunk without re-running
/// anything.
pub struct SessionCompiler {
    constants: Vec<Value>,
    functions: Vec<Function>,
    code: Vec<Instruction>,
    scopes: Vec<FnScope>,
    /// Function-table index for every top-level `fn`.
    top_fn_indices: FxHashMap<String, usize>,
    /// Top-level functions referenced via direct `make_closure`.
    global_fns: FxHashSet<String>,
    /// Lazily generated wrapper functions for built-ins used as values.
    wrappers: FxHashMap<String, usize>,
    temp_counter: usize,
    /// Declared field count per struct id, for lowering sanity checks.
    struct_field_counts: FxHashMap<u32, usize>,
}

impl SessionCompiler {
    pub fn new() -> Self {
        let mut compiler = SessionCompiler {
            constants: Vec::new(),
            functions: Vec::new(),
            code: Vec::new(),
            scopes: Vec::new(),
            top_fn_indices: FxHashMap::default(),
            global_fns: FxHashSet::default(),
            wrappers: FxHashMap::default(),
            temp_counter: 0,
            struct_field_counts: FxHashMap::default(),
        };
        // The entry function is always index 0; its body grows chunk by
        // chunk and its scope lives for the whole session.
        compiler.push_placeholder_fn("<main>");
        compiler.scopes.push(FnScope {
            locals: Vec::new(),
            block_marks: Vec::new(),
            captures: Vec::new(),
            binding_name: None,
        });
        compiler
    }

    /// Lower a batch of top-level statements as the next chunk of the
    /// entry function. Returns the grown program snapshot and the
    /// chunk's starting code address (the VM resume point).
    pub fn append(
        &mut self,
        stmts: &[TStmt],
        registry: &TypeRegistry,
    ) -> Result<(Program, usize), CompileError> {
        self.struct_field_counts = registry
            .structs()
            .map(|def| (def.id.0, def.fields.len()))
            .collect();

        let decls: Vec<&TFnDecl> = stmts
            .iter()
            .filter_map(|s| match s {
                TStmt::Fn(decl) => Some(decl),
                _ => None,
            })
            .collect();

        // A top-level function is self-contained when its free names are
        // all self-contained top-level functions or built-ins. Iterate to
        // a fixpoint so the property propagates through call chains;
        // functions from earlier chunks keep their classification.
        let frees: Vec<(String, FxHashSet<String>)> = decls
            .iter()
            .map(|d| (d.name.clone(), fn_free_vars(d)))
            .collect();
        let mut candidates: FxHashSet<String> =
            decls.iter().map(|d| d.name.clone()).collect();
        loop {
            let mut changed = false;
            for (name, free) in &frees {
                if !candidates.contains(name) {
                    continue;
                }
                let escapes = free.iter().any(|n| {
                    !candidates.contains(n)
                        && !self.global_fns.contains(n)
                        && builtin(n).is_none()
                });
                if escapes {
                    candidates.remove(name);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        self.global_fns.extend(candidates);

        for decl in &decls {
            let idx = self.push_placeholder_fn(&decl.name);
            self.top_fn_indices.insert(decl.name.clone(), idx);
        }

        // Reserve slots for capture-carrying top-level functions so
        // earlier declarations can reference later ones by slot.
        for decl in &decls {
            if !self.global_fns.contains(&decl.name) {
                self.bind_name(&decl.name);
            }
        }

        let chunk_start = self.code.len();
        self.compile_block_stmts(stmts, true, false)?;
        self.emit_bare(Op::Halt);

        let locals = self.scopes[0].locals.len();
        self.functions[0] = Function {
            name: "<main>".into(),
            arity: 0,
            locals,
            capture_count: 0,
            code_start: 0,
            code_len: self.code.len(),
        };
        Ok((self.snapshot(), chunk_start))
    }

    fn snapshot(&self) -> Program {
        Program {
            constants: self.constants.clone(),
            functions: self.functions.clone(),
            code: self.code.clone(),
            entry: 0,
        }
    }

    // ── Emission helpers ───────────────────────────────────────────────

    fn emit(&mut self, op: Op, operand: usize) -> usize {
        self.code.push(Instruction::new(op, operand as u32));
        self.code.len() - 1
    }

    fn emit_bare(&mut self, op: Op) -> usize {
        self.emit(op, 0)
    }

    /// Emit a jump with a placeholder target, returning its address.
    fn emit_jump(&mut self, op: Op) -> usize {
        self.emit(op, 0)
    }

    /// Point a previously emitted jump at the current code position.
    fn patch(&mut self, addr: usize) {
        self.code[addr].operand = self.code.len() as u32;
    }

    fn add_const(&mut self, value: Value) -> usize {
        match self
            .constants
            .iter()
            .position(|c| values_equal(c, &value))
        {
            Some(i) => i,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        }
    }

    fn push_placeholder_fn(&mut self, name: &str) -> usize {
        self.functions.push(Function {
            name: name.to_string(),
            arity: 0,
            locals: 0,
            capture_count: 0,
            code_start: 0,
            code_len: 0,
        });
        self.functions.len() - 1
    }

    // ── Scope helpers ──────────────────────────────────────────────────

    fn scope(&mut self) -> &mut FnScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn add_local(&mut self, name: String) -> usize {
        let scope = self.scope();
        scope.locals.push(name);
        scope.locals.len() - 1
    }

    fn add_temp(&mut self) -> usize {
        self.temp_counter += 1;
        let name = format!("$t{}", self.temp_counter);
        self.add_local(name)
    }

    /// Find or allocate a slot for a binding in the current block.
    /// Reuse lets or-pattern alternatives store the same variable into
    /// one slot.
    fn bind_name(&mut self, name: &str) -> usize {
        let scope = self.scope();
        let mark = scope.block_marks.last().copied().unwrap_or(0);
        if let Some(i) = scope.locals[mark..]
            .iter()
            .rposition(|n| n == name)
            .map(|i| i + mark)
        {
            return i;
        }
        self.add_local(name.to_string())
    }

    fn enter_block(&mut self) {
        let mark = self.scope().locals.len();
        self.scope().block_marks.push(mark);
    }

    /// Leave a lexical block: slots stay allocated but their names die,
    /// so later lookups cannot resolve to them.
    fn exit_block(&mut self) {
        let scope = self.scope();
        let mark = scope.block_marks.pop().unwrap_or(0);
        for name in scope.locals[mark..].iter_mut() {
            name.clear();
        }
    }

    fn classify(&self, name: &str) -> NameKind {
        let scope = self.scopes.last().expect("scope");
        if let Some(i) = rfind_live(&scope.locals, name) {
            return NameKind::Local(i);
        }
        if let Some(i) = scope.captures.iter().position(|c| c == name) {
            return NameKind::Capture(i);
        }
        if scope.binding_name.as_deref() == Some(name) {
            return NameKind::SelfRef;
        }
        for outer in self.scopes[..self.scopes.len() - 1].iter().rev() {
            if rfind_live(&outer.locals, name).is_some()
                || outer.captures.iter().any(|c| c == name)
                || outer.binding_name.as_deref() == Some(name)
            {
                return NameKind::Outer;
            }
        }
        if self.global_fns.contains(name) {
            return NameKind::GlobalFn(self.top_fn_indices[name]);
        }
        if let Some((op, arity)) = builtin(name) {
            return NameKind::Builtin(op, arity);
        }
        NameKind::Unknown
    }

    /// Emit code pushing the value of `name`, resolving locals, then
    /// captures (adding a new capture when the name lives in an
    /// enclosing function), then self, then globals and built-ins.
    fn emit_name(&mut self, name: &str, span: Span) -> Result<(), CompileError> {
        match self.classify(name) {
            NameKind::Local(i) => {
                self.emit(Op::PushLocal, i);
            }
            NameKind::Capture(i) => {
                self.emit(Op::PushCapture, i);
            }
            NameKind::SelfRef => {
                self.emit_bare(Op::PushSelf);
            }
            NameKind::Outer => {
                let scope = self.scope();
                scope.captures.push(name.to_string());
                let idx = scope.captures.len() - 1;
                self.emit(Op::PushCapture, idx);
            }
            NameKind::GlobalFn(idx) => {
                self.emit(Op::MakeClosure, idx);
            }
            NameKind::Builtin(op, arity) => {
                let idx = self.builtin_wrapper(name, op, arity);
                self.emit(Op::MakeClosure, idx);
            }
            NameKind::Unknown => {
                return Err(CompileError::new(
                    format!("unresolved name '{}' reached the compiler", name),
                    Some(span),
                ));
            }
        }
        Ok(())
    }

    /// A generated function forwarding its arguments to a built-in
    /// opcode, so built-ins can be passed as first-class values.
    fn builtin_wrapper(&mut self, name: &str, op: Op, arity: usize) -> usize {
        if let Some(idx) = self.wrappers.get(name) {
            return *idx;
        }
        let idx = self.push_placeholder_fn(name);
        let jump = self.emit_jump(Op::Jump);
        let code_start = self.code.len();
        for i in 0..arity {
            self.emit(Op::PushLocal, i);
        }
        self.emit_bare(op);
        self.emit_bare(Op::Ret);
        self.patch(jump);
        self.functions[idx] = Function {
            name: name.to_string(),
            arity,
            locals: arity,
            capture_count: 0,
            code_start,
            code_len: self.code.len() - code_start,
        };
        self.wrappers.insert(name.to_string(), idx);
        idx
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn compile_block_stmts(
        &mut self,
        stmts: &[TStmt],
        want_value: bool,
        tail: bool,
    ) -> Result<(), CompileError> {
        if stmts.is_empty() {
            if want_value {
                self.emit_bare(Op::PushNone);
            }
            return Ok(());
        }
        let last_index = stmts.len() - 1;
        for (i, stmt) in stmts.iter().enumerate() {
            let last = i == last_index;
            match stmt {
                TStmt::Expr(expr) => {
                    self.compile_expr(expr, tail && last && want_value)?;
                    if !(last && want_value) {
                        self.emit_bare(Op::Pop);
                    }
                }
                other => {
                    self.compile_stmt(other)?;
                    if last && want_value {
                        self.emit_bare(Op::PushNone);
                    }
                }
            }
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &TStmt) -> Result<(), CompileError> {
        match stmt {
            TStmt::Let {
                pattern,
                value,
                span,
                ..
            } => {
                self.compile_expr(value, false)?;
                self.bind_let_pattern(pattern, *span)
            }
            TStmt::Const { name, value, .. } => {
                self.compile_expr(value, false)?;
                let slot = self.add_local(name.clone());
                self.emit(Op::StoreLocal, slot);
                Ok(())
            }
            TStmt::Assign { name, value, span } => {
                self.compile_expr(value, false)?;
                match self.classify(name) {
                    NameKind::Local(i) => {
                        self.emit(Op::StoreLocal, i);
                        Ok(())
                    }
                    NameKind::Outer | NameKind::Capture(_) => Err(CompileError::new(
                        format!("cannot assign to captured variable '{}'", name),
                        Some(*span),
                    )),
                    _ => Err(CompileError::new(
                        format!("assignment to unresolved name '{}'", name),
                        Some(*span),
                    )),
                }
            }
            TStmt::Fn(decl) => self.compile_fn_decl(decl),
            TStmt::Assert { cond, span } => {
                self.compile_expr(cond, false)?;
                let ok = self.emit_jump(Op::JumpIfTrue);
                let msg = self.add_const(Value::str(format!(
                    "assertion failed at line {}",
                    span.start_line
                )));
                self.emit(Op::PushConst, msg);
                self.emit_bare(Op::MakeError);
                self.emit_bare(Op::Ret);
                self.patch(ok);
                Ok(())
            }
            TStmt::Expr(expr) => {
                self.compile_expr(expr, false)?;
                self.emit_bare(Op::Pop);
                Ok(())
            }
        }
    }

    /// Bind a `let` pattern against the value on top of the stack.
    /// Refutable forms (variant bindings) fail by returning a failure
    /// value from the enclosing function.
    fn bind_let_pattern(&mut self, pattern: &TPattern, span: Span) -> Result<(), CompileError> {
        match pattern {
            TPattern::Name { name, .. } => {
                let slot = self.bind_name(name);
                self.emit(Op::StoreLocal, slot);
                Ok(())
            }
            TPattern::Wildcard { .. } => {
                self.emit_bare(Op::Pop);
                Ok(())
            }
            _ => {
                let mut fails = Vec::new();
                self.compile_pattern(pattern, &mut fails)?;
                if !fails.is_empty() {
                    let ok = self.emit_jump(Op::Jump);
                    for f in fails {
                        self.patch(f);
                    }
                    let msg = self.add_const(Value::str(format!(
                        "binding pattern at line {} did not match",
                        span.start_line
                    )));
                    self.emit(Op::PushConst, msg);
                    self.emit_bare(Op::MakeError);
                    self.emit_bare(Op::Ret);
                    self.patch(ok);
                }
                Ok(())
            }
        }
    }

    fn compile_fn_decl(&mut self, decl: &TFnDecl) -> Result<(), CompileError> {
        let at_top_level = self.scopes.len() == 1;
        let idx = if at_top_level {
            self.top_fn_indices[&decl.name]
        } else {
            self.push_placeholder_fn(&decl.name)
        };

        let captures = self.compile_function(
            idx,
            Some(decl.name.clone()),
            &decl.params,
            &decl.body,
        )?;

        if at_top_level && self.global_fns.contains(&decl.name) {
            if !captures.is_empty() {
                return Err(CompileError::new(
                    format!(
                        "function '{}' was classified self-contained but captured {:?}",
                        decl.name, captures
                    ),
                    Some(decl.span),
                ));
            }
            return Ok(());
        }

        for cap in &captures {
            self.emit_name(cap, decl.span)?;
        }
        self.emit(Op::MakeClosure, idx);
        let slot = self.bind_name(&decl.name);
        self.emit(Op::StoreLocal, slot);
        Ok(())
    }

    /// Emit a function body inline behind a jump: jump over the body,
    /// record `code_start`, let the parameters occupy the first local
    /// slots, compile the body in tail position, emit `ret`, patch the
    /// jump. Returns the ordered capture list discovered while compiling.
    fn compile_function(
        &mut self,
        idx: usize,
        binding_name: Option<String>,
        params: &[TParam],
        body: &TExpr,
    ) -> Result<Vec<String>, CompileError> {
        let jump = self.emit_jump(Op::Jump);
        let code_start = self.code.len();

        self.scopes.push(FnScope {
            locals: params.iter().map(|p| p.name.clone()).collect(),
            block_marks: Vec::new(),
            captures: Vec::new(),
            binding_name: binding_name.clone(),
        });
        self.compile_expr(body, true)?;
        self.emit_bare(Op::Ret);
        self.patch(jump);

        let scope = self.scopes.pop().expect("function scope");
        self.functions[idx] = Function {
            name: binding_name.unwrap_or_else(|| "<fn>".into()),
            arity: params.len(),
            locals: scope.locals.len(),
            capture_count: scope.captures.len(),
            code_start,
            code_len: self.code.len() - code_start,
        };
        Ok(scope.captures)
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn compile_expr(&mut self, expr: &TExpr, tail: bool) -> Result<(), CompileError> {
        match expr {
            TExpr::Int { value, .. } => {
                let c = self.add_const(Value::Int(*value));
                self.emit(Op::PushConst, c);
            }
            TExpr::Float { value, .. } => {
                let c = self.add_const(Value::Float(*value));
                self.emit(Op::PushConst, c);
            }
            TExpr::Str { value, .. } => {
                let c = self.add_const(Value::str(value.clone()));
                self.emit(Op::PushConst, c);
            }
            TExpr::Bool { value, .. } => {
                self.emit_bare(if *value { Op::PushTrue } else { Op::PushFalse });
            }
            TExpr::None { .. } => {
                self.emit_bare(Op::PushNone);
            }
            TExpr::InterpStr { parts, span } => self.compile_interp(parts, *span)?,
            TExpr::Ident { name, span, .. } => self.emit_name(name, *span)?,
            TExpr::Variant {
                enum_id,
                enum_name,
                variant,
                payload,
                ..
            } => {
                let id = self.add_const(Value::Int(enum_id.0 as i64));
                self.emit(Op::PushConst, id);
                let en = self.add_const(Value::str(enum_name.clone()));
                self.emit(Op::PushConst, en);
                let vn = self.add_const(Value::str(variant.clone()));
                self.emit(Op::PushConst, vn);
                if payload.is_empty() {
                    self.emit_bare(Op::MakeEnum);
                } else {
                    for p in payload {
                        self.compile_expr(p, false)?;
                    }
                    self.emit(Op::MakeEnumPayload, payload.len());
                }
            }
            TExpr::Block { stmts, .. } => {
                self.enter_block();
                self.compile_block_stmts(stmts, true, tail)?;
                self.exit_block();
            }
            TExpr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.compile_expr(cond, false)?;
                let jf = self.emit_jump(Op::JumpIfFalse);
                self.compile_expr(then_branch, tail)?;
                let jend = self.emit_jump(Op::Jump);
                self.patch(jf);
                match else_branch {
                    Some(else_expr) => self.compile_expr(else_expr, tail)?,
                    None => {
                        self.emit_bare(Op::PushNone);
                    }
                }
                self.patch(jend);
            }
            TExpr::Match { subject, arms, .. } => {
                self.compile_match(subject, arms, tail)?;
            }
            TExpr::Or {
                value,
                receiver,
                fallback,
                ..
            } => {
                self.compile_expr(value, false)?;
                self.emit_bare(Op::Dup);
                self.emit_bare(Op::IsFailure);
                let jend = self.emit_jump(Op::JumpIfFalse);
                self.enter_block();
                match receiver {
                    Some(name) => {
                        self.emit_bare(Op::UnwrapFailure);
                        let slot = self.bind_name(name);
                        self.emit(Op::StoreLocal, slot);
                    }
                    None => {
                        self.emit_bare(Op::Pop);
                    }
                }
                self.compile_expr(fallback, false)?;
                self.exit_block();
                self.patch(jend);
            }
            TExpr::Propagate { value, .. } => {
                self.compile_expr(value, false)?;
                self.emit_bare(Op::Dup);
                self.emit_bare(Op::IsFailure);
                let skip = self.emit_jump(Op::JumpIfFalse);
                self.emit_bare(Op::Ret);
                self.patch(skip);
            }
            TExpr::ErrorValue { payload, .. } => {
                self.compile_expr(payload, false)?;
                self.emit_bare(Op::MakeError);
            }
            TExpr::Binary { op, lhs, rhs, .. } => {
                self.compile_binary(*op, lhs, rhs)?;
            }
            TExpr::Unary { op, operand, .. } => {
                self.compile_expr(operand, false)?;
                self.emit_bare(match op {
                    UnaryOp::Not => Op::Not,
                    UnaryOp::Neg => Op::Neg,
                });
            }
            TExpr::Call { callee, args, span } => {
                self.compile_call(callee, args, *span, tail)?;
            }
            TExpr::Field { object, field, .. } => {
                self.compile_expr(object, false)?;
                let c = self.add_const(Value::str(field.clone()));
                self.emit(Op::GetField, c);
            }
            TExpr::TupleIndex { object, index, .. } => {
                self.compile_expr(object, false)?;
                self.emit(Op::TupleIndex, *index as usize);
            }
            TExpr::Array { elems, .. } => {
                self.compile_array(elems)?;
            }
            TExpr::Tuple { elems, .. } => {
                for e in elems {
                    self.compile_expr(e, false)?;
                }
                self.emit(Op::MakeTuple, elems.len());
            }
            TExpr::Index { object, index, .. } => {
                self.compile_expr(object, false)?;
                self.compile_expr(index, false)?;
                self.emit_bare(Op::Index);
            }
            TExpr::Range { start, end, .. } => {
                self.compile_expr(start, false)?;
                self.compile_expr(end, false)?;
                self.emit_bare(Op::MakeRange);
            }
            TExpr::StructInit {
                struct_id,
                name,
                fields,
                span,
            } => {
                if let Some(declared) = self.struct_field_counts.get(&struct_id.0) {
                    if *declared != fields.len() {
                        return Err(CompileError::new(
                            format!(
                                "struct {} lowered with {} fields but declares {}",
                                name,
                                fields.len(),
                                declared
                            ),
                            Some(*span),
                        ));
                    }
                }
                let id = self.add_const(Value::Int(struct_id.0 as i64));
                self.emit(Op::PushConst, id);
                let tn = self.add_const(Value::str(name.clone()));
                self.emit(Op::PushConst, tn);
                for (field_name, value) in fields {
                    let fc = self.add_const(Value::str(field_name.clone()));
                    self.emit(Op::PushConst, fc);
                    self.compile_expr(value, false)?;
                }
                self.emit(Op::MakeStruct, fields.len());
            }
            TExpr::FnExpr { params, body, .. } => {
                let idx = self.push_placeholder_fn("<fn>");
                let captures = self.compile_function(idx, None, params, body)?;
                let span = expr.span();
                for cap in &captures {
                    self.emit_name(cap, span)?;
                }
                self.emit(Op::MakeClosure, idx);
            }
        }
        Ok(())
    }

    fn compile_interp(&mut self, parts: &[TStrPart], span: Span) -> Result<(), CompileError> {
        if parts.is_empty() {
            let c = self.add_const(Value::str(""));
            self.emit(Op::PushConst, c);
            return Ok(());
        }
        for (i, part) in parts.iter().enumerate() {
            match part {
                TStrPart::Text(text) => {
                    let c = self.add_const(Value::str(text.clone()));
                    self.emit(Op::PushConst, c);
                }
                TStrPart::Ident(name) => {
                    self.emit_name(name, span)?;
                    self.emit_bare(Op::ToString);
                }
            }
            if i > 0 {
                self.emit_bare(Op::StrConcat);
            }
        }
        Ok(())
    }

    /// Short-circuit `&&`/`||` via dup + conditional jump; everything
    /// else evaluates both operands then applies the opcode.
    fn compile_binary(
        &mut self,
        op: BinaryOp,
        lhs: &TExpr,
        rhs: &TExpr,
    ) -> Result<(), CompileError> {
        match op {
            BinaryOp::And => {
                self.compile_expr(lhs, false)?;
                self.emit_bare(Op::Dup);
                let jend = self.emit_jump(Op::JumpIfFalse);
                self.emit_bare(Op::Pop);
                self.compile_expr(rhs, false)?;
                self.patch(jend);
            }
            BinaryOp::Or => {
                self.compile_expr(lhs, false)?;
                self.emit_bare(Op::Dup);
                let jend = self.emit_jump(Op::JumpIfTrue);
                self.emit_bare(Op::Pop);
                self.compile_expr(rhs, false)?;
                self.patch(jend);
            }
            _ => {
                self.compile_expr(lhs, false)?;
                self.compile_expr(rhs, false)?;
                self.emit_bare(match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Mod => Op::Mod,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::NotEq => Op::Neq,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::LtEq => Op::Lte,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::GtEq => Op::Gte,
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                });
            }
        }
        Ok(())
    }

    fn compile_call(
        &mut self,
        callee: &TExpr,
        args: &[TExpr],
        span: Span,
        tail: bool,
    ) -> Result<(), CompileError> {
        // Direct built-in call, unless the name is shadowed.
        if let TExpr::Ident { name, .. } = callee {
            if let NameKind::Builtin(op, arity) = self.classify(name) {
                if args.len() != arity {
                    return Err(CompileError::new(
                        format!(
                            "built-in '{}' lowered with {} arguments, expects {}",
                            name,
                            args.len(),
                            arity
                        ),
                        Some(span),
                    ));
                }
                for arg in args {
                    self.compile_expr(arg, false)?;
                }
                self.emit_bare(op);
                return Ok(());
            }
        }

        for arg in args {
            self.compile_expr(arg, false)?;
        }
        self.compile_expr(callee, false)?;
        self.emit(if tail { Op::TailCall } else { Op::Call }, args.len());
        Ok(())
    }

    fn compile_array(&mut self, elems: &[TArrayElem]) -> Result<(), CompileError> {
        let mut pending = 0usize;
        let mut have_array = false;
        for elem in elems {
            match elem {
                TArrayElem::Item(e) => {
                    self.compile_expr(e, false)?;
                    pending += 1;
                }
                TArrayElem::Spread(e) => {
                    if pending > 0 {
                        self.emit(Op::MakeArray, pending);
                        pending = 0;
                        if have_array {
                            self.emit_bare(Op::ArrayConcat);
                        }
                        have_array = true;
                    }
                    self.compile_expr(e, false)?;
                    if have_array {
                        self.emit_bare(Op::ArrayConcat);
                    }
                    have_array = true;
                }
            }
        }
        if pending > 0 || !have_array {
            self.emit(Op::MakeArray, pending);
            if have_array {
                self.emit_bare(Op::ArrayConcat);
            }
        }
        Ok(())
    }

    // ── Match lowering ─────────────────────────────────────────────────

    /// Compile the subject once, then per arm: duplicate the subject,
    /// run the pattern (tests and bindings), pop the subject, run the
    /// body, jump to the end; failed tests fall through to the next arm.
    /// Fall-through past the final arm yields `none`.
    fn compile_match(
        &mut self,
        subject: &TExpr,
        arms: &[al_typeck::typed::TMatchArm],
        tail: bool,
    ) -> Result<(), CompileError> {
        self.compile_expr(subject, false)?;
        let mut end_jumps = Vec::new();
        for arm in arms {
            self.enter_block();
            self.emit_bare(Op::Dup);
            let mut fails = Vec::new();
            self.compile_pattern(&arm.pattern, &mut fails)?;
            self.emit_bare(Op::Pop);
            self.compile_expr(&arm.body, tail)?;
            end_jumps.push(self.emit_jump(Op::Jump));
            for f in fails {
                self.patch(f);
            }
            self.exit_block();
        }
        self.emit_bare(Op::Pop);
        self.emit_bare(Op::PushNone);
        for j in end_jumps {
            self.patch(j);
        }
        Ok(())
    }

    /// Pattern contract: the subject copy is on top of the stack and is
    /// consumed. On a match, fall through with all bindings stored. On a
    /// mismatch, jump to an address collected into `fails` with the
    /// stack balanced.
    fn compile_pattern(
        &mut self,
        pattern: &TPattern,
        fails: &mut Vec<usize>,
    ) -> Result<(), CompileError> {
        match pattern {
            TPattern::Name { name, .. } => {
                let slot = self.bind_name(name);
                self.emit(Op::StoreLocal, slot);
            }
            TPattern::Wildcard { .. } => {
                self.emit_bare(Op::Pop);
            }
            TPattern::Int { value, .. } => {
                let c = self.add_const(Value::Int(*value));
                self.emit(Op::PushConst, c);
                self.emit_bare(Op::Eq);
                fails.push(self.emit_jump(Op::JumpIfFalse));
            }
            TPattern::Float { value, .. } => {
                let c = self.add_const(Value::Float(*value));
                self.emit(Op::PushConst, c);
                self.emit_bare(Op::Eq);
                fails.push(self.emit_jump(Op::JumpIfFalse));
            }
            TPattern::Str { value, .. } => {
                let c = self.add_const(Value::str(value.clone()));
                self.emit(Op::PushConst, c);
                self.emit_bare(Op::Eq);
                fails.push(self.emit_jump(Op::JumpIfFalse));
            }
            TPattern::Bool { value, .. } => {
                // A bool subject's truthiness is its value.
                fails.push(self.emit_jump(if *value {
                    Op::JumpIfFalse
                } else {
                    Op::JumpIfTrue
                }));
            }
            TPattern::None { .. } => {
                self.emit_bare(Op::IsFailure);
                fails.push(self.emit_jump(Op::JumpIfFalse));
            }
            TPattern::Range { start, end, .. } => {
                self.emit_bare(Op::Dup);
                let cs = self.add_const(Value::Int(*start));
                self.emit(Op::PushConst, cs);
                self.emit_bare(Op::Gte);
                let jlow = self.emit_jump(Op::JumpIfFalse);
                let ce = self.add_const(Value::Int(*end));
                self.emit(Op::PushConst, ce);
                self.emit_bare(Op::Lt);
                fails.push(self.emit_jump(Op::JumpIfFalse));
                let jok = self.emit_jump(Op::Jump);
                self.patch(jlow);
                self.emit_bare(Op::Pop);
                fails.push(self.emit_jump(Op::Jump));
                self.patch(jok);
            }
            TPattern::Tuple { elems, .. } => {
                let t = self.add_temp();
                self.emit(Op::StoreLocal, t);
                for (i, p) in elems.iter().enumerate() {
                    self.emit(Op::PushLocal, t);
                    self.emit(Op::TupleIndex, i);
                    self.compile_pattern(p, fails)?;
                }
            }
            TPattern::Array { elems, rest, .. } => {
                let t = self.add_temp();
                self.emit(Op::StoreLocal, t);
                self.emit(Op::PushLocal, t);
                self.emit_bare(Op::ArrayLen);
                let n = self.add_const(Value::Int(elems.len() as i64));
                self.emit(Op::PushConst, n);
                self.emit_bare(if rest.is_some() { Op::Gte } else { Op::Eq });
                fails.push(self.emit_jump(Op::JumpIfFalse));
                for (i, p) in elems.iter().enumerate() {
                    self.emit(Op::PushLocal, t);
                    let c = self.add_const(Value::Int(i as i64));
                    self.emit(Op::PushConst, c);
                    self.emit_bare(Op::Index);
                    self.compile_pattern(p, fails)?;
                }
                if let Some(name) = rest {
                    self.emit(Op::PushLocal, t);
                    let start = self.add_const(Value::Int(elems.len() as i64));
                    self.emit(Op::PushConst, start);
                    self.emit(Op::PushLocal, t);
                    self.emit_bare(Op::ArrayLen);
                    self.emit_bare(Op::ArraySlice);
                    let slot = self.bind_name(name);
                    self.emit(Op::StoreLocal, slot);
                }
            }
            TPattern::Or { alts, .. } => {
                let t = self.add_temp();
                self.emit(Op::StoreLocal, t);
                let mut matched = Vec::new();
                for (i, alt) in alts.iter().enumerate() {
                    let last = i == alts.len() - 1;
                    self.emit(Op::PushLocal, t);
                    let mut alt_fails = Vec::new();
                    self.compile_pattern(alt, &mut alt_fails)?;
                    matched.push(self.emit_jump(Op::Jump));
                    if last {
                        fails.extend(alt_fails);
                    } else {
                        for f in alt_fails {
                            self.patch(f);
                        }
                    }
                }
                for j in matched {
                    self.patch(j);
                }
            }
            TPattern::Variant {
                variant, payload, ..
            } => {
                let vc = self.add_const(Value::str(variant.clone()));
                self.emit(Op::MatchEnum, vc);
                let jf = self.emit_jump(Op::JumpIfFalse);
                match payload {
                    Some(subs) if !subs.is_empty() => {
                        self.emit(Op::UnwrapEnum, subs.len());
                        let temps: Vec<usize> =
                            subs.iter().map(|_| self.add_temp()).collect();
                        for t in temps.iter().rev() {
                            self.emit(Op::StoreLocal, *t);
                        }
                        for (t, sub) in temps.iter().zip(subs.iter()) {
                            self.emit(Op::PushLocal, *t);
                            self.compile_pattern(sub, fails)?;
                        }
                    }
                    _ => {
                        self.emit_bare(Op::Pop);
                    }
                }
                let jok = self.emit_jump(Op::Jump);
                self.patch(jf);
                self.emit_bare(Op::Pop);
                fails.push(self.emit_jump(Op::Jump));
                self.patch(jok);
            }
        }
        Ok(())
    }
}

impl Default for SessionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn rfind_live(locals: &[String], name: &str) -> Option<usize> {
    locals.iter().rposition(|n| n == name)
}
