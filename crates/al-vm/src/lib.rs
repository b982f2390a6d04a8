//! The AL virtual machine.
//!
//! Single-threaded, register-free, stack-based. State: the immutable
//! program, a value stack, a frame stack, and the socket/listener tables
//! keyed by integer handles. Local access is relative to the current
//! frame's `base_slot`; tail calls reuse the frame. Blocking only happens
//! inside built-ins; the file/network opcodes are gated by an I/O flag
//! and surface failures as `Error` values for user-level `or` handling.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use al_bytecode::value::{values_equal, ClosureValue, EnumValue, StructValue};
use al_bytecode::{Op, Program, Value};

/// A fatal runtime error: stack underflow, bad arity, division by zero,
/// out-of-bounds access, unsupported operand types, or gated I/O.
/// Distinct from user-level failures, which are ordinary `Error` values.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// An activation record. `ip` is relative to the function's `code_start`.
struct Frame {
    func_index: usize,
    ip: usize,
    base_slot: usize,
    captures: Vec<Value>,
}

/// Frame-stack depth guard for non-tail runaway recursion.
const MAX_FRAMES: usize = 262_144;

pub struct Vm {
    program: Program,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    listeners: FxHashMap<u32, TcpListener>,
    sockets: FxHashMap<u32, TcpStream>,
    next_socket_id: u32,
    io_enabled: bool,
    out: Box<dyn Write>,
}

impl Vm {
    /// A VM writing to stdout with I/O built-ins disabled.
    pub fn new(program: Program) -> Self {
        Self::with_output(program, Box::new(std::io::stdout()))
    }

    pub fn with_output(program: Program, out: Box<dyn Write>) -> Self {
        Self {
            program,
            stack: Vec::new(),
            frames: Vec::new(),
            listeners: FxHashMap::default(),
            sockets: FxHashMap::default(),
            next_socket_id: 1,
            io_enabled: false,
            out,
        }
    }

    /// Enable the file/network built-ins (`--experimental-shitty-io`).
    pub fn enable_io(&mut self) {
        self.io_enabled = true;
    }

    /// Execute the program from the start and return the final value.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        self.stack.clear();
        self.frames.clear();
        self.run_from(0)
    }

    /// Replace the program with a grown snapshot. Sound only for
    /// append-only growth (the REPL's session compiler): constant and
    /// function indices held by live values must stay valid.
    pub fn swap_program(&mut self, program: Program) {
        self.program = program;
    }

    /// Resume the persistent entry frame at an appended chunk's code
    /// address and run it to completion.
    ///
    /// Entry locals bound by earlier chunks keep their values; slots the
    /// new program adds are initialized to `none`, and any temporaries a
    /// failed chunk left above the locals are discarded.
    pub fn run_from(&mut self, resume_ip: usize) -> Result<Value, RuntimeError> {
        let entry = self.program.entry;
        let locals = self.program.functions[entry].locals;
        self.stack.truncate(locals);
        while self.stack.len() < locals {
            self.stack.push(Value::None);
        }
        self.frames.clear();
        self.frames.push(Frame {
            func_index: entry,
            ip: resume_ip,
            base_slot: 0,
            captures: Vec::new(),
        });
        self.run_loop()
    }

    fn run_loop(&mut self) -> Result<Value, RuntimeError> {
        loop {
            let (instr, code_start, code_len) = {
                let frame = self.frames.last().expect("frame stack is never empty");
                let func = &self.program.functions[frame.func_index];
                if frame.ip >= func.code_len {
                    return Err(RuntimeError::new(format!(
                        "instruction pointer ran past the end of {}",
                        func.name
                    )));
                }
                (
                    self.program.code[func.code_start + frame.ip],
                    func.code_start,
                    func.code_len,
                )
            };
            self.frames.last_mut().expect("frame").ip += 1;
            let operand = instr.operand as usize;

            match instr.op {
                // ── Stack ──────────────────────────────────────────────
                Op::PushConst => {
                    let value = self
                        .program
                        .constants
                        .get(operand)
                        .cloned()
                        .ok_or_else(|| RuntimeError::new("constant index out of range"))?;
                    self.stack.push(value);
                }
                Op::PushLocal => {
                    let value = self.local(operand)?.clone();
                    self.stack.push(value);
                }
                Op::StoreLocal => {
                    let value = self.pop()?;
                    *self.local_mut(operand)? = value;
                }
                Op::PushNone => self.stack.push(Value::None),
                Op::PushTrue => self.stack.push(Value::Bool(true)),
                Op::PushFalse => self.stack.push(Value::Bool(false)),
                Op::Pop => {
                    self.pop()?;
                }
                Op::Dup => {
                    let top = self.peek()?.clone();
                    self.stack.push(top);
                }
                Op::Swap => {
                    let a = self.pop()?;
                    let b = self.pop()?;
                    self.stack.push(a);
                    self.stack.push(b);
                }

                // ── Arithmetic / logic ─────────────────────────────────
                Op::Add => self.binary_add()?,
                Op::Sub => self.binary_numeric("-", |a, b| a - b, |a, b| a - b)?,
                Op::Mul => self.binary_numeric("*", |a, b| a * b, |a, b| a * b)?,
                Op::Div => self.binary_div()?,
                Op::Mod => self.binary_mod()?,
                Op::Neg => {
                    let v = self.pop()?;
                    match v {
                        Value::Int(n) => self.stack.push(Value::Int(-n)),
                        Value::Float(x) => self.stack.push(Value::Float(-x)),
                        other => {
                            return Err(RuntimeError::new(format!(
                                "unsupported operand for unary '-': {}",
                                other.inspect_nested()
                            )))
                        }
                    }
                }
                Op::Eq => {
                    let (lhs, rhs) = self.pop_pair()?;
                    self.stack.push(Value::Bool(values_equal(&lhs, &rhs)));
                }
                Op::Neq => {
                    let (lhs, rhs) = self.pop_pair()?;
                    self.stack.push(Value::Bool(!values_equal(&lhs, &rhs)));
                }
                Op::Lt => self.binary_compare("<", |o| o == std::cmp::Ordering::Less)?,
                Op::Gt => self.binary_compare(">", |o| o == std::cmp::Ordering::Greater)?,
                Op::Lte => self.binary_compare("<=", |o| o != std::cmp::Ordering::Greater)?,
                Op::Gte => self.binary_compare(">=", |o| o != std::cmp::Ordering::Less)?,
                Op::Not => {
                    let v = self.pop()?;
                    self.stack.push(Value::Bool(!v.is_truthy()));
                }

                // ── Control ────────────────────────────────────────────
                Op::Jump => self.jump_to(operand, code_start, code_len)?,
                Op::JumpIfFalse => {
                    let v = self.pop()?;
                    if !v.is_truthy() {
                        self.jump_to(operand, code_start, code_len)?;
                    }
                }
                Op::JumpIfTrue => {
                    let v = self.pop()?;
                    if v.is_truthy() {
                        self.jump_to(operand, code_start, code_len)?;
                    }
                }
                Op::Call => self.call(operand)?,
                Op::TailCall => self.tail_call(operand)?,
                Op::Ret => {
                    let value = self.pop()?;
                    let frame = self.frames.pop().expect("frame");
                    self.stack.truncate(frame.base_slot);
                    if self.frames.is_empty() {
                        return Ok(value);
                    }
                    self.stack.push(value);
                }
                Op::Halt => {
                    return Ok(self.stack.pop().unwrap_or(Value::None));
                }

                // ── Aggregates ─────────────────────────────────────────
                Op::MakeArray | Op::MakeTuple => {
                    let elems = self.pop_n(operand)?;
                    self.stack.push(Value::Array(Rc::new(elems)));
                }
                Op::MakeRange => {
                    let end = self.pop_int("range end")?;
                    let start = self.pop_int("range start")?;
                    let elems: Vec<Value> = (start..end).map(Value::Int).collect();
                    self.stack.push(Value::Array(Rc::new(elems)));
                }
                Op::Index => {
                    let index = self.pop_int("array index")?;
                    let array = self.pop_array("indexing")?;
                    if index < 0 || index as usize >= array.len() {
                        return Err(RuntimeError::new(format!(
                            "array index {} out of bounds (length {})",
                            index,
                            array.len()
                        )));
                    }
                    self.stack.push(array[index as usize].clone());
                }
                Op::ArrayLen => {
                    let v = self.pop()?;
                    let len = match &v {
                        Value::Array(elems) => elems.len(),
                        Value::Str(s) => s.chars().count(),
                        other => {
                            return Err(RuntimeError::new(format!(
                                "len expects an array, found {}",
                                other.inspect_nested()
                            )))
                        }
                    };
                    self.stack.push(Value::Int(len as i64));
                }
                Op::ArraySlice => {
                    let end = self.pop_int("slice end")?;
                    let start = self.pop_int("slice start")?;
                    let array = self.pop_array("slicing")?;
                    let len = array.len() as i64;
                    let start = start.clamp(0, len) as usize;
                    let end = end.clamp(0, len) as usize;
                    let slice: Vec<Value> = if start < end {
                        array[start..end].to_vec()
                    } else {
                        Vec::new()
                    };
                    self.stack.push(Value::Array(Rc::new(slice)));
                }
                Op::ArrayConcat => {
                    let rhs = self.pop_array("concatenation")?;
                    let lhs = self.pop_array("concatenation")?;
                    let mut out = lhs.as_ref().clone();
                    out.extend(rhs.iter().cloned());
                    self.stack.push(Value::Array(Rc::new(out)));
                }
                Op::TupleIndex => {
                    let tuple = self.pop_array("tuple access")?;
                    match tuple.get(operand) {
                        Some(v) => self.stack.push(v.clone()),
                        None => {
                            return Err(RuntimeError::new(format!(
                                "tuple has no element {}",
                                operand
                            )))
                        }
                    }
                }
                Op::MakeStruct => {
                    let mut fields = Vec::with_capacity(operand);
                    for _ in 0..operand {
                        let value = self.pop()?;
                        let name = self.pop_str("struct field name")?;
                        fields.push((name, value));
                    }
                    fields.reverse();
                    let type_name = self.pop_str("struct type name")?;
                    let type_id = self.pop_int("struct type id")?;
                    self.stack.push(Value::Struct(Rc::new(StructValue {
                        type_id: type_id as u32,
                        type_name,
                        fields,
                    })));
                }
                Op::GetField => {
                    let name = self.const_str(operand)?;
                    let v = self.pop()?;
                    match &v {
                        Value::Struct(s) => match s.field(&name) {
                            Some(field) => self.stack.push(field.clone()),
                            None => {
                                return Err(RuntimeError::new(format!(
                                    "{} has no field '{}'",
                                    s.type_name, name
                                )))
                            }
                        },
                        other => {
                            return Err(RuntimeError::new(format!(
                                "field access on non-struct value {}",
                                other.inspect_nested()
                            )))
                        }
                    }
                }

                // ── Enums ──────────────────────────────────────────────
                Op::MakeEnum => {
                    let variant = self.pop_str("variant name")?;
                    let enum_name = self.pop_str("enum name")?;
                    let type_id = self.pop_int("enum type id")?;
                    self.stack.push(Value::Enum(Rc::new(EnumValue {
                        type_id: type_id as u32,
                        enum_name,
                        variant,
                        payload: None,
                    })));
                }
                Op::MakeEnumPayload => {
                    let payload = self.pop_n(operand)?;
                    let variant = self.pop_str("variant name")?;
                    let enum_name = self.pop_str("enum name")?;
                    let type_id = self.pop_int("enum type id")?;
                    self.stack.push(Value::Enum(Rc::new(EnumValue {
                        type_id: type_id as u32,
                        enum_name,
                        variant,
                        payload: Some(payload),
                    })));
                }
                Op::MatchEnum => {
                    let variant = self.const_str(operand)?;
                    let matches = match self.peek()? {
                        Value::Enum(e) => e.variant == variant,
                        _ => false,
                    };
                    self.stack.push(Value::Bool(matches));
                }
                Op::UnwrapEnum => {
                    let v = self.pop()?;
                    match v {
                        Value::Enum(e) => {
                            let payload = e.payload.clone().unwrap_or_default();
                            if payload.len() != operand {
                                return Err(RuntimeError::new(format!(
                                    "variant {}.{} has {} payload values, expected {}",
                                    e.enum_name,
                                    e.variant,
                                    payload.len(),
                                    operand
                                )));
                            }
                            self.stack.extend(payload);
                        }
                        other => {
                            return Err(RuntimeError::new(format!(
                                "unwrapping non-enum value {}",
                                other.inspect_nested()
                            )))
                        }
                    }
                }

                // ── Closures ───────────────────────────────────────────
                Op::MakeClosure => {
                    let func = self
                        .program
                        .functions
                        .get(operand)
                        .ok_or_else(|| RuntimeError::new("function index out of range"))?;
                    let count = func.capture_count;
                    let captures = self.pop_n(count)?;
                    self.stack.push(Value::Closure(Rc::new(ClosureValue {
                        func_index: operand,
                        captures,
                    })));
                }
                Op::PushCapture => {
                    let frame = self.frames.last().expect("frame");
                    let value = frame.captures.get(operand).cloned().ok_or_else(|| {
                        RuntimeError::new("capture index out of range")
                    })?;
                    self.stack.push(value);
                }
                Op::PushSelf => {
                    let frame = self.frames.last().expect("frame");
                    let closure = ClosureValue {
                        func_index: frame.func_index,
                        captures: frame.captures.clone(),
                    };
                    self.stack.push(Value::Closure(Rc::new(closure)));
                }

                // ── Failure values ─────────────────────────────────────
                Op::MakeError => {
                    let payload = self.pop()?;
                    self.stack.push(Value::Error(Rc::new(payload)));
                }
                Op::IsFailure => {
                    let v = self.pop()?;
                    self.stack.push(Value::Bool(v.is_failure()));
                }
                Op::UnwrapFailure => {
                    let v = self.pop()?;
                    match v {
                        Value::Error(payload) => self.stack.push(payload.as_ref().clone()),
                        Value::None => self.stack.push(Value::None),
                        other => {
                            return Err(RuntimeError::new(format!(
                                "unwrapping non-failure value {}",
                                other.inspect_nested()
                            )))
                        }
                    }
                }

                // ── Strings ────────────────────────────────────────────
                Op::ToString => {
                    let v = self.pop()?;
                    self.stack.push(Value::str(v.inspect()));
                }
                Op::StrConcat => {
                    let rhs = self.pop_str("str_concat")?;
                    let lhs = self.pop_str("str_concat")?;
                    self.stack.push(Value::str(lhs + &rhs));
                }
                Op::StrSplit => {
                    let sep = self.pop_str("str_split separator")?;
                    let s = self.pop_str("str_split subject")?;
                    let parts: Vec<Value> = if sep.is_empty() {
                        s.chars().map(|c| Value::str(c.to_string())).collect()
                    } else {
                        s.split(&sep).map(Value::str).collect()
                    };
                    self.stack.push(Value::Array(Rc::new(parts)));
                }

                // ── Built-ins ──────────────────────────────────────────
                Op::Print => {
                    let v = self.pop()?;
                    writeln!(self.out, "{}", v.inspect())
                        .map_err(|e| RuntimeError::new(format!("print failed: {}", e)))?;
                    self.stack.push(Value::None);
                }
                Op::FileRead => {
                    self.require_io("file_read")?;
                    let path = self.pop_str("file_read path")?;
                    let result = match std::fs::read_to_string(&path) {
                        Ok(contents) => Value::str(contents),
                        Err(e) => error_value(format!("file_read '{}': {}", path, e)),
                    };
                    self.stack.push(result);
                }
                Op::FileWrite => {
                    self.require_io("file_write")?;
                    let contents = self.pop_str("file_write contents")?;
                    let path = self.pop_str("file_write path")?;
                    let result = match std::fs::write(&path, contents) {
                        Ok(()) => Value::None,
                        Err(e) => error_value(format!("file_write '{}': {}", path, e)),
                    };
                    self.stack.push(result);
                }
                Op::TcpListen => {
                    self.require_io("tcp_listen")?;
                    let port = self.pop_int("tcp_listen port")?;
                    let result = match TcpListener::bind(("127.0.0.1", port as u16)) {
                        Ok(listener) => {
                            let id = self.next_socket_id;
                            self.next_socket_id += 1;
                            self.listeners.insert(id, listener);
                            Value::Socket {
                                id,
                                is_listener: true,
                            }
                        }
                        Err(e) => error_value(format!("tcp_listen on port {}: {}", port, e)),
                    };
                    self.stack.push(result);
                }
                Op::TcpAccept => {
                    self.require_io("tcp_accept")?;
                    let id = self.pop_socket_id()?;
                    let result = match self.listeners.get(&id) {
                        Some(listener) => match listener.accept() {
                            Ok((stream, _)) => {
                                let conn_id = self.next_socket_id;
                                self.next_socket_id += 1;
                                self.sockets.insert(conn_id, stream);
                                Value::Socket {
                                    id: conn_id,
                                    is_listener: false,
                                }
                            }
                            Err(e) => error_value(format!("tcp_accept: {}", e)),
                        },
                        None => error_value(format!("tcp_accept: unknown listener {}", id)),
                    };
                    self.stack.push(result);
                }
                Op::TcpRead => {
                    self.require_io("tcp_read")?;
                    let id = self.pop_socket_id()?;
                    let result = match self.sockets.get_mut(&id) {
                        Some(stream) => {
                            let mut buf = vec![0u8; 65536];
                            match stream.read(&mut buf) {
                                Ok(n) => {
                                    Value::str(String::from_utf8_lossy(&buf[..n]).into_owned())
                                }
                                Err(e) => error_value(format!("tcp_read: {}", e)),
                            }
                        }
                        None => error_value(format!("tcp_read: unknown socket {}", id)),
                    };
                    self.stack.push(result);
                }
                Op::TcpWrite => {
                    self.require_io("tcp_write")?;
                    let data = self.pop_str("tcp_write data")?;
                    let id = self.pop_socket_id()?;
                    let result = match self.sockets.get_mut(&id) {
                        Some(stream) => match stream.write_all(data.as_bytes()) {
                            Ok(()) => Value::None,
                            Err(e) => error_value(format!("tcp_write: {}", e)),
                        },
                        None => error_value(format!("tcp_write: unknown socket {}", id)),
                    };
                    self.stack.push(result);
                }
                Op::TcpClose => {
                    self.require_io("tcp_close")?;
                    let id = self.pop_socket_id()?;
                    let known = self.sockets.remove(&id).is_some()
                        || self.listeners.remove(&id).is_some();
                    let result = if known {
                        Value::None
                    } else {
                        error_value(format!("tcp_close: unknown socket {}", id))
                    };
                    self.stack.push(result);
                }
            }
        }
    }

    // ── Frame and stack helpers ────────────────────────────────────────

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::new("stack underflow"))
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::new("stack underflow"))
    }

    fn pop_pair(&mut self) -> Result<(Value, Value), RuntimeError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        Ok((lhs, rhs))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        if self.stack.len() < n {
            return Err(RuntimeError::new("stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_int(&mut self, what: &str) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::new(format!(
                "{} must be an integer, found {}",
                what,
                other.inspect_nested()
            ))),
        }
    }

    fn pop_str(&mut self, what: &str) -> Result<String, RuntimeError> {
        match self.pop()? {
            Value::Str(s) => Ok(s.as_ref().clone()),
            other => Err(RuntimeError::new(format!(
                "{} must be a string, found {}",
                what,
                other.inspect_nested()
            ))),
        }
    }

    fn pop_array(&mut self, what: &str) -> Result<Rc<Vec<Value>>, RuntimeError> {
        match self.pop()? {
            Value::Array(a) => Ok(a),
            other => Err(RuntimeError::new(format!(
                "{} expects an array, found {}",
                what,
                other.inspect_nested()
            ))),
        }
    }

    fn pop_socket_id(&mut self) -> Result<u32, RuntimeError> {
        match self.pop()? {
            Value::Socket { id, .. } => Ok(id),
            Value::Int(n) => Ok(n as u32),
            other => Err(RuntimeError::new(format!(
                "expected a socket, found {}",
                other.inspect_nested()
            ))),
        }
    }

    fn const_str(&self, index: usize) -> Result<String, RuntimeError> {
        match self.program.constants.get(index) {
            Some(Value::Str(s)) => Ok(s.as_ref().clone()),
            _ => Err(RuntimeError::new("constant is not a string")),
        }
    }

    fn local(&self, index: usize) -> Result<&Value, RuntimeError> {
        let frame = self.frames.last().expect("frame");
        let func = &self.program.functions[frame.func_index];
        if index >= func.locals {
            return Err(RuntimeError::new(format!(
                "local slot {} out of range for {}",
                index, func.name
            )));
        }
        Ok(&self.stack[frame.base_slot + index])
    }

    fn local_mut(&mut self, index: usize) -> Result<&mut Value, RuntimeError> {
        let frame = self.frames.last().expect("frame");
        let func = &self.program.functions[frame.func_index];
        if index >= func.locals {
            return Err(RuntimeError::new(format!(
                "local slot {} out of range for {}",
                index, func.name
            )));
        }
        let slot = frame.base_slot + index;
        Ok(&mut self.stack[slot])
    }

    fn jump_to(
        &mut self,
        target: usize,
        code_start: usize,
        code_len: usize,
    ) -> Result<(), RuntimeError> {
        if target < code_start || target > code_start + code_len {
            return Err(RuntimeError::new("jump target out of function range"));
        }
        self.frames.last_mut().expect("frame").ip = target - code_start;
        Ok(())
    }

    /// `call n`: pop the callee (must be a closure), check arity, reserve
    /// the remaining locals, push a new frame.
    fn call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::new("call stack overflow"));
        }
        let callee = self.pop()?;
        let closure = match callee {
            Value::Closure(c) => c,
            other => {
                return Err(RuntimeError::new(format!(
                    "value {} is not callable",
                    other.inspect_nested()
                )))
            }
        };
        let func = &self.program.functions[closure.func_index];
        if argc != func.arity {
            return Err(RuntimeError::new(format!(
                "function {} expects {} arguments, got {}",
                func.name, func.arity, argc
            )));
        }
        if self.stack.len() < argc {
            return Err(RuntimeError::new("stack underflow"));
        }
        let base_slot = self.stack.len() - argc;
        for _ in func.arity..func.locals {
            self.stack.push(Value::None);
        }
        self.frames.push(Frame {
            func_index: closure.func_index,
            ip: 0,
            base_slot,
            captures: closure.captures.clone(),
        });
        Ok(())
    }

    /// `tail_call n`: reuse the current frame. Collect the arguments,
    /// truncate the stack back to `base_slot`, re-push arguments and
    /// `none` locals, and rewrite the frame's function and captures.
    fn tail_call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee = self.pop()?;
        let closure = match callee {
            Value::Closure(c) => c,
            other => {
                return Err(RuntimeError::new(format!(
                    "value {} is not callable",
                    other.inspect_nested()
                )))
            }
        };
        let func = &self.program.functions[closure.func_index];
        if argc != func.arity {
            return Err(RuntimeError::new(format!(
                "function {} expects {} arguments, got {}",
                func.name, func.arity, argc
            )));
        }
        let locals = func.locals;
        let args = self.pop_n(argc)?;
        let frame = self.frames.last_mut().expect("frame");
        self.stack.truncate(frame.base_slot);
        self.stack.extend(args);
        for _ in argc..locals {
            self.stack.push(Value::None);
        }
        frame.func_index = closure.func_index;
        frame.captures = closure.captures.clone();
        frame.ip = 0;
        Ok(())
    }

    fn require_io(&self, what: &str) -> Result<(), RuntimeError> {
        if self.io_enabled {
            Ok(())
        } else {
            Err(RuntimeError::new(format!(
                "{} requires the --experimental-shitty-io flag",
                what
            )))
        }
    }

    // ── Value operations ───────────────────────────────────────────────

    fn binary_add(&mut self) -> Result<(), RuntimeError> {
        let (lhs, rhs) = self.pop_pair()?;
        let result = match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
            (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
            (Value::Str(a), Value::Str(b)) => Value::str(format!("{}{}", a, b)),
            _ => {
                return Err(RuntimeError::new(format!(
                    "unsupported operands for '+': {} and {}",
                    lhs.inspect_nested(),
                    rhs.inspect_nested()
                )))
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn binary_numeric(
        &mut self,
        op: &str,
        int_op: fn(i64, i64) -> i64,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<(), RuntimeError> {
        let (lhs, rhs) = self.pop_pair()?;
        let result = match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b)),
            (Value::Float(a), Value::Float(b)) => Value::Float(float_op(*a, *b)),
            (Value::Int(a), Value::Float(b)) => Value::Float(float_op(*a as f64, *b)),
            (Value::Float(a), Value::Int(b)) => Value::Float(float_op(*a, *b as f64)),
            _ => {
                return Err(RuntimeError::new(format!(
                    "unsupported operands for '{}': {} and {}",
                    op,
                    lhs.inspect_nested(),
                    rhs.inspect_nested()
                )))
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn binary_div(&mut self) -> Result<(), RuntimeError> {
        let (lhs, rhs) = self.pop_pair()?;
        let result = match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => {
                return Err(RuntimeError::new("division by zero"))
            }
            (Value::Int(a), Value::Int(b)) => Value::Int(a / b),
            (_, Value::Float(b)) if *b == 0.0 => {
                return Err(RuntimeError::new("division by zero"))
            }
            (Value::Float(_), Value::Int(0)) => {
                return Err(RuntimeError::new("division by zero"))
            }
            (Value::Float(a), Value::Float(b)) => Value::Float(a / b),
            (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 / b),
            (Value::Float(a), Value::Int(b)) => Value::Float(a / *b as f64),
            _ => {
                return Err(RuntimeError::new(format!(
                    "unsupported operands for '/': {} and {}",
                    lhs.inspect_nested(),
                    rhs.inspect_nested()
                )))
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn binary_mod(&mut self) -> Result<(), RuntimeError> {
        let (lhs, rhs) = self.pop_pair()?;
        let result = match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => {
                return Err(RuntimeError::new("division by zero"))
            }
            (Value::Int(a), Value::Int(b)) => Value::Int(a % b),
            (Value::Float(a), Value::Float(b)) if *b != 0.0 => Value::Float(a % b),
            _ => {
                return Err(RuntimeError::new(format!(
                    "unsupported operands for '%': {} and {}",
                    lhs.inspect_nested(),
                    rhs.inspect_nested()
                )))
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn binary_compare(
        &mut self,
        op: &str,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> Result<(), RuntimeError> {
        let (lhs, rhs) = self.pop_pair()?;
        let ordering = match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            _ => None,
        };
        match ordering {
            Some(o) => {
                self.stack.push(Value::Bool(accept(o)));
                Ok(())
            }
            None => Err(RuntimeError::new(format!(
                "unsupported operands for '{}': {} and {}",
                op,
                lhs.inspect_nested(),
                rhs.inspect_nested()
            ))),
        }
    }
}

fn error_value(message: String) -> Value {
    Value::Error(Rc::new(Value::str(message)))
}
