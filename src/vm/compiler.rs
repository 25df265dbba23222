//! Bytecode compiler: walks the AST emitting register-machine bytecode.
//!
//! Each function's frame is a fixed array of registers. Locals occupy a
//! dense prefix; above them lives a compile-time simulated stack for
//! expression evaluation. The chunk's `register_count` tracks the high
//! water mark of `locals + stack depth` across the whole compilation.

use crate::ast::Program;
use crate::error::CompileError;
use crate::runtime::heap::GcRef;
use crate::runtime::value::Value;
use crate::span::Span;
use crate::vm::chunk::Chunk;
use crate::vm::opcode::OpCode;
use crate::vm::vm::Vm;

pub type CompileResult<T> = Result<T, CompileError>;

pub(super) const MAX_LOCALS: usize = 256;

/// The bytecode compiler. Runs exactly once per program and yields the
/// top-level script function.
pub struct Compiler<'a> {
    pub(super) vm: &'a mut Vm,
    /// State for the function currently being compiled.
    pub(super) current: FunctionState,
    /// Enclosing function states, innermost last.
    pub(super) enclosing: Vec<FunctionState>,
    /// Global names in declaration order; the position is the 16-bit slot.
    pub(super) globals: Vec<String>,
}

/// Per-function compilation state.
pub(super) struct FunctionState {
    /// The heap function object whose chunk is being filled in.
    pub function: GcRef,
    pub function_type: FunctionType,
    pub locals: Vec<Local>,
    pub scope_depth: u32,
    /// Simulated expression stack depth; the first stack slot sits at
    /// register index `locals.len()`.
    pub stack_depth: usize,
    /// Register holding the trailing expression-statement value the script
    /// keeps live for its implicit return. Outermost compiler only.
    pub pending: Option<u8>,
}

impl FunctionState {
    pub(super) fn new(function: GcRef, function_type: FunctionType) -> Self {
        Self {
            function,
            function_type,
            locals: Vec::new(),
            scope_depth: 0,
            stack_depth: 0,
            pending: None,
        }
    }
}

/// A local variable descriptor.
pub(super) struct Local {
    pub name: String,
    /// Scope depth where the declaration completed; `None` until the
    /// initializer has run.
    pub depth: Option<u32>,
    pub reg: u8,
    pub initialized: bool,
}

/// What kind of function body is being compiled. Constructors synthesize
/// a default return of the receiver instead of null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FunctionType {
    Script,
    Function,
    Method,
    Constructor,
}

/// Where a declared name lives.
pub(super) enum Storage {
    Global(u16),
    Local(usize),
}

impl<'a> Compiler<'a> {
    /// Compile a program into a top-level function on the VM heap.
    pub fn compile(vm: &mut Vm, program: &Program) -> CompileResult<GcRef> {
        let roots_before = vm.root_count();
        let function = vm.alloc_function(None, 0);
        vm.push_root(Value::Obj(function));

        let mut compiler = Compiler {
            vm,
            current: FunctionState::new(function, FunctionType::Script),
            enclosing: Vec::new(),
            globals: Vec::new(),
        };
        let result = compiler.compile_program(program);
        compiler.vm.truncate_roots(roots_before);
        result?;
        Ok(function)
    }

    fn compile_program(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        let line = program
            .statements
            .last()
            .map(|stmt| stmt.span.line as u32)
            .unwrap_or(0);
        self.emit_return(line)
    }

    // ===== Register bookkeeping =====

    pub(super) fn update_register_usage(&mut self, span: Span) -> CompileResult<()> {
        let total = self.current.locals.len() + self.current.stack_depth;
        let function = self.vm.heap.function_mut(self.current.function);
        if total > function.register_count {
            function.register_count = total;
        }
        if function.register_count > u8::MAX as usize {
            return Err(CompileError::new(
                "Function requires more than 255 registers.",
                span,
            ));
        }
        Ok(())
    }

    fn stack_register(&self, depth_index: usize) -> u8 {
        (self.current.locals.len() + depth_index) as u8
    }

    /// Reserve the next expression-stack slot and return its register.
    pub(super) fn push_stack_slot(&mut self, span: Span) -> CompileResult<u8> {
        let dest = self.stack_register(self.current.stack_depth);
        self.current.stack_depth += 1;
        self.update_register_usage(span)?;
        Ok(dest)
    }

    pub(super) fn pop_stack_slots(&mut self, count: usize) {
        self.current.stack_depth = self.current.stack_depth.saturating_sub(count);
    }

    /// Register of the stack slot `distance` below the top.
    pub(super) fn stack_top_register(&self, distance: usize) -> u8 {
        self.stack_register(self.current.stack_depth - 1 - distance)
    }

    // ===== Scope management =====

    pub(super) fn begin_scope(&mut self) {
        self.current.scope_depth += 1;
    }

    pub(super) fn end_scope(&mut self) {
        self.current.scope_depth -= 1;
        while let Some(local) = self.current.locals.last() {
            let out_of_scope = match local.depth {
                Some(depth) => depth > self.current.scope_depth,
                None => true,
            };
            if !out_of_scope {
                break;
            }
            self.current.locals.pop();
        }
    }

    pub(super) fn add_local(&mut self, name: &str, span: Span) -> CompileResult<usize> {
        if self.current.locals.len() >= MAX_LOCALS {
            return Err(CompileError::new("Too many local variables.", span));
        }
        if self.current.locals.len() >= u8::MAX as usize {
            return Err(CompileError::new(
                "Too many registers required for locals.",
                span,
            ));
        }
        let reg = self.current.locals.len() as u8;
        self.current.locals.push(Local {
            name: name.to_string(),
            depth: None,
            reg,
            initialized: false,
        });

        let count = self.current.locals.len();
        let function = self.vm.heap.function_mut(self.current.function);
        if count > function.register_count {
            function.register_count = count;
        }
        Ok(count - 1)
    }

    /// Mark a declared local as usable at the given depth.
    pub(super) fn initialize_local(&mut self, index: usize, depth: u32) {
        let local = &mut self.current.locals[index];
        local.depth = Some(depth);
        local.initialized = true;
    }

    /// Walk the locals innermost-out. Reading a local whose initializer has
    /// not completed is an error; assignment to it is allowed.
    pub(super) fn resolve_local(
        &self,
        name: &str,
        for_assignment: bool,
        span: Span,
    ) -> CompileResult<Option<usize>> {
        for (i, local) in self.current.locals.iter().enumerate().rev() {
            if local.name == name {
                if !local.initialized && !for_assignment {
                    return Err(CompileError::new(
                        format!("Cannot read local variable '{}' before initialization.", name),
                        span,
                    ));
                }
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Error when a name is redeclared in the same scope.
    pub(super) fn check_duplicate_local(&self, name: &str, span: Span) -> CompileResult<()> {
        for local in self.current.locals.iter().rev() {
            if let Some(depth) = local.depth {
                if depth < self.current.scope_depth {
                    break;
                }
            }
            if local.name == name {
                return Err(CompileError::new(
                    format!("Variable '{}' already declared in this scope.", name),
                    span,
                ));
            }
        }
        Ok(())
    }

    // ===== Globals =====

    pub(super) fn find_global(&self, name: &str) -> Option<u16> {
        self.globals.iter().position(|g| g == name).map(|i| i as u16)
    }

    pub(super) fn add_global(&mut self, name: &str, span: Span) -> CompileResult<u16> {
        if self.find_global(name).is_some() {
            return Err(CompileError::new(
                format!("Global '{}' already defined.", name),
                span,
            ));
        }
        if self.globals.len() >= u16::MAX as usize {
            return Err(CompileError::new("Too many global variables defined.", span));
        }
        let slot = self.globals.len() as u16;
        self.globals.push(name.to_string());
        Ok(slot)
    }

    /// True for declarations at depth 0 of the outermost (script) compiler.
    pub(super) fn at_script_top_level(&self) -> bool {
        self.enclosing.is_empty() && self.current.scope_depth == 0
    }

    /// One install path for `let`, `function` and `class`: write the value
    /// sitting in `src` into its declared storage.
    pub(super) fn install_register(&mut self, storage: &Storage, src: u8, line: u32) {
        match storage {
            Storage::Global(slot) => {
                self.emit_op(OpCode::DefineGlobal, line);
                self.emit_byte(src, line);
                self.emit_u16(*slot, line);
            }
            Storage::Local(index) => {
                let reg = self.current.locals[*index].reg;
                if reg != src {
                    self.emit_op(OpCode::Move, line);
                    self.emit_byte(reg, line);
                    self.emit_byte(src, line);
                }
            }
        }
    }

    // ===== Nested functions =====

    /// Allocate a fresh heap function and make it the compilation target.
    /// The new function stays temp-rooted until the caller installs it into
    /// a constant pool and pops the root.
    pub(super) fn begin_function(
        &mut self,
        name: &str,
        arity: u8,
        function_type: FunctionType,
    ) -> CompileResult<GcRef> {
        let name_ref = self.vm.intern_string(name);
        self.vm.push_root(Value::Obj(name_ref));
        let function = self.vm.alloc_function(Some(name_ref), arity);
        self.vm.pop_root();
        self.vm.push_root(Value::Obj(function));

        let state = FunctionState::new(function, function_type);
        self.enclosing.push(std::mem::replace(&mut self.current, state));
        Ok(function)
    }

    /// Return to the enclosing function. The finished function's temp root
    /// is still held; the caller pops it after installing the constant.
    pub(super) fn end_function(&mut self) {
        self.current = self.enclosing.pop().expect("unbalanced end_function");
    }

    /// Compile a function body block and synthesize the default return.
    pub(super) fn compile_function_body(
        &mut self,
        body: &[crate::ast::Stmt],
        line: u32,
    ) -> CompileResult<()> {
        self.begin_scope();
        for stmt in body {
            self.compile_statement(stmt)?;
        }
        self.end_scope();
        self.emit_return(line)
    }

    /// Synthesize a return: the pending script value if present, the
    /// receiver in a constructor, null otherwise.
    pub(super) fn emit_return(&mut self, line: u32) -> CompileResult<()> {
        if self.enclosing.is_empty() {
            if let Some(reg) = self.current.pending.take() {
                self.emit_op(OpCode::Return, line);
                self.emit_byte(reg, line);
                self.current.stack_depth = 0;
                return Ok(());
            }
        }
        if self.current.function_type == FunctionType::Constructor
            && !self.current.locals.is_empty()
        {
            let receiver = self.current.locals[0].reg;
            self.emit_op(OpCode::Return, line);
            self.emit_byte(receiver, line);
            return Ok(());
        }
        let dest = self.push_stack_slot(Span::default())?;
        self.emit_op(OpCode::LoadNull, line);
        self.emit_byte(dest, line);
        self.emit_op(OpCode::Return, line);
        self.emit_byte(dest, line);
        self.pop_stack_slots(1);
        Ok(())
    }

    /// Drop the pending trailing-expression value, if any. Only meaningful
    /// at depth 0 of the outermost compiler.
    pub(super) fn discard_pending_expression(&mut self) {
        if self.enclosing.is_empty()
            && self.current.scope_depth == 0
            && self.current.pending.take().is_some()
        {
            self.pop_stack_slots(1);
        }
    }

    // ===== Emission =====

    pub(super) fn chunk_mut(&mut self) -> &mut Chunk {
        &mut self.vm.heap.function_mut(self.current.function).chunk
    }

    pub(super) fn emit_op(&mut self, op: OpCode, line: u32) {
        self.chunk_mut().write_op(op, line);
    }

    pub(super) fn emit_byte(&mut self, byte: u8, line: u32) {
        self.chunk_mut().write_byte(byte, line);
    }

    pub(super) fn emit_u16(&mut self, value: u16, line: u32) {
        self.chunk_mut().write_u16(value, line);
    }

    pub(super) fn add_constant(&mut self, value: Value, span: Span) -> CompileResult<u16> {
        self.chunk_mut()
            .add_constant(value)
            .ok_or_else(|| CompileError::new("Too many constants in chunk.", span))
    }

    /// Intern `text` and add it to the constant pool, keeping the string
    /// rooted across the insertion.
    pub(super) fn string_constant(&mut self, text: &str, span: Span) -> CompileResult<u16> {
        let string = self.vm.intern_string(text);
        self.vm.push_root(Value::Obj(string));
        let index = self.add_constant(Value::Obj(string), span);
        self.vm.pop_root();
        index
    }

    /// Emit an unconditional forward jump; returns the operand offset.
    pub(super) fn emit_jump(&mut self, line: u32) -> usize {
        self.emit_op(OpCode::Jump, line);
        let offset = self.chunk_mut().len();
        self.emit_u16(0xffff, line);
        offset
    }

    /// Emit a conditional forward jump; returns the operand offset.
    pub(super) fn emit_jump_if_false(&mut self, condition: u8, line: u32) -> usize {
        self.emit_op(OpCode::JumpIfFalse, line);
        self.emit_byte(condition, line);
        let offset = self.chunk_mut().len();
        self.emit_u16(0xffff, line);
        offset
    }

    /// Point the placeholder at `offset` to the current end of the chunk.
    pub(super) fn patch_jump(&mut self, offset: usize, span: Span) -> CompileResult<()> {
        let jump = self.chunk_mut().len() - offset - 2;
        if jump > u16::MAX as usize {
            return Err(CompileError::new("Jump offset out of range.", span));
        }
        self.chunk_mut().patch_u16(offset, jump as u16);
        Ok(())
    }

    /// Emit a backward jump to `loop_start`.
    pub(super) fn emit_loop(&mut self, loop_start: usize, line: u32, span: Span) -> CompileResult<()> {
        self.emit_op(OpCode::Loop, line);
        self.emit_u16(0, line);
        let end = self.chunk_mut().len();
        let offset = end - loop_start;
        if offset > u16::MAX as usize {
            return Err(CompileError::new("Loop body too large.", span));
        }
        self.chunk_mut().patch_u16(end - 2, offset as u16);
        Ok(())
    }

    pub(super) fn current_offset(&mut self) -> usize {
        self.chunk_mut().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn compile_source(source: &str) -> CompileResult<GcRef> {
        let mut vm = Vm::new();
        let program = Parser::new(source).parse().expect("parse error");
        Compiler::compile(&mut vm, &program)
    }

    fn compile_error(source: &str) -> String {
        compile_source(source).unwrap_err().to_string()
    }

    #[test]
    fn test_compile_simple_expression() {
        assert!(compile_source("1 + 2;").is_ok());
    }

    #[test]
    fn test_compile_let_and_function() {
        assert!(compile_source("let x = 42;").is_ok());
        assert!(compile_source("function add(a, b) { return a + b; }").is_ok());
    }

    #[test]
    fn test_undefined_variable() {
        assert!(compile_error("missing;").contains("Undefined variable 'missing'."));
    }

    #[test]
    fn test_duplicate_global() {
        assert!(compile_error("let x = 1; let x = 2;").contains("Global 'x' already defined."));
    }

    #[test]
    fn test_duplicate_local() {
        let message = compile_error("{ let x = 1; let x = 2; }");
        assert!(message.contains("Variable 'x' already declared in this scope."));
    }

    #[test]
    fn test_shadowing_in_inner_scope_allowed() {
        assert!(compile_source("{ let x = 1; { let x = 2; x; } }").is_ok());
    }

    #[test]
    fn test_read_local_before_initialization() {
        let message = compile_error("{ let x = x; }");
        assert!(message.contains("Cannot read local variable 'x' before initialization."));
    }

    #[test]
    fn test_return_value_in_constructor_rejected() {
        let message = compile_error("class C { constructor() { return 1; } }");
        assert!(message.contains("Cannot return a value from constructor."));
    }

    #[test]
    fn test_bare_return_in_constructor_allowed() {
        assert!(compile_source("class C { constructor() { return; } }").is_ok());
    }

    #[test]
    fn test_this_outside_method() {
        let message = compile_error("this;");
        assert!(message.contains("Cannot use 'this' outside of class method."));
    }

    #[test]
    fn test_register_count_tracks_high_water() {
        let mut vm = Vm::new();
        let program = Parser::new("let a = 1; 1 + 2 + 3;").parse().unwrap();
        let function = Compiler::compile(&mut vm, &program).unwrap();
        // The left-associative chain holds at most two operands at once.
        assert_eq!(vm.heap.function(function).register_count, 2);
    }

    #[test]
    fn test_script_function_has_no_name() {
        let mut vm = Vm::new();
        let program = Parser::new("1;").parse().unwrap();
        let function = Compiler::compile(&mut vm, &program).unwrap();
        assert!(vm.heap.function(function).name.is_none());
        assert_eq!(vm.heap.function(function).arity, 0);
    }

    #[test]
    fn test_method_arity_counts_receiver() {
        let mut vm = Vm::new();
        let program = Parser::new("class C { m(a, b) { } }").parse().unwrap();
        let function = Compiler::compile(&mut vm, &program).unwrap();
        // The method function is a constant of the script chunk.
        let constants = &vm.heap.function(function).chunk.constants;
        let method = constants
            .iter()
            .find_map(|&c| match c {
                Value::Obj(r) => match &vm.heap.get(r).kind {
                    crate::runtime::object::ObjKind::Function(f) => Some(f),
                    _ => None,
                },
                _ => None,
            })
            .expect("method constant present");
        assert_eq!(method.arity, 3);
    }

    #[test]
    fn test_no_temp_roots_leak() {
        let mut vm = Vm::new();
        let program = Parser::new("function f() { return 1; } f();").parse().unwrap();
        Compiler::compile(&mut vm, &program).unwrap();
        assert_eq!(vm.root_count(), 0);

        // Roots are also restored when compilation fails.
        let bad = Parser::new("function g() { return missing; }").parse().unwrap();
        assert!(Compiler::compile(&mut vm, &bad).is_err());
        assert_eq!(vm.root_count(), 0);
    }
}
