//! Function and class declaration compilation.

use crate::ast::{ClassDecl, FunctionDecl, MethodDecl};
use crate::error::CompileError;
use crate::runtime::value::Value;
use crate::vm::compiler::{CompileResult, Compiler, FunctionType, Storage};
use crate::vm::opcode::OpCode;

impl<'a> Compiler<'a> {
    pub(super) fn compile_function_decl(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        let line = decl.span.line as u32;
        let span = decl.span;
        if decl.params.len() > u8::MAX as usize {
            return Err(CompileError::new(
                format!("Function '{}' has too many parameters.", decl.name),
                span,
            ));
        }

        // The name is bound before the body is compiled so the function
        // can call itself.
        let storage = if self.at_script_top_level() {
            Storage::Global(self.add_global(&decl.name, span)?)
        } else {
            let slot = self.add_local(&decl.name, span)?;
            self.initialize_local(slot, self.current.scope_depth);
            Storage::Local(slot)
        };

        let function =
            self.begin_function(&decl.name, decl.params.len() as u8, FunctionType::Function)?;
        for param in &decl.params {
            let slot = self.add_local(param, span)?;
            self.initialize_local(slot, 0);
        }
        self.compile_function_body(&decl.body, line)?;
        self.end_function();

        let dest = self.push_stack_slot(span)?;
        let index = self.add_constant(Value::Obj(function), span)?;
        self.emit_op(OpCode::LoadConst, line);
        self.emit_byte(dest, line);
        self.emit_u16(index, line);
        // Reachable through the enclosing constant pool from here on.
        self.vm.pop_root();

        self.install_register(&storage, dest, line);
        self.pop_stack_slots(1);
        Ok(())
    }

    pub(super) fn compile_class_decl(&mut self, decl: &ClassDecl) -> CompileResult<()> {
        let line = decl.span.line as u32;
        let span = decl.span;

        let name_index = self.string_constant(&decl.name, span)?;
        let storage = if self.at_script_top_level() {
            Storage::Global(self.add_global(&decl.name, span)?)
        } else {
            Storage::Local(self.add_local(&decl.name, span)?)
        };

        let class_reg = self.push_stack_slot(span)?;
        self.emit_op(OpCode::Class, line);
        self.emit_byte(class_reg, line);
        self.emit_u16(name_index, line);

        if let Storage::Local(slot) = &storage {
            self.initialize_local(*slot, self.current.scope_depth);
        }
        self.install_register(&storage, class_reg, line);

        for method in &decl.methods {
            self.compile_method(method, class_reg)?;
        }

        self.pop_stack_slots(1);
        Ok(())
    }

    /// Compile one method body and register it on the class sitting in
    /// `class_reg`. The receiver occupies the method's register 0, so its
    /// arity is the declared parameter count plus one.
    fn compile_method(&mut self, method: &MethodDecl, class_reg: u8) -> CompileResult<()> {
        let line = method.span.line as u32;
        let span = method.span;
        let arity = method.params.len() + 1;
        if arity > u8::MAX as usize {
            return Err(CompileError::new(
                format!("Method '{}' has too many parameters.", method.name),
                span,
            ));
        }

        let function_type = if method.is_constructor {
            FunctionType::Constructor
        } else {
            FunctionType::Method
        };
        let function = self.begin_function(&method.name, arity as u8, function_type)?;

        let this_slot = self.add_local("this", span)?;
        self.initialize_local(this_slot, 0);
        for param in &method.params {
            let slot = self.add_local(param, span)?;
            self.initialize_local(slot, 0);
        }
        self.compile_function_body(&method.body, line)?;
        self.end_function();

        let dest = self.push_stack_slot(span)?;
        let index = self.add_constant(Value::Obj(function), span)?;
        self.emit_op(OpCode::LoadConst, line);
        self.emit_byte(dest, line);
        self.emit_u16(index, line);
        self.vm.pop_root();

        let name_index = self.string_constant(&method.name, span)?;
        self.emit_op(OpCode::Method, line);
        self.emit_byte(class_reg, line);
        self.emit_u16(name_index, line);
        self.emit_byte(dest, line);
        self.pop_stack_slots(1);
        Ok(())
    }
}
