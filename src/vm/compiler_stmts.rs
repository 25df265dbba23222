//! Statement compilation.

use crate::ast::{Stmt, StmtKind};
use crate::error::CompileError;
use crate::vm::compiler::{CompileResult, Compiler, FunctionType, Storage};
use crate::vm::opcode::OpCode;

impl<'a> Compiler<'a> {
    pub(super) fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        // Any non-expression statement consumes the script's pending
        // trailing-expression value.
        if !matches!(stmt.kind, StmtKind::Expression(_)) {
            self.discard_pending_expression();
        }

        match &stmt.kind {
            StmtKind::Expression(expr) => self.compile_expression_statement(expr),
            StmtKind::Let { name, initializer } => self.compile_let(name, initializer, stmt),
            StmtKind::Block(statements) => {
                self.begin_scope();
                for inner in statements {
                    self.compile_statement(inner)?;
                }
                self.end_scope();
                Ok(())
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.compile_if(condition, then_branch, else_branch.as_deref(), stmt),
            StmtKind::While { condition, body } => self.compile_while(condition, body, stmt),
            StmtKind::Return(value) => self.compile_return(value.as_ref(), stmt),
            StmtKind::Function(decl) => self.compile_function_decl(decl),
            StmtKind::Class(decl) => self.compile_class_decl(decl),
        }
    }

    fn compile_expression_statement(&mut self, expr: &crate::ast::Expr) -> CompileResult<()> {
        if self.at_script_top_level() {
            // Keep the value live as the script's result; only the most
            // recent expression statement is retained.
            self.discard_pending_expression();
            self.compile_expression(expr)?;
            self.current.pending = Some(self.stack_top_register(0));
            return Ok(());
        }
        self.compile_expression(expr)?;
        self.pop_stack_slots(1);
        Ok(())
    }

    fn compile_let(
        &mut self,
        name: &str,
        initializer: &Option<crate::ast::Expr>,
        stmt: &Stmt,
    ) -> CompileResult<()> {
        let line = stmt.span.line as u32;
        let span = stmt.span;

        if self.current.scope_depth > 0 {
            self.check_duplicate_local(name, span)?;
            let slot = self.add_local(name, span)?;
            if let Some(init) = initializer {
                self.compile_expression(init)?;
                let value_reg = self.stack_top_register(0);
                self.install_register(&Storage::Local(slot), value_reg, line);
                self.pop_stack_slots(1);
            } else {
                let reg = self.current.locals[slot].reg;
                self.emit_op(OpCode::LoadNull, line);
                self.emit_byte(reg, line);
            }
            self.initialize_local(slot, self.current.scope_depth);
            return Ok(());
        }

        // Script top level: the slot is assigned before the initializer is
        // compiled, so `let x = x;` resolves but fails at run time.
        let slot = self.add_global(name, span)?;
        if let Some(init) = initializer {
            self.compile_expression(init)?;
            let value_reg = self.stack_top_register(0);
            self.install_register(&Storage::Global(slot), value_reg, line);
            self.pop_stack_slots(1);
        } else {
            let dest = self.push_stack_slot(span)?;
            self.emit_op(OpCode::LoadNull, line);
            self.emit_byte(dest, line);
            self.install_register(&Storage::Global(slot), dest, line);
            self.pop_stack_slots(1);
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &crate::ast::Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        stmt: &Stmt,
    ) -> CompileResult<()> {
        let line = stmt.span.line as u32;
        let span = stmt.span;

        self.compile_expression(condition)?;
        let condition_reg = self.stack_top_register(0);
        let then_jump = self.emit_jump_if_false(condition_reg, line);
        self.pop_stack_slots(1);

        self.compile_statement(then_branch)?;

        let else_jump = self.emit_jump(line);
        self.patch_jump(then_jump, span)?;

        if let Some(else_stmt) = else_branch {
            self.compile_statement(else_stmt)?;
        }
        self.patch_jump(else_jump, span)
    }

    fn compile_while(
        &mut self,
        condition: &crate::ast::Expr,
        body: &Stmt,
        stmt: &Stmt,
    ) -> CompileResult<()> {
        let line = stmt.span.line as u32;
        let span = stmt.span;

        let loop_start = self.current_offset();
        self.compile_expression(condition)?;
        let condition_reg = self.stack_top_register(0);
        let exit_jump = self.emit_jump_if_false(condition_reg, line);
        self.pop_stack_slots(1);

        self.compile_statement(body)?;
        self.emit_loop(loop_start, line, span)?;
        self.patch_jump(exit_jump, span)
    }

    fn compile_return(
        &mut self,
        value: Option<&crate::ast::Expr>,
        stmt: &Stmt,
    ) -> CompileResult<()> {
        let line = stmt.span.line as u32;

        if self.current.function_type == FunctionType::Constructor && value.is_some() {
            return Err(CompileError::new(
                "Cannot return a value from constructor.",
                stmt.span,
            ));
        }
        match value {
            Some(expr) => {
                self.compile_expression(expr)?;
                let value_reg = self.stack_top_register(0);
                self.emit_op(OpCode::Return, line);
                self.emit_byte(value_reg, line);
                self.pop_stack_slots(1);
                Ok(())
            }
            None => self.emit_return(line),
        }
    }
}
