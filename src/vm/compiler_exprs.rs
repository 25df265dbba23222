//! Expression compilation.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::CompileError;
use crate::runtime::value::Value;
use crate::vm::compiler::{CompileResult, Compiler};
use crate::vm::opcode::OpCode;

impl<'a> Compiler<'a> {
    pub(super) fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        let line = expr.span.line as u32;
        let span = expr.span;

        match &expr.kind {
            ExprKind::NumberLiteral(n) => {
                let dest = self.push_stack_slot(span)?;
                let index = self.add_constant(Value::Number(*n), span)?;
                self.emit_op(OpCode::LoadConst, line);
                self.emit_byte(dest, line);
                self.emit_u16(index, line);
                Ok(())
            }

            ExprKind::StringLiteral(s) => {
                let dest = self.push_stack_slot(span)?;
                let index = self.string_constant(s, span)?;
                self.emit_op(OpCode::LoadConst, line);
                self.emit_byte(dest, line);
                self.emit_u16(index, line);
                Ok(())
            }

            ExprKind::BoolLiteral(b) => {
                let dest = self.push_stack_slot(span)?;
                self.emit_op(if *b { OpCode::LoadTrue } else { OpCode::LoadFalse }, line);
                self.emit_byte(dest, line);
                Ok(())
            }

            ExprKind::Null => {
                let dest = self.push_stack_slot(span)?;
                self.emit_op(OpCode::LoadNull, line);
                self.emit_byte(dest, line);
                Ok(())
            }

            ExprKind::Variable(name) => {
                let local = self.resolve_local(name, false, span)?;
                let dest = self.push_stack_slot(span)?;
                if let Some(index) = local {
                    let reg = self.current.locals[index].reg;
                    self.emit_op(OpCode::Move, line);
                    self.emit_byte(dest, line);
                    self.emit_byte(reg, line);
                    return Ok(());
                }
                let Some(slot) = self.find_global(name) else {
                    self.pop_stack_slots(1);
                    return Err(CompileError::new(
                        format!("Undefined variable '{}'.", name),
                        span,
                    ));
                };
                self.emit_op(OpCode::GetGlobal, line);
                self.emit_byte(dest, line);
                self.emit_u16(slot, line);
                Ok(())
            }

            ExprKind::Unary { operator, operand } => {
                self.compile_expression(operand)?;
                let reg = self.stack_top_register(0);
                let op = match operator {
                    UnaryOp::Negate => OpCode::Negate,
                    UnaryOp::Not => OpCode::Not,
                };
                self.emit_op(op, line);
                self.emit_byte(reg, line);
                self.emit_byte(reg, line);
                Ok(())
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let right_reg = self.stack_top_register(0);
                let left_reg = self.stack_top_register(1);
                let dest = left_reg;

                // >=, <= and != are emitted as the inverse comparison
                // followed by NOT.
                let (op, negate) = match operator {
                    BinaryOp::Add => (OpCode::Add, false),
                    BinaryOp::Subtract => (OpCode::Subtract, false),
                    BinaryOp::Multiply => (OpCode::Multiply, false),
                    BinaryOp::Divide => (OpCode::Divide, false),
                    BinaryOp::Equal => (OpCode::Equal, false),
                    BinaryOp::NotEqual => (OpCode::Equal, true),
                    BinaryOp::Greater => (OpCode::Greater, false),
                    BinaryOp::GreaterEqual => (OpCode::Less, true),
                    BinaryOp::Less => (OpCode::Less, false),
                    BinaryOp::LessEqual => (OpCode::Greater, true),
                };
                self.emit_op(op, line);
                self.emit_byte(dest, line);
                self.emit_byte(left_reg, line);
                self.emit_byte(right_reg, line);
                self.pop_stack_slots(1);
                if negate {
                    self.emit_op(OpCode::Not, line);
                    self.emit_byte(dest, line);
                    self.emit_byte(dest, line);
                }
                Ok(())
            }

            ExprKind::Grouping(inner) => self.compile_expression(inner),

            ExprKind::Assign { name, value } => {
                self.compile_expression(value)?;
                let value_reg = self.stack_top_register(0);
                if let Some(index) = self.resolve_local(name, true, span)? {
                    let reg = self.current.locals[index].reg;
                    self.emit_op(OpCode::Move, line);
                    self.emit_byte(reg, line);
                    self.emit_byte(value_reg, line);
                    return Ok(());
                }
                let Some(slot) = self.find_global(name) else {
                    return Err(CompileError::new(
                        format!("Undefined variable '{}'.", name),
                        span,
                    ));
                };
                self.emit_op(OpCode::SetGlobal, line);
                self.emit_byte(value_reg, line);
                self.emit_u16(slot, line);
                Ok(())
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                if arguments.len() > u8::MAX as usize {
                    return Err(CompileError::new(
                        "Too many arguments in function call.",
                        span,
                    ));
                }
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                let arg_count = arguments.len();
                let callee_reg = self.stack_top_register(arg_count);
                let arg_registers: Vec<u8> = (0..arg_count)
                    .map(|i| self.stack_top_register(arg_count - 1 - i))
                    .collect();

                self.emit_op(OpCode::Call, line);
                self.emit_byte(callee_reg, line);
                self.emit_byte(callee_reg, line);
                self.emit_byte(arg_count as u8, line);
                for reg in arg_registers {
                    self.emit_byte(reg, line);
                }
                self.pop_stack_slots(arg_count);
                Ok(())
            }

            ExprKind::Invoke {
                object,
                name,
                arguments,
            } => {
                self.compile_expression(object)?;
                if arguments.len() > u8::MAX as usize {
                    return Err(CompileError::new("Too many arguments in method call.", span));
                }
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                let name_index = self.string_constant(name, span)?;
                let arg_count = arguments.len();
                let object_reg = self.stack_top_register(arg_count);
                let arg_registers: Vec<u8> = (0..arg_count)
                    .map(|i| self.stack_top_register(arg_count - 1 - i))
                    .collect();

                self.emit_op(OpCode::Invoke, line);
                self.emit_byte(object_reg, line);
                self.emit_byte(object_reg, line);
                self.emit_u16(name_index, line);
                self.emit_byte(arg_count as u8, line);
                for reg in arg_registers {
                    self.emit_byte(reg, line);
                }
                self.pop_stack_slots(arg_count);
                Ok(())
            }

            ExprKind::GetProperty { object, name } => {
                self.compile_expression(object)?;
                let name_index = self.string_constant(name, span)?;
                let object_reg = self.stack_top_register(0);
                self.emit_op(OpCode::GetProperty, line);
                self.emit_byte(object_reg, line);
                self.emit_byte(object_reg, line);
                self.emit_u16(name_index, line);
                Ok(())
            }

            ExprKind::SetProperty {
                object,
                name,
                value,
            } => {
                self.compile_expression(object)?;
                self.compile_expression(value)?;
                let value_reg = self.stack_top_register(0);
                let object_reg = self.stack_top_register(1);
                let name_index = self.string_constant(name, span)?;
                self.emit_op(OpCode::SetProperty, line);
                self.emit_byte(object_reg, line);
                self.emit_u16(name_index, line);
                self.emit_byte(value_reg, line);
                // The assigned value is the expression's result.
                self.emit_op(OpCode::Move, line);
                self.emit_byte(object_reg, line);
                self.emit_byte(value_reg, line);
                self.pop_stack_slots(1);
                Ok(())
            }

            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                let index_reg = self.stack_top_register(0);
                let array_reg = self.stack_top_register(1);
                self.emit_op(OpCode::ArrayGet, line);
                self.emit_byte(array_reg, line);
                self.emit_byte(array_reg, line);
                self.emit_byte(index_reg, line);
                self.pop_stack_slots(1);
                Ok(())
            }

            ExprKind::Array(elements) => {
                if elements.len() > u8::MAX as usize {
                    return Err(CompileError::new(
                        "Array literal has too many elements.",
                        span,
                    ));
                }
                if elements.is_empty() {
                    let dest = self.push_stack_slot(span)?;
                    self.emit_op(OpCode::BuildArray, line);
                    self.emit_byte(dest, line);
                    self.emit_byte(0, line);
                    return Ok(());
                }

                let mut element_registers = Vec::with_capacity(elements.len());
                for element in elements {
                    self.compile_expression(element)?;
                    element_registers.push(self.stack_top_register(0));
                }
                // The array is built in place over its first element's slot.
                let dest = element_registers[0];
                self.emit_op(OpCode::BuildArray, line);
                self.emit_byte(dest, line);
                self.emit_byte(elements.len() as u8, line);
                for reg in element_registers {
                    self.emit_byte(reg, line);
                }
                self.pop_stack_slots(elements.len() - 1);
                Ok(())
            }

            ExprKind::This => {
                let Some(index) = self.resolve_local("this", false, span)? else {
                    return Err(CompileError::new(
                        "Cannot use 'this' outside of class method.",
                        span,
                    ));
                };
                let reg = self.current.locals[index].reg;
                let dest = self.push_stack_slot(span)?;
                self.emit_op(OpCode::Move, line);
                self.emit_byte(dest, line);
                self.emit_byte(reg, line);
                Ok(())
            }
        }
    }
}
