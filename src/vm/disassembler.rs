//! Human-readable bytecode listings for debugging.

use std::fmt::Write;

use crate::runtime::heap::GcRef;
use crate::runtime::object::ObjKind;
use crate::vm::opcode::OpCode;
use crate::vm::vm::Vm;

/// Disassemble a function's chunk, then every function found in its
/// constant pool, so one call renders a whole compiled program.
pub fn disassemble(vm: &Vm, function: GcRef) -> String {
    let mut out = String::new();
    let mut pending = vec![function];
    let mut seen = Vec::new();

    while let Some(current) = pending.pop() {
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        disassemble_function(vm, current, &mut out);

        for constant in &vm.heap.function(current).chunk.constants {
            if let Some(r) = constant.as_obj() {
                if matches!(vm.heap.get(r).kind, ObjKind::Function(_)) {
                    pending.push(r);
                }
            }
        }
    }
    out
}

fn function_label(vm: &Vm, function: GcRef) -> String {
    match vm.heap.function(function).name {
        Some(name) => vm.heap.as_str(name).to_string(),
        None => "<script>".to_string(),
    }
}

fn disassemble_function(vm: &Vm, function: GcRef, out: &mut String) {
    let f = vm.heap.function(function);
    let _ = writeln!(
        out,
        "== {} (arity {}, registers {}) ==",
        function_label(vm, function),
        f.arity,
        f.register_count
    );

    let mut offset = 0;
    while offset < f.chunk.code.len() {
        offset = disassemble_instruction(vm, function, offset, out);
    }
    let _ = writeln!(out);
}

fn disassemble_instruction(vm: &Vm, function: GcRef, offset: usize, out: &mut String) -> usize {
    let chunk = &vm.heap.function(function).chunk;
    let _ = write!(out, "{:04} {:4} ", offset, chunk.get_line(offset));

    let Some(op) = OpCode::from_u8(chunk.code[offset]) else {
        let _ = writeln!(out, "BAD_OPCODE {}", chunk.code[offset]);
        return offset + 1;
    };

    let byte = |at: usize| chunk.code[offset + at];
    let u16_at = |at: usize| chunk.read_u16(offset + at);
    let mut next = offset + 1 + op.operand_size();

    match op {
        OpCode::LoadConst => {
            let index = u16_at(2);
            let _ = writeln!(
                out,
                "LOAD_CONST      r{}, #{} ({})",
                byte(1),
                index,
                vm.display_value(chunk.get_constant(index))
            );
        }
        OpCode::LoadNull => {
            let _ = writeln!(out, "LOAD_NULL       r{}", byte(1));
        }
        OpCode::LoadTrue => {
            let _ = writeln!(out, "LOAD_TRUE       r{}", byte(1));
        }
        OpCode::LoadFalse => {
            let _ = writeln!(out, "LOAD_FALSE      r{}", byte(1));
        }
        OpCode::Move => {
            let _ = writeln!(out, "MOVE            r{}, r{}", byte(1), byte(2));
        }
        OpCode::Add
        | OpCode::Subtract
        | OpCode::Multiply
        | OpCode::Divide
        | OpCode::Equal
        | OpCode::Greater
        | OpCode::Less => {
            let _ = writeln!(
                out,
                "{:<15} r{}, r{}, r{}",
                format!("{:?}", op).to_uppercase(),
                byte(1),
                byte(2),
                byte(3)
            );
        }
        OpCode::Negate | OpCode::Not => {
            let _ = writeln!(
                out,
                "{:<15} r{}, r{}",
                format!("{:?}", op).to_uppercase(),
                byte(1),
                byte(2)
            );
        }
        OpCode::Jump => {
            let target = offset + 3 + u16_at(1) as usize;
            let _ = writeln!(out, "JUMP            -> {:04}", target);
        }
        OpCode::JumpIfFalse => {
            let target = offset + 4 + u16_at(2) as usize;
            let _ = writeln!(out, "JUMP_IF_FALSE   r{}, -> {:04}", byte(1), target);
        }
        OpCode::Loop => {
            let target = offset + 3 - u16_at(1) as usize;
            let _ = writeln!(out, "LOOP            -> {:04}", target);
        }
        OpCode::Call => {
            let count = byte(3) as usize;
            let args: Vec<String> = (0..count)
                .map(|i| format!("r{}", chunk.code[offset + 4 + i]))
                .collect();
            next += count;
            let _ = writeln!(
                out,
                "CALL            r{}, r{}, [{}]",
                byte(1),
                byte(2),
                args.join(", ")
            );
        }
        OpCode::Return => {
            let _ = writeln!(out, "RETURN          r{}", byte(1));
        }
        OpCode::GetGlobal => {
            let _ = writeln!(out, "GET_GLOBAL      r{}, g{}", byte(1), u16_at(2));
        }
        OpCode::DefineGlobal => {
            let _ = writeln!(out, "DEFINE_GLOBAL   r{}, g{}", byte(1), u16_at(2));
        }
        OpCode::SetGlobal => {
            let _ = writeln!(out, "SET_GLOBAL      r{}, g{}", byte(1), u16_at(2));
        }
        OpCode::BuildArray => {
            let count = byte(2) as usize;
            let regs: Vec<String> = (0..count)
                .map(|i| format!("r{}", chunk.code[offset + 3 + i]))
                .collect();
            next += count;
            let _ = writeln!(out, "BUILD_ARRAY     r{}, [{}]", byte(1), regs.join(", "));
        }
        OpCode::ArrayGet => {
            let _ = writeln!(out, "ARRAY_GET       r{}, r{}, r{}", byte(1), byte(2), byte(3));
        }
        OpCode::GetProperty => {
            let index = u16_at(2);
            let _ = writeln!(
                out,
                "GET_PROPERTY    r{}, r{}, #{} ({})",
                byte(1),
                byte(2),
                index,
                vm.display_value(chunk.get_constant(index))
            );
        }
        OpCode::SetProperty => {
            let index = u16_at(2);
            let _ = writeln!(
                out,
                "SET_PROPERTY    r{}, #{} ({}), r{}",
                byte(1),
                index,
                vm.display_value(chunk.get_constant(index)),
                byte(4)
            );
        }
        OpCode::Class => {
            let index = u16_at(2);
            let _ = writeln!(
                out,
                "CLASS           r{}, #{} ({})",
                byte(1),
                index,
                vm.display_value(chunk.get_constant(index))
            );
        }
        OpCode::Method => {
            let index = u16_at(2);
            let _ = writeln!(
                out,
                "METHOD          r{}, #{} ({}), r{}",
                byte(1),
                index,
                vm.display_value(chunk.get_constant(index)),
                byte(4)
            );
        }
        OpCode::Invoke => {
            let index = u16_at(2);
            let count = byte(5) as usize;
            let args: Vec<String> = (0..count)
                .map(|i| format!("r{}", chunk.code[offset + 6 + i]))
                .collect();
            next += count;
            let _ = writeln!(
                out,
                "INVOKE          r{}, r{}, #{} ({}), [{}]",
                byte(1),
                byte(2),
                index,
                vm.display_value(chunk.get_constant(index)),
                args.join(", ")
            );
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::vm::compiler::Compiler;

    #[test]
    fn test_disassembles_whole_program() {
        let mut vm = Vm::new();
        let program = Parser::new("function add(a, b) { return a + b; } add(1, 2);")
            .parse()
            .unwrap();
        let function = Compiler::compile(&mut vm, &program).unwrap();
        let listing = disassemble(&vm, function);

        assert!(listing.contains("== <script>"));
        assert!(listing.contains("== add"));
        assert!(listing.contains("CALL"));
        assert!(listing.contains("RETURN"));
    }

    #[test]
    fn test_listing_walks_every_byte() {
        let mut vm = Vm::new();
        let source = "let xs = [1, 2, 3]; let i = 0; while (i < 3) { i = i + 1; } xs[0];";
        let program = Parser::new(source).parse().unwrap();
        let function = Compiler::compile(&mut vm, &program).unwrap();
        // A listing that misreads operand widths would panic on a bad
        // opcode byte or run past the end of the chunk.
        let listing = disassemble(&vm, function);
        assert!(!listing.contains("BAD_OPCODE"));
        assert!(listing.contains("BUILD_ARRAY"));
        assert!(listing.contains("LOOP"));
    }
}
