//! Rill: a small dynamically-typed scripting language.
//!
//! Source text flows through a pull-based scanner into a recursive-descent
//! parser, then a bytecode compiler targeting a register-based virtual
//! machine whose heap is managed by a mark-and-sweep garbage collector.
//! A script's last expression statement becomes its result value.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod span;
pub mod vm;

use error::RillError;
use parser::Parser;
use runtime::Value;
use vm::{Compiler, Vm};

/// Compile and run source text against `vm`, yielding the script's result
/// value. Parse, compile and interpret each short-circuit with their own
/// error kind.
pub fn run_source(vm: &mut Vm, source: &str) -> Result<Value, RillError> {
    let program = Parser::new(source).parse()?;
    let function = Compiler::compile(vm, &program)?;
    let value = vm.interpret(function)?;
    Ok(value)
}

/// Read and run a script file.
pub fn run_file(vm: &mut Vm, path: &std::path::Path) -> Result<Value, RillError> {
    let source = std::fs::read_to_string(path)?;
    run_source(vm, &source)
}

/// Compile source text and return the bytecode listing without running it.
pub fn disassemble_source(vm: &mut Vm, source: &str) -> Result<String, RillError> {
    let program = Parser::new(source).parse()?;
    let function = Compiler::compile(vm, &program)?;
    Ok(vm::disassemble(vm, function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_source_pipeline() {
        let mut vm = Vm::new();
        let value = run_source(&mut vm, "let x = 41; x + 1;").unwrap();
        assert_eq!(vm.display_value(value), "42");
    }

    #[test]
    fn test_parse_error_short_circuits() {
        let mut vm = Vm::new();
        assert!(matches!(
            run_source(&mut vm, "let x = ;"),
            Err(RillError::Parser(_))
        ));
    }

    #[test]
    fn test_compile_error_short_circuits() {
        let mut vm = Vm::new();
        assert!(matches!(
            run_source(&mut vm, "missing;"),
            Err(RillError::Compile(_))
        ));
    }

    #[test]
    fn test_runtime_error_short_circuits() {
        let mut vm = Vm::new();
        assert!(matches!(
            run_source(&mut vm, "let x = 1; x();"),
            Err(RillError::Runtime(_))
        ));
    }

    #[test]
    fn test_disassemble_source() {
        let mut vm = Vm::new();
        let listing = disassemble_source(&mut vm, "1 + 2;").unwrap();
        assert!(listing.contains("ADD"));
    }
}
