//! Benchmarks for the bytecode VM.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rill::parser::Parser;
use rill::vm::{Compiler, Vm};

const FIB_RECURSIVE: &str = "
    function fib(n) {
        if (n < 2) { return n; }
        return fib(n - 1) + fib(n - 2);
    }
    fib(18);
";

const LOOP_SUM: &str = "
    let total = 0;
    let i = 0;
    while (i < 100000) {
        total = total + i;
        i = i + 1;
    }
    total;
";

const STRING_CHURN: &str = "
    let acc = \"\";
    let i = 0;
    while (i < 500) {
        acc = acc + \"chunk\";
        i = i + 1;
    }
    acc;
";

const OBJECT_CHURN: &str = "
    class Point {
        constructor(x, y) { this.x = x; this.y = y; }
        sum() { return this.x + this.y; }
    }
    let total = 0;
    let i = 0;
    while (i < 2000) {
        let p = Point(i, i + 1);
        total = total + p.sum();
        i = i + 1;
    }
    total;
";

fn run(source: &str) {
    let mut vm = Vm::new();
    let program = Parser::new(source).parse().expect("parse error");
    let function = Compiler::compile(&mut vm, &program).expect("compile error");
    vm.interpret(function).expect("runtime error");
}

fn compile_only(source: &str) {
    let mut vm = Vm::new();
    let program = Parser::new(source).parse().expect("parse error");
    Compiler::compile(&mut vm, &program).expect("compile error");
}

fn vm_benchmarks(c: &mut Criterion) {
    c.bench_function("fib_recursive", |b| b.iter(|| run(black_box(FIB_RECURSIVE))));
    c.bench_function("loop_sum", |b| b.iter(|| run(black_box(LOOP_SUM))));
    c.bench_function("string_churn_gc", |b| {
        b.iter(|| run(black_box(STRING_CHURN)))
    });
    c.bench_function("object_churn_gc", |b| {
        b.iter(|| run(black_box(OBJECT_CHURN)))
    });
    c.bench_function("compile_fib", |b| {
        b.iter(|| compile_only(black_box(FIB_RECURSIVE)))
    });
}

criterion_group!(benches, vm_benchmarks);
criterion_main!(benches);
