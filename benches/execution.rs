//! Benchmarks comparing the tree-walking evaluator against the bytecode VM.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tamarin::bytecode::{Compiler, Vm};
use tamarin::evaluator::Interpreter;

const FIBONACCI: &str = "
let fibonacci = fn(x) {
    if (x < 2) { return x; } else { fibonacci(x - 1) + fibonacci(x - 2); }
};
fibonacci(18);
";

fn run_treewalk(source: &str) {
    let program = tamarin::parse(source).expect("parse error");
    let mut interpreter = Interpreter::new();
    interpreter.interpret(&program).expect("runtime error");
}

fn run_vm(source: &str) {
    let program = tamarin::parse(source).expect("parse error");
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("vm error");
}

fn bench_fibonacci(c: &mut Criterion) {
    let mut group = c.benchmark_group("fibonacci");
    group.bench_function("treewalk", |b| b.iter(|| run_treewalk(black_box(FIBONACCI))));
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(FIBONACCI))));
    group.finish();
}

criterion_group!(benches, bench_fibonacci);
criterion_main!(benches);
