//! Property-based tests for the compiled pipeline.
//!
//! Random arithmetic expression trees are folded in the test harness and
//! compared against what the VM (and the evaluator) compute for the same
//! source text.

use proptest::prelude::*;

use tamarin::bytecode::{Compiler, Vm};
use tamarin::evaluator::Interpreter;
use tamarin::value::Value;

/// A tiny arithmetic expression tree the harness can both render as
/// Tamarin source and fold itself.
#[derive(Debug, Clone)]
enum Arith {
    Int(i64),
    Add(Box<Arith>, Box<Arith>),
    Sub(Box<Arith>, Box<Arith>),
    Mul(Box<Arith>, Box<Arith>),
    Neg(Box<Arith>),
}

impl Arith {
    fn source(&self) -> String {
        match self {
            Arith::Int(n) => format!("{}", n),
            Arith::Add(l, r) => format!("({} + {})", l.source(), r.source()),
            Arith::Sub(l, r) => format!("({} - {})", l.source(), r.source()),
            Arith::Mul(l, r) => format!("({} * {})", l.source(), r.source()),
            Arith::Neg(e) => format!("(-{})", e.source()),
        }
    }

    fn fold(&self) -> i64 {
        match self {
            Arith::Int(n) => *n,
            Arith::Add(l, r) => l.fold().wrapping_add(r.fold()),
            Arith::Sub(l, r) => l.fold().wrapping_sub(r.fold()),
            Arith::Mul(l, r) => l.fold().wrapping_mul(r.fold()),
            Arith::Neg(e) => e.fold().wrapping_neg(),
        }
    }
}

fn arb_arith() -> impl Strategy<Value = Arith> {
    let leaf = (0i64..1000).prop_map(Arith::Int);
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Arith::Add(Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Arith::Sub(Box::new(l), Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Arith::Mul(Box::new(l), Box::new(r))),
            inner.prop_map(|e| Arith::Neg(Box::new(e))),
        ]
    })
}

fn run_vm(source: &str) -> Value {
    let program = tamarin::parse(source).expect("parse error");
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("vm error");
    vm.last_popped_stack_elem().clone()
}

fn run_eval(source: &str) -> Value {
    let program = tamarin::parse(source).expect("parse error");
    Interpreter::new().eval_program(&program)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The VM agrees with a constant fold of the same expression tree.
    #[test]
    fn vm_matches_constant_fold(expr in arb_arith()) {
        let source = format!("{};", expr.source());
        prop_assert_eq!(run_vm(&source), Value::Integer(expr.fold()), "source: {}", source);
    }

    /// Both back ends produce the same observable result.
    #[test]
    fn vm_matches_evaluator(expr in arb_arith()) {
        let source = format!("{};", expr.source());
        prop_assert_eq!(run_vm(&source), run_eval(&source), "source: {}", source);
    }

    /// Compilation is deterministic: same source, same bytes and constants.
    #[test]
    fn compilation_is_deterministic(expr in arb_arith()) {
        let source = format!("{};", expr.source());
        let first = tamarin::compile(&source).expect("compile error");
        let second = tamarin::compile(&source).expect("compile error");
        prop_assert_eq!(first.instructions, second.instructions);
        prop_assert_eq!(first.constants.len(), second.constants.len());
    }

    /// `push` never mutates its input and always appends at the end.
    #[test]
    fn push_appends_without_mutating(values in prop::collection::vec(0i64..100, 1..8), extra in 0i64..100) {
        let list = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let source = format!(
            "let a = [{list}]; let b = push(a, {extra}); [len(a), len(b), first(b) == first(a), last(b)];"
        );
        let expected = Value::Array(std::rc::Rc::new(vec![
            Value::Integer(values.len() as i64),
            Value::Integer(values.len() as i64 + 1),
            Value::Boolean(true),
            Value::Integer(extra),
        ]));
        prop_assert_eq!(run_vm(&source), expected);
    }

    /// Applying `rest` len(a) times empties the array; once more gives null.
    #[test]
    fn rest_drains_to_null(values in prop::collection::vec(0i64..100, 0..6)) {
        let list = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut expr = format!("[{}]", list);
        for _ in 0..values.len() {
            expr = format!("rest({})", expr);
        }
        prop_assert_eq!(run_vm(&format!("len({});", expr)), Value::Integer(0));
        prop_assert_eq!(run_vm(&format!("rest({});", expr)), Value::Null);
    }
}
