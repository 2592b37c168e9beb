//! Stack-based virtual machine executing compiled bytecode.

use std::collections::HashMap;
use std::rc::Rc;

use crate::builtins::{Builtin, BUILTINS};
use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::OpCode;
use crate::error::RuntimeError;
use crate::value::{Closure, CompiledFunction, HashPair, Value};

/// Operand stack capacity.
pub const STACK_SIZE: usize = 2048;
/// Globals array capacity.
pub const GLOBALS_SIZE: usize = 65536;
/// Call frame capacity.
pub const FRAMES_SIZE: usize = 1024;

pub type VmResult<T> = Result<T, RuntimeError>;

/// A call frame: the executing closure, its instruction pointer, and the
/// stack position its locals are addressed from.
///
/// `ip` starts at -1; the dispatch loop preincrements before reading the
/// opcode, so jump targets are stored as `target - 1`.
#[derive(Debug)]
struct Frame {
    closure: Rc<Closure>,
    ip: i64,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: -1,
            base_pointer,
        }
    }

    fn instructions(&self) -> &[u8] {
        &self.closure.function.instructions
    }
}

/// The virtual machine.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// Points at the next free stack slot; the top of stack is `sp - 1`.
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Run against an existing globals array; the REPL threads one array
    /// through every line.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main_function = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Rc::new(Closure {
            function: Rc::new(main_function),
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(FRAMES_SIZE);
        frames.push(Frame::new(main_closure, 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Hand the globals array back for the next REPL cycle.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The value most recently popped off the stack. The slot just above
    /// `sp` still holds it; tests and the REPL read the final expression
    /// value here without disturbing the stack discipline.
    pub fn last_popped_stack_elem(&self) -> &Value {
        &self.stack[self.sp]
    }

    /// Execute until the main frame's instructions are exhausted.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().instructions().len() as i64 - 1 {
            self.current_frame_mut().ip += 1;

            let op_byte = {
                let frame = self.current_frame();
                frame.instructions()[frame.ip as usize]
            };
            let op = OpCode::from_u8(op_byte).ok_or(RuntimeError::UnknownOpcode(op_byte))?;

            match op {
                OpCode::Constant => {
                    let index = self.read_u16() as usize;
                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }

                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::Add | OpCode::Subtract | OpCode::Multiply | OpCode::Divide => {
                    self.execute_binary_operation(op)?;
                }

                OpCode::True => self.push(Value::TRUE)?,
                OpCode::False => self.push(Value::FALSE)?,
                OpCode::Null => self.push(Value::Null)?,

                OpCode::Equal | OpCode::NotEqual | OpCode::Greater => {
                    self.execute_comparison(op)?;
                }

                OpCode::Not => {
                    let operand = self.pop()?;
                    self.push(Value::Boolean(!operand.is_truthy()))?;
                }

                OpCode::Negate => {
                    let operand = self.pop()?;
                    match operand {
                        Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg()))?,
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()))
                        }
                    }
                }

                OpCode::JumpIfFalse => {
                    let target = self.read_u16() as i64;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target - 1;
                    }
                }

                OpCode::Jump => {
                    let target = self.read_u16() as i64;
                    self.current_frame_mut().ip = target - 1;
                }

                OpCode::SetGlobal => {
                    let slot = self.read_u16() as usize;
                    self.globals[slot] = self.pop()?;
                }

                OpCode::GetGlobal => {
                    let slot = self.read_u16() as usize;
                    let value = self.globals[slot].clone();
                    self.push(value)?;
                }

                OpCode::SetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.current_frame().base_pointer;
                    self.stack[base + slot] = self.pop()?;
                }

                OpCode::GetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.current_frame().base_pointer;
                    let value = self.stack[base + slot].clone();
                    self.push(value)?;
                }

                OpCode::GetBuiltin => {
                    let index = self.read_u8() as usize;
                    self.push(Value::Builtin(&BUILTINS[index]))?;
                }

                OpCode::GetFree => {
                    let index = self.read_u8() as usize;
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }

                OpCode::Closure => {
                    let const_index = self.read_u16();
                    let num_free = self.read_u8() as usize;
                    self.push_closure(const_index, num_free)?;
                }

                OpCode::CurrentClosure => {
                    let closure = self.current_frame().closure.clone();
                    self.push(Value::Closure(closure))?;
                }

                OpCode::Call => {
                    let num_args = self.read_u8() as usize;
                    self.execute_call(num_args)?;
                }

                OpCode::ReturnValue => {
                    let value = self.pop()?;
                    let frame = self.frames.pop().expect("frame underflow");
                    if self.frames.is_empty() {
                        // Top-level `return`: leave the value observable
                        // and stop.
                        self.sp = frame.base_pointer;
                        self.stack[self.sp] = value;
                        return Ok(());
                    }
                    self.sp = frame.base_pointer - 1;
                    self.push(value)?;
                }

                OpCode::Return => {
                    let frame = self.frames.pop().expect("frame underflow");
                    if self.frames.is_empty() {
                        self.sp = frame.base_pointer;
                        self.stack[self.sp] = Value::Null;
                        return Ok(());
                    }
                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Null)?;
                }

                OpCode::Array => {
                    let count = self.read_u16() as usize;
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Value::Array(Rc::new(elements)))?;
                }

                OpCode::Hash => {
                    let count = self.read_u16() as usize;
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }

                OpCode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index(left, index)?;
                }
            }
        }

        Ok(())
    }

    // ===== Operators =====

    fn execute_binary_operation(&mut self, op: OpCode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.execute_integer_binary_operation(op, *l, *r)
            }
            (Value::String(l), Value::String(r)) => match op {
                OpCode::Add => {
                    let joined = format!("{}{}", l, r);
                    self.push(Value::String(Rc::new(joined)))
                }
                other => Err(RuntimeError::UnknownStringOperator(operator_symbol(other))),
            },
            _ => Err(RuntimeError::UnsupportedBinaryTypes(
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn execute_integer_binary_operation(&mut self, op: OpCode, left: i64, right: i64) -> VmResult<()> {
        let result = match op {
            OpCode::Add => left.wrapping_add(right),
            OpCode::Subtract => left.wrapping_sub(right),
            OpCode::Multiply => left.wrapping_mul(right),
            OpCode::Divide => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                left.wrapping_div(right)
            }
            other => return Err(RuntimeError::UnknownIntegerOperator(operator_symbol(other))),
        };
        self.push(Value::Integer(result))
    }

    fn execute_comparison(&mut self, op: OpCode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            let result = match op {
                OpCode::Equal => l == r,
                OpCode::NotEqual => l != r,
                OpCode::Greater => l > r,
                other => {
                    return Err(RuntimeError::UnknownIntegerOperator(operator_symbol(other)))
                }
            };
            return self.push(Value::Boolean(result));
        }

        match op {
            OpCode::Equal => self.push(Value::Boolean(left == right)),
            OpCode::NotEqual => self.push(Value::Boolean(left != right)),
            other => Err(RuntimeError::UnknownOperator(
                operator_symbol(other),
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    // ===== Calls =====

    fn execute_call(&mut self, num_args: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> VmResult<()> {
        if num_args != closure.function.num_parameters {
            return Err(RuntimeError::WrongArity {
                want: closure.function.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= FRAMES_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        let num_locals = closure.function.num_locals;
        let frame = Frame::new(closure, self.sp - num_args);
        let new_sp = frame.base_pointer + num_locals;
        if new_sp > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        // Arguments already sit in slots 0..num_args; the remaining local
        // slots are reserved above them.
        self.sp = new_sp;
        self.frames.push(frame);
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, num_args: usize) -> VmResult<()> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args);
        self.sp = self.sp - num_args - 1;

        match result {
            Value::Error(message) => Err(RuntimeError::Message(message)),
            value => self.push(value),
        }
    }

    fn push_closure(&mut self, const_index: u16, num_free: usize) -> VmResult<()> {
        let constant = self.constants[const_index as usize].clone();
        let Value::CompiledFunction(function) = constant else {
            return Err(RuntimeError::NotAFunction(const_index));
        };

        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;

        self.push(Value::Closure(Rc::new(Closure { function, free })))
    }

    // ===== Collections =====

    fn build_hash(&self, start: usize, end: usize) -> VmResult<Value> {
        let mut pairs = HashMap::with_capacity((end - start) / 2);

        for slot in (start..end).step_by(2) {
            let key = self.stack[slot].clone();
            let value = self.stack[slot + 1].clone();

            let hash_key = key
                .hash_key()
                .ok_or(RuntimeError::UnusableHashKey(key.type_name()))?;
            pairs.insert(hash_key, HashPair { key, value });
        }

        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index(&mut self, left: Value, index: Value) -> VmResult<()> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let max = elements.len() as i64 - 1;
                if *i < 0 || *i > max {
                    self.push(Value::Null)
                } else {
                    self.push(elements[*i as usize].clone())
                }
            }
            (Value::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or(RuntimeError::UnusableHashKey(index.type_name()))?;
                match pairs.get(&key) {
                    Some(pair) => self.push(pair.value.clone()),
                    None => self.push(Value::Null),
                }
            }
            _ => Err(RuntimeError::IndexNotSupported(left.type_name())),
        }
    }

    // ===== Stack & frames =====

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        if self.sp == 0 {
            return Err(RuntimeError::StackEmpty);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    /// Read the one-byte operand after the opcode at `ip`.
    fn read_u8(&mut self) -> u8 {
        let frame = self.current_frame_mut();
        frame.ip += 1;
        frame.closure.function.instructions[frame.ip as usize]
    }

    /// Read the big-endian two-byte operand after the opcode at `ip`.
    fn read_u16(&mut self) -> u16 {
        let frame = self.current_frame_mut();
        let ip = frame.ip as usize;
        frame.ip += 2;
        let instructions = &frame.closure.function.instructions;
        u16::from_be_bytes([instructions[ip + 1], instructions[ip + 2]])
    }
}

/// The source-level operator an arithmetic/comparison opcode stands for,
/// used in error messages.
fn operator_symbol(op: OpCode) -> String {
    match op {
        OpCode::Add => "+".to_string(),
        OpCode::Subtract => "-".to_string(),
        OpCode::Multiply => "*".to_string(),
        OpCode::Divide => "/".to_string(),
        OpCode::Greater => ">".to_string(),
        OpCode::Equal => "==".to_string(),
        OpCode::NotEqual => "!=".to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::parser::core::parse_source;

    fn run_source(source: &str) -> VmResult<Value> {
        let program = parse_source(source).expect("parser errors");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");

        let mut vm = Vm::new(compiler.bytecode());
        vm.run()?;
        Ok(vm.last_popped_stack_elem().clone())
    }

    fn expect_value(source: &str, expected: Value) {
        match run_source(source) {
            Ok(actual) => assert_eq!(actual, expected, "source: {}", source),
            Err(err) => panic!("vm error for {:?}: {}", source, err),
        }
    }

    fn expect_int(source: &str, expected: i64) {
        expect_value(source, Value::Integer(expected));
    }

    fn expect_bool(source: &str, expected: bool) {
        expect_value(source, Value::Boolean(expected));
    }

    fn expect_error(source: &str, message: &str) {
        match run_source(source) {
            Ok(value) => panic!("expected error for {:?}, got {}", source, value),
            Err(err) => assert_eq!(err.to_string(), message, "source: {}", source),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        expect_int("1", 1);
        expect_int("1 + 2", 3);
        expect_int("1 - 2", -1);
        expect_int("4 / 2", 2);
        expect_int("50 / 2 * 2 + 10 - 5", 55);
        expect_int("5 * (2 + 10)", 60);
        expect_int("-5", -5);
        expect_int("-50 + 100 + -50", 0);
        expect_int("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50);
    }

    #[test]
    fn test_boolean_expressions() {
        expect_bool("true", true);
        expect_bool("1 < 2", true);
        expect_bool("1 > 2", false);
        expect_bool("1 == 1", true);
        expect_bool("1 != 1", false);
        expect_bool("true == true", true);
        expect_bool("true != false", true);
        expect_bool("(1 < 2) == true", true);
        expect_bool("!true", false);
        expect_bool("!!true", true);
        expect_bool("!5", false);
        expect_bool("!(if (false) { 5; })", true);
    }

    #[test]
    fn test_conditionals() {
        expect_int("if (true) { 10 }", 10);
        expect_int("if (true) { 10 } else { 20 }", 10);
        expect_int("if (false) { 10 } else { 20 }", 20);
        expect_int("if (1) { 10 }", 10);
        expect_int("if (1 < 2) { 10 } else { 20 }", 10);
        expect_value("if (false) { 10 }", Value::Null);
        expect_value("if (1 > 2) { 10 }", Value::Null);
        expect_int("if ((if (false) { 10 })) { 10 } else { 20 }", 20);
    }

    #[test]
    fn test_global_let_statements() {
        expect_int("let one = 1; one", 1);
        expect_int("let one = 1; let two = 2; one + two", 3);
        expect_int("let one = 1; let two = one + one; one + two", 3);
    }

    #[test]
    fn test_string_expressions() {
        expect_value("\"tamarin\"", Value::String(Rc::new("tamarin".to_string())));
        expect_value(
            "\"tama\" + \"rin\" + \"!\"",
            Value::String(Rc::new("tamarin!".to_string())),
        );
    }

    #[test]
    fn test_array_literals() {
        expect_value("[]", Value::Array(Rc::new(vec![])));
        expect_value(
            "[1, 2, 3]",
            Value::Array(Rc::new(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ])),
        );
        expect_value(
            "[1 + 2, 3 * 4, 5 + 6]",
            Value::Array(Rc::new(vec![
                Value::Integer(3),
                Value::Integer(12),
                Value::Integer(11),
            ])),
        );
    }

    #[test]
    fn test_hash_literals() {
        expect_value("{1: 2, 2: 3}[1]", Value::Integer(2));
        expect_value("{1 + 1: 2 * 2, 3 + 3: 4 * 4}[6]", Value::Integer(16));
        expect_int("len([{1: 2}])", 1);
    }

    #[test]
    fn test_index_expressions() {
        expect_int("[1, 2, 3][1]", 2);
        expect_int("[[1, 1, 1]][0][0]", 1);
        expect_value("[][0]", Value::Null);
        expect_value("[1, 2, 3][99]", Value::Null);
        expect_value("[1][-1]", Value::Null);
        expect_int("{1: 1, 2: 2}[2]", 2);
        expect_value("{1: 1}[0]", Value::Null);
        expect_value("{}[0]", Value::Null);
    }

    #[test]
    fn test_calling_functions() {
        expect_int("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15);
        expect_int(
            "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
            3,
        );
        expect_int(
            "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
            3,
        );
    }

    #[test]
    fn test_functions_with_return_statements() {
        expect_int("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99);
        expect_int(
            "let earlyExit = fn() { return 99; return 100; }; earlyExit();",
            99,
        );
    }

    #[test]
    fn test_functions_without_return_value() {
        expect_value("let noReturn = fn() { }; noReturn();", Value::Null);
        expect_value(
            "let noReturn = fn() { }; let noReturnTwo = fn() { noReturn(); }; noReturn(); noReturnTwo();",
            Value::Null,
        );
    }

    #[test]
    fn test_first_class_functions() {
        expect_int(
            "let returnsOne = fn() { 1; }; let returnsOneReturner = fn() { returnsOne; }; returnsOneReturner()();",
            1,
        );
    }

    #[test]
    fn test_calling_functions_with_bindings() {
        expect_int("let one = fn() { let one = 1; one }; one();", 1);
        expect_int(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
            3,
        );
        expect_int(
            "let firstFoobar = fn() { let foobar = 50; foobar; };
             let secondFoobar = fn() { let foobar = 100; foobar; };
             firstFoobar() + secondFoobar();",
            150,
        );
        expect_int(
            "let globalSeed = 50;
             let minusOne = fn() { let num = 1; globalSeed - num; };
             let minusTwo = fn() { let num = 2; globalSeed - num; };
             minusOne() + minusTwo();",
            97,
        );
    }

    #[test]
    fn test_calling_functions_with_arguments() {
        expect_int("let identity = fn(a) { a; }; identity(4);", 4);
        expect_int("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3);
        expect_int(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
            10,
        );
        expect_int(
            "let globalNum = 10;
             let sum = fn(a, b) { let c = a + b; c + globalNum; };
             let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
             outer() + globalNum;",
            50,
        );
    }

    #[test]
    fn test_local_shadows_global() {
        expect_int("let x = 5; let f = fn() { let x = 10; x }; f() + x;", 15);
    }

    #[test]
    fn test_wrong_argument_count() {
        expect_error(
            "fn() { 1; }(1);",
            "wrong number of arguments: want=0, got=1",
        );
        expect_error(
            "fn(a) { a; }();",
            "wrong number of arguments: want=1, got=0",
        );
        expect_error(
            "fn(a, b) { a + b; }(1);",
            "wrong number of arguments: want=2, got=1",
        );
    }

    #[test]
    fn test_builtin_functions() {
        expect_int("len(\"\")", 0);
        expect_int("len(\"four\")", 4);
        expect_int("len([1, 2, 3])", 3);
        expect_int("first([1, 2, 3])", 1);
        expect_value("first([])", Value::Null);
        expect_int("last([1, 2, 3])", 3);
        expect_value("last([])", Value::Null);
        expect_value(
            "rest([1, 2, 3])",
            Value::Array(Rc::new(vec![Value::Integer(2), Value::Integer(3)])),
        );
        expect_value("rest([])", Value::Null);
        expect_value("push([], 1)", Value::Array(Rc::new(vec![Value::Integer(1)])));
        expect_value("puts(\"hello\")", Value::Null);
    }

    #[test]
    fn test_builtin_errors_abort_execution() {
        expect_error("len(1)", "argument to `len` not supported, got Integer");
        expect_error(
            "len(\"one\", \"two\")",
            "wrong number of arguments. got=2, want=1",
        );
        expect_error("first(1)", "argument to `first` must be Array, got Integer");
        expect_error("push(1, 1)", "argument to `push` must be Array, got Integer");
    }

    #[test]
    fn test_closures() {
        expect_int(
            "let newClosure = fn(a) { fn() { a; }; }; let closure = newClosure(99); closure();",
            99,
        );
        expect_int(
            "let newAdder = fn(a) { fn(b) { a + b } }; let addTwo = newAdder(2); addTwo(3);",
            5,
        );
        expect_int(
            "let newAdder = fn(a, b) { fn(c) { a + b + c }; }; let adder = newAdder(1, 2); adder(8);",
            11,
        );
        expect_int(
            "let newAdderOuter = fn(a, b) {
                 let c = a + b;
                 fn(d) { let e = d + c; fn(f) { e + f; }; };
             };
             let newAdderInner = newAdderOuter(1, 2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
        expect_int(
            "let a = 1;
             let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; };
             let newAdderInner = newAdderOuter(2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
    }

    #[test]
    fn test_closures_capture_at_construction() {
        // The captured value is the one the binding held when the Closure
        // instruction executed.
        expect_int(
            "let makeGetter = fn() { let x = 5; let get = fn() { x }; let x = 99; get };
             makeGetter()();",
            5,
        );
    }

    #[test]
    fn test_recursive_functions() {
        expect_int(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; countDown(1);",
            0,
        );
        expect_int(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             let wrapper = fn() { countDown(1); };
             wrapper();",
            0,
        );
        expect_int(
            "let wrapper = fn() {
                 let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 countDown(1);
             };
             wrapper();",
            0,
        );
    }

    #[test]
    fn test_recursive_fibonacci() {
        expect_int(
            "let fibonacci = fn(x) {
                 if (x < 2) { return x; } else { fibonacci(x - 1) + fibonacci(x - 2); }
             };
             fibonacci(15);",
            610,
        );
    }

    #[test]
    fn test_higher_order_map() {
        expect_value(
            "let map = fn(arr, f) {
                 let iter = fn(a, acc) {
                     if (len(a) == 0) { acc } else { iter(rest(a), push(acc, f(first(a)))) }
                 };
                 iter(arr, []);
             };
             map([1, 2, 3], fn(x) { x * 2 });",
            Value::Array(Rc::new(vec![
                Value::Integer(2),
                Value::Integer(4),
                Value::Integer(6),
            ])),
        );
    }

    #[test]
    fn test_hash_with_computed_string_key() {
        expect_int("{\"one\": 1, \"two\": 2}[\"t\" + \"wo\"];", 2);
    }

    #[test]
    fn test_runtime_errors() {
        expect_error("5 + true;", "unsupported types for binary operation: Integer Boolean");
        expect_error("5 + true; 5;", "unsupported types for binary operation: Integer Boolean");
        expect_error("true + false;", "unsupported types for binary operation: Boolean Boolean");
        expect_error("true > false;", "unknown operator: > (Boolean Boolean)");
        expect_error("\"a\" - \"b\";", "unknown string operator: -");
        expect_error("-true", "unsupported type for negation: Boolean");
        expect_error("{[1, 2]: 1}", "unusable as hash key: Array");
        expect_error("{1: 1}[[]]", "unusable as hash key: Array");
        expect_error("5[0]", "index operator not supported: Integer");
        expect_error("1(2)", "calling non-function (and non-builtin)");
        expect_error("1 / 0", "division by zero");
    }

    #[test]
    fn test_equality_across_types_is_false() {
        expect_bool("1 == \"1\"", false);
        expect_bool("1 != \"1\"", true);
        expect_bool("\"a\" == \"a\"", true);
    }

    #[test]
    fn test_deep_recursion_overflows_frames() {
        let err = run_source("let f = fn(x) { f(x + 1) }; f(0);").unwrap_err();
        assert_eq!(err.to_string(), "stack overflow");
    }

    #[test]
    fn test_globals_survive_across_vms() {
        // The REPL's pattern: one symbol table, constants pool, and globals
        // array threaded through successive compile/run cycles.
        let mut compiler = Compiler::new();
        compiler
            .compile(&parse_source("let one = 1;").unwrap())
            .expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("vm error");

        let globals = vm.into_globals();
        let (symbols, constants) = compiler.into_state();

        let mut compiler = Compiler::with_state(symbols, constants);
        compiler
            .compile(&parse_source("one + 2;").unwrap())
            .expect("compile error");
        let mut vm = Vm::with_globals(compiler.bytecode(), globals);
        vm.run().expect("vm error");

        assert_eq!(vm.last_popped_stack_elem(), &Value::Integer(3));
    }
}
