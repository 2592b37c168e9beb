//! Bytecode compiler: lowers the AST into instructions and constants.

use std::rc::Rc;

use crate::ast::{BlockStatement, Expr, ExprKind, Program, Stmt, StmtKind};
use crate::builtins::BUILTINS;
use crate::bytecode::instruction::{make, OpCode};
use crate::bytecode::symbols::{Symbol, SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::value::{CompiledFunction, Value};

pub type CompileResult<T> = Result<T, CompileError>;

/// The compiled artifact: a flat instruction stream plus the constants it
/// references by index.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

/// An instruction the compiler just emitted, kept so the tail of the
/// stream can be inspected and rewritten.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// The instruction buffer for one function being compiled.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
///
/// One compilation scope per function literal being compiled, with the
/// main program as the bottom scope. The symbol table is pushed and popped
/// in lockstep with the scopes.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }

        Self {
            constants: Vec::new(),
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Resume compilation with state carried over from a previous cycle;
    /// the REPL threads one symbol table and constants pool across lines.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            constants,
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Hand the shared state back for the next compile cycle. A failed
    /// compile can abandon nested scopes; the table is unwound to the root
    /// so the next cycle starts clean.
    pub fn into_state(mut self) -> (SymbolTable, Vec<Value>) {
        while !self.symbols.is_global() {
            let table = std::mem::take(&mut self.symbols);
            self.symbols = table.into_outer().unwrap_or_default();
        }
        (self.symbols, self.constants)
    }

    /// Compile a program into the current scope.
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// The finished artifact for the main scope.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().to_vec(),
            constants: self.constants.clone(),
        }
    }

    // ===== Statements =====

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(OpCode::Pop, &[]);
            }

            StmtKind::Let { name, value } => {
                // The name is bound before its value compiles, so a
                // function literal on the right can refer to itself.
                let symbol = self.symbols.define(name);
                if symbol.scope == SymbolScope::Local && symbol.index > u8::MAX as usize {
                    return Err(CompileError::TooManyLocals);
                }

                self.compile_expression(value)?;

                match symbol.scope {
                    SymbolScope::Global => {
                        self.emit(OpCode::SetGlobal, &[symbol.index]);
                    }
                    _ => {
                        self.emit(OpCode::SetLocal, &[symbol.index]);
                    }
                }
            }

            StmtKind::Return(value) => {
                self.compile_expression(value)?;
                self.emit(OpCode::ReturnValue, &[]);
            }
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    // ===== Expressions =====

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(value) => {
                let index = self.add_constant(Value::Integer(*value))?;
                self.emit(OpCode::Constant, &[index]);
            }

            ExprKind::StringLiteral(value) => {
                let index = self.add_constant(Value::String(Rc::new(value.clone())))?;
                self.emit(OpCode::Constant, &[index]);
            }

            ExprKind::BoolLiteral(value) => {
                if *value {
                    self.emit(OpCode::True, &[]);
                } else {
                    self.emit(OpCode::False, &[]);
                }
            }

            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }

            ExprKind::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "!" => self.emit(OpCode::Not, &[]),
                    "-" => self.emit(OpCode::Negate, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                // `<` lowers to Greater with the operands swapped.
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(OpCode::Greater, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator.as_str() {
                    "+" => self.emit(OpCode::Add, &[]),
                    "-" => self.emit(OpCode::Subtract, &[]),
                    "*" => self.emit(OpCode::Multiply, &[]),
                    "/" => self.emit(OpCode::Divide, &[]),
                    ">" => self.emit(OpCode::Greater, &[]),
                    "==" => self.emit(OpCode::Equal, &[]),
                    "!=" => self.emit(OpCode::NotEqual, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                // Placeholder target, patched once the consequence length
                // is known.
                let jump_if_false = self.emit(OpCode::JumpIfFalse, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(OpCode::Pop) {
                    self.remove_last_instruction();
                }

                let jump = self.emit(OpCode::Jump, &[9999]);

                let after_consequence = self.current_instructions().len();
                self.change_operand(jump_if_false, after_consequence);

                match alternative {
                    Some(alt) => {
                        self.compile_block(alt)?;
                        if self.last_instruction_is(OpCode::Pop) {
                            self.remove_last_instruction();
                        }
                    }
                    None => {
                        self.emit(OpCode::Null, &[]);
                    }
                }

                let after_alternative = self.current_instructions().len();
                self.change_operand(jump, after_alternative);
            }

            ExprKind::Function {
                parameters,
                body,
                name,
            } => {
                self.enter_scope();

                if let Some(name) = name {
                    self.symbols.define_function_name(name);
                }
                for parameter in parameters {
                    self.symbols.define(parameter);
                }

                self.compile_block(body)?;

                // A body ending in an expression statement leaves its value
                // as the return value; an empty body returns null.
                if self.last_instruction_is(OpCode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(OpCode::ReturnValue) {
                    self.emit(OpCode::Return, &[]);
                }

                let free_symbols = self.symbols.free_symbols.clone();
                let num_locals = self.symbols.num_definitions();
                let instructions = self.leave_scope();

                // Load each captured binding in the enclosing scope; the
                // Closure instruction pops them into the capture list.
                for free in &free_symbols {
                    self.load_symbol(free);
                }

                let function = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                };
                let index = self.add_constant(Value::CompiledFunction(Rc::new(function)))?;
                self.emit(OpCode::Closure, &[index, free_symbols.len()]);
            }

            ExprKind::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(OpCode::Call, &[arguments.len()]);
            }

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(OpCode::Array, &[elements.len()]);
            }

            ExprKind::Hash(pairs) => {
                // Keys are emitted sorted by their textual form so the
                // produced bytecode is deterministic.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(OpCode::Hash, &[pairs.len() * 2]);
            }

            ExprKind::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(OpCode::Index, &[]);
            }
        }

        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(OpCode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(OpCode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(OpCode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(OpCode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(OpCode::CurrentClosure, &[]),
        };
    }

    // ===== Scopes =====

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().expect("compilation scope underflow");
        let table = std::mem::take(&mut self.symbols);
        self.symbols = table.into_outer().unwrap_or_default();
        scope.instructions
    }

    fn current_scope(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("no compilation scope")
    }

    fn current_instructions(&self) -> &[u8] {
        &self.scopes.last().expect("no compilation scope").instructions
    }

    // ===== Emission =====

    /// Append one instruction; returns its position in the stream.
    fn emit(&mut self, op: OpCode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = self.current_scope();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: OpCode, position: usize) {
        let scope = self.current_scope();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: OpCode) -> bool {
        self.scopes
            .last()
            .and_then(|scope| scope.last_instruction)
            .is_some_and(|last| last.opcode == op)
    }

    /// Drop the trailing instruction (used to strip the `Pop` ending an
    /// `if` arm, which must leave its value on the stack).
    fn remove_last_instruction(&mut self) {
        let scope = self.current_scope();
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
            scope.previous_instruction = None;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        let position = self
            .scopes
            .last()
            .and_then(|scope| scope.last_instruction)
            .expect("no instruction to replace")
            .position;

        self.replace_instruction(position, &make(OpCode::ReturnValue, &[]));
        if let Some(last) = &mut self.current_scope().last_instruction {
            last.opcode = OpCode::ReturnValue;
        }
    }

    /// Overwrite bytes in place. Only valid for same-width rewrites.
    fn replace_instruction(&mut self, position: usize, instruction: &[u8]) {
        let scope = self.current_scope();
        scope.instructions[position..position + instruction.len()].copy_from_slice(instruction);
    }

    /// Re-encode the operand of the instruction at `position`; the
    /// fixed-width encoding keeps the instruction length unchanged.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = OpCode::from_u8(self.current_instructions()[position])
            .expect("patching an invalid opcode");
        self.replace_instruction(position, &make(op, &[operand]));
    }

    fn add_constant(&mut self, value: Value) -> CompileResult<usize> {
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
