//! Tamarin: a small, dynamically-typed, expression-oriented scripting
//! language.
//!
//! Source code flows through a hand-written lexer and Pratt parser into an
//! AST, which either compiles to bytecode executed on a stack-based VM
//! (the default) or is walked directly by the evaluator.

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod span;
pub mod value;

pub use error::TamarinError;

use error::ParserError;
use value::Value;

/// How to execute a parsed program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Compile to bytecode and run on the VM (faster).
    #[default]
    Bytecode,
    /// Walk the AST directly.
    TreeWalk,
}

/// Run a program and return its final expression value.
pub fn run(source: &str) -> Result<Value, TamarinError> {
    run_with_options(source, ExecutionMode::default(), false)
}

/// Run a program with an explicit execution mode and optional disassembly
/// dump before execution.
pub fn run_with_options(
    source: &str,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<Value, TamarinError> {
    let program = parse(source)?;

    match mode {
        ExecutionMode::TreeWalk => {
            let mut interpreter = evaluator::Interpreter::new();
            Ok(interpreter.interpret(&program)?)
        }
        ExecutionMode::Bytecode => {
            let mut compiler = bytecode::Compiler::new();
            compiler.compile(&program).map_err(TamarinError::from)?;
            let code = compiler.bytecode();

            if disassemble {
                print!("{}", bytecode::disassembler::disassemble_bytecode(&code));
                println!("---");
            }

            let mut vm = bytecode::Vm::new(code);
            vm.run()?;
            Ok(vm.last_popped_stack_elem().clone())
        }
    }
}

/// Parse source code into an AST without executing.
pub fn parse(source: &str) -> Result<ast::Program, TamarinError> {
    let tokens = lexer::Scanner::new(source).scan_tokens()?;
    parser::Parser::new(tokens)
        .parse()
        .map_err(|mut errors| TamarinError::from(errors.remove(0)))
}

/// Report every parser error instead of only the first.
pub fn parse_all_errors(source: &str) -> Result<ast::Program, Vec<ParserError>> {
    parser::core::parse_source(source)
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<bytecode::Bytecode, TamarinError> {
    let program = parse(source)?;
    let mut compiler = bytecode::Compiler::new();
    compiler.compile(&program)?;
    Ok(compiler.bytecode())
}

/// Disassemble a compiled artifact to text.
pub fn disassemble(code: &bytecode::Bytecode) -> String {
    bytecode::disassembler::disassemble_bytecode(code)
}
