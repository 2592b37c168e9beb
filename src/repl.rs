//! Interactive read-eval-print loop.
//!
//! One symbol table, constants pool, and globals array survive across
//! lines; each line gets a fresh VM over the shared state, so bindings
//! persist but stack state never leaks between inputs.

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::vm::GLOBALS_SIZE;
use crate::bytecode::{Compiler, SymbolTable, Vm};
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::value::Value;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".tamarin_history";

pub struct Repl {
    symbols: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
    history_file: PathBuf,
}

impl Repl {
    pub fn new() -> Self {
        // A throwaway compiler seeds the symbol table with the builtins.
        let (symbols, constants) = Compiler::new().into_state();

        Self {
            symbols,
            constants,
            globals: vec![Value::Null; GLOBALS_SIZE],
            history_file: Self::history_path(),
        }
    }

    fn history_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }

    pub fn run(&mut self) {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(err) => {
                eprintln!("Could not start line editor: {}", err);
                return;
            }
        };
        let _ = editor.load_history(&self.history_file);

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line);
                    self.eval_line(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {}", err);
                    break;
                }
            }
        }

        let _ = editor.save_history(&self.history_file);
    }

    fn eval_line(&mut self, line: &str) {
        let tokens = match Scanner::new(line).scan_tokens() {
            Ok(tokens) => tokens,
            Err(err) => {
                println!("{}", err);
                return;
            }
        };

        let program = match Parser::new(tokens).parse() {
            Ok(program) => program,
            Err(errors) => {
                println!("parser errors:");
                for error in errors {
                    println!("\t{}", error);
                }
                return;
            }
        };

        let mut compiler = Compiler::with_state(
            std::mem::take(&mut self.symbols),
            std::mem::take(&mut self.constants),
        );
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        let (symbols, constants) = compiler.into_state();
        self.symbols = symbols;
        self.constants = constants;

        if let Err(err) = compiled {
            println!("Compilation failed: {}", err);
            return;
        }

        let mut vm = Vm::with_globals(bytecode, std::mem::take(&mut self.globals));
        let outcome = vm.run();
        let result = vm.last_popped_stack_elem().inspect();
        self.globals = vm.into_globals();

        match outcome {
            Ok(()) => println!("{}", result),
            Err(err) => println!("Executing bytecode failed: {}", err),
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
