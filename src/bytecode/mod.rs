//! Bytecode pipeline: instruction encoding, symbol resolution, the
//! compiler, and the stack-based virtual machine.
//!
//! A compiled program is a pair: a flat byte stream of instructions and a
//! pool of literal constants referenced by index. Each instruction is one
//! opcode byte followed by fixed-width big-endian operands.

pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod symbols;
pub mod vm;

pub use compiler::{Bytecode, Compiler};
pub use disassembler::disassemble;
pub use instruction::OpCode;
pub use symbols::{Symbol, SymbolScope, SymbolTable};
pub use vm::Vm;
