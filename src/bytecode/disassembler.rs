//! Bytecode disassembler for debugging and the REPL.

use std::fmt::Write;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{read_operands, OpCode};
use crate::value::Value;

/// Render an instruction stream, one `<offset> <OpName> <operands...>` line
/// per instruction.
pub fn disassemble(instructions: &[u8]) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset < instructions.len() {
        let byte = instructions[offset];
        let Some(op) = OpCode::from_u8(byte) else {
            writeln!(&mut output, "{:04} Unknown opcode {}", offset, byte).unwrap();
            offset += 1;
            continue;
        };

        let (operands, read) = read_operands(op, &instructions[offset + 1..]);

        write!(&mut output, "{:04} {:?}", offset, op).unwrap();
        for operand in &operands {
            write!(&mut output, " {}", operand).unwrap();
        }
        writeln!(&mut output).unwrap();

        offset += 1 + read;
    }

    output
}

/// Render a full compiled artifact: the main instruction stream followed by
/// every function constant, each under its own header.
pub fn disassemble_bytecode(bytecode: &Bytecode) -> String {
    let mut output = String::new();

    writeln!(&mut output, "== main ==").unwrap();
    output.push_str(&disassemble(&bytecode.instructions));

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Value::CompiledFunction(func) = constant {
            writeln!(
                &mut output,
                "\n== fn constant {} (locals: {}, params: {}) ==",
                index, func.num_locals, func.num_parameters
            )
            .unwrap();
            output.push_str(&disassemble(&func.instructions));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::make;

    #[test]
    fn test_disassemble_format() {
        let instructions: Vec<u8> = [
            make(OpCode::Add, &[]),
            make(OpCode::GetLocal, &[1]),
            make(OpCode::Constant, &[2]),
            make(OpCode::Constant, &[65535]),
            make(OpCode::Closure, &[65535, 255]),
        ]
        .concat();

        let expected = "\
0000 Add
0001 GetLocal 1
0003 Constant 2
0006 Constant 65535
0009 Closure 65535 255
";
        assert_eq!(disassemble(&instructions), expected);
    }

    #[test]
    fn test_unknown_opcode_is_reported() {
        let output = disassemble(&[250]);
        assert!(output.contains("Unknown opcode 250"));
    }
}
