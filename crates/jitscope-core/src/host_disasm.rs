//! Host (x86-64) code disassembly for JIT output.

use std::fmt::Write as _;

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, IntelFormatter};

use crate::{HostCode, HostDisassembly};

/// Decode `code` as 64-bit x86 starting at `code.start`.
///
/// Undecodable bytes are rendered as `(bad)` and still counted, so the instruction count always
/// covers the whole buffer.
pub fn disassemble_x86_64(code: &HostCode) -> HostDisassembly {
    let mut decoder = Decoder::with_ip(64, &code.bytes, code.start, DecoderOptions::NONE);
    let mut formatter = IntelFormatter::new();
    let mut instruction = Instruction::default();
    let mut line = String::new();
    let mut text = String::new();
    let mut instruction_count = 0;

    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        instruction_count += 1;

        line.clear();
        if instruction.is_invalid() {
            line.push_str("(bad)");
        } else {
            formatter.format(&instruction, &mut line);
        }
        let _ = writeln!(&mut text, "{:016x}  {line}", instruction.ip());
    }

    HostDisassembly {
        instruction_count,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_sequence() {
        // mov eax, 1 ; ret
        let code = HostCode {
            start: 0x7f00_0000_1000,
            bytes: vec![0xb8, 0x01, 0x00, 0x00, 0x00, 0xc3],
        };
        let out = disassemble_x86_64(&code);
        assert_eq!(out.instruction_count, 2);

        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00007f0000001000  mov eax,1"), "{}", lines[0]);
        assert!(lines[1].starts_with("00007f0000001005  ret"), "{}", lines[1]);
    }

    #[test]
    fn empty_code_has_no_instructions() {
        let out = disassemble_x86_64(&HostCode::default());
        assert_eq!(out, HostDisassembly::default());
    }
}
