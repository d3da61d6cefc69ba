//! Intel 8080 backend: the Z80's ancestor, missing the shadow
//! register set, `IX`/`IY`, and relative jumps -- every branch is absolute.
//! A secondary target built on [`super::generic`].

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct I8080Backend;

struct I8080Mnemonics;

impl Mnemonics for I8080Mnemonics {
    fn reg_name(&self, r: Reg) -> String {
        const NAMES: [&str; 7] = ["A", "B", "C", "D", "E", "H", "L"];
        NAMES.get(r.0 as usize).map(|s| s.to_string()).unwrap_or_else(|| format!("mem{}", r.0))
    }
    fn mov(&self) -> &'static str {
        "MOV"
    }
    fn jmp(&self) -> &'static str {
        "JMP"
    }
    fn call(&self) -> &'static str {
        "CALL"
    }
    fn ret(&self) -> &'static str {
        "RET"
    }
}

impl Backend for I8080Backend {
    fn target_name(&self) -> &'static str {
        "i8080"
    }

    fn output_extension(&self) -> &'static str {
        ".asm"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &I8080Mnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn names_first_registers_after_8080_register_pairs() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r = f.fresh_reg();
        f.push(entry, Opcode::Const(1), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = I8080Backend.emit(&program, &interner);
        assert!(result.text.contains("MOV A, #1"));
    }
}
