//! MOS 6502 backend: a secondary target, built on the shared
//! [`super::generic`] emitter. The 6502 has no general-purpose 16-bit
//! registers (only A, X, Y and zero-page addressing), so SMC/TSMC are
//! available in principle (self-modifying code is a classic 6502 idiom)
//! but this emitter, like the other secondary targets, does not attempt
//! real register allocation -- it names MIR registers directly as
//! zero-page cells.

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct Mos6502Backend;

struct Mos6502Mnemonics;

impl Mnemonics for Mos6502Mnemonics {
    fn comment_prefix(&self) -> &'static str {
        ";"
    }
    fn reg_name(&self, r: Reg) -> String {
        format!("zp{}", r.0)
    }
    fn mov(&self) -> &'static str {
        "lda/sta"
    }
    fn jmp(&self) -> &'static str {
        "jmp"
    }
    fn call(&self) -> &'static str {
        "jsr"
    }
    fn ret(&self) -> &'static str {
        "rts"
    }
}

impl Backend for Mos6502Backend {
    fn target_name(&self) -> &'static str {
        "mos6502"
    }

    fn output_extension(&self) -> &'static str {
        ".s"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &Mos6502Mnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn emits_zero_page_cells() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Return(Some(Operand::Imm(0))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = Mos6502Backend.emit(&program, &interner);
        assert!(result.text.contains("rts"));
    }
}
