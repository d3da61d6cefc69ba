//! Motorola 68000 backend: a 32-bit data/address register machine,
//! worlds apart from the 8-bit targets, but still reached through the
//! shared [`super::generic`] emitter since this is a secondary target with
//! no register allocator of its own.

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct M68000Backend;

struct M68000Mnemonics;

impl Mnemonics for M68000Mnemonics {
    fn reg_name(&self, r: Reg) -> String {
        format!("D{}", r.0 % 8)
    }
    fn mov(&self) -> &'static str {
        "MOVE"
    }
    fn jmp(&self) -> &'static str {
        "BRA"
    }
    fn call(&self) -> &'static str {
        "BSR"
    }
    fn ret(&self) -> &'static str {
        "RTS"
    }
}

impl Backend for M68000Backend {
    fn target_name(&self) -> &'static str {
        "m68000"
    }

    fn output_extension(&self) -> &'static str {
        ".s"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &M68000Mnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn wraps_registers_into_eight_data_registers() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r = f.fresh_reg();
        f.push(entry, Opcode::Const(9), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = M68000Backend.emit(&program, &interner);
        assert!(result.text.contains("MOVE D0, #9"));
    }
}
