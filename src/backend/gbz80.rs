//! Game Boy LR35902 backend: a Z80 variant with no `IX`/`IY` and no
//! undocumented shadow-register tricks, but otherwise close enough to
//! share mnemonic spelling with real Z80 assemblers. A secondary target
//! built on [`super::generic`].

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct GbZ80Backend;

struct GbZ80Mnemonics;

impl Mnemonics for GbZ80Mnemonics {
    fn reg_name(&self, r: Reg) -> String {
        const NAMES: [&str; 7] = ["A", "B", "C", "D", "E", "H", "L"];
        NAMES.get(r.0 as usize).map(|s| s.to_string()).unwrap_or_else(|| format!("hl+{}", r.0))
    }
    fn mov(&self) -> &'static str {
        "LD"
    }
    fn jmp(&self) -> &'static str {
        "JP"
    }
    fn call(&self) -> &'static str {
        "CALL"
    }
    fn ret(&self) -> &'static str {
        "RET"
    }
}

impl Backend for GbZ80Backend {
    fn target_name(&self) -> &'static str {
        "gbz80"
    }

    fn output_extension(&self) -> &'static str {
        ".asm"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &GbZ80Mnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn uses_ld_for_moves() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Return(Some(Operand::Imm(0))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = GbZ80Backend.emit(&program, &interner);
        assert!(result.text.contains("RET"));
    }
}
