//! LLVM backend: emits LLVM-flavored SSA-style pseudo-IR text. A
//! secondary target built on [`super::generic`]; like `c99`, SMC/TSMC are
//! not realizable against an LLVM target and are ignored if requested.

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct LlvmBackend;

struct LlvmMnemonics;

impl Mnemonics for LlvmMnemonics {
    fn comment_prefix(&self) -> &'static str {
        ";"
    }
    fn reg_name(&self, r: Reg) -> String {
        format!("%r{}", r.0)
    }
    fn mov(&self) -> &'static str {
        "bitcast"
    }
    fn jmp(&self) -> &'static str {
        "br label"
    }
    fn call(&self) -> &'static str {
        "call"
    }
    fn ret(&self) -> &'static str {
        "ret"
    }
    fn label(&self, name: &str) -> String {
        format!("define i32 @{name}() {{")
    }
}

impl Backend for LlvmBackend {
    fn target_name(&self) -> &'static str {
        "llvm"
    }

    fn output_extension(&self) -> &'static str {
        ".ll"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &LlvmMnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn registers_use_ssa_percent_prefix() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r = f.fresh_reg();
        f.push(entry, Opcode::Const(3), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = LlvmBackend.emit(&program, &interner);
        assert!(result.text.contains("%r0"));
        assert!(result.text.contains("define i32 @main()"));
    }
}
