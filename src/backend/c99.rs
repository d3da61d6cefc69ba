//! C99 backend: emits a portable intermediate form intended for a
//! downstream C compiler, rather than machine code directly. A secondary
//! target built on [`super::generic`]; SMC/TSMC have no meaning for this
//! target since the output isn't machine code the runtime can patch, so
//! callers should treat `enable_smc`/`enable_tsmc` as ignored here.

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct C99Backend;

struct C99Mnemonics;

impl Mnemonics for C99Mnemonics {
    fn comment_prefix(&self) -> &'static str {
        "//"
    }
    fn reg_name(&self, r: Reg) -> String {
        format!("v{}", r.0)
    }
    fn mov(&self) -> &'static str {
        "="
    }
    fn jmp(&self) -> &'static str {
        "goto"
    }
    fn call(&self) -> &'static str {
        "call"
    }
    fn ret(&self) -> &'static str {
        "return"
    }
}

impl Backend for C99Backend {
    fn target_name(&self) -> &'static str {
        "c99"
    }

    fn output_extension(&self) -> &'static str {
        ".c"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &C99Mnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn uses_c_style_assignment_and_return() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r = f.fresh_reg();
        f.push(entry, Opcode::Const(7), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = C99Backend.emit(&program, &interner);
        assert!(result.text.contains("v0 = #7"));
        assert!(result.text.contains("return v0"));
    }
}
