//! WebAssembly text-format backend: a secondary target built on
//! [`super::generic`]. SMC/TSMC are not realizable in WASM's sandboxed
//! linear memory model and are ignored if requested, same as `c99`/`llvm`.

use crate::mir::{MirProgram, Reg};
use crate::types::TypeInterner;

use super::generic::{emit_generic, Mnemonics};
use super::{Backend, EmitResult};

pub struct WasmBackend;

struct WasmMnemonics;

impl Mnemonics for WasmMnemonics {
    fn comment_prefix(&self) -> &'static str {
        ";;"
    }
    fn reg_name(&self, r: Reg) -> String {
        format!("$local{}", r.0)
    }
    fn mov(&self) -> &'static str {
        "local.set"
    }
    fn jmp(&self) -> &'static str {
        "br"
    }
    fn call(&self) -> &'static str {
        "call"
    }
    fn ret(&self) -> &'static str {
        "return"
    }
    fn label(&self, name: &str) -> String {
        format!("(func ${name}")
    }
}

impl Backend for WasmBackend {
    fn target_name(&self) -> &'static str {
        "wasm"
    }

    fn output_extension(&self) -> &'static str {
        ".wat"
    }

    fn emit(&self, program: &MirProgram, _interner: &TypeInterner) -> EmitResult {
        emit_generic(program, &WasmMnemonics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, Opcode, Operand};
    use crate::span::Span;

    #[test]
    fn locals_use_dollar_prefix() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r = f.fresh_reg();
        f.push(entry, Opcode::Const(1), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = WasmBackend.emit(&program, &interner);
        assert!(result.text.contains("$local0"));
        assert!(result.text.contains("(func $main"));
    }
}
