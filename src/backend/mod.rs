//! Backend dispatch: one `Backend` implementation per
//! code-generation target. Grounded on
//! `mastercyb-trident/src/codegen/backend/mod.rs`'s `StackBackend` trait +
//! `create_backend` factory, generalized from a shared stack-machine ISA to
//! per-target register machines -- each target needs its own mnemonics and
//! calling convention, not just a swapped-out instruction table.
//!
//! Z80 (`z80`) is primary and carries real register allocation, SMC
//! realization, and an assembly-level peephole pass. The other seven
//! targets are the "simpler, per-target deltas from the Z80 framework"
//! describes, built on the shared [`generic`] emitter.

mod generic;

pub mod c99;
pub mod gbz80;
pub mod i8080;
pub mod llvm;
pub mod m68000;
pub mod mos6502;
pub mod wasm;
pub mod z80;

use std::collections::HashMap;

use crate::config::BackendKind;
use crate::mir::MirProgram;
use crate::types::TypeInterner;

/// One emitted artifact: target text plus a symbol -> line-offset map (
/// "compiler invocation contract": "primary artifact text or bytes ...
/// symbol map").
#[derive(Clone, Debug, Default)]
pub struct EmitResult {
    pub text: String,
    pub symbols: HashMap<String, u32>,
}

pub trait Backend {
    fn target_name(&self) -> &'static str;
    fn output_extension(&self) -> &'static str;
    fn emit(&self, program: &MirProgram, interner: &TypeInterner) -> EmitResult;
}

pub fn create_backend(kind: BackendKind) -> Box<dyn Backend> {
    match kind {
        BackendKind::Z80 => Box::new(z80::Z80Backend),
        BackendKind::Mos6502 => Box::new(mos6502::Mos6502Backend),
        BackendKind::I8080 => Box::new(i8080::I8080Backend),
        BackendKind::GbZ80 => Box::new(gbz80::GbZ80Backend),
        BackendKind::M68000 => Box::new(m68000::M68000Backend),
        BackendKind::C99 => Box::new(c99::C99Backend),
        BackendKind::Llvm => Box::new(llvm::LlvmBackend),
        BackendKind::Wasm => Box::new(wasm::WasmBackend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_produces_matching_target_name() {
        for kind in [
            BackendKind::Z80,
            BackendKind::Mos6502,
            BackendKind::I8080,
            BackendKind::GbZ80,
            BackendKind::M68000,
            BackendKind::C99,
            BackendKind::Llvm,
            BackendKind::Wasm,
        ] {
            let backend = create_backend(kind);
            assert_eq!(backend.target_name(), kind.name());
        }
    }
}
