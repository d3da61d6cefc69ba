//! Compiler-wide configuration: the options passed into the public
//! API, plus a small project manifest reader. Grounded on
//! `trident::CompileOptions`/`config::project`.

pub mod project;

use std::path::PathBuf;

use crate::optimize::OptLevel;

pub use project::MinzProject;

/// Selects which of C9's backends emits the final artifact. A
/// `clap::ValueEnum` so the CLI stub can take `--backend z80` directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    Z80,
    Mos6502,
    I8080,
    GbZ80,
    M68000,
    C99,
    Llvm,
    Wasm,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Z80 => "z80",
            BackendKind::Mos6502 => "mos6502",
            BackendKind::I8080 => "i8080",
            BackendKind::GbZ80 => "gbz80",
            BackendKind::M68000 => "m68000",
            BackendKind::C99 => "c99",
            BackendKind::Llvm => "llvm",
            BackendKind::Wasm => "wasm",
        }
    }
}

/// Input to `api::compile`/`api::check` ( "compiler invocation
/// contract"). `dump_mir` mirrors the teacher's `--dump-mir`-style
/// introspection flags: when set, `CompileArtifact::mir_dump` is
/// populated instead of left `None`.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub backend: BackendKind,
    pub opt_level: OptLevel,
    pub enable_smc: bool,
    pub enable_tsmc: bool,
    pub enable_ctie: bool,
    pub profile_path: Option<PathBuf>,
    pub dump_mir: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::Z80,
            opt_level: OptLevel::O2,
            enable_smc: true,
            enable_tsmc: true,
            enable_ctie: true,
            profile_path: None,
            dump_mir: false,
        }
    }
}
