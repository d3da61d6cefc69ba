//! Public API: the single
//! entry point collaborators (the CLI, tests, a future LSP) call into.
//! The core pipeline performs no I/O of its own -- callers pass source
//! text in, get `CompileArtifact` or diagnostics back.

use std::collections::HashMap;

use crate::backend::create_backend;
use crate::config::CompileOptions;
use crate::diagnostic::{has_errors, Diagnostic};
use crate::lexer::Lexer;
use crate::lower::Lowerer;
use crate::mir::MirProgram;
use crate::optimize::{self, OptimizeOptions};
use crate::parser::Parser;
use crate::profile::Profile;
use crate::semantic;

/// Everything a successful compilation produced: the backend's text
/// output, its symbol map, the optimizer's pass log, and an optional MIR
/// dump for `--dump-mir`-style introspection.
pub struct CompileArtifact {
    pub text: String,
    pub symbols: HashMap<String, u32>,
    pub pipeline: PipelineReport,
}

/// Bookkeeping surfaced instead of log lines: the optimizer's pass
/// log, plus the pretty-printed MIR when `CompileOptions::dump_mir` is set.
pub struct PipelineReport {
    pub opt_passes: Vec<optimize::PassReport>,
    pub mir_dump: Option<String>,
}

/// Full pipeline: lex -> parse -> analyze -> lower -> optimize -> emit.
/// Returns `Err` the moment any stage produces an error diagnostic,
/// matching its no-cascading-past-errors policy.
pub fn compile(source: &str, opts: &CompileOptions) -> Result<CompileArtifact, Vec<Diagnostic>> {
    let mut file = parse(source)?;

    let modules = HashMap::new();
    let analysis = semantic::analyze(&mut file, &modules);
    if analysis.has_errors() {
        return Err(analysis.diagnostics);
    }

    let lower_result = Lowerer::new(&file, &analysis).lower_file(&file);
    if has_errors(&lower_result.diagnostics) {
        return Err(lower_result.diagnostics);
    }

    let profile = load_profile(opts)?;
    let optimize_opts = OptimizeOptions {
        level: opts.opt_level,
        enable_smc: opts.enable_smc,
        enable_tsmc: opts.enable_tsmc,
        enable_ctie: opts.enable_ctie,
        profile,
        ..OptimizeOptions::default()
    };
    let optimized = optimize::optimize(lower_result.program, &optimize_opts);

    let mir_dump = opts.dump_mir.then(|| dump_mir(&optimized.program));

    let backend = create_backend(opts.backend);
    let emitted = backend.emit(&optimized.program, &analysis.interner);

    Ok(CompileArtifact {
        text: emitted.text,
        symbols: emitted.symbols,
        pipeline: PipelineReport { opt_passes: optimized.reports, mir_dump },
    })
}

/// Front-end-only pass: lex, parse, and run semantic analysis, but do not
/// lower or emit code. Used for `minzc check`,
/// which reports diagnostics without needing a backend at all.
pub fn check(source: &str) -> Result<(), Vec<Diagnostic>> {
    let mut file = parse(source)?;
    let modules = HashMap::new();
    let analysis = semantic::analyze(&mut file, &modules);
    if analysis.has_errors() {
        return Err(analysis.diagnostics);
    }
    Ok(())
}

/// Lower and run constant-folding/CTIE only, skipping tree-shake, tail-call
/// conversion, and code emission; exposed so `tests/scenarios.rs` and the
/// CTIE end-to-end scenario can observe folded MIR directly.
pub fn run_ctie(source: &str, budget: u32) -> Result<MirProgram, Vec<Diagnostic>> {
    let mut file = parse(source)?;
    let modules = HashMap::new();
    let analysis = semantic::analyze(&mut file, &modules);
    if analysis.has_errors() {
        return Err(analysis.diagnostics);
    }
    let lower_result = Lowerer::new(&file, &analysis).lower_file(&file);
    if has_errors(&lower_result.diagnostics) {
        return Err(lower_result.diagnostics);
    }
    let mut program = lower_result.program;
    optimize::fold_constants(&mut program);
    optimize::run_ctie(&mut program, budget);
    Ok(program)
}

fn parse(source: &str) -> Result<crate::ast::File, Vec<Diagnostic>> {
    let file_id = 0;
    let (tokens, _comments, lex_diags) = Lexer::new(source, file_id).tokenize();
    if has_errors(&lex_diags) {
        return Err(lex_diags);
    }
    let (file, parse_diags) = Parser::new(tokens, file_id).parse_file();
    if has_errors(&parse_diags) {
        return Err(parse_diags);
    }
    Ok(file)
}

fn load_profile(opts: &CompileOptions) -> Result<Option<Profile>, Vec<Diagnostic>> {
    let Some(path) = &opts.profile_path else { return Ok(None) };
    match Profile::load(path) {
        Ok((profile, _warnings)) => Ok(Some(profile)),
        Err(err) => Err(vec![Diagnostic::error(
            crate::diagnostic::DiagnosticKind::UnexpectedToken,
            format!("failed to read profile {}: {err}", path.display()),
            crate::span::Span::dummy(),
        )]),
    }
}

fn dump_mir(program: &MirProgram) -> String {
    let mut out = String::new();
    for f in &program.functions {
        out.push_str(&format!("fn {}:\n", f.name));
        for block in &f.blocks {
            out.push_str(&format!(" {}:\n", block.id));
            for inst in &block.instructions {
                out.push_str(&format!(" {:?}\n", inst.opcode));
            }
        }
    }
    out
}

/// Parse with the S-expression front end instead of the default
/// recursive-descent one.
pub fn compile_sexpr(source: &str, opts: &CompileOptions) -> Result<CompileArtifact, Vec<Diagnostic>> {
    let sexpr = crate::sexpr::parse_sexpr(source).map_err(|err| {
        vec![Diagnostic::error(
            crate::diagnostic::DiagnosticKind::UnexpectedToken,
            format!("malformed s-expression: {err}"),
            crate::span::Span::dummy(),
        )]
    })?;
    let (mut file, parse_diags) = crate::sexpr::convert_file(&sexpr, 0);
    if has_errors(&parse_diags) {
        return Err(parse_diags);
    }

    let modules = HashMap::new();
    let analysis = semantic::analyze(&mut file, &modules);
    if analysis.has_errors() {
        return Err(analysis.diagnostics);
    }

    let lower_result = Lowerer::new(&file, &analysis).lower_file(&file);
    if has_errors(&lower_result.diagnostics) {
        return Err(lower_result.diagnostics);
    }

    let optimize_opts = OptimizeOptions {
        level: opts.opt_level,
        enable_smc: opts.enable_smc,
        enable_tsmc: opts.enable_tsmc,
        enable_ctie: opts.enable_ctie,
        ..OptimizeOptions::default()
    };
    let optimized = optimize::optimize(lower_result.program, &optimize_opts);
    let backend = create_backend(opts.backend);
    let emitted = backend.emit(&optimized.program, &analysis.interner);

    Ok(CompileArtifact {
        text: emitted.text,
        symbols: emitted.symbols,
        pipeline: PipelineReport { opt_passes: optimized.reports, mir_dump: None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_accepts_a_trivial_function() {
        let source = "fn main() -> u8 { return 1; }";
        assert!(check(source).is_ok());
    }

    #[test]
    fn check_rejects_undefined_identifier() {
        let source = "fn main() -> u8 { return undefined_name; }";
        assert!(check(source).is_err());
    }

    #[test]
    fn compile_emits_z80_text_for_a_trivial_function() {
        let source = "fn main() -> u8 { return 1; }";
        let opts = CompileOptions::default();
        let artifact = compile(source, &opts).expect("trivial function should compile");
        assert!(artifact.text.contains("main:"));
    }
}
