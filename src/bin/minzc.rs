//! CLI front end. No logic of its own: every
//! subcommand reads a source file and calls straight into `minzc::api`.
//! Grounded on `mastercyb-trident/src/main.rs`'s `clap::Subcommand` shape,
//! trimmed down to the two subcommands the core spec actually needs.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use minzc::{compile, check, BackendKind, CompileOptions};
use minzc::optimize::OptLevel;

#[derive(Parser)]
#[command(name = "minzc", version, about = "MinZ compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a .minz file to the selected backend's output
    Build(BuildArgs),
    /// Type-check a .minz file without emitting code
    Check(CheckArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Input source file
    input: PathBuf,
    /// Output file (default: <input> with the backend's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Target backend
    #[arg(long, value_enum, default_value = "z80")]
    backend: BackendKind,
    /// Optimization level
    #[arg(long, value_enum, default_value = "o2")]
    opt: OptLevel,
    #[arg(long)]
    no_smc: bool,
    #[arg(long)]
    no_tsmc: bool,
    #[arg(long)]
    no_ctie: bool,
    #[arg(long, value_name = "PATH")]
    profile: Option<PathBuf>,
    /// Print the optimized MIR alongside the emitted code
    #[arg(long)]
    dump_mir: bool,
}

#[derive(Args)]
struct CheckArgs {
    input: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => cmd_build(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn cmd_build(args: BuildArgs) {
    let source = read_source(&args.input);
    let opts = CompileOptions {
        backend: args.backend,
        opt_level: args.opt,
        enable_smc: !args.no_smc,
        enable_tsmc: !args.no_tsmc,
        enable_ctie: !args.no_ctie,
        profile_path: args.profile,
        dump_mir: args.dump_mir,
    };

    match compile(&source, &opts) {
        Ok(artifact) => {
            let output = args.output.unwrap_or_else(|| args.input.with_extension(opts.backend.name()));
            if let Err(err) = std::fs::write(&output, &artifact.text) {
                eprintln!("error: failed to write {}: {err}", output.display());
                process::exit(1);
            }
            if let Some(mir) = &artifact.pipeline.mir_dump {
                println!("{mir}");
            }
            for pass in &artifact.pipeline.opt_passes {
                eprintln!(" {}: {}", pass.pass, pass.detail);
            }
        }
        Err(diagnostics) => {
            let filename = args.input.display().to_string();
            minzc::diagnostic::render_diagnostics(&diagnostics, &filename, &source);
            process::exit(1);
        }
    }
}

fn cmd_check(args: CheckArgs) {
    let source = read_source(&args.input);
    if let Err(diagnostics) = check(&source) {
        let filename = args.input.display().to_string();
        minzc::diagnostic::render_diagnostics(&diagnostics, &filename, &source);
        process::exit(1);
    }
}

fn read_source(path: &PathBuf) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("error: failed to read {}: {err}", path.display());
        process::exit(1);
    })
}
