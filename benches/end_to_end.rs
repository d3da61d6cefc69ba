//! End-to-end pipeline benchmark. Measures the optimizer and the
//! Z80 backend against synthetic MIR of increasing size, mirroring the
//! teacher's per-stage `benchmark_group` layout in its own `end_to_end`
//! bench.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use minzc::abi::AbiKind;
use minzc::backend::{create_backend, Backend};
use minzc::config::BackendKind;
use minzc::mir::{ArithOp, MirFunction, MirParam, MirProgram, Opcode, Operand};
use minzc::optimize::{optimize, OptLevel, OptimizeOptions};
use minzc::span::Span;
use minzc::types::TypeInterner;

/// A chain of `n` additions feeding into a single return, deep enough to
/// give constant folding and dead-code elimination real work to do.
fn synthetic_program(n: usize) -> (MirProgram, TypeInterner) {
    let interner = TypeInterner::new();
    let b = interner.builtins();
    let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u16_);
    f.is_pub = true;
    let entry = f.fresh_block();
    f.entry = entry;

    let mut acc = f.fresh_reg();
    f.push(entry, Opcode::Const(0), Some(acc), b.u16_, Span::dummy());
    for i in 0..n {
        let next = f.fresh_reg();
        let rhs = if i % 2 == 0 { Operand::Imm(i as i64) } else { Operand::Imm(1) };
        f.push(entry, Opcode::Arith { op: ArithOp::Add, lhs: Operand::Reg(acc), rhs }, Some(next), b.u16_, Span::dummy());
        acc = next;
    }
    f.push(entry, Opcode::Return(Some(Operand::Reg(acc))), None, b.u16_, Span::dummy());

    let mut helper = MirFunction::new("unused_helper".into(), AbiKind::Register, b.u16_);
    let h = helper.fresh_block();
    helper.entry = h;
    let helper_param = helper.fresh_reg();
    helper.params.push(MirParam { name: "x".into(), ty: b.u16_, slot: helper_param });
    helper.push(h, Opcode::Return(Some(Operand::Imm(0))), None, b.u16_, Span::dummy());

    (MirProgram { functions: vec![f, helper], globals: Vec::new() }, interner)
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    for size in [10usize, 100, 500] {
        group.bench_function(format!("{size}_instructions"), |bencher| {
            bencher.iter(|| {
                let (program, _interner) = synthetic_program(size);
                let opts = OptimizeOptions { level: OptLevel::O2, ..OptimizeOptions::default() };
                black_box(optimize(black_box(program), &opts))
            });
        });
    }
    group.finish();
}

fn bench_z80_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("z80_emit");
    for size in [10usize, 100, 500] {
        let (program, interner) = synthetic_program(size);
        let opts = OptimizeOptions { level: OptLevel::O2, ..OptimizeOptions::default() };
        let optimized = optimize(program, &opts).program;
        let backend = create_backend(BackendKind::Z80);
        group.bench_function(format!("{size}_instructions"), |bencher| {
            bencher.iter(|| black_box(backend.emit(black_box(&optimized), &interner)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize, bench_z80_emit);
criterion_main!(benches);
