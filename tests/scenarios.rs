//! End-to-end pipeline scenarios. Exercised directly against hand-built
//! MIR rather than source text: the front end (lexer/parser/semantic) is
//! covered by its own module tests, so these integration tests isolate the
//! optimizer/interpreter/backend behavior the scenarios actually assert on.

use minzc::abi::AbiKind;
use minzc::backend::{create_backend, Backend};
use minzc::config::BackendKind;
use minzc::interp::{self, DEFAULT_STEP_BUDGET};
use minzc::mir::{ArithOp, CmpOp, MirFunction, MirParam, MirProgram, Opcode, Operand};
use minzc::optimize::{self, OptLevel, OptimizeOptions};
use minzc::span::Span;
use minzc::types::TypeInterner;

fn two_arg_fn(name: &str, abi: AbiKind, interner: &TypeInterner, ty: minzc::types::TypeId) -> (MirFunction, minzc::mir::Reg, minzc::mir::Reg) {
    let mut f = MirFunction::new(name.into(), abi, ty);
    let a = f.fresh_reg();
    let b = f.fresh_reg();
    f.params.push(MirParam { name: "a".into(), ty, slot: a });
    f.params.push(MirParam { name: "b".into(), ty, slot: b });
    (f, a, b)
}

/// Scenario 1: `add(40, 2)` folds to `42` via CTIE, and tree-shake then
/// drops the now-unreferenced `add`.
#[test]
fn ctie_folds_constant_call_and_tree_shake_drops_the_callee() {
    let interner = TypeInterner::new();
    let b = interner.builtins();

    let (mut add, a_reg, b_reg) = two_arg_fn("add$u8$u8", AbiKind::Register, &interner, b.u8_);
    let entry = add.fresh_block();
    add.entry = entry;
    let sum = add.fresh_reg();
    add.push(entry, Opcode::Arith { op: ArithOp::Add, lhs: Operand::Reg(a_reg), rhs: Operand::Reg(b_reg) }, Some(sum), b.u8_, Span::dummy());
    add.push(entry, Opcode::Return(Some(Operand::Reg(sum))), None, b.u8_, Span::dummy());

    let mut main = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
    main.is_pub = true;
    let mentry = main.fresh_block();
    main.entry = mentry;
    let call_dest = main.fresh_reg();
    main.push(mentry, Opcode::Call { callee: "add$u8$u8".into(), args: vec![Operand::Imm(40), Operand::Imm(2)] }, Some(call_dest), b.u8_, Span::dummy());
    main.push(mentry, Opcode::Return(Some(Operand::Reg(call_dest))), None, b.u8_, Span::dummy());

    let program = MirProgram { functions: vec![main, add], globals: Vec::new() };
    let opts = OptimizeOptions { level: OptLevel::O2, enable_ctie: true, ..OptimizeOptions::default() };
    let result = optimize::optimize(program, &opts);

    assert_eq!(result.program.functions.len(), 1, "add$u8$u8 should be tree-shaken once CTIE removes the only call site");
    let main_fn = result.program.function("main").expect("main survives");
    assert!(matches!(main_fn.block(mentry).instructions[0].opcode, Opcode::Const(42)));
}

/// Scenario 2: tail-recursive `sum(n, acc)` returns `55` for `sum(10, 0)`,
/// and the SMC tail-call pass turns the self-call into a branch back to
/// entry with re-patched anchors instead of a stack-growing call.
#[test]
fn tail_recursive_sum_returns_fifty_five_and_lowers_to_a_branch() {
    let interner = TypeInterner::new();
    let b = interner.builtins();

    let mut f = MirFunction::new("sum".into(), AbiKind::Tsmc, b.u16_);
    let n = f.fresh_reg();
    let acc = f.fresh_reg();
    f.params.push(MirParam { name: "n".into(), ty: b.u16_, slot: n });
    f.params.push(MirParam { name: "acc".into(), ty: b.u16_, slot: acc });

    let entry = f.fresh_block();
    let base_case = f.fresh_block();
    let recurse = f.fresh_block();
    f.entry = entry;

    let is_zero = f.fresh_reg();
    f.push(entry, Opcode::Compare { op: CmpOp::Eq, lhs: Operand::Reg(n), rhs: Operand::Imm(0) }, Some(is_zero), b.bool_, Span::dummy());
    f.push(entry, Opcode::Branch { cond: Operand::Reg(is_zero), then_bb: base_case, else_bb: recurse }, None, b.void, Span::dummy());

    f.push(base_case, Opcode::Return(Some(Operand::Reg(acc))), None, b.u16_, Span::dummy());

    let next_n = f.fresh_reg();
    let next_acc = f.fresh_reg();
    let call_dest = f.fresh_reg();
    f.push(recurse, Opcode::Arith { op: ArithOp::Sub, lhs: Operand::Reg(n), rhs: Operand::Imm(1) }, Some(next_n), b.u16_, Span::dummy());
    f.push(recurse, Opcode::Arith { op: ArithOp::Add, lhs: Operand::Reg(acc), rhs: Operand::Reg(n) }, Some(next_acc), b.u16_, Span::dummy());
    f.push(recurse, Opcode::Call { callee: "sum".into(), args: vec![Operand::Reg(next_n), Operand::Reg(next_acc)] }, Some(call_dest), b.u16_, Span::dummy());
    f.push(recurse, Opcode::Return(Some(Operand::Reg(call_dest))), None, b.u16_, Span::dummy());
    f.recompute_cfg();

    let program = MirProgram { functions: vec![f.clone()], globals: Vec::new() };
    let result = interp::interpret(&f, &[10, 0], &program, DEFAULT_STEP_BUDGET);
    assert_eq!(result, Ok(55));

    let mut converted_program = MirProgram { functions: vec![f], globals: Vec::new() };
    let converted = optimize::convert_tail_calls(&mut converted_program);
    assert_eq!(converted, 1);
    let converted_fn = &converted_program.functions[0];
    let last = converted_fn.block(recurse).instructions.last().unwrap();
    assert!(matches!(last.opcode, Opcode::Jump(e) if e == entry));
    assert!(converted_fn.block(recurse).instructions.iter().any(|i| i.opcode.is_smc()));
}

/// Scenario 3: `color(b)` dispatches through a 4-entry jump table (`0, 1..3,
/// default`), compiled from source through the real lexer/parser/lowerer
/// rather than hand-built MIR, so a regression that falls back to a compare
/// chain in the lowerer shows up here.
#[test]
fn dense_case_uses_a_jump_table_and_resolves_to_the_matching_arm() {
    let source = "pub fn color(b: u8) -> u8 { return case b { 0 => 7, 1..3 => 2, _ => 0 }; }";
    let opts = minzc::CompileOptions::default();
    let artifact = minzc::compile(source, &opts).expect("dense case over u8 should compile");

    assert!(artifact.text.contains(".jumptable:"), "expected a jump table in:\n{}", artifact.text);
    assert!(artifact.text.contains("JP (HL)"), "expected an indirect jump through the table in:\n{}", artifact.text);
}

/// Scenario 4: two `add` overloads mangle to distinct names, and CTIE folds
/// a call to the `u8` overload without touching the `u16` one.
#[test]
fn overloads_mangle_distinctly_and_ctie_targets_only_the_called_one() {
    let interner = TypeInterner::new();
    let b = interner.builtins();
    assert_eq!(interner.mangle(b.u8_), "u8");
    assert_eq!(interner.mangle(b.u16_), "u16");

    let (mut add8, a8, b8) = two_arg_fn("add$u8$u8", AbiKind::Register, &interner, b.u8_);
    let e8 = add8.fresh_block();
    add8.entry = e8;
    let s8 = add8.fresh_reg();
    add8.push(e8, Opcode::Arith { op: ArithOp::Add, lhs: Operand::Reg(a8), rhs: Operand::Reg(b8) }, Some(s8), b.u8_, Span::dummy());
    add8.push(e8, Opcode::Return(Some(Operand::Reg(s8))), None, b.u8_, Span::dummy());

    let (mut add16, a16, b16) = two_arg_fn("add$u16$u16", AbiKind::Register, &interner, b.u16_);
    let e16 = add16.fresh_block();
    add16.entry = e16;
    let s16 = add16.fresh_reg();
    add16.push(e16, Opcode::Arith { op: ArithOp::Add, lhs: Operand::Reg(a16), rhs: Operand::Reg(b16) }, Some(s16), b.u16_, Span::dummy());
    add16.push(e16, Opcode::Return(Some(Operand::Reg(s16))), None, b.u16_, Span::dummy());

    let mut main = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
    main.is_pub = true;
    let mentry = main.fresh_block();
    main.entry = mentry;
    let call_dest = main.fresh_reg();
    main.push(mentry, Opcode::Call { callee: "add$u8$u8".into(), args: vec![Operand::Imm(1), Operand::Imm(2)] }, Some(call_dest), b.u8_, Span::dummy());
    main.push(mentry, Opcode::Return(Some(Operand::Reg(call_dest))), None, b.u8_, Span::dummy());

    let mut program = MirProgram { functions: vec![main, add8, add16], globals: Vec::new() };
    let replaced = optimize::run_ctie(&mut program, DEFAULT_STEP_BUDGET);
    assert_eq!(replaced, 1);
    assert!(matches!(program.function("main").unwrap().block(mentry).instructions[0].opcode, Opcode::Const(3)));
    assert!(program.function("add$u16$u16").is_some(), "the untouched overload is left alone by CTIE");
}

/// Backend-parity property: for a program using no
/// target-specific intrinsics, `main`'s MIR-level result is identical
/// regardless of which backend eventually renders it -- only the emitted
/// text differs.
#[test]
fn backend_choice_does_not_change_the_optimized_mir_result() {
    let interner = TypeInterner::new();
    let b = interner.builtins();
    let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
    f.is_pub = true;
    let entry = f.fresh_block();
    f.entry = entry;
    let r = f.fresh_reg();
    f.push(entry, Opcode::Arith { op: ArithOp::Add, lhs: Operand::Imm(40), rhs: Operand::Imm(2) }, Some(r), b.u8_, Span::dummy());
    f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
    let program = MirProgram { functions: vec![f], globals: Vec::new() };

    let interpreted = interp::interpret(&program.functions[0], &[], &program, DEFAULT_STEP_BUDGET);
    assert_eq!(interpreted, Ok(42));

    for kind in [BackendKind::Z80, BackendKind::Mos6502, BackendKind::C99, BackendKind::Wasm] {
        let backend = create_backend(kind);
        let emitted = backend.emit(&program, &interner);
        assert!(!emitted.text.is_empty(), "{} should emit something for main", kind.name());
    }
}
