//! Z80 backend (primary target): register allocation, SMC/TSMC
//! realization, `JR`/`DJNZ` branch selection, jump tables for dense
//! `case`, and an assembly-level peephole pass. Grounded on
//! `mastercyb-trident/src/codegen/backend/triton.rs`'s shape (one emitter
//! struct per target, one `inst_*`-style method per MIR operation) but
//! with its own register allocator -- the Z80, unlike trident's stack
//! machines, is a register machine, so operand placement is this
//! backend's job, not the caller's.

use std::collections::HashMap;

use crate::mir::{ArithOp, BasicBlock, BlockId, CmpOp, Instruction, MirFunction, MirProgram, Opcode, Operand, Place, Reg};
use crate::smc;
use crate::types::TypeInterner;

use super::{Backend, EmitResult};

pub struct Z80Backend;

impl Backend for Z80Backend {
    fn target_name(&self) -> &'static str {
        "z80"
    }

    fn output_extension(&self) -> &'static str {
        ".asm"
    }

    fn emit(&self, program: &MirProgram, interner: &TypeInterner) -> EmitResult {
        let mut lines = Vec::new();
        let mut symbols = HashMap::new();
        for f in &program.functions {
            symbols.insert(f.name.clone(), lines.len() as u32);
            let alloc = RegAlloc::build(f, interner);
            let body = emit_function(f, &alloc);
            lines.extend(peephole::run(body));
            lines.push(String::new());
        }
        EmitResult { text: lines.join("\n"), symbols }
    }
}

/// Where a virtual register lives once allocated: an 8-bit
/// single register, a 16-bit register pair, or a spill slot relative to
/// `IX` (the conventional Z80 frame-pointer idiom for locals that don't
/// fit in the seven general registers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Loc {
    Reg8(&'static str),
    Reg16(&'static str),
    Spill { offset: u32, width: u32 },
}

impl Loc {
    fn text(self) -> String {
        match self {
            Loc::Reg8(r) | Loc::Reg16(r) => r.to_string(),
            Loc::Spill { offset, .. } => format!("(IX+{offset})"),
        }
    }
}

const REG8_POOL: [&str; 7] = ["A", "B", "C", "D", "E", "H", "L"];
const REG16_POOL: [&str; 3] = ["BC", "DE", "HL"];

struct RegAlloc {
    locs: HashMap<Reg, Loc>,
}

impl RegAlloc {
    /// Greedy, whole-function allocation with a spill region: registers are
    /// assigned physical locations in
    /// the order they're first defined, 8-bit values from `REG8_POOL`,
    /// 16-bit values from `REG16_POOL`; once a pool is exhausted the
    /// register spills to the next free `IX`-relative slot. Not a true
    /// per-block linear scan with liveness-driven reuse -- conservative,
    /// but never miscompiles a program whose live ranges overlap.
    fn build(f: &MirFunction, interner: &TypeInterner) -> Self {
        let mut widths: HashMap<Reg, u32> = HashMap::new();
        for p in &f.params {
            widths.insert(p.slot, crate::lower::width_of(p.ty, interner));
        }
        for l in &f.locals {
            widths.insert(l.slot, crate::lower::width_of(l.ty, interner));
        }
        for block in &f.blocks {
            for inst in &block.instructions {
                if let Some(d) = inst.dest {
                    widths.entry(d).or_insert_with(|| crate::lower::width_of(inst.ty, interner));
                }
            }
        }

        let mut ordered: Vec<Reg> = widths.keys().copied().collect();
        ordered.sort();

        let mut locs = HashMap::new();
        let mut next8 = 0usize;
        let mut next16 = 0usize;
        let mut spill_offset = 0u32;

        for r in ordered {
            let width = widths[&r];
            let loc = if width <= 1 {
                if next8 < REG8_POOL.len() {
                    let l = Loc::Reg8(REG8_POOL[next8]);
                    next8 += 1;
                    l
                } else {
                    let l = Loc::Spill { offset: spill_offset, width: 1 };
                    spill_offset += 1;
                    l
                }
            } else if width == 2 {
                if next16 < REG16_POOL.len() {
                    let l = Loc::Reg16(REG16_POOL[next16]);
                    next16 += 1;
                    l
                } else {
                    let l = Loc::Spill { offset: spill_offset, width: 2 };
                    spill_offset += 2;
                    l
                }
            } else {
                let l = Loc::Spill { offset: spill_offset, width };
                spill_offset += width;
                l
            };
            locs.insert(r, loc);
        }

        Self { locs }
    }

    fn loc(&self, r: Reg) -> Loc {
        self.locs.get(&r).copied().unwrap_or(Loc::Reg8("A"))
    }

    fn operand_text(&self, op: &Operand) -> String {
        match op {
            Operand::Reg(r) => self.loc(*r).text(),
            Operand::Imm(n) => n.to_string(),
        }
    }

    fn place_text(&self, place: &Place) -> String {
        match place {
            Place::Local(n) => self.loc(Reg(*n)).text(),
            Place::Global(name) => format!("({name})"),
            Place::Indexed { base, index, elem_size } => format!("({}+{}*{})", self.loc(*base).text(), self.operand_text(index), elem_size),
            Place::Indirect { base } => format!("({})", self.loc(*base).text()),
            Place::Field { base, offset } => format!("({}+{})", self.loc(*base).text(), offset),
        }
    }
}

fn block_label(func: &str, block: BlockId) -> String {
    format!("{func}_{block}")
}

fn emit_function(f: &MirFunction, alloc: &RegAlloc) -> Vec<String> {
    let mut lines = vec![format!("{}:", f.name)];

    if matches!(f.abi, crate::abi::AbiKind::Smc | crate::abi::AbiKind::Tsmc) {
        for anchor in smc::live_anchors(f) {
            let Some(param) = f.params.iter().find(|p| p.name == anchor.param_name) else { continue };
            lines.push(format!("{}:", anchor.symbol));
            lines.push(format!(" LD {}, 0", alloc.loc(param.slot).text()));
        }
    }

    for block in &f.blocks {
        lines.push(format!("{}:", block_label(&f.name, block.id)));
        emit_block(f, block, alloc, &mut lines);
    }
    lines
}

fn emit_block(f: &MirFunction, block: &BasicBlock, alloc: &RegAlloc, lines: &mut Vec<String>) {
    let mut i = 0;
    while i < block.instructions.len() {
        if let Some(consumed) = try_emit_djnz(f, &block.instructions[i..], alloc, lines) {
            i += consumed;
            continue;
        }
        emit_instruction(f, &block.instructions[i], alloc, lines);
        i += 1;
    }
}

/// Recognize `r' = r - 1; c = (r' != 0); branch c, loop_body, exit` and
/// collapse it to a single `DJNZ` when `r` lives in `B`: the Z80's `DJNZ`
/// decrements `B` and jumps only if the result is nonzero, which is
/// exactly this three-instruction idiom.
/// Returns the instruction count folded away, or `None` if the window
/// doesn't match.
fn try_emit_djnz(f: &MirFunction, window: &[Instruction], alloc: &RegAlloc, lines: &mut Vec<String>) -> Option<usize> {
    let [dec, cmp, branch] = window.get(0..3)?.try_into().ok()?;
    let Opcode::Arith { op: ArithOp::Sub, lhs: Operand::Reg(counter), rhs: Operand::Imm(1) } = &dec.opcode else { return None };
    let dec_dest = dec.dest?;
    if alloc.loc(*counter) != Loc::Reg8("B") || alloc.loc(dec_dest) != Loc::Reg8("B") {
        return None;
    }
    let Opcode::Compare { op: CmpOp::Ne, lhs: Operand::Reg(cmp_lhs), rhs: Operand::Imm(0) } = &cmp.opcode else { return None };
    if *cmp_lhs != dec_dest {
        return None;
    }
    let cmp_dest = cmp.dest?;
    let Opcode::Branch { cond: Operand::Reg(cond), then_bb, else_bb } = &branch.opcode else { return None };
    if *cond != cmp_dest {
        return None;
    }
    lines.push(format!(" DJNZ {}", block_label(&f.name, *then_bb)));
    lines.push(format!(" JP {}", block_label(&f.name, *else_bb)));
    Some(3)
}

fn emit_instruction(f: &MirFunction, inst: &Instruction, alloc: &RegAlloc, lines: &mut Vec<String>) {
    let dest = inst.dest.map(|d| alloc.loc(d).text());
    match &inst.opcode {
        Opcode::Const(v) => lines.push(format!(" LD {}, {}", dest.unwrap(), v)),
        Opcode::Arith { op, lhs, rhs } => emit_arith(alloc, &dest.unwrap(), *op, lhs, rhs, lines),
        Opcode::Neg(o) => {
            lines.push(format!(" LD A, {}", alloc.operand_text(o)));
            lines.push(" NEG".to_string());
            lines.push(format!(" LD {}, A", dest.unwrap()));
        }
        Opcode::Not(o) | Opcode::BitNot(o) => {
            lines.push(format!(" LD A, {}", alloc.operand_text(o)));
            lines.push(" CPL".to_string());
            lines.push(format!(" LD {}, A", dest.unwrap()));
        }
        Opcode::Compare { op, lhs, rhs } => emit_compare(alloc, &dest.unwrap(), *op, lhs, rhs, lines),
        Opcode::Load(place) => lines.push(format!(" LD {}, {}", dest.unwrap(), alloc.place_text(place))),
        Opcode::Store { place, value } => lines.push(format!(" LD {}, {}", alloc.place_text(place), alloc.operand_text(value))),
        Opcode::Move(o) => lines.push(format!(" LD {}, {}", dest.unwrap(), alloc.operand_text(o))),
        Opcode::AddressOf(place) => lines.push(format!(" LD {}, {}", dest.unwrap(), addr_of_text(alloc, place))),
        Opcode::Cast(o) => lines.push(format!(" LD {}, {}", dest.unwrap(), alloc.operand_text(o))),
        Opcode::Jump(target) => lines.push(format!(" JR {}", block_label(&f.name, *target))),
        Opcode::Branch { cond, then_bb, else_bb } => {
            lines.push(format!(" LD A, {}", alloc.operand_text(cond)));
            lines.push(" OR A".to_string());
            lines.push(format!(" JR NZ, {}", block_label(&f.name, *then_bb)));
            lines.push(format!(" JR {}", block_label(&f.name, *else_bb)));
        }
        Opcode::JumpTable { index, base, targets, default } => {
            lines.push(format!(" LD A, {}", alloc.operand_text(index)));
            lines.push(format!(" SUB {base}"));
            lines.push(format!(" JP C, {}", block_label(&f.name, *default)));
            lines.push(format!(" CP {}", targets.len()));
            lines.push(format!(" JP NC, {}", block_label(&f.name, *default)));
            lines.push(" LD HL, .jumptable".to_string());
            lines.push(" ADD A, A".to_string());
            lines.push(" LD E, A".to_string());
            lines.push(" LD D, 0".to_string());
            lines.push(" ADD HL, DE".to_string());
            lines.push(" LD A, (HL)".to_string());
            lines.push(" INC HL".to_string());
            lines.push(" LD H, (HL)".to_string());
            lines.push(" LD L, A".to_string());
            lines.push(" JP (HL)".to_string());
            lines.push(".jumptable:".to_string());
            for t in targets {
                lines.push(format!(" DW {}", block_label(&f.name, *t)));
            }
        }
        Opcode::Call { callee, args } => {
            for (i, arg) in args.iter().enumerate() {
                let reg = REG8_POOL.get(i).copied().unwrap_or("A");
                lines.push(format!(" LD {}, {}", reg, alloc.operand_text(arg)));
            }
            lines.push(format!(" CALL {callee}"));
            if let Some(d) = dest {
                lines.push(format!(" LD {d}, A"));
            }
        }
        Opcode::Return(value) => {
            if let Some(v) = value {
                lines.push(format!(" LD A, {}", alloc.operand_text(v)));
            }
            lines.push(" RET".to_string());
        }
        Opcode::PatchImmediate { anchor, value } => {
            lines.push(format!(" LD A, {}", alloc.operand_text(value)));
            lines.push(format!(" LD ({anchor}+1), A"));
        }
        Opcode::In(port) => lines.push(format!(" IN {}, ({})", dest.unwrap(), alloc.operand_text(port))),
        Opcode::Out { port, value } => lines.push(format!(" OUT ({}), {}", alloc.operand_text(port), alloc.operand_text(value))),
        Opcode::Label(name) => lines.push(format!(" ; {name}")),
    }
}

fn addr_of_text(alloc: &RegAlloc, place: &Place) -> String {
    match place {
        Place::Global(name) => name.clone(),
        other => alloc.place_text(other),
    }
}

fn emit_arith(alloc: &RegAlloc, dest: &str, op: ArithOp, lhs: &Operand, rhs: &Operand, lines: &mut Vec<String>) {
    let mnemonic = match op {
        ArithOp::Add => "ADD",
        ArithOp::Sub => "SUB",
        ArithOp::Mul => "CALL __mul16",
        ArithOp::Div => "CALL __div16",
        ArithOp::Mod => "CALL __mod16",
        ArithOp::And => "AND",
        ArithOp::Or => "OR",
        ArithOp::Xor => "XOR",
        ArithOp::Shl => "SLA",
        ArithOp::Shr => "SRL",
    };
    lines.push(format!(" LD A, {}", alloc.operand_text(lhs)));
    match op {
        ArithOp::Add | ArithOp::Sub | ArithOp::And | ArithOp::Or | ArithOp::Xor => {
            lines.push(format!(" {} {}", mnemonic, alloc.operand_text(rhs)));
        }
        ArithOp::Shl | ArithOp::Shr => lines.push(format!(" {mnemonic} A")),
        ArithOp::Mul | ArithOp::Div | ArithOp::Mod => {
            lines.push(format!(" LD B, {}", alloc.operand_text(rhs)));
            lines.push(format!(" {mnemonic}"));
        }
    }
    lines.push(format!(" LD {dest}, A"));
}

fn emit_compare(alloc: &RegAlloc, dest: &str, op: CmpOp, lhs: &Operand, rhs: &Operand, lines: &mut Vec<String>) {
    lines.push(format!(" LD A, {}", alloc.operand_text(lhs)));
    lines.push(format!(" CP {}", alloc.operand_text(rhs)));
    let set = match op {
        CmpOp::Eq => " JP Z, $+5\n LD A, 0\n JR $+3\n LD A, 1",
        CmpOp::Ne => " JP NZ, $+5\n LD A, 0\n JR $+3\n LD A, 1",
        CmpOp::Lt => " JP C, $+5\n LD A, 0\n JR $+3\n LD A, 1",
        CmpOp::Ge => " JP NC, $+5\n LD A, 0\n JR $+3\n LD A, 1",
        CmpOp::Gt => " JP PO, $+5\n LD A, 0\n JR $+3\n LD A, 1",
        CmpOp::Le => " JP PE, $+5\n LD A, 0\n JR $+3\n LD A, 1",
    };
    for line in set.lines() {
        lines.push(line.to_string());
    }
    lines.push(format!(" LD {dest}, A"));
}

/// Assembly-level peephole rewrites: pattern matches on the emitted
/// text itself, after register allocation has fixed concrete operand
/// names. Deliberately textual rather than another MIR pass -- these
/// patterns (a cancelling `EX DE,HL` pair, a self-`LD`, the `ADD HL,DE`
/// idiom for `+1`) only exist once operands are concrete Z80 registers.
mod peephole {
    pub fn run(mut lines: Vec<String>) -> Vec<String> {
        loop {
            let before = lines.len();
            lines = cancel_ex_de_hl(lines);
            lines = remove_self_loads(lines);
            lines = fold_add_hl_de_into_inc(lines);
            if lines.len() == before {
                return lines;
            }
        }
    }

    fn cancel_ex_de_hl(lines: Vec<String>) -> Vec<String> {
        let mut out = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            if lines[i].trim() == "EX DE,HL" && lines.get(i + 1).map(|l| l.trim()) == Some("EX DE,HL") {
                i += 2;
                continue;
            }
            out.push(lines[i].clone());
            i += 1;
        }
        out
    }

    fn remove_self_loads(lines: Vec<String>) -> Vec<String> {
        lines
            .into_iter()
            .filter(|line| {
                let trimmed = line.trim();
                if let Some(rest) = trimmed.strip_prefix("LD ") {
                    if let Some((dst, src)) = rest.split_once(',') {
                        return dst.trim() != src.trim();
                    }
                }
                true
            })
            .collect()
    }

    fn fold_add_hl_de_into_inc(lines: Vec<String>) -> Vec<String> {
        let mut out = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            if lines[i].trim() == "LD DE, 1" && lines.get(i + 1).map(|l| l.trim()) == Some("ADD HL, DE") {
                out.push(" INC HL".to_string());
                i += 2;
                continue;
            }
            out.push(lines[i].clone());
            i += 1;
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn cancels_ex_de_hl_pair() {
            let lines = vec!["EX DE,HL".to_string(), "EX DE,HL".to_string(), "RET".to_string()];
            assert_eq!(run(lines), vec!["RET".to_string()]);
        }

        #[test]
        fn removes_self_load() {
            let lines = vec!["LD A, A".to_string(), "RET".to_string()];
            assert_eq!(run(lines), vec!["RET".to_string()]);
        }

        #[test]
        fn folds_add_hl_de_idiom_into_inc() {
            let lines = vec!["LD DE, 1".to_string(), "ADD HL, DE".to_string()];
            assert_eq!(run(lines), vec![" INC HL".to_string()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{MirFunction, MirParam};
    use crate::span::Span;
    use crate::types::TypeInterner;

    #[test]
    fn allocates_8bit_values_to_register_pool_in_order() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.u8_);
        let r0 = f.fresh_reg();
        let r1 = f.fresh_reg();
        f.params.push(MirParam { name: "a".into(), ty: b.u8_, slot: r0 });
        f.params.push(MirParam { name: "b".into(), ty: b.u8_, slot: r1 });
        let alloc = RegAlloc::build(&f, &interner);
        assert_eq!(alloc.loc(r0), Loc::Reg8("A"));
        assert_eq!(alloc.loc(r1), Loc::Reg8("B"));
    }

    #[test]
    fn spills_once_8bit_pool_is_exhausted() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.u8_);
        let mut regs = Vec::new();
        for i in 0..8 {
            let r = f.fresh_reg();
            f.params.push(MirParam { name: format!("p{i}"), ty: b.u8_, slot: r });
            regs.push(r);
        }
        let alloc = RegAlloc::build(&f, &interner);
        assert!(matches!(alloc.loc(regs[7]), Loc::Spill { .. }));
    }

    #[test]
    fn sixteen_bit_values_use_register_pairs() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.u16_);
        let r = f.fresh_reg();
        f.params.push(MirParam { name: "n".into(), ty: b.u16_, slot: r });
        let alloc = RegAlloc::build(&f, &interner);
        assert_eq!(alloc.loc(r), Loc::Reg16("BC"));
    }

    #[test]
    fn emits_smc_anchor_label_for_tsmc_function() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("sum".into(), AbiKind::Tsmc, b.u16_);
        let n = f.fresh_reg();
        f.params.push(MirParam { name: "n".into(), ty: b.u16_, slot: n });
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Return(Some(Operand::Reg(n))), None, b.u16_, Span::dummy());
        let alloc = RegAlloc::build(&f, &interner);
        let lines = emit_function(&f, &alloc);
        assert!(lines.iter().any(|l| l == "sum.n.imm:"));
    }

    #[test]
    fn djnz_pattern_collapses_decrement_compare_branch() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("loop".into(), AbiKind::Register, b.void);
        let counter = f.fresh_reg();
        f.params.push(MirParam { name: "n".into(), ty: b.u8_, slot: counter });
        let entry = f.fresh_block();
        let body = f.fresh_block();
        let exit = f.fresh_block();
        f.entry = entry;
        let next = f.fresh_reg();
        let cond = f.fresh_reg();
        f.push(entry, Opcode::Arith { op: ArithOp::Sub, lhs: Operand::Reg(counter), rhs: Operand::Imm(1) }, Some(next), b.u8_, Span::dummy());
        f.push(entry, Opcode::Compare { op: CmpOp::Ne, lhs: Operand::Reg(next), rhs: Operand::Imm(0) }, Some(cond), b.bool_, Span::dummy());
        f.push(entry, Opcode::Branch { cond: Operand::Reg(cond), then_bb: body, else_bb: exit }, None, b.void, Span::dummy());
        f.push(body, Opcode::Return(None), None, b.void, Span::dummy());
        f.push(exit, Opcode::Return(None), None, b.void, Span::dummy());

        let alloc = RegAlloc::build(&f, &interner);
        assert_eq!(alloc.loc(counter), Loc::Reg8("B"));
        let lines = emit_function(&f, &alloc);
        assert!(lines.iter().any(|l| l.contains("DJNZ")));
    }
}
