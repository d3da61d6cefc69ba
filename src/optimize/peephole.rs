//! MIR-level peephole pass: local rewrites within a single basic
//! block that remove redundant moves, coalesce repeated loads/stores to the
//! same place, and collapse a `Not` immediately following the `Compare`
//! that feeds it. Grounded on
//! `mastercyb-trident/src/ir/tir/optimize/mod.rs`'s flat `merge_*`/
//! `eliminate_*` functions, each a single linear scan over the instruction
//! list.

use std::collections::HashMap;

use crate::mir::{CmpOp, MirFunction, Opcode, Operand, Place, Reg};

/// Run every peephole rewrite over every block of `f` until a fixpoint.
/// Returns the number of instructions removed or rewritten.
pub fn run(f: &mut MirFunction) -> usize {
    let mut total = 0;
    loop {
        let mut changed = 0;
        changed += remove_self_moves(f);
        changed += coalesce_loads_and_stores(f);
        changed += collapse_not_of_compare(f);
        total += changed;
        if changed == 0 {
            break;
        }
    }
    total
}

fn remove_self_moves(f: &mut MirFunction) -> usize {
    let mut removed = 0;
    for block in &mut f.blocks {
        let before = block.instructions.len();
        block.instructions.retain(|inst| !matches!((&inst.opcode, inst.dest), (Opcode::Move(Operand::Reg(src)), Some(dest)) if *src == dest));
        removed += before - block.instructions.len();
    }
    removed
}

fn place_key(place: &Place) -> Option<String> {
    match place {
        Place::Local(n) => Some(format!("local{n}")),
        Place::Global(name) => Some(format!("global:{name}")),
        // Indexed/Indirect/Field bases may alias through pointer writes
        // elsewhere in the block; conservatively never coalesce them.
        Place::Indexed { .. } | Place::Indirect { .. } | Place::Field { .. } => None,
    }
}

/// Collapse a `Load` of a place that was already loaded earlier in the same
/// block (with no intervening write that could invalidate it) into a
/// `Move` of the earlier load's register; drop a `Store` to a place that is
/// immediately overwritten by another `Store` to the same place before any
/// intervening read ( "coalesce consecutive loads/stores to the same
/// slot").
fn coalesce_loads_and_stores(f: &mut MirFunction) -> usize {
    let mut removed = 0;
    for block in &mut f.blocks {
        let mut last_load: HashMap<String, Reg> = HashMap::new();
        let mut pending_store: HashMap<String, usize> = HashMap::new();
        let mut to_drop: Vec<usize> = Vec::new();
        let mut rewrites: Vec<(usize, Opcode)> = Vec::new();

        for (i, inst) in block.instructions.iter().enumerate() {
            match &inst.opcode {
                Opcode::Load(place) => {
                    if let Some(key) = place_key(place) {
                        if let Some(&prev) = last_load.get(&key) {
                            rewrites.push((i, Opcode::Move(Operand::Reg(prev))));
                        } else if let Some(dest) = inst.dest {
                            last_load.insert(key.clone(), dest);
                        }
                        pending_store.remove(&key);
                    } else {
                        last_load.clear();
                        pending_store.clear();
                    }
                }
                Opcode::Store { place, .. } => {
                    if let Some(key) = place_key(place) {
                        if let Some(&earlier) = pending_store.get(&key) {
                            to_drop.push(earlier);
                        }
                        pending_store.insert(key.clone(), i);
                        last_load.remove(&key);
                    } else {
                        last_load.clear();
                        pending_store.clear();
                    }
                }
                // Any call, address-of, or indirection could write through
                // an alias the key-based tracking can't see; be conservative.
                Opcode::Call { .. } | Opcode::AddressOf(_) | Opcode::PatchImmediate { .. } => {
                    last_load.clear();
                    pending_store.clear();
                }
                _ => {}
            }
        }

        for (i, opcode) in rewrites {
            block.instructions[i].opcode = opcode;
        }
        if !to_drop.is_empty() {
            let drop_set: std::collections::HashSet<usize> = to_drop.into_iter().collect();
            let before = block.instructions.len();
            let mut idx = 0;
            block.instructions.retain(|_| {
                let keep = !drop_set.contains(&idx);
                idx += 1;
                keep
            });
            removed += before - block.instructions.len();
        }
    }
    removed
}

/// `r = cmp(a, b); r2 = not(r)` with `r` used nowhere else becomes a single
/// `r2 = cmp(negated_op, a, b)`.
fn collapse_not_of_compare(f: &mut MirFunction) -> usize {
    let use_counts = use_counts(f);
    let mut folded = 0;
    for block in &mut f.blocks {
        let mut def_index: HashMap<Reg, usize> = HashMap::new();
        let mut to_drop: Vec<usize> = Vec::new();
        let mut rewrites: Vec<(usize, Opcode)> = Vec::new();

        for i in 0..block.instructions.len() {
            if let Opcode::Not(Operand::Reg(src)) = &block.instructions[i].opcode {
                if use_counts.get(src).copied().unwrap_or(0) == 1 {
                    if let Some(&def_i) = def_index.get(src) {
                        if let Opcode::Compare { op, lhs, rhs } = &block.instructions[def_i].opcode {
                            rewrites.push((i, Opcode::Compare { op: negate(*op), lhs: *lhs, rhs: *rhs }));
                            to_drop.push(def_i);
                        }
                    }
                }
            }
            if let Some(d) = block.instructions[i].dest {
                def_index.insert(d, i);
            }
        }

        for (i, opcode) in rewrites {
            block.instructions[i].opcode = opcode;
            folded += 1;
        }
        if !to_drop.is_empty() {
            let drop_set: std::collections::HashSet<usize> = to_drop.into_iter().collect();
            let mut idx = 0;
            block.instructions.retain(|_| {
                let keep = !drop_set.contains(&idx);
                idx += 1;
                keep
            });
        }
    }
    folded
}

fn negate(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Eq => CmpOp::Ne,
        CmpOp::Ne => CmpOp::Eq,
        CmpOp::Lt => CmpOp::Ge,
        CmpOp::Ge => CmpOp::Lt,
        CmpOp::Gt => CmpOp::Le,
        CmpOp::Le => CmpOp::Gt,
    }
}

fn use_counts(f: &MirFunction) -> HashMap<Reg, u32> {
    let mut counts = HashMap::new();
    for block in &f.blocks {
        for inst in &block.instructions {
            for r in inst.opcode.uses() {
                *counts.entry(r).or_insert(0) += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{CmpOp, MirFunction};
    use crate::span::Span;
    use crate::types::TypeInterner;

    #[test]
    fn drops_self_move() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.u8_);
        let r = f.fresh_reg();
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Move(Operand::Reg(r)), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let removed = run(&mut f);
        assert!(removed >= 1);
        assert_eq!(f.block(entry).instructions.len(), 1);
    }

    #[test]
    fn coalesces_repeated_global_load() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r1 = f.fresh_reg();
        let r2 = f.fresh_reg();
        f.push(entry, Opcode::Load(Place::Global("g".into())), Some(r1), b.u8_, Span::dummy());
        f.push(entry, Opcode::Load(Place::Global("g".into())), Some(r2), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r2))), None, b.u8_, Span::dummy());
        run(&mut f);
        assert!(matches!(f.block(entry).instructions[1].opcode, Opcode::Move(Operand::Reg(reg)) if reg == r1));
    }

    #[test]
    fn collapses_not_of_single_use_compare() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.bool_);
        let entry = f.fresh_block();
        f.entry = entry;
        let cmp = f.fresh_reg();
        let notr = f.fresh_reg();
        f.push(entry, Opcode::Compare { op: CmpOp::Eq, lhs: Operand::Imm(1), rhs: Operand::Imm(2) }, Some(cmp), b.bool_, Span::dummy());
        f.push(entry, Opcode::Not(Operand::Reg(cmp)), Some(notr), b.bool_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(notr))), None, b.bool_, Span::dummy());
        run(&mut f);
        assert_eq!(f.block(entry).instructions.len(), 2);
        assert!(matches!(f.block(entry).instructions[0].opcode, Opcode::Compare { op: CmpOp::Ne, .. }));
    }
}
