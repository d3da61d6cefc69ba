//! SMC/TSMC calling convention model: the backend-independent bookkeeping
//! for anchors, patch sites, and the live-anchor set a function must
//! save/restore for reentrancy. Grounded on
//! `mastercyb-trident/src/ir/tir/optimize/spill.rs`
//! (liveness-driven bookkeeping over a flat instruction stream) --
//! generalized from stack-spill slots to named immediate-operand anchors.

use std::collections::HashSet;

use crate::mir::{MirFunction, Opcode};

/// One SMC parameter anchor: the stable symbol a caller patches before
/// `CALL fn`, and the MIR register that instruction writes into (so the
/// backend can find "the instruction whose immediate operand holds this
/// parameter").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anchor {
    /// `function_name.param_name.imm`, exposed as a label to patchers.
    pub symbol: String,
    pub param_name: String,
}

/// Derive the anchor set for an SMC/TSMC function: one anchor per parameter,
/// named with the `fn$x.imm` convention (rendered here with dots, which
/// assemblers generally accept in label text; backends may re-escape).
pub fn anchors_for(f: &MirFunction) -> Vec<Anchor> {
    f.params
        .iter()
        .map(|p| Anchor { symbol: format!("{}.{}.imm", f.name, p.name), param_name: p.name.clone() })
        .collect()
}

/// Which instructions in `f` are live, SMC-anchor-sensitive: any instruction
/// whose operand reads directly from a parameter's register before that
/// register is reassigned. Returns the subset of `anchors_for(f)` actually read in the
/// body -- an anchor that's never referenced needs no save/restore.
pub fn live_anchors(f: &MirFunction) -> Vec<Anchor> {
    let mut used_param_regs = HashSet::new();
    for block in &f.blocks {
        for inst in &block.instructions {
            for reg in inst.opcode.uses() {
                if f.params.iter().any(|p| p.slot == reg) {
                    used_param_regs.insert(reg);
                }
            }
        }
    }
    f.params
        .iter()
        .filter(|p| used_param_regs.contains(&p.slot))
        .map(|p| Anchor { symbol: format!("{}.{}.imm", f.name, p.name), param_name: p.name.clone() })
        .collect()
}

/// Reentrancy handling: on platforms where an SMC function might be
/// re-entered (a recursive call before the first invocation patches a
/// *different* immediate, or an interrupt preempting mid-body), the
/// save/restore set is exactly the function's live anchors -- saving more
/// wastes cycles, saving fewer corrupts a concurrent invocation's state.
pub fn reentrancy_save_set(f: &MirFunction) -> Vec<Anchor> {
    live_anchors(f)
}

/// Whether `f`'s call graph contains a tail call to itself in the shape
/// tail-call conversion looks for: a `Return` whose value is (or
/// immediately follows) a `Call` to `f.name` with no intervening work in the
/// same block. Used by the optimizer's tail-call pass and exposed here so
/// SMC re-patch-on-tail-call logic and the pass agree on the same
/// definition of "tail position."
pub fn has_self_tail_call(f: &MirFunction) -> bool {
    f.blocks.iter().any(|b| {
        let mut saw_call = false;
        for inst in &b.instructions {
            match &inst.opcode {
                Opcode::Call { callee, .. } if *callee == f.name => saw_call = true,
                Opcode::Return(_) if saw_call => return true,
                _ => {}
            }
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::{ArithOp, MirParam, Operand};
    use crate::span::Span;
    use crate::types::TypeInterner;

    fn make_fn(name: &str, abi: AbiKind) -> MirFunction {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        MirFunction::new(name.into(), abi, b.u16_)
    }

    #[test]
    fn anchors_named_per_convention() {
        let mut f = make_fn("sum", AbiKind::Tsmc);
        let slot = f.fresh_reg();
        f.params.push(MirParam { name: "n".into(), ty: f.return_type, slot });
        let a = anchors_for(&f);
        assert_eq!(a[0].symbol, "sum.n.imm");
    }

    #[test]
    fn unused_param_has_no_live_anchor() {
        let mut f = make_fn("f", AbiKind::Tsmc);
        let used = f.fresh_reg();
        let unused = f.fresh_reg();
        f.params.push(MirParam { name: "used".into(), ty: f.return_type, slot: used });
        f.params.push(MirParam { name: "unused".into(), ty: f.return_type, slot: unused });
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Return(Some(Operand::Reg(used))), None, f.return_type, Span::dummy());
        let live = live_anchors(&f);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].param_name, "used");
    }

    #[test]
    fn detects_self_tail_call() {
        let mut f = make_fn("sum", AbiKind::Tsmc);
        let n = f.fresh_reg();
        f.params.push(MirParam { name: "n".into(), ty: f.return_type, slot: n });
        let entry = f.fresh_block();
        f.entry = entry;
        let next = f.fresh_reg();
        f.push(entry, Opcode::Arith { op: ArithOp::Sub, lhs: Operand::Reg(n), rhs: Operand::Imm(1) }, Some(next), f.return_type, Span::dummy());
        f.push(entry, Opcode::Call { callee: "sum".into(), args: vec![Operand::Reg(next)] }, Some(n), f.return_type, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(n))), None, f.return_type, Span::dummy());
        assert!(has_self_tail_call(&f));
    }

    #[test]
    fn non_tail_call_is_not_flagged() {
        let mut f = make_fn("g", AbiKind::Register);
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Return(Some(Operand::Imm(0))), None, f.return_type, Span::dummy());
        assert!(!has_self_tail_call(&f));
    }
}
