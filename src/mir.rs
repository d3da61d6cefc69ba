//! Mid-level IR: functions, basic blocks, typed virtual
//! registers, and opcodes carrying source-position and basic-block
//! metadata. Grounded on `mastercyb-trident/src/ir/tir` (a typed,
//! optimizable IR sitting between the typed AST and backend emission) --
//! generalized here from trident's flat stack-op sequence to an explicit
//! basic-block-and-branch shape, since MinZ backends (Z80 foremost) are
//! register machines, not stack machines.

use std::collections::HashMap;
use std::fmt;

use crate::abi::AbiKind;
use crate::span::Span;
use crate::types::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Either a virtual register or an immediate constant -- most arithmetic
/// opcodes accept either as an operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Imm(n) => write!(f, "#{}", n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Where a value referenced by a `Load`/`Store` opcode lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Place {
    /// A named local slot (its address may or may not be taken).
    Local(u32),
/// A named global in the fixed data segment.
    Global(String),
    /// `base[index]` — array element access.
    Indexed { base: Reg, index: Operand, elem_size: u32 },
    /// `*base` — pointer dereference.
    Indirect { base: Reg },
    /// `base.field` at a known byte offset — struct field access.
    Field { base: Reg, offset: u32 },
}

/// MIR opcodes. Every variant that produces a value
/// writes into `dest` (carried by `Instruction`, not the opcode itself) so
/// the verifier can check "one declared type per register" uniformly.
#[derive(Clone, Debug, PartialEq)]
pub enum Opcode {
    /// `dest = imm`
    Const(i64),
    /// `dest = src1 op src2`
    Arith { op: ArithOp, lhs: Operand, rhs: Operand },
    /// `dest = -src` / `dest = !src` / `dest = ~src`
    Neg(Operand),
    Not(Operand),
    BitNot(Operand),
    /// `dest = (lhs cmp rhs)` — produces a `bool`.
    Compare { op: CmpOp, lhs: Operand, rhs: Operand },
    /// `dest = load(place)`
    Load(Place),
    /// `store(place) = src`
    Store { place: Place, value: Operand },
/// `dest = src` (register-to-register copy; peephole target).
    Move(Operand),
    /// `dest = &place`
    AddressOf(Place),
    /// Widen/narrow/reinterpret `src` from one integer type to `dest`'s type.
    Cast(Operand),
    /// Unconditional jump.
    Jump(BlockId),
    /// `if cond != 0 { goto then } else { goto else_ }`
    Branch { cond: Operand, then_bb: BlockId, else_bb: BlockId },
/// Dense `case` lowering: jump table over `[base, base+len)`,
    /// with `default` for out-of-range values.
    JumpTable { index: Operand, base: i64, targets: Vec<BlockId>, default: BlockId },
    /// `dest = callee(args)`. `callee` is the mangled function name.
    Call { callee: String, args: Vec<Operand> },
    /// Return from the function, optionally with a value.
    Return(Option<Operand>),
/// SMC/TSMC calling convention: patch the immediate operand
    /// of `anchor`'s own instruction with `value` before a call/branch.
    PatchImmediate { anchor: String, value: Operand },
/// `in`/`out` I/O opcodes: port-mapped I/O, disqualifies CTIE purity.
    In(Operand),
    Out { port: Operand, value: Operand },
    /// Pure metadata, never lowered to code: a human-readable block/label marker.
    Label(String),
}

impl Opcode {
/// Opcodes that perform I/O, exported so purity analysis and the
    /// interpreter can both use a single definition.
    pub fn is_io(&self) -> bool {
        matches!(self, Opcode::In(_) | Opcode::Out { .. })
    }

    pub fn is_smc(&self) -> bool {
        matches!(self, Opcode::PatchImmediate { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Opcode::Call { .. })
    }

    /// Registers read by this opcode, used by liveness/use-def analyses.
    pub fn uses(&self) -> Vec<Reg> {
        fn op_reg(o: &Operand, out: &mut Vec<Reg>) {
            if let Operand::Reg(r) = o {
                out.push(*r);
            }
        }
        fn place_reg(p: &Place, out: &mut Vec<Reg>) {
            match p {
                Place::Indexed { base, index, .. } => {
                    out.push(*base);
                    op_reg(index, out);
                }
                Place::Indirect { base } | Place::Field { base, .. } => out.push(*base),
                Place::Local(_) | Place::Global(_) => {}
            }
        }
        let mut out = Vec::new();
        match self {
            Opcode::Const(_) | Opcode::Label(_) => {}
            Opcode::Arith { lhs, rhs, .. } => {
                op_reg(lhs, &mut out);
                op_reg(rhs, &mut out);
            }
            Opcode::Compare { lhs, rhs, .. } => {
                op_reg(lhs, &mut out);
                op_reg(rhs, &mut out);
            }
            Opcode::Neg(o) | Opcode::Not(o) | Opcode::BitNot(o) | Opcode::Move(o) | Opcode::Cast(o) | Opcode::In(o) => op_reg(o, &mut out),
            Opcode::Load(p) => place_reg(p, &mut out),
            Opcode::Store { place, value } => {
                place_reg(place, &mut out);
                op_reg(value, &mut out);
            }
            Opcode::AddressOf(p) => place_reg(p, &mut out),
            Opcode::Jump(_) => {}
            Opcode::Branch { cond, .. } => op_reg(cond, &mut out),
            Opcode::JumpTable { index, .. } => op_reg(index, &mut out),
            Opcode::Call { args, .. } => {
                for a in args {
                    op_reg(a, &mut out);
                }
            }
            Opcode::Return(o) => {
                if let Some(o) = o {
                    op_reg(o, &mut out);
                }
            }
            Opcode::PatchImmediate { value, .. } => op_reg(value, &mut out),
            Opcode::Out { port, value } => {
                op_reg(port, &mut out);
                op_reg(value, &mut out);
            }
        }
        out
    }
}

/// One MIR instruction: `{opcode, dest?, type, block_id, source_span,
/// profile_hint?}`.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub dest: Option<Reg>,
    pub ty: TypeId,
    pub block_id: BlockId,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionHint {
    Hot,
    Warm,
    Cold,
    Unknown,
}

/// `{id, instructions[], successors[], predecessors[], loop_depth,
/// execution_hint}`.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
    pub loop_depth: u32,
    pub execution_hint: ExecutionHint,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            loop_depth: 0,
            execution_hint: ExecutionHint::Unknown,
        }
    }

    /// Recompute `successors` from the block's terminator instruction, if any.
    pub fn recompute_successors(&mut self) {
        self.successors.clear();
        if let Some(last) = self.instructions.last() {
            match &last.opcode {
                Opcode::Jump(target) => self.successors.push(*target),
                Opcode::Branch { then_bb, else_bb, .. } => {
                    self.successors.push(*then_bb);
                    self.successors.push(*else_bb);
                }
                Opcode::JumpTable { targets, default, .. } => {
                    self.successors.extend(targets.iter().copied());
                    self.successors.push(*default);
                }
                _ => {}
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(
            self.instructions.last().map(|i| &i.opcode),
            Some(Opcode::Jump(_)) | Some(Opcode::Branch { .. }) | Some(Opcode::JumpTable { .. }) | Some(Opcode::Return(_))
        )
    }
}

#[derive(Clone, Debug)]
pub struct MirParam {
    pub name: String,
    pub ty: TypeId,
    pub slot: Reg,
}

#[derive(Clone, Debug)]
pub struct MirLocal {
    pub name: String,
    pub ty: TypeId,
    pub slot: Reg,
    /// `true` once some expression takes `&local`; such locals are demoted
    /// to stack slots rather than pure virtual registers.
    pub address_taken: bool,
}

/// `{name (mangled), params[], return_type, locals[], blocks[], abi,
/// attributes}`.
#[derive(Clone, Debug)]
pub struct MirFunction {
    pub name: String,
    pub params: Vec<MirParam>,
    pub return_type: TypeId,
    pub locals: Vec<MirLocal>,
    pub blocks: Vec<BasicBlock>,
    pub abi: AbiKind,
    pub is_pub: bool,
    pub is_extern: bool,
    pub interrupt_vector: Option<String>,
    pub entry: BlockId,
    next_reg: u32,
    next_block: u32,
}

impl MirFunction {
    pub fn new(name: String, abi: AbiKind, return_type: TypeId) -> Self {
        Self {
            name,
            params: Vec::new(),
            return_type,
            locals: Vec::new(),
            blocks: Vec::new(),
            abi,
            is_pub: false,
            is_extern: false,
            interrupt_vector: None,
            entry: BlockId(0),
            next_reg: 0,
            next_block: 0,
        }
    }

    pub fn fresh_reg(&mut self) -> Reg {
        let r = Reg(self.next_reg);
        self.next_reg += 1;
        r
    }

    pub fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        self.blocks.iter_mut().find(|b| b.id == id).expect("block id must exist")
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        self.blocks.iter().find(|b| b.id == id).expect("block id must exist")
    }

    pub fn push(&mut self, block: BlockId, opcode: Opcode, dest: Option<Reg>, ty: TypeId, span: Span) {
        self.block_mut(block).instructions.push(Instruction { opcode, dest, ty, block_id: block, span });
    }

    /// Recompute every block's successors/predecessors from their terminators.
    pub fn recompute_cfg(&mut self) {
        for b in &mut self.blocks {
            b.recompute_successors();
        }
        let edges: Vec<(BlockId, BlockId)> = self.blocks.iter().flat_map(|b| b.successors.iter().map(move |s| (b.id, *s))).collect();
        for b in &mut self.blocks {
            b.predecessors.clear();
        }
        for (from, to) in edges {
            self.block_mut(to).predecessors.push(from);
        }
    }

    pub fn param_type(&self, name: &str) -> Option<TypeId> {
        self.params.iter().find(|p| p.name == name).map(|p| p.ty)
    }
}

/// The whole MIR program: one function per (mangled) name, plus globals
/// carried through from AST lowering.
#[derive(Clone, Debug, Default)]
pub struct MirProgram {
    pub functions: Vec<MirFunction>,
    pub globals: Vec<MirGlobal>,
}

#[derive(Clone, Debug)]
pub struct MirGlobal {
    pub name: String,
    pub ty: TypeId,
    pub init: Option<i64>,
}

impl MirProgram {
    pub fn function(&self, name: &str) -> Option<&MirFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut MirFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn by_name_index(&self) -> HashMap<String, usize> {
        self.functions.iter().enumerate().map(|(i, f)| (f.name.clone(), i)).collect()
    }
}

/// Validity checks every pass must preserve ( closing paragraph,
/// "MIR validity"): every branch targets a block in the same function, and
/// every register used along a path is defined first. The full
/// never-used-before-def check is approximated here by checking that every
/// operand register is either a parameter/local slot or the destination of
/// some earlier instruction in the same function -- sufficient for a
/// single-pass straight-line-plus-branches IR with no irreducible loops
/// entering mid-block.
pub fn verify(func: &MirFunction) -> Result<(), String> {
    let block_ids: std::collections::HashSet<BlockId> = func.blocks.iter().map(|b| b.id).collect();
    let mut defined: std::collections::HashSet<Reg> = func.params.iter().map(|p| p.slot).collect();
    defined.extend(func.locals.iter().map(|l| l.slot));

    for block in &func.blocks {
        for inst in &block.instructions {
            for target in branch_targets(&inst.opcode) {
                if !block_ids.contains(&target) {
                    return Err(format!("{}: branch to undefined block {}", func.name, target));
                }
            }
            for reg in inst.opcode.uses() {
                if !defined.contains(&reg) {
                    return Err(format!("{}: register {} used before definition in {}", func.name, reg, block.id));
                }
            }
            if let Some(d) = inst.dest {
                defined.insert(d);
            }
        }
    }
    Ok(())
}

fn branch_targets(op: &Opcode) -> Vec<BlockId> {
    match op {
        Opcode::Jump(t) => vec![*t],
        Opcode::Branch { then_bb, else_bb, .. } => vec![*then_bb, *else_bb],
        Opcode::JumpTable { targets, default, .. } => {
            let mut v = targets.clone();
            v.push(*default);
            v
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeInterner;

    #[test]
    fn recompute_cfg_links_predecessors() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.void);
        let entry = f.fresh_block();
        let then_bb = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Jump(then_bb), None, b.void, Span::dummy());
        f.push(then_bb, Opcode::Return(None), None, b.void, Span::dummy());
        f.recompute_cfg();
        assert_eq!(f.block(then_bb).predecessors, vec![entry]);
        assert_eq!(f.block(entry).successors, vec![then_bb]);
    }

    #[test]
    fn verify_rejects_branch_to_missing_block() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.void);
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Jump(BlockId(99)), None, b.void, Span::dummy());
        assert!(verify(&f).is_err());
    }

    #[test]
    fn verify_rejects_use_before_def() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("f".into(), AbiKind::Register, b.void);
        let entry = f.fresh_block();
        f.entry = entry;
        f.push(entry, Opcode::Return(Some(Operand::Reg(Reg(7)))), None, b.void, Span::dummy());
        assert!(verify(&f).is_err());
    }
}
