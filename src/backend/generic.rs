//! Shared textual emitter for the seven secondary backends: a
//! direct one-MIR-instruction-to-one-line translation with no register
//! allocation of its own, parameterized by a [`Mnemonics`] table so each
//! target only needs to override the handful of strings and calling
//! conventions that differ from the next. Z80 (`backend::z80`) does not use
//! this -- it has its own register allocator and peephole pass, matching
//! its role as the primary target.

use std::collections::HashMap;

use crate::mir::{ArithOp, CmpOp, MirFunction, MirProgram, Opcode, Operand, Place, Reg};

use super::EmitResult;

pub trait Mnemonics {
    fn comment_prefix(&self) -> &'static str {
        ";"
    }
    fn reg_name(&self, r: Reg) -> String {
        format!("r{}", r.0)
    }
    fn mov(&self) -> &'static str {
        "mov"
    }
    fn arith(&self, op: ArithOp) -> &'static str {
        match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Xor => "xor",
            ArithOp::Shl => "shl",
            ArithOp::Shr => "shr",
        }
    }
    fn cmp(&self, op: CmpOp) -> &'static str {
        match op {
            CmpOp::Eq => "cmp.eq",
            CmpOp::Ne => "cmp.ne",
            CmpOp::Lt => "cmp.lt",
            CmpOp::Gt => "cmp.gt",
            CmpOp::Le => "cmp.le",
            CmpOp::Ge => "cmp.ge",
        }
    }
    fn jmp(&self) -> &'static str {
        "jmp"
    }
    fn branch(&self) -> &'static str {
        "br"
    }
    fn call(&self) -> &'static str {
        "call"
    }
    fn ret(&self) -> &'static str {
        "ret"
    }
    fn label(&self, name: &str) -> String {
        format!("{name}:")
    }
    fn block_label(&self, func: &str, block: crate::mir::BlockId) -> String {
        format!("{func}_{block}")
    }
}

fn operand_text(mnem: &dyn Mnemonics, op: &Operand) -> String {
    match op {
        Operand::Reg(r) => mnem.reg_name(*r),
        Operand::Imm(n) => format!("#{n}"),
    }
}

fn place_text(mnem: &dyn Mnemonics, place: &Place) -> String {
    match place {
        Place::Local(n) => mnem.reg_name(Reg(*n)),
        Place::Global(name) => format!("[{name}]"),
        Place::Indexed { base, index, elem_size } => format!("[{}+{}*{}]", mnem.reg_name(*base), operand_text(mnem, index), elem_size),
        Place::Indirect { base } => format!("[{}]", mnem.reg_name(*base)),
        Place::Field { base, offset } => format!("[{}+{}]", mnem.reg_name(*base), offset),
    }
}

/// Emit every function in `program` with `mnem`'s vocabulary. Each
/// function's label maps to the line offset of its first emitted
/// instruction, forming the symbol map.
pub fn emit_generic(program: &MirProgram, mnem: &dyn Mnemonics) -> EmitResult {
    let mut lines = Vec::new();
    let mut symbols = HashMap::new();

    for f in &program.functions {
        symbols.insert(f.name.clone(), lines.len() as u32);
        lines.push(mnem.label(&f.name));
        emit_function(f, mnem, &mut lines);
        lines.push(String::new());
    }

    EmitResult { text: lines.join("\n"), symbols }
}

fn emit_function(f: &MirFunction, mnem: &dyn Mnemonics, lines: &mut Vec<String>) {
    for block in &f.blocks {
        lines.push(format!("{}:", mnem.block_label(&f.name, block.id)));
        for inst in &block.instructions {
            let dest = inst.dest.map(|d| mnem.reg_name(d));
            let line = match &inst.opcode {
                Opcode::Const(v) => format!(" {} {}, #{}", mnem.mov(), dest.unwrap(), v),
                Opcode::Arith { op, lhs, rhs } => {
                    format!(" {} {}, {}, {}", mnem.arith(*op), dest.unwrap(), operand_text(mnem, lhs), operand_text(mnem, rhs))
                }
                Opcode::Neg(o) => format!(" neg {}, {}", dest.unwrap(), operand_text(mnem, o)),
                Opcode::Not(o) => format!(" not {}, {}", dest.unwrap(), operand_text(mnem, o)),
                Opcode::BitNot(o) => format!(" bitnot {}, {}", dest.unwrap(), operand_text(mnem, o)),
                Opcode::Compare { op, lhs, rhs } => {
                    format!(" {} {}, {}, {}", mnem.cmp(*op), dest.unwrap(), operand_text(mnem, lhs), operand_text(mnem, rhs))
                }
                Opcode::Load(place) => format!(" {} {}, {}", mnem.mov(), dest.unwrap(), place_text(mnem, place)),
                Opcode::Store { place, value } => format!(" {} {}, {}", mnem.mov(), place_text(mnem, place), operand_text(mnem, value)),
                Opcode::Move(o) => format!(" {} {}, {}", mnem.mov(), dest.unwrap(), operand_text(mnem, o)),
                Opcode::AddressOf(place) => format!(" lea {}, {}", dest.unwrap(), place_text(mnem, place)),
                Opcode::Cast(o) => format!(" {} {}, {}", mnem.mov(), dest.unwrap(), operand_text(mnem, o)),
                Opcode::Jump(target) => format!(" {} {}", mnem.jmp(), mnem.block_label(&f.name, *target)),
                Opcode::Branch { cond, then_bb, else_bb } => format!(
                    " {} {}, {}, {}",
                    mnem.branch(),
                    operand_text(mnem, cond),
                    mnem.block_label(&f.name, *then_bb),
                    mnem.block_label(&f.name, *else_bb)
                ),
                Opcode::JumpTable { index, base, targets, default } => {
                    let targets_text = targets.iter().map(|t| mnem.block_label(&f.name, *t)).collect::<Vec<_>>().join(", ");
                    format!(
                        " jumptable {}, base={}, [{}], default={}",
                        operand_text(mnem, index),
                        base,
                        targets_text,
                        mnem.block_label(&f.name, *default)
                    )
                }
                Opcode::Call { callee, args } => {
                    let args_text = args.iter().map(|a| operand_text(mnem, a)).collect::<Vec<_>>().join(", ");
                    match &dest {
                        Some(d) => format!(" {} {}, {}({})", mnem.call(), d, callee, args_text),
                        None => format!(" {} {}({})", mnem.call(), callee, args_text),
                    }
                }
                Opcode::Return(value) => match value {
                    Some(v) => format!(" {} {}", mnem.ret(), operand_text(mnem, v)),
                    None => format!(" {}", mnem.ret()),
                },
                Opcode::PatchImmediate { anchor, value } => format!(" patch {}, {}", anchor, operand_text(mnem, value)),
                Opcode::In(port) => format!(" in {}, {}", dest.unwrap(), operand_text(mnem, port)),
                Opcode::Out { port, value } => format!(" out {}, {}", operand_text(mnem, port), operand_text(mnem, value)),
                Opcode::Label(name) => format!(" {} {}", mnem.comment_prefix(), name),
            };
            lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiKind;
    use crate::mir::MirFunction;
    use crate::span::Span;
    use crate::types::TypeInterner;

    struct TestMnemonics;
    impl Mnemonics for TestMnemonics {}

    #[test]
    fn emits_one_line_per_instruction_plus_labels() {
        let interner = TypeInterner::new();
        let b = interner.builtins();
        let mut f = MirFunction::new("main".into(), AbiKind::Register, b.u8_);
        let entry = f.fresh_block();
        f.entry = entry;
        let r = f.fresh_reg();
        f.push(entry, Opcode::Const(42), Some(r), b.u8_, Span::dummy());
        f.push(entry, Opcode::Return(Some(Operand::Reg(r))), None, b.u8_, Span::dummy());
        let program = MirProgram { functions: vec![f], globals: Vec::new() };
        let result = emit_generic(&program, &TestMnemonics);
        assert!(result.symbols.contains_key("main"));
        assert!(result.text.contains("mov r0, #42"));
        assert!(result.text.contains("ret r0"));
    }
}
