//! Metafunction expansion: `@print`, `@hex`, `@bin`, `@len`,
//! `@if`, `@derive` are rewritten into ordinary AST fragments before
//! lowering ever sees them, so MIR never has a metafunction opcode. Kept
//! separate from the MIR interpreter's CTIE: this pass folds
//! *syntactic* constants at the typed-AST level, CTIE folds *calls to pure
//! functions* at the MIR level.

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::Spanned;
use crate::types::{Builtins, TypeId, TypeInterner};

/// A compile-time-evaluable constant, used only for folding metafunction
/// arguments; has no bearing on the runtime `Type` model.
#[derive(Clone, Debug)]
enum Const {
    Int(i64),
    Bool(bool),
    Str(Vec<u8>),
}

/// Best-effort constant evaluator over literals, unary/binary arithmetic,
/// and `const` references. Returns `None` (not an error) for anything that
/// requires runtime data -- the caller leaves those nodes for the lowerer.
fn const_eval(expr: &Expr, consts: &HashMap<String, Const>) -> Option<Const> {
    match expr {
        Expr::IntLiteral(v) => Some(Const::Int(*v as i64)),
        Expr::BoolLiteral(b) => Some(Const::Bool(*b)),
        Expr::StrLiteral { bytes, .. } => Some(Const::Str(bytes.clone())),
        Expr::Ident(name) => consts.get(name).cloned(),
        Expr::Unary { op, operand } => {
            let v = const_eval(&operand.node, consts)?;
            match (op, v) {
                (UnOp::Neg, Const::Int(n)) => Some(Const::Int(-n)),
                (UnOp::Not, Const::Bool(b)) => Some(Const::Bool(!b)),
                (UnOp::BitNot, Const::Int(n)) => Some(Const::Int(!n)),
                _ => None,
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = const_eval(&lhs.node, consts)?;
            let r = const_eval(&rhs.node, consts)?;
            match (l, r) {
                (Const::Int(a), Const::Int(b)) => Some(match op {
                    BinOp::Add => Const::Int(a.wrapping_add(b)),
                    BinOp::Sub => Const::Int(a.wrapping_sub(b)),
                    BinOp::Mul => Const::Int(a.wrapping_mul(b)),
                    BinOp::Div if b != 0 => Const::Int(a / b),
                    BinOp::Mod if b != 0 => Const::Int(a % b),
                    BinOp::BitAnd => Const::Int(a & b),
                    BinOp::BitOr => Const::Int(a | b),
                    BinOp::BitXor => Const::Int(a ^ b),
                    BinOp::Shl => Const::Int(a.wrapping_shl(b as u32)),
                    BinOp::Shr => Const::Int(a.wrapping_shr(b as u32)),
                    BinOp::Eq => Const::Bool(a == b),
                    BinOp::NotEq => Const::Bool(a != b),
                    BinOp::Lt => Const::Bool(a < b),
                    BinOp::Gt => Const::Bool(a > b),
                    BinOp::Le => Const::Bool(a <= b),
                    BinOp::Ge => Const::Bool(a >= b),
                    _ => return None,
                }),
                (Const::Bool(a), Const::Bool(b)) => Some(match op {
                    BinOp::And => Const::Bool(a && b),
                    BinOp::Or => Const::Bool(a || b),
                    BinOp::Eq => Const::Bool(a == b),
                    BinOp::NotEq => Const::Bool(a != b),
                    _ => return None,
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Expand `@derive("Name")` attributes attached to struct/enum declarations
/// into synthetic `impl` blocks, run before declaration collection so the
/// synthesized impls register like any user-written one ( comment in
/// `mod.rs`). Only a small, named set of derivable interfaces is supported;
/// anything else is a forward-compatible warning, matching `@`-name
/// handling elsewhere.
pub fn expand_derives(file: &mut File, diagnostics: &mut Vec<Diagnostic>) {
    let mut synthesized = Vec::new();
    for decl in &file.decls {
        if let Decl::Struct(s) = decl {
            for attr in &s.attributes {
                if attr.name != "derive" {
                    continue;
                }
                let Some(target_iface) = &attr.arg else {
                    diagnostics.push(Diagnostic::error(DiagnosticKind::InvalidAbiSpec, "@derive requires a string argument naming the interface", attr.span));
                    continue;
                };
                match target_iface.as_str() {
                    "Eq" => synthesized.push(derive_eq(s)),
                    other => {
                        diagnostics.push(
                            Diagnostic::warning(DiagnosticKind::UnknownAttribute, format!("unsupported @derive(\"{}\")", other), attr.span)
                                .with_help("only @derive(\"Eq\") is implemented; the attribute is otherwise ignored"),
                        );
                    }
                }
            }
        }
    }
    file.decls.extend(synthesized);
}

/// `@derive("Eq")` on struct `S { a: T, b: U, .. }` synthesizes
/// `impl Eq for S { fun eq(self: S, other: S) -> bool { return self.a == other.a && ..; } }`.
fn derive_eq(s: &StructDecl) -> Decl {
    let span = s.span;
    let self_name = Spanned::new("self".to_string(), span);
    let other_name = Spanned::new("other".to_string(), span);
    let target_ty = TypeExpr::Named(s.name.node.clone());

    let mut cond: Option<Spanned<Expr>> = None;
    for field in &s.fields {
        let lhs = Spanned::new(
            Expr::Field { base: Box::new(Spanned::new(Expr::Ident("self".to_string()), span)), name: field.name.clone() },
            span,
        );
        let rhs = Spanned::new(
            Expr::Field { base: Box::new(Spanned::new(Expr::Ident("other".to_string()), span)), name: field.name.clone() },
            span,
        );
        let eq_field = Spanned::new(Expr::Binary { op: BinOp::Eq, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        cond = Some(match cond {
            None => eq_field,
            Some(prev) => Spanned::new(Expr::Binary { op: BinOp::And, lhs: Box::new(prev), rhs: Box::new(eq_field) }, span),
        });
    }
    let body_expr = cond.unwrap_or_else(|| Spanned::new(Expr::BoolLiteral(true), span));

    let method = FunctionDecl {
        is_pub: false,
        attributes: Vec::new(),
        name: Spanned::new("eq".to_string(), span),
        params: vec![
            Param { name: self_name, ty: Spanned::new(target_ty.clone(), span) },
            Param { name: other_name, ty: Spanned::new(target_ty.clone(), span) },
        ],
        return_ty: Some(Spanned::new(TypeExpr::Named("bool".to_string()), span)),
        body: Some(Block { stmts: vec![Stmt::Return(Some(body_expr), span)], span }),
        span,
    };

    Decl::Impl(ImplBlock {
        interface: Some(Spanned::new("Eq".to_string(), span)),
        target: Spanned::new(target_ty, span),
        methods: vec![method],
        span,
    })
}

/// Expand metafunction calls inside a function body in place:
/// `@print` template chunks whose `{ expr }` is constant-foldable collapse
/// into the surrounding literal text; `@hex`/`@bin`/`@len` of a constant
/// argument collapse to a literal; `@if` with a constant condition
/// collapses to its chosen branch. Anything that isn't constant-foldable is
/// left as a `Metafunction` node for the lowerer to realize as a runtime
/// call (e.g. `@print`'s runtime decimal conversion, scenario 5).
pub fn expand_in_function(f: &mut FunctionDecl, interner: &TypeInterner, builtins: &Builtins, diagnostics: &mut Vec<Diagnostic>) {
    let Some(body) = &mut f.body else { return };
    let consts = HashMap::new();
    expand_block(body, &consts, interner, builtins, diagnostics);
}

fn expand_block(block: &mut Block, consts: &HashMap<String, Const>, interner: &TypeInterner, builtins: &Builtins, diagnostics: &mut Vec<Diagnostic>) {
    for stmt in &mut block.stmts {
        expand_stmt(stmt, consts, interner, builtins, diagnostics);
    }
}

fn expand_stmt(stmt: &mut Stmt, consts: &HashMap<String, Const>, interner: &TypeInterner, builtins: &Builtins, diagnostics: &mut Vec<Diagnostic>) {
    match stmt {
        Stmt::Let { value, .. } => expand_expr(value, consts, interner, builtins, diagnostics),
        Stmt::Assign { target, value } => {
            expand_expr(target, consts, interner, builtins, diagnostics);
            expand_expr(value, consts, interner, builtins, diagnostics);
        }
        Stmt::If { cond, then_block, else_block } => {
            expand_expr(cond, consts, interner, builtins, diagnostics);
            expand_block(then_block, consts, interner, builtins, diagnostics);
            if let Some(e) = else_block {
                expand_stmt(e, consts, interner, builtins, diagnostics);
            }
        }
        Stmt::Block(b) => expand_block(b, consts, interner, builtins, diagnostics),
        Stmt::While { cond, body } => {
            expand_expr(cond, consts, interner, builtins, diagnostics);
            expand_block(body, consts, interner, builtins, diagnostics);
        }
        Stmt::For { start, end, body, .. } => {
            expand_expr(start, consts, interner, builtins, diagnostics);
            expand_expr(end, consts, interner, builtins, diagnostics);
            expand_block(body, consts, interner, builtins, diagnostics);
        }
        Stmt::Loop { body } => expand_block(body, consts, interner, builtins, diagnostics),
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Return(value, _) => {
            if let Some(v) = value {
                expand_expr(v, consts, interner, builtins, diagnostics);
            }
        }
        Stmt::Expr(e) => expand_expr(e, consts, interner, builtins, diagnostics),
        Stmt::InlineAsm { .. } => {}
    }
}

fn expand_expr(expr: &mut Spanned<Expr>, consts: &HashMap<String, Const>, interner: &TypeInterner, builtins: &Builtins, diagnostics: &mut Vec<Diagnostic>) {
    match &mut expr.node {
        Expr::Binary { lhs, rhs, .. } => {
            expand_expr(lhs, consts, interner, builtins, diagnostics);
            expand_expr(rhs, consts, interner, builtins, diagnostics);
        }
        Expr::Unary { operand, .. } => expand_expr(operand, consts, interner, builtins, diagnostics),
        Expr::Call { callee, args } => {
            expand_expr(callee, consts, interner, builtins, diagnostics);
            for a in args {
                expand_expr(a, consts, interner, builtins, diagnostics);
            }
        }
        Expr::MethodCall { receiver, args, .. } => {
            expand_expr(receiver, consts, interner, builtins, diagnostics);
            for a in args {
                expand_expr(a, consts, interner, builtins, diagnostics);
            }
        }
        Expr::Index { base, index } => {
            expand_expr(base, consts, interner, builtins, diagnostics);
            expand_expr(index, consts, interner, builtins, diagnostics);
        }
        Expr::Field { base, .. } => expand_expr(base, consts, interner, builtins, diagnostics),
        Expr::Cast { expr: inner, .. } => expand_expr(inner, consts, interner, builtins, diagnostics),
        Expr::AddressOf { expr: inner, .. } => expand_expr(inner, consts, interner, builtins, diagnostics),
        Expr::Deref(inner) => expand_expr(inner, consts, interner, builtins, diagnostics),
        Expr::StructLiteral { fields, .. } => {
            for (_, v) in fields {
                expand_expr(v, consts, interner, builtins, diagnostics);
            }
        }
        Expr::ArrayLiteral(items) => {
            for item in items {
                expand_expr(item, consts, interner, builtins, diagnostics);
            }
        }
        Expr::Case { scrutinee, arms } => {
            expand_expr(scrutinee, consts, interner, builtins, diagnostics);
            for arm in arms {
                expand_expr(&mut arm.body, consts, interner, builtins, diagnostics);
            }
        }
        Expr::Metafunction { .. } => {
            for a in collect_args_mut(&mut expr.node) {
                expand_expr(a, consts, interner, builtins, diagnostics);
            }
            try_fold_metafunction(expr, consts, interner, builtins, diagnostics);
        }
        Expr::IntLiteral(_) | Expr::CharLiteral(_) | Expr::StrLiteral { .. } | Expr::BoolLiteral(_) | Expr::Ident(_) | Expr::Lambda { .. } => {}
    }
}

fn collect_args_mut(expr: &mut Expr) -> &mut [Spanned<Expr>] {
    match expr {
        Expr::Metafunction { args, .. } => args,
        _ => &mut [],
    }
}

fn try_fold_metafunction(expr: &mut Spanned<Expr>, consts: &HashMap<String, Const>, interner: &TypeInterner, builtins: &Builtins, diagnostics: &mut Vec<Diagnostic>) {
    let span = expr.span;
    let Expr::Metafunction { name, template, args } = &expr.node else { return };

    match name.as_str() {
        "print" if template.is_some() => {
            let chunks = template.as_ref().unwrap();
            let mut folded = String::new();
            let mut new_chunks = Vec::new();
            let mut arg_iter = args.iter().cloned();
            for chunk in chunks {
                match chunk {
                    InterpChunk::Literal(s) => folded.push_str(s),
                    InterpChunk::Expr(e) => {
                        if let Some(Const::Int(n)) = const_eval(&e.node, consts) {
                            folded.push_str(&n.to_string());
                        } else if let Some(Const::Bool(b)) = const_eval(&e.node, consts) {
                            folded.push_str(if b { "true" } else { "false" });
                        } else if e.node.is_ident_placeholder() {
                            // `{}` shorthand: consumed positionally from `args`.
                            if !folded.is_empty() {
                                new_chunks.push(InterpChunk::Literal(std::mem::take(&mut folded)));
                            }
                            if let Some(runtime_arg) = arg_iter.next() {
                                new_chunks.push(InterpChunk::Expr(runtime_arg));
                            }
                        } else {
                            if !folded.is_empty() {
                                new_chunks.push(InterpChunk::Literal(std::mem::take(&mut folded)));
                            }
                            new_chunks.push(InterpChunk::Expr(e.clone()));
                        }
                    }
                }
            }
            if !folded.is_empty() {
                new_chunks.push(InterpChunk::Literal(folded));
            }
            if let Expr::Metafunction { template, .. } = &mut expr.node {
                *template = Some(new_chunks);
            }
        }
        "hex" => {
            if let Some(a) = args.first() {
                if let Some(Const::Int(n)) = const_eval(&a.node, consts) {
                    expr.node = Expr::StrLiteral { bytes: format!("{:X}", n).into_bytes(), long_form: false };
                }
            }
        }
        "bin" => {
            if let Some(a) = args.first() {
                if let Some(Const::Int(n)) = const_eval(&a.node, consts) {
                    expr.node = Expr::StrLiteral { bytes: format!("{:b}", n).into_bytes(), long_form: false };
                }
            }
        }
        "len" => {
            if let Some(a) = args.first() {
                if let Expr::StrLiteral { bytes, .. } = &a.node {
                    expr.node = Expr::IntLiteral(bytes.len() as u64);
                }
            }
        }
        "if" => {
            if args.len() == 3 {
                match const_eval(&args[0].node, consts) {
                    Some(Const::Bool(true)) => expr.node = args[1].node.clone(),
                    Some(Const::Bool(false)) => expr.node = args[2].node.clone(),
                    Some(_) => diagnostics.push(Diagnostic::error(DiagnosticKind::NonBooleanCondition, "@if condition must be a compile-time bool", span)),
                    None => diagnostics.push(
                        Diagnostic::error(DiagnosticKind::TypeMismatch, "@if requires a compile-time-constant condition", span)
                            .with_help("use a literal, `const`, or foldable arithmetic/comparison expression"),
                    ),
                }
            }
        }
        _ => {}
    }
    let _ = (interner, builtins);
}

trait PlaceholderExt {
    fn is_ident_placeholder(&self) -> bool;
}
impl PlaceholderExt for Expr {
    /// The parser emits an empty `Ident("")` for a bare `{}` placeholder in
    /// an interpolation template (see `parser::parse_interp_template`).
    fn is_ident_placeholder(&self) -> bool {
        matches!(self, Expr::Ident(s) if s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    fn lit(n: u64) -> Spanned<Expr> {
        Spanned::new(Expr::IntLiteral(n), Span::dummy())
    }

    #[test]
    fn const_eval_folds_arithmetic() {
        let consts = HashMap::new();
        let expr = Expr::Binary { op: BinOp::Add, lhs: Box::new(lit(40)), rhs: Box::new(lit(2)) };
        match const_eval(&expr, &consts) {
            Some(Const::Int(42)) => {}
            other => panic!("expected 42, got {:?}", other),
        }
    }

    #[test]
    fn derive_eq_generates_eq_method() {
        let span = Span::dummy();
        let s = StructDecl {
            is_pub: false,
            attributes: vec![Attribute { name: "derive".to_string(), arg: Some("Eq".to_string()), span }],
            name: Spanned::new("Point".to_string(), span),
            fields: vec![Param { name: Spanned::new("x".to_string(), span), ty: Spanned::new(TypeExpr::Named("u8".to_string()), span) }],
            span,
        };
        let decl = derive_eq(&s);
        match decl {
            Decl::Impl(imp) => {
                assert_eq!(imp.interface.unwrap().node, "Eq");
                assert_eq!(imp.methods.len(), 1);
                assert_eq!(imp.methods[0].name.node, "eq");
            }
            _ => panic!("expected an impl block"),
        }
    }
}
