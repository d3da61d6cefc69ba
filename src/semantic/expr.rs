//! Type checking and bidirectional inference: walks a
//! function body with the expected-type context flowing from statements
//! into expressions, resolves overload sets at call sites, and reports the
//! `Type`/`Overload`/`Name` diagnostic kinds. This is the "does it type
//! check" pass; the lowerer (`src/lower.rs`) re-derives the same types
//! against the frozen `AnalysisResult` when it builds MIR, since the core
//! pipeline is whole-program per invocation and keeps no typed-AST
//! annotations on nodes.

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::Span;
use crate::types::{Builtins, TypeId, TypeInterner, TypeKind};

use super::{resolve_type_readonly, SymbolKind, SymbolTable};

/// A local variable/parameter binding: its type and whether it was declared `mut`.
#[derive(Clone, Copy)]
struct LocalInfo {
    ty: TypeId,
    is_mut: bool,
}

struct Ctx<'a> {
    interner: &'a TypeInterner,
    builtins: &'a Builtins,
    symbols: &'a SymbolTable,
    named_types: &'a HashMap<String, TypeId>,
    locals: Vec<HashMap<String, LocalInfo>>,
    current_return: TypeId,
}

impl<'a> Ctx<'a> {
    fn push_scope(&mut self) {
        self.locals.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare_local(&mut self, name: &str, ty: TypeId, is_mut: bool) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string(), LocalInfo { ty, is_mut });
        }
    }

    fn lookup_local(&self, name: &str) -> Option<LocalInfo> {
        self.locals.iter().rev().find_map(|s| s.get(name).copied())
    }
}

/// Type-check a function body: params become the initial
/// local scope, `return` statements are checked against the declared return
/// type, and every statement/expression inside is visited.
pub fn check_function(
    f: &FunctionDecl,
    interner: &TypeInterner,
    builtins: &Builtins,
    symbols: &SymbolTable,
    named_types: &HashMap<String, TypeId>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(body) = &f.body else { return };

    let return_ty = f
        .return_ty
        .as_ref()
        .map(|t| resolve_type_readonly(&t.node, named_types, interner, builtins))
        .unwrap_or(builtins.void);

    let mut ctx = Ctx {
        interner,
        builtins,
        symbols,
        named_types,
        locals: Vec::new(),
        current_return: return_ty,
    };
    ctx.push_scope();
    for p in &f.params {
        let ty = resolve_type_readonly(&p.ty.node, named_types, interner, builtins);
        ctx.declare_local(&p.name.node, ty, false);
    }
    check_block(body, &mut ctx, diagnostics);
    ctx.pop_scope();
}

fn check_block(block: &Block, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) {
    ctx.push_scope();
    for stmt in &block.stmts {
        check_stmt(stmt, ctx, diagnostics);
    }
    ctx.pop_scope();
}

fn check_stmt(stmt: &Stmt, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) {
    match stmt {
        Stmt::Let { is_mut, name, ty, value } => {
            let expected = ty.as_ref().map(|t| resolve_type_readonly(&t.node, ctx.named_types, ctx.interner, ctx.builtins));
            let actual = infer(value, expected, ctx, diagnostics);
            let declared = expected.unwrap_or(actual);
            ctx.declare_local(&name.node, declared, *is_mut);
        }
        Stmt::Assign { target, value } => {
            let target_ty = infer(target, None, ctx, diagnostics);
            check_assignable(target, ctx, diagnostics);
            let _ = infer(value, Some(target_ty), ctx, diagnostics);
        }
        Stmt::If { cond, then_block, else_block } => {
            let cond_ty = infer(cond, Some(ctx.builtins.bool_), ctx, diagnostics);
            if !is_bool(cond_ty, ctx) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::NonBooleanCondition,
                    "`if` condition must be `bool`",
                    cond.span,
                ));
            }
            check_block(then_block, ctx, diagnostics);
            if let Some(e) = else_block {
                check_stmt(e, ctx, diagnostics);
            }
        }
        Stmt::Block(b) => check_block(b, ctx, diagnostics),
        Stmt::While { cond, body } => {
            let cond_ty = infer(cond, Some(ctx.builtins.bool_), ctx, diagnostics);
            if !is_bool(cond_ty, ctx) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::NonBooleanCondition,
                    "`while` condition must be `bool`",
                    cond.span,
                ));
            }
            check_block(body, ctx, diagnostics);
        }
        Stmt::For { var, start, end, body } => {
            let start_ty = infer(start, None, ctx, diagnostics);
            let _ = infer(end, Some(start_ty), ctx, diagnostics);
            if !ctx.interner.get(start_ty).is_integer() {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::NonIntegerIndex,
                    "`for` range bounds must be integers",
                    start.span,
                ));
            }
            ctx.push_scope();
            ctx.declare_local(&var.node, start_ty, false);
            for s in &body.stmts {
                check_stmt(s, ctx, diagnostics);
            }
            ctx.pop_scope();
        }
        Stmt::Loop { body } => check_block(body, ctx, diagnostics),
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Return(value, span) => {
            let expected = ctx.current_return;
            match value {
                Some(v) => {
                    let _ = infer(v, Some(expected), ctx, diagnostics);
                }
                None => {
                    if ctx.interner.get(expected) != &TypeKind::Void {
                        diagnostics.push(Diagnostic::error(
                            DiagnosticKind::TypeMismatch,
                            "function must return a value",
                            *span,
                        ));
                    }
                }
            }
        }
        Stmt::Expr(e) => {
            let _ = infer(e, None, ctx, diagnostics);
        }
        Stmt::InlineAsm { .. } => {}
    }
}

fn check_assignable(target: &Spanned<Expr>, ctx: &Ctx, diagnostics: &mut Vec<Diagnostic>) {
    if let Expr::Ident(name) = &target.node {
        if let Some(local) = ctx.lookup_local(name) {
            if !local.is_mut {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::TypeMismatch,
                    format!("cannot assign to immutable binding '{}'", name),
                    target.span,
                ));
            }
        }
    }
}

fn is_bool(ty: TypeId, ctx: &Ctx) -> bool {
    matches!(ctx.interner.get(ty), TypeKind::Bool) || ctx.interner.get(ty).is_error()
}

/// Smallest unsigned integer type that fits `value` ( "Literal
/// typing"): `let x = 200` -> u8, `let x = 300` -> u16.
fn smallest_unsigned_fit(value: u64, builtins: &Builtins) -> TypeId {
    if value <= 0xFF {
        builtins.u8_
    } else if value <= 0xFFFF {
        builtins.u16_
    } else if value <= 0xFF_FFFF {
        builtins.u24_
    } else {
        builtins.u32_
    }
}

/// Smallest signed integer type that fits `-magnitude` in a negative
/// context.
fn smallest_signed_fit(magnitude: u64, builtins: &Builtins) -> TypeId {
    if magnitude <= 0x80 {
        builtins.i8_
    } else if magnitude <= 0x8000 {
        builtins.i16_
    } else if magnitude <= 0x80_0000 {
        builtins.i24_
    } else {
        builtins.i32_
    }
}

fn fits_unsigned(value: u64, ty: &TypeKind) -> bool {
    match ty.int_width() {
        Some(8) => value <= 0xFF,
        Some(16) => value <= 0xFFFF,
        Some(24) => value <= 0xFF_FFFF,
        Some(32) => value <= u32::MAX as u64,
        _ => false,
    }
}

fn fits_signed_magnitude(magnitude: u64, ty: &TypeKind) -> bool {
    match ty.int_width() {
        Some(8) => magnitude <= 0x80,
        Some(16) => magnitude <= 0x8000,
        Some(24) => magnitude <= 0x80_0000,
        Some(32) => magnitude <= 0x8000_0000,
        _ => false,
    }
}

/// Top-level entry usable outside a function body (const initializers).
pub fn infer_expr(
    expr: &Spanned<Expr>,
    expected: Option<TypeId>,
    interner: &TypeInterner,
    builtins: &Builtins,
    symbols: &SymbolTable,
    named_types: &HashMap<String, TypeId>,
    diagnostics: &mut Vec<Diagnostic>,
) -> TypeId {
    let mut ctx = Ctx {
        interner,
        builtins,
        symbols,
        named_types,
        locals: vec![HashMap::new()],
        current_return: builtins.void,
    };
    infer(expr, expected, &mut ctx, diagnostics)
}

fn infer(expr: &Spanned<Expr>, expected: Option<TypeId>, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    match &expr.node {
        Expr::IntLiteral(v) => infer_int_literal(*v, expected, expr.span, ctx, diagnostics),
        Expr::CharLiteral(_) => ctx.builtins.u8_,
        Expr::StrLiteral { .. } => ctx.builtins.string,
        Expr::BoolLiteral(_) => ctx.builtins.bool_,
        Expr::Ident(name) => infer_ident(name, expr.span, ctx, diagnostics),
        Expr::Binary { op, lhs, rhs } => infer_binary(*op, lhs, rhs, expected, ctx, diagnostics),
        Expr::Unary { op, operand } => infer_unary(*op, operand, expected, expr.span, ctx, diagnostics),
        Expr::Call { callee, args } => infer_call(callee, args, expr.span, ctx, diagnostics),
        Expr::MethodCall { receiver, method, args } => infer_method_call(receiver, method, args, ctx, diagnostics),
        Expr::Index { base, index } => infer_index(base, index, ctx, diagnostics),
        Expr::Field { base, name } => infer_field(base, name, expr.span, ctx, diagnostics),
        Expr::Cast { expr: inner, ty } => {
            let _ = infer(inner, None, ctx, diagnostics);
            resolve_type_readonly(&ty.node, ctx.named_types, ctx.interner, ctx.builtins)
        }
        Expr::AddressOf { expr: inner, is_mut } => {
            let inner_ty = infer(inner, None, ctx, diagnostics);
            let kind = crate::types::TypeKind::Pointer(inner_ty, *is_mut);
            // read-only lookup: only produce a real pointer type if it was already interned
            ctx.interner.find(&kind).unwrap_or(ctx.builtins.error)
        }
        Expr::Deref(inner) => {
            let inner_ty = infer(inner, None, ctx, diagnostics);
            match ctx.interner.get(inner_ty) {
                TypeKind::Pointer(elem, _) => *elem,
                TypeKind::Error => ctx.builtins.error,
                _ => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        "cannot dereference a non-pointer value",
                        expr.span,
                    ));
                    ctx.builtins.error
                }
            }
        }
        Expr::Lambda { params, return_ty, body } => infer_lambda(params, return_ty, body, ctx, diagnostics),
        Expr::StructLiteral { name, fields } => infer_struct_literal(name, fields, expr.span, ctx, diagnostics),
        Expr::ArrayLiteral(items) => infer_array_literal(items, ctx, diagnostics),
        Expr::Metafunction { name, args, .. } => infer_metafunction(name, args, expr.span, ctx, diagnostics),
        Expr::Case { scrutinee, arms } => infer_case(scrutinee, arms, expr.span, ctx, diagnostics),
    }
}

fn infer_int_literal(v: u64, expected: Option<TypeId>, span: Span, ctx: &Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    match expected {
        Some(ty) => {
            let kind = ctx.interner.get(ty);
            if kind.is_error() {
                return ty;
            }
            if matches!(kind, TypeKind::Bool) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::TypeMismatch,
                    "integer literal cannot be used where `bool` is expected",
                    span,
                ));
                return ctx.builtins.error;
            }
            if kind.is_integer() {
                let ok = if kind.is_signed() { fits_signed_magnitude(v, kind) || fits_unsigned(v, kind) } else { fits_unsigned(v, kind) };
                if ok {
                    return ty;
                }
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::NarrowingConversionRequired,
                    format!("literal {} does not fit in {}; use `as` to narrow explicitly", v, kind),
                    span,
                ));
                return ctx.builtins.error;
            }
            diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "expected a non-integer type here", span));
            ctx.builtins.error
        }
        None => smallest_unsigned_fit(v, ctx.builtins),
    }
}

fn infer_ident(name: &str, span: Span, ctx: &Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    if let Some(local) = ctx.lookup_local(name) {
        return local.ty;
    }
    if let Some(sym) = ctx.symbols.lookup(name) {
        return sym.ty;
    }
    diagnostics.push(
        Diagnostic::error(DiagnosticKind::UndefinedIdentifier, format!("undefined identifier '{}'", name), span)
            .with_help(suggest(name, ctx)),
    );
    ctx.builtins.error
}

/// Edit-distance suggestion for an undefined identifier.
fn suggest(name: &str, ctx: &Ctx) -> String {
    let mut best: Option<(usize, &str)> = None;
    for scope in &ctx.locals {
        for candidate in scope.keys() {
            let d = edit_distance(name, candidate);
            if best.map(|(bd, _)| d < bd).unwrap_or(true) {
                best = Some((d, candidate));
            }
        }
    }
    match best {
        Some((d, candidate)) if d <= 2 => format!("did you mean '{}'?", candidate),
        _ => "no similarly-named identifier is in scope".to_string(),
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut cur = vec![i];
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur.push((prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost));
        }
        prev = cur;
    }
    prev[b.len()]
}

fn infer_binary(op: BinOp, lhs: &Spanned<Expr>, rhs: &Spanned<Expr>, expected: Option<TypeId>, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    use BinOp::*;
    match op {
        And | Or => {
            let l = infer(lhs, Some(ctx.builtins.bool_), ctx, diagnostics);
            let r = infer(rhs, Some(ctx.builtins.bool_), ctx, diagnostics);
            if !is_bool(l, ctx) || !is_bool(r, ctx) {
                diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "logical operator requires `bool` operands", lhs.span.merge(rhs.span)));
            }
            ctx.builtins.bool_
        }
        Eq | NotEq | Lt | Gt | Le | Ge => {
            let l = infer(lhs, None, ctx, diagnostics);
            let _ = infer(rhs, Some(l), ctx, diagnostics);
            ctx.builtins.bool_
        }
        Assign => {
            let l = infer(lhs, None, ctx, diagnostics);
            let _ = infer(rhs, Some(l), ctx, diagnostics);
            l
        }
        Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr => {
            // Literal-context propagation: infer the non-literal side first
            // when possible so a literal like `1 + x` unifies with `x`'s type.
            let l = infer(lhs, expected, ctx, diagnostics);
            let r = infer(rhs, Some(l).or(expected), ctx, diagnostics);
            if ctx.interner.get(l).is_error() {
                r
            } else {
                l
            }
        }
    }
}

fn infer_unary(op: UnOp, operand: &Spanned<Expr>, expected: Option<TypeId>, span: Span, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    match op {
        UnOp::Not => {
            let t = infer(operand, Some(ctx.builtins.bool_), ctx, diagnostics);
            if !is_bool(t, ctx) {
                diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "`!` requires a `bool` operand", span));
            }
            ctx.builtins.bool_
        }
        UnOp::BitNot => infer(operand, expected, ctx, diagnostics),
        UnOp::Neg => {
            if let Expr::IntLiteral(v) = &operand.node {
                return match expected {
                    Some(ty) => {
                        let kind = ctx.interner.get(ty);
                        if kind.is_integer() && kind.is_signed() && fits_signed_magnitude(*v, kind) {
                            ty
                        } else if kind.is_error() {
                            ty
                        } else {
                            diagnostics.push(Diagnostic::error(
                                DiagnosticKind::NarrowingConversionRequired,
                                format!("negative literal -{} does not fit in {}", v, kind),
                                span,
                            ));
                            ctx.builtins.error
                        }
                    }
                    None => smallest_signed_fit(*v, ctx.builtins),
                };
            }
            infer(operand, expected, ctx, diagnostics)
        }
    }
}

fn infer_call(callee: &Spanned<Expr>, args: &[Spanned<Expr>], span: Span, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    let arg_types: Vec<TypeId> = args.iter().map(|a| infer(a, None, ctx, diagnostics)).collect();

    let Expr::Ident(name) = &callee.node else {
        let _ = infer(callee, None, ctx, diagnostics);
        return ctx.builtins.error;
    };

    let Some(sym) = ctx.symbols.lookup(name) else {
        diagnostics.push(Diagnostic::error(DiagnosticKind::UndefinedIdentifier, format!("call to undefined function '{}'", name), span));
        return ctx.builtins.error;
    };

    if sym.kind != SymbolKind::OverloadSet {
        diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, format!("'{}' is not callable", name), span));
        return ctx.builtins.error;
    }

    match super::overload::resolve(&sym.overloads, &arg_types, ctx.interner) {
        Ok(matched) => matched.return_ty,
        Err(super::overload::OverloadError::NoMatch) => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::NoMatchingOverload,
                format!("no overload of '{}' matches the given argument types", name),
                span,
            ));
            ctx.builtins.error
        }
        Err(super::overload::OverloadError::Ambiguous(candidates)) => {
            diagnostics.push(
                Diagnostic::error(DiagnosticKind::AmbiguousCall, format!("call to '{}' is ambiguous", name), span)
                    .with_note(format!("candidates: {}", candidates.join(", "))),
            );
            ctx.builtins.error
        }
    }
}

fn infer_method_call(receiver: &Spanned<Expr>, method: &Spanned<String>, args: &[Spanned<Expr>], ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    let recv_ty = infer(receiver, None, ctx, diagnostics);
    for a in args {
        let _ = infer(a, None, ctx, diagnostics);
    }
    if let TypeKind::Interface(methods) = ctx.interner.get(recv_ty) {
        if let Some(m) = methods.iter().find(|m| m.name == method.node) {
            return m.return_ty;
        }
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::FieldNotFound,
            format!("interface has no method '{}'", method.node),
            method.span,
        ));
    }
    ctx.builtins.error
}

fn infer_index(base: &Spanned<Expr>, index: &Spanned<Expr>, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    let base_ty = infer(base, None, ctx, diagnostics);
    let idx_ty = infer(index, None, ctx, diagnostics);
    if !ctx.interner.get(idx_ty).is_integer() && !ctx.interner.get(idx_ty).is_error() {
        diagnostics.push(Diagnostic::error(DiagnosticKind::NonIntegerIndex, "array index must be an integer", index.span));
    }
    match ctx.interner.get(base_ty) {
        TypeKind::Array(elem, _) => *elem,
        TypeKind::Error => ctx.builtins.error,
        _ => {
            diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "indexing requires an array value", base.span));
            ctx.builtins.error
        }
    }
}

fn infer_field(base: &Spanned<Expr>, name: &Spanned<String>, span: Span, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    let base_ty = infer(base, None, ctx, diagnostics);
    match ctx.interner.get(base_ty) {
        TypeKind::Struct(fields) => {
            if let Some(f) = fields.iter().find(|f| f.name == name.node) {
                f.ty
            } else {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::FieldNotFound,
                    format!("struct has no field '{}'", name.node),
                    span,
                ));
                ctx.builtins.error
            }
        }
        TypeKind::Error => ctx.builtins.error,
        _ => {
            diagnostics.push(Diagnostic::error(DiagnosticKind::FieldNotFound, "field access requires a struct value", base.span));
            ctx.builtins.error
        }
    }
}

fn infer_lambda(params: &[Param], return_ty: &Option<Spanned<TypeExpr>>, body: &LambdaBody, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    ctx.push_scope();
    for p in params {
        let ty = resolve_type_readonly(&p.ty.node, ctx.named_types, ctx.interner, ctx.builtins);
        ctx.declare_local(&p.name.node, ty, false);
    }
    let inferred_ret = match body {
        LambdaBody::Expr(e) => infer(e, None, ctx, diagnostics),
        LambdaBody::Block(b) => {
            check_block(b, ctx, diagnostics);
            ctx.builtins.void
        }
    };
    ctx.pop_scope();
    let ret = return_ty
        .as_ref()
        .map(|t| resolve_type_readonly(&t.node, ctx.named_types, ctx.interner, ctx.builtins))
        .unwrap_or(inferred_ret);
    let param_tys: Vec<TypeId> = params.iter().map(|p| resolve_type_readonly(&p.ty.node, ctx.named_types, ctx.interner, ctx.builtins)).collect();
    ctx.interner.find(&TypeKind::Function(param_tys, ret, None)).unwrap_or(ctx.builtins.error)
}

fn infer_struct_literal(name: &str, fields: &[(Spanned<String>, Spanned<Expr>)], span: Span, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    let Some(&ty) = ctx.named_types.get(name) else {
        diagnostics.push(Diagnostic::error(DiagnosticKind::UndefinedIdentifier, format!("undefined struct type '{}'", name), span));
        for (_, v) in fields {
            let _ = infer(v, None, ctx, diagnostics);
        }
        return ctx.builtins.error;
    };
    if let TypeKind::Struct(struct_fields) = ctx.interner.get(ty).clone() {
        for (fname, fval) in fields {
            let expected = struct_fields.iter().find(|f| f.name == fname.node).map(|f| f.ty);
            if expected.is_none() {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::FieldNotFound,
                    format!("struct '{}' has no field '{}'", name, fname.node),
                    fname.span,
                ));
            }
            let _ = infer(fval, expected, ctx, diagnostics);
        }
    }
    ty
}

fn infer_array_literal(items: &[Spanned<Expr>], ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    if items.is_empty() {
        return ctx.builtins.error;
    }
    let elem_ty = infer(&items[0], None, ctx, diagnostics);
    for item in &items[1..] {
        let _ = infer(item, Some(elem_ty), ctx, diagnostics);
    }
    ctx.interner.find(&TypeKind::Array(elem_ty, items.len() as u64)).unwrap_or(ctx.builtins.error)
}

fn infer_metafunction(name: &str, args: &[Spanned<Expr>], span: Span, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    for a in args {
        let _ = infer(a, None, ctx, diagnostics);
    }
    match name {
        "print" => ctx.builtins.void,
        "len" => ctx.builtins.u16_,
        "hex" | "bin" => ctx.builtins.string,
        "if" => {
            if args.len() != 3 {
                diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "@if requires (cond, then, else)", span));
                return ctx.builtins.error;
            }
            infer(&args[1], None, ctx, diagnostics)
        }
        _ => ctx.builtins.void,
    }
}

fn infer_case(scrutinee: &Spanned<Expr>, arms: &[CaseArm], span: Span, ctx: &mut Ctx, diagnostics: &mut Vec<Diagnostic>) -> TypeId {
    let scrutinee_ty = infer(scrutinee, None, ctx, diagnostics);

    if super::pattern::requires_integer_scrutinee(arms) && !ctx.interner.get(scrutinee_ty).is_integer() && !ctx.interner.get(scrutinee_ty).is_error() {
        diagnostics.push(Diagnostic::error(DiagnosticKind::NonIntegerIndex, "range/integer patterns require an integer scrutinee", scrutinee.span));
    }

    if let TypeKind::Enum(variants) = ctx.interner.get(scrutinee_ty).clone() {
        super::pattern::check_enum_exhaustiveness(&variants, arms, span, diagnostics);
    }

    let mut result = None;
    for arm in arms {
        ctx.push_scope();
        if let Pattern::Guarded(name) = &arm.pattern {
            ctx.declare_local(name, scrutinee_ty, false);
        }
        if let Some(guard) = &arm.guard {
            let g = infer(guard, Some(ctx.builtins.bool_), ctx, diagnostics);
            if !is_bool(g, ctx) {
                diagnostics.push(Diagnostic::error(DiagnosticKind::TypeMismatch, "case guard must be `bool`", guard.span));
            }
        }
        let arm_ty = infer(&arm.body, result, ctx, diagnostics);
        ctx.pop_scope();
        result.get_or_insert(arm_ty);
    }
    result.unwrap_or(ctx.builtins.void)
}
