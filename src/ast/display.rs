//! Pretty-printing for the parse/print round-trip property: for any
//! accepted input, pretty-printing and re-parsing the AST yields an equal
//! AST modulo spans. Grounded on `mastercyb-trident/src/ast/display.rs`,
//! adapted to print whole files rather than delegate to a separate
//! `format` module (the core crate has no formatter of its own).

use super::*;
use std::fmt::Write as _;

pub fn format_file(file: &File) -> String {
    let mut out = String::new();
    for import in &file.imports {
        let _ = write!(out, "import {}", import.path.as_dotted());
        if let Some(alias) = &import.alias {
            let _ = write!(out, " as {}", alias.node);
        }
        out.push('\n');
    }
    if !file.imports.is_empty() {
        out.push('\n');
    }
    for (i, decl) in file.decls.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        format_decl(&mut out, decl);
    }
    out
}

fn format_decl(out: &mut String, decl: &Decl) {
    match decl {
        Decl::Function(f) => format_function(out, f),
        Decl::Struct(s) => {
            if s.is_pub {
                out.push_str("pub ");
            }
            let _ = writeln!(out, "struct {} {{", s.name.node);
            for field in &s.fields {
                let _ = writeln!(out, " {}: {},", field.name.node, format_type(&field.ty.node));
            }
            out.push_str("}\n");
        }
        Decl::Enum(e) => {
            if e.is_pub {
                out.push_str("pub ");
            }
            let _ = writeln!(out, "enum {} {{", e.name.node);
            for v in &e.variants {
                let _ = writeln!(out, " {},", v.node);
            }
            out.push_str("}\n");
        }
        Decl::Interface(i) => {
            if i.is_pub {
                out.push_str("pub ");
            }
            let _ = writeln!(out, "interface {} {{", i.name.node);
            for m in &i.methods {
                let params = format_params(&m.params);
                match &m.return_ty {
                    Some(r) => {
                        let _ = writeln!(out, " fun {}({}) -> {};", m.name.node, params, format_type(&r.node));
                    }
                    None => {
                        let _ = writeln!(out, " fun {}({});", m.name.node, params);
                    }
                }
            }
            out.push_str("}\n");
        }
        Decl::Impl(imp) => {
            match &imp.interface {
                Some(i) => {
                    let _ = writeln!(out, "impl {} for {} {{", i.node, format_type(&imp.target.node));
                }
                None => {
                    let _ = writeln!(out, "impl {} {{", format_type(&imp.target.node));
                }
            }
            for method in &imp.methods {
                format_function(out, method);
            }
            out.push_str("}\n");
        }
        Decl::Const(c) => {
            if c.is_pub {
                out.push_str("pub ");
            }
            let _ = write!(out, "const {}", c.name.node);
            if let Some(ty) = &c.ty {
                let _ = write!(out, ": {}", format_type(&ty.node));
            }
            let _ = writeln!(out, " = {};", format_expr(&c.value.node));
        }
        Decl::GlobalVar(g) => {
            if g.is_pub {
                out.push_str("pub ");
            }
            let _ = write!(out, "global {}", g.name.node);
            if let Some(ty) = &g.ty {
                let _ = write!(out, ": {}", format_type(&ty.node));
            }
            if let Some(v) = &g.value {
                let _ = write!(out, " = {}", format_expr(&v.node));
            }
            out.push_str(";\n");
        }
        Decl::TypeAlias(t) => {
            if t.is_pub {
                out.push_str("pub ");
            }
            let _ = writeln!(out, "type {} = {};", t.name.node, format_type(&t.target.node));
        }
    }
}

fn format_function(out: &mut String, f: &FunctionDecl) {
    for attr in &f.attributes {
        match &attr.arg {
            Some(arg) => {
                let _ = writeln!(out, "@{}(\"{}\")", attr.name, arg);
            }
            None => {
                let _ = writeln!(out, "@{}", attr.name);
            }
        }
    }
    if f.is_pub {
        out.push_str("pub ");
    }
    let _ = write!(out, "fun {}({})", f.name.node, format_params(&f.params));
    if let Some(ret) = &f.return_ty {
        let _ = write!(out, " -> {}", format_type(&ret.node));
    }
    match &f.body {
        Some(body) => {
            out.push_str(" {\n");
            for stmt in &body.stmts {
                format_stmt(out, stmt, 1);
            }
            out.push_str("}\n");
        }
        None => out.push_str(";\n"),
    }
}

fn format_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("{}: {}", p.name.node, format_type(&p.ty.node)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named(n) => n.clone(),
        TypeExpr::Array(elem, len) => format!("[{}]{}", len, format_type(elem)),
        TypeExpr::Pointer(elem, true) => format!("*mut {}", format_type(elem)),
        TypeExpr::Pointer(elem, false) => format!("*{}", format_type(elem)),
        TypeExpr::Function(params, ret) => format!(
            "fn({}) -> {}",
            params.iter().map(format_type).collect::<Vec<_>>().join(", "),
            format_type(ret)
        ),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(" ");
    }
}

fn format_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    indent(out, depth);
    match stmt {
        Stmt::Let { is_mut, name, ty, value } => {
            out.push_str(if *is_mut { "var " } else { "let " });
            out.push_str(&name.node);
            if let Some(t) = ty {
                let _ = write!(out, ": {}", format_type(&t.node));
            }
            let _ = writeln!(out, " = {};", format_expr(&value.node));
        }
        Stmt::Assign { target, value } => {
            let _ = writeln!(out, "{} = {};", format_expr(&target.node), format_expr(&value.node));
        }
        Stmt::If { cond, then_block, else_block } => {
            let _ = writeln!(out, "if {} {{", format_expr(&cond.node));
            for s in &then_block.stmts {
                format_stmt(out, s, depth + 1);
            }
            indent(out, depth);
            out.push_str("}");
            if let Some(e) = else_block {
                out.push_str(" else ");
                match e.as_ref() {
                    Stmt::If { .. } => {
                        let rendered = {
                            let mut s = String::new();
                            format_stmt(&mut s, e, 0);
                            s
                        };
                        out.push_str(rendered.trim_start());
                    }
                    Stmt::Block(b) => {
                        out.push_str("{\n");
                        for s in &b.stmts {
                            format_stmt(out, s, depth + 1);
                        }
                        indent(out, depth);
                        out.push_str("}\n");
                    }
                    _ => {}
                }
            } else {
                out.push('\n');
            }
        }
        Stmt::Block(b) => {
            out.push_str("{\n");
            for s in &b.stmts {
                format_stmt(out, s, depth + 1);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::While { cond, body } => {
            let _ = writeln!(out, "while {} {{", format_expr(&cond.node));
            for s in &body.stmts {
                format_stmt(out, s, depth + 1);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::For { var, start, end, body } => {
            let _ = writeln!(
                out,
                "for {} in {}..{} {{",
                var.node,
                format_expr(&start.node),
                format_expr(&end.node)
            );
            for s in &body.stmts {
                format_stmt(out, s, depth + 1);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::Loop { body } => {
            out.push_str("loop {\n");
            for s in &body.stmts {
                format_stmt(out, s, depth + 1);
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::Break(_) => out.push_str("break;\n"),
        Stmt::Continue(_) => out.push_str("continue;\n"),
        Stmt::Return(value, _) => match value {
            Some(v) => {
                let _ = writeln!(out, "return {};", format_expr(&v.node));
            }
            None => out.push_str("return;\n"),
        },
        Stmt::Expr(e) => {
            let _ = writeln!(out, "{};", format_expr(&e.node));
        }
        Stmt::InlineAsm { body, .. } => {
            let _ = writeln!(out, "asm {{ {} }}", body);
        }
    }
}

fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::IntLiteral(n) => n.to_string(),
        Expr::CharLiteral(c) => format!("'{}'", c),
        Expr::StrLiteral { bytes, long_form } => {
            let prefix = if *long_form { "l" } else { "" };
            format!("{}\"{}\"", prefix, String::from_utf8_lossy(bytes))
        }
        Expr::BoolLiteral(b) => b.to_string(),
        Expr::Ident(name) => name.clone(),
        Expr::Binary { op, lhs, rhs } => {
            format!("({} {} {})", format_expr(&lhs.node), bin_op_str(*op), format_expr(&rhs.node))
        }
        Expr::Unary { op, operand } => format!("{}{}", un_op_str(*op), format_expr(&operand.node)),
        Expr::Call { callee, args } => format!("{}({})", format_expr(&callee.node), format_args(args)),
        Expr::MethodCall { receiver, method, args } => {
            format!("{}.{}({})", format_expr(&receiver.node), method.node, format_args(args))
        }
        Expr::Index { base, index } => format!("{}[{}]", format_expr(&base.node), format_expr(&index.node)),
        Expr::Field { base, name } => format!("{}.{}", format_expr(&base.node), name.node),
        Expr::Cast { expr, ty } => format!("({} as {})", format_expr(&expr.node), format_type(&ty.node)),
        Expr::AddressOf { expr, is_mut } => {
            format!("&{}{}", if *is_mut { "mut " } else { "" }, format_expr(&expr.node))
        }
        Expr::Deref(e) => format!("*{}", format_expr(&e.node)),
        Expr::Lambda { params, return_ty, body } => {
            let params_str = format_params(params);
            let mut s = format!("|{}|", params_str);
            if let Some(r) = return_ty {
                let _ = write!(s, " => {}", format_type(&r.node));
            }
            match body.as_ref() {
                LambdaBody::Expr(e) => {
                    let _ = write!(s, " {}", format_expr(&e.node));
                }
                LambdaBody::Block(b) => {
                    s.push_str(" {\n");
                    for st in &b.stmts {
                        format_stmt(&mut s, st, 1);
                    }
                    s.push('}');
                }
            }
            s
        }
        Expr::StructLiteral { name, fields } => {
            let fields_str = fields
                .iter()
                .map(|(n, v)| format!("{}: {}", n.node, format_expr(&v.node)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} {{ {} }}", name, fields_str)
        }
        Expr::ArrayLiteral(items) => format!("[{}]", format_args(items)),
        Expr::Metafunction { name, args, .. } => format!("@{}({})", name, format_args(args)),
        Expr::Case { scrutinee, arms } => {
            let mut s = format!("case {} {{ ", format_expr(&scrutinee.node));
            for arm in arms {
                s.push_str(&format_pattern(&arm.pattern));
                if let Some(g) = &arm.guard {
                    let _ = write!(s, " if {}", format_expr(&g.node));
                }
                let _ = write!(s, " => {}, ", format_expr(&arm.body.node));
            }
            s.push('}');
            s
        }
    }
}

fn format_args(args: &[Spanned<Expr>]) -> String {
    args.iter().map(|a| format_expr(&a.node)).collect::<Vec<_>>().join(", ")
}

fn format_pattern(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Int(n) => n.to_string(),
        Pattern::Char(c) => format!("'{}'", c),
        Pattern::Range(a, b) => format!("{}..{}", a, b),
        Pattern::EnumVariant(name) => name.clone(),
        Pattern::Wildcard => "_".to_string(),
        Pattern::Guarded(name) => name.clone(),
    }
}

fn bin_op_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::NotEq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Assign => "=",
    }
}

fn un_op_str(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "!",
        UnOp::BitNot => "~",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn parse(src: &str) -> File {
        let (tokens, _comments, _diags) = crate::lexer::Lexer::new(src, 0).tokenize();
        Parser::new(tokens, 0).parse_file().0
    }

    #[test]
    fn round_trips_a_simple_function() {
        let src = "fun add(a: u8, b: u8) -> u8 {\nreturn (a + b);\n}\n";
        let file = parse(src);
        let printed = format_file(&file);
        let reparsed = parse(&printed);
        assert_eq!(reparsed.decls.len(), file.decls.len());
    }
}
