//! Recursive-descent parser, tokens -> untyped AST. Pratt parsing
//! drives expressions. On error the parser emits a diagnostic, synchronizes
//! at the next statement-start token, and continues so a single file can
//! report multiple parse errors.

use crate::ast::*;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::{Span, Spanned};
use crate::token::Token;

pub struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    file_id: u16,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned<Token>>, file_id: u16) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse_file(mut self) -> (File, Vec<Diagnostic>) {
        let mut imports = Vec::new();
        let mut decls = Vec::new();

        while !self.at_eof() {
            if matches!(self.peek(), Token::Import) {
                imports.push(self.parse_import());
                continue;
            }
            match self.parse_decl() {
                Some(decl) => decls.push(decl),
                None => self.synchronize(),
            }
        }

        (File { imports, decls }, self.diagnostics)
    }

    // ---- token stream primitives ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].node
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.current_span()
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].node.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token) -> bool {
        if self.eat(tok) {
            true
        } else {
            let found = self.peek().describe();
            self.error(
                DiagnosticKind::MissingToken,
                format!("expected {}, found {}", tok.describe(), found),
            );
            false
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        let span = self.current_span();
        if let Token::Ident(name) = self.peek().clone() {
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error(DiagnosticKind::UnexpectedToken, format!("expected identifier, found {}", self.peek().describe()));
            Spanned::new(String::new(), span)
        }
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(kind, message, self.current_span()));
    }

/// Recover at the next statement-start token so one syntax error
    /// does not abort the whole file.
    fn synchronize(&mut self) {
        self.advance();
        while !self.at_eof() {
            if matches!(
                self.peek(),
                Token::Fun
                    | Token::Fn
                    | Token::Struct
                    | Token::Enum
                    | Token::Interface
                    | Token::Impl
                    | Token::Const
                    | Token::Global
                    | Token::Import
                    | Token::Pub
                    | Token::At
            ) {
                return;
            }
            self.advance();
        }
    }

    // ---- top level ----

    fn parse_import(&mut self) -> Import {
        let start = self.current_span();
        self.advance(); // 'import'
        let mut segments = vec![self.expect_ident().node];
        while self.eat(&Token::Dot) {
            segments.push(self.expect_ident().node);
        }
        let alias = if self.eat(&Token::As) {
            Some(self.expect_ident())
        } else {
            None
        };
        self.eat(&Token::Semicolon);
        let span = start.merge(self.prev_span());
        Import {
            path: ModulePath(segments),
            alias,
            span,
        }
    }

    fn parse_attributes(&mut self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        while matches!(self.peek(), Token::At) {
            let start = self.current_span();
            self.advance();
            let name = self.expect_ident().node;
            let arg = if self.eat(&Token::LParen) {
                let arg = if let Token::Str { bytes, .. } = self.peek().clone() {
                    self.advance();
                    Some(String::from_utf8_lossy(&bytes).into_owned())
                } else {
                    None
                };
                self.expect(&Token::RParen);
                arg
            } else {
                None
            };
            let span = start.merge(self.prev_span());
            attrs.push(Attribute { name, arg, span });
        }
        attrs
    }

    fn parse_decl(&mut self) -> Option<Decl> {
        let attributes = self.parse_attributes();
        let is_pub = self.eat(&Token::Pub);

        match self.peek() {
            Token::Fun | Token::Fn => Some(Decl::Function(self.parse_function(is_pub, attributes))),
            Token::Struct => Some(Decl::Struct(self.parse_struct(is_pub, attributes))),
            Token::Enum => Some(Decl::Enum(self.parse_enum(is_pub))),
            Token::Interface => Some(Decl::Interface(self.parse_interface(is_pub))),
            Token::Impl => Some(Decl::Impl(self.parse_impl())),
            Token::Const => Some(Decl::Const(self.parse_const(is_pub))),
            Token::Global => Some(Decl::GlobalVar(self.parse_global(is_pub))),
            Token::Ident(name) if name == "type" => Some(Decl::TypeAlias(self.parse_type_alias(is_pub))),
            _ => {
                self.error(
                    DiagnosticKind::UnexpectedToken,
                    format!("expected a declaration, found {}", self.peek().describe()),
                );
                None
            }
        }
    }

    fn parse_function(&mut self, is_pub: bool, attributes: Vec<Attribute>) -> FunctionDecl {
        let start = self.current_span();
        self.advance(); // 'fun' or 'fn'
        let name = self.expect_ident();
        self.expect(&Token::LParen);
        let params = self.parse_params();
        self.expect(&Token::RParen);
        let return_ty = if self.eat(&Token::Arrow) {
            Some(self.parse_type())
        } else {
            None
        };

        let is_extern = attributes.iter().any(|a| a.name == "extern");
        let body = if is_extern || matches!(self.peek(), Token::Semicolon) {
            self.eat(&Token::Semicolon);
            None
        } else {
            Some(self.parse_block())
        };

        let span = start.merge(self.prev_span());
        FunctionDecl {
            is_pub,
            attributes,
            name,
            params,
            return_ty,
            body,
            span,
        }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            return params;
        }
        loop {
            let name = self.expect_ident();
            self.expect(&Token::Colon);
            let ty = self.parse_type();
            params.push(Param { name, ty });
            if !self.eat(&Token::Comma) {
                break;
            }
            if matches!(self.peek(), Token::RParen) {
                break;
            }
        }
        params
    }

    fn parse_struct(&mut self, is_pub: bool) -> StructDecl {
        let start = self.current_span();
        self.advance();
        let name = self.expect_ident();
        self.expect(&Token::LBrace);
        let mut fields = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            let fname = self.expect_ident();
            self.expect(&Token::Colon);
            let ty = self.parse_type();
            fields.push(Param { name: fname, ty });
            self.eat(&Token::Comma);
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        StructDecl { is_pub, name, fields, span }
    }

    fn parse_enum(&mut self, is_pub: bool) -> EnumDecl {
        let start = self.current_span();
        self.advance();
        let name = self.expect_ident();
        self.expect(&Token::LBrace);
        let mut variants = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            variants.push(self.expect_ident());
            self.eat(&Token::Comma);
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        EnumDecl { is_pub, name, variants, span }
    }

    fn parse_interface(&mut self, is_pub: bool) -> InterfaceDecl {
        let start = self.current_span();
        self.advance();
        let name = self.expect_ident();
        self.expect(&Token::LBrace);
        let mut methods = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            self.eat(&Token::Pub);
            if matches!(self.peek(), Token::Fun | Token::Fn) {
                self.advance();
            }
            let mname = self.expect_ident();
            self.expect(&Token::LParen);
            let params = self.parse_params();
            self.expect(&Token::RParen);
            let return_ty = if self.eat(&Token::Arrow) { Some(self.parse_type()) } else { None };
            self.eat(&Token::Semicolon);
            methods.push(InterfaceMethodSig { name: mname, params, return_ty });
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        InterfaceDecl { is_pub, name, methods, span }
    }

    fn parse_impl(&mut self) -> ImplBlock {
        let start = self.current_span();
        self.advance(); // 'impl'
        let first = self.expect_ident();
        let (interface, target) = if self.eat(&Token::For) {
            let target = self.parse_type();
            (Some(first), target)
        } else {
            (None, Spanned::new(TypeExpr::Named(first.node), first.span))
        };
        self.expect(&Token::LBrace);
        let mut methods = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            let attributes = self.parse_attributes();
            let is_pub = self.eat(&Token::Pub);
            if matches!(self.peek(), Token::Fun | Token::Fn) {
                methods.push(self.parse_function(is_pub, attributes));
            } else {
                self.error(DiagnosticKind::UnexpectedToken, "expected a method in impl block");
                self.synchronize();
            }
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        ImplBlock { interface, target, methods, span }
    }

    fn parse_const(&mut self, is_pub: bool) -> ConstDecl {
        let start = self.current_span();
        self.advance();
        let name = self.expect_ident();
        let ty = if self.eat(&Token::Colon) { Some(self.parse_type()) } else { None };
        self.expect(&Token::Eq);
        let value = self.parse_expr();
        self.eat(&Token::Semicolon);
        let span = start.merge(self.prev_span());
        ConstDecl { is_pub, name, ty, value, span }
    }

    fn parse_global(&mut self, is_pub: bool) -> GlobalVarDecl {
        let start = self.current_span();
        self.advance();
        let is_mut = self.eat(&Token::Mut) || self.eat(&Token::Var);
        let name = self.expect_ident();
        let ty = if self.eat(&Token::Colon) { Some(self.parse_type()) } else { None };
        let value = if self.eat(&Token::Eq) { Some(self.parse_expr()) } else { None };
        self.eat(&Token::Semicolon);
        let span = start.merge(self.prev_span());
        GlobalVarDecl { is_pub, is_mut, name, ty, value, span }
    }

    fn parse_type_alias(&mut self, is_pub: bool) -> TypeAliasDecl {
        let start = self.current_span();
        self.advance(); // 'type'
        let name = self.expect_ident();
        self.expect(&Token::Eq);
        let target = self.parse_type();
        self.eat(&Token::Semicolon);
        let span = start.merge(self.prev_span());
        TypeAliasDecl { is_pub, name, target, span }
    }

    // ---- types ----

    fn parse_type(&mut self) -> Spanned<TypeExpr> {
        let start = self.current_span();
        match self.peek().clone() {
            Token::Star => {
                self.advance();
                let is_mut = self.eat(&Token::Mut);
                let inner = self.parse_type();
                let span = start.merge(inner.span);
                Spanned::new(TypeExpr::Pointer(Box::new(inner.node), is_mut), span)
            }
            Token::LBracket => {
                self.advance();
                let len = match self.peek().clone() {
                    Token::Integer(n) => {
                        self.advance();
                        n
                    }
                    _ => {
                        self.error(DiagnosticKind::UnexpectedToken, "expected array length");
                        0
                    }
                };
                self.expect(&Token::RBracket);
                let elem = self.parse_type();
                let span = start.merge(elem.span);
                Spanned::new(TypeExpr::Array(Box::new(elem.node), len), span)
            }
            Token::Ident(name) => {
                self.advance();
                Spanned::new(TypeExpr::Named(name), start)
            }
            _ => {
                self.error(
                    DiagnosticKind::UnexpectedToken,
                    format!("expected a type, found {}", self.peek().describe()),
                );
                Spanned::new(TypeExpr::Named("<error>".to_string()), start)
            }
        }
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Block {
        let start = self.current_span();
        self.expect(&Token::LBrace);
        let mut stmts = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            stmts.push(self.parse_stmt());
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        Block { stmts, span }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.peek() {
            Token::Let | Token::Var => self.parse_let(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Loop => self.parse_loop(),
            Token::Break => {
                let span = self.current_span();
                self.advance();
                self.eat(&Token::Semicolon);
                Stmt::Break(span)
            }
            Token::Continue => {
                let span = self.current_span();
                self.advance();
                self.eat(&Token::Semicolon);
                Stmt::Continue(span)
            }
            Token::Return => {
                let start = self.current_span();
                self.advance();
                let value = if matches!(self.peek(), Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.eat(&Token::Semicolon);
                Stmt::Return(value, start.merge(self.prev_span()))
            }
            Token::LBrace => Stmt::Block(self.parse_block()),
            Token::AsmBlock(_) => {
                let span = self.current_span();
                if let Token::AsmBlock(body) = self.advance() {
                    Stmt::InlineAsm { body, span }
                } else {
                    unreachable!()
                }
            }
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    fn parse_let(&mut self) -> Stmt {
        let is_var = matches!(self.peek(), Token::Var);
        self.advance();
        let is_mut = is_var || self.eat(&Token::Mut);
        let name = self.expect_ident();
        let ty = if self.eat(&Token::Colon) { Some(self.parse_type()) } else { None };
        self.expect(&Token::Eq);
        let value = self.parse_expr();
        self.eat(&Token::Semicolon);
        Stmt::Let { is_mut, name, ty, value }
    }

    fn parse_if(&mut self) -> Stmt {
        self.advance(); // 'if'
        let cond = self.parse_expr();
        let then_block = self.parse_block();
        let else_block = if self.eat(&Token::Else) {
            if matches!(self.peek(), Token::If) {
                Some(Box::new(self.parse_if()))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block())))
            }
        } else {
            None
        };
        Stmt::If { cond, then_block, else_block }
    }

    fn parse_while(&mut self) -> Stmt {
        self.advance();
        let cond = self.parse_expr();
        let body = self.parse_block();
        Stmt::While { cond, body }
    }

    fn parse_for(&mut self) -> Stmt {
        self.advance(); // 'for'
        let var = self.expect_ident();
        self.expect(&Token::In);
        let start = self.parse_expr();
        self.expect(&Token::DotDot);
        let end = self.parse_expr();
        let body = self.parse_block();
        Stmt::For { var, start, end, body }
    }

    fn parse_loop(&mut self) -> Stmt {
        self.advance();
        let body = self.parse_block();
        Stmt::Loop { body }
    }

    fn parse_expr_or_assign_stmt(&mut self) -> Stmt {
        let expr = self.parse_expr();
        if self.eat(&Token::Eq) {
            let value = self.parse_expr();
            self.eat(&Token::Semicolon);
            Stmt::Assign { target: expr, value }
        } else {
            self.eat(&Token::Semicolon);
            Stmt::Expr(expr)
        }
    }

// ---- expressions (Pratt parsing) ----
    //
    // Precedence low -> high: assignment handled at the statement level
    // (Stmt::Assign), logical-or, logical-and, bit-or, bit-xor, bit-and,
    // equality, relational, shift, additive, multiplicative, unary, cast,
    // call/index/field, primary.

    pub fn parse_expr(&mut self) -> Spanned<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_and();
        while matches!(self.peek(), Token::PipePipe) {
            self.advance();
            let rhs = self.parse_and();
            lhs = bin(lhs, BinOp::Or, rhs);
        }
        lhs
    }

    fn parse_and(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_bit_or();
        while matches!(self.peek(), Token::AmpAmp) {
            self.advance();
            let rhs = self.parse_bit_or();
            lhs = bin(lhs, BinOp::And, rhs);
        }
        lhs
    }

    fn parse_bit_or(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_bit_xor();
        while matches!(self.peek(), Token::Pipe) {
            self.advance();
            let rhs = self.parse_bit_xor();
            lhs = bin(lhs, BinOp::BitOr, rhs);
        }
        lhs
    }

    fn parse_bit_xor(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_bit_and();
        while matches!(self.peek(), Token::Caret) {
            self.advance();
            let rhs = self.parse_bit_and();
            lhs = bin(lhs, BinOp::BitXor, rhs);
        }
        lhs
    }

    fn parse_bit_and(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_equality();
        while matches!(self.peek(), Token::Amp) {
            self.advance();
            let rhs = self.parse_equality();
            lhs = bin(lhs, BinOp::BitAnd, rhs);
        }
        lhs
    }

    fn parse_equality(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational();
            lhs = bin(lhs, op, rhs);
        }
        lhs
    }

    fn parse_relational(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_shift();
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::Le => BinOp::Le,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_shift();
            lhs = bin(lhs, op, rhs);
        }
        lhs
    }

    fn parse_shift(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.peek() {
                Token::Shl => BinOp::Shl,
                Token::Shr => BinOp::Shr,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive();
            lhs = bin(lhs, op, rhs);
        }
        lhs
    }

    fn parse_additive(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative();
            lhs = bin(lhs, op, rhs);
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary();
            lhs = bin(lhs, op, rhs);
        }
        lhs
    }

    fn parse_unary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        let op = match self.peek() {
            Token::Minus => Some(UnOp::Neg),
            Token::Bang => Some(UnOp::Not),
            Token::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(operand.span);
            return Spanned::new(
                Expr::Unary { op, operand: Box::new(operand) },
                span,
            );
        }
        if matches!(self.peek(), Token::Amp) {
            self.advance();
            let is_mut = self.eat(&Token::Mut);
            let operand = self.parse_unary();
            let span = start.merge(operand.span);
            return Spanned::new(
                Expr::AddressOf { expr: Box::new(operand), is_mut },
                span,
            );
        }
        if matches!(self.peek(), Token::Star) {
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(operand.span);
            return Spanned::new(Expr::Deref(Box::new(operand)), span);
        }
        self.parse_cast()
    }

    fn parse_cast(&mut self) -> Spanned<Expr> {
        let mut expr = self.parse_postfix();
        while matches!(self.peek(), Token::As) {
            self.advance();
            let ty = self.parse_type();
            let span = expr.span.merge(ty.span);
            expr = Spanned::new(Expr::Cast { expr: Box::new(expr), ty }, span);
        }
        expr
    }

    fn parse_postfix(&mut self) -> Spanned<Expr> {
        let mut expr = self.parse_primary();
        loop {
            match self.peek().clone() {
                Token::LParen => {
                    self.advance();
                    let args = self.parse_arg_list();
                    self.expect(&Token::RParen);
                    let span = expr.span.merge(self.prev_span());
                    expr = Spanned::new(
                        Expr::Call { callee: Box::new(expr), args },
                        span,
                    );
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    self.expect(&Token::RBracket);
                    let span = expr.span.merge(self.prev_span());
                    expr = Spanned::new(
                        Expr::Index { base: Box::new(expr), index: Box::new(index) },
                        span,
                    );
                }
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident();
                    if matches!(self.peek(), Token::LParen) {
                        self.advance();
                        let args = self.parse_arg_list();
                        self.expect(&Token::RParen);
                        let span = expr.span.merge(self.prev_span());
                        expr = Spanned::new(
                            Expr::MethodCall { receiver: Box::new(expr), method: name, args },
                            span,
                        );
                    } else {
                        let span = expr.span.merge(name.span);
                        expr = Spanned::new(
                            Expr::Field { base: Box::new(expr), name },
                            span,
                        );
                    }
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_arg_list(&mut self) -> Vec<Spanned<Expr>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            return args;
        }
        loop {
            args.push(self.parse_expr());
            if !self.eat(&Token::Comma) {
                break;
            }
            if matches!(self.peek(), Token::RParen) {
                break;
            }
        }
        args
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        match self.peek().clone() {
            Token::Integer(n) => {
                self.advance();
                Spanned::new(Expr::IntLiteral(n), start)
            }
            Token::Char(c) => {
                self.advance();
                Spanned::new(Expr::CharLiteral(c), start)
            }
            Token::Str { bytes, long_form } => {
                self.advance();
                Spanned::new(Expr::StrLiteral { bytes, long_form }, start)
            }
            Token::True => {
                self.advance();
                Spanned::new(Expr::BoolLiteral(true), start)
            }
            Token::False => {
                self.advance();
                Spanned::new(Expr::BoolLiteral(false), start)
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(&Token::RParen);
                inner
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !matches!(self.peek(), Token::RBracket | Token::Eof) {
                    items.push(self.parse_expr());
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RBracket);
                let span = start.merge(self.prev_span());
                Spanned::new(Expr::ArrayLiteral(items), span)
            }
            Token::Pipe => self.parse_lambda(),
            Token::Case => self.parse_case(),
            Token::At => self.parse_metafunction(),
            Token::Ident(name) => {
                self.advance();
                if matches!(self.peek(), Token::LBrace) && self.looks_like_struct_literal() {
                    self.parse_struct_literal(name, start)
                } else {
                    Spanned::new(Expr::Ident(name), start)
                }
            }
            _ => {
                self.error(
                    DiagnosticKind::UnexpectedToken,
                    format!("expected an expression, found {}", self.peek().describe()),
                );
                self.advance();
                Spanned::new(Expr::Ident("<error>".to_string()), start)
            }
        }
    }

    /// Heuristic: `Name { ident :` looks like a struct literal, while
    /// `Name { stmt...` (e.g. the body of `if Name { ... }`-shaped code)
    /// never occurs because `Name` there is a condition, not a callee -- we
    /// only reach here after already parsing an identifier primary, and the
    /// caller (`if`/`while`/`for`) parses its condition via `parse_expr`
    /// before the block, so this check only needs to distinguish a literal
    /// from a dangling brace.
    fn looks_like_struct_literal(&self) -> bool {
        matches!(self.peek_at(1), Token::Ident(_)) && matches!(self.peek_at(2), Token::Colon)
    }

    fn parse_struct_literal(&mut self, name: String, start: Span) -> Spanned<Expr> {
        self.advance(); // '{'
        let mut fields = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            let fname = self.expect_ident();
            self.expect(&Token::Colon);
            let value = self.parse_expr();
            fields.push((fname, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        Spanned::new(Expr::StructLiteral { name, fields }, span)
    }

    fn parse_lambda(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        self.advance(); // '|'
        let mut params = Vec::new();
        while !matches!(self.peek(), Token::Pipe | Token::Eof) {
            let name = self.expect_ident();
            self.expect(&Token::Colon);
            let ty = self.parse_type();
            params.push(Param { name, ty });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Pipe);
        let return_ty = if self.eat(&Token::FatArrow) { Some(self.parse_type()) } else { None };
        let body = if matches!(self.peek(), Token::LBrace) {
            Box::new(LambdaBody::Block(self.parse_block()))
        } else {
            Box::new(LambdaBody::Expr(self.parse_expr()))
        };
        let span = start.merge(self.prev_span());
        Spanned::new(Expr::Lambda { params, return_ty, body }, span)
    }

    fn parse_case(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        self.advance(); // 'case'
        let scrutinee = self.parse_expr();
        self.expect(&Token::LBrace);
        let mut arms = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            let pattern = self.parse_pattern();
            let guard = if self.eat(&Token::If) { Some(self.parse_expr()) } else { None };
            self.expect(&Token::FatArrow);
            let body = self.parse_expr();
            arms.push(CaseArm { pattern, guard, body });
            self.eat(&Token::Comma);
        }
        self.expect(&Token::RBrace);
        let span = start.merge(self.prev_span());
        Spanned::new(
            Expr::Case { scrutinee: Box::new(scrutinee), arms },
            span,
        )
    }

    fn parse_pattern(&mut self) -> Pattern {
        match self.peek().clone() {
            Token::Underscore => {
                self.advance();
                Pattern::Wildcard
            }
            Token::Integer(n) => {
                self.advance();
                if self.eat(&Token::DotDot) {
                    if let Token::Integer(m) = self.peek().clone() {
                        self.advance();
                        Pattern::Range(n, m)
                    } else {
                        self.error(DiagnosticKind::MalformedPattern, "expected integer after '..' in range pattern");
                        Pattern::Int(n)
                    }
                } else {
                    Pattern::Int(n)
                }
            }
            Token::Char(c) => {
                self.advance();
                Pattern::Char(c)
            }
            Token::Ident(name) => {
                self.advance();
                if matches!(self.peek(), Token::If) {
                    Pattern::Guarded(name)
                } else {
                    Pattern::EnumVariant(name)
                }
            }
            _ => {
                self.error(
                    DiagnosticKind::MalformedPattern,
                    format!("expected a pattern, found {}", self.peek().describe()),
                );
                self.advance();
                Pattern::Wildcard
            }
        }
    }

    /// `@print("text { expr }", y)` etc. Only `@print`'s
    /// first string argument is parsed as an interpolation template; other
    /// metafunctions take plain expression arguments.
    fn parse_metafunction(&mut self) -> Spanned<Expr> {
        let start = self.current_span();
        self.advance(); // '@'
        let name = self.expect_ident().node;
        self.expect(&Token::LParen);

        let mut template = None;
        let mut args = Vec::new();

        if name == "print" {
            if let Token::Str { bytes, .. } = self.peek().clone() {
                self.advance();
                let text = String::from_utf8_lossy(&bytes).into_owned();
                template = Some(parse_interp_template(&text, self.file_id, start));
                if self.eat(&Token::Comma) {
                    args = self.parse_arg_list();
                }
            } else {
                args = self.parse_arg_list();
            }
        } else {
            args = self.parse_arg_list();
        }

        self.expect(&Token::RParen);
        let span = start.merge(self.prev_span());
        Spanned::new(Expr::Metafunction { name, template, args }, span)
    }
}

fn bin(lhs: Spanned<Expr>, op: BinOp, rhs: Spanned<Expr>) -> Spanned<Expr> {
    let span = lhs.span.merge(rhs.span);
    Spanned::new(
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
        span,
    )
}

/// Split a `@print` template string into literal chunks and `{ expr }`
/// embedded-expression chunks. Embedded expressions are themselves
/// lexed and parsed as standalone expressions.
fn parse_interp_template(text: &str, file_id: u16, span: Span) -> Vec<InterpChunk> {
    let mut chunks = Vec::new();
    let mut literal = String::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if !literal.is_empty() {
                chunks.push(InterpChunk::Literal(std::mem::take(&mut literal)));
            }
            let start = i + 1;
            let mut depth = 1usize;
            let mut j = start;
            while j < bytes.len() && depth > 0 {
                match bytes[j] {
                    b'{' => depth += 1,
                    b'}' => depth -= 1,
                    _ => {}
                }
                if depth > 0 {
                    j += 1;
                }
            }
            let inner = &text[start..j];
            if !inner.trim().is_empty() {
                let (tokens, _comments, _diags) = crate::lexer::Lexer::new(inner, file_id).tokenize();
                let expr = Parser::new(tokens, file_id).parse_expr();
                chunks.push(InterpChunk::Expr(expr));
            } else {
                // `{}` is a placeholder: the value comes from the next call
                // argument, filled in by the semantic analyzer.
                chunks.push(InterpChunk::Expr(Spanned::new(Expr::Ident(String::new()), span)));
            }
            i = j + 1;
        } else {
            literal.push(bytes[i] as char);
            i += 1;
        }
    }
    if !literal.is_empty() {
        chunks.push(InterpChunk::Literal(literal));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (File, Vec<Diagnostic>) {
        let (tokens, _comments, _diags) = Lexer::new(src, 0).tokenize();
        Parser::new(tokens, 0).parse_file()
    }

    #[test]
    fn parses_simple_function() {
        let (file, diags) = parse("fun add(a: u8, b: u8) -> u8 { return a + b; }\n");
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn parses_overloaded_functions_and_call() {
        let (file, diags) = parse(
            "fun add(a: u8, b: u8) -> u8 { return a + b; }\nfun main() -> u8 { return add(1, 2); }\n",
        );
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 2);
    }

    #[test]
    fn parses_case_with_range_and_wildcard() {
        let (file, diags) = parse(
            "fun color(b: u8) -> u8 { return case b { 0 => 7, 1..3 => 2, _ => 0 }; }\n",
        );
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn parses_both_function_keywords_and_pointer_forms() {
        let (file, diags) = parse(
            "fn f(p: *u8, q: *mut u8) -> void { return; }\nfun g() -> void { let x = &p; return; }\n",
        );
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 2);
    }

    #[test]
    fn recovers_after_syntax_error_and_reports_multiple() {
        let (_file, diags) = parse("fun f( { }\nfun g() -> u8 { return 0; }\n");
        assert!(!diags.is_empty());
    }

    #[test]
    fn parses_import_with_alias() {
        let (file, _diags) = parse("import std.mem as mem;\nfun main() -> void { return; }\n");
        assert_eq!(file.imports.len(), 1);
        assert_eq!(file.imports[0].alias.as_ref().unwrap().node, "mem");
    }

    #[test]
    fn parses_attributes_on_function() {
        let (file, diags) = parse("@extern\n@abi(\"register: A=x\")\nfun f(x: u8) -> u8;\n");
        assert!(diags.is_empty());
        match &file.decls[0] {
            Decl::Function(f) => {
                assert_eq!(f.attributes.len(), 2);
                assert!(f.body.is_none());
            }
            _ => panic!("expected function"),
        }
    }
}
