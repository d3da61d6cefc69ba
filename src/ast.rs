//! Untyped AST produced by the parser. Pure data: every node
//! carries a `Span`; parents own their children. Functions have bodies;
//! `@extern` functions carry only a signature.

pub mod display;
pub mod navigate;

use crate::span::Spanned;

/// A single parsed source file.
#[derive(Clone, Debug)]
pub struct File {
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

#[derive(Clone, Debug)]
pub struct Import {
    pub path: ModulePath,
    pub alias: Option<Spanned<String>>,
    pub span: crate::span::Span,
}

/// A dotted module path, e.g. `std.mem` -> `["std", "mem"]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModulePath(pub Vec<String>);

impl ModulePath {
    pub fn as_dotted(&self) -> String {
        self.0.join(".")
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_dotted())
    }
}

#[derive(Clone, Debug)]
pub enum Decl {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Interface(InterfaceDecl),
    Impl(ImplBlock),
    Const(ConstDecl),
    GlobalVar(GlobalVarDecl),
    TypeAlias(TypeAliasDecl),
}

impl Decl {
    pub fn span(&self) -> crate::span::Span {
        match self {
            Decl::Function(d) => d.span,
            Decl::Struct(d) => d.span,
            Decl::Enum(d) => d.span,
            Decl::Interface(d) => d.span,
            Decl::Impl(d) => d.span,
            Decl::Const(d) => d.span,
            Decl::GlobalVar(d) => d.span,
            Decl::TypeAlias(d) => d.span,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Function(d) => Some(&d.name.node),
            Decl::Struct(d) => Some(&d.name.node),
            Decl::Enum(d) => Some(&d.name.node),
            Decl::Interface(d) => Some(&d.name.node),
            Decl::Impl(_) => None,
            Decl::Const(d) => Some(&d.name.node),
            Decl::GlobalVar(d) => Some(&d.name.node),
            Decl::TypeAlias(d) => Some(&d.name.node),
        }
    }
}

/// Attribute attached to a declaration: `@abi(..)`,
/// `@extern`, `@interrupt(..)`, `@tsmc`, or an unrecognized `@name(..)`
/// (kept for the "unknown attribute is a warning" rule).
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub arg: Option<String>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub is_pub: bool,
    pub attributes: Vec<Attribute>,
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub return_ty: Option<Spanned<TypeExpr>>,
    /// `None` for `@extern` declarations: signature only, no body.
    pub body: Option<Block>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
}

#[derive(Clone, Debug)]
pub struct StructDecl {
    pub is_pub: bool,
    pub attributes: Vec<Attribute>,
    pub name: Spanned<String>,
    pub fields: Vec<Param>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct EnumDecl {
    pub is_pub: bool,
    pub name: Spanned<String>,
    pub variants: Vec<Spanned<String>>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    pub is_pub: bool,
    pub name: Spanned<String>,
    pub methods: Vec<InterfaceMethodSig>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct InterfaceMethodSig {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub return_ty: Option<Spanned<TypeExpr>>,
}

/// `impl Interface for Type { .. }` or an inherent `impl Type { .. }`
/// (`interface` is `None`).
#[derive(Clone, Debug)]
pub struct ImplBlock {
    pub interface: Option<Spanned<String>>,
    pub target: Spanned<TypeExpr>,
    pub methods: Vec<FunctionDecl>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct ConstDecl {
    pub is_pub: bool,
    pub name: Spanned<String>,
    pub ty: Option<Spanned<TypeExpr>>,
    pub value: Spanned<Expr>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct GlobalVarDecl {
    pub is_pub: bool,
    pub is_mut: bool,
    pub name: Spanned<String>,
    pub ty: Option<Spanned<TypeExpr>>,
    pub value: Option<Spanned<Expr>>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub struct TypeAliasDecl {
    pub is_pub: bool,
    pub name: Spanned<String>,
    pub target: Spanned<TypeExpr>,
    pub span: crate::span::Span,
}

/// Syntactic type as written in source, before resolution to `types::TypeId`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>, u64),
    Pointer(Box<TypeExpr>, bool),
    Function(Vec<TypeExpr>, Box<TypeExpr>),
}

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: crate::span::Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Let {
        is_mut: bool,
        name: Spanned<String>,
        ty: Option<Spanned<TypeExpr>>,
        value: Spanned<Expr>,
    },
    Assign {
        target: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    If {
        cond: Spanned<Expr>,
        then_block: Block,
        else_block: Option<Box<Stmt>>,
    },
    /// An `if` used as the `else` arm of another `if`, or a plain block.
    Block(Block),
    While {
        cond: Spanned<Expr>,
        body: Block,
    },
    For {
        var: Spanned<String>,
        start: Spanned<Expr>,
        end: Spanned<Expr>,
        body: Block,
    },
    Loop {
        body: Block,
    },
    Break(crate::span::Span),
    Continue(crate::span::Span),
    Return(Option<Spanned<Expr>>, crate::span::Span),
    Expr(Spanned<Expr>),
    InlineAsm {
        body: String,
        span: crate::span::Span,
    },
}

impl Stmt {
    pub fn span(&self) -> crate::span::Span {
        match self {
            Stmt::Let { name, value, .. } => name.span.merge(value.span),
            Stmt::Assign { target, value } => target.span.merge(value.span),
            Stmt::If { cond, then_block, .. } => cond.span.merge(then_block.span),
            Stmt::Block(b) => b.span,
            Stmt::While { cond, body } => cond.span.merge(body.span),
            Stmt::For { var, body, .. } => var.span.merge(body.span),
            Stmt::Loop { body } => body.span,
            Stmt::Break(s) | Stmt::Continue(s) => *s,
            Stmt::Return(_, s) => *s,
            Stmt::Expr(e) => e.span,
            Stmt::InlineAsm { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    IntLiteral(u64),
    CharLiteral(char),
    StrLiteral { bytes: Vec<u8>, long_form: bool },
    BoolLiteral(bool),
    Ident(String),
    Binary {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnOp,
        operand: Box<Spanned<Expr>>,
    },
    Call {
        callee: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
    },
    MethodCall {
        receiver: Box<Spanned<Expr>>,
        method: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    Index {
        base: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Field {
        base: Box<Spanned<Expr>>,
        name: Spanned<String>,
    },
    Cast {
        expr: Box<Spanned<Expr>>,
        ty: Spanned<TypeExpr>,
    },
    AddressOf {
        expr: Box<Spanned<Expr>>,
        is_mut: bool,
    },
    Deref(Box<Spanned<Expr>>),
    Lambda {
        params: Vec<Param>,
        return_ty: Option<Spanned<TypeExpr>>,
        body: Box<LambdaBody>,
    },
    StructLiteral {
        name: String,
        fields: Vec<(Spanned<String>, Spanned<Expr>)>,
    },
    ArrayLiteral(Vec<Spanned<Expr>>),
    /// `@name(args)`: a metafunction call, expanded during semantic analysis.
    /// `@print`'s first argument is parsed as an interpolation
    /// template, not a plain string, if it contains `{ .. }` chunks.
    Metafunction {
        name: String,
        template: Option<Vec<InterpChunk>>,
        args: Vec<Spanned<Expr>>,
    },
    Case {
        scrutinee: Box<Spanned<Expr>>,
        arms: Vec<CaseArm>,
    },
}

#[derive(Clone, Debug)]
pub enum LambdaBody {
    Expr(Spanned<Expr>),
    Block(Block),
}

#[derive(Clone, Debug)]
pub enum InterpChunk {
    Literal(String),
    Expr(Spanned<Expr>),
}

#[derive(Clone, Debug)]
pub struct CaseArm {
    pub pattern: Pattern,
    pub guard: Option<Spanned<Expr>>,
    pub body: Spanned<Expr>,
}

#[derive(Clone, Debug)]
pub enum Pattern {
    Int(u64),
    Char(char),
/// `a..b`: inclusive `a`, exclusive `b`.
    Range(u64, u64),
    EnumVariant(String),
    Wildcard,
    /// `name if expr` binds the scrutinee to `name` for the guard and arm body.
    Guarded(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Assign,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}
