//! Semantic analyzer: name resolution, type checking, overload
//! resolution, monomorphized interface dispatch, attribute processing, and
//! metafunction expansion. Produces a typed-AST view (the original AST plus
//! a frozen `SymbolTable`/`TypeInterner` that downstream passes -- lowering
//! chief among them -- use as a type oracle) and a `Vec<Diagnostic>`.
//!
//! Errors accumulate with spans; on a local failure the analyzer substitutes
//! `TypeKind::Error` and keeps going, so one bad declaration never hides
//! errors in the rest of the file.

pub mod attr;
pub mod expr;
pub mod metafunc;
pub mod overload;
pub mod pattern;

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::Span;
use crate::types::{AbiSpec, Builtins, StructField, TypeId, TypeInterner, TypeKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    OverloadSet,
    Const,
    Global,
    Local,
    Param,
    Type,
    Interface,
}

#[derive(Clone, Debug)]
pub struct FunctionSig {
    pub mangled: String,
    pub params: Vec<TypeId>,
    pub return_ty: TypeId,
    pub abi: crate::abi::AbiKind,
    pub attributes: Vec<Attribute>,
    pub is_pub: bool,
    pub has_body: bool,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
    /// Populated when `kind == OverloadSet`: every candidate function sharing
    /// this name.
    pub overloads: Vec<FunctionSig>,
}

/// A chained scope: lexical nesting with shadowing.
#[derive(Default)]
pub struct Scope {
    symbols: HashMap<String, Symbol>,
}

pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::default()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Declare `sym` in the innermost scope. Returns the prior declaration
    /// if one with the same name already existed *in this scope* (used to
    /// detect `DuplicateSymbol`); shadowing across scopes is allowed.
    pub fn declare(&mut self, sym: Symbol) -> Option<Symbol> {
        let scope = self.scopes.last_mut().expect("at least one scope");
        scope.symbols.insert(sym.name.clone(), sym)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.symbols.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes.iter_mut().rev().find_map(|s| s.symbols.get_mut(name))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `(interface, target type)` -> concrete method name, monomorphized at
/// semantic time.
pub type ImplKey = (String, TypeId);

pub struct AnalysisResult {
    pub interner: TypeInterner,
    pub builtins: Builtins,
    pub symbols: SymbolTable,
    pub impls: HashMap<ImplKey, HashMap<String, String>>,
    pub diagnostics: Vec<Diagnostic>,
    /// Struct/enum declarations' resolved types, keyed by name, for the
    /// lowerer's field-offset and enum-discriminant lookups.
    pub named_types: HashMap<String, TypeId>,
}

impl AnalysisResult {
    pub fn has_errors(&self) -> bool {
        crate::diagnostic::has_errors(&self.diagnostics)
    }
}

/// Entry point: run every semantic pass over `file`, in order.
/// `modules` supplies the ASTs of any imported module, keyed by
/// dotted path, so that importing the same module under two aliases
/// dedupes correctly.
pub fn analyze(file: &mut File, modules: &HashMap<String, File>) -> AnalysisResult {
    let mut interner = TypeInterner::new();
    let builtins = interner.builtins();
    let mut symbols = SymbolTable::new();
    let mut diagnostics = Vec::new();
    let mut named_types = HashMap::new();
    let mut impls: HashMap<ImplKey, HashMap<String, String>> = HashMap::new();

    // 1. Module and import resolution: merge each imported module's
    // top-level symbols once, regardless of how many aliases point at it.
    let mut imported_modules: std::collections::HashSet<String> = std::collections::HashSet::new();
    for import in &file.imports {
        let canonical = import.path.as_dotted();
        if !imported_modules.insert(canonical.clone()) {
            continue; // already merged under a different alias
        }
        if let Some(module_file) = modules.get(&canonical) {
            collect_declarations(
                &module_file.decls,
                &mut interner,
                &builtins,
                &mut symbols,
                &mut named_types,
                &mut diagnostics,
            );
        } else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::AmbiguousImport,
                format!("module '{}' not found; its symbols are unavailable", canonical),
                import.span,
            ));
        }
    }

    // 1b. Expand @derive attributes into synthetic impl blocks before
    // declaration collection sees them.
    metafunc::expand_derives(file, &mut diagnostics);

    // 2. Declaration collection (builds the top-level scope; duplicate
    // non-overloadable names fail with DuplicateSymbol).
    collect_declarations(
        &file.decls,
        &mut interner,
        &builtins,
        &mut symbols,
        &mut named_types,
        &mut diagnostics,
    );

    // 6. Interface/impl handling: register concrete methods per (I, T).
    for decl in &file.decls {
        if let Decl::Impl(imp) = decl {
            register_impl(imp, &mut interner, &named_types, &builtins, &mut impls, &mut diagnostics);
        }
    }
    check_missing_impls(&file.decls, &interner, &named_types, &builtins, &impls, &mut diagnostics);

    // 4-5, 7-9: type check each function body; expand metafunctions inside
    // it first so CTIE/lowering only ever sees ordinary expressions.
    for decl in &mut file.decls {
        if let Decl::Function(f) = decl {
            metafunc::expand_in_function(f, &interner, &builtins, &mut diagnostics);
        }
        if let Decl::Impl(imp) = decl {
            for m in &mut imp.methods {
                metafunc::expand_in_function(m, &interner, &builtins, &mut diagnostics);
            }
        }
    }
    for decl in &file.decls {
        match decl {
            Decl::Function(f) => {
                expr::check_function(f, &interner, &builtins, &symbols, &named_types, &mut diagnostics);
            }
            Decl::Impl(imp) => {
                for m in &imp.methods {
                    expr::check_function(m, &interner, &builtins, &symbols, &named_types, &mut diagnostics);
                }
            }
            Decl::Const(c) => {
                let expected = c.ty.as_ref().map(|t| resolve_type_readonly(&t.node, &named_types, &interner, &builtins));
                let _ = expr::infer_expr(&c.value, expected, &interner, &builtins, &symbols, &named_types, &mut diagnostics);
            }
            _ => {}
        }
    }

    AnalysisResult {
        interner,
        builtins,
        symbols,
        impls,
        diagnostics,
        named_types,
    }
}

fn collect_declarations(
    decls: &[Decl],
    interner: &mut TypeInterner,
    builtins: &Builtins,
    symbols: &mut SymbolTable,
    named_types: &mut HashMap<String, TypeId>,
    diagnostics: &mut Vec<Diagnostic>,
) {
// Pass A: register type names so forward references resolve.
    for decl in decls {
        match decl {
            Decl::Struct(s) => {
                let placeholder = interner.intern(TypeKind::Struct(Vec::new()));
                named_types.insert(s.name.node.clone(), placeholder);
            }
            Decl::Enum(e) => {
                let variants = e.variants.iter().map(|v| v.node.clone()).collect();
                let ty = interner.intern(TypeKind::Enum(variants));
                named_types.insert(e.name.node.clone(), ty);
            }
            Decl::Interface(i) => {
                let methods = i
                    .methods
                    .iter()
                    .map(|m| crate::types::InterfaceMethod {
                        name: m.name.node.clone(),
                        params: m
                            .params
                            .iter()
                            .map(|p| resolve_type(&p.ty.node, named_types, interner, builtins))
                            .collect(),
                        return_ty: m
                            .return_ty
                            .as_ref()
                            .map(|t| resolve_type(&t.node, named_types, interner, builtins))
                            .unwrap_or(builtins.void),
                    })
                    .collect();
                let ty = interner.intern(TypeKind::Interface(methods));
                named_types.insert(i.name.node.clone(), ty);
            }
            _ => {}
        }
    }
    // Pass A2: fill in struct field types now that all names resolve.
    for decl in decls {
        if let Decl::Struct(s) = decl {
            let fields: Vec<StructField> = s
                .fields
                .iter()
                .map(|f| StructField {
                    name: f.name.node.clone(),
                    ty: resolve_type(&f.ty.node, named_types, interner, builtins),
                })
                .collect();
            let ty = interner.intern(TypeKind::Struct(fields));
            named_types.insert(s.name.node.clone(), ty);
        }
    }

    // Pass B: register functions, consts, globals, type aliases.
    for decl in decls {
        match decl {
            Decl::Function(f) => declare_function(f, interner, builtins, symbols, named_types, diagnostics),
            Decl::Const(c) => {
                let ty = c
                    .ty
                    .as_ref()
                    .map(|t| resolve_type(&t.node, named_types, interner, builtins))
                    .unwrap_or(builtins.u8_);
                declare_unique(
                    symbols,
                    Symbol { kind: SymbolKind::Const, name: c.name.node.clone(), ty, span: c.span, overloads: Vec::new() },
                    diagnostics,
                );
            }
            Decl::GlobalVar(g) => {
                let ty = g
                    .ty
                    .as_ref()
                    .map(|t| resolve_type(&t.node, named_types, interner, builtins))
                    .unwrap_or(builtins.u8_);
                declare_unique(
                    symbols,
                    Symbol { kind: SymbolKind::Global, name: g.name.node.clone(), ty, span: g.span, overloads: Vec::new() },
                    diagnostics,
                );
            }
            Decl::TypeAlias(t) => {
                let ty = resolve_type(&t.target.node, named_types, interner, builtins);
                named_types.insert(t.name.node.clone(), ty);
            }
            _ => {}
        }
    }
}

fn declare_unique(symbols: &mut SymbolTable, sym: Symbol, diagnostics: &mut Vec<Diagnostic>) {
    let name = sym.name.clone();
    let span = sym.span;
    if let Some(prev) = symbols.declare(sym) {
        diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::DuplicateSymbol,
                format!("'{}' is already defined in this scope", name),
                span,
            )
            .with_note("previous definition here")
            .with_help("rename one of the two declarations, or remove the duplicate"),
        );
        // keep the first (prev) declaration, not the clobbering one
        symbols.declare(prev);
    }
}

fn declare_function(
    f: &FunctionDecl,
    interner: &mut TypeInterner,
    builtins: &Builtins,
    symbols: &mut SymbolTable,
    named_types: &HashMap<String, TypeId>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let param_types: Vec<TypeId> = f.params.iter().map(|p| resolve_type(&p.ty.node, named_types, interner, builtins)).collect();
    let return_ty = f
        .return_ty
        .as_ref()
        .map(|t| resolve_type(&t.node, named_types, interner, builtins))
        .unwrap_or(builtins.void);
    let mangled = overload::mangle(&f.name.node, &param_types, interner);
    let abi = crate::abi::policy_for(f, param_types.len());
    attr::validate_attributes(f, abi, diagnostics);

    let sig = FunctionSig {
        mangled,
        params: param_types,
        return_ty,
        abi,
        attributes: f.attributes.clone(),
        is_pub: f.is_pub,
        has_body: f.body.is_some(),
    };

    match symbols.lookup_mut(&f.name.node) {
        Some(existing) if existing.kind == SymbolKind::OverloadSet => {
            if overload::conflicts(&existing.overloads, &sig) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::DuplicateSymbol,
                    format!("'{}' already has an overload with these parameter types", f.name.node),
                    f.name.span,
                ));
            } else {
                existing.overloads.push(sig);
            }
        }
        Some(existing) => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::DuplicateSymbol,
                format!("'{}' is already defined in this scope", f.name.node),
                f.name.span,
            ));
            let _ = existing;
        }
        None => {
            symbols.declare(Symbol {
                kind: SymbolKind::OverloadSet,
                name: f.name.node.clone(),
                ty: builtins.error,
                span: f.name.span,
                overloads: vec![sig],
            });
        }
    }
}

fn register_impl(
    imp: &ImplBlock,
    interner: &mut TypeInterner,
    named_types: &HashMap<String, TypeId>,
    builtins: &Builtins,
    impls: &mut HashMap<ImplKey, HashMap<String, String>>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let target_ty = resolve_type(&imp.target.node, named_types, interner, builtins);
    let iface_name = match &imp.interface {
        Some(i) => i.node.clone(),
        None => String::new(), // inherent impl: no dispatch key needed
    };
    if iface_name.is_empty() {
        return;
    }
    let key = (iface_name.clone(), target_ty);
    let entry = impls.entry(key).or_default();
    for method in &imp.methods {
        let param_types: Vec<TypeId> = method.params.iter().map(|p| resolve_type(&p.ty.node, named_types, interner, builtins)).collect();
        let mangled = overload::mangle(&method.name.node, &param_types, interner);
        entry.insert(method.name.node.clone(), mangled);
    }
    let _ = diagnostics;
}

fn check_missing_impls(
    decls: &[Decl],
    interner: &TypeInterner,
    named_types: &HashMap<String, TypeId>,
    builtins: &Builtins,
    impls: &HashMap<ImplKey, HashMap<String, String>>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for decl in decls {
        if let Decl::Impl(imp) = decl {
            let Some(iface_name) = imp.interface.as_ref() else { continue };
            let Some(&iface_ty) = named_types.get(&iface_name.node) else { continue };
            let TypeKind::Interface(methods) = interner.get(iface_ty) else { continue };
            let target_ty = resolve_type_readonly(&imp.target.node, named_types, interner, builtins);
            let key = (iface_name.node.clone(), target_ty);
            let implemented = impls.get(&key).cloned().unwrap_or_default();
            for method in methods {
                if !implemented.contains_key(&method.name) {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::MissingImpl,
                        format!(
                            "'{}' does not implement '{}' required by interface '{}'",
                            interner.display(target_ty),
                            method.name,
                            iface_name.node
                        ),
                        imp.span,
                    ));
                }
            }
        }
    }
}

/// Resolve a syntactic `TypeExpr` to a canonical, interned `TypeId`.
/// Array/pointer element types are interned on demand, so this needs
/// mutable access to the interner.
pub fn resolve_type(
    ty: &TypeExpr,
    named_types: &HashMap<String, TypeId>,
    interner: &mut TypeInterner,
    builtins: &Builtins,
) -> TypeId {
    match ty {
        TypeExpr::Named(name) => match name.as_str() {
            "bool" => builtins.bool_,
            "u8" => builtins.u8_,
            "u16" => builtins.u16_,
            "u24" => builtins.u24_,
            "u32" => builtins.u32_,
            "i8" => builtins.i8_,
            "i16" => builtins.i16_,
            "i24" => builtins.i24_,
            "i32" => builtins.i32_,
            "void" => builtins.void,
            "string" => builtins.string,
            other => named_types.get(other).copied().unwrap_or(builtins.error),
        },
        TypeExpr::Array(elem, len) => {
            let elem_ty = resolve_type(elem, named_types, interner, builtins);
            interner.intern(TypeKind::Array(elem_ty, *len))
        }
        TypeExpr::Pointer(elem, is_mut) => {
            let elem_ty = resolve_type(elem, named_types, interner, builtins);
            interner.intern(TypeKind::Pointer(elem_ty, *is_mut))
        }
        TypeExpr::Function(params, ret) => {
            let param_tys = params.iter().map(|p| resolve_type(p, named_types, interner, builtins)).collect();
            let ret_ty = resolve_type(ret, named_types, interner, builtins);
            interner.intern(TypeKind::Function(param_tys, ret_ty, None))
        }
    }
}

/// Read-only counterpart of `resolve_type` for call sites (expression type
/// checking, post-collection impl validation) that only hold a shared
/// `&TypeInterner`. Composite types not already interned during collection
/// resolve to `Error` rather than panicking.
pub fn resolve_type_readonly(
    ty: &TypeExpr,
    named_types: &HashMap<String, TypeId>,
    interner: &TypeInterner,
    builtins: &Builtins,
) -> TypeId {
    match ty {
        TypeExpr::Named(name) => match name.as_str() {
            "bool" => builtins.bool_,
            "u8" => builtins.u8_,
            "u16" => builtins.u16_,
            "u24" => builtins.u24_,
            "u32" => builtins.u32_,
            "i8" => builtins.i8_,
            "i16" => builtins.i16_,
            "i24" => builtins.i24_,
            "i32" => builtins.i32_,
            "void" => builtins.void,
            "string" => builtins.string,
            other => named_types.get(other).copied().unwrap_or(builtins.error),
        },
        TypeExpr::Array(elem, len) => {
            let elem_ty = resolve_type_readonly(elem, named_types, interner, builtins);
            interner.find(&TypeKind::Array(elem_ty, *len)).unwrap_or(builtins.error)
        }
        TypeExpr::Pointer(elem, is_mut) => {
            let elem_ty = resolve_type_readonly(elem, named_types, interner, builtins);
            interner.find(&TypeKind::Pointer(elem_ty, *is_mut)).unwrap_or(builtins.error)
        }
        TypeExpr::Function(params, ret) => {
            let param_tys: Vec<TypeId> = params.iter().map(|p| resolve_type_readonly(p, named_types, interner, builtins)).collect();
            let ret_ty = resolve_type_readonly(ret, named_types, interner, builtins);
            interner.find(&TypeKind::Function(param_tys, ret_ty, None)).unwrap_or(builtins.error)
        }
    }
}
