//! The `Type` data model: tagged variants, interned for identity
//! comparison. `TypeId` is a small `Copy` handle into a `TypeInterner`; two
//! types are identical iff their ids are equal, so the semantic analyzer
//! never needs structural comparison once a type has been interned.

use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// ABI register mapping parsed from an `@abi("register: A=x, HL=y")` attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbiSpec {
    pub raw: String,
    pub mapping: Vec<(String, String)>, // register -> param/slot name
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitsField {
    pub name: String,
    pub width: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
    pub name: String,
    pub params: Vec<TypeId>,
    pub return_ty: TypeId,
}

/// A canonical, interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    IntU8,
    IntU16,
    IntU24,
    IntU32,
    IntI8,
    IntI16,
    IntI24,
    IntI32,
    /// Fixed-point Q8.8 (8 integer bits, 8 fractional bits), etc.
    F8_8,
    F_8,
    F_16,
    F16_8,
    F8_16,
    Void,
    Array(TypeId, u64),
    Pointer(TypeId, bool), // bool = mutable
    Struct(Vec<StructField>),
    Enum(Vec<String>),
    /// Sum of field widths must be ≤ the backing integer width.
    Bits(Vec<BitsField>),
    Function(Vec<TypeId>, TypeId, Option<AbiSpec>),
    Interface(Vec<InterfaceMethod>),
    /// Length-prefixed string.
    String,
    /// Only present during inference; never reaches MIR.
    TypeVar(u32),
    /// Post-error sentinel: poisons downstream diagnostics, no cascades.
    Error,
}

impl TypeKind {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeKind::IntU8
                | TypeKind::IntU16
                | TypeKind::IntU24
                | TypeKind::IntU32
                | TypeKind::IntI8
                | TypeKind::IntI16
                | TypeKind::IntI24
                | TypeKind::IntI32
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            TypeKind::IntI8 | TypeKind::IntI16 | TypeKind::IntI24 | TypeKind::IntI32
        )
    }

    /// Bit width of an integer type, used by the backend to choose 8-bit vs
    /// 16-bit instruction forms and by overload scoring.
    pub fn int_width(&self) -> Option<u32> {
        Some(match self {
            TypeKind::IntU8 | TypeKind::IntI8 => 8,
            TypeKind::IntU16 | TypeKind::IntI16 => 16,
            TypeKind::IntU24 | TypeKind::IntI24 => 24,
            TypeKind::IntU32 | TypeKind::IntI32 => 32,
            _ => return None,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeKind::Error)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::IntU8 => write!(f, "u8"),
            TypeKind::IntU16 => write!(f, "u16"),
            TypeKind::IntU24 => write!(f, "u24"),
            TypeKind::IntU32 => write!(f, "u32"),
            TypeKind::IntI8 => write!(f, "i8"),
            TypeKind::IntI16 => write!(f, "i16"),
            TypeKind::IntI24 => write!(f, "i24"),
            TypeKind::IntI32 => write!(f, "i32"),
            TypeKind::F8_8 => write!(f, "f8.8"),
            TypeKind::F_8 => write!(f, "f.8"),
            TypeKind::F_16 => write!(f, "f.16"),
            TypeKind::F16_8 => write!(f, "f16.8"),
            TypeKind::F8_16 => write!(f, "f8.16"),
            TypeKind::Void => write!(f, "void"),
            TypeKind::Array(_, n) => write!(f, "[{}]_", n),
            TypeKind::Pointer(_, true) => write!(f, "*mut _"),
            TypeKind::Pointer(_, false) => write!(f, "*_"),
            TypeKind::Struct(fields) => write!(f, "struct{{{} fields}}", fields.len()),
            TypeKind::Enum(vars) => write!(f, "enum{{{} variants}}", vars.len()),
            TypeKind::Bits(fields) => write!(f, "bits{{{} fields}}", fields.len()),
            TypeKind::Function(..) => write!(f, "fn(..)"),
            TypeKind::Interface(_) => write!(f, "interface"),
            TypeKind::String => write!(f, "string"),
            TypeKind::TypeVar(n) => write!(f, "?{}", n),
            TypeKind::Error => write!(f, "<error>"),
        }
    }
}

/// Interning arena. Built once per compilation and shared read-only after
/// construction.
pub struct TypeInterner {
    kinds: Vec<TypeKind>,
    index: HashMap<TypeKind, TypeId>,
    builtins: Builtins,
}

#[derive(Clone, Copy)]
pub struct Builtins {
    pub bool_: TypeId,
    pub u8_: TypeId,
    pub u16_: TypeId,
    pub u24_: TypeId,
    pub u32_: TypeId,
    pub i8_: TypeId,
    pub i16_: TypeId,
    pub i24_: TypeId,
    pub i32_: TypeId,
    pub void: TypeId,
    pub string: TypeId,
    pub error: TypeId,
}

impl TypeInterner {
    pub fn new() -> Self {
        let mut me = Self {
            kinds: Vec::new(),
            index: HashMap::new(),
            builtins: Builtins {
                bool_: TypeId(0),
                u8_: TypeId(0),
                u16_: TypeId(0),
                u24_: TypeId(0),
                u32_: TypeId(0),
                i8_: TypeId(0),
                i16_: TypeId(0),
                i24_: TypeId(0),
                i32_: TypeId(0),
                void: TypeId(0),
                string: TypeId(0),
                error: TypeId(0),
            },
        };
        let bool_ = me.intern(TypeKind::Bool);
        let u8_ = me.intern(TypeKind::IntU8);
        let u16_ = me.intern(TypeKind::IntU16);
        let u24_ = me.intern(TypeKind::IntU24);
        let u32_ = me.intern(TypeKind::IntU32);
        let i8_ = me.intern(TypeKind::IntI8);
        let i16_ = me.intern(TypeKind::IntI16);
        let i24_ = me.intern(TypeKind::IntI24);
        let i32_ = me.intern(TypeKind::IntI32);
        let void = me.intern(TypeKind::Void);
        let string = me.intern(TypeKind::String);
        let error = me.intern(TypeKind::Error);
        me.builtins = Builtins {
            bool_,
            u8_,
            u16_,
            u24_,
            u32_,
            i8_,
            i16_,
            i24_,
            i32_,
            void,
            string,
            error,
        };
        me
    }

    pub fn builtins(&self) -> Builtins {
        self.builtins
    }

    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(id) = self.index.get(&kind) {
            return *id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.index.insert(kind, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    /// Look up an already-interned kind without creating a new entry; used
    /// by read-only type resolution (e.g. inside an already-frozen symbol
    /// table) where a missing composite type means "not resolvable here",
    /// not "intern it now."
    pub fn find(&self, kind: &TypeKind) -> Option<TypeId> {
        self.index.get(kind).copied()
    }

    pub fn display(&self, id: TypeId) -> String {
        self.get(id).to_string()
    }

/// Mangled type suffix used in overload-set name mangling, e.g.
    /// `f$u8$u16`.
    pub fn mangle(&self, id: TypeId) -> String {
        self.get(id).to_string().replace(['[', ']', '{', '}', ' ', ','], "_")
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_kinds_intern_to_the_same_id() {
        let mut t = TypeInterner::new();
        let a = t.intern(TypeKind::Array(t.builtins().u8_, 4));
        let b = t.intern(TypeKind::Array(t.builtins().u8_, 4));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_kinds_intern_to_distinct_ids() {
        let mut t = TypeInterner::new();
        assert_ne!(t.builtins().u8_, t.builtins().u16_);
    }

    #[test]
    fn int_width_and_signedness() {
        assert_eq!(TypeKind::IntU8.int_width(), Some(8));
        assert_eq!(TypeKind::IntI32.int_width(), Some(32));
        assert!(TypeKind::IntI8.is_signed());
        assert!(!TypeKind::IntU8.is_signed());
        assert_eq!(TypeKind::Bool.int_width(), None);
    }
}
