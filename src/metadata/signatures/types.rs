use strum::FromRepr;

use crate::metadata::token::Token;

/// Element type constants of the signature encoding (ECMA-335 II.23.1.16)
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// Leading bytes of the non-method signature kinds
#[allow(non_snake_case, missing_docs)]
pub mod SIGNATURE_KIND {
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERICINST: u8 = 0x0A;
}

/// Flag bits of the method signature header byte
#[allow(non_snake_case, missing_docs)]
pub mod SIGNATURE_FLAGS {
    pub const HASTHIS: u8 = 0x20;
    pub const EXPLICITTHIS: u8 = 0x40;
    pub const CONVENTION_MASK: u8 = 0x1F;
}

/// Built-in types with a dedicated element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `void`, only valid as a return or pointer target
    Void,
    /// `bool`
    Boolean,
    /// `char`, UTF-16 code unit
    Char,
    /// `int8`
    I1,
    /// `unsigned int8`
    U1,
    /// `int16`
    I2,
    /// `unsigned int16`
    U2,
    /// `int32`
    I4,
    /// `unsigned int32`
    U4,
    /// `int64`
    I8,
    /// `unsigned int64`
    U8,
    /// `float32`
    R4,
    /// `float64`
    R8,
    /// `native int`
    I,
    /// `native unsigned int`
    U,
    /// `System.String`
    String,
    /// `System.Object`
    Object,
    /// `System.TypedReference`
    TypedByRef,
}

impl PrimitiveType {
    /// The primitive for `element_type`, if it has one
    #[must_use]
    pub fn from_element_type(element_type: u8) -> Option<PrimitiveType> {
        Some(match element_type {
            ELEMENT_TYPE::VOID => PrimitiveType::Void,
            ELEMENT_TYPE::BOOLEAN => PrimitiveType::Boolean,
            ELEMENT_TYPE::CHAR => PrimitiveType::Char,
            ELEMENT_TYPE::I1 => PrimitiveType::I1,
            ELEMENT_TYPE::U1 => PrimitiveType::U1,
            ELEMENT_TYPE::I2 => PrimitiveType::I2,
            ELEMENT_TYPE::U2 => PrimitiveType::U2,
            ELEMENT_TYPE::I4 => PrimitiveType::I4,
            ELEMENT_TYPE::U4 => PrimitiveType::U4,
            ELEMENT_TYPE::I8 => PrimitiveType::I8,
            ELEMENT_TYPE::U8 => PrimitiveType::U8,
            ELEMENT_TYPE::R4 => PrimitiveType::R4,
            ELEMENT_TYPE::R8 => PrimitiveType::R8,
            ELEMENT_TYPE::I => PrimitiveType::I,
            ELEMENT_TYPE::U => PrimitiveType::U,
            ELEMENT_TYPE::STRING => PrimitiveType::String,
            ELEMENT_TYPE::OBJECT => PrimitiveType::Object,
            ELEMENT_TYPE::TYPEDBYREF => PrimitiveType::TypedByRef,
            _ => return None,
        })
    }
}

/// Whether a generic parameter belongs to a type (`!n`) or a method (`!!n`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericParameterKind {
    /// `VAR`, declared by the enclosing type
    Type,
    /// `MVAR`, declared by the method
    Method,
}

/// A `!n` or `!!n` reference, resolved against the scope it was decoded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericParameterRef {
    /// Type or method parameter
    pub kind: GenericParameterKind,
    /// Position within the owner's parameter list
    pub number: u32,
    /// The `GenericParam` row, `None` when decoded in an open scope
    pub param: Option<Token>,
}

/// Custom modifier flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// `modopt`
    Optional,
    /// `modreq`
    Required,
}

/// One dimension of a general array.
///
/// Bounds are inclusive. A dimension without a declared size has no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArrayDimension {
    /// Lowest valid index
    pub lower_bound: Option<i32>,
    /// Highest valid index
    pub upper_bound: Option<i32>,
}

/// A decoded type (ECMA-335 II.23.2.12)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpression {
    /// Built-in type
    Primitive(PrimitiveType),
    /// `class` or `valuetype` reference to a `TypeDef`, `TypeRef` or `TypeSpec`
    ClassOrValueType {
        /// The referenced type
        token: Token,
        /// `valuetype` instead of `class`
        is_value_type: bool,
    },
    /// General array, `dimensions.len()` is the rank
    Array {
        /// Element type
        base: Box<TypeExpression>,
        /// One entry per dimension
        dimensions: Vec<ArrayDimension>,
    },
    /// Single dimensional, zero based array
    Vector(Box<TypeExpression>),
    /// Instantiation of a generic class or value type
    GenericInstance {
        /// The generic type definition, always a [`TypeExpression::ClassOrValueType`]
        base: Box<TypeExpression>,
        /// Type arguments
        arguments: Vec<TypeExpression>,
    },
    /// `!n` or `!!n`
    GenericParameter(GenericParameterRef),
    /// Unmanaged pointer
    Pointer(Box<TypeExpression>),
    /// Managed reference
    ByRef(Box<TypeExpression>),
    /// Pinned local
    Pinned(Box<TypeExpression>),
    /// Type carrying a custom modifier
    Modified {
        /// `modopt` or `modreq`
        kind: ModifierKind,
        /// The modifier type
        modifier: Token,
        /// The modified type
        base: Box<TypeExpression>,
    },
    /// Function pointer
    FunctionPointer(Box<MethodSignature>),
}

impl TypeExpression {
    /// The type with every custom modifier stripped
    #[must_use]
    pub fn unmodified(&self) -> &TypeExpression {
        let mut current = self;
        while let TypeExpression::Modified { base, .. } = current {
            current = base;
        }
        current
    }

    /// Returns true for `void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(
            self.unmodified(),
            TypeExpression::Primitive(PrimitiveType::Void)
        )
    }
}

/// Calling convention of a method signature, the low five bits of its header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum CallingConvention {
    /// Managed default
    Default = 0x00,
    /// Unmanaged `cdecl`
    C = 0x01,
    /// Unmanaged `stdcall`
    StdCall = 0x02,
    /// Unmanaged `thiscall`
    ThisCall = 0x03,
    /// Unmanaged `fastcall`
    FastCall = 0x04,
    /// Managed with a variable argument list
    VarArg = 0x05,
    /// Unmanaged, convention encoded in modifiers
    Unmanaged = 0x09,
    /// Managed with generic parameters
    Generic = 0x10,
}

/// `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig` (ECMA-335 II.23.2.1-3)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Instance method
    pub has_this: bool,
    /// `this` is passed as the first explicit parameter
    pub explicit_this: bool,
    /// Calling convention
    pub calling_convention: CallingConvention,
    /// Number of method generic parameters
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeExpression,
    /// Fixed parameters
    pub params: Vec<TypeExpression>,
    /// Parameters after the `SENTINEL` of a vararg call site
    pub varargs: Vec<TypeExpression>,
}

/// `FieldSig` (ECMA-335 II.23.2.4)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSignature {
    /// Field type
    pub ty: TypeExpression,
}

/// `PropertySig` (ECMA-335 II.23.2.5)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertySignature {
    /// Instance property
    pub has_this: bool,
    /// Property type
    pub ty: TypeExpression,
    /// Indexer parameters
    pub params: Vec<TypeExpression>,
}

/// `LocalVarSig` (ECMA-335 II.23.2.6)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVariables {
    /// Local types, in slot order
    pub locals: Vec<TypeExpression>,
}

/// `MethodSpec` instantiation (ECMA-335 II.23.2.15)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSpecSignature {
    /// Method type arguments
    pub arguments: Vec<TypeExpression>,
}
