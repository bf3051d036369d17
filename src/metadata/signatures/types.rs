use crate::metadata::{signatures::CustomModifiers, token::Token};

#[allow(non_snake_case, missing_docs)]
/// Element type tags (ECMA-335 II.23.1.16)
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
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by custom modifiers and type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDefOrRefOrSpecEncoded
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDefOrRefOrSpecEncoded
    pub const CLASS: u8 = 0x12;
    // Generic parameter of the enclosing type, by number
    pub const VAR: u8 = 0x13;
    // type rank sizes-count size* lo-count lo*
    pub const ARRAY: u8 = 0x14;
    // (CLASS | VALUETYPE) type arg-count arg*
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    // Followed by a method signature
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    // Followed by custom modifiers and type
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter of the enclosing method, by number
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    // Start of the vararg part of a call site
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

#[allow(non_snake_case, missing_docs)]
/// Signature header bytes (ECMA-335 II.23.2.1 - II.23.2.6, II.23.2.15)
pub mod SIGNATURE_HEADER {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERIC_INST: u8 = 0x0a;
    pub const CALLING_CONVENTION_MASK: u8 = 0x0f;
    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const EXPLICIT_THIS: u8 = 0x40;
}

/// A type in a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeSignature {
    /// Placeholder of a default-constructed signature; never read, refused by the encoder
    #[default]
    Unknown,
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// int8
    I1,
    /// uint8
    U1,
    /// int16
    I2,
    /// uint16
    U2,
    /// int32
    I4,
    /// uint32
    U4,
    /// int64
    I8,
    /// uint64
    U8,
    /// float32
    R4,
    /// float64
    R8,
    /// System.String
    String,
    /// Unmanaged pointer
    Ptr(SignaturePointer),
    /// Managed reference
    ByRef(Box<TypeSignature>),
    /// Value type, `TypeDefOrRefOrSpecEncoded`
    ValueType(Token),
    /// Reference type, `TypeDefOrRefOrSpecEncoded`
    Class(Token),
    /// Generic parameter of the enclosing type
    GenericParamType(u32),
    /// General array
    Array(SignatureArray),
    /// Generic instantiation and its arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// System.TypedReference
    TypedByRef,
    /// native int
    I,
    /// native unsigned int
    U,
    /// Function pointer
    FnPtr(Box<SignatureMethod>),
    /// System.Object
    Object,
    /// Single-dimensional, zero-based array
    SzArray(SignatureSzArray),
    /// Generic parameter of the enclosing method
    GenericParamMethod(u32),
    /// A type preceded by custom modifiers in a position that has no modifier slot of its own,
    /// such as a generic argument
    Modified(CustomModifiers, Box<TypeSignature>),
}

impl TypeSignature {
    /// `true` for the built-in primitive types, `string` and `object` excluded
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSignature::Boolean
                | TypeSignature::Char
                | TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::R4
                | TypeSignature::R8
                | TypeSignature::I
                | TypeSignature::U
        )
    }

    /// The type with any outer modifier wrapper removed
    #[must_use]
    pub fn unmodified(&self) -> &TypeSignature {
        match self {
            TypeSignature::Modified(_, inner) => inner.unmodified(),
            other => other,
        }
    }

    /// The token of a `Class` or `ValueType`, or of the generic type of an instantiation
    #[must_use]
    pub fn type_token(&self) -> Option<Token> {
        match self.unmodified() {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => Some(*token),
            TypeSignature::GenericInst(base, _) => base.type_token(),
            _ => None,
        }
    }
}

/// A general array shape: rank, then sizes and lower bounds for a prefix of the dimensions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureArray {
    /// Element type
    pub base: Box<TypeSignature>,
    /// Number of dimensions
    pub rank: u32,
    /// Sizes of the first `sizes.len()` dimensions
    pub sizes: Vec<u32>,
    /// Lower bounds of the first `lower_bounds.len()` dimensions
    pub lower_bounds: Vec<i32>,
}

/// A single-dimensional, zero-based array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureSzArray {
    /// Custom modifiers of the element type
    pub modifiers: CustomModifiers,
    /// Element type
    pub base: Box<TypeSignature>,
}

/// An unmanaged pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignaturePointer {
    /// Custom modifiers of the pointee
    pub modifiers: CustomModifiers,
    /// Pointee
    pub base: Box<TypeSignature>,
}

/// A parameter or return type (II.23.2.10, II.23.2.11)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureParameter {
    /// Custom modifiers
    pub modifiers: CustomModifiers,
    /// Passed by reference
    pub by_ref: bool,
    /// The type
    pub base: TypeSignature,
}

impl SignatureParameter {
    /// A plain parameter of type `base`
    #[must_use]
    pub fn new(base: TypeSignature) -> Self {
        SignatureParameter {
            modifiers: CustomModifiers::new(),
            by_ref: false,
            base,
        }
    }
}

/// Calling convention of a method signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CallingConvention {
    /// Managed
    #[default]
    Default = 0,
    /// Unmanaged cdecl
    C = 1,
    /// Unmanaged stdcall
    StdCall = 2,
    /// Unmanaged thiscall
    ThisCall = 3,
    /// Unmanaged fastcall
    FastCall = 4,
    /// Managed with a variable argument list
    VarArg = 5,
}

impl CallingConvention {
    /// Map the low nibble of a signature header
    #[must_use]
    pub fn from_header(header: u8) -> Option<Self> {
        match header & 0x0F {
            0 => Some(CallingConvention::Default),
            1 => Some(CallingConvention::C),
            2 => Some(CallingConvention::StdCall),
            3 => Some(CallingConvention::ThisCall),
            4 => Some(CallingConvention::FastCall),
            5 => Some(CallingConvention::VarArg),
            _ => None,
        }
    }
}

/// A method signature (II.23.2.1 - II.23.2.3)
///
/// Covers definitions, references and stand-alone call-site signatures. For a vararg call site
/// the arguments after the sentinel land in `varargs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureMethod {
    /// Instance method
    pub has_this: bool,
    /// The `this` pointer is the first explicit parameter
    pub explicit_this: bool,
    /// Calling convention
    pub calling_convention: CallingConvention,
    /// Number of generic parameters, 0 for a non-generic method
    pub generic_param_count: u32,
    /// The return type
    pub return_type: SignatureParameter,
    /// Fixed parameters
    pub params: Vec<SignatureParameter>,
    /// Arguments after the sentinel
    pub varargs: Vec<SignatureParameter>,
}

impl SignatureMethod {
    /// A static, managed method
    #[must_use]
    pub fn new(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        SignatureMethod {
            return_type: SignatureParameter::new(return_type),
            params: params.into_iter().map(SignatureParameter::new).collect(),
            ..SignatureMethod::default()
        }
    }

    /// The same signature as an instance method
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }
}

/// A field signature (II.23.2.4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureField {
    /// Custom modifiers
    pub modifiers: CustomModifiers,
    /// Field type
    pub base: TypeSignature,
}

/// A property signature (II.23.2.5)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureProperty {
    /// Instance property
    pub has_this: bool,
    /// Custom modifiers of the property type
    pub modifiers: CustomModifiers,
    /// Property type
    pub base: TypeSignature,
    /// Indexer parameters
    pub params: Vec<SignatureParameter>,
}

/// A local variable signature (II.23.2.6)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureLocalVariables {
    /// The locals, in slot order
    pub locals: Vec<SignatureLocalVariable>,
}

/// One local variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureLocalVariable {
    /// Custom modifiers
    pub modifiers: CustomModifiers,
    /// Pinned for the garbage collector
    pub is_pinned: bool,
    /// Managed reference
    pub is_byref: bool,
    /// The type; `TypedByRef` stands alone
    pub base: TypeSignature,
}

/// A type specification signature (II.23.2.14)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureTypeSpec {
    /// The type
    pub base: TypeSignature,
}

/// A method instantiation (II.23.2.15)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureMethodSpec {
    /// Generic arguments
    pub generic_args: Vec<TypeSignature>,
}

/// The contents of a `StandAloneSig` row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StandAloneSignature {
    /// Method body locals
    LocalVariables(SignatureLocalVariables),
    /// A `calli` call site
    Method(SignatureMethod),
    /// A field signature, emitted by some compilers for constants in debug builds
    Field(SignatureField),
}
