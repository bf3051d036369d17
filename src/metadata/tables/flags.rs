//! Attribute flag sets stored in the `Flags` columns (ECMA-335 II.23.1).
//!
//! Flags with multi-bit fields (visibility, layout, access) are plain constants with a mask, the
//! way they are combined in the format. Pure bit sets use `bitflags`.
#![allow(non_snake_case)]

use bitflags::bitflags;

/// `TypeDef.Flags`
pub mod TypeAttributes {
    /// Mask for the visibility bits
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Not visible outside the assembly
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    /// Visible outside the assembly
    pub const PUBLIC: u32 = 0x0000_0001;
    /// Nested, public
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    /// Nested, private
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    /// Nested, family
    pub const NESTED_FAMILY: u32 = 0x0000_0004;
    /// Nested, assembly
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;
    /// Nested, family and assembly
    pub const NESTED_FAM_AND_ASSEM: u32 = 0x0000_0006;
    /// Nested, family or assembly
    pub const NESTED_FAM_OR_ASSEM: u32 = 0x0000_0007;
    /// Mask for the layout bits
    pub const LAYOUT_MASK: u32 = 0x0000_0018;
    /// Fields laid out by the runtime
    pub const AUTO_LAYOUT: u32 = 0x0000_0000;
    /// Fields laid out in declaration order
    pub const SEQUENTIAL_LAYOUT: u32 = 0x0000_0008;
    /// Field offsets given explicitly
    pub const EXPLICIT_LAYOUT: u32 = 0x0000_0010;
    /// Interface, not a class
    pub const INTERFACE: u32 = 0x0000_0020;
    /// Cannot be instantiated
    pub const ABSTRACT: u32 = 0x0000_0080;
    /// Cannot be derived from
    pub const SEALED: u32 = 0x0000_0100;
    /// Name is special
    pub const SPECIAL_NAME: u32 = 0x0000_0400;
    /// Imported
    pub const IMPORT: u32 = 0x0000_1000;
    /// Serializable
    pub const SERIALIZABLE: u32 = 0x0000_2000;
    /// Mask for the string format bits
    pub const STRING_FORMAT_MASK: u32 = 0x0003_0000;
    /// LPSTR is ANSI
    pub const ANSI_CLASS: u32 = 0x0000_0000;
    /// LPSTR is UNICODE
    pub const UNICODE_CLASS: u32 = 0x0001_0000;
    /// LPSTR is chosen automatically
    pub const AUTO_CLASS: u32 = 0x0002_0000;
    /// Initialize before first static field access
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
    /// Runtime checks the name encoding
    pub const RT_SPECIAL_NAME: u32 = 0x0000_0800;
    /// Has security attributes
    pub const HAS_SECURITY: u32 = 0x0004_0000;
}

/// `Field.Flags`
pub mod FieldAttributes {
    /// Mask for the access bits
    pub const FIELD_ACCESS_MASK: u32 = 0x0007;
    /// Not referenceable
    pub const COMPILER_CONTROLLED: u32 = 0x0000;
    /// Accessible only by the parent type
    pub const PRIVATE: u32 = 0x0001;
    /// Accessible by sub-types in this assembly
    pub const FAM_AND_ASSEM: u32 = 0x0002;
    /// Accessible in this assembly
    pub const ASSEMBLY: u32 = 0x0003;
    /// Accessible by the type and sub-types
    pub const FAMILY: u32 = 0x0004;
    /// Accessible by sub-types and in this assembly
    pub const FAM_OR_ASSEM: u32 = 0x0005;
    /// Accessible by anyone
    pub const PUBLIC: u32 = 0x0006;
    /// Static field
    pub const STATIC: u32 = 0x0010;
    /// Set only during initialization
    pub const INIT_ONLY: u32 = 0x0020;
    /// Compile-time constant
    pub const LITERAL: u32 = 0x0040;
    /// Not serialized
    pub const NOT_SERIALIZED: u32 = 0x0080;
    /// Name is special
    pub const SPECIAL_NAME: u32 = 0x0200;
    /// Implemented via P/Invoke
    pub const PINVOKE_IMPL: u32 = 0x2000;
    /// Runtime checks the name encoding
    pub const RT_SPECIAL_NAME: u32 = 0x0400;
    /// Has a `FieldMarshal` row
    pub const HAS_FIELD_MARSHAL: u32 = 0x1000;
    /// Has a `Constant` row
    pub const HAS_DEFAULT: u32 = 0x8000;
    /// Has a `FieldRVA` row
    pub const HAS_FIELD_RVA: u32 = 0x0100;
}

/// `MethodDef.Flags`
pub mod MethodAttributes {
    /// Mask for the access bits
    pub const MEMBER_ACCESS_MASK: u32 = 0x0007;
    /// Accessible only by the parent type
    pub const PRIVATE: u32 = 0x0001;
    /// Accessible in this assembly
    pub const ASSEM: u32 = 0x0003;
    /// Accessible by the type and sub-types
    pub const FAMILY: u32 = 0x0004;
    /// Accessible by anyone
    pub const PUBLIC: u32 = 0x0006;
    /// Defined on the type, not per instance
    pub const STATIC: u32 = 0x0010;
    /// Cannot be overridden
    pub const FINAL: u32 = 0x0020;
    /// Virtual
    pub const VIRTUAL: u32 = 0x0040;
    /// Hides by name and signature
    pub const HIDE_BY_SIG: u32 = 0x0080;
    /// Always gets a new vtable slot
    pub const NEW_SLOT: u32 = 0x0100;
    /// Does not provide an implementation
    pub const ABSTRACT: u32 = 0x0400;
    /// Name is special
    pub const SPECIAL_NAME: u32 = 0x0800;
    /// Runtime checks the name encoding
    pub const RT_SPECIAL_NAME: u32 = 0x1000;
    /// Implemented via P/Invoke
    pub const PINVOKE_IMPL: u32 = 0x2000;
}

bitflags! {
    /// `MethodDef.ImplFlags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodImplAttributes: u16 {
        /// Native code
        const NATIVE = 0x0001;
        /// OPTIL code
        const OPTIL = 0x0002;
        /// Unmanaged
        const UNMANAGED = 0x0004;
        /// Never inlined
        const NO_INLINING = 0x0008;
        /// Forward reference
        const FORWARD_REF = 0x0010;
        /// Single-threaded body
        const SYNCHRONIZED = 0x0020;
        /// Not optimized
        const NO_OPTIMIZATION = 0x0040;
        /// Signature is exported exactly
        const PRESERVE_SIG = 0x0080;
        /// Implemented by the runtime
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    /// `Param.Flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamAttributes: u16 {
        /// Input parameter
        const IN = 0x0001;
        /// Output parameter
        const OUT = 0x0002;
        /// Optional parameter
        const OPTIONAL = 0x0010;
        /// Has a `Constant` row
        const HAS_DEFAULT = 0x1000;
        /// Has a `FieldMarshal` row
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

bitflags! {
    /// `Property.Flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime checks the name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Has a `Constant` row
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    /// `Event.EventFlags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime checks the name encoding
        const RT_SPECIAL_NAME = 0x0400;
    }
}

bitflags! {
    /// `MethodSemantics.Semantics`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodSemanticsAttributes: u16 {
        /// Property setter
        const SETTER = 0x0001;
        /// Property getter
        const GETTER = 0x0002;
        /// Other accessor
        const OTHER = 0x0004;
        /// Event add
        const ADD_ON = 0x0008;
        /// Event remove
        const REMOVE_ON = 0x0010;
        /// Event raise
        const FIRE = 0x0020;
    }
}

bitflags! {
    /// `GenericParam.Flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GenericParamAttributes: u16 {
        /// Covariant
        const COVARIANT = 0x0001;
        /// Contravariant
        const CONTRAVARIANT = 0x0002;
        /// Must be a reference type
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// Must be a non-nullable value type
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// Must have a public default constructor
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}
