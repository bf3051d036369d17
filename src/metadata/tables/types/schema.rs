//! Column layout of every metadata table.
//!
//! The layouts follow ECMA-335 II.22 and the Portable PDB specification. Each column is described by
//! a [`ColumnKind`]; the byte width of heap, table and coded-index columns is only known once a
//! [`crate::metadata::tables::TableInfo`] exists.
//!
//! Tables that the format requires to be sorted carry a [`SortKey`]. Readers use it for binary
//! search, builders sort by it before freezing.
//!
//! The submodules (`typedef`, `methoddef`, ...) name column positions for the tables this crate
//! accesses by column.

use crate::metadata::tables::{CodedIndexType, TableId};

/// What a table column holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Fixed 1-byte value
    U8,
    /// Fixed 2-byte value
    U16,
    /// Fixed 4-byte value
    U32,
    /// Offset into `#Strings`
    String,
    /// 1-based index into `#GUID`
    Guid,
    /// Offset into `#Blob`
    Blob,
    /// 1-based row index into a single table
    Table(TableId),
    /// Coded index into one of several tables
    Coded(CodedIndexType),
}

impl ColumnKind {
    /// `true` if the column references a table row
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, ColumnKind::Table(_) | ColumnKind::Coded(_))
    }
}

/// A named column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    /// Column name as used in ECMA-335
    pub name: &'static str,
    /// Column content
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

/// The columns a sorted table is ordered by: a primary key and an optional secondary key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    /// Primary key column
    pub primary: usize,
    /// Column that breaks ties on the primary key
    pub secondary: Option<usize>,
}

use ColumnKind::{Blob, Coded, Guid, String as Str, Table, U16, U32, U8};

static MODULE: [Column; 5] = [
    col("Generation", U16),
    col("Name", Str),
    col("Mvid", Guid),
    col("EncId", Guid),
    col("EncBaseId", Guid),
];

static TYPE_REF: [Column; 3] = [
    col("ResolutionScope", Coded(CodedIndexType::ResolutionScope)),
    col("TypeName", Str),
    col("TypeNamespace", Str),
];

static TYPE_DEF: [Column; 6] = [
    col("Flags", U32),
    col("TypeName", Str),
    col("TypeNamespace", Str),
    col("Extends", Coded(CodedIndexType::TypeDefOrRef)),
    col("FieldList", Table(TableId::Field)),
    col("MethodList", Table(TableId::MethodDef)),
];

static FIELD_PTR: [Column; 1] = [col("Field", Table(TableId::Field))];

static FIELD: [Column; 3] = [col("Flags", U16), col("Name", Str), col("Signature", Blob)];

static METHOD_PTR: [Column; 1] = [col("Method", Table(TableId::MethodDef))];

static METHOD_DEF: [Column; 6] = [
    col("RVA", U32),
    col("ImplFlags", U16),
    col("Flags", U16),
    col("Name", Str),
    col("Signature", Blob),
    col("ParamList", Table(TableId::Param)),
];

static PARAM_PTR: [Column; 1] = [col("Param", Table(TableId::Param))];

static PARAM: [Column; 3] = [col("Flags", U16), col("Sequence", U16), col("Name", Str)];

static INTERFACE_IMPL: [Column; 2] = [
    col("Class", Table(TableId::TypeDef)),
    col("Interface", Coded(CodedIndexType::TypeDefOrRef)),
];

static MEMBER_REF: [Column; 3] = [
    col("Class", Coded(CodedIndexType::MemberRefParent)),
    col("Name", Str),
    col("Signature", Blob),
];

static CONSTANT: [Column; 4] = [
    col("Type", U8),
    col("Padding", U8),
    col("Parent", Coded(CodedIndexType::HasConstant)),
    col("Value", Blob),
];

static CUSTOM_ATTRIBUTE: [Column; 3] = [
    col("Parent", Coded(CodedIndexType::HasCustomAttribute)),
    col("Type", Coded(CodedIndexType::CustomAttributeType)),
    col("Value", Blob),
];

static FIELD_MARSHAL: [Column; 2] = [
    col("Parent", Coded(CodedIndexType::HasFieldMarshal)),
    col("NativeType", Blob),
];

static DECL_SECURITY: [Column; 3] = [
    col("Action", U16),
    col("Parent", Coded(CodedIndexType::HasDeclSecurity)),
    col("PermissionSet", Blob),
];

static CLASS_LAYOUT: [Column; 3] = [
    col("PackingSize", U16),
    col("ClassSize", U32),
    col("Parent", Table(TableId::TypeDef)),
];

static FIELD_LAYOUT: [Column; 2] = [col("Offset", U32), col("Field", Table(TableId::Field))];

static STAND_ALONE_SIG: [Column; 1] = [col("Signature", Blob)];

static EVENT_MAP: [Column; 2] = [
    col("Parent", Table(TableId::TypeDef)),
    col("EventList", Table(TableId::Event)),
];

static EVENT_PTR: [Column; 1] = [col("Event", Table(TableId::Event))];

static EVENT: [Column; 3] = [
    col("EventFlags", U16),
    col("Name", Str),
    col("EventType", Coded(CodedIndexType::TypeDefOrRef)),
];

static PROPERTY_MAP: [Column; 2] = [
    col("Parent", Table(TableId::TypeDef)),
    col("PropertyList", Table(TableId::Property)),
];

static PROPERTY_PTR: [Column; 1] = [col("Property", Table(TableId::Property))];

static PROPERTY: [Column; 3] = [col("Flags", U16), col("Name", Str), col("Type", Blob)];

static METHOD_SEMANTICS: [Column; 3] = [
    col("Semantics", U16),
    col("Method", Table(TableId::MethodDef)),
    col("Association", Coded(CodedIndexType::HasSemantics)),
];

static METHOD_IMPL: [Column; 3] = [
    col("Class", Table(TableId::TypeDef)),
    col("MethodBody", Coded(CodedIndexType::MethodDefOrRef)),
    col("MethodDeclaration", Coded(CodedIndexType::MethodDefOrRef)),
];

static MODULE_REF: [Column; 1] = [col("Name", Str)];

static TYPE_SPEC: [Column; 1] = [col("Signature", Blob)];

static IMPL_MAP: [Column; 4] = [
    col("MappingFlags", U16),
    col("MemberForwarded", Coded(CodedIndexType::MemberForwarded)),
    col("ImportName", Str),
    col("ImportScope", Table(TableId::ModuleRef)),
];

static FIELD_RVA: [Column; 2] = [col("RVA", U32), col("Field", Table(TableId::Field))];

static ENC_LOG: [Column; 2] = [col("Token", U32), col("FuncCode", U32)];

static ENC_MAP: [Column; 1] = [col("Token", U32)];

static ASSEMBLY: [Column; 9] = [
    col("HashAlgId", U32),
    col("MajorVersion", U16),
    col("MinorVersion", U16),
    col("BuildNumber", U16),
    col("RevisionNumber", U16),
    col("Flags", U32),
    col("PublicKey", Blob),
    col("Name", Str),
    col("Culture", Str),
];

static ASSEMBLY_PROCESSOR: [Column; 1] = [col("Processor", U32)];

static ASSEMBLY_OS: [Column; 3] = [
    col("OSPlatformID", U32),
    col("OSMajorVersion", U32),
    col("OSMinorVersion", U32),
];

static ASSEMBLY_REF: [Column; 9] = [
    col("MajorVersion", U16),
    col("MinorVersion", U16),
    col("BuildNumber", U16),
    col("RevisionNumber", U16),
    col("Flags", U32),
    col("PublicKeyOrToken", Blob),
    col("Name", Str),
    col("Culture", Str),
    col("HashValue", Blob),
];

static ASSEMBLY_REF_PROCESSOR: [Column; 2] = [
    col("Processor", U32),
    col("AssemblyRef", Table(TableId::AssemblyRef)),
];

static ASSEMBLY_REF_OS: [Column; 4] = [
    col("OSPlatformID", U32),
    col("OSMajorVersion", U32),
    col("OSMinorVersion", U32),
    col("AssemblyRef", Table(TableId::AssemblyRef)),
];

static FILE: [Column; 3] = [col("Flags", U32), col("Name", Str), col("HashValue", Blob)];

static EXPORTED_TYPE: [Column; 5] = [
    col("Flags", U32),
    col("TypeDefId", U32),
    col("TypeName", Str),
    col("TypeNamespace", Str),
    col("Implementation", Coded(CodedIndexType::Implementation)),
];

static MANIFEST_RESOURCE: [Column; 4] = [
    col("Offset", U32),
    col("Flags", U32),
    col("Name", Str),
    col("Implementation", Coded(CodedIndexType::Implementation)),
];

static NESTED_CLASS: [Column; 2] = [
    col("NestedClass", Table(TableId::TypeDef)),
    col("EnclosingClass", Table(TableId::TypeDef)),
];

static GENERIC_PARAM: [Column; 4] = [
    col("Number", U16),
    col("Flags", U16),
    col("Owner", Coded(CodedIndexType::TypeOrMethodDef)),
    col("Name", Str),
];

static METHOD_SPEC: [Column; 2] = [
    col("Method", Coded(CodedIndexType::MethodDefOrRef)),
    col("Instantiation", Blob),
];

static GENERIC_PARAM_CONSTRAINT: [Column; 2] = [
    col("Owner", Table(TableId::GenericParam)),
    col("Constraint", Coded(CodedIndexType::TypeDefOrRef)),
];

static DOCUMENT: [Column; 4] = [
    col("Name", Blob),
    col("HashAlgorithm", Guid),
    col("Hash", Blob),
    col("Language", Guid),
];

static METHOD_DEBUG_INFORMATION: [Column; 2] = [
    col("Document", Table(TableId::Document)),
    col("SequencePoints", Blob),
];

static LOCAL_SCOPE: [Column; 6] = [
    col("Method", Table(TableId::MethodDef)),
    col("ImportScope", Table(TableId::ImportScope)),
    col("VariableList", Table(TableId::LocalVariable)),
    col("ConstantList", Table(TableId::LocalConstant)),
    col("StartOffset", U32),
    col("Length", U32),
];

static LOCAL_VARIABLE: [Column; 3] = [col("Attributes", U16), col("Index", U16), col("Name", Str)];

static LOCAL_CONSTANT: [Column; 2] = [col("Name", Str), col("Signature", Blob)];

static IMPORT_SCOPE: [Column; 2] = [
    col("Parent", Table(TableId::ImportScope)),
    col("Imports", Blob),
];

static STATE_MACHINE_METHOD: [Column; 2] = [
    col("MoveNextMethod", Table(TableId::MethodDef)),
    col("KickoffMethod", Table(TableId::MethodDef)),
];

static CUSTOM_DEBUG_INFORMATION: [Column; 3] = [
    col("Parent", Coded(CodedIndexType::HasCustomDebugInformation)),
    col("Kind", Guid),
    col("Value", Blob),
];

impl TableId {
    /// The column layout of this table
    #[must_use]
    pub fn columns(self) -> &'static [Column] {
        match self {
            TableId::Module => &MODULE,
            TableId::TypeRef => &TYPE_REF,
            TableId::TypeDef => &TYPE_DEF,
            TableId::FieldPtr => &FIELD_PTR,
            TableId::Field => &FIELD,
            TableId::MethodPtr => &METHOD_PTR,
            TableId::MethodDef => &METHOD_DEF,
            TableId::ParamPtr => &PARAM_PTR,
            TableId::Param => &PARAM,
            TableId::InterfaceImpl => &INTERFACE_IMPL,
            TableId::MemberRef => &MEMBER_REF,
            TableId::Constant => &CONSTANT,
            TableId::CustomAttribute => &CUSTOM_ATTRIBUTE,
            TableId::FieldMarshal => &FIELD_MARSHAL,
            TableId::DeclSecurity => &DECL_SECURITY,
            TableId::ClassLayout => &CLASS_LAYOUT,
            TableId::FieldLayout => &FIELD_LAYOUT,
            TableId::StandAloneSig => &STAND_ALONE_SIG,
            TableId::EventMap => &EVENT_MAP,
            TableId::EventPtr => &EVENT_PTR,
            TableId::Event => &EVENT,
            TableId::PropertyMap => &PROPERTY_MAP,
            TableId::PropertyPtr => &PROPERTY_PTR,
            TableId::Property => &PROPERTY,
            TableId::MethodSemantics => &METHOD_SEMANTICS,
            TableId::MethodImpl => &METHOD_IMPL,
            TableId::ModuleRef => &MODULE_REF,
            TableId::TypeSpec => &TYPE_SPEC,
            TableId::ImplMap => &IMPL_MAP,
            TableId::FieldRVA => &FIELD_RVA,
            TableId::EncLog => &ENC_LOG,
            TableId::EncMap => &ENC_MAP,
            TableId::Assembly => &ASSEMBLY,
            TableId::AssemblyProcessor => &ASSEMBLY_PROCESSOR,
            TableId::AssemblyOS => &ASSEMBLY_OS,
            TableId::AssemblyRef => &ASSEMBLY_REF,
            TableId::AssemblyRefProcessor => &ASSEMBLY_REF_PROCESSOR,
            TableId::AssemblyRefOS => &ASSEMBLY_REF_OS,
            TableId::File => &FILE,
            TableId::ExportedType => &EXPORTED_TYPE,
            TableId::ManifestResource => &MANIFEST_RESOURCE,
            TableId::NestedClass => &NESTED_CLASS,
            TableId::GenericParam => &GENERIC_PARAM,
            TableId::MethodSpec => &METHOD_SPEC,
            TableId::GenericParamConstraint => &GENERIC_PARAM_CONSTRAINT,
            TableId::Document => &DOCUMENT,
            TableId::MethodDebugInformation => &METHOD_DEBUG_INFORMATION,
            TableId::LocalScope => &LOCAL_SCOPE,
            TableId::LocalVariable => &LOCAL_VARIABLE,
            TableId::LocalConstant => &LOCAL_CONSTANT,
            TableId::ImportScope => &IMPORT_SCOPE,
            TableId::StateMachineMethod => &STATE_MACHINE_METHOD,
            TableId::CustomDebugInformation => &CUSTOM_DEBUG_INFORMATION,
        }
    }

    /// Position of the column called `name`
    #[must_use]
    pub fn column_index(self, name: &str) -> Option<usize> {
        self.columns().iter().position(|column| column.name == name)
    }

    /// The key this table must be sorted by, `None` for unsorted tables
    #[must_use]
    pub fn sort_key(self) -> Option<SortKey> {
        let (primary, secondary) = match self {
            TableId::InterfaceImpl => (0, Some(1)),
            TableId::Constant => (2, None),
            TableId::CustomAttribute => (0, None),
            TableId::FieldMarshal => (0, None),
            TableId::DeclSecurity => (1, None),
            TableId::ClassLayout => (2, None),
            TableId::FieldLayout => (1, None),
            TableId::MethodSemantics => (2, None),
            TableId::MethodImpl => (0, None),
            TableId::ImplMap => (1, None),
            TableId::FieldRVA => (1, None),
            TableId::NestedClass => (0, None),
            TableId::GenericParam => (2, Some(0)),
            TableId::GenericParamConstraint => (0, None),
            TableId::LocalScope => (0, Some(4)),
            TableId::StateMachineMethod => (0, None),
            TableId::CustomDebugInformation => (0, None),
            _ => return None,
        };

        Some(SortKey { primary, secondary })
    }
}

/// Column positions of the `Module` table
pub mod module {
    /// Generation
    pub const GENERATION: usize = 0;
    /// Name
    pub const NAME: usize = 1;
    /// Mvid
    pub const MVID: usize = 2;
}

/// Column positions of the `TypeRef` table
pub mod typeref {
    /// ResolutionScope
    pub const RESOLUTION_SCOPE: usize = 0;
    /// TypeName
    pub const NAME: usize = 1;
    /// TypeNamespace
    pub const NAMESPACE: usize = 2;
}

/// Column positions of the `TypeDef` table
pub mod typedef {
    /// Flags
    pub const FLAGS: usize = 0;
    /// TypeName
    pub const NAME: usize = 1;
    /// TypeNamespace
    pub const NAMESPACE: usize = 2;
    /// Extends
    pub const EXTENDS: usize = 3;
    /// FieldList
    pub const FIELD_LIST: usize = 4;
    /// MethodList
    pub const METHOD_LIST: usize = 5;
}

/// Column positions of the `Field` table
pub mod field {
    /// Flags
    pub const FLAGS: usize = 0;
    /// Name
    pub const NAME: usize = 1;
    /// Signature
    pub const SIGNATURE: usize = 2;
}

/// Column positions of the `MethodDef` table
pub mod methoddef {
    /// RVA
    pub const RVA: usize = 0;
    /// ImplFlags
    pub const IMPL_FLAGS: usize = 1;
    /// Flags
    pub const FLAGS: usize = 2;
    /// Name
    pub const NAME: usize = 3;
    /// Signature
    pub const SIGNATURE: usize = 4;
    /// ParamList
    pub const PARAM_LIST: usize = 5;
}

/// Column positions of the `Param` table
pub mod param {
    /// Flags
    pub const FLAGS: usize = 0;
    /// Sequence
    pub const SEQUENCE: usize = 1;
    /// Name
    pub const NAME: usize = 2;
}

/// Column positions of the `InterfaceImpl` table
pub mod interfaceimpl {
    /// Class
    pub const CLASS: usize = 0;
    /// Interface
    pub const INTERFACE: usize = 1;
}

/// Column positions of the `PropertyMap` and `EventMap` tables
pub mod membermap {
    /// Parent
    pub const PARENT: usize = 0;
    /// PropertyList / EventList
    pub const LIST: usize = 1;
}

/// Column positions of the `Property` table
pub mod property {
    /// Flags
    pub const FLAGS: usize = 0;
    /// Name
    pub const NAME: usize = 1;
    /// Type
    pub const SIGNATURE: usize = 2;
}

/// Column positions of the `GenericParam` table
pub mod genericparam {
    /// Number
    pub const NUMBER: usize = 0;
    /// Owner
    pub const OWNER: usize = 2;
}
