//! Column schemas of the metadata tables (ECMA-335 II.22).
//!
//! Every table is a fixed sequence of columns. A column is either a fixed-width constant, an
//! index into one of the `#Strings`, `#GUID` or `#Blob` heaps, a simple index into one table,
//! or a coded index. Only the constant columns have a width known ahead of time; all other
//! widths are decided by [`crate::metadata::tables::TableInfo`] once per load.

use crate::metadata::tables::{CodedIndexType, TableId};

/// The storage class of a single column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// 1-byte constant
    Fixed1,
    /// 2-byte constant
    Fixed2,
    /// 4-byte constant
    Fixed4,
    /// Offset into `#Strings`
    Str,
    /// One-based ordinal into `#GUID`
    Guid,
    /// Offset into `#Blob`
    Blob,
    /// One-based row of the given table
    Index(TableId),
    /// Coded index of the given kind
    Coded(CodedIndexType),
}

/// A named column of a metadata table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    /// Column name as used by ECMA-335
    pub name: &'static str,
    /// Storage class
    pub kind: ColumnType,
}

macro_rules! col {
    ($name:literal, $kind:expr) => {
        Column {
            name: $name,
            kind: $kind,
        }
    };
}

use CodedIndexType as C;
use ColumnType::{Blob, Coded, Fixed1, Fixed2, Fixed4, Guid, Index, Str};
use TableId as T;

/// The columns of `table`, in storage order.
#[must_use]
#[rustfmt::skip]
pub fn columns(table: TableId) -> &'static [Column] {
    match table {
        T::Module => &[
            col!("Generation", Fixed2),
            col!("Name", Str),
            col!("Mvid", Guid),
            col!("EncId", Guid),
            col!("EncBaseId", Guid),
        ],
        T::TypeRef => &[
            col!("ResolutionScope", Coded(C::ResolutionScope)),
            col!("TypeName", Str),
            col!("TypeNamespace", Str),
        ],
        T::TypeDef => &[
            col!("Flags", Fixed4),
            col!("TypeName", Str),
            col!("TypeNamespace", Str),
            col!("Extends", Coded(C::TypeDefOrRef)),
            col!("FieldList", Index(T::Field)),
            col!("MethodList", Index(T::MethodDef)),
        ],
        T::FieldPtr => &[col!("Field", Index(T::Field))],
        T::Field => &[
            col!("Flags", Fixed2),
            col!("Name", Str),
            col!("Signature", Blob),
        ],
        T::MethodPtr => &[col!("Method", Index(T::MethodDef))],
        T::MethodDef => &[
            col!("RVA", Fixed4),
            col!("ImplFlags", Fixed2),
            col!("Flags", Fixed2),
            col!("Name", Str),
            col!("Signature", Blob),
            col!("ParamList", Index(T::Param)),
        ],
        T::ParamPtr => &[col!("Param", Index(T::Param))],
        T::Param => &[
            col!("Flags", Fixed2),
            col!("Sequence", Fixed2),
            col!("Name", Str),
        ],
        T::InterfaceImpl => &[
            col!("Class", Index(T::TypeDef)),
            col!("Interface", Coded(C::TypeDefOrRef)),
        ],
        T::MemberRef => &[
            col!("Class", Coded(C::MemberRefParent)),
            col!("Name", Str),
            col!("Signature", Blob),
        ],
        T::Constant => &[
            col!("Type", Fixed1),
            col!("Padding", Fixed1),
            col!("Parent", Coded(C::HasConstant)),
            col!("Value", Blob),
        ],
        T::CustomAttribute => &[
            col!("Parent", Coded(C::HasCustomAttribute)),
            col!("Type", Coded(C::CustomAttributeType)),
            col!("Value", Blob),
        ],
        T::FieldMarshal => &[
            col!("Parent", Coded(C::HasFieldMarshal)),
            col!("NativeType", Blob),
        ],
        T::DeclSecurity => &[
            col!("Action", Fixed2),
            col!("Parent", Coded(C::HasDeclSecurity)),
            col!("PermissionSet", Blob),
        ],
        T::ClassLayout => &[
            col!("PackingSize", Fixed2),
            col!("ClassSize", Fixed4),
            col!("Parent", Index(T::TypeDef)),
        ],
        T::FieldLayout => &[
            col!("Offset", Fixed4),
            col!("Field", Index(T::Field)),
        ],
        T::StandAloneSig => &[col!("Signature", Blob)],
        T::EventMap => &[
            col!("Parent", Index(T::TypeDef)),
            col!("EventList", Index(T::Event)),
        ],
        T::EventPtr => &[col!("Event", Index(T::Event))],
        T::Event => &[
            col!("EventFlags", Fixed2),
            col!("Name", Str),
            col!("EventType", Coded(C::TypeDefOrRef)),
        ],
        T::PropertyMap => &[
            col!("Parent", Index(T::TypeDef)),
            col!("PropertyList", Index(T::Property)),
        ],
        T::PropertyPtr => &[col!("Property", Index(T::Property))],
        T::Property => &[
            col!("Flags", Fixed2),
            col!("Name", Str),
            col!("Type", Blob),
        ],
        T::MethodSemantics => &[
            col!("Semantics", Fixed2),
            col!("Method", Index(T::MethodDef)),
            col!("Association", Coded(C::HasSemantics)),
        ],
        T::MethodImpl => &[
            col!("Class", Index(T::TypeDef)),
            col!("MethodBody", Coded(C::MethodDefOrRef)),
            col!("MethodDeclaration", Coded(C::MethodDefOrRef)),
        ],
        T::ModuleRef => &[col!("Name", Str)],
        T::TypeSpec => &[col!("Signature", Blob)],
        T::ImplMap => &[
            col!("MappingFlags", Fixed2),
            col!("MemberForwarded", Coded(C::MemberForwarded)),
            col!("ImportName", Str),
            col!("ImportScope", Index(T::ModuleRef)),
        ],
        T::FieldRVA => &[
            col!("RVA", Fixed4),
            col!("Field", Index(T::Field)),
        ],
        T::EncLog => &[
            col!("Token", Fixed4),
            col!("FuncCode", Fixed4),
        ],
        T::EncMap => &[col!("Token", Fixed4)],
        T::Assembly => &[
            col!("HashAlgId", Fixed4),
            col!("MajorVersion", Fixed2),
            col!("MinorVersion", Fixed2),
            col!("BuildNumber", Fixed2),
            col!("RevisionNumber", Fixed2),
            col!("Flags", Fixed4),
            col!("PublicKey", Blob),
            col!("Name", Str),
            col!("Culture", Str),
        ],
        T::AssemblyProcessor => &[col!("Processor", Fixed4)],
        T::AssemblyOS => &[
            col!("OSPlatformID", Fixed4),
            col!("OSMajorVersion", Fixed4),
            col!("OSMinorVersion", Fixed4),
        ],
        T::AssemblyRef => &[
            col!("MajorVersion", Fixed2),
            col!("MinorVersion", Fixed2),
            col!("BuildNumber", Fixed2),
            col!("RevisionNumber", Fixed2),
            col!("Flags", Fixed4),
            col!("PublicKeyOrToken", Blob),
            col!("Name", Str),
            col!("Culture", Str),
            col!("HashValue", Blob),
        ],
        T::AssemblyRefProcessor => &[
            col!("Processor", Fixed4),
            col!("AssemblyRef", Index(T::AssemblyRef)),
        ],
        T::AssemblyRefOS => &[
            col!("OSPlatformId", Fixed4),
            col!("OSMajorVersion", Fixed4),
            col!("OSMinorVersion", Fixed4),
            col!("AssemblyRef", Index(T::AssemblyRef)),
        ],
        T::File => &[
            col!("Flags", Fixed4),
            col!("Name", Str),
            col!("HashValue", Blob),
        ],
        T::ExportedType => &[
            col!("Flags", Fixed4),
            col!("TypeDefId", Fixed4),
            col!("TypeName", Str),
            col!("TypeNamespace", Str),
            col!("Implementation", Coded(C::Implementation)),
        ],
        T::ManifestResource => &[
            col!("Offset", Fixed4),
            col!("Flags", Fixed4),
            col!("Name", Str),
            col!("Implementation", Coded(C::Implementation)),
        ],
        T::NestedClass => &[
            col!("NestedClass", Index(T::TypeDef)),
            col!("EnclosingClass", Index(T::TypeDef)),
        ],
        T::GenericParam => &[
            col!("Number", Fixed2),
            col!("Flags", Fixed2),
            col!("Owner", Coded(C::TypeOrMethodDef)),
            col!("Name", Str),
        ],
        T::MethodSpec => &[
            col!("Method", Coded(C::MethodDefOrRef)),
            col!("Instantiation", Blob),
        ],
        T::GenericParamConstraint => &[
            col!("Owner", Index(T::GenericParam)),
            col!("Constraint", Coded(C::TypeDefOrRef)),
        ],
    }
}

/// Position of the column called `name` in `table`
#[must_use]
pub fn column_index(table: TableId, name: &str) -> Option<usize> {
    columns(table).iter().position(|column| column.name == name)
}
