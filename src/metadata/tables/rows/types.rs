use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

#[allow(non_snake_case)]
/// Flags of the `TypeDef` table (ECMA-335 II.23.1.15)
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
    /// Sequential field layout
    pub const SEQUENTIAL_LAYOUT: u32 = 0x0000_0008;
    /// Explicit field layout
    pub const EXPLICIT_LAYOUT: u32 = 0x0000_0010;
    /// The type is an interface
    pub const INTERFACE: u32 = 0x0000_0020;
    /// The type is abstract
    pub const ABSTRACT: u32 = 0x0000_0080;
    /// The type cannot be derived from
    pub const SEALED: u32 = 0x0000_0100;
    /// The name is special
    pub const SPECIAL_NAME: u32 = 0x0000_0400;
    /// The type is imported
    pub const IMPORT: u32 = 0x0000_1000;
    /// The type is serializable
    pub const SERIALIZABLE: u32 = 0x0000_2000;
    /// Initialize the type before the first static field access
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
}

/// A row of the `TypeRef` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRefRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `Module`, `ModuleRef`, `AssemblyRef` or `TypeRef` that scopes the name
    pub resolution_scope: Token,
    /// `#Strings` offset of the name
    pub type_name: u32,
    /// `#Strings` offset of the namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            resolution_scope: info.read_coded(data, offset, CodedIndexType::ResolutionScope)?,
            type_name: read_le_at_dyn(data, offset, info.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, info.is_large_str())?,
        })
    }
}

/// A row of the `TypeDef` table.
///
/// `field_list` and `method_list` are the first rows of this type's fields and methods; the
/// lists run up to the start of the next row's lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDefRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// [`TypeAttributes`]
    pub flags: u32,
    /// `#Strings` offset of the name
    pub type_name: u32,
    /// `#Strings` offset of the namespace
    pub type_namespace: u32,
    /// Base type, null for interfaces and `System.Object`
    pub extends: Token,
    /// One-based first row of the field list
    pub field_list: u32,
    /// One-based first row of the method list
    pub method_list: u32,
}

impl TypeDefRaw {
    /// Returns true if this type is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags & TypeAttributes::INTERFACE != 0
    }

    /// Returns true if the visibility marks a nested type
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.flags & TypeAttributes::VISIBILITY_MASK >= TypeAttributes::NESTED_PUBLIC
    }
}

impl RowReadable for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    #[rustfmt::skip]
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            token:          Token::from_rid(Self::TABLE, rid),
            flags:          read_le_at::<u32>(data, offset)?,
            type_name:      read_le_at_dyn(data, offset, info.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, info.is_large_str())?,
            extends:        info.read_coded(data, offset, CodedIndexType::TypeDefOrRef)?,
            field_list:     info.read_index(data, offset, TableId::Field)?,
            method_list:    info.read_index(data, offset, TableId::MethodDef)?,
        })
    }
}

/// A row of the `TypeSpec` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSpecRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `#Blob` offset of the type signature
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    const TABLE: TableId = TableId::TypeSpec;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            signature: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `InterfaceImpl` table, sorted by `class`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceImplRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// One-based `TypeDef` row implementing the interface
    pub class: u32,
    /// The implemented interface
    pub interface: Token,
}

impl RowReadable for InterfaceImplRaw {
    const TABLE: TableId = TableId::InterfaceImpl;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(InterfaceImplRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            class: info.read_index(data, offset, TableId::TypeDef)?,
            interface: info.read_coded(data, offset, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

/// A row of the `ClassLayout` table, sorted by `parent`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLayoutRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Field alignment
    pub packing_size: u16,
    /// Size of the type in bytes
    pub class_size: u32,
    /// One-based `TypeDef` row
    pub parent: u32,
}

impl RowReadable for ClassLayoutRaw {
    const TABLE: TableId = TableId::ClassLayout;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ClassLayoutRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            packing_size: read_le_at::<u16>(data, offset)?,
            class_size: read_le_at::<u32>(data, offset)?,
            parent: info.read_index(data, offset, TableId::TypeDef)?,
        })
    }
}

/// A row of the `NestedClass` table, sorted by `nested_class`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NestedClassRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// One-based `TypeDef` row of the nested type
    pub nested_class: u32,
    /// One-based `TypeDef` row of the enclosing type
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    const TABLE: TableId = TableId::NestedClass;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            nested_class: info.read_index(data, offset, TableId::TypeDef)?,
            enclosing_class: info.read_index(data, offset, TableId::TypeDef)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::HeapSizes;

    #[test]
    fn typedef_short() {
        let data = [
            0x21, 0x00, 0x10, 0x00, // flags
            0x42, 0x00, // type_name
            0x43, 0x00, // type_namespace
            0x09, 0x00, // extends
            0x03, 0x00, // field_list
            0x04, 0x00, // method_list
        ];
        let info = TableInfo::new(&[(TableId::TypeDef, 1)], HeapSizes::empty()).unwrap();

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 1, &info).unwrap();

        assert_eq!(row.token.value(), 0x0200_0001);
        assert_eq!(row.flags, 0x0010_0021);
        assert!(row.is_interface());
        assert!(!row.is_nested());
        assert_eq!(row.type_name, 0x42);
        assert_eq!(row.type_namespace, 0x43);
        assert_eq!(row.extends.value(), 0x0100_0002);
        assert_eq!(row.field_list, 3);
        assert_eq!(row.method_list, 4);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn typedef_long() {
        let data = [
            0x00, 0x00, 0x00, 0x00, // flags
            0x42, 0x00, 0x00, 0x00, // type_name
            0x43, 0x00, 0x00, 0x00, // type_namespace
            0x08, 0x00, // extends
            0x03, 0x00, 0x01, 0x00, // field_list
            0x04, 0x00, // method_list
        ];
        let info = TableInfo::new(&[(TableId::Field, 0x1_0000)], HeapSizes::STRINGS).unwrap();

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 7, &info).unwrap();

        assert_eq!(row.token.value(), 0x0200_0007);
        assert_eq!(row.extends.value(), 0x0200_0002);
        assert_eq!(row.field_list, 0x1_0003);
        assert_eq!(row.method_list, 4);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn typeref_scope() {
        // ResolutionScope tag 2 = AssemblyRef, row 1
        let data = [0x06, 0x00, 0x10, 0x00, 0x20, 0x00];
        let info = TableInfo::new(&[], HeapSizes::empty()).unwrap();

        let row = TypeRefRaw::row_read(&data, &mut 0, 1, &info).unwrap();
        assert_eq!(row.resolution_scope.value(), 0x2300_0001);
        assert_eq!(row.type_name, 0x10);
    }
}
