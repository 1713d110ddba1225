//! Rows of the tables that attach data to an owner through a coded or simple index:
//! constants, custom attributes, security declarations and generic parameters. All of these
//! tables are sorted by their owner column, which is what the range queries of
//! [`crate::metadata::tables::TablesHeader`] rely on.

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `Constant` table, sorted by `parent`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Element type of the value
    pub base: u8,
    /// The `Field`, `Param` or `Property` owning the value
    pub parent: Token,
    /// `#Blob` offset of the value
    pub value: u32,
}

impl RowReadable for ConstantRaw {
    const TABLE: TableId = TableId::Constant;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        let base = read_le_at::<u8>(data, offset)?;
        // Padding byte
        *offset += 1;

        Ok(ConstantRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            base,
            parent: info.read_coded(data, offset, CodedIndexType::HasConstant)?,
            value: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `CustomAttribute` table, sorted by `parent`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomAttributeRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// The attributed entity
    pub parent: Token,
    /// The attribute constructor, a `MethodDef` or `MemberRef`
    pub constructor: Token,
    /// `#Blob` offset of the encoded arguments
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    const TABLE: TableId = TableId::CustomAttribute;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            parent: info.read_coded(data, offset, CodedIndexType::HasCustomAttribute)?,
            constructor: info.read_coded(data, offset, CodedIndexType::CustomAttributeType)?,
            value: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `DeclSecurity` table, sorted by `parent`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclSecurityRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Security action
    pub action: u16,
    /// The `TypeDef`, `MethodDef` or `Assembly` the permission set applies to
    pub parent: Token,
    /// `#Blob` offset of the permission set
    pub permission_set: u32,
}

impl RowReadable for DeclSecurityRaw {
    const TABLE: TableId = TableId::DeclSecurity;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(DeclSecurityRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            action: read_le_at::<u16>(data, offset)?,
            parent: info.read_coded(data, offset, CodedIndexType::HasDeclSecurity)?,
            permission_set: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `GenericParam` table, sorted by `owner` and then `number`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParamRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Zero-based position in the owner's parameter list
    pub number: u16,
    /// `GenericParamAttributes`
    pub flags: u16,
    /// The owning `TypeDef` or `MethodDef`
    pub owner: Token,
    /// `#Strings` offset of the name
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    const TABLE: TableId = TableId::GenericParam;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: info.read_coded(data, offset, CodedIndexType::TypeOrMethodDef)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
        })
    }
}

/// A row of the `GenericParamConstraint` table, sorted by `owner`.
///
/// The constraint is read from the column that follows the owner column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParamConstraintRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// One-based `GenericParam` row
    pub owner: u32,
    /// The constraining type
    pub constraint: Token,
}

impl RowReadable for GenericParamConstraintRaw {
    const TABLE: TableId = TableId::GenericParamConstraint;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(GenericParamConstraintRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            owner: info.read_index(data, offset, TableId::GenericParam)?,
            constraint: info.read_coded(data, offset, CodedIndexType::TypeDefOrRef)?,
        })
    }
}
