use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

pointer_row!(
    FieldPtrRaw,
    TableId::FieldPtr,
    TableId::Field,
    "A row of the `FieldPtr` indirection table"
);
pointer_row!(
    MethodPtrRaw,
    TableId::MethodPtr,
    TableId::MethodDef,
    "A row of the `MethodPtr` indirection table"
);
pointer_row!(
    ParamPtrRaw,
    TableId::ParamPtr,
    TableId::Param,
    "A row of the `ParamPtr` indirection table"
);

/// A row of the `Field` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `FieldAttributes`
    pub flags: u16,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the field signature
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE: TableId = TableId::Field;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            signature: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `MethodDef` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDefRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// RVA of the method body, zero for abstract and runtime provided methods
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// `MethodAttributes`
    pub flags: u16,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the method signature
    pub signature: u32,
    /// One-based first row of the parameter list
    pub param_list: u32,
}

impl RowReadable for MethodDefRaw {
    const TABLE: TableId = TableId::MethodDef;

    #[rustfmt::skip]
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            token:      Token::from_rid(Self::TABLE, rid),
            rva:        read_le_at::<u32>(data, offset)?,
            impl_flags: read_le_at::<u16>(data, offset)?,
            flags:      read_le_at::<u16>(data, offset)?,
            name:       read_le_at_dyn(data, offset, info.is_large_str())?,
            signature:  read_le_at_dyn(data, offset, info.is_large_blob())?,
            param_list: info.read_index(data, offset, TableId::Param)?,
        })
    }
}

/// A row of the `Param` table; sequence 0 describes the return value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `ParamAttributes`
    pub flags: u16,
    /// Position in the signature
    pub sequence: u16,
    /// `#Strings` offset of the name
    pub name: u32,
}

impl RowReadable for ParamRaw {
    const TABLE: TableId = TableId::Param;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ParamRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            flags: read_le_at::<u16>(data, offset)?,
            sequence: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
        })
    }
}

/// A row of the `MemberRef` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRefRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Parent: `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef` or `TypeSpec`
    pub class: Token,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the field or method signature
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            class: info.read_coded(data, offset, CodedIndexType::MemberRefParent)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            signature: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `FieldRVA` table, sorted by `field`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRvaRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// RVA of the initial field value
    pub rva: u32,
    /// One-based `Field` row
    pub field: u32,
}

impl RowReadable for FieldRvaRaw {
    const TABLE: TableId = TableId::FieldRVA;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(FieldRvaRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            rva: read_le_at::<u32>(data, offset)?,
            field: info.read_index(data, offset, TableId::Field)?,
        })
    }
}

/// A row of the `StandAloneSig` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandAloneSigRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `#Blob` offset of the local variable or call site signature
    pub signature: u32,
}

impl RowReadable for StandAloneSigRaw {
    const TABLE: TableId = TableId::StandAloneSig;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(StandAloneSigRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            signature: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `MethodSpec` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSpecRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// The generic method being instantiated
    pub method: Token,
    /// `#Blob` offset of the instantiation signature
    pub instantiation: u32,
}

impl RowReadable for MethodSpecRaw {
    const TABLE: TableId = TableId::MethodSpec;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MethodSpecRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            method: info.read_coded(data, offset, CodedIndexType::MethodDefOrRef)?,
            instantiation: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}
