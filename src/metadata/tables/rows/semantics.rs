use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

pointer_row!(
    EventPtrRaw,
    TableId::EventPtr,
    TableId::Event,
    "A row of the `EventPtr` indirection table"
);
pointer_row!(
    PropertyPtrRaw,
    TableId::PropertyPtr,
    TableId::Property,
    "A row of the `PropertyPtr` indirection table"
);

#[allow(non_snake_case)]
/// Flags of the `MethodSemantics` table (ECMA-335 II.23.1.12)
pub mod MethodSemanticsAttributes {
    /// Property setter
    pub const SETTER: u16 = 0x0001;
    /// Property getter
    pub const GETTER: u16 = 0x0002;
    /// Other accessor of a property or event
    pub const OTHER: u16 = 0x0004;
    /// Event `add` accessor
    pub const ADD_ON: u16 = 0x0008;
    /// Event `remove` accessor
    pub const REMOVE_ON: u16 = 0x0010;
    /// Event `raise` accessor
    pub const FIRE: u16 = 0x0020;
}

/// A row of the `EventMap` table; owns the events of `parent` through `event_list`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventMapRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// One-based `TypeDef` row
    pub parent: u32,
    /// One-based first row of the event list
    pub event_list: u32,
}

impl RowReadable for EventMapRaw {
    const TABLE: TableId = TableId::EventMap;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(EventMapRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            parent: info.read_index(data, offset, TableId::TypeDef)?,
            event_list: info.read_index(data, offset, TableId::Event)?,
        })
    }
}

/// A row of the `Event` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `EventAttributes`
    pub flags: u16,
    /// `#Strings` offset of the name
    pub name: u32,
    /// Delegate type of the event
    pub event_type: Token,
}

impl RowReadable for EventRaw {
    const TABLE: TableId = TableId::Event;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(EventRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            event_type: info.read_coded(data, offset, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

/// A row of the `PropertyMap` table; owns the properties of `parent` through `property_list`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyMapRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// One-based `TypeDef` row
    pub parent: u32,
    /// One-based first row of the property list
    pub property_list: u32,
}

impl RowReadable for PropertyMapRaw {
    const TABLE: TableId = TableId::PropertyMap;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(PropertyMapRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            parent: info.read_index(data, offset, TableId::TypeDef)?,
            property_list: info.read_index(data, offset, TableId::Property)?,
        })
    }
}

/// A row of the `Property` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `PropertyAttributes`
    pub flags: u16,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Blob` offset of the property signature
    pub signature: u32,
}

impl RowReadable for PropertyRaw {
    const TABLE: TableId = TableId::Property;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(PropertyRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            signature: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// A row of the `MethodSemantics` table, sorted by `association`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSemanticsRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// [`MethodSemanticsAttributes`]
    pub semantics: u16,
    /// One-based `MethodDef` row of the accessor
    pub method: u32,
    /// The `Event` or `Property` the accessor belongs to
    pub association: Token,
}

impl RowReadable for MethodSemanticsRaw {
    const TABLE: TableId = TableId::MethodSemantics;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(MethodSemanticsRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            semantics: read_le_at::<u16>(data, offset)?,
            method: info.read_index(data, offset, TableId::MethodDef)?,
            association: info.read_coded(data, offset, CodedIndexType::HasSemantics)?,
        })
    }
}
