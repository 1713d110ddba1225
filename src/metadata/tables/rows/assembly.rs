use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `Module` table; a valid image has exactly one
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Reserved, zero
    pub generation: u16,
    /// `#Strings` offset of the module name
    pub name: u32,
    /// `#GUID` ordinal of the module version id
    pub mvid: u32,
    /// `#GUID` ordinal, reserved
    pub encid: u32,
    /// `#GUID` ordinal, reserved
    pub encbaseid: u32,
}

impl RowReadable for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            generation: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            mvid: read_le_at_dyn(data, offset, info.is_large_guid())?,
            encid: read_le_at_dyn(data, offset, info.is_large_guid())?,
            encbaseid: read_le_at_dyn(data, offset, info.is_large_guid())?,
        })
    }
}

/// A row of the `ModuleRef` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRefRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `#Strings` offset of the module name
    pub name: u32,
}

impl RowReadable for ModuleRefRaw {
    const TABLE: TableId = TableId::ModuleRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(ModuleRefRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
        })
    }
}

/// A row of the `Assembly` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Hash algorithm of the `File` table hashes
    pub hash_alg_id: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` offset of the public key
    pub public_key: u32,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Strings` offset of the culture
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    const TABLE: TableId = TableId::Assembly;

    #[rustfmt::skip]
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            token:           Token::from_rid(Self::TABLE, rid),
            hash_alg_id:     read_le_at::<u32>(data, offset)?,
            major_version:   read_le_at::<u16>(data, offset)?,
            minor_version:   read_le_at::<u16>(data, offset)?,
            build_number:    read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags:           read_le_at::<u32>(data, offset)?,
            public_key:      read_le_at_dyn(data, offset, info.is_large_blob())?,
            name:            read_le_at_dyn(data, offset, info.is_large_str())?,
            culture:         read_le_at_dyn(data, offset, info.is_large_str())?,
        })
    }
}

/// A row of the `AssemblyRef` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyRefRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` offset of the public key or its token
    pub public_key_or_token: u32,
    /// `#Strings` offset of the name
    pub name: u32,
    /// `#Strings` offset of the culture
    pub culture: u32,
    /// `#Blob` offset of the hash value
    pub hash_value: u32,
}

impl RowReadable for AssemblyRefRaw {
    const TABLE: TableId = TableId::AssemblyRef;

    #[rustfmt::skip]
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            token:               Token::from_rid(Self::TABLE, rid),
            major_version:       read_le_at::<u16>(data, offset)?,
            minor_version:       read_le_at::<u16>(data, offset)?,
            build_number:        read_le_at::<u16>(data, offset)?,
            revision_number:     read_le_at::<u16>(data, offset)?,
            flags:               read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_le_at_dyn(data, offset, info.is_large_blob())?,
            name:                read_le_at_dyn(data, offset, info.is_large_str())?,
            culture:             read_le_at_dyn(data, offset, info.is_large_str())?,
            hash_value:          read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

/// `FileAttributes` value of a file that holds no metadata
pub const CONTAINS_NO_METADATA: u32 = 0x0001;

/// A row of the `File` table: one other file of a multi-file assembly
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRaw {
    /// One-based row number
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// `FileAttributes`
    pub flags: u32,
    /// `#Strings` offset of the file name
    pub name: u32,
    /// `#Blob` offset of the hash value
    pub hash_value: u32,
}

impl FileRaw {
    /// Returns true if the file is a module with its own metadata
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        self.flags & CONTAINS_NO_METADATA == 0
    }
}

impl RowReadable for FileRaw {
    const TABLE: TableId = TableId::File;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self> {
        Ok(FileRaw {
            rid,
            token: Token::from_rid(Self::TABLE, rid),
            flags: read_le_at::<u32>(data, offset)?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            hash_value: read_le_at_dyn(data, offset, info.is_large_blob())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::HeapSizes;

    #[test]
    fn assembly_ref() {
        #[rustfmt::skip]
        let data = [
            0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // version 4.0.0.0
            0x00, 0x00, 0x00, 0x00, // flags
            0x01, 0x00, 0x00, 0x00, // public_key_or_token
            0x1C, 0x00, // name
            0x00, 0x00, // culture
            0x00, 0x00, 0x00, 0x00, // hash_value
        ];
        let info = TableInfo::new(&[], HeapSizes::BLOB).unwrap();

        let mut offset = 0;
        let row = AssemblyRefRaw::row_read(&data, &mut offset, 1, &info).unwrap();
        assert_eq!(row.major_version, 4);
        assert_eq!(row.public_key_or_token, 1);
        assert_eq!(row.name, 0x1C);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn file() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x06, 0x00];
        let info = TableInfo::new(&[], HeapSizes::empty()).unwrap();

        let row = FileRaw::row_read(&data, &mut 0, 1, &info).unwrap();
        assert!(!row.has_metadata());
        assert_eq!(row.name, 5);
        assert_eq!(row.hash_value, 6);
    }
}
