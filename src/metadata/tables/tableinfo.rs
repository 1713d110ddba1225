//! The table layout engine.
//!
//! [`TableInfo`] is computed exactly once per load from the row counts and the heap-size flags
//! of the `#~` stream header, and is immutable afterwards. Construction runs in two strictly
//! separated phases:
//!
//! 1. **Widths**: the index width of each heap, of each table and of each coded index kind.
//! 2. **Layout**: the row size of every table from its column schema and the widths of phase 1,
//!    then the offset of every table. Tables are stored back to back in ascending id order, so
//!    `offset(next) == offset(previous) + rows(previous) * row_size(previous)`.
//!
//! No row can be addressed before both phases are complete, and a layout whose size overflows
//! is rejected as malformed.

use std::sync::Arc;

use bitflags::bitflags;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{
            schema::{columns, ColumnType},
            CodedIndexType, TableId,
        },
        token::{IndexEncoding, Token},
    },
    Result,
};

/// Largest row count a table may declare; row numbers share a token with the table id.
pub const MAX_ROWS: u32 = 0x00FF_FFFF;

bitflags! {
    /// The heap-size byte of the `#~` stream header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeapSizes: u8 {
        /// `#Strings` indexes are 4 bytes wide
        const STRINGS = 0x01;
        /// `#GUID` indexes are 4 bytes wide
        const GUID = 0x02;
        /// `#Blob` indexes are 4 bytes wide
        const BLOB = 0x04;
        /// Four bytes of extra data follow the row counts
        const EXTRA_DATA = 0x40;
    }
}

/// Row counts, index widths and the byte layout of the table stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    rows: [u32; TableId::COUNT],
    row_sizes: [u32; TableId::COUNT],
    offsets: [usize; TableId::COUNT],
    coded_indexes: [u8; CodedIndexType::COUNT],
    heap_sizes: HeapSizes,
    total_size: usize,
}

/// Shared reference to a [`TableInfo`]
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Compute the layout for the given row counts and heap-size flags.
    ///
    /// Tables missing from `rows` have zero rows.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row count exceeds [`MAX_ROWS`] or the layout
    /// size overflows.
    pub fn new(rows: &[(TableId, u32)], heap_sizes: HeapSizes) -> Result<TableInfo> {
        let mut info = TableInfo {
            rows: [0; TableId::COUNT],
            row_sizes: [0; TableId::COUNT],
            offsets: [0; TableId::COUNT],
            coded_indexes: [2; CodedIndexType::COUNT],
            heap_sizes,
            total_size: 0,
        };

        for &(table, count) in rows {
            if count > MAX_ROWS {
                return Err(malformed_error!(
                    "Table {:?} declares {} rows",
                    table,
                    count
                ));
            }
            info.rows[table.index()] = count;
        }

        for kind in CodedIndexType::iter() {
            info.coded_indexes[kind as usize] = info.calculate_coded_index_bytes(kind);
        }

        let mut offset = 0_usize;
        for table in TableId::iter() {
            let row_size: u32 = columns(table)
                .iter()
                .map(|column| u32::from(info.column_size(column.kind)))
                .sum();

            info.row_sizes[table.index()] = row_size;
            info.offsets[table.index()] = offset;

            let size = (info.rows[table.index()] as usize)
                .checked_mul(row_size as usize)
                .and_then(|size| offset.checked_add(size))
                .ok_or_else(|| malformed_error!("Table {:?} size overflows", table))?;

            if info.rows[table.index()] > 0 {
                log::trace!(
                    "table {:?}: {} rows of {} bytes at {:#x}",
                    table,
                    info.rows[table.index()],
                    row_size,
                    offset
                );
            }
            offset = size;
        }
        info.total_size = offset;

        Ok(info)
    }

    fn calculate_coded_index_bytes(&self, kind: CodedIndexType) -> u8 {
        let max_rows = kind
            .tables()
            .iter()
            .flatten()
            .map(|table| self.rows[table.index()])
            .max()
            .unwrap_or(0);

        if max_rows < (1_u32 << (16 - kind.tag_bits())) {
            2
        } else {
            4
        }
    }

    /// Row count of `table`
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table.index()]
    }

    /// Returns true if `table` has at least one row
    #[must_use]
    pub fn has_rows(&self, table: TableId) -> bool {
        self.rows(table) > 0
    }

    /// Byte size of one row of `table`
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        self.row_sizes[table.index()]
    }

    /// Offset of the first row of `table`, relative to the start of the table data
    #[must_use]
    pub fn table_offset(&self, table: TableId) -> usize {
        self.offsets[table.index()]
    }

    /// Byte size of all rows of `table`
    #[must_use]
    pub fn table_size(&self, table: TableId) -> usize {
        self.rows(table) as usize * self.row_size(table) as usize
    }

    /// Byte size of the complete table data
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// The heap-size flags this layout was computed with
    #[must_use]
    pub fn heap_sizes(&self) -> HeapSizes {
        self.heap_sizes
    }

    /// Returns true if `#Strings` indexes are 4 bytes wide
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::STRINGS)
    }

    /// Returns true if `#GUID` indexes are 4 bytes wide
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::GUID)
    }

    /// Returns true if `#Blob` indexes are 4 bytes wide
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.heap_sizes.contains(HeapSizes::BLOB)
    }

    /// Returns true if simple indexes into `table` are 4 bytes wide
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows(table) > u32::from(u16::MAX)
    }

    /// Returns true if coded indexes of `kind` are 4 bytes wide
    #[must_use]
    pub fn is_large_coded(&self, kind: CodedIndexType) -> bool {
        self.coded_index_bytes(kind) == 4
    }

    /// Width of a `#Strings` index
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_str() {
            4
        } else {
            2
        }
    }

    /// Width of a `#GUID` index
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_guid() {
            4
        } else {
            2
        }
    }

    /// Width of a `#Blob` index
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_blob() {
            4
        } else {
            2
        }
    }

    /// Width of a simple index into `table`
    #[must_use]
    pub fn index_bytes(&self, table: TableId) -> u8 {
        if self.is_large(table) {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of `kind`
    #[must_use]
    pub fn coded_index_bytes(&self, kind: CodedIndexType) -> u8 {
        self.coded_indexes[kind as usize]
    }

    /// Width of a column of the given storage class
    #[must_use]
    pub fn column_size(&self, kind: ColumnType) -> u8 {
        match kind {
            ColumnType::Fixed1 => 1,
            ColumnType::Fixed2 => 2,
            ColumnType::Fixed4 => 4,
            ColumnType::Str => self.str_bytes(),
            ColumnType::Guid => self.guid_bytes(),
            ColumnType::Blob => self.blob_bytes(),
            ColumnType::Index(table) => self.index_bytes(table),
            ColumnType::Coded(kind) => self.coded_index_bytes(kind),
        }
    }

    /// Offset of column `column` inside a row of `table`, `None` if the column does not exist
    #[must_use]
    pub fn column_offset(&self, table: TableId, column: usize) -> Option<usize> {
        let columns = columns(table);
        if column >= columns.len() {
            return None;
        }

        Some(
            columns[..column]
                .iter()
                .map(|column| usize::from(self.column_size(column.kind)))
                .sum(),
        )
    }

    /// Read a simple index into `table` at `offset` and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value extends past `data`.
    pub fn read_index(&self, data: &[u8], offset: &mut usize, table: TableId) -> Result<u32> {
        read_le_at_dyn(data, offset, self.is_large(table))
    }

    /// Read a coded index of `kind` at `offset`, advance past it and decode it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value extends past `data` and
    /// [`crate::Error::Malformed`] for an invalid tag.
    pub fn read_coded(&self, data: &[u8], offset: &mut usize, kind: CodedIndexType) -> Result<Token> {
        let raw = read_le_at_dyn(data, offset, self.is_large_coded(kind))?;
        Token::decode(IndexEncoding::Coded(kind), raw)
    }
}
