//! The `#~` stream header (ECMA-335 II.24.2.6).
//!
//! | Offset | Size | Field                                                  |
//! |--------|------|--------------------------------------------------------|
//! | 0      | 4    | Reserved, 0                                            |
//! | 4      | 1    | Major version                                          |
//! | 5      | 1    | Minor version                                          |
//! | 6      | 1    | Heap sizes, see [`HeapSizes`]                          |
//! | 7      | 1    | Reserved, 1                                            |
//! | 8      | 8    | Valid: bit vector of present tables                    |
//! | 16     | 8    | Sorted: bit vector of sorted tables                    |
//! | 24     | 4*n  | Row count of each present table, ascending table id    |
//! | ...    | 4    | Extra data, only if [`HeapSizes::EXTRA_DATA`] is set   |
//!
//! The rows of all present tables follow immediately, see
//! [`crate::metadata::tables::TableInfo`] for their layout.

use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::{
    file::{
        io::{read_le_at, read_le_at_dyn},
        Lifeline,
    },
    metadata::{
        tables::{
            schema::columns, ColumnType, HeapSizes, MetadataTable, RowReadable, TableId,
            TableInfo, TableInfoRef,
        },
        token::{IndexEncoding, Token},
    },
    Error, Result,
};

/// Size of the fixed part of the header, before the row counts
const FIXED_HEADER_SIZE: usize = 24;

/// A decoded column value, see [`TablesHeader::column`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnValue {
    /// A 1, 2 or 4 byte constant
    Constant(u32),
    /// Offset into `#Strings`
    String(u32),
    /// One-based ordinal into `#GUID`
    Guid(u32),
    /// Offset into `#Blob`
    Blob(u32),
    /// A simple or coded index
    Token(Token),
}

/// Row count of one present table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    /// The table
    pub table_id: TableId,
    /// Its row count
    pub row_count: u32,
}

/// The `#~` stream: header fields, the computed layout and access to every table.
pub struct TablesHeader<'a> {
    /// Major version of the table schema, 2
    pub major_version: u8,
    /// Minor version of the table schema, 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    info: TableInfoRef,
    data: &'a [u8],
    lifeline: Lifeline<'a>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the `#~` stream in `data`, not tied to any image.
    ///
    /// # Errors
    /// See [`TablesHeader::with_lifeline`].
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        TablesHeader::with_lifeline(data, Lifeline::detached())
    }

    /// Parse the `#~` stream in `data`.
    ///
    /// The layout is computed here, once, before any row can be addressed.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if a table id beyond `GenericParamConstraint`
    /// is flagged as present, and [`crate::Error::Malformed`] if the header or the table data
    /// do not fit into the stream.
    pub fn with_lifeline(data: &'a [u8], lifeline: Lifeline<'a>) -> Result<TablesHeader<'a>> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(malformed_error!(
                "#~ stream of {} bytes is too small",
                data.len()
            ));
        }

        let mut offset = 4;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = HeapSizes::from_bits_retain(read_le_at::<u8>(data, &mut offset)?);
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        let known = TableId::iter().fold(0_u64, |mask, table| mask | table.mask());
        if valid & !known != 0 {
            return Err(Error::NotSupported(format!(
                "metadata tables {:#x}",
                valid & !known
            )));
        }

        let mut rows = Vec::with_capacity(valid.count_ones() as usize);
        for table in TableId::iter().filter(|table| valid & table.mask() != 0) {
            let count = read_le_at::<u32>(data, &mut offset)
                .map_err(|_| malformed_error!("Row counts exceed the #~ stream"))?;
            rows.push((table, count));
        }

        if heap_sizes.contains(HeapSizes::EXTRA_DATA) {
            log::warn!("#~ stream carries extra data after the row counts");
            offset += 4;
        }

        let info = TableInfo::new(&rows, heap_sizes)?;
        let Some(tables) = offset
            .checked_add(info.total_size())
            .and_then(|end| data.get(offset..end))
        else {
            return Err(malformed_error!(
                "Table data of {} bytes exceeds the #~ stream of {} bytes",
                info.total_size(),
                data.len()
            ));
        };

        log::debug!(
            "#~ {}.{} with {} tables, heap sizes {:?}",
            major_version,
            minor_version,
            rows.len(),
            heap_sizes
        );

        Ok(TablesHeader {
            major_version,
            minor_version,
            valid,
            sorted,
            info: Arc::new(info),
            data: tables,
            lifeline,
        })
    }

    /// The computed layout
    #[must_use]
    pub fn info(&self) -> &TableInfoRef {
        &self.info
    }

    /// Number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Returns true if `table` is flagged as present
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & table.mask() != 0
    }

    /// Returns true if `table` is flagged as sorted
    #[must_use]
    pub fn is_sorted(&self, table: TableId) -> bool {
        self.sorted & table.mask() != 0
    }

    /// Row count of `table`, zero if absent
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Row counts of all present tables
    #[must_use]
    pub fn table_summary(&self) -> Vec<TableSummary> {
        TableId::iter()
            .filter(|table| self.has_table(*table))
            .map(|table_id| TableSummary {
                table_id,
                row_count: self.row_count(table_id),
            })
            .collect()
    }

    /// Typed access to the table of row type `T`, `None` if the table is absent
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'a, T>> {
        if !self.has_table(T::TABLE) {
            return None;
        }

        let start = self.info.table_offset(T::TABLE);
        MetadataTable::new(
            self.data.get(start..)?,
            self.info.clone(),
            self.is_sorted(T::TABLE),
            self.lifeline,
        )
        .ok()
    }

    /// The raw bytes of the row at zero-based `index` of `table`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is not below the row count, and
    /// [`crate::Error::Disposed`] once the image is disposed.
    pub fn row(&self, table: TableId, index: u32) -> Result<&'a [u8]> {
        self.lifeline.check()?;
        if index >= self.info.rows(table) {
            return Err(out_of_bounds_error!());
        }

        let row_size = self.info.row_size(table) as usize;
        let start = self.info.table_offset(table) + index as usize * row_size;
        self.data
            .get(start..start + row_size)
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Decode column `column` of the row at zero-based `index` of `table`.
    ///
    /// # Errors
    /// Same as [`TablesHeader::row`], plus [`crate::Error::OutOfBounds`] for an unknown
    /// column and [`crate::Error::Malformed`] for an invalid coded index tag.
    pub fn column(&self, table: TableId, index: u32, column: usize) -> Result<ColumnValue> {
        let row = self.row(table, index)?;
        let kind = columns(table)
            .get(column)
            .map(|column| column.kind)
            .ok_or_else(|| out_of_bounds_error!())?;
        let mut offset = self
            .info
            .column_offset(table, column)
            .ok_or_else(|| out_of_bounds_error!())?;

        let width = self.info.column_size(kind);
        let raw = match width {
            1 => u32::from(read_le_at::<u8>(row, &mut offset)?),
            _ => read_le_at_dyn(row, &mut offset, width == 4)?,
        };

        Ok(match kind {
            ColumnType::Fixed1 | ColumnType::Fixed2 | ColumnType::Fixed4 => {
                ColumnValue::Constant(raw)
            }
            ColumnType::Str => ColumnValue::String(raw),
            ColumnType::Guid => ColumnValue::Guid(raw),
            ColumnType::Blob => ColumnValue::Blob(raw),
            ColumnType::Index(target) => {
                ColumnValue::Token(Token::decode(IndexEncoding::Table(target), raw)?)
            }
            ColumnType::Coded(coded) => {
                ColumnValue::Token(Token::decode(IndexEncoding::Coded(coded), raw)?)
            }
        })
    }
}

impl std::fmt::Debug for TablesHeader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TablesHeader")
            .field("version", &(self.major_version, self.minor_version))
            .field("valid", &format_args!("{:#x}", self.valid))
            .field("sorted", &format_args!("{:#x}", self.sorted))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{ModuleRaw, TypeDefRaw, TypeRefRaw};

    fn header(valid: u64, sorted: u64, heap_sizes: u8, rows: &[u32]) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0, 2, 0, heap_sizes, 1];
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&sorted.to_le_bytes());
        for count in rows {
            data.extend_from_slice(&count.to_le_bytes());
        }
        data
    }

    fn crafted() -> Vec<u8> {
        let valid = TableId::Module.mask() | TableId::TypeRef.mask() | TableId::TypeDef.mask();
        let mut data = header(valid, 0, 0, &[1, 2, 2]);

        // Module
        data.extend_from_slice(&[0x00, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        // TypeRef: AssemblyRef 1, name, namespace
        data.extend_from_slice(&[0x06, 0x00, 0x14, 0x00, 0x1B, 0x00]);
        data.extend_from_slice(&[0x06, 0x00, 0x22, 0x00, 0x1B, 0x00]);
        // TypeDef: <Module>, then Program extending TypeRef 1
        data.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
        ]);
        data.extend_from_slice(&[
            0x01, 0x00, 0x10, 0x00, 0x33, 0x00, 0x3B, 0x00, 0x05, 0x00, 0x01, 0x00, 0x01, 0x00,
        ]);
        data
    }

    #[test]
    fn parse() {
        let data = crafted();
        let tables = TablesHeader::from(&data).unwrap();

        assert_eq!(tables.major_version, 2);
        assert_eq!(tables.table_count(), 3);
        assert!(tables.has_table(TableId::TypeDef));
        assert!(!tables.has_table(TableId::Field));
        assert_eq!(tables.row_count(TableId::TypeRef), 2);
        assert_eq!(tables.row_count(TableId::Field), 0);
        assert_eq!(
            tables.table_summary(),
            vec![
                TableSummary { table_id: TableId::Module, row_count: 1 },
                TableSummary { table_id: TableId::TypeRef, row_count: 2 },
                TableSummary { table_id: TableId::TypeDef, row_count: 2 },
            ]
        );

        let module = tables.table::<ModuleRaw>().unwrap();
        assert_eq!(module.get(0).unwrap().name, 0x0A);

        let typeref = tables.table::<TypeRefRaw>().unwrap();
        assert_eq!(typeref.get(1).unwrap().type_name, 0x22);

        let typedef = tables.table::<TypeDefRaw>().unwrap();
        let program = typedef.get(1).unwrap();
        assert_eq!(program.token.value(), 0x0200_0002);
        assert_eq!(program.extends.value(), 0x0100_0001);

        assert!(tables.table::<crate::metadata::tables::FieldRaw>().is_none());
    }

    #[test]
    fn rows_and_columns() {
        let data = crafted();
        let tables = TablesHeader::from(&data).unwrap();

        let row = tables.row(TableId::TypeDef, 1).unwrap();
        assert_eq!(row.len(), 14);
        assert_eq!(row[0], 0x01);
        assert!(matches!(
            tables.row(TableId::TypeDef, 2),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(tables.row(TableId::Field, 0).is_err());

        assert_eq!(
            tables.column(TableId::TypeDef, 1, 0).unwrap(),
            ColumnValue::Constant(0x0010_0001)
        );
        assert_eq!(
            tables.column(TableId::TypeDef, 1, 1).unwrap(),
            ColumnValue::String(0x33)
        );
        assert_eq!(
            tables.column(TableId::TypeDef, 1, 3).unwrap(),
            ColumnValue::Token(Token::new(0x0100_0001))
        );
        assert_eq!(
            tables.column(TableId::TypeDef, 1, 4).unwrap(),
            ColumnValue::Token(Token::new(0x0400_0001))
        );
        assert_eq!(
            tables.column(TableId::Module, 0, 2).unwrap(),
            ColumnValue::Guid(1)
        );
        assert_eq!(
            tables.column(TableId::TypeRef, 0, 0).unwrap(),
            ColumnValue::Token(Token::new(0x2300_0001))
        );
        assert!(tables.column(TableId::TypeDef, 1, 6).is_err());
    }

    #[test]
    fn base_offsets() {
        let data = crafted();
        let tables = TablesHeader::from(&data).unwrap();
        let info = tables.info();

        let start = data.len() - info.total_size();
        assert_eq!(start, 24 + 3 * 4);
        assert_eq!(info.table_offset(TableId::TypeRef), 10);
        assert_eq!(info.table_offset(TableId::TypeDef), 10 + 2 * 6);
        assert_eq!(tables.row(TableId::TypeRef, 0).unwrap(), &data[start + 10..start + 16]);
    }

    #[test]
    fn extra_data() {
        let valid = TableId::Module.mask();
        let mut data = header(valid, 0, HeapSizes::EXTRA_DATA.bits(), &[1]);
        data.extend_from_slice(&[0xEE; 4]);
        data.extend_from_slice(&[0x00, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let tables = TablesHeader::from(&data).unwrap();
        let module = tables.table::<ModuleRaw>().unwrap();
        assert_eq!(module.get(0).unwrap().name, 0x0A);
        assert_eq!(module.get(0).unwrap().mvid, 1);
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            TablesHeader::from(&[0_u8; 23]),
            Err(Error::Malformed { .. })
        ));

        let unknown = header(1 << 0x2D, 0, 0, &[1]);
        assert!(matches!(
            TablesHeader::from(&unknown),
            Err(Error::NotSupported(_))
        ));

        let missing_counts = header(TableId::Module.mask() | TableId::TypeDef.mask(), 0, 0, &[1]);
        assert!(matches!(
            TablesHeader::from(&missing_counts),
            Err(Error::Malformed { .. })
        ));

        let mut short = crafted();
        short.pop();
        assert!(matches!(
            TablesHeader::from(&short),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn sorted_flag() {
        let data = crafted();
        let tables = TablesHeader::from(&data).unwrap();
        assert!(!tables.is_sorted(TableId::TypeDef));

        let typedef = tables.table::<TypeDefRaw>().unwrap();
        assert!(matches!(
            typedef.children(&1, |row| row.field_list),
            Err(Error::Precondition(_))
        ));
    }
}
