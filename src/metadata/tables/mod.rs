//! Metadata tables (ECMA-335 II.22).
//!
//! This module holds everything needed to address the rows of the `#~` stream:
//!
//! - [`TableId`] and [`CodedIndexType`], the fixed catalogue of tables and coded index kinds
//! - [`schema`], the column list of every table
//! - [`TableInfo`], the layout engine computing column widths, row sizes and table offsets
//! - [`MetadataTable`], typed random access to the rows of one table, including the binary
//!   searches over sorted tables
//! - [`rows`], the typed raw row structs
//! - list ranges and owner lookups on [`crate::metadata::streams::TablesHeader`], built on the
//!   range search
//!
//! The `#~` stream header itself, which ties these together, lives in
//! [`crate::metadata::streams::TablesHeader`].

mod codedindex;
mod relations;
pub mod rows;
pub mod schema;
mod search;
mod table;
mod tableid;
mod tableinfo;

pub use codedindex::CodedIndexType;
pub use rows::*;
pub use schema::{Column, ColumnType};
pub use table::{MetadataTable, TableIterator};
pub use tableid::TableId;
pub use tableinfo::{HeapSizes, TableInfo, TableInfoRef, MAX_ROWS};
