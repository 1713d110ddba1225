//! CLI metadata of a managed image (ECMA-335 Partition II).
//!
//! The metadata of a module hangs off the CLR header in the image's CLI directory:
//!
//! - [`cor20header`] - the CLR header, its directories and flags
//! - [`root`] - the metadata root and its stream directory
//! - [`streams`] - the `#~` table stream and the four heaps
//! - [`tables`] - table catalogue, layout engine, typed rows and range queries
//! - [`token`] - metadata tokens and coded index decoding
//! - [`signatures`] - signature blobs decoded into type expressions
//! - [`method`] - method headers, bodies and exception clauses
//!
//! [`cilview::CilView`] ties them together for one module, [`assembly::Assembly`] for the
//! modules of one assembly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use clrmap::{metadata::tables::TypeDefRaw, CilView};
//!
//! let view = CilView::from_file("tests/samples/hello.dll".as_ref())?;
//! let tables = view.tables().expect("module without tables");
//! let strings = view.strings().expect("module without strings");
//!
//! if let Some(types) = tables.table::<TypeDefRaw>() {
//!     for row in types.iter() {
//!         println!("{}.{}", strings.get(row.type_namespace)?, strings.get(row.type_name)?);
//!     }
//! }
//! # Ok::<(), clrmap::Error>(())
//! ```

/// Multi-module assemblies
pub mod assembly;
/// A loaded module and its parsed metadata
pub mod cilview;
/// The CLR header
pub mod cor20header;
/// Method headers and bodies
pub mod method;
/// The metadata root
pub mod root;
/// Signature decoding
pub mod signatures;
/// Metadata streams and heaps
pub mod streams;
/// Metadata tables
pub mod tables;
/// Metadata tokens
pub mod token;
