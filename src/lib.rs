// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![deny(unsafe_code)]
// - 'file/physical.rs' maps the image with memmap2, which is unsafe by contract

//! # clrmap
//!
//! Validated, zero-copy access to the PE headers, metadata tables, heaps and signatures of
//! .NET executables.
//!
//! `clrmap` maps a managed image, verifies its PE/COFF container, its CLR header and its
//! metadata root in one pass, and then hands out borrowed views of the ECMA-335 metadata:
//! table rows, heap entries and decoded signatures. Nothing is copied out of the image until a
//! caller asks for it, and nothing is decoded twice.
//!
//! ## Features
//!
//! - **Verified loading** - DOS, COFF, optional header and section table checks before any
//!   metadata is touched
//! - **Table layout engine** - row sizes, coded index widths and table offsets for every
//!   ECMA-335 table
//! - **Range queries** - owner lookups over sorted tables and list ranges over the
//!   `TypeDef`, `MethodDef`, `EventMap` and `PropertyMap` tables
//! - **Signatures** - method, field, property, local and `TypeSpec` blobs decoded into
//!   type expressions, with generic parameters resolved against their owners
//! - **Disposal** - an image can be released explicitly; every later access fails with
//!   [`Error::Disposed`] instead of reading freed memory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clrmap::prelude::*;
//!
//! let view = CilView::from_file("tests/samples/hello.dll".as_ref())?;
//! let tables = view.tables().expect("module without tables");
//!
//! println!("Metadata {}", view.root().version);
//! println!("{} types", tables.row_count(TableId::TypeDef));
//!
//! for rid in 1..=tables.row_count(TableId::MethodDef) {
//!     let signature = view.method_signature(rid)?;
//!     println!("{} parameters", signature.params.len());
//! }
//! # Ok::<(), clrmap::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - image backends, the PE/COFF verifier and RVA resolution
//! - [`metadata`] - CLR header, metadata root, streams, tables, tokens and signatures
//! - [`config`] - validation policy and load options
//! - [`utils`] - small concurrency helpers
//! - [`prelude`] - the commonly used types in one import
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. A file that fails verification is rejected as
//! a whole with [`Error::NotManagedExecutable`] (from a path) or [`Error::Malformed`] (from
//! memory); accesses past the bounds established at load fail with [`Error::OutOfBounds`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Validation policy and load options
pub mod config;

/// Image backends, PE/COFF verification and RVA resolution
pub mod file;

/// CLI metadata: CLR header, metadata root, streams, tables, tokens and signatures
///
/// # Examples
///
/// ```rust,no_run
/// use clrmap::CilView;
///
/// let view = CilView::from_file("tests/samples/hello.dll".as_ref())?;
/// if let Some(tables) = view.tables() {
///     println!("Tables present: {}", tables.table_count());
/// }
/// # Ok::<(), clrmap::Error>(())
/// ```
pub mod metadata;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use clrmap::prelude::*;
///
/// let view = CilView::from_file("tests/samples/hello.dll".as_ref())?;
/// println!("Entry point: {:?}", view.entry_point());
/// # Ok::<(), clrmap::Error>(())
/// ```
pub mod prelude;

/// Concurrency helpers
pub mod utils;

/// `clrmap` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `clrmap` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use clrmap::{CilView, Error};
///
/// match CilView::from_file(std::path::Path::new("tests/samples/hello.dll")) {
///     Ok(view) => println!("Loaded {}", view.root().version),
///     Err(Error::NotManagedExecutable { path, .. }) => {
///         println!("{} is not a valid managed executable", path.display())
///     }
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// A loaded module, see [`metadata::cilview::CilView`]
pub use metadata::cilview::CilView;

/// A manifest module and its siblings, see [`metadata::assembly::Assembly`]
pub use metadata::assembly::Assembly;

/// The verified bytes of an image, see [`file::File`]
pub use file::{File, Lifeline};

/// Validation policy and load options, see [`config`]
pub use config::{LoadOptions, ValidationConfig};

/// Little-endian cursor over a byte slice, see [`file::parser::Parser`]
pub use file::parser::Parser;
