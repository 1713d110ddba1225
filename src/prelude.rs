//! # clrmap Prelude
//!
//! The types most callers need to load a module and walk its metadata, in one import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all clrmap operations
pub use crate::Error;

/// The result type used throughout clrmap
pub use crate::Result;

/// Validation policy and load options
pub use crate::{LoadOptions, ValidationConfig};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// A loaded module and a multi-module assembly
pub use crate::{Assembly, CilView};

/// The verified bytes of an image
pub use crate::{File, Parser};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata tokens
pub use crate::metadata::token::{IndexEncoding, Token};

/// Table catalogue and typed access
pub use crate::metadata::tables::{CodedIndexType, MetadataTable, RowReadable, TableId, TableInfo};

/// Streams and heaps
pub use crate::metadata::streams::{Blob, Guid, StreamKind, Strings, TablesHeader, UserStrings};

/// Decoded signatures
pub use crate::metadata::signatures::{
    FieldSignature, GenericScope, LocalVariables, MethodSignature, PrimitiveType, TypeExpression,
};

/// Method bodies
pub use crate::metadata::method::{ExceptionClause, MethodBody, MethodHeader};
