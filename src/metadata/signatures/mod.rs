//! Signature decoding (ECMA-335 II.23.2).
//!
//! Signatures are compressed blobs in the `#Blob` heap that describe the types of fields,
//! locals and properties, the shape of methods, and instantiations of generic types and
//! methods. They decode into [`TypeExpression`] trees.
//!
//! # Signature kinds
//!
//! | Head byte         | Kind                                 | Decoded as              |
//! |-------------------|--------------------------------------|-------------------------|
//! | convention flags  | `MethodDefSig`, `MethodRefSig`, ...  | [`MethodSignature`]     |
//! | `0x06`            | `FieldSig`                           | [`FieldSignature`]      |
//! | `0x07`            | `LocalVarSig`                        | [`LocalVariables`]      |
//! | `0x08`            | `PropertySig`                        | [`PropertySignature`]   |
//! | `0x0A`            | `MethodSpec` instantiation           | [`MethodSpecSignature`] |
//! | any element type  | `TypeSpec`                           | [`TypeExpression`]      |
//!
//! # Generic parameters
//!
//! `VAR n` and `MVAR n` are resolved while decoding, against a [`GenericScope`]. A scope built
//! with [`GenericScope::for_type`] or [`GenericScope::for_method`] maps the position to its
//! `GenericParam` row; [`GenericScope::open`] leaves it unresolved.
//!
//! # Examples
//!
//! ```rust
//! use clrmap::metadata::signatures::{parse_local_var_signature, GenericScope, PrimitiveType, TypeExpression};
//!
//! // int32, string
//! let locals = parse_local_var_signature(&[0x07, 0x02, 0x08, 0x0E], &GenericScope::none())?;
//! assert_eq!(locals.locals[0], TypeExpression::Primitive(PrimitiveType::I4));
//! # Ok::<(), clrmap::Error>(())
//! ```

mod parser;
mod scope;
mod types;

pub use parser::*;
pub use scope::GenericScope;
pub use types::*;

use crate::Result;

/// Parse a method signature from `data`.
///
/// # Errors
/// Returns an error if the signature is malformed, truncated or references a generic
/// parameter outside of `scope`.
pub fn parse_method_signature(data: &[u8], scope: &GenericScope) -> Result<MethodSignature> {
    SignatureParser::new(data, scope).parse_method_signature()
}

/// Parse a field signature from `data`.
///
/// # Errors
/// Same as [`parse_method_signature`].
pub fn parse_field_signature(data: &[u8], scope: &GenericScope) -> Result<FieldSignature> {
    SignatureParser::new(data, scope).parse_field_signature()
}

/// Parse a property signature from `data`.
///
/// # Errors
/// Same as [`parse_method_signature`].
pub fn parse_property_signature(data: &[u8], scope: &GenericScope) -> Result<PropertySignature> {
    SignatureParser::new(data, scope).parse_property_signature()
}

/// Parse a local variable signature from `data`.
///
/// # Errors
/// Same as [`parse_method_signature`].
pub fn parse_local_var_signature(data: &[u8], scope: &GenericScope) -> Result<LocalVariables> {
    SignatureParser::new(data, scope).parse_local_var_signature()
}

/// Parse a `TypeSpec` blob from `data`.
///
/// # Errors
/// Same as [`parse_method_signature`].
pub fn parse_type_spec_signature(data: &[u8], scope: &GenericScope) -> Result<TypeExpression> {
    SignatureParser::new(data, scope).parse_type_spec_signature()
}

/// Parse a `MethodSpec` instantiation from `data`.
///
/// # Errors
/// Same as [`parse_method_signature`].
pub fn parse_method_spec_signature(
    data: &[u8],
    scope: &GenericScope,
) -> Result<MethodSpecSignature> {
    SignatureParser::new(data, scope).parse_method_spec_signature()
}
