//! Little-endian primitive reads over borrowed byte slices.
//!
//! Every multi-byte field of a PE image and of the ECMA-335 metadata is stored little-endian.
//! The helpers in this module read such fields from a `&[u8]` with full bounds checking, either
//! at the start of a slice ([`read_le`]) or at a cursor that is advanced past the value
//! ([`read_le_at`]). [`read_le_at_dyn`] covers the metadata table columns whose width is
//! decided at load time (2 or 4 bytes).
//!
//! None of these functions panic; a read past the end of the slice yields
//! [`crate::Error::OutOfBounds`].

use crate::Result;

/// Primitive values that can be decoded from a fixed number of little-endian bytes.
pub trait CilIO: Sized {
    /// Fixed size byte array holding the encoded value
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode the value from its little-endian representation
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Read a `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Read a `T` at `offset` and advance `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value would extend past the end of `data`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or_else(|| out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Read a 2 or 4 byte unsigned value at `offset`, widened to `u32`, and advance `offset`.
///
/// Metadata table columns referencing heaps, tables or coded indexes are stored with a width
/// that depends on the sizes of the referenced heap or tables.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value would extend past the end of `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}
