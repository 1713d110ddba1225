//! Cursor based reader for compressed metadata encodings.
//!
//! [`Parser`] walks a borrowed byte slice and understands the variable length encodings of
//! ECMA-335 Partition II §23.2: compressed unsigned and signed integers (used for blob lengths
//! and throughout signatures) and the compressed `TypeDefOrRefOrSpecEncoded` token form.
//!
//! # Example
//!
//! ```rust
//! use clrmap::Parser;
//!
//! let data = [0x7F, 0x80, 0x80, 0xC0, 0x00, 0x40, 0x00];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_compressed_uint()?, 127);
//! assert_eq!(parser.read_compressed_uint()?, 128);
//! assert_eq!(parser.read_compressed_uint()?, 0x4000);
//! assert!(!parser.has_more_data());
//! # Ok::<(), clrmap::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    metadata::{tables::TableId, token::Token},
    Result,
};

/// Largest value representable by the 4-byte compressed integer form.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// A position tracking reader over a borrowed byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the underlying data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the cursor has not yet reached the end of the data
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left after the cursor
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Current position of the cursor
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the cursor to `pos`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if this would move past the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let target = self
            .position
            .checked_add(step)
            .ok_or_else(|| out_of_bounds_error!())?;
        self.seek(target)
    }

    /// Look at the next byte without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Read a little-endian `T` and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `length` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(length)
            .ok_or_else(|| out_of_bounds_error!())?;
        let bytes = self
            .data
            .get(self.position..end)
            .ok_or_else(|| out_of_bounds_error!())?;

        self.position = end;
        Ok(bytes)
    }

    /// Read a compressed unsigned integer (ECMA-335 II.23.2).
    ///
    /// | First byte  | Length | Value bits |
    /// |-------------|--------|------------|
    /// | `0xxxxxxx`  | 1      | 7          |
    /// | `10xxxxxx`  | 2      | 14         |
    /// | `110xxxxx`  | 4      | 29         |
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding is truncated and
    /// [`crate::Error::Malformed`] if the first byte starts with `111`.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let remaining = self.data.get(self.position..).unwrap_or_default();
        let (value, consumed) = decode_compressed_uint(remaining)?;
        self.position += consumed;
        Ok(value)
    }

    /// Read a compressed signed integer (ECMA-335 II.23.2).
    ///
    /// The value is rotated left by one bit with the sign in bit zero, then encoded with the
    /// unsigned scheme. Negative values are sign-extended from the width of the form used.
    ///
    /// # Errors
    /// Same as [`Parser::read_compressed_uint`].
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let start = self.position;
        let unsigned = self.read_compressed_uint()?;

        let magnitude = (unsigned >> 1) as i32;
        if unsigned & 1 == 0 {
            return Ok(magnitude);
        }

        let bias = match self.position - start {
            1 => 0x40,
            2 => 0x2000,
            _ => 0x1000_0000,
        };
        Ok(magnitude - bias)
    }

    /// Read a compressed `TypeDefOrRefOrSpecEncoded` token (ECMA-335 II.23.2.8).
    ///
    /// The two low bits select `TypeDef`, `TypeRef` or `TypeSpec`; the remaining bits hold the
    /// one-based row. A row of zero yields the null token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for the unused tag `3`.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let encoded = self.read_compressed_uint()?;

        let table = match encoded & 0x3 {
            0x0 => TableId::TypeDef,
            0x1 => TableId::TypeRef,
            0x2 => TableId::TypeSpec,
            _ => return Err(malformed_error!("Invalid compressed token - {}", encoded)),
        };

        Ok(Token::from_rid(table, encoded >> 2))
    }
}

/// Decode a compressed unsigned integer from the start of `data`.
///
/// Returns the value and the number of bytes the encoding occupied.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short for the indicated form and
/// [`crate::Error::Malformed`] for a first byte of the form `111xxxxx`.
pub fn decode_compressed_uint(data: &[u8]) -> Result<(u32, usize)> {
    let first_byte = *data.first().ok_or_else(|| out_of_bounds_error!())?;

    // 1-byte encoding: 0xxxxxxx
    if first_byte & 0x80 == 0 {
        return Ok((u32::from(first_byte), 1));
    }

    // 2-byte encoding: 10xxxxxx xxxxxxxx
    if first_byte & 0xC0 == 0x80 {
        let second = *data.get(1).ok_or_else(|| out_of_bounds_error!())?;
        let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second);
        return Ok((value, 2));
    }

    // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
    if first_byte & 0xE0 == 0xC0 {
        let rest = data.get(1..4).ok_or_else(|| out_of_bounds_error!())?;
        let value = ((u32::from(first_byte) & 0x1F) << 24)
            | (u32::from(rest[0]) << 16)
            | (u32::from(rest[1]) << 8)
            | u32::from(rest[2]);
        return Ok((value, 4));
    }

    Err(malformed_error!("Invalid compressed uint - {}", first_byte))
}

/// Encode `value` with the compressed unsigned integer scheme.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] for values above [`MAX_COMPRESSED_UINT`].
pub fn encode_compressed_uint(value: u32) -> Result<Vec<u8>> {
    match value {
        0..=0x7F => Ok(vec![value as u8]),
        0x80..=0x3FFF => Ok(vec![0x80 | (value >> 8) as u8, value as u8]),
        0x4000..=MAX_COMPRESSED_UINT => Ok(vec![
            0xC0 | (value >> 24) as u8,
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ]),
        _ => Err(crate::Error::NotSupported(format!(
            "{value:#x} exceeds the compressed integer range"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_compressed_uint() {
        let test_cases = vec![
            (vec![0x03], 3),                             // 1-byte format
            (vec![0x7F], 0x7F),                          // 1-byte format, max value
            (vec![0x80, 0x80], 0x80),                    // 2-byte format, min value
            (vec![0xBF, 0xFF], 0x3FFF),                  // 2-byte format, max value
            (vec![0xC0, 0x00, 0x40, 0x00], 0x4000),      // 4-byte format, min value
            (vec![0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF), // 4-byte format, max value
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            let result = parser.read_compressed_uint().unwrap();
            assert_eq!(result, expected);
            assert!(!parser.has_more_data());
        }

        // Error on empty data
        let mut parser = Parser::new(&[]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::OutOfBounds { .. })
        ));

        // Reserved prefix
        let mut parser = Parser::new(&[0xE0, 0, 0, 0]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_read_compressed_int() {
        // Examples from ECMA-335 II.23.2
        let test_cases = vec![
            (vec![0x06], 3),
            (vec![0x7B], -3),
            (vec![0x80, 0x80], 64),
            (vec![0x01], -64),
            (vec![0xC0, 0x00, 0x40, 0x00], 8192),
            (vec![0x80, 0x01], -8192),
            (vec![0xDF, 0xFF, 0xFF, 0xFE], 268_435_455),
            (vec![0xC0, 0x00, 0x00, 0x01], -268_435_456),
        ];

        for (input, expected) in test_cases {
            let mut parser = Parser::new(&input);
            assert_eq!(parser.read_compressed_int().unwrap(), expected);
        }
    }

    #[test]
    fn test_read_compressed_token() {
        let mut parser = Parser::new(&[0x05, 0x08, 0x0A, 0x00, 0x03]);

        let token = parser.read_compressed_token().unwrap();
        assert_eq!(token.value(), 0x0100_0001);

        let token = parser.read_compressed_token().unwrap();
        assert_eq!(token.value(), 0x0200_0002);

        let token = parser.read_compressed_token().unwrap();
        assert_eq!(token.value(), 0x1B00_0002);

        let token = parser.read_compressed_token().unwrap();
        assert!(token.is_null());

        assert!(matches!(
            parser.read_compressed_token(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_error_handling() {
        let mut parser = Parser::new(&[0x08]);
        assert!(matches!(parser.read_compressed_uint(), Ok(8)));
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::OutOfBounds { .. })
        ));

        let mut parser = Parser::new(&[0xC0, 0x01]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_encode_boundaries() {
        for value in [0, 127, 128, 16_383, 16_384, MAX_COMPRESSED_UINT] {
            let encoded = encode_compressed_uint(value).unwrap();
            assert_eq!(decode_compressed_uint(&encoded).unwrap(), (value, encoded.len()));
        }

        assert!(encode_compressed_uint(MAX_COMPRESSED_UINT + 1).is_err());
    }

    #[test]
    fn test_read_bytes() {
        let data = [1, 2, 3, 4];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_bytes(3).unwrap(), &[1, 2, 3]);
        assert_eq!(parser.remaining(), 1);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.peek_byte().unwrap(), 4);
        parser.advance_by(1).unwrap();
        assert!(parser.peek_byte().is_err());
    }
}
