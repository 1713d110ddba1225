//! User String Heap (`#US`) for .NET Metadata
//!
//! The `#US` heap holds the string literals used by `ldstr`. Entries share the blob layout: a
//! compressed length prefix, the UTF-16LE code units, and one trailing flag byte that is set when
//! the string contains characters needing special handling.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use widestring::U16String;

use crate::{file::parser::decode_compressed_uint, file::Lifeline, Result};

/// The `#US` heap.
#[derive(Debug)]
pub struct UserStrings<'a> {
    data: &'a [u8],
    lifeline: Lifeline<'a>,
}

impl<'a> UserStrings<'a> {
    /// Create a heap over `data`, not tied to any image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `data` does not start with the empty entry.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        UserStrings::with_lifeline(data, Lifeline::detached())
    }

    /// Create a heap over `data` tied to the given lifeline.
    ///
    /// # Errors
    /// Same as [`UserStrings::from`].
    pub fn with_lifeline(data: &'a [u8], lifeline: Lifeline<'a>) -> Result<UserStrings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("#US heap must start with the empty string"));
        }

        Ok(UserStrings { data, lifeline })
    }

    /// Size of the heap in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the heap only holds the empty entry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    /// The string whose entry starts at `offset`, e.g. the low 24 bits of an `ldstr` token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] once the image is disposed,
    /// [`crate::Error::OutOfBounds`] if the entry extends past the heap, and
    /// [`crate::Error::Malformed`] for an invalid length prefix.
    pub fn get(&self, offset: u32) -> Result<U16String> {
        self.lifeline.check()?;

        let tail = self
            .data
            .get(offset as usize..)
            .ok_or_else(|| out_of_bounds_error!())?;
        let (length, prefix) = decode_compressed_uint(tail)?;
        let entry = tail
            .get(prefix..prefix + length as usize)
            .ok_or_else(|| out_of_bounds_error!())?;

        // Drop the trailing flag byte of non-empty entries
        let units = &entry[..entry.len() - entry.len() % 2];
        let chars: Vec<u16> = units
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(U16String::from_vec(chars))
    }
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;
    use crate::Error;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 30] = [
            0x00,
            0x1b, 0x48, 0x00, 0x65, 0x00, 0x6c, 0x00, 0x6c, 0x00, 0x6f, 0x00, 0x2c, 0x00, 0x20, 0x00,
            0x57, 0x00, 0x6f, 0x00, 0x72, 0x00, 0x6c, 0x00, 0x64, 0x00, 0x21, 0x00, 0x00,
            0x00,
        ];

        let heap = UserStrings::from(&data).unwrap();
        assert_eq!(heap.get(1).unwrap().as_ustr(), u16str!("Hello, World!"));
        assert_eq!(heap.get(0).unwrap().len(), 0);
        assert_eq!(heap.get(29).unwrap().len(), 0);
    }

    #[test]
    fn truncated() {
        let data = [0x00, 0x09, 0x41, 0x00];
        let heap = UserStrings::from(&data).unwrap();

        assert!(matches!(heap.get(1), Err(Error::OutOfBounds { .. })));
        assert!(heap.get(8).is_err());
        assert!(UserStrings::from(&[0x01]).is_err());
    }
}
