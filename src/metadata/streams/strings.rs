//! String Heap (`#Strings`) for .NET Metadata
//!
//! The `#Strings` heap stores identifier strings as NUL-terminated UTF-8. Tables refer to a
//! string by its byte offset into the heap; offset 0 is always the empty string.
//!
//! The terminator search uses the injected [`NulScanner`], and the length found for each
//! offset is cached, so a repeated lookup of the same offset validates the bytes once and
//! always yields the same string.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::str;

use dashmap::DashMap;

use crate::{
    file::{
        platform::{NulScanner, DEFAULT_SCANNER},
        Lifeline,
    },
    Result,
};

/// The `#Strings` heap.
pub struct Strings<'a> {
    data: &'a [u8],
    scanner: &'static dyn NulScanner,
    lengths: DashMap<u32, u32>,
    lifeline: Lifeline<'a>,
}

impl<'a> Strings<'a> {
    /// Create a heap over `data` using the default scanner, not tied to any image
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `data` is empty or does not start with NUL.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        Strings::with_scanner(data, &DEFAULT_SCANNER, Lifeline::detached())
    }

    /// Create a heap over `data` with an explicit scanner and lifeline.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `data` is empty or does not start with NUL.
    pub fn with_scanner(
        data: &'a [u8],
        scanner: &'static dyn NulScanner,
        lifeline: Lifeline<'a>,
    ) -> Result<Strings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!(
                "#Strings heap must start with the empty string"
            ));
        }

        Ok(Strings {
            data,
            scanner,
            lengths: DashMap::new(),
            lifeline,
        })
    }

    /// Size of the heap in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the heap only holds the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    /// The string starting at byte `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] once the image is disposed,
    /// [`crate::Error::OutOfBounds`] if `offset` is outside the heap, and
    /// [`crate::Error::Malformed`] if the string is unterminated or not valid UTF-8.
    pub fn get(&self, offset: u32) -> Result<&'a str> {
        self.lifeline.check()?;

        let start = offset as usize;
        let Some(tail) = self.data.get(start..).filter(|tail| !tail.is_empty()) else {
            return Err(out_of_bounds_error!());
        };

        if let Some(length) = self.lengths.get(&offset) {
            let bytes = &tail[..*length as usize];
            return str::from_utf8(bytes)
                .map_err(|_| malformed_error!("Invalid string at offset - {}", offset));
        }

        let length = self.scanner.scan_for_nul(tail, tail.len());
        if length >= tail.len() {
            return Err(malformed_error!("Unterminated string at offset - {}", offset));
        }

        let value = str::from_utf8(&tail[..length])
            .map_err(|_| malformed_error!("Invalid string at offset - {}", offset))?;

        // Concurrent first reads insert the same length
        self.lengths.entry(offset).or_insert(length as u32);
        Ok(value)
    }

    /// Number of distinct offsets resolved so far
    #[must_use]
    pub fn cached(&self) -> usize {
        self.lengths.len()
    }
}

impl std::fmt::Debug for Strings<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strings")
            .field("len", &self.data.len())
            .field("cached", &self.lengths.len())
            .finish_non_exhaustive()
    }
}
