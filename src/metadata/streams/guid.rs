//! GUID Heap (`#GUID`) for .NET Metadata
//!
//! The `#GUID` heap is an array of 16-byte GUIDs. Tables refer to an entry by its one-based
//! ordinal; ordinal 0 means "no GUID".
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::Lifeline, Result};

const GUID_SIZE: usize = 16;

/// The `#GUID` heap.
#[derive(Debug)]
pub struct Guid<'a> {
    data: &'a [u8],
    lifeline: Lifeline<'a>,
}

impl<'a> Guid<'a> {
    /// Create a heap over `data`, not tied to any image
    #[must_use]
    pub fn from(data: &'a [u8]) -> Guid<'a> {
        Guid::with_lifeline(data, Lifeline::detached())
    }

    /// Create a heap over `data` tied to the given lifeline
    #[must_use]
    pub fn with_lifeline(data: &'a [u8], lifeline: Lifeline<'a>) -> Guid<'a> {
        Guid { data, lifeline }
    }

    /// Number of complete GUIDs in the heap
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / GUID_SIZE
    }

    /// The GUID with one-based `ordinal`, `None` for ordinal 0.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] once the image is disposed and
    /// [`crate::Error::OutOfBounds`] if the ordinal is past the end of the heap.
    pub fn get(&self, ordinal: u32) -> Result<Option<uguid::Guid>> {
        self.lifeline.check()?;

        let Some(index) = (ordinal as usize).checked_sub(1) else {
            return Ok(None);
        };

        let start = index
            .checked_mul(GUID_SIZE)
            .ok_or_else(|| out_of_bounds_error!())?;
        let bytes: [u8; GUID_SIZE] = self
            .data
            .get(start..start + GUID_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| out_of_bounds_error!())?;

        Ok(Some(uguid::Guid::from_bytes(bytes)))
    }
}
