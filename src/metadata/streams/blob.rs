//! Blob Heap (`#Blob`) for .NET Metadata
//!
//! Every blob is prefixed with its length in the compressed unsigned integer encoding:
//!
//! | First byte  | Prefix | Length range   |
//! |-------------|--------|----------------|
//! | `0xxxxxxx`  | 1      | 0 - 127        |
//! | `10xxxxxx`  | 2      | 0 - 16383      |
//! | `110xxxxx`  | 4      | 0 - 2^29 - 1   |
//!
//! Lookups return a borrowed span into the heap; blob contents are never copied.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::decode_compressed_uint, file::Lifeline, Result};

/// The `#Blob` heap.
#[derive(Debug)]
pub struct Blob<'a> {
    data: &'a [u8],
    lifeline: Lifeline<'a>,
}

impl<'a> Blob<'a> {
    /// Create a heap over `data`, not tied to any image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `data` is empty or does not start with the empty
    /// blob.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        Blob::with_lifeline(data, Lifeline::detached())
    }

    /// Create a heap over `data` tied to the given lifeline.
    ///
    /// # Errors
    /// Same as [`Blob::from`].
    pub fn with_lifeline(data: &'a [u8], lifeline: Lifeline<'a>) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("#Blob heap must start with the empty blob"));
        }

        Ok(Blob { data, lifeline })
    }

    /// Size of the heap in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the heap only holds the empty blob
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 1
    }

    /// The blob whose length prefix starts at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] once the image is disposed,
    /// [`crate::Error::OutOfBounds`] if the prefix or the content extends past the heap, and
    /// [`crate::Error::Malformed`] for an invalid length prefix.
    pub fn get(&self, offset: u32) -> Result<&'a [u8]> {
        self.lifeline.check()?;

        let tail = self
            .data
            .get(offset as usize..)
            .ok_or_else(|| out_of_bounds_error!())?;
        let (length, prefix) = decode_compressed_uint(tail)?;

        tail.get(prefix..prefix + length as usize)
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Iterate over all blobs in heap order, yielding each offset and content.
    ///
    /// Iteration ends at the first malformed prefix.
    #[must_use]
    pub fn iter(&self) -> BlobIterator<'_, 'a> {
        BlobIterator {
            blob: self,
            position: 0,
        }
    }
}

/// Sequential iterator over the blobs of a heap
pub struct BlobIterator<'b, 'a> {
    blob: &'b Blob<'a>,
    position: usize,
}

impl<'a> Iterator for BlobIterator<'_, 'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = u32::try_from(self.position).ok()?;
        if self.position >= self.blob.data.len() {
            return None;
        }

        match self.blob.get(offset) {
            Ok(content) => {
                let prefix = decode_compressed_uint(&self.blob.data[self.position..])
                    .map(|(_, prefix)| prefix)
                    .ok()?;
                self.position += prefix + content.len();
                Some((offset, content))
            }
            Err(_) => {
                self.position = self.blob.data.len();
                None
            }
        }
    }
}
