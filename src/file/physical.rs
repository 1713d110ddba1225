use super::Backend;
use crate::Result;

use memmap2::Mmap;
use std::{fs, path::Path};

/// A read-only memory mapping of a file on disk.
///
/// The mapping stays valid for the lifetime of this value; dropping it unmaps the file.
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    #[allow(unsafe_code)]
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;

        // The mapping is read-only and never handed out mutably.
        let mmap = unsafe { Mmap::map(&file) }?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}
