//! Loading and verifying the raw bytes of an image.
//!
//! A [`File`] owns the bytes of one image through a [`Backend`] (a memory mapping or an owned
//! buffer) together with the verified PE headers. It is the only owner of the image memory;
//! every other structure in this crate borrows from it.
//!
//! # Disposal
//!
//! [`File::dispose`] poisons the image. Afterwards every accessor of the file, and of every heap,
//! table or view derived from it, fails with [`crate::Error::Disposed`] instead of reading the
//! mapped bytes. The memory itself is released when the last owner drops the `File`.

pub mod io;
pub mod parser;
pub mod pe;
pub mod platform;

mod memory;
mod physical;

use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{Error, Result};
use goblin::pe::data_directories::DataDirectory;
use memory::Memory;
use pe::PeImage;
use physical::Physical;

pub use memory::Memory as MemoryBackend;
pub use physical::Physical as PhysicalBackend;

/// Provides the bytes of an image.
///
/// Implementations must keep the returned slice stable for their whole lifetime.
pub trait Backend: Send + Sync {
    /// The complete image
    fn data(&self) -> &[u8];

    /// Length of the image in bytes
    fn len(&self) -> usize {
        self.data().len()
    }

    /// `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        self.data()
            .get(offset..offset_end)
            .ok_or_else(|| out_of_bounds_error!())
    }
}

static ALWAYS_LIVE: AtomicBool = AtomicBool::new(true);

/// A borrowed view of the liveness flag of a [`File`].
///
/// Every structure that hands out data borrowed from an image keeps a `Lifeline` and checks it
/// before each access.
#[derive(Clone, Copy, Debug)]
pub struct Lifeline<'a>(&'a AtomicBool);

impl<'a> Lifeline<'a> {
    /// A lifeline that is never disposed, for data that is not backed by a [`File`]
    #[must_use]
    pub fn detached() -> Lifeline<'static> {
        Lifeline(&ALWAYS_LIVE)
    }

    /// Returns true while the owning image has not been disposed
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Fails with [`crate::Error::Disposed`] once the owning image is disposed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] after [`File::dispose`].
    pub fn check(&self) -> Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(Error::Disposed)
        }
    }
}

/// A verified image and the memory backing it.
pub struct File {
    data: Box<dyn Backend>,
    pe: PeImage,
    live: AtomicBool,
}

impl File {
    /// Map the image at `path` and verify it.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be mapped, and
    /// [`crate::Error::NotManagedExecutable`] naming `path` if verification fails.
    pub fn from_file(path: &Path) -> Result<File> {
        let input = Physical::new(path)?;

        Self::load(input).map_err(|error| {
            if error.is_structural() {
                Error::NotManagedExecutable {
                    path: path.to_path_buf(),
                    source: Box::new(error),
                }
            } else {
                error
            }
        })
    }

    /// Verify an image held in memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer and [`crate::Error::Malformed`] if
    /// verification fails.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Error::Empty);
        }

        let pe = PeImage::parse(data.data())?;

        Ok(File {
            data: Box::new(data),
            pe,
            live: AtomicBool::new(true),
        })
    }

    /// Length of the image in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the image is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The verified PE headers
    #[must_use]
    pub fn pe(&self) -> &PeImage {
        &self.pe
    }

    /// The CLR runtime header directory
    #[must_use]
    pub fn clr(&self) -> DataDirectory {
        self.pe.clr()
    }

    /// The complete image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] after [`File::dispose`].
    pub fn data(&self) -> Result<&[u8]> {
        self.lifeline().check()?;
        Ok(self.data.data())
    }

    /// `len` bytes starting at file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Disposed`] after [`File::dispose`] and
    /// [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.lifeline().check()?;
        self.data.data_slice(offset, len)
    }

    /// `size` bytes at relative virtual address `rva`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range does not resolve to raw section data,
    /// and [`crate::Error::Disposed`] after [`File::dispose`].
    pub fn rva_slice(&self, rva: u32, size: u32) -> Result<&[u8]> {
        let offset = self
            .rva_to_offset(rva, size)
            .ok_or_else(|| out_of_bounds_error!())?;
        self.data_slice(offset, size as usize)
    }

    /// Map `[rva, rva + size)` to a file offset, see [`PeImage::resolve`]
    #[must_use]
    pub fn rva_to_offset(&self, rva: u32, size: u32) -> Option<usize> {
        self.pe.resolve(rva, size)
    }

    /// The liveness flag of this image
    #[must_use]
    pub fn lifeline(&self) -> Lifeline<'_> {
        Lifeline(&self.live)
    }

    /// Returns true once [`File::dispose`] has been called
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.lifeline().is_live()
    }

    /// Poison the image; all further accesses through it fail with
    /// [`crate::Error::Disposed`].
    ///
    /// Returns true for the call that performed the disposal and false for every later call.
    pub fn dispose(&self) -> bool {
        let disposed = self.live.swap(false, Ordering::AcqRel);
        if disposed {
            log::debug!("image of {} bytes disposed", self.len());
        }
        disposed
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("len", &self.len())
            .field("sections", &self.pe.sections.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ImageBuilder;

    #[test]
    fn load_crafted() {
        let file = File::from_mem(ImageBuilder::new().build()).unwrap();

        assert!(!file.is_empty());
        assert_eq!(file.clr().size, 72);
        assert_eq!(file.data().unwrap()[..2], *b"MZ");

        let clr = file.rva_slice(file.clr().virtual_address, 72).unwrap();
        assert_eq!(clr[..4], 72_u32.to_le_bytes());
    }

    #[test]
    fn empty() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Error::Empty)));
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            File::from_mem(vec![0_u8; 127]),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn path_qualified_rejection() {
        let temp_path = std::env::temp_dir().join("clrmap_not_managed.bin");
        std::fs::write(&temp_path, vec![0x4D_u8; 300]).unwrap();

        match File::from_file(&temp_path) {
            Err(Error::NotManagedExecutable { path, source }) => {
                assert_eq!(path, temp_path);
                assert!(matches!(*source, Error::Malformed { .. }));
            }
            other => panic!("unexpected result {other:?}"),
        }

        std::fs::remove_file(&temp_path).ok();
    }

    #[test]
    fn dispose() {
        let file = File::from_mem(ImageBuilder::new().build()).unwrap();
        let lifeline = file.lifeline();

        assert!(lifeline.check().is_ok());
        assert!(file.dispose());
        assert!(!file.dispose());
        assert!(file.is_disposed());

        assert!(matches!(lifeline.check(), Err(Error::Disposed)));
        assert!(matches!(file.data(), Err(Error::Disposed)));
        assert!(matches!(file.data_slice(0, 2), Err(Error::Disposed)));
        assert!(matches!(
            file.rva_slice(file.clr().virtual_address, 4),
            Err(Error::Disposed)
        ));

        assert!(Lifeline::detached().check().is_ok());
    }
}
