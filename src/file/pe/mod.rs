//! Structural verification of the PE container and RVA resolution.
//!
//! [`PeImage::parse`] runs the complete verification chain over the raw bytes of an image:
//!
//! 1. DOS header, PE signature and COFF header ([`coff`])
//! 2. Optional header, PE32 or PE32+ ([`optional`])
//! 3. Every section header and the layout of the section table ([`section`])
//!
//! The chain is fail-fast; the first failing check rejects the image with
//! [`crate::Error::Malformed`] and nothing is returned. The headers are read with goblin; the
//! checks on top of them run in the order above. An accepted [`PeImage`] owns copies of the
//! (small) header values only, never of the image bytes.
//!
//! # Example
//!
//! ```rust,no_run
//! use clrmap::file::pe::PeImage;
//!
//! let data = std::fs::read("tests/samples/sample.dll")?;
//! let image = PeImage::parse(&data)?;
//! if let Some(offset) = image.resolve(0x2008, 72) {
//!     println!("CLR header at file offset {:#x}", offset);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod coff;
pub mod optional;
pub mod section;

pub use coff::CoffCharacteristics;
pub use optional::{DirectoryExt, DllCharacteristics};
pub use section::SectionCharacteristics;

use goblin::pe::{
    data_directories::DataDirectory,
    header::{CoffHeader, DosHeader},
    optional_header::{OptionalHeader, MAGIC_64},
    section_table::SectionTable,
};

use crate::Result;

/// The verified headers of a PE image, as parsed by goblin.
#[derive(Debug, Clone)]
pub struct PeImage {
    /// DOS header
    pub dos: DosHeader,
    /// COFF file header
    pub coff: CoffHeader,
    /// Optional header
    pub optional: OptionalHeader,
    /// Section table, ascending by virtual address
    pub sections: Vec<SectionTable>,
    clr: DataDirectory,
}

impl PeImage {
    /// Verify `data` as a PE image and extract its headers.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if any structural check fails, including arithmetic
    /// overflow while computing offsets.
    pub fn parse(data: &[u8]) -> Result<PeImage> {
        let (dos, coff, optional_offset) = coff::read(data)?;
        let optional = optional::read(data, optional_offset, coff.size_of_optional_header)?;

        let section_alignment = optional.windows_fields.section_alignment;
        let sections = section::read(
            data,
            optional_offset + usize::from(coff.size_of_optional_header),
            coff.number_of_sections,
            section_alignment,
            optional.windows_fields.file_alignment,
        )?;
        section::validate_layout(&sections, section_alignment)?;

        let pe = PeImage {
            clr: optional::clr_directory(&optional),
            dos,
            coff,
            optional,
            sections,
        };

        log::debug!(
            "verified {} image - machine {}, {} sections",
            if pe.is_pe32_plus() { "PE32+" } else { "PE32" },
            coff::machine_name(pe.coff.machine),
            pe.sections.len()
        );

        Ok(pe)
    }

    /// Returns true if `data` passes the complete verification chain.
    #[must_use]
    pub fn verify(data: &[u8]) -> bool {
        PeImage::parse(data).is_ok()
    }

    /// Returns true for PE32+ images
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.optional.standard_fields.magic == MAGIC_64
    }

    /// Map the range `[rva, rva + size)` to a file offset.
    ///
    /// The containing section is found by binary search over the ascending section table. The
    /// range must lie completely within the raw data of that section; `None` is returned for
    /// any range that does not, including ranges whose end overflows.
    #[must_use]
    pub fn resolve(&self, rva: u32, size: u32) -> Option<usize> {
        let (section, delta) = self.section_for(rva)?;
        if delta.checked_add(size)? > section.size_of_raw_data {
            return None;
        }

        usize::try_from(section.pointer_to_raw_data.checked_add(delta)?).ok()
    }

    /// Map `rva` to a file offset and the number of raw bytes left in its section from there.
    #[must_use]
    pub fn resolve_extent(&self, rva: u32) -> Option<(usize, usize)> {
        let (section, delta) = self.section_for(rva)?;
        if delta >= section.size_of_raw_data {
            return None;
        }

        let offset = usize::try_from(section.pointer_to_raw_data.checked_add(delta)?).ok()?;
        Some((offset, (section.size_of_raw_data - delta) as usize))
    }

    fn section_for(&self, rva: u32) -> Option<(&SectionTable, u32)> {
        let after = self
            .sections
            .partition_point(|section| section.virtual_address <= rva);
        let section = self.sections.get(after.checked_sub(1)?)?;
        if section.size_of_raw_data == 0 {
            return None;
        }

        Some((section, rva - section.virtual_address))
    }

    /// The CLR runtime header directory
    #[must_use]
    pub fn clr(&self) -> DataDirectory {
        self.clr
    }
}

#[cfg(test)]
mod tests {
    use goblin::pe::header::{COFF_MACHINE_X86, COFF_MACHINE_X86_64};

    use super::*;
    use crate::{test::ImageBuilder, Error};

    #[test]
    fn crafted() {
        let data = ImageBuilder::new().build();
        let image = PeImage::parse(&data).unwrap();

        assert_eq!(image.coff.machine, COFF_MACHINE_X86);
        assert_eq!(image.dos.pe_pointer, 0x80);
        assert_eq!(image.sections.len(), 2);
        assert_eq!(&image.sections[0].name, b".text\0\0\0");
        assert_eq!(section::name(&image.sections[1]).unwrap(), ".rsrc");
        assert_eq!(image.clr().size, 72);
        assert!(PeImage::verify(&data));
    }

    #[test]
    fn crafted_pe32_plus() {
        let data = ImageBuilder::new().pe32_plus().build();
        let image = PeImage::parse(&data).unwrap();

        assert_eq!(image.coff.machine, COFF_MACHINE_X86_64);
        assert!(image.is_pe32_plus());
    }

    #[test]
    fn too_small() {
        let data = vec![0xFF_u8; 127];
        assert!(matches!(
            PeImage::parse(&data),
            Err(Error::Malformed { .. })
        ));
        assert!(!PeImage::verify(&[]));
    }

    #[test]
    fn section_gap() {
        let data = ImageBuilder::new().second_section_rva(0x8000).build();
        assert!(matches!(
            PeImage::parse(&data),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn resolve() {
        let data = ImageBuilder::new().build();
        let image = PeImage::parse(&data).unwrap();
        let text = &image.sections[0];
        let raw = text.pointer_to_raw_data as usize;

        assert_eq!(image.resolve(text.virtual_address, 4), Some(raw));
        assert_eq!(image.resolve(text.virtual_address + 0x10, 8), Some(raw + 0x10));
        assert_eq!(
            image.resolve(text.virtual_address, text.size_of_raw_data),
            Some(raw)
        );

        // Past the raw data of the section
        assert_eq!(
            image.resolve(text.virtual_address, text.size_of_raw_data + 1),
            None
        );
        assert_eq!(image.resolve(text.virtual_address + 8, u32::MAX), None);

        // Below the first section and in the headers
        assert_eq!(image.resolve(0x10, 4), None);
        assert_eq!(image.resolve(0, 0), None);

        // Beyond the last section
        assert_eq!(image.resolve(0x00FF_0000, 1), None);

        let (offset, available) = image.resolve_extent(text.virtual_address + 4).unwrap();
        assert_eq!(offset, raw + 4);
        assert_eq!(available, text.size_of_raw_data as usize - 4);
    }

    #[test]
    fn resolve_second_section() {
        let data = ImageBuilder::new().build();
        let image = PeImage::parse(&data).unwrap();
        let rsrc = &image.sections[1];

        assert_eq!(
            image.resolve(rsrc.virtual_address + 2, 2),
            Some(rsrc.pointer_to_raw_data as usize + 2)
        );
    }
}
