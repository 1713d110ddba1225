//! Section table entries and the cross-section layout rule.

use bitflags::bitflags;
use goblin::pe::section_table::SectionTable;

use crate::Result;

/// Size of one `IMAGE_SECTION_HEADER`
pub const SECTION_HEADER_SIZE: usize = 40;

bitflags! {
    /// Section characteristics
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionCharacteristics: u32 {
        /// Obsolete, replaced by `ALIGN_1BYTES`
        const TYPE_NO_PAD = 0x0000_0008;
        /// Contains executable code
        const CNT_CODE = 0x0000_0020;
        /// Contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// Object file only
        const LNK_OTHER = 0x0000_0100;
        /// Object file only, comments or other information
        const LNK_INFO = 0x0000_0200;
        /// Object file only, will not become part of the image
        const LNK_REMOVE = 0x0000_0800;
        /// Object file only, COMDAT data
        const LNK_COMDAT = 0x0000_1000;
        /// Contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// Can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// Can be read
        const MEM_READ = 0x4000_0000;
        /// Can be written to
        const MEM_WRITE = 0x8000_0000;
    }
}

impl SectionCharacteristics {
    /// Object file characteristics that must not appear in an image
    pub const FORBIDDEN: SectionCharacteristics = SectionCharacteristics::TYPE_NO_PAD
        .union(SectionCharacteristics::LNK_OTHER)
        .union(SectionCharacteristics::LNK_INFO)
        .union(SectionCharacteristics::LNK_REMOVE)
        .union(SectionCharacteristics::LNK_COMDAT)
        .union(SectionCharacteristics::LNK_NRELOC_OVFL);
}

/// The section name with its NUL padding removed.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for a name that is empty or not printable ASCII.
pub fn name(section: &SectionTable) -> Result<&str> {
    let trimmed_len = section
        .name
        .iter()
        .rposition(|&byte| byte != 0)
        .map_or(0, |last| last + 1);
    let trimmed = &section.name[..trimmed_len];
    if trimmed.is_empty() || !trimmed.iter().all(u8::is_ascii_graphic) {
        return Err(malformed_error!("Invalid section name - {:?}", section.name));
    }

    std::str::from_utf8(trimmed)
        .map_err(|_| malformed_error!("Invalid section name - {:?}", section.name))
}

/// Parse `count` section headers starting at `offset` and check each of them in isolation.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the table does not fit into `data` or any section
/// fails [`validate`].
pub fn read(
    data: &[u8],
    offset: usize,
    count: u16,
    section_alignment: u32,
    file_alignment: u32,
) -> Result<Vec<SectionTable>> {
    let table_size = usize::from(count) * SECTION_HEADER_SIZE;
    match offset.checked_add(table_size) {
        Some(end) if end <= data.len() => {}
        _ => {
            return Err(malformed_error!(
                "Section table with {} entries does not fit into the file",
                count
            ))
        }
    }

    let mut offset = offset;
    let mut sections = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        // Images carry no COFF string table, long names are not resolved
        let section = SectionTable::parse(data, &mut offset, 0)
            .map_err(|error| malformed_error!("Invalid section header - {}", error))?;
        validate(&section, section_alignment, file_alignment, data.len())?;
        sections.push(section);
    }

    Ok(sections)
}

/// Check one section in isolation.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on any failed check.
pub fn validate(
    section: &SectionTable,
    section_alignment: u32,
    file_alignment: u32,
    file_len: usize,
) -> Result<()> {
    let name = name(section)?;

    if section.virtual_address == 0 || section.virtual_address % section_alignment != 0 {
        return Err(malformed_error!(
            "Section {} has an invalid virtual address - {:#x}",
            name,
            section.virtual_address
        ));
    }

    if section.size_of_raw_data % file_alignment != 0
        || section.pointer_to_raw_data % file_alignment != 0
    {
        return Err(malformed_error!(
            "Section {} raw data is not file aligned - offset {:#x}, size {:#x}",
            name,
            section.pointer_to_raw_data,
            section.size_of_raw_data
        ));
    }

    if (section.pointer_to_raw_data == 0) != (section.size_of_raw_data == 0) {
        return Err(malformed_error!(
            "Section {} has inconsistent raw data - offset {:#x}, size {:#x}",
            name,
            section.pointer_to_raw_data,
            section.size_of_raw_data
        ));
    }

    match section
        .pointer_to_raw_data
        .checked_add(section.size_of_raw_data)
    {
        Some(end) if end as usize <= file_len => {}
        _ => {
            return Err(malformed_error!(
                "Section {} raw data extends past the end of the file",
                name
            ))
        }
    }

    if section.pointer_to_relocations != 0
        || section.pointer_to_linenumbers != 0
        || section.number_of_relocations != 0
        || section.number_of_linenumbers != 0
    {
        return Err(malformed_error!(
            "Section {} carries relocation or line number data",
            name
        ));
    }

    let characteristics = SectionCharacteristics::from_bits_retain(section.characteristics);
    if characteristics.intersects(SectionCharacteristics::FORBIDDEN) {
        return Err(malformed_error!(
            "Section {} has forbidden characteristics - {:#010x}",
            name,
            section.characteristics
        ));
    }

    Ok(())
}

/// RVA directly after `section` once mapped, or `None` on overflow.
///
/// A `VirtualSize` of zero falls back to `SizeOfRawData`.
#[must_use]
pub fn virtual_end(section: &SectionTable, section_alignment: u32) -> Option<u32> {
    let size = if section.virtual_size == 0 {
        section.size_of_raw_data
    } else {
        section.virtual_size
    };

    let mask = section_alignment.checked_sub(1)?;
    let aligned = size.checked_add(mask)? & !mask;
    section.virtual_address.checked_add(aligned)
}

/// Check that sections follow each other in ascending order without gaps.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if any section does not start exactly where the aligned
/// virtual extent of its predecessor ends.
pub fn validate_layout(sections: &[SectionTable], section_alignment: u32) -> Result<()> {
    for pair in sections.windows(2) {
        let Some(expected) = virtual_end(&pair[0], section_alignment) else {
            return Err(malformed_error!(
                "Section {:?} virtual extent overflows",
                pair[0].name
            ));
        };

        if pair[1].virtual_address != expected {
            return Err(malformed_error!(
                "Section {:?} starts at {:#x}, expected {:#x}",
                pair[1].name,
                pair[1].virtual_address,
                expected
            ));
        }
    }

    Ok(())
}
