//! The PE optional header in its 32-bit (PE32) and 64-bit (PE32+) layouts.
//!
//! goblin reads the fields; this module decides whether they describe an image the rest of the
//! crate can trust.

use bitflags::bitflags;
use goblin::pe::{
    data_directories::{DataDirectory, DataDirectoryType},
    header::Header,
    optional_header::{OptionalHeader, MAGIC_32, MAGIC_64},
};

use crate::{file::io::read_le_at, Result};

/// Smallest declared size of a PE32 optional header with 16 data directories
pub const PE32_MIN_SIZE: u16 = 224;

/// Smallest declared size of a PE32+ optional header with 16 data directories
pub const PE32_PLUS_MIN_SIZE: u16 = 240;

/// Number of data directories defined by the PE format
pub const DATA_DIRECTORY_COUNT: usize = 16;

/// Index of the reserved last data directory
pub const RESERVED_DIRECTORY: usize = 15;

/// Minimum size of the CLR runtime header pointed to by data directory 14
pub const CLR_HEADER_MIN_SIZE: u32 = 72;

/// `IMAGE_SUBSYSTEM_WINDOWS_GUI`
pub const SUBSYSTEM_WINDOWS_GUI: u16 = 2;

/// `IMAGE_SUBSYSTEM_WINDOWS_CUI`
pub const SUBSYSTEM_WINDOWS_CUI: u16 = 3;

bitflags! {
    /// DLL characteristics of the optional header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DllCharacteristics: u16 {
        /// Reserved, must be zero
        const RESERVED = 0x000F;
        /// The image can handle a high entropy 64-bit address space
        const HIGH_ENTROPY_VA = 0x0020;
        /// The image can be relocated at load time
        const DYNAMIC_BASE = 0x0040;
        /// The image is NX compatible
        const NX_COMPAT = 0x0100;
        /// Does not use structured exception handling
        const NO_SEH = 0x0400;
        /// A WDM driver
        const WDM_DRIVER = 0x2000;
        /// Terminal server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// Emptiness checks on a `{rva, size}` directory entry.
pub trait DirectoryExt {
    /// Returns true if both fields are zero
    fn is_empty(&self) -> bool;

    /// Returns true if exactly one of the two fields is zero
    fn is_inconsistent(&self) -> bool;
}

impl DirectoryExt for DataDirectory {
    fn is_empty(&self) -> bool {
        self.virtual_address == 0 && self.size == 0
    }

    fn is_inconsistent(&self) -> bool {
        (self.virtual_address == 0) != (self.size == 0)
    }
}

/// Offset of the data directory array from the start of the optional header
fn directories_offset(magic: u16) -> usize {
    if magic == MAGIC_64 {
        112
    } else {
        96
    }
}

/// Parse and verify the optional header at `offset`.
///
/// `declared_size` is `SizeOfOptionalHeader` from the COFF header. It is checked against the
/// minimum for the layout selected by the magic before goblin reads any field past the magic.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on any failed check.
pub fn read(data: &[u8], offset: usize, declared_size: u16) -> Result<OptionalHeader> {
    let Some(end) = offset.checked_add(usize::from(declared_size)) else {
        return Err(malformed_error!("Optional header size overflows"));
    };
    if end > data.len() {
        return Err(malformed_error!(
            "Optional header ({} bytes at {:#x}) does not fit into the file",
            declared_size,
            offset
        ));
    }

    let mut cursor = offset;
    let magic = read_le_at::<u16>(&data[..end], &mut cursor)
        .map_err(|_| malformed_error!("Optional header is too small to hold its magic"))?;
    let minimum = match magic {
        MAGIC_32 => PE32_MIN_SIZE,
        MAGIC_64 => PE32_PLUS_MIN_SIZE,
        _ => return Err(malformed_error!("Invalid optional header magic - {:#06x}", magic)),
    };
    if declared_size < minimum {
        return Err(malformed_error!(
            "Optional header too small - {} bytes, expected at least {}",
            declared_size,
            minimum
        ));
    }

    let optional = Header::parse(data)
        .map_err(|error| malformed_error!("Invalid optional header - {}", error))?
        .optional_header
        .ok_or_else(|| malformed_error!("File does not have an OptionalHeader"))?;

    let directories = directories_offset(magic);
    let declared = (optional.windows_fields.number_of_rva_and_sizes as usize)
        .checked_mul(8)
        .and_then(|size| size.checked_add(directories));
    match declared {
        Some(declared) if declared <= usize::from(declared_size) => {}
        _ => {
            return Err(malformed_error!(
                "{} data directories do not fit into the optional header",
                optional.windows_fields.number_of_rva_and_sizes
            ))
        }
    }

    let mut reserved_offset = offset + directories + RESERVED_DIRECTORY * 8;
    let reserved = DataDirectory {
        virtual_address: read_le_at::<u32>(data, &mut reserved_offset)?,
        size: read_le_at::<u32>(data, &mut reserved_offset)?,
    };

    validate(&optional, &reserved, data.len())?;
    Ok(optional)
}

fn validate(optional: &OptionalHeader, reserved: &DataDirectory, file_len: usize) -> Result<()> {
    let standard = &optional.standard_fields;
    let windows = &optional.windows_fields;
    let size_of_image = u64::from(windows.size_of_image);

    let Some(total) = u64::from(standard.size_of_code)
        .checked_add(u64::from(standard.size_of_initialized_data))
        .and_then(|sum| sum.checked_add(u64::from(standard.size_of_uninitialized_data)))
    else {
        return Err(malformed_error!("Section size totals overflow"));
    };
    if total > size_of_image {
        return Err(malformed_error!(
            "Code and data sizes ({:#x}) exceed the image size ({:#x})",
            total,
            size_of_image
        ));
    }

    let entry_point = u64::from(standard.address_of_entry_point);
    let base_of_code = u64::from(standard.base_of_code);
    if entry_point != 0 && entry_point < base_of_code {
        return Err(malformed_error!(
            "Entry point {:#x} lies before the code base {:#x}",
            entry_point,
            base_of_code
        ));
    }

    let section_alignment = windows.section_alignment;
    let file_alignment = windows.file_alignment;
    if !section_alignment.is_power_of_two() || !file_alignment.is_power_of_two() {
        return Err(malformed_error!(
            "Alignments must be powers of two - section {:#x}, file {:#x}",
            section_alignment,
            file_alignment
        ));
    }

    if !(512..=65536).contains(&file_alignment) {
        return Err(malformed_error!(
            "File alignment out of range - {:#x}",
            file_alignment
        ));
    }

    if section_alignment < file_alignment {
        return Err(malformed_error!(
            "Section alignment {:#x} is smaller than the file alignment {:#x}",
            section_alignment,
            file_alignment
        ));
    }

    if windows.subsystem != SUBSYSTEM_WINDOWS_CUI && windows.subsystem != SUBSYSTEM_WINDOWS_GUI {
        return Err(malformed_error!("Unsupported subsystem - {}", windows.subsystem));
    }

    let dll_characteristics = DllCharacteristics::from_bits_retain(windows.dll_characteristics);
    if dll_characteristics.intersects(DllCharacteristics::RESERVED | DllCharacteristics::WDM_DRIVER)
    {
        return Err(malformed_error!(
            "Disallowed DLL characteristics - {:#06x}",
            dll_characteristics.bits()
        ));
    }

    if u64::from(windows.size_of_stack_commit) > u64::from(windows.size_of_stack_reserve) {
        return Err(malformed_error!(
            "Stack commit {:#x} exceeds the reserve {:#x}",
            windows.size_of_stack_commit,
            windows.size_of_stack_reserve
        ));
    }

    if u64::from(windows.size_of_heap_commit) > u64::from(windows.size_of_heap_reserve) {
        return Err(malformed_error!(
            "Heap commit {:#x} exceeds the reserve {:#x}",
            windows.size_of_heap_commit,
            windows.size_of_heap_reserve
        ));
    }

    if (windows.number_of_rva_and_sizes as usize) < DATA_DIRECTORY_COUNT {
        return Err(malformed_error!(
            "Expected at least {} data directories, found {}",
            DATA_DIRECTORY_COUNT,
            windows.number_of_rva_and_sizes
        ));
    }

    if !reserved.is_empty() {
        return Err(malformed_error!("Reserved data directory 15 is not empty"));
    }

    validate_directories(optional, size_of_image, file_len)
}

fn validate_directories(optional: &OptionalHeader, size_of_image: u64, file_len: usize) -> Result<()> {
    let clr = clr_directory(optional);
    if clr.virtual_address == 0 || clr.size < CLR_HEADER_MIN_SIZE {
        return Err(malformed_error!(
            "Missing or undersized CLR header directory - rva {:#x}, size {:#x}",
            clr.virtual_address,
            clr.size
        ));
    }

    for (kind, directory) in optional.data_directories.dirs() {
        if directory.is_inconsistent() {
            return Err(malformed_error!(
                "Data directory {:?} is inconsistent - rva {:#x}, size {:#x}",
                kind,
                directory.virtual_address,
                directory.size
            ));
        }

        let Some(end) = directory.virtual_address.checked_add(directory.size) else {
            return Err(malformed_error!("Data directory {:?} overflows", kind));
        };

        if kind == DataDirectoryType::CertificateTable {
            if end as usize > file_len {
                return Err(malformed_error!(
                    "Certificate table extends past the end of the file"
                ));
            }
        } else if u64::from(directory.virtual_address) > size_of_image {
            return Err(malformed_error!(
                "Data directory {:?} lies outside the image - rva {:#x}",
                kind,
                directory.virtual_address
            ));
        }
    }

    Ok(())
}

/// The CLR runtime header directory, all zero if the header has none
#[must_use]
pub fn clr_directory(optional: &OptionalHeader) -> DataDirectory {
    optional
        .data_directories
        .dirs()
        .find(|(kind, _)| *kind == DataDirectoryType::ClrRuntimeHeader)
        .map_or(
            DataDirectory {
                virtual_address: 0,
                size: 0,
            },
            |(_, directory)| directory,
        )
}
