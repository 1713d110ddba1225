//! The DOS stub pointer, the PE signature and the COFF file header.

use bitflags::bitflags;
use goblin::pe::header::{
    CoffHeader, DosHeader, COFF_MACHINE_UNKNOWN, COFF_MACHINE_X86, COFF_MACHINE_X86_64, PE_MAGIC,
};

use crate::{file::io::read_le_at, Result};

/// Smallest file that can hold a DOS header and the `e_lfanew` field.
pub const MIN_FILE_SIZE: usize = 128;

/// Size of the `PE\0\0` signature
pub const PE_SIGNATURE_SIZE: usize = 4;

/// Size of the COFF file header following the PE signature
pub const COFF_HEADER_SIZE: usize = 20;

bitflags! {
    /// COFF file header characteristics
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoffCharacteristics: u16 {
        /// Relocation information was stripped
        const RELOCS_STRIPPED = 0x0001;
        /// The image can be executed
        const EXECUTABLE_IMAGE = 0x0002;
        /// The application can handle addresses above 2 GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Little endian, obsolete
        const BYTES_REVERSED_LO = 0x0080;
        /// 32-bit word architecture
        const MACHINE_32BIT = 0x0100;
        /// A system file such as a driver
        const SYSTEM = 0x1000;
        /// The image is a dynamic-link library
        const DLL = 0x2000;
        /// Uniprocessor machines only
        const UP_SYSTEM_ONLY = 0x4000;
        /// Big endian, obsolete
        const BYTES_REVERSED_HI = 0x8000;
    }
}

impl CoffCharacteristics {
    /// Characteristics a managed executable may never carry
    pub const DISALLOWED: CoffCharacteristics = CoffCharacteristics::BYTES_REVERSED_LO
        .union(CoffCharacteristics::SYSTEM)
        .union(CoffCharacteristics::UP_SYSTEM_ONLY)
        .union(CoffCharacteristics::BYTES_REVERSED_HI);
}

/// Readable name of a machine accepted by [`read`]
#[must_use]
pub fn machine_name(machine: u16) -> &'static str {
    match machine {
        COFF_MACHINE_X86 => "I386",
        COFF_MACHINE_X86_64 => "AMD64",
        _ => "Unknown",
    }
}

/// Parse the DOS header, follow `e_lfanew` to the PE signature and parse the COFF header that
/// follows it.
///
/// Returns both headers and the file offset of the optional header.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the file is too small, the signature is missing or
/// any header value is not acceptable for a managed executable.
pub fn read(data: &[u8]) -> Result<(DosHeader, CoffHeader, usize)> {
    if data.len() < MIN_FILE_SIZE {
        return Err(malformed_error!(
            "File too small - {} bytes, expected at least {}",
            data.len(),
            MIN_FILE_SIZE
        ));
    }

    let dos = DosHeader::parse(data)
        .map_err(|error| malformed_error!("Invalid DOS header - {}", error))?;

    let pe_offset = dos.pe_pointer as usize;
    let Some(header_end) = pe_offset
        .checked_add(PE_SIGNATURE_SIZE)
        .and_then(|end| end.checked_add(COFF_HEADER_SIZE))
    else {
        return Err(malformed_error!("PE header offset overflows - {:#x}", pe_offset));
    };
    if header_end > data.len() {
        return Err(malformed_error!(
            "PE header at {:#x} does not fit into the file",
            pe_offset
        ));
    }

    let mut offset = pe_offset;
    if read_le_at::<u32>(data, &mut offset)? != PE_MAGIC {
        return Err(malformed_error!("Invalid PE signature at {:#x}", pe_offset));
    }

    let coff = CoffHeader::parse(data, &mut offset)
        .map_err(|error| malformed_error!("Invalid COFF header - {}", error))?;

    validate(&coff)?;
    Ok((dos, coff, offset))
}

fn validate(coff: &CoffHeader) -> Result<()> {
    if !matches!(
        coff.machine,
        COFF_MACHINE_UNKNOWN | COFF_MACHINE_X86 | COFF_MACHINE_X86_64
    ) {
        return Err(malformed_error!(
            "Unsupported machine type - {:#06x}",
            coff.machine
        ));
    }

    let characteristics = CoffCharacteristics::from_bits_retain(coff.characteristics);
    if !characteristics.contains(CoffCharacteristics::EXECUTABLE_IMAGE) {
        return Err(malformed_error!("Image is not marked as executable"));
    }

    let disallowed = characteristics.intersection(CoffCharacteristics::DISALLOWED);
    if !disallowed.is_empty() {
        return Err(malformed_error!(
            "Disallowed file characteristics - {:#06x}",
            disallowed.bits()
        ));
    }

    if coff.number_of_sections == 0 {
        return Err(malformed_error!("Image has no sections"));
    }

    Ok(())
}
