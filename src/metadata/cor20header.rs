//! The CLR runtime header (`IMAGE_COR20_HEADER`, ECMA-335 II.25.3.3).
//!
//! Located through data directory 14 of the optional header, it points to the metadata root and
//! the other runtime-specific regions of the image.

use bitflags::bitflags;
use goblin::pe::data_directories::DataDirectory;

use crate::{
    config::ValidationConfig,
    file::{
        io::read_le_at,
        pe::{DirectoryExt, PeImage},
    },
    metadata::{tables::TableId, token::Token},
    Result,
};

/// Size of the header as written by every known compiler
pub const COR20_HEADER_SIZE: u32 = 72;

bitflags! {
    /// Runtime flags of the CLR header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CorFlags: u32 {
        /// The image contains only IL
        const ILONLY = 0x0000_0001;
        /// The image must be loaded into a 32-bit process
        const REQUIRED_32BIT = 0x0000_0002;
        /// The image is an IL library
        const IL_LIBRARY = 0x0000_0004;
        /// The image is strong name signed
        const STRONGNAMESIGNED = 0x0000_0008;
        /// The entry point field is an RVA to native code
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// Debug data is tracked
        const TRACKDEBUGDATA = 0x0001_0000;
        /// The image prefers a 32-bit process
        const PREFERRED_32BIT = 0x0002_0000;
    }
}

/// The verified CLR runtime header.
#[derive(Debug, Clone, PartialEq)]
pub struct Cor20Header {
    /// Declared size of the header
    pub cb: u32,
    /// Minimum runtime major version
    pub major_runtime_version: u16,
    /// Minimum runtime minor version
    pub minor_runtime_version: u16,
    /// The metadata root
    pub metadata: DataDirectory,
    /// Runtime flags
    pub flags: CorFlags,
    /// `MethodDef` or `File` token of the entry point, or an RVA with
    /// [`CorFlags::NATIVE_ENTRYPOINT`]
    pub entry_point: u32,
    /// Managed resources
    pub resources: DataDirectory,
    /// Strong name signature hash
    pub strong_name_signature: DataDirectory,
    /// Reserved, zero
    pub code_manager_table: DataDirectory,
    /// Table of vtable fixups
    pub vtable_fixups: DataDirectory,
    /// Reserved, zero
    pub export_address_table_jumps: DataDirectory,
    /// Precompiled image information, zero for IL images
    pub managed_native_header: DataDirectory,
}

fn read_directory(data: &[u8], offset: &mut usize) -> Result<DataDirectory> {
    Ok(DataDirectory {
        virtual_address: read_le_at::<u32>(data, offset)?,
        size: read_le_at::<u32>(data, offset)?,
    })
}

impl Cor20Header {
    /// Read the header from the bytes of data directory 14.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the header is too small, declares an invalid
    /// size, has no metadata, or carries a directory with only one of its fields set.
    pub fn read(data: &[u8], config: &ValidationConfig) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE as usize {
            return Err(malformed_error!(
                "CLR header of {} bytes is too small",
                data.len()
            ));
        }

        let mut offset = 0;
        let cb = read_le_at::<u32>(data, &mut offset)?;
        if cb < COR20_HEADER_SIZE || (config.strict_cor20_header && cb != COR20_HEADER_SIZE) {
            return Err(malformed_error!("Invalid CLR header size - {}", cb));
        }
        if cb > COR20_HEADER_SIZE {
            log::warn!("CLR header declares {} bytes, only 72 are read", cb);
        }

        let major_runtime_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_runtime_version = read_le_at::<u16>(data, &mut offset)?;
        let metadata = read_directory(data, &mut offset)?;
        let raw_flags = read_le_at::<u32>(data, &mut offset)?;
        let entry_point = read_le_at::<u32>(data, &mut offset)?;

        let flags = CorFlags::from_bits_retain(raw_flags);
        if config.strict_cor20_header && CorFlags::from_bits(raw_flags).is_none() {
            return Err(malformed_error!("Undefined CLR header flags - {:#010x}", raw_flags));
        }

        let header = Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            metadata,
            flags,
            entry_point,
            resources: read_directory(data, &mut offset)?,
            strong_name_signature: read_directory(data, &mut offset)?,
            code_manager_table: read_directory(data, &mut offset)?,
            vtable_fixups: read_directory(data, &mut offset)?,
            export_address_table_jumps: read_directory(data, &mut offset)?,
            managed_native_header: read_directory(data, &mut offset)?,
        };

        if metadata.virtual_address == 0 || metadata.size == 0 {
            return Err(malformed_error!("CLR header has no metadata"));
        }

        for (name, directory) in header.directories() {
            if directory.is_inconsistent() {
                return Err(malformed_error!(
                    "CLR header directory {} is inconsistent - {:#x}/{:#x}",
                    name,
                    directory.virtual_address,
                    directory.size
                ));
            }
        }

        Ok(header)
    }

    /// Check the header against the image it was read from.
    ///
    /// Every non-empty directory must resolve to raw data, a 32-bit requirement must not be
    /// declared by a PE32+ image, and a managed entry point must name a `MethodDef` or `File`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on the first failed check.
    pub fn verify(&self, pe: &PeImage) -> Result<()> {
        for (name, directory) in self.directories() {
            if !directory.is_empty()
                && pe
                    .resolve(directory.virtual_address, directory.size)
                    .is_none()
            {
                return Err(malformed_error!(
                    "CLR header directory {} does not resolve - {:#x}/{:#x}",
                    name,
                    directory.virtual_address,
                    directory.size
                ));
            }
        }

        if pe.is_pe32_plus() && self.flags.contains(CorFlags::REQUIRED_32BIT) {
            return Err(malformed_error!("PE32+ image requires a 32-bit process"));
        }

        if !self.flags.contains(CorFlags::NATIVE_ENTRYPOINT) && self.entry_point != 0 {
            let token = Token::new(self.entry_point);
            if !token.is_table(TableId::MethodDef) && !token.is_table(TableId::File) {
                return Err(malformed_error!("Invalid entry point - {}", token));
            }
        }

        Ok(())
    }

    /// The managed entry point, `None` for a library or a native entry point
    #[must_use]
    pub fn entry_point_token(&self) -> Option<Token> {
        if self.flags.contains(CorFlags::NATIVE_ENTRYPOINT) {
            return None;
        }

        Some(Token::new(self.entry_point)).filter(|token| !token.is_null())
    }

    fn directories(&self) -> [(&'static str, DataDirectory); 7] {
        [
            ("MetaData", self.metadata),
            ("Resources", self.resources),
            ("StrongNameSignature", self.strong_name_signature),
            ("CodeManagerTable", self.code_manager_table),
            ("VTableFixups", self.vtable_fixups),
            ("ExportAddressTableJumps", self.export_address_table_jumps),
            ("ManagedNativeHeader", self.managed_native_header),
        ]
    }
}
