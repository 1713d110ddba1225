//! Exception handling clauses of a method body (ECMA-335 II.25.4.6).

use bitflags::bitflags;

use crate::{
    file::io::read_le_at,
    metadata::token::Token,
    Result,
};

bitflags! {
    /// Kind byte of an extra data section following the code
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// Exception handling table
        const EHTABLE = 0x01;
        /// Reserved, optimized IL table
        const OPT_ILTABLE = 0x02;
        /// Fat layout with 24-byte clauses and a 24-bit size
        const FAT_FORMAT = 0x40;
        /// Another section follows this one
        const MORE_SECTS = 0x80;
    }
}

/// What a clause does with an exception leaving its protected block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionClauseKind {
    /// Typed handler for exceptions of the given class
    Catch(Token),
    /// Handler guarded by filter code starting at the given IL offset
    Filter(u32),
    /// Runs on every exit from the protected block
    Finally,
    /// Runs only when an exception leaves the protected block
    Fault,
}

/// One try block and its handler, offsets relative to the first IL instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionClause {
    /// Handler kind
    pub kind: ExceptionClauseKind,
    /// Start of the protected block
    pub try_offset: u32,
    /// Length of the protected block
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
}

impl ExceptionClause {
    /// Returns true if `offset` lies in the protected block
    #[must_use]
    pub fn protects(&self, offset: u32) -> bool {
        offset >= self.try_offset && offset - self.try_offset < self.try_length
    }

    fn from_parts(flags: u32, offsets: [u32; 4], class_or_filter: u32) -> Result<Self> {
        let kind = match flags {
            0x0000 => ExceptionClauseKind::Catch(Token::new(class_or_filter)),
            0x0001 => ExceptionClauseKind::Filter(class_or_filter),
            0x0002 => ExceptionClauseKind::Finally,
            0x0004 => ExceptionClauseKind::Fault,
            _ => return Err(malformed_error!("Invalid exception clause flags - {:#x}", flags)),
        };

        Ok(ExceptionClause {
            kind,
            try_offset: offsets[0],
            try_length: offsets[1],
            handler_offset: offsets[2],
            handler_length: offsets[3],
        })
    }
}

/// Read the data sections starting at `offset` within `data`, which must be 4-byte aligned
/// relative to the method header.
///
/// Sections other than exception tables are skipped.
pub(crate) fn read_sections(data: &[u8], mut offset: usize) -> Result<Vec<ExceptionClause>> {
    let mut clauses = Vec::new();

    loop {
        let start = offset;
        let flags = SectionFlags::from_bits_retain(read_le_at::<u8>(data, &mut offset)?);

        let (size, clause_size) = if flags.contains(SectionFlags::FAT_FORMAT) {
            let low = read_le_at::<u16>(data, &mut offset)?;
            let high = read_le_at::<u8>(data, &mut offset)?;
            (usize::from(low) | usize::from(high) << 16, 24)
        } else {
            let size = read_le_at::<u8>(data, &mut offset)?;
            offset += 2;
            (usize::from(size), 12)
        };

        if size < 4 {
            return Err(malformed_error!(
                "Method data section at {:#x} declares {} bytes",
                start,
                size
            ));
        }
        let end = start + size;
        if end > data.len() {
            return Err(out_of_bounds_error!());
        }

        if flags.contains(SectionFlags::EHTABLE) {
            for _ in 0..(size - 4) / clause_size {
                let clause = if clause_size == 24 {
                    let flags = read_le_at::<u32>(data, &mut offset)?;
                    let offsets = [
                        read_le_at::<u32>(data, &mut offset)?,
                        read_le_at::<u32>(data, &mut offset)?,
                        read_le_at::<u32>(data, &mut offset)?,
                        read_le_at::<u32>(data, &mut offset)?,
                    ];
                    ExceptionClause::from_parts(flags, offsets, read_le_at::<u32>(data, &mut offset)?)?
                } else {
                    let flags = u32::from(read_le_at::<u16>(data, &mut offset)?);
                    let offsets = [
                        u32::from(read_le_at::<u16>(data, &mut offset)?),
                        u32::from(read_le_at::<u8>(data, &mut offset)?),
                        u32::from(read_le_at::<u16>(data, &mut offset)?),
                        u32::from(read_le_at::<u8>(data, &mut offset)?),
                    ];
                    ExceptionClause::from_parts(flags, offsets, read_le_at::<u32>(data, &mut offset)?)?
                };
                clauses.push(clause);
            }
        }

        if !flags.contains(SectionFlags::MORE_SECTS) {
            break;
        }
        offset = (end + 3) & !3;
    }

    Ok(clauses)
}
