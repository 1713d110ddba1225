//! Method headers and bodies (ECMA-335 II.25.4).
//!
//! A method body starts with a tiny (1 byte) or fat (12 byte) header, followed by the IL code
//! and, for fat headers, optional data sections holding the exception clauses.

use bitflags::bitflags;

use crate::{
    file::io::read_le_at,
    metadata::{
        method::{exceptions::read_sections, ExceptionClause},
        tables::TableId,
        token::Token,
    },
    Result,
};

/// Operand stack depth implied by a tiny header
pub const TINY_MAX_STACK: u16 = 8;

const FAT_HEADER_DWORDS: u16 = 3;

bitflags! {
    /// Flags of a fat method header, the low twelve bits of its first word
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny header format
        const TINY_FORMAT = 0x0002;
        /// Fat header format
        const FAT_FORMAT = 0x0003;
        /// Data sections follow the code
        const MORE_SECTS = 0x0008;
        /// Zero-initialize all locals
        const INIT_LOCALS = 0x0010;
    }
}

/// The header of a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodHeader {
    /// One byte, at most 63 bytes of code, no locals and no exception clauses
    Tiny {
        /// Size of the IL code
        code_size: u32,
    },
    /// Twelve bytes
    Fat {
        /// Header flags
        flags: MethodBodyFlags,
        /// Maximum operand stack depth
        max_stack: u16,
        /// Size of the IL code
        code_size: u32,
        /// `StandAloneSig` token of the locals, null without locals
        local_var_sig: Token,
    },
}

impl MethodHeader {
    /// Read a header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown format or an invalid locals token and
    /// [`crate::Error::OutOfBounds`] if `data` is too short.
    pub fn read(data: &[u8]) -> Result<MethodHeader> {
        let mut offset = 0;
        let first = read_le_at::<u8>(data, &mut offset)?;

        match first & 0x03 {
            0x02 => Ok(MethodHeader::Tiny {
                code_size: u32::from(first >> 2),
            }),
            0x03 => {
                offset = 0;
                let word = read_le_at::<u16>(data, &mut offset)?;
                let dwords = word >> 12;
                if dwords != FAT_HEADER_DWORDS {
                    return Err(malformed_error!(
                        "Fat method header of {} dwords",
                        dwords
                    ));
                }

                let max_stack = read_le_at::<u16>(data, &mut offset)?;
                let code_size = read_le_at::<u32>(data, &mut offset)?;
                let local_var_sig = Token::new(read_le_at::<u32>(data, &mut offset)?);
                if !local_var_sig.is_null() && !local_var_sig.is_table(TableId::StandAloneSig) {
                    return Err(malformed_error!(
                        "Invalid local variable signature - {}",
                        local_var_sig
                    ));
                }

                Ok(MethodHeader::Fat {
                    flags: MethodBodyFlags::from_bits_retain(word & 0x0FFF),
                    max_stack,
                    code_size,
                    local_var_sig,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {:#04x}",
                first
            )),
        }
    }

    /// Size of the header itself
    #[must_use]
    pub fn header_size(&self) -> usize {
        match self {
            MethodHeader::Tiny { .. } => 1,
            MethodHeader::Fat { .. } => usize::from(FAT_HEADER_DWORDS) * 4,
        }
    }

    /// Size of the IL code
    #[must_use]
    pub fn code_size(&self) -> u32 {
        match self {
            MethodHeader::Tiny { code_size } | MethodHeader::Fat { code_size, .. } => *code_size,
        }
    }

    /// Maximum operand stack depth
    #[must_use]
    pub fn max_stack(&self) -> u16 {
        match self {
            MethodHeader::Tiny { .. } => TINY_MAX_STACK,
            MethodHeader::Fat { max_stack, .. } => *max_stack,
        }
    }

    /// The `StandAloneSig` holding the local variable signature
    #[must_use]
    pub fn local_var_sig(&self) -> Option<Token> {
        match self {
            MethodHeader::Fat { local_var_sig, .. } if !local_var_sig.is_null() => {
                Some(*local_var_sig)
            }
            _ => None,
        }
    }

    /// Returns true if locals are zero-initialized
    #[must_use]
    pub fn init_locals(&self) -> bool {
        matches!(self, MethodHeader::Fat { flags, .. } if flags.contains(MethodBodyFlags::INIT_LOCALS))
    }

    fn has_sections(&self) -> bool {
        matches!(self, MethodHeader::Fat { flags, .. } if flags.contains(MethodBodyFlags::MORE_SECTS))
    }
}

/// A method body borrowed from the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody<'a> {
    /// The header
    pub header: MethodHeader,
    /// The IL code, undecoded
    pub code: &'a [u8],
    /// Exception clauses, in declaration order
    pub clauses: Vec<ExceptionClause>,
}

impl<'a> MethodBody<'a> {
    /// Read a method body from the start of `data`, which may extend past its end.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the code or a data section exceeds `data`, and
    /// [`crate::Error::Malformed`] for an invalid header or clause.
    pub fn read(data: &'a [u8]) -> Result<MethodBody<'a>> {
        let header = MethodHeader::read(data)?;

        let start = header.header_size();
        let end = start + header.code_size() as usize;
        let Some(code) = data.get(start..end) else {
            return Err(out_of_bounds_error!());
        };

        let clauses = if header.has_sections() {
            read_sections(data, (end + 3) & !3)?
        } else {
            Vec::new()
        };

        Ok(MethodBody {
            header,
            code,
            clauses,
        })
    }

    /// Size of the header and the code
    #[must_use]
    pub fn size(&self) -> usize {
        self.header.header_size() + self.code.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::ExceptionClauseKind;
    use crate::Error;

    #[test]
    fn tiny() {
        // ldstr, call, ret
        let data = [
            0x2E, 0x72, 0x01, 0x00, 0x00, 0x70, 0x28, 0x01, 0x00, 0x00, 0x0A, 0x2A, 0xFF,
        ];
        let body = MethodBody::read(&data).unwrap();

        assert_eq!(body.header, MethodHeader::Tiny { code_size: 11 });
        assert_eq!(body.header.max_stack(), 8);
        assert_eq!(body.header.local_var_sig(), None);
        assert!(!body.header.init_locals());
        assert_eq!(body.code.last(), Some(&0x2A));
        assert_eq!(body.size(), 12);
        assert!(body.clauses.is_empty());
    }

    #[test]
    fn fat() {
        let mut data = vec![0x13, 0x30, 0x05, 0x00];
        data.extend_from_slice(&3_u32.to_le_bytes());
        data.extend_from_slice(&0x1100_0002_u32.to_le_bytes());
        data.extend_from_slice(&[0x00, 0x00, 0x2A]);
        let body = MethodBody::read(&data).unwrap();

        assert!(body.header.init_locals());
        assert_eq!(body.header.max_stack(), 5);
        assert_eq!(body.header.code_size(), 3);
        assert_eq!(body.header.local_var_sig(), Some(Token::new(0x1100_0002)));
        assert_eq!(body.size(), 15);
    }

    #[test]
    fn fat_with_clauses() {
        // try { nop nop } finally { nop endfinally } ret
        let mut data = vec![0x1B, 0x30, 0x01, 0x00];
        data.extend_from_slice(&5_u32.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0xDC, 0x2A]);
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&[0x01, 16, 0, 0]);
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x02]);
        data.extend_from_slice(&0_u32.to_le_bytes());

        let body = MethodBody::read(&data).unwrap();
        assert_eq!(body.clauses.len(), 1);
        assert_eq!(body.clauses[0].kind, ExceptionClauseKind::Finally);
        assert_eq!(body.clauses[0].try_length, 2);
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            MethodBody::read(&[0x00]),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            MethodBody::read(&[0x1E, 0x00]),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(MethodBody::read(&[]).is_err());

        // Locals token outside StandAloneSig
        let mut data = vec![0x13, 0x30, 0x05, 0x00];
        data.extend_from_slice(&1_u32.to_le_bytes());
        data.extend_from_slice(&0x0200_0001_u32.to_le_bytes());
        data.push(0x2A);
        assert!(MethodBody::read(&data).is_err());
    }
}
