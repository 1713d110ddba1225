//! The metadata root (ECMA-335 II.24.2.1).
//!
//! | Offset   | Size | Field                                      |
//! |----------|------|--------------------------------------------|
//! | 0        | 4    | Signature, `0x424A5342` ("BSJB")           |
//! | 4        | 2    | Major version                              |
//! | 6        | 2    | Minor version                              |
//! | 8        | 4    | Reserved                                   |
//! | 12       | 4    | Length of the version string, padded       |
//! | 16       | n    | Version string, NUL padded                 |
//! | 16+n     | 2    | Flags                                      |
//! | 18+n     | 2    | Number of streams                          |
//! | 20+n     | ...  | Stream headers                             |

use std::collections::HashSet;

use crate::{
    config::ValidationConfig,
    file::{io::read_le_at, parser::Parser},
    metadata::streams::{StreamHeader, StreamKind},
    Result,
};

/// Signature of the metadata root, "BSJB"
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Longest version string the root may declare
pub const MAX_VERSION_LENGTH: u32 = 255;

const FIXED_ROOT_SIZE: usize = 16;

/// The verified metadata root and its stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Reserved, 0
    pub reserved: u32,
    /// Version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved, 0
    pub flags: u16,
    /// The stream directory in file order, unknown streams included
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Read the root from the bytes of the metadata directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong signature, an oversized version string,
    /// an invalid stream count, a duplicate stream (if rejected by `config`), or a stream that
    /// extends past the metadata.
    pub fn read(data: &[u8], config: &ValidationConfig) -> Result<Root> {
        if data.len() < FIXED_ROOT_SIZE {
            return Err(malformed_error!(
                "Metadata root of {} bytes is too small",
                data.len()
            ));
        }

        let mut offset = 0;
        let signature = read_le_at::<u32>(data, &mut offset)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#x}",
                signature
            ));
        }

        let major_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_version = read_le_at::<u16>(data, &mut offset)?;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let length = read_le_at::<u32>(data, &mut offset)?;
        if length > MAX_VERSION_LENGTH {
            return Err(malformed_error!("Version string too long - {}", length));
        }

        let Some(raw_version) = data.get(offset..offset + length as usize) else {
            return Err(malformed_error!("Version string exceeds the metadata"));
        };
        let terminated = raw_version
            .iter()
            .position(|&byte| byte == 0)
            .map_or(raw_version, |end| &raw_version[..end]);
        let version = String::from_utf8_lossy(terminated).into_owned();

        let mut parser = Parser::new(data);
        parser.seek(offset + length as usize)?;
        let flags = parser
            .read_le::<u16>()
            .map_err(|_| malformed_error!("Metadata root is truncated after the version"))?;
        let stream_count = parser
            .read_le::<u16>()
            .map_err(|_| malformed_error!("Metadata root is truncated after the version"))?;

        if stream_count == 0 || stream_count > config.max_streams {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut seen = HashSet::new();
        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            let header = StreamHeader::read(&mut parser)?;

            let fits = header
                .offset
                .checked_add(header.size)
                .is_some_and(|end| end as usize <= data.len());
            if !fits {
                return Err(malformed_error!(
                    "Stream {} ({:#x}+{:#x}) exceeds the metadata of {} bytes",
                    header.name,
                    header.offset,
                    header.size,
                    data.len()
                ));
            }

            if header.kind == StreamKind::Unknown {
                log::warn!("Retaining unknown metadata stream {}", header.name);
            } else if !seen.insert(header.kind) {
                if config.reject_duplicate_streams {
                    return Err(malformed_error!("Duplicate stream {}", header.name));
                }
                log::warn!("Duplicate stream {}, using the first one", header.name);
            }

            stream_headers.push(header);
        }

        log::debug!(
            "Metadata root {} with streams {:?}",
            version,
            stream_headers
                .iter()
                .map(|header| header.name.as_str())
                .collect::<Vec<_>>()
        );

        Ok(Root {
            major_version,
            minor_version,
            reserved,
            version,
            flags,
            stream_headers,
        })
    }

    /// The first stream of the given kind
    #[must_use]
    pub fn stream(&self, kind: StreamKind) -> Option<&StreamHeader> {
        self.stream_headers
            .iter()
            .find(|header| header.kind == kind)
    }

    /// The bytes of `header` within the metadata `data` this root was read from
    #[must_use]
    pub fn stream_data<'a>(&self, data: &'a [u8], header: &StreamHeader) -> Option<&'a [u8]> {
        let start = header.offset as usize;
        data.get(start..start.checked_add(header.size as usize)?)
    }
}
