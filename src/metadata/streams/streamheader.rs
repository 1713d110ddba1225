//! Stream headers of the metadata root (ECMA-335 II.24.2.2).
//!
//! Each header is `{offset: u32, size: u32, name}` where the name is an ASCII string of at most
//! 32 bytes including its NUL terminator, padded with zeros to the next 4-byte boundary. The
//! five stream names below are recognized; any other stream is kept as
//! [`StreamKind::Unknown`] so that the stream positions stay intact.

use crate::{file::parser::Parser, Result};

/// Longest stream name, including the NUL terminator
pub const MAX_STREAM_NAME: usize = 32;

/// The recognized metadata streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// `#~`, the compressed metadata tables
    Tables,
    /// `#Strings`
    Strings,
    /// `#US`
    UserStrings,
    /// `#Blob`
    Blob,
    /// `#GUID`
    Guid,
    /// Any other name; retained but not interpreted
    Unknown,
}

impl StreamKind {
    /// Classify a stream by its exact name
    #[must_use]
    pub fn from_name(name: &str) -> StreamKind {
        match name {
            "#~" => StreamKind::Tables,
            "#Strings" => StreamKind::Strings,
            "#US" => StreamKind::UserStrings,
            "#Blob" => StreamKind::Blob,
            "#GUID" => StreamKind::Guid,
            _ => StreamKind::Unknown,
        }
    }
}

/// One entry of the stream directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name without the terminator
    pub name: String,
    /// Classification of `name`
    pub kind: StreamKind,
}

impl StreamHeader {
    /// Read one stream header at the position of `parser` and advance past its padded name.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header is truncated and
    /// [`crate::Error::Malformed`] for an empty, unterminated or non-ASCII name.
    pub fn read(parser: &mut Parser<'_>) -> Result<StreamHeader> {
        let offset = parser.read_le::<u32>()?;
        let size = parser.read_le::<u32>()?;

        let start = parser.pos();
        let window = parser.read_bytes(parser.remaining().min(MAX_STREAM_NAME))?;
        let Some(length) = window.iter().position(|&byte| byte == 0) else {
            return Err(malformed_error!(
                "Stream name at {:#x} is not terminated within {} bytes",
                start,
                MAX_STREAM_NAME
            ));
        };

        let name = &window[..length];
        if name.is_empty() || !name.iter().all(u8::is_ascii_graphic) {
            return Err(malformed_error!("Invalid stream name at {:#x}", start));
        }

        // Name and terminator, padded to four bytes
        let padded = (length + 1 + 3) & !3;
        parser.seek(start)?;
        parser.advance_by(padded)?;

        let name = String::from_utf8_lossy(name).into_owned();
        Ok(StreamHeader {
            offset,
            size,
            kind: StreamKind::from_name(&name),
            name,
        })
    }
}
