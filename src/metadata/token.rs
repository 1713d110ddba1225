//! Metadata tokens.
//!
//! A [`Token`] names one row of one metadata table, or nothing. The same logical reference is
//! stored in three different ways inside an image:
//!
//! | Encoding      | Width     | Layout                                             |
//! |---------------|-----------|----------------------------------------------------|
//! | plain token   | 4 bytes   | table number in the top byte, one-based row below  |
//! | simple index  | 2/4 bytes | one-based row of a table known from the column     |
//! | coded index   | 2/4 bytes | tag selecting the table, one-based row above it    |
//!
//! [`Token::decode`] accepts all three through [`IndexEncoding`] and yields the same canonical
//! value, so tokens compare, order and hash identically no matter where they were read. A row
//! of zero is the null reference in every encoding; all null tokens are the same value,
//! [`Token::NULL`].

use std::fmt;

use crate::{
    metadata::tables::{CodedIndexType, TableId, MAX_ROWS},
    Result,
};

/// A reference to a metadata table row, or the null reference.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(u32);

/// The on-disk encoding a reference was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexEncoding {
    /// A 4-byte token, e.g. the CLR header entry point or a fat method header
    Plain,
    /// A simple index into the given table
    Table(TableId),
    /// A coded index of the given kind
    Coded(CodedIndexType),
}

impl Token {
    /// The null reference
    pub const NULL: Token = Token(0);

    /// Create a token from its plain 4-byte value.
    ///
    /// Any value with a row of zero becomes [`Token::NULL`].
    #[must_use]
    pub fn new(value: u32) -> Self {
        if value & 0x00FF_FFFF == 0 {
            Token::NULL
        } else {
            Token(value)
        }
    }

    /// Create a token from a table and a one-based row; row zero is null
    #[must_use]
    pub fn from_rid(table: TableId, rid: u32) -> Self {
        Token::new(table.token_prefix() | (rid & 0x00FF_FFFF))
    }

    /// Create a token from a table and a zero-based row index
    #[must_use]
    pub fn from_index(table: TableId, index: u32) -> Self {
        Token::from_rid(table, index.saturating_add(1))
    }

    /// Decode a raw column or field value read with the given encoding.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a coded index with an invalid tag or for a row
    /// that does not fit into a token, and [`crate::Error::NotSupported`] for a plain token
    /// naming an unknown table.
    pub fn decode(encoding: IndexEncoding, raw: u32) -> Result<Token> {
        match encoding {
            IndexEncoding::Plain => {
                let token = Token::new(raw);
                if !token.is_null() {
                    TableId::try_from((raw >> 24) as u8)?;
                }
                Ok(token)
            }
            IndexEncoding::Table(table) => {
                if raw > MAX_ROWS {
                    return Err(malformed_error!(
                        "Row {:#x} of {:?} exceeds the token range",
                        raw,
                        table
                    ));
                }
                Ok(Token::from_rid(table, raw))
            }
            IndexEncoding::Coded(kind) => kind.decode(raw),
        }
    }

    /// The plain 4-byte value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The referenced table, `None` for the null token or an unknown table number
    #[must_use]
    pub fn table(&self) -> Option<TableId> {
        if self.is_null() {
            None
        } else {
            TableId::from_repr((self.0 >> 24) as u8)
        }
    }

    /// The one-based row, zero for the null token
    #[must_use]
    pub fn rid(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// The zero-based row index, `None` for the null token
    #[must_use]
    pub fn index(&self) -> Option<u32> {
        self.rid().checked_sub(1)
    }

    /// Returns true for the null reference
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this token references `table`
    #[must_use]
    pub fn is_table(&self, table: TableId) -> bool {
        self.table() == Some(table)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token::new(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Token(null)");
        }

        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.0 >> 24,
            self.rid()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
