//! Metadata streams (ECMA-335 II.24.2.2).
//!
//! The metadata root is followed by stream headers, each naming a region of the metadata:
//!
//! - `#~` the compressed tables, see [`TablesHeader`]
//! - `#Strings` identifier strings, see [`Strings`]
//! - `#US` user string literals, see [`UserStrings`]
//! - `#Blob` signatures and other binary data, see [`Blob`]
//! - `#GUID` module identifiers, see [`Guid`]
//!
//! All heap accessors borrow the image and never copy entry content, except [`UserStrings`]
//! which decodes UTF-16 into an owned string.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::{Blob, BlobIterator};
pub use guid::Guid;
pub use streamheader::{StreamHeader, StreamKind, MAX_STREAM_NAME};
pub use strings::Strings;
pub use tablesheader::{ColumnValue, TableSummary, TablesHeader};
pub use userstrings::UserStrings;
