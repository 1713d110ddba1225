use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Load-time rejection
/// - [`Error::Malformed`] - A PE, CLR header or metadata root check failed. Loading stops at the
///   first failing check and no partially constructed view is returned
/// - [`Error::NotManagedExecutable`] - The same rejection, qualified with the path that was loaded
/// - [`Error::Empty`] - Empty input provided
///
/// ## Call-site errors
/// - [`Error::OutOfBounds`] - A row index, heap offset or byte range exceeds the bounds
///   established while loading
/// - [`Error::Disposed`] - The backing image was disposed before the call
/// - [`Error::NotSupported`] - Well formed input that uses an encoding this crate does not cover
/// - [`Error::Precondition`] - The call is not valid for its arguments, e.g. a range search on a
///   table that is not flagged as sorted
///
/// ## Other
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::RecursionLimit`] - Maximum signature nesting depth exceeded
/// - [`Error::LockError`] - A sibling module slot lock was poisoned
/// - [`Error::AlreadyPublished`] - A set-once value received a second, different value
///
/// # Examples
///
/// ```rust,no_run
/// use clrmap::{CilView, Error};
/// use std::path::Path;
///
/// match CilView::from_file(Path::new("assembly.dll")) {
///     Ok(view) => println!("{} streams", view.root().stream_headers.len()),
///     Err(Error::NotManagedExecutable { path, .. }) => {
///         eprintln!("{} is not a valid managed executable", path.display());
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Raised by every structural check on the PE headers, the section table, the CLR header,
    /// the metadata root and the table stream header. The error includes the source location
    /// where the malformation was detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A structural rejection of a file that was loaded from disk.
    ///
    /// [`crate::File::from_file`] wraps [`Error::Malformed`] and [`Error::Empty`] into this
    /// variant so callers get a message that names the offending path.
    #[error("{} is not a valid managed executable: {source}", path.display())]
    NotManagedExecutable {
        /// The path that failed to load
        path: PathBuf,
        /// The underlying structural failure
        source: Box<Error>,
    },

    /// An out of bound access was attempted.
    ///
    /// Raised for row indexes past the row count of a table, heap offsets past the end of a
    /// heap and byte ranges past the end of the image.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The image backing this accessor has been disposed.
    ///
    /// Every accessor checks the liveness flag of its [`crate::File`] before touching the
    /// mapped bytes.
    #[error("The backing image has been disposed")]
    Disposed,

    /// The input is well formed, but uses an encoding this library does not cover.
    ///
    /// Examples are element types in signatures outside of the decoded grammar, or metadata
    /// tables beyond `GenericParamConstraint`.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// The operation was invoked in a state that does not satisfy its precondition.
    #[error("Precondition violated - {0}")]
    Precondition(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Recursion limit reached.
    ///
    /// Signature decoding is recursive. Crafted blobs can nest types deeply enough to exhaust
    /// the stack, so nesting is capped at [`crate::ValidationConfig::max_signature_depth`].
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock a sibling module slot.
    #[error("Failed to lock target")]
    LockError,

    /// A set-once value was published twice with differing content.
    #[error("{0} was already published with a different value")]
    AlreadyPublished(&'static str),
}

impl Error {
    /// Returns `true` for the errors that reject an image while it is being loaded.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. } | Error::NotManagedExecutable { .. } | Error::Empty
        )
    }
}
