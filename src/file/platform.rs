//! The platform string primitive used by the `#Strings` heap.
//!
//! Finding the terminating NUL of a heap string is the only operation that may want a
//! platform tuned implementation (e.g. a vectorised `memchr`). It is injected through
//! [`crate::LoadOptions`] so callers can swap it without touching the heap code.

/// Locates the terminating NUL byte of a string.
///
/// Implementations must be pure and stateless: the same input always yields the same result,
/// and the scan never looks past `max_len` bytes of `data`.
pub trait NulScanner: Send + Sync {
    /// Return the number of bytes before the first NUL within `data[..max_len]`.
    ///
    /// Returns `max_len.min(data.len())` when no NUL is present.
    fn scan_for_nul(&self, data: &[u8], max_len: usize) -> usize;
}

/// The portable default: a linear byte search.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScanner;

impl NulScanner for DefaultScanner {
    fn scan_for_nul(&self, data: &[u8], max_len: usize) -> usize {
        let window = &data[..max_len.min(data.len())];
        window
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(window.len())
    }
}

/// The scanner used when no other one is configured.
pub static DEFAULT_SCANNER: DefaultScanner = DefaultScanner;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan() {
        let scanner = DefaultScanner;
        assert_eq!(scanner.scan_for_nul(b"abc\0def", 7), 3);
        assert_eq!(scanner.scan_for_nul(b"\0", 1), 0);
        assert_eq!(scanner.scan_for_nul(b"abcdef", 6), 6);
        assert_eq!(scanner.scan_for_nul(b"abc\0", 2), 2);
        assert_eq!(scanner.scan_for_nul(b"ab", 10), 2);
        assert_eq!(scanner.scan_for_nul(b"", 0), 0);
    }
}
