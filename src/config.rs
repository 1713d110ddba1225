//! Load options.
//!
//! The PE, section, CLR header and metadata root checks always run; they are what makes the
//! rest of the crate safe to use on untrusted input. [`ValidationConfig`] only tunes the
//! policy decisions around them.

use crate::file::platform::{NulScanner, DEFAULT_SCANNER};

/// Policy knobs applied while loading an image and decoding its signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationConfig {
    /// Require the CLR header size field to be exactly 72 instead of at least 72
    pub strict_cor20_header: bool,

    /// Reject a metadata root that names a recognized stream more than once
    pub reject_duplicate_streams: bool,

    /// Check that tokens decoded from signatures reference an existing row
    pub validate_signature_tokens: bool,

    /// Maximum nesting depth of a decoded signature
    pub max_signature_depth: usize,

    /// Maximum number of stream headers in the metadata root
    pub max_streams: u16,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_cor20_header: false,
            reject_duplicate_streams: true,
            validate_signature_tokens: true,
            max_signature_depth: 50,
            max_streams: 16,
        }
    }
}

impl ValidationConfig {
    /// Only the checks that cannot be turned off
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            strict_cor20_header: false,
            reject_duplicate_streams: false,
            validate_signature_tokens: false,
            max_signature_depth: 50,
            max_streams: u16::MAX,
        }
    }

    /// Every optional check enabled
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_cor20_header: true,
            reject_duplicate_streams: true,
            validate_signature_tokens: true,
            max_signature_depth: 50,
            max_streams: 8,
        }
    }
}

/// Everything a load needs beyond the image bytes.
#[derive(Clone, Copy)]
pub struct LoadOptions {
    /// Validation policy
    pub config: ValidationConfig,
    /// NUL scan primitive used by the `#Strings` heap
    pub scanner: &'static dyn NulScanner,
}

impl LoadOptions {
    /// Default options with the given validation policy
    #[must_use]
    pub fn with_config(config: ValidationConfig) -> Self {
        LoadOptions {
            config,
            ..LoadOptions::default()
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            config: ValidationConfig::default(),
            scanner: &DEFAULT_SCANNER,
        }
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
