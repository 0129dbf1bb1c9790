//! Content type detection from file bytes
//!
//! Client-supplied filenames and Content-Type headers are trivially forged, so
//! the validator only trusts what a [`ContentSniffer`] reads from the bytes on
//! disk. [`MagicSniffer`] uses the `infer` crate to match file signatures
//! (magic numbers).
//!
//! # Examples
//!
//! ```rust
//! use upload_validator::sniff::{ContentSniffer, MagicSniffer};
//!
//! # fn example() -> std::io::Result<()> {
//! let dir = std::env::temp_dir();
//! let path = dir.join("sniff-example.png");
//! std::fs::write(&path, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])?;
//!
//! let sniffer = MagicSniffer::new();
//! assert_eq!(sniffer.sniff(&path)?, "image/png");
//! # std::fs::remove_file(&path)?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Content type reported for a zero-length file
pub const EMPTY_MIME: &str = "inode/x-empty";

/// Content type reported for readable text without a known signature
pub const TEXT_MIME: &str = "text/plain";

/// Content type reported for binary data without a known signature
pub const BINARY_MIME: &str = "application/octet-stream";

/// Number of leading bytes inspected
pub const SNIFF_WINDOW: u64 = 8192;

/// Determines the true content type of a file on disk
#[cfg_attr(test, mockall::automock)]
pub trait ContentSniffer {
    /// Returns the MIME type of the file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn sniff(&self, path: &Path) -> io::Result<String>;
}

/// Magic number sniffer backed by `infer`
///
/// Detection falls through three stages: an empty file is `inode/x-empty`, a
/// recognised signature gives its MIME type, and anything else is `text/plain`
/// when it decodes as UTF-8 without NUL bytes or `application/octet-stream`
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl MagicSniffer {
    /// Creates a sniffer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Detects the content type of an in-memory prefix of a file
    ///
    /// # Examples
    ///
    /// ```rust
    /// use upload_validator::sniff::MagicSniffer;
    ///
    /// let sniffer = MagicSniffer::new();
    /// assert_eq!(sniffer.detect(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    /// assert_eq!(sniffer.detect(b"hello"), "text/plain");
    /// assert_eq!(sniffer.detect(b""), "inode/x-empty");
    /// ```
    #[must_use]
    pub fn detect(&self, head: &[u8]) -> &'static str {
        if head.is_empty() {
            return EMPTY_MIME;
        }

        if let Some(kind) = infer::get(head) {
            return kind.mime_type();
        }

        if looks_like_text(head) {
            TEXT_MIME
        } else {
            BINARY_MIME
        }
    }
}

impl ContentSniffer for MagicSniffer {
    fn sniff(&self, path: &Path) -> io::Result<String> {
        let mut head = Vec::new();
        File::open(path)?
            .take(SNIFF_WINDOW)
            .read_to_end(&mut head)?;
        Ok(self.detect(&head).to_string())
    }
}

/// UTF-8 without NUL bytes; a multi-byte sequence cut off by the window still counts
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}
