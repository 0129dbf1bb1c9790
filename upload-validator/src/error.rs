//! Error types for upload validation
//!
//! Every failure of [`UploadValidator::handle_file`](crate::UploadValidator::handle_file)
//! is terminal for that call and surfaces as one [`UploadError`] variant, so callers
//! can render a message per case. The temporary file is never removed on failure.

use crate::transport::TransportStatus;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while validating and relocating an upload
#[derive(Debug, Error)]
pub enum UploadError {
    /// The status field for the upload handle is missing or not a single value
    ///
    /// A list-valued status is what a multi-file submission produces when the
    /// form uses array-style field names.
    #[error("Invalid parameters")]
    InvalidParameters,

    /// The transport reports that no file was sent
    #[error("No file sent")]
    NoFileSent,

    /// The transport rejected the file for exceeding the server-wide size cap
    #[error("Exceeded filesize limit set by the server")]
    ServerLimitExceeded,

    /// The transport rejected the file for exceeding the size declared by the form
    #[error("Exceeded filesize limit declared by the form")]
    FormLimitExceeded,

    /// The transport reported a status the validator does not handle
    #[error("Unknown upload error: {status}")]
    UnknownError {
        /// Status reported by the transport
        status: TransportStatus,
    },

    /// The reported size is larger than the configured limit
    #[error("File size {actual} exceeds limit of {limit} bytes")]
    FileTooLarge {
        /// Size reported by the transport
        actual: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// The sniffed content type matches no entry of the allow-list
    #[error("Unsupported file type {}, allowed extensions: {}", .detected, .allowed.join(", "))]
    UnsupportedFileType {
        /// Content type detected from the file's bytes
        detected: String,
        /// Allowed extensions, in configuration order
        allowed: Vec<String>,
    },

    /// The file passed every check but could not be moved into place
    #[error("Failed to move uploaded file to {}", .destination.display())]
    FileFailedToMove {
        /// Path the file was being moved to
        destination: PathBuf,
        /// Why the move failed
        #[source]
        source: MoveError,
    },
}

/// Result type for upload validation
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors reported by an [`UploadMover`](crate::relocate::UploadMover)
#[derive(Debug, Error)]
pub enum MoveError {
    /// The source path is not a pending upload the mover is allowed to touch
    #[error("{} is not a pending upload", .0.display())]
    NotPendingUpload(PathBuf),

    /// I/O error while moving the file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
