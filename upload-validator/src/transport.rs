//! Upload records as reported by the transport layer
//!
//! The surrounding runtime parses the request and hands the validator an
//! [`UploadTable`] (or any other [`TransportInspector`]) describing each
//! received file: whether the transfer finished, how large it is, and where the
//! bytes were written. Nothing here reads process-wide state.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Outcome of the transfer of one file, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportStatus {
    /// The file arrived intact
    Ok,
    /// The file exceeded the server-wide size cap
    ServerLimitExceeded,
    /// The file exceeded the maximum size declared by the submitting form
    FormLimitExceeded,
    /// Only part of the file arrived
    Partial,
    /// The field was submitted without a file
    NoFile,
    /// The server has no temporary directory to receive uploads
    MissingTempDir,
    /// The received bytes could not be written to disk
    WriteFailed,
    /// A server component stopped the transfer
    Stopped,
    /// A status code this crate does not know
    Other(i64),
}

impl TransportStatus {
    /// Maps a numeric transport status code to a status
    ///
    /// # Examples
    ///
    /// ```rust
    /// use upload_validator::TransportStatus;
    ///
    /// assert_eq!(TransportStatus::from_code(0), TransportStatus::Ok);
    /// assert_eq!(TransportStatus::from_code(4), TransportStatus::NoFile);
    /// assert_eq!(TransportStatus::from_code(99), TransportStatus::Other(99));
    /// ```
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::ServerLimitExceeded,
            2 => Self::FormLimitExceeded,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::MissingTempDir,
            7 => Self::WriteFailed,
            8 => Self::Stopped,
            other => Self::Other(other),
        }
    }

    /// Returns the numeric transport status code
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::ServerLimitExceeded => 1,
            Self::FormLimitExceeded => 2,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::MissingTempDir => 6,
            Self::WriteFailed => 7,
            Self::Stopped => 8,
            Self::Other(code) => code,
        }
    }
}

impl From<i64> for TransportStatus {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ServerLimitExceeded => write!(f, "exceeded server size limit"),
            Self::FormLimitExceeded => write!(f, "exceeded form size limit"),
            Self::Partial => write!(f, "partially uploaded"),
            Self::NoFile => write!(f, "no file"),
            Self::MissingTempDir => write!(f, "missing temporary directory"),
            Self::WriteFailed => write!(f, "failed to write to disk"),
            Self::Stopped => write!(f, "stopped by the server"),
            Self::Other(code) => write!(f, "unrecognized status {code}"),
        }
    }
}

/// Shape of the status field of an upload record
///
/// A well-formed record carries a single status. A list shows up when several
/// files were submitted under one array-style field name, which the validator
/// rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusField {
    /// One status for one file
    Single(TransportStatus),
    /// One status per file of a multi-file field
    Multiple(Vec<TransportStatus>),
}

impl From<TransportStatus> for StatusField {
    fn from(status: TransportStatus) -> Self {
        Self::Single(status)
    }
}

/// One submitted file, as extracted from the request by the runtime
///
/// # Examples
///
/// ```rust
/// use upload_validator::{TransportStatus, UploadRecord};
///
/// let record = UploadRecord::new(TransportStatus::Ok, 2048, "/tmp/upload-8f3a");
/// assert_eq!(record.size, 2048);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Transport status field, absent when the runtime did not set one
    pub status: Option<StatusField>,

    /// Size in bytes as reported by the transport
    pub size: u64,

    /// Where the received bytes were written
    pub temp_path: PathBuf,
}

impl UploadRecord {
    /// Creates a record with a single status
    #[must_use]
    pub fn new(status: TransportStatus, size: u64, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            status: Some(StatusField::Single(status)),
            size,
            temp_path: temp_path.into(),
        }
    }

    /// Creates a successful record for a file already on disk
    ///
    /// The size is taken from the file's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read.
    pub fn from_path(temp_path: impl Into<PathBuf>) -> io::Result<Self> {
        let temp_path = temp_path.into();
        let size = std::fs::metadata(&temp_path)?.len();
        Ok(Self::new(TransportStatus::Ok, size, temp_path))
    }

    /// Replaces the status field
    #[must_use]
    pub fn with_status_field(mut self, status: StatusField) -> Self {
        self.status = Some(status);
        self
    }

    /// Removes the status field
    #[must_use]
    pub fn without_status(mut self) -> Self {
        self.status = None;
        self
    }

    /// Replaces the reported size
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// Reports what the transport knows about each upload handle
///
/// Implemented by [`UploadTable`]; runtimes with their own request
/// representation can implement it directly.
#[cfg_attr(test, mockall::automock)]
pub trait TransportInspector {
    /// Returns the status field for `handle`, or `None` if it is absent
    fn status(&self, handle: &str) -> Option<StatusField>;

    /// Returns the reported size in bytes for `handle`
    fn size(&self, handle: &str) -> u64;

    /// Returns the temporary path for `handle`
    fn temp_path(&self, handle: &str) -> Option<PathBuf>;
}

/// Upload records of one request, keyed by form field name
///
/// # Examples
///
/// ```rust
/// use upload_validator::{TransportInspector, TransportStatus, UploadRecord, UploadTable};
///
/// let mut uploads = UploadTable::new();
/// uploads.insert("avatar", UploadRecord::new(TransportStatus::Ok, 512, "/tmp/upload-1"));
///
/// assert_eq!(uploads.size("avatar"), 512);
/// assert!(uploads.status("missing").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct UploadTable {
    records: HashMap<String, UploadRecord>,
}

impl UploadTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the record for `handle`
    pub fn insert(&mut self, handle: impl Into<String>, record: UploadRecord) -> Option<UploadRecord> {
        self.records.insert(handle.into(), record)
    }

    /// Returns the record for `handle`
    #[must_use]
    pub fn get(&self, handle: &str) -> Option<&UploadRecord> {
        self.records.get(handle)
    }

    /// Removes the record for `handle`
    pub fn remove(&mut self, handle: &str) -> Option<UploadRecord> {
        self.records.remove(handle)
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, UploadRecord)> for UploadTable {
    fn from_iter<T: IntoIterator<Item = (K, UploadRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl TransportInspector for UploadTable {
    fn status(&self, handle: &str) -> Option<StatusField> {
        self.get(handle).and_then(|record| record.status.clone())
    }

    fn size(&self, handle: &str) -> u64 {
        self.get(handle).map_or(0, |record| record.size)
    }

    fn temp_path(&self, handle: &str) -> Option<PathBuf> {
        self.get(handle).map(|record| record.temp_path.clone())
    }
}
