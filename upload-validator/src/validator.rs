//! The validate-and-move routine
//!
//! [`UploadValidator::handle_file`] runs its checks in a fixed order and stops
//! at the first failure:
//!
//! 1. the record has a single transport status
//! 2. the transport reports success
//! 3. the reported size is within the configured limit
//! 4. the sniffed content type is on the allow-list
//! 5. the file is moved to `target_base` plus the matched extension
//!
//! Only step 5 touches the filesystem, and it runs at most once.

use crate::error::{UploadError, UploadResult};
use crate::relocate::{LocalMover, UploadMover};
use crate::sniff::{ContentSniffer, MagicSniffer};
use crate::transport::{StatusField, TransportInspector, TransportStatus};
use crate::types::AllowedTypes;
use crate::UploadSettings;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Converts megabytes to bytes, saturating at `u64::MAX`
#[must_use]
pub const fn megabytes_to_bytes(megabytes: u64) -> u64 {
    megabytes.saturating_mul(BYTES_PER_MEGABYTE)
}

/// Validates uploads against an allow-list and size limit, then moves them into place
///
/// The validator is long-lived configuration; each call to
/// [`handle_file`](Self::handle_file) is independent.
///
/// # Examples
///
/// ```rust,no_run
/// use upload_validator::{AllowedTypes, UploadRecord, UploadTable, UploadValidator};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut validator: UploadValidator = UploadValidator::default();
/// validator
///     .set_allowed_types(AllowedTypes::new().with("png", "image/png"))
///     .set_allowed_file_size(5);
///
/// let mut uploads = UploadTable::new();
/// uploads.insert("avatar", UploadRecord::from_path("/tmp/upload-7ab2")?);
///
/// let stored = validator.handle_file(&uploads, "avatar", "/srv/media/user-42")?;
/// assert_eq!(stored.to_str(), Some("/srv/media/user-42.png"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UploadValidator<S = MagicSniffer, M = LocalMover> {
    allowed_types: AllowedTypes,
    allowed_file_size: u64,
    sniffer: S,
    mover: M,
}

impl UploadValidator {
    /// Creates a validator with the magic number sniffer and a mover scoped to
    /// the system temporary directory
    #[must_use]
    pub fn new(allowed_types: AllowedTypes, megabytes: u64) -> Self {
        Self::with_collaborators(
            allowed_types,
            megabytes,
            MagicSniffer::new(),
            LocalMover::new(std::env::temp_dir()),
        )
    }

    /// Creates a validator from loaded settings
    #[must_use]
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::with_collaborators(
            settings.allowed_types.clone(),
            settings.max_file_size_mb,
            MagicSniffer::new(),
            LocalMover::new(&settings.upload_tmp_dir),
        )
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(AllowedTypes::new(), 0)
    }
}

impl<S: ContentSniffer, M: UploadMover> UploadValidator<S, M> {
    /// Creates a validator with a custom sniffer and mover
    #[must_use]
    pub const fn with_collaborators(
        allowed_types: AllowedTypes,
        megabytes: u64,
        sniffer: S,
        mover: M,
    ) -> Self {
        Self {
            allowed_types,
            allowed_file_size: megabytes_to_bytes(megabytes),
            sniffer,
            mover,
        }
    }

    /// Returns the allow-list
    #[must_use]
    pub const fn allowed_types(&self) -> &AllowedTypes {
        &self.allowed_types
    }

    /// Replaces the allow-list
    pub fn set_allowed_types(&mut self, allowed_types: AllowedTypes) -> &mut Self {
        self.allowed_types = allowed_types;
        self
    }

    /// Returns the size limit in bytes
    #[must_use]
    pub const fn allowed_file_size(&self) -> u64 {
        self.allowed_file_size
    }

    /// Sets the size limit in megabytes
    pub fn set_allowed_file_size(&mut self, megabytes: u64) -> &mut Self {
        self.allowed_file_size = megabytes_to_bytes(megabytes);
        self
    }

    /// Validates the upload under `handle` and moves it to `target_base` plus
    /// the extension matching its sniffed content type
    ///
    /// On success returns the final path. On failure the temporary file is
    /// left where it is.
    ///
    /// # Errors
    ///
    /// - [`UploadError::InvalidParameters`] if the status field is missing, is
    ///   a list, or the record has no temporary path
    /// - [`UploadError::NoFileSent`], [`UploadError::ServerLimitExceeded`],
    ///   [`UploadError::FormLimitExceeded`] or [`UploadError::UnknownError`]
    ///   depending on the transport status
    /// - [`UploadError::FileTooLarge`] if the reported size exceeds the limit
    /// - [`UploadError::UnsupportedFileType`] if no allowed extension maps to
    ///   the sniffed content type
    /// - [`UploadError::FileFailedToMove`] if the move fails
    pub fn handle_file<I>(
        &self,
        uploads: &I,
        handle: &str,
        target_base: impl AsRef<Path>,
    ) -> UploadResult<PathBuf>
    where
        I: TransportInspector + ?Sized,
    {
        let status = match uploads.status(handle) {
            Some(StatusField::Single(status)) => status,
            Some(StatusField::Multiple(_)) | None => {
                debug!(handle, "upload status missing or not a single value");
                return Err(UploadError::InvalidParameters);
            }
        };
        check_transport(status).inspect_err(|e| debug!(handle, error = %e, "upload rejected"))?;

        let size = uploads.size(handle);
        if size > self.allowed_file_size {
            debug!(handle, size, limit = self.allowed_file_size, "upload too large");
            return Err(UploadError::FileTooLarge {
                actual: size,
                limit: self.allowed_file_size,
            });
        }

        let Some(temp_path) = uploads.temp_path(handle) else {
            debug!(handle, "upload has no temporary path");
            return Err(UploadError::InvalidParameters);
        };

        let extension = self.match_extension(&temp_path)?;

        let destination = append_extension(target_base.as_ref(), extension);
        self.mover
            .move_upload(&temp_path, &destination)
            .map_err(|source| {
                warn!(
                    handle,
                    destination = %destination.display(),
                    error = %source,
                    "failed to move upload"
                );
                UploadError::FileFailedToMove {
                    destination: destination.clone(),
                    source,
                }
            })?;

        debug!(handle, destination = %destination.display(), "upload stored");
        Ok(destination)
    }

    /// Sniffs the file and returns the first allowed extension for its type
    fn match_extension(&self, temp_path: &Path) -> UploadResult<&str> {
        let detected = match self.sniffer.sniff(temp_path) {
            Ok(mime) => mime,
            Err(e) => {
                warn!(path = %temp_path.display(), error = %e, "could not read upload");
                "unknown (could not read upload)".to_string()
            }
        };

        if let Some(extension) = self.allowed_types.extension_for(&detected) {
            return Ok(extension);
        }

        debug!(detected = %detected, "content type not allowed");
        Err(UploadError::UnsupportedFileType {
            detected,
            allowed: self
                .allowed_types
                .extensions()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

fn check_transport(status: TransportStatus) -> UploadResult<()> {
    match status {
        TransportStatus::Ok => Ok(()),
        TransportStatus::NoFile => Err(UploadError::NoFileSent),
        TransportStatus::ServerLimitExceeded => Err(UploadError::ServerLimitExceeded),
        TransportStatus::FormLimitExceeded => Err(UploadError::FormLimitExceeded),
        status => Err(UploadError::UnknownError { status }),
    }
}

/// `base` + "." + `extension`, keeping any dots already in `base`
fn append_extension(base: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MoveError;
    use crate::relocate::MockUploadMover;
    use crate::sniff::MockContentSniffer;
    use crate::transport::{UploadRecord, UploadTable};
    use mockall::predicate::eq;
    use proptest::prelude::*;
    use std::io;

    const HANDLE: &str = "fileHandle";

    fn uploads_with(record: UploadRecord) -> UploadTable {
        let mut uploads = UploadTable::new();
        uploads.insert(HANDLE, record);
        uploads
    }

    fn ok_record() -> UploadRecord {
        UploadRecord::new(TransportStatus::Ok, 0, "/tmp/upload-abc")
    }

    fn sniffing(mime: &'static str) -> MockContentSniffer {
        let mut sniffer = MockContentSniffer::new();
        sniffer
            .expect_sniff()
            .returning(move |_| Ok(mime.to_string()));
        sniffer
    }

    fn never_sniffs() -> MockContentSniffer {
        let mut sniffer = MockContentSniffer::new();
        sniffer.expect_sniff().never();
        sniffer
    }

    fn never_moves() -> MockUploadMover {
        let mut mover = MockUploadMover::new();
        mover.expect_move_upload().never();
        mover
    }

    fn tmp_types() -> AllowedTypes {
        AllowedTypes::new().with("tmp", "inode/x-empty")
    }

    #[test]
    fn test_allowed_types_round_trip() {
        let types = AllowedTypes::new()
            .with("jpg", "image/jpeg")
            .with("png", "image/png");
        let mut validator: UploadValidator = UploadValidator::default();
        assert_eq!(validator.set_allowed_types(types.clone()).allowed_types(), &types);
    }

    #[test]
    fn test_allowed_file_size_in_bytes() {
        let mut validator: UploadValidator = UploadValidator::default();
        assert_eq!(validator.allowed_file_size(), 0);
        assert_eq!(
            validator.set_allowed_file_size(5).allowed_file_size(),
            5 * 1024 * 1024
        );
        assert_eq!(UploadValidator::new(tmp_types(), 2).allowed_file_size(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_success_moves_to_base_plus_extension() {
        let mut mover = MockUploadMover::new();
        mover
            .expect_move_upload()
            .with(
                eq(PathBuf::from("/tmp/upload-abc")),
                eq(PathBuf::from("/tmp/test2.tmp")),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, sniffing("inode/x-empty"), mover);
        let stored = validator
            .handle_file(&uploads_with(ok_record()), HANDLE, "/tmp/test2")
            .unwrap();
        assert_eq!(stored, PathBuf::from("/tmp/test2.tmp"));
    }

    #[test]
    fn test_missing_status_is_invalid() {
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, never_sniffs(), never_moves());
        let uploads = uploads_with(ok_record().without_status());

        let result = validator.handle_file(&uploads, HANDLE, "/tmp/test2");
        assert!(matches!(result, Err(UploadError::InvalidParameters)));
    }

    #[test]
    fn test_unknown_handle_is_invalid() {
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, never_sniffs(), never_moves());

        let result = validator.handle_file(&UploadTable::new(), HANDLE, "/tmp/test2");
        assert!(matches!(result, Err(UploadError::InvalidParameters)));
    }

    #[test]
    fn test_list_status_is_invalid() {
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, never_sniffs(), never_moves());

        for statuses in [vec![], vec![TransportStatus::Ok, TransportStatus::Ok]] {
            let uploads =
                uploads_with(ok_record().with_status_field(StatusField::Multiple(statuses)));
            let result = validator.handle_file(&uploads, HANDLE, "/tmp/test2");
            assert!(matches!(result, Err(UploadError::InvalidParameters)));
        }
    }

    #[test]
    fn test_transport_failures() {
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, never_sniffs(), never_moves());

        let err_for = |code: i64| {
            let record = UploadRecord::new(TransportStatus::from_code(code), 0, "/tmp/upload-abc");
            validator
                .handle_file(&uploads_with(record), HANDLE, "/tmp/test2")
                .unwrap_err()
        };

        assert!(matches!(err_for(4), UploadError::NoFileSent));
        assert!(matches!(err_for(1), UploadError::ServerLimitExceeded));
        assert!(matches!(err_for(2), UploadError::FormLimitExceeded));
        assert!(matches!(
            err_for(99),
            UploadError::UnknownError {
                status: TransportStatus::Other(99)
            }
        ));
        for code in [3, 6, 7, 8] {
            let err = err_for(code);
            assert!(
                matches!(err, UploadError::UnknownError { .. }),
                "code {code} produced {err:?}"
            );
        }
    }

    #[test]
    fn test_size_over_limit() {
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, never_sniffs(), never_moves());
        let uploads = uploads_with(ok_record().with_size(10 * 1024 * 1024));

        let err = validator.handle_file(&uploads, HANDLE, "/tmp/test2").unwrap_err();
        assert!(matches!(
            err,
            UploadError::FileTooLarge {
                actual: 10_485_760,
                limit: 5_242_880
            }
        ));
    }

    #[test]
    fn test_size_at_limit_passes() {
        let mut mover = MockUploadMover::new();
        mover.expect_move_upload().times(1).returning(|_, _| Ok(()));
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 1, sniffing("inode/x-empty"), mover);
        let uploads = uploads_with(ok_record().with_size(1024 * 1024));

        assert!(validator.handle_file(&uploads, HANDLE, "/tmp/test2").is_ok());
    }

    #[test]
    fn test_zero_limit_rejects_nonempty() {
        let validator = UploadValidator::with_collaborators(
            tmp_types(),
            0,
            never_sniffs(),
            never_moves(),
        );
        let uploads = uploads_with(ok_record().with_size(1));

        let err = validator.handle_file(&uploads, HANDLE, "/tmp/test2").unwrap_err();
        assert!(matches!(err, UploadError::FileTooLarge { actual: 1, limit: 0 }));
    }

    #[test]
    fn test_unsupported_type_lists_extensions() {
        let validator = UploadValidator::with_collaborators(
            AllowedTypes::new().with("jpg", "image/jpg"),
            5,
            sniffing("inode/x-empty"),
            never_moves(),
        );

        let err = validator
            .handle_file(&uploads_with(ok_record()), HANDLE, "/tmp/test2")
            .unwrap_err();
        match err {
            UploadError::UnsupportedFileType { detected, allowed } => {
                assert_eq!(detected, "inode/x-empty");
                assert_eq!(allowed, vec!["jpg".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_upload_is_unsupported() {
        let mut sniffer = MockContentSniffer::new();
        sniffer
            .expect_sniff()
            .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, sniffer, never_moves());

        let err = validator
            .handle_file(&uploads_with(ok_record()), HANDLE, "/tmp/test2")
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_first_matching_extension_wins() {
        let mut mover = MockUploadMover::new();
        mover
            .expect_move_upload()
            .with(eq(PathBuf::from("/tmp/upload-abc")), eq(PathBuf::from("/srv/photo.jpeg")))
            .times(1)
            .returning(|_, _| Ok(()));
        let validator = UploadValidator::with_collaborators(
            AllowedTypes::new()
                .with("jpeg", "image/jpeg")
                .with("jpg", "image/jpeg"),
            5,
            sniffing("image/jpeg"),
            mover,
        );

        let stored = validator
            .handle_file(&uploads_with(ok_record()), HANDLE, "/srv/photo")
            .unwrap();
        assert_eq!(stored, PathBuf::from("/srv/photo.jpeg"));
    }

    #[test]
    fn test_failed_move() {
        let mut mover = MockUploadMover::new();
        mover.expect_move_upload().times(1).returning(|temp, _| {
            Err(MoveError::NotPendingUpload(temp.to_path_buf()))
        });
        let validator =
            UploadValidator::with_collaborators(tmp_types(), 5, sniffing("inode/x-empty"), mover);

        let err = validator
            .handle_file(&uploads_with(ok_record()), HANDLE, "/tmp/test2")
            .unwrap_err();
        match err {
            UploadError::FileFailedToMove { destination, source } => {
                assert_eq!(destination, PathBuf::from("/tmp/test2.tmp"));
                assert!(matches!(source, MoveError::NotPendingUpload(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_append_extension_keeps_existing_dots() {
        assert_eq!(
            append_extension(Path::new("/srv/archive.tar"), "gz"),
            PathBuf::from("/srv/archive.tar.gz")
        );
        assert_eq!(
            append_extension(Path::new("relative/name"), "png"),
            PathBuf::from("relative/name.png")
        );
    }

    #[test]
    fn test_from_settings() {
        let settings = UploadSettings {
            max_file_size_mb: 3,
            upload_tmp_dir: PathBuf::from("/var/tmp/uploads"),
            allowed_types: AllowedTypes::new().with("pdf", "application/pdf"),
        };
        let validator = UploadValidator::from_settings(&settings);
        assert_eq!(validator.allowed_file_size(), 3 * 1024 * 1024);
        assert_eq!(validator.allowed_types(), &settings.allowed_types);
        assert_eq!(validator.mover.upload_dir(), Path::new("/var/tmp/uploads"));
    }

    proptest! {
        #[test]
        fn prop_megabytes_to_bytes(megabytes in 0u64..=(u64::MAX / BYTES_PER_MEGABYTE)) {
            let mut validator: UploadValidator = UploadValidator::default();
            validator.set_allowed_file_size(megabytes);
            prop_assert_eq!(validator.allowed_file_size(), megabytes * 1024 * 1024);
        }

        #[test]
        fn prop_megabytes_saturate(megabytes in (u64::MAX / BYTES_PER_MEGABYTE + 1)..=u64::MAX) {
            prop_assert_eq!(megabytes_to_bytes(megabytes), u64::MAX);
        }
    }
}
