//! Moving validated uploads into place
//!
//! The mover is the only component that mutates the filesystem. It must refuse
//! any source that is not a pending upload, otherwise a forged record could be
//! used to relocate arbitrary files.

use crate::error::MoveError;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// Moves a pending upload from its temporary path to its destination
#[cfg_attr(test, mockall::automock)]
pub trait UploadMover {
    /// Moves `temp_path` to `destination`, replacing any existing file there
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::NotPendingUpload`] if `temp_path` is not a pending
    /// upload, or [`MoveError::Io`] if the move itself fails.
    fn move_upload(&self, temp_path: &Path, destination: &Path) -> Result<(), MoveError>;
}

/// Local filesystem mover scoped to the runtime's upload directory
///
/// A path counts as a pending upload when it is a regular file (symlinks are
/// refused) sitting directly inside the upload directory.
///
/// # Examples
///
/// ```rust,no_run
/// use upload_validator::relocate::{LocalMover, UploadMover};
/// use std::path::Path;
///
/// let mover = LocalMover::new("/var/tmp/uploads");
/// mover.move_upload(
///     Path::new("/var/tmp/uploads/upload-3kf9"),
///     Path::new("/srv/media/avatar.png"),
/// )?;
/// # Ok::<(), upload_validator::MoveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalMover {
    upload_dir: PathBuf,
}

impl LocalMover {
    /// Creates a mover for uploads received into `upload_dir`
    #[must_use]
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Directory the runtime writes pending uploads to
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Whether `path` is a regular file directly inside the upload directory
    #[must_use]
    pub fn is_pending_upload(&self, path: &Path) -> bool {
        self.resolve_pending(path).is_some()
    }

    /// Canonical path of `path` if it is a pending upload
    fn resolve_pending(&self, path: &Path) -> Option<PathBuf> {
        let metadata = fs::symlink_metadata(path).ok()?;
        if !metadata.file_type().is_file() {
            return None;
        }

        let file = fs::canonicalize(path).ok()?;
        let dir = fs::canonicalize(&self.upload_dir).ok()?;
        (file.parent() == Some(dir.as_path())).then_some(file)
    }
}

/// Copies `source` next to `destination`, renames the copy over it, then
/// removes `source`
///
/// `destination` either keeps its previous contents or holds the complete
/// upload; a partial copy is never visible under that name.
fn copy_across_devices(source: &Path, destination: &Path) -> Result<(), MoveError> {
    let dir = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut reader = File::open(source)?;
    let mut staged = NamedTempFile::new_in(dir)?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    fs::set_permissions(staged.path(), reader.metadata()?.permissions())?;
    staged.persist(destination).map_err(|e| e.error)?;

    // The upload is in place; a leftover source is only clutter
    if let Err(e) = fs::remove_file(source) {
        warn!(path = %source.display(), error = %e, "could not remove moved upload");
    }
    Ok(())
}

impl UploadMover for LocalMover {
    fn move_upload(&self, temp_path: &Path, destination: &Path) -> Result<(), MoveError> {
        let Some(source) = self.resolve_pending(temp_path) else {
            return Err(MoveError::NotPendingUpload(temp_path.to_path_buf()));
        };

        match fs::rename(&source, destination) {
            Ok(()) => Ok(()),
            // rename cannot cross filesystems
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                copy_across_devices(&source, destination)
            }
            Err(e) => Err(e.into()),
        }
    }
}
