//! Validates a file that already sits in the upload directory
//!
//! Run with:
//! ```bash
//! cargo run --example validate_upload -- /tmp/upload-0001 /srv/media/avatar
//! ```
//!
//! Settings come from `./upload.toml` and `UPLOAD_*` environment variables.

use upload_validator::{observability, UploadRecord, UploadSettings, UploadTable, UploadValidator};

fn main() -> anyhow::Result<()> {
    observability::init()?;

    let mut args = std::env::args().skip(1);
    let (Some(temp_path), Some(target)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: validate_upload <temp-path> <target-base>");
    };

    let settings = UploadSettings::load()?;
    let validator = UploadValidator::from_settings(&settings);

    let mut uploads = UploadTable::new();
    uploads.insert("file", UploadRecord::from_path(&temp_path)?);

    let stored = validator.handle_file(&uploads, "file", &target)?;
    tracing::info!(path = %stored.display(), "upload accepted");

    Ok(())
}
