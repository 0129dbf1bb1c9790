//! Configuration for upload validation
//!
//! Settings are loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `UPLOAD_` prefix, `__` for nesting)
//! 2. `./upload.toml`, or the file passed to [`UploadSettings::load_from`]
//! 3. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # upload.toml
//! max_file_size_mb = 5
//! upload_tmp_dir = "/var/tmp/uploads"
//!
//! [[allowed_types]]
//! extension = "jpg"
//! mime_type = "image/jpeg"
//!
//! [[allowed_types]]
//! extension = "png"
//! mime_type = "image/png"
//! ```
//!
//! The allow-list is an array of tables rather than a TOML table so that its
//! order, which decides ties between extensions, survives loading.

use crate::types::AllowedTypes;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "upload.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "UPLOAD_";

/// Upload validation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Maximum accepted upload size in megabytes
    ///
    /// Zero accepts only empty files.
    pub max_file_size_mb: u64,

    /// Directory the runtime writes pending uploads to
    pub upload_tmp_dir: PathBuf,

    /// Permitted extensions and the content types they must sniff as
    pub allowed_types: AllowedTypes,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: 0,
            upload_tmp_dir: std::env::temp_dir(),
            allowed_types: AllowedTypes::new(),
        }
    }
}

impl UploadSettings {
    /// Loads settings from `./upload.toml` and the environment
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment override cannot be parsed.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use upload_validator::UploadSettings;
    ///
    /// let settings = UploadSettings::load()?;
    /// println!("limit: {} MB", settings.max_file_size_mb);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads settings from `path` and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment override cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = Figment::new()
            // Start with defaults
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            // Load from specified file (if it exists)
            .merge(Toml::file(path.as_ref()))
            // Environment variables override everything
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(settings)
    }

    /// Size limit in bytes
    #[must_use]
    pub const fn max_file_size_bytes(&self) -> u64 {
        crate::validator::megabytes_to_bytes(self.max_file_size_mb)
    }
}
