//! upload-validator: checks uploaded files before they reach their final location
//!
//! Given an upload record extracted by the surrounding runtime and a destination
//! path prefix, [`UploadValidator::handle_file`]:
//!
//! 1. verifies the transport delivered a single file intact
//! 2. enforces a maximum size
//! 3. sniffs the real content type from the file's bytes and looks it up in an
//!    allow-list keyed by extension
//! 4. moves the file to the prefix with the verified extension appended
//!
//! Client-supplied filenames and content types are never consulted.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use upload_validator::{UploadRecord, UploadSettings, UploadTable, UploadValidator};
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = UploadSettings::load()?;
//! let validator = UploadValidator::from_settings(&settings);
//!
//! // Filled in by whatever parsed the request
//! let mut uploads = UploadTable::new();
//! uploads.insert("avatar", UploadRecord::from_path("/var/tmp/uploads/upload-19c2")?);
//!
//! match validator.handle_file(&uploads, "avatar", "/srv/media/avatars/user-42") {
//!     Ok(path) => println!("stored at {}", path.display()),
//!     Err(e) => eprintln!("rejected: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod relocate;
pub mod sniff;
pub mod transport;
pub mod types;
pub mod validator;

pub use config::UploadSettings;
pub use error::{MoveError, UploadError, UploadResult};
pub use relocate::{LocalMover, UploadMover};
pub use sniff::{ContentSniffer, MagicSniffer};
pub use transport::{StatusField, TransportInspector, TransportStatus, UploadRecord, UploadTable};
pub use types::{AllowedType, AllowedTypes};
pub use validator::UploadValidator;
