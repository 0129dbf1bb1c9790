//! Allow-list of file extensions and their content types

use serde::{Deserialize, Serialize};

/// One allow-list entry as it appears in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedType {
    /// File extension without the leading dot
    pub extension: String,

    /// Content type the file's bytes must sniff as
    pub mime_type: String,
}

/// Mapping of permitted file extensions to their expected content types
///
/// Entries keep the order they were inserted in. When several extensions map
/// to the same content type, lookups return the first one, so the order of the
/// configuration decides which extension a file gets.
///
/// # Examples
///
/// ```rust
/// use upload_validator::AllowedTypes;
///
/// let types = AllowedTypes::new()
///     .with("jpg", "image/jpeg")
///     .with("jpeg", "image/jpeg")
///     .with("png", "image/png");
///
/// assert_eq!(types.extension_for("image/jpeg"), Some("jpg"));
/// assert_eq!(types.extension_for("image/gif"), None);
/// assert_eq!(types.extensions(), vec!["jpg", "jpeg", "png"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AllowedType>", into = "Vec<AllowedType>")]
pub struct AllowedTypes {
    entries: Vec<(String, String)>,
}

impl AllowedTypes {
    /// Creates an empty allow-list
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds an entry, consuming and returning the list for chaining
    #[must_use]
    pub fn with(mut self, extension: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.insert(extension, mime_type);
        self
    }

    /// Adds an entry, returning the previous content type for the extension
    ///
    /// An existing extension keeps its position and only its content type changes.
    pub fn insert(
        &mut self,
        extension: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Option<String> {
        let extension = extension.into();
        let mime_type = mime_type.into();

        if let Some((_, existing)) = self.entries.iter_mut().find(|(ext, _)| *ext == extension) {
            return Some(std::mem::replace(existing, mime_type));
        }

        self.entries.push((extension, mime_type));
        None
    }

    /// Returns the first extension whose content type equals `mime_type` exactly
    #[must_use]
    pub fn extension_for(&self, mime_type: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, mime)| mime == mime_type)
            .map(|(ext, _)| ext.as_str())
    }

    /// Returns the content type configured for `extension`
    #[must_use]
    pub fn mime_type_for(&self, extension: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(ext, _)| ext == extension)
            .map(|(_, mime)| mime.as_str())
    }

    /// Returns the extensions in insertion order
    #[must_use]
    pub fn extensions(&self) -> Vec<&str> {
        self.entries.iter().map(|(ext, _)| ext.as_str()).collect()
    }

    /// Iterates over `(extension, mime_type)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(ext, mime)| (ext.as_str(), mime.as_str()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Into<String>, M: Into<String>> FromIterator<(E, M)> for AllowedTypes {
    fn from_iter<T: IntoIterator<Item = (E, M)>>(iter: T) -> Self {
        let mut types = Self::new();
        for (extension, mime_type) in iter {
            types.insert(extension, mime_type);
        }
        types
    }
}

impl From<Vec<AllowedType>> for AllowedTypes {
    fn from(entries: Vec<AllowedType>) -> Self {
        entries
            .into_iter()
            .map(|entry| (entry.extension, entry.mime_type))
            .collect()
    }
}

impl From<AllowedTypes> for Vec<AllowedType> {
    fn from(types: AllowedTypes) -> Self {
        types
            .entries
            .into_iter()
            .map(|(extension, mime_type)| AllowedType {
                extension,
                mime_type,
            })
            .collect()
    }
}
