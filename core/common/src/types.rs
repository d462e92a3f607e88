//! Common types used throughout upup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Remote storage backends a picker can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// S3-compatible object storage.
    ObjectStorage,
    /// Microsoft OneDrive.
    OneDrive,
    /// Google Drive (via the Google picker).
    GoogleDrive,
}

impl ProviderKind {
    /// All provider kinds, in rendering order.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::ObjectStorage,
        ProviderKind::OneDrive,
        ProviderKind::GoogleDrive,
    ];

    /// Stable short name (e.g., "onedrive").
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::ObjectStorage => "object_storage",
            ProviderKind::OneDrive => "onedrive",
            ProviderKind::GoogleDrive => "gdrive",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file as listed by a remote provider, before it is downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-specific identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// MIME type, if the provider reports one.
    pub mime_type: Option<String>,
    /// Size in bytes, if known.
    pub size: Option<u64>,
    /// Last modification time, if known.
    pub modified: Option<DateTime<Utc>>,
    /// Provider the file was listed from.
    pub provider: ProviderKind,
}

impl RemoteFile {
    /// Create a remote file entry with only the required fields set.
    pub fn new(provider: ProviderKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: None,
            size: None,
            modified: None,
            provider,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// A materialized file handle handed to the host after selection.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name, as shown in the picker.
    pub name: String,
    /// MIME type, if known.
    pub mime_type: Option<String>,
    /// Complete file content.
    pub data: Vec<u8>,
    /// Identifier of the remote file this handle was materialized from.
    pub source_id: String,
}

impl SelectedFile {
    /// Materialize a remote file with its downloaded content.
    pub fn from_remote(file: &RemoteFile, data: Vec<u8>) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            data,
            source_id: file.id.clone(),
        }
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the content is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .field("source_id", &self.source_id)
            .finish()
    }
}

/// Key of an object written to the destination bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create an ObjectKey from a string.
    ///
    /// # Errors
    /// - Returns error if key is empty
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::InvalidInput(
                "ObjectKey cannot be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Generate a fresh, collision-free key for an uploaded file.
    ///
    /// The file name is kept as a readable suffix with anything outside
    /// `[A-Za-z0-9._-]` replaced by `_`.
    pub fn for_file(file_name: &str) -> Self {
        let mut sanitized: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.is_empty() {
            sanitized.push_str("file");
        }
        Self(format!("{}-{}", Uuid::new_v4(), sanitized))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Secret string value that zeroizes on drop and never prints itself.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value.
    ///
    /// Only hand this to the collaborator that needs it; never log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_key_empty_fails() {
        assert!(ObjectKey::new("").is_err());
        assert_eq!(ObjectKey::new("a").unwrap().as_str(), "a");
    }

    #[test]
    fn test_object_key_for_file_sanitizes() {
        let key = ObjectKey::for_file("my report (final).pdf");
        assert!(key.as_str().ends_with("-my_report__final_.pdf"));
    }

    #[test]
    fn test_object_key_for_empty_name() {
        let key = ObjectKey::for_file("");
        assert!(key.as_str().ends_with("-file"));
    }

    #[test]
    fn test_object_keys_are_unique() {
        let a = ObjectKey::for_file("a.png");
        let b = ObjectKey::for_file("a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[REDACTED]\"");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_provider_kind_serialization() {
        let json = serde_json::to_string(&ProviderKind::OneDrive).unwrap();
        assert_eq!(json, "\"one_drive\"");
        assert_eq!(ProviderKind::GoogleDrive.to_string(), "gdrive");
    }

    #[test]
    fn test_selected_file_from_remote() {
        let remote = RemoteFile::new(ProviderKind::GoogleDrive, "id-1", "photo.jpg")
            .with_mime_type("image/jpeg")
            .with_size(3);
        let selected = SelectedFile::from_remote(&remote, vec![1, 2, 3]);
        assert_eq!(selected.name, "photo.jpg");
        assert_eq!(selected.source_id, "id-1");
        assert_eq!(selected.len(), 3);
        assert!(!format!("{:?}", selected).contains("[1, 2, 3]"));
    }

    proptest! {
        #[test]
        fn prop_object_key_suffix_is_safe(name in ".*") {
            let key = ObjectKey::for_file(&name);
            let suffix = &key.as_str()[37..];
            prop_assert!(!suffix.is_empty());
            prop_assert!(suffix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
        }
    }
}
