//! Object storage
//!
//! Buckets are directories under the configured storage root. Objects are
//! addressed by a relative path inside the bucket and served publicly at
//! `{public_base_url}/{bucket}/{path}`.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::StorageConfig;

/// Storage buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Post media and story media (under `stories/`)
    Posts,
    Avatars,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Avatars => "avatars",
        }
    }

    pub const ALL: [Bucket; 2] = [Bucket::Posts, Bucket::Avatars];
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Object is too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("Unsupported media type: {0}")]
    UnsupportedType(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored object and its public address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub bucket: Bucket,
    pub path: String,
    pub public_url: String,
}

/// Local filesystem object storage
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    root: PathBuf,
    public_base_url: String,
    max_file_size: u64,
    allowed_types: Vec<String>,
}

impl ObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.path.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            max_file_size: config.max_file_size,
            allowed_types: config.allowed_types.clone(),
        }
    }

    /// Create bucket directories.
    pub async fn init(&self) -> Result<(), StorageError> {
        for bucket in Bucket::ALL {
            tokio::fs::create_dir_all(self.root.join(bucket.as_str())).await?;
        }
        Ok(())
    }

    /// Directory served for public URLs
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL of an object
    pub fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket.as_str(), path)
    }

    /// Check size and MIME type against the configured limits and return the
    /// extension the object is stored under.
    pub fn check_upload(&self, content_type: &str, size: u64) -> Result<&'static str, StorageError> {
        let unsupported = || StorageError::UnsupportedType(content_type.to_string());
        let extension = media_extension(content_type).ok_or_else(unsupported)?;
        if !self
            .allowed_types
            .iter()
            .any(|prefix| essence(content_type).starts_with(prefix.as_str()))
        {
            return Err(unsupported());
        }
        if size > self.max_file_size {
            return Err(StorageError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(extension)
    }

    /// Write an object. Without `upsert`, an existing object is an error.
    pub async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        upsert: bool,
    ) -> Result<StoredObject, StorageError> {
        let relative = validate_object_path(path)?;
        let target = self.root.join(bucket.as_str()).join(&relative);

        if !upsert && tokio::fs::try_exists(&target).await? {
            return Err(StorageError::AlreadyExists(format!("{}/{}", bucket.as_str(), path)));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::debug!(bucket = bucket.as_str(), path, size = bytes.len(), "object stored");

        Ok(StoredObject {
            bucket,
            path: path.to_string(),
            public_url: self.public_url(bucket, path),
        })
    }
}

/// Reject absolute paths and any `..` or empty segment.
fn validate_object_path(path: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(path);
    if path.is_empty() || path.contains("//") || path.ends_with('/') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    if candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(candidate.to_path_buf())
}

/// Media types accepted for storage and the extension each is stored under.
/// Anything a browser would render as a document (HTML, SVG) is absent.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("video/quicktime", "mov"),
];

/// `type/subtype` without parameters, lowercased
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Stored extension for a media type. The client's file name never decides it.
pub fn media_extension(content_type: &str) -> Option<&'static str> {
    let essence = essence(content_type);
    MEDIA_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_in(dir: &Path) -> ObjectStorage {
        ObjectStorage::new(&StorageConfig {
            path: dir.to_path_buf(),
            public_base_url: "http://localhost:8080/storage/".to_string(),
            max_file_size: 16,
            allowed_types: vec!["image/".to_string(), "video/".to_string()],
        })
    }

    #[tokio::test]
    async fn test_upload_and_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        storage.init().await.unwrap();

        let object = storage
            .upload(Bucket::Posts, "user/123.png", b"png", false)
            .await
            .unwrap();

        assert_eq!(object.public_url, "http://localhost:8080/storage/posts/user/123.png");
        let written = tokio::fs::read(dir.path().join("posts/user/123.png")).await.unwrap();
        assert_eq!(written, b"png");
    }

    #[tokio::test]
    async fn test_upload_without_upsert_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        storage.upload(Bucket::Avatars, "u/avatar.png", b"one", false).await.unwrap();
        let err = storage
            .upload(Bucket::Avatars, "u/avatar.png", b"two", false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        storage.upload(Bucket::Avatars, "u/avatar.png", b"two", true).await.unwrap();
        let written = tokio::fs::read(dir.path().join("avatars/u/avatar.png")).await.unwrap();
        assert_eq!(written, b"two");
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        for bad in ["../escape.png", "/abs.png", "a/../../b.png", "", "dir/"] {
            let err = storage.upload(Bucket::Posts, bad, b"x", true).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidPath(_)), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_check_upload_limits() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        assert_eq!(storage.check_upload("image/png", 10).unwrap(), "png");
        assert_eq!(storage.check_upload("Video/MP4; codecs=avc1", 10).unwrap(), "mp4");
        assert!(matches!(
            storage.check_upload("image/png", 17),
            Err(StorageError::TooLarge { size: 17, limit: 16 })
        ));
        assert!(matches!(
            storage.check_upload("text/html", 1),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_check_upload_rejects_renderable_documents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        for mime in ["image/svg+xml", "image/x-icon", "video/../html", "image/"] {
            assert!(
                matches!(storage.check_upload(mime, 1), Err(StorageError::UnsupportedType(_))),
                "accepted {:?}",
                mime
            );
        }
    }

    #[test]
    fn test_check_upload_respects_configured_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ObjectStorage::new(&StorageConfig {
            path: dir.path().to_path_buf(),
            public_base_url: "http://localhost:8080/storage".to_string(),
            max_file_size: 16,
            allowed_types: vec!["image/".to_string()],
        });

        assert!(storage.check_upload("image/gif", 1).is_ok());
        assert!(matches!(
            storage.check_upload("video/mp4", 1),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_media_extension() {
        assert_eq!(media_extension("image/jpeg"), Some("jpg"));
        assert_eq!(media_extension("video/quicktime"), Some("mov"));
        assert_eq!(media_extension("IMAGE/WEBP"), Some("webp"));
        assert_eq!(media_extension("image/svg+xml"), None);
        assert_eq!(media_extension("text/html"), None);
        assert_eq!(media_extension("weird"), None);
    }
}
