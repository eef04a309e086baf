//! File content source.
//!
//! Resolves opaque file references to metadata and raw bytes. The default
//! implementation fetches over HTTP with a bounded timeout; tests supply
//! in-memory sources.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;

/// Hard ceiling on source file size (50 MB).
pub const MAX_SOURCE_BYTES: u64 = 50 * 1024 * 1024;

/// Opaque reference to a file held by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef(pub String);

impl FileRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolved file metadata.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Size in bytes as reported by the platform.
    pub byte_size: u64,
    /// MIME type or kind hint, when the platform provides one.
    pub kind_hint: Option<String>,
}

/// Source of file content, keyed by opaque reference.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Resolve a reference to its metadata without downloading.
    async fn resolve(&self, file: &FileRef) -> Result<FileMeta, PlatformError>;

    /// Download the full content of a file.
    async fn download(&self, file: &FileRef) -> Result<Vec<u8>, PlatformError>;
}

/// HTTP-backed file source. The file reference is expected to resolve to a
/// download URL (bot frameworks hand these out per file id).
pub struct HttpFileSource {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFileSource {
    /// Create a source with the given download timeout.
    pub fn new(timeout: Duration) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_bytes: MAX_SOURCE_BYTES,
        })
    }

    /// Override the size ceiling.
    pub fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = max;
        self
    }

    fn check_kind(&self, content_type: Option<&str>) -> Result<(), PlatformError> {
        let Some(kind) = content_type else {
            return Ok(());
        };
        let accepted = kind.starts_with("image/")
            || kind.starts_with("video/")
            || kind == "application/x-tgsticker"
            || kind == "application/octet-stream";
        if accepted {
            Ok(())
        } else {
            Err(PlatformError::WrongKind {
                detail: kind.to_string(),
            })
        }
    }
}

#[async_trait]
impl FileSource for HttpFileSource {
    async fn resolve(&self, file: &FileRef) -> Result<FileMeta, PlatformError> {
        let resp = self.client.head(file.as_str()).send().await?;
        let byte_size = resp.content_length().unwrap_or(0);
        let kind_hint = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if byte_size > self.max_bytes {
            return Err(PlatformError::FileTooLarge {
                size: byte_size,
                max: self.max_bytes,
            });
        }
        self.check_kind(kind_hint.as_deref())?;

        Ok(FileMeta {
            byte_size,
            kind_hint,
        })
    }

    async fn download(&self, file: &FileRef) -> Result<Vec<u8>, PlatformError> {
        let resp = self.client.get(file.as_str()).send().await?;
        if !resp.status().is_success() {
            return Err(PlatformError::DownloadFailed {
                reason: format!("status {}", resp.status()),
            });
        }
        if let Some(len) = resp.content_length()
            && len > self.max_bytes
        {
            return Err(PlatformError::FileTooLarge {
                size: len,
                max: self.max_bytes,
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(PlatformError::FileTooLarge {
                size: bytes.len() as u64,
                max: self.max_bytes,
            });
        }
        Ok(bytes.to_vec())
    }
}
