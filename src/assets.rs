//! Staged asset lifecycle.
//!
//! Processed output is written to a shared temporary directory before being
//! handed to the reply sink or the pack publisher. Every staged file is a
//! scoped resource: the creator owns it until it is explicitly removed or
//! its path ownership is transferred, and a drop deletes whatever is left.
//! Deletes are idempotent; a file that is already gone is not an error.
//!
//! Filenames are namespaced by (purpose, owning user, timestamp) so that
//! concurrent sessions sharing the directory cannot collide.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;

/// Outcome of a sweep pass over the staging directory.
#[derive(Debug, Clone, Copy)]
pub struct SweepReport {
    /// Files inspected.
    pub checked: usize,
    /// Files removed.
    pub removed: usize,
}

/// Shared staging directory for processed media.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to a new staged file and return its handle.
    pub async fn stage(
        &self,
        purpose: &str,
        user_id: i64,
        bytes: &[u8],
        ext: &str,
    ) -> std::io::Result<StagedAsset> {
        let asset = self.reserve(purpose, user_id, ext);
        tokio::fs::write(&asset.path, bytes).await?;
        tracing::debug!(path = %asset.path.display(), size = bytes.len(), "Staged asset");
        Ok(asset)
    }

    /// Reserve a staged path without creating the file. Used when an
    /// external process (e.g. a transcoder) produces the output.
    pub fn reserve(&self, purpose: &str, user_id: i64, ext: &str) -> StagedAsset {
        let stamp = Utc::now().timestamp_micros();
        let name = format!("{purpose}_{user_id}_{stamp}.{ext}");
        StagedAsset {
            path: self.root.join(name),
            released: false,
        }
    }

    /// Delete files older than `max_age`. Races with per-request cleanup are
    /// expected; missing files are skipped silently.
    pub async fn sweep(&self, max_age: Duration) -> std::io::Result<SweepReport> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut report = SweepReport {
            checked: 0,
            removed: 0,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            report.checked += 1;

            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if modified <= cutoff {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => report.removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "Sweep delete failed");
                    }
                }
            }
        }

        Ok(report)
    }
}

/// A temporary file holding processed bytes.
///
/// Removed on drop unless [`StagedAsset::into_path`] transferred ownership
/// or [`StagedAsset::remove`] already deleted it.
#[derive(Debug)]
pub struct StagedAsset {
    path: PathBuf,
    released: bool,
}

impl StagedAsset {
    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component of the staged path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the staged content back.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Delete the staged file. Idempotent: an already-absent file succeeds.
    pub async fn remove(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Staged file already gone");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged file");
            }
        }
    }

    /// Transfer ownership of the file to the caller; drop no longer deletes.
    pub fn into_path(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StagedAsset {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Drop cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stage_writes_namespaced_file() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path()).unwrap();

        let asset = store.stage("icon", 42, b"bytes", "png").await.unwrap();
        assert!(asset.path().exists());
        let name = asset.file_name();
        assert!(name.starts_with("icon_42_"));
        assert!(name.ends_with(".png"));
        assert_eq!(asset.read().await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path()).unwrap();

        let asset = store.stage("sticker", 1, b"x", "png").await.unwrap();
        let path = asset.path().to_path_buf();
        // Simulate the sweep racing the per-request cleanup.
        std::fs::remove_file(&path).unwrap();
        asset.remove().await; // must not panic or error
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_deletes_unreleased_file() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path()).unwrap();

        let path = {
            let asset = store.stage("sticker", 1, b"x", "png").await.unwrap();
            asset.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_into_path_disarms_drop() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path()).unwrap();

        let asset = store.stage("sticker", 1, b"x", "png").await.unwrap();
        let path = asset.into_path();
        assert!(path.exists());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_files() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path()).unwrap();

        let asset = store.stage("sticker", 7, b"x", "png").await.unwrap();

        // Fresh file survives a 1-hour threshold.
        let report = store.sweep(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(report.removed, 0);
        assert!(asset.path().exists());

        // Zero threshold treats everything as expired.
        let report = store.sweep(Duration::ZERO).await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(!asset.path().exists());

        let _ = asset.into_path();
    }
}
