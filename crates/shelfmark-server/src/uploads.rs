//! Thumbnail file storage.
//!
//! Uploaded files land under `<dir>/thumbnails/` with randomly generated
//! names; only the derived public path is recorded on the book. Deletes are
//! best-effort — a failure is logged and never aborts the triggering
//! operation.

use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;

use shelfmark_core::{ApiError, ApiResult};

/// Subdirectory and public route segment for thumbnails.
const THUMBNAILS_SEGMENT: &str = "thumbnails";

/// Extensions accepted for thumbnail uploads.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Stores and removes thumbnail files.
#[derive(Clone)]
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    /// Creates a store rooted at the uploads directory.
    #[must_use]
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: uploads_dir.into(),
        }
    }

    /// Saves a thumbnail, returning its public path
    /// (`/uploads/thumbnails/<name>.<ext>`).
    ///
    /// # Errors
    ///
    /// Returns a validation error for unsupported extensions or empty
    /// files, and an internal error when the write fails.
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> ApiResult<String> {
        if bytes.is_empty() {
            return Err(ApiError::validation("thumbnail file is empty"));
        }
        let ext = extension_of(original_name)?;

        let mut random = [0u8; 16];
        OsRng.fill_bytes(&mut random);
        let file_name = format!("{}.{ext}", hex::encode(random));

        let dir = self.root.join(THUMBNAILS_SEGMENT);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::internal(format!("Creating upload directory failed: {e}")))?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ApiError::internal(format!("Writing thumbnail failed: {e}")))?;

        tracing::debug!(path = %path.display(), "Thumbnail stored");
        Ok(format!("/uploads/{THUMBNAILS_SEGMENT}/{file_name}"))
    }

    /// Removes the file behind a public path, best-effort.
    pub async fn delete(&self, public_path: &str) {
        let Some(file_name) = public_path
            .strip_prefix(&format!("/uploads/{THUMBNAILS_SEGMENT}/"))
            .filter(|name| !name.contains('/') && !name.contains(".."))
        else {
            tracing::warn!(path = %public_path, "Refusing to delete non-thumbnail path");
            return;
        };
        let path = self.root.join(THUMBNAILS_SEGMENT).join(file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Thumbnail delete failed");
        }
    }
}

/// Extracts and validates the lowercase file extension.
fn extension_of(original_name: Option<&str>) -> ApiResult<String> {
    let ext = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ApiError::validation("thumbnail file has no extension"))?;

    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::validation(format!(
            "thumbnail extension must be one of {ALLOWED_EXTENSIONS:?}"
        )));
    }
    Ok(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());

        let public = store.save(Some("cover.PNG"), b"fake image").await.unwrap();
        assert!(public.starts_with("/uploads/thumbnails/"));
        assert!(public.ends_with(".png"));

        let file_name = public.rsplit('/').next().unwrap();
        let on_disk = dir.path().join("thumbnails").join(file_name);
        assert!(on_disk.exists());

        store.delete(&public).await;
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let a = store.save(Some("x.jpg"), b"a").await.unwrap();
        let b = store.save(Some("x.jpg"), b"b").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let err = store.save(Some("cover.exe"), b"bytes").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = store.save(None, b"bytes").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        assert!(store.save(Some("cover.png"), b"").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_refuses_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        // Nothing to assert beyond "does not panic and does not touch the
        // filesystem outside the root"; the guard logs and returns.
        store.delete("/uploads/thumbnails/../secrets.txt").await;
        store.delete("/etc/passwd").await;
    }
}
