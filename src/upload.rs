use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// MIME types the upload endpoint accepts.
pub const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "video/quicktime",
];

pub const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;
pub const VIDEO_MAX_BYTES: usize = 50 * 1024 * 1024;

/// Size ceiling for an accepted content type; `None` means the type is not
/// accepted at all.
pub fn size_limit(content_type: &str) -> Option<usize> {
    if !ALLOWED_TYPES.contains(&content_type) {
        return None;
    }
    Some(if content_type.starts_with("video/") {
        VIDEO_MAX_BYTES
    } else {
        IMAGE_MAX_BYTES
    })
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File type not allowed. Use images (jpeg, png, gif, webp) or videos (mp4, webm, mov)")]
    UnsupportedType(String),
    #[error("File too large. Max size is {0}MB")]
    TooLarge(usize),
    #[error("Upload failed. Please try again.")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredMedia {
    pub url: String,
    pub filename: String,
}

/// Local file storage for uploaded media, served back under `/media/`.
/// The stand-in for the hosted blob store the site used to upload to; the
/// contract is the same: accept a validated file, hand back a stable URL.
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&root) {
            log::warn!("could not create media dir {}: {}", root.display(), e);
        }
        Self { root }
    }

    /// Validate and write an upload, returning its public address. The
    /// stored name is collision-resistant: timestamp, random suffix, and the
    /// sanitized original extension.
    pub fn save(
        &self,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredMedia, UploadError> {
        let limit = size_limit(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;
        if data.len() > limit {
            return Err(UploadError::TooLarge(limit / (1024 * 1024)));
        }

        fs::create_dir_all(&self.root)?;
        let filename = unique_filename(original_name);
        fs::write(self.root.join(&filename), data)?;

        Ok(StoredMedia {
            url: format!("/media/{}", filename),
            filename,
        })
    }

    /// Best-effort removal of a previously returned URL. Failures are logged
    /// and reported as `false`; callers drop their own reference regardless.
    pub fn delete_by_url(&self, url: &str) -> bool {
        let name = match url.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => return false,
        };
        let path = match self.resolve(name) {
            Some(path) => path,
            None => return false,
        };
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("could not delete media {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Read a stored file for serving. `None` for unknown or unsafe names.
    pub fn read(&self, name: &str) -> Option<(Vec<u8>, &'static str)> {
        let path = self.resolve(name)?;
        let bytes = fs::read(path).ok()?;
        Some((bytes, content_type_for(name)))
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        // Stored names are flat; anything path-like is rejected.
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(self.root.join(name))
    }
}

fn unique_filename(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}.{}", Utc::now().timestamp_millis(), &suffix[..8], ext)
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn media_store() -> (tempfile::TempDir, MediaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn accepts_listed_types_with_the_right_limits() {
        assert_eq!(size_limit("image/png"), Some(IMAGE_MAX_BYTES));
        assert_eq!(size_limit("video/mp4"), Some(VIDEO_MAX_BYTES));
        assert_eq!(size_limit("video/quicktime"), Some(VIDEO_MAX_BYTES));
        assert_eq!(size_limit("text/plain"), None);
        assert_eq!(size_limit("application/pdf"), None);
    }

    #[test]
    fn save_and_read_roundtrip() {
        let (_dir, store) = media_store();
        let saved = store.save("pic.PNG", "image/png", b"\x89PNG data").unwrap();
        assert!(saved.url.starts_with("/media/"));
        assert!(saved.filename.ends_with(".png"));

        let (bytes, content_type) = store.read(&saved.filename).unwrap();
        assert_eq!(bytes, b"\x89PNG data");
        assert_eq!(content_type, "image/png");
    }

    #[test]
    fn rejects_unsupported_types() {
        let (_dir, store) = media_store();
        let err = store.save("note.txt", "text/plain", b"hello").unwrap_err();
        assert!(err.to_string().contains("File type not allowed"));
    }

    #[test]
    fn rejects_oversized_files_naming_the_limit() {
        let (_dir, store) = media_store();
        let data = vec![0u8; IMAGE_MAX_BYTES + 1];
        let err = store.save("big.jpg", "image/jpeg", &data).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Max size is 10MB");

        // Videos get the larger ceiling, and the message names it.
        let data = vec![0u8; VIDEO_MAX_BYTES + 1];
        let err = store.save("clip.mp4", "video/mp4", &data).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Max size is 50MB");
    }

    #[test]
    fn filenames_do_not_collide() {
        let mut names = HashSet::new();
        for _ in 0..100 {
            assert!(names.insert(unique_filename("photo.jpg")));
        }
    }

    #[test]
    fn filename_extension_is_sanitized() {
        assert!(unique_filename("weird.../../name").ends_with(".bin"));
        assert!(unique_filename("noext").ends_with(".bin"));
        assert!(unique_filename("clip.MOV").ends_with(".mov"));
    }

    #[test]
    fn delete_is_best_effort() {
        let (_dir, store) = media_store();
        let saved = store.save("pic.png", "image/png", b"data").unwrap();
        assert!(store.delete_by_url(&saved.url));
        assert!(store.read(&saved.filename).is_none());
        // Deleting again fails quietly.
        assert!(!store.delete_by_url(&saved.url));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let (_dir, store) = media_store();
        assert!(store.read("../secrets.txt").is_none());
        assert!(store.read("a/b.png").is_none());
        assert!(!store.delete_by_url("/media/"));
    }
}
