use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest accepted photo, in bytes (10 MiB)
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Most files accepted in one submission
pub const MAX_FILES_PER_REQUEST: usize = 20;

/// Image MIME types guests may upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Why a file (or a whole selection) was refused before upload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("invalid file type: {0}")]
    UnsupportedType(String),

    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("file is empty")]
    Empty,

    #[error("too many files: {count} (max {max} per upload)")]
    TooManyFiles { count: usize, max: usize },
}

/// Limits applied to guest uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Maximum size of a single file in bytes
    pub max_file_bytes: u64,
    /// Maximum number of files per submission
    pub max_files: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_FILE_BYTES,
            max_files: MAX_FILES_PER_REQUEST,
        }
    }
}

impl UploadPolicy {
    /// Check a single file's declared type and size.
    ///
    /// Type is checked first, then emptiness, then size.
    pub fn check_file(&self, content_type: &str, size: u64) -> Result<(), RejectionReason> {
        if !is_allowed_mime(content_type) {
            return Err(RejectionReason::UnsupportedType(normalize_mime(content_type)));
        }
        if size == 0 {
            return Err(RejectionReason::Empty);
        }
        if size > self.max_file_bytes {
            return Err(RejectionReason::TooLarge {
                size,
                max: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Check the number of files in one submission
    pub fn check_count(&self, count: usize) -> Result<(), RejectionReason> {
        if count > self.max_files {
            return Err(RejectionReason::TooManyFiles {
                count,
                max: self.max_files,
            });
        }
        Ok(())
    }
}

/// Lowercase a MIME type and drop any parameters (`; charset=...`)
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_allowed_mime(content_type: &str) -> bool {
    let normalized = normalize_mime(content_type);
    ALLOWED_MIME_TYPES.contains(&normalized.as_str())
}

/// Guess a content type from a file name's extension
pub fn mime_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpeg") | Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
