//! Local validation of a guest's file selection.
//!
//! Runs the same policy the server enforces so obviously bad files never
//! leave the machine.

use crate::error::ClientError;
use bytes::Bytes;
use gallery_core::{mime_for_filename, RejectionReason, UploadPolicy};
use std::path::{Path, PathBuf};

/// A file picked for upload, held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read a file from disk, taking its content type from the extension
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let data = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = mime_for_filename(&filename);

        Ok(Self::new(filename, content_type, Bytes::from(data)))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Read the files at `paths`, refusing an oversized selection before any I/O
pub async fn read_selection(
    paths: &[PathBuf],
    policy: &UploadPolicy,
) -> Result<Vec<SelectedFile>, ClientError> {
    policy.check_count(paths.len())?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(SelectedFile::from_path(path).await?);
    }
    Ok(files)
}

/// A file refused locally, with the reason shown to the guest
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFile {
    pub filename: String,
    pub reason: RejectionReason,
}

/// Result of validating a selection
#[derive(Debug, Default)]
pub struct Selection {
    pub accepted: Vec<SelectedFile>,
    pub rejected: Vec<RejectedFile>,
}

/// Split `files` into uploadable files and per-file rejections.
///
/// A selection larger than the policy's file count is refused as a whole.
pub fn validate_selection(
    files: Vec<SelectedFile>,
    policy: &UploadPolicy,
) -> Result<Selection, ClientError> {
    policy.check_count(files.len())?;

    let mut selection = Selection::default();
    for file in files {
        match policy.check_file(&file.content_type, file.size()) {
            Ok(()) => selection.accepted.push(file),
            Err(reason) => selection.rejected.push(RejectedFile {
                filename: file.filename,
                reason,
            }),
        }
    }

    Ok(selection)
}
