//! Photo ingestion: validate guest files, store them, index their metadata.
//!
//! Every file gets its own outcome. A failure on one file never stops the
//! others; only an unknown event code fails the request as a whole, and it
//! does so before anything is written to storage.

use crate::metadata_store::{MetadataStore, NewPhoto, StoreError};
use crate::object_store::ObjectStore;
use bytes::Bytes;
use gallery_core::{
    mime_for_filename, new_storage_path, normalize_mime, FileFailure, RejectionReason,
    UploadPolicy, UploadedPhoto,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_FILENAME: &str = "upload";

/// A file received from a guest, before validation
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl CandidateFile {
    /// Build a candidate from multipart metadata.
    ///
    /// A missing filename becomes `upload`; a missing content type is
    /// guessed from the filename.
    pub fn new(filename: Option<String>, content_type: Option<String>, data: Bytes) -> Self {
        let filename = filename
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

        let content_type = content_type
            .map(|ct| normalize_mime(&ct))
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| mime_for_filename(&filename).to_string());

        Self {
            filename,
            content_type,
            data,
        }
    }
}

/// Why one file was not ingested
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileRejectionReason {
    #[error("{0}")]
    Policy(RejectionReason),

    #[error("storage write failed")]
    Storage,

    #[error("could not resolve photo URL")]
    Url,

    #[error("could not record photo")]
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRejection {
    pub filename: String,
    pub reason: FileRejectionReason,
}

impl From<FileRejection> for FileFailure {
    fn from(rejection: FileRejection) -> Self {
        Self {
            filename: rejection.filename,
            reason: rejection.reason.to_string(),
        }
    }
}

/// Result of ingesting a single file
pub type FileOutcome = Result<UploadedPhoto, FileRejection>;

/// Request-level ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("event {0} not found")]
    EventNotFound(String),

    #[error("no files provided")]
    NoFiles,

    #[error("failed to look up event: {0}")]
    Store(#[from] StoreError),
}

/// Validates, stores and indexes guest photo uploads
pub struct PhotoIngestor {
    store: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    policy: UploadPolicy,
}

impl PhotoIngestor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            objects,
            policy,
        }
    }

    /// Ingest `files` into the event identified by `event_code`.
    ///
    /// Returns one outcome per input file, in input order. Files beyond the
    /// per-request limit are rejected without being looked at.
    #[instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn ingest(
        &self,
        event_code: &str,
        guest_name: Option<&str>,
        files: Vec<CandidateFile>,
    ) -> Result<Vec<FileOutcome>, IngestError> {
        if files.is_empty() {
            return Err(IngestError::NoFiles);
        }

        let event = self
            .store
            .find_event_by_code(event_code)
            .await?
            .ok_or_else(|| IngestError::EventNotFound(event_code.to_string()))?;

        let max_files = self.policy.max_files;
        let total = files.len();
        if total > max_files {
            warn!(
                event_code = %event_code,
                file_count = total,
                max_files = max_files,
                "Too many files in one upload, rejecting the excess"
            );
        }

        let mut outcomes = Vec::with_capacity(total);
        for (index, file) in files.into_iter().enumerate() {
            if index >= max_files {
                metrics::counter!("gallery.photos.rejected").increment(1);
                outcomes.push(Err(FileRejection {
                    filename: file.filename,
                    reason: FileRejectionReason::Policy(RejectionReason::TooManyFiles {
                        count: total,
                        max: max_files,
                    }),
                }));
                continue;
            }

            let outcome = self
                .ingest_file(event.id, &event.code, guest_name, file)
                .await;
            if let Err(ref rejection) = outcome {
                metrics::counter!("gallery.photos.rejected").increment(1);
                debug!(
                    filename = %rejection.filename,
                    reason = %rejection.reason,
                    "File not ingested"
                );
            }
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        info!(
            event_code = %event_code,
            succeeded = succeeded,
            failed = total - succeeded,
            "Upload processed"
        );

        Ok(outcomes)
    }

    /// Validate, store and index one file
    async fn ingest_file(
        &self,
        event_id: uuid::Uuid,
        event_code: &str,
        guest_name: Option<&str>,
        file: CandidateFile,
    ) -> FileOutcome {
        let CandidateFile {
            filename,
            content_type,
            data,
        } = file;
        let size = data.len() as u64;

        let reject = |reason: FileRejectionReason| FileRejection {
            filename: filename.clone(),
            reason,
        };

        self.policy
            .check_file(&content_type, size)
            .map_err(|reason| reject(FileRejectionReason::Policy(reason)))?;

        let storage_path = new_storage_path(event_code, &filename);
        let timer = Instant::now();

        if let Err(e) = self
            .objects
            .put_object(&storage_path, data, &content_type)
            .await
        {
            error!(error = %e, storage_path = %storage_path, "Failed to store photo");
            metrics::counter!("gallery.storage.failures").increment(1);
            return Err(reject(FileRejectionReason::Storage));
        }

        metrics::histogram!("gallery.upload.duration_seconds").record(timer.elapsed().as_secs_f64());

        let url = match self.objects.public_url(&storage_path).await {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, storage_path = %storage_path, "Failed to resolve photo URL");
                self.discard_object(&storage_path).await;
                return Err(reject(FileRejectionReason::Url));
            }
        };

        let record = match self
            .store
            .insert_photo(NewPhoto {
                event_id,
                filename: filename.clone(),
                storage_path: storage_path.clone(),
                mime: content_type,
                bytes: size as i64,
                guest_name: guest_name.map(str::to_string),
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, storage_path = %storage_path, "Failed to record photo");
                self.discard_object(&storage_path).await;
                return Err(reject(FileRejectionReason::Persistence));
            }
        };

        metrics::counter!("gallery.photos.uploaded").increment(1);
        metrics::counter!("gallery.bytes.uploaded").increment(size);

        Ok(UploadedPhoto {
            id: record.id,
            filename,
            url,
            storage_path,
        })
    }

    /// Best-effort removal of an object whose photo row was never written
    async fn discard_object(&self, storage_path: &str) {
        if let Err(e) = self.objects.delete_object(storage_path).await {
            warn!(error = %e, storage_path = %storage_path, "Failed to remove orphaned object");
        }
    }
}

/// Split outcomes into the success list and the failure list
pub fn partition_outcomes(outcomes: Vec<FileOutcome>) -> (Vec<UploadedPhoto>, Vec<FileFailure>) {
    let mut uploaded = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(photo) => uploaded.push(photo),
            Err(rejection) => failures.push(rejection.into()),
        }
    }

    (uploaded, failures)
}
