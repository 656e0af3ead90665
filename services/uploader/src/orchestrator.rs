//! Batched guest uploads.
//!
//! Files that pass local validation are sent in small groups: every file in
//! a group gets its own request, the group is awaited as a whole, and the
//! orchestrator pauses briefly before starting the next group.

use crate::error::ClientError;
use crate::progress::{FileId, ProgressSink, TransitionError, UploadTracker};
use crate::selection::{validate_selection, RejectedFile, SelectedFile};
use async_trait::async_trait;
use futures::future::join_all;
use gallery_core::{FileFailure, UploadPolicy, UploadResponse, UploadedPhoto};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Sends one file to an event's gallery
#[async_trait]
pub trait PhotoTransport: Send + Sync {
    async fn upload_photo(
        &self,
        event_code: &str,
        file: &SelectedFile,
        guest_name: Option<&str>,
    ) -> Result<UploadResponse, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Requests in flight at once
    pub group_size: usize,
    /// Pause between groups (not after the last)
    pub group_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            group_size: 3,
            group_delay: Duration::from_millis(200),
        }
    }
}

/// Outcome of an upload run with at least one success
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedPhoto>,
    /// Files the server (or the network) refused
    pub failures: Vec<FileFailure>,
    /// Files refused locally, never sent
    pub rejected: Vec<RejectedFile>,
}

pub struct UploadOrchestrator {
    transport: Arc<dyn PhotoTransport>,
    policy: UploadPolicy,
    config: OrchestratorConfig,
}

impl UploadOrchestrator {
    pub fn new(
        transport: Arc<dyn PhotoTransport>,
        policy: UploadPolicy,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            transport,
            policy,
            config: OrchestratorConfig {
                group_size: config.group_size.max(1),
                ..config
            },
        }
    }

    /// Validate `files` and upload the valid ones to `event_code`.
    ///
    /// Succeeds when at least one file was uploaded. Fails with
    /// [`ClientError::Validation`] if the selection is too large, or with
    /// [`ClientError::NothingUploaded`] if nothing got through.
    #[instrument(skip(self, files, sink), fields(files = files.len()))]
    pub async fn upload(
        &self,
        event_code: &str,
        guest_name: Option<&str>,
        files: Vec<SelectedFile>,
        sink: &dyn ProgressSink,
    ) -> Result<UploadReport, ClientError> {
        let selection = validate_selection(files, &self.policy)?;
        for rejected in &selection.rejected {
            warn!(filename = %rejected.filename, reason = %rejected.reason, "File rejected locally");
        }

        let mut report = UploadReport {
            rejected: selection.rejected,
            ..UploadReport::default()
        };

        let accepted = selection.accepted;
        let tracker = Mutex::new(UploadTracker::new(
            accepted.iter().map(|f| f.filename.clone()),
        ));

        for (group_index, group) in accepted.chunks(self.config.group_size).enumerate() {
            if group_index > 0 {
                tokio::time::sleep(self.config.group_delay).await;
            }

            let first = group_index * self.config.group_size;
            debug!(group = group_index, size = group.len(), "Starting upload group");

            let uploads = group.iter().enumerate().map(|(offset, file)| {
                self.upload_one(
                    FileId::new(first + offset),
                    event_code,
                    guest_name,
                    file,
                    &tracker,
                    sink,
                )
            });

            for result in join_all(uploads).await {
                match result {
                    Ok(photos) => report.uploaded.extend(photos),
                    Err(failure) => report.failures.push(failure),
                }
            }
        }

        info!(
            uploaded = report.uploaded.len(),
            failed = report.failures.len(),
            rejected = report.rejected.len(),
            "Upload run finished"
        );

        if report.uploaded.is_empty() {
            let failures = report
                .rejected
                .into_iter()
                .map(|r| FileFailure {
                    filename: r.filename,
                    reason: r.reason.to_string(),
                })
                .chain(report.failures)
                .collect();
            return Err(ClientError::NothingUploaded { failures });
        }

        Ok(report)
    }

    async fn upload_one(
        &self,
        id: FileId,
        event_code: &str,
        guest_name: Option<&str>,
        file: &SelectedFile,
        tracker: &Mutex<UploadTracker>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<UploadedPhoto>, FileFailure> {
        apply(tracker, sink, id, |t| t.start(id));

        let reason = match self
            .transport
            .upload_photo(event_code, file, guest_name)
            .await
        {
            Ok(response) if !response.photos.is_empty() => {
                apply(tracker, sink, id, |t| t.complete(id));
                return Ok(response.photos);
            }
            Ok(response) => response
                .failures
                .into_iter()
                .next()
                .map(|f| f.reason)
                .unwrap_or_else(|| "server accepted no photos".to_string()),
            Err(e) => e.to_string(),
        };

        warn!(filename = %file.filename, reason = %reason, "Upload failed");
        apply(tracker, sink, id, |t| t.fail(id, reason.clone()));

        Err(FileFailure {
            filename: file.filename.clone(),
            reason,
        })
    }
}

/// Run one tracker transition and notify the sink
fn apply(
    tracker: &Mutex<UploadTracker>,
    sink: &dyn ProgressSink,
    id: FileId,
    transition: impl FnOnce(&mut UploadTracker) -> Result<(), TransitionError>,
) {
    let mut tracker = tracker.lock();
    match transition(&mut *tracker) {
        Ok(()) => sink.on_update(&*tracker, id),
        Err(e) => warn!(error = %e, "Ignoring progress transition"),
    }
}
