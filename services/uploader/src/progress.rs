//! Per-file upload progress.
//!
//! [`UploadTracker`] is a plain value updated through discrete transitions
//! (`Pending -> Uploading -> Completed | Failed`). After each transition the
//! orchestrator hands it to a [`ProgressSink`] for rendering.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Identifies one file within a single upload run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

impl FileId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Failed)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::Pending => "pending",
            FileStatus::Uploading => "uploading",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProgress {
    pub id: FileId,
    pub filename: String,
    pub status: FileStatus,
    /// 0 until the file completes, then 100
    pub progress: u8,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unknown file {0}")]
    UnknownFile(FileId),

    #[error("{id} cannot move from {from} to {to}")]
    Illegal {
        id: FileId,
        from: FileStatus,
        to: FileStatus,
    },
}

/// Status of every file in one upload run, keyed by [`FileId`]
#[derive(Debug, Clone, Default)]
pub struct UploadTracker {
    files: BTreeMap<FileId, FileProgress>,
}

impl UploadTracker {
    /// Track `filenames`, assigning ids in order, all `Pending`
    pub fn new<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files = filenames
            .into_iter()
            .enumerate()
            .map(|(index, filename)| {
                let id = FileId::new(index);
                (
                    id,
                    FileProgress {
                        id,
                        filename: filename.into(),
                        status: FileStatus::Pending,
                        progress: 0,
                        error: None,
                    },
                )
            })
            .collect();

        Self { files }
    }

    pub fn get(&self, id: FileId) -> Option<&FileProgress> {
        self.files.get(&id)
    }

    /// Files in id order
    pub fn iter(&self) -> impl Iterator<Item = &FileProgress> {
        self.files.values()
    }

    /// `Pending -> Uploading`
    pub fn start(&mut self, id: FileId) -> Result<(), TransitionError> {
        let file = self.transition(id, FileStatus::Pending, FileStatus::Uploading)?;
        file.progress = 0;
        Ok(())
    }

    /// `Uploading -> Completed`
    pub fn complete(&mut self, id: FileId) -> Result<(), TransitionError> {
        let file = self.transition(id, FileStatus::Uploading, FileStatus::Completed)?;
        file.progress = 100;
        Ok(())
    }

    /// `Uploading -> Failed`
    pub fn fail(&mut self, id: FileId, message: impl Into<String>) -> Result<(), TransitionError> {
        let file = self.transition(id, FileStatus::Uploading, FileStatus::Failed)?;
        file.progress = 0;
        file.error = Some(message.into());
        Ok(())
    }

    fn transition(
        &mut self,
        id: FileId,
        from: FileStatus,
        to: FileStatus,
    ) -> Result<&mut FileProgress, TransitionError> {
        let file = self
            .files
            .get_mut(&id)
            .ok_or(TransitionError::UnknownFile(id))?;

        if file.status != from {
            return Err(TransitionError::Illegal {
                id,
                from: file.status,
                to,
            });
        }

        file.status = to;
        Ok(file)
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn completed(&self) -> usize {
        self.count(FileStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    /// Completed plus failed
    pub fn settled(&self) -> usize {
        self.files.values().filter(|f| f.status.is_settled()).count()
    }

    pub fn is_finished(&self) -> bool {
        self.settled() == self.total()
    }

    fn count(&self, status: FileStatus) -> usize {
        self.files.values().filter(|f| f.status == status).count()
    }
}

/// Receives the tracker after every transition
pub trait ProgressSink: Send + Sync {
    fn on_update(&self, tracker: &UploadTracker, changed: FileId);
}

/// Discards progress updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_update(&self, _tracker: &UploadTracker, _changed: FileId) {}
}
