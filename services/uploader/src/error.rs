use gallery_core::{FileFailure, RejectionReason};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the gallery client and the upload orchestrator
#[derive(Debug, Error)]
pub enum ClientError {
    /// The selection failed local checks before any request was made
    #[error("invalid selection: {0}")]
    Validation(#[from] RejectionReason),

    /// The server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to upload any files")]
    NothingUploaded { failures: Vec<FileFailure> },
}

impl ClientError {
    /// HTTP status of an API error, if the failure came from the server
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ClientError::Api {
            status: 404,
            message: "Event not found".to_string(),
        };
        assert_eq!(err.to_string(), "server returned 404: Event not found");
        assert_eq!(err.status(), Some(404));

        let err = ClientError::from(RejectionReason::TooManyFiles { count: 21, max: 20 });
        assert_eq!(
            err.to_string(),
            "invalid selection: too many files: 21 (max 20 per upload)"
        );
        assert_eq!(err.status(), None);
    }
}
