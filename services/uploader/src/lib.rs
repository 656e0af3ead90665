//! Gallery Uploader
//!
//! Client side of the event gallery: a typed HTTP client for every API
//! endpoint and an upload orchestrator for guests.
//!
//! ## Upload flow
//!
//! ```text
//!  selected files
//!        │
//!        ▼
//! ┌──────────────┐  > 20 files: whole selection refused
//! │ Selection    │  bad type / too large: refused per file
//! │ validation   │
//! └──────────────┘
//!        │ accepted
//!        ▼
//! ┌──────────────┐  groups of 3, one request per file,
//! │ Upload       │  200 ms pause between groups
//! │ Orchestrator │──────────────▶ PhotoTransport (GalleryClient)
//! └──────────────┘
//!        │ transitions
//!        ▼
//! ┌──────────────┐
//! │ UploadTracker│──────────────▶ ProgressSink
//! └──────────────┘
//! ```

pub mod client;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod selection;

pub use client::{GalleryClient, DEFAULT_TIMEOUT};
pub use error::ClientError;
pub use orchestrator::{OrchestratorConfig, PhotoTransport, UploadOrchestrator, UploadReport};
pub use progress::{
    FileId, FileProgress, FileStatus, NoopSink, ProgressSink, TransitionError, UploadTracker,
};
pub use selection::{read_selection, validate_selection, RejectedFile, SelectedFile, Selection};
