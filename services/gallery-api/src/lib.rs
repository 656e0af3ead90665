//! Gallery API Service
//!
//! HTTP service behind event photo galleries. Owners sign up and create
//! events identified by short shareable codes; guests who know a code upload
//! photos to it without an account, and anyone with the code can browse the
//! gallery.
//!
//! ## Features
//!
//! - **Events**: Create, look up by code, and list an owner's events newest
//!   first
//! - **Guest Uploads**: `multipart/form-data` uploads of up to 20 images per
//!   request, each validated, stored and indexed independently
//! - **Partial Success**: One bad file never fails the others; per-file
//!   failures are reported back to the caller
//! - **Object Storage**: S3 or any S3-compatible backend, with presigned or
//!   public URLs for browser display
//!
//! ## Architecture
//!
//! ```text
//!  Owner / Guest              PostgreSQL
//! ┌──────────────┐           ┌──────────────┐
//! │ HTTP clients │           │ users        │
//! └──────────────┘           │ events       │
//!        │                   │ photos       │
//!        ▼                   └──────────────┘
//! ┌──────────────┐                  ▲
//! │ Gallery API  │──────────────────┤
//! │ (axum)       │                  │
//! └──────────────┘                  │
//!        │ uploads                  │
//!        ▼                          │
//! ┌──────────────┐           ┌──────────────┐
//! │ Photo        │──────────▶│ Metadata     │
//! │ Ingestor     │           │ Store        │
//! └──────────────┘           └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ Object Store │  events/{code}/{millis}-{suffix}-{name}
//! │ (S3)         │
//! └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod metadata_store;
pub mod object_store;

#[cfg(test)]
mod testing;

pub use api::{create_router, start_api_server, AppState};
pub use config::Config;
pub use error::ApiError;
pub use ingestion::{CandidateFile, FileOutcome, FileRejection, IngestError, PhotoIngestor};
pub use metadata_store::{MetadataStore, PgMetadataStore, StoreError};
pub use object_store::{ObjectStore, S3ObjectStore, StorageError};
