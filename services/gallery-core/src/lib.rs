//! Gallery Core
//!
//! Vocabulary shared by the gallery API service and the upload client:
//!
//! - **Upload policy**: allowed image types, per-file size limit and the
//!   per-request file count. The server enforces it; the client runs the same
//!   checks before sending anything.
//! - **Event codes**: generation and validation of the short public code that
//!   guests use to reach an event.
//! - **Storage paths**: collision-resistant object keys namespaced by event code.
//! - **Wire types**: the JSON bodies exchanged over HTTP.

pub mod code;
pub mod dto;
pub mod paths;
pub mod policy;

pub use code::{generate_event_code, validate_event_code, InvalidEventCode};
pub use dto::{
    CreateEventRequest, ErrorBody, Event, EventEnvelope, EventOwner, EventsEnvelope, FileFailure,
    Photo, PhotosEnvelope, SignupRequest, UploadResponse, UploadedPhoto, User, UserEnvelope,
};
pub use paths::{new_storage_path, photo_storage_path, sanitize_filename};
pub use policy::{
    is_allowed_mime, mime_for_filename, normalize_mime, RejectionReason, UploadPolicy,
    ALLOWED_MIME_TYPES, MAX_FILES_PER_REQUEST, MAX_FILE_BYTES,
};
