//! JSON bodies exchanged between the gallery API and its clients.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered event owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identifier issued by the identity provider
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Display information about an event's owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOwner {
    pub name: Option<String>,
}

/// An owner-created collection point for guest photos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    /// Public code guests use to reach the event
    pub code: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    /// Present when the event was fetched by code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<EventOwner>,
}

/// Stored photo metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Uuid,
    pub filename: String,
    pub storage_path: String,
    pub mime: String,
    pub bytes: i64,
    pub guest_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub event_id: Uuid,
    /// Resolved public URL of the stored object
    #[serde(default)]
    pub url: Option<String>,
}

/// One successfully ingested file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPhoto {
    pub id: Uuid,
    pub filename: String,
    pub url: String,
    pub storage_path: String,
}

/// One file that could not be ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub filename: String,
    pub reason: String,
}

/// Response to `POST /events/{code}/photos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub photos: Vec<UploadedPhoto>,
    #[serde(default)]
    pub failures: Vec<FileFailure>,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FileFailure>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            failures: Vec::new(),
        }
    }
}

/// Request body for `POST /signup`.
///
/// Fields are optional so that missing values surface as a validation
/// error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Request body for `POST /events`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub date: Option<String>,
    pub location: Option<String>,
    pub code: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsEnvelope {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotosEnvelope {
    pub photos: Vec<Photo>,
}
