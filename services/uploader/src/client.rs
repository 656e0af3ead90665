//! Reqwest-backed client for the gallery HTTP API.
//!
//! Owns transport details only: URL building, request encoding, timeout and
//! mapping of error responses into [`ClientError`].

use crate::error::ClientError;
use crate::orchestrator::PhotoTransport;
use crate::selection::SelectedFile;
use async_trait::async_trait;
use gallery_core::{
    CreateEventRequest, ErrorBody, Event, EventEnvelope, EventsEnvelope, Photo, PhotosEnvelope,
    SignupRequest, UploadResponse, User, UserEnvelope,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GalleryClient {
    http: Client,
    base_url: Url,
}

impl GalleryClient {
    /// Build a client for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// `POST /signup`
    #[instrument(skip(self, request))]
    pub async fn sign_up(&self, request: &SignupRequest) -> Result<User, ClientError> {
        let response = self
            .http
            .post(self.endpoint(&["signup"])?)
            .json(request)
            .send()
            .await?;
        let envelope: UserEnvelope = decode(response).await?;
        Ok(envelope.user)
    }

    /// `POST /events`
    #[instrument(skip(self, request))]
    pub async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, ClientError> {
        let response = self
            .http
            .post(self.endpoint(&["events"])?)
            .json(request)
            .send()
            .await?;
        let envelope: EventEnvelope = decode(response).await?;
        Ok(envelope.event)
    }

    /// `GET /events?userId=`, newest first
    #[instrument(skip(self))]
    pub async fn list_events(&self, owner_id: &str) -> Result<Vec<Event>, ClientError> {
        let response = self
            .http
            .get(self.endpoint(&["events"])?)
            .query(&[("userId", owner_id)])
            .send()
            .await?;
        let envelope: EventsEnvelope = decode(response).await?;
        Ok(envelope.events)
    }

    /// `GET /events/{code}`
    #[instrument(skip(self))]
    pub async fn get_event(&self, code: &str) -> Result<Event, ClientError> {
        let response = self
            .http
            .get(self.endpoint(&["events", code])?)
            .send()
            .await?;
        let envelope: EventEnvelope = decode(response).await?;
        Ok(envelope.event)
    }

    /// `GET /events/{code}/photos`, newest first
    #[instrument(skip(self))]
    pub async fn list_photos(&self, code: &str) -> Result<Vec<Photo>, ClientError> {
        let response = self
            .http
            .get(self.endpoint(&["events", code, "photos"])?)
            .send()
            .await?;
        let envelope: PhotosEnvelope = decode(response).await?;
        Ok(envelope.photos)
    }

    /// `POST /events/{code}/photos` with every file in one request
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload_photos(
        &self,
        code: &str,
        files: &[SelectedFile],
        guest_name: Option<&str>,
    ) -> Result<UploadResponse, ClientError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.filename.clone())
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }
        if let Some(guest_name) = guest_name {
            form = form.text("guestName", guest_name.to_string());
        }

        let response = self
            .http
            .post(self.endpoint(&["events", code, "photos"])?)
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PhotoTransport for GalleryClient {
    async fn upload_photo(
        &self,
        event_code: &str,
        file: &SelectedFile,
        guest_name: Option<&str>,
    ) -> Result<UploadResponse, ClientError> {
        self.upload_photos(event_code, std::slice::from_ref(file), guest_name)
            .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;
    debug!(status = status.as_u16(), bytes = body.len(), "Received response");

    if !status.is_success() {
        return Err(api_error(status, &body));
    }

    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Map an error response, preferring the server's `{"error": ...}` message
fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(body) if body.failures.is_empty() => body.error,
        Ok(body) => {
            let details: Vec<String> = body
                .failures
                .iter()
                .map(|f| format!("{} ({})", f.filename, f.reason))
                .collect();
            format!("{}: {}", body.error, details.join(", "))
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                text
            }
        }
    };

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}
