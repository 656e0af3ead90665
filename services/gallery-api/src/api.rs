use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::ingestion::{partition_outcomes, CandidateFile, IngestError, PhotoIngestor};
use crate::metadata_store::{MetadataStore, NewEvent, NewUser, StoreError};
use crate::object_store::ObjectStore;
use anyhow::{Context, Result};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gallery_core::{
    validate_event_code, CreateEventRequest, EventEnvelope, EventsEnvelope, PhotosEnvelope,
    SignupRequest, UploadResponse, UserEnvelope,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub ingestor: Arc<PhotoIngestor>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        ingestor: PhotoIngestor,
    ) -> Self {
        Self {
            store,
            objects,
            ingestor: Arc::new(ingestor),
        }
    }
}

/// Query parameters for the owner's event list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub user_id: Option<String>,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig, body_limit: usize) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/signup", post(sign_up))
        .route("/events", get(list_events).post(create_event))
        .route("/events/:code", get(get_event))
        .route("/events/:code/photos", get(list_photos).post(upload_photos))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "gallery-api"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "database": "disconnected"
                })),
            )
        }
    }
}

/// Register a user issued by the identity provider
#[instrument(skip(state, request))]
async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let (Some(id), Some(email)) = (present(request.user_id), present(request.email)) else {
        return Err(ApiError::validation("User ID and email are required"));
    };

    let user = state
        .store
        .create_user(NewUser {
            id,
            email,
            name: present(request.name),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::conflict("User already exists"),
            other => ApiError::internal("Failed to create user", other),
        })?;

    info!(user_id = %user.id, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope { user: user.into() }),
    ))
}

/// List an owner's events, newest first
#[instrument(skip(state))]
async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListQuery>,
) -> Result<Json<EventsEnvelope>, ApiError> {
    let user_id =
        present(params.user_id).ok_or_else(|| ApiError::validation("User ID is required"))?;

    let events = state
        .store
        .list_events_for_owner(&user_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch events", e))?;

    Ok(Json(EventsEnvelope {
        events: events.into_iter().map(Into::into).collect(),
    }))
}

/// Create an event
#[instrument(skip(state, request))]
async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventEnvelope>), ApiError> {
    let (Some(title), Some(code), Some(owner_id)) = (
        present(request.title),
        present(request.code),
        present(request.owner_id),
    ) else {
        return Err(ApiError::validation("Title, code, and ownerId are required"));
    };

    validate_event_code(&code)
        .map_err(|e| ApiError::validation(format!("Invalid event code: {e}")))?;

    let date = present(request.date)
        .map(|raw| parse_event_date(&raw))
        .transpose()?;

    let event = state
        .store
        .create_event(NewEvent {
            title,
            description: present(request.description),
            date,
            location: present(request.location),
            code,
            owner_id,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => {
                ApiError::conflict("An event with this code already exists")
            }
            StoreError::ForeignKey(_) => {
                ApiError::validation("ownerId does not reference an existing user")
            }
            other => ApiError::internal("Failed to create event", other),
        })?;

    info!(event_id = %event.id, code = %event.code, "Event created");

    Ok((
        StatusCode::CREATED,
        Json(EventEnvelope {
            event: event.into(),
        }),
    ))
}

/// Fetch one event by its public code
#[instrument(skip(state))]
async fn get_event(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<EventEnvelope>, ApiError> {
    let event = state
        .store
        .find_event_with_owner(&code)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch event", e))?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    Ok(Json(EventEnvelope {
        event: event.into(),
    }))
}

/// List an event's photos, most recently uploaded first
#[instrument(skip(state))]
async fn list_photos(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PhotosEnvelope>, ApiError> {
    let event = state
        .store
        .find_event_by_code(&code)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch photos", e))?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    let records = state
        .store
        .list_photos_for_event(event.id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch photos", e))?;

    let mut photos = Vec::with_capacity(records.len());
    for record in records {
        let url = match state.objects.public_url(&record.storage_path).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, storage_path = %record.storage_path, "Failed to resolve photo URL");
                None
            }
        };
        photos.push(record.into_photo(url));
    }

    Ok(Json(PhotosEnvelope { photos }))
}

/// Accept guest photos as `multipart/form-data` (`files` parts plus an
/// optional `guestName` field)
#[instrument(skip(state, multipart))]
async fn upload_photos(
    State(state): State<AppState>,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files = Vec::new();
    let mut guest_name = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("files") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                files.push(CandidateFile::new(filename, content_type, data));
            }
            Some("guestName") => {
                let text = field.text().await.map_err(multipart_error)?;
                guest_name = present(Some(text));
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::validation("No files provided"));
    }

    let outcomes = state
        .ingestor
        .ingest(&code, guest_name.as_deref(), files)
        .await
        .map_err(|e| match e {
            IngestError::EventNotFound(_) => ApiError::not_found("Event not found"),
            IngestError::NoFiles => ApiError::validation("No files provided"),
            IngestError::Store(e) => ApiError::internal("Failed to upload photos", e),
        })?;

    let (photos, failures) = partition_outcomes(outcomes);
    if photos.is_empty() {
        return Err(ApiError::UploadFailed(failures));
    }

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded {} photo(s)", photos.len()),
        photos,
        failures,
    }))
}

/// Trimmed, non-empty value or `None`
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accept an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
fn parse_event_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ApiError::validation(format!("Invalid event date: {raw}")))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the maximum request size".to_string())
    } else {
        ApiError::validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Start the gallery API server, stopping when `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    body_limit: usize,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state, config, body_limit);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, body_limit = body_limit, "Starting gallery API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests;
