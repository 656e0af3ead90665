use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_core::{Event, EventOwner, Photo, User};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Errors raised by the relational store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKey(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.kind() {
                ErrorKind::UniqueViolation => return StoreError::Conflict(constraint),
                ErrorKind::ForeignKeyViolation => return StoreError::ForeignKey(constraint),
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Stored user row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored event row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub code: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// Event row joined with its owner's display name
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EventWithOwner {
    #[sqlx(flatten)]
    pub event: EventRecord,
    pub owner_name: Option<String>,
}

/// Stored photo row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PhotoRecord {
    pub id: Uuid,
    pub filename: String,
    pub storage_path: String,
    pub mime: String,
    pub bytes: i64,
    pub guest_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub event_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub code: String,
    pub owner_id: String,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub event_id: Uuid,
    pub filename: String,
    pub storage_path: String,
    pub mime: String,
    pub bytes: i64,
    pub guest_name: Option<String>,
}

impl From<UserRecord> for User {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            created_at: u.created_at,
        }
    }
}

impl From<EventRecord> for Event {
    fn from(e: EventRecord) -> Self {
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            date: e.date,
            location: e.location,
            code: e.code,
            owner_id: e.owner_id,
            created_at: e.created_at,
            owner: None,
        }
    }
}

impl From<EventWithOwner> for Event {
    fn from(row: EventWithOwner) -> Self {
        let mut event = Event::from(row.event);
        event.owner = Some(EventOwner {
            name: row.owner_name,
        });
        event
    }
}

impl PhotoRecord {
    /// Convert to the API representation with its resolved URL
    pub fn into_photo(self, url: Option<String>) -> Photo {
        Photo {
            id: self.id,
            filename: self.filename,
            storage_path: self.storage_path,
            mime: self.mime,
            bytes: self.bytes,
            guest_name: self.guest_name,
            uploaded_at: self.uploaded_at,
            event_id: self.event_id,
            url,
        }
    }
}

/// Persistence operations for users, events and photos.
///
/// Uniqueness (user id and email, event code, photo storage path) and
/// referential integrity are enforced by the store and reported as
/// [`StoreError::Conflict`] and [`StoreError::ForeignKey`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn create_event(&self, event: NewEvent) -> Result<EventRecord, StoreError>;

    async fn find_event_by_code(&self, code: &str) -> Result<Option<EventRecord>, StoreError>;

    async fn find_event_with_owner(&self, code: &str)
        -> Result<Option<EventWithOwner>, StoreError>;

    /// Events owned by a user, newest first
    async fn list_events_for_owner(&self, owner_id: &str) -> Result<Vec<EventRecord>, StoreError>;

    /// Insert a photo row; the upload timestamp is assigned by the store
    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, StoreError>;

    /// Photos of an event, most recently uploaded first
    async fn list_photos_for_event(&self, event_id: Uuid) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), StoreError>;
}

/// PostgreSQL-backed metadata store
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    /// Create a new metadata store with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, name, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, email, name, created_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id = %record.id, "User created");
        Ok(record)
    }

    #[instrument(skip(self, event), fields(code = %event.code, owner_id = %event.owner_id))]
    async fn create_event(&self, event: NewEvent) -> Result<EventRecord, StoreError> {
        let record = sqlx::query_as::<_, EventRecord>(
            r#"
            INSERT INTO events (
                id, title, description, date, location, code, owner_id, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, NOW()
            )
            RETURNING id, title, description, date, location, code, owner_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.code)
        .bind(&event.owner_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(event_id = %record.id, "Event created");
        Ok(record)
    }

    async fn find_event_by_code(&self, code: &str) -> Result<Option<EventRecord>, StoreError> {
        let event = sqlx::query_as::<_, EventRecord>(
            r#"
            SELECT id, title, description, date, location, code, owner_id, created_at
            FROM events
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn find_event_with_owner(
        &self,
        code: &str,
    ) -> Result<Option<EventWithOwner>, StoreError> {
        let event = sqlx::query_as::<_, EventWithOwner>(
            r#"
            SELECT e.id, e.title, e.description, e.date, e.location,
                   e.code, e.owner_id, e.created_at,
                   u.name AS owner_name
            FROM events e
            LEFT JOIN users u ON u.id = e.owner_id
            WHERE e.code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self))]
    async fn list_events_for_owner(&self, owner_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let events = sqlx::query_as::<_, EventRecord>(
            r#"
            SELECT id, title, description, date, location, code, owner_id, created_at
            FROM events
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    #[instrument(skip(self, photo), fields(event_id = %photo.event_id, storage_path = %photo.storage_path))]
    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, StoreError> {
        let record = sqlx::query_as::<_, PhotoRecord>(
            r#"
            INSERT INTO photos (
                id, filename, storage_path, mime, bytes,
                guest_name, uploaded_at, event_id
            ) VALUES (
                $1, $2, $3, $4, $5, $6, NOW(), $7
            )
            RETURNING id, filename, storage_path, mime, bytes,
                      guest_name, uploaded_at, event_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&photo.filename)
        .bind(&photo.storage_path)
        .bind(&photo.mime)
        .bind(photo.bytes)
        .bind(&photo.guest_name)
        .bind(photo.event_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(photo_id = %record.id, "Photo indexed");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn list_photos_for_event(&self, event_id: Uuid) -> Result<Vec<PhotoRecord>, StoreError> {
        let photos = sqlx::query_as::<_, PhotoRecord>(
            r#"
            SELECT id, filename, storage_path, mime, bytes,
                   guest_name, uploaded_at, event_id
            FROM photos
            WHERE event_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
