//! In-memory metadata store for unit tests.
//!
//! Mirrors the uniqueness and foreign-key rules of the PostgreSQL schema so
//! handlers see the same `StoreError` variants they would in production.

use crate::metadata_store::{
    EventRecord, EventWithOwner, MetadataStore, NewEvent, NewPhoto, NewUser, PhotoRecord,
    StoreError, UserRecord,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub const OWNER_ID: &str = "owner-1";
pub const EVENT_CODE: &str = "PARTY1";

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    events: Vec<EventRecord>,
    photos: Vec<PhotoRecord>,
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `ping` fail, as if the database were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn photos(&self) -> Vec<PhotoRecord> {
        self.tables.lock().photos.clone()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.tables.lock().events.clone()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.lock();
        if tables.users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Conflict("users_pkey".to_string()));
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }

        let record = UserRecord {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: Utc::now(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn create_event(&self, event: NewEvent) -> Result<EventRecord, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.users.iter().any(|u| u.id == event.owner_id) {
            return Err(StoreError::ForeignKey("events_owner_id_fkey".to_string()));
        }
        if tables.events.iter().any(|e| e.code == event.code) {
            return Err(StoreError::Conflict("events_code_key".to_string()));
        }

        // Strictly increasing timestamps keep newest-first ordering deterministic
        let created_at = tables
            .events
            .last()
            .map(|e| e.created_at + Duration::milliseconds(1))
            .unwrap_or_else(Utc::now);

        let record = EventRecord {
            id: Uuid::new_v4(),
            title: event.title,
            description: event.description,
            date: event.date,
            location: event.location,
            code: event.code,
            owner_id: event.owner_id,
            created_at,
        };
        tables.events.push(record.clone());
        Ok(record)
    }

    async fn find_event_by_code(&self, code: &str) -> Result<Option<EventRecord>, StoreError> {
        Ok(self
            .tables
            .lock()
            .events
            .iter()
            .find(|e| e.code == code)
            .cloned())
    }

    async fn find_event_with_owner(
        &self,
        code: &str,
    ) -> Result<Option<EventWithOwner>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.events.iter().find(|e| e.code == code).map(|event| {
            let owner_name = tables
                .users
                .iter()
                .find(|u| u.id == event.owner_id)
                .and_then(|u| u.name.clone());
            EventWithOwner {
                event: event.clone(),
                owner_name,
            }
        }))
    }

    async fn list_events_for_owner(&self, owner_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let mut events: Vec<EventRecord> = self
            .tables
            .lock()
            .events
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.events.iter().any(|e| e.id == photo.event_id) {
            return Err(StoreError::ForeignKey("photos_event_id_fkey".to_string()));
        }
        if tables
            .photos
            .iter()
            .any(|p| p.storage_path == photo.storage_path)
        {
            return Err(StoreError::Conflict("photos_storage_path_key".to_string()));
        }

        let uploaded_at = tables
            .photos
            .last()
            .map(|p| p.uploaded_at + Duration::milliseconds(1))
            .unwrap_or_else(Utc::now);

        let record = PhotoRecord {
            id: Uuid::new_v4(),
            filename: photo.filename,
            storage_path: photo.storage_path,
            mime: photo.mime,
            bytes: photo.bytes,
            guest_name: photo.guest_name,
            uploaded_at,
            event_id: photo.event_id,
        };
        tables.photos.push(record.clone());
        Ok(record)
    }

    async fn list_photos_for_event(&self, event_id: Uuid) -> Result<Vec<PhotoRecord>, StoreError> {
        let mut photos: Vec<PhotoRecord> = self
            .tables
            .lock()
            .photos
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(photos)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

/// A store holding one owner and one event with code [`EVENT_CODE`]
pub async fn seeded_store() -> Arc<InMemoryMetadataStore> {
    let store = Arc::new(InMemoryMetadataStore::new());
    store
        .create_user(NewUser {
            id: OWNER_ID.to_string(),
            email: "owner@example.com".to_string(),
            name: Some("Olive Owner".to_string()),
        })
        .await
        .unwrap();
    store
        .create_event(NewEvent {
            title: "Launch Party".to_string(),
            description: None,
            date: None,
            location: None,
            code: EVENT_CODE.to_string(),
            owner_id: OWNER_ID.to_string(),
        })
        .await
        .unwrap();
    store
}
