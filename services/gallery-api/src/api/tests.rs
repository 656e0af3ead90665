use super::*;
use crate::object_store::{MockObjectStore, StorageError};
use crate::testing::{seeded_store, InMemoryMetadataStore, EVENT_CODE, OWNER_ID};
use axum::body::Body;
use axum::http::{header, Request};
use gallery_core::{UploadPolicy, MAX_FILE_BYTES};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "gallery-test-boundary";
const TEST_BODY_LIMIT: usize = 64 * 1024 * 1024;
const JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

fn app(store: Arc<InMemoryMetadataStore>, objects: MockObjectStore) -> Router {
    app_with_limit(store, objects, TEST_BODY_LIMIT)
}

fn app_with_limit(
    store: Arc<InMemoryMetadataStore>,
    objects: MockObjectStore,
    body_limit: usize,
) -> Router {
    let objects: Arc<dyn ObjectStore> = Arc::new(objects);
    let ingestor = PhotoIngestor::new(store.clone(), objects.clone(), UploadPolicy::default());
    let state = AppState::new(store, objects, ingestor);
    create_router(state, &ApiConfig::default(), body_limit)
}

fn accepting_objects() -> MockObjectStore {
    let mut objects = MockObjectStore::new();
    objects.expect_put_object().returning(|_, _, _| Ok(()));
    objects
        .expect_public_url()
        .returning(|key| Ok(format!("https://cdn.test/{key}")));
    objects
}

fn untouched_objects() -> MockObjectStore {
    let mut objects = MockObjectStore::new();
    objects.expect_put_object().never();
    objects
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a `multipart/form-data` upload of `(filename, content type, bytes)` parts
fn upload_request(code: &str, files: &[(&str, &str, &[u8])], guest_name: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    for (filename, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(guest) = guest_name {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"guestName\"\r\n\r\n{guest}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(format!("/events/{code}/photos"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = app(seeded_store().await, MockObjectStore::new());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_signup_creates_user() {
    let app = app(Arc::new(InMemoryMetadataStore::new()), MockObjectStore::new());

    let (status, body) = send(
        &app,
        post_json(
            "/signup",
            json!({ "userId": "idp-42", "email": "sam@example.com", "name": "Sam" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["id"], "idp-42");
    assert_eq!(body["user"]["name"], "Sam");
}

#[tokio::test]
async fn test_signup_duplicate_email_is_conflict() {
    let app = app(seeded_store().await, MockObjectStore::new());

    let (status, body) = send(
        &app,
        post_json(
            "/signup",
            json!({ "userId": "someone-else", "email": "owner@example.com" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn test_signup_requires_id_and_email() {
    let app = app(Arc::new(InMemoryMetadataStore::new()), MockObjectStore::new());

    let (status, _) = send(&app, post_json("/signup", json!({ "email": "a@b.c" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json("/signup", json!({ "userId": "x", "email": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_event() {
    let store = seeded_store().await;
    let app = app(store.clone(), MockObjectStore::new());

    let (status, body) = send(
        &app,
        post_json(
            "/events",
            json!({
                "title": "Graduation",
                "description": "Class of 2024",
                "date": "2024-06-20",
                "location": "Main Hall",
                "code": "GRAD24",
                "ownerId": OWNER_ID
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["event"]["code"], "GRAD24");
    assert_eq!(body["event"]["ownerId"], OWNER_ID);
    assert_eq!(body["event"]["date"], "2024-06-20T00:00:00Z");
    assert_eq!(store.events().len(), 2);
}

#[tokio::test]
async fn test_create_event_duplicate_code_is_conflict() {
    let store = seeded_store().await;
    let app = app(store.clone(), MockObjectStore::new());

    let (status, body) = send(
        &app,
        post_json(
            "/events",
            json!({ "title": "Again", "code": EVENT_CODE, "ownerId": OWNER_ID }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "An event with this code already exists");
    assert_eq!(store.events().len(), 1);
}

#[tokio::test]
async fn test_create_event_validation() {
    let app = app(seeded_store().await, MockObjectStore::new());

    let cases = [
        json!({ "code": "NEW1", "ownerId": OWNER_ID }),
        json!({ "title": "No code", "ownerId": OWNER_ID }),
        json!({ "title": "No owner", "code": "NEW2" }),
        json!({ "title": "Bad code", "code": "has space", "ownerId": OWNER_ID }),
        json!({ "title": "Bad date", "code": "NEW3", "ownerId": OWNER_ID, "date": "next friday" }),
        json!({ "title": "Ghost owner", "code": "NEW4", "ownerId": "nobody" }),
    ];

    for case in cases {
        let (status, body) = send(&app, post_json("/events", case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case {case}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_list_events_newest_first() {
    let store = seeded_store().await;
    let app = app(store, MockObjectStore::new());

    let (status, _) = send(
        &app,
        post_json(
            "/events",
            json!({ "title": "Second", "code": "SECOND", "ownerId": OWNER_ID }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, get(&format!("/events?userId={OWNER_ID}"))).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["SECOND", EVENT_CODE]);

    let (status, body) = send(&app, get("/events")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User ID is required");
}

#[tokio::test]
async fn test_get_event_includes_owner_name() {
    let app = app(seeded_store().await, MockObjectStore::new());

    let (status, body) = send(&app, get(&format!("/events/{EVENT_CODE}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["title"], "Launch Party");
    assert_eq!(body["event"]["owner"]["name"], "Olive Owner");
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let app = app(seeded_store().await, MockObjectStore::new());

    let (status, body) = send(&app, get("/events/UNKNOWN")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Event not found" }));

    let (status, body) = send(&app, get("/events/UNKNOWN/photos")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("photos").is_none());
}

#[tokio::test]
async fn test_unusual_unknown_codes_are_not_found() {
    let app = app(seeded_store().await, untouched_objects());
    let long_code = "Z".repeat(33);

    for uri in [
        "/events/no.such.event".to_string(),
        "/events/no.such.event/photos".to_string(),
        "/events/bad%20code".to_string(),
        format!("/events/{long_code}"),
        format!("/events/{long_code}/photos"),
    ] {
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri {uri}");
        assert_eq!(body["error"], "Event not found");
    }

    let (status, _) = send(
        &app,
        upload_request("no.such.event", &[("a.jpg", "image/jpeg", JPEG)], None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_hides_database_error() {
    let store = seeded_store().await;
    store.set_unavailable(true);
    let app = app(store, MockObjectStore::new());

    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({ "status": "not_ready", "database": "disconnected" })
    );
}

#[tokio::test]
async fn test_list_photos_without_resolvable_url() {
    let store = seeded_store().await;
    let app = app(store.clone(), accepting_objects());
    let (status, _) = send(
        &app,
        upload_request(EVENT_CODE, &[("a.jpg", "image/jpeg", JPEG)], None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut objects = MockObjectStore::new();
    objects.expect_public_url().returning(|key| {
        Err(StorageError::Url {
            key: key.to_string(),
            message: "presign failed".to_string(),
        })
    });
    let app = self::app(store, objects);

    let (status, body) = send(&app, get(&format!("/events/{EVENT_CODE}/photos"))).await;
    assert_eq!(status, StatusCode::OK);
    let photos = body["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0]["filename"], "a.jpg");
    assert!(photos[0]["url"].is_null());
}

#[tokio::test]
async fn test_upload_then_list_photos_newest_first() {
    let store = seeded_store().await;
    let app = app(store.clone(), accepting_objects());

    for name in ["first.jpg", "second.png", "third.webp"] {
        let content_type = gallery_core::mime_for_filename(name);
        let (status, body) = send(
            &app,
            upload_request(EVENT_CODE, &[(name, content_type, JPEG)], Some("Guest")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully uploaded 1 photo(s)");
    }

    let (status, body) = send(&app, get(&format!("/events/{EVENT_CODE}/photos"))).await;
    assert_eq!(status, StatusCode::OK);

    let photos = body["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 3);
    let names: Vec<&str> = photos
        .iter()
        .map(|p| p["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["third.webp", "second.png", "first.jpg"]);
    assert_eq!(photos[0]["guestName"], "Guest");
    assert_eq!(photos[0]["mime"], "image/webp");
    assert_eq!(
        photos[0]["url"],
        format!("https://cdn.test/{}", photos[0]["storagePath"].as_str().unwrap())
    );
}

#[tokio::test]
async fn test_partial_failure_reports_successes() {
    let store = seeded_store().await;
    let mut objects = MockObjectStore::new();
    objects
        .expect_put_object()
        .withf(|key, _, _| key.ends_with("-c.jpg"))
        .returning(|key, _, _| {
            Err(StorageError::Upload {
                key: key.to_string(),
                message: "timeout".to_string(),
            })
        });
    objects
        .expect_put_object()
        .withf(|key, _, _| !key.ends_with("-c.jpg"))
        .returning(|_, _, _| Ok(()));
    objects
        .expect_public_url()
        .returning(|key| Ok(format!("https://cdn.test/{key}")));
    let app = app(store.clone(), objects);

    let files: Vec<(&str, &str, &[u8])> = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]
        .iter()
        .map(|name| (*name, "image/jpeg", JPEG))
        .collect();

    let (status, body) = send(&app, upload_request(EVENT_CODE, &files, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully uploaded 4 photo(s)");
    assert_eq!(body["photos"].as_array().unwrap().len(), 4);
    assert_eq!(
        body["failures"],
        json!([{ "filename": "c.jpg", "reason": "storage write failed" }])
    );
    assert_eq!(store.photos().len(), 4);
}

#[tokio::test]
async fn test_all_failed_is_server_error() {
    let store = seeded_store().await;
    let mut objects = MockObjectStore::new();
    objects.expect_put_object().returning(|key, _, _| {
        Err(StorageError::Upload {
            key: key.to_string(),
            message: "bucket missing".to_string(),
        })
    });
    let app = app(store.clone(), objects);

    let (status, body) = send(
        &app,
        upload_request(EVENT_CODE, &[("a.jpg", "image/jpeg", JPEG), ("b.gif", "image/gif", JPEG)], None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to upload any files");
    assert_eq!(body["failures"].as_array().unwrap().len(), 2);
    assert!(store.photos().is_empty());
}

#[tokio::test]
async fn test_disallowed_type_creates_no_photo() {
    let store = seeded_store().await;
    let app = app(store.clone(), untouched_objects());

    let (status, body) = send(
        &app,
        upload_request(EVENT_CODE, &[("notes.txt", "text/plain", &b"hello"[..])], None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["failures"][0]["filename"], "notes.txt");
    assert_eq!(body["failures"][0]["reason"], "invalid file type: text/plain");
    assert!(store.photos().is_empty());
}

#[tokio::test]
async fn test_oversized_file_creates_no_photo() {
    let store = seeded_store().await;
    let app = app(store.clone(), untouched_objects());
    let big = vec![0u8; MAX_FILE_BYTES as usize + 1];

    let (status, body) = send(
        &app,
        upload_request(EVENT_CODE, &[("big.jpg", "image/jpeg", big.as_slice())], None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["failures"][0]["reason"]
        .as_str()
        .unwrap()
        .starts_with("file too large"));
    assert!(store.photos().is_empty());
}

#[tokio::test]
async fn test_upload_to_unknown_event_writes_nothing() {
    let app = app(seeded_store().await, untouched_objects());

    let (status, body) = send(
        &app,
        upload_request("NOSUCH", &[("a.jpg", "image/jpeg", JPEG)], None),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Event not found");
}

#[tokio::test]
async fn test_upload_without_files_is_bad_request() {
    let app = app(seeded_store().await, untouched_objects());

    let (status, body) = send(&app, upload_request(EVENT_CODE, &[], Some("Guest"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No files provided");
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let app = app_with_limit(seeded_store().await, untouched_objects(), 1024);
    let data = vec![7u8; 4096];

    let (status, _) = send(
        &app,
        upload_request(EVENT_CODE, &[("a.jpg", "image/jpeg", data.as_slice())], None),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
