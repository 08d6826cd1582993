//! Integration tests for the Club Hub backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::db::Repository;
use crate::errors::AppError;
use crate::session::SessionStore;
use crate::store::{MemoryStore, RestStore, TreeStore};
use crate::{create_router, AppState};

const FAKE_TREE_TOKEN: &str = "test-token";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    async fn with_store(store: Arc<dyn TreeStore>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let sessions = SessionStore::open(&temp_dir.path().join("session.sqlite"))
            .await
            .expect("Failed to open session store");

        let state = AppState {
            repo: Arc::new(Repository::new(store)),
            sessions: Arc::new(sessions),
        };

        let base_url = spawn(create_router(state)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        into_parts(resp).await
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .request(method, self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        into_parts(resp).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, body).await
    }
}

async fn into_parts(resp: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    let body: Value = resp.json().await.unwrap();
    (status, body)
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    format!("http://{}", addr)
}

/// A port nothing listens on.
async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// ==================== FAKE REMOTE TREE ====================

/// Serves the remote tree's REST protocol on top of a `MemoryStore`.
async fn fake_tree(
    State(tree): State<Arc<MemoryStore>>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if query.get("auth").map(String::as_str) != Some(FAKE_TREE_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Permission denied" })),
        )
            .into_response();
    }
    let Some(path) = path.strip_suffix(".json") else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match method {
        Method::GET if headers.contains_key("x-firebase-etag") => {
            let versioned = tree.get_versioned(path).await.unwrap();
            ([(header::ETAG, versioned.etag)], Json(versioned.value)).into_response()
        }
        Method::GET => Json(tree.get(path).await.unwrap()).into_response(),
        Method::POST => {
            let value: Value = serde_json::from_slice(&body).unwrap();
            let key = tree.push(path, &value).await.unwrap();
            Json(json!({ "name": key })).into_response()
        }
        Method::PATCH => {
            let fields: Map<String, Value> = serde_json::from_slice(&body).unwrap();
            tree.update(path, &fields).await.unwrap();
            Json(Value::Object(fields)).into_response()
        }
        Method::PUT => {
            let value: Value = serde_json::from_slice(&body).unwrap();
            let etag = match headers.get(header::IF_MATCH) {
                Some(etag) => etag.to_str().unwrap().to_string(),
                None => tree.get_versioned(path).await.unwrap().etag,
            };
            if tree.set_if_match(path, &value, &etag).await.unwrap() {
                Json(value).into_response()
            } else {
                let current = tree.get_versioned(path).await.unwrap();
                (
                    StatusCode::PRECONDITION_FAILED,
                    [(header::ETAG, current.etag)],
                    Json(current.value),
                )
                    .into_response()
            }
        }
        Method::DELETE => {
            tree.remove(path).await.unwrap();
            Json(Value::Null).into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn spawn_fake_tree(tree: Arc<MemoryStore>) -> String {
    let app = Router::new()
        .route("/{*path}", any(fake_tree))
        .with_state(tree);
    spawn(app).await
}

fn rest_store(base_url: &str) -> RestStore {
    RestStore::new(
        base_url,
        Some(FAKE_TREE_TOKEN.to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

// ==================== HEALTH ====================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_health_check_without_server() {
    let temp_dir = TempDir::new().unwrap();
    let sessions = SessionStore::open(&temp_dir.path().join("session.sqlite"))
        .await
        .unwrap();
    let app = create_router(AppState {
        repo: Arc::new(Repository::new(Arc::new(MemoryStore::new()))),
        sessions: Arc::new(sessions),
    });

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ==================== CLUBS ====================

#[tokio::test]
async fn test_club_crud() {
    let fixture = TestFixture::new().await;

    // Create club
    let (status, body) = fixture
        .post(
            "/api/clubs",
            json!({
                "id": "robotics",
                "name": "Robotics Club",
                "clubAdmins": ["ada@example.com"],
                "description": "Build things"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], "robotics");
    assert!(body["data"]["key"].as_str().is_some());

    // Get by id
    let (status, body) = fixture.get("/api/clubs/robotics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Robotics Club");
    assert_eq!(body["data"]["description"], "Build things");

    // Update
    let (status, body) = fixture
        .send(
            reqwest::Method::PATCH,
            "/api/clubs/robotics",
            json!({ "name": "Robotics Society" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Robotics Society");
    assert_eq!(body["data"]["description"], "Build things");

    // Get by name
    let (status, body) = fixture.get("/api/clubs/by-name/Robotics%20Society").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "robotics");

    // List
    let (status, body) = fixture.get("/api/clubs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_club_is_not_found() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/clubs/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture
        .send(
            reqwest::Method::PATCH,
            "/api/clubs/ghost",
            json!({ "name": "Nope" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_club_requires_name() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.post("/api/clubs", json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_rejected_club_update_leaves_club_readable() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/clubs", json!({ "id": "chess", "name": "Chess" }))
        .await;

    let (status, body) = fixture
        .send(
            reqwest::Method::PATCH,
            "/api/clubs/chess",
            json!({ "id": { "x": 1 } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture.get("/api/clubs/chess").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Chess");

    let (_, body) = fixture.get("/api/clubs").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_join_requests_and_questions() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/clubs", json!({ "id": "music", "name": "Music" }))
        .await;

    let (status, _) = fixture
        .post(
            "/api/clubs/music/join-requests",
            json!({ "email": "first@example.com", "name": "First" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture
        .post(
            "/api/clubs/music/join-requests",
            json!({ "email": "second@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let emails: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["first@example.com", "second@example.com"]);

    let (status, body) = fixture
        .post(
            "/api/clubs/music/questions",
            json!({ "email": "curious@example.com", "question": "Do I need an instrument?" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = fixture.get("/api/clubs/music").await;
    assert_eq!(body["data"]["joinRequests"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["data"]["questions"][0]["question"],
        "Do I need an instrument?"
    );

    let (status, _) = fixture
        .post(
            "/api/clubs/ghost/questions",
            json!({ "question": "Anyone?" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ==================== USERS ====================

#[tokio::test]
async fn test_user_flow() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/users",
            json!({ "email": "sam@example.com", "name": "Sam", "department": "CSE" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "member");
    assert!(!body["data"]["createdAt"].as_str().unwrap().is_empty());

    let (status, body) = fixture.get("/api/users/sam@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["department"], "CSE");

    let (status, body) = fixture
        .send(
            reqwest::Method::PUT,
            "/api/users/sam@example.com/role",
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    let (_, body) = fixture.get("/api/users").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["role"], "admin");

    let (status, _) = fixture.get("/api/users/ghost@example.com").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = fixture
        .send(
            reqwest::Method::PUT,
            "/api/users/ghost@example.com/role",
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_views() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/clubs",
            json!({ "id": "a", "name": "Alpha", "clubAdmins": ["ada@example.com"] }),
        )
        .await;
    fixture
        .post("/api/clubs", json!({ "id": "b", "name": "Beta" }))
        .await;

    let (_, body) = fixture.get("/api/users/ada@example.com/admin-clubs").await;
    let clubs = body["data"].as_array().unwrap();
    assert_eq!(clubs.len(), 1);
    assert_eq!(clubs[0]["name"], "Alpha");

    let (_, body) = fixture.get("/api/users/ada@example.com/is-admin").await;
    assert_eq!(body["data"]["isAdmin"], true);

    let (_, body) = fixture.get("/api/users/eve@example.com/is-admin").await;
    assert_eq!(body["data"]["isAdmin"], false);
}

// ==================== NOTIFICATIONS ====================

#[tokio::test]
async fn test_notification_flow() {
    let fixture = TestFixture::new().await;

    let mut ids = Vec::new();
    for message in ["one", "two", "three"] {
        let (status, body) = fixture
            .post(
                "/api/notifications",
                json!({ "to": "sam@example.com", "message": message, "from": "Music" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["read"], false);
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = fixture
        .post(&format!("/api/notifications/{}/read", ids[0]), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read"], true);

    let (_, body) = fixture
        .get("/api/users/sam@example.com/notifications/unread-count")
        .await;
    assert_eq!(body["data"]["unread"], 2);

    let (_, body) = fixture.get("/api/users/sam@example.com/notifications").await;
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 3);
    for n in listed {
        let expected_read = n["id"] == ids[0].as_str();
        assert_eq!(n["read"], expected_read);
        assert_eq!(n["from"], "Music");
    }

    let (_, body) = fixture
        .post("/api/users/sam@example.com/notifications/read-all", json!({}))
        .await;
    assert_eq!(body["data"]["marked"], 2);

    let (_, body) = fixture
        .get("/api/users/sam@example.com/notifications/unread-count")
        .await;
    assert_eq!(body["data"]["unread"], 0);

    let (status, _) = fixture
        .send(
            reqwest::Method::DELETE,
            &format!("/api/notifications/{}", ids[1]),
            Value::Null,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture
        .send(
            reqwest::Method::DELETE,
            &format!("/api/notifications/{}", ids[1]),
            Value::Null,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_notification_requires_recipient() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/api/notifications", json!({ "to": "", "message": "hi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// ==================== SESSION ====================

#[tokio::test]
async fn test_session_current_user() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/session/current-user").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, _) = fixture
        .send(
            reqwest::Method::PUT,
            "/api/session/current-user",
            json!({ "email": "sam@example.com", "role": "superadmin" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = fixture.get("/api/session/current-user").await;
    assert_eq!(body["data"]["email"], "sam@example.com");
    assert_eq!(body["data"]["role"], "superadmin");

    let (status, _) = fixture
        .send(
            reqwest::Method::DELETE,
            "/api/session/current-user",
            Value::Null,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = fixture.get("/api/session/current-user").await;
    assert!(body["data"].is_null());
}

// ==================== REMOTE TREE ====================

#[tokio::test]
async fn test_unreachable_store_is_bad_gateway() {
    let store = RestStore::new(&closed_port_url().await, None, Duration::from_secs(2)).unwrap();
    let fixture = TestFixture::with_store(Arc::new(store)).await;

    let (status, body) = fixture.get("/api/clubs").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "STORE_ERROR");

    let (status, _) = fixture.get("/api/clubs/robotics").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_rest_store_operations() {
    let tree = Arc::new(MemoryStore::new());
    let store = rest_store(&spawn_fake_tree(tree.clone()).await);

    assert_eq!(store.get("clubs").await.unwrap(), Value::Null);

    let key = store
        .push("clubs", &json!({ "id": "chess", "name": "Chess" }))
        .await
        .unwrap();
    let path = format!("clubs/{}", key);
    assert_eq!(store.get(&path).await.unwrap()["name"], "Chess");

    let mut fields = Map::new();
    fields.insert("name".to_string(), json!("Chess Club"));
    store.update(&path, &fields).await.unwrap();
    assert_eq!(tree.get(&format!("{}/name", path)).await.unwrap(), "Chess Club");

    let list_path = format!("{}/questions", path);
    let first = store.get_versioned(&list_path).await.unwrap();
    assert!(store
        .set_if_match(&list_path, &json!(["q1"]), &first.etag)
        .await
        .unwrap());
    assert!(!store
        .set_if_match(&list_path, &json!(["q2"]), &first.etag)
        .await
        .unwrap());
    assert_eq!(store.get(&list_path).await.unwrap(), json!(["q1"]));

    store.remove(&path).await.unwrap();
    assert_eq!(store.get("clubs").await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_rest_store_rejected_request_is_store_error() {
    let tree = Arc::new(MemoryStore::new());
    let base_url = spawn_fake_tree(tree).await;
    let store = RestStore::new(&base_url, Some("wrong".to_string()), Duration::from_secs(5)).unwrap();

    let err = store.get("users").await.unwrap_err();
    match err {
        AppError::Store(message) => assert!(message.contains("401")),
        other => panic!("expected store error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_api_over_remote_tree() {
    let tree = Arc::new(MemoryStore::new());
    let store = rest_store(&spawn_fake_tree(tree.clone()).await);
    let fixture = TestFixture::with_store(Arc::new(store)).await;

    // Older records carry numeric ids
    tree.push("clubs", &json!({ "id": 7, "name": "Seven" }))
        .await
        .unwrap();

    let (status, body) = fixture.get("/api/clubs/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "7");

    let (a, b) = tokio::join!(
        fixture.post(
            "/api/clubs/7/join-requests",
            json!({ "email": "first@example.com" })
        ),
        fixture.post(
            "/api/clubs/7/join-requests",
            json!({ "email": "second@example.com" })
        )
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let (_, body) = fixture.get("/api/clubs/7").await;
    assert_eq!(body["data"]["joinRequests"].as_array().unwrap().len(), 2);

    for message in ["a", "b", "c"] {
        fixture
            .post(
                "/api/notifications",
                json!({ "to": "sam@example.com", "message": message }),
            )
            .await;
    }
    let (_, body) = fixture
        .post("/api/users/sam@example.com/notifications/read-all", json!({}))
        .await;
    assert_eq!(body["data"]["marked"], 3);

    let stored = tree.get("notifications").await.unwrap();
    assert!(stored
        .as_object()
        .unwrap()
        .values()
        .all(|n| n["read"] == true));
}
