use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use hotlink_cache::{CacheLayer, MokaCacheBackend};
use hotlink_core::{AccessEvent, AccessLog, AccessNotifier, ShortCode};
use hotlink_gateway::{App, AppState};
use hotlink_resolver::ResolutionService;
use hotlink_shortener::{RandomGenerator, ShortenerService};
use hotlink_storage::InMemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

#[derive(Default)]
struct CollectingNotifier {
    events: Mutex<Vec<AccessEvent>>,
}

impl AccessNotifier for CollectingNotifier {
    fn notify(&self, event: AccessEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    notifier: Arc<CollectingNotifier>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(CollectingNotifier::default());
        let cache = CacheLayer::with_default_policy(Arc::new(MokaCacheBackend::new()));

        let resolver = ResolutionService::new(Arc::clone(&store), cache.clone(), notifier.clone());
        let shortener = ShortenerService::new(Arc::clone(&store), RandomGenerator::new(), cache);
        let state = AppState::new(
            Arc::new(resolver),
            Arc::new(shortener),
            "https://hot.link",
        );

        Self {
            router: App::router(state),
            store,
            notifier,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn shorten(&self, body: Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/shorten")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn delete(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_shorten_returns_created_mapping() {
    let app = TestApp::new();

    let response = app
        .shorten(json!({ "originalUrl": "https://example.com/long/path" }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    let code = body["shortCode"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert_eq!(body["shortUrl"], format!("https://hot.link/{code}"));
    assert_eq!(body["originalUrl"], "https://example.com/long/path");
    assert!(body["createdAt"].is_string());
    assert!(body.get("expiresAt").is_none());
}

#[tokio::test]
async fn test_shorten_requires_original_url() {
    let app = TestApp::new();

    let response = app.shorten(json!({ "alias": "promo" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "originalUrl is required" })
    );
}

#[tokio::test]
async fn test_shorten_rejects_malformed_json() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/shorten")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_shorten_validation_errors() {
    let app = TestApp::new();

    let cases = [
        json!({ "originalUrl": "not-a-url" }),
        json!({ "originalUrl": "https://example.com", "alias": "info" }),
        json!({ "originalUrl": "https://example.com", "alias": "bad alias!" }),
        json!({ "originalUrl": "https://example.com", "expiresAt": "2001-01-01T00:00:00Z" }),
    ];
    for body in cases {
        let response = app.shorten(body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn test_duplicate_alias_conflicts() {
    let app = TestApp::new();
    let body = json!({ "originalUrl": "https://example.com", "alias": "promo" });

    assert_eq!(app.shorten(body.clone()).await.status(), StatusCode::CREATED);

    let response = app.shorten(body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("promo"));
}

#[tokio::test]
async fn test_redirect_uses_forwarded_client_address() {
    let app = TestApp::new();
    app.shorten(json!({ "originalUrl": "https://x.com", "alias": "abc" }))
        .await;

    let request = Request::builder()
        .uri("/abc")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "https://x.com");

    let events = app.notifier.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "203.0.113.9");
}

#[tokio::test]
async fn test_redirect_without_peer_info_is_unknown_source() {
    let app = TestApp::new();
    app.shorten(json!({ "originalUrl": "https://x.com", "alias": "abc" }))
        .await;

    assert_eq!(app.get("/abc").await.status(), StatusCode::FOUND);
    assert_eq!(app.notifier.events.lock().unwrap()[0].source, "unknown");
}

#[tokio::test]
async fn test_unknown_and_malformed_codes_are_not_found() {
    let app = TestApp::new();

    for uri in ["/missing", "/ab", "/info/missing", "/analytics/missing"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json_body(response).await["error"], "short URL not found");
    }
}

#[tokio::test]
async fn test_info_and_analytics() {
    let app = TestApp::new();
    app.shorten(json!({
        "originalUrl": "https://x.com",
        "alias": "abc",
        "expiresAt": "2099-01-01T00:00:00Z"
    }))
    .await;

    let code = ShortCode::new_unchecked("abc");
    for i in 0..7 {
        app.store
            .append_access(&AccessEvent::now(code.clone(), format!("10.0.0.{i}")))
            .await
            .unwrap();
    }

    let info = json_body(app.get("/info/abc").await).await;
    assert_eq!(info["originalUrl"], "https://x.com");
    assert_eq!(info["shortUrl"], "https://hot.link/abc");
    assert_eq!(info["clickCount"], 7);
    assert_eq!(info["expiresAt"], "2099-01-01T00:00:00Z");

    let analytics = json_body(app.get("/analytics/abc").await).await;
    assert_eq!(analytics["clickCount"], 7);
    let recent = analytics["recentClicks"].as_array().unwrap();
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0]["ipAddress"], "10.0.0.6");
}

#[tokio::test]
async fn test_delete_removes_mapping() {
    let app = TestApp::new();
    app.shorten(json!({ "originalUrl": "https://x.com", "alias": "abc" }))
        .await;

    let response = app.delete("/delete/abc").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["message"],
        "Short URL deleted successfully"
    );

    assert_eq!(app.get("/abc").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.delete("/delete/abc").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shorten_with_relative_lifetime() {
    let app = TestApp::new();

    let before = jiff::Timestamp::now();
    let response = app
        .shorten(json!({ "originalUrl": "https://x.com", "expiresIn": 120 }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    let expires_at: jiff::Timestamp = body["expiresAt"].as_str().unwrap().parse().unwrap();
    let lifetime = expires_at.duration_since(before);
    assert!(lifetime >= jiff::SignedDuration::from_secs(120));
    assert!(lifetime < jiff::SignedDuration::from_secs(130));

    let code = body["shortCode"].as_str().unwrap();
    assert_eq!(app.get(&format!("/{code}")).await.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_shorten_rejects_bad_relative_lifetimes() {
    let app = TestApp::new();

    let cases = [
        json!({ "originalUrl": "https://x.com", "expiresIn": 0 }),
        json!({ "originalUrl": "https://x.com", "expiresIn": u64::MAX }),
        json!({
            "originalUrl": "https://x.com",
            "expiresIn": 60,
            "expiresAt": "2099-01-01T00:00:00Z"
        }),
    ];
    for body in cases {
        let response = app.shorten(body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
    assert!(app.store.is_empty());
}
