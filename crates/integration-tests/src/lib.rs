//! Integration tests for the nutrition kiosk.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nutrition-kiosk-integration-tests
//! ```
//!
//! No external services are needed. Each test starts a [`FakeApi`] on an
//! ephemeral port, points a kiosk [`AppState`] at it and drives the kiosk
//! router in-process through [`TestContext`].
//!
//! # Test Categories
//!
//! - `catalog` - Catalog client and listing pages
//! - `capture` - AI selector capture workflow over HTTP
//! - `cart` - Cart mutations and checkout
//! - `health` - Liveness and readiness

#![allow(clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Query, State},
    http::{HeaderMap, Request, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http_body_util::BodyExt;
use nutrition_kiosk::config::{ApiConfig, KioskConfig, SentryConfig};
use nutrition_kiosk::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Boundary used for hand-built multipart bodies.
pub const BOUNDARY: &str = "kiosk-test-boundary";

// =============================================================================
// Fake upstream API
// =============================================================================

/// A canned upstream response.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(StatusCode, Value),
    Raw {
        status: StatusCode,
        content_type: &'static str,
        body: String,
    },
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Json(status, value) => (status, Json(value)).into_response(),
            Self::Raw {
                status,
                content_type,
                body,
            } => (status, [(CONTENT_TYPE, content_type)], body).into_response(),
        }
    }
}

/// An upload received by the fake analysis endpoints.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub endpoint: &'static str,
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Default)]
struct FakeApiInner {
    products: Mutex<Vec<Value>>,
    products_override: Mutex<Option<Reply>>,
    analysis: Mutex<Option<Reply>>,
    analysis_delay: Mutex<Option<Duration>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    tunnel_headers: AtomicUsize,
}

/// In-process stand-in for the remote snack API.
#[derive(Clone)]
pub struct FakeApi {
    inner: Arc<FakeApiInner>,
    addr: SocketAddr,
}

impl FakeApi {
    /// Start the fake API on an ephemeral port.
    pub async fn start() -> Self {
        let inner = Arc::new(FakeApiInner::default());
        let router = Router::new()
            .route("/products", get(products))
            .route("/product", get(lookup))
            .route("/analyze-image", post(analyze_image))
            .route("/analyze-audio", post(analyze_audio))
            .with_state(Arc::clone(&inner));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API");
        let addr = listener.local_addr().expect("Fake API has no address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self { inner, addr }
    }

    /// Base URL of the fake API.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Replace the catalog.
    pub fn set_products(&self, products: Vec<Value>) {
        *lock(&self.inner.products) = products;
    }

    /// Answer `GET /products` with `reply` instead of the catalog.
    pub fn set_products_reply(&self, reply: Reply) {
        *lock(&self.inner.products_override) = Some(reply);
    }

    /// Answer both analysis endpoints with `reply`.
    pub fn set_analysis_reply(&self, reply: Reply) {
        *lock(&self.inner.analysis) = Some(reply);
    }

    /// Delay analysis responses.
    pub fn set_analysis_delay(&self, delay: Duration) {
        *lock(&self.inner.analysis_delay) = Some(delay);
    }

    /// Uploads received so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        lock(&self.inner.uploads).clone()
    }

    /// Requests that carried the tunnel warning header.
    #[must_use]
    pub fn tunnel_header_count(&self) -> usize {
        self.inner.tunnel_headers.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn note_headers(inner: &FakeApiInner, headers: &HeaderMap) {
    if headers.contains_key(nutrition_kiosk::api::TUNNEL_WARNING_HEADER) {
        inner.tunnel_headers.fetch_add(1, Ordering::SeqCst);
    }
}

async fn products(State(inner): State<Arc<FakeApiInner>>, headers: HeaderMap) -> Response {
    note_headers(&inner, &headers);
    if let Some(reply) = lock(&inner.products_override).clone() {
        return reply.into_response();
    }
    Json(Value::Array(lock(&inner.products).clone())).into_response()
}

async fn lookup(
    State(inner): State<Arc<FakeApiInner>>,
    headers: HeaderMap,
    Query(query): Query<std::collections::HashMap<String, String>>,
) -> Response {
    note_headers(&inner, &headers);
    let id = query.get("id").and_then(|id| id.parse::<i64>().ok());
    let found = lock(&inner.products)
        .iter()
        .find(|p| p["id"].as_i64() == id)
        .cloned();

    match found {
        Some(p) => Json(json!({
            "success": true,
            "product": {
                "id": p["id"],
                "name": p["name"],
                "price": p["price"],
                "category": p["category"],
                "description": p["description"],
            }
        }))
        .into_response(),
        None => Json(json!({"success": false, "message": "Product not found"})).into_response(),
    }
}

async fn analyze_image(State(inner): State<Arc<FakeApiInner>>, multipart: Multipart) -> Response {
    analyze(&inner, "analyze-image", multipart).await
}

async fn analyze_audio(State(inner): State<Arc<FakeApiInner>>, multipart: Multipart) -> Response {
    analyze(&inner, "analyze-audio", multipart).await
}

async fn analyze(inner: &FakeApiInner, endpoint: &'static str, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
        lock(&inner.uploads).push(RecordedUpload {
            endpoint,
            field: name,
            filename,
            content_type,
            size,
        });
    }

    let delay = *lock(&inner.analysis_delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let reply = lock(&inner.analysis).clone();
    reply
        .unwrap_or_else(|| Reply::Json(StatusCode::OK, analysis_success("Energy Fuel")))
        .into_response()
}

// =============================================================================
// Fixtures
// =============================================================================

/// A catalog entry as the remote API serves it.
#[must_use]
pub fn product_json(id: i64, name: &str, price: f64, category: &str, stock: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "images": [format!("https://cdn.example.net/{id}.png")],
        "rating": 4,
        "description": format!("{name} description"),
        "flavor": [{"color": "#f5a623", "label": "Sweet"}],
        "stock": stock,
        "ingredients": ["Oats", "Honey"],
        "category": category,
    })
}

/// A successful analysis body recommending `category`.
#[must_use]
pub fn analysis_success(category: &str) -> Value {
    json!({
        "success": true,
        "filename": "capture.jpg",
        "file_size_bytes": 4,
        "analysis": {
            "description": "Looks like you need a boost",
            "recommended_category": category,
            "products": [{"name": "Trail Mix", "price": 2.99}],
            "total_products": 1
        },
        "message": "Analysis complete"
    })
}

// =============================================================================
// Kiosk under test
// =============================================================================

/// A kiosk router wired to a [`FakeApi`].
pub struct TestContext {
    pub api: FakeApi,
    pub state: AppState,
    pub app: Router,
}

impl TestContext {
    /// Start a fake API and a kiosk pointing at it.
    pub async fn new() -> Self {
        let api = FakeApi::start().await;
        Self::with_api(api, |_| {})
    }

    /// Build a kiosk for `api`, letting the caller adjust the API config.
    pub fn with_api(api: FakeApi, configure: impl FnOnce(&mut ApiConfig)) -> Self {
        let mut api_config = ApiConfig::new(&api.url()).expect("Invalid fake API URL");
        configure(&mut api_config);
        let state = AppState::new(test_config(api_config)).expect("Failed to build state");
        let app = nutrition_kiosk::app(state.clone());
        Self { api, state, app }
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> Response {
        self.send(
            Request::get(path)
                .body(Body::empty())
                .expect("Invalid request"),
        )
        .await
    }

    /// `POST path` with an urlencoded form body.
    pub async fn post_form(&self, path: &str, form: &str) -> Response {
        self.send(
            Request::post(path)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .expect("Invalid request"),
        )
        .await
    }

    /// `POST path` with an empty body.
    pub async fn post_empty(&self, path: &str) -> Response {
        self.send(
            Request::post(path)
                .body(Body::empty())
                .expect("Invalid request"),
        )
        .await
    }

    /// `POST /ai-selector/capture` with `kind` and one file part.
    pub async fn post_capture(
        &self,
        kind: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Response {
        self.send(capture_request(kind, filename, content_type, bytes))
            .await
    }
}

/// Build a multipart capture request.
#[must_use]
pub fn capture_request(kind: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"kind\"\r\n\r\n{kind}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/ai-selector/capture")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("Invalid request")
}

/// Kiosk configuration for tests.
#[must_use]
pub fn test_config(api: ApiConfig) -> KioskConfig {
    KioskConfig {
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 0,
        api,
        max_upload_bytes: 1024 * 1024,
        sentry: SentryConfig::default(),
    }
}

/// Read a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("Body is not JSON")
}
