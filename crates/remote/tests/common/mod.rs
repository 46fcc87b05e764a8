// Shared by several test binaries; not every helper is used by each.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pipeline::{EndpointAddress, NegotiationObserver};
use remote::HttpTransportConfig;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Behaviour of a stub component backend.
#[derive(Clone)]
pub struct StubConfig {
    pub format: &'static str,
    pub version: Option<&'static str>,
    /// Probes answered with 503 before the backend reports ready.
    pub unready_probes: u32,
    pub typesystem_delay: Duration,
    pub process_delay: Duration,
    pub fail_process: bool,
    pub garbage_response: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            format: "json",
            version: Some("1.0"),
            unready_probes: 0,
            typesystem_delay: Duration::from_millis(0),
            process_delay: Duration::from_millis(0),
            fail_process: false,
            garbage_response: false,
        }
    }
}

#[derive(Default)]
pub struct StubStats {
    pub probes: AtomicU32,
    pub processed: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

struct AppState {
    config: StubConfig,
    stats: Arc<StubStats>,
}

/// An echoing component backend bound to `127.0.0.1:0`.
pub struct StubBackend {
    pub address: String,
    pub stats: Arc<StubStats>,
    server: JoinHandle<()>,
}

impl StubBackend {
    pub async fn start(config: StubConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub backend");
        let port = listener.local_addr().expect("stub address").port();
        let stats = Arc::new(StubStats::default());
        let state = Arc::new(AppState {
            config,
            stats: stats.clone(),
        });

        let app = Router::new()
            .route("/v1/communication_layer", get(communication_layer))
            .route("/v1/typesystem", get(typesystem))
            .route("/v1/documentation", get(documentation))
            .route("/v1/process", post(process))
            .with_state(state);
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub backend crashed");
        });

        Self {
            address: format!("http://127.0.0.1:{port}"),
            stats,
            server,
        }
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn communication_layer(State(state): State<Arc<AppState>>) -> Response {
    let probe = state.stats.probes.fetch_add(1, Ordering::SeqCst) + 1;
    if probe <= state.config.unready_probes {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let mut declaration = json!({ "format": state.config.format });
    if let Some(version) = state.config.version {
        declaration["version"] = json!(version);
    }
    Json(declaration).into_response()
}

async fn typesystem(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tokio::time::sleep(state.config.typesystem_delay).await;
    (
        [(header::CONTENT_TYPE, "application/xml")],
        "<typeSystemDescription/>",
    )
}

async fn documentation() -> &'static str {
    "Echoes its input as one annotation."
}

async fn process(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let stats = &state.stats;
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(state.config.process_delay).await;
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    stats.processed.fetch_add(1, Ordering::SeqCst);

    if state.config.fail_process {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }
    if state.config.garbage_response {
        return "<xmi:XMI/>".into_response();
    }

    let (text, parameters) = match serde_json::from_slice::<Value>(&body) {
        Ok(request) if request.get("document").is_some() => (
            request["document"]["text"].as_str().unwrap_or_default().to_string(),
            request["parameters"].clone(),
        ),
        _ => (String::from_utf8_lossy(&body).into_owned(), json!({})),
    };
    Json(json!({
        "annotations": [{
            "layer": "echo",
            "begin": 0,
            "end": text.len(),
            "features": { "text": text, "parameters": parameters }
        }]
    }))
    .into_response()
}

/// Transport settings short enough for tests.
pub fn fast_config() -> HttpTransportConfig {
    HttpTransportConfig {
        connect_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(5),
        negotiation_timeout: Duration::from_secs(3),
        probe_interval: Duration::from_millis(20),
        max_probe_interval: Duration::from_millis(50),
    }
}

/// An address nothing listens on.
pub fn unreachable_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("address").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Counts negotiation events.
#[derive(Default)]
pub struct RecordingObserver {
    pub failed_probes: AtomicU32,
    pub ready: AtomicU32,
    pub skipped: AtomicU32,
    pub reasons: Mutex<Vec<String>>,
}

impl NegotiationObserver for RecordingObserver {
    fn on_probe_failed(&self, _address: &EndpointAddress, _attempt: u32, _elapsed: Duration, reason: &str) {
        self.failed_probes.fetch_add(1, Ordering::SeqCst);
        self.reasons.lock().unwrap().push(reason.to_string());
    }

    fn on_ready(&self, _address: &EndpointAddress, _attempts: u32, _elapsed: Duration) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    fn on_skipped(&self, _address: &EndpointAddress) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}
