//! Shared test harness: an in-process collector that records everything the
//! SDK exports.

#![allow(dead_code)]

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Routes SDK logs through the test harness. `RUST_LOG` overrides the
/// default filter.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tracekit=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// One request recorded by the collector.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Parsed JSON body.
    pub body: serde_json::Value,
    /// Request headers, names lowercased.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    /// Returns a header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

struct CollectorState {
    trace_requests: Mutex<Vec<RecordedRequest>>,
    register_requests: Mutex<Vec<serde_json::Value>>,
    capture_requests: Mutex<Vec<serde_json::Value>>,
    breakpoints: Mutex<serde_json::Value>,
    trace_status: AtomicU16,
}

/// In-process collector the SDK exports to during tests.
///
/// Serves the trace ingest endpoint plus the snapshot endpoints, recording
/// every request for later inspection.
pub struct Collector {
    state: Arc<CollectorState>,
    addr: SocketAddr,
}

impl Collector {
    /// Starts the collector on an ephemeral port.
    pub async fn start() -> Self {
        init_tracing();

        let state = Arc::new(CollectorState {
            trace_requests: Mutex::new(Vec::new()),
            register_requests: Mutex::new(Vec::new()),
            capture_requests: Mutex::new(Vec::new()),
            breakpoints: Mutex::new(serde_json::json!([])),
            trace_status: AtomicU16::new(200),
        });

        let router = Router::new()
            .route("/v1/traces", post(record_traces))
            .route("/sdk/snapshots/active/:service", get(list_breakpoints))
            .route("/sdk/snapshots/auto-register", post(record_register))
            .route("/sdk/snapshots/capture", post(record_capture))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind collector");
        let addr = listener.local_addr().expect("Failed to read collector address");

        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Collector server failed");
        });

        Self { state, addr }
    }

    /// Base URL to configure the SDK with.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Everything received on `/v1/traces`, in arrival order.
    pub fn trace_requests(&self) -> Vec<RecordedRequest> {
        self.state.trace_requests.lock().unwrap().clone()
    }

    /// Every span name across all recorded trace requests, in arrival order.
    pub fn span_names(&self) -> Vec<String> {
        self.trace_requests()
            .iter()
            .flat_map(|request| spans_in(&request.body))
            .filter_map(|span| span["name"].as_str().map(str::to_string))
            .collect()
    }

    /// Makes `/v1/traces` answer with `status` from now on.
    pub fn set_trace_status(&self, status: u16) {
        self.state.trace_status.store(status, Ordering::SeqCst);
    }

    /// Sets the breakpoint list served to the snapshot poller.
    pub fn set_breakpoints(&self, breakpoints: serde_json::Value) {
        *self.state.breakpoints.lock().unwrap() = breakpoints;
    }

    /// Everything received on the snapshot register endpoint.
    pub fn register_requests(&self) -> Vec<serde_json::Value> {
        self.state.register_requests.lock().unwrap().clone()
    }

    /// Everything received on the snapshot capture endpoint.
    pub fn capture_requests(&self) -> Vec<serde_json::Value> {
        self.state.capture_requests.lock().unwrap().clone()
    }
}

async fn record_traces(
    State(state): State<Arc<CollectorState>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> StatusCode {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();
    state
        .trace_requests
        .lock()
        .unwrap()
        .push(RecordedRequest { body, headers });
    StatusCode::from_u16(state.trace_status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

async fn list_breakpoints(
    State(state): State<Arc<CollectorState>>,
    Path(_service): Path<String>,
) -> axum::Json<serde_json::Value> {
    let breakpoints = state.breakpoints.lock().unwrap().clone();
    axum::Json(serde_json::json!({ "breakpoints": breakpoints }))
}

async fn record_register(
    State(state): State<Arc<CollectorState>>,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> axum::Json<serde_json::Value> {
    let count = {
        let mut requests = state.register_requests.lock().unwrap();
        requests.push(body.clone());
        requests.len()
    };
    // echo the breakpoint record a real backend would create: registered,
    // awaiting arming in the dashboard
    axum::Json(serde_json::json!({
        "id": format!("auto-{count}"),
        "service_name": body["service_name"],
        "file_path": body["file_path"],
        "function_name": body["function_name"],
        "label": body["label"],
        "line_number": body["line_number"],
        "enabled": false,
        "max_captures": 0,
        "capture_count": 0,
    }))
}

async fn record_capture(
    State(state): State<Arc<CollectorState>>,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> StatusCode {
    state.capture_requests.lock().unwrap().push(body);
    StatusCode::OK
}

/// Flattens every span object out of one export document.
pub fn spans_in(body: &serde_json::Value) -> Vec<serde_json::Value> {
    let mut spans = Vec::new();
    if let Some(resource_spans) = body["resourceSpans"].as_array() {
        for resource_span in resource_spans {
            if let Some(scope_spans) = resource_span["scopeSpans"].as_array() {
                for scope_span in scope_spans {
                    if let Some(list) = scope_span["spans"].as_array() {
                        spans.extend(list.iter().cloned());
                    }
                }
            }
        }
    }
    spans
}

/// Looks up an attribute value object by key on a wire-form span.
pub fn find_attr<'a>(span: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    span["attributes"]
        .as_array()?
        .iter()
        .find(|kv| kv["key"] == key)
        .map(|kv| &kv["value"])
}

/// Polls `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
