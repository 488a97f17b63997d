//! Batching HTTP transport for telemetry payloads.
//!
//! Payloads are queued in memory and exported to the collector in OTLP-JSON
//! batches, either when the queue reaches the batch size or on a periodic
//! flush tick. Each flush posts at most one batch; a deeper queue drains
//! over subsequent triggers. A flush that fails at the network level
//! persists its batch to durable storage for replay on the next SDK start;
//! a flush the collector rejects drops the batch, since replaying it would
//! be rejected again.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::model::{Payload, TracePayload};
use crate::otlp::{encode_batch, exception_to_trace, snapshot_to_trace};
use crate::storage::StorageManager;
use crate::{SDK_NAME, SDK_VERSION};

pub(crate) const HEADER_API_KEY: &str = "X-API-Key";
pub(crate) const HEADER_SDK_NAME: &str = "X-SDK";
pub(crate) const HEADER_SDK_VERSION: &str = "X-SDK-Version";

/// Errors from the HTTP transport.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request never produced a response.
    #[error("export request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("collector rejected batch: status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the log.
        body: String,
    },
}

/// Asynchronous payload sink.
///
/// The SDK ships [`HttpTransport`] and its offline-aware wrapper; tests can
/// substitute their own implementation to observe what the client emits.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queues a payload for export. Returns false if the payload was
    /// dropped, for example after [`close`](Transport::close).
    async fn send(&self, payload: Payload) -> bool;

    /// Triggers an export of queued payloads. [`HttpTransport`] posts at
    /// most one batch per call.
    async fn flush(&self);

    /// Flushes, then drops all future payloads.
    async fn close(&self);
}

/// Batching transport that exports over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpInner>,
}

struct HttpInner {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    extra_headers: HashMap<String, String>,
    debug: bool,
    max_batch_size: usize,
    flush_interval: std::time::Duration,
    queue: Mutex<VecDeque<Payload>>,
    is_flushing: AtomicBool,
    closed: AtomicBool,
    storage: StorageManager,
    shutdown: CancellationToken,
}

impl HttpTransport {
    /// Creates a transport from SDK configuration.
    ///
    /// Failed batches are persisted through `storage` for startup replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config, storage: StorageManager) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.transport.request_timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(HttpInner {
                http,
                endpoint: format!("{}/v1/traces", config.api_url.trim_end_matches('/')),
                api_key: config.api_key.clone(),
                extra_headers: config.transport.headers.clone(),
                debug: config.debug,
                max_batch_size: config.transport.max_batch_size.max(1),
                flush_interval: config.transport.flush_interval,
                queue: Mutex::new(VecDeque::new()),
                is_flushing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                storage,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Spawns the periodic flush task.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.flush_interval);
            // the first tick completes immediately; the queue is empty then
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = inner.shutdown.cancelled() => break,
                    _ = ticker.tick() => inner.flush_once().await,
                }
            }
            tracing::debug!("Transport flush loop stopped");
        });
    }

    /// Number of payloads waiting in the in-memory queue.
    pub async fn queued_payloads(&self) -> usize {
        self.inner.queue.lock().await.len()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: Payload) -> bool {
        if self.inner.closed.load(Ordering::SeqCst) {
            tracing::warn!(kind = payload.kind_name(), "Transport closed, dropping payload");
            return false;
        }

        let should_flush = {
            let mut queue = self.inner.queue.lock().await;
            queue.push_back(payload);
            queue.len() >= self.inner.max_batch_size
        };
        if should_flush {
            self.inner.flush_once().await;
        }
        true
    }

    async fn flush(&self) {
        self.inner.flush_once().await;
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        self.inner.flush_once().await;
    }
}

impl HttpInner {
    /// Takes at most one batch off the queue and exports it. Overlapping
    /// calls collapse into the one already running; anything beyond the
    /// batch waits for the next trigger.
    async fn flush_once(&self) {
        if self.is_flushing.swap(true, Ordering::SeqCst) {
            return;
        }

        let batch: Vec<Payload> = {
            let mut queue = self.queue.lock().await;
            let take = queue.len().min(self.max_batch_size);
            queue.drain(..take).collect()
        };
        if !batch.is_empty() {
            self.export(batch).await;
        }

        self.is_flushing.store(false, Ordering::SeqCst);
    }

    /// Encodes one batch into a single OTLP document and posts it.
    async fn export(&self, batch: Vec<Payload>) {
        let traces: Vec<TracePayload> = batch
            .iter()
            .map(|payload| match payload {
                Payload::Trace(trace) => trace.clone(),
                Payload::Exception(exception) => exception_to_trace(exception),
                Payload::Snapshot(snapshot) => snapshot_to_trace(snapshot),
            })
            .collect();
        let request = encode_batch(&traces);

        if self.debug {
            if let Ok(json) = serde_json::to_string(&request) {
                tracing::debug!(payload = %json, "Exporting batch");
            }
        }

        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(HEADER_API_KEY, &self.api_key)
            .header(HEADER_SDK_NAME, SDK_NAME)
            .header(HEADER_SDK_VERSION, SDK_VERSION);
        for (name, value) in &self.extra_headers {
            builder = builder.header(name, value);
        }

        match builder.json(&request).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    tracing::debug!(count = batch.len(), "Exported batch");
                    self.storage.set_last_flush(Utc::now().timestamp_millis()).await;
                } else {
                    let body = response.text().await.unwrap_or_default();
                    let error = TransportError::Status {
                        status: status.as_u16(),
                        body,
                    };
                    tracing::warn!(error = %error, count = batch.len(), "Collector rejected batch, dropping");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, count = batch.len(), "Export failed, persisting batch");
                self.persist(batch).await;
            }
        }
    }

    /// Stashes an unexported batch in durable storage for startup replay.
    async fn persist(&self, batch: Vec<Payload>) {
        for payload in &batch {
            match payload {
                Payload::Trace(trace) => self.storage.add_pending_trace(trace).await,
                Payload::Exception(exception) => {
                    self.storage.add_pending_exception(exception).await;
                }
                Payload::Snapshot(snapshot) => {
                    self.storage.add_pending_snapshot(snapshot).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.inner.endpoint)
            .field("max_batch_size", &self.inner.max_batch_size)
            .finish_non_exhaustive()
    }
}
