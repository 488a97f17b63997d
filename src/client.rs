//! The SDK client: span lifecycle, exception capture, scope state and
//! tracking helpers.
//!
//! A [`TracekitClient`] is an explicit handle the application creates,
//! clones freely and eventually closes; there is no global instance. Span
//! and scope operations are synchronous so host callbacks can call them
//! from any thread; everything that touches the network or storage runs on
//! the tokio runtime the client was built in.
//!
//! Scope changes are persisted through a single ordered write queue, so a
//! `set_user` followed by `set_tag` can never land in storage in the
//! opposite order.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::context::{ContextProvider, HostContextProvider};
use crate::error::Result;
use crate::ids::{EventId, SpanId, duration_ms, generate_session_id};
use crate::model::{
    AttributeValue, Attributes, Breadcrumb, BreadcrumbLevel, BreadcrumbType, ExceptionPayload,
    ExceptionReport, Mechanism, NetworkRequest, Payload, PerformanceMetrics, SnapshotPayload, Span,
    SpanEvent, SpanKind, SpanStatus, TracePayload, User,
};
use crate::offline::{ConnectivityMonitor, OfflineTransport};
use crate::otlp::build_resource;
use crate::sanitize::{UrlFilter, host_of};
use crate::snapshot::{SnapshotClient, SnapshotSite};
use crate::stacktrace::current_frames;
use crate::storage::{FileStore, MemoryStore, StorageAdapter, StorageManager};
use crate::transport::{HttpTransport, Transport};

/// Payload interceptor run before export; returning `None` drops the
/// payload.
pub type BeforeSendCallback = dyn Fn(Payload) -> Option<Payload> + Send + Sync;

/// Observer invoked synchronously for every captured exception report.
pub type ErrorObserver = dyn Fn(&ExceptionReport) + Send + Sync;

const SCOPE_WRITE_QUEUE_CAPACITY: usize = 256;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sample_decision(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    rand::random::<f64>() < rate
}

#[derive(Default)]
struct Scope {
    user: Option<User>,
    tags: HashMap<String, String>,
    contexts: HashMap<String, serde_json::Value>,
    extras: HashMap<String, serde_json::Value>,
    breadcrumbs: VecDeque<Breadcrumb>,
    current_screen: Option<String>,
    screen_entered_at: Option<DateTime<Utc>>,
}

/// Scope state frozen at capture time, so a concurrently mutating scope
/// cannot tear the payload.
struct ScopeSnapshot {
    breadcrumbs: Vec<Breadcrumb>,
    user: Option<User>,
    tags: HashMap<String, String>,
    contexts: HashMap<String, serde_json::Value>,
}

enum ScopeWrite {
    User(Option<User>),
    Tags(HashMap<String, String>),
    Contexts(HashMap<String, serde_json::Value>),
    Extras(HashMap<String, serde_json::Value>),
    Breadcrumbs(Vec<Breadcrumb>),
    Shutdown(oneshot::Sender<()>),
}

fn spawn_scope_writer(storage: StorageManager, mut writes: mpsc::Receiver<ScopeWrite>) {
    tokio::spawn(async move {
        while let Some(write) = writes.recv().await {
            match write {
                ScopeWrite::User(user) => storage.save_user(user.as_ref()).await,
                ScopeWrite::Tags(tags) => storage.save_tags(&tags).await,
                ScopeWrite::Contexts(contexts) => storage.save_contexts(&contexts).await,
                ScopeWrite::Extras(extras) => storage.save_extras(&extras).await,
                ScopeWrite::Breadcrumbs(trail) => storage.save_breadcrumbs(&trail).await,
                ScopeWrite::Shutdown(ack) => {
                    let _ = ack.send(());
                    break;
                }
            }
        }
        tracing::debug!("Scope writer stopped");
    });
}

struct ClientInner {
    config: Config,
    enabled: bool,
    initialized: AtomicBool,
    service_name: String,
    session_id: String,
    device_id: String,
    resource: Attributes,
    url_filter: UrlFilter,
    scope: Mutex<Scope>,
    active: Mutex<HashMap<SpanId, Span>>,
    current_span: Mutex<Option<SpanId>>,
    transport: Arc<dyn Transport>,
    storage: StorageManager,
    context_provider: Arc<dyn ContextProvider>,
    snapshot: Option<SnapshotClient>,
    before_send: Vec<Box<BeforeSendCallback>>,
    error_observers: Vec<Box<ErrorObserver>>,
    scope_writes: mpsc::Sender<ScopeWrite>,
    runtime: tokio::runtime::Handle,
}

/// Handle to an initialized SDK instance.
///
/// Cheap to clone; all clones share one pipeline. Create one with
/// [`TracekitClient::init`] or [`TracekitClient::builder`], and call
/// [`close`](TracekitClient::close) before the application exits so queued
/// payloads are flushed or persisted.
#[derive(Clone)]
pub struct TracekitClient {
    inner: Arc<ClientInner>,
}

impl TracekitClient {
    /// Initializes a client with default capability providers.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be constructed.
    pub async fn init(config: Config) -> Result<Self> {
        Self::builder(config).build().await
    }

    /// Starts building a client, for hosts that plug in their own storage,
    /// connectivity or context capabilities.
    pub fn builder(config: Config) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Starts a new root span and returns its id.
    ///
    /// The span stays active until [`end_span`](Self::end_span); nothing is
    /// exported before then.
    pub fn start_span(&self, name: impl Into<String>) -> SpanId {
        self.start_span_inner(name.into(), None)
    }

    /// Starts a span as a child of `parent`, inheriting its trace.
    ///
    /// If the parent already finished, the span starts a trace of its own.
    pub fn start_child_span(&self, parent: SpanId, name: impl Into<String>) -> SpanId {
        self.start_span_inner(name.into(), Some(parent))
    }

    fn start_span_inner(&self, name: String, parent: Option<SpanId>) -> SpanId {
        let mut span = Span::new(name);
        let mut active = lock(&self.inner.active);
        if let Some(parent_id) = parent {
            match active.get(&parent_id) {
                Some(parent_span) => {
                    span.trace_id = parent_span.trace_id;
                    span.parent_span_id = Some(parent_id);
                }
                None => {
                    tracing::debug!(parent = %parent_id, "Parent span not active, starting a new trace");
                }
            }
        }
        let span_id = span.span_id;
        active.insert(span_id, span);
        drop(active);
        *lock(&self.inner.current_span) = Some(span_id);
        span_id
    }

    /// Sets an attribute on an active span. No-op once the span finished.
    pub fn set_span_attribute(
        &self,
        span_id: SpanId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) {
        if let Some(span) = lock(&self.inner.active).get_mut(&span_id) {
            span.set_attribute(key, value);
        }
    }

    /// Appends a timestamped event to an active span.
    pub fn add_span_event(&self, span_id: SpanId, event: SpanEvent) {
        if let Some(span) = lock(&self.inner.active).get_mut(&span_id) {
            span.add_event(event);
        }
    }

    /// Finishes a span with status OK and queues it for export.
    ///
    /// Ending an unknown or already finished span is a no-op, so a span is
    /// exported at most once no matter how racy the callers are. The
    /// sampling decision is made here.
    pub fn end_span(&self, span_id: SpanId) {
        self.finish_span(span_id, None);
    }

    /// Finishes a span with an explicit status.
    pub fn end_span_with_status(&self, span_id: SpanId, status: SpanStatus) {
        self.finish_span(span_id, Some(status));
    }

    fn finish_span(&self, span_id: SpanId, status: Option<SpanStatus>) {
        let Some(mut span) = lock(&self.inner.active).remove(&span_id) else {
            tracing::debug!(span = %span_id, "end_span on unknown or already finished span");
            return;
        };
        {
            let mut current = lock(&self.inner.current_span);
            if *current == Some(span_id) {
                *current = None;
            }
        }

        let end = Utc::now();
        span.end_time = Some(end);
        span.duration = Some(duration_ms(span.start_time, end));
        // a finished span without an explicit status reports OK, not UNSET
        span.status = status.unwrap_or_else(SpanStatus::ok);

        if !self.inner.should_sample() {
            tracing::debug!(span = %span_id, "Span dropped by sampling");
            return;
        }
        self.dispatch_trace(vec![span], end);
    }

    /// Captures an assembled exception report.
    ///
    /// Returns immediately with the event id; scope is snapshotted
    /// synchronously and the payload is assembled and exported in the
    /// background.
    pub fn capture_exception(&self, report: ExceptionReport) -> EventId {
        let crumb = Breadcrumb::new(BreadcrumbType::Error, report.message.clone())
            .with_category(report.exception_type.clone())
            .with_level(BreadcrumbLevel::Error);
        self.capture_report(report, crumb)
    }

    /// Captures any [`std::error::Error`], walking its source chain.
    pub fn capture_error<E>(&self, error: &E) -> EventId
    where
        E: std::error::Error + ?Sized,
    {
        let mut context = serde_json::Map::new();
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(serde_json::Value::String(cause.to_string()));
            source = cause.source();
        }
        if !causes.is_empty() {
            context.insert("causes".to_string(), serde_json::Value::Array(causes));
        }

        let report = ExceptionReport {
            exception_type: short_type_name::<E>().to_string(),
            message: error.to_string(),
            stack_trace: current_frames(),
            component_stack: None,
            handled: true,
            mechanism: Some(Mechanism {
                kind: "error".to_string(),
                handled: true,
                data: None,
            }),
            context,
        };
        self.capture_exception(report)
    }

    /// Captures a plain message at the given severity.
    pub fn capture_message(&self, message: impl Into<String>, level: BreadcrumbLevel) -> EventId {
        let message = message.into();
        let report = ExceptionReport {
            exception_type: "Message".to_string(),
            message: message.clone(),
            stack_trace: Vec::new(),
            component_stack: None,
            handled: true,
            mechanism: Some(Mechanism {
                kind: "message".to_string(),
                handled: true,
                data: Some(serde_json::json!({ "level": level })),
            }),
            context: serde_json::Map::new(),
        };
        let crumb = Breadcrumb::new(BreadcrumbType::Info, message).with_level(level);
        self.capture_report(report, crumb)
    }

    fn capture_report(&self, report: ExceptionReport, crumb: Breadcrumb) -> EventId {
        let event_id = EventId::generate();

        // the capture's own breadcrumb is part of the frozen trail
        self.add_breadcrumb(crumb);
        let scope = self.inner.snapshot_scope();

        for observer in &self.inner.error_observers {
            if catch_unwind(AssertUnwindSafe(|| observer(&report))).is_err() {
                tracing::warn!("Error observer panicked");
            }
        }

        if !self.inner.enabled {
            return event_id;
        }

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let payload = inner.assemble_exception(event_id, report, scope).await;
            inner.send_payload(Payload::Exception(payload)).await;
        });
        event_id
    }

    /// Sets or clears the current user. Persisted across restarts.
    ///
    /// Setting a user also leaves a `User identified` breadcrumb on the
    /// trail; clearing does not.
    pub fn set_user(&self, user: Option<User>) {
        lock(&self.inner.scope).user.clone_from(&user);
        if let Some(user) = &user {
            let id = user.id.as_deref().unwrap_or("anonymous");
            self.add_breadcrumb(
                Breadcrumb::new(BreadcrumbType::User, format!("User identified: {id}"))
                    .with_category("auth")
                    .with_data(serde_json::json!({ "userId": id })),
            );
        }
        self.inner.queue_write(ScopeWrite::User(user));
    }

    /// Sets a tag attached to future exception payloads.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        let tags = {
            let mut scope = lock(&self.inner.scope);
            scope.tags.insert(key.into(), value.into());
            scope.tags.clone()
        };
        self.inner.queue_write(ScopeWrite::Tags(tags));
    }

    /// Merges several tags into the scope with a single storage write.
    pub fn set_tags(&self, new_tags: HashMap<String, String>) {
        let tags = {
            let mut scope = lock(&self.inner.scope);
            scope.tags.extend(new_tags);
            scope.tags.clone()
        };
        self.inner.queue_write(ScopeWrite::Tags(tags));
    }

    /// Removes a tag.
    pub fn remove_tag(&self, key: &str) {
        let tags = {
            let mut scope = lock(&self.inner.scope);
            scope.tags.remove(key);
            scope.tags.clone()
        };
        self.inner.queue_write(ScopeWrite::Tags(tags));
    }

    /// Sets a named structured context attached to future exception
    /// payloads.
    pub fn set_context(&self, key: impl Into<String>, value: serde_json::Value) {
        let contexts = {
            let mut scope = lock(&self.inner.scope);
            scope.contexts.insert(key.into(), value);
            scope.contexts.clone()
        };
        self.inner.queue_write(ScopeWrite::Contexts(contexts));
    }

    /// Removes a named context.
    pub fn remove_context(&self, key: &str) {
        let contexts = {
            let mut scope = lock(&self.inner.scope);
            scope.contexts.remove(key);
            scope.contexts.clone()
        };
        self.inner.queue_write(ScopeWrite::Contexts(contexts));
    }

    /// Sets a free-form extra value, reported under the `extra` context.
    pub fn set_extra(&self, key: impl Into<String>, value: serde_json::Value) {
        let extras = {
            let mut scope = lock(&self.inner.scope);
            scope.extras.insert(key.into(), value);
            scope.extras.clone()
        };
        self.inner.queue_write(ScopeWrite::Extras(extras));
    }

    /// Merges several extra values with a single storage write.
    pub fn set_extras(&self, new_extras: HashMap<String, serde_json::Value>) {
        let extras = {
            let mut scope = lock(&self.inner.scope);
            scope.extras.extend(new_extras);
            scope.extras.clone()
        };
        self.inner.queue_write(ScopeWrite::Extras(extras));
    }

    /// Removes an extra value.
    pub fn remove_extra(&self, key: &str) {
        let extras = {
            let mut scope = lock(&self.inner.scope);
            scope.extras.remove(key);
            scope.extras.clone()
        };
        self.inner.queue_write(ScopeWrite::Extras(extras));
    }

    /// Appends a breadcrumb, evicting the oldest past the configured cap.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        let max = self.inner.config.max_breadcrumbs;
        if max == 0 {
            return;
        }
        let trail: Vec<Breadcrumb> = {
            let mut scope = lock(&self.inner.scope);
            while scope.breadcrumbs.len() >= max {
                scope.breadcrumbs.pop_front();
            }
            scope.breadcrumbs.push_back(breadcrumb);
            scope.breadcrumbs.iter().cloned().collect()
        };
        self.inner.queue_write(ScopeWrite::Breadcrumbs(trail));
    }

    /// Resets user, tags, contexts, extras and breadcrumbs, in memory and
    /// in storage.
    pub fn clear_scope(&self) {
        *lock(&self.inner.scope) = Scope::default();
        self.inner.queue_write(ScopeWrite::User(None));
        self.inner.queue_write(ScopeWrite::Tags(HashMap::new()));
        self.inner.queue_write(ScopeWrite::Contexts(HashMap::new()));
        self.inner.queue_write(ScopeWrite::Extras(HashMap::new()));
        self.inner.queue_write(ScopeWrite::Breadcrumbs(Vec::new()));
    }

    /// Records a screen change.
    ///
    /// Always leaves a navigation breadcrumb; when navigation tracing is
    /// enabled it also emits an immediately-ended `screen.<name>` span.
    /// `params` are the navigation parameters of the new screen and ride
    /// along on both.
    pub fn track_screen(&self, name: impl Into<String>, params: Option<serde_json::Value>) {
        let name = name.into();
        let now = Utc::now();
        let (previous, entered_at) = {
            let mut scope = lock(&self.inner.scope);
            (
                scope.current_screen.replace(name.clone()),
                scope.screen_entered_at.replace(now),
            )
        };

        let mut data = serde_json::json!({ "to": name });
        if let Some(previous) = &previous {
            data["from"] = serde_json::Value::String(previous.clone());
        }
        if let Some(entered_at) = entered_at {
            data["timeOnPreviousScreen"] = serde_json::Value::from(duration_ms(entered_at, now));
        }
        if let Some(params) = &params {
            data["params"] = params.clone();
        }
        self.add_breadcrumb(
            Breadcrumb::new(BreadcrumbType::Navigation, format!("Navigated to {name}"))
                .with_category("navigation")
                .with_data(data),
        );

        if !self.inner.config.instrumentation.navigation {
            return;
        }
        let mut span = Span::new(format!("screen.{name}"));
        span.start_time = now;
        span.end_time = Some(now);
        span.duration = Some(0);
        span.set_attribute("screen.name", name.as_str());
        if let Some(previous) = previous {
            span.set_attribute("screen.previous", previous);
        }
        if let Some(params) = params {
            span.set_attribute("screen.params", params.to_string());
        }

        if !self.inner.should_sample() {
            return;
        }
        self.dispatch_trace(vec![span], now);
    }

    /// Records a completed outbound HTTP request as an http breadcrumb and,
    /// when network tracing is enabled, a CLIENT span.
    ///
    /// Requests matching the configured URL exclusions are ignored; that is
    /// also how the SDK's own export traffic stays out of the data.
    pub fn track_network_request(&self, request: NetworkRequest) {
        if self.inner.url_filter.matches(&request.url) {
            tracing::debug!(url = %request.url, "Network request excluded by filter");
            return;
        }

        let method = request.method.to_uppercase();
        let duration = duration_ms(request.start_time, request.end_time);
        let failed =
            request.error.is_some() || request.status_code.is_some_and(|status| status >= 400);

        let mut data =
            serde_json::json!({ "url": request.url, "method": method, "duration": duration });
        if let Some(status) = request.status_code {
            data["statusCode"] = serde_json::Value::from(status);
        }
        if let Some(error) = &request.error {
            data["error"] = serde_json::Value::String(error.clone());
        }
        let level = if failed {
            BreadcrumbLevel::Error
        } else {
            BreadcrumbLevel::Info
        };
        self.add_breadcrumb(
            Breadcrumb::new(BreadcrumbType::Http, format!("{method} {}", request.url))
                .with_level(level)
                .with_data(data),
        );

        if !self.inner.config.instrumentation.network {
            return;
        }
        let mut span = Span::new(format!("HTTP {method}"));
        span.kind = SpanKind::Client;
        span.start_time = request.start_time;
        span.end_time = Some(request.end_time);
        span.duration = Some(duration);
        span.set_attribute("http.method", method);
        if let Some(host) = host_of(&request.url) {
            span.set_attribute("net.peer.name", host);
        }
        span.set_attribute("http.url", request.url);
        if let Some(status) = request.status_code {
            span.set_attribute("http.status_code", i64::from(status));
        }
        if let Some(size) = request.request_size {
            span.set_attribute("http.request_body_size", size as i64);
        }
        if let Some(size) = request.response_size {
            span.set_attribute("http.response_body_size", size as i64);
        }
        span.set_attribute("http.duration", duration);
        if let Some(error) = request.error {
            span.set_attribute("error.message", error.as_str());
            span.status = SpanStatus::error(error);
        } else if let Some(status) = request.status_code {
            if status >= 400 {
                span.status = SpanStatus::error(format!("HTTP {status}"));
            }
        }

        if !self.inner.should_sample() {
            return;
        }
        self.dispatch_trace(vec![span], request.end_time);
    }

    /// Records host-reported performance measurements as an
    /// immediately-ended `app.performance` span, one `perf.*` attribute per
    /// supplied field.
    pub fn record_performance_metrics(&self, metrics: PerformanceMetrics) {
        let now = Utc::now();
        let mut span = Span::new("app.performance");
        span.start_time = now;
        span.end_time = Some(now);
        span.duration = Some(0);
        if let Some(value) = metrics.app_start_time {
            span.set_attribute("perf.app_start_time", value);
        }
        if let Some(value) = metrics.bundle_load_time {
            span.set_attribute("perf.bundle_load_time", value);
        }
        if let Some(value) = metrics.first_render_time {
            span.set_attribute("perf.first_render_time", value);
        }
        if let Some(value) = metrics.memory_usage {
            span.set_attribute("perf.memory_usage", value);
        }
        if let Some(value) = metrics.cpu_usage {
            span.set_attribute("perf.cpu_usage", value);
        }
        if let Some(value) = metrics.fps {
            span.set_attribute("perf.fps", value);
        }

        if !self.inner.should_sample() {
            return;
        }
        self.dispatch_trace(vec![span], now);
    }

    /// Runs a snapshot site against the armed breakpoints.
    ///
    /// Returns true when a breakpoint matched and a capture was taken. The
    /// capture joins the currently active span's trace, when there is one.
    /// Requires code monitoring to be enabled in the configuration.
    pub async fn snapshot(
        &self,
        site: SnapshotSite,
        label: &str,
        variables: serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let Some(snapshot_client) = &self.inner.snapshot else {
            return false;
        };

        let current_id = *lock(&self.inner.current_span);
        let trace_context = current_id.and_then(|id| {
            lock(&self.inner.active)
                .get(&id)
                .map(|span| (span.trace_id, span.span_id))
        });

        match snapshot_client
            .capture(site, label, variables, trace_context, None)
            .await
        {
            Some(data) => {
                let payload = SnapshotPayload {
                    snapshot: data,
                    service_name: self.inner.service_name.clone(),
                    timestamp: Utc::now(),
                };
                self.inner.send_payload(Payload::Snapshot(payload)).await;
                true
            }
            None => false,
        }
    }

    /// Triggers an export of queued payloads, at most one batch.
    pub async fn flush(&self) {
        self.inner.transport.flush().await;
    }

    /// Flushes and shuts the pipeline down.
    ///
    /// Pending scope writes complete first, then the transport makes its
    /// final export attempt; anything unexportable lands in durable
    /// storage for the next start.
    pub async fn close(&self) {
        if let Some(snapshot) = &self.inner.snapshot {
            snapshot.close();
        }

        let (ack, done) = oneshot::channel();
        if self
            .inner
            .scope_writes
            .send(ScopeWrite::Shutdown(ack))
            .await
            .is_ok()
        {
            let _ = done.await;
        }

        self.inner.transport.close().await;
        self.inner.initialized.store(false, Ordering::SeqCst);
        tracing::debug!("Tracekit client closed");
    }

    /// Session id generated for this client instance.
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Stable device id, persisted across restarts.
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    /// Resolved service name payloads are reported under.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Whether the client exports anything at all.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Whether the client is live. False once [`close`](Self::close) has
    /// run.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Number of spans started but not yet ended.
    pub fn active_span_count(&self) -> usize {
        lock(&self.inner.active).len()
    }

    /// Current breadcrumb trail, oldest first.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        lock(&self.inner.scope).breadcrumbs.iter().cloned().collect()
    }

    /// Epoch millis of the last successful export, if any.
    pub async fn last_flush(&self) -> Option<i64> {
        self.inner.storage.last_flush().await
    }

    fn dispatch_trace(&self, spans: Vec<Span>, timestamp: DateTime<Utc>) {
        let payload = TracePayload {
            spans,
            service_name: self.inner.service_name.clone(),
            resource: self.inner.resource.clone(),
            timestamp,
        };
        self.dispatch(Payload::Trace(payload));
    }

    fn dispatch(&self, payload: Payload) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            inner.send_payload(payload).await;
        });
    }
}

impl ClientInner {
    fn should_sample(&self) -> bool {
        sample_decision(self.config.sample_rate)
    }

    fn snapshot_scope(&self) -> ScopeSnapshot {
        let scope = lock(&self.scope);
        let mut contexts = scope.contexts.clone();
        if let Some(screen) = &scope.current_screen {
            contexts.insert(
                "screen".to_string(),
                serde_json::json!({ "name": screen }),
            );
        }
        if !scope.extras.is_empty() {
            contexts.insert(
                "extra".to_string(),
                serde_json::Value::Object(scope.extras.clone().into_iter().collect()),
            );
        }
        ScopeSnapshot {
            breadcrumbs: scope.breadcrumbs.iter().cloned().collect(),
            user: scope.user.clone(),
            tags: scope.tags.clone(),
            contexts,
        }
    }

    async fn assemble_exception(
        &self,
        event_id: EventId,
        report: ExceptionReport,
        scope: ScopeSnapshot,
    ) -> ExceptionPayload {
        let device = self.context_provider.device_context().await;
        let app = self.context_provider.app_context().await;
        ExceptionPayload {
            event_id,
            exception: report,
            breadcrumbs: scope.breadcrumbs,
            user: scope.user,
            device: Some(device),
            app: Some(app),
            tags: scope.tags,
            contexts: scope.contexts,
            service_name: self.service_name.clone(),
            timestamp: Utc::now(),
        }
    }

    async fn send_payload(&self, mut payload: Payload) {
        if !self.enabled {
            return;
        }
        for callback in &self.before_send {
            let backup = payload.clone();
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(Some(next)) => payload = next,
                Ok(None) => {
                    tracing::debug!("Payload dropped by before_send");
                    return;
                }
                Err(_) => {
                    tracing::warn!("before_send callback panicked, keeping payload unmodified");
                    payload = backup;
                }
            }
        }
        self.transport.send(payload).await;
    }

    fn queue_write(&self, write: ScopeWrite) {
        if !self.enabled {
            return;
        }
        match self.scope_writes.try_send(write) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Scope write queue full, dropping persistence update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Scope write queue closed");
            }
        }
    }

    async fn replay_pending(&self) {
        let traces = self.storage.pending_traces().await;
        if !traces.is_empty() {
            tracing::debug!(count = traces.len(), "Replaying pending trace payloads");
            self.storage.clear_pending_traces().await;
            for payload in traces {
                self.transport.send(Payload::Trace(payload)).await;
            }
        }

        let exceptions = self.storage.pending_exceptions().await;
        if !exceptions.is_empty() {
            tracing::debug!(count = exceptions.len(), "Replaying pending exception payloads");
            self.storage.clear_pending_exceptions().await;
            for payload in exceptions {
                self.transport.send(Payload::Exception(payload)).await;
            }
        }

        let snapshots = self.storage.pending_snapshots().await;
        if !snapshots.is_empty() {
            tracing::debug!(count = snapshots.len(), "Replaying pending snapshot payloads");
            self.storage.clear_pending_snapshots().await;
            for payload in snapshots {
                self.transport.send(Payload::Snapshot(payload)).await;
            }
        }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl std::fmt::Debug for TracekitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracekitClient")
            .field("service_name", &self.inner.service_name)
            .field("session_id", &self.inner.session_id)
            .field("enabled", &self.inner.enabled)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TracekitClient`].
#[must_use = "builders do nothing unless .build() is called"]
pub struct ClientBuilder {
    config: Config,
    storage: Option<Arc<dyn StorageAdapter>>,
    context_provider: Option<Arc<dyn ContextProvider>>,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    transport: Option<Arc<dyn Transport>>,
    before_send: Vec<Box<BeforeSendCallback>>,
    error_observers: Vec<Box<ErrorObserver>>,
}

impl ClientBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            storage: None,
            context_provider: None,
            connectivity: None,
            transport: None,
            before_send: Vec::new(),
            error_observers: Vec::new(),
        }
    }

    /// Uses a host-provided storage backend instead of the configured
    /// default.
    pub fn storage_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(adapter);
        self
    }

    /// Uses a host-provided device/app context source.
    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    /// Follows a host-provided reachability signal; without one the client
    /// assumes the network is always reachable.
    pub fn connectivity_monitor(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Replaces the whole transport. The configured HTTP transport is not
    /// constructed at all.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registers a payload interceptor. Interceptors run in registration
    /// order; the first to return `None` drops the payload.
    pub fn before_send<F>(mut self, callback: F) -> Self
    where
        F: Fn(Payload) -> Option<Payload> + Send + Sync + 'static,
    {
        self.before_send.push(Box::new(callback));
        self
    }

    /// Registers an exception observer, called for every capture.
    pub fn on_error<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ExceptionReport) + Send + Sync + 'static,
    {
        self.error_observers.push(Box::new(observer));
        self
    }

    /// Builds and starts the client.
    ///
    /// Without an API key the client still builds but stays inert: every
    /// operation is accepted and dropped. Pending payloads from earlier
    /// runs replay in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be constructed.
    pub async fn build(self) -> Result<TracekitClient> {
        let config = self.config;
        let enabled = config.enabled && config.has_api_key();
        if config.enabled && !config.has_api_key() {
            tracing::warn!("No API key configured, telemetry disabled");
        } else if !config.enabled {
            tracing::debug!("Telemetry disabled by configuration");
        }

        let adapter: Arc<dyn StorageAdapter> = match self.storage {
            Some(adapter) => adapter,
            None => match &config.storage.directory {
                Some(directory) => match FileStore::open(directory).await {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to open storage directory, using in-memory storage");
                        Arc::new(MemoryStore::new())
                    }
                },
                None => Arc::new(MemoryStore::new()),
            },
        };
        let storage = StorageManager::new(adapter, config.storage.max_pending_items);

        let context_provider = self
            .context_provider
            .unwrap_or_else(|| Arc::new(HostContextProvider::new()));
        let device = context_provider.device_context().await;
        let app = context_provider.app_context().await;

        let service_name = config.resolved_service_name(app.bundle_id.as_deref());
        let device_id = storage.get_or_create_device_id(device.platform).await;
        let session_id = generate_session_id();
        storage.save_session_id(&session_id).await;
        let app_start = app.app_start_time.unwrap_or_else(Utc::now);
        storage.set_app_start_time(app_start.timestamp_millis()).await;
        let resource = build_resource(
            &service_name,
            Some(&config.environment),
            config.release.as_deref(),
            Some(&session_id),
            Some(&device_id),
            Some(&device),
        );

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let http = HttpTransport::new(&config, storage.clone())?;
                if enabled {
                    http.start();
                }
                match &self.connectivity {
                    Some(monitor) => Arc::new(OfflineTransport::new(http, &config, monitor.as_ref())),
                    None => Arc::new(http),
                }
            }
        };

        let snapshot = if enabled && config.monitoring.enabled {
            let client = SnapshotClient::new(&config, service_name.clone())?;
            client.start();
            Some(client)
        } else {
            None
        };

        // the persisted trail can exceed a cap that was lowered between runs
        let mut breadcrumbs: VecDeque<Breadcrumb> = storage.load_breadcrumbs().await.into();
        while breadcrumbs.len() > config.max_breadcrumbs {
            breadcrumbs.pop_front();
        }

        let scope = Scope {
            user: storage.load_user().await,
            tags: storage.load_tags().await,
            contexts: storage.load_contexts().await,
            extras: storage.load_extras().await,
            breadcrumbs,
            current_screen: None,
            screen_entered_at: None,
        };

        let (scope_writes, write_queue) = mpsc::channel(SCOPE_WRITE_QUEUE_CAPACITY);
        spawn_scope_writer(storage.clone(), write_queue);

        let inner = Arc::new(ClientInner {
            url_filter: config.url_filter(),
            enabled,
            initialized: AtomicBool::new(true),
            config,
            service_name,
            session_id,
            device_id,
            resource,
            scope: Mutex::new(scope),
            active: Mutex::new(HashMap::new()),
            current_span: Mutex::new(None),
            transport,
            storage,
            context_provider,
            snapshot,
            before_send: self.before_send,
            error_observers: self.error_observers,
            scope_writes,
            runtime: tokio::runtime::Handle::current(),
        });

        if inner.enabled {
            let replay = Arc::clone(&inner);
            inner.runtime.spawn(async move {
                replay.replay_pending().await;
            });
        }

        tracing::debug!(
            session_id = %inner.session_id,
            device_id = %inner.device_id,
            service = %inner.service_name,
            "Tracekit client initialized"
        );
        Ok(TracekitClient { inner })
    }
}
