//! Core data model: spans, scope state, exception reports and payloads.
//!
//! These types serialize with the same field names the backend stores, so
//! payloads persisted by one SDK version replay cleanly under another.

use crate::ids::{EventId, SpanId, TraceId};
use crate::snapshot::SnapshotData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// String-keyed attribute map attached to spans, events and resources.
pub type Attributes = HashMap<String, AttributeValue>;

/// A telemetry attribute value.
///
/// Mirrors what the OTLP attribute model can carry: scalars and (possibly
/// nested) arrays. Serialized untagged, so JSON numbers round-trip as `Int`
/// when integral and `Double` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Double(f64),
    /// String value.
    String(String),
    /// Array of values.
    Array(Vec<AttributeValue>),
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(v: Vec<T>) -> Self {
        AttributeValue::Array(v.into_iter().map(Into::into).collect())
    }
}

/// The role a span plays in a trace.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    /// Internal operation within the application.
    #[default]
    Internal,
    /// Handling of a synchronous request.
    Server,
    /// Outbound synchronous request.
    Client,
    /// Message produced for asynchronous processing.
    Producer,
    /// Message consumed from asynchronous processing.
    Consumer,
}

/// Span outcome code.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    /// Outcome not set; treated as success downstream.
    #[default]
    Unset,
    /// Completed successfully.
    Ok,
    /// Completed with an error.
    Error,
}

/// Span status: outcome code plus an optional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpanStatus {
    /// Outcome code.
    pub code: StatusCode,
    /// Human-readable detail, usually only present for errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SpanStatus {
    /// Status with code `OK` and no message.
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    /// Status with code `ERROR` and the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Error,
            message: Some(message.into()),
        }
    }
}

/// A timestamped event attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEvent {
    /// Event name.
    pub name: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Event attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

impl SpanEvent {
    /// Creates an event stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            attributes: Attributes::new(),
        }
    }
}

/// A link from one span to another trace/span pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanLink {
    /// Linked trace identifier.
    pub trace_id: TraceId,
    /// Linked span identifier.
    pub span_id: SpanId,
    /// Link attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

/// A single unit of traced work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Span identifier (8 bytes).
    pub span_id: SpanId,
    /// Trace this span belongs to (16 bytes).
    pub trace_id: TraceId,
    /// Parent span, if this span was started under one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    /// Operation name.
    pub name: String,
    /// Span kind.
    #[serde(default)]
    pub kind: SpanKind,
    /// Wall-clock start time.
    pub start_time: DateTime<Utc>,
    /// Wall-clock end time; `None` while the span is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole-millisecond duration, stamped at end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Span status.
    #[serde(default)]
    pub status: SpanStatus,
    /// Span attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Timestamped span events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,
    /// Links to related spans.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SpanLink>,
}

impl Span {
    /// Creates a root span starting now, with fresh trace and span ids.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            span_id: SpanId::generate(),
            trace_id: TraceId::generate(),
            parent_span_id: None,
            name: name.into(),
            kind: SpanKind::default(),
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            status: SpanStatus::default(),
            attributes: Attributes::new(),
            events: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Appends an event to the span.
    pub fn add_event(&mut self, event: SpanEvent) {
        self.events.push(event);
    }

    /// Sets a single attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }
}

/// Classification of a breadcrumb.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbType {
    /// Screen or route change.
    Navigation,
    /// Outbound HTTP request.
    Http,
    /// Interface interaction, like a press or scroll.
    Ui,
    /// User action recorded by the application.
    User,
    /// Captured log output.
    Console,
    /// Captured error.
    Error,
    /// Informational note.
    Info,
    /// Debug-level note.
    Debug,
    /// Data-layer query.
    Query,
    /// Business transaction marker.
    Transaction,
}

/// Severity of a breadcrumb.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine event.
    #[default]
    Info,
    /// Something unexpected but recoverable.
    Warning,
    /// An error occurred.
    Error,
    /// Unrecoverable failure.
    Fatal,
}

/// A trail entry recorded ahead of an error, sent with exception payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
    /// Breadcrumb classification.
    #[serde(rename = "type")]
    pub kind: BreadcrumbType,
    /// Optional grouping category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Short description of what happened.
    pub message: String,
    /// Severity.
    #[serde(default)]
    pub level: BreadcrumbLevel,
    /// When the breadcrumb was recorded.
    pub timestamp: DateTime<Utc>,
    /// Free-form structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Breadcrumb {
    /// Creates a breadcrumb stamped with the current time at `info` level.
    pub fn new(kind: BreadcrumbType, message: impl Into<String>) -> Self {
        Self {
            kind,
            category: None,
            message: message.into(),
            level: BreadcrumbLevel::Info,
            timestamp: Utc::now(),
            data: None,
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the severity.
    pub fn with_level(mut self, level: BreadcrumbLevel) -> Self {
        self.level = level;
        self
    }

    /// Attaches structured detail.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// One parsed stack trace frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// Function or symbol name; `<anonymous>` when unknown.
    pub function: String,
    /// Source file path.
    pub filename: String,
    /// Line number, when the trace text carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// Column number, when the trace text carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    /// Whether the frame belongs to application code rather than a library.
    pub in_app: bool,
}

/// How an exception reached the SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mechanism {
    /// Mechanism name, e.g. `generic`, `panic`, `onError`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether application code handled the exception.
    pub handled: bool,
    /// Mechanism-specific detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A captured exception or message, ready for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionReport {
    /// Exception type name; `Message` for plain message captures.
    #[serde(rename = "type")]
    pub exception_type: String,
    /// Exception message.
    pub message: String,
    /// Parsed stack frames, innermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<StackFrame>,
    /// UI component stack, when the host framework supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_stack: Option<String>,
    /// Whether application code handled the exception.
    pub handled: bool,
    /// How the exception reached the SDK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
    /// Free-form capture context.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// The user on whose behalf the application is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Login name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Additional user attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Platform the application runs on.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple iOS.
    Ios,
    /// Android.
    Android,
    /// Web / embedded webview.
    Web,
    /// Apple macOS.
    Macos,
    /// Microsoft Windows.
    Windows,
    /// Linux.
    Linux,
    /// Could not be determined.
    Unknown,
}

impl Platform {
    /// Platform of the current build target.
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }

    /// Lowercase name as used in device tokens and resource attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Unknown => "unknown",
        }
    }
}

/// Screen geometry of the host device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Width in points.
    pub width: u32,
    /// Height in points.
    pub height: u32,
    /// Pixel density scale factor.
    pub scale: f64,
}

/// Battery state of the host device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BatteryInfo {
    /// Charge level in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    /// Whether the device is charging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charging: Option<bool>,
}

/// Hardware and OS facts about the host device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    /// Host platform.
    pub platform: Platform,
    /// Device model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Operating system name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    /// Operating system version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// Screen geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenInfo>,
    /// Total memory in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Battery state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryInfo>,
    /// Network interface type, e.g. `wifi` or `cellular`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            model: None,
            os_name: None,
            os_version: None,
            screen: None,
            memory: None,
            battery: None,
            network_type: None,
        }
    }
}

/// Facts about the application build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppContext {
    /// Application bundle or package identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// Marketing version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Build number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_build: Option<String>,
    /// When the application process started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_start_time: Option<DateTime<Utc>>,
}

/// An outbound HTTP request observed by application instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    /// Request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Response status code, when a response arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// When the request started.
    pub start_time: DateTime<Utc>,
    /// When the request completed or failed.
    pub end_time: DateTime<Utc>,
    /// Request body size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_size: Option<u64>,
    /// Response body size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
    /// Transport-level error message, when the request failed outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Application performance measurements reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Time from process start to interactive, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_start_time: Option<f64>,
    /// Main bundle load time, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_load_time: Option<f64>,
    /// First screen render time, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_render_time: Option<f64>,
    /// Resident memory usage, in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    /// CPU usage percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    /// Frames per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

/// A batch-ready collection of finished spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracePayload {
    /// Finished spans.
    pub spans: Vec<Span>,
    /// Logical service the spans belong to.
    pub service_name: String,
    /// Resource attributes describing the emitting process.
    #[serde(default)]
    pub resource: Attributes,
    /// When the payload was assembled.
    pub timestamp: DateTime<Utc>,
}

/// A captured exception with its surrounding scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionPayload {
    /// Identifier handed back to the capturing caller.
    pub event_id: EventId,
    /// The exception report.
    pub exception: ExceptionReport,
    /// Breadcrumb trail at capture time, oldest first.
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Current user, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Device context, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceContext>,
    /// Application context, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppContext>,
    /// Current tags.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    /// Current named contexts.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub contexts: HashMap<String, serde_json::Value>,
    /// Logical service name.
    pub service_name: String,
    /// When the payload was assembled.
    pub timestamp: DateTime<Utc>,
}

/// A debugger snapshot wrapped for transport replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    /// The captured snapshot.
    pub snapshot: SnapshotData,
    /// Logical service name.
    pub service_name: String,
    /// When the payload was assembled.
    pub timestamp: DateTime<Utc>,
}

/// Any payload the transport can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Finished spans.
    Trace(TracePayload),
    /// Captured exception.
    Exception(ExceptionPayload),
    /// Debugger snapshot.
    Snapshot(SnapshotPayload),
}

impl Payload {
    /// Short payload kind for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Trace(_) => "trace",
            Payload::Exception(_) => "exception",
            Payload::Snapshot(_) => "snapshot",
        }
    }

    /// Service name the payload belongs to.
    pub fn service_name(&self) -> &str {
        match self {
            Payload::Trace(p) => &p.service_name,
            Payload::Exception(p) => &p.service_name,
            Payload::Snapshot(p) => &p.service_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{SpanId, TraceId};

    fn make_span(name: &str) -> Span {
        Span {
            span_id: SpanId::generate(),
            trace_id: TraceId::generate(),
            parent_span_id: None,
            name: name.to_string(),
            kind: SpanKind::Internal,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            status: SpanStatus::default(),
            attributes: Attributes::new(),
            events: Vec::new(),
            links: Vec::new(),
        }
    }

    #[test]
    fn test_attribute_value_untagged_serde() {
        let v = serde_json::to_value(AttributeValue::Int(42)).unwrap();
        assert_eq!(v, serde_json::json!(42));

        let back: AttributeValue = serde_json::from_value(serde_json::json!(3.5)).unwrap();
        assert_eq!(back, AttributeValue::Double(3.5));

        let back: AttributeValue = serde_json::from_value(serde_json::json!(7)).unwrap();
        assert_eq!(back, AttributeValue::Int(7));
    }

    #[test]
    fn test_attribute_value_from_impls() {
        assert_eq!(AttributeValue::from("x"), AttributeValue::String("x".into()));
        assert_eq!(AttributeValue::from(true), AttributeValue::Bool(true));
        assert_eq!(
            AttributeValue::from(vec![1i64, 2]),
            AttributeValue::Array(vec![AttributeValue::Int(1), AttributeValue::Int(2)])
        );
    }

    #[test]
    fn test_span_serializes_with_wire_field_names() {
        let mut span = make_span("checkout");
        span.set_attribute("http.method", "GET");

        let json = serde_json::to_value(&span).unwrap();
        assert!(json.get("spanId").is_some());
        assert!(json.get("traceId").is_some());
        assert!(json.get("startTime").is_some());
        assert_eq!(json["kind"], "INTERNAL");
        assert_eq!(json["status"]["code"], "UNSET");
        // unset optionals stay off the wire
        assert!(json.get("parentSpanId").is_none());
        assert!(json.get("endTime").is_none());
    }

    #[test]
    fn test_span_roundtrip() {
        let mut span = make_span("load");
        span.end_time = Some(span.start_time + chrono::Duration::milliseconds(12));
        span.duration = Some(12);
        span.status = SpanStatus::error("boom");

        let json = serde_json::to_string(&span).unwrap();
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(back, span);
    }

    #[test]
    fn test_breadcrumb_type_field_name() {
        let crumb = Breadcrumb::new(BreadcrumbType::Http, "GET /users")
            .with_category("network".to_string())
            .with_level(BreadcrumbLevel::Warning);

        let json = serde_json::to_value(&crumb).unwrap();
        assert_eq!(json["type"], "http");
        assert_eq!(json["level"], "warning");
        assert_eq!(json["category"], "network");
    }

    #[test]
    fn test_exception_report_field_names() {
        let report = ExceptionReport {
            exception_type: "TypeError".to_string(),
            message: "x is not a function".to_string(),
            stack_trace: vec![StackFrame {
                function: "main".to_string(),
                filename: "/src/App.tsx".to_string(),
                lineno: Some(10),
                colno: Some(4),
                in_app: true,
            }],
            component_stack: None,
            handled: true,
            mechanism: Some(Mechanism {
                kind: "generic".to_string(),
                handled: true,
                data: None,
            }),
            context: serde_json::Map::new(),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["type"], "TypeError");
        assert_eq!(json["stackTrace"][0]["inApp"], true);
        assert_eq!(json["mechanism"]["type"], "generic");
    }

    #[test]
    fn test_payload_kind_name() {
        let payload = Payload::Trace(TracePayload {
            spans: vec![make_span("x")],
            service_name: "svc".to_string(),
            resource: Attributes::new(),
            timestamp: Utc::now(),
        });
        assert_eq!(payload.kind_name(), "trace");
        assert_eq!(payload.service_name(), "svc");
    }
}
