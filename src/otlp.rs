//! OTLP-JSON encoding: the wire document tree and model conversion.
//!
//! The backend speaks the JSON mapping of OTLP traces: hex-string ids,
//! camelCase field names, integer `kind`/`status.code`, and 64-bit values
//! (nano timestamps, intValue) carried as decimal strings. The document is
//! modeled directly with serde rather than going through protobuf types, so
//! the exact wire shape is visible in one place.

use crate::ids::{SpanId, TraceId};
use crate::model::{
    AttributeValue, Attributes, ExceptionPayload, SnapshotPayload, Span, SpanEvent, SpanKind,
    SpanStatus, StatusCode, TracePayload,
};
use crate::stacktrace::render_frames;
use crate::{SDK_LANGUAGE, SDK_NAME, SDK_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level OTLP-JSON trace export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// One entry per payload; payloads are never merged.
    pub resource_spans: Vec<ResourceSpans>,
}

/// Spans grouped under one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    /// The emitting resource.
    pub resource: Resource,
    /// Scoped span groups; this SDK always emits exactly one.
    pub scope_spans: Vec<ScopeSpans>,
}

/// Resource attributes in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Resource {
    /// Resource attributes.
    pub attributes: Vec<KeyValue>,
}

/// A group of spans from one instrumentation scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSpans {
    /// The spans.
    pub spans: Vec<OtlpSpan>,
}

/// A single attribute on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: AnyValue,
}

/// OTLP-JSON attribute value. 64-bit integers travel as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnyValue {
    /// String value.
    StringValue(String),
    /// Integer value, as a decimal string.
    IntValue(String),
    /// Floating-point value.
    DoubleValue(f64),
    /// Boolean value.
    BoolValue(bool),
    /// Array of values.
    ArrayValue(ArrayValue),
}

/// Wrapper for array-valued attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    /// Array elements.
    pub values: Vec<AnyValue>,
}

/// A span in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpSpan {
    /// Trace id as 32 hex characters.
    pub trace_id: String,
    /// Span id as 16 hex characters.
    pub span_id: String,
    /// Parent span id, omitted for root spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    /// Operation name.
    pub name: String,
    /// Span kind as the OTLP integer code.
    pub kind: i32,
    /// Start time in nanoseconds since the epoch, as a decimal string.
    pub start_time_unix_nano: String,
    /// End time in nanoseconds since the epoch, omitted while active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_unix_nano: Option<String>,
    /// Span attributes.
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
    /// Span status.
    pub status: OtlpStatus,
    /// Span events.
    #[serde(default)]
    pub events: Vec<OtlpEvent>,
    /// Span links.
    #[serde(default)]
    pub links: Vec<OtlpLink>,
}

/// Span status in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OtlpStatus {
    /// 0 = unset, 1 = ok, 2 = error.
    pub code: i32,
    /// Status detail, usually only present for errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A span event in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpEvent {
    /// Event name.
    pub name: String,
    /// Event time in nanoseconds since the epoch, as a decimal string.
    pub time_unix_nano: String,
    /// Event attributes.
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

/// A span link in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpLink {
    /// Linked trace id.
    pub trace_id: String,
    /// Linked span id.
    pub span_id: String,
    /// Link attributes.
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

/// Converts an internal attribute value to its wire form.
///
/// Integer-valued doubles collapse to `intValue`, matching what a JS number
/// would have produced for the same payload.
pub fn convert_attribute_value(value: &AttributeValue) -> AnyValue {
    match value {
        AttributeValue::String(s) => AnyValue::StringValue(s.clone()),
        AttributeValue::Bool(b) => AnyValue::BoolValue(*b),
        AttributeValue::Int(i) => AnyValue::IntValue(i.to_string()),
        AttributeValue::Double(d) => {
            if d.is_finite() && d.fract() == 0.0 && d.abs() < 9_007_199_254_740_992.0 {
                AnyValue::IntValue(format!("{}", *d as i64))
            } else {
                AnyValue::DoubleValue(*d)
            }
        }
        AttributeValue::Array(items) => AnyValue::ArrayValue(ArrayValue {
            values: items.iter().map(convert_attribute_value).collect(),
        }),
    }
}

/// Converts an attribute map to wire form, sorted by key for stable output.
pub fn convert_attributes(attrs: &Attributes) -> Vec<KeyValue> {
    let mut entries: Vec<(&String, &AttributeValue)> = attrs.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: convert_attribute_value(value),
        })
        .collect()
}

/// Maps a span kind to its OTLP integer code. Unknown kinds map to 0.
pub fn map_span_kind(kind: SpanKind) -> i32 {
    match kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
    }
}

/// Maps a status code to its OTLP integer code.
pub fn map_status_code(code: StatusCode) -> i32 {
    match code {
        StatusCode::Unset => 0,
        StatusCode::Ok => 1,
        StatusCode::Error => 2,
    }
}

/// Renders a timestamp as nanoseconds since the epoch, millisecond precision.
pub fn nanos_string(ts: DateTime<Utc>) -> String {
    (ts.timestamp_millis() * 1_000_000).to_string()
}

/// Converts one internal span to wire form.
pub fn convert_span(span: &Span) -> OtlpSpan {
    OtlpSpan {
        trace_id: span.trace_id.to_string(),
        span_id: span.span_id.to_string(),
        parent_span_id: span.parent_span_id.map(|id| id.to_string()),
        name: span.name.clone(),
        kind: map_span_kind(span.kind),
        start_time_unix_nano: nanos_string(span.start_time),
        end_time_unix_nano: span.end_time.map(nanos_string),
        attributes: convert_attributes(&span.attributes),
        status: OtlpStatus {
            code: map_status_code(span.status.code),
            message: span.status.message.clone(),
        },
        events: span
            .events
            .iter()
            .map(|e| OtlpEvent {
                name: e.name.clone(),
                time_unix_nano: nanos_string(e.timestamp),
                attributes: convert_attributes(&e.attributes),
            })
            .collect(),
        links: span
            .links
            .iter()
            .map(|l| OtlpLink {
                trace_id: l.trace_id.to_string(),
                span_id: l.span_id.to_string(),
                attributes: convert_attributes(&l.attributes),
            })
            .collect(),
    }
}

/// Encodes a batch of trace payloads as one export document.
///
/// Each payload keeps its own `resourceSpans` entry so per-payload resources
/// survive batching.
pub fn encode_batch(payloads: &[TracePayload]) -> ExportRequest {
    ExportRequest {
        resource_spans: payloads
            .iter()
            .map(|p| ResourceSpans {
                resource: Resource {
                    attributes: convert_attributes(&p.resource),
                },
                scope_spans: vec![ScopeSpans {
                    spans: p.spans.iter().map(convert_span).collect(),
                }],
            })
            .collect(),
    }
}

/// Converts an exception payload to a zero-duration error trace.
pub fn exception_to_trace(payload: &ExceptionPayload) -> TracePayload {
    let report = &payload.exception;
    let ts = payload.timestamp;

    let mut event = SpanEvent::new("exception");
    event.timestamp = ts;
    event
        .attributes
        .insert("exception.type".into(), report.exception_type.as_str().into());
    event
        .attributes
        .insert("exception.message".into(), report.message.as_str().into());
    if !report.stack_trace.is_empty() {
        event.attributes.insert(
            "exception.stacktrace".into(),
            render_frames(&report.stack_trace).into(),
        );
    }
    event
        .attributes
        .insert("exception.handled".into(), report.handled.into());
    if let Some(component_stack) = &report.component_stack {
        event.attributes.insert(
            "exception.component_stack".into(),
            component_stack.as_str().into(),
        );
    }
    if let Some(mechanism) = &report.mechanism {
        if let Ok(encoded) = serde_json::to_string(mechanism) {
            event
                .attributes
                .insert("exception.mechanism".into(), encoded.into());
        }
    }

    let mut attributes = Attributes::new();
    attributes.insert("event.id".into(), payload.event_id.to_string().into());
    attributes.insert("error".into(), true.into());
    attributes.insert("error.type".into(), report.exception_type.as_str().into());
    attributes.insert("error.message".into(), report.message.as_str().into());
    attributes.insert("otel.status_code".into(), "ERROR".into());
    attributes.insert(
        "otel.status_description".into(),
        report.message.as_str().into(),
    );
    for (key, value) in &report.context {
        if let Some(attr) = json_value_to_attribute(value) {
            attributes.insert(format!("context.{key}"), attr);
        }
    }
    for (key, value) in &payload.tags {
        attributes.insert(format!("tag.{key}"), value.as_str().into());
    }
    if let Some(id) = payload.user.as_ref().and_then(|u| u.id.as_deref()) {
        attributes.insert("user.id".into(), id.into());
    }
    attributes.insert(
        "breadcrumbs.count".into(),
        (payload.breadcrumbs.len() as i64).into(),
    );

    let span = Span {
        span_id: SpanId::generate(),
        trace_id: TraceId::generate(),
        parent_span_id: None,
        name: format!("Exception: {}", report.exception_type),
        kind: SpanKind::Internal,
        start_time: ts,
        end_time: Some(ts),
        duration: Some(0),
        status: SpanStatus::error(report.message.clone()),
        attributes,
        events: vec![event],
        links: Vec::new(),
    };

    let resource = build_resource(
        &payload.service_name,
        None,
        payload.app.as_ref().and_then(|a| a.app_version.as_deref()),
        None,
        None,
        payload.device.as_ref(),
    );

    TracePayload {
        spans: vec![span],
        service_name: payload.service_name.clone(),
        resource,
        timestamp: ts,
    }
}

/// Converts a snapshot payload to a zero-duration marker trace.
///
/// When the snapshot carries live trace context the marker joins that trace,
/// otherwise it starts its own.
pub fn snapshot_to_trace(payload: &SnapshotPayload) -> TracePayload {
    let snapshot = &payload.snapshot;
    let ts = payload.timestamp;

    let mut attributes = Attributes::new();
    attributes.insert(
        "snapshot.breakpoint_id".into(),
        snapshot.breakpoint_id.as_str().into(),
    );
    attributes.insert("snapshot.file_path".into(), snapshot.file_path.as_str().into());
    attributes.insert(
        "snapshot.line_number".into(),
        i64::from(snapshot.line_number).into(),
    );
    attributes.insert(
        "snapshot.function_name".into(),
        snapshot.function_name.as_str().into(),
    );
    attributes.insert("snapshot.label".into(), snapshot.label.as_str().into());

    let span = Span {
        span_id: SpanId::generate(),
        trace_id: snapshot.trace_id.unwrap_or_else(TraceId::generate),
        parent_span_id: snapshot.span_id,
        name: format!("snapshot.{}", snapshot.label),
        kind: SpanKind::Internal,
        start_time: ts,
        end_time: Some(ts),
        duration: Some(0),
        status: SpanStatus::ok(),
        attributes,
        events: Vec::new(),
        links: Vec::new(),
    };

    let resource = build_resource(&payload.service_name, None, None, None, None, None);

    TracePayload {
        spans: vec![span],
        service_name: payload.service_name.clone(),
        resource,
        timestamp: ts,
    }
}

/// Assembles the resource attribute set for outgoing trace payloads.
///
/// Service name and SDK identity are always present; everything else drops
/// out when the caller has nothing to report.
pub fn build_resource(
    service_name: &str,
    environment: Option<&str>,
    release: Option<&str>,
    session_id: Option<&str>,
    device_id: Option<&str>,
    device: Option<&crate::model::DeviceContext>,
) -> Attributes {
    let mut resource = Attributes::new();
    resource.insert("service.name".into(), service_name.into());
    if let Some(release) = release {
        resource.insert("service.version".into(), release.into());
    }
    if let Some(environment) = environment {
        resource.insert("deployment.environment".into(), environment.into());
    }
    resource.insert("telemetry.sdk.name".into(), SDK_NAME.into());
    resource.insert("telemetry.sdk.version".into(), SDK_VERSION.into());
    resource.insert("telemetry.sdk.language".into(), SDK_LANGUAGE.into());
    if let Some(session_id) = session_id {
        resource.insert("session.id".into(), session_id.into());
    }
    if let Some(device_id) = device_id {
        resource.insert("device.id".into(), device_id.into());
    }
    if let Some(device) = device {
        if let Some(model) = &device.model {
            resource.insert("device.model".into(), model.as_str().into());
        }
        if let Some(os_name) = &device.os_name {
            resource.insert("os.name".into(), os_name.as_str().into());
        }
        if let Some(os_version) = &device.os_version {
            resource.insert("os.version".into(), os_version.as_str().into());
        }
    }
    resource
}

/// Maps a free-form JSON value onto the attribute model.
///
/// Objects flatten to their JSON rendering; nulls drop out entirely.
pub fn json_value_to_attribute(value: &serde_json::Value) -> Option<AttributeValue> {
    use serde_json::Value;

    match value {
        Value::Null => None,
        Value::Bool(b) => Some(AttributeValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(AttributeValue::Int(i))
            } else {
                n.as_f64().map(AttributeValue::Double)
            }
        }
        Value::String(s) => Some(AttributeValue::String(s.clone())),
        Value::Array(items) => Some(AttributeValue::Array(
            items.iter().filter_map(json_value_to_attribute).collect(),
        )),
        Value::Object(_) => Some(AttributeValue::String(value.to_string())),
    }
}
