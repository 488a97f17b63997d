//! # TraceKit Rust SDK
//!
//! Client-side telemetry for Rust applications: distributed trace spans,
//! exception reports with breadcrumb trails, and production debugger
//! snapshots, exported as OTLP-JSON to a TraceKit backend.
//!
//! ## Overview
//!
//! The SDK is built around an explicit [`TracekitClient`] handle. The
//! application creates one (usually at startup), clones it wherever
//! telemetry is recorded, and closes it on shutdown. There is no global
//! state and no macro magic; instrumentation is plain method calls.
//!
//! Telemetry is collected in the background: finished spans and captured
//! exceptions are queued and exported in batches on a timer, buffered in
//! memory while the device is offline, and persisted to durable storage
//! when export fails, to be replayed on the next launch.
//!
//! ## Features
//!
//! - **Spans**: manual start/end spans with attributes, events and
//!   parent/child trace propagation
//! - **Exceptions**: error capture with stack traces, breadcrumbs, user,
//!   device and app context
//! - **Tracking helpers**: screen navigation, outbound HTTP requests and
//!   performance metrics as ready-made spans
//! - **Resilience**: offline buffering, durable pending queues and
//!   crash-safe replay
//! - **Code monitoring**: remotely armed breakpoints that capture variable
//!   snapshots from running code
//!
//! ## Quick Start
//!
//! ```no_run
//! use tracekit::{Config, TracekitClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder()
//!         .api_key("tk_0123456789")
//!         .service_name("checkout-app")
//!         .build();
//!     let client = TracekitClient::init(config).await?;
//!
//!     let span = client.start_span("load inventory");
//!     client.set_span_attribute(span, "inventory.count", 42i64);
//!     client.end_span(span);
//!
//!     // flushes queued telemetry and persists anything unexportable
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Configuration comes from the [`Config::builder`], a `tracekit.toml`
//! file, or `TRACEKIT_*` environment variables; see the [`config`] module
//! for the full layering rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod model;
pub mod offline;
pub mod otlp;
pub mod sanitize;
pub mod snapshot;
pub mod stacktrace;
pub mod storage;
pub mod transport;

pub use client::{BeforeSendCallback, ClientBuilder, ErrorObserver, TracekitClient};
pub use config::{Config, ConfigBuilder};
pub use context::{ContextProvider, HostContextProvider, StaticContextProvider};
pub use error::{Result, SdkError};
pub use ids::{EventId, SpanId, TraceId};
pub use model::{
    AppContext, AttributeValue, Attributes, Breadcrumb, BreadcrumbLevel, BreadcrumbType,
    DeviceContext, ExceptionPayload, ExceptionReport, Mechanism, NetworkRequest, Payload,
    PerformanceMetrics, Platform, SnapshotPayload, Span, SpanEvent, SpanKind, SpanStatus,
    StackFrame, StatusCode, TracePayload, User,
};
pub use offline::{AlwaysOnline, ConnectivityMonitor, ManualConnectivity, OfflineTransport};
pub use sanitize::{UrlFilter, sanitize_headers};
pub use snapshot::{RequestContext, SnapshotClient, SnapshotData, SnapshotSite};
pub use storage::{FileStore, MemoryStore, StorageAdapter, StorageError, StorageManager};
pub use transport::{HttpTransport, Transport, TransportError};

/// SDK name reported in export request headers and resource attributes.
pub const SDK_NAME: &str = "tracekit-rust";

/// SDK version reported in export request headers and resource attributes.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Telemetry SDK language resource attribute value.
pub const SDK_LANGUAGE: &str = "rust";
