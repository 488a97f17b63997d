//! Live code snapshots driven by server-side breakpoints.
//!
//! A snapshot site is an explicit `snapshot(...)` call in application code.
//! Sites register themselves with the backend the first time they run, and
//! the client polls the backend for which breakpoints are currently armed.
//! When an armed breakpoint matches a site, the call captures local
//! variables and a stack trace and posts them to the capture endpoint; the
//! SDK also emits a zero-duration marker span so the capture shows up inside
//! the live trace.
//!
//! Captures are bounded server-side by `max_captures` and `expire_at`, and
//! client-side by a depth limit on the captured variables, so an armed
//! breakpoint in a hot loop cannot flood the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::ids::{SpanId, TraceId};
use crate::sanitize::depth_limited;
use crate::stacktrace::{current_frames, render_frames};
use crate::transport::TransportError;

/// Depth cap applied to captured variable values.
const MAX_VARIABLE_DEPTH: usize = 8;

/// An armed breakpoint as reported by the backend.
///
/// The snapshot endpoints speak snake_case JSON, so the field names here
/// are the wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Server-assigned breakpoint id.
    pub id: String,
    /// Service the breakpoint belongs to.
    #[serde(default)]
    pub service_name: Option<String>,
    /// Matches sites captured under this label.
    #[serde(default)]
    pub label: Option<String>,
    /// Matches sites inside this function.
    #[serde(default)]
    pub function_name: Option<String>,
    /// Matches sites in this file (suffix match), together with
    /// `line_number`.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Line the breakpoint is pinned to.
    #[serde(default)]
    pub line_number: Option<u32>,
    /// Capture condition, evaluated by the backend. Carried for operators;
    /// the client does not evaluate it.
    #[serde(default)]
    pub condition: Option<String>,
    /// Disarmed breakpoints stay in the list but never match.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Breakpoints stop matching once this instant passes.
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
    /// Upper bound on captures; zero means unlimited.
    #[serde(default)]
    pub max_captures: u32,
    /// Captures the backend has already recorded for this breakpoint.
    #[serde(default)]
    pub capture_count: u32,
}

fn default_enabled() -> bool {
    true
}

/// Envelope of the active-breakpoints endpoint.
#[derive(Debug, Deserialize)]
struct BreakpointList {
    #[serde(default)]
    breakpoints: Vec<Breakpoint>,
}

/// HTTP request details attached to a capture taken while handling a
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Request headers. Run them through
    /// [`sanitize_headers`](crate::sanitize::sanitize_headers) before
    /// attaching; the client sends them as given.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// A captured snapshot: variables and stack state at one site execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// The breakpoint that triggered this capture.
    pub breakpoint_id: String,
    /// Service the capture came from.
    pub service_name: String,
    /// Source file of the site.
    pub file_path: String,
    /// Function containing the site.
    pub function_name: String,
    /// Label passed at the site.
    pub label: String,
    /// Line of the site.
    pub line_number: u32,
    /// Captured variables, depth-limited.
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    /// Rendered call stack at capture time.
    #[serde(default)]
    pub stack_trace: String,
    /// Trace active when the capture fired, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    /// Span active when the capture fired, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
    /// In-flight request details, if the caller supplied them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
    /// When the capture was taken.
    pub captured_at: DateTime<Utc>,
}

/// Identifies one `snapshot` call site in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSite {
    /// Source file, as produced by `file!()`.
    pub file: &'static str,
    /// Source line.
    pub line: u32,
    /// Enclosing function name; the compiler cannot supply this, so callers
    /// pass it explicitly (or via [`snapshot_site!`](crate::snapshot_site)).
    pub function: &'static str,
}

impl SnapshotSite {
    /// Builds a site from the caller's location.
    #[track_caller]
    pub fn here(function: &'static str) -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            function,
        }
    }
}

/// Builds a [`SnapshotSite`](crate::snapshot::SnapshotSite) for the current
/// file and line.
///
/// ```
/// let site = tracekit::snapshot_site!("apply_discount");
/// assert!(site.file.ends_with(".rs"));
/// ```
#[macro_export]
macro_rules! snapshot_site {
    ($function:expr) => {
        $crate::snapshot::SnapshotSite {
            file: file!(),
            line: line!(),
            function: $function,
        }
    };
}

/// Polls for armed breakpoints and posts captures.
#[derive(Clone)]
pub struct SnapshotClient {
    inner: Arc<SnapshotInner>,
}

struct SnapshotInner {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    service_name: String,
    poll_interval: std::time::Duration,
    breakpoints: RwLock<HashMap<String, Breakpoint>>,
    capture_counts: Mutex<HashMap<String, u32>>,
    registered_sites: Mutex<HashSet<String>>,
    shutdown: CancellationToken,
}

impl SnapshotClient {
    /// Creates a snapshot client from SDK configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config, service_name: String) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.transport.request_timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(SnapshotInner {
                http,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                service_name,
                poll_interval: config.monitoring.poll_interval,
                breakpoints: RwLock::new(HashMap::new()),
                capture_counts: Mutex::new(HashMap::new()),
                registered_sites: Mutex::new(HashSet::new()),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Spawns the breakpoint poll loop. The first fetch happens immediately.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.poll_interval);
            loop {
                tokio::select! {
                    () = inner.shutdown.cancelled() => break,
                    _ = ticker.tick() => inner.refresh_breakpoints().await,
                }
            }
            tracing::debug!("Snapshot breakpoint poller stopped");
        });
    }

    /// Number of breakpoints currently armed.
    pub async fn active_breakpoints(&self) -> usize {
        self.inner.breakpoints.read().await.len()
    }

    /// Runs a site through the armed breakpoints and captures if one
    /// matches.
    ///
    /// Registers the site with the backend on first sight. Returns the
    /// capture so the caller can thread it into the trace pipeline, or
    /// `None` when nothing was armed for this site.
    pub async fn capture(
        &self,
        site: SnapshotSite,
        label: &str,
        variables: serde_json::Map<String, serde_json::Value>,
        trace_context: Option<(TraceId, SpanId)>,
        request_context: Option<RequestContext>,
    ) -> Option<SnapshotData> {
        self.inner.ensure_registered(site, label).await;

        let breakpoint = self.inner.armed_breakpoint(site, label).await?;

        let mut limited = serde_json::Map::with_capacity(variables.len());
        for (key, value) in &variables {
            limited.insert(key.clone(), depth_limited(value, MAX_VARIABLE_DEPTH));
        }

        let (trace_id, span_id) = match trace_context {
            Some((trace_id, span_id)) => (Some(trace_id), Some(span_id)),
            None => (None, None),
        };

        let data = SnapshotData {
            breakpoint_id: breakpoint.id,
            service_name: self.inner.service_name.clone(),
            file_path: site.file.to_string(),
            function_name: site.function.to_string(),
            label: label.to_string(),
            line_number: site.line,
            variables: limited,
            stack_trace: render_frames(&current_frames()),
            trace_id,
            span_id,
            request_context,
            captured_at: Utc::now(),
        };

        self.inner.post_capture(&data).await;
        Some(data)
    }

    /// Stops the poll loop.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }
}

impl SnapshotInner {
    async fn refresh_breakpoints(&self) {
        let url = format!("{}/sdk/snapshots/active/{}", self.api_url, self.service_name);
        let response = self
            .http
            .get(&url)
            .header(crate::transport::HEADER_API_KEY, &self.api_key)
            .send()
            .await;

        let list: BreakpointList = match response {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json().await {
                    Ok(list) => list,
                    Err(e) => {
                        tracing::debug!(error = %e, "Failed to parse breakpoint list");
                        return;
                    }
                },
                Err(e) => {
                    tracing::debug!(error = %e, "Breakpoint fetch rejected");
                    return;
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "Breakpoint fetch failed");
                return;
            }
        };

        let count = list.breakpoints.len();
        let mut armed = self.breakpoints.write().await;
        armed.clear();
        for breakpoint in list.breakpoints {
            armed.insert(breakpoint.id.clone(), breakpoint);
        }
        drop(armed);
        tracing::debug!(count, "Refreshed armed breakpoints");
    }

    async fn ensure_registered(&self, site: SnapshotSite, label: &str) {
        let key = format!("{}:{}", site.file, site.line);
        {
            let mut registered = self.registered_sites.lock().await;
            if !registered.insert(key.clone()) {
                return;
            }
        }

        let url = format!("{}/sdk/snapshots/auto-register", self.api_url);
        let body = serde_json::json!({
            "service_name": self.service_name,
            "file_path": site.file,
            "line_number": site.line,
            "function_name": site.function,
            "label": label,
        });
        let result = self
            .http
            .post(&url)
            .header(crate::transport::HEADER_API_KEY, &self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(response) => match response.json::<Breakpoint>().await {
                Ok(breakpoint) => {
                    tracing::debug!(
                        breakpoint_id = %breakpoint.id,
                        file = site.file,
                        line = site.line,
                        "Registered snapshot site"
                    );
                    // arm the returned record immediately; a breakpoint the
                    // backend already enabled captures on this same call
                    self.breakpoints
                        .write()
                        .await
                        .insert(breakpoint.id.clone(), breakpoint);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Unparseable registration response");
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, file = site.file, line = site.line, "Site registration failed");
                // retry on the next execution of this site
                self.registered_sites.lock().await.remove(&key);
            }
        }
    }

    async fn armed_breakpoint(&self, site: SnapshotSite, label: &str) -> Option<Breakpoint> {
        let now = Utc::now();
        let candidate = {
            let breakpoints = self.breakpoints.read().await;
            breakpoints
                .values()
                .find(|bp| bp.enabled && !is_expired(bp, now) && matches_site(bp, site, label))
                .cloned()?
        };

        let mut counts = self.capture_counts.lock().await;
        let count = counts.entry(candidate.id.clone()).or_insert(0);
        // the backend count runs ahead of ours when other clients capture
        // against the same breakpoint
        let seen = (*count).max(candidate.capture_count);
        if candidate.max_captures > 0 && seen >= candidate.max_captures {
            return None;
        }
        *count = seen + 1;
        Some(candidate)
    }

    async fn post_capture(&self, data: &SnapshotData) {
        let url = format!("{}/sdk/snapshots/capture", self.api_url);
        let result = self
            .http
            .post(&url)
            .header(crate::transport::HEADER_API_KEY, &self.api_key)
            .json(data)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(_) => {
                tracing::debug!(
                    breakpoint_id = %data.breakpoint_id,
                    label = %data.label,
                    "Posted snapshot capture"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, breakpoint_id = %data.breakpoint_id, "Snapshot capture post failed");
            }
        }
    }
}

fn is_expired(breakpoint: &Breakpoint, now: DateTime<Utc>) -> bool {
    breakpoint.expire_at.is_some_and(|expire_at| expire_at <= now)
}

fn matches_site(breakpoint: &Breakpoint, site: SnapshotSite, label: &str) -> bool {
    if breakpoint.label.as_deref() == Some(label) {
        return true;
    }
    if breakpoint.function_name.as_deref() == Some(site.function) {
        return true;
    }
    if let (Some(file), Some(line)) = (&breakpoint.file_path, breakpoint.line_number) {
        return line == site.line && site.file.ends_with(file.as_str());
    }
    false
}

impl std::fmt::Debug for SnapshotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotClient")
            .field("service_name", &self.inner.service_name)
            .finish_non_exhaustive()
    }
}
