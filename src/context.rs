//! Host context capability: device and application facts.
//!
//! The SDK itself can only see what any Rust process sees. Rich device
//! detail lives with the host platform, so context resolution is a
//! capability the host can provide: embedders hand the SDK a
//! [`ContextProvider`] and the SDK attaches whatever it returns to
//! exception payloads and resource attributes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{AppContext, DeviceContext, Platform};

/// Supplies device and application context on demand.
///
/// Called when payloads are assembled, so implementations may return
/// fresh values (battery level, network type) on each call.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Describes the device the application runs on.
    async fn device_context(&self) -> DeviceContext;

    /// Describes the application build.
    async fn app_context(&self) -> AppContext;
}

/// Default provider; reports what the build target and process know.
#[derive(Debug)]
pub struct HostContextProvider {
    started_at: DateTime<Utc>,
}

impl HostContextProvider {
    /// Creates the provider, recording the current instant as the
    /// application start time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }
}

impl Default for HostContextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextProvider for HostContextProvider {
    async fn device_context(&self) -> DeviceContext {
        DeviceContext {
            platform: Platform::current(),
            os_name: Some(std::env::consts::OS.to_string()),
            ..DeviceContext::default()
        }
    }

    async fn app_context(&self) -> AppContext {
        AppContext {
            app_start_time: Some(self.started_at),
            ..AppContext::default()
        }
    }
}

/// Provider that returns fixed values supplied by the host.
///
/// Embedders that already gathered device facts through platform APIs
/// wrap them in this.
#[derive(Debug, Clone)]
pub struct StaticContextProvider {
    device: DeviceContext,
    app: AppContext,
}

impl StaticContextProvider {
    /// Creates a provider returning exactly these contexts.
    pub fn new(device: DeviceContext, app: AppContext) -> Self {
        Self { device, app }
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn device_context(&self) -> DeviceContext {
        self.device.clone()
    }

    async fn app_context(&self) -> AppContext {
        self.app.clone()
    }
}
