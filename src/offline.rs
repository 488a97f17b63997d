//! Offline buffering on top of the HTTP transport.
//!
//! Mobile networks come and go; exporting into a dead network turns every
//! flush into a timeout. The [`OfflineTransport`] wrapper keeps payloads in
//! a bounded in-memory buffer while the host reports no connectivity and
//! replays them in order once it returns. Connectivity itself is a host
//! capability: platforms feed reachability changes in through a
//! [`ConnectivityMonitor`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::model::Payload;
use crate::transport::{HttpTransport, Transport};

/// Host-supplied network reachability signal.
///
/// The watched value is true while the network is reachable. The SDK reacts
/// to edges: payloads buffer while the value is false and replay when it
/// flips back to true.
pub trait ConnectivityMonitor: Send + Sync {
    /// Subscribes to reachability changes.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Monitor that always reports a reachable network; the default.
#[derive(Debug)]
pub struct AlwaysOnline {
    sender: watch::Sender<bool>,
}

impl AlwaysOnline {
    /// Creates the monitor.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(true);
        Self { sender }
    }
}

impl Default for AlwaysOnline {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor for AlwaysOnline {
    fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Monitor driven by explicit [`set_online`](ManualConnectivity::set_online)
/// calls.
///
/// Host integrations wire their platform reachability callback to this; it
/// is also what tests use to simulate network loss.
#[derive(Debug)]
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    /// Creates the monitor with an initial state.
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self { sender }
    }

    /// Reports a reachability change.
    pub fn set_online(&self, online: bool) {
        self.sender.send_replace(online);
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Connectivity-aware wrapper around [`HttpTransport`].
#[derive(Clone)]
pub struct OfflineTransport {
    inner: Arc<OfflineInner>,
}

struct OfflineInner {
    transport: HttpTransport,
    online: AtomicBool,
    overflow: Mutex<VecDeque<Payload>>,
    max_queue_size: usize,
    shutdown: CancellationToken,
}

impl OfflineTransport {
    /// Wraps `transport`, following reachability from `monitor`.
    ///
    /// Spawns a watcher task, so this must be called within a tokio
    /// runtime.
    pub fn new(
        transport: HttpTransport,
        config: &Config,
        monitor: &dyn ConnectivityMonitor,
    ) -> Self {
        let mut receiver = monitor.watch();
        let initially_online = *receiver.borrow();
        let inner = Arc::new(OfflineInner {
            transport,
            online: AtomicBool::new(initially_online),
            overflow: Mutex::new(VecDeque::new()),
            max_queue_size: config.transport.max_queue_size.max(1),
            shutdown: CancellationToken::new(),
        });

        let watcher = Arc::clone(&inner);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = watcher.shutdown.cancelled() => break,
                    changed = receiver.changed() => {
                        // a dropped monitor freezes the last known state
                        if changed.is_err() {
                            break;
                        }
                        let online = *receiver.borrow_and_update();
                        let was_online = watcher.online.swap(online, Ordering::SeqCst);
                        if online && !was_online {
                            watcher.drain().await;
                        } else if !online && was_online {
                            tracing::debug!("Network lost, buffering payloads");
                        }
                    }
                }
            }
            tracing::debug!("Connectivity watcher stopped");
        });

        Self { inner }
    }

    /// Whether the transport currently believes the network is reachable.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Number of payloads buffered while offline.
    pub async fn buffered_payloads(&self) -> usize {
        self.inner.overflow.lock().await.len()
    }
}

#[async_trait]
impl Transport for OfflineTransport {
    async fn send(&self, payload: Payload) -> bool {
        if self.inner.online.load(Ordering::SeqCst) {
            return self.inner.transport.send(payload).await;
        }

        let mut overflow = self.inner.overflow.lock().await;
        if overflow.len() >= self.inner.max_queue_size {
            tracing::warn!(kind = payload.kind_name(), "Offline queue full, dropping payload");
            return false;
        }
        overflow.push_back(payload);
        true
    }

    async fn flush(&self) {
        if self.inner.online.load(Ordering::SeqCst) {
            self.inner.drain().await;
        }
        // payloads the inner transport accepted before the network went
        // away still flush; a failed export fails over to durable storage
        self.inner.transport.flush().await;
    }

    async fn close(&self) {
        self.inner.shutdown.cancel();
        // hand buffered payloads to the inner transport even when offline;
        // its closing flush fails over to durable storage
        self.inner.drain().await;
        self.inner.transport.close().await;
    }
}

impl OfflineInner {
    /// Replays the offline buffer into the inner transport, oldest first.
    async fn drain(&self) {
        let count = self.overflow.lock().await.len();
        if count == 0 {
            return;
        }
        tracing::debug!(count, "Draining offline queue");
        loop {
            let payload = self.overflow.lock().await.pop_front();
            match payload {
                Some(payload) => {
                    self.transport.send(payload).await;
                }
                None => break,
            }
        }
    }
}

impl std::fmt::Debug for OfflineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineTransport")
            .field("online", &self.is_online())
            .field("max_queue_size", &self.inner.max_queue_size)
            .finish_non_exhaustive()
    }
}
