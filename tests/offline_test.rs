//! Integration tests for offline buffering against a live collector.

mod common;

use common::{Collector, wait_until};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracekit::{
    Config, HttpTransport, ManualConnectivity, MemoryStore, OfflineTransport, Payload, Span,
    StorageManager, TracePayload, Transport,
};

fn make_config(api_url: String) -> Config {
    Config::builder()
        .api_key("tk_integration")
        .api_url(api_url)
        .max_batch_size(10)
        .max_queue_size(50)
        .request_timeout(Duration::from_secs(2))
        .build()
}

fn make_offline(config: &Config, monitor: &ManualConnectivity) -> OfflineTransport {
    let storage = StorageManager::new(Arc::new(MemoryStore::new()), 100);
    let transport = HttpTransport::new(config, storage).expect("Failed to build transport");
    OfflineTransport::new(transport, config, monitor)
}

fn make_trace(name: &str) -> Payload {
    Payload::Trace(TracePayload {
        spans: vec![Span::new(name)],
        service_name: "integration-service".to_string(),
        resource: HashMap::new(),
        timestamp: chrono::Utc::now(),
    })
}

#[tokio::test]
async fn test_buffered_payloads_replay_in_order_after_reconnect() {
    let collector = Collector::start().await;
    let config = make_config(collector.url());
    let monitor = ManualConnectivity::new(false);
    let offline = make_offline(&config, &monitor);

    assert!(offline.send(make_trace("first")).await);
    assert!(offline.send(make_trace("second")).await);
    assert_eq!(offline.buffered_payloads().await, 2);

    // flushing while offline leaves the buffer alone; the inner queue is
    // empty, so nothing reaches the collector
    offline.flush().await;
    assert_eq!(offline.buffered_payloads().await, 2);
    assert!(collector.trace_requests().is_empty());

    monitor.set_online(true);
    assert!(
        wait_until(|| offline.is_online(), Duration::from_secs(2)).await,
        "transport never observed the reconnect"
    );

    // the watcher drains the buffer into the inner transport; flush until
    // both payloads have made it out
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while collector.span_names().len() < 2 {
        assert!(std::time::Instant::now() < deadline, "payloads never exported");
        offline.flush().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(collector.span_names(), vec!["first", "second"]);
    assert_eq!(offline.buffered_payloads().await, 0);
}

#[tokio::test]
async fn test_online_sends_reach_collector_directly() {
    let collector = Collector::start().await;
    let config = make_config(collector.url());
    let monitor = ManualConnectivity::new(true);
    let offline = make_offline(&config, &monitor);

    assert!(offline.send(make_trace("direct")).await);
    assert_eq!(offline.buffered_payloads().await, 0);

    offline.flush().await;
    assert_eq!(collector.span_names(), vec!["direct"]);
}
