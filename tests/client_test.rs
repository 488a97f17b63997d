//! End-to-end tests: the client pipeline through the real HTTP transport to
//! an in-process collector.

mod common;

use common::{Collector, find_attr, spans_in, wait_until};
use std::sync::Arc;
use std::time::Duration;
use tracekit::{
    Config, ConnectivityMonitor, ManualConnectivity, MemoryStore, StorageAdapter, StorageManager,
    TracekitClient,
};

fn make_config(api_url: String) -> Config {
    Config::builder()
        .api_key("tk_integration")
        .api_url(api_url)
        .service_name("integration-service")
        .flush_interval(Duration::from_millis(100))
        .request_timeout(Duration::from_secs(2))
        .build()
}

fn find_span(collector: &Collector, name: &str) -> Option<serde_json::Value> {
    collector
        .trace_requests()
        .iter()
        .flat_map(|request| spans_in(&request.body))
        .find(|span| span["name"] == name)
}

#[tokio::test]
async fn test_span_reaches_collector_with_resource_identity() {
    let collector = Collector::start().await;
    let client = TracekitClient::init(make_config(collector.url()))
        .await
        .expect("Failed to build client");

    let span = client.start_span("load inventory");
    client.set_span_attribute(span, "inventory.count", 17i64);
    client.end_span(span);

    assert!(
        wait_until(
            || collector.span_names().contains(&"load inventory".to_string()),
            Duration::from_secs(3),
        )
        .await,
        "span never reached the collector"
    );

    let requests = collector.trace_requests();
    let resource = &requests[0].body["resourceSpans"][0]["resource"];
    assert_eq!(
        find_attr(resource, "service.name").unwrap()["stringValue"],
        "integration-service"
    );
    assert_eq!(
        find_attr(resource, "telemetry.sdk.language").unwrap()["stringValue"],
        "rust"
    );
    assert_eq!(
        find_attr(resource, "session.id").unwrap()["stringValue"],
        client.session_id()
    );

    let wire = find_span(&collector, "load inventory").expect("span missing");
    assert_eq!(find_attr(&wire, "inventory.count").unwrap()["intValue"], "17");

    client.close().await;
}

#[tokio::test]
async fn test_capture_error_exports_error_span() {
    let collector = Collector::start().await;
    let client = TracekitClient::init(make_config(collector.url()))
        .await
        .expect("Failed to build client");

    let error = std::io::Error::new(std::io::ErrorKind::TimedOut, "registry timed out");
    let event_id = client.capture_error(&error);

    assert!(
        wait_until(
            || collector.span_names().contains(&"Exception: Error".to_string()),
            Duration::from_secs(3),
        )
        .await,
        "exception never reached the collector"
    );

    let wire = find_span(&collector, "Exception: Error").expect("span missing");
    assert_eq!(wire["status"]["code"], 2);
    assert_eq!(
        find_attr(&wire, "event.id").unwrap()["stringValue"],
        event_id.to_string()
    );
    assert_eq!(find_attr(&wire, "error.type").unwrap()["stringValue"], "Error");

    let events = wire["events"].as_array().expect("events missing");
    assert_eq!(events[0]["name"], "exception");
    assert_eq!(
        find_attr(&events[0], "exception.message").unwrap()["stringValue"],
        "registry timed out"
    );

    client.close().await;
}

#[tokio::test]
async fn test_before_send_veto_blocks_export() {
    let collector = Collector::start().await;
    let client = TracekitClient::builder(make_config(collector.url()))
        .before_send(|_| None)
        .build()
        .await
        .expect("Failed to build client");

    let span = client.start_span("vetoed");
    client.end_span(span);

    // give the dispatch task and a few flush ticks time to run
    tokio::time::sleep(Duration::from_millis(400)).await;
    client.flush().await;
    assert!(collector.trace_requests().is_empty());

    client.close().await;
}

#[tokio::test]
async fn test_offline_spans_replay_after_reconnect() {
    let collector = Collector::start().await;
    let monitor = Arc::new(ManualConnectivity::new(false));
    let client = TracekitClient::builder(make_config(collector.url()))
        .connectivity_monitor(Arc::clone(&monitor) as Arc<dyn ConnectivityMonitor>)
        .build()
        .await
        .expect("Failed to build client");

    let span = client.start_span("queued offline");
    client.end_span(span);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(collector.trace_requests().is_empty());

    monitor.set_online(true);
    assert!(
        wait_until(
            || collector.span_names().contains(&"queued offline".to_string()),
            Duration::from_secs(3),
        )
        .await,
        "buffered span never replayed"
    );

    client.close().await;
}

#[tokio::test]
async fn test_unexportable_payloads_replay_on_next_start() {
    let adapter = Arc::new(MemoryStore::new());

    // first run: the collector is unreachable, so closing fails over to
    // durable storage
    let dead_config = Config::builder()
        .api_key("tk_integration")
        .api_url("http://127.0.0.1:9")
        .service_name("integration-service")
        .request_timeout(Duration::from_millis(500))
        .build();
    let client = TracekitClient::builder(dead_config)
        .storage_adapter(Arc::clone(&adapter) as Arc<dyn StorageAdapter>)
        .build()
        .await
        .expect("Failed to build client");

    let span = client.start_span("persisted");
    client.end_span(span);
    tokio::time::sleep(Duration::from_millis(150)).await;
    client.close().await;

    let check = StorageManager::new(Arc::clone(&adapter) as Arc<dyn StorageAdapter>, 100);
    let pending = check.pending_traces().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].spans[0].name, "persisted");

    // second run: same storage, live collector; startup replay delivers the
    // span and clears the pending list
    let collector = Collector::start().await;
    let client = TracekitClient::builder(make_config(collector.url()))
        .storage_adapter(Arc::clone(&adapter) as Arc<dyn StorageAdapter>)
        .build()
        .await
        .expect("Failed to build client");

    assert!(
        wait_until(
            || collector.span_names().contains(&"persisted".to_string()),
            Duration::from_secs(3),
        )
        .await,
        "persisted span never replayed"
    );
    assert!(check.pending_traces().await.is_empty());

    client.close().await;
}
