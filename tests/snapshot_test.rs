//! Integration tests for the code-monitoring snapshot client.

mod common;

use common::{Collector, find_attr, spans_in, wait_until};
use serde_json::json;
use std::time::Duration;
use tracekit::{Config, SnapshotClient, TracekitClient, snapshot_site};

fn make_config(api_url: String) -> Config {
    Config::builder()
        .api_key("tk_integration")
        .api_url(api_url)
        .service_name("integration-service")
        .code_monitoring(true)
        .monitoring_poll_interval(Duration::from_millis(50))
        .flush_interval(Duration::from_millis(100))
        .request_timeout(Duration::from_secs(2))
        .build()
}

async fn wait_for_armed(client: &SnapshotClient, count: usize) {
    for _ in 0..200 {
        if client.active_breakpoints().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "breakpoints never armed, have {}",
        client.active_breakpoints().await
    );
}

#[tokio::test]
async fn test_poller_arms_breakpoints_from_backend() {
    let collector = Collector::start().await;
    collector.set_breakpoints(json!([
        { "id": "bp-1", "label": "checkout" },
        { "id": "bp-2", "function_name": "load_inventory" },
    ]));

    let client = SnapshotClient::new(&make_config(collector.url()), "integration-service".into())
        .expect("Failed to build snapshot client");
    client.start();

    wait_for_armed(&client, 2).await;

    // the next poll replaces the armed set
    collector.set_breakpoints(json!([]));
    for _ in 0..200 {
        if client.active_breakpoints().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(client.active_breakpoints().await, 0);

    client.close();
}

#[tokio::test]
async fn test_capture_round_trip() {
    let collector = Collector::start().await;
    collector.set_breakpoints(json!([{ "id": "bp-1", "label": "checkout" }]));

    let client = SnapshotClient::new(&make_config(collector.url()), "integration-service".into())
        .expect("Failed to build snapshot client");
    client.start();
    wait_for_armed(&client, 1).await;

    let mut variables = serde_json::Map::new();
    variables.insert("total".to_string(), json!(99.5));
    variables.insert("items".to_string(), json!(["socks", "mug"]));

    let site = snapshot_site!("apply_discount");
    let data = client
        .capture(site, "checkout", variables, None, None)
        .await
        .expect("capture should fire for the armed label");

    assert_eq!(data.breakpoint_id, "bp-1");
    assert_eq!(data.label, "checkout");
    assert!(data.file_path.ends_with("snapshot_test.rs"));

    // the site registered itself on first sight
    let registers = collector.register_requests();
    assert_eq!(registers.len(), 1);
    assert_eq!(registers[0]["service_name"], "integration-service");
    assert_eq!(registers[0]["function_name"], "apply_discount");
    assert_eq!(registers[0]["label"], "checkout");

    // and the capture reached the backend with its variables
    let captures = collector.capture_requests();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0]["breakpoint_id"], "bp-1");
    assert_eq!(captures[0]["variables"]["total"], 99.5);
    assert_eq!(captures[0]["variables"]["items"][1], "mug");
    assert_eq!(captures[0]["service_name"], "integration-service");

    client.close();
}

#[tokio::test]
async fn test_unarmed_site_registers_but_does_not_capture() {
    let collector = Collector::start().await;

    let client = SnapshotClient::new(&make_config(collector.url()), "integration-service".into())
        .expect("Failed to build snapshot client");

    let site = snapshot_site!("quiet_path");
    let data = client
        .capture(site, "quiet", serde_json::Map::new(), None, None)
        .await;

    assert!(data.is_none());
    assert_eq!(collector.register_requests().len(), 1);
    assert!(collector.capture_requests().is_empty());
}

#[tokio::test]
async fn test_max_captures_bounds_a_hot_site() {
    let collector = Collector::start().await;
    collector.set_breakpoints(json!([
        { "id": "bp-1", "label": "hot-loop", "max_captures": 2 },
    ]));

    let client = SnapshotClient::new(&make_config(collector.url()), "integration-service".into())
        .expect("Failed to build snapshot client");
    client.start();
    wait_for_armed(&client, 1).await;

    let site = snapshot_site!("hot_loop_body");
    for _ in 0..2 {
        let data = client
            .capture(site, "hot-loop", serde_json::Map::new(), None, None)
            .await;
        assert!(data.is_some());
    }
    let third = client
        .capture(site, "hot-loop", serde_json::Map::new(), None, None)
        .await;
    assert!(third.is_none());
    assert_eq!(collector.capture_requests().len(), 2);

    client.close();
}

#[tokio::test]
async fn test_client_snapshot_joins_live_trace() {
    let collector = Collector::start().await;
    collector.set_breakpoints(json!([{ "id": "bp-9", "label": "inventory" }]));

    let client = TracekitClient::init(make_config(collector.url()))
        .await
        .expect("Failed to build client");

    let span = client.start_span("checkout flow");

    // the poller needs a moment to arm the breakpoint
    let mut captured = false;
    for _ in 0..200 {
        let mut variables = serde_json::Map::new();
        variables.insert("step".to_string(), json!("inventory"));
        if client
            .snapshot(snapshot_site!("load_inventory"), "inventory", variables)
            .await
        {
            captured = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(captured, "snapshot never fired");
    client.end_span(span);

    assert!(
        wait_until(
            || {
                let names = collector.span_names();
                names.contains(&"snapshot.inventory".to_string())
                    && names.contains(&"checkout flow".to_string())
            },
            Duration::from_secs(3),
        )
        .await,
        "marker and application spans never exported"
    );

    // the marker span joins the trace that was active at the capture
    let all_spans: Vec<serde_json::Value> = collector
        .trace_requests()
        .iter()
        .flat_map(|request| spans_in(&request.body))
        .collect();
    let marker = all_spans
        .iter()
        .find(|s| s["name"] == "snapshot.inventory")
        .expect("marker span missing");
    let app_span = all_spans
        .iter()
        .find(|s| s["name"] == "checkout flow")
        .expect("application span missing");
    assert_eq!(marker["traceId"], app_span["traceId"]);
    assert_eq!(marker["parentSpanId"], app_span["spanId"]);
    assert_eq!(
        find_attr(marker, "snapshot.label").unwrap()["stringValue"],
        "inventory"
    );

    // the raw capture also reached the snapshot endpoint with trace context
    let captures = collector.capture_requests();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0]["trace_id"], app_span["traceId"]);

    client.close().await;
}
