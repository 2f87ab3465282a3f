//! End-to-end relay tests: real producer TCP sessions and WebSocket viewers
//! against a bridge bound on ephemeral ports

use relay_config::{ProducerMode, RelayOptions, UnknownTargetPolicy};
use serde_json::json;
use std::time::Duration;
use telemetry_bridge_e2e::{wait_for_clients, TestBridge};

const QUIET_WINDOW: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_broadcast_reaches_every_viewer() {
    let bridge = TestBridge::start().await.unwrap();
    let mut viewer_a = bridge.viewer().await.unwrap();
    let mut viewer_b = bridge.viewer().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();
    wait_for_clients(&mut producer, 2).await.unwrap();

    let update = json!({"what": "update_positions", "positions": [{"id": 7, "x": 1.5}]});
    assert_eq!(producer.request(&update).await.unwrap(), "Success");

    assert_eq!(viewer_a.next_json().await.unwrap(), update);
    assert_eq!(viewer_b.next_json().await.unwrap(), update);
    assert!(viewer_a.is_quiet(QUIET_WINDOW).await);
}

#[tokio::test]
async fn test_targeted_camera_update_reaches_only_target() {
    let bridge = TestBridge::start().await.unwrap();
    let mut viewer_a = bridge.viewer().await.unwrap();
    let mut viewer_b = bridge.viewer().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();
    wait_for_clients(&mut producer, 2).await.unwrap();

    let command = json!({"what": "update_cam", "client": viewer_b.id, "name": "chase"});
    assert_eq!(producer.request(&command).await.unwrap(), "Success");

    assert_eq!(viewer_b.next_json().await.unwrap(), command);
    assert!(viewer_a.is_quiet(QUIET_WINDOW).await);
}

#[tokio::test]
async fn test_get_clients_lists_connected_viewers() {
    let bridge = TestBridge::start().await.unwrap();
    let viewer_a = bridge.viewer().await.unwrap();
    let viewer_b = bridge.viewer().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();

    let ids = wait_for_clients(&mut producer, 2).await.unwrap();
    let mut expected = vec![viewer_a.id.clone(), viewer_b.id.clone()];
    expected.sort();
    assert_eq!(ids, expected);

    viewer_a.close().await.unwrap();
    let ids = wait_for_clients(&mut producer, 1).await.unwrap();
    assert_eq!(ids, vec![viewer_b.id.clone()]);
}

#[tokio::test]
async fn test_no_connected_sockets_reply() {
    let bridge = TestBridge::start().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();

    let reply = producer
        .request(&json!({"what": "update_objects", "objects": []}))
        .await
        .unwrap();
    assert_eq!(reply, "No connected sockets");
}

#[tokio::test]
async fn test_unknown_target_policies() {
    let bridge = TestBridge::start().await.unwrap();
    let mut viewer = bridge.viewer().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();
    wait_for_clients(&mut producer, 1).await.unwrap();

    let command = json!({"what": "update_orbital", "client": "nobody"});
    assert_eq!(producer.request(&command).await.unwrap(), "Success");
    assert!(viewer.is_quiet(QUIET_WINDOW).await);

    let strict = TestBridge::start_with(RelayOptions {
        unknown_target: UnknownTargetPolicy::ReportNotFound,
        ..RelayOptions::default()
    })
    .await
    .unwrap();
    let _viewer = strict.viewer().await.unwrap();
    let mut producer = strict.producer().await.unwrap();
    wait_for_clients(&mut producer, 1).await.unwrap();

    assert_eq!(
        producer.request(&command).await.unwrap(),
        "Client not found: nobody"
    );
}

#[tokio::test]
async fn test_frames_split_across_writes() {
    let bridge = TestBridge::start().await.unwrap();
    let mut viewer = bridge.viewer().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();
    wait_for_clients(&mut producer, 1).await.unwrap();

    producer
        .write_raw(b"{\"what\":\"update_path\",\"seq\":1}\0{\"what\":\"update_pa")
        .await
        .unwrap();
    assert_eq!(producer.reply().await.unwrap(), "Success");
    tokio::time::sleep(Duration::from_millis(20)).await;
    producer.write_raw(b"th\",\"seq\":2}\0").await.unwrap();
    assert_eq!(producer.reply().await.unwrap(), "Success");

    for seq in 1..=2 {
        assert_eq!(
            viewer.next_json().await.unwrap(),
            json!({"what": "update_path", "seq": seq})
        );
    }
}

#[tokio::test]
async fn test_malformed_frame_does_not_end_session() {
    let bridge = TestBridge::start().await.unwrap();
    let mut viewer = bridge.viewer().await.unwrap();
    let mut producer = bridge.producer().await.unwrap();
    wait_for_clients(&mut producer, 1).await.unwrap();

    producer.write_raw(b"{broken\0").await.unwrap();
    let update = json!({"what": "update_map", "tiles": 3});
    assert_eq!(producer.request(&update).await.unwrap(), "Success");
    assert_eq!(viewer.next_json().await.unwrap(), update);
}

#[tokio::test]
async fn test_single_producer_mode_replaces_session() {
    let bridge = TestBridge::start_with(RelayOptions {
        producer_mode: ProducerMode::Single,
        ..RelayOptions::default()
    })
    .await
    .unwrap();
    let mut viewer = bridge.viewer().await.unwrap();

    let mut first = bridge.producer().await.unwrap();
    wait_for_clients(&mut first, 1).await.unwrap();

    let mut second = bridge.producer().await.unwrap();
    wait_for_clients(&mut second, 1).await.unwrap();

    // The replaced session is gone; its writes are never routed
    let _ = first.send(&json!({"what": "update_map", "from": "first"})).await;
    assert!(first.reply().await.is_err());

    let update = json!({"what": "update_map", "from": "second"});
    assert_eq!(second.request(&update).await.unwrap(), "Success");
    assert_eq!(viewer.next_json().await.unwrap(), update);
}

#[tokio::test]
async fn test_multi_producer_sessions_are_independent() {
    let bridge = TestBridge::start().await.unwrap();
    let mut viewer = bridge.viewer().await.unwrap();
    let mut first = bridge.producer().await.unwrap();
    let mut second = bridge.producer().await.unwrap();
    wait_for_clients(&mut first, 1).await.unwrap();

    // A partial frame on one session never leaks into the other
    first.write_raw(b"{\"what\":\"update_pa").await.unwrap();
    let update = json!({"what": "update_objects", "from": "second"});
    assert_eq!(second.request(&update).await.unwrap(), "Success");
    assert_eq!(viewer.next_json().await.unwrap(), update);

    first.write_raw(b"th\",\"from\":\"first\"}\0").await.unwrap();
    assert_eq!(first.reply().await.unwrap(), "Success");
    assert_eq!(
        viewer.next_json().await.unwrap(),
        json!({"what": "update_path", "from": "first"})
    );
}

#[tokio::test]
async fn test_viewer_over_connection_limit_is_closed() {
    let bridge = TestBridge::start_with(RelayOptions {
        max_connections: 1,
        ..RelayOptions::default()
    })
    .await
    .unwrap();

    let first = bridge.viewer().await.unwrap();
    assert!(bridge.viewer().await.is_err());

    let mut producer = bridge.producer().await.unwrap();
    let ids = wait_for_clients(&mut producer, 1).await.unwrap();
    assert_eq!(ids, vec![first.id.clone()]);

    // The slot frees up once the first viewer leaves
    first.close().await.unwrap();
    wait_for_clients(&mut producer, 0).await.unwrap();
    let replacement = bridge.viewer().await.unwrap();
    assert_eq!(
        wait_for_clients(&mut producer, 1).await.unwrap(),
        vec![replacement.id.clone()]
    );
}
