use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use skinbridge_bridge::{bridge, BridgeConfig};
use skinbridge_connector::{HostCommand, OverlayRuntime, SnapshotHost};
use skinbridge_overlay::{HostTree, Overlay, OverlayConfig};

const WAIT: Duration = Duration::from_secs(5);

const SNAPSHOT: &str = r#"{
  "children": [{
    "classes": ["skin-selection-carousel"],
    "children": [{
      "classes": ["skin-selection-item", "skin-carousel-offset-2"],
      "rect": {"x": 100, "y": 50, "width": 200, "height": 300},
      "children": [{
        "classes": ["skin-selection-item-information", "loyalty-reward-icon--rewards"]
      }]
    }]
  }]
}"#;

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send(ws: &mut WebSocketStream<TcpStream>, json: &str) {
    ws.send(Message::Text(json.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_controller_session_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("tree.json");
    std::fs::write(&snapshot, SNAPSHOT).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, handle, inbound_rx) = bridge(BridgeConfig {
        url: format!("ws://{addr}"),
        reconnect_delay: Duration::from_millis(200),
        connect_timeout: Duration::from_secs(2),
    })
    .unwrap();
    tokio::spawn(client.run());

    let runtime = OverlayRuntime::new(
        Overlay::new(OverlayConfig::default()),
        SnapshotHost::watching(&snapshot),
        handle,
        inbound_rx,
        Duration::from_millis(50),
    );
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(runtime.run(commands_rx));

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    let mut requested = Vec::new();
    for _ in 0..3 {
        let value = next_json(&mut ws).await;
        assert_eq!(value["type"], "asset-request");
        assert_eq!(value["source"], "skinbridge");
        requested.push(value["key"].as_str().unwrap().to_string());
    }
    assert_eq!(requested, vec!["flag", "dice-disabled", "dice-enabled"]);

    send(&mut ws, r#"{"type":"phase-signal","phase":"ChampSelect"}"#).await;
    send(&mut ws, r#"{"type":"state-update","active":true,"controlMode":"enabled"}"#).await;
    send(
        &mut ws,
        r#"{"type":"asset-delivered","key":"flag","handleRef":"http://127.0.0.1/random_flag.png"}"#,
    )
    .await;
    send(
        &mut ws,
        r#"{"type":"asset-delivered","key":"dice-enabled","handleRef":"http://127.0.0.1/dice-enabled.png"}"#,
    )
    .await;

    // The control exists once the state update has been handled; keep
    // clicking until the controller sees it.
    let mut click = None;
    for _ in 0..25 {
        commands_tx.send(HostCommand::Click).unwrap();
        if let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_millis(200), ws.next()).await
        {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            if value["type"] == "control-click" {
                click = Some(value);
                break;
            }
        }
    }
    let click = click.expect("controller never saw a control-click");
    assert_eq!(click["controlMode"], "enabled");

    commands_tx.send(HostCommand::Quit).unwrap();
    let runtime = timeout(WAIT, task).await.unwrap().unwrap();

    let tree = runtime.host().tree();
    let anchor = tree
        .select_first(&["skin-selection-item-information", "loyalty-reward-icon--rewards"])
        .unwrap();
    assert!(tree.has_class(anchor, "lu-random-flag-active"));
    assert_eq!(
        tree.style(anchor, "background-image").as_deref(),
        Some("url(\"http://127.0.0.1/random_flag.png\")")
    );
    let control = runtime.overlay().control_node().unwrap();
    assert!(tree.has_class(control, "enabled"));
    assert_eq!(
        tree.style(control, "background-image").as_deref(),
        Some("url(\"http://127.0.0.1/dice-enabled.png\")")
    );
}

#[tokio::test]
async fn test_outbound_is_queued_until_controller_appears() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, handle, inbound_rx) = bridge(BridgeConfig {
        url: format!("ws://{addr}"),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
    })
    .unwrap();

    // Prefetch requests are issued before the bridge task even starts.
    let runtime = OverlayRuntime::new(
        Overlay::new(OverlayConfig::default()),
        SnapshotHost::empty(),
        handle,
        inbound_rx,
        Duration::from_millis(50),
    );
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(runtime.run(commands_rx));
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::spawn(client.run());

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    let mut keys = Vec::new();
    for _ in 0..3 {
        let value = next_json(&mut ws).await;
        assert_eq!(value["type"], "asset-request");
        assert!(value["timestamp"].as_i64().is_some());
        keys.push(value["assetPath"].as_str().unwrap().to_string());
    }
    assert_eq!(
        keys,
        vec!["random_flag.png", "dice-disabled.png", "dice-enabled.png"]
    );

    commands_tx.send(HostCommand::Quit).unwrap();
    let runtime = timeout(WAIT, task).await.unwrap().unwrap();
    assert!(runtime.overlay().control_node().is_none());
}
