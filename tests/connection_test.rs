//! Live-socket tests: a real WebSocket client against the full router,
//! exercising the upgrade, the receive loop, reply ordering and the
//! disconnect cleanup path.

use ampere::registry::StationStatus;
use ampere::session::FinalizeReason;
use ampere::web::router;
use ampere::{Config, Hub};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(hub: Arc<Hub>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(hub);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

async fn connect(addr: SocketAddr, station_id: &str) -> Socket {
    let mut request = format!("ws://{}/ocpp16/{}", addr, station_id)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", "ocpp1.6".parse().unwrap());

    let (socket, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(
        response.headers().get("Sec-WebSocket-Protocol").unwrap(),
        "ocpp1.6"
    );
    socket
}

async fn send(socket: &mut Socket, text: &str) {
    socket
        .send(Message::Text(text.to_string().into()))
        .await
        .unwrap();
}

async fn next_reply(socket: &mut Socket) -> Value {
    loop {
        match socket.next().await.expect("socket closed early").unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    }
}

async fn start_on_connector(socket: &mut Socket, message_id: &str, connector: u32) -> i64 {
    send(
        socket,
        &format!(
            r#"[2,"{message_id}","StartTransaction",{{"connectorId":{connector},"idTag":"tag","meterStart":0,"timestamp":"2025-01-01T00:00:00Z"}}]"#
        ),
    )
    .await;
    let reply = next_reply(socket).await;
    assert_eq!(reply[0], 3);
    assert_eq!(reply[1], message_id);
    assert_eq!(reply[2]["idTagInfo"]["status"], "Accepted");
    reply[2]["transactionId"].as_i64().unwrap()
}

async fn wait_until_no_active(hub: &Arc<Hub>) {
    for _ in 0..200 {
        if hub.sessions.lock().await.active_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("active sessions were not finalized in time");
}

#[tokio::test]
async fn abrupt_close_finalizes_both_connectors() {
    let hub = Hub::new(Config::default());
    let addr = serve(hub.clone()).await;
    let mut socket = connect(addr, "CP04").await;

    send(
        &mut socket,
        r#"[2,"b1","BootNotification",{"chargePointVendor":"ACME","chargePointModel":"Duo","firmwareVersion":"2.1"}]"#,
    )
    .await;
    let boot = next_reply(&mut socket).await;
    assert_eq!(boot[1], "b1");
    assert_eq!(boot[2]["status"], "Accepted");

    // Two connectors charging at once
    let first = start_on_connector(&mut socket, "s1", 1).await;
    let second = start_on_connector(&mut socket, "s2", 2).await;
    assert_ne!(first, second);
    assert_eq!(hub.sessions.lock().await.active_count(), 2);

    // Abrupt close: tear down the TCP stream without a close handshake
    drop(socket);
    wait_until_no_active(&hub).await;

    let completed = hub.sessions.lock().await.completed_snapshot();
    assert_eq!(completed.len(), 2);
    assert!(
        completed
            .iter()
            .all(|c| c.reason == FinalizeReason::Disconnect)
    );
    assert!(completed.iter().any(|c| c.connector_id == 1));
    assert!(completed.iter().any(|c| c.connector_id == 2));

    // The record survives offline and refuses operator commands
    let device = hub.registry.lock().await.snapshot("CP04").unwrap();
    assert_eq!(device.status, StationStatus::Offline);

    let response = reqwest::Client::new()
        .post(format!("http://{}/command", addr))
        .json(&json!({"station_id": "CP04", "action": "Reset", "payload": {"type": "Soft"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn every_call_gets_one_result_in_arrival_order() {
    let hub = Hub::new(Config::default());
    let addr = serve(hub.clone()).await;
    let mut socket = connect(addr, "CP06").await;

    // Pipeline a burst without waiting for replies between sends
    send(&mut socket, r#"[2,"q1","Heartbeat",{}]"#).await;
    send(
        &mut socket,
        r#"[2,"q2","StatusNotification",{"connectorId":1,"status":"Preparing"}]"#,
    )
    .await;
    send(
        &mut socket,
        r#"[2,"q3","MeterValues",{"connectorId":1,"meterValue":[{"sampledValue":[{"measurand":"Power.Active.Import","value":"900"}]}]}]"#,
    )
    .await;
    send(&mut socket, r#"[2,"q4","DataTransfer",{"vendorId":"v"}]"#).await;

    for expected in ["q1", "q2", "q3", "q4"] {
        let reply = next_reply(&mut socket).await;
        assert_eq!(reply[0], 3);
        assert_eq!(reply[1], expected);
    }

    // The MeterValues in the burst auto-recovered a session on the side
    let sessions = hub.sessions.lock().await.active_snapshot(Some("CP06"));
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].power_w, 900.0);

    socket.close(None).await.ok();
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_connection() {
    let hub = Hub::new(Config::default());
    let addr = serve(hub.clone()).await;
    let mut socket = connect(addr, "CP07").await;

    send(&mut socket, "this is not ocpp").await;
    send(&mut socket, r#"[7,"x","Nope",{}]"#).await;
    send(&mut socket, r#"[2,"h1","Heartbeat",{}]"#).await;

    // Only the well-formed CALL is answered, on the same connection
    let reply = next_reply(&mut socket).await;
    assert_eq!(reply[1], "h1");
    assert!(reply[2]["currentTime"].is_string());

    socket.close(None).await.ok();
}

#[tokio::test]
async fn reconnect_replaces_and_finalizes_the_previous_connection() {
    let hub = Hub::new(Config::default());
    let addr = serve(hub.clone()).await;

    let mut first = connect(addr, "CP08").await;
    start_on_connector(&mut first, "s1", 1).await;

    // Same station id connects again without the first ever closing
    let mut second = connect(addr, "CP08").await;
    wait_until_no_active(&hub).await;
    let completed = hub.sessions.lock().await.completed_snapshot();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].reason, FinalizeReason::Disconnect);

    // The replacement connection answers normally
    send(&mut second, r#"[2,"h1","Heartbeat",{}]"#).await;
    assert_eq!(next_reply(&mut second).await[1], "h1");

    // Tearing down the replaced socket must not take the station offline
    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(hub.registry.lock().await.is_online("CP08"));

    second.close(None).await.ok();
}
