//! End-to-end registry flow over real WebSocket connections

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use live_registry::{RegistryConfig, RegistryServer, ServerConfig, Status};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const GRACE: Duration = Duration::from_millis(300);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> (Arc<RegistryServer>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig::with_addr(addr).write_timeout(Duration::from_secs(1));
    let registry_config = RegistryConfig::default().eviction_grace_period(GRACE);
    let server = Arc::new(RegistryServer::with_registry_config(config, registry_config));

    let running = Arc::clone(&server);
    tokio::spawn(async move {
        running
            .serve(listener, std::future::pending())
            .await
            .unwrap();
    });

    (server, format!("ws://{}/discovery", addr))
}

async fn connect(url: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();

        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

async fn expect_policy_close(client: &mut Client) {
    let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
        .await
        .expect("timed out waiting for close")
        .expect("stream ended")
        .unwrap();

    match frame {
        Message::Close(Some(close)) => assert_eq!(close.code, CloseCode::Policy),
        other => panic!("expected close, got {:?}", other),
    }
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_full_scenario() {
    let (server, base) = start_server().await;
    let hub = server.hub().clone();

    // Registrant connects
    let mut svc = connect(&format!("{}?name=svc-a&host=10.0.0.1&port=8080", base)).await;
    wait_until(|| {
        let hub = hub.clone();
        async move { hub.registry().len().await == 1 }
    })
    .await;

    let records = hub.registry().list().await;
    assert_eq!(records[0].name, "svc-a");
    assert_eq!(records[0].status, Status::Up);

    // Observer connects and immediately gets the listing
    let token = hub.gate().current();
    let mut ui = connect(&format!("{}?isUI=true&token={}", base, token)).await;
    let listing = next_json(&mut ui).await;
    assert_eq!(listing["status"], 200);
    assert_eq!(listing["data"].as_array().unwrap().len(), 1);
    assert_eq!(listing["data"][0]["name"], "svc-a");
    assert_eq!(listing["data"][0]["location"]["host"], "10.0.0.1");

    // Registrant goes DOWN
    svc.send(Message::Text("DOWN".into())).await.unwrap();
    let listing = next_json(&mut ui).await;
    assert_eq!(listing["data"][0]["status"], "DOWN");

    svc.send(Message::Text("UP".into())).await.unwrap();
    let listing = next_json(&mut ui).await;
    assert_eq!(listing["data"][0]["status"], "UP");

    // Registrant disconnects: DOWN right away, gone after the grace period
    svc.close(None).await.unwrap();
    let listing = next_json(&mut ui).await;
    assert_eq!(listing["data"][0]["status"], "DOWN");

    let listing = next_json(&mut ui).await;
    assert_eq!(listing["data"].as_array().unwrap().len(), 0);
    assert!(hub.registry().is_empty().await);

    // Observer disconnects and leaves the broadcast set
    ui.close(None).await.unwrap();
    wait_until(|| {
        let hub = hub.clone();
        async move { hub.broadcaster().observer_count().await == 0 }
    })
    .await;
}

#[tokio::test]
async fn test_reconnect_within_grace_keeps_single_record() {
    let (server, base) = start_server().await;
    let hub = server.hub().clone();

    let mut first = connect(&format!("{}?name=svc-b&host=10.0.0.1&port=8080", base)).await;
    wait_until(|| {
        let hub = hub.clone();
        async move { hub.registry().len().await == 1 }
    })
    .await;
    let first_id = hub.registry().list().await[0].registration_id.clone();

    first.close(None).await.unwrap();
    wait_until(|| {
        let hub = hub.clone();
        let id = first_id.clone();
        async move {
            matches!(hub.registry().get_by_id(&id).await, Some(r) if r.status == Status::Down)
        }
    })
    .await;

    let _second = connect(&format!("{}?name=svc-b&host=10.0.0.2&port=9090", base)).await;
    wait_until(|| {
        let hub = hub.clone();
        let id = first_id.clone();
        async move { hub.registry().get_by_id(&id).await.is_none() && hub.registry().len().await == 1 }
    })
    .await;

    // Outlive the first connection's removal timer
    tokio::time::sleep(GRACE * 2).await;

    let records = hub.registry().list().await;
    assert_eq!(records.len(), 1);
    assert_ne!(records[0].registration_id, first_id);
    assert_eq!(records[0].status, Status::Up);
    assert_eq!(records[0].location.host, "10.0.0.2");
    assert_eq!(records[0].location.port, 9090);
}

#[tokio::test]
async fn test_invalid_registration_rejected() {
    let (server, base) = start_server().await;

    let mut client = connect(&format!("{}?name=svc-c&port=8080", base)).await;
    let response = next_json(&mut client).await;
    assert_eq!(response["status"], 400);
    expect_policy_close(&mut client).await;

    assert!(server.hub().registry().is_empty().await);
}

#[tokio::test]
async fn test_observer_token_single_use() {
    let (server, base) = start_server().await;
    let token = server.hub().gate().current();
    let url = format!("{}?isUI=true&key={}", base, token);

    let mut first = connect(&url).await;
    assert_eq!(next_json(&mut first).await["status"], 200);

    let mut second = connect(&url).await;
    let response = next_json(&mut second).await;
    assert_eq!(response["status"], 401);
    assert_eq!(response["data"], "Invalid Token!");
    expect_policy_close(&mut second).await;
}

#[tokio::test]
async fn test_invalid_command_keeps_connection_open() {
    let (_server, base) = start_server().await;

    let mut svc = connect(&format!("{}?name=svc-d&host=h&port=1", base)).await;
    svc.send(Message::Text("RESTART".into())).await.unwrap();
    let response = next_json(&mut svc).await;
    assert_eq!(response["status"], 400);
    assert_eq!(response["data"], "Invalid Command (RESTART)");

    svc.send(Message::Text("ALL".into())).await.unwrap();
    let response = next_json(&mut svc).await;
    assert_eq!(response["status"], 200);
    assert_eq!(response["data"][0]["name"], "svc-d");
}

#[tokio::test]
async fn test_oversized_port_gets_policy_close() {
    let (_server, base) = start_server().await;

    let url = format!("{}?name=svc-e&host=h&port={}", base, "9".repeat(200));
    let mut client = connect(&url).await;
    assert_eq!(next_json(&mut client).await["status"], 400);
    expect_policy_close(&mut client).await;
}

#[tokio::test]
async fn test_rotated_token_admits_next_observer() {
    let (server, base) = start_server().await;
    let gate = server.hub().gate().clone();
    let mut rotations = gate.subscribe();

    let first = gate.current();
    let mut ui1 = connect(&format!("{}?isUI=true&token={}", base, first)).await;
    assert_eq!(next_json(&mut ui1).await["status"], 200);

    tokio::time::timeout(RECV_TIMEOUT, rotations.changed())
        .await
        .unwrap()
        .unwrap();
    let next = rotations.borrow_and_update().clone();

    let mut ui2 = connect(&format!("{}?isUI=true&token={}", base, next)).await;
    assert_eq!(next_json(&mut ui2).await["status"], 200);
}
