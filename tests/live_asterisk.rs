//! Integration tests against a live Asterisk instance.
//!
//! These tests require AMI on 127.0.0.1:5038 with user `admin` / `amp111`.
//! Run with: cargo test --test live_asterisk -- --ignored

use asterisk_ami_tokio::{
    AmiAction, AmiClient, AmiConnection, AmiEventStream, ClientConfig, ClientEvent,
    SocketOptions,
};
use std::time::Duration;
use tokio::sync::mpsc;

const AMI_HOST: &str = "127.0.0.1";
const AMI_PORT: u16 = 5038;
const AMI_USER: &str = "admin";
const AMI_SECRET: &str = "amp111";

async fn connect() -> (AmiConnection, AmiEventStream) {
    let (connection, events) = AmiConnection::connect(AMI_HOST, AMI_PORT, AMI_USER, AMI_SECRET)
        .await
        .expect("failed to connect to Asterisk");
    connection.set_command_timeout(Duration::from_secs(10));
    (connection, events)
}

#[tokio::test]
#[ignore]
async fn live_connect_and_ping() {
    let (connection, _events) = connect().await;
    assert!(connection.is_connected());
    assert!(!connection
        .version()
        .is_empty());

    let pong = connection
        .ping()
        .await
        .unwrap();
    assert_eq!(pong.header("Ping"), Some("Pong"));
}

#[tokio::test]
#[ignore]
async fn live_core_status() {
    let (connection, _events) = connect().await;
    let response = connection
        .send_action(AmiAction::new("CoreStatus"))
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert!(response
        .header("CoreStartupTime")
        .is_some());
}

#[tokio::test]
#[ignore]
async fn live_fully_booted_event() {
    let (_connection, mut events) = connect().await;
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timeout waiting for FullyBooted")
        .expect("channel closed")
        .expect("event error");
    assert!(event.is_event("FullyBooted"));
}

#[tokio::test]
#[ignore]
async fn live_wrong_secret_rejected() {
    let err = AmiConnection::connect(AMI_HOST, AMI_PORT, AMI_USER, "definitely-wrong")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string()
            .to_lowercase(),
        "ami message: authentication failed"
    );
}

#[tokio::test]
#[ignore]
async fn live_client_connect_event() {
    let client = AmiClient::new(ClientConfig::default().with_reconnect(true)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.subscribe(move |event| {
        if matches!(event, ClientEvent::Connect) {
            let _ = tx.send(());
        }
    });

    client
        .connect(AMI_USER, AMI_SECRET, SocketOptions::new(AMI_HOST, AMI_PORT))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no connect event")
        .unwrap();
    client.disconnect();
}
