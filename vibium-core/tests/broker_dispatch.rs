//! End-to-end exercise of the broker's dispatch path: a client frame in,
//! an extension-command handler driving a scripted BiDi channel, a
//! response frame out — without any real browser or network transport.

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use vibium_core::bidi::mock::MockBidiChannel;
use vibium_core::broker::Broker;
use vibium_core::transport::mock_pair;

#[tokio::test]
async fn extension_command_routes_through_dispatch_and_replies_to_the_client() {
    let bidi = Arc::new(MockBidiChannel::new());
    let (client_transport, broker_transport) = mock_pair();

    let mut responses = HashMap::new();
    responses.insert("session.subscribe", json!({}));
    responses.insert(
        "browsingContext.getTree",
        json!({ "contexts": [{ "context": "ctx-1" }] }),
    );
    responses.insert("browsingContext.navigate", json!({}));
    responses.insert(
        "script.callFunction",
        json!({ "result": { "value": "complete" } }),
    );
    support::spawn_autoresponder(bidi.clone(), responses);

    let broker = Arc::new(Broker::new());
    let id = broker
        .connect_client(bidi.clone(), broker_transport)
        .await
        .expect("client connects and completes startup subscription");

    broker
        .dispatch(
            id,
            json!({
                "id": 1,
                "method": "vibium:navigate",
                "params": { "url": "https://example.test" }
            })
            .to_string(),
        )
        .await
        .unwrap();

    let raw = tokio::time::timeout(Duration::from_secs(2), client_transport.recv())
        .await
        .expect("response within timeout")
        .unwrap()
        .expect("transport not closed");
    let response: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(response["type"], json!("success"));
    assert_eq!(response["result"]["ok"], json!(true));
}

#[tokio::test]
async fn unknown_extension_command_returns_a_validation_error() {
    let bidi = Arc::new(MockBidiChannel::new());
    let (client_transport, broker_transport) = mock_pair();

    let mut responses = HashMap::new();
    responses.insert("session.subscribe", json!({}));
    support::spawn_autoresponder(bidi.clone(), responses);

    let broker = Arc::new(Broker::new());
    let id = broker.connect_client(bidi, broker_transport).await.unwrap();

    broker
        .dispatch(id, json!({ "id": 2, "method": "vibium:not-a-command", "params": {} }).to_string())
        .await
        .unwrap();

    let raw = tokio::time::timeout(Duration::from_secs(2), client_transport.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let response: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(response["id"], json!(2));
    assert_eq!(response["type"], json!("error"));
}
