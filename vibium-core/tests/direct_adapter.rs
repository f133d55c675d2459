//! The direct-call adapter drives the same `commands::*` handlers as the
//! broker, just without a second client relaying raw BiDi frames back out.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use vibium_core::bidi::mock::MockBidiChannel;
use vibium_core::commands::navigation;
use vibium_core::direct::DirectSession;
use vibium_core::session::Session;

#[tokio::test]
async fn navigate_through_direct_session_resolves_context_and_waits_for_load() {
    let bidi = Arc::new(MockBidiChannel::new());

    let mut responses = HashMap::new();
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

    let session = DirectSession::new(bidi);
    let ctx = session.context();

    let result = navigation::navigate(&ctx, json!({ "url": "https://example.test" }))
        .await
        .unwrap();
    assert_eq!(result["ok"], json!(true));
    assert_eq!(ctx.session.context_id().await.as_deref(), Some("ctx-1"));

    session.close().await;
}
