//! trace-start/trace-stop through a [`DirectSession`]: exercises the
//! periodic screenshot ticker's startup/shutdown wiring alongside the
//! recorder state machine, without a real Chromium to screenshot.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use vibium_core::bidi::mock::MockBidiChannel;
use vibium_core::commands::trace_cmds;
use vibium_core::direct::DirectSession;

#[tokio::test]
async fn trace_start_then_stop_produces_a_zip_archive() {
    let bidi = Arc::new(MockBidiChannel::new());

    let mut responses = HashMap::new();
    responses.insert(
        "browsingContext.getTree",
        json!({ "contexts": [{ "context": "ctx-1" }] }),
    );
    responses.insert(
        "browsingContext.captureScreenshot",
        json!({ "data": "" }),
    );
    support::spawn_autoresponder(bidi.clone(), responses);

    let session = DirectSession::new(bidi);
    let ctx = session.context();

    // Screenshots off: no ticker to race against in this otherwise
    // deterministic start/stop check.
    let start = trace_cmds::trace_start(&ctx, json!({ "screenshots": false })).await.unwrap();
    assert_eq!(start["ok"], json!(true));

    let stop = trace_cmds::trace_stop(&ctx, json!({})).await.unwrap();
    let archive = stop["data"].as_str().expect("base64 archive data");
    assert!(!archive.is_empty());

    session.close().await;
}

#[tokio::test]
async fn trace_stop_without_start_is_a_validation_error() {
    let bidi = Arc::new(MockBidiChannel::new());
    support::spawn_autoresponder(bidi.clone(), HashMap::new());

    let session = DirectSession::new(bidi);
    let ctx = session.context();

    let err = trace_cmds::trace_stop(&ctx, json!({})).await.unwrap_err();
    assert_eq!(err.kind(), "validation error");
}
