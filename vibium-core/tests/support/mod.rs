//! Shared scaffolding for the integration tests below: a scripted BiDi
//! channel that answers every outgoing command with a canned result looked
//! up by method name, so tests can drive a whole client-frame round trip
//! without a real Chromium.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use vibium_core::bidi::mock::MockBidiChannel;

pub fn spawn_autoresponder(mock: Arc<MockBidiChannel>, responses: HashMap<&'static str, Value>) {
    tokio::spawn(async move {
        let mut answered = 0usize;
        loop {
            let frames = mock.sent_frames().await;
            for frame in frames.iter().skip(answered) {
                let Ok(value) = serde_json::from_str::<Value>(frame) else {
                    continue;
                };
                let Some(id) = value.get("id").and_then(Value::as_u64) else {
                    continue;
                };
                let method = value.get("method").and_then(Value::as_str).unwrap_or_default();
                let result = responses.get(method).cloned().unwrap_or(Value::Null);
                mock.push_incoming(
                    serde_json::json!({ "id": id, "type": "success", "result": result }).to_string(),
                )
                .await;
            }
            answered = frames.len();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });
}
