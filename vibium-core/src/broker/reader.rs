//! The reader task (spec §4.1 "Reader task"): exactly one per client
//! session, pumping frames off the BiDi channel until it closes or errors.

use std::sync::Arc;

use serde_json::Value;
use vibium_types::{Message, CLIENT_ID_CEILING};

use super::client_session::ClientSession;
use super::Broker;
use crate::bidi::BidiChannel;
use crate::error::Result;
use crate::transport::ClientTransport;

const LOAD_EVENTS: &[&str] = &["browsingContext.load", "browsingContext.fragmentNavigated"];

pub async fn run(session: Arc<ClientSession>, broker: Arc<Broker>) {
    loop {
        match session.active.bidi().receive().await {
            Ok(Some(raw)) => {
                if let Err(err) = handle_frame(&session, &raw).await {
                    tracing::warn!(client = session.id.0, %err, "dropping malformed BiDi frame");
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(client = session.id.0, %err, "BiDi read failed; tearing down session");
                break;
            }
        }
    }
    // Tear-down on read failure/EOF: remove from the index, then close —
    // in that order, so no other task can find and re-dispatch to a
    // session mid-close (spec §4.1 "Reader task": "on read error ... tear
    // it down").
    broker.remove_session(session.id).await;
    session.close().await;
}

async fn handle_frame(session: &Arc<ClientSession>, raw: &str) -> Result<()> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        if id >= CLIENT_ID_CEILING {
            if let Message::Response(response) = Message::from_value(value)? {
                // Unregistered (timed-out) ids are silently dropped —
                // `resolve` returning `false` is exactly that case.
                session.active.correlator().resolve(response).await;
            }
        } else {
            // A response to a command the client issued directly (raw
            // forwarding) — ids are disjoint, so this was never ours to
            // correlate; pass it straight through.
            session.transport.send(raw.to_string()).await?;
        }
        return Ok(());
    }

    let event = match Message::from_value(value)? {
        Message::Event(event) => event,
        Message::Response(_) => return Ok(()),
    };

    if LOAD_EVENTS.contains(&event.method.as_ref()) {
        if let Some(url) = event.params.get("url").and_then(Value::as_str) {
            *session.last_url.lock().await = Some(url.to_string());
        }
    }

    if let Some(trace) = session.state.trace.lock().await.as_ref() {
        trace.record_bidi_event(&event.method, event.params.clone());
    }

    if is_internal_ws_tap(session, &event).await {
        return Ok(());
    }

    session.transport.send(raw.to_string()).await?;
    Ok(())
}

/// `script.message` events on the broker's own WebSocket-tap channel are
/// internal bookkeeping, never the client's business (spec §4.1: "internal
/// channel events must not be forwarded as raw `script.message`").
async fn is_internal_ws_tap(session: &Arc<ClientSession>, event: &vibium_types::BidiEvent) -> bool {
    if event.method.as_ref() != "script.message" {
        return false;
    }
    let Some(tap_id) = session.ws_tap_preload_id.lock().await.clone() else {
        return false;
    };
    event.params.get("channel").and_then(Value::as_str) == Some(tap_id.as_str())
}
