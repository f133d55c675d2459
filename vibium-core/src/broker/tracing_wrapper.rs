//! Action tracing wrapper (spec "Action tracing wrapper"): when a trace
//! recorder is attached, "click-like" actions get a DOM snapshot captured
//! *before* they run; everything else gets one *after*. Every traced
//! command also gets a best-effort filmstrip screenshot, serialized through
//! a single-slot CAS guard so overlapping actions never stack concurrent
//! screenshot requests at the browser.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use super::client_session::ClientSession;
use crate::error::Result;
use crate::session::Session;
use crate::trace::events::TraceEvent;
use crate::trace::store;

const CLICK_LIKE: &[&str] = &[
    "click",
    "dblclick",
    "hover",
    "tap",
    "check",
    "uncheck",
    "focus",
    "scroll-into-view",
    "drag",
    "mouse-move",
    "mouse-down",
    "mouse-up",
    "mouse-click",
];

async fn snapshot(session: &Arc<ClientSession>) {
    let Some(trace) = session.state.trace.lock().await.clone() else {
        return;
    };
    if !trace.wants_snapshots() {
        return;
    }
    let context = session.active.context_id().await.unwrap_or_default();
    let Ok(raw) = session
        .active
        .send_bidi_command(
            "script.callFunction",
            json!({
                "functionDeclaration": "(function() { return document.documentElement.outerHTML; })",
                "arguments": [],
                "target": { "context": context },
                "awaitPromise": false,
            }),
        )
        .await
    else {
        return;
    };
    let html = raw["result"]["value"].as_str().unwrap_or_default().as_bytes().to_vec();
    let sha1 = trace.store_resource(html);
    trace.record(TraceEvent::FrameSnapshot { sha1, page: context });
}

/// Best-effort filmstrip capture, skipped entirely (not queued) if another
/// capture is already in flight for this session.
async fn filmstrip(session: &Arc<ClientSession>) {
    let Some(trace) = session.state.trace.lock().await.clone() else {
        return;
    };
    if !trace.wants_screenshots() {
        return;
    }
    if session
        .state
        .screenshot_in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }
    let context = session.active.context_id().await.unwrap_or_default();
    let result = session
        .active
        .send_bidi_command("browsingContext.captureScreenshot", json!({ "context": context }))
        .await;
    session.state.screenshot_in_flight.store(false, Ordering::SeqCst);

    if let Ok(frame) = result {
        if let Some(data) = frame["data"].as_str() {
            if let Ok(bytes) = STANDARD.decode(data) {
                let (width, height) = store::png_dimensions(&bytes).unwrap_or((0, 0));
                let sha1 = trace.store_resource(bytes);
                trace.record(TraceEvent::ScreencastFrame {
                    sha1,
                    page: context,
                    width,
                    height,
                    timestamp: 0.0,
                });
            }
        }
    }
}

fn wall_time_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

fn monotonic_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Runs `command` as `run`, surrounding it with the before/after snapshot
/// rule, a matching pair of `before`/`after` trace events (spec §4.4
/// "Dispatch emits two events per extension command while recording"), and
/// a trailing filmstrip capture.
pub async fn wrap<F, Fut>(session: &Arc<ClientSession>, command: &str, params: Value, run: F) -> Result<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let trace = session.state.trace.lock().await.clone();
    let tracing_active = trace.as_ref().map(|t| t.is_recording()).unwrap_or(false);
    if !tracing_active {
        return run().await;
    }
    let trace = trace.expect("tracing_active is only true when trace is Some");

    let click_like = CLICK_LIKE.contains(&command);
    if click_like {
        snapshot(session).await;
    }

    let call_id = trace.next_call_id();
    trace.record(TraceEvent::Before {
        call_id,
        api_name: "vibium".to_string(),
        class: "Vibium".to_string(),
        method: command.to_string(),
        params,
        wall_time: wall_time_ms(),
        start_time: monotonic_seconds(),
    });

    let result = run().await;

    trace.record(TraceEvent::After {
        call_id,
        end_time: monotonic_seconds(),
    });

    if !click_like {
        snapshot(session).await;
    }
    filmstrip(session).await;
    result
}
