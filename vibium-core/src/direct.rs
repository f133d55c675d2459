//! C10 — the direct-call adapter: exposes every §4.3 extension command as
//! an in-process async function call over a [`DirectSession`], reusing
//! [`crate::state::CommandContext`] and the `commands::*` handlers
//! completely unchanged (spec §4.3 C10: "reuses §C5–§C7 unchanged").
//!
//! The one thing a direct caller doesn't get is a second client forwarding
//! raw BiDi frames back out — there's no client transport to forward to.
//! Its reader task only resolves internal-command replies through the
//! correlator and feeds events into the trace recorder, same as the
//! broker's reader minus the relay step.

use std::sync::Arc;

use serde_json::Value;
use vibium_types::{Message, CLIENT_ID_CEILING};

use crate::bidi::BidiChannel;
use crate::broker::BrowserClose;
use crate::config::SessionOptions;
use crate::error::Result;
use crate::session::{new_active_session_with_timeout, ActiveSession, Session};
use crate::state::{CommandContext, SessionState};

/// One in-process caller talking to a single browsing session, with no
/// broker and no second client multiplexed alongside it.
pub struct DirectSession {
    active: Arc<ActiveSession>,
    state: Arc<SessionState>,
    browser_close: Option<BrowserClose>,
}

impl DirectSession {
    /// Wires a fresh [`ActiveSession`] to `bidi` and spawns its reader
    /// task. The caller owns `bidi`'s lifetime; dropping the last
    /// `DirectSession` handle does not close the channel — call
    /// [`DirectSession::close`] explicitly.
    pub fn new(bidi: Arc<dyn BidiChannel>) -> Arc<Self> {
        Self::new_with_options(bidi, SessionOptions::default(), None)
    }

    /// Same as [`DirectSession::new`] but with caller-supplied session
    /// options (spec §4.3 C9) and the opaque `Close()` for the browser
    /// handle this session owns (spec §1, §3 "Ownership").
    pub fn new_with_options(bidi: Arc<dyn BidiChannel>, options: SessionOptions, browser_close: Option<BrowserClose>) -> Arc<Self> {
        let (active, _correlator) = new_active_session_with_timeout(bidi, options.default_internal_timeout);
        let state = Arc::new(SessionState::with_screenshot_dir(options.screenshot_directory));
        let session = Arc::new(Self { active, state, browser_close });

        let reader_session = session.clone();
        tokio::spawn(async move { run_reader(reader_session).await });

        session
    }

    pub fn context(&self) -> CommandContext {
        CommandContext::new(self.active.clone() as Arc<dyn Session>, self.state.clone())
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Shutdown: close the correlator (fails any in-flight internal
    /// commands immediately), the BiDi channel, the trace screenshot loop,
    /// then the browser handle, mirroring the broker's ordering minus the
    /// steps that only apply to a hosted client (spec §4.1).
    pub async fn close(&self) {
        self.active.correlator().close().await;
        let _ = self.active.bidi().close().await;
        if let Some(stop) = self.state.trace_screenshot_stop.lock().await.take() {
            stop.notify_one();
        }
        if let Some(close) = &self.browser_close {
            close().await;
        }
    }
}

async fn run_reader(session: Arc<DirectSession>) {
    loop {
        match session.active.bidi().receive().await {
            Ok(Some(raw)) => {
                if let Err(err) = handle_frame(&session, &raw).await {
                    tracing::warn!(%err, "dropping malformed BiDi frame");
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "BiDi read failed; direct session reader exiting");
                break;
            }
        }
    }
}

async fn handle_frame(session: &Arc<DirectSession>, raw: &str) -> Result<()> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        if id >= CLIENT_ID_CEILING {
            if let Message::Response(response) = Message::from_value(value)? {
                session.active.correlator().resolve(response).await;
            }
        }
        return Ok(());
    }

    if let Message::Event(event) = Message::from_value(value)? {
        if let Some(trace) = session.state.trace.lock().await.as_ref() {
            trace.record_bidi_event(&event.method, event.params);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidi::mock::MockBidiChannel;
    use serde_json::json;

    #[tokio::test]
    async fn direct_session_resolves_internal_command_responses() {
        let mock = Arc::new(MockBidiChannel::new());
        let session = DirectSession::new(mock.clone());

        let ctx = session.context();
        let send = tokio::spawn(async move { ctx.session.send_bidi_command("script.callFunction", json!({})).await });

        // Drain the outbound frame to learn the id the correlator assigned.
        let sent = loop {
            let frames = mock.sent_frames().await;
            if let Some(frame) = frames.into_iter().next() {
                break frame;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        };
        let id = serde_json::from_str::<Value>(&sent).unwrap()["id"].as_u64().unwrap();
        mock.push_incoming(json!({ "id": id, "type": "success", "result": { "ok": true } }).to_string())
            .await;

        let result = send.await.unwrap().unwrap();
        assert_eq!(result["ok"], json!(true));
        session.close().await;
    }
}
