//! Session-level bookkeeping shared verbatim between the broker-hosted
//! [`crate::broker::client_session::ClientSession`] and the direct-call
//! [`crate::direct::DirectSession`] — everything §C6 extension handlers
//! need besides "send a BiDi command" (spec §4.3 C10: "reuses §C5–§C7
//! unchanged").

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::reftable::RefTable;
use crate::session::Session;
use crate::trace::TraceRecorder;

#[derive(Default)]
pub struct SessionState {
    pub ref_table: Mutex<RefTable>,
    pub trace: Mutex<Option<Arc<TraceRecorder>>>,
    pub download_dir: Mutex<Option<PathBuf>>,
    /// Directory file-save commands (`screenshot`, `pdf`) write into; `None`
    /// means file saves are rejected before capture (spec §8 boundary:
    /// "screenshot with a filename and no configured screenshot directory
    /// fails with a validation error before capture").
    pub screenshot_dir: Mutex<Option<PathBuf>>,
    /// Last `map` output, consumed by `diff-map` (spec §4.3 "diff-map ...
    /// errors if no previous").
    pub last_map: Mutex<Option<String>>,
    /// Single-slot CAS guard so overlapping actions never stack concurrent
    /// filmstrip screenshot requests (spec "Action tracing wrapper").
    pub screenshot_in_flight: AtomicBool,
    /// Stop handle for the periodic trace screenshot ticker, if one is
    /// running (spec §4.1 shutdown ordering: "trace screenshot loop stop").
    pub trace_screenshot_stop: Mutex<Option<Arc<tokio::sync::Notify>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screenshot_dir(dir: Option<PathBuf>) -> Self {
        Self {
            screenshot_dir: Mutex::new(dir),
            ..Self::default()
        }
    }
}

/// Everything an extension command handler needs: somewhere to send BiDi
/// commands, and the per-session bookkeeping above. Identical regardless
/// of whether it's reached through the broker or the direct-call adapter.
pub struct CommandContext {
    pub session: Arc<dyn crate::session::Session>,
    pub state: Arc<SessionState>,
}

impl CommandContext {
    pub fn new(session: Arc<dyn crate::session::Session>, state: Arc<SessionState>) -> Self {
        Self { session, state }
    }

    /// Resolves `context` if given, else falls back to the session's
    /// last-resolved browsing context (spec §4.3: "resolves its context
    /// (explicit id, else the first browsing context)").
    pub async fn resolve_context(&self, explicit: Option<String>) -> crate::error::Result<String> {
        if let Some(c) = explicit {
            return Ok(c);
        }
        if let Some(c) = self.session.context_id().await {
            return Ok(c);
        }
        let result = self
            .session
            .send_bidi_command("browsingContext.getTree", serde_json::json!({}))
            .await?;
        let first = result["contexts"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["context"].as_str())
            .ok_or_else(|| crate::error::VibiumError::validation("no browsing context available"))?
            .to_string();
        self.session.set_context_id(Some(first.clone())).await;
        Ok(first)
    }
}
