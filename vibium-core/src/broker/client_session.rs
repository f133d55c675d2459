//! Per-client session state (spec §3 "ClientSession").

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bidi::BidiChannel;
use crate::config::SessionOptions;
use crate::session::{new_active_session_with_timeout, ActiveSession, Session};
use crate::state::SessionState;
use crate::transport::ClientTransport;

/// Newtype so client ids can't be confused with BiDi [`vibium_types::CallId`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// The opaque `Close()` the core is handed alongside a BiDi WebSocket URL
/// and a session id (spec §1): whatever tears down the underlying browser
/// process or remote session. The core never inspects it, only calls it
/// once during shutdown.
pub type BrowserClose = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// One per connected client (spec §3). Owns its browser handle, BiDi
/// channel, client transport, trace recorder, and download directory —
/// nothing else in the broker reaches into those without going through
/// this struct (spec §3 "Ownership").
pub struct ClientSession {
    pub id: ClientId,
    pub active: Arc<ActiveSession>,
    pub transport: Arc<dyn ClientTransport>,
    pub state: Arc<SessionState>,
    pub last_url: Mutex<Option<String>>,
    pub clock_preload_id: Mutex<Option<String>>,
    pub ws_tap_preload_id: Mutex<Option<String>>,
    browser_close: Option<BrowserClose>,
    closed: AtomicBool,
}

impl ClientSession {
    pub fn new(
        id: ClientId,
        bidi: Arc<dyn BidiChannel>,
        transport: Arc<dyn ClientTransport>,
        options: &SessionOptions,
        browser_close: Option<BrowserClose>,
    ) -> Arc<Self> {
        let (active, _correlator) = new_active_session_with_timeout(bidi, options.default_internal_timeout);
        Arc::new(Self {
            id,
            active,
            transport,
            state: Arc::new(SessionState::with_screenshot_dir(options.screenshot_directory.clone())),
            last_url: Mutex::new(None),
            clock_preload_id: Mutex::new(None),
            ws_tap_preload_id: Mutex::new(None),
            browser_close,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> Arc<dyn Session> {
        self.active.clone() as Arc<dyn Session>
    }

    /// Shutdown ordering (spec §4.1): closed flag, stop signal (the
    /// correlator), BiDi channel, trace screenshot loop, download
    /// directory, browser handle — then the client transport, which the
    /// six-step ordering doesn't cover but which every path to `close`
    /// still needs torn down. Every step is idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.correlator().close().await;
        let _ = self.active.bidi().close().await;
        if let Some(stop) = self.state.trace_screenshot_stop.lock().await.take() {
            stop.notify_one();
        }
        if let Some(dir) = self.state.download_dir.lock().await.take() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
        if let Some(close) = &self.browser_close {
            close().await;
        }
        let _ = self.transport.close().await;
    }
}
