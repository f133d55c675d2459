//! C4 — the broker/router (spec §4.1): owns every connected client's
//! session, demultiplexes the BiDi channel's reader task against them, and
//! dispatches each inbound client frame to either an extension handler or
//! straight through to the browser.

pub mod client_session;
pub mod dispatch;
pub mod reader;
pub mod tracing_wrapper;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bidi::BidiChannel;
use crate::config::{SessionOptions, STARTUP_SUBSCRIPTION_EVENTS};
use crate::error::Result;
use crate::session::Session;
use crate::transport::ClientTransport;

pub use client_session::{BrowserClose, ClientId};
use client_session::ClientSession;

pub struct Broker {
    sessions: Mutex<HashMap<ClientId, Arc<ClientSession>>>,
    next_client_id: AtomicU64,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Client-connect protocol (spec §4.1): register, spawn the reader
    /// task, then synchronously subscribe to the startup event set
    /// *before* this call returns — the hard ordering invariant that keeps
    /// Chromium from dropping early events for the first navigation.
    pub async fn connect_client(
        self: &Arc<Self>,
        bidi: Arc<dyn BidiChannel>,
        transport: Arc<dyn ClientTransport>,
    ) -> Result<ClientId> {
        self.connect_client_with_options(bidi, transport, SessionOptions::default(), None).await
    }

    /// Same as [`Broker::connect_client`] but with caller-supplied session
    /// options (spec §4.3 C9) and the opaque `Close()` for the browser
    /// handle this client owns (spec §1, §3 "Ownership") — called as the
    /// last step of [`ClientSession::close`].
    pub async fn connect_client_with_options(
        self: &Arc<Self>,
        bidi: Arc<dyn BidiChannel>,
        transport: Arc<dyn ClientTransport>,
        options: SessionOptions,
        browser_close: Option<BrowserClose>,
    ) -> Result<ClientId> {
        let id = ClientId(self.next_client_id.fetch_add(1, Ordering::SeqCst));
        let session = ClientSession::new(id, bidi, transport, &options, browser_close);

        self.sessions.lock().await.insert(id, session.clone());

        let reader_session = session.clone();
        let broker = self.clone();
        tokio::spawn(async move { reader::run(reader_session, broker).await });

        session
            .session()
            .send_bidi_command(
                "session.subscribe",
                serde_json::json!({ "events": STARTUP_SUBSCRIPTION_EVENTS }),
            )
            .await?;

        // Download-directory provisioning is best-effort and must never
        // gate the first client command (spec §4.1).
        if options.download_directory_enabled {
            let provisioning_session = session.clone();
            tokio::spawn(async move {
                if let Ok(dir) = tempfile_download_dir().await {
                    *provisioning_session.state.download_dir.lock().await = Some(dir);
                }
            });
        }

        Ok(id)
    }

    pub async fn session(&self, id: ClientId) -> Option<Arc<ClientSession>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn remove_session(&self, id: ClientId) {
        self.sessions.lock().await.remove(&id);
    }

    /// Routes one raw client frame (spec §4.1 "Dispatch"). Extension
    /// methods run on their own task so a slow handler never blocks the
    /// reader; anything else is forwarded verbatim to the BiDi channel.
    pub async fn dispatch(self: &Arc<Self>, id: ClientId, raw: String) -> Result<()> {
        let Some(session) = self.session(id).await else {
            return Ok(());
        };
        tokio::spawn(async move {
            dispatch::handle(session, raw).await;
        });
        Ok(())
    }
}

async fn tempfile_download_dir() -> std::io::Result<std::path::PathBuf> {
    let dir = std::env::temp_dir().join(format!("vibium-dl-{}", uuid_like()));
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// A short, collision-resistant-enough suffix without pulling in a uuid
/// crate for one call site.
fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{nanos:x}")
}
