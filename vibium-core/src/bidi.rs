//! C2 — the BiDi channel: one owned connection to the browser.
//!
//! Spec §2: "thread-safe `Send`, blocking `Receive`." The low-level framing
//! (WebSocket connect, line-delimited JSON send/receive) is explicitly out
//! of scope (spec §1) — the core only ever consumes the three methods of
//! [`BidiChannel`]. A concrete WebSocket implementation is provided for
//! convenience (the teacher's `conn.rs` plays the same role for CDP), plus
//! an in-memory mock used throughout the test suite since no live Chromium
//! is available in this environment.

use async_tungstenite::tungstenite::Message as WsMessage;
use async_tungstenite::WebSocketStream;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::error::{Result, VibiumError};

/// A connection to the browser's BiDi endpoint.
///
/// `send` may be called concurrently from many tasks (every in-flight
/// internal command writes through it); `receive` is driven by exactly one
/// reader task per session (spec §3 invariant: "exactly one reader task per
/// channel").
#[async_trait::async_trait]
pub trait BidiChannel: Send + Sync {
    async fn send(&self, raw: String) -> Result<()>;
    async fn receive(&self) -> Result<Option<String>>;
    async fn close(&self) -> Result<()>;
}

/// WebSocket-backed [`BidiChannel`], generic over the underlying byte
/// stream (plain TCP or TLS).
pub struct WsBidiChannel<S> {
    write: Mutex<futures::stream::SplitSink<WebSocketStream<S>, WsMessage>>,
    read: Mutex<futures::stream::SplitStream<WebSocketStream<S>>>,
}

impl<S> WsBidiChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (write, read) = ws.split();
        Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
        }
    }
}

#[async_trait::async_trait]
impl<S> BidiChannel for WsBidiChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, raw: String) -> Result<()> {
        let mut write = self.write.lock().await;
        write
            .send(WsMessage::Text(raw))
            .await
            .map_err(|e| VibiumError::Transport(e.to_string()))
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut read = self.read.lock().await;
        loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(VibiumError::Transport(e.to_string())),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut write = self.write.lock().await;
        write.close().await.ok();
        Ok(())
    }
}

#[cfg(any(test, feature = "mock-bidi"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// A scriptable [`BidiChannel`] double. Tests enqueue raw frames to
    /// hand back on `receive`, and capture everything written via `send`.
    pub struct MockBidiChannel {
        inbox: Mutex<VecDeque<String>>,
        notify: Notify,
        outbox: Mutex<Vec<String>>,
        closed: Mutex<bool>,
    }

    impl MockBidiChannel {
        pub fn new() -> Self {
            Self {
                inbox: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                outbox: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
            }
        }

        /// Queues a frame that `receive` will return on a future call.
        pub async fn push_incoming(&self, frame: String) {
            self.inbox.lock().await.push_back(frame);
            self.notify.notify_one();
        }

        /// Returns everything sent through this channel so far.
        pub async fn sent_frames(&self) -> Vec<String> {
            self.outbox.lock().await.clone()
        }
    }

    impl Default for MockBidiChannel {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl BidiChannel for MockBidiChannel {
        async fn send(&self, raw: String) -> Result<()> {
            self.outbox.lock().await.push(raw);
            Ok(())
        }

        async fn receive(&self) -> Result<Option<String>> {
            loop {
                if *self.closed.lock().await {
                    return Ok(None);
                }
                if let Some(frame) = self.inbox.lock().await.pop_front() {
                    return Ok(Some(frame));
                }
                self.notify.notified().await;
            }
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock().await = true;
            self.notify.notify_waiters();
            Ok(())
        }
    }
}
