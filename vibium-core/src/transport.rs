//! C1 — the uniform interface a single client uses to send/receive framed
//! text messages (spec §2, §6). Two implementations: WebSocket and a local
//! pipe. Both are `ClientTransport` trait objects to the rest of the core,
//! the same way the teacher treats its websocket connection as an opaque
//! `Connection<T>` behind a handful of methods (`conn.rs`).

use std::sync::Arc;

use async_tungstenite::tungstenite::Message as WsMessage;
use async_tungstenite::WebSocketStream;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use crate::config::PIPE_QUEUE_DEPTH;
use crate::error::{Result, VibiumError};

/// A client's framed text transport: one frame in, one frame out, close.
#[async_trait::async_trait]
pub trait ClientTransport: Send + Sync {
    /// Sends one line-delimited JSON frame to the client.
    async fn send(&self, frame: String) -> Result<()>;

    /// Waits for the next frame from the client. `Ok(None)` means the
    /// client closed its end cleanly.
    async fn recv(&self) -> Result<Option<String>>;

    /// Closes the transport. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// A WebSocket transport, built on `async-tungstenite` over the tokio
/// runtime — same crate the teacher uses for the browser-facing connection
/// (`conn.rs`), reused here for the client-facing side since both speak
/// line-delimited JSON over a WebSocket frame. Generic over the underlying
/// byte stream so callers can hand in a plain TCP stream or a TLS-wrapped
/// one without this module caring.
pub struct WebSocketTransport<S> {
    write: Mutex<futures::stream::SplitSink<WebSocketStream<S>, WsMessage>>,
    read: Mutex<futures::stream::SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketTransport<S>
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
impl<S> ClientTransport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, frame: String) -> Result<()> {
        let mut write = self.write.lock().await;
        write
            .send(WsMessage::Text(frame))
            .await
            .map_err(|e| VibiumError::Transport(e.to_string()))
    }

    async fn recv(&self) -> Result<Option<String>> {
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

/// A local pipe transport over any duplex byte stream (stdio, a unix
/// socket, an in-process duplex pair). Outgoing frames go through a bounded
/// channel with drop-on-overflow, per spec §5: "the pipe transport uses a
/// bounded outgoing queue (≈4096 messages) with drop-on-overflow to ensure
/// the reader never blocks on a slow client."
pub struct PipeTransport {
    outgoing: mpsc::Sender<String>,
    incoming: Mutex<mpsc::Receiver<String>>,
    writer_task: tokio::task::JoinHandle<()>,
}

impl PipeTransport {
    pub fn new<R, W>(reader: R, mut writer: W) -> Self
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, mut out_rx) = mpsc::channel::<String>(PIPE_QUEUE_DEPTH);
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if writer.write_all(frame.as_bytes()).await.is_err() {
                    break;
                }
                if writer.write_all(b"\n").await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let (in_tx, in_rx) = mpsc::channel::<String>(PIPE_QUEUE_DEPTH);
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if in_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        Self {
            outgoing: out_tx,
            incoming: Mutex::new(in_rx),
            writer_task,
        }
    }
}

#[async_trait::async_trait]
impl ClientTransport for PipeTransport {
    async fn send(&self, frame: String) -> Result<()> {
        // Drop-on-overflow: a slow client must never stall the reader task
        // that calls this. `try_send` either enqueues or silently drops.
        let _ = self.outgoing.try_send(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>> {
        let mut incoming = self.incoming.lock().await;
        Ok(incoming.recv().await)
    }

    async fn close(&self) -> Result<()> {
        self.writer_task.abort();
        Ok(())
    }
}

/// An in-memory transport pair for tests: one end looks like the client,
/// the other is handed to the broker.
pub fn mock_pair() -> (Arc<MockTransport>, Arc<MockTransport>) {
    let (a_tx, b_rx) = mpsc::channel(PIPE_QUEUE_DEPTH);
    let (b_tx, a_rx) = mpsc::channel(PIPE_QUEUE_DEPTH);
    (
        Arc::new(MockTransport {
            outgoing: a_tx,
            incoming: Mutex::new(a_rx),
        }),
        Arc::new(MockTransport {
            outgoing: b_tx,
            incoming: Mutex::new(b_rx),
        }),
    )
}

pub struct MockTransport {
    outgoing: mpsc::Sender<String>,
    incoming: Mutex<mpsc::Receiver<String>>,
}

#[async_trait::async_trait]
impl ClientTransport for MockTransport {
    async fn send(&self, frame: String) -> Result<()> {
        let _ = self.outgoing.try_send(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>> {
        let mut incoming = self.incoming.lock().await;
        Ok(incoming.recv().await)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
