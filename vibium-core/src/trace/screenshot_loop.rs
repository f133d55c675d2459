//! Periodic filmstrip ticker (spec §4.4 "Screenshots": "a background
//! ticker (500 ms for periodic capture ...) calls a user-supplied capture
//! function returning base64 PNG").

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::TRACE_SCREENSHOT_INTERVAL;

pub type CaptureFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Option<String>> + Send>> + Send + Sync>;

/// Spawns a task that calls `capture` every [`TRACE_SCREENSHOT_INTERVAL`]
/// and forwards the decoded PNG bytes to `on_frame`, until `stop` is
/// notified. Per spec §4.4 "Backpressure", a capture that returns `None`
/// (the caller's transport stalled) is simply skipped rather than retried
/// immediately.
pub fn spawn(capture: CaptureFn, on_frame: Arc<dyn Fn(Vec<u8>) + Send + Sync>) -> (JoinHandle<()>, Arc<Notify>) {
    let stop = Arc::new(Notify::new());
    let stop_handle = stop.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_handle.notified() => break,
                _ = tokio::time::sleep(TRACE_SCREENSHOT_INTERVAL) => {
                    if let Some(b64) = capture().await {
                        if let Ok(bytes) = STANDARD.decode(b64) {
                            on_frame(bytes);
                        }
                    }
                }
            }
        }
    });
    (handle, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let frames: Arc<std::sync::Mutex<Vec<Vec<u8>>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let capture_count = count.clone();
        let capture: CaptureFn = Arc::new(move || {
            capture_count.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Some(STANDARD.encode(b"frame")) })
        });
        let frames_for_cb = frames.clone();
        let on_frame: Arc<dyn Fn(Vec<u8>) + Send + Sync> = Arc::new(move |bytes| {
            frames_for_cb.lock().unwrap().push(bytes);
        });
        let (handle, stop) = spawn(capture, on_frame);

        tokio::time::advance(TRACE_SCREENSHOT_INTERVAL * 3).await;
        stop.notify_one();
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
        assert_eq!(frames.lock().unwrap()[0], b"frame".to_vec());
    }
}
