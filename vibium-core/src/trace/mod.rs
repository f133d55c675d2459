//! C4 — the trace recorder (spec §4.4). `idle -> recording -> idle`, with
//! `start-chunk`/`stop-chunk` slicing one recording into independently
//! flushable archives without leaving the recording state.

pub mod archive;
pub mod events;
pub mod screenshot_loop;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::Result;
use events::TraceEvent;
use store::ResourceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Recording,
}

struct ChunkBuffers {
    general: Vec<TraceEvent>,
    network: Vec<TraceEvent>,
    resources: ResourceStore,
}

impl ChunkBuffers {
    fn new() -> Self {
        Self {
            general: Vec::new(),
            network: Vec::new(),
            resources: ResourceStore::new(),
        }
    }
}

/// One recorder per session, attached on `trace-start` (spec §4.4 "A
/// `TraceRecorder` is attached to a session on `trace-start`").
pub struct TraceRecorder {
    state: Mutex<State>,
    chunk: Mutex<ChunkBuffers>,
    chunk_index: AtomicU64,
    group_stack: Mutex<Vec<String>>,
    bidi_spans: bool,
    screenshots: bool,
    snapshots: bool,
    next_call_id: AtomicU64,
}

impl TraceRecorder {
    pub fn new(bidi_spans: bool, screenshots: bool, snapshots: bool) -> Self {
        Self {
            state: Mutex::new(State::Idle),
            chunk: Mutex::new(ChunkBuffers::new()),
            chunk_index: AtomicU64::new(0),
            group_stack: Mutex::new(Vec::new()),
            bidi_spans,
            screenshots,
            snapshots,
            next_call_id: AtomicU64::new(1),
        }
    }

    pub fn is_recording(&self) -> bool {
        *self.state.lock().unwrap() == State::Recording
    }

    pub fn wants_bidi_spans(&self) -> bool {
        self.bidi_spans
    }

    pub fn wants_screenshots(&self) -> bool {
        self.screenshots
    }

    pub fn wants_snapshots(&self) -> bool {
        self.snapshots
    }

    pub fn next_call_id(&self) -> u64 {
        self.next_call_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn start(&self) {
        *self.state.lock().unwrap() = State::Recording;
    }

    pub fn push_group(&self, name: impl Into<String>) {
        self.group_stack.lock().unwrap().push(name.into());
    }

    pub fn pop_group(&self) -> Option<String> {
        self.group_stack.lock().unwrap().pop()
    }

    pub fn record(&self, event: TraceEvent) {
        if !self.is_recording() {
            return;
        }
        let mut chunk = self.chunk.lock().unwrap();
        if event.is_network() {
            chunk.network.push(event);
        } else {
            chunk.general.push(event);
        }
    }

    /// Categorizes and records a forwarded BiDi event (spec §4.4 "Events").
    pub fn record_bidi_event(&self, method: &str, params: Value) {
        self.record(events::categorize(method, params));
    }

    pub fn store_resource(&self, bytes: Vec<u8>) -> String {
        self.chunk.lock().unwrap().resources.put(bytes)
    }

    /// `start-chunk`: resets the per-chunk buffers but stays in
    /// `Recording` (spec §4.4 "`start-chunk` resets the per-chunk
    /// event/network/resource buffers but keeps recording").
    pub fn start_chunk(&self) {
        *self.chunk.lock().unwrap() = ChunkBuffers::new();
    }

    /// Flushes the current chunk to a ZIP archive without changing state.
    pub fn stop_chunk(&self) -> Result<Vec<u8>> {
        let chunk = self.chunk.lock().unwrap();
        let index = self.chunk_index.fetch_add(1, Ordering::SeqCst);
        archive::build_chunk_archive(index as u32, &chunk.general, &chunk.network, &chunk.resources)
    }

    /// `stop`: flushes and ends recording (spec §4.4).
    pub fn stop(&self) -> Result<Vec<u8>> {
        let bytes = self.stop_chunk()?;
        *self.state.lock().unwrap() = State::Idle;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idle_recorder_drops_events() {
        let recorder = TraceRecorder::new(false, false, false);
        recorder.record_bidi_event("log.entryAdded", json!({}));
        let chunk = recorder.chunk.lock().unwrap();
        assert!(chunk.general.is_empty());
    }

    #[test]
    fn network_events_route_to_network_buffer() {
        let recorder = TraceRecorder::new(false, false, false);
        recorder.start();
        recorder.record_bidi_event("network.beforeRequestSent", json!({}));
        recorder.record_bidi_event("log.entryAdded", json!({}));
        let chunk = recorder.chunk.lock().unwrap();
        assert_eq!(chunk.network.len(), 1);
        assert_eq!(chunk.general.len(), 1);
    }

    #[test]
    fn start_chunk_resets_buffers_but_stays_recording() {
        let recorder = TraceRecorder::new(false, false, false);
        recorder.start();
        recorder.record_bidi_event("log.entryAdded", json!({}));
        recorder.start_chunk();
        assert!(recorder.is_recording());
        let chunk = recorder.chunk.lock().unwrap();
        assert!(chunk.general.is_empty());
    }

    #[test]
    fn stop_ends_recording() {
        let recorder = TraceRecorder::new(false, false, false);
        recorder.start();
        recorder.stop().unwrap();
        assert!(!recorder.is_recording());
    }
}
