//! Typed trace events (spec §4.4). Serialized one-per-line into the
//! `<chunkIndex>-trace.trace` / `<chunkIndex>-trace.network` files inside
//! the archive.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TraceEvent {
    ContextOptions {
        viewport: Option<Value>,
        user_agent: Option<String>,
    },
    Before {
        call_id: u64,
        api_name: String,
        class: String,
        method: String,
        params: Value,
        wall_time: u64,
        start_time: f64,
    },
    After {
        call_id: u64,
        end_time: f64,
    },
    Event {
        method: String,
        params: Value,
    },
    ScreencastFrame {
        sha1: String,
        page: String,
        width: u32,
        height: u32,
        timestamp: f64,
    },
    FrameSnapshot {
        sha1: String,
        page: String,
    },
    ResourceSnapshot {
        method: String,
        params: Value,
    },
}

impl TraceEvent {
    /// Network events route to `<chunk>-trace.network`; everything else to
    /// `<chunk>-trace.trace` (spec §4.4 "Events").
    pub fn is_network(&self) -> bool {
        matches!(self, TraceEvent::ResourceSnapshot { .. })
    }
}

/// BiDi method names that, when forwarded to a recording client, are
/// categorized as network events rather than general events (spec §4.4).
pub const NETWORK_EVENT_METHODS: &[&str] = &[
    "network.beforeRequestSent",
    "network.responseCompleted",
    "network.fetchError",
];

pub fn categorize(method: &str, params: Value) -> TraceEvent {
    if NETWORK_EVENT_METHODS.contains(&method) {
        TraceEvent::ResourceSnapshot {
            method: method.to_string(),
            params,
        }
    } else {
        TraceEvent::Event {
            method: method.to_string(),
            params,
        }
    }
}
