//! Writes a finished chunk's trace/network line files plus every
//! referenced resource into one deterministic ZIP (spec §4.4 "Archive
//! layout on stop/stop-chunk").

use std::io::{Cursor, Write};

use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{Result, VibiumError};
use crate::trace::events::TraceEvent;
use crate::trace::store::{extension_for, ResourceStore};

fn line(event: &TraceEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

/// Builds the ZIP bytes for one chunk. `general` and `network` are written
/// newline-delimited, in the order recorded; resources are written in
/// sorted-hash order for reproducibility.
pub fn build_chunk_archive(
    chunk_index: u32,
    general: &[TraceEvent],
    network: &[TraceEvent],
    resources: &ResourceStore,
) -> Result<Vec<u8>> {
    let buffer = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(buffer);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    writer
        .start_file(format!("{chunk_index}-trace.trace"), options)
        .map_err(zip_err)?;
    for event in general {
        writeln!(writer, "{}", line(event)?).map_err(VibiumError::from)?;
    }

    writer
        .start_file(format!("{chunk_index}-trace.network"), options)
        .map_err(zip_err)?;
    for event in network {
        writeln!(writer, "{}", line(event)?).map_err(VibiumError::from)?;
    }

    for (sha1, bytes) in resources.sorted_entries() {
        let ext = extension_for(bytes);
        writer
            .start_file(format!("resources/{sha1}{ext}"), options)
            .map_err(zip_err)?;
        writer.write_all(bytes).map_err(VibiumError::from)?;
    }

    let cursor = writer.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

fn zip_err(err: zip::result::ZipError) -> VibiumError {
    VibiumError::Transport(format!("trace archive write failed: {err}"))
}

/// Wraps a `before`/`after` BiDi-level span with `params` left as raw JSON
/// rather than re-parsed — the recorder never interprets command bodies, it
/// only stores them (spec §4.4 "BiDi-level spans ... are also emitted").
pub fn bidi_span_params(method: &str, params: &Value) -> Value {
    serde_json::json!({ "method": method, "params": params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::events::TraceEvent;

    #[test]
    fn archive_contains_trace_and_network_entries() {
        let general = vec![TraceEvent::Event {
            method: "log.entryAdded".into(),
            params: serde_json::json!({}),
        }];
        let network = vec![TraceEvent::ResourceSnapshot {
            method: "network.beforeRequestSent".into(),
            params: serde_json::json!({}),
        }];
        let resources = ResourceStore::new();
        let bytes = build_chunk_archive(0, &general, &network, &resources).unwrap();
        assert!(!bytes.is_empty());

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"0-trace.trace".to_string()));
        assert!(names.contains(&"0-trace.network".to_string()));
    }
}
