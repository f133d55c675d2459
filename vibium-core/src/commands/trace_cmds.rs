//! trace-start/trace-stop/trace-start-chunk/trace-stop-chunk/
//! trace-start-group/trace-stop-group — thin wrappers over
//! [`crate::trace::TraceRecorder`] (spec §4.4).

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use super::optional_str;
use crate::error::{Result, VibiumError};
use crate::session::Session;
use crate::state::CommandContext;
use crate::trace::events::TraceEvent;
use crate::trace::{screenshot_loop, store, TraceRecorder};

async fn recorder(ctx: &CommandContext) -> Result<Arc<TraceRecorder>> {
    ctx.state
        .trace
        .lock()
        .await
        .clone()
        .ok_or_else(|| VibiumError::validation("no trace recorder attached — call trace-start first"))
}

async fn stop_screenshot_ticker(ctx: &CommandContext) {
    if let Some(stop) = ctx.state.trace_screenshot_stop.lock().await.take() {
        stop.notify_one();
    }
}

pub async fn trace_start(ctx: &CommandContext, params: Value) -> Result<Value> {
    let bidi_spans = params.get("bidiSpans").and_then(Value::as_bool).unwrap_or(true);
    let screenshots = params.get("screenshots").and_then(Value::as_bool).unwrap_or(true);
    let snapshots = params.get("snapshots").and_then(Value::as_bool).unwrap_or(false);

    stop_screenshot_ticker(ctx).await;

    let new_recorder = Arc::new(TraceRecorder::new(bidi_spans, screenshots, snapshots));
    new_recorder.start();
    *ctx.state.trace.lock().await = Some(new_recorder.clone());

    if screenshots {
        let context = ctx.resolve_context(None).await.unwrap_or_default();
        let session = ctx.session.clone();
        let capture_context = context.clone();
        let capture: screenshot_loop::CaptureFn = Arc::new(move || {
            let session = session.clone();
            let context = capture_context.clone();
            Box::pin(async move {
                let result = session
                    .send_bidi_command("browsingContext.captureScreenshot", json!({ "context": context }))
                    .await
                    .ok()?;
                result["data"].as_str().map(str::to_string)
            })
        });
        let recorder_for_frames = new_recorder.clone();
        let on_frame: Arc<dyn Fn(Vec<u8>) + Send + Sync> = Arc::new(move |bytes: Vec<u8>| {
            let (width, height) = store::png_dimensions(&bytes).unwrap_or((0, 0));
            let sha1 = recorder_for_frames.store_resource(bytes);
            recorder_for_frames.record(TraceEvent::ScreencastFrame {
                sha1,
                page: context.clone(),
                width,
                height,
                timestamp: 0.0,
            });
        });
        let (_handle, stop) = screenshot_loop::spawn(capture, on_frame);
        *ctx.state.trace_screenshot_stop.lock().await = Some(stop);
    }

    Ok(json!({ "ok": true }))
}

async fn write_or_return(archive: Vec<u8>, filename: Option<&str>) -> Result<Value> {
    match filename {
        Some(filename) => {
            let path = Path::new(filename).file_name().map(|f| f.to_owned()).unwrap_or_else(|| "trace.zip".into());
            tokio::fs::write(&path, &archive).await?;
            Ok(json!({ "saved": path.to_string_lossy() }))
        }
        None => Ok(json!({ "data": STANDARD.encode(archive) })),
    }
}

pub async fn trace_stop(ctx: &CommandContext, params: Value) -> Result<Value> {
    let recorder = recorder(ctx).await?;
    stop_screenshot_ticker(ctx).await;
    let archive = recorder.stop()?;
    write_or_return(archive, optional_str(&params, "filename")).await
}

pub async fn trace_start_chunk(ctx: &CommandContext, _params: Value) -> Result<Value> {
    let recorder = recorder(ctx).await?;
    recorder.start_chunk();
    Ok(json!({ "ok": true }))
}

pub async fn trace_stop_chunk(ctx: &CommandContext, params: Value) -> Result<Value> {
    let recorder = recorder(ctx).await?;
    let archive = recorder.stop_chunk()?;
    write_or_return(archive, optional_str(&params, "filename")).await
}

pub async fn trace_start_group(ctx: &CommandContext, params: Value) -> Result<Value> {
    let name = super::required_str(&params, "name")?.to_string();
    let recorder = recorder(ctx).await?;
    recorder.push_group(name);
    Ok(json!({ "ok": true }))
}

pub async fn trace_stop_group(ctx: &CommandContext, _params: Value) -> Result<Value> {
    let recorder = recorder(ctx).await?;
    let name = recorder.pop_group();
    Ok(json!({ "name": name }))
}
